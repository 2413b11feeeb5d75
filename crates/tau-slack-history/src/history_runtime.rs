//! Incremental Slack history tally: walks channel history, merges it into the
//! per-channel cache and writes the per-user message count report.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};

use crate::pacing::{RequestPacer, Sleeper};
use crate::slack_models::SlackChannel;

const CHANNEL_CACHE_SCHEMA_VERSION: u32 = 1;
pub const DEFAULT_HISTORY_PAGE_LIMIT: usize = 1_000;
pub const DEFAULT_REQUEST_PACING_MS: u64 = 1_000;
pub const DEFAULT_RETRY_AFTER_MS: u64 = 1_000;

/// Runtime configuration for one history tally run.
#[derive(Clone)]
pub struct SlackHistoryTallyConfig {
    pub api_base: String,
    pub api_token: String,
    pub cache_dir: PathBuf,
    pub report_path: PathBuf,
    pub channel_selection: ChannelSelection,
    pub history_page_limit: usize,
    pub request_pacing: Duration,
    pub default_retry_after: Duration,
    pub request_timeout_ms: u64,
    pub sleeper: Arc<dyn Sleeper>,
}

mod channel_cache_store;
mod channel_directory;
mod history_fetcher;
mod history_merge;
mod slack_api_client;
mod tally_report;

pub use channel_cache_store::{
    parse_cached_channel_record, CachedChannelRecord, ChannelCacheStore, ChannelMetadata,
};
pub use channel_directory::{rank_channels, ChannelSelection, DEFAULT_MIN_MEMBERS_EXCLUSIVE};
pub use history_fetcher::ChannelFetchOutcome;
pub use history_merge::{merge_channel_history, MergeOutcome, UserMessageTally};
pub use slack_api_client::SlackApiError;
pub use tally_report::{build_tally_report, write_tally_report, ReportUser, TallyReportEntry};

use channel_directory::{index_users, list_ranked_channels, list_users};
use history_fetcher::fetch_channel_history;
use slack_api_client::SlackApiClient;

/// What happened to one channel during a run.
#[derive(Debug)]
pub enum ChannelRunOutcome {
    Merged {
        record: CachedChannelRecord,
        fetched: usize,
        pages: usize,
        duplicates_dropped: usize,
        persisted: bool,
    },
    RateLimited,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TallyRunSummary {
    pub channels_selected: usize,
    pub channels_fetched: usize,
    pub channels_rate_limited: usize,
    pub channels_failed: usize,
    pub cache_write_failures: usize,
    pub pages_fetched: usize,
    pub messages_fetched: usize,
    pub duplicates_dropped: usize,
    pub users_counted: usize,
    pub report_path: PathBuf,
}

impl TallyRunSummary {
    fn record_channel(&mut self, outcome: &ChannelRunOutcome) {
        match outcome {
            ChannelRunOutcome::Merged {
                fetched,
                pages,
                duplicates_dropped,
                persisted,
                ..
            } => {
                self.channels_fetched = self.channels_fetched.saturating_add(1);
                self.pages_fetched = self.pages_fetched.saturating_add(*pages);
                self.messages_fetched = self.messages_fetched.saturating_add(*fetched);
                self.duplicates_dropped =
                    self.duplicates_dropped.saturating_add(*duplicates_dropped);
                if !persisted {
                    self.cache_write_failures = self.cache_write_failures.saturating_add(1);
                }
            }
            ChannelRunOutcome::RateLimited => {
                self.channels_rate_limited = self.channels_rate_limited.saturating_add(1);
            }
            ChannelRunOutcome::Failed => {
                self.channels_failed = self.channels_failed.saturating_add(1);
            }
        }
    }
}

/// Folds a channel's merged history into the tally. Skipped channels add nothing.
pub fn tally_channel_outcome(tally: &mut UserMessageTally, outcome: &ChannelRunOutcome) {
    if let ChannelRunOutcome::Merged { record, .. } = outcome {
        tally.record_messages(&record.messages);
    }
}

/// Runs one full tally: cache load, channel walk, user join and report write.
pub async fn run_slack_history_tally(config: SlackHistoryTallyConfig) -> Result<TallyRunSummary> {
    let runtime = SlackHistoryTallyRuntime::new(config)?;
    runtime.run().await
}

struct SlackHistoryTallyRuntime {
    config: SlackHistoryTallyConfig,
    client: SlackApiClient,
    pacer: RequestPacer,
    cache_store: ChannelCacheStore,
}

impl SlackHistoryTallyRuntime {
    fn new(config: SlackHistoryTallyConfig) -> Result<Self> {
        if config.api_token.trim().is_empty() {
            bail!("slack api token is required");
        }
        if config.history_page_limit == 0 {
            bail!("history page limit must be greater than 0");
        }
        let client = SlackApiClient::new(
            &config.api_base,
            &config.api_token,
            config.request_timeout_ms,
        )?;
        let pacer = RequestPacer::new(config.sleeper.clone(), config.request_pacing);
        let cache_store = ChannelCacheStore::new(config.cache_dir.clone());
        Ok(Self {
            config,
            client,
            pacer,
            cache_store,
        })
    }

    async fn run(&self) -> Result<TallyRunSummary> {
        self.cache_store.ensure_root()?;
        let mut cached = self.cache_store.load_all()?;
        tracing::info!(
            cached_channels = cached.len(),
            cache_dir = %self.cache_store.root().display(),
            "channel cache loaded"
        );

        let channels =
            list_ranked_channels(&self.client, &self.pacer, self.config.channel_selection)
                .await
                .context("failed to list slack channels")?;
        tracing::info!(channels = channels.len(), "channels selected for history walk");

        let mut summary = TallyRunSummary {
            channels_selected: channels.len(),
            report_path: self.config.report_path.clone(),
            ..TallyRunSummary::default()
        };
        let mut tally = UserMessageTally::new();
        for channel in &channels {
            let outcome = self
                .process_channel(channel, cached.remove(&channel.id))
                .await;
            summary.record_channel(&outcome);
            tally_channel_outcome(&mut tally, &outcome);
        }

        let users = list_users(&self.client, &self.pacer)
            .await
            .context("failed to list slack users")?;
        let report = build_tally_report(&tally, &index_users(users));
        write_tally_report(&self.config.report_path, &report)?;
        summary.users_counted = report.len();

        tracing::info!(
            channels_selected = summary.channels_selected,
            channels_fetched = summary.channels_fetched,
            channels_rate_limited = summary.channels_rate_limited,
            channels_failed = summary.channels_failed,
            cache_write_failures = summary.cache_write_failures,
            pages_fetched = summary.pages_fetched,
            messages_fetched = summary.messages_fetched,
            duplicates_dropped = summary.duplicates_dropped,
            users_counted = summary.users_counted,
            report_path = %summary.report_path.display(),
            "slack history tally complete"
        );
        Ok(summary)
    }

    async fn process_channel(
        &self,
        channel: &SlackChannel,
        cached: Option<CachedChannelRecord>,
    ) -> ChannelRunOutcome {
        let existing = cached.unwrap_or_default();
        let oldest = existing.latest_ts().map(ToOwned::to_owned);
        let (fetch, stats) = fetch_channel_history(
            &self.client,
            &self.pacer,
            &channel.id,
            oldest.as_deref(),
            self.config.history_page_limit,
        )
        .await;

        match fetch {
            ChannelFetchOutcome::Fetched(messages) => {
                let fetched = messages.len();
                let merge = merge_channel_history(existing.messages, messages);
                let record =
                    CachedChannelRecord::new(ChannelMetadata::from(channel), merge.messages);
                let persisted = self.cache_store.save(&channel.id, &record);
                tracing::info!(
                    channel_id = %channel.id,
                    channel_name = %channel.name,
                    oldest = oldest.as_deref().unwrap_or(""),
                    pages = stats.pages,
                    fetched,
                    appended = merge.appended,
                    duplicates_dropped = merge.duplicates_dropped,
                    resorted = merge.resorted,
                    total = record.messages.len(),
                    "channel history merged"
                );
                ChannelRunOutcome::Merged {
                    record,
                    fetched,
                    pages: stats.pages,
                    duplicates_dropped: merge.duplicates_dropped,
                    persisted,
                }
            }
            ChannelFetchOutcome::RateLimited { retry_after } => {
                let retry_after = retry_after.unwrap_or(self.config.default_retry_after);
                tracing::warn!(
                    channel_id = %channel.id,
                    channel_name = %channel.name,
                    pages = stats.pages,
                    retry_after_ms = u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX),
                    "channel history rate limited; skipping channel for this run"
                );
                self.pacer.backoff(retry_after).await;
                ChannelRunOutcome::RateLimited
            }
            ChannelFetchOutcome::Failed(error) => {
                tracing::warn!(
                    channel_id = %channel.id,
                    channel_name = %channel.name,
                    pages = stats.pages,
                    error = %error,
                    "channel history fetch failed; skipping channel for this run"
                );
                ChannelRunOutcome::Failed
            }
        }
    }
}
