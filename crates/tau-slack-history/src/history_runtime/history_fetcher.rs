//! Cursor-paginated walk over `conversations.history` for one channel.

use std::time::Duration;

use crate::pacing::RequestPacer;
use crate::slack_models::SlackMessage;

use super::slack_api_client::{HistoryPageRequest, SlackApiClient, SlackApiError};

/// Result of walking one channel's history. Only `Fetched` may be merged.
#[derive(Debug)]
pub enum ChannelFetchOutcome {
    Fetched(Vec<SlackMessage>),
    RateLimited { retry_after: Option<Duration> },
    Failed(SlackApiError),
}

#[derive(Debug, Clone, Copy, Default)]
pub(super) struct HistoryFetchStats {
    pub(super) pages: usize,
}

pub(super) async fn fetch_channel_history(
    client: &SlackApiClient,
    pacer: &RequestPacer,
    channel_id: &str,
    oldest: Option<&str>,
    page_limit: usize,
) -> (ChannelFetchOutcome, HistoryFetchStats) {
    let mut stats = HistoryFetchStats::default();
    let mut messages = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        pacer.pace().await;
        let request = HistoryPageRequest {
            channel_id,
            oldest,
            cursor: cursor.as_deref(),
            limit: page_limit,
            page_index: stats.pages,
        };
        let page = match client.conversations_history(request).await {
            Ok(page) => page,
            Err(SlackApiError::RateLimited { retry_after, .. }) => {
                return (ChannelFetchOutcome::RateLimited { retry_after }, stats);
            }
            Err(error) => return (ChannelFetchOutcome::Failed(error), stats),
        };
        stats.pages = stats.pages.saturating_add(1);
        messages.extend(page.messages);

        if !page.has_more {
            break;
        }
        match page.next_cursor {
            Some(next_cursor) if cursor.as_deref() == Some(next_cursor.as_str()) => {
                tracing::warn!(
                    channel_id,
                    pages = stats.pages,
                    cursor = %next_cursor,
                    "history page repeated its cursor; stopping pagination"
                );
                break;
            }
            Some(next_cursor) => cursor = Some(next_cursor),
            None => {
                tracing::warn!(
                    channel_id,
                    pages = stats.pages,
                    "history page reported has_more without next_cursor; stopping pagination"
                );
                break;
            }
        }
    }

    (ChannelFetchOutcome::Fetched(messages), stats)
}
