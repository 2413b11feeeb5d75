//! Channel ranking and user directory lookups.

use std::collections::HashMap;

use crate::pacing::RequestPacer;
use crate::slack_models::{SlackChannel, SlackUser};

use super::slack_api_client::{SlackApiClient, SlackApiError};

pub const DEFAULT_MIN_MEMBERS_EXCLUSIVE: u64 = 2;

/// Which channels a run walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSelection {
    /// Channels need strictly more members than this.
    pub min_members_exclusive: u64,
    /// Keep only the top-N channels after ranking; `None` keeps all.
    pub max_channels: Option<usize>,
}

impl Default for ChannelSelection {
    fn default() -> Self {
        Self {
            min_members_exclusive: DEFAULT_MIN_MEMBERS_EXCLUSIVE,
            max_channels: None,
        }
    }
}

/// Filters by member count, then orders by member count descending. Ties keep
/// listing order.
pub fn rank_channels(
    channels: Vec<SlackChannel>,
    selection: ChannelSelection,
) -> Vec<SlackChannel> {
    let mut ranked = channels
        .into_iter()
        .filter(|channel| channel.num_members > selection.min_members_exclusive)
        .collect::<Vec<_>>();
    ranked.sort_by(|left, right| right.num_members.cmp(&left.num_members));
    if let Some(max_channels) = selection.max_channels {
        ranked.truncate(max_channels);
    }
    ranked
}

pub(super) async fn list_ranked_channels(
    client: &SlackApiClient,
    pacer: &RequestPacer,
    selection: ChannelSelection,
) -> Result<Vec<SlackChannel>, SlackApiError> {
    pacer.pace().await;
    let channels = client.list_channels().await?;
    let listed = channels.len();
    let ranked = rank_channels(channels, selection);
    tracing::info!(listed, selected = ranked.len(), "channel directory loaded");
    Ok(ranked)
}

pub(super) async fn list_users(
    client: &SlackApiClient,
    pacer: &RequestPacer,
) -> Result<Vec<SlackUser>, SlackApiError> {
    pacer.pace().await;
    let users = client.list_users().await?;
    tracing::info!(users = users.len(), "user directory loaded");
    Ok(users)
}

/// Indexes users by id; the first entry wins on duplicate ids.
pub(super) fn index_users(users: Vec<SlackUser>) -> HashMap<String, SlackUser> {
    let mut index = HashMap::with_capacity(users.len());
    for user in users {
        index.entry(user.id.clone()).or_insert(user);
    }
    index
}
