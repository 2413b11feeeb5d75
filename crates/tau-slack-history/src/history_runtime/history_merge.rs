//! Merge of freshly fetched history into a cached channel record, and the
//! per-user message tally folded from merged records.
//!
//! Fetches request only messages newer than the last cached `ts`, so the
//! common case is a plain append of the sorted batch. Messages whose
//! (`ts`, `user`) key is already present are dropped. When a surviving message
//! is not strictly newer than the cached tail the union is re-sorted instead.

use std::collections::{BTreeMap, HashSet};

use crate::slack_models::SlackMessage;
use crate::slack_transport_helpers::compare_slack_ts;

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub messages: Vec<SlackMessage>,
    pub appended: usize,
    pub duplicates_dropped: usize,
    pub resorted: bool,
}

fn dedup_key(message: &SlackMessage) -> (String, Option<String>) {
    (message.ts.clone(), message.user.clone().flatten())
}

pub(crate) fn sort_messages_by_ts(messages: &mut [SlackMessage]) {
    messages.sort_by(|left, right| compare_slack_ts(&left.ts, &right.ts));
}

/// Combines cached messages (ascending) with a fetched batch in API order.
pub fn merge_channel_history(
    existing: Vec<SlackMessage>,
    mut fetched: Vec<SlackMessage>,
) -> MergeOutcome {
    sort_messages_by_ts(&mut fetched);

    let mut seen = existing.iter().map(dedup_key).collect::<HashSet<_>>();
    let fetched_len = fetched.len();
    let fresh = fetched
        .into_iter()
        .filter(|message| seen.insert(dedup_key(message)))
        .collect::<Vec<_>>();
    let duplicates_dropped = fetched_len - fresh.len();
    let appended = fresh.len();

    let out_of_order = match (existing.last(), fresh.first()) {
        (Some(tail), Some(head)) => compare_slack_ts(&head.ts, &tail.ts).is_le(),
        _ => false,
    };

    let mut messages = existing;
    messages.extend(fresh);
    if out_of_order {
        sort_messages_by_ts(&mut messages);
    }

    MergeOutcome {
        messages,
        appended,
        duplicates_dropped,
        resorted: out_of_order,
    }
}

/// Running message count per user id, ordered by user id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserMessageTally {
    counts: BTreeMap<String, u64>,
}

impl UserMessageTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one to the author's count for every authored message.
    pub fn record_messages(&mut self, messages: &[SlackMessage]) {
        for author in messages.iter().filter_map(SlackMessage::author) {
            let count = self.counts.entry(author.to_string()).or_insert(0);
            *count = count.saturating_add(1);
        }
    }

    pub fn count_for(&self, user_id: &str) -> u64 {
        self.counts.get(user_id).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts
            .iter()
            .map(|(user_id, count)| (user_id.as_str(), *count))
    }
}

#[cfg(test)]
mod tests {
    use super::{merge_channel_history, UserMessageTally};
    use crate::slack_models::SlackMessage;

    fn message(user: &str, ts: &str) -> SlackMessage {
        SlackMessage::new(Some(user), ts)
    }

    fn timestamps(messages: &[SlackMessage]) -> Vec<&str> {
        messages.iter().map(|message| message.ts.as_str()).collect()
    }

    #[test]
    fn unit_merge_sorts_fetched_batch_for_cold_channel() {
        let outcome =
            merge_channel_history(Vec::new(), vec![message("U1", "2"), message("U1", "1")]);
        assert_eq!(timestamps(&outcome.messages), vec!["1", "2"]);
        assert_eq!(outcome.appended, 2);
        assert_eq!(outcome.duplicates_dropped, 0);
        assert!(!outcome.resorted);
    }

    #[test]
    fn unit_merge_appends_newer_messages_after_cached_tail() {
        let existing = vec![message("U1", "1"), message("U2", "3")];
        let fetched = vec![message("U3", "5"), message("U1", "4")];
        let outcome = merge_channel_history(existing, fetched);
        assert_eq!(timestamps(&outcome.messages), vec!["1", "3", "4", "5"]);
        assert_eq!(outcome.appended, 2);
        assert!(!outcome.resorted);
    }

    #[test]
    fn regression_merge_drops_messages_already_cached_by_inclusive_cursor() {
        let existing = vec![message("U1", "1"), message("U1", "2")];
        let fetched = vec![message("U2", "3"), message("U1", "2")];
        let outcome = merge_channel_history(existing, fetched);
        assert_eq!(timestamps(&outcome.messages), vec!["1", "2", "3"]);
        assert_eq!(outcome.duplicates_dropped, 1);
        assert_eq!(outcome.appended, 1);
        assert!(!outcome.resorted);
    }

    #[test]
    fn regression_merge_resorts_when_fetched_message_predates_cached_tail() {
        let existing = vec![message("U1", "1"), message("U1", "5")];
        let fetched = vec![message("U2", "3"), message("U2", "6")];
        let outcome = merge_channel_history(existing, fetched);
        assert_eq!(timestamps(&outcome.messages), vec!["1", "3", "5", "6"]);
        assert!(outcome.resorted);
    }

    #[test]
    fn regression_merge_keeps_distinct_authors_sharing_a_timestamp() {
        let existing = vec![message("U1", "1")];
        let fetched = vec![message("U2", "1")];
        let outcome = merge_channel_history(existing, fetched);
        assert_eq!(outcome.messages.len(), 2);
        assert_eq!(outcome.duplicates_dropped, 0);
    }

    #[test]
    fn unit_merge_of_empty_inputs_is_empty() {
        let outcome = merge_channel_history(Vec::new(), Vec::new());
        assert!(outcome.messages.is_empty());
        assert_eq!(outcome.appended, 0);

        let mut tally = UserMessageTally::new();
        tally.record_messages(&outcome.messages);
        assert!(tally.is_empty());
    }

    #[test]
    fn unit_tally_counts_authored_messages_and_skips_authorless() {
        let mut tally = UserMessageTally::new();
        tally.record_messages(&[
            message("U1", "1"),
            message("U2", "2"),
            message("U1", "3"),
            SlackMessage::new(None, "4"),
        ]);
        tally.record_messages(&[message("U2", "5")]);
        assert_eq!(tally.count_for("U1"), 2);
        assert_eq!(tally.count_for("U2"), 2);
        assert_eq!(tally.count_for("U3"), 0);
        assert_eq!(tally.len(), 2);
        assert_eq!(
            tally.iter().collect::<Vec<_>>(),
            vec![("U1", 2), ("U2", 2)]
        );
    }
}
