#![no_main]

use libfuzzer_sys::fuzz_target;
use tau_slack_history::compare_slack_ts;
use tau_slack_history::history_runtime::merge_channel_history;
use tau_slack_history::slack_models::SlackMessage;

fn decode_messages(raw: &str) -> Vec<SlackMessage> {
    raw.split(',')
        .filter_map(|item| item.split_once(':'))
        .map(|(user, ts)| SlackMessage::new(Some(user), ts))
        .collect()
}

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    let (existing, fetched) = raw.split_once('|').unwrap_or((raw.as_ref(), ""));
    let mut existing = decode_messages(existing);
    existing.sort_by(|left, right| compare_slack_ts(&left.ts, &right.ts));
    let fetched = decode_messages(fetched);

    let outcome = merge_channel_history(existing.clone(), fetched.clone());
    assert!(outcome
        .messages
        .windows(2)
        .all(|pair| compare_slack_ts(&pair[0].ts, &pair[1].ts).is_le()));
    assert_eq!(outcome.messages.len(), existing.len() + outcome.appended);
    assert_eq!(outcome.appended + outcome.duplicates_dropped, fetched.len());
});
