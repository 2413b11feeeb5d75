#![no_main]

use libfuzzer_sys::fuzz_target;
use tau_slack_history::history_runtime::parse_cached_channel_record;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    let Some(record) = parse_cached_channel_record(&raw) else {
        return;
    };
    let reencoded = serde_json::to_string(&record).expect("record re-encodes");
    let reparsed = parse_cached_channel_record(&reencoded).expect("re-encoded record parses");
    assert_eq!(reparsed.messages.len(), record.messages.len());
    assert_eq!(reparsed.latest_ts(), record.latest_ts());
});
