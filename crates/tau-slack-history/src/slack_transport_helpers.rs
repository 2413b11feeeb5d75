use std::{cmp::Ordering, time::Duration};

pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

pub(crate) fn is_rate_limited_status(status: u16) -> bool {
    status == 429
}

pub(crate) fn truncate_for_error(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut truncated = value.chars().take(max_chars).collect::<String>();
    truncated.push_str("...");
    truncated
}

/// Returns true when `raw` can be used verbatim as a single file name.
pub(crate) fn is_safe_path_component(raw: &str) -> bool {
    !raw.is_empty()
        && raw != "."
        && raw != ".."
        && !raw.starts_with('.')
        && raw
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.')
}

/// Orders Slack `ts` tokens (`"1512085950.000216"`) by seconds, then by the
/// fractional part. Non-numeric tokens sort after numeric ones, lexically.
pub fn compare_slack_ts(left: &str, right: &str) -> Ordering {
    match (split_slack_ts(left), split_slack_ts(right)) {
        (Some((left_secs, left_frac)), Some((right_secs, right_frac))) => left_secs
            .cmp(&right_secs)
            .then_with(|| compare_fraction(left_frac, right_frac))
            .then_with(|| left.cmp(right)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => left.cmp(right),
    }
}

fn split_slack_ts(raw: &str) -> Option<(u64, &str)> {
    let raw = raw.trim();
    let (secs, frac) = raw.split_once('.').unwrap_or((raw, ""));
    if secs.is_empty() || !frac.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    let secs = secs.parse::<u64>().ok()?;
    Some((secs, frac))
}

fn compare_fraction(left: &str, right: &str) -> Ordering {
    let width = left.len().max(right.len());
    let left = left.chars().chain(std::iter::repeat('0')).take(width);
    let right = right.chars().chain(std::iter::repeat('0')).take(width);
    left.cmp(right)
}
