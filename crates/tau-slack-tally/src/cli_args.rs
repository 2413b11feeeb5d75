use std::path::PathBuf;

use clap::Parser;
use tau_slack_history::history_runtime::{
    DEFAULT_HISTORY_PAGE_LIMIT, DEFAULT_MIN_MEMBERS_EXCLUSIVE, DEFAULT_REQUEST_PACING_MS,
    DEFAULT_RETRY_AFTER_MS,
};

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "tau-slack-tally",
    about = "Count Slack messages per user across the busiest channels, with an incremental per-channel cache",
    version
)]
pub(crate) struct Cli {
    #[arg(
        long = "slack-api-token",
        env = "TAU_SLACK_API_TOKEN",
        hide_env_values = true,
        help = "Slack Web API token sent with every request"
    )]
    pub(crate) slack_api_token: String,

    #[arg(
        long = "slack-api-base",
        env = "TAU_SLACK_API_BASE",
        default_value = "https://slack.com/api",
        help = "Slack Web API base URL"
    )]
    pub(crate) slack_api_base: String,

    #[arg(
        long = "cache-dir",
        env = "TAU_SLACK_HISTORY_CACHE_DIR",
        default_value = "tmp/channels",
        help = "Directory holding one cached history record per channel"
    )]
    pub(crate) cache_dir: PathBuf,

    #[arg(
        long = "report-path",
        env = "TAU_SLACK_HISTORY_REPORT_PATH",
        default_value = "tmp/history_all_users.json",
        help = "Destination of the per-user message count report"
    )]
    pub(crate) report_path: PathBuf,

    #[arg(
        long = "min-channel-members",
        env = "TAU_SLACK_HISTORY_MIN_CHANNEL_MEMBERS",
        default_value_t = DEFAULT_MIN_MEMBERS_EXCLUSIVE,
        help = "Only walk channels with strictly more members than this"
    )]
    pub(crate) min_channel_members: u64,

    #[arg(
        long = "max-channels",
        env = "TAU_SLACK_HISTORY_MAX_CHANNELS",
        value_parser = parse_positive_usize,
        help = "Only walk the top-N channels by member count (default: all)"
    )]
    pub(crate) max_channels: Option<usize>,

    #[arg(
        long = "history-page-limit",
        env = "TAU_SLACK_HISTORY_PAGE_LIMIT",
        default_value_t = DEFAULT_HISTORY_PAGE_LIMIT,
        value_parser = parse_positive_usize,
        help = "Messages requested per conversations.history page"
    )]
    pub(crate) history_page_limit: usize,

    #[arg(
        long = "request-pacing-ms",
        env = "TAU_SLACK_HISTORY_REQUEST_PACING_MS",
        default_value_t = DEFAULT_REQUEST_PACING_MS,
        help = "Fixed delay before every Slack API request"
    )]
    pub(crate) request_pacing_ms: u64,

    #[arg(
        long = "default-retry-after-ms",
        env = "TAU_SLACK_HISTORY_DEFAULT_RETRY_AFTER_MS",
        default_value_t = DEFAULT_RETRY_AFTER_MS,
        help = "Backoff used when a rate-limited response has no usable retry-after header"
    )]
    pub(crate) default_retry_after_ms: u64,

    #[arg(
        long = "request-timeout-ms",
        env = "TAU_SLACK_HISTORY_REQUEST_TIMEOUT_MS",
        default_value_t = 30_000,
        value_parser = parse_positive_u64,
        help = "HTTP timeout per Slack API request"
    )]
    pub(crate) request_timeout_ms: u64,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::Cli;

    #[test]
    fn unit_cli_defaults_match_history_runtime_defaults() {
        let cli = Cli::try_parse_from(["tau-slack-tally", "--slack-api-token", "xoxb-test"])
            .expect("parse");
        assert_eq!(cli.slack_api_base, "https://slack.com/api");
        assert_eq!(cli.cache_dir.to_str(), Some("tmp/channels"));
        assert_eq!(cli.report_path.to_str(), Some("tmp/history_all_users.json"));
        assert_eq!(cli.min_channel_members, 2);
        assert_eq!(cli.max_channels, None);
        assert_eq!(cli.history_page_limit, 1_000);
        assert_eq!(cli.request_pacing_ms, 1_000);
    }

    #[test]
    fn regression_cli_rejects_zero_page_limit_and_zero_max_channels() {
        for args in [
            ["tau-slack-tally", "--slack-api-token=x", "--history-page-limit=0"],
            ["tau-slack-tally", "--slack-api-token=x", "--max-channels=0"],
        ] {
            let error = Cli::try_parse_from(args).expect_err("zero rejected");
            assert!(error.to_string().contains("value must be greater than 0"));
        }
    }

    #[test]
    fn unit_cli_accepts_top_five_policy() {
        let cli = Cli::try_parse_from([
            "tau-slack-tally",
            "--slack-api-token",
            "xoxb-test",
            "--max-channels",
            "5",
        ])
        .expect("parse");
        assert_eq!(cli.max_channels, Some(5));
    }
}
