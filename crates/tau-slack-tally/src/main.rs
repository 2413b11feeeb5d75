mod bootstrap_helpers;
mod cli_args;

use std::{process::ExitCode, sync::Arc, time::Duration};

use clap::Parser;
use tau_slack_history::{
    run_slack_history_tally, ChannelSelection, SlackHistoryTallyConfig, TokioSleeper,
};

use crate::bootstrap_helpers::init_tracing;
use crate::cli_args::Cli;

fn build_tally_config(cli: Cli) -> SlackHistoryTallyConfig {
    SlackHistoryTallyConfig {
        api_base: cli.slack_api_base,
        api_token: cli.slack_api_token,
        cache_dir: cli.cache_dir,
        report_path: cli.report_path,
        channel_selection: ChannelSelection {
            min_members_exclusive: cli.min_channel_members,
            max_channels: cli.max_channels,
        },
        history_page_limit: cli.history_page_limit,
        request_pacing: Duration::from_millis(cli.request_pacing_ms),
        default_retry_after: Duration::from_millis(cli.default_retry_after_ms),
        request_timeout_ms: cli.request_timeout_ms,
        sleeper: Arc::new(TokioSleeper),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run_slack_history_tally(build_tally_config(cli)).await {
        Ok(summary) => {
            println!(
                "slack history tally: channels={} fetched={} rate_limited={} failed={} cache_write_failures={} users={} report={}",
                summary.channels_selected,
                summary.channels_fetched,
                summary.channels_rate_limited,
                summary.channels_failed,
                summary.cache_write_failures,
                summary.users_counted,
                summary.report_path.display()
            );
            ExitCode::SUCCESS
        }
        Err(error) => {
            tracing::error!(error = %format!("{error:#}"), "slack history tally failed");
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}
