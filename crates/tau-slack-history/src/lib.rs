//! Slack history tally crate for Tau workspace analytics.
//!
//! Walks `conversations.history` for the busiest channels, keeps an
//! incremental per-channel cache on disk and writes a per-user message count
//! report annotated with user names.

mod atomic_io;
pub mod history_runtime;
pub mod pacing;
pub mod slack_models;
mod slack_transport_helpers;

pub use history_runtime::{
    run_slack_history_tally, ChannelSelection, SlackHistoryTallyConfig, TallyRunSummary,
};
pub use pacing::{RequestPacer, Sleeper, TokioSleeper};
pub use slack_transport_helpers::compare_slack_ts;
