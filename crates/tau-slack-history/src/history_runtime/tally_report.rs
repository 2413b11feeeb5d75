use std::{collections::HashMap, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::atomic_io::write_json_atomic;
use crate::slack_models::SlackUser;

use super::history_merge::UserMessageTally;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportUser {
    pub id: String,
    pub name: String,
}

/// One row of the final report. `user` is `None` when the directory has no
/// entry for `user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyReportEntry {
    pub user: Option<ReportUser>,
    pub user_id: String,
    pub count: u64,
}

/// Joins counts with user names and orders rows by count descending. Equal
/// counts keep the tally's user-id order.
pub fn build_tally_report(
    tally: &UserMessageTally,
    users: &HashMap<String, SlackUser>,
) -> Vec<TallyReportEntry> {
    let mut entries = tally
        .iter()
        .map(|(user_id, count)| TallyReportEntry {
            user: users.get(user_id).map(|user| ReportUser {
                id: user.id.clone(),
                name: user.display_name().to_string(),
            }),
            user_id: user_id.to_string(),
            count,
        })
        .collect::<Vec<_>>();
    entries.sort_by(|left, right| right.count.cmp(&left.count));
    entries
}

pub fn write_tally_report(path: &Path, entries: &[TallyReportEntry]) -> Result<()> {
    write_json_atomic(path, entries)
        .with_context(|| format!("failed to write tally report {}", path.display()))
}
