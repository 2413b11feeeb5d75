use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::atomic_io::{current_unix_timestamp_ms, write_json_atomic};
use crate::slack_models::{SlackChannel, SlackMessage};
use crate::slack_transport_helpers::is_safe_path_component;

use super::CHANNEL_CACHE_SCHEMA_VERSION;

const CACHE_FILE_EXTENSION: &str = "json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMetadata {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub num_members: u64,
}

impl From<&SlackChannel> for ChannelMetadata {
    fn from(channel: &SlackChannel) -> Self {
        Self {
            id: channel.id.clone(),
            name: channel.name.clone(),
            num_members: channel.num_members,
        }
    }
}

/// Persisted history of one channel. `messages` is ascending by `ts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedChannelRecord {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub channel: Option<ChannelMetadata>,
    #[serde(default)]
    pub messages: Vec<SlackMessage>,
    #[serde(default)]
    pub updated_unix_ms: u64,
}

fn default_schema_version() -> u32 {
    CHANNEL_CACHE_SCHEMA_VERSION
}

impl Default for CachedChannelRecord {
    fn default() -> Self {
        Self {
            schema_version: CHANNEL_CACHE_SCHEMA_VERSION,
            channel: None,
            messages: Vec::new(),
            updated_unix_ms: 0,
        }
    }
}

impl CachedChannelRecord {
    pub fn new(channel: ChannelMetadata, messages: Vec<SlackMessage>) -> Self {
        Self {
            schema_version: CHANNEL_CACHE_SCHEMA_VERSION,
            channel: Some(channel),
            messages,
            updated_unix_ms: current_unix_timestamp_ms(),
        }
    }

    /// `ts` of the newest cached message; used as the `oldest` marker of the next fetch.
    pub fn latest_ts(&self) -> Option<&str> {
        self.messages.last().map(|message| message.ts.as_str())
    }
}

/// Parses a cache file body. Corrupt or unsupported payloads yield `None`.
pub fn parse_cached_channel_record(raw: &str) -> Option<CachedChannelRecord> {
    let record = serde_json::from_str::<CachedChannelRecord>(raw).ok()?;
    (record.schema_version == CHANNEL_CACHE_SCHEMA_VERSION).then_some(record)
}

/// One JSON file per channel under `root`, named by channel id.
#[derive(Debug, Clone)]
pub struct ChannelCacheStore {
    root: PathBuf,
}

impl ChannelCacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn record_path(&self, channel_id: &str) -> PathBuf {
        self.root.join(format!("{channel_id}.{CACHE_FILE_EXTENSION}"))
    }

    pub fn ensure_root(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create {}", self.root.display()))
    }

    /// Reads every `*.json` record. Unreadable entries become empty records.
    pub fn load_all(&self) -> Result<BTreeMap<String, CachedChannelRecord>> {
        let mut records = BTreeMap::new();
        if !self.root.exists() {
            return Ok(records);
        }
        let entries = std::fs::read_dir(&self.root)
            .with_context(|| format!("failed to read {}", self.root.display()))?;
        for entry in entries {
            let entry =
                entry.with_context(|| format!("failed to read {}", self.root.display()))?;
            let path = entry.path();
            if !path.is_file()
                || path.extension().and_then(|ext| ext.to_str()) != Some(CACHE_FILE_EXTENSION)
            {
                continue;
            }
            let Some(channel_id) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .filter(|stem| is_safe_path_component(stem))
            else {
                continue;
            };

            let record = match std::fs::read_to_string(&path) {
                Ok(raw) => parse_cached_channel_record(&raw).unwrap_or_else(|| {
                    tracing::warn!(
                        path = %path.display(),
                        "ignoring unparsable channel cache record"
                    );
                    CachedChannelRecord::default()
                }),
                Err(error) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %error,
                        "ignoring unreadable channel cache record"
                    );
                    CachedChannelRecord::default()
                }
            };
            records.insert(channel_id.to_string(), record);
        }
        Ok(records)
    }

    pub fn try_save(&self, channel_id: &str, record: &CachedChannelRecord) -> Result<()> {
        if !is_safe_path_component(channel_id) {
            bail!("channel id '{channel_id}' is not a valid cache key");
        }
        let path = self.record_path(channel_id);
        write_json_atomic(&path, record)
            .with_context(|| format!("failed to write channel cache {}", path.display()))
    }

    /// Overwrites the channel's record. Failures are logged, never propagated.
    pub fn save(&self, channel_id: &str, record: &CachedChannelRecord) -> bool {
        match self.try_save(channel_id, record) {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(
                    channel_id,
                    error = %format!("{error:#}"),
                    "channel cache write failed"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::tempdir;

    use super::{
        parse_cached_channel_record, CachedChannelRecord, ChannelCacheStore, ChannelMetadata,
    };
    use crate::slack_models::SlackMessage;

    fn metadata(id: &str) -> ChannelMetadata {
        ChannelMetadata {
            id: id.to_string(),
            name: "general".to_string(),
            num_members: 5,
        }
    }

    #[test]
    fn functional_save_then_load_all_round_trips_records_by_channel_id() {
        let temp = tempdir().expect("tempdir");
        let store = ChannelCacheStore::new(temp.path().join("channels"));
        let record = CachedChannelRecord::new(
            metadata("C1"),
            vec![
                SlackMessage::new(Some("U1"), "1"),
                SlackMessage::new(Some("U2"), "2"),
            ],
        );
        assert!(store.save("C1", &record));
        assert!(store.record_path("C1").exists());

        let loaded = store.load_all().expect("load");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["C1"], record);
        assert_eq!(loaded["C1"].latest_ts(), Some("2"));
    }

    #[test]
    fn regression_load_all_treats_corrupt_records_as_empty() {
        let temp = tempdir().expect("tempdir");
        let store = ChannelCacheStore::new(temp.path());
        std::fs::write(temp.path().join("C1.json"), "{not json").expect("write corrupt");
        std::fs::write(temp.path().join("C2.json"), "{}").expect("write empty");
        std::fs::write(temp.path().join("notes.txt"), "ignored").expect("write other");
        std::fs::write(temp.path().join(".C3.json.tmp-1-1"), "{}").expect("write temp");

        let loaded = store.load_all().expect("load");
        assert_eq!(loaded.keys().collect::<Vec<_>>(), vec!["C1", "C2"]);
        assert_eq!(loaded["C1"], CachedChannelRecord::default());
        assert_eq!(loaded["C2"], CachedChannelRecord::default());
        assert_eq!(loaded["C1"].latest_ts(), None);
    }

    #[test]
    fn unit_load_all_for_missing_directory_is_empty() {
        let temp = tempdir().expect("tempdir");
        let store = ChannelCacheStore::new(temp.path().join("missing"));
        assert!(store.load_all().expect("load").is_empty());
    }

    #[test]
    fn regression_save_failure_is_swallowed() {
        let temp = tempdir().expect("tempdir");
        let store = ChannelCacheStore::new(temp.path());
        std::fs::create_dir_all(store.record_path("C1")).expect("block record path");
        assert!(!store.save("C1", &CachedChannelRecord::default()));
        assert!(!store.save("../escape", &CachedChannelRecord::default()));
        assert!(store.try_save("../escape", &CachedChannelRecord::default()).is_err());
    }

    #[test]
    fn unit_parse_cached_channel_record_rejects_unknown_schema() {
        let raw = json!({"schema_version": 99, "messages": []}).to_string();
        assert_eq!(parse_cached_channel_record(&raw), None);

        let legacy = json!({"messages": [{"user": "U1", "ts": "1", "text": "hi"}]}).to_string();
        let record = parse_cached_channel_record(&legacy).expect("defaults schema");
        assert_eq!(record.messages.len(), 1);
        assert_eq!(record.messages[0].extra["text"], "hi");
    }
}
