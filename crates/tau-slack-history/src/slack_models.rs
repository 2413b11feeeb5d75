//! Wire models for the Slack Web API payloads consumed by the history tally.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One message from `conversations.history`. Fields other than `user` and `ts`
/// are carried through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlackMessage {
    /// `None` when the key is absent, `Some(None)` for an explicit `null`.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_present"
    )]
    pub user: Option<Option<String>>,
    pub ts: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SlackMessage {
    pub fn new(user: Option<&str>, ts: &str) -> Self {
        Self {
            user: user.map(|user| Some(user.to_owned())),
            ts: ts.to_string(),
            extra: Map::new(),
        }
    }

    /// Author id, ignoring blank values.
    pub fn author(&self) -> Option<&str> {
        self.user
            .as_ref()
            .and_then(Option::as_deref)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackChannel {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub num_members: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackUser {
    pub id: String,
    #[serde(default)]
    pub real_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl SlackUser {
    pub fn display_name(&self) -> &str {
        [self.real_name.as_deref(), self.name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|value| !value.is_empty())
            .unwrap_or(self.id.as_str())
    }
}
