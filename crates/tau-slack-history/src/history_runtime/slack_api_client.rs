//! Slack Web API client for the history, channel and user endpoints.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::slack_models::{SlackChannel, SlackMessage, SlackUser};
use crate::slack_transport_helpers::{is_rate_limited_status, parse_retry_after, truncate_for_error};

pub(super) const HISTORY_PAGE_HEADER: &str = "x-tau-history-page";

/// Failures surfaced by a single Slack Web API call.
#[derive(Debug, Error)]
pub enum SlackApiError {
    #[error("slack api {operation} rate limited (retry-after: {retry_after:?})")]
    RateLimited {
        operation: String,
        retry_after: Option<Duration>,
    },
    #[error("slack api {operation} failed with status {status}: {body}")]
    HttpStatus {
        operation: String,
        status: u16,
        body: String,
    },
    #[error("slack api {operation} request failed: {source}")]
    Transport {
        operation: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to decode slack {operation}: {source}")]
    Decode {
        operation: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("slack {operation} failed: {error}")]
    Api { operation: String, error: String },
}

#[derive(Debug, Deserialize)]
struct SlackEnvelope<T> {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    payload: T,
}

#[derive(Debug, Default, Deserialize)]
struct SlackResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SlackHistoryPayload {
    #[serde(default)]
    messages: Vec<SlackMessage>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    response_metadata: Option<SlackResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct SlackChannelListPayload {
    #[serde(default)]
    channels: Vec<SlackChannel>,
}

#[derive(Debug, Deserialize)]
struct SlackUserListPayload {
    #[serde(default)]
    members: Vec<SlackUser>,
}

#[derive(Debug, Clone, Copy)]
pub(super) struct HistoryPageRequest<'a> {
    pub(super) channel_id: &'a str,
    pub(super) oldest: Option<&'a str>,
    pub(super) cursor: Option<&'a str>,
    pub(super) limit: usize,
    pub(super) page_index: usize,
}

#[derive(Debug, Clone)]
pub(super) struct SlackHistoryPage {
    pub(super) messages: Vec<SlackMessage>,
    pub(super) has_more: bool,
    pub(super) next_cursor: Option<String>,
}

#[derive(Clone)]
pub(super) struct SlackApiClient {
    http: reqwest::Client,
    api_base: String,
    api_token: String,
}

impl SlackApiClient {
    pub(super) fn new(api_base: &str, api_token: &str, request_timeout_ms: u64) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("tau-slack-history"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()
            .context("failed to create slack api client")?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_token: api_token.trim().to_string(),
        })
    }

    pub(super) async fn conversations_history(
        &self,
        request: HistoryPageRequest<'_>,
    ) -> Result<SlackHistoryPage, SlackApiError> {
        let mut form = vec![
            ("token", self.api_token.clone()),
            ("channel", request.channel_id.to_string()),
            ("limit", request.limit.max(1).to_string()),
        ];
        if let Some(oldest) = request.oldest {
            form.push(("oldest", oldest.to_string()));
        }
        if let Some(cursor) = request.cursor {
            form.push(("cursor", cursor.to_string()));
        }

        let payload: SlackHistoryPayload = self
            .request_json(
                "conversations.history",
                self.http
                    .post(format!("{}/conversations.history", self.api_base))
                    .header(HISTORY_PAGE_HEADER, request.page_index.to_string())
                    .form(&form),
            )
            .await?;

        let next_cursor = payload
            .response_metadata
            .and_then(|metadata| metadata.next_cursor)
            .map(|cursor| cursor.trim().to_string())
            .filter(|cursor| !cursor.is_empty());
        Ok(SlackHistoryPage {
            messages: payload.messages,
            has_more: payload.has_more,
            next_cursor,
        })
    }

    pub(super) async fn list_channels(&self) -> Result<Vec<SlackChannel>, SlackApiError> {
        let form = [
            ("token", self.api_token.clone()),
            ("exclude_archived", "true".to_string()),
            ("limit", "1000".to_string()),
        ];
        let payload: SlackChannelListPayload = self
            .request_json(
                "conversations.list",
                self.http
                    .post(format!("{}/conversations.list", self.api_base))
                    .form(&form),
            )
            .await?;
        Ok(payload.channels)
    }

    pub(super) async fn list_users(&self) -> Result<Vec<SlackUser>, SlackApiError> {
        let form = [("token", self.api_token.clone())];
        let payload: SlackUserListPayload = self
            .request_json(
                "users.list",
                self.http
                    .post(format!("{}/users.list", self.api_base))
                    .form(&form),
            )
            .await?;
        Ok(payload.members)
    }

    async fn request_json<T>(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, SlackApiError>
    where
        T: DeserializeOwned,
    {
        let response = request
            .send()
            .await
            .map_err(|source| SlackApiError::Transport {
                operation: operation.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            if is_rate_limited_status(status.as_u16()) {
                return Err(SlackApiError::RateLimited {
                    operation: operation.to_string(),
                    retry_after: parse_retry_after(response.headers()),
                });
            }
            let body = response.text().await.unwrap_or_default();
            return Err(SlackApiError::HttpStatus {
                operation: operation.to_string(),
                status: status.as_u16(),
                body: truncate_for_error(&body, 800),
            });
        }

        let envelope = response
            .json::<SlackEnvelope<T>>()
            .await
            .map_err(|source| SlackApiError::Decode {
                operation: operation.to_string(),
                source,
            })?;
        if !envelope.ok {
            return Err(SlackApiError::Api {
                operation: operation.to_string(),
                error: envelope
                    .error
                    .unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        Ok(envelope.payload)
    }
}
