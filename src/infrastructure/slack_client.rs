//! Slack Web API client.
//!
//! Every operation is a blocking HTTP call. One export owns one client and
//! issues its calls strictly one after another.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, trace};

use crate::domain::{AppError, Channel, Message, Result, User};

/// User-Agent sent with every request.
pub const USER_AGENT: &str = concat!("slacker-cli/", env!("CARGO_PKG_VERSION"));

/// Per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Page size used for directory-style listings.
const LIST_LIMIT: u32 = 1000;

/// Fallback when a 429 response carries no usable `Retry-After`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 30;

/// One page of channel history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryPage {
    pub messages: Vec<Message>,
    /// Cursor for the next page. `None` on the last page.
    pub next_cursor: Option<String>,
}

/// Remote source of channel data.
pub trait SlackApi {
    /// Channels the authenticated user is a member of.
    ///
    /// # Errors
    /// Returns an error if the listing cannot be fetched.
    fn list_channels(&self) -> Result<Vec<Channel>>;

    /// One page of a channel's top-level history.
    ///
    /// # Errors
    /// Returns an error if the page cannot be fetched.
    fn channel_history(
        &self,
        channel_id: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<HistoryPage>;

    /// Every message of a thread, possibly including the parent.
    ///
    /// # Errors
    /// Returns an error if the replies cannot be fetched.
    fn thread_replies(&self, channel_id: &str, thread_ts: &str) -> Result<Vec<Message>>;

    /// The full workspace user directory.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be fetched.
    fn list_users(&self) -> Result<Vec<User>>;
}

/// Identity behind a token, as reported by `auth.test`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AuthIdentity {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub team: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChannelsPayload {
    #[serde(default)]
    channels: Vec<Channel>,
}

#[derive(Debug, Default, Deserialize)]
struct MessagesPayload {
    #[serde(default)]
    messages: Vec<Message>,
}

#[derive(Debug, Default, Deserialize)]
struct MembersPayload {
    #[serde(default)]
    members: Vec<User>,
}

/// Decode a Web API response body into its payload and next cursor.
fn decode_envelope<T: DeserializeOwned>(method: &str, body: &str) -> Result<(T, Option<String>)> {
    let value: serde_json::Value = serde_json::from_str(body).map_err(AppError::json_parse)?;
    let envelope: Envelope =
        serde_json::from_value(value.clone()).map_err(AppError::json_parse)?;

    if !envelope.ok {
        return Err(AppError::SlackApi {
            method: method.to_string(),
            code: envelope.error.unwrap_or_else(|| "unknown_error".to_string()),
        });
    }

    let payload: T = serde_json::from_value(value).map_err(AppError::json_parse)?;
    let next_cursor = envelope
        .response_metadata
        .and_then(|meta| meta.next_cursor)
        .filter(|cursor| !cursor.is_empty());

    Ok((payload, next_cursor))
}

/// Slack Web API client over blocking `reqwest`.
pub struct SlackClient {
    http: Client,
    token: String,
    base_url: String,
}

impl SlackClient {
    /// Create a client for `token` against `base_url`.
    ///
    /// # Errors
    /// Returns an error if the token is empty or the HTTP client cannot be built.
    pub fn new(token: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(AppError::Config {
                message: "Slack token is empty".to_string(),
            });
        }

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(AppError::http)?;

        Ok(Self {
            http,
            token,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Verify the token and report who it belongs to.
    ///
    /// # Errors
    /// Returns an error if the token is rejected or Slack is unreachable.
    pub fn test_auth(&self) -> Result<AuthIdentity> {
        let (identity, _) = self.call::<AuthIdentity>("auth.test", &[])?;
        Ok(identity)
    }

    fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<(T, Option<String>)> {
        let url = format!("{}/{method}", self.base_url);
        debug!(method, "Calling Slack API");

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(params)
            .send()
            .map_err(AppError::http)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            return Err(AppError::RateLimited {
                method: method.to_string(),
                retry_after_secs,
            });
        }

        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AppError::Http {
                message: format!("{method} returned {status}: {body}"),
                source: None,
            });
        }

        let body = response.text().map_err(AppError::http)?;
        trace!(method, bytes = body.len(), "Slack API response");
        decode_envelope(method, &body)
    }

    /// Follow cursors until exhausted, collecting items from every page.
    fn call_paginated<P, I>(
        &self,
        method: &str,
        params: &[(&str, String)],
        items: impl Fn(P) -> Vec<I>,
    ) -> Result<Vec<I>>
    where
        P: DeserializeOwned,
    {
        let mut collected = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut page_params = params.to_vec();
            if let Some(c) = &cursor {
                page_params.push(("cursor", c.clone()));
            }

            let (payload, next) = self.call::<P>(method, &page_params)?;
            collected.extend(items(payload));

            match next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(collected)
    }
}

impl SlackApi for SlackClient {
    fn list_channels(&self) -> Result<Vec<Channel>> {
        let params = [
            ("types", "public_channel,private_channel".to_string()),
            ("exclude_archived", "false".to_string()),
            ("limit", LIST_LIMIT.to_string()),
        ];

        let channels = self.call_paginated("conversations.list", &params, |p: ChannelsPayload| {
            p.channels
        })?;

        Ok(channels.into_iter().filter(|c| c.is_member).collect())
    }

    fn channel_history(
        &self,
        channel_id: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<HistoryPage> {
        let mut params = vec![
            ("channel", channel_id.to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(cursor) = cursor.filter(|c| !c.is_empty()) {
            params.push(("cursor", cursor.to_string()));
        }

        let (payload, next_cursor) =
            self.call::<MessagesPayload>("conversations.history", &params)?;

        Ok(HistoryPage {
            messages: payload.messages,
            next_cursor,
        })
    }

    fn thread_replies(&self, channel_id: &str, thread_ts: &str) -> Result<Vec<Message>> {
        let params = [
            ("channel", channel_id.to_string()),
            ("ts", thread_ts.to_string()),
            ("limit", LIST_LIMIT.to_string()),
        ];

        self.call_paginated("conversations.replies", &params, |p: MessagesPayload| {
            p.messages
        })
    }

    fn list_users(&self) -> Result<Vec<User>> {
        let params = [("limit", LIST_LIMIT.to_string())];
        self.call_paginated("users.list", &params, |p: MembersPayload| p.members)
    }
}
