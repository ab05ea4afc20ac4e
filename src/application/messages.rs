//! Recent channel history for the `messages` command.
//!
//! Unlike an export, a listing stops after `limit` messages and keeps the
//! API order (newest first). Thread and user resolution reuse the export
//! stages.

use std::collections::BTreeMap;
use std::thread;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::domain::{
    parse_slack_ts, settle, AppError, CallOutcome, Channel, ExportStage, FailurePolicy, Message,
    Result, ThreadedMessage, User,
};
use crate::infrastructure::SlackApi;

use super::channels::{find_channel_by_id, find_channel_by_name};
use super::export_service::RateLimit;
use super::threads::{resolve_threads, without_threads};
use super::users::resolve_users;

/// Largest `limit` a listing accepts.
pub const MAX_MESSAGE_LIMIT: usize = 1000;

/// Largest history page requested while listing.
const MAX_BATCH: usize = 200;

/// Messages sampled by [`MessageService::channel_stats`].
const STATS_SAMPLE: u32 = 100;

/// What to list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageQuery {
    /// Number of top-level messages, `1..=MAX_MESSAGE_LIMIT`.
    pub limit: usize,
    pub include_threads: bool,
    /// Only messages strictly older than this.
    pub before: Option<DateTime<Utc>>,
    /// Only messages strictly newer than this.
    pub after: Option<DateTime<Utc>>,
}

impl Default for MessageQuery {
    fn default() -> Self {
        Self {
            limit: 20,
            include_threads: false,
            before: None,
            after: None,
        }
    }
}

impl MessageQuery {
    /// # Errors
    /// Returns a configuration error for a limit outside `1..=1000`.
    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 || self.limit > MAX_MESSAGE_LIMIT {
            return Err(AppError::Config {
                message: format!("Limit must be between 1 and {MAX_MESSAGE_LIMIT}"),
            });
        }
        Ok(())
    }
}

/// A channel's recent messages with their authors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageListing {
    pub channel: Channel,
    pub messages: Vec<ThreadedMessage>,
    pub users: BTreeMap<String, User>,
    pub warnings: Vec<String>,
}

/// Activity summary over the most recent history page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelStats {
    pub channel_id: String,
    /// Messages the summary is based on.
    pub sample_size: usize,
    pub unique_users: usize,
    pub thread_count: usize,
    /// Author with the most sampled messages. Ties go to the smallest id.
    pub most_active_user: Option<String>,
    /// Whether the channel has history beyond the sample.
    pub has_more: bool,
}

/// Browses channel history through a [`SlackApi`].
pub struct MessageService<A: SlackApi> {
    api: A,
    rate_limit: RateLimit,
}

impl<A: SlackApi> MessageService<A> {
    #[must_use]
    pub const fn new(api: A, rate_limit: RateLimit) -> Self {
        Self { api, rate_limit }
    }

    /// Resolve a channel by name, or by id when no name is given.
    ///
    /// # Errors
    /// Returns `ChannelNotFound` for an unknown channel and a configuration
    /// error when neither is given.
    pub fn find_channel(&self, name: Option<&str>, id: Option<&str>) -> Result<Channel> {
        match (name, id) {
            (Some(name), _) => find_channel_by_name(&self.api, name),
            (None, Some(id)) => find_channel_by_id(&self.api, id),
            (None, None) => Err(AppError::Config {
                message: "Either a channel name or a channel id is required".to_string(),
            }),
        }
    }

    /// List the most recent messages of `channel`.
    ///
    /// # Errors
    /// Returns an error for an invalid query, a failed history page or a
    /// failed user directory call. A failed thread is only a warning.
    pub fn channel_messages(&self, channel: Channel, query: &MessageQuery) -> Result<MessageListing> {
        query.validate()?;

        let messages = fetch_recent_messages(&self.api, &channel.id, query, self.rate_limit)?;

        let (messages, warnings) = if query.include_threads {
            let resolution = resolve_threads(
                &self.api,
                &channel.id,
                messages,
                self.rate_limit.thread_delay,
                |_, _| {},
            );
            (resolution.messages, resolution.warnings)
        } else {
            (without_threads(messages), Vec::new())
        };

        let users = resolve_users(&self.api, &messages)?;

        info!(
            channel = %channel.name,
            messages = messages.len(),
            users = users.len(),
            "Listed channel messages"
        );

        Ok(MessageListing {
            channel,
            messages,
            users,
            warnings,
        })
    }

    /// Summarise the latest page of a channel's history.
    ///
    /// # Errors
    /// Returns an error if the history call fails.
    pub fn channel_stats(&self, channel_id: &str) -> Result<ChannelStats> {
        let page = self.api.channel_history(channel_id, STATS_SAMPLE, None)?;

        let mut per_user: BTreeMap<&str, usize> = BTreeMap::new();
        for message in page.messages.iter().filter(|m| !m.user.is_empty()) {
            *per_user.entry(message.user.as_str()).or_default() += 1;
        }

        let mut most_active: Option<(&str, usize)> = None;
        for (&user, &count) in &per_user {
            if !matches!(most_active, Some((_, best)) if best >= count) {
                most_active = Some((user, count));
            }
        }

        Ok(ChannelStats {
            channel_id: channel_id.to_string(),
            sample_size: page.messages.len(),
            unique_users: per_user.len(),
            thread_count: page.messages.iter().filter(|m| m.reply_count > 0).count(),
            most_active_user: most_active.map(|(user, _)| user.to_string()),
            has_more: page.next_cursor.is_some(),
        })
    }
}

/// Page through history until `query.limit` messages inside the window are
/// collected or the history ends.
///
/// # Errors
/// Any page error is fatal and names the failing page.
pub fn fetch_recent_messages<A: SlackApi + ?Sized>(
    api: &A,
    channel_id: &str,
    query: &MessageQuery,
    rate_limit: RateLimit,
) -> Result<Vec<Message>> {
    let mut messages: Vec<Message> = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;

    while messages.len() < query.limit {
        if pages > 0 && !rate_limit.page_delay.is_zero() {
            thread::sleep(rate_limit.page_delay);
        }
        pages += 1;

        let batch = (query.limit - messages.len()).min(MAX_BATCH);
        let batch = u32::try_from(batch).unwrap_or(u32::MAX);

        let page = match settle(
            api.channel_history(channel_id, batch, cursor.as_deref()),
            FailurePolicy::Abort,
        ) {
            CallOutcome::Done(page) => page,
            CallOutcome::Degraded(err) | CallOutcome::Failed(err) => {
                return Err(err.at_stage(ExportStage::MessageFetch, format!("page {pages}")));
            }
        };

        let received = page.messages.len();
        messages.extend(within_window(page.messages, query.before, query.after));
        debug!(page = pages, received, kept = messages.len(), "Fetched history page");

        match page.next_cursor {
            Some(next) if received > 0 => cursor = Some(next),
            _ => break,
        }
    }

    messages.truncate(query.limit);
    Ok(messages)
}

/// Keep messages strictly between `after` and `before`.
///
/// Messages with an unreadable timestamp are dropped when a bound is set.
#[must_use]
pub fn within_window(
    messages: Vec<Message>,
    before: Option<DateTime<Utc>>,
    after: Option<DateTime<Utc>>,
) -> Vec<Message> {
    if before.is_none() && after.is_none() {
        return messages;
    }

    messages
        .into_iter()
        .filter(|m| {
            parse_slack_ts(&m.ts).is_ok_and(|at| {
                !matches!(before, Some(limit) if at >= limit)
                    && !matches!(after, Some(limit) if at <= limit)
            })
        })
        .collect()
}
