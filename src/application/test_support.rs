//! In-memory `SlackApi` used by the application tests.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use crate::domain::{AppError, Channel, Message, Reaction, Result, User};
use crate::infrastructure::{HistoryPage, SlackApi};

/// Scripted Slack workspace with injectable failures and a call log.
#[derive(Default)]
pub struct MockSlackApi {
    channels: Vec<Channel>,
    pages: Vec<Vec<Message>>,
    threads: HashMap<String, Vec<Message>>,
    users: Vec<User>,
    failing_page: Option<usize>,
    failing_threads: HashSet<String>,
    fail_users: bool,
    fail_channels: bool,
    calls: RefCell<Vec<String>>,
}

impl MockSlackApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channels.push(channel);
        self
    }

    /// Add a history page. Pages are served in insertion order.
    pub fn with_page(mut self, messages: Vec<Message>) -> Self {
        self.pages.push(messages);
        self
    }

    /// Script the raw `conversations.replies` answer for `thread_ts`.
    pub fn with_thread(mut self, thread_ts: &str, messages: Vec<Message>) -> Self {
        self.threads.insert(thread_ts.to_string(), messages);
        self
    }

    pub fn with_users(mut self, users: Vec<User>) -> Self {
        self.users = users;
        self
    }

    /// Make the 1-based history page `page` fail.
    pub const fn fail_page(mut self, page: usize) -> Self {
        self.failing_page = Some(page);
        self
    }

    pub fn fail_thread(mut self, thread_ts: &str) -> Self {
        self.failing_threads.insert(thread_ts.to_string());
        self
    }

    pub const fn fail_users(mut self) -> Self {
        self.fail_users = true;
        self
    }

    pub const fn fail_channels(mut self) -> Self {
        self.fail_channels = true;
        self
    }

    /// Calls made so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }
}

fn api_error(method: &str, code: &str) -> AppError {
    AppError::SlackApi {
        method: method.to_string(),
        code: code.to_string(),
    }
}

impl SlackApi for MockSlackApi {
    fn list_channels(&self) -> Result<Vec<Channel>> {
        self.record("conversations.list".to_string());
        if self.fail_channels {
            return Err(api_error("conversations.list", "invalid_auth"));
        }
        Ok(self.channels.clone())
    }

    fn channel_history(
        &self,
        channel_id: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<HistoryPage> {
        let cursor = cursor.unwrap_or_default();
        self.record(format!("conversations.history {channel_id} limit={limit} cursor={cursor}"));

        let index = cursor
            .strip_prefix("page-")
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(0);

        if self.failing_page == Some(index + 1) {
            return Err(api_error("conversations.history", "internal_error"));
        }

        let messages = self.pages.get(index).cloned().unwrap_or_default();
        let next_cursor = (index + 1 < self.pages.len()).then(|| format!("page-{}", index + 1));

        Ok(HistoryPage {
            messages,
            next_cursor,
        })
    }

    fn thread_replies(&self, channel_id: &str, thread_ts: &str) -> Result<Vec<Message>> {
        self.record(format!("conversations.replies {channel_id} ts={thread_ts}"));
        if self.failing_threads.contains(thread_ts) {
            return Err(api_error("conversations.replies", "thread_not_found"));
        }
        Ok(self.threads.get(thread_ts).cloned().unwrap_or_default())
    }

    fn list_users(&self) -> Result<Vec<User>> {
        self.record("users.list".to_string());
        if self.fail_users {
            return Err(api_error("users.list", "ratelimited"));
        }
        Ok(self.users.clone())
    }
}

pub fn channel(id: &str, name: &str) -> Channel {
    Channel {
        id: id.to_string(),
        name: name.to_string(),
        is_member: true,
        num_members: 3,
        ..Channel::default()
    }
}

pub fn message(ts: &str, user: &str, text: &str) -> Message {
    Message {
        kind: "message".to_string(),
        ts: ts.to_string(),
        user: user.to_string(),
        text: text.to_string(),
        ..Message::default()
    }
}

/// A message that starts a thread with `reply_count` replies.
pub fn thread_parent(ts: &str, user: &str, reply_count: u32) -> Message {
    Message {
        thread_ts: ts.to_string(),
        reply_count,
        ..message(ts, user, "thread start")
    }
}

/// A reply inside the thread rooted at `parent_ts`.
pub fn reply(ts: &str, parent_ts: &str, user: &str) -> Message {
    Message {
        thread_ts: parent_ts.to_string(),
        ..message(ts, user, "reply")
    }
}

pub fn reaction(name: &str, count: u64) -> Reaction {
    Reaction {
        name: name.to_string(),
        users: Vec::new(),
        count,
    }
}

pub fn user(id: &str, name: &str) -> User {
    User {
        id: id.to_string(),
        name: name.to_string(),
        real_name: name.to_uppercase(),
        ..User::default()
    }
}
