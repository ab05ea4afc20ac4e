//! Domain models for Slack workspace data.
//!
//! These models deserialize directly from Slack Web API payloads. Fields the
//! API omits for some message kinds (bots, joins, file shares) default to empty.

use serde::{Deserialize, Serialize};

/// Channel topic or purpose.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub creator: String,
    #[serde(default)]
    pub last_set: i64,
}

/// A Slack channel (public or private conversation).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub is_member: bool,
    #[serde(default)]
    pub num_members: u64,
    #[serde(default)]
    pub topic: Topic,
    #[serde(default)]
    pub purpose: Topic,
    /// Creation time in unix seconds.
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub creator: String,
}

/// Legacy message attachment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub fallback: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub thumb_url: String,
}

/// A file shared in a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub mimetype: String,
    #[serde(default)]
    pub filetype: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub url_private: String,
    /// Upload time in unix seconds.
    #[serde(default)]
    pub created: Option<i64>,
}

/// An emoji reaction on a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub name: String,
    #[serde(default)]
    pub users: Vec<String>,
    /// Total reactions of this kind. May exceed `users.len()`.
    #[serde(default)]
    pub count: u64,
}

/// Edit marker on a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edited {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub ts: String,
}

/// A single Slack message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Author user id. Empty for some bot messages.
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub text: String,
    /// Message timestamp, which doubles as its id.
    pub ts: String,
    /// Parent timestamp when the message belongs to a thread.
    #[serde(default)]
    pub thread_ts: String,
    #[serde(default)]
    pub reply_count: u32,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub files: Vec<SlackFile>,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
    #[serde(default)]
    pub edited: Option<Edited>,
    #[serde(default)]
    pub bot_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub subtype: String,
}

impl Message {
    /// Whether replies should be fetched for this message.
    #[must_use]
    pub fn has_unresolved_thread(&self) -> bool {
        self.reply_count > 0 && !self.thread_ts.is_empty()
    }
}

/// A top-level message together with its replies.
///
/// Replies are plain [`Message`]s, so threads are exactly one level deep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadedMessage {
    pub message: Message,
    /// Replies sorted oldest first, never containing the parent itself.
    pub replies: Vec<Message>,
}

impl ThreadedMessage {
    /// Wrap a message that has no resolved replies.
    #[must_use]
    pub const fn standalone(message: Message) -> Self {
        Self {
            message,
            replies: Vec::new(),
        }
    }

    /// The parent followed by all replies.
    pub fn iter_all(&self) -> impl Iterator<Item = &Message> {
        std::iter::once(&self.message).chain(self.replies.iter())
    }
}

/// User profile details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub real_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub image_24: String,
    #[serde(default)]
    pub image_32: String,
    #[serde(default)]
    pub image_48: String,
    #[serde(default)]
    pub image_72: String,
    #[serde(default)]
    pub image_192: String,
    #[serde(default)]
    pub image_512: String,
}

/// A workspace member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// Handle.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub real_name: String,
    #[serde(default)]
    pub profile: Profile,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub deleted: bool,
}

impl User {
    /// Placeholder for an id that is referenced but missing from the directory.
    #[must_use]
    pub fn placeholder(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: format!("user_{id}"),
            real_name: "Unknown User".to_string(),
            deleted: true,
            ..Self::default()
        }
    }
}
