//! Terminal output formatting.
//!
//! Channel listings, message listings and the summary printed after an
//! export.

use std::collections::BTreeMap;
use std::time::Duration;

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};
use serde::Serialize;

use crate::domain::{
    parse_slack_ts, Channel, ChannelInfo, ExportMessage, ExportResult, ExportUser, Message,
    ProgressSnapshot, User,
};

use super::messages::{ChannelStats, MessageListing};
use super::serializer::{to_channel_info, to_export_message, to_export_user};

/// Output format of the `channels` command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListFormat {
    /// Human-readable table.
    #[default]
    Table,
    /// JSON array for programmatic use.
    Json,
    /// Comma-separated values with a header row.
    Csv,
}

impl std::str::FromStr for ListFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            _ => Err(format!("Unknown format: {s}. Use: table, json, csv")),
        }
    }
}

/// Output format of the `messages` command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MessageFormat {
    /// Readable, indented thread view.
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for MessageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {s}. Use: text, json")),
        }
    }
}

/// Which channels the `channels` command shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelFilter {
    pub include_archived: bool,
    pub private_only: bool,
    pub public_only: bool,
}

/// Apply `filter` and order channels by name.
#[must_use]
pub fn filter_channels(channels: Vec<Channel>, filter: &ChannelFilter) -> Vec<Channel> {
    let mut kept: Vec<Channel> = channels
        .into_iter()
        .filter(|c| filter.include_archived || !c.is_archived)
        .filter(|c| !filter.private_only || c.is_private)
        .filter(|c| !filter.public_only || !c.is_private)
        .collect();
    kept.sort_by(|a, b| a.name.cmp(&b.name));
    kept
}

/// Formats channels as a table.
pub fn format_channels_table(channels: &[Channel]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["ID", "Name", "Type", "Members", "Topic"]);

    for channel in channels {
        let kind = match (channel.is_private, channel.is_archived) {
            (true, true) => "private, archived",
            (true, false) => "private",
            (false, true) => "public, archived",
            (false, false) => "public",
        };

        let topic = if channel.topic.value.is_empty() {
            "-".to_string()
        } else {
            truncate(&channel.topic.value, 40)
        };

        table.add_row(vec![
            channel.id.clone(),
            format!("#{}", channel.name),
            kind.to_string(),
            channel.num_members.to_string(),
            topic,
        ]);
    }

    table.to_string()
}

/// Formats channels as JSON.
///
/// # Errors
/// Returns error if serialization fails.
pub fn format_channels_json(channels: &[Channel]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(channels)
}

/// Formats channels as CSV. `verbose` adds id, topic and purpose columns.
pub fn format_channels_csv(channels: &[Channel], verbose: bool) -> String {
    let mut out = String::new();
    if verbose {
        out.push_str("Name,ID,Type,Members,Archived,Topic,Purpose\n");
    } else {
        out.push_str("Name,Type,Members,Archived\n");
    }

    for channel in channels {
        let kind = if channel.is_private { "Private" } else { "Public" };
        let archived = if channel.is_archived { "Yes" } else { "No" };

        let row = if verbose {
            [
                escape_csv_field(&channel.name),
                escape_csv_field(&channel.id),
                kind.to_string(),
                channel.num_members.to_string(),
                archived.to_string(),
                escape_csv_field(&channel.topic.value),
                escape_csv_field(&channel.purpose.value),
            ]
            .join(",")
        } else {
            [
                escape_csv_field(&channel.name),
                kind.to_string(),
                channel.num_members.to_string(),
                archived.to_string(),
            ]
            .join(",")
        };
        out.push_str(&row);
        out.push('\n');
    }

    out
}

/// Quote a CSV field if it contains a separator, quote or line break.
fn escape_csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// One-line progress message for a snapshot.
#[must_use]
pub fn format_progress(snapshot: &ProgressSnapshot) -> String {
    format!("[{}] {}", snapshot.stage, snapshot.step)
}

/// Formats the result of a finished export.
pub fn format_export_summary(result: &ExportResult, verbose: bool) -> String {
    let stats = &result.statistics;
    let mut out = String::new();

    out.push_str(&format!("{}\n", "✅ Export complete".green().bold()));
    out.push_str(&format!("  File: {}\n", result.output_file.display().to_string().cyan()));
    out.push_str(&format!("  Size: {}\n", format_bytes(result.file_size)));
    out.push_str(&format!("  Duration: {}\n\n", format_duration(result.duration)));

    out.push_str(&format!("{}\n", "📊 Statistics".bold()));
    out.push_str(&format!("  Messages: {}\n", stats.total_messages.to_string().cyan()));
    out.push_str(&format!(
        "  Threads: {} ({} replies)\n",
        stats.total_threads.to_string().cyan(),
        stats.total_replies
    ));
    out.push_str(&format!("  Users: {}\n", stats.total_users.to_string().cyan()));
    out.push_str(&format!("  Attachments: {}\n", stats.total_attachments));
    out.push_str(&format!("  Files: {}\n", stats.total_files));
    out.push_str(&format!("  Reactions: {}\n", stats.total_reactions));

    if !stats.top_reactions.is_empty() {
        out.push_str(&format!("\n{}\n", "Top reactions".bold()));
        for reaction in stats.top_reactions.iter().take(5) {
            out.push_str(&format!(
                "  :{}: {}\n",
                reaction.name,
                reaction.count.to_string().yellow()
            ));
        }
    }

    if verbose {
        let times = &stats.processing_time;
        out.push_str(&format!("\n{}\n", "⏱ Stage timings".bold()));
        for (label, elapsed) in [
            ("Channel fetch", times.channel_fetch),
            ("Message fetch", times.message_fetch),
            ("Thread fetch", times.thread_fetch),
            ("User fetch", times.user_fetch),
            ("Data processing", times.data_processing),
            ("File generation", times.file_generation),
        ] {
            out.push_str(&format!("  {label}: {}\n", format_duration(elapsed)));
        }
    }

    if !result.warnings.is_empty() {
        let heading = format!("⚠ {} warning(s)", result.warnings.len());
        out.push_str(&format!("\n{}\n", heading.yellow().bold()));
        for warning in &result.warnings {
            out.push_str(&format!("  {warning}\n"));
        }
    }

    out.trim_end().to_string()
}

/// Formats a message listing as an indented thread view.
///
/// `plain` disables colors and emoji markers.
pub fn format_messages_text(listing: &MessageListing, verbose: bool, plain: bool) -> String {
    if listing.messages.is_empty() {
        return "No messages found in the specified range.".to_string();
    }

    let mut out = format!(
        "📝 Found {} messages in #{}:\n\n",
        listing.messages.len(),
        listing.channel.name
    );

    for threaded in &listing.messages {
        push_message(&mut out, &threaded.message, &listing.users, verbose, plain, 0);

        if !threaded.replies.is_empty() {
            out.push_str(&format!("  💬 {} replies:\n", threaded.replies.len()));
            for reply in &threaded.replies {
                push_message(&mut out, reply, &listing.users, verbose, plain, 1);
            }
        }
        out.push('\n');
    }

    out.trim_end().to_string()
}

fn push_message(
    out: &mut String,
    msg: &Message,
    users: &BTreeMap<String, User>,
    verbose: bool,
    plain: bool,
    depth: usize,
) {
    let indent = "  ".repeat(depth);
    let name = display_name(users, &msg.user);
    let time = parse_slack_ts(&msg.ts).map_or_else(
        |_| msg.ts.clone(),
        |dt| dt.format("%Y-%m-%d %H:%M:%S").to_string(),
    );

    out.push_str(&indent);
    if plain {
        if depth > 0 {
            out.push_str("> ");
        }
        out.push_str(&format!("[{time}] {name}"));
        if verbose {
            out.push_str(&format!(" ({})", msg.user));
        }
        if msg.edited.is_some() {
            out.push_str(" (edited)");
        }
    } else {
        if depth > 0 {
            out.push_str("↳ ");
        }
        out.push_str(&format!("👤 {}", name.bold()));
        if verbose {
            out.push_str(&format!(" ({})", msg.user.dimmed()));
        }
        out.push_str(&format!(" {}", time.dimmed()));
        if msg.edited.is_some() {
            out.push_str(&format!(" {}", "(edited)".yellow()));
        }
    }
    out.push('\n');

    let text = if !msg.text.is_empty() {
        msg.text.as_str()
    } else if !msg.attachments.is_empty() {
        "[Attachment]"
    } else if !msg.files.is_empty() {
        "[File]"
    } else {
        "[No text content]"
    };
    for line in text.lines() {
        out.push_str(&format!("{indent}  {line}\n"));
    }

    if !verbose {
        return;
    }

    let (clip, folder, thumbs) = if plain {
        ("Attachment:", "File:", "Reactions:")
    } else {
        ("📎", "📁", "👍")
    };

    for attachment in &msg.attachments {
        out.push_str(&format!("{indent}  {clip} {}\n", attachment.title));
        if !attachment.text.is_empty() {
            out.push_str(&format!("{indent}     {}\n", attachment.text));
        }
    }
    for file in &msg.files {
        out.push_str(&format!("{indent}  {folder} {} ({})\n", file.name, file.filetype));
    }
    if !msg.reactions.is_empty() {
        let reactions: Vec<String> = msg
            .reactions
            .iter()
            .map(|r| format!(":{}: {}", r.name, r.count))
            .collect();
        out.push_str(&format!("{indent}  {thumbs} {}\n", reactions.join(" ")));
    }
}

/// Display name, then real name, then handle, then the raw id.
fn display_name(users: &BTreeMap<String, User>, user_id: &str) -> String {
    let Some(user) = users.get(user_id) else {
        return if user_id.is_empty() { "unknown".to_string() } else { user_id.to_string() };
    };

    [&user.profile.display_name, &user.real_name, &user.name]
        .into_iter()
        .find(|name| !name.is_empty())
        .cloned()
        .unwrap_or_else(|| user_id.to_string())
}

#[derive(Serialize)]
struct MessagesJson<'a> {
    channel: ChannelInfo,
    messages: Vec<ExportMessage>,
    users: BTreeMap<&'a str, ExportUser>,
    count: usize,
}

/// Formats a message listing as JSON in the export message schema.
///
/// # Errors
/// Returns error if serialization fails.
pub fn format_messages_json(listing: &MessageListing) -> Result<String, serde_json::Error> {
    let output = MessagesJson {
        channel: to_channel_info(&listing.channel),
        messages: listing.messages.iter().map(to_export_message).collect(),
        users: listing
            .users
            .iter()
            .map(|(id, user)| (id.as_str(), to_export_user(user)))
            .collect(),
        count: listing.messages.len(),
    };
    serde_json::to_string_pretty(&output)
}

/// Formats a channel activity summary.
pub fn format_channel_stats(channel: &Channel, stats: &ChannelStats) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "{}\n",
        format!("📊 #{} (last {} messages)", channel.name, stats.sample_size).bold()
    ));
    out.push_str(&format!("  Authors: {}\n", stats.unique_users.to_string().cyan()));
    out.push_str(&format!("  Threads: {}\n", stats.thread_count.to_string().cyan()));
    out.push_str(&format!(
        "  Most active: {}\n",
        stats.most_active_user.as_deref().unwrap_or("-")
    ));
    if stats.has_more {
        out.push_str("  Older history not sampled\n");
    }

    out.trim_end().to_string()
}

/// Format bytes as human-readable string.
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// Format a duration as `1.23s` or `450ms`.
pub fn format_duration(elapsed: Duration) -> String {
    if elapsed >= Duration::from_secs(1) {
        format!("{:.2}s", elapsed.as_secs_f64())
    } else {
        format!("{}ms", elapsed.as_millis())
    }
}

/// Truncates a string to max length with ellipsis.
fn truncate(s: &str, max_len: usize) -> String {
    let s = s.lines().next().unwrap_or(s);
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{head}...")
    }
}
