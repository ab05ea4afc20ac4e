//! CLI interface using clap.
//!
//! Provides command-line arguments and subcommands for the tool.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use clap::{Args, Parser, Subcommand};

use crate::domain::parse_slack_ts;

/// Slacker - Export Slack channel history to structured JSON.
#[derive(Parser, Debug)]
#[command(name = "slacker")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (use multiple times for more verbosity).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export one channel's history to a JSON file.
    Export(ExportArgs),

    /// Show a channel's most recent messages.
    Messages(MessagesArgs),

    /// List channels you are a member of.
    Channels {
        /// Include archived channels.
        #[arg(long)]
        include_archived: bool,

        /// Show only private channels.
        #[arg(long, conflicts_with = "public_only")]
        private_only: bool,

        /// Show only public channels.
        #[arg(long)]
        public_only: bool,

        /// Output format: table, json or csv.
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Save a Slack token and verify it.
    Auth {
        /// Token to store (xoxp-... or xoxb-...). Verifies the stored token if omitted.
        token: Option<String>,
    },
}

/// Arguments of the `export` command.
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Channel name (with or without '#').
    #[arg(short, long, conflicts_with = "channel_id", required_unless_present = "channel_id")]
    pub channel: Option<String>,

    /// Channel ID (e.g. C0123456789).
    #[arg(long)]
    pub channel_id: Option<String>,

    /// Output file path (default: <export dir>/<channel>-export-<timestamp>.json).
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format: json, json-pretty, json-compact.
    #[arg(short, long)]
    pub format: Option<String>,

    /// Compression: none, gzip.
    #[arg(long)]
    pub compress: Option<String>,

    /// Skip thread replies.
    #[arg(long)]
    pub no_threads: bool,

    /// Strip file metadata from messages.
    #[arg(long)]
    pub no_files: bool,

    /// Strip reactions from messages.
    #[arg(long)]
    pub no_reactions: bool,

    /// Only messages at or after this time (YYYY-MM-DD, "YYYY-MM-DD HH:MM:SS", RFC 3339).
    #[arg(long)]
    pub from: Option<String>,

    /// Only messages at or before this time. A bare date includes the whole day.
    #[arg(long)]
    pub to: Option<String>,

    /// Abort the export after this many seconds (0 = no limit).
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Messages per history page (max 1000).
    #[arg(long)]
    pub page_size: Option<u32>,
}

/// Arguments of the `messages` command.
#[derive(Args, Debug)]
pub struct MessagesArgs {
    /// Channel name (with or without '#').
    #[arg(short, long, conflicts_with = "channel_id", required_unless_present = "channel_id")]
    pub channel: Option<String>,

    /// Channel ID (e.g. C0123456789).
    #[arg(long)]
    pub channel_id: Option<String>,

    /// Number of messages to show (1-1000).
    #[arg(short, long, default_value_t = 20, value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub limit: u32,

    /// Include thread replies.
    #[arg(short, long)]
    pub threads: bool,

    /// Only messages before this point (Slack ts or date).
    #[arg(short, long)]
    pub before: Option<String>,

    /// Only messages after this point (Slack ts or date).
    #[arg(short, long)]
    pub after: Option<String>,

    /// Output format: text or json.
    #[arg(short, long, default_value = "text")]
    pub format: String,

    /// Plain text without colors or emoji.
    #[arg(short = 'n', long)]
    pub no_format: bool,

    /// Show channel activity statistics instead of messages.
    #[arg(long, conflicts_with_all = ["threads", "before", "after"])]
    pub stats: bool,
}

/// Parse a `--before` / `--after` value: a Slack timestamp or a date.
///
/// # Errors
/// Returns a message naming the accepted formats.
pub fn parse_message_bound(value: &str) -> Result<DateTime<Utc>, String> {
    match parse_slack_ts(value) {
        Ok(at) => Ok(at),
        Err(_) => parse_date_bound(value, DateBound::Start)
            .map_err(|e| format!("{e}, or a Slack timestamp")),
    }
}

/// Which end of a date range a value is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBound {
    Start,
    /// A bare date expands to the last instant of that day.
    End,
}

/// Parse a `--from` / `--to` value as UTC.
///
/// # Errors
/// Returns a message naming the accepted formats.
pub fn parse_date_bound(value: &str, bound: DateBound) -> Result<DateTime<Utc>, String> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    for pattern in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, pattern) {
            return Ok(naive.and_utc());
        }
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        format!(
            "Invalid date '{value}'. Use YYYY-MM-DD, \"YYYY-MM-DD HH:MM:SS\" or RFC 3339"
        )
    })?;
    let start = date.and_time(chrono::NaiveTime::MIN).and_utc();

    Ok(match bound {
        DateBound::Start => start,
        DateBound::End => start + TimeDelta::days(1) - TimeDelta::microseconds(1),
    })
}
