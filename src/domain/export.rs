//! Export document schema and export options.
//!
//! Everything here is the public, serialized shape of an export file. Keys are
//! snake_case and empty optional values are omitted from the JSON.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use tracing::warn;

use super::{AppError, Result};

/// Name recorded in `export_info.exported_by`.
pub const EXPORTED_BY: &str = "slacker-cli";

/// Top-level export file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportDocument {
    pub export_info: ExportMetadata,
    pub channel: ChannelInfo,
    pub messages: Vec<ExportMessage>,
    /// Only users referenced by the exported messages.
    pub users: BTreeMap<String, ExportUser>,
    pub statistics: ExportStatistics,
}

/// Information about the export run itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportMetadata {
    pub exported_at: DateTime<Utc>,
    pub exported_by: String,
    pub tool_version: String,
    pub export_format: String,
    pub include_threads: bool,
    pub include_files: bool,
    pub include_reactions: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
}

/// Inclusive time window applied to top-level messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DateRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    #[must_use]
    pub const fn new(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Self { from, to }
    }

    /// True when neither bound is set.
    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    /// True when both bounds are set and `from` is after `to`.
    #[must_use]
    pub fn is_inverted(&self) -> bool {
        matches!((self.from, self.to), (Some(from), Some(to)) if from > to)
    }

    /// Whether `at` falls inside the window (both ends inclusive).
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        !matches!(self.from, Some(from) if at < from) && !matches!(self.to, Some(to) if at > to)
    }
}

/// Channel block of the export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
    pub is_private: bool,
    pub is_archived: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    pub num_members: u64,
}

/// A top-level message or a reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportMessage {
    /// The Slack `ts` of the message.
    pub id: String,
    pub user: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub subtype: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edited: Option<ExportEdit>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub thread_ts: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub reply_count: u32,
    /// Always empty for replies.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<ExportMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<ExportAttachment>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<ExportFile>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reactions: Vec<ExportReaction>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub bot_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportEdit {
    pub user: String,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportAttachment {
    /// Decimal string form of the numeric attachment id.
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub fallback: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub color: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub thumb_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportFile {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title: String,
    pub mimetype: String,
    pub filetype: String,
    #[serde(skip_serializing_if = "is_zero_u64")]
    pub size: u64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub url_private: String,
    /// Upload time, when Slack reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportReaction {
    pub name: String,
    pub count: u64,
    pub users: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportUser {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub real_name: String,
    pub profile: ExportProfile,
    #[serde(skip_serializing_if = "is_false")]
    pub is_bot: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub deleted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportProfile {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub real_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image_24: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image_32: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image_48: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image_72: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image_192: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image_512: String,
}

/// Aggregate counts over every exported message and reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportStatistics {
    /// Top-level messages plus all replies.
    pub total_messages: usize,
    /// Top-level messages with at least one resolved reply.
    pub total_threads: usize,
    pub total_replies: usize,
    pub total_users: usize,
    pub total_attachments: usize,
    pub total_files: usize,
    /// Sum of reaction counts, not distinct emoji.
    pub total_reactions: u64,
    pub messages_by_user: BTreeMap<String, usize>,
    /// Keyed by UTC day, `YYYY-MM-DD`.
    pub messages_by_date: BTreeMap<String, usize>,
    pub top_reactions: Vec<ReactionStat>,
    #[serde(rename = "export_duration_ms", serialize_with = "as_millis")]
    pub export_duration: Duration,
    pub processing_time: ProcessingTimes,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReactionStat {
    pub name: String,
    pub count: u64,
}

/// Wall-clock time spent in each pipeline stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcessingTimes {
    #[serde(rename = "channel_fetch_ms", serialize_with = "as_millis")]
    pub channel_fetch: Duration,
    #[serde(rename = "message_fetch_ms", serialize_with = "as_millis")]
    pub message_fetch: Duration,
    #[serde(rename = "thread_fetch_ms", serialize_with = "as_millis")]
    pub thread_fetch: Duration,
    #[serde(rename = "user_fetch_ms", serialize_with = "as_millis")]
    pub user_fetch: Duration,
    #[serde(rename = "data_processing_ms", serialize_with = "as_millis")]
    pub data_processing: Duration,
    #[serde(rename = "file_generation_ms", serialize_with = "as_millis")]
    pub file_generation: Duration,
}

fn as_millis<S: Serializer>(value: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero(value: &u32) -> bool {
    *value == 0
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero_u64(value: &u64) -> bool {
    *value == 0
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_false(value: &bool) -> bool {
    !*value
}

/// JSON rendering style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain `json`, rendered indented.
    Json,
    #[default]
    JsonPretty,
    JsonCompact,
}

impl OutputFormat {
    /// Resolve a format name, falling back to pretty JSON for unknown names.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            "json-pretty" => Self::JsonPretty,
            "json-compact" => Self::JsonCompact,
            other => {
                warn!(format = other, "Unknown output format, using json-pretty");
                Self::JsonPretty
            }
        }
    }

    /// Canonical name recorded in export metadata.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::JsonPretty => "json-pretty",
            Self::JsonCompact => "json-compact",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output compression.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Compression {
    #[default]
    None,
    Gzip,
    /// Accepted by the parser but rejected at export time.
    Zip,
}

impl Compression {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Zip => "zip",
        }
    }
}

impl FromStr for Compression {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "gzip" | "gz" => Ok(Self::Gzip),
            "zip" => Ok(Self::Zip),
            other => Err(AppError::Config {
                message: format!("Unknown compression '{other}'. Use: none, gzip"),
            }),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of a single channel export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    pub channel_id: String,
    pub include_threads: bool,
    pub include_files: bool,
    pub include_reactions: bool,
    pub date_range: DateRange,
    /// Explicit output path. When unset a name is derived from the channel.
    pub output_file: Option<PathBuf>,
    /// Directory used for derived output paths.
    pub output_dir: PathBuf,
    pub format: OutputFormat,
    pub compression: Compression,
    /// History page size, clamped to 1000.
    pub page_size: u32,
}

impl ExportOptions {
    /// Options with every content type included and no date range.
    #[must_use]
    pub fn new(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            include_threads: true,
            include_files: true,
            include_reactions: true,
            date_range: DateRange::default(),
            output_file: None,
            output_dir: PathBuf::from("exports"),
            format: OutputFormat::default(),
            compression: Compression::default(),
            page_size: 1000,
        }
    }
}

/// Outcome of a successful export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportResult {
    pub output_file: PathBuf,
    /// On-disk size in bytes.
    pub file_size: u64,
    pub statistics: ExportStatistics,
    pub duration: Duration,
    /// Non-fatal problems, such as threads whose replies could not be fetched.
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_date_range_bounds_are_inclusive() {
        let range = DateRange::new(Some(day(2)), Some(day(3)));
        assert!(range.contains(day(2)));
        assert!(range.contains(day(3)));
        assert!(!range.contains(day(1)));
        assert!(!range.contains(day(4)));
        assert!(!range.is_inverted());
    }

    #[test]
    fn test_date_range_open_ends() {
        assert!(DateRange::default().is_unbounded());
        assert!(DateRange::new(Some(day(2)), None).contains(day(20)));
        assert!(DateRange::new(None, Some(day(2))).contains(day(1)));
        assert!(DateRange::new(Some(day(3)), Some(day(2))).is_inverted());
    }

    #[test]
    fn test_output_format_names() {
        assert_eq!(OutputFormat::from_name("json"), OutputFormat::Json);
        assert_eq!(OutputFormat::from_name("JSON-Compact"), OutputFormat::JsonCompact);
        assert_eq!(OutputFormat::from_name("json-pretty"), OutputFormat::JsonPretty);
        assert_eq!(OutputFormat::from_name("xml"), OutputFormat::JsonPretty);
        assert_eq!(OutputFormat::from_name(""), OutputFormat::JsonPretty);
        assert_eq!(OutputFormat::JsonCompact.as_str(), "json-compact");
    }

    #[test]
    fn test_compression_parse() {
        assert_eq!("".parse::<Compression>().unwrap(), Compression::None);
        assert_eq!("none".parse::<Compression>().unwrap(), Compression::None);
        assert_eq!("GZ".parse::<Compression>().unwrap(), Compression::Gzip);
        assert_eq!("gzip".parse::<Compression>().unwrap(), Compression::Gzip);
        assert_eq!("zip".parse::<Compression>().unwrap(), Compression::Zip);
        assert!(matches!(
            "brotli".parse::<Compression>(),
            Err(AppError::Config { .. })
        ));
    }

    #[test]
    fn test_statistics_durations_serialize_as_millis() {
        let stats = ExportStatistics {
            export_duration: Duration::from_millis(1500),
            processing_time: ProcessingTimes {
                message_fetch: Duration::from_millis(250),
                ..ProcessingTimes::default()
            },
            ..ExportStatistics::default()
        };

        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["export_duration_ms"], 1500);
        assert_eq!(value["processing_time"]["message_fetch_ms"], 250);
        assert_eq!(value["processing_time"]["thread_fetch_ms"], 0);
    }

    #[test]
    fn test_message_omits_empty_fields() {
        let msg = ExportMessage {
            id: "1704067200.000100".into(),
            user: "U1".into(),
            text: "hi".into(),
            kind: "message".into(),
            ..ExportMessage::default()
        };

        let value = serde_json::to_value(&msg).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj["type"], "message");
        assert!(!obj.contains_key("replies"));
        assert!(!obj.contains_key("reply_count"));
        assert!(!obj.contains_key("thread_ts"));
        assert!(!obj.contains_key("timestamp"));
    }

    #[test]
    fn test_unbounded_range_is_omitted_from_metadata() {
        let meta = ExportMetadata {
            exported_at: day(1),
            exported_by: EXPORTED_BY.into(),
            tool_version: "0.1.0".into(),
            export_format: "json".into(),
            include_threads: true,
            include_files: true,
            include_reactions: true,
            date_range: None,
        };

        let value = serde_json::to_value(&meta).unwrap();
        assert!(value.get("date_range").is_none());
        assert_eq!(value["exported_by"], "slacker-cli");
    }
}
