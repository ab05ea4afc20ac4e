//! Domain layer - core business logic and types.
//!
//! This layer contains Slack entities, the export schema, the progress
//! model and error types without any external I/O.

pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod outcome;
pub mod progress;
pub mod timestamp;

pub use config::{AppConfig, ExportConfig, SlackConfig};
pub use error::{AppError, Result};
pub use export::{
    ChannelInfo, Compression, DateRange, ExportAttachment, ExportDocument, ExportEdit, ExportFile,
    ExportMessage, ExportMetadata, ExportOptions, ExportProfile, ExportReaction, ExportResult,
    ExportStatistics, ExportUser, OutputFormat, ProcessingTimes, ReactionStat, EXPORTED_BY,
};
pub use models::{
    Attachment, Channel, Edited, Message, Profile, Reaction, SlackFile, ThreadedMessage, Topic,
    User,
};
pub use outcome::{settle, CallOutcome, FailurePolicy};
pub use progress::{ExportStage, ProgressCallback, ProgressReporter, ProgressSnapshot};
pub use timestamp::{compare_slack_ts, from_unix_secs, parse_slack_ts};
