//! Domain-level error types for slacker.
//!
//! All errors are typed with `thiserror` and carry enough context (stage,
//! identifier, API method) to tell the user where an export failed.

use thiserror::Error;

use super::progress::ExportStage;

/// Application-level errors.
#[derive(Error, Debug)]
pub enum AppError {
    /// The requested channel is not visible to the authenticated user.
    #[error("Channel not found: {channel_id}")]
    ChannelNotFound { channel_id: String },

    /// Slack answered with `ok: false`.
    #[error("Slack API error in {method}: {code}")]
    SlackApi { method: String, code: String },

    /// Slack answered with HTTP 429.
    #[error("Rate limited by Slack in {method}: retry after {retry_after_secs}s")]
    RateLimited {
        method: String,
        retry_after_secs: u64,
    },

    /// Transport-level failure talking to Slack.
    #[error("HTTP error: {message}")]
    Http {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// A fatal failure inside one pipeline stage.
    #[error("{stage} failed ({context}): {source}")]
    Stage {
        stage: ExportStage,
        context: String,
        #[source]
        source: Box<AppError>,
    },

    /// Requested feature exists in the option space but is not implemented.
    #[error("Unsupported operation: {feature}")]
    Unsupported { feature: String },

    /// Invalid or malformed data.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// JSON encoding or decoding failed.
    #[error("JSON error: {message}")]
    JsonParse {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Configuration or environment error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// IO operation failed.
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// The caller's overall deadline expired.
    #[error("Export timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The background export task panicked or was cancelled.
    #[error("Export task failed: {message}")]
    Task { message: String },
}

impl AppError {
    /// Create a JSON error.
    pub fn json_parse(err: serde_json::Error) -> Self {
        Self::JsonParse {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create an IO error with context.
    pub fn io(message: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(err),
        }
    }

    /// Create an HTTP error from a reqwest error.
    pub fn http(err: reqwest::Error) -> Self {
        Self::Http {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Wrap an error with the stage and identifier it happened at.
    pub fn at_stage(self, stage: ExportStage, context: impl Into<String>) -> Self {
        Self::Stage {
            stage,
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stage this error was raised in, if it was wrapped by the pipeline.
    #[must_use]
    pub const fn stage(&self) -> Option<ExportStage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Result type alias using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
