//! Application layer - use cases and orchestration.
//!
//! This layer contains the export pipeline stages, the orchestrator that
//! runs them, the recent message listing and terminal formatting.

pub mod channels;
pub mod export_service;
pub mod formatter;
pub mod messages;
pub mod pagination;
pub mod serializer;
pub mod statistics;
pub mod threads;
pub mod users;

#[cfg(test)]
pub(crate) mod test_support;

pub use export_service::{validate_options, ExportService, RateLimit};
pub use formatter::{
    filter_channels, format_channel_stats, format_channels_csv, format_channels_json,
    format_channels_table, format_export_summary, format_messages_json, format_messages_text,
    format_progress, ChannelFilter, ListFormat, MessageFormat,
};
pub use messages::{MessageQuery, MessageService};
