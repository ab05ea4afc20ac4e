//! Infrastructure layer - external adapters (Slack Web API, filesystem).
//!
//! This layer handles all I/O operations and external dependencies.

pub mod config;
pub mod slack_client;

pub use config::{ensure_config_exists, load_config, resolve_token, save_config};
pub use slack_client::{HistoryPage, SlackApi, SlackClient};
