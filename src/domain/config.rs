//! Application configuration model.
//!
//! Loaded from `~/.slacker/config.toml`. Every field has a default so a
//! partial or empty file is valid.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Slack connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackConfig {
    /// User or bot token (`xoxp-` / `xoxb-`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Web API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String {
    "https://slack.com/api".to_string()
}

/// Defaults for the `export` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory for exports without an explicit output path.
    #[serde(default = "default_output_dir")]
    pub default_output_dir: PathBuf,

    #[serde(default = "default_include_threads")]
    pub include_threads: bool,

    /// One of `json`, `json-pretty`, `json-compact`.
    #[serde(default = "default_format")]
    pub format: String,

    /// One of `none`, `gzip`.
    #[serde(default = "default_compression")]
    pub compression: String,

    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Delay between consecutive Slack calls in milliseconds.
    #[serde(default = "default_rate_limit_ms")]
    pub rate_limit_ms: u64,

    /// Overall export deadline in seconds. 0 disables it.
    #[serde(default)]
    pub timeout_secs: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            default_output_dir: default_output_dir(),
            include_threads: default_include_threads(),
            format: default_format(),
            compression: default_compression(),
            page_size: default_page_size(),
            rate_limit_ms: default_rate_limit_ms(),
            timeout_secs: 0,
        }
    }
}

impl ExportConfig {
    #[must_use]
    pub const fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("exports")
}

const fn default_include_threads() -> bool {
    true
}

fn default_format() -> String {
    "json-pretty".to_string()
}

fn default_compression() -> String {
    "none".to_string()
}

const fn default_page_size() -> u32 {
    1000
}

const fn default_rate_limit_ms() -> u64 {
    100
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub slack: SlackConfig,

    #[serde(default)]
    pub export: ExportConfig,
}

impl AppConfig {
    /// Directory holding the config file.
    #[must_use]
    pub fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".slacker")
    }

    /// Path of the config file.
    #[must_use]
    pub fn config_file_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}
