//! Configuration file management.
//!
//! Handles loading and saving the TOML configuration file and resolving the
//! Slack token.

use std::fs;
use std::path::Path;

use crate::domain::{AppConfig, AppError, Result};

/// Environment variable that takes precedence over the configured token.
pub const TOKEN_ENV: &str = "SLACKER_SLACK_TOKEN";

/// Default configuration file content.
const DEFAULT_CONFIG: &str = r#"# Slacker Configuration
# Auto-generated - edit as needed

[slack]
# User or bot token. Set it with `slacker auth <token>`.
# token = "xoxp-..."
base_url = "https://slack.com/api"

[export]
# Directory for exports without --output
default_output_dir = "exports"

# Fetch thread replies
include_threads = true

# json, json-pretty or json-compact
format = "json-pretty"

# none or gzip
compression = "none"

# Messages per history page (max 1000)
page_size = 1000

# Delay between Slack API calls in milliseconds
rate_limit_ms = 100

# Overall export deadline in seconds (0 = no deadline)
timeout_secs = 0
"#;

/// Load configuration from file or fall back to defaults.
///
/// # Errors
/// Returns error if file exists but cannot be read or parsed.
pub fn load_config() -> Result<AppConfig> {
    let config_path = AppConfig::config_file_path();

    if config_path.exists() {
        load_config_from_file(&config_path)
    } else {
        Ok(AppConfig::default())
    }
}

/// Load configuration from a specific file.
///
/// # Errors
/// Returns error if file cannot be read or parsed.
pub fn load_config_from_file(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::io(format!("Failed to read config file: {}", path.display()), e))?;

    toml::from_str(&content).map_err(|e| AppError::Config {
        message: format!("Failed to parse config file: {e}"),
    })
}

/// Save configuration to the default location.
///
/// # Errors
/// Returns error if file cannot be written.
pub fn save_config(config: &AppConfig) -> Result<()> {
    save_config_to_file(config, &AppConfig::config_file_path())
}

/// Save configuration to a specific file.
///
/// # Errors
/// Returns error if file cannot be written.
pub fn save_config_to_file(config: &AppConfig, config_path: &Path) -> Result<()> {
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::io("Failed to create config directory", e))?;
    }

    let content = toml::to_string_pretty(config).map_err(|e| AppError::Config {
        message: format!("Failed to serialize config: {e}"),
    })?;

    fs::write(config_path, content).map_err(|e| {
        AppError::io(format!("Failed to write config file: {}", config_path.display()), e)
    })?;

    tracing::info!(path = %config_path.display(), "Configuration saved");

    Ok(())
}

/// Create default configuration file if it doesn't exist.
///
/// # Errors
/// Returns error if file cannot be created.
pub fn ensure_config_exists() -> Result<()> {
    let config_path = AppConfig::config_file_path();

    if !config_path.exists() {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::io("Failed to create config directory", e))?;
        }

        fs::write(&config_path, DEFAULT_CONFIG)
            .map_err(|e| AppError::io("Failed to create default config", e))?;

        tracing::info!(path = %config_path.display(), "Created default configuration");
    }

    Ok(())
}

/// Resolve the Slack token from the environment, then the config file.
///
/// # Errors
/// Returns a configuration error when no token is available.
pub fn resolve_token(config: &AppConfig) -> Result<String> {
    resolve_token_with(std::env::var(TOKEN_ENV).ok(), config)
}

fn resolve_token_with(env_value: Option<String>, config: &AppConfig) -> Result<String> {
    env_value
        .into_iter()
        .chain(config.slack.token.clone())
        .map(|token| token.trim().to_string())
        .find(|token| !token.is_empty())
        .ok_or_else(|| AppError::Config {
            message: format!(
                "No Slack token configured. Run `slacker auth <token>` or set {TOKEN_ENV}"
            ),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_parses() {
        let config: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: AppConfig = toml::from_str("[export]\npage_size = 200\n").unwrap();
        assert_eq!(config.export.page_size, 200);
        assert_eq!(config.export.format, "json-pretty");
        assert_eq!(config.slack.base_url, "https://slack.com/api");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.slack.token = Some("xoxp-test".into());
        config.export.rate_limit_ms = 250;

        save_config_to_file(&config, &config_path).unwrap();
        let loaded = load_config_from_file(&config_path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_config_is_config_error() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        fs::write(&config_path, "[export\npage_size = ").unwrap();

        assert!(matches!(
            load_config_from_file(&config_path),
            Err(AppError::Config { .. })
        ));
    }

    #[test]
    fn test_token_resolution_order() {
        let mut config = AppConfig::default();
        assert!(resolve_token_with(None, &config).is_err());

        config.slack.token = Some("xoxp-file".into());
        assert_eq!(resolve_token_with(None, &config).unwrap(), "xoxp-file");
        assert_eq!(
            resolve_token_with(Some("xoxb-env".into()), &config).unwrap(),
            "xoxb-env"
        );
        // A blank environment value does not mask the file token.
        assert_eq!(
            resolve_token_with(Some("  ".into()), &config).unwrap(),
            "xoxp-file"
        );
    }
}
