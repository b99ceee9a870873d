//! Application configuration loader for Wayfinder.
//!
//! Reads `config.toml` from the data directory (`~/.wayfinder/` by default)
//! and deserializes it into [`AppConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::path::{Path, PathBuf};

use wayfinder_types::config::AppConfig;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "WAYFINDER_DATA_DIR";

/// Resolve the data directory: `WAYFINDER_DATA_DIR`, else `~/.wayfinder`.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".wayfinder")
}

/// Load application configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`AppConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
pub async fn load_app_config(data_dir: &Path) -> AppConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return AppConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return AppConfig::default();
        }
    };

    match toml::from_str::<AppConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            AppConfig::default()
        }
    }
}

/// Directory holding the saved vector index.
pub fn index_dir(config: &AppConfig, data_dir: &Path) -> PathBuf {
    config
        .index
        .dir
        .clone()
        .unwrap_or_else(|| data_dir.join("index"))
}

/// SQLite database path for the `sqlite` record backend.
pub fn sqlite_path(config: &AppConfig, data_dir: &Path) -> PathBuf {
    config
        .records
        .sqlite_path
        .clone()
        .unwrap_or_else(|| data_dir.join("records.db"))
}
