//! Configuration file model and loading
//!
//! Values resolve with the priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Steps 1 and 2 are handled by each binary's argument parser; this module
//! owns the TOML layer and the helpers shared by every consumer.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Logging section of the TOML file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Optional TOML configuration file contents
///
/// Every field is optional so partially written files still load.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TomlConfig {
    pub database_url: Option<String>,
    pub db_max_connections: Option<u32>,
    pub db_lock_wait_ms: Option<u64>,
    pub blob_root: Option<PathBuf>,
    pub blob_container: Option<String>,
    pub inbox_prefix: Option<String>,
    pub processed_prefix: Option<String>,
    pub error_prefix: Option<String>,
    pub min_blob_age_minutes: Option<i64>,
    pub run_interval_secs: Option<u64>,
    pub stale_lease_minutes: Option<i64>,
    pub bind: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Default configuration file location (`<config dir>/rxinv/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("rxinv").join("config.toml"))
}

/// Parse a TOML configuration file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Where the TOML layer came from
///
/// Callers report it with [`ConfigSource::log`] once logging is up.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// A file was loaded
    File(PathBuf),
    /// The default file exists but could not be used; defaults apply
    Ignored { path: PathBuf, reason: String },
    /// No file; defaults apply
    Defaults,
}

impl ConfigSource {
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded configuration file {}", path.display()),
            ConfigSource::Ignored { path, reason } => warn!(
                "Ignoring unreadable default configuration {}: {}",
                path.display(),
                reason
            ),
            ConfigSource::Defaults => info!("No configuration file, using defaults"),
        }
    }
}

/// Load the TOML layer
///
/// An explicitly requested file must load. When none is requested the
/// default location is tried and any problem there degrades to defaults.
pub fn resolve_toml_config(explicit: Option<&Path>) -> Result<(TomlConfig, ConfigSource)> {
    resolve_toml_config_from(explicit, default_config_path().as_deref())
}

/// [`resolve_toml_config`] with the default location supplied by the caller
pub fn resolve_toml_config_from(
    explicit: Option<&Path>,
    default_path: Option<&Path>,
) -> Result<(TomlConfig, ConfigSource)> {
    if let Some(path) = explicit {
        let config = load_toml_config(path)?;
        return Ok((config, ConfigSource::File(path.to_path_buf())));
    }

    match default_path {
        Some(path) if path.exists() => match load_toml_config(path) {
            Ok(config) => Ok((config, ConfigSource::File(path.to_path_buf()))),
            Err(e) => Ok((
                TomlConfig::default(),
                ConfigSource::Ignored {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                },
            )),
        },
        _ => Ok((TomlConfig::default(), ConfigSource::Defaults)),
    }
}

/// Normalise an object-store prefix: blank becomes "", otherwise ends with '/'
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim();
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    }
}

/// Require a value that has no default, naming its environment variable
pub fn required<T>(value: Option<T>, env_var: &str) -> Result<T> {
    value.ok_or_else(|| Error::Config(format!("Missing required setting: {}", env_var)))
}

/// Treat blank strings as absent
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_prefix_appends_slash() {
        assert_eq!(normalize_prefix("inbox"), "inbox/");
        assert_eq!(normalize_prefix("inbox/"), "inbox/");
        assert_eq!(normalize_prefix("a/b"), "a/b/");
    }

    #[test]
    fn test_normalize_prefix_blank_is_empty() {
        assert_eq!(normalize_prefix(""), "");
        assert_eq!(normalize_prefix("   "), "");
    }

    #[test]
    fn test_required_names_env_var() {
        let err = required::<String>(None, "DB_URL").unwrap_err();
        assert!(err.to_string().contains("DB_URL"));
        assert_eq!(required(Some(3), "X").unwrap(), 3);
    }

    #[test]
    fn test_non_blank_filters_whitespace() {
        assert_eq!(non_blank(Some("  ".to_string())), None);
        assert_eq!(non_blank(Some("x".to_string())), Some("x".to_string()));
        assert_eq!(non_blank(None), None);
    }

    #[test]
    fn test_toml_partial_file_parses() {
        let config: TomlConfig = toml::from_str(
            r#"
            blob_container = "stock"
            min_blob_age_minutes = 5

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.blob_container.as_deref(), Some("stock"));
        assert_eq!(config.min_blob_age_minutes, Some(5));
        assert_eq!(config.logging.level, "debug");
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_toml_missing_logging_uses_default() {
        let config: TomlConfig = toml::from_str("bind = \"127.0.0.1:8080\"").unwrap();
        assert_eq!(config.logging, LoggingConfig::default());
    }
}
