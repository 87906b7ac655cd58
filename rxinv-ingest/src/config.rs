//! Configuration resolution for rxinv-ingest
//!
//! **Priority:** command line → environment → TOML file → compiled default.
//! clap's `env` attribute covers the first two tiers, so every field here is
//! optional and the TOML layer fills whatever is still missing.

use clap::Parser;
use rxinv_common::config::{
    non_blank, normalize_prefix, required, resolve_toml_config, ConfigSource, TomlConfig,
};
use rxinv_common::{Error, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::db::control::DEFAULT_LOCK_WAIT_MS;
use crate::services::OrchestratorSettings;
use crate::services::ingestion_orchestrator::{DEFAULT_MIN_BLOB_AGE_MINUTES, DEFAULT_STALE_LEASE_MINUTES};

pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 3;
pub const DEFAULT_RUN_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_INBOX_PREFIX: &str = "inbox/";
pub const DEFAULT_PROCESSED_PREFIX: &str = "processed/";
pub const DEFAULT_ERROR_PREFIX: &str = "error/";

/// Command-line arguments for rxinv-ingest
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "rxinv-ingest")]
#[command(about = "Pharmacy inventory ingestion service")]
#[command(version)]
pub struct Args {
    /// TOML configuration file
    #[arg(long, env = "RXINV_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database URL (e.g. sqlite:///var/lib/rxinv/stock.db)
    #[arg(long, env = "DB_URL")]
    pub database_url: Option<String>,

    #[arg(long, env = "DB_MAX_CONNECTIONS")]
    pub db_max_connections: Option<u32>,

    /// Object store connection: root directory holding the containers
    #[arg(long, env = "BLOB_CONNECTION")]
    pub blob_root: Option<PathBuf>,

    #[arg(long, env = "BLOB_CONTAINER")]
    pub blob_container: Option<String>,

    #[arg(long, env = "INBOX_PREFIX")]
    pub inbox_prefix: Option<String>,

    #[arg(long, env = "PROCESSED_PREFIX")]
    pub processed_prefix: Option<String>,

    #[arg(long, env = "ERROR_PREFIX")]
    pub error_prefix: Option<String>,

    /// Files younger than this are left for a later run
    #[arg(long, env = "MIN_BLOB_AGE_MINUTES")]
    pub min_blob_age_minutes: Option<i64>,

    #[arg(long, env = "RUN_INTERVAL_SECS")]
    pub run_interval_secs: Option<u64>,

    /// Age at which PROCESSING leases are reported as stale
    #[arg(long, env = "STALE_LEASE_MINUTES")]
    pub stale_lease_minutes: Option<i64>,

    /// Upper bound for SQLite lock-contention retries
    #[arg(long, env = "DB_LOCK_WAIT_MS")]
    pub lock_wait_ms: Option<u64>,

    /// Serve /health and /runs/last on this address
    #[arg(long, env = "RXINV_BIND")]
    pub bind: Option<String>,

    /// Log level used when RUST_LOG is unset
    #[arg(long)]
    pub log_level: Option<String>,

    /// Run once, print the summary as JSON and exit
    #[arg(long)]
    pub once: bool,
}

/// Fully resolved service settings
#[derive(Debug, Clone, PartialEq)]
pub struct IngestSettings {
    pub database_url: String,
    pub db_max_connections: u32,
    pub lock_wait_ms: u64,
    pub blob_root: PathBuf,
    pub blob_container: String,
    pub inbox_prefix: String,
    pub processed_prefix: String,
    pub error_prefix: String,
    pub min_blob_age_minutes: i64,
    pub run_interval: Duration,
    pub stale_lease_minutes: i64,
    pub bind: Option<SocketAddr>,
    pub log_level: String,
    pub once: bool,
    /// Logged once tracing is up
    pub config_source: ConfigSource,
}

impl IngestSettings {
    /// Load the TOML layer named by the arguments (or the default file) and resolve
    pub fn load(args: Args) -> Result<Self> {
        let (toml, source) = resolve_toml_config(args.config.as_deref())?;
        let mut settings = Self::resolve(args, toml)?;
        settings.config_source = source;
        Ok(settings)
    }

    /// Merge arguments over a TOML layer
    pub fn resolve(args: Args, toml: TomlConfig) -> Result<Self> {
        let database_url = required(
            non_blank(args.database_url).or_else(|| non_blank(toml.database_url)),
            "DB_URL",
        )?;
        let blob_root = required(args.blob_root.or(toml.blob_root), "BLOB_CONNECTION")?;
        let blob_container = required(
            non_blank(args.blob_container).or_else(|| non_blank(toml.blob_container)),
            "BLOB_CONTAINER",
        )?;

        let db_max_connections = args
            .db_max_connections
            .or(toml.db_max_connections)
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
        if db_max_connections == 0 {
            return Err(Error::Config("DB_MAX_CONNECTIONS must be at least 1".to_string()));
        }

        let min_blob_age_minutes = args
            .min_blob_age_minutes
            .or(toml.min_blob_age_minutes)
            .unwrap_or(DEFAULT_MIN_BLOB_AGE_MINUTES);
        if min_blob_age_minutes < 0 {
            return Err(Error::Config(format!(
                "MIN_BLOB_AGE_MINUTES must not be negative (got {})",
                min_blob_age_minutes
            )));
        }

        let run_interval_secs = args
            .run_interval_secs
            .or(toml.run_interval_secs)
            .unwrap_or(DEFAULT_RUN_INTERVAL_SECS);
        if run_interval_secs == 0 {
            return Err(Error::Config("RUN_INTERVAL_SECS must be at least 1".to_string()));
        }

        let bind = args
            .bind
            .or(toml.bind)
            .filter(|b| !b.trim().is_empty())
            .map(|b| {
                b.trim()
                    .parse::<SocketAddr>()
                    .map_err(|e| Error::Config(format!("Invalid RXINV_BIND '{}': {}", b, e)))
            })
            .transpose()?;

        Ok(Self {
            database_url,
            db_max_connections,
            lock_wait_ms: args.lock_wait_ms.or(toml.db_lock_wait_ms).unwrap_or(DEFAULT_LOCK_WAIT_MS),
            blob_root,
            blob_container,
            inbox_prefix: prefix(args.inbox_prefix, toml.inbox_prefix, DEFAULT_INBOX_PREFIX),
            processed_prefix: prefix(args.processed_prefix, toml.processed_prefix, DEFAULT_PROCESSED_PREFIX),
            error_prefix: prefix(args.error_prefix, toml.error_prefix, DEFAULT_ERROR_PREFIX),
            min_blob_age_minutes,
            run_interval: Duration::from_secs(run_interval_secs),
            stale_lease_minutes: args
                .stale_lease_minutes
                .or(toml.stale_lease_minutes)
                .unwrap_or(DEFAULT_STALE_LEASE_MINUTES),
            bind,
            log_level: args.log_level.unwrap_or(toml.logging.level),
            once: args.once,
            config_source: ConfigSource::Defaults,
        })
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            min_blob_age_minutes: self.min_blob_age_minutes,
            stale_lease_minutes: self.stale_lease_minutes,
        }
    }
}

/// A configured prefix (even a blank one) wins over the default
fn prefix(arg: Option<String>, toml: Option<String>, default: &str) -> String {
    normalize_prefix(arg.or(toml).as_deref().unwrap_or(default))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_args() -> Args {
        Args {
            database_url: Some("sqlite::memory:".into()),
            blob_root: Some(PathBuf::from("/srv/blobs")),
            blob_container: Some("inventory".into()),
            ..Args::default()
        }
    }

    #[test]
    fn test_defaults_apply() {
        let settings = IngestSettings::resolve(minimal_args(), TomlConfig::default()).unwrap();

        assert_eq!(settings.db_max_connections, 3);
        assert_eq!(settings.lock_wait_ms, 5000);
        assert_eq!(settings.inbox_prefix, "inbox/");
        assert_eq!(settings.processed_prefix, "processed/");
        assert_eq!(settings.error_prefix, "error/");
        assert_eq!(settings.min_blob_age_minutes, 15);
        assert_eq!(settings.run_interval, Duration::from_secs(300));
        assert_eq!(settings.stale_lease_minutes, 60);
        assert_eq!(settings.bind, None);
        assert_eq!(settings.log_level, "info");
        assert!(!settings.once);
    }

    #[test]
    fn test_args_override_toml() {
        let toml = TomlConfig {
            inbox_prefix: Some("toml-inbox".into()),
            min_blob_age_minutes: Some(30),
            ..TomlConfig::default()
        };
        let args = Args {
            inbox_prefix: Some("incoming".into()),
            ..minimal_args()
        };

        let settings = IngestSettings::resolve(args, toml).unwrap();
        assert_eq!(settings.inbox_prefix, "incoming/");
        assert_eq!(settings.min_blob_age_minutes, 30);
    }

    #[test]
    fn test_toml_supplies_required_values() {
        let toml = TomlConfig {
            database_url: Some("sqlite://stock.db".into()),
            blob_root: Some(PathBuf::from("/data")),
            blob_container: Some("c".into()),
            ..TomlConfig::default()
        };
        let settings = IngestSettings::resolve(Args::default(), toml).unwrap();
        assert_eq!(settings.database_url, "sqlite://stock.db");
    }

    #[test]
    fn test_missing_required_names_env_var() {
        let args = Args {
            database_url: None,
            ..minimal_args()
        };
        let err = IngestSettings::resolve(args, TomlConfig::default()).unwrap_err();
        assert!(err.to_string().contains("DB_URL"));

        let args = Args {
            blob_container: Some("  ".into()),
            ..minimal_args()
        };
        let err = IngestSettings::resolve(args, TomlConfig::default()).unwrap_err();
        assert!(err.to_string().contains("BLOB_CONTAINER"));
    }

    #[test]
    fn test_blank_prefix_stays_blank() {
        let args = Args {
            inbox_prefix: Some(" ".into()),
            ..minimal_args()
        };
        let settings = IngestSettings::resolve(args, TomlConfig::default()).unwrap();
        assert_eq!(settings.inbox_prefix, "");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let args = Args {
            min_blob_age_minutes: Some(-1),
            ..minimal_args()
        };
        assert!(IngestSettings::resolve(args, TomlConfig::default()).is_err());

        let args = Args {
            bind: Some("not-an-address".into()),
            ..minimal_args()
        };
        assert!(IngestSettings::resolve(args, TomlConfig::default()).is_err());

        let args = Args {
            db_max_connections: Some(0),
            ..minimal_args()
        };
        assert!(IngestSettings::resolve(args, TomlConfig::default()).is_err());
    }

    #[test]
    fn test_bind_parses() {
        let args = Args {
            bind: Some("127.0.0.1:8080".into()),
            ..minimal_args()
        };
        let settings = IngestSettings::resolve(args, TomlConfig::default()).unwrap();
        assert_eq!(settings.bind, Some("127.0.0.1:8080".parse().unwrap()));
    }
}
