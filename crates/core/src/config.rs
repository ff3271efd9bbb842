//! Configuration types shared across crates.

use crate::freshness::{
    DEFAULT_HEALTH_TYPES, DEFAULT_HEALTH_WINDOW, DEFAULT_INTEGRITY_TYPES,
    DEFAULT_INTEGRITY_WINDOW, FreshnessPolicy,
};
use crate::kind::MetadataKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use time::Duration;

/// Operational HTTP server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:9090").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:9090".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

/// PostgreSQL SSL mode configuration.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PgSslMode {
    /// Disable SSL/TLS entirely.
    Disable,
    /// Prefer SSL/TLS but allow unencrypted connections (default).
    #[default]
    Prefer,
    /// Require SSL/TLS for all connections.
    Require,
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database (single-process deployments and testing).
    Sqlite {
        /// Database file path.
        path: PathBuf,
        /// Query timeout in seconds (advisory only; slow queries are logged).
        #[serde(default = "default_sqlite_query_timeout_secs")]
        query_timeout_secs: Option<u64>,
    },
    /// PostgreSQL database.
    Postgres {
        /// Connection URL (optional if using individual fields).
        /// Takes precedence over individual fields if both are provided.
        url: Option<String>,
        /// Database host.
        host: Option<String>,
        /// Database port (default: 5432).
        #[serde(default = "default_pg_port")]
        port: Option<u16>,
        /// Database username.
        username: Option<String>,
        /// Database password.
        /// Prefer PKGMETA_METADATA__PASSWORD over storing it in the file.
        password: Option<String>,
        /// Database name.
        database: Option<String>,
        /// SSL mode for connections.
        ssl_mode: Option<PgSslMode>,
        /// Maximum connections in the pool.
        #[serde(default = "default_max_connections")]
        max_connections: u32,
        /// Statement timeout in milliseconds.
        #[serde(default = "default_statement_timeout_ms")]
        statement_timeout_ms: Option<u64>,
    },
}

fn default_max_connections() -> u32 {
    10
}

fn default_pg_port() -> Option<u16> {
    Some(5432)
}

fn default_statement_timeout_ms() -> Option<u64> {
    Some(30000) // 30 seconds
}

fn default_sqlite_query_timeout_secs() -> Option<u64> {
    Some(30)
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/pkgmeta.db"),
            query_timeout_secs: default_sqlite_query_timeout_secs(),
        }
    }
}

impl MetadataConfig {
    /// Validate metadata configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            MetadataConfig::Sqlite { .. } => Ok(()),
            MetadataConfig::Postgres {
                url,
                host,
                database,
                ..
            } => match (url.as_ref(), host.as_ref(), database.as_ref()) {
                (Some(_), _, _) => Ok(()),
                (None, Some(_), Some(_)) => Ok(()),
                (None, None, _) => Err(
                    "postgres config requires either 'url' or 'host' + 'database'".to_string(),
                ),
                (None, Some(_), None) => Err(
                    "postgres config requires 'database' when using individual fields".to_string(),
                ),
            },
        }
    }
}

/// Staleness windows and supported package types per metadata kind.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FreshnessConfig {
    /// Integrity staleness window in seconds.
    #[serde(default = "default_integrity_window_secs")]
    pub integrity_window_secs: u64,
    /// Health staleness window in seconds.
    #[serde(default = "default_health_window_secs")]
    pub health_window_secs: u64,
    /// Package types integrity metadata is fetched for.
    #[serde(default = "default_integrity_types")]
    pub integrity_types: Vec<String>,
    /// Package types health metadata is fetched for.
    #[serde(default = "default_health_types")]
    pub health_types: Vec<String>,
}

fn default_integrity_window_secs() -> u64 {
    DEFAULT_INTEGRITY_WINDOW.whole_seconds() as u64 // 1 hour
}

fn default_health_window_secs() -> u64 {
    DEFAULT_HEALTH_WINDOW.whole_seconds() as u64 // 10 days
}

fn default_integrity_types() -> Vec<String> {
    DEFAULT_INTEGRITY_TYPES.iter().map(|t| t.to_string()).collect()
}

fn default_health_types() -> Vec<String> {
    DEFAULT_HEALTH_TYPES.iter().map(|t| t.to_string()).collect()
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            integrity_window_secs: default_integrity_window_secs(),
            health_window_secs: default_health_window_secs(),
            integrity_types: default_integrity_types(),
            health_types: default_health_types(),
        }
    }
}

impl FreshnessConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.integrity_window_secs == 0 {
            return Err("freshness.integrity_window_secs must be greater than 0".to_string());
        }
        if self.health_window_secs == 0 {
            return Err("freshness.health_window_secs must be greater than 0".to_string());
        }
        if self.integrity_window_secs > i64::MAX as u64 || self.health_window_secs > i64::MAX as u64
        {
            return Err("freshness windows are out of range".to_string());
        }
        Ok(())
    }

    /// Build the immutable policy handed to the coordinator.
    pub fn into_policy(&self) -> FreshnessPolicy {
        FreshnessPolicy::new(
            Duration::seconds(self.integrity_window_secs as i64),
            Duration::seconds(self.health_window_secs as i64),
        )
        .with_supported_types(MetadataKind::Integrity, &self.integrity_types)
        .with_supported_types(MetadataKind::Health, &self.health_types)
    }
}

/// Result synchronization configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Attempts per record merge before a write conflict becomes fatal.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Run the integrity match against tracked components after integrity merges.
    #[serde(default = "default_integrity_check_enabled")]
    pub integrity_check_enabled: bool,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_integrity_check_enabled() -> bool {
    true
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            integrity_check_enabled: default_integrity_check_enabled(),
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("sync.max_attempts must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Where outbound messages (fetch triggers, downstream signals) go.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundConfig {
    /// Log each message and drop it.
    #[default]
    Log,
    /// Append each message as a JSON line to a file.
    Outbox {
        /// Outbox file path.
        path: PathBuf,
    },
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Metadata store configuration.
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Staleness policy configuration.
    #[serde(default)]
    pub freshness: FreshnessConfig,
    /// Result synchronization configuration.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Fetch trigger sink.
    #[serde(default)]
    pub dispatch: OutboundConfig,
    /// Downstream signal sink.
    #[serde(default)]
    pub notify: OutboundConfig,
    /// Operational HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
}

impl AppConfig {
    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses SQLite metadata at the given path.
    pub fn for_testing(db_path: PathBuf) -> Self {
        Self {
            metadata: MetadataConfig::Sqlite {
                path: db_path,
                query_timeout_secs: default_sqlite_query_timeout_secs(),
            },
            ..Default::default()
        }
    }

    /// Validate every section.
    pub fn validate(&self) -> crate::Result<()> {
        self.metadata
            .validate()
            .and_then(|_| self.freshness.validate())
            .and_then(|_| self.sync.validate())
            .map_err(crate::Error::Config)
    }
}
