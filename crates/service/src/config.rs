// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Data Source Configuration
//!
//! A data source is identified by a cluster URI and an optional default
//! database. Both usually arrive as an ADO-style connection string:
//!
//! ```text
//! Data Source=https://help.kusto.windows.net;Initial Catalog=Samples
//! ```
//!
//! or through the client settings payload:
//!
//! ```json
//! { "kustoMetadata": { "cluster": "help", "database": "Samples", "queryTimeoutSecs": 30 } }
//! ```
//!
//! The cluster is canonicalised on the way in: an `https://` scheme is added
//! when none is given and trailing slashes are trimmed.

use kusto_metadata_catalog::CatalogError;
use serde_json::Value;

const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

const CLUSTER_KEYS: &[&str] = &[
    "data source",
    "server",
    "addr",
    "address",
    "network address",
];
const DATABASE_KEYS: &[&str] = &["initial catalog", "database"];

/// Settings for one cluster connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSourceConfig {
    /// Canonical cluster URI, e.g. `https://help.kusto.windows.net`
    pub cluster: String,

    /// Default database for queries that do not name one
    pub database: Option<String>,

    /// Upper bound for a single remote query (seconds)
    pub query_timeout_secs: u64,

    /// Log query text at debug level
    pub log_queries: bool,
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        Self {
            cluster: String::new(),
            database: None,
            query_timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
            log_queries: false,
        }
    }
}

impl DataSourceConfig {
    pub fn new(cluster: impl AsRef<str>) -> Self {
        Self {
            cluster: canonical_cluster(cluster.as_ref()),
            ..Default::default()
        }
    }

    /// Builder method: set the default database
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        let database = database.into();
        self.database = (!database.trim().is_empty()).then_some(database);
        self
    }

    /// Builder method: set the query timeout
    pub fn with_query_timeout(mut self, secs: u64) -> Self {
        self.query_timeout_secs = secs;
        self
    }

    /// Builder method: toggle query logging
    pub fn with_query_logging(mut self, enabled: bool) -> Self {
        self.log_queries = enabled;
        self
    }

    /// Parse `key=value;key=value` connection strings.
    ///
    /// Keys are case-insensitive; unknown keys are ignored.
    pub fn from_connection_string(connection_string: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for segment in connection_string.split(';') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            let Some((key, value)) = segment.split_once('=') else {
                return Err(ConfigError::InvalidConnectionString {
                    reason: format!("segment '{segment}' is not a key=value pair"),
                });
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            if CLUSTER_KEYS.contains(&key.as_str()) {
                config.cluster = canonical_cluster(value);
            } else if DATABASE_KEYS.contains(&key.as_str()) {
                config = config.with_database(value);
            }
        }

        if config.cluster.is_empty() {
            return Err(ConfigError::MissingCluster);
        }
        Ok(config)
    }

    /// Parse client settings.
    ///
    /// Expected shape:
    /// {
    ///   "kustoMetadata": {
    ///     "cluster": "...",            // or "connectionString": "..."
    ///     "database": "...",
    ///     "queryTimeoutSecs": 30,
    ///     "logQueries": false
    ///   }
    /// }
    pub fn from_settings(settings: &Value) -> Option<Self> {
        let settings = settings.get("kustoMetadata")?;

        let mut config = match settings.get("connectionString").and_then(Value::as_str) {
            Some(connection_string) => Self::from_connection_string(connection_string).ok()?,
            None => Self::new(settings.get("cluster")?.as_str()?),
        };

        if let Some(database) = settings.get("database").and_then(Value::as_str) {
            config = config.with_database(database);
        }
        if let Some(timeout) = settings.get("queryTimeoutSecs").and_then(Value::as_u64) {
            config.query_timeout_secs = timeout;
        }
        if let Some(log_queries) = settings.get("logQueries").and_then(Value::as_bool) {
            config.log_queries = log_queries;
        }
        Some(config)
    }

    /// Validate the configuration
    ///
    /// Checks that:
    /// - a cluster is set
    /// - the cluster is an http(s) URI with a host
    /// - the query timeout is positive
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cluster.is_empty() {
            return Err(ConfigError::MissingCluster);
        }

        let host = self
            .cluster
            .strip_prefix("https://")
            .or_else(|| self.cluster.strip_prefix("http://"))
            .ok_or_else(|| ConfigError::InvalidCluster {
                cluster: self.cluster.clone(),
                reason: "scheme must be http or https".to_string(),
            })?;
        if host.is_empty() || host.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidCluster {
                cluster: self.cluster.clone(),
                reason: "host is empty or contains whitespace".to_string(),
            });
        }

        if self.query_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        Ok(())
    }
}

/// `help` → `https://help`, `https://x/` → `https://x`
pub fn canonical_cluster(cluster: &str) -> String {
    let cluster = cluster.trim().trim_end_matches('/');
    if cluster.is_empty() || cluster.contains("://") {
        cluster.to_string()
    } else {
        format!("https://{cluster}")
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No cluster was configured
    #[error("Cluster is required")]
    MissingCluster,

    /// The cluster is not a usable URI
    #[error("Invalid cluster '{cluster}': {reason}")]
    InvalidCluster { cluster: String, reason: String },

    /// Query timeout must be positive
    #[error("Query timeout must be greater than zero")]
    InvalidTimeout,

    /// Malformed connection string
    #[error("Invalid connection string: {reason}")]
    InvalidConnectionString { reason: String },

    /// Catalog-related error
    #[error("Catalog error: {0}")]
    CatalogError(#[from] CatalogError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_connection_string_with_aliases() {
        let config = DataSourceConfig::from_connection_string(
            "Data Source=https://help.kusto.windows.net/;Initial Catalog=Samples",
        )
        .unwrap();
        assert_eq!(config.cluster, "https://help.kusto.windows.net");
        assert_eq!(config.database.as_deref(), Some("Samples"));

        let connection = "server=help.kusto.windows.net; DATABASE=Logs;";
        let config = DataSourceConfig::from_connection_string(connection).unwrap();
        assert_eq!(config.cluster, "https://help.kusto.windows.net");
        assert_eq!(config.database.as_deref(), Some("Logs"));
    }

    #[test]
    fn test_connection_string_ignores_unknown_keys() {
        let config = DataSourceConfig::from_connection_string(
            "Network Address=help;Fed=True;Application Name=ide",
        )
        .unwrap();
        assert_eq!(config.cluster, "https://help");
        assert_eq!(config.database, None);
    }

    #[test]
    fn test_connection_string_errors() {
        assert!(matches!(
            DataSourceConfig::from_connection_string("Initial Catalog=Samples"),
            Err(ConfigError::MissingCluster)
        ));
        assert!(matches!(
            DataSourceConfig::from_connection_string("Data Source=help;garbage"),
            Err(ConfigError::InvalidConnectionString { .. })
        ));
    }

    #[test]
    fn test_canonical_cluster() {
        assert_eq!(canonical_cluster("help"), "https://help");
        assert_eq!(canonical_cluster(" https://help// "), "https://help");
        assert_eq!(canonical_cluster("http://localhost:8080"), "http://localhost:8080");
        assert_eq!(canonical_cluster(""), "");
    }

    #[test]
    fn test_from_settings() {
        let settings = json!({
            "kustoMetadata": {
                "cluster": "help.kusto.windows.net",
                "database": "Samples",
                "queryTimeoutSecs": 10,
                "logQueries": true
            }
        });
        let config = DataSourceConfig::from_settings(&settings).unwrap();
        assert_eq!(config.cluster, "https://help.kusto.windows.net");
        assert_eq!(config.database.as_deref(), Some("Samples"));
        assert_eq!(config.query_timeout_secs, 10);
        assert!(config.log_queries);
    }

    #[test]
    fn test_from_settings_with_connection_string() {
        let settings = json!({
            "kustoMetadata": { "connectionString": "Addr=help;Database=Samples" }
        });
        let config = DataSourceConfig::from_settings(&settings).unwrap();
        assert_eq!(config.cluster, "https://help");
        assert_eq!(config.query_timeout_secs, DEFAULT_QUERY_TIMEOUT_SECS);
    }

    #[test]
    fn test_from_settings_missing_section() {
        assert_eq!(DataSourceConfig::from_settings(&json!({})), None);
        assert_eq!(
            DataSourceConfig::from_settings(&json!({ "kustoMetadata": {} })),
            None
        );
    }

    #[test]
    fn test_validate() {
        assert!(DataSourceConfig::new("help").validate().is_ok());
        assert!(matches!(
            DataSourceConfig::default().validate(),
            Err(ConfigError::MissingCluster)
        ));
        assert!(matches!(
            DataSourceConfig::new("ftp://help").validate(),
            Err(ConfigError::InvalidCluster { .. })
        ));
        assert!(matches!(
            DataSourceConfig::new("https://bad host").validate(),
            Err(ConfigError::InvalidCluster { .. })
        ));
        assert!(matches!(
            DataSourceConfig::new("help").with_query_timeout(0).validate(),
            Err(ConfigError::InvalidTimeout)
        ));
    }
}
