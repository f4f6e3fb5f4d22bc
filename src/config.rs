//! Configuration types for the graph service.
//!
//! The [`Config`] struct controls everything the runtime supervisor and
//! storage engine need that isn't a compile-time constant: where the
//! database and backups live, which embedding provider to use, and the
//! defaults for vector search. It's the validated record the external
//! config loader (CLI/env/file, out of scope for this crate) is expected to
//! hand in, or that an embedder can build directly.
//!
//! # Example
//! ```rust
//! use pulsehive_graph::{Config, EmbeddingProviderKind};
//!
//! let config = Config::default();
//! assert_eq!(config.embeddings.provider, EmbeddingProviderKind::Local);
//!
//! let config = Config {
//!     port: 9080,
//!     vector: pulsehive_graph::VectorConfig {
//!         default_hybrid_weight: 0.5,
//!         ..Default::default()
//!     },
//!     ..Default::default()
//! };
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Service configuration.
///
/// All fields have sensible defaults. Use struct update syntax to override
/// specific settings:
///
/// ```rust
/// use pulsehive_graph::Config;
///
/// let config = Config {
///     port: 8090,
///     ..Default::default()
/// };
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Human-readable server name, reported in the identity file and
    /// `/health`.
    pub name: String,

    /// Host to bind the HTTP adapter to.
    pub host: String,

    /// Preferred port. The supervisor probes successive ports if this one
    /// is taken — see [`Config::port_probe_limit`].
    pub port: u16,

    /// How many successive ports to try after `port` before giving up.
    pub port_probe_limit: u16,

    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Directory backups are written to.
    pub backup_dir: PathBuf,

    /// Minimum number of backups to retain.
    pub min_backups: usize,

    /// Never delete a backup younger than this many days, even if retention
    /// would otherwise remove it.
    pub min_backup_age_days: u32,

    /// Interval between periodic backups, in seconds. `0` disables periodic
    /// backups (startup backup still runs if `backup_on_startup` is set).
    pub backup_interval_secs: u64,

    /// Take a backup immediately on successful startup.
    pub backup_on_startup: bool,

    /// Log level for the `tracing` subscriber installed by the daemon
    /// binary (`"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`).
    pub log_level: String,

    /// Busy-timeout applied to every pooled SQLite connection.
    pub busy_timeout_ms: u32,

    /// Embedding provider settings.
    pub embeddings: EmbeddingsConfig,

    /// Vector/hybrid search defaults.
    pub vector: VectorConfig,

    /// Set when running inside a container; recorded in the identity file.
    pub in_docker: bool,

    /// Container name/id, if `in_docker` is set.
    pub container_name: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "pulsehive-graph".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8787,
            port_probe_limit: 20,
            database_path: PathBuf::from("data/knowledge_graph.db"),
            backup_dir: PathBuf::from("backup"),
            min_backups: 5,
            min_backup_age_days: 1,
            backup_interval_secs: 3600,
            backup_on_startup: true,
            log_level: "info".to_string(),
            busy_timeout_ms: 5_000,
            embeddings: EmbeddingsConfig::default(),
            vector: VectorConfig::default(),
            in_docker: false,
            container_name: None,
        }
    }
}

impl Config {
    /// Creates a new Config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a Config pointed at the given database path, otherwise
    /// default.
    pub fn with_database_path(path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: path.into(),
            ..Default::default()
        }
    }

    /// Validates the configuration.
    ///
    /// Called automatically by `PulseHive::open()`. You can also call this
    /// explicitly to check configuration before attempting to open.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.database_path.as_os_str().is_empty() {
            return Err(ValidationError::required_field("database_path"));
        }
        if self.busy_timeout_ms < 5_000 {
            return Err(ValidationError::invalid_field(
                "busy_timeout_ms",
                "must be at least 5000ms per the durability contract",
            ));
        }
        if self.port_probe_limit == 0 {
            return Err(ValidationError::invalid_field(
                "port_probe_limit",
                "must be greater than 0",
            ));
        }
        self.embeddings.validate()?;
        self.vector.validate()?;
        Ok(())
    }
}

/// Embedding provider configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    /// Which provider kind is active.
    pub provider: EmbeddingProviderKind,

    /// Model name/identifier, meaning depends on `provider`.
    pub model: String,

    /// API key for the remote provider. Ignored for `Local`.
    pub api_key: Option<String>,

    /// HTTP endpoint for the remote provider. Ignored for `Local`.
    pub endpoint: Option<String>,

    /// Batch size used by `generate_embeddings`.
    pub batch_size: usize,

    /// Generate embeddings automatically when entities/observations are
    /// created, instead of requiring an explicit `generate_embeddings` call.
    pub auto_generate: bool,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Local,
            model: "local-hash-384".to_string(),
            api_key: None,
            endpoint: None,
            batch_size: 32,
            auto_generate: false,
        }
    }
}

impl EmbeddingsConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.batch_size == 0 {
            return Err(ValidationError::invalid_field(
                "embeddings.batch_size",
                "must be greater than 0",
            ));
        }
        if self.provider == EmbeddingProviderKind::Remote {
            if self.api_key.is_none() {
                return Err(ValidationError::invalid_field(
                    "embeddings.api_key",
                    "required when provider is Remote",
                ));
            }
            if self.endpoint.is_none() {
                return Err(ValidationError::invalid_field(
                    "embeddings.endpoint",
                    "required when provider is Remote",
                ));
            }
        }
        Ok(())
    }
}

/// Which embedding provider variant is active.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderKind {
    /// A locally loaded embedding model; no network required.
    #[default]
    Local,
    /// A remote embedding API, called over HTTP per request/batch.
    Remote,
}

impl EmbeddingProviderKind {
    /// Returns true if this is the local provider.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local)
    }

    /// Returns true if this is the remote provider.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote)
    }
}

/// Vector/hybrid search defaults, used when a tool call omits the
/// corresponding argument.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct VectorConfig {
    /// Default `k` for semantic/hybrid search.
    pub default_k: usize,

    /// Default minimum cosine similarity for semantic search.
    pub default_threshold: f32,

    /// Default `vector_weight` for hybrid search fusion. Must be in
    /// `[0.0, 1.0]`.
    pub default_hybrid_weight: f32,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            default_k: 10,
            default_threshold: 0.0,
            default_hybrid_weight: 0.7,
        }
    }
}

impl VectorConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.default_k == 0 {
            return Err(ValidationError::invalid_field(
                "vector.default_k",
                "must be greater than 0",
            ));
        }
        if !(0.0..=1.0).contains(&self.default_hybrid_weight) {
            return Err(ValidationError::invalid_field(
                "vector.default_hybrid_weight",
                format!(
                    "must be between 0.0 and 1.0, got {}",
                    self.default_hybrid_weight
                ),
            ));
        }
        if !(-1.0..=1.0).contains(&self.default_threshold) {
            return Err(ValidationError::invalid_field(
                "vector.default_threshold",
                "must be between -1.0 and 1.0",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 8787);
        assert_eq!(config.min_backups, 5);
        assert_eq!(config.min_backup_age_days, 1);
        assert_eq!(config.busy_timeout_ms, 5_000);
        assert!(config.embeddings.provider.is_local());
        assert_eq!(config.vector.default_hybrid_weight, 0.7);
    }

    #[test]
    fn test_validate_success() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_empty_database_path() {
        let config = Config {
            database_path: PathBuf::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_busy_timeout_below_minimum() {
        let config = Config {
            busy_timeout_ms: 100,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, ValidationError::InvalidField { field, .. } if field == "busy_timeout_ms")
        );
    }

    #[test]
    fn test_validate_hybrid_weight_out_of_range() {
        let config = Config {
            vector: VectorConfig {
                default_hybrid_weight: 1.5,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_hybrid_weight_boundary_values() {
        let mut config = Config::default();
        config.vector.default_hybrid_weight = 0.0;
        assert!(config.validate().is_ok());
        config.vector.default_hybrid_weight = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_remote_requires_api_key() {
        let config = Config {
            embeddings: EmbeddingsConfig {
                provider: EmbeddingProviderKind::Remote,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, ValidationError::InvalidField { field, .. } if field == "embeddings.api_key")
        );
    }

    #[test]
    fn test_validate_remote_with_api_key_ok() {
        let config = Config {
            embeddings: EmbeddingsConfig {
                provider: EmbeddingProviderKind::Remote,
                api_key: Some("secret".to_string()),
                endpoint: Some("https://api.example.com/embed".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_remote_missing_endpoint() {
        let config = Config {
            embeddings: EmbeddingsConfig {
                provider: EmbeddingProviderKind::Remote,
                api_key: Some("secret".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, ValidationError::InvalidField { field, .. } if field == "embeddings.endpoint")
        );
    }

    #[test]
    fn test_validate_zero_batch_size() {
        let config = Config {
            embeddings: EmbeddingsConfig {
                batch_size: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_embedding_provider_kind_checks() {
        assert!(EmbeddingProviderKind::Local.is_local());
        assert!(!EmbeddingProviderKind::Local.is_remote());
        assert!(EmbeddingProviderKind::Remote.is_remote());
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let restored: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.port, config.port);
        assert_eq!(restored.vector.default_hybrid_weight, config.vector.default_hybrid_weight);
    }
}
