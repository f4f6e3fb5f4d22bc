//! Error types for the graph service.
//!
//! PulseHive uses a hierarchical error system:
//! - `PulseHiveError` is the top-level error returned by all storage/graph APIs
//! - Specific error types (`StorageError`, `ValidationError`) provide detail
//! - `ToolError` is the taxonomy the tool layer (C4) and protocol adapters
//!   (C6) surface to clients; it never leaks storage-internal detail
//!
//! # Error Handling Pattern
//! ```rust,ignore
//! use pulsehive_graph::{PulseHive, Config, Result};
//!
//! fn example() -> Result<()> {
//!     let graph = PulseHive::open("./graph.db", Config::default())?;
//!     // ... operations that may fail ...
//!     graph.close()?;
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for graph-store operations.
pub type Result<T> = std::result::Result<T, PulseHiveError>;

/// Top-level error enum for all storage/graph operations.
///
/// This is the error type returned by the storage engine (C1) and the graph
/// API (C4) internals. The tool layer maps it onto [`ToolError`] before it
/// reaches a protocol adapter.
#[derive(Debug, Error)]
pub enum PulseHiveError {
    /// Storage layer error (I/O, corruption, transactions).
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Input validation error.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Configuration error.
    #[error("Configuration error: {reason}")]
    Config {
        /// Description of what's wrong with the configuration.
        reason: String,
    },

    /// Requested entity or relation not found.
    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    /// An entity with this name already exists.
    #[error("Entity already exists: {0}")]
    AlreadyExists(String),

    /// One or more names referenced by a tool call do not resolve to
    /// existing entities. Carries the full list so the caller can see every
    /// missing name in one round trip instead of one-at-a-time.
    #[error("Missing entities: {}", .0.join(", "))]
    MissingEntities(Vec<String>),

    /// General I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Embedding generation/validation error.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// The configured embedding provider is unavailable (network failure,
    /// model not loaded, missing credentials).
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Vector store error.
    #[error("Vector store error: {0}")]
    Vector(String),

    /// Storage busy-timeout exceeded; caller may retry.
    #[error("Storage conflict: {0}")]
    Conflict(String),
}

impl PulseHiveError {
    /// Creates a configuration error with the given reason.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Creates an embedding error with the given message.
    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    /// Creates a vector store error with the given message.
    pub fn vector(msg: impl Into<String>) -> Self {
        Self::Vector(msg.into())
    }

    /// Creates a missing-entities error from an arbitrary iterator of names.
    pub fn missing_entities(names: impl IntoIterator<Item = String>) -> Self {
        Self::MissingEntities(names.into_iter().collect())
    }

    /// Returns true if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true if this is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a storage error.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if this is a vector store error.
    pub fn is_vector(&self) -> bool {
        matches!(self, Self::Vector(_))
    }

    /// Returns true if this is a missing-entities error.
    pub fn is_missing_entities(&self) -> bool {
        matches!(self, Self::MissingEntities(_))
    }
}

/// Storage-related errors.
///
/// These errors indicate problems with the underlying storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database file or data is corrupted.
    #[error("Database corrupted: {0}")]
    Corrupted(String),

    /// Database file not found at expected path.
    #[error("Database not found: {0}")]
    DatabaseNotFound(PathBuf),

    /// Database is locked by another writer and the busy-timeout elapsed.
    #[error("Database is locked by another writer")]
    DatabaseLocked,

    /// Transaction failed (commit, rollback, etc.).
    #[error("Transaction failed: {0}")]
    Transaction(String),

    /// Error from the SQLite engine itself.
    #[error("Storage engine error: {0}")]
    Sqlite(String),

    /// Connection pool exhausted or misconfigured.
    #[error("Connection pool error: {0}")]
    Pool(String),

    /// Database schema version doesn't match expected version.
    #[error("Schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch {
        /// Expected schema version.
        expected: u32,
        /// Actual schema version found in database.
        found: u32,
    },

    /// Migration failed partway through.
    #[error("Migration failed: {0}")]
    Migration(String),
}

impl StorageError {
    /// Creates a corruption error with the given message.
    pub fn corrupted(msg: impl Into<String>) -> Self {
        Self::Corrupted(msg.into())
    }

    /// Creates a transaction error with the given message.
    pub fn transaction(msg: impl Into<String>) -> Self {
        Self::Transaction(msg.into())
    }

    /// Creates a sqlite error with the given message.
    pub fn sqlite(msg: impl Into<String>) -> Self {
        Self::Sqlite(msg.into())
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::DatabaseBusy
                    || e.code == rusqlite::ErrorCode::DatabaseLocked =>
            {
                StorageError::DatabaseLocked
            }
            other => StorageError::Sqlite(other.to_string()),
        }
    }
}

impl From<r2d2::Error> for StorageError {
    fn from(err: r2d2::Error) -> Self {
        StorageError::Pool(err.to_string())
    }
}

impl From<rusqlite::Error> for PulseHiveError {
    fn from(err: rusqlite::Error) -> Self {
        match StorageError::from(err) {
            StorageError::DatabaseLocked => {
                PulseHiveError::Conflict("database busy-timeout exceeded".into())
            }
            other => PulseHiveError::Storage(other),
        }
    }
}

impl From<r2d2::Error> for PulseHiveError {
    fn from(err: r2d2::Error) -> Self {
        PulseHiveError::Storage(StorageError::from(err))
    }
}

/// Validation errors for input data.
///
/// These errors indicate problems with data provided by the caller.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Embedding dimension doesn't match the provider's configured dimension.
    #[error("Embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Expected dimension from the provider/model.
        expected: usize,
        /// Actual dimension provided.
        got: usize,
    },

    /// A field has an invalid value.
    #[error("Invalid field '{field}': {reason}")]
    InvalidField {
        /// Name of the invalid field.
        field: String,
        /// Why the value is invalid.
        reason: String,
    },

    /// Content exceeds maximum allowed size.
    #[error("Content too large: {size} bytes (max: {max} bytes)")]
    ContentTooLarge {
        /// Actual content size in bytes.
        size: usize,
        /// Maximum allowed size in bytes.
        max: usize,
    },

    /// A required field is missing or empty.
    #[error("Required field missing: {field}")]
    RequiredField {
        /// Name of the missing field.
        field: String,
    },

    /// Too many items in a collection field.
    #[error("Too many items in '{field}': {count} (max: {max})")]
    TooManyItems {
        /// Name of the field.
        field: String,
        /// Actual count.
        count: usize,
        /// Maximum allowed.
        max: usize,
    },
}

impl ValidationError {
    /// Creates a dimension mismatch error.
    pub fn dimension_mismatch(expected: usize, got: usize) -> Self {
        Self::DimensionMismatch { expected, got }
    }

    /// Creates an invalid field error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a content too large error.
    pub fn content_too_large(size: usize, max: usize) -> Self {
        Self::ContentTooLarge { size, max }
    }

    /// Creates a required field error.
    pub fn required_field(field: impl Into<String>) -> Self {
        Self::RequiredField {
            field: field.into(),
        }
    }

    /// Creates a too many items error.
    pub fn too_many_items(field: impl Into<String>, count: usize, max: usize) -> Self {
        Self::TooManyItems {
            field: field.into(),
            count,
            max,
        }
    }
}

/// Not found errors for specific graph entity types.
#[derive(Debug, Error)]
pub enum NotFoundError {
    /// Entity with given name not found.
    #[error("Entity not found: {0}")]
    Entity(String),

    /// Relation not found.
    #[error("Relation not found: {0}")]
    Relation(String),
}

impl NotFoundError {
    /// Creates an entity not found error.
    pub fn entity(name: impl ToString) -> Self {
        Self::Entity(name.to_string())
    }

    /// Creates a relation not found error.
    pub fn relation(desc: impl ToString) -> Self {
        Self::Relation(desc.to_string())
    }
}

/// The error taxonomy exposed by the tool layer (C4) and protocol adapters
/// (C6), per the spec's §7 error handling design. Unlike [`PulseHiveError`]
/// this never carries storage-internal detail (SQL messages, pool state) —
/// only the kind and enough context for the caller to react.
#[derive(Debug, Error, Clone, serde::Serialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum ToolError {
    /// One or more referenced entity names don't resolve.
    #[error("missing entities: {}", .names.join(", "))]
    MissingEntities {
        /// The names that failed to resolve.
        names: Vec<String>,
    },
    /// An entity with this name already exists.
    #[error("entity already exists: {name}")]
    AlreadyExists {
        /// The conflicting name.
        name: String,
    },
    /// The named entity or relation does not exist.
    #[error("not found: {name}")]
    NotFound {
        /// The name that was not found.
        name: String,
    },
    /// A field in the request failed validation.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// The offending field.
        field: String,
        /// Why it's invalid.
        reason: String,
    },
    /// The embedding provider could not be reached.
    #[error("embedding provider unavailable: {detail}")]
    ProviderUnavailable {
        /// Detail about the failure.
        detail: String,
    },
    /// A write could not be serialized against concurrent writers in time.
    #[error("conflict: {detail}")]
    Conflict {
        /// Detail about the conflict.
        detail: String,
    },
    /// Anything else — never exposes internals beyond a short summary.
    #[error("internal error: {detail}")]
    Internal {
        /// Short, non-sensitive description.
        detail: String,
    },
}

impl From<PulseHiveError> for ToolError {
    fn from(err: PulseHiveError) -> Self {
        match err {
            PulseHiveError::MissingEntities(names) => ToolError::MissingEntities { names },
            PulseHiveError::AlreadyExists(name) => ToolError::AlreadyExists { name },
            PulseHiveError::NotFound(NotFoundError::Entity(name)) => {
                ToolError::NotFound { name }
            }
            PulseHiveError::NotFound(NotFoundError::Relation(name)) => {
                ToolError::NotFound { name }
            }
            PulseHiveError::Validation(ValidationError::InvalidField { field, reason }) => {
                ToolError::Invalid { field, reason }
            }
            PulseHiveError::Validation(ValidationError::RequiredField { field }) => {
                ToolError::Invalid {
                    field,
                    reason: "required".into(),
                }
            }
            PulseHiveError::Validation(other) => ToolError::Invalid {
                field: "value".into(),
                reason: other.to_string(),
            },
            PulseHiveError::ProviderUnavailable(detail) => ToolError::ProviderUnavailable { detail },
            PulseHiveError::Embedding(detail) => ToolError::ProviderUnavailable { detail },
            PulseHiveError::Conflict(detail) => ToolError::Conflict { detail },
            other => ToolError::Internal {
                detail: other.to_string(),
            },
        }
    }
}
