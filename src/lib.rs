//! # PulseHive Graph
//!
//! Persistent knowledge-graph service: shared memory for AI agents.
//!
//! Entities, observations, and typed relations are stored in SQLite with
//! FTS5 full-text indexes and optional embeddings for semantic search.
//! [`PulseHive`] is the in-process facade implementing the fixed tool-call
//! surface (`create_entities`, `create_relations`, `add_observations`,
//! `create_subgraph`, `delete_entities`, `delete_relations`, `read_graph`,
//! `search_nodes`, `search_entities_semantic`, `search_hybrid`,
//! `generate_embeddings`, `configure_embeddings`, `get_stats`,
//! `get_server_info`); the `pulsehive-graphd` binary wraps it with HTTP+SSE
//! and stdio protocol adapters behind a runtime supervisor.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pulsehive_graph::{PulseHive, Config, NewEntity, NewRelation};
//!
//! # fn main() -> pulsehive_graph::Result<()> {
//! let graph = PulseHive::open("./graph.db", Config::default())?;
//!
//! graph.create_entities(vec![NewEntity {
//!     name: "alice".to_string(),
//!     entity_type: "person".to_string(),
//!     observations: vec!["joined the team in 2024".to_string()],
//! }])?;
//!
//! let hits = graph.search_nodes("alice", None)?;
//! assert_eq!(hits[0].entity.name, "alice");
//!
//! graph.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Thread Safety
//!
//! `PulseHive` is `Send + Sync` and can be shared across threads using
//! `Arc` — every protocol adapter holds the same instance.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

mod config;
mod error;
mod types;

pub mod embedding;
pub mod graph;
pub mod search;
pub mod storage;
pub mod vector;

pub mod protocol;
pub mod supervisor;

// ============================================================================
// Public API re-exports
// ============================================================================

pub use config::{Config, EmbeddingProviderKind, EmbeddingsConfig, VectorConfig};
pub use error::{NotFoundError, PulseHiveError, Result, StorageError, ToolError, ValidationError};
pub use graph::{
    CreateEntitiesResult, CreateRelationsResult, CreateSubgraphResult, DeleteResult, NewEntity,
    NewObservation, NewRelation, PulseHive, RelationKey, ServerInfo,
};
pub use search::ScoredEntity;
pub use storage::{DatabaseMetadata, EntityWithObservations, GraphDump};
pub use types::{EntityId, Embedding, ObservationId, RelationId, Timestamp};

/// Convenient imports for common PulseHive usage.
///
/// ```rust
/// use pulsehive_graph::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{PulseHiveError, Result};
    pub use crate::graph::{NewEntity, NewObservation, NewRelation, PulseHive};
    pub use crate::search::ScoredEntity;
}
