//! Storage layer for the knowledge graph.
//!
//! This module provides a trait-based abstraction over the storage engine so
//! the graph API (C4) and search layer (C5) don't depend on SQLite directly.
//! The production implementation is [`SqliteStorage`]; tests can substitute
//! any other `StorageEngine`.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       graph::Graph                          │
//! │                         │                                    │
//! │                         ▼                                    │
//! │              ┌─────────────────────┐                        │
//! │              │   StorageEngine     │  ← Trait               │
//! │              └─────────────────────┘                        │
//! │                         ▲                                    │
//! │                         │                                    │
//! │                ┌────────┴────────┐                           │
//! │                │  SqliteStorage  │                          │
//! │                └─────────────────┘                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod schema;
pub mod sqlite;

pub use schema::{DatabaseMetadata, SCHEMA_VERSION};
pub use sqlite::SqliteStorage;

use std::path::Path;

use serde::Serialize;

use crate::config::Config;
use crate::error::Result;
use crate::types::{EntityId, ObservationId, RelationId, Timestamp};

/// A stored entity row.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EntityRecord {
    /// Internal id.
    pub id: EntityId,
    /// External key. Globally unique.
    pub name: String,
    /// Free-form type tag.
    pub entity_type: String,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last-updated time.
    pub updated_at: Timestamp,
}

/// A stored observation row.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ObservationRecord {
    /// Internal id.
    pub id: ObservationId,
    /// Owning entity.
    pub entity_id: EntityId,
    /// Observation text.
    pub content: String,
    /// Creation time.
    pub created_at: Timestamp,
}

/// A stored relation row, endpoints resolved to names for external use.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RelationRecord {
    /// Internal id.
    pub id: RelationId,
    /// Source entity name.
    pub from_entity: String,
    /// Target entity name.
    pub to_entity: String,
    /// Edge type.
    pub relation_type: String,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last-updated time.
    pub updated_at: Timestamp,
}

/// An entity together with its observation texts, in display order
/// (created_at ascending, ties broken by id).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EntityWithObservations {
    /// Entity name.
    pub name: String,
    /// Entity type.
    pub entity_type: String,
    /// Observation texts.
    pub observations: Vec<String>,
}

/// A full graph dump: every entity (with its observations) and every
/// relation, as returned by `read_graph`.
#[derive(Clone, Debug, Default, Serialize)]
pub struct GraphDump {
    /// All entities.
    pub entities: Vec<EntityWithObservations>,
    /// All relations.
    pub relations: Vec<RelationRecord>,
}

/// A single lexical (BM25) search hit.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LexicalMatch {
    /// Matching entity.
    pub entity: EntityWithObservations,
    /// Combined relevance score (2x name match + sum of observation matches).
    pub score: f64,
    /// How many observations on this entity matched the query.
    pub observation_matches: usize,
}

/// Aggregate counts reported by `get_stats`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct StorageStats {
    /// Total entities.
    pub entity_count: u64,
    /// Total observations.
    pub observation_count: u64,
    /// Total relations.
    pub relation_count: u64,
    /// Total stored embeddings (across all models).
    pub embedding_count: u64,
}

/// Storage engine trait for the knowledge graph.
///
/// Implementations must be `Send + Sync` — the graph API shares one engine
/// across every protocol adapter and background task.
pub trait StorageEngine: Send + Sync {
    /// Returns the database metadata (schema version, last-applied time).
    fn metadata(&self) -> Result<DatabaseMetadata>;

    /// Path to the underlying database file.
    fn path(&self) -> &Path;

    /// Forces a WAL checkpoint so buffered writes become visible to other
    /// connections/processes. Called after every mutating call by the graph
    /// API (C4), per the durability contract in §5.
    fn checkpoint(&self) -> Result<()>;

    /// Creates an entity. Returns `AlreadyExists` if the name is taken.
    fn create_entity(&self, name: &str, entity_type: &str) -> Result<EntityId>;

    /// Looks up an entity's internal id by name.
    fn find_entity_id(&self, name: &str) -> Result<Option<EntityId>>;

    /// Returns which of the given names do not resolve to an entity.
    fn missing_entities(&self, names: &[String]) -> Result<Vec<String>>;

    /// Appends an observation to an entity. `NotFound` if the entity is missing.
    fn add_observation(&self, entity_name: &str, content: &str) -> Result<ObservationId>;

    /// Creates (or no-ops on) a relation. Returns the relation id either way.
    fn create_relation(
        &self,
        from_name: &str,
        to_name: &str,
        relation_type: &str,
    ) -> Result<RelationId>;

    /// Deletes an entity by name, cascading observations/relations/embeddings.
    /// Returns `true` if it existed.
    fn delete_entity(&self, name: &str) -> Result<bool>;

    /// Deletes a relation by its (from, to, type) identity. Returns `true`
    /// if it existed.
    fn delete_relation(&self, from_name: &str, to_name: &str, relation_type: &str) -> Result<bool>;

    /// Dumps the entire graph.
    fn read_graph(&self) -> Result<GraphDump>;

    /// Fetches one entity with its observations, or `None`.
    fn get_entity(&self, name: &str) -> Result<Option<EntityWithObservations>>;

    /// Lexical (BM25) search over entity names/types and observation text.
    /// OR-semantics across query tokens, per §4.5.
    fn search_lexical(&self, query: &str, k: usize) -> Result<Vec<LexicalMatch>>;

    /// Aggregate counts.
    fn get_stats(&self) -> Result<StorageStats>;

    /// Stores (upserts) an embedding for (entity, model).
    fn put_embedding(&self, entity_id: EntityId, model_name: &str, embedding: &[f32]) -> Result<()>;

    /// Batch variant of [`StorageEngine::put_embedding`] — one transaction.
    fn put_embeddings_batch(&self, items: &[(EntityId, &str, &[f32])]) -> Result<()>;

    /// Fetches an embedding. `model_name = None` returns any one embedding
    /// for the entity.
    fn get_embedding(&self, entity_id: EntityId, model_name: Option<&str>) -> Result<Option<Vec<f32>>>;

    /// Returns true if an embedding exists for the entity (optionally for a
    /// specific model).
    fn has_embedding(&self, entity_id: EntityId, model_name: Option<&str>) -> Result<bool>;

    /// Deletes embeddings for an entity, optionally scoped to one model.
    fn delete_embedding(&self, entity_id: EntityId, model_name: Option<&str>) -> Result<()>;

    /// Scans every stored embedding for the given model, for linear-scan
    /// cosine search in [`crate::vector`].
    fn all_embeddings(&self, model_name: &str) -> Result<Vec<(EntityId, Vec<f32>)>>;

    /// Entity ids missing an embedding for the given model (candidates for
    /// `generate_embeddings`).
    fn entities_without_embedding(&self, model_name: &str) -> Result<Vec<EntityId>>;

    /// Resolves an entity id back to its name (for search result hydration).
    fn entity_name(&self, id: EntityId) -> Result<Option<String>>;
}

/// Opens a [`SqliteStorage`] engine at the given path.
pub fn open_storage(path: impl AsRef<Path>, config: &Config) -> Result<SqliteStorage> {
    SqliteStorage::open(path, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_storage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let config = Config::default();
        let storage = open_storage(&path, &config).unwrap();
        assert_eq!(storage.path(), path.as_path());
        assert_eq!(storage.metadata().unwrap().schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn test_storage_engine_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SqliteStorage>();
    }
}
