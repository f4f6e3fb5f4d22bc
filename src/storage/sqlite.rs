//! SQLite-backed [`StorageEngine`] implementation.
//!
//! Connections are pooled (`r2d2` + `r2d2_sqlite`) rather than held behind a
//! single mutex, so concurrent readers from the HTTP adapter don't serialize
//! on each other — writers still serialize through SQLite's own WAL locking.
//! Grounded on the pooled-SQLite pattern used throughout the example corpus
//! for embedded agent-memory stores (see DESIGN.md).

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::instrument;

use super::schema::{self, DatabaseMetadata, SCHEMA_VERSION};
use super::{
    EntityWithObservations, GraphDump, LexicalMatch, RelationRecord, StorageEngine, StorageStats,
};
use crate::config::Config;
use crate::error::{NotFoundError, PulseHiveError, Result, StorageError};
use crate::types::{EntityId, ObservationId, RelationId, Timestamp};

/// Sets PRAGMAs that must be applied per-connection (not persisted in the
/// database file) on every connection handed out by the pool.
#[derive(Debug)]
struct ConnectionCustomizer {
    busy_timeout_ms: u32,
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for ConnectionCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(std::time::Duration::from_millis(self.busy_timeout_ms as u64))?;
        Ok(())
    }
}

/// SQLite-backed storage engine.
pub struct SqliteStorage {
    pool: Pool<SqliteConnectionManager>,
    path: PathBuf,
}

impl SqliteStorage {
    /// Opens (creating if absent) the database at `path`, applies the
    /// schema, and runs any pending migration.
    #[instrument(skip(config), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, config: &Config) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(&path);
        let pool = Pool::builder()
            .max_size(16)
            .connection_customizer(Box::new(ConnectionCustomizer {
                busy_timeout_ms: config.busy_timeout_ms,
            }))
            .build(manager)
            .map_err(StorageError::from)?;

        {
            let conn = pool.get().map_err(StorageError::from)?;
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
            schema::initialize(&conn)?;
        }

        tracing::info!(path = %path.display(), "storage engine opened");
        Ok(Self { pool, path })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(PulseHiveError::from)
    }

    fn fetch_entity_id(conn: &Connection, name: &str) -> Result<i64> {
        conn.query_row("SELECT id FROM entities WHERE name = ?1", params![name], |r| r.get(0))
            .optional()?
            .ok_or_else(|| PulseHiveError::NotFound(NotFoundError::entity(name)))
    }

    fn observations_for(
        conn: &Connection,
        entity_id: i64,
        matched: Option<&HashSet<i64>>,
    ) -> Result<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT id, content FROM observations WHERE entity_id = ?1 ORDER BY created_at ASC, id ASC",
        )?;
        let rows = stmt
            .query_map(params![entity_id], |row| {
                let id: i64 = row.get(0)?;
                let content: String = row.get(1)?;
                Ok((id, content))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        match matched {
            None => Ok(rows.into_iter().map(|(_, content)| content).collect()),
            Some(matched) => {
                let (mut hit, mut miss) = (Vec::new(), Vec::new());
                for (id, content) in rows {
                    if matched.contains(&id) {
                        hit.push(content);
                    } else {
                        miss.push(content);
                    }
                }
                hit.extend(miss);
                Ok(hit)
            }
        }
    }

    fn hydrate_entity(
        conn: &Connection,
        entity_id: i64,
        matched: Option<&HashSet<i64>>,
    ) -> Result<EntityWithObservations> {
        let (name, entity_type): (String, String) = conn.query_row(
            "SELECT name, entity_type FROM entities WHERE id = ?1",
            params![entity_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;
        let observations = Self::observations_for(conn, entity_id, matched)?;
        Ok(EntityWithObservations {
            name,
            entity_type,
            observations,
        })
    }

    fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
        blob.chunks_exact(4)
            .map(|chunk| f32::from_le_bytes(chunk.try_into().unwrap()))
            .collect()
    }

    /// Builds an OR-joined, quote-escaped FTS5 MATCH expression from a raw
    /// query string — each whitespace token becomes a quoted literal so FTS5
    /// operators in user input don't trigger syntax errors, joined with
    /// explicit `OR` so any token may match (§4.5 requires OR-semantics,
    /// unlike an AND-of-quoted-terms sanitizer).
    fn fts_or_query(query: &str) -> Option<String> {
        let terms: Vec<String> = query
            .split_whitespace()
            .map(|term| {
                let stripped = term.trim_matches('"');
                format!("\"{}\"", stripped.replace('"', "\"\""))
            })
            .collect();
        if terms.is_empty() {
            None
        } else {
            Some(terms.join(" OR "))
        }
    }
}

impl StorageEngine for SqliteStorage {
    fn metadata(&self) -> Result<DatabaseMetadata> {
        let conn = self.conn()?;
        let row: Option<(u32, i64)> = conn
            .query_row(
                "SELECT version, applied_at FROM schema_metadata ORDER BY version DESC LIMIT 1",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        let (schema_version, applied_at) = row.unwrap_or((SCHEMA_VERSION, Timestamp::now().as_millis()));
        Ok(DatabaseMetadata {
            schema_version,
            applied_at: Timestamp::from_millis(applied_at),
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    #[instrument(skip(self))]
    fn checkpoint(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch("PRAGMA wal_checkpoint(FULL);")?;
        Ok(())
    }

    #[instrument(skip(self))]
    fn create_entity(&self, name: &str, entity_type: &str) -> Result<EntityId> {
        let conn = self.conn()?;
        let now = Timestamp::now().as_millis();
        let result = conn.execute(
            "INSERT INTO entities (name, entity_type, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
            params![name, entity_type, now],
        );
        match result {
            Ok(_) => Ok(EntityId::new(conn.last_insert_rowid())),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(PulseHiveError::AlreadyExists(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn find_entity_id(&self, name: &str) -> Result<Option<EntityId>> {
        let conn = self.conn()?;
        let id: Option<i64> = conn
            .query_row("SELECT id FROM entities WHERE name = ?1", params![name], |r| r.get(0))
            .optional()?;
        Ok(id.map(EntityId::new))
    }

    fn missing_entities(&self, names: &[String]) -> Result<Vec<String>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn()?;
        let placeholders = names.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!("SELECT name FROM entities WHERE name IN ({placeholders})");
        let mut stmt = conn.prepare(&sql)?;
        let found: HashSet<String> = stmt
            .query_map(params_from_iter(names.iter()), |r| r.get::<_, String>(0))?
            .collect::<std::result::Result<_, _>>()?;
        Ok(names.iter().filter(|n| !found.contains(*n)).cloned().collect())
    }

    #[instrument(skip(self, content))]
    fn add_observation(&self, entity_name: &str, content: &str) -> Result<ObservationId> {
        let conn = self.conn()?;
        let entity_id = Self::fetch_entity_id(&conn, entity_name)?;
        let now = Timestamp::now().as_millis();
        conn.execute(
            "INSERT INTO observations (entity_id, content, created_at) VALUES (?1, ?2, ?3)",
            params![entity_id, content, now],
        )?;
        conn.execute(
            "UPDATE entities SET updated_at = ?1 WHERE id = ?2",
            params![now, entity_id],
        )?;
        Ok(ObservationId::new(conn.last_insert_rowid()))
    }

    #[instrument(skip(self))]
    fn create_relation(
        &self,
        from_name: &str,
        to_name: &str,
        relation_type: &str,
    ) -> Result<RelationId> {
        let conn = self.conn()?;
        let from_id = Self::fetch_entity_id(&conn, from_name)?;
        let to_id = Self::fetch_entity_id(&conn, to_name)?;
        let now = Timestamp::now().as_millis();

        conn.execute(
            "INSERT OR IGNORE INTO relations (from_entity, to_entity, relation_type, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![from_id, to_id, relation_type, now],
        )?;

        let id: i64 = conn.query_row(
            "SELECT id FROM relations WHERE from_entity = ?1 AND to_entity = ?2 AND relation_type = ?3",
            params![from_id, to_id, relation_type],
            |r| r.get(0),
        )?;
        Ok(RelationId::new(id))
    }

    #[instrument(skip(self))]
    fn delete_entity(&self, name: &str) -> Result<bool> {
        let conn = self.conn()?;
        let affected = conn.execute("DELETE FROM entities WHERE name = ?1", params![name])?;
        Ok(affected > 0)
    }

    #[instrument(skip(self))]
    fn delete_relation(&self, from_name: &str, to_name: &str, relation_type: &str) -> Result<bool> {
        let conn = self.conn()?;
        let from_id: Option<i64> = conn
            .query_row("SELECT id FROM entities WHERE name = ?1", params![from_name], |r| r.get(0))
            .optional()?;
        let to_id: Option<i64> = conn
            .query_row("SELECT id FROM entities WHERE name = ?1", params![to_name], |r| r.get(0))
            .optional()?;
        let (Some(from_id), Some(to_id)) = (from_id, to_id) else {
            return Ok(false);
        };
        let affected = conn.execute(
            "DELETE FROM relations WHERE from_entity = ?1 AND to_entity = ?2 AND relation_type = ?3",
            params![from_id, to_id, relation_type],
        )?;
        Ok(affected > 0)
    }

    fn read_graph(&self) -> Result<GraphDump> {
        let conn = self.conn()?;
        let mut entity_stmt = conn.prepare("SELECT id FROM entities ORDER BY id ASC")?;
        let entity_ids: Vec<i64> = entity_stmt
            .query_map([], |r| r.get(0))?
            .collect::<std::result::Result<_, _>>()?;
        let entities = entity_ids
            .into_iter()
            .map(|id| Self::hydrate_entity(&conn, id, None))
            .collect::<Result<Vec<_>>>()?;

        let mut rel_stmt = conn.prepare(
            "SELECT r.id, ef.name, et.name, r.relation_type, r.created_at, r.updated_at
             FROM relations r
             JOIN entities ef ON ef.id = r.from_entity
             JOIN entities et ON et.id = r.to_entity
             ORDER BY r.id ASC",
        )?;
        let relations = rel_stmt
            .query_map([], |row| {
                Ok(RelationRecord {
                    id: RelationId::new(row.get(0)?),
                    from_entity: row.get(1)?,
                    to_entity: row.get(2)?,
                    relation_type: row.get(3)?,
                    created_at: Timestamp::from_millis(row.get(4)?),
                    updated_at: Timestamp::from_millis(row.get(5)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(GraphDump { entities, relations })
    }

    fn get_entity(&self, name: &str) -> Result<Option<EntityWithObservations>> {
        let conn = self.conn()?;
        let id: Option<i64> = conn
            .query_row("SELECT id FROM entities WHERE name = ?1", params![name], |r| r.get(0))
            .optional()?;
        match id {
            None => Ok(None),
            Some(id) => Ok(Some(Self::hydrate_entity(&conn, id, None)?)),
        }
    }

    #[instrument(skip(self))]
    fn search_lexical(&self, query: &str, k: usize) -> Result<Vec<LexicalMatch>> {
        let Some(match_expr) = Self::fts_or_query(query) else {
            return Ok(Vec::new());
        };
        let conn = self.conn()?;

        let mut name_scores: HashMap<i64, f64> = HashMap::new();
        {
            let mut stmt = conn.prepare(
                "SELECT rowid, bm25(entities_fts) FROM entities_fts WHERE entities_fts MATCH ?1",
            )?;
            let rows = stmt.query_map(params![match_expr], |r| {
                Ok((r.get::<_, i64>(0)?, r.get::<_, f64>(1)?))
            })?;
            for row in rows {
                let (id, bm25) = row?;
                name_scores.insert(id, -bm25);
            }
        }

        let mut obs_hits: HashMap<i64, (f64, HashSet<i64>)> = HashMap::new();
        {
            let mut stmt = conn.prepare(
                "SELECT rowid, bm25(observations_fts) FROM observations_fts WHERE observations_fts MATCH ?1",
            )?;
            let rows = stmt
                .query_map(params![match_expr], |r| {
                    Ok((r.get::<_, i64>(0)?, r.get::<_, f64>(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            for (obs_id, bm25) in rows {
                let entity_id: i64 = conn.query_row(
                    "SELECT entity_id FROM observations WHERE id = ?1",
                    params![obs_id],
                    |r| r.get(0),
                )?;
                let entry = obs_hits.entry(entity_id).or_insert((0.0, HashSet::new()));
                entry.0 += -bm25;
                entry.1.insert(obs_id);
            }
        }

        let mut entity_ids: HashSet<i64> = name_scores.keys().copied().collect();
        entity_ids.extend(obs_hits.keys().copied());

        let mut scored: Vec<(i64, f64, usize)> = entity_ids
            .into_iter()
            .map(|id| {
                let name_score = name_scores.get(&id).copied().unwrap_or(0.0);
                let (obs_score, obs_set) = obs_hits
                    .get(&id)
                    .map(|(s, set)| (*s, set.len()))
                    .unwrap_or((0.0, 0));
                (id, 2.0 * name_score + obs_score, obs_set)
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(id, score, observation_matches)| {
                let matched = obs_hits.get(&id).map(|(_, set)| set);
                let entity = Self::hydrate_entity(&conn, id, matched)?;
                Ok(LexicalMatch {
                    entity,
                    score,
                    observation_matches,
                })
            })
            .collect()
    }

    fn get_stats(&self) -> Result<StorageStats> {
        let conn = self.conn()?;
        let entity_count: u64 = conn.query_row("SELECT COUNT(*) FROM entities", [], |r| r.get(0))?;
        let observation_count: u64 =
            conn.query_row("SELECT COUNT(*) FROM observations", [], |r| r.get(0))?;
        let relation_count: u64 = conn.query_row("SELECT COUNT(*) FROM relations", [], |r| r.get(0))?;
        let embedding_count: u64 = conn.query_row("SELECT COUNT(*) FROM embeddings", [], |r| r.get(0))?;
        Ok(StorageStats {
            entity_count,
            observation_count,
            relation_count,
            embedding_count,
        })
    }

    fn put_embedding(&self, entity_id: EntityId, model_name: &str, embedding: &[f32]) -> Result<()> {
        let conn = self.conn()?;
        let now = Timestamp::now().as_millis();
        let blob = Self::embedding_to_blob(embedding);
        conn.execute(
            "INSERT INTO embeddings (entity_id, model_name, dimensions, embedding, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(entity_id, model_name) DO UPDATE SET
                dimensions = excluded.dimensions,
                embedding = excluded.embedding,
                created_at = excluded.created_at",
            params![entity_id.get(), model_name, embedding.len() as i64, blob, now],
        )?;
        Ok(())
    }

    fn put_embeddings_batch(&self, items: &[(EntityId, &str, &[f32])]) -> Result<()> {
        let mut conn = self.conn()?;
        let now = Timestamp::now().as_millis();
        let tx = conn.transaction()?;
        for (entity_id, model_name, embedding) in items {
            let blob = Self::embedding_to_blob(embedding);
            tx.execute(
                "INSERT INTO embeddings (entity_id, model_name, dimensions, embedding, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(entity_id, model_name) DO UPDATE SET
                    dimensions = excluded.dimensions,
                    embedding = excluded.embedding,
                    created_at = excluded.created_at",
                params![entity_id.get(), model_name, embedding.len() as i64, blob, now],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get_embedding(&self, entity_id: EntityId, model_name: Option<&str>) -> Result<Option<Vec<f32>>> {
        let conn = self.conn()?;
        let blob: Option<Vec<u8>> = match model_name {
            Some(model) => conn
                .query_row(
                    "SELECT embedding FROM embeddings WHERE entity_id = ?1 AND model_name = ?2",
                    params![entity_id.get(), model],
                    |r| r.get(0),
                )
                .optional()?,
            None => conn
                .query_row(
                    "SELECT embedding FROM embeddings WHERE entity_id = ?1 LIMIT 1",
                    params![entity_id.get()],
                    |r| r.get(0),
                )
                .optional()?,
        };
        Ok(blob.map(|b| Self::blob_to_embedding(&b)))
    }

    fn has_embedding(&self, entity_id: EntityId, model_name: Option<&str>) -> Result<bool> {
        let conn = self.conn()?;
        let exists = match model_name {
            Some(model) => conn
                .prepare("SELECT 1 FROM embeddings WHERE entity_id = ?1 AND model_name = ?2")?
                .exists(params![entity_id.get(), model])?,
            None => conn
                .prepare("SELECT 1 FROM embeddings WHERE entity_id = ?1")?
                .exists(params![entity_id.get()])?,
        };
        Ok(exists)
    }

    fn delete_embedding(&self, entity_id: EntityId, model_name: Option<&str>) -> Result<()> {
        let conn = self.conn()?;
        match model_name {
            Some(model) => conn.execute(
                "DELETE FROM embeddings WHERE entity_id = ?1 AND model_name = ?2",
                params![entity_id.get(), model],
            )?,
            None => conn.execute(
                "DELETE FROM embeddings WHERE entity_id = ?1",
                params![entity_id.get()],
            )?,
        };
        Ok(())
    }

    fn all_embeddings(&self, model_name: &str) -> Result<Vec<(EntityId, Vec<f32>)>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT entity_id, embedding FROM embeddings WHERE model_name = ?1")?;
        let rows = stmt
            .query_map(params![model_name], |row| {
                let id: i64 = row.get(0)?;
                let blob: Vec<u8> = row.get(1)?;
                Ok((EntityId::new(id), blob))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows
            .into_iter()
            .map(|(id, blob)| (id, Self::blob_to_embedding(&blob)))
            .collect())
    }

    fn entities_without_embedding(&self, model_name: &str) -> Result<Vec<EntityId>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id FROM entities WHERE id NOT IN
             (SELECT entity_id FROM embeddings WHERE model_name = ?1)",
        )?;
        let rows = stmt
            .query_map(params![model_name], |r| r.get::<_, i64>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows.into_iter().map(EntityId::new).collect())
    }

    fn entity_name(&self, id: EntityId) -> Result<Option<String>> {
        let conn = self.conn()?;
        let name: Option<String> = conn
            .query_row("SELECT name FROM entities WHERE id = ?1", params![id.get()], |r| r.get(0))
            .optional()?;
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open() -> (tempfile::TempDir, SqliteStorage) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("graph.db");
        let storage = SqliteStorage::open(&path, &Config::default()).unwrap();
        (dir, storage)
    }

    #[test]
    fn test_create_and_find_entity() {
        let (_dir, storage) = open();
        let id = storage.create_entity("alice", "person").unwrap();
        assert_eq!(storage.find_entity_id("alice").unwrap(), Some(id));
    }

    #[test]
    fn test_create_entity_duplicate_name_rejected() {
        let (_dir, storage) = open();
        storage.create_entity("alice", "person").unwrap();
        let err = storage.create_entity("alice", "person").unwrap_err();
        assert!(matches!(err, PulseHiveError::AlreadyExists(_)));
    }

    #[test]
    fn test_add_observation_and_read_back() {
        let (_dir, storage) = open();
        storage.create_entity("alice", "person").unwrap();
        storage.add_observation("alice", "likes tea").unwrap();
        storage.add_observation("alice", "works remote").unwrap();
        let entity = storage.get_entity("alice").unwrap().unwrap();
        assert_eq!(entity.observations, vec!["likes tea", "works remote"]);
    }

    #[test]
    fn test_add_observation_missing_entity() {
        let (_dir, storage) = open();
        let err = storage.add_observation("ghost", "x").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_create_relation_idempotent() {
        let (_dir, storage) = open();
        storage.create_entity("alice", "person").unwrap();
        storage.create_entity("bob", "person").unwrap();
        let id1 = storage.create_relation("alice", "bob", "knows").unwrap();
        let id2 = storage.create_relation("alice", "bob", "knows").unwrap();
        assert_eq!(id1, id2);
    }

    #[test]
    fn test_self_relation_allowed() {
        let (_dir, storage) = open();
        storage.create_entity("alice", "person").unwrap();
        assert!(storage.create_relation("alice", "alice", "self").is_ok());
    }

    #[test]
    fn test_delete_entity_cascades_relations_and_observations() {
        let (_dir, storage) = open();
        storage.create_entity("alice", "person").unwrap();
        storage.create_entity("bob", "person").unwrap();
        storage.add_observation("alice", "hi").unwrap();
        storage.create_relation("alice", "bob", "knows").unwrap();

        assert!(storage.delete_entity("alice").unwrap());
        assert!(storage.get_entity("alice").unwrap().is_none());

        let stats = storage.get_stats().unwrap();
        assert_eq!(stats.relation_count, 0);
        assert_eq!(stats.observation_count, 0);
    }

    #[test]
    fn test_delete_entity_idempotent() {
        let (_dir, storage) = open();
        assert!(!storage.delete_entity("ghost").unwrap());
    }

    #[test]
    fn test_delete_relation_missing_endpoint_is_noop() {
        let (_dir, storage) = open();
        storage.create_entity("alice", "person").unwrap();
        assert!(!storage.delete_relation("alice", "ghost", "knows").unwrap());
    }

    #[test]
    fn test_missing_entities_reports_unresolved_names() {
        let (_dir, storage) = open();
        storage.create_entity("alice", "person").unwrap();
        let missing = storage
            .missing_entities(&["alice".to_string(), "ghost".to_string()])
            .unwrap();
        assert_eq!(missing, vec!["ghost".to_string()]);
    }

    #[test]
    fn test_search_lexical_or_semantics_across_tokens() {
        let (_dir, storage) = open();
        storage.create_entity("alice", "person").unwrap();
        storage.create_entity("bob", "person").unwrap();
        storage.add_observation("alice", "loves rust programming").unwrap();
        storage.add_observation("bob", "enjoys hiking trails").unwrap();

        let results = storage.search_lexical("rust hiking", 10).unwrap();
        let names: Vec<&str> = results.iter().map(|m| m.entity.name.as_str()).collect();
        assert!(names.contains(&"alice"));
        assert!(names.contains(&"bob"));
    }

    #[test]
    fn test_search_lexical_name_match_weighted_double() {
        let (_dir, storage) = open();
        storage.create_entity("rust", "language").unwrap();
        storage.create_entity("other", "language").unwrap();
        storage.add_observation("other", "rust is mentioned here").unwrap();

        let results = storage.search_lexical("rust", 10).unwrap();
        assert_eq!(results[0].entity.name, "rust");
    }

    #[test]
    fn test_embedding_roundtrip() {
        let (_dir, storage) = open();
        let id = storage.create_entity("alice", "person").unwrap();
        storage.put_embedding(id, "model-a", &[1.0, 2.0, 3.0]).unwrap();
        let got = storage.get_embedding(id, Some("model-a")).unwrap().unwrap();
        assert_eq!(got, vec![1.0, 2.0, 3.0]);
        assert!(storage.has_embedding(id, Some("model-a")).unwrap());
        storage.delete_embedding(id, Some("model-a")).unwrap();
        assert!(!storage.has_embedding(id, Some("model-a")).unwrap());
    }

    #[test]
    fn test_entities_without_embedding() {
        let (_dir, storage) = open();
        let a = storage.create_entity("a", "t").unwrap();
        let _b = storage.create_entity("b", "t").unwrap();
        storage.put_embedding(a, "m", &[0.1]).unwrap();
        let missing = storage.entities_without_embedding("m").unwrap();
        assert_eq!(missing.len(), 1);
    }

    #[test]
    fn test_checkpoint_visible_across_connections() {
        let (_dir, storage) = open();
        storage.create_entity("alice", "person").unwrap();
        storage.checkpoint().unwrap();
        let reopened = SqliteStorage::open(storage.path(), &Config::default()).unwrap();
        assert!(reopened.get_entity("alice").unwrap().is_some());
    }
}
