//! Database schema definitions and versioning for the SQLite storage engine.
//!
//! # Schema Versioning
//!
//! The schema version is stored in the `schema_metadata` table. When opening
//! an existing database, [`migrate`] brings it forward to [`SCHEMA_VERSION`];
//! migration is idempotent and safe to run on every open.
//!
//! # Table Layout
//!
//! ```text
//! entities(id, name UNIQUE, entity_type, created_at, updated_at)
//! observations(id, entity_id -> entities.id, content, created_at)
//! relations(id, from_entity -> entities.id, to_entity -> entities.id,
//!           relation_type, created_at, updated_at,
//!           UNIQUE(from_entity, to_entity, relation_type))
//! embeddings(entity_id, model_name, dimensions, embedding BLOB, created_at,
//!            PRIMARY KEY(entity_id, model_name))
//! schema_metadata(version, description, applied_at, updated_at)
//! entities_fts(name, entity_type)          -- content table: entities
//! observations_fts(content)                -- content table: observations
//! ```

use rusqlite::Connection;

use crate::error::{Result, StorageError};
use crate::types::Timestamp;

/// Current schema version. The database refuses to downgrade; opening an
/// older on-disk version triggers [`migrate`].
pub const SCHEMA_VERSION: u32 = 2;

/// Maximum observation content size in bytes.
pub const MAX_CONTENT_SIZE: usize = 100 * 1024;

/// Maximum entity name length.
pub const MAX_NAME_LENGTH: usize = 512;

/// Maximum entity/relation type length.
pub const MAX_TYPE_LENGTH: usize = 128;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS entities (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL UNIQUE,
    entity_type TEXT NOT NULL,
    created_at  INTEGER NOT NULL,
    updated_at  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS observations (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_id  INTEGER NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
    content    TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_observations_entity_created
    ON observations(entity_id, created_at);

CREATE TABLE IF NOT EXISTS relations (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    from_entity   INTEGER NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
    to_entity     INTEGER NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
    relation_type TEXT NOT NULL,
    created_at    INTEGER NOT NULL,
    updated_at    INTEGER NOT NULL,
    UNIQUE(from_entity, to_entity, relation_type)
);

CREATE INDEX IF NOT EXISTS idx_relations_from ON relations(from_entity);
CREATE INDEX IF NOT EXISTS idx_relations_to ON relations(to_entity);
CREATE INDEX IF NOT EXISTS idx_relations_type ON relations(relation_type);
CREATE INDEX IF NOT EXISTS idx_entities_type ON entities(entity_type);

CREATE TABLE IF NOT EXISTS embeddings (
    entity_id  INTEGER NOT NULL REFERENCES entities(id) ON DELETE CASCADE,
    model_name TEXT NOT NULL,
    dimensions INTEGER NOT NULL,
    embedding  BLOB NOT NULL,
    created_at INTEGER NOT NULL,
    PRIMARY KEY (entity_id, model_name)
);

CREATE INDEX IF NOT EXISTS idx_embeddings_model ON embeddings(model_name);

CREATE TABLE IF NOT EXISTS schema_metadata (
    version     INTEGER NOT NULL,
    description TEXT NOT NULL,
    applied_at  INTEGER NOT NULL,
    updated_at  INTEGER NOT NULL
);

CREATE VIRTUAL TABLE IF NOT EXISTS entities_fts USING fts5(
    name,
    entity_type,
    content = 'entities',
    content_rowid = 'id'
);

CREATE TRIGGER IF NOT EXISTS entities_ai AFTER INSERT ON entities BEGIN
    INSERT INTO entities_fts(rowid, name, entity_type)
    VALUES (new.id, new.name, new.entity_type);
END;

CREATE TRIGGER IF NOT EXISTS entities_ad AFTER DELETE ON entities BEGIN
    INSERT INTO entities_fts(entities_fts, rowid, name, entity_type)
    VALUES ('delete', old.id, old.name, old.entity_type);
END;

CREATE TRIGGER IF NOT EXISTS entities_au AFTER UPDATE ON entities BEGIN
    INSERT INTO entities_fts(entities_fts, rowid, name, entity_type)
    VALUES ('delete', old.id, old.name, old.entity_type);
    INSERT INTO entities_fts(rowid, name, entity_type)
    VALUES (new.id, new.name, new.entity_type);
END;

CREATE VIRTUAL TABLE IF NOT EXISTS observations_fts USING fts5(
    content,
    content = 'observations',
    content_rowid = 'id'
);

CREATE TRIGGER IF NOT EXISTS observations_ai AFTER INSERT ON observations BEGIN
    INSERT INTO observations_fts(rowid, content) VALUES (new.id, new.content);
END;

CREATE TRIGGER IF NOT EXISTS observations_ad AFTER DELETE ON observations BEGIN
    INSERT INTO observations_fts(observations_fts, rowid, content)
    VALUES ('delete', old.id, old.content);
END;
"#;

/// Database metadata read back from `schema_metadata`.
#[derive(Clone, Debug)]
pub struct DatabaseMetadata {
    /// Schema version currently applied.
    pub schema_version: u32,
    /// When the current schema version was applied.
    pub applied_at: Timestamp,
}

/// Applies the base schema (idempotent — every statement is `IF NOT EXISTS`)
/// and runs [`migrate`] to bring a pre-existing database up to
/// [`SCHEMA_VERSION`].
pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)
        .map_err(|e| StorageError::migration(format!("schema init failed: {e}")))?;
    migrate(conn)?;
    Ok(())
}

/// Reads the currently applied schema version, or `0` if `schema_metadata`
/// has no rows (fresh database before its first `migrate` call).
pub fn current_version(conn: &Connection) -> Result<u32> {
    let version: Option<u32> = conn
        .query_row(
            "SELECT version FROM schema_metadata ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .ok();
    Ok(version.unwrap_or(0))
}

/// Brings the schema forward to [`SCHEMA_VERSION`]. Idempotent: a database
/// already at the current version is untouched beyond a metadata read.
///
/// Version 1 -> 2 migrates a legacy `entities.observations` JSON-array
/// column (one array element per historical observation) into individual
/// rows in the `observations` table, preserving array order as the
/// `created_at` ordering, then drops the column.
pub fn migrate(conn: &Connection) -> Result<()> {
    let version = current_version(conn)?;
    if version >= SCHEMA_VERSION {
        return Ok(());
    }

    if version < 2 {
        migrate_legacy_observations_column(conn)?;
    }

    let now = Timestamp::now().as_millis();
    conn.execute(
        "INSERT INTO schema_metadata (version, description, applied_at, updated_at)
         VALUES (?1, ?2, ?3, ?3)",
        rusqlite::params![SCHEMA_VERSION, "observations table + fts5", now],
    )
    .map_err(|e| StorageError::migration(format!("failed to record schema version: {e}")))?;

    Ok(())
}

fn migrate_legacy_observations_column(conn: &Connection) -> Result<()> {
    let has_legacy_column: bool = conn
        .prepare("SELECT 1 FROM pragma_table_info('entities') WHERE name = 'observations'")
        .and_then(|mut stmt| stmt.exists([]))
        .unwrap_or(false);

    if !has_legacy_column {
        return Ok(());
    }

    let mut stmt = conn
        .prepare("SELECT id, observations, created_at FROM entities")
        .map_err(|e| StorageError::migration(e.to_string()))?;
    let rows = stmt
        .query_map([], |row| {
            let id: i64 = row.get(0)?;
            let raw: String = row.get(1)?;
            let created_at: i64 = row.get(2)?;
            Ok((id, raw, created_at))
        })
        .map_err(|e| StorageError::migration(e.to_string()))?;

    for row in rows {
        let (entity_id, raw, created_at) = row.map_err(|e| StorageError::migration(e.to_string()))?;
        let observations: Vec<String> = serde_json::from_str(&raw).unwrap_or_default();
        for text in observations {
            conn.execute(
                "INSERT INTO observations (entity_id, content, created_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![entity_id, text, created_at],
            )
            .map_err(|e| StorageError::migration(e.to_string()))?;
        }
    }

    conn.execute_batch("ALTER TABLE entities DROP COLUMN observations;")
        .map_err(|e| StorageError::migration(format!("failed to drop legacy column: {e}")))?;

    Ok(())
}

impl StorageError {
    /// Creates a migration error with the given message.
    pub fn migration(msg: impl Into<String>) -> Self {
        Self::Migration(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_mem() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    #[test]
    fn test_initialize_sets_schema_version() {
        let conn = open_mem();
        initialize(&conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_initialize_idempotent() {
        let conn = open_mem();
        initialize(&conn).unwrap();
        initialize(&conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_legacy_observations_migration() {
        let conn = open_mem();
        conn.execute_batch(
            "CREATE TABLE entities (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                entity_type TEXT NOT NULL,
                observations TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );",
        )
        .unwrap();
        conn.execute(
            "INSERT INTO entities (name, entity_type, observations, created_at, updated_at)
             VALUES ('alice', 'person', '[\"likes tea\", \"works remote\"]', 100, 100)",
            [],
        )
        .unwrap();

        initialize(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM observations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);

        let has_column: bool = conn
            .prepare("SELECT 1 FROM pragma_table_info('entities') WHERE name = 'observations'")
            .unwrap()
            .exists([])
            .unwrap();
        assert!(!has_column);
    }
}
