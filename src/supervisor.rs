//! Runtime supervisor (C7): port negotiation, the identity file other
//! processes use to discover a running instance, backup scheduling, and
//! graceful shutdown.
//!
//! None of this is exercised by [`crate::graph::PulseHive`] directly — it's
//! wiring the `pulsehive-graphd` binary composes around the graph facade
//! and the protocol adapters.

use std::fs;
use std::io;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;
use tracing::info;

use crate::config::Config;
use crate::error::{PulseHiveError, Result, StorageError};
use crate::types::Timestamp;

/// A successfully bound listener plus the port it landed on.
pub struct BoundPort {
    /// The port actually bound — `config.port` or one of the next
    /// `port_probe_limit` successors.
    pub port: u16,
    /// The bound standard-library listener, handed to the async runtime.
    pub listener: TcpListener,
}

/// Binds `host:port`, probing successive ports up to `probe_limit` times if
/// the preferred one is taken.
pub fn negotiate_port(host: &str, preferred: u16, probe_limit: u16) -> io::Result<BoundPort> {
    for offset in 0..=probe_limit {
        let port = preferred.saturating_add(offset);
        match TcpListener::bind((host, port)) {
            Ok(listener) => {
                if offset > 0 {
                    info!(preferred, bound = port, "preferred port busy, bound fallback");
                }
                return Ok(BoundPort { port, listener });
            }
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => continue,
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AddrInUse,
        format!("no free port in [{preferred}, {}]", preferred.saturating_add(probe_limit)),
    ))
}

/// Identity record written to disk so other processes (or the same process
/// on restart) can discover a running instance's negotiated port.
#[derive(Clone, Debug, Serialize)]
pub struct Identity {
    /// Configured server name.
    pub name: String,
    /// OS process id.
    pub pid: u32,
    /// Bound host.
    pub host: String,
    /// Negotiated port.
    pub port: u16,
    /// When the server started.
    pub started_at: Timestamp,
    /// Whether running inside a container.
    pub in_docker: bool,
    /// Container name/id, if known.
    pub container_name: Option<String>,
}

impl Identity {
    /// Builds an identity record for the current process.
    pub fn new(config: &Config, port: u16) -> Self {
        Self {
            name: config.name.clone(),
            pid: std::process::id(),
            host: config.host.clone(),
            port,
            started_at: Timestamp::now(),
            in_docker: config.in_docker,
            container_name: config.container_name.clone(),
        }
    }
}

/// Writes the identity file as JSON at `path`, creating parent directories
/// as needed.
pub fn write_identity_file(path: &Path, identity: &Identity) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(identity)
        .map_err(|e| PulseHiveError::config(format!("failed to serialize identity file: {e}")))?;
    fs::write(path, json)?;
    Ok(())
}

/// Takes a hot backup of the SQLite database at `db_path` into `backup_dir`,
/// named with the current Unix-millis timestamp, and returns the written
/// path. Uses SQLite's online backup API, so it's safe to run against a
/// database with an active WAL.
pub fn take_backup(db_path: &Path, backup_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(backup_dir)?;
    let stamp = Timestamp::now().as_millis();
    let file_name = db_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("graph");
    let dest = backup_dir.join(format!("{file_name}-{stamp}.db"));

    let source = rusqlite::Connection::open(db_path)?;
    let mut destination = rusqlite::Connection::open(&dest)?;
    {
        let backup = rusqlite::backup::Backup::new(&source, &mut destination)
            .map_err(|e| StorageError::sqlite(e.to_string()))?;
        backup
            .run_to_completion(5, std::time::Duration::from_millis(250), None)
            .map_err(|e| StorageError::sqlite(e.to_string()))?;
    }

    info!(path = %dest.display(), "backup written");
    Ok(dest)
}

/// Deletes old backups in `dir` beyond `min_backups`, never removing one
/// younger than `min_age_days`. Backups are matched by `.db` extension and
/// ordered by file modification time, newest first.
pub fn prune_backups(dir: &Path, min_backups: usize, min_age_days: u32) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }
    let mut entries: Vec<(PathBuf, SystemTime)> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("db"))
        .filter_map(|e| e.metadata().ok().and_then(|m| m.modified().ok()).map(|t| (e.path(), t)))
        .collect();
    entries.sort_by_key(|e| std::cmp::Reverse(e.1));

    let min_age = std::time::Duration::from_secs(u64::from(min_age_days) * 24 * 3600);
    let now = SystemTime::now();
    let mut removed = 0;

    for (path, modified) in entries.into_iter().skip(min_backups) {
        let age = now.duration_since(modified).unwrap_or_default();
        if age < min_age {
            continue;
        }
        fs::remove_file(&path)?;
        removed += 1;
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageEngine;
    use tempfile::tempdir;

    #[test]
    fn test_negotiate_port_falls_back_when_busy() {
        let held = TcpListener::bind("127.0.0.1:0").unwrap();
        let busy_port = held.local_addr().unwrap().port();
        let bound = negotiate_port("127.0.0.1", busy_port, 5).unwrap();
        assert_ne!(bound.port, busy_port);
    }

    #[test]
    fn test_negotiate_port_exhausted_errors() {
        let held = TcpListener::bind("127.0.0.1:0").unwrap();
        let busy_port = held.local_addr().unwrap().port();
        let result = negotiate_port("127.0.0.1", busy_port, 0);
        assert!(result.is_err());
    }

    #[test]
    fn test_write_and_read_identity_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("identity.json");
        let config = Config::default();
        let identity = Identity::new(&config, 8787);
        write_identity_file(&path, &identity).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed["port"], 8787);
        assert_eq!(parsed["name"], "pulsehive-graph");
    }

    #[test]
    fn test_take_backup_creates_restorable_copy() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("graph.db");
        let storage = crate::storage::SqliteStorage::open(&db_path, &Config::default()).unwrap();
        storage.create_entity("alice", "person").unwrap();
        storage.checkpoint().unwrap();

        let backup_dir = dir.path().join("backups");
        let backup_path = take_backup(&db_path, &backup_dir).unwrap();
        assert!(backup_path.exists());

        let restored = crate::storage::SqliteStorage::open(&backup_path, &Config::default()).unwrap();
        assert!(restored.get_entity("alice").unwrap().is_some());
    }

    #[test]
    fn test_prune_backups_keeps_minimum_count() {
        let dir = tempdir().unwrap();
        for i in 0..5 {
            fs::write(dir.path().join(format!("graph-{i}.db")), b"x").unwrap();
        }
        let removed = prune_backups(dir.path(), 2, 0).unwrap();
        assert_eq!(removed, 3);
        let remaining: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(remaining.len(), 2);
    }

    #[test]
    fn test_prune_backups_respects_min_age() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("graph-1.db"), b"x").unwrap();
        let removed = prune_backups(dir.path(), 0, 30).unwrap();
        assert_eq!(removed, 0);
    }
}
