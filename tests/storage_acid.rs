//! ACID and crash recovery integration tests for the knowledge graph.
//!
//! These tests verify that the SQLite/WAL storage layer provides the
//! expected durability guarantees at the [`PulseHive`] level.
//!
//! # Crash Simulation
//!
//! We simulate a crash by dropping the `PulseHive` handle without calling
//! `close()`. WAL-mode SQLite commits each write transaction to the WAL
//! file immediately, so a committed write survives even if the process is
//! killed before the next checkpoint — `close()` only forces that
//! checkpoint early for read-your-writes consistency on the *next* open.

use pulsehive_graph::{Config, NewEntity, PulseHive};
use tempfile::tempdir;

fn open_graph(path: &std::path::Path) -> PulseHive {
    PulseHive::open(path, Config::default()).unwrap()
}

fn entity(name: &str) -> NewEntity {
    NewEntity {
        name: name.to_string(),
        entity_type: "project".to_string(),
        observations: vec![],
    }
}

// ============================================================================
// Durability Tests
// ============================================================================

#[test]
fn test_committed_data_survives_normal_close() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("durable.db");

    let graph = open_graph(&path);
    graph.create_entities(vec![entity("durable-project")]).unwrap();
    graph.close().unwrap();

    let graph = open_graph(&path);
    let retrieved = graph.get_entity("durable-project").unwrap();
    assert!(retrieved.is_some(), "data must survive a normal close");
    graph.close().unwrap();
}

#[test]
fn test_committed_data_survives_crash() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("crash.db");

    {
        let graph = open_graph(&path);
        graph.create_entities(vec![entity("crash-safe")]).unwrap();
        // NO close() -- simulates crash (drop without an explicit checkpoint)
    }

    let graph = open_graph(&path);
    let retrieved = graph.get_entity("crash-safe").unwrap();
    assert!(
        retrieved.is_some(),
        "committed data must survive a crash (drop without close)"
    );
    graph.close().unwrap();
}

#[test]
fn test_bulk_data_survives_crash() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bulk_crash.db");

    {
        let graph = open_graph(&path);
        let entities: Vec<_> = (0..100).map(|i| entity(&format!("project-{i}"))).collect();
        graph.create_entities(entities).unwrap();
        // NO close() -- crash
    }

    let graph = open_graph(&path);
    let dump = graph.read_graph().unwrap();
    assert_eq!(dump.entities.len(), 100, "all 100 entities must survive crash");

    for i in 0..100 {
        assert!(
            graph.get_entity(&format!("project-{i}")).unwrap().is_some(),
            "entity project-{i} must be present after crash"
        );
    }
    graph.close().unwrap();
}

#[test]
fn test_multiple_crash_cycles() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("multi_crash.db");

    {
        let graph = open_graph(&path);
        graph.create_entities(vec![entity("cycle-1")]).unwrap();
    }

    {
        let graph = open_graph(&path);
        assert!(graph.get_entity("cycle-1").unwrap().is_some());
        graph.create_entities(vec![entity("cycle-2")]).unwrap();
    }

    let graph = open_graph(&path);
    assert!(graph.get_entity("cycle-1").unwrap().is_some());
    assert!(graph.get_entity("cycle-2").unwrap().is_some());
    assert_eq!(graph.read_graph().unwrap().entities.len(), 2);
    graph.close().unwrap();
}
