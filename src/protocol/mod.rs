//! Protocol adapters (C6): translate a wire-level tool call into a
//! [`crate::graph::PulseHive`] method call and the result back into the
//! wire format. Both adapters — [`http`] (feature-gated) and [`stdio`] —
//! share the same [`ToolCall`]/[`ToolResponse`] envelope and [`dispatch`]
//! function, so the behavior seen over HTTP and over stdio is identical by
//! construction.

#[cfg(feature = "http")]
pub mod http;
pub mod stdio;

use serde::{Deserialize, Serialize};

use crate::config::EmbeddingsConfig;
use crate::error::ToolError;
use crate::graph::{NewEntity, NewObservation, NewRelation, PulseHive, RelationKey};

/// One of the fixed tool operations, as received over the wire.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum ToolCall {
    /// Create entities (idempotent on name).
    CreateEntities {
        /// Entities to create.
        entities: Vec<NewEntity>,
    },
    /// Create relations (idempotent on identity).
    CreateRelations {
        /// Relations to create.
        relations: Vec<NewRelation>,
        /// Every entity name the batch depends on; must be a superset of
        /// every relation's `from`/`to` and must itself fully resolve.
        external_refs: Vec<String>,
    },
    /// Append observations to existing entities.
    AddObservations {
        /// Observations to append.
        observations: Vec<NewObservation>,
        /// Every owning entity name the batch depends on; must include
        /// every observation's `entity_name` and must itself fully resolve.
        external_refs: Vec<String>,
    },
    /// Atomically create entities and relations together.
    CreateSubgraph {
        /// Entities to create.
        #[serde(default)]
        entities: Vec<NewEntity>,
        /// Relations to create.
        #[serde(default)]
        relations: Vec<NewRelation>,
        /// Observations to append to entities not created in this call.
        #[serde(default)]
        observations_for_existing: Vec<NewObservation>,
    },
    /// Delete entities by name.
    DeleteEntities {
        /// Names to delete.
        names: Vec<String>,
    },
    /// Delete relations by identity.
    DeleteRelations {
        /// Relations to delete.
        relations: Vec<RelationKey>,
    },
    /// Dump the full graph.
    ReadGraph,
    /// Lexical (BM25) search.
    SearchNodes {
        /// Query text.
        query: String,
        /// Max results.
        #[serde(default)]
        k: Option<usize>,
    },
    /// Semantic (embedding) search.
    SearchEntitiesSemantic {
        /// Query text.
        query: String,
        /// Max results.
        #[serde(default)]
        k: Option<usize>,
        /// Minimum cosine similarity.
        #[serde(default)]
        threshold: Option<f32>,
    },
    /// Hybrid lexical + semantic search.
    SearchHybrid {
        /// Query text.
        query: String,
        /// Max results.
        #[serde(default)]
        k: Option<usize>,
        /// Weight given to the semantic component, in `[0, 1]`.
        #[serde(default)]
        vector_weight: Option<f32>,
    },
    /// Generate (and store) embeddings.
    GenerateEmbeddings {
        /// Specific entities to embed, or all entities missing one.
        #[serde(default)]
        names: Option<Vec<String>>,
    },
    /// Reconfigure the active embedding provider.
    ConfigureEmbeddings {
        /// New embedding configuration.
        config: EmbeddingsConfig,
    },
    /// Aggregate graph counts.
    GetStats,
    /// Server identity and counts.
    GetServerInfo,
}

/// The wire-level result of a [`ToolCall`] — `Ok` carries whatever JSON
/// shape that operation returns, `Err` carries the [`ToolError`] taxonomy.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResponse {
    /// The call succeeded.
    Ok {
        /// Operation-specific result payload.
        result: serde_json::Value,
    },
    /// The call failed.
    Error {
        /// Structured error detail.
        error: ToolError,
    },
}

impl ToolResponse {
    fn ok(value: impl Serialize) -> Self {
        Self::Ok {
            result: serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
        }
    }
}

/// Dispatches one [`ToolCall`] against the graph, never panicking or
/// propagating a Rust error — every outcome becomes a [`ToolResponse`].
pub fn dispatch(graph: &PulseHive, call: ToolCall) -> ToolResponse {
    let outcome: Result<serde_json::Value, crate::error::PulseHiveError> = (|| {
        Ok(match call {
            ToolCall::CreateEntities { entities } => serde_json::to_value(graph.create_entities(entities)?)?,
            ToolCall::CreateRelations { relations, external_refs } => {
                serde_json::to_value(graph.create_relations(relations, external_refs)?)?
            }
            ToolCall::AddObservations { observations, external_refs } => {
                serde_json::to_value(graph.add_observations(observations, external_refs)?)?
            }
            ToolCall::CreateSubgraph { entities, relations, observations_for_existing } => {
                serde_json::to_value(graph.create_subgraph(entities, relations, observations_for_existing)?)?
            }
            ToolCall::DeleteEntities { names } => serde_json::to_value(graph.delete_entities(names)?)?,
            ToolCall::DeleteRelations { relations } => {
                serde_json::to_value(graph.delete_relations(relations)?)?
            }
            ToolCall::ReadGraph => serde_json::to_value(graph.read_graph()?)?,
            ToolCall::SearchNodes { query, k } => serde_json::to_value(graph.search_nodes(&query, k)?)?,
            ToolCall::SearchEntitiesSemantic { query, k, threshold } => {
                serde_json::to_value(graph.search_entities_semantic(&query, k, threshold)?)?
            }
            ToolCall::SearchHybrid { query, k, vector_weight } => {
                serde_json::to_value(graph.search_hybrid(&query, k, vector_weight)?)?
            }
            ToolCall::GenerateEmbeddings { names } => {
                serde_json::to_value(graph.generate_embeddings(names)?)?
            }
            ToolCall::ConfigureEmbeddings { config } => {
                graph.configure_embeddings(config)?;
                serde_json::Value::Null
            }
            ToolCall::GetStats => serde_json::to_value(graph.get_stats()?)?,
            ToolCall::GetServerInfo => serde_json::to_value(graph.get_server_info()?)?,
        })
    })();

    match outcome {
        Ok(value) => ToolResponse::ok(value),
        Err(e) => ToolResponse::Error { error: e.into() },
    }
}

impl From<serde_json::Error> for crate::error::PulseHiveError {
    fn from(err: serde_json::Error) -> Self {
        crate::error::PulseHiveError::Embedding(format!("serialization error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::tempdir;

    fn open_graph() -> (tempfile::TempDir, PulseHive) {
        let dir = tempdir().unwrap();
        let graph = PulseHive::open(dir.path().join("g.db"), Config::default()).unwrap();
        (dir, graph)
    }

    #[test]
    fn test_dispatch_create_and_read() {
        let (_dir, graph) = open_graph();
        let response = dispatch(
            &graph,
            ToolCall::CreateEntities {
                entities: vec![NewEntity {
                    name: "alice".into(),
                    entity_type: "person".into(),
                    observations: vec![],
                }],
            },
        );
        assert!(matches!(response, ToolResponse::Ok { .. }));

        let response = dispatch(&graph, ToolCall::ReadGraph);
        match response {
            ToolResponse::Ok { result } => {
                assert_eq!(result["entities"][0]["name"], "alice");
            }
            ToolResponse::Error { error } => panic!("unexpected error: {error:?}"),
        }
    }

    #[test]
    fn test_dispatch_missing_entity_maps_to_tool_error() {
        let (_dir, graph) = open_graph();
        let response = dispatch(
            &graph,
            ToolCall::CreateRelations {
                relations: vec![NewRelation {
                    from: "ghost-a".into(),
                    to: "ghost-b".into(),
                    relation_type: "knows".into(),
                }],
                external_refs: vec!["ghost-a".into(), "ghost-b".into()],
            },
        );
        match response {
            ToolResponse::Error { error } => assert!(matches!(error, ToolError::MissingEntities { .. })),
            ToolResponse::Ok { .. } => panic!("expected error"),
        }
    }

    #[test]
    fn test_tool_call_deserializes_snake_case() {
        let json = r#"{"tool": "get_stats"}"#;
        let call: ToolCall = serde_json::from_str(json).unwrap();
        assert!(matches!(call, ToolCall::GetStats));
    }
}
