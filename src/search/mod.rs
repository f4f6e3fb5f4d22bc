//! Search layer (C5): lexical, semantic, and hybrid ranking over the graph.
//!
//! Lexical search is BM25 over entity names/types and observation text
//! (delegated straight to [`StorageEngine::search_lexical`]). Semantic
//! search embeds the query and scans stored vectors via
//! [`crate::vector::VectorStore`]. Hybrid search runs both and fuses them:
//! each side's scores are normalized by its own maximum before the weighted
//! sum, so neither scale dominates just because BM25 and cosine similarity
//! live in different ranges. If the embedding provider is unavailable,
//! hybrid search degrades to lexical-only rather than failing the call.

use std::collections::HashMap;

use tracing::warn;

use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::storage::{EntityWithObservations, StorageEngine};
use crate::vector::VectorStore;

/// One ranked search result.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ScoredEntity {
    /// The matching entity and its observations.
    pub entity: EntityWithObservations,
    /// Fused/normalized relevance score. Higher is better.
    pub score: f64,
}

/// Lexical (BM25) search — entity names/types weighted 2x over observation
/// text, OR-semantics across query tokens. See [`StorageEngine::search_lexical`].
pub fn lexical_search(storage: &dyn StorageEngine, query: &str, k: usize) -> Result<Vec<ScoredEntity>> {
    let hits = storage.search_lexical(query, k)?;
    Ok(hits
        .into_iter()
        .map(|m| ScoredEntity {
            entity: m.entity,
            score: m.score,
        })
        .collect())
}

/// Semantic (cosine k-NN) search using the active embedding provider.
pub fn semantic_search(
    storage: &dyn StorageEngine,
    provider: &dyn EmbeddingProvider,
    query: &str,
    k: usize,
    threshold: f32,
) -> Result<Vec<ScoredEntity>> {
    let query_embedding = provider.generate(query)?;
    let vector_store = VectorStore::new(storage);
    let hits = vector_store.search(provider.model_name(), &query_embedding, k, threshold)?;

    let mut results = Vec::with_capacity(hits.len());
    for (entity_id, score) in hits {
        let Some(name) = storage.entity_name(entity_id)? else {
            continue;
        };
        let Some(entity) = storage.get_entity(&name)? else {
            continue;
        };
        results.push(ScoredEntity {
            entity,
            score: score as f64,
        });
    }
    Ok(results)
}

/// Hybrid search: fuses lexical and semantic results with per-set
/// max-score normalization. `vector_weight` in `[0.0, 1.0]` controls the
/// balance (`1.0` = semantic only, `0.0` = lexical only). Falls back to
/// lexical-only if the embedding provider errors.
pub fn hybrid_search(
    storage: &dyn StorageEngine,
    provider: &dyn EmbeddingProvider,
    query: &str,
    k: usize,
    vector_weight: f32,
) -> Result<Vec<ScoredEntity>> {
    let candidate_pool = (k * 4).max(k);
    let lexical = lexical_search(storage, query, candidate_pool)?;
    let semantic = match semantic_search(storage, provider, query, candidate_pool, 0.0) {
        Ok(hits) => hits,
        Err(e) => {
            warn!(error = %e, "semantic search unavailable, degrading to lexical-only");
            Vec::new()
        }
    };

    let lexical_max = lexical.iter().map(|r| r.score).fold(0.0_f64, f64::max);
    let semantic_max = semantic.iter().map(|r| r.score).fold(0.0_f64, f64::max);

    let mut fused: HashMap<String, (EntityWithObservations, f64)> = HashMap::new();
    let effective_weight = if semantic.is_empty() { 0.0 } else { vector_weight as f64 };
    let lexical_weight = 1.0 - effective_weight;

    for hit in lexical {
        let normalized = if lexical_max > 0.0 { hit.score / lexical_max } else { 0.0 };
        fused.insert(hit.entity.name.clone(), (hit.entity, lexical_weight * normalized));
    }
    for hit in semantic {
        let normalized = if semantic_max > 0.0 { hit.score / semantic_max } else { 0.0 };
        fused
            .entry(hit.entity.name.clone())
            .and_modify(|(_, score)| *score += effective_weight * normalized)
            .or_insert((hit.entity, effective_weight * normalized));
    }

    let mut results: Vec<ScoredEntity> = fused
        .into_values()
        .map(|(entity, score)| ScoredEntity { entity, score })
        .collect();
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(k);
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::embedding::LocalProvider;
    use crate::storage::SqliteStorage;
    use tempfile::tempdir;

    fn setup() -> (tempfile::TempDir, SqliteStorage, LocalProvider) {
        let dir = tempdir().unwrap();
        let storage = SqliteStorage::open(dir.path().join("g.db"), &Config::default()).unwrap();
        (dir, storage, LocalProvider::default())
    }

    #[test]
    fn test_lexical_search_finds_observation_match() {
        let (_dir, storage, _provider) = setup();
        storage.create_entity("alice", "person").unwrap();
        storage.add_observation("alice", "enjoys rock climbing").unwrap();

        let results = lexical_search(&storage, "climbing", 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].entity.name, "alice");
    }

    #[test]
    fn test_semantic_search_ranks_embedded_entity() {
        let (_dir, storage, provider) = setup();
        let id = storage.create_entity("alice", "person").unwrap();
        let embedding = provider.generate("loves hiking").unwrap();
        storage.put_embedding(id, provider.model_name(), &embedding).unwrap();

        let results = semantic_search(&storage, &provider, "loves hiking", 10, -1.0).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].entity.name, "alice");
    }

    #[test]
    fn test_hybrid_search_combines_both_sources() {
        let (_dir, storage, provider) = setup();
        let id = storage.create_entity("alice", "person").unwrap();
        storage.add_observation("alice", "rock climbing enthusiast").unwrap();
        let embedding = provider.generate("rock climbing enthusiast").unwrap();
        storage.put_embedding(id, provider.model_name(), &embedding).unwrap();

        let results = hybrid_search(&storage, &provider, "climbing", 10, 0.7).unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].entity.name, "alice");
    }

    #[test]
    fn test_hybrid_full_vector_weight_matches_semantic_threshold_zero() {
        let (_dir, storage, provider) = setup();
        let alice = storage.create_entity("alice", "person").unwrap();
        let embedding = provider.generate("rock climbing enthusiast").unwrap();
        storage.put_embedding(alice, provider.model_name(), &embedding).unwrap();
        let bob = storage.create_entity("bob", "person").unwrap();
        let embedding = provider.generate("completely unrelated topic").unwrap();
        storage.put_embedding(bob, provider.model_name(), &embedding).unwrap();

        let semantic = semantic_search(&storage, &provider, "rock climbing enthusiast", 10, 0.0).unwrap();
        let hybrid = hybrid_search(&storage, &provider, "rock climbing enthusiast", 10, 1.0).unwrap();

        let semantic_names: Vec<&str> = semantic.iter().map(|r| r.entity.name.as_str()).collect();
        let hybrid_names: Vec<&str> = hybrid.iter().map(|r| r.entity.name.as_str()).collect();
        assert_eq!(semantic_names, hybrid_names);
    }

    #[test]
    fn test_hybrid_search_degrades_to_lexical_without_embeddings() {
        let (_dir, storage, provider) = setup();
        storage.create_entity("alice", "person").unwrap();
        storage.add_observation("alice", "loves climbing").unwrap();

        let results = hybrid_search(&storage, &provider, "climbing", 10, 0.7).unwrap();
        assert_eq!(results[0].entity.name, "alice");
    }
}
