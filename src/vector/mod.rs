//! Linear-scan cosine-similarity search over stored embeddings.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────┐
//! │           VectorStore              │
//! └──────────┬───────────────────────┘
//!            │  all_embeddings(model)
//!            ▼
//! ┌──────────────────────────────────┐
//! │   StorageEngine (embeddings table) │
//! └──────────────────────────────────┘
//! ```
//!
//! There is no derived index to rebuild: embeddings in SQLite are the only
//! copy, and every search scans them directly. This trades O(n) query cost
//! for zero index-maintenance machinery, appropriate at the scale a
//! per-agent knowledge graph operates at (see SPEC_FULL.md §4.3).

use crate::error::Result;
use crate::storage::StorageEngine;
use crate::types::EntityId;

/// Cosine similarity between two equal-length vectors, in `[-1.0, 1.0]`.
/// Returns `0.0` if either vector has zero magnitude or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Semantic search over embeddings for one model, scanning every stored
/// vector. Results are sorted by similarity descending and truncated to `k`.
pub struct VectorStore<'a> {
    storage: &'a dyn StorageEngine,
}

impl<'a> VectorStore<'a> {
    /// Wraps a storage engine reference for semantic search.
    pub fn new(storage: &'a dyn StorageEngine) -> Self {
        Self { storage }
    }

    /// Returns up to `k` entities whose `model_name` embedding has cosine
    /// similarity to `query` at or above `threshold`, sorted best-first.
    pub fn search(
        &self,
        model_name: &str,
        query: &[f32],
        k: usize,
        threshold: f32,
    ) -> Result<Vec<(EntityId, f32)>> {
        let all = self.storage.all_embeddings(model_name)?;
        let mut scored: Vec<(EntityId, f32)> = all
            .iter()
            .map(|(id, embedding)| (*id, cosine_similarity(query, embedding)))
            .filter(|(_, score)| *score >= threshold)
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }
}
