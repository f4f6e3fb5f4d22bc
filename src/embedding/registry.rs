//! Process-wide holder for the active embedding provider.
//!
//! `configure_embeddings` (one of the fixed tool operations) swaps the
//! active provider at runtime; every other call — `generate_embeddings`,
//! `search_entities_semantic`, `search_hybrid` — reads whatever is
//! currently installed. A single `RwLock<Arc<dyn EmbeddingProvider>>` gives
//! readers a cheap `Arc` clone without blocking on in-flight embedding
//! calls, while `configure` takes the write lock only for the swap itself.

use std::sync::{Arc, RwLock};

use super::{create_provider, EmbeddingProvider};
use crate::config::Config;
use crate::error::Result;

/// Holds the currently active [`EmbeddingProvider`], swappable at runtime.
pub struct EmbeddingRegistry {
    current: RwLock<Arc<dyn EmbeddingProvider>>,
}

impl EmbeddingRegistry {
    /// Builds a registry from the provider configured in `config`.
    pub fn new(config: &Config) -> Result<Self> {
        let provider = create_provider(config)?;
        Ok(Self {
            current: RwLock::new(Arc::from(provider)),
        })
    }

    /// Returns a clone of the currently active provider handle.
    pub fn current(&self) -> Arc<dyn EmbeddingProvider> {
        Arc::clone(&self.current.read().expect("embedding registry lock poisoned"))
    }

    /// Reconfigures the active provider. Takes effect for every subsequent
    /// call; in-flight calls keep using whatever provider they already
    /// cloned a handle to.
    pub fn configure(&self, config: &Config) -> Result<()> {
        let provider = create_provider(config)?;
        *self.current.write().expect("embedding registry lock poisoned") = Arc::from(provider);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_defaults_to_configured_provider() {
        let registry = EmbeddingRegistry::new(&Config::default()).unwrap();
        assert_eq!(registry.current().dimensions(), 384);
    }

    #[test]
    fn test_registry_reconfigure_swaps_provider() {
        let registry = EmbeddingRegistry::new(&Config::default()).unwrap();
        let config = Config {
            embeddings: crate::config::EmbeddingsConfig {
                model: "local-hash-64".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        registry.configure(&config).unwrap();
        assert_eq!(registry.current().dimensions(), 64);
    }

    #[test]
    fn test_registry_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EmbeddingRegistry>();
    }
}
