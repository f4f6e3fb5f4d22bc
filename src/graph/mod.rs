//! The knowledge graph facade (C4): the fixed set of tool operations every
//! protocol adapter (C6) dispatches into.
//!
//! [`PulseHive`] owns the storage engine and the embedding registry and
//! exposes exactly the operations named in SPEC_FULL.md §4.4 —
//! `create_entities`, `create_relations`, `add_observations`,
//! `create_subgraph`, `delete_entities`, `delete_relations`, `read_graph`,
//! `search_nodes`, `search_entities_semantic`, `search_hybrid`,
//! `generate_embeddings`, `configure_embeddings`, `get_stats`,
//! `get_server_info`. Every mutating call checkpoints the WAL before
//! returning (§5's read-your-writes contract) and validates external
//! entity references before writing anything, so a batch with one missing
//! reference fails as a whole instead of partially applying.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::RwLock;

use tracing::{info, instrument};

use crate::config::{Config, EmbeddingsConfig};
use crate::embedding::EmbeddingRegistry;
use crate::error::{PulseHiveError, Result, ValidationError};
use crate::search::{self, ScoredEntity};
use crate::storage::{open_storage, EntityWithObservations, GraphDump, StorageEngine, StorageStats};

/// A new entity to create.
#[derive(Clone, Debug, serde::Deserialize)]
pub struct NewEntity {
    /// External key, must be unique.
    pub name: String,
    /// Free-form type tag.
    pub entity_type: String,
    /// Initial observations to attach.
    #[serde(default)]
    pub observations: Vec<String>,
}

/// A new relation to create (or no-op if it already exists).
#[derive(Clone, Debug, serde::Deserialize)]
pub struct NewRelation {
    /// Source entity name.
    pub from: String,
    /// Target entity name.
    pub to: String,
    /// Edge type.
    pub relation_type: String,
}

/// A relation identity, for deletion.
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct RelationKey {
    /// Source entity name.
    pub from: String,
    /// Target entity name.
    pub to: String,
    /// Edge type.
    pub relation_type: String,
}

/// One observation to append to an existing entity.
#[derive(Clone, Debug, serde::Deserialize)]
pub struct NewObservation {
    /// Owning entity's name.
    pub entity_name: String,
    /// Observation text.
    pub content: String,
}

/// Result of a `create_entities`/`create_subgraph` call.
#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct CreateEntitiesResult {
    /// Names of entities actually created (pre-existing names are skipped,
    /// not an error — see §4.4 edge cases).
    pub created: Vec<String>,
    /// Names that already existed and were left untouched.
    pub skipped: Vec<String>,
}

/// Result of a `create_relations`/`create_subgraph` call.
#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct CreateRelationsResult {
    /// Relations created or confirmed to already exist, in input order.
    pub relations: Vec<RelationKey>,
}

/// Result of `create_subgraph`: entities and relations applied atomically.
#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct CreateSubgraphResult {
    /// Entity creation outcome.
    pub entities: CreateEntitiesResult,
    /// Relation creation outcome.
    pub relations: CreateRelationsResult,
}

/// Result of a `delete_entities`/`delete_relations` call.
#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct DeleteResult {
    /// How many of the requested items actually existed and were removed.
    pub deleted_count: usize,
}

/// Server identity, reported by `get_server_info`.
#[derive(Clone, Debug, serde::Serialize)]
pub struct ServerInfo {
    /// Configured server name.
    pub name: String,
    /// Crate version.
    pub version: String,
    /// Current database schema version.
    pub schema_version: u32,
    /// Active embedding model name.
    pub embedding_model: String,
    /// Aggregate graph counts.
    pub stats: StorageStats,
}

/// The knowledge graph service.
pub struct PulseHive {
    storage: Box<dyn StorageEngine>,
    embeddings: EmbeddingRegistry,
    config: RwLock<Config>,
}

impl PulseHive {
    /// Opens (or creates) the graph database at `path`.
    #[instrument(skip(config), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        config.validate().map_err(PulseHiveError::from)?;
        info!("opening knowledge graph");

        let storage = open_storage(&path, &config)?;
        let embeddings = EmbeddingRegistry::new(&config)?;

        info!(schema_version = storage.metadata()?.schema_version, "knowledge graph opened");
        Ok(Self {
            storage: Box::new(storage),
            embeddings,
            config: RwLock::new(config),
        })
    }

    /// Flushes the WAL and releases resources. Consumes `self`.
    #[instrument(skip(self))]
    pub fn close(self) -> Result<()> {
        self.storage.checkpoint()?;
        info!("knowledge graph closed");
        Ok(())
    }

    fn config_snapshot(&self) -> Config {
        self.config.read().expect("config lock poisoned").clone()
    }

    fn checkpoint(&self) -> Result<()> {
        self.storage.checkpoint()
    }

    // ---- mutation operations -------------------------------------------

    /// Creates entities. Names that already exist are skipped (not an
    /// error); observations for skipped entities are still appended.
    #[instrument(skip(self, entities))]
    pub fn create_entities(&self, entities: Vec<NewEntity>) -> Result<CreateEntitiesResult> {
        let result = self.create_entities_inner(entities)?;
        self.checkpoint()?;
        Ok(result)
    }

    fn create_entities_inner(&self, entities: Vec<NewEntity>) -> Result<CreateEntitiesResult> {
        let mut created = Vec::new();
        let mut skipped = Vec::new();
        for entity in entities {
            match self.storage.create_entity(&entity.name, &entity.entity_type) {
                Ok(_) => created.push(entity.name.clone()),
                Err(PulseHiveError::AlreadyExists(_)) => skipped.push(entity.name.clone()),
                Err(e) => return Err(e),
            }
            for observation in &entity.observations {
                self.storage.add_observation(&entity.name, observation)?;
            }
        }
        Ok(CreateEntitiesResult { created, skipped })
    }

    /// Creates relations. The caller must declare every entity name the
    /// batch depends on in `external_refs` — the union of every relation's
    /// `from`/`to` must be a subset of it, and every declared name must
    /// itself resolve to an existing entity. This is the tool layer's
    /// single most important correctness property: a relation can never
    /// silently reference an entity the caller didn't vouch for. If either
    /// half fails, the call fails atomically and nothing is written.
    #[instrument(skip(self, relations, external_refs))]
    pub fn create_relations(
        &self,
        relations: Vec<NewRelation>,
        external_refs: Vec<String>,
    ) -> Result<CreateRelationsResult> {
        self.validate_relation_refs(&relations, &external_refs)?;
        let result = self.create_relations_inner(relations)?;
        self.checkpoint()?;
        Ok(result)
    }

    fn validate_relation_refs(&self, relations: &[NewRelation], external_refs: &[String]) -> Result<()> {
        let declared: BTreeSet<String> = external_refs.iter().cloned().collect();
        let mut referenced: BTreeSet<String> = BTreeSet::new();
        for r in relations {
            referenced.insert(r.from.clone());
            referenced.insert(r.to.clone());
        }
        if !referenced.is_subset(&declared) {
            let undeclared: Vec<String> = referenced.difference(&declared).cloned().collect();
            return Err(PulseHiveError::Validation(ValidationError::invalid_field(
                "external_refs",
                format!("relation(s) reference undeclared name(s): {}", undeclared.join(", ")),
            )));
        }

        let declared: Vec<String> = declared.into_iter().collect();
        let missing = self.storage.missing_entities(&declared)?;
        if !missing.is_empty() {
            return Err(PulseHiveError::missing_entities(missing));
        }
        Ok(())
    }

    fn create_relations_inner(&self, relations: Vec<NewRelation>) -> Result<CreateRelationsResult> {
        let mut applied = Vec::with_capacity(relations.len());
        for r in relations {
            self.storage.create_relation(&r.from, &r.to, &r.relation_type)?;
            applied.push(RelationKey {
                from: r.from,
                to: r.to,
                relation_type: r.relation_type,
            });
        }
        Ok(CreateRelationsResult { relations: applied })
    }

    /// Appends observations to existing entities. The caller must declare
    /// every owning entity name in `external_refs`, which must include
    /// every `entity_name` referenced in the batch; every declared name
    /// must already exist. Checked across the whole batch before any write.
    #[instrument(skip(self, observations, external_refs))]
    pub fn add_observations(
        &self,
        observations: Vec<NewObservation>,
        external_refs: Vec<String>,
    ) -> Result<usize> {
        let declared: BTreeSet<String> = external_refs.into_iter().collect();
        let referenced: BTreeSet<String> = observations.iter().map(|o| o.entity_name.clone()).collect();
        if !referenced.is_subset(&declared) {
            let undeclared: Vec<String> = referenced.difference(&declared).cloned().collect();
            return Err(PulseHiveError::Validation(ValidationError::invalid_field(
                "external_refs",
                format!("observation(s) reference undeclared name(s): {}", undeclared.join(", ")),
            )));
        }

        let declared: Vec<String> = declared.into_iter().collect();
        let missing = self.storage.missing_entities(&declared)?;
        if !missing.is_empty() {
            return Err(PulseHiveError::missing_entities(missing));
        }
        for obs in &observations {
            self.storage.add_observation(&obs.entity_name, &obs.content)?;
        }
        self.checkpoint()?;
        Ok(observations.len())
    }

    /// Atomically creates a batch of entities and relations, then appends
    /// observations to pre-existing entities: entities first (so relations
    /// may reference entities created in the same call), then relations
    /// (refs validated against entities-plus-batch before any relation is
    /// written), then `observations_for_existing` — every name it touches
    /// that isn't among the entities just created must already exist in
    /// storage, checked up front alongside the relation refs.
    #[instrument(skip(self, entities, relations, observations_for_existing))]
    pub fn create_subgraph(
        &self,
        entities: Vec<NewEntity>,
        relations: Vec<NewRelation>,
        observations_for_existing: Vec<NewObservation>,
    ) -> Result<CreateSubgraphResult> {
        let entity_names: BTreeSet<String> = entities.iter().map(|e| e.name.clone()).collect();
        let mut referenced: BTreeSet<String> = BTreeSet::new();
        for r in &relations {
            referenced.insert(r.from.clone());
            referenced.insert(r.to.clone());
        }
        for o in &observations_for_existing {
            referenced.insert(o.entity_name.clone());
        }
        let externally_referenced: Vec<String> = referenced.difference(&entity_names).cloned().collect();
        let missing = self.storage.missing_entities(&externally_referenced)?;
        if !missing.is_empty() {
            return Err(PulseHiveError::missing_entities(missing));
        }

        let created_entities = self.create_entities_inner(entities)?;
        let created_relations = self.create_relations_inner(relations)?;
        for obs in &observations_for_existing {
            self.storage.add_observation(&obs.entity_name, &obs.content)?;
        }
        self.checkpoint()?;
        Ok(CreateSubgraphResult {
            entities: created_entities,
            relations: created_relations,
        })
    }

    /// Deletes entities by name, cascading their observations, relations,
    /// and embeddings. Idempotent: names that don't exist are silently
    /// skipped, not an error.
    #[instrument(skip(self, names))]
    pub fn delete_entities(&self, names: Vec<String>) -> Result<DeleteResult> {
        let mut deleted_count = 0;
        for name in names {
            if self.storage.delete_entity(&name)? {
                deleted_count += 1;
            }
        }
        self.checkpoint()?;
        Ok(DeleteResult { deleted_count })
    }

    /// Deletes relations by identity. Idempotent.
    #[instrument(skip(self, relations))]
    pub fn delete_relations(&self, relations: Vec<RelationKey>) -> Result<DeleteResult> {
        let mut deleted_count = 0;
        for r in relations {
            if self.storage.delete_relation(&r.from, &r.to, &r.relation_type)? {
                deleted_count += 1;
            }
        }
        self.checkpoint()?;
        Ok(DeleteResult { deleted_count })
    }

    // ---- read operations -------------------------------------------------

    /// Dumps the entire graph.
    pub fn read_graph(&self) -> Result<GraphDump> {
        self.storage.read_graph()
    }

    /// Fetches one entity by name.
    pub fn get_entity(&self, name: &str) -> Result<Option<EntityWithObservations>> {
        self.storage.get_entity(name)
    }

    /// Lexical (BM25) search over entity names/types and observations.
    pub fn search_nodes(&self, query: &str, k: Option<usize>) -> Result<Vec<ScoredEntity>> {
        let k = k.unwrap_or_else(|| self.config_snapshot().vector.default_k);
        search::lexical_search(self.storage.as_ref(), query, k)
    }

    /// Semantic (embedding cosine) search using the active provider.
    pub fn search_entities_semantic(
        &self,
        query: &str,
        k: Option<usize>,
        threshold: Option<f32>,
    ) -> Result<Vec<ScoredEntity>> {
        let config = self.config_snapshot();
        let k = k.unwrap_or(config.vector.default_k);
        let threshold = threshold.unwrap_or(config.vector.default_threshold);
        let provider = self.embeddings.current();
        search::semantic_search(self.storage.as_ref(), provider.as_ref(), query, k, threshold)
    }

    /// Hybrid lexical + semantic search, fused by `vector_weight`.
    pub fn search_hybrid(
        &self,
        query: &str,
        k: Option<usize>,
        vector_weight: Option<f32>,
    ) -> Result<Vec<ScoredEntity>> {
        let config = self.config_snapshot();
        let k = k.unwrap_or(config.vector.default_k);
        let vector_weight = vector_weight.unwrap_or(config.vector.default_hybrid_weight);
        let provider = self.embeddings.current();
        search::hybrid_search(self.storage.as_ref(), provider.as_ref(), query, k, vector_weight)
    }

    /// Generates (and stores) embeddings for the given entity names, or —
    /// if `names` is `None` — for every entity missing one under the
    /// active model. Returns how many embeddings were written.
    #[instrument(skip(self, names))]
    pub fn generate_embeddings(&self, names: Option<Vec<String>>) -> Result<usize> {
        let provider = self.embeddings.current();
        let targets: Vec<(String, EntityWithObservations)> = match names {
            Some(names) => {
                let missing = self.storage.missing_entities(&names)?;
                if !missing.is_empty() {
                    return Err(PulseHiveError::missing_entities(missing));
                }
                names
                    .into_iter()
                    .filter_map(|name| {
                        self.storage.get_entity(&name).ok().flatten().map(|e| (name, e))
                    })
                    .collect()
            }
            None => {
                let ids = self.storage.entities_without_embedding(provider.model_name())?;
                ids.into_iter()
                    .filter_map(|id| self.storage.entity_name(id).ok().flatten())
                    .filter_map(|name| self.storage.get_entity(&name).ok().flatten().map(|e| (name, e)))
                    .collect()
            }
        };

        if targets.is_empty() {
            return Ok(0);
        }

        let config = self.config_snapshot();
        let mut written = 0;
        for chunk in targets.chunks(config.embeddings.batch_size) {
            let texts: Vec<String> = chunk.iter().map(|(_, e)| entity_embedding_text(e)).collect();
            let text_refs: Vec<&str> = texts.iter().map(String::as_str).collect();
            let embeddings = provider.generate_batch(&text_refs)?;
            for ((name, _), embedding) in chunk.iter().zip(embeddings) {
                let Some(id) = self.storage.find_entity_id(name)? else {
                    continue;
                };
                self.storage.put_embedding(id, provider.model_name(), &embedding)?;
                written += 1;
            }
        }
        self.checkpoint()?;
        Ok(written)
    }

    /// Reconfigures the active embedding provider. Pre-existing embeddings
    /// from a different model are left in place (keyed by model name) —
    /// callers that want a full re-embed should follow with
    /// `generate_embeddings`.
    #[instrument(skip(self, embeddings_config))]
    pub fn configure_embeddings(&self, embeddings_config: EmbeddingsConfig) -> Result<()> {
        let mut config = self.config.write().expect("config lock poisoned");
        config.embeddings = embeddings_config;
        self.embeddings.configure(&config)?;
        Ok(())
    }

    /// Aggregate graph counts.
    pub fn get_stats(&self) -> Result<StorageStats> {
        self.storage.get_stats()
    }

    /// Server identity and current counts.
    pub fn get_server_info(&self) -> Result<ServerInfo> {
        let config = self.config_snapshot();
        let metadata = self.storage.metadata()?;
        let provider = self.embeddings.current();
        Ok(ServerInfo {
            name: config.name,
            version: env!("CARGO_PKG_VERSION").to_string(),
            schema_version: metadata.schema_version,
            embedding_model: provider.model_name().to_string(),
            stats: self.storage.get_stats()?,
        })
    }
}

fn entity_embedding_text(entity: &EntityWithObservations) -> String {
    if entity.observations.is_empty() {
        format!("{} ({})", entity.name, entity.entity_type)
    } else {
        format!(
            "{} ({}): {}",
            entity.name,
            entity.entity_type,
            entity.observations.join(". ")
        )
    }
}
