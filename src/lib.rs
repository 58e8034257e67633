//! # docgraph: Document Relationship Graph Engine
//!
//! Typed, validated relations between externally owned documents, with
//! bounded traversal, simple-path discovery and auditable inference.
//!
//! ## Design Principles
//!
//! 1. **Documents are foreign keys**: the engine stores relations only and asks a
//!    [`DocumentStore`] whether an id exists and what kind it is
//! 2. **Clean DTOs**: `Relation`, `Path`, `Value` cross all boundaries
//! 3. **One identity per relation**: `(source, target, type)`; reverse edges of
//!    bidirectional relations are derived by the index, never stored
//! 4. **Validate then commit under one lock**: no reader sees a half-written
//!    relation or a partial all-or-nothing batch
//! 5. **Inference proposes, callers dispose**: nothing derived is written implicitly
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docgraph::{Graph, RelationDraft, TraversalQuery};
//!
//! # async fn example() -> docgraph::Result<()> {
//! let graph = Graph::open_memory().await?;
//! graph.documents().insert("kb-login", Some("guide"));
//! graph.documents().insert("kb-reset", Some("troubleshooting"));
//!
//! graph.create_relation(
//!     RelationDraft::new("kb-login", "kb-reset", "REFERENCES")
//!         .with_property("section", "2.1"),
//! ).await?;
//!
//! for hit in graph.traverse(&TraversalQuery::new("kb-login").max_depth(2)).await? {
//!     println!("{} at depth {}", hit.document, hit.depth);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Components
//!
//! | Component | Module | Description |
//! |-----------|--------|-------------|
//! | `RelationTypeRegistry` | `schema` | Per-type validation rules |
//! | `RelationStore` | `storage` | Relation table, CRUD and batches |
//! | `GraphIndex` | `storage::index` | Adjacency by direction and type, mirror edges |
//! | `TraversalEngine` | `traversal` | Breadth-first bounded expansion |
//! | `PathFinder` | `traversal::paths` | Simple paths between two documents |
//! | `InferenceEngine` | `inference` | Transitive and inverse proposals |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod schema;
pub mod storage;
pub mod traversal;
pub mod inference;
pub mod document;
pub mod config;
pub mod export;

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    DocId, Direction, Relation, RelationDraft, RelationKey,
    Path, Value, PropertyMap, props,
};

// ============================================================================
// Re-exports: Schema / Storage
// ============================================================================

pub use schema::{RelationTypeRegistry, RelationTypeSpec};
pub use storage::{
    BatchMode, BatchReport, DeleteMode, ItemOutcome,
    GraphIndex, RelationStore, TypeFilter,
};

// ============================================================================
// Re-exports: Queries
// ============================================================================

pub use traversal::{PathFinder, PathQuery, TraversalEngine, TraversalHit, TraversalQuery};
pub use inference::{InferenceEngine, InferenceQuery, InferenceRule, InferredRelation};

// ============================================================================
// Re-exports: Collaborators
// ============================================================================

pub use document::{DocumentStore, MemoryDocumentStore};
pub use config::EngineConfig;
pub use export::{GraphSnapshot, export_cypher_dump};

// ============================================================================
// Top-level Graph handle
// ============================================================================

/// Registry and relations, always locked together.
#[derive(Debug, Default)]
struct GraphState {
    registry: RelationTypeRegistry,
    store: RelationStore,
}

impl GraphState {
    /// Make sure `rel_type` is registered, auto-registering a constraint-free
    /// spec when the configuration allows it.
    fn ensure_type(&mut self, rel_type: &str, auto_register: bool) -> Result<()> {
        if auto_register && !self.registry.contains(rel_type) {
            self.registry.register(RelationTypeSpec::new(rel_type).describe("auto-registered"))?;
        }
        Ok(())
    }
}

/// The primary entry point: one logical graph namespace.
///
/// Share it behind an `Arc`; every method takes `&self`. Document lookups
/// run before the internal lock is taken, so no lock is ever held across
/// an `.await`.
pub struct Graph<D: DocumentStore> {
    documents: D,
    config: EngineConfig,
    state: RwLock<GraphState>,
}

impl<D: DocumentStore> Graph<D> {
    /// Open a graph over `documents`.
    ///
    /// Registers the built-in catalog (if enabled) and the configured types,
    /// then loads `snapshot_path` when that file exists.
    pub async fn open(documents: D, config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let mut registry = RelationTypeRegistry::new();
        if config.support_catalog {
            for spec in schema::catalog::support_catalog() {
                registry.register(spec)?;
            }
        }
        for spec in &config.relation_types {
            registry.register(spec.clone())?;
        }

        let graph = Self {
            documents,
            state: RwLock::new(GraphState { registry, store: RelationStore::new() }),
            config,
        };

        if let Some(path) = graph.config.snapshot_path.as_deref() {
            if path.exists() {
                let snapshot = GraphSnapshot::read_from(path)?;
                graph.restore(snapshot)?;
            }
        }
        tracing::info!(types = graph.state.read().registry.len(), "graph opened");
        Ok(graph)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn documents(&self) -> &D {
        &self.documents
    }

    /// Total stored relations (mirrors not counted).
    pub fn relation_count(&self) -> usize {
        self.state.read().store.len()
    }

    /// Bumped once per committed mutation.
    pub fn version(&self) -> u64 {
        self.state.read().store.version()
    }

    // ========================================================================
    // Relation types
    // ========================================================================

    /// Returns `true` if new, `false` if identical rules were already registered.
    pub fn register_type(&self, spec: RelationTypeSpec) -> Result<bool> {
        self.state.write().registry.register(spec)
    }

    /// Change the rules of a type that has no relations yet.
    pub fn redefine_type(&self, spec: RelationTypeSpec) -> Result<()> {
        let mut state = self.state.write();
        let in_use = state.store.count_of_type(&spec.type_name);
        state.registry.redefine(spec, in_use)
    }

    pub fn relation_type(&self, type_name: &str) -> Result<RelationTypeSpec> {
        self.state.read().registry.get(type_name).cloned()
    }

    pub fn relation_types(&self) -> Vec<RelationTypeSpec> {
        self.state.read().registry.iter().cloned().collect()
    }

    // ========================================================================
    // Single-relation CRUD
    // ========================================================================

    /// Validate and store a new relation. Both endpoints must exist.
    pub async fn create_relation(&self, draft: RelationDraft) -> Result<Relation> {
        let draft = self.resolve_endpoints(draft).await?;
        let mut state = self.state.write();
        state.ensure_type(&draft.rel_type, self.config.auto_register_types)?;
        let GraphState { registry, store } = &mut *state;
        store.create(registry, self.config.max_relations_per_document, draft, Utc::now())
    }

    /// Create, or replace the relation with the same identity key. The
    /// replacement keeps the original `created_at`.
    pub async fn replace_relation(&self, draft: RelationDraft) -> Result<Relation> {
        let draft = self.resolve_endpoints(draft).await?;
        let mut state = self.state.write();
        state.ensure_type(&draft.rel_type, self.config.auto_register_types)?;
        let GraphState { registry, store } = &mut *state;
        store.replace(registry, self.config.max_relations_per_document, draft, Utc::now())
    }

    /// Look up by identity key. The mirror key of a bidirectional relation
    /// resolves to the stored record, in its stored orientation.
    pub fn get_relation(&self, key: &RelationKey) -> Result<Relation> {
        self.state
            .read()
            .store
            .lookup(key)?
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Relation {key}")))
    }

    /// Replace the properties of an existing relation.
    pub fn update_relation(&self, key: &RelationKey, properties: PropertyMap) -> Result<Relation> {
        let mut state = self.state.write();
        let GraphState { registry, store } = &mut *state;
        store.update_properties(registry, key, properties, Utc::now())
    }

    /// Delete by identity key. Returns the removed record, or `None` when
    /// the key was absent and `mode` is `IfExists`.
    pub fn delete_relation(&self, key: &RelationKey, mode: DeleteMode) -> Result<Option<Relation>> {
        self.state.write().store.delete(key, mode)
    }

    /// Direct relations of `doc`, mirrors included.
    pub fn relations_of(&self, doc: &DocId, direction: Direction, filter: &TypeFilter) -> Result<Vec<Relation>> {
        self.state.read().store.relations_of(doc, direction, filter)
    }

    // ========================================================================
    // Batches
    // ========================================================================

    /// Create many relations.
    ///
    /// `AllOrNothing`: fails with `BatchRejected { index, cause }` on the first
    /// invalid item and commits nothing; readers never see part of the batch.
    /// `BestEffort`: each item is committed on its own; the report lists every
    /// outcome in input order.
    pub async fn batch_create(&self, drafts: Vec<RelationDraft>, mode: BatchMode) -> Result<BatchReport<Relation>> {
        match mode {
            BatchMode::AllOrNothing => {
                self.check_batch_size(drafts.len())?;
                let mut resolved = Vec::with_capacity(drafts.len());
                for (index, draft) in drafts.into_iter().enumerate() {
                    let draft = self
                        .resolve_endpoints(draft)
                        .await
                        .map_err(|cause| Error::BatchRejected { index, cause: Box::new(cause) })?;
                    resolved.push(draft);
                }

                let mut state = self.state.write();
                for (index, draft) in resolved.iter().enumerate() {
                    state
                        .ensure_type(&draft.rel_type, self.config.auto_register_types)
                        .map_err(|cause| Error::BatchRejected { index, cause: Box::new(cause) })?;
                }
                let GraphState { registry, store } = &mut *state;
                let created = store.create_all(registry, self.config.max_relations_per_document, resolved, Utc::now())?;
                Ok(BatchReport::all_accepted(created))
            }
            BatchMode::BestEffort => {
                let mut outcomes = Vec::with_capacity(drafts.len());
                for (index, draft) in drafts.into_iter().enumerate() {
                    let outcome = ItemOutcome::from(self.create_relation(draft).await);
                    if let Some(e) = outcome.rejection() {
                        tracing::warn!(index, error = %e, "batch item rejected");
                    }
                    outcomes.push(outcome);
                }
                Ok(BatchReport { outcomes })
            }
        }
    }

    /// Delete many relations by key. In `BestEffort` mode missing keys are
    /// reported per item as `NotFound` and do not affect the others.
    pub fn batch_delete(&self, keys: &[RelationKey], mode: BatchMode) -> Result<BatchReport<Relation>> {
        match mode {
            BatchMode::AllOrNothing => {
                self.check_batch_size(keys.len())?;
                let removed = self.state.write().store.delete_all(keys)?;
                Ok(BatchReport::all_accepted(removed))
            }
            BatchMode::BestEffort => {
                let mut outcomes = Vec::with_capacity(keys.len());
                for (index, key) in keys.iter().enumerate() {
                    let result = self
                        .state
                        .write()
                        .store
                        .delete(key, DeleteMode::Strict)
                        .and_then(|removed| removed.ok_or_else(|| Error::NotFound(format!("Relation {key}"))));
                    let outcome = ItemOutcome::from(result);
                    if let Some(e) = outcome.rejection() {
                        tracing::warn!(index, error = %e, "batch item rejected");
                    }
                    outcomes.push(outcome);
                }
                Ok(BatchReport { outcomes })
            }
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Breadth-first expansion from `query.start`. The start must exist.
    pub async fn traverse(&self, query: &TraversalQuery) -> Result<Vec<TraversalHit>> {
        let depth = self.query_depth(query.max_depth, self.config.default_traversal_depth)?;
        self.require_document(&query.start).await?;

        let state = self.state.read();
        TraversalEngine::new(&state.store).traverse(&query.start, query.direction, &query.rel_types, depth)
    }

    /// All simple paths from `query.start` to `query.end`, shortest first.
    pub async fn find_paths(&self, query: &PathQuery) -> Result<Vec<Path>> {
        let depth = self.query_depth(query.max_depth, self.config.default_path_depth)?;
        self.require_document(&query.start).await?;
        self.require_document(&query.end).await?;

        let state = self.state.read();
        PathFinder::new(&state.store, query.direction, &query.rel_types, depth).find_paths(&query.start, &query.end)
    }

    /// One path with the fewest edges, if any exists within the depth bound.
    pub async fn shortest_path(&self, query: &PathQuery) -> Result<Option<Path>> {
        let depth = self.query_depth(query.max_depth, self.config.default_path_depth)?;
        self.require_document(&query.start).await?;
        self.require_document(&query.end).await?;

        let state = self.state.read();
        PathFinder::new(&state.store, query.direction, &query.rel_types, depth).shortest_path(&query.start, &query.end)
    }

    // ========================================================================
    // Inference
    // ========================================================================

    /// Proposals derived from transitive and inverse types. Nothing is written.
    pub async fn infer(&self, query: &InferenceQuery) -> Result<Vec<InferredRelation>> {
        let depth = self.query_depth(query.max_depth, self.config.max_inference_depth)?;
        if let Some(doc) = &query.from {
            self.require_document(doc).await?;
        }

        let state = self.state.read();
        InferenceEngine::new(&state.store, &state.registry, depth).infer(&query.rel_types, query.from.as_ref())
    }

    /// Persist a proposal through the normal validated create path.
    pub async fn accept_inference(&self, inferred: InferredRelation) -> Result<Relation> {
        tracing::debug!(key = %inferred.key(), rule = inferred.rule.name(), "accepting inferred relation");
        self.create_relation(inferred.draft).await
    }

    // ========================================================================
    // Document lifecycle
    // ========================================================================

    /// Cascade hook: drop every relation touching a deleted document.
    pub fn on_document_deleted(&self, doc: &DocId) -> Vec<Relation> {
        let removed = self.state.write().store.remove_document(doc);
        tracing::info!(document = %doc, removed = removed.len(), "document relations cascaded");
        removed
    }

    /// Drop every relation while keeping the registered types.
    pub fn clear(&self) -> usize {
        let removed = self.state.write().store.clear();
        tracing::info!(removed, "graph cleared");
        removed
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    pub fn snapshot(&self) -> GraphSnapshot {
        let state = self.state.read();
        GraphSnapshot {
            format_version: export::SNAPSHOT_FORMAT_VERSION,
            exported_at: Utc::now(),
            relation_types: state.registry.iter().cloned().collect(),
            relations: state.store.in_commit_order().into_iter().cloned().collect(),
        }
    }

    /// Replace all relations with the snapshot's.
    ///
    /// Snapshot types are merged into the registry; a type whose rules
    /// differ from the registered ones fails with `DuplicateType`. Document
    /// existence is not re-checked. On error the graph is left unchanged.
    pub fn restore(&self, snapshot: GraphSnapshot) -> Result<()> {
        let mut state = self.state.write();

        let mut registry = state.registry.clone();
        for spec in snapshot.relation_types {
            registry.register(spec)?;
        }
        let mut store = RelationStore::new();
        for rel in snapshot.relations {
            store.restore(&registry, rel)?;
        }

        tracing::info!(relations = store.len(), "graph restored from snapshot");
        *state = GraphState { registry, store };
        Ok(())
    }

    pub fn save_snapshot(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        self.snapshot().write_to(path)
    }

    /// Write the configured snapshot (if any) and close the document store.
    pub async fn shutdown(&self) -> Result<()> {
        if let Some(path) = self.config.snapshot_path.as_deref() {
            self.save_snapshot(path)?;
        }
        self.documents.close().await?;
        tracing::info!("graph shut down");
        Ok(())
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn require_document(&self, id: &DocId) -> Result<()> {
        if self.documents.exists(id).await? {
            Ok(())
        } else {
            Err(Error::NotFound(format!("Document {id}")))
        }
    }

    /// Check both endpoints exist and fill in kinds the caller did not supply.
    async fn resolve_endpoints(&self, mut draft: RelationDraft) -> Result<RelationDraft> {
        self.require_document(&draft.source).await?;
        self.require_document(&draft.target).await?;
        if draft.source_kind.is_none() {
            draft.source_kind = self.documents.kind_of(&draft.source).await?;
        }
        if draft.target_kind.is_none() {
            draft.target_kind = self.documents.kind_of(&draft.target).await?;
        }
        Ok(draft)
    }

    fn query_depth(&self, requested: Option<usize>, default: usize) -> Result<usize> {
        let depth = requested.unwrap_or(default);
        if depth == 0 || depth > self.config.max_query_depth {
            return Err(Error::InvalidQuery(format!(
                "max_depth must be between 1 and {}, got {depth}",
                self.config.max_query_depth
            )));
        }
        Ok(depth)
    }

    fn check_batch_size(&self, size: usize) -> Result<()> {
        if size > self.config.max_batch_size {
            return Err(Error::BatchTooLarge { size, limit: self.config.max_batch_size });
        }
        Ok(())
    }
}

/// In-memory graph for testing and embedding.
impl Graph<MemoryDocumentStore> {
    pub async fn open_memory() -> Result<Self> {
        Self::open(MemoryDocumentStore::new(), EngineConfig::default()).await
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unknown relation type: {0}")]
    UnknownType(String),

    #[error("Relation type {0} is already registered with different rules")]
    DuplicateType(String),

    #[error("Invalid relation type {type_name}: {message}")]
    InvalidTypeSpec { type_name: String, message: String },

    #[error("Relation type {type_name} has {count} relations and cannot be redefined")]
    TypeInUse { type_name: String, count: usize },

    #[error("Duplicate relation {key}{}", .implied_by.as_ref().map(|k| format!(" (implied by {k})")).unwrap_or_default())]
    DuplicateRelation { key: RelationKey, implied_by: Option<RelationKey> },

    #[error("Document {document} would exceed {limit} {scope}")]
    CardinalityExceeded { document: DocId, scope: String, limit: usize },

    #[error("{rel_type} does not allow {endpoint} {document} of kind {kind}")]
    KindMismatch { rel_type: String, endpoint: &'static str, document: DocId, kind: String },

    #[error("{rel_type} requires property {property}")]
    MissingProperty { rel_type: String, property: String },

    #[error("Relation {key} conflicts with existing {existing}")]
    IncompatibleRelation { key: RelationKey, existing: RelationKey },

    #[error("Relation {0} would create a cycle")]
    CyclicRelation(RelationKey),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Batch item {index} rejected: {cause}")]
    BatchRejected { index: usize, cause: Box<Error> },

    #[error("Batch of {size} items exceeds the limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },

    #[error("Path search invariant violated: {0}")]
    CycleGuardViolation(String),

    #[error("Index entry without stored relation: {0}")]
    IndexInconsistency(RelationKey),

    #[error("Document store error: {0}")]
    DocumentStore(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error as shown to API clients: a stable kind and a reason string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub reason: String,
}

impl Error {
    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::UnknownType(_) => "unknown_type",
            Error::DuplicateType(_) => "duplicate_type",
            Error::InvalidTypeSpec { .. } => "invalid_type_spec",
            Error::TypeInUse { .. } => "type_in_use",
            Error::DuplicateRelation { .. } => "duplicate_relation",
            Error::CardinalityExceeded { .. } => "cardinality_exceeded",
            Error::KindMismatch { .. } => "kind_mismatch",
            Error::MissingProperty { .. } => "missing_property",
            Error::IncompatibleRelation { .. } => "incompatible_relation",
            Error::CyclicRelation(_) => "cyclic_relation",
            Error::NotFound(_) => "not_found",
            Error::InvalidQuery(_) => "invalid_query",
            Error::BatchRejected { .. } => "batch_rejected",
            Error::BatchTooLarge { .. } => "batch_too_large",
            Error::CycleGuardViolation(_) => "cycle_guard_violation",
            Error::IndexInconsistency(_) => "index_inconsistency",
            Error::DocumentStore(_) => "document_store",
            Error::Config(_) => "config",
            Error::Serialization(_) => "serialization",
            Error::Io(_) => "io",
        }
    }

    /// HTTP-style status for the API layer. A rejected batch reports its cause's status.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::UnknownType(_) | Error::InvalidTypeSpec { .. } | Error::InvalidQuery(_) => 400,
            Error::NotFound(_) => 404,
            Error::DuplicateType(_)
            | Error::TypeInUse { .. }
            | Error::DuplicateRelation { .. }
            | Error::IncompatibleRelation { .. } => 409,
            Error::BatchTooLarge { .. } => 413,
            Error::CardinalityExceeded { .. }
            | Error::KindMismatch { .. }
            | Error::MissingProperty { .. }
            | Error::CyclicRelation(_) => 422,
            Error::BatchRejected { cause, .. } => cause.status_code(),
            Error::DocumentStore(_) => 502,
            Error::CycleGuardViolation(_)
            | Error::IndexInconsistency(_)
            | Error::Config(_)
            | Error::Serialization(_)
            | Error::Io(_) => 500,
        }
    }

    /// Faults of the engine or its environment rather than of the request.
    pub fn is_internal(&self) -> bool {
        match self {
            Error::BatchRejected { cause, .. } => cause.is_internal(),
            _ => self.status_code() >= 500,
        }
    }

    /// Client-facing body. Internal errors get a generic reason so no
    /// internal state leaks.
    pub fn to_body(&self) -> ErrorBody {
        let reason = if self.is_internal() {
            "internal error".to_owned()
        } else {
            self.to_string()
        };
        ErrorBody { kind: self.kind().to_owned(), reason }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_hides_internal_state() {
        let err = Error::IndexInconsistency(RelationKey::new("a", "b", "SECRET_TYPE"));
        let body = err.to_body();
        assert_eq!(body.kind, "index_inconsistency");
        assert_eq!(body.reason, "internal error");
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_batch_rejection_reports_cause_status() {
        let err = Error::BatchRejected {
            index: 2,
            cause: Box::new(Error::CardinalityExceeded {
                document: "a".into(),
                scope: "outgoing NEXT_STEP relations".into(),
                limit: 1,
            }),
        };
        assert_eq!(err.status_code(), 422);
        assert!(!err.is_internal());
        assert_eq!(
            err.to_body().reason,
            "Batch item 2 rejected: Document a would exceed 1 outgoing NEXT_STEP relations"
        );
    }

    #[test]
    fn test_duplicate_message() {
        let err = Error::DuplicateRelation {
            key: RelationKey::new("b", "a", "RELATED_TO"),
            implied_by: Some(RelationKey::new("a", "b", "RELATED_TO")),
        };
        assert_eq!(
            err.to_string(),
            "Duplicate relation (b)-[:RELATED_TO]->(a) (implied by (a)-[:RELATED_TO]->(b))"
        );
    }
}
