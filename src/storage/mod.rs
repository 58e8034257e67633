//! # Relation Store
//!
//! Owns the relation table (identity key → record) and the [`GraphIndex`]
//! built over it. Every mutation validates through the
//! [`RelationTypeRegistry`], then updates table and index together, so a
//! reader holding the same lock never sees one without the other.
//!
//! The store itself is plain data behind `&mut self`; the [`Graph`](crate::Graph)
//! handle provides the lock. All-or-nothing batches run entirely inside one
//! exclusive section and undo their own partial work on failure, which no
//! reader can observe.

pub mod batch;
pub mod index;

use chrono::{DateTime, Utc};
use hashbrown::HashMap;

use crate::model::*;
use crate::schema::RelationTypeRegistry;
use crate::{Error, Result};

pub use batch::{BatchMode, BatchReport, DeleteMode, ItemOutcome};
pub use index::{EdgeView, GraphIndex, TypeFilter};

// ============================================================================
// RelationStore
// ============================================================================

/// Relation records plus their adjacency index.
#[derive(Debug, Default)]
pub struct RelationStore {
    relations: HashMap<RelationKey, Relation>,
    index: GraphIndex,
    type_counts: HashMap<String, usize>,
    /// Commit order of each stored key; snapshots replay in this order so
    /// the rebuilt index enumerates edges the same way.
    sequence: HashMap<RelationKey, u64>,
    next_sequence: u64,
    /// Bumped once per committed mutation.
    version: u64,
}

impl RelationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(&self) -> &GraphIndex {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Number of stored relations of one type.
    pub fn count_of_type(&self, rel_type: &str) -> usize {
        self.type_counts.get(rel_type).copied().unwrap_or(0)
    }

    pub fn get(&self, key: &RelationKey) -> Option<&Relation> {
        self.relations.get(key)
    }

    /// Stored record behind an effective edge: the exact key, or the
    /// bidirectional relation whose mirror it is.
    pub fn lookup(&self, key: &RelationKey) -> Result<Option<&Relation>> {
        if let Some(rel) = self.relations.get(key) {
            return Ok(Some(rel));
        }
        match self.index.find_edge(&key.source, &key.target, &key.rel_type) {
            Some(stored) => self.resolve(stored).map(Some),
            None => Ok(None),
        }
    }

    /// Resolve a key handed out by the index. A miss means index and table
    /// disagree, which is an internal fault rather than a caller error.
    pub fn resolve(&self, key: &RelationKey) -> Result<&Relation> {
        self.relations.get(key).ok_or_else(|| {
            tracing::error!(%key, "index entry without a stored relation");
            Error::IndexInconsistency(key.clone())
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relation> {
        self.relations.values()
    }

    /// All relations in the order they were committed.
    pub fn in_commit_order(&self) -> Vec<&Relation> {
        let mut rels: Vec<(u64, &Relation)> = self
            .relations
            .iter()
            .map(|(key, rel)| (self.sequence.get(key).copied().unwrap_or(u64::MAX), rel))
            .collect();
        rels.sort_by_key(|(seq, _)| *seq);
        rels.into_iter().map(|(_, rel)| rel).collect()
    }

    /// Relations of one type ordered by identity key.
    pub fn of_type(&self, rel_type: &str) -> Vec<&Relation> {
        let mut rels: Vec<&Relation> = self.relations.values().filter(|r| r.rel_type == rel_type).collect();
        rels.sort_by(|a, b| (&a.source, &a.target).cmp(&(&b.source, &b.target)));
        rels
    }

    /// Direct relations of `doc`. Mirrors show up as their stored record.
    pub fn relations_of(&self, doc: &DocId, dir: Direction, filter: &TypeFilter) -> Result<Vec<Relation>> {
        self.index
            .edges(doc, dir, filter)
            .into_iter()
            .map(|edge| self.resolve(edge.key).cloned())
            .collect()
    }

    // ========================================================================
    // Single-item mutation
    // ========================================================================

    /// Validate and commit a new relation.
    pub fn create(
        &mut self,
        registry: &RelationTypeRegistry,
        max_per_document: Option<usize>,
        draft: RelationDraft,
        now: DateTime<Utc>,
    ) -> Result<Relation> {
        let rel = self.admit(registry, max_per_document, draft, now)?;
        self.version += 1;
        tracing::debug!(key = %rel.key(), bidirectional = rel.bidirectional, "relation created");
        Ok(rel)
    }

    /// Create, or replace the relation with the exact same identity key.
    ///
    /// The replaced record is taken out before validation so that it does
    /// not count against cardinality limits; it is put back if the new
    /// record is rejected.
    pub fn replace(
        &mut self,
        registry: &RelationTypeRegistry,
        max_per_document: Option<usize>,
        draft: RelationDraft,
        now: DateTime<Utc>,
    ) -> Result<Relation> {
        let Some(old) = self.uncommit(&draft.key()) else {
            return self.create(registry, max_per_document, draft, now);
        };

        match self.admit(registry, max_per_document, draft, now) {
            Ok(mut rel) => {
                rel.created_at = old.created_at;
                rel.updated_at = Some(now);
                self.relations.insert(rel.key(), rel.clone());
                self.version += 1;
                tracing::debug!(key = %rel.key(), "relation replaced");
                Ok(rel)
            }
            Err(e) => {
                self.commit(old);
                Err(e)
            }
        }
    }

    /// Replace the properties of an existing relation.
    pub fn update_properties(
        &mut self,
        registry: &RelationTypeRegistry,
        key: &RelationKey,
        properties: PropertyMap,
        now: DateTime<Utc>,
    ) -> Result<Relation> {
        let spec = registry.get(&key.rel_type)?;
        if !self.relations.contains_key(key) {
            return Err(Error::NotFound(format!("Relation {key}")));
        }
        if let Some(missing) = spec.required_properties.iter().find(|p| !properties.contains_key(*p)) {
            return Err(Error::MissingProperty {
                rel_type: spec.type_name.clone(),
                property: missing.clone(),
            });
        }

        let rel = self
            .relations
            .get_mut(key)
            .ok_or_else(|| Error::NotFound(format!("Relation {key}")))?;
        rel.properties = properties;
        rel.updated_at = Some(now);
        let updated = rel.clone();
        self.version += 1;
        tracing::debug!(%key, "relation properties updated");
        Ok(updated)
    }

    /// Delete by identity key. `Ok(None)` only in `DeleteMode::IfExists`.
    pub fn delete(&mut self, key: &RelationKey, mode: DeleteMode) -> Result<Option<Relation>> {
        match self.uncommit(key) {
            Some(rel) => {
                self.version += 1;
                tracing::debug!(%key, "relation deleted");
                Ok(Some(rel))
            }
            None => match mode {
                DeleteMode::Strict => Err(Error::NotFound(format!("Relation {key}"))),
                DeleteMode::IfExists => Ok(None),
            },
        }
    }

    /// Remove every relation touching `doc` (cascade on document deletion).
    pub fn remove_document(&mut self, doc: &DocId) -> Vec<Relation> {
        let keys: Vec<RelationKey> = self
            .index
            .edges(doc, Direction::All, &TypeFilter::any())
            .into_iter()
            .map(|edge| edge.key.clone())
            .collect();

        let removed: Vec<Relation> = keys.iter().filter_map(|key| self.uncommit(key)).collect();
        if !removed.is_empty() {
            self.version += 1;
        }
        removed
    }

    /// Drop every relation. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.relations.len();
        self.relations.clear();
        self.sequence.clear();
        self.type_counts.clear();
        self.index = GraphIndex::default();
        if removed > 0 {
            self.version += 1;
        }
        removed
    }

    // ========================================================================
    // All-or-nothing batches
    // ========================================================================

    /// Create every draft or none. On failure, items already admitted in
    /// this call are taken out again and the error names the failing item.
    pub fn create_all(
        &mut self,
        registry: &RelationTypeRegistry,
        max_per_document: Option<usize>,
        drafts: Vec<RelationDraft>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Relation>> {
        let mut admitted: Vec<Relation> = Vec::with_capacity(drafts.len());
        for (index, draft) in drafts.into_iter().enumerate() {
            match self.admit(registry, max_per_document, draft, now) {
                Ok(rel) => admitted.push(rel),
                Err(cause) => {
                    for rel in admitted.iter().rev() {
                        self.uncommit(&rel.key());
                    }
                    return Err(Error::BatchRejected { index, cause: Box::new(cause) });
                }
            }
        }
        if !admitted.is_empty() {
            self.version += 1;
        }
        tracing::debug!(count = admitted.len(), "relation batch created");
        Ok(admitted)
    }

    /// Delete every key or none. Every key must exist, and appear once.
    pub fn delete_all(&mut self, keys: &[RelationKey]) -> Result<Vec<Relation>> {
        let mut seen = hashbrown::HashSet::with_capacity(keys.len());
        for (index, key) in keys.iter().enumerate() {
            if !self.relations.contains_key(key) || !seen.insert(key) {
                return Err(Error::BatchRejected {
                    index,
                    cause: Box::new(Error::NotFound(format!("Relation {key}"))),
                });
            }
        }

        let removed: Vec<Relation> = keys.iter().filter_map(|key| self.uncommit(key)).collect();
        if !removed.is_empty() {
            self.version += 1;
        }
        tracing::debug!(count = removed.len(), "relation batch deleted");
        Ok(removed)
    }

    // ========================================================================
    // Restore
    // ========================================================================

    /// Load a durable record without re-checking kinds or cardinality, which
    /// were enforced when it was first written. Type and uniqueness still apply.
    pub fn restore(&mut self, registry: &RelationTypeRegistry, rel: Relation) -> Result<()> {
        let spec = registry.get(&rel.rel_type)?;
        let mut rel = rel;
        rel.bidirectional |= spec.symmetric;

        let key = rel.key();
        if let Some(existing) = self.index.find_edge(&rel.source, &rel.target, &rel.rel_type) {
            let implied_by = (*existing != key).then(|| existing.clone());
            return Err(Error::DuplicateRelation { key, implied_by });
        }
        if rel.is_mirrored() {
            if let Some(existing) = self.index.find_edge(&rel.target, &rel.source, &rel.rel_type) {
                return Err(Error::DuplicateRelation { key, implied_by: Some(existing.clone()) });
            }
        }
        self.commit(rel);
        self.version += 1;
        Ok(())
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Validate, timestamp and commit without touching the version counter.
    fn admit(
        &mut self,
        registry: &RelationTypeRegistry,
        max_per_document: Option<usize>,
        draft: RelationDraft,
        now: DateTime<Utc>,
    ) -> Result<Relation> {
        let plan = registry.check_write(&draft, &self.index, max_per_document)?;
        let rel = Relation {
            source: draft.source,
            target: draft.target,
            rel_type: draft.rel_type,
            properties: draft.properties,
            created_at: now,
            updated_at: None,
            bidirectional: plan.bidirectional,
        };
        self.commit(rel.clone());
        Ok(rel)
    }

    fn commit(&mut self, rel: Relation) {
        self.index.insert(&rel);
        *self.type_counts.entry(rel.rel_type.clone()).or_default() += 1;
        self.sequence.insert(rel.key(), self.next_sequence);
        self.next_sequence += 1;
        self.relations.insert(rel.key(), rel);
    }

    fn uncommit(&mut self, key: &RelationKey) -> Option<Relation> {
        let rel = self.relations.remove(key)?;
        self.sequence.remove(key);
        self.index.remove(&rel);
        if let Some(count) = self.type_counts.get_mut(&rel.rel_type) {
            *count -= 1;
            if *count == 0 {
                self.type_counts.remove(&rel.rel_type);
            }
        }
        Some(rel)
    }
}

// ============================================================================
// Tests
// ============================================================================
