//! In-memory document table.
//!
//! Holds nothing but id → kind. Removing a document here does NOT cascade
//! into the graph; call `Graph::on_document_deleted` for that.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::model::DocId;
use crate::Result;
use super::DocumentStore;

#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    inner: Arc<RwLock<HashMap<DocId, Option<String>>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or re-kind a document.
    pub fn insert(&self, id: impl Into<DocId>, kind: Option<&str>) {
        self.inner.write().insert(id.into(), kind.map(str::to_owned));
    }

    /// Returns whether the document was present.
    pub fn remove(&self, id: &DocId) -> bool {
        self.inner.write().remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn exists(&self, id: &DocId) -> Result<bool> {
        Ok(self.inner.read().contains_key(id))
    }

    async fn kind_of(&self, id: &DocId) -> Result<Option<String>> {
        Ok(self.inner.read().get(id).cloned().flatten())
    }
}
