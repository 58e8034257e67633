//! Path: a sequence of alternating documents and relations.

use serde::{Deserialize, Serialize};
use super::{DocId, Relation};

/// A simple path in the graph: doc -[rel]-> doc -[rel]-> doc ...
///
/// Relations are the stored records; a step taken over the mirror of a
/// bidirectional relation shows the stored record with its original
/// orientation, so read direction from `documents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    /// Documents along the path. Always has one more element than `relations`.
    pub documents: Vec<DocId>,
    /// Relations connecting consecutive documents.
    pub relations: Vec<Relation>,
}

impl Path {
    pub fn single(doc: DocId) -> Self {
        Self { documents: vec![doc], relations: Vec::new() }
    }

    /// Number of edges.
    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    /// `None` only for a path deserialized without documents.
    pub fn start(&self) -> Option<&DocId> {
        self.documents.first()
    }

    pub fn end(&self) -> Option<&DocId> {
        self.documents.last()
    }

    pub fn contains(&self, doc: &DocId) -> bool {
        self.documents.iter().any(|d| d == doc)
    }

    /// Extend path with a relation and the document it leads to.
    pub fn append(&mut self, rel: Relation, doc: DocId) {
        self.relations.push(rel);
        self.documents.push(doc);
    }

    /// Drop the last step. No-op on a zero-length path.
    pub fn pop(&mut self) {
        if self.relations.pop().is_some() {
            self.documents.pop();
        }
    }
}
