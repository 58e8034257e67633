//! # Traversal
//!
//! Read-only queries over a [`RelationStore`] snapshot:
//!
//! - [`TraversalEngine`]: breadth-first expansion reporting each reachable
//!   document once, at its shortest hop distance.
//! - [`PathFinder`]: simple-path enumeration between two documents.
//!
//! Both take the store by shared reference, so the caller's read guard is
//! the snapshot. Neither has side effects; abandoning a query midway leaves
//! nothing to roll back.

pub mod paths;

use std::collections::VecDeque;

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::model::*;
use crate::storage::{RelationStore, TypeFilter};
use crate::{Error, Result};

pub use paths::{PathFinder, PathQuery};

// ============================================================================
// Query / result types
// ============================================================================

/// Parameters of a traversal. `max_depth = None` takes the configured default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalQuery {
    pub start: DocId,
    pub direction: Direction,
    pub rel_types: TypeFilter,
    pub max_depth: Option<usize>,
}

impl TraversalQuery {
    pub fn new(start: impl Into<DocId>) -> Self {
        Self {
            start: start.into(),
            direction: Direction::Outgoing,
            rel_types: TypeFilter::any(),
            max_depth: None,
        }
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rel_types = TypeFilter::only(types);
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }
}

/// A document reached by a traversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraversalHit {
    pub document: DocId,
    /// The relation over which the document was first reached.
    pub relation: Relation,
    /// Shortest hop distance from the start.
    pub depth: usize,
    /// True when reached over the derived reverse of a bidirectional relation.
    pub mirrored: bool,
}

// ============================================================================
// TraversalEngine
// ============================================================================

/// Breadth-first expansion over the adjacency index.
pub struct TraversalEngine<'a> {
    store: &'a RelationStore,
}

impl<'a> TraversalEngine<'a> {
    pub fn new(store: &'a RelationStore) -> Self {
        Self { store }
    }

    /// Expand from `start` up to `max_depth` hops.
    ///
    /// Results come in BFS order. Each document is expanded at most once;
    /// the first (shallowest) sighting wins. The start is never reported,
    /// even when a cycle leads back to it.
    pub fn traverse(
        &self,
        start: &DocId,
        direction: Direction,
        filter: &TypeFilter,
        max_depth: usize,
    ) -> Result<Vec<TraversalHit>> {
        if max_depth == 0 {
            return Err(Error::InvalidQuery("traversal depth must be at least 1".into()));
        }

        let index = self.store.index();
        let mut seen: HashSet<&DocId> = HashSet::new();
        let mut queue: VecDeque<(&DocId, usize)> = VecDeque::new();
        let mut hits = Vec::new();

        seen.insert(start);
        queue.push_back((start, 0));

        while let Some((doc, depth)) = queue.pop_front() {
            if depth == max_depth {
                continue;
            }
            for edge in index.edges(doc, direction, filter) {
                if !seen.insert(edge.neighbor) {
                    continue;
                }
                let relation = self.store.resolve(edge.key)?.clone();
                hits.push(TraversalHit {
                    document: edge.neighbor.clone(),
                    relation,
                    depth: depth + 1,
                    mirrored: edge.mirrored,
                });
                queue.push_back((edge.neighbor, depth + 1));
            }
        }

        tracing::trace!(%start, ?direction, max_depth, reached = hits.len(), "traversal finished");
        Ok(hits)
    }
}

// ============================================================================
// Tests
// ============================================================================
