//! Simple-path discovery between two documents.

use std::collections::VecDeque;

use hashbrown::{HashMap, HashSet};

use crate::model::*;
use crate::storage::{RelationStore, TypeFilter};
use crate::{Error, Result};

/// Parameters of a path search. `max_depth = None` takes the configured default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathQuery {
    pub start: DocId,
    pub end: DocId,
    pub direction: Direction,
    pub rel_types: TypeFilter,
    pub max_depth: Option<usize>,
}

impl PathQuery {
    pub fn new(start: impl Into<DocId>, end: impl Into<DocId>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
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

/// Bounded depth-first path enumeration.
pub struct PathFinder<'a> {
    store: &'a RelationStore,
    direction: Direction,
    filter: &'a TypeFilter,
    max_depth: usize,
}

/// Mutable state of one search.
struct Walk<'a> {
    path: Path,
    on_path: HashSet<&'a DocId>,
    found: Vec<Path>,
}

impl<'a> PathFinder<'a> {
    pub fn new(store: &'a RelationStore, direction: Direction, filter: &'a TypeFilter, max_depth: usize) -> Self {
        Self { store, direction, filter, max_depth }
    }

    /// Every simple path from `start` to `end` with at most `max_depth` edges,
    /// shortest first, ties in discovery order.
    ///
    /// `start == end` yields exactly one zero-length path: any longer path
    /// would revisit `start`.
    pub fn find_paths(&self, start: &'a DocId, end: &DocId) -> Result<Vec<Path>> {
        if start == end {
            return Ok(vec![Path::single(start.clone())]);
        }

        let mut walk = Walk {
            path: Path::single(start.clone()),
            on_path: HashSet::new(),
            found: Vec::new(),
        };
        walk.on_path.insert(start);
        self.descend(start, end, &mut walk)?;

        // Stable: equal lengths keep discovery order.
        walk.found.sort_by_key(Path::len);
        tracing::trace!(%start, %end, paths = walk.found.len(), "path search finished");
        Ok(walk.found)
    }

    fn descend(&self, current: &'a DocId, end: &DocId, walk: &mut Walk<'a>) -> Result<()> {
        if walk.path.len() == self.max_depth {
            return Ok(());
        }

        for edge in self.store.index().edges(current, self.direction, self.filter) {
            let next = edge.neighbor;
            if walk.on_path.contains(next) {
                continue;
            }
            let relation = self.store.resolve(edge.key)?.clone();

            if next == end {
                let mut complete = walk.path.clone();
                complete.append(relation, next.clone());
                walk.found.push(complete);
                continue;
            }

            walk.on_path.insert(next);
            walk.path.append(relation, next.clone());
            self.guard(walk)?;

            self.descend(next, end, walk)?;

            walk.path.pop();
            walk.on_path.remove(next);
        }
        Ok(())
    }

    /// The on-path set and the path stack must describe the same documents;
    /// if they drift apart the no-repeat check above is no longer sound.
    fn guard(&self, walk: &Walk<'a>) -> Result<()> {
        if walk.on_path.len() != walk.path.documents.len() {
            tracing::error!(
                on_path = walk.on_path.len(),
                path_len = walk.path.documents.len(),
                "path stack out of sync with visited set"
            );
            return Err(Error::CycleGuardViolation(format!(
                "path of {} documents tracked with {} visited entries",
                walk.path.documents.len(),
                walk.on_path.len()
            )));
        }
        Ok(())
    }

    /// One path with the fewest edges, found breadth-first. Among equally
    /// short paths the one discovered first wins.
    pub fn shortest_path(&self, start: &'a DocId, end: &DocId) -> Result<Option<Path>> {
        if start == end {
            return Ok(Some(Path::single(start.clone())));
        }

        let index = self.store.index();
        // document -> (predecessor, relation key used to reach it)
        let mut parent: HashMap<&'a DocId, (&'a DocId, &'a RelationKey)> = HashMap::new();
        let mut seen: HashSet<&'a DocId> = HashSet::new();
        let mut queue: VecDeque<(&'a DocId, usize)> = VecDeque::new();
        seen.insert(start);
        queue.push_back((start, 0));

        while let Some((doc, depth)) = queue.pop_front() {
            if depth == self.max_depth {
                continue;
            }
            for edge in index.edges(doc, self.direction, self.filter) {
                if !seen.insert(edge.neighbor) {
                    continue;
                }
                parent.insert(edge.neighbor, (doc, edge.key));
                if edge.neighbor == end {
                    return self.rebuild(start, edge.neighbor, &parent).map(Some);
                }
                queue.push_back((edge.neighbor, depth + 1));
            }
        }
        Ok(None)
    }

    fn rebuild(
        &self,
        start: &DocId,
        end: &'a DocId,
        parent: &HashMap<&'a DocId, (&'a DocId, &'a RelationKey)>,
    ) -> Result<Path> {
        let mut steps: Vec<(&DocId, &RelationKey)> = Vec::new();
        let mut cursor = end;
        while cursor != start {
            let (prev, key) = parent
                .get(cursor)
                .copied()
                .ok_or_else(|| Error::CycleGuardViolation(format!("broken predecessor chain at {cursor}")))?;
            if steps.len() > self.max_depth {
                return Err(Error::CycleGuardViolation(format!("predecessor chain loops at {cursor}")));
            }
            steps.push((cursor, key));
            cursor = prev;
        }

        let mut path = Path::single(start.clone());
        for (doc, key) in steps.into_iter().rev() {
            path.append(self.store.resolve(key)?.clone(), doc.clone());
        }
        Ok(path)
    }
}
