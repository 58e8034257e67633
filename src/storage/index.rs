//! Adjacency index over committed relations.
//!
//! Every document that takes part in at least one relation has an
//! [`Adjacency`] entry holding its outgoing and incoming edges, partitioned
//! by relation type. Partitions keep the order in which their type was first
//! seen, and each partition keeps insertion order, so enumeration is stable
//! for a given index state.
//!
//! ## Mirror edges
//!
//! A bidirectional relation `A -[T]-> B` is stored once, under its identity
//! key. The index additionally files a *mirror* entry `B -[T]-> A` that
//! points back at the same key. This is the only place mirrors exist:
//! duplicate detection, degree counting and neighbor enumeration all go
//! through the entries filed here, so a mirror can never be stored as a
//! second identity key.

use hashbrown::{HashMap, HashSet};
use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::model::{DocId, Direction, Relation, RelationKey};

/// Restricts traversal to a set of relation types. `TypeFilter::any()` passes everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeFilter(Option<HashSet<String>>);

impl TypeFilter {
    pub fn any() -> Self {
        Self(None)
    }

    pub fn only<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(Some(types.into_iter().map(Into::into).collect()))
    }

    pub fn allows(&self, rel_type: &str) -> bool {
        self.0.as_ref().map_or(true, |set| set.contains(rel_type))
    }

    pub fn is_any(&self) -> bool {
        self.0.is_none()
    }
}

impl<S: Into<String>> From<Option<Vec<S>>> for TypeFilter {
    /// `None` and an empty list both mean "all types", matching the API's optional parameter.
    fn from(types: Option<Vec<S>>) -> Self {
        match types {
            Some(list) if !list.is_empty() => TypeFilter::only(list),
            _ => TypeFilter::any(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct EdgeRef {
    key: RelationKey,
    mirrored: bool,
}

type Partition = SmallVec<[EdgeRef; 4]>;

#[derive(Debug, Default)]
struct Adjacency {
    outgoing: IndexMap<String, Partition>,
    incoming: IndexMap<String, Partition>,
    /// Stored relations touching this document (a self-loop counts once).
    incident: usize,
}

impl Adjacency {
    fn is_empty(&self) -> bool {
        self.incident == 0 && self.outgoing.is_empty() && self.incoming.is_empty()
    }
}

/// One edge as seen from a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeView<'a> {
    /// Identity key of the stored relation behind this edge.
    pub key: &'a RelationKey,
    /// The document at the other end.
    pub neighbor: &'a DocId,
    /// True when the edge is the derived reverse of a bidirectional relation.
    pub mirrored: bool,
}

/// Adjacency view over all committed relations.
#[derive(Debug, Default)]
pub struct GraphIndex {
    adjacency: HashMap<DocId, Adjacency>,
}

impl GraphIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents with at least one relation.
    pub fn document_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn contains(&self, doc: &DocId) -> bool {
        self.adjacency.contains_key(doc)
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    pub(crate) fn insert(&mut self, rel: &Relation) {
        let key = rel.key();
        let plain = EdgeRef { key: key.clone(), mirrored: false };

        file(&mut self.adjacency.entry(rel.source.clone()).or_default().outgoing, &key.rel_type, plain.clone());
        file(&mut self.adjacency.entry(rel.target.clone()).or_default().incoming, &key.rel_type, plain);

        if rel.is_mirrored() {
            let mirror = EdgeRef { key: key.clone(), mirrored: true };
            file(&mut self.adjacency.entry(rel.target.clone()).or_default().outgoing, &key.rel_type, mirror.clone());
            file(&mut self.adjacency.entry(rel.source.clone()).or_default().incoming, &key.rel_type, mirror);
        }

        self.adjacency.entry(rel.source.clone()).or_default().incident += 1;
        if rel.source != rel.target {
            self.adjacency.entry(rel.target.clone()).or_default().incident += 1;
        }
    }

    pub(crate) fn remove(&mut self, rel: &Relation) {
        let key = rel.key();
        for doc in [&rel.source, &rel.target] {
            if let Some(adj) = self.adjacency.get_mut(doc) {
                unfile(&mut adj.outgoing, &key);
                unfile(&mut adj.incoming, &key);
            }
        }

        let mut endpoints: SmallVec<[&DocId; 2]> = SmallVec::new();
        endpoints.push(&rel.source);
        if rel.source != rel.target {
            endpoints.push(&rel.target);
        }
        for doc in endpoints {
            let now_empty = match self.adjacency.get_mut(doc) {
                Some(adj) => {
                    adj.incident = adj.incident.saturating_sub(1);
                    adj.is_empty()
                }
                None => false,
            };
            if now_empty {
                self.adjacency.remove(doc);
            }
        }
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Edges of `doc` in the given direction whose type passes `filter`.
    ///
    /// With `Direction::All` each stored relation is reported once per
    /// document, even when it is reachable both as a plain and a mirrored edge.
    pub fn edges<'a>(&'a self, doc: &DocId, dir: Direction, filter: &TypeFilter) -> Vec<EdgeView<'a>> {
        let Some(adj) = self.adjacency.get(doc) else {
            return Vec::new();
        };

        let mut result = Vec::new();
        match dir {
            Direction::Outgoing => collect(doc, &adj.outgoing, filter, &mut result, None),
            Direction::Incoming => collect(doc, &adj.incoming, filter, &mut result, None),
            Direction::All => {
                let mut seen: HashSet<&'a RelationKey> = HashSet::new();
                collect(doc, &adj.outgoing, filter, &mut result, Some(&mut seen));
                collect(doc, &adj.incoming, filter, &mut result, Some(&mut seen));
            }
        }
        result
    }

    /// The stored key behind an effective edge `source -[rel_type]-> target`,
    /// whether that edge is stored directly or derived as a mirror.
    pub fn find_edge(&self, source: &DocId, target: &DocId, rel_type: &str) -> Option<&RelationKey> {
        self.adjacency
            .get(source)?
            .outgoing
            .get(rel_type)?
            .iter()
            .find(|e| e.key.other_end(source) == Some(target))
            .map(|e| &e.key)
    }

    /// Types of all effective edges `source -> target`.
    pub fn types_between(&self, source: &DocId, target: &DocId) -> Vec<&str> {
        let Some(adj) = self.adjacency.get(source) else {
            return Vec::new();
        };
        adj.outgoing
            .iter()
            .filter(|(_, part)| part.iter().any(|e| e.key.other_end(source) == Some(target)))
            .map(|(t, _)| t.as_str())
            .collect()
    }

    /// Effective out-degree of `doc` for one relation type, mirrors included.
    pub fn out_degree(&self, doc: &DocId, rel_type: &str) -> usize {
        self.adjacency
            .get(doc)
            .and_then(|adj| adj.outgoing.get(rel_type))
            .map_or(0, |part| part.len())
    }

    /// Effective in-degree of `doc` for one relation type, mirrors included.
    pub fn in_degree(&self, doc: &DocId, rel_type: &str) -> usize {
        self.adjacency
            .get(doc)
            .and_then(|adj| adj.incoming.get(rel_type))
            .map_or(0, |part| part.len())
    }

    /// Number of stored relations touching `doc`, any type, any direction.
    pub fn relation_count(&self, doc: &DocId) -> usize {
        self.adjacency.get(doc).map_or(0, |adj| adj.incident)
    }

    /// Whether `to` is reachable from `from` over effective outgoing edges of `rel_type`.
    pub fn reaches(&self, from: &DocId, to: &DocId, rel_type: &str) -> bool {
        if from == to {
            return true;
        }
        let filter = TypeFilter::only([rel_type]);
        let mut seen: HashSet<&DocId> = HashSet::new();
        let mut stack: Vec<&DocId> = vec![from];
        seen.insert(from);

        while let Some(doc) = stack.pop() {
            for edge in self.edges(doc, Direction::Outgoing, &filter) {
                if edge.neighbor == to {
                    return true;
                }
                if seen.insert(edge.neighbor) {
                    stack.push(edge.neighbor);
                }
            }
        }
        false
    }

    /// Documents with outgoing edges of `rel_type`, sorted by id.
    pub fn sources_of(&self, rel_type: &str) -> Vec<&DocId> {
        let mut docs: Vec<&DocId> = self
            .adjacency
            .iter()
            .filter(|(_, adj)| adj.outgoing.get(rel_type).is_some_and(|p| !p.is_empty()))
            .map(|(doc, _)| doc)
            .collect();
        docs.sort();
        docs
    }
}

fn file(parts: &mut IndexMap<String, Partition>, rel_type: &str, edge: EdgeRef) {
    match parts.get_mut(rel_type) {
        Some(part) => part.push(edge),
        None => {
            let mut part = Partition::new();
            part.push(edge);
            parts.insert(rel_type.to_owned(), part);
        }
    }
}

fn unfile(parts: &mut IndexMap<String, Partition>, key: &RelationKey) {
    let emptied = match parts.get_mut(&key.rel_type) {
        Some(part) => {
            part.retain(|e| e.key != *key);
            part.is_empty()
        }
        None => false,
    };
    if emptied {
        parts.shift_remove(&key.rel_type);
    }
}

fn collect<'a>(
    doc: &DocId,
    parts: &'a IndexMap<String, Partition>,
    filter: &TypeFilter,
    out: &mut Vec<EdgeView<'a>>,
    mut seen: Option<&mut HashSet<&'a RelationKey>>,
) {
    for (rel_type, part) in parts {
        if !filter.allows(rel_type) {
            continue;
        }
        for edge in part {
            if let Some(seen) = seen.as_deref_mut() {
                if !seen.insert(&edge.key) {
                    continue;
                }
            }
            out.push(EdgeView {
                key: &edge.key,
                // Every edge filed under `doc` has `doc` as one of its key's ends.
                neighbor: edge.key.other_end(doc).unwrap_or(&edge.key.target),
                mirrored: edge.mirrored,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::model::PropertyMap;

    fn rel(src: &str, dst: &str, t: &str, bidirectional: bool) -> Relation {
        Relation {
            source: src.into(),
            target: dst.into(),
            rel_type: t.into(),
            properties: PropertyMap::new(),
            created_at: Utc::now(),
            updated_at: None,
            bidirectional,
        }
    }

    fn neighbors(idx: &GraphIndex, doc: &str, dir: Direction) -> Vec<String> {
        idx.edges(&doc.into(), dir, &TypeFilter::any())
            .into_iter()
            .map(|e| e.neighbor.to_string())
            .collect()
    }

    #[test]
    fn test_directed_edges() {
        let mut idx = GraphIndex::new();
        idx.insert(&rel("a", "b", "NEXT_STEP", false));
        idx.insert(&rel("a", "c", "REFERENCES", false));

        assert_eq!(neighbors(&idx, "a", Direction::Outgoing), vec!["b", "c"]);
        assert_eq!(neighbors(&idx, "b", Direction::Incoming), vec!["a"]);
        assert!(neighbors(&idx, "b", Direction::Outgoing).is_empty());
        assert_eq!(idx.out_degree(&"a".into(), "NEXT_STEP"), 1);
        assert_eq!(idx.relation_count(&"a".into()), 2);
    }

    #[test]
    fn test_mirror_is_derived_not_stored() {
        let mut idx = GraphIndex::new();
        let r = rel("a", "b", "RELATED_TO", true);
        idx.insert(&r);

        assert_eq!(neighbors(&idx, "b", Direction::Outgoing), vec!["a"]);
        let key = idx.find_edge(&"b".into(), &"a".into(), "RELATED_TO").unwrap();
        assert_eq!(*key, r.key());
        assert_eq!(neighbors(&idx, "a", Direction::All), vec!["b"]);
        assert_eq!(idx.relation_count(&"a".into()), 1);
        assert_eq!(idx.relation_count(&"b".into()), 1);
    }

    #[test]
    fn test_remove_drops_empty_documents() {
        let mut idx = GraphIndex::new();
        let r = rel("a", "b", "RELATED_TO", true);
        idx.insert(&r);
        idx.remove(&r);

        assert_eq!(idx.document_count(), 0);
        assert!(idx.find_edge(&"b".into(), &"a".into(), "RELATED_TO").is_none());
    }

    #[test]
    fn test_self_loop() {
        let mut idx = GraphIndex::new();
        let r = rel("a", "a", "RELATED_TO", true);
        idx.insert(&r);

        assert_eq!(neighbors(&idx, "a", Direction::All), vec!["a"]);
        assert_eq!(idx.out_degree(&"a".into(), "RELATED_TO"), 1);
        idx.remove(&r);
        assert_eq!(idx.document_count(), 0);
    }

    #[test]
    fn test_reaches() {
        let mut idx = GraphIndex::new();
        idx.insert(&rel("a", "b", "NEXT_STEP", false));
        idx.insert(&rel("b", "c", "NEXT_STEP", false));
        idx.insert(&rel("c", "d", "REFERENCES", false));

        assert!(idx.reaches(&"a".into(), &"c".into(), "NEXT_STEP"));
        assert!(!idx.reaches(&"a".into(), &"d".into(), "NEXT_STEP"));
        assert!(!idx.reaches(&"c".into(), &"a".into(), "NEXT_STEP"));
    }

    #[test]
    fn test_type_filter_from_option() {
        assert!(TypeFilter::from(None::<Vec<String>>).is_any());
        assert!(TypeFilter::from(Some(Vec::<String>::new())).is_any());
        let f = TypeFilter::from(Some(vec!["NEXT_STEP"]));
        assert!(f.allows("NEXT_STEP"));
        assert!(!f.allows("REFERENCES"));
    }
}
