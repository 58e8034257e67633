//! # Inference
//!
//! Derives candidate relations from the ones already stored. Nothing here
//! writes: every [`InferredRelation`] is a proposal carrying the path that
//! supports it, and callers persist it explicitly through
//! [`Graph::accept_inference`](crate::Graph::accept_inference), which runs
//! the normal validated create path.
//!
//! Two rules are applied, each opt-in per relation type:
//!
//! | Rule         | Type flag          | Pattern                        | Proposal   |
//! |--------------|--------------------|--------------------------------|------------|
//! | `Transitive` | `transitive`       | `A-[T]->B-[T]->C`, no `A-[T]->C` | `A-[T]->C` |
//! | `Inverse`    | `inverse = I`      | `A-[T]->B`, no `B-[I]->A`      | `B-[I]->A` |

use std::collections::VecDeque;

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use crate::model::*;
use crate::schema::{RelationTypeRegistry, RelationTypeSpec};
use crate::storage::{RelationStore, TypeFilter};
use crate::Result;

/// Property set on every proposal, naming the rule that produced it.
pub const INFERRED_BY: &str = "inferred_by";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InferenceRule {
    Transitive,
    Inverse,
}

impl InferenceRule {
    pub fn name(self) -> &'static str {
        match self {
            InferenceRule::Transitive => "transitive",
            InferenceRule::Inverse => "inverse",
        }
    }
}

/// A relation the graph implies but does not store.
#[derive(Debug, Clone, PartialEq)]
pub struct InferredRelation {
    pub draft: RelationDraft,
    pub rule: InferenceRule,
    /// Stored relations the proposal is derived from, in order.
    pub support: Path,
}

impl InferredRelation {
    pub fn key(&self) -> RelationKey {
        self.draft.key()
    }
}

/// Which proposals to compute. `max_depth = None` takes the configured default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InferenceQuery {
    pub rel_types: TypeFilter,
    /// Only consider relations leaving (transitive) or touching (inverse) this document.
    pub from: Option<DocId>,
    pub max_depth: Option<usize>,
}

impl InferenceQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rel_types = TypeFilter::only(types);
        self
    }

    pub fn from(mut self, doc: impl Into<DocId>) -> Self {
        self.from = Some(doc.into());
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }
}

pub struct InferenceEngine<'a> {
    store: &'a RelationStore,
    registry: &'a RelationTypeRegistry,
    max_depth: usize,
}

impl<'a> InferenceEngine<'a> {
    pub fn new(store: &'a RelationStore, registry: &'a RelationTypeRegistry, max_depth: usize) -> Self {
        Self { store, registry, max_depth }
    }

    /// All proposals for the types passing `filter`, transitive ones first.
    /// Each identity key is proposed at most once.
    pub fn infer(&self, filter: &TypeFilter, from: Option<&DocId>) -> Result<Vec<InferredRelation>> {
        let mut proposals = Vec::new();
        let mut proposed: HashSet<RelationKey> = HashSet::new();

        for spec in self.registry.iter().filter(|s| filter.allows(&s.type_name)) {
            if spec.transitive {
                for found in self.transitive(spec, from)? {
                    // A chain walked over mirrors is found from both ends.
                    if undirected(spec, &found.support) && proposed.contains(&found.key().mirror()) {
                        continue;
                    }
                    if proposed.insert(found.key()) {
                        proposals.push(found);
                    }
                }
            }
        }
        for spec in self.registry.iter().filter(|s| filter.allows(&s.type_name)) {
            for found in self.inverse(spec, from)? {
                if proposed.insert(found.key()) {
                    proposals.push(found);
                }
            }
        }

        tracing::debug!(count = proposals.len(), "inference finished");
        Ok(proposals)
    }

    fn transitive(&self, spec: &RelationTypeSpec, from: Option<&DocId>) -> Result<Vec<InferredRelation>> {
        let t = spec.type_name.as_str();
        let index = self.store.index();
        let only_t = TypeFilter::only([t]);

        let starts: Vec<&DocId> = match from {
            Some(doc) => vec![doc],
            None => index.sources_of(t),
        };

        let mut found = Vec::new();
        for start in starts {
            // reached document -> (predecessor, key of the edge used)
            let mut parent: HashMap<&DocId, (&DocId, &RelationKey)> = HashMap::new();
            let mut queue: VecDeque<(&DocId, usize)> = VecDeque::new();
            let mut seen: HashSet<&DocId> = HashSet::new();
            seen.insert(start);
            queue.push_back((start, 0));

            while let Some((doc, depth)) = queue.pop_front() {
                if depth == self.max_depth {
                    continue;
                }
                for edge in index.edges(doc, Direction::Outgoing, &only_t) {
                    if !seen.insert(edge.neighbor) {
                        continue;
                    }
                    parent.insert(edge.neighbor, (doc, edge.key));
                    queue.push_back((edge.neighbor, depth + 1));

                    if depth + 1 >= 2 && index.find_edge(start, edge.neighbor, t).is_none() {
                        let support = self.support_path(start, edge.neighbor, &parent)?;
                        if undirected(spec, &support) && index.find_edge(edge.neighbor, start, t).is_some() {
                            continue;
                        }
                        let mut draft = RelationDraft::new(start.clone(), edge.neighbor.clone(), t);
                        if let Some(first) = support.relations.first() {
                            draft.properties = first.properties.clone();
                        }
                        draft.properties.insert(INFERRED_BY.into(), InferenceRule::Transitive.name().into());
                        found.push(InferredRelation { draft, rule: InferenceRule::Transitive, support });
                    }
                }
            }
        }
        Ok(found)
    }

    fn support_path<'g>(
        &self,
        start: &DocId,
        end: &'g DocId,
        parent: &HashMap<&'g DocId, (&'g DocId, &'g RelationKey)>,
    ) -> Result<Path> {
        let mut keys = Vec::new();
        let mut cursor = end;
        while cursor != start {
            let Some((prev, key)) = parent.get(cursor).copied() else {
                break;
            };
            keys.push((cursor, key));
            cursor = prev;
        }

        let mut path = Path::single(start.clone());
        for (doc, key) in keys.into_iter().rev() {
            path.append(self.store.resolve(key)?.clone(), doc.clone());
        }
        Ok(path)
    }

    fn inverse(&self, spec: &RelationTypeSpec, from: Option<&DocId>) -> Result<Vec<InferredRelation>> {
        let Some(inverse) = spec.inverse.as_deref() else {
            return Ok(Vec::new());
        };
        if !self.registry.contains(inverse) {
            return Ok(Vec::new());
        }

        let index = self.store.index();
        let mut found = Vec::new();
        for rel in self.store.of_type(&spec.type_name) {
            if from.is_some_and(|doc| rel.source != *doc && rel.target != *doc) {
                continue;
            }
            if index.find_edge(&rel.target, &rel.source, inverse).is_some() {
                continue;
            }
            let mut draft = RelationDraft::new(rel.target.clone(), rel.source.clone(), inverse);
            draft.properties = rel.properties.clone();
            draft.properties.insert(INFERRED_BY.into(), InferenceRule::Inverse.name().into());

            let mut support = Path::single(rel.source.clone());
            support.append(rel.clone(), rel.target.clone());
            found.push(InferredRelation { draft, rule: InferenceRule::Inverse, support });
        }
        Ok(found)
    }
}

/// Whether a proposal over `support` links its endpoints in both directions.
fn undirected(spec: &RelationTypeSpec, support: &Path) -> bool {
    spec.symmetric || support.relations.iter().any(Relation::is_mirrored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn setup(edges: &[(&str, &str, &str)]) -> (RelationTypeRegistry, RelationStore) {
        let mut reg = RelationTypeRegistry::new();
        reg.register(RelationTypeSpec::new("BELONGS_TO").transitive().acyclic()).unwrap();
        reg.register(RelationTypeSpec::new("PARENT_OF").inverse("CHILD_OF")).unwrap();
        reg.register(RelationTypeSpec::new("CHILD_OF").inverse("PARENT_OF")).unwrap();
        reg.register(RelationTypeSpec::new("EXPLAINS")).unwrap();
        let mut store = RelationStore::new();
        for (src, dst, t) in edges {
            store.create(&reg, None, RelationDraft::new(*src, *dst, *t), Utc::now()).unwrap();
        }
        (reg, store)
    }

    fn keys(found: &[InferredRelation]) -> Vec<String> {
        found.iter().map(|f| f.key().to_string()).collect()
    }

    #[test]
    fn test_transitive_chain() {
        let (reg, store) = setup(&[("a", "b", "BELONGS_TO"), ("b", "c", "BELONGS_TO"), ("c", "d", "BELONGS_TO")]);
        let found = InferenceEngine::new(&store, &reg, 3)
            .infer(&TypeFilter::only(["BELONGS_TO"]), None)
            .unwrap();

        assert_eq!(
            keys(&found),
            vec!["(a)-[:BELONGS_TO]->(c)", "(a)-[:BELONGS_TO]->(d)", "(b)-[:BELONGS_TO]->(d)"]
        );
        assert_eq!(found[1].support.len(), 3);
        assert_eq!(found[0].draft.properties.get(INFERRED_BY), Some(&Value::from("transitive")));
    }

    #[test]
    fn test_transitive_respects_depth_and_existing_edges() {
        let (reg, store) = setup(&[("a", "b", "BELONGS_TO"), ("b", "c", "BELONGS_TO"), ("a", "c", "BELONGS_TO")]);
        let found = InferenceEngine::new(&store, &reg, 3)
            .infer(&TypeFilter::only(["BELONGS_TO"]), None)
            .unwrap();
        assert!(found.is_empty());

        let (reg, store) = setup(&[("a", "b", "BELONGS_TO"), ("b", "c", "BELONGS_TO")]);
        let found = InferenceEngine::new(&store, &reg, 1).infer(&TypeFilter::any(), None).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_inverse_rule() {
        let (reg, store) = setup(&[("p", "c", "PARENT_OF"), ("x", "y", "EXPLAINS")]);
        let found = InferenceEngine::new(&store, &reg, 3).infer(&TypeFilter::any(), None).unwrap();

        assert_eq!(keys(&found), vec!["(c)-[:CHILD_OF]->(p)"]);
        assert_eq!(found[0].rule, InferenceRule::Inverse);
        assert_eq!(found[0].support.len(), 1);
    }

    #[test]
    fn test_inverse_already_present() {
        let (reg, store) = setup(&[("p", "c", "PARENT_OF"), ("c", "p", "CHILD_OF")]);
        let found = InferenceEngine::new(&store, &reg, 3).infer(&TypeFilter::any(), None).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_from_restricts_starts() {
        let (reg, store) = setup(&[("a", "b", "BELONGS_TO"), ("b", "c", "BELONGS_TO"), ("c", "d", "BELONGS_TO")]);
        let from = DocId::from("b");
        let found = InferenceEngine::new(&store, &reg, 3).infer(&TypeFilter::any(), Some(&from)).unwrap();
        assert_eq!(keys(&found), vec!["(b)-[:BELONGS_TO]->(d)"]);
    }

    #[test]
    fn test_symmetric_chain_proposed_once() {
        let mut reg = RelationTypeRegistry::new();
        reg.register(RelationTypeSpec::new("SAME_AS").symmetric().transitive()).unwrap();
        let mut store = RelationStore::new();
        for (src, dst) in [("a", "b"), ("b", "c")] {
            store.create(&reg, None, RelationDraft::new(src, dst, "SAME_AS"), Utc::now()).unwrap();
        }

        let found = InferenceEngine::new(&store, &reg, 3).infer(&TypeFilter::any(), None).unwrap();
        assert_eq!(keys(&found), vec!["(a)-[:SAME_AS]->(c)"]);

        let draft = found[0].draft.clone();
        store.create(&reg, None, draft, Utc::now()).unwrap();
        let again = InferenceEngine::new(&store, &reg, 3).infer(&TypeFilter::any(), None).unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn test_bidirectional_chain_skips_reverse_pairs() {
        let mut reg = RelationTypeRegistry::new();
        reg.register(RelationTypeSpec::new("LINKED").transitive()).unwrap();
        let mut store = RelationStore::new();
        for (src, dst) in [("a", "b"), ("c", "b")] {
            let draft = RelationDraft::new(src, dst, "LINKED").bidirectional(true);
            store.create(&reg, None, draft, Utc::now()).unwrap();
        }
        let found = InferenceEngine::new(&store, &reg, 3).infer(&TypeFilter::any(), None).unwrap();
        assert_eq!(keys(&found), vec!["(a)-[:LINKED]->(c)"]);

        // An existing one-way reverse edge already links the pair.
        store.create(&reg, None, RelationDraft::new("c", "a", "LINKED"), Utc::now()).unwrap();
        let found = InferenceEngine::new(&store, &reg, 3).infer(&TypeFilter::any(), None).unwrap();
        assert!(found.is_empty(), "unexpected proposals: {:?}", keys(&found));
    }
}
