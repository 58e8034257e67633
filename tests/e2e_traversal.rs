//! End-to-end tests for traversal and path discovery.
//!
//! Graph-shaped scenarios run through the async `Graph` handle; the
//! property tests drive `TraversalEngine` and `PathFinder` directly over
//! randomly generated relation sets.

use chrono::Utc;
use docgraph::{
    Direction, DocId, EngineConfig, Error, Graph, MemoryDocumentStore, PathFinder, PathQuery, RelationDraft,
    RelationStore, RelationTypeRegistry, RelationTypeSpec, TraversalEngine, TraversalQuery, TypeFilter,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

// ============================================================================
// Helpers
// ============================================================================

/// Build a graph from `(source, target, type)` triples over TYPE1/TYPE2.
async fn graph_of(edges: &[(&str, &str, &str)]) -> Graph<MemoryDocumentStore> {
    let config = EngineConfig {
        relation_types: vec![RelationTypeSpec::new("TYPE1"), RelationTypeSpec::new("TYPE2")],
        ..EngineConfig::bare()
    };
    let graph = Graph::open(MemoryDocumentStore::new(), config).await.unwrap();
    for (s, t, _) in edges {
        graph.documents().insert(*s, None);
        graph.documents().insert(*t, None);
    }
    for (s, t, rel_type) in edges {
        graph.create_relation(RelationDraft::new(*s, *t, *rel_type)).await.unwrap();
    }
    graph
}

fn docs_of(path: &docgraph::Path) -> Vec<String> {
    path.documents.iter().map(ToString::to_string).collect()
}

// ============================================================================
// 1. Traversal
// ============================================================================

#[tokio::test]
async fn test_chain_depth_cutoff() {
    let graph = graph_of(&[("A", "B", "TYPE1"), ("B", "C", "TYPE1"), ("C", "D", "TYPE1")]).await;
    let hits = graph.traverse(&TraversalQuery::new("A").max_depth(2)).await.unwrap();

    let got: Vec<(String, usize)> = hits.iter().map(|h| (h.document.to_string(), h.depth)).collect();
    assert_eq!(got, vec![("B".to_string(), 1), ("C".to_string(), 2)]);
}

#[tokio::test]
async fn test_default_depth_and_limits() {
    let graph = graph_of(&[("A", "B", "TYPE1"), ("B", "C", "TYPE1"), ("C", "D", "TYPE1"), ("D", "E", "TYPE1")]).await;

    // Default traversal depth is 3.
    let hits = graph.traverse(&TraversalQuery::new("A")).await.unwrap();
    assert_eq!(hits.len(), 3);

    let err = graph.traverse(&TraversalQuery::new("A").max_depth(0)).await.unwrap_err();
    assert!(matches!(err, Error::InvalidQuery(_)));
    let err = graph.traverse(&TraversalQuery::new("A").max_depth(11)).await.unwrap_err();
    assert!(matches!(err, Error::InvalidQuery(_)));
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn test_unknown_start_vs_isolated_start() {
    let graph = graph_of(&[("A", "B", "TYPE1")]).await;
    graph.documents().insert("lonely", None);

    let err = graph.traverse(&TraversalQuery::new("ghost")).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert!(graph.traverse(&TraversalQuery::new("lonely")).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_direction_and_type_filter() {
    let graph = graph_of(&[("A", "B", "TYPE1"), ("C", "B", "TYPE2"), ("B", "D", "TYPE2")]).await;

    let incoming = graph
        .traverse(&TraversalQuery::new("B").direction(Direction::Incoming).max_depth(1))
        .await
        .unwrap();
    let mut got: Vec<String> = incoming.iter().map(|h| h.document.to_string()).collect();
    got.sort();
    assert_eq!(got, vec!["A", "C"]);

    let typed = graph
        .traverse(&TraversalQuery::new("B").direction(Direction::All).types(["TYPE2"]).max_depth(1))
        .await
        .unwrap();
    let mut got: Vec<String> = typed.iter().map(|h| h.document.to_string()).collect();
    got.sort();
    assert_eq!(got, vec!["C", "D"]);
}

// ============================================================================
// 2. Paths
// ============================================================================

#[tokio::test]
async fn test_paths_shorter_first() {
    let graph = graph_of(&[("A", "B", "TYPE1"), ("B", "C", "TYPE1"), ("A", "C", "TYPE1")]).await;
    let paths = graph
        .find_paths(&PathQuery::new("A", "C").types(["TYPE1"]).max_depth(3))
        .await
        .unwrap();

    assert_eq!(paths.len(), 2);
    assert_eq!(docs_of(&paths[0]), vec!["A", "C"]);
    assert_eq!(docs_of(&paths[1]), vec!["A", "B", "C"]);
}

#[tokio::test]
async fn test_cycle_only_trivial_path() {
    let graph = graph_of(&[("A", "B", "TYPE1"), ("B", "C", "TYPE1"), ("C", "A", "TYPE1")]).await;
    let paths = graph.find_paths(&PathQuery::new("A", "A").max_depth(5)).await.unwrap();

    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].len(), 0);
    assert_eq!(docs_of(&paths[0]), vec!["A"]);
}

#[tokio::test]
async fn test_no_path_is_empty_not_error() {
    let graph = graph_of(&[("A", "B", "TYPE1"), ("C", "D", "TYPE1")]).await;
    assert!(graph.find_paths(&PathQuery::new("A", "D")).await.unwrap().is_empty());
    assert!(graph.shortest_path(&PathQuery::new("A", "D")).await.unwrap().is_none());

    let err = graph.find_paths(&PathQuery::new("A", "nowhere")).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_incoming_paths_walk_backwards() {
    let graph = graph_of(&[("A", "B", "TYPE1"), ("B", "C", "TYPE1")]).await;
    let paths = graph
        .find_paths(&PathQuery::new("C", "A").direction(Direction::Incoming))
        .await
        .unwrap();
    assert_eq!(paths.len(), 1);
    assert_eq!(docs_of(&paths[0]), vec!["C", "B", "A"]);
    assert_eq!(paths[0].relations[0].source, DocId::from("B"));
}

#[tokio::test]
async fn test_shortest_path() {
    let graph = graph_of(&[("A", "B", "TYPE1"), ("B", "C", "TYPE1"), ("C", "D", "TYPE1"), ("A", "C", "TYPE2")]).await;
    let path = graph.shortest_path(&PathQuery::new("A", "D")).await.unwrap().unwrap();
    assert_eq!(docs_of(&path), vec!["A", "C", "D"]);
    assert_eq!(path.relations[0].rel_type, "TYPE2");
}

// ============================================================================
// 3. Properties over random graphs
// ============================================================================

const NODES: usize = 6;

fn store_from(edges: &[(usize, usize, bool)]) -> RelationStore {
    let mut registry = RelationTypeRegistry::new();
    registry.register(RelationTypeSpec::new("TYPE1")).unwrap();
    let mut store = RelationStore::new();
    for (s, t, bidirectional) in edges {
        // Duplicates and implied reverses are expected rejections here.
        let _ = store.create(
            &registry,
            None,
            RelationDraft::new(format!("n{s}"), format!("n{t}"), "TYPE1").bidirectional(*bidirectional),
            Utc::now(),
        );
    }
    store
}

fn edges_strategy() -> impl Strategy<Value = Vec<(usize, usize, bool)>> {
    prop::collection::vec((0..NODES, 0..NODES, any::<bool>()), 0..16)
}

proptest! {
    #[test]
    fn prop_paths_are_simple_ordered_and_bounded(
        edges in edges_strategy(),
        start in 0..NODES,
        end in 0..NODES,
        depth in 1usize..5,
    ) {
        let store = store_from(&edges);
        let filter = TypeFilter::any();
        let (start, end) = (DocId::new(format!("n{start}")), DocId::new(format!("n{end}")));
        let finder = PathFinder::new(&store, Direction::Outgoing, &filter, depth);
        let paths = finder.find_paths(&start, &end).unwrap();

        for pair in paths.windows(2) {
            prop_assert!(pair[0].len() <= pair[1].len());
        }
        for path in &paths {
            prop_assert!(path.len() <= depth);
            prop_assert_eq!(path.start(), Some(&start));
            prop_assert_eq!(path.end(), Some(&end));
            let mut seen = std::collections::HashSet::new();
            prop_assert!(path.documents.iter().all(|d| seen.insert(d.clone())));
        }

        let shortest = finder.shortest_path(&start, &end).unwrap();
        prop_assert_eq!(shortest.map(|p| p.len()), paths.first().map(|p| p.len()));
    }

    #[test]
    fn prop_traversal_depth_is_shortest_hop(
        edges in edges_strategy(),
        start in 0..NODES,
        depth in 1usize..5,
    ) {
        let store = store_from(&edges);
        let filter = TypeFilter::any();
        let start = DocId::new(format!("n{start}"));
        let hits = TraversalEngine::new(&store).traverse(&start, Direction::Outgoing, &filter, depth).unwrap();
        let finder = PathFinder::new(&store, Direction::Outgoing, &filter, depth);

        let mut seen = std::collections::HashSet::new();
        for hit in &hits {
            prop_assert!(seen.insert(hit.document.clone()), "document reported twice");
            prop_assert_ne!(&hit.document, &start);
            let shortest = finder.shortest_path(&start, &hit.document).unwrap();
            prop_assert_eq!(shortest.map(|p| p.len()), Some(hit.depth));
        }
        for n in 0..NODES {
            let doc = DocId::new(format!("n{n}"));
            if doc != start && finder.shortest_path(&start, &doc).unwrap().is_some() {
                prop_assert!(seen.contains(&doc));
            }
        }
    }
}
