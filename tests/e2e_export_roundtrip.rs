//! Snapshot round-trips, Cypher DUMP export and file-based configuration.

use std::path::PathBuf;

use docgraph::{
    BatchMode, Direction, EngineConfig, Error, Graph, GraphSnapshot, MemoryDocumentStore, PathQuery, RelationDraft,
    RelationKey, RelationTypeSpec, TraversalQuery, TypeFilter, export_cypher_dump,
};
use pretty_assertions::assert_eq;

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("docgraph-e2e-{}-{name}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

async fn populated() -> Graph<MemoryDocumentStore> {
    let graph = Graph::open_memory().await.unwrap();
    for id in ["kb-1", "kb-2", "kb-3"] {
        graph.documents().insert(id, Some("guide"));
    }
    graph
        .create_relation(RelationDraft::new("kb-1", "kb-2", "SIMILAR_TO").with_property("similarity_score", 0.91))
        .await
        .unwrap();
    graph
        .create_relation(RelationDraft::new("kb-2", "kb-3", "NEXT_STEP").with_property("order", 2))
        .await
        .unwrap();
    graph
}

#[tokio::test]
async fn test_snapshot_json_round_trip() {
    let graph = populated().await;
    let snapshot = graph.snapshot();
    assert_eq!(snapshot.relations.len(), 2);

    let restored = GraphSnapshot::from_json(&snapshot.to_json().unwrap()).unwrap();
    assert_eq!(restored, snapshot);

    let copy = Graph::open_memory().await.unwrap();
    copy.restore(restored).unwrap();
    assert_eq!(copy.relation_count(), 2);

    // Mirrors are re-derived, not stored.
    let from_kb2 = copy.relations_of(&"kb-2".into(), Direction::Outgoing, &TypeFilter::any()).unwrap();
    assert_eq!(from_kb2.len(), 2);
    let key = RelationKey::new("kb-1", "kb-2", "SIMILAR_TO");
    assert_eq!(copy.get_relation(&key).unwrap(), graph.get_relation(&key).unwrap());

    // Restored data is still validated on later writes.
    copy.documents().insert("kb-4", None);
    copy.documents().insert("kb-2", None);
    let err = copy
        .create_relation(RelationDraft::new("kb-2", "kb-4", "NEXT_STEP").with_property("order", 3))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CardinalityExceeded { limit: 1, .. }));
}

#[tokio::test]
async fn test_restore_rejects_conflicting_types() {
    let graph = populated().await;
    let mut snapshot = graph.snapshot();
    for spec in &mut snapshot.relation_types {
        if spec.type_name == "NEXT_STEP" {
            spec.max_out_degree = Some(7);
        }
    }

    let copy = Graph::open_memory().await.unwrap();
    assert!(matches!(copy.restore(snapshot), Err(Error::DuplicateType(_))));
    assert_eq!(copy.relation_count(), 0);
}

#[tokio::test]
async fn test_shutdown_writes_and_open_reloads() {
    let dir = scratch("reload");
    let path = dir.join("graph.json");
    let _ = std::fs::remove_file(&path);

    let config = EngineConfig { snapshot_path: Some(path.clone()), ..EngineConfig::default() };
    let graph = Graph::open(MemoryDocumentStore::new(), config.clone()).await.unwrap();
    graph.documents().insert("a", None);
    graph.documents().insert("b", None);
    graph.create_relation(RelationDraft::new("a", "b", "FOLLOWS")).await.unwrap();
    graph.shutdown().await.unwrap();
    assert!(path.exists());

    let docs = MemoryDocumentStore::new();
    docs.insert("a", None);
    docs.insert("b", None);
    let reopened = Graph::open(docs, config).await.unwrap();
    assert_eq!(reopened.relation_count(), 1);
    let hits = reopened.traverse(&TraversalQuery::new("a").max_depth(1)).await.unwrap();
    assert_eq!(hits[0].document.as_str(), "b");

    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_cypher_dump() {
    let graph = populated().await;
    let mut out = Vec::new();
    export_cypher_dump(&graph.snapshot(), &mut out).unwrap();
    let script = String::from_utf8(out).unwrap();

    assert!(script.starts_with("// docgraph Cypher DUMP"));
    assert_eq!(script.matches("MERGE (:Document").count(), 3);
    assert!(script.contains("MERGE (a)-[:SIMILAR_TO {created_at: "));
    assert!(script.contains("bidirectional: true, similarity_score: 0.91}]->(b);"));
    assert!(script.contains("MERGE (a)-[:NEXT_STEP {"));
    assert!(script.contains("order: 2}]->(b);"));
}

#[tokio::test]
async fn test_config_file_drives_open() {
    let dir = scratch("config");
    let path = dir.join("docgraph.toml");
    std::fs::write(
        &path,
        r#"
support_catalog = false
default_traversal_depth = 1

[[relation_types]]
type_name = "SUPERSEDES"
acyclic = true
max_in_degree = 1
"#,
    )
    .unwrap();

    let config = EngineConfig::load(&path).unwrap();
    let graph = Graph::open(MemoryDocumentStore::new(), config).await.unwrap();
    let names: Vec<String> = graph.relation_types().into_iter().map(|s| s.type_name).collect();
    assert_eq!(names, vec!["SUPERSEDES"]);
    assert_eq!(
        graph.relation_type("SUPERSEDES").unwrap(),
        RelationTypeSpec::new("SUPERSEDES").acyclic().max_in(1)
    );

    for id in ["v1", "v2", "v3"] {
        graph.documents().insert(id, None);
    }
    graph.create_relation(RelationDraft::new("v2", "v1", "SUPERSEDES")).await.unwrap();
    graph.create_relation(RelationDraft::new("v3", "v2", "SUPERSEDES")).await.unwrap();
    let hits = graph.traverse(&TraversalQuery::new("v3")).await.unwrap();
    assert_eq!(hits.len(), 1);

    assert!(matches!(EngineConfig::load(dir.join("missing.toml")), Err(Error::Config(_))));
    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_restore_keeps_path_discovery_order() {
    let config = EngineConfig { relation_types: vec![RelationTypeSpec::new("LINKS")], ..EngineConfig::bare() };
    let graph = Graph::open(MemoryDocumentStore::new(), config.clone()).await.unwrap();
    for id in ["start", "via-z", "via-a", "goal"] {
        graph.documents().insert(id, None);
    }
    // One batch, one timestamp: only commit order tells these apart.
    let drafts = vec![
        RelationDraft::new("start", "via-z", "LINKS"),
        RelationDraft::new("start", "via-a", "LINKS"),
        RelationDraft::new("via-z", "goal", "LINKS"),
        RelationDraft::new("via-a", "goal", "LINKS"),
    ];
    graph.batch_create(drafts, BatchMode::AllOrNothing).await.unwrap();

    let route = |paths: Vec<docgraph::Path>| -> Vec<String> {
        paths.iter().map(|p| p.documents[1].to_string()).collect()
    };
    let query = PathQuery::new("start", "goal");
    let before = route(graph.find_paths(&query).await.unwrap());
    assert_eq!(before, vec!["via-z", "via-a"]);

    let json = graph.snapshot().to_json().unwrap();
    let copy = Graph::open(MemoryDocumentStore::new(), config).await.unwrap();
    for id in ["start", "via-z", "via-a", "goal"] {
        copy.documents().insert(id, None);
    }
    copy.restore(GraphSnapshot::from_json(&json).unwrap()).unwrap();
    assert_eq!(route(copy.find_paths(&query).await.unwrap()), before);
}
