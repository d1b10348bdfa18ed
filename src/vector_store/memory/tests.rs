use super::*;
use crate::PleaseError;
use crate::vector_store::{CacheStatus, StaleReason};

fn provenance() -> EmbeddingProvenance {
    EmbeddingProvenance {
        provider: "ollama".to_string(),
        model: "nomic-embed-text".to_string(),
        dimensions: 768,
    }
}

fn metadata(command: &str) -> RecordMetadata {
    RecordMetadata {
        command: command.to_string(),
        filename: format!("/commands/{}.md", command),
        file_mtime: 1_700_000_000,
        ..RecordMetadata::default()
    }
}

#[tokio::test]
async fn search_orders_by_similarity() {
    let store = MemoryVectorStore::new();
    store
        .add("cmd_x", vec![1.0, 0.0], metadata("x"))
        .await
        .expect("add succeeds");
    store
        .add("cmd_y", vec![0.0, 1.0], metadata("y"))
        .await
        .expect("add succeeds");
    store
        .add("cmd_xy", vec![1.0, 1.0], metadata("xy"))
        .await
        .expect("add succeeds");

    let results = store.search(&[1.0, 0.1], 2).await.expect("search succeeds");

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id, "cmd_x");
    assert_eq!(results[1].id, "cmd_xy");
    assert!(results[0].score > results[1].score);
    assert_eq!(results[0].metadata.command, "x");
}

#[tokio::test]
async fn add_is_an_upsert() {
    let store = MemoryVectorStore::new();
    store
        .add("cmd_x", vec![1.0, 0.0], metadata("x"))
        .await
        .expect("add succeeds");
    store
        .add("cmd_x", vec![0.0, 1.0], metadata("x2"))
        .await
        .expect("add succeeds");

    assert_eq!(store.count().await.expect("count"), 1);
    let results = store.search(&[0.0, 1.0], 5).await.expect("search succeeds");
    assert_eq!(results[0].metadata.command, "x2");
    assert!((results[0].score - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn empty_vectors_are_rejected() {
    let store = MemoryVectorStore::new();
    assert!(matches!(
        store.add("cmd_x", Vec::new(), metadata("x")).await,
        Err(PleaseError::Store(_))
    ));
    assert!(matches!(
        store.search(&[], 3).await,
        Err(PleaseError::Store(_))
    ));
}

#[tokio::test]
async fn empty_store_search_is_empty() {
    let store = MemoryVectorStore::new();
    let results = store.search(&[1.0], 3).await.expect("search succeeds");
    assert!(results.is_empty());
}

#[tokio::test]
async fn delete_and_clear() {
    let store = MemoryVectorStore::new();
    for id in ["a", "b", "c"] {
        store
            .add(id, vec![1.0], metadata(id))
            .await
            .expect("add succeeds");
    }

    store.delete("b").await.expect("delete succeeds");
    store.delete("missing").await.expect("deleting nothing is fine");
    assert_eq!(store.count().await.expect("count"), 2);

    store.clear().await.expect("clear succeeds");
    assert_eq!(store.count().await.expect("count"), 0);
}

#[tokio::test]
async fn replace_all_swaps_contents() {
    let store = MemoryVectorStore::new();
    store
        .add("old", vec![1.0], metadata("old"))
        .await
        .expect("add succeeds");

    store
        .replace_all(vec![
            VectorRecord {
                id: "new1".to_string(),
                vector: vec![1.0],
                metadata: metadata("new1"),
            },
            VectorRecord {
                id: "new2".to_string(),
                vector: vec![0.5],
                metadata: metadata("new2"),
            },
        ], &provenance())
        .await
        .expect("replace succeeds");

    assert_eq!(store.count().await.expect("count"), 2);
    let ids: Vec<String> = store
        .search(&[1.0], 10)
        .await
        .expect("search succeeds")
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert!(!ids.contains(&"old".to_string()));
}

#[tokio::test]
async fn failed_replace_keeps_previous_contents() {
    let store = MemoryVectorStore::new();
    store
        .add("old", vec![1.0], metadata("old"))
        .await
        .expect("add succeeds");

    let result = store
        .replace_all(vec![VectorRecord {
            id: "broken".to_string(),
            vector: Vec::new(),
            metadata: metadata("broken"),
        }], &provenance())
        .await;

    assert!(result.is_err());
    assert_eq!(store.count().await.expect("count"), 1);
}

#[tokio::test]
async fn memory_cache_is_never_reusable() {
    let store = MemoryVectorStore::new();
    store
        .replace_all(Vec::new(), &provenance())
        .await
        .expect("replace succeeds");

    let status = store
        .cache_status(&[], &provenance())
        .await
        .expect("status computed");
    assert_eq!(status, CacheStatus::Stale(StaleReason::NotPersisted));
    assert_eq!(store.kind(), "memory");
}
