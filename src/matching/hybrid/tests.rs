use super::*;
use crate::embeddings::Embedder;
use crate::test_utils::{MockEmbedder, doc, doc_with_example};
use crate::vector_store::{MemoryVectorStore, VectorStore};
use std::sync::Arc;

fn corpus() -> Vec<Document> {
    let mut kubectl = doc_with_example("kubectl", "show all pods", "kubectl get pods -A");
    kubectl.keywords = vec!["pods".to_string(), "cluster".to_string()];
    let docker = doc_with_example("docker", "list containers", "docker ps");
    let mut df = doc("df");
    df.keywords = vec!["disk".to_string(), "space".to_string()];
    vec![kubectl, docker, df]
}

async fn indexed_matcher(strategy: Strategy) -> (HybridMatcher, Arc<MockEmbedder>) {
    let embedder = Arc::new(MockEmbedder::new());
    let semantic = SemanticMatcher::new(
        Arc::clone(&embedder) as Arc<dyn Embedder>,
        Arc::new(MemoryVectorStore::new()) as Arc<dyn VectorStore>,
    );
    let mut matcher = HybridMatcher::new(strategy, Some(semantic));
    matcher.set_docs(corpus());
    matcher.index_semantic().await.expect("index succeeds");
    (matcher, embedder)
}

fn commands<'a>(docs: &[&'a Document]) -> Vec<&'a str> {
    docs.iter().map(|d| d.command.as_str()).collect()
}

#[test]
fn strategy_parsing_and_display() {
    assert_eq!(Strategy::default(), Strategy::Hybrid);
    assert_eq!(Strategy::Semantic.to_string(), "semantic");

    let parsed: Strategy = serde_json::from_str("\"keyword\"").expect("can parse json");
    assert_eq!(parsed, Strategy::Keyword);

    let from_cli = <Strategy as clap::ValueEnum>::from_str("hybrid", true).expect("valid value");
    assert_eq!(from_cli, Strategy::Hybrid);
}

#[tokio::test]
async fn hybrid_fast_path_skips_embeddings() {
    let (matcher, embedder) = indexed_matcher(Strategy::Hybrid).await;
    let calls_after_index = embedder.calls();

    let docs = matcher
        .find_relevant_docs("show me all pods", 3)
        .await
        .expect("hybrid never fails");

    assert_eq!(commands(&docs)[0], "kubectl");
    assert_eq!(embedder.calls(), calls_after_index);
}

#[tokio::test]
async fn hybrid_falls_back_to_semantic_once() {
    let (matcher, embedder) = indexed_matcher(Strategy::Hybrid).await;
    let calls_after_index = embedder.calls();

    // no lexical overlap with any command, keyword or example
    let docs = matcher
        .find_relevant_docs("which container images exist", 1)
        .await
        .expect("hybrid never fails");

    assert_eq!(embedder.calls(), calls_after_index + 1);
    assert_eq!(commands(&docs), vec!["docker"]);
}

#[tokio::test]
async fn hybrid_without_semantic_returns_empty() {
    let mut matcher = HybridMatcher::new(Strategy::Hybrid, None);
    matcher.set_docs(corpus());

    let docs = matcher
        .find_relevant_docs("which container images exist", 3)
        .await
        .expect("hybrid never fails");
    assert!(docs.is_empty());
}

#[tokio::test]
async fn hybrid_swallows_semantic_errors() {
    let embedder = Arc::new(MockEmbedder::failing_on("zebra"));
    let semantic = SemanticMatcher::new(
        Arc::clone(&embedder) as Arc<dyn Embedder>,
        Arc::new(MemoryVectorStore::new()) as Arc<dyn VectorStore>,
    );
    let mut matcher = HybridMatcher::new(Strategy::Hybrid, Some(semantic));
    matcher.set_docs(corpus());
    matcher.index_semantic().await.expect("index succeeds");

    let docs = matcher
        .find_relevant_docs("zebra crossing", 3)
        .await
        .expect("hybrid never fails");

    assert!(docs.is_empty());
    assert_eq!(embedder.calls(), 4);
}

#[tokio::test]
async fn hybrid_skips_unindexed_semantic() {
    let embedder = Arc::new(MockEmbedder::new());
    let semantic = SemanticMatcher::new(
        Arc::clone(&embedder) as Arc<dyn Embedder>,
        Arc::new(MemoryVectorStore::new()) as Arc<dyn VectorStore>,
    );
    let mut matcher = HybridMatcher::new(Strategy::Hybrid, Some(semantic));
    matcher.set_docs(corpus());

    let docs = matcher
        .find_relevant_docs("which container images exist", 3)
        .await
        .expect("hybrid never fails");

    assert!(docs.is_empty());
    assert!(!matcher.is_semantic_indexed());
    assert_eq!(embedder.calls(), 0);
}

#[tokio::test]
async fn keyword_strategy_never_embeds() {
    let (matcher, embedder) = indexed_matcher(Strategy::Keyword).await;
    let calls_after_index = embedder.calls();

    let docs = matcher
        .find_relevant_docs("which container images exist", 3)
        .await
        .expect("keyword never fails");

    assert!(docs.is_empty());
    assert_eq!(embedder.calls(), calls_after_index);

    let docs = matcher
        .find_relevant_docs("free disk space", 3)
        .await
        .expect("keyword never fails");
    assert_eq!(commands(&docs), vec!["df"]);
}

#[tokio::test]
async fn semantic_strategy_always_embeds() {
    let (mut matcher, embedder) = indexed_matcher(Strategy::Semantic).await;
    let calls_after_index = embedder.calls();

    let docs = matcher
        .find_relevant_docs("show me all pods", 2)
        .await
        .expect("semantic search succeeds");

    assert_eq!(embedder.calls(), calls_after_index + 1);
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].command, "kubectl");

    matcher.set_strategy(Strategy::Keyword);
    assert_eq!(matcher.strategy(), Strategy::Keyword);
}

#[tokio::test]
async fn semantic_strategy_requires_index() {
    let mut matcher = HybridMatcher::new(Strategy::Semantic, None);
    matcher.set_docs(corpus());

    assert!(matches!(
        matcher.find_relevant_docs("pods", 3).await,
        Err(PleaseError::NotIndexed)
    ));
}

#[tokio::test]
async fn index_semantic_without_matcher_is_noop() {
    let mut matcher = HybridMatcher::default();
    matcher.set_docs(corpus());
    matcher
        .index_semantic()
        .await
        .expect("nothing to index");

    assert!(matcher.semantic().is_none());
    assert!(!matcher.is_semantic_indexed());
    assert_eq!(matcher.docs().len(), 3);
}

#[tokio::test]
async fn replacing_docs_drops_semantic_index() {
    let (mut matcher, embedder) = indexed_matcher(Strategy::Hybrid).await;
    let without_docker: Vec<Document> = corpus()
        .into_iter()
        .filter(|d| d.command != "docker")
        .collect();

    matcher.set_docs(without_docker);
    assert!(!matcher.is_semantic_indexed());

    let calls_after_reload = embedder.calls();
    let docs = matcher
        .find_relevant_docs("which container images exist", 3)
        .await
        .expect("hybrid never fails");
    assert!(docs.is_empty());
    assert_eq!(embedder.calls(), calls_after_reload);

    matcher.index_semantic().await.expect("index succeeds");
    let docs = matcher
        .find_relevant_docs("which container images exist", 3)
        .await
        .expect("hybrid never fails");
    assert!(!docs.is_empty());
    assert!(!commands(&docs).contains(&"docker"));
}
