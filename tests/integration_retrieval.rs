#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// End-to-end keyword retrieval over a real commands directory

use std::fs;
use std::path::Path;
use tempfile::TempDir;

use please::config::Config;
use please::documents::ParseError;
use please::manager::{DocumentSource, IndexOutcome, Manager};
use please::matching::Strategy;

const KUBECTL_DOC: &str = r#"---
command: kubectl
aliases: ["k8s"]
keywords: ["kubernetes", "pods", "cluster"]
categories: ["devops"]
priority: high
---

# kubectl

Manage Kubernetes clusters.

```bash
kubectl get pods -A
```

## Examples

**User**: "show me all pods"
**Command**: `kubectl get pods -A`

User: "tail logs for the web deployment"
Command: kubectl logs -f deploy/web
"#;

const RSYNC_DOC: &str = r#"---
command: rsync
keywords: ["copy", "sync", "remote"]
priority: high
---

# rsync
"#;

const SCP_DOC: &str = r#"---
command: scp
keywords: ["copy", "remote"]
---

# scp
"#;

fn write(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).expect("can write doc");
}

fn commands_dir() -> TempDir {
    let dir = TempDir::new().expect("can create temp dir");
    write(dir.path(), "kubectl.md", KUBECTL_DOC);
    write(dir.path(), "rsync.md", RSYNC_DOC);
    write(dir.path(), "scp.md", SCP_DOC);
    dir
}

async fn loaded_manager(dir: &TempDir) -> Manager {
    let manager = Manager::new(dir.path(), Strategy::Hybrid, None);
    manager.load().await.expect("load succeeds");
    manager
}

async fn commands_for(manager: &Manager, query: &str) -> Vec<String> {
    manager
        .relevant_docs(query, 3)
        .await
        .expect("keyword retrieval never fails")
        .into_iter()
        .map(|d| d.command)
        .collect()
}

#[tokio::test]
async fn finds_docs_by_command_alias_and_example() {
    let dir = commands_dir();
    let manager = loaded_manager(&dir).await;

    assert_eq!(commands_for(&manager, "kubectl rollout status").await, vec!["kubectl"]);
    assert_eq!(commands_for(&manager, "list k8s services").await, vec!["kubectl"]);
    assert_eq!(
        commands_for(&manager, "show me all pods please").await,
        vec!["kubectl"]
    );
    assert!(commands_for(&manager, "the and of").await.is_empty());
}

#[tokio::test]
async fn priority_orders_equal_keyword_matches() {
    let dir = commands_dir();
    let manager = loaded_manager(&dir).await;

    assert_eq!(
        commands_for(&manager, "copy files to server").await,
        vec!["rsync", "scp"]
    );
}

#[tokio::test]
async fn max_docs_limits_results() {
    let dir = commands_dir();
    let manager = loaded_manager(&dir).await;

    let docs = manager
        .relevant_docs("copy to remote host", 1)
        .await
        .expect("keyword retrieval never fails");
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].command, "rsync");
}

#[tokio::test]
async fn ignores_non_command_files_and_reports_broken_ones() {
    let dir = commands_dir();
    write(dir.path(), "README.md", "---\ncommand: readme\n---\n");
    write(dir.path(), "_draft.md", "---\ncommand: draft\n---\n");
    write(dir.path(), "notes.txt", "command: notes\n");
    write(dir.path(), "broken.md", "---\ncommand: broken\nkeywords: [\"x\"]\n");

    let manager = Manager::new(dir.path(), Strategy::Keyword, None);
    let report = manager.load().await.expect("load succeeds");

    assert_eq!(report.loaded, 3);
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(
        report.failures.failures[0].1,
        ParseError::UnclosedFrontMatter
    ));

    let commands: Vec<String> = manager.docs().await.into_iter().map(|d| d.command).collect();
    assert!(!commands.iter().any(|c| c == "readme" || c == "draft" || c == "notes"));
}

#[tokio::test]
async fn duplicate_command_keeps_first_file() {
    let dir = TempDir::new().expect("can create temp dir");
    write(dir.path(), "a-kubectl.md", KUBECTL_DOC);
    write(dir.path(), "b-kubectl.md", KUBECTL_DOC);

    let manager = Manager::new(dir.path(), Strategy::Keyword, None);
    let report = manager.load().await.expect("load succeeds");

    assert_eq!(report.loaded, 1);
    assert!(matches!(
        report.failures.failures[0].1,
        ParseError::DuplicateCommand { .. }
    ));

    let docs = manager.docs().await;
    assert!(docs[0].filename.ends_with("a-kubectl.md"));
}

#[tokio::test]
async fn body_only_doc_takes_command_from_file_name() {
    let dir = TempDir::new().expect("can create temp dir");
    write(
        dir.path(),
        "htop.md",
        "# htop\n\nUser: \"what is eating my cpu\"\nCommand: htop\n",
    );

    let manager = loaded_manager(&dir).await;
    let docs = manager
        .relevant_docs("what is eating cpu", 3)
        .await
        .expect("keyword retrieval never fails");

    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].command, "htop");
    assert!(docs[0].keywords.is_empty());
}

#[tokio::test]
async fn prompt_docs_carry_content_and_examples() {
    let dir = commands_dir();
    let manager = loaded_manager(&dir).await;
    let source: &dyn DocumentSource = &manager;

    let prompt_docs = source.relevant_prompt_docs("show me all pods", 3).await;
    assert_eq!(prompt_docs.len(), 1);

    let kubectl = &prompt_docs[0];
    assert_eq!(kubectl.command, "kubectl");
    assert!(kubectl.content.contains("Manage Kubernetes clusters."));
    assert!(!kubectl.content.contains("priority: high"));
    assert_eq!(kubectl.examples.len(), 2);
    assert_eq!(kubectl.examples[1].command, "kubectl logs -f deploy/web");
}

#[tokio::test]
async fn missing_commands_directory_loads_nothing() {
    let base = TempDir::new().expect("can create temp dir");
    let config = Config::with_base_dir(base.path());

    let manager = Manager::from_config(&config)
        .await
        .expect("can build manager");
    let report = manager.index(false).await.expect("index succeeds");

    assert_eq!(report.load.loaded, 0);
    assert_eq!(report.outcome, IndexOutcome::KeywordOnly);
    assert!(
        manager
            .relevant_docs("show me all pods", 3)
            .await
            .expect("keyword retrieval never fails")
            .is_empty()
    );
}
