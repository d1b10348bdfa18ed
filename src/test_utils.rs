// Shared fixtures for unit tests

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::documents::{Document, Example};
use crate::embeddings::Embedder;
use crate::{PleaseError, Result};

const VOCABULARY: [&str; 8] = [
    "pod", "container", "image", "branch", "commit", "disk", "network", "cluster",
];

/// Bag-of-words embedder that counts its calls
#[derive(Debug, Default)]
pub(crate) struct MockEmbedder {
    calls: AtomicUsize,
    fail_on: Option<String>,
    model: Option<String>,
}

impl MockEmbedder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fail any request whose text contains `fragment`
    pub(crate) fn failing_on(fragment: &str) -> Self {
        Self {
            fail_on: Some(fragment.to_string()),
            ..Self::default()
        }
    }

    pub(crate) fn with_model(model: &str) -> Self {
        Self {
            model: Some(model.to_string()),
            ..Self::default()
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_on.as_deref().is_some_and(|f| text.contains(f)) {
            return Err(PleaseError::Provider("mock provider unavailable".to_string()));
        }

        let text = text.to_lowercase();
        let mut vector: Vec<f32> = VOCABULARY
            .iter()
            .map(|word| text.matches(word).count() as f32)
            .collect();
        vector.push(0.1);
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        VOCABULARY.len() + 1
    }

    fn provider(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        self.model.as_deref().unwrap_or("bag-of-words")
    }
}

pub(crate) fn doc(command: &str) -> Document {
    Document {
        filename: format!("/commands/{}.md", command),
        command: command.to_string(),
        aliases: Vec::new(),
        keywords: Vec::new(),
        categories: Vec::new(),
        priority: None,
        version: None,
        content: format!("# {}\n", command),
        examples: Vec::new(),
        updated_at: Utc
            .timestamp_opt(1_700_000_000, 0)
            .single()
            .expect("valid timestamp"),
    }
}

pub(crate) fn doc_with_example(command: &str, request: &str, example_command: &str) -> Document {
    let mut doc = doc(command);
    doc.examples.push(Example {
        user_request: request.to_string(),
        command: example_command.to_string(),
    });
    doc
}
