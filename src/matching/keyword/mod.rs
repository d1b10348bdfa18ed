
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;

use super::ScoredDocument;
use crate::documents::Document;

const COMMAND_EXACT: u32 = 100;
const COMMAND_PARTIAL: u32 = 50;
const ALIAS_EXACT: u32 = 80;
const ALIAS_PARTIAL: u32 = 40;
const KEYWORD_EXACT: u32 = 10;
const KEYWORD_PARTIAL: u32 = 3;
const KEYWORD_BONUS: u32 = 5;
const KEYWORD_BONUS_THRESHOLD: u32 = 2;
const CATEGORY_EXACT: u32 = 5;
const EXAMPLE_OVERLAP: u32 = 15;

static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "a", "an", "and", "the", "in", "on", "at", "to", "for", "of", "with", "by", "from", "as",
        "is", "was", "are", "were", "be", "been", "my", "me", "i", "you", "it",
    ]
    .into_iter()
    .collect()
});

/// Split text into lowercase tokens.
///
/// Alphanumerics, `-` and `_` form tokens; single-character tokens and stop
/// words are dropped.
#[inline]
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_'))
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .filter(|word| word.chars().count() > 1 && !STOP_WORDS.contains(word.as_str()))
        .collect()
}

fn overlaps(field: &str, tokens: &[String]) -> bool {
    tokens
        .iter()
        .any(|t| field.contains(t.as_str()) || t.contains(field))
}

/// Score a document against already-tokenized query words
#[inline]
pub fn score(doc: &Document, tokens: &[String]) -> u32 {
    let mut score = 0;

    let command = doc.command.to_lowercase();
    if tokens.contains(&command) {
        score += COMMAND_EXACT;
    }
    // "kube" should still find "kubectl"
    if !command.is_empty() && overlaps(&command, tokens) {
        score += COMMAND_PARTIAL;
    }

    for alias in doc.aliases.iter().map(|a| a.to_lowercase()) {
        if alias.is_empty() {
            continue;
        }
        if tokens.contains(&alias) {
            score += ALIAS_EXACT;
        }
        if overlaps(&alias, tokens) {
            score += ALIAS_PARTIAL;
        }
    }

    let mut keyword_matches = 0;
    for keyword in doc.keywords.iter().map(|k| k.to_lowercase()) {
        if keyword.is_empty() {
            continue;
        }
        if tokens.contains(&keyword) {
            keyword_matches += 1;
            score += KEYWORD_EXACT;
        }
        if overlaps(&keyword, tokens) {
            score += KEYWORD_PARTIAL;
        }
    }
    if keyword_matches > KEYWORD_BONUS_THRESHOLD {
        score += keyword_matches * KEYWORD_BONUS;
    }

    score += doc
        .categories
        .iter()
        .map(|c| c.to_lowercase())
        .filter(|c| tokens.contains(c))
        .count() as u32
        * CATEGORY_EXACT;

    for example in &doc.examples {
        let example_tokens = tokenize(&example.user_request);
        let overlap = tokens
            .iter()
            .filter(|t| example_tokens.contains(*t))
            .count() as u32;
        score += overlap * EXAMPLE_OVERLAP;
    }

    match doc.priority {
        Some(priority) => (f64::from(score) * priority.weight()) as u32,
        None => score,
    }
}

/// Rank documents by keyword score, highest first.
///
/// Zero-scoring documents are dropped and ties keep input order. A query with
/// no tokens after stop-word removal matches nothing.
#[inline]
pub fn rank<'a>(
    documents: &'a [Document],
    query: &str,
    max_results: usize,
) -> Vec<ScoredDocument<'a, u32>> {
    let tokens = tokenize(query);
    if tokens.is_empty() || documents.is_empty() {
        return Vec::new();
    }

    debug!(
        "Keyword search over {} docs for tokens {:?}",
        documents.len(),
        tokens
    );

    let mut scored: Vec<ScoredDocument<'a, u32>> = documents
        .iter()
        .map(|document| ScoredDocument {
            document,
            score: score(document, &tokens),
        })
        .filter(|s| s.score > 0)
        .collect();

    // stable sort keeps input order on ties
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.truncate(max_results);

    if let Some(best) = scored.first() {
        debug!(
            "Keyword search returning {} docs (best: {} = {})",
            scored.len(),
            best.document.command,
            best.score
        );
    }

    scored
}

/// Keyword matcher over an owned document set
#[derive(Debug, Clone, Default)]
pub struct KeywordMatcher {
    docs: Vec<Document>,
}

impl KeywordMatcher {
    #[inline]
    pub fn new(docs: Vec<Document>) -> Self {
        Self { docs }
    }

    #[inline]
    pub fn set_docs(&mut self, docs: Vec<Document>) {
        self.docs = docs;
    }

    #[inline]
    pub fn docs(&self) -> &[Document] {
        &self.docs
    }

    #[inline]
    pub fn find_relevant(&self, query: &str, max_results: usize) -> Vec<ScoredDocument<'_, u32>> {
        rank(&self.docs, query, max_results)
    }

    #[inline]
    pub fn find_relevant_docs(&self, query: &str, max_results: usize) -> Vec<&Document> {
        self.find_relevant(query, max_results)
            .into_iter()
            .map(|s| s.document)
            .collect()
    }
}
