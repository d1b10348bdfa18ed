// Retrieval over loaded command docs
// Keyword scoring, embedding search, and the hybrid policy combining them

pub mod hybrid;
pub mod keyword;
pub mod semantic;

use crate::documents::Document;

pub use hybrid::{HybridMatcher, Strategy};
pub use keyword::{KeywordMatcher, tokenize};
pub use semantic::SemanticMatcher;

/// A document paired with its per-query score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument<'a, S> {
    pub document: &'a Document,
    pub score: S,
}
