// Command documentation model
// Parsed from user-authored markdown files in the commands directory


pub mod loader;
pub mod parser;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub use loader::{command_files, has_commands, is_command_file, load_dir};
pub use parser::{extract_common_patterns, parse_all, parse_document, parse_file};

/// A parsed unit of command documentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Source file path; also the cache invalidation key
    pub filename: String,
    /// Canonical tool name, never empty
    pub command: String,
    pub aliases: Vec<String>,
    pub keywords: Vec<String>,
    pub categories: Vec<String>,
    pub priority: Option<Priority>,
    pub version: Option<String>,
    /// Body text after the front-matter block
    pub content: String,
    pub examples: Vec<Example>,
    /// Source modification time, only used for cache validity
    pub updated_at: DateTime<Utc>,
}

/// A natural-language request paired with the command that fulfils it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    pub user_request: String,
    pub command: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Parse a front-matter priority value; unknown values are treated as unset
    #[inline]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    /// Multiplier applied to a keyword score
    #[inline]
    pub fn weight(self) -> f64 {
        match self {
            Self::High => 1.3,
            Self::Medium => 1.1,
            Self::Low => 1.0,
        }
    }
}

impl fmt::Display for Priority {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

impl Document {
    /// Deterministic vector store id for this document
    #[inline]
    pub fn vector_id(&self) -> String {
        format!("cmd_{}", self.command)
    }

    /// Modification time at the second granularity used by the embeddings cache
    #[inline]
    pub fn mtime_unix(&self) -> i64 {
        self.updated_at.timestamp()
    }

    /// Text used as embedding input: command, aliases, keywords, example requests
    #[inline]
    pub fn search_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(
            1 + self.aliases.len() + self.keywords.len() + self.examples.len(),
        );
        parts.push(&self.command);
        parts.extend(self.aliases.iter().map(String::as_str));
        parts.extend(self.keywords.iter().map(String::as_str));
        parts.extend(self.examples.iter().map(|e| e.user_request.as_str()));
        parts.join(" ")
    }
}

/// Simplified projection handed to prompt construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptDoc {
    pub command: String,
    pub content: String,
    pub examples: Vec<Example>,
}

impl From<&Document> for PromptDoc {
    #[inline]
    fn from(doc: &Document) -> Self {
        Self {
            command: doc.command.clone(),
            content: doc.content.clone(),
            examples: doc.examples.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("empty file")]
    EmptyFile,
    #[error("unclosed front-matter block (missing closing '---')")]
    UnclosedFrontMatter,
    #[error("invalid front-matter: {0}")]
    InvalidFrontMatter(#[from] serde_yaml::Error),
    #[error("failed to read file: {0}")]
    Unreadable(#[from] std::io::Error),
    #[error("command '{command}' is already defined in {first}")]
    DuplicateCommand { command: String, first: String },
}

/// Per-file failures collected while parsing a batch
#[derive(Debug, Default)]
pub struct ParseFailures {
    pub failures: Vec<(PathBuf, ParseError)>,
}

impl ParseFailures {
    #[inline]
    pub fn push(&mut self, path: PathBuf, error: ParseError) {
        self.failures.push((path, error));
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.failures.len()
    }
}

impl fmt::Display for ParseFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} file(s):", self.failures.len())?;
        for (path, error) in &self.failures {
            write!(f, "\n  {}: {}", path.display(), error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseFailures {}

/// Documents that parsed, plus whatever failed alongside them
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub documents: Vec<Document>,
    pub failures: ParseFailures,
}

impl LoadOutcome {
    /// Aggregate failure report, if any file failed
    #[inline]
    pub fn warning(&self) -> Option<&ParseFailures> {
        (!self.failures.is_empty()).then_some(&self.failures)
    }
}
