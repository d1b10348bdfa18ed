
use chrono::{DateTime, Utc};
use fancy_regex::Regex;
use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, warn};

use super::{Document, Example, LoadOutcome, ParseError, Priority};

const FRONT_MATTER_MARKER: &str = "---";

// Tolerates markdown emphasis around the label, e.g. `**User**: "..."`
static USER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:user|request)\**\s*:\s*\**\s*["'](.+?)["']"#).expect("valid regex")
});

static COMMAND_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)command\**\s*:\s*\**\s*(.+)").expect("valid regex"));

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FrontMatter {
    command: Option<String>,
    aliases: Vec<String>,
    keywords: Vec<String>,
    categories: Vec<String>,
    priority: Option<String>,
    version: Option<String>,
}

/// Parse a documentation file from disk
#[inline]
pub fn parse_file(path: &Path) -> Result<Document, ParseError> {
    let raw = fs::read_to_string(path)?;
    let modified = fs::metadata(path)?.modified()?;
    parse_document(&raw, &path.to_string_lossy(), DateTime::<Utc>::from(modified))
}

/// Parse raw file content into a document.
///
/// A file whose first line is not `---` is treated as body-only and takes its
/// command name from the file stem. An opened but unclosed front-matter block
/// is an error.
#[inline]
pub fn parse_document(
    raw: &str,
    filename: &str,
    updated_at: DateTime<Utc>,
) -> Result<Document, ParseError> {
    let lines: Vec<&str> = raw.lines().collect();
    if lines.is_empty() {
        return Err(ParseError::EmptyFile);
    }

    let (front_matter, content) = split_front_matter(&lines)?;
    let examples = parse_examples(&content);

    let command = front_matter
        .command
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| command_from_filename(filename));

    let priority = front_matter.priority.as_deref().and_then(|p| {
        let parsed = Priority::parse(p);
        if parsed.is_none() {
            warn!("Ignoring unknown priority '{}' in {}", p, filename);
        }
        parsed
    });

    debug!(
        "Parsed {} ({} examples, {} keywords)",
        command,
        examples.len(),
        front_matter.keywords.len()
    );

    Ok(Document {
        filename: filename.to_string(),
        command,
        aliases: front_matter.aliases,
        keywords: front_matter.keywords,
        categories: front_matter.categories,
        priority,
        version: front_matter.version,
        content,
        examples,
        updated_at,
    })
}

/// Parse every path, keeping the documents that succeed
#[inline]
pub fn parse_all(paths: &[PathBuf]) -> LoadOutcome {
    let mut outcome = LoadOutcome::default();

    for path in paths {
        match parse_file(path) {
            Ok(doc) => outcome.documents.push(doc),
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                outcome.failures.push(path.clone(), e);
            }
        }
    }

    outcome
}

fn split_front_matter(lines: &[&str]) -> Result<(FrontMatter, String), ParseError> {
    if lines.first().map(|l| l.trim()) != Some(FRONT_MATTER_MARKER) {
        return Ok((FrontMatter::default(), lines.join("\n")));
    }

    let end = lines
        .iter()
        .skip(1)
        .position(|l| l.trim() == FRONT_MATTER_MARKER)
        .map(|i| i + 1)
        .ok_or(ParseError::UnclosedFrontMatter)?;

    let yaml = lines[1..end].join("\n");
    let front_matter = if yaml.trim().is_empty() {
        FrontMatter::default()
    } else {
        serde_yaml::from_str(&yaml)?
    };

    Ok((front_matter, lines[end + 1..].join("\n")))
}

/// Extract `User: "..."` / `Command: ...` pairs from the body.
///
/// A command line only counts when a user line is pending; a second user line
/// replaces the pending one.
fn parse_examples(content: &str) -> Vec<Example> {
    let mut examples = Vec::new();
    let mut pending_request: Option<String> = None;

    for line in content.lines().map(str::trim) {
        if let Ok(Some(captures)) = USER_PATTERN.captures(line) {
            if let Some(request) = captures.get(1) {
                pending_request = Some(request.as_str().to_string());
                continue;
            }
        }

        if pending_request.is_none() {
            continue;
        }

        if let Ok(Some(captures)) = COMMAND_PATTERN.captures(line) {
            if let Some(command) = captures.get(1) {
                let command = command.as_str().trim().trim_matches('`').trim();
                if let Some(user_request) = pending_request.take() {
                    examples.push(Example {
                        user_request,
                        command: command.to_string(),
                    });
                }
            }
        }
    }

    examples
}

fn command_from_filename(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string())
}

/// Collect up to `max_lines` usage lines from fenced code blocks.
///
/// Blank lines and `#` comment/heading lines are skipped.
#[inline]
pub fn extract_common_patterns(content: &str, max_lines: usize) -> String {
    let mut patterns: Vec<String> = Vec::new();
    let mut in_fenced_block = false;

    for event in Parser::new(content) {
        if patterns.len() >= max_lines {
            break;
        }
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(_))) => in_fenced_block = true,
            Event::End(TagEnd::CodeBlock) => in_fenced_block = false,
            Event::Text(text) if in_fenced_block => {
                for line in text.lines().map(str::trim) {
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    patterns.push(line.to_string());
                    if patterns.len() >= max_lines {
                        break;
                    }
                }
            }
            _ => {}
        }
    }

    patterns.join("\n")
}
