
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::parser::parse_all;
use super::{LoadOutcome, ParseError};

/// Whether a file name is a loadable command doc: `*.md`, not `README.md`,
/// not `_`-prefixed
#[inline]
pub fn is_command_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };

    let is_markdown = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md"));

    is_markdown && !name.eq_ignore_ascii_case("README.md") && !name.starts_with('_')
}

/// List loadable command files in `dir`, sorted by file name
#[inline]
pub fn command_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if is_command_file(&path) {
            files.push(path);
        } else {
            debug!("Skipping non-command file: {}", path.display());
        }
    }

    files.sort();
    Ok(files)
}

/// Check whether the directory holds any loadable command files
#[inline]
pub fn has_commands(dir: &Path) -> std::io::Result<bool> {
    Ok(!command_files(dir)?.is_empty())
}

/// Load every command doc in `dir`.
///
/// A missing directory yields an empty outcome. Per-file failures are
/// collected rather than aborting the load. When two files declare the same
/// command, the first in file-name order is kept and the later one is
/// reported as a [`ParseError::DuplicateCommand`].
#[inline]
pub fn load_dir(dir: &Path) -> std::io::Result<LoadOutcome> {
    let files = command_files(dir)?;
    debug!("Found {} command files in {}", files.len(), dir.display());

    let parsed = parse_all(&files);
    let mut outcome = LoadOutcome {
        documents: Vec::with_capacity(parsed.documents.len()),
        failures: parsed.failures,
    };

    let mut seen: HashMap<String, String> = HashMap::new();
    for doc in parsed.documents {
        if let Some(first) = seen.get(&doc.command) {
            warn!(
                "Duplicate command '{}' in {} (already defined in {})",
                doc.command, doc.filename, first
            );
            outcome.failures.push(
                PathBuf::from(&doc.filename),
                ParseError::DuplicateCommand {
                    command: doc.command.clone(),
                    first: first.clone(),
                },
            );
            continue;
        }
        seen.insert(doc.command.clone(), doc.filename.clone());
        outcome.documents.push(doc);
    }

    info!(
        "Loaded {} command docs from {} ({} failed)",
        outcome.documents.len(),
        dir.display(),
        outcome.failures.len()
    );

    Ok(outcome)
}
