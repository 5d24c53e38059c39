//! Roster file: one `identifier,name` pair per line.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("failed to read roster {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("roster line {line}: expected `identifier,name`, got {content:?}")]
    Malformed { line: usize, content: String },
}

/// Name → identifier mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Roster {
    entries: HashMap<String, String>,
}

impl Roster {
    pub fn load(path: &Path) -> Result<Self, RosterError> {
        let text = std::fs::read_to_string(path).map_err(|source| RosterError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let roster = Self::parse(&text)?;
        tracing::info!(path = %path.display(), entries = roster.len(), "roster loaded");
        Ok(roster)
    }

    /// Parse roster text. Lines split at the first comma and both halves are
    /// trimmed. Blank lines are skipped, a later duplicate name replaces an
    /// earlier one, and any other line without a comma fails the whole parse.
    pub fn parse(text: &str) -> Result<Self, RosterError> {
        let mut entries = HashMap::new();
        for (i, raw) in text.lines().enumerate() {
            if raw.trim().is_empty() {
                continue;
            }
            let (identifier, name) = raw.split_once(',').ok_or_else(|| {
                RosterError::Malformed {
                    line: i + 1,
                    content: raw.to_string(),
                }
            })?;
            let (identifier, name) = (identifier.trim(), name.trim());
            if let Some(previous) = entries.insert(name.to_string(), identifier.to_string()) {
                tracing::debug!(name, previous, "duplicate roster name, last entry wins");
            }
        }
        Ok(Self { entries })
    }

    pub fn identifier(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
