//! Wordlists of object names
//!
//! Plain text, one entry per line. Lines are trimmed; blank lines and lines
//! starting with `#` are dropped. Duplicates keep their first position.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;

const STANDARD_OBJECTS: &str = include_str!("standard_objects.txt");

/// A named, ordered list of work items
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wordlist {
    pub name: String,
    pub words: Vec<String>,
}

impl Wordlist {
    pub fn new(name: impl Into<String>, words: Vec<String>) -> Self {
        Self {
            name: name.into(),
            words,
        }
    }

    /// Parse wordlist text
    pub fn parse(name: impl Into<String>, text: &str) -> Self {
        let mut seen = HashSet::new();
        let words = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter(|line| seen.insert(*line))
            .map(String::from)
            .collect();
        Self::new(name, words)
    }

    /// Load a wordlist file
    pub async fn from_file(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to open wordlist: {}", path.display()))?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let list = Self::parse(name, &text);
        tracing::debug!(wordlist = %list.name, words = list.len(), "Loaded wordlist");
        Ok(list)
    }

    /// Built-in list of standard object names
    pub fn standard_objects() -> Self {
        Self::parse("preset wordlist", STANDARD_OBJECTS)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn into_items(self) -> Vec<String> {
        self.words
    }
}
