//! Prompt history: in-memory contract plus the file-backed variant.
//!
//! The persisted format is line-oriented and append-only: each accepted
//! entry is written as a `# <ISO-8601 timestamp>` header followed by every
//! text line prefixed with `+`. Any line not starting with `+` closes the
//! current record, so a truncated tail only loses the last entry.

use anyhow::{Context, Result};
use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Ordered append-only sequence of prior accepted inputs.
pub trait History {
    fn append(&mut self, entry: &str) -> Result<()>;
    fn len(&self) -> usize;
    fn get(&self, index: usize) -> Option<&str>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Volatile history, lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    strings: Vec<String>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with existing entries, oldest first.
    pub fn with_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            strings: entries.into_iter().map(Into::into).collect(),
        }
    }
}

impl History for MemoryHistory {
    fn append(&mut self, entry: &str) -> Result<()> {
        self.strings.push(entry.to_string());
        Ok(())
    }

    fn len(&self) -> usize {
        self.strings.len()
    }

    fn get(&self, index: usize) -> Option<&str> {
        self.strings.get(index).map(String::as_str)
    }
}

/// History persisted to a file, loaded once at construction.
#[derive(Debug)]
pub struct FileHistory {
    strings: Vec<String>,
    path: PathBuf,
}

impl FileHistory {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let strings = if path.exists() {
            load_records(&path)?
        } else {
            Vec::new()
        };
        debug!(target: "state.history", entries = strings.len(), path = %path.display(), "history_loaded");
        Ok(Self { strings, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn load_records(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading history file {}", path.display()))?;
    let mut strings = Vec::new();
    let mut lines: Vec<&str> = Vec::new();
    for line in content.lines() {
        if let Some(rest) = line.strip_prefix('+') {
            lines.push(rest);
        } else if !lines.is_empty() {
            strings.push(lines.join("\n"));
            lines.clear();
        }
    }
    if !lines.is_empty() {
        strings.push(lines.join("\n"));
    }
    Ok(strings)
}

impl History for FileHistory {
    fn append(&mut self, entry: &str) -> Result<()> {
        self.strings.push(entry.to_string());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening history file {}", self.path.display()))?;
        let mut record = format!("\n# {}\n", Local::now().to_rfc3339());
        for line in entry.split('\n') {
            record.push('+');
            record.push_str(line);
            record.push('\n');
        }
        file.write_all(record.as_bytes())?;
        Ok(())
    }

    fn len(&self) -> usize {
        self.strings.len()
    }

    fn get(&self, index: usize) -> Option<&str> {
        self.strings.get(index).map(String::as_str)
    }
}
