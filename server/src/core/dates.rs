use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

/// One row of the date list.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct DateIndexEntry {
    pub date: String,
}

/// One row of the path list. Row `i` belongs to `DateIndexEntry` row `i`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct PathIndexEntry {
    pub file_path: String,
}

/// Date list and path list loaded together, joined by position.
#[derive(Clone, Debug, Default)]
pub struct DateIndex {
    pub dates: Vec<DateIndexEntry>,
    pub paths: Vec<PathIndexEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Found(PathBuf),
    DateNotFound,
    /// The date matched but the bound file is gone from disk.
    FileMissing(PathBuf),
}

impl DateIndex {
    pub fn new(dates: Vec<DateIndexEntry>, paths: Vec<PathIndexEntry>) -> Self {
        Self { dates, paths }
    }

    /// Reads both JSON lists from disk. Each file is a JSON array of objects.
    pub fn load(date_index_path: &Path, path_index_path: &Path) -> Result<Self> {
        let dates: Vec<DateIndexEntry> = read_json_list(date_index_path)?;
        let paths: Vec<PathIndexEntry> = read_json_list(path_index_path)?;
        let index = Self { dates, paths };
        if !index.is_consistent() {
            warn!(
                "date index length mismatch dates={} paths={} date_index={} path_index={}",
                index.dates.len(),
                index.paths.len(),
                date_index_path.display(),
                path_index_path.display()
            );
        }
        Ok(index)
    }

    pub fn is_consistent(&self) -> bool {
        self.dates.len() == self.paths.len()
    }

    /// Number of rows usable for lookups: the common prefix of both lists.
    pub fn usable_len(&self) -> usize {
        self.dates.len().min(self.paths.len())
    }

    /// Returns the raw `file_path` bound to `query_date`.
    ///
    /// Exact string match, first match wins. Only the common prefix of the two
    /// lists is searched so a length mismatch can never bind a date to another
    /// row's file.
    pub fn lookup(&self, query_date: &str) -> Option<&str> {
        let pos = self.dates.iter().position(|e| e.date == query_date)?;
        if pos >= self.usable_len() {
            warn!(
                "date {} at row {} has no matching path row (paths={})",
                query_date,
                pos,
                self.paths.len()
            );
            return None;
        }
        Some(self.paths[pos].file_path.as_str())
    }

    /// Resolves `query_date` to a file on disk. Relative paths are joined onto
    /// `base_dir`.
    pub fn resolve(&self, query_date: &str, base_dir: &Path) -> Resolution {
        let Some(raw) = self.lookup(query_date) else {
            return Resolution::DateNotFound;
        };
        let path = base_dir.join(raw);
        if path.is_file() {
            Resolution::Found(path)
        } else {
            Resolution::FileMissing(path)
        }
    }
}

fn read_json_list<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let body = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&body).with_context(|| format!("parsing {}", path.display()))
}
