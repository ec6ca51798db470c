//! The immutable movie table every index is aligned to.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::{Error, Result};
use crate::types::{MovieRecord, RowIndex};

/// Movie records in load order. Row `n` here is row `n` in every index.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    records: Vec<MovieRecord>,
}

impl Corpus {
    pub fn new(records: Vec<MovieRecord>) -> Self { Self { records } }

    /// Read a `.json` array or a `.jsonl` file. Any failure here is fatal for
    /// startup and reported as a configuration error.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| Error::Configuration(format!("cannot read corpus {}: {e}", path.display())))?;
        let records = if path.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            raw.lines()
                .enumerate()
                .filter(|(_, line)| !line.trim().is_empty())
                .map(|(n, line)| {
                    serde_json::from_str::<MovieRecord>(line).map_err(|e| {
                        Error::Configuration(format!("{}:{}: {e}", path.display(), n + 1))
                    })
                })
                .collect::<Result<Vec<_>>>()?
        } else {
            serde_json::from_str::<Vec<MovieRecord>>(&raw)
                .map_err(|e| Error::Configuration(format!("{}: {e}", path.display())))?
        };
        let corpus = Self::new(records);
        let missing = corpus.records.iter().filter(|r| !r.has_summary()).count();
        info!(rows = corpus.len(), missing_summaries = missing, path = %path.display(), "corpus loaded");
        Ok(corpus)
    }

    /// Write the corpus back in the format implied by the extension.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let body = if path.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            let mut out = String::new();
            for r in &self.records {
                out.push_str(&serde_json::to_string(r)?);
                out.push('\n');
            }
            out
        } else {
            serde_json::to_string_pretty(&self.records)?
        };
        if let Some(parent) = path.parent() { fs::create_dir_all(parent)?; }
        fs::write(path, body)?;
        Ok(())
    }

    pub fn len(&self) -> usize { self.records.len() }

    pub fn is_empty(&self) -> bool { self.records.is_empty() }

    pub fn get(&self, row: RowIndex) -> Option<&MovieRecord> { self.records.get(row) }

    pub fn records(&self) -> &[MovieRecord] { &self.records }

    pub fn records_mut(&mut self) -> &mut [MovieRecord] { &mut self.records }

    /// Every distinct genre in the corpus, sorted.
    pub fn genre_vocabulary(&self) -> Vec<String> {
        self.records
            .iter()
            .flat_map(|r| r.genres.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Refuse to serve from an index whose size differs from the corpus.
    pub fn check_alignment(&self, index: &str, index_len: usize) -> Result<()> {
        if index_len != self.len() {
            return Err(Error::Configuration(format!(
                "{index} holds {index_len} rows but the corpus has {}; rebuild the indexes",
                self.len()
            )));
        }
        Ok(())
    }
}
