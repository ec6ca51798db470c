//! cinematch-hybrid
//!
//! Candidate generation: dense and sparse retrieval over the same corpus rows,
//! merged by row when the query carries no preferences and filtered from the
//! dense list when it does.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use cinematch_core::corpus::Corpus;
use cinematch_core::error::{Error, Result};
use cinematch_core::traits::{Embedder, TextIndex, VectorIndex};
use cinematch_core::types::{Candidate, FilterPolicy, FilterSpec, MovieRecord, RowIndex, SearchHit};

pub mod filter;

pub use filter::{FilterPlan, Stage};

/// Each retriever fetches this many times `top_k` rows.
pub const OVERFETCH: usize = 5;

pub struct HybridRetriever<TI, VI> where TI: TextIndex, VI: VectorIndex {
    corpus: Arc<Corpus>,
    text: TI,
    vector: VI,
    embedder: Box<dyn Embedder>,
    policy: FilterPolicy,
}

impl<TI, VI> HybridRetriever<TI, VI> where TI: TextIndex, VI: VectorIndex {
    /// Both indexes must hold exactly one entry per corpus row.
    pub fn new(corpus: Arc<Corpus>, text: TI, vector: VI, embedder: Box<dyn Embedder>, policy: FilterPolicy) -> Result<Self> {
        corpus.check_alignment("lexical index", text.len())?;
        corpus.check_alignment("vector index", vector.len())?;
        Ok(Self { corpus, text, vector, embedder, policy })
    }

    pub fn corpus(&self) -> &Corpus { &self.corpus }

    pub fn policy(&self) -> FilterPolicy { self.policy }

    /// Rows nearest to the embedded query, closest first; at most
    /// `top_k * OVERFETCH`.
    pub fn semantic_search(&self, query: &str, top_k: usize) -> Result<Vec<RowIndex>> {
        let k = top_k.saturating_mul(OVERFETCH);
        if k == 0 { return Ok(Vec::new()); }
        let q_vec = self
            .embedder
            .embed_batch(&[query.to_string()])
            .and_then(|mut v| v.pop().ok_or_else(|| anyhow::anyhow!("embedder returned no vector")))
            .map_err(|e| Error::retrieval("embedding query", &e))?;
        let hits = self.vector.search_vec(&q_vec, k).map_err(|e| Error::retrieval("vector search", &e))?;
        self.rows_of(hits, k)
    }

    /// Rows ranked by BM25 over generated summaries; at most
    /// `top_k * OVERFETCH`.
    pub fn keyword_search(&self, query: &str, top_k: usize) -> Result<Vec<RowIndex>> {
        let k = top_k.saturating_mul(OVERFETCH);
        if k == 0 { return Ok(Vec::new()); }
        let hits = self.text.search(query, k).map_err(|e| Error::retrieval("keyword search", &e))?;
        self.rows_of(hits, k)
    }

    /// Up to `top_k` candidate movies for `query`.
    ///
    /// Without filters the dense and sparse lists are unioned and returned in
    /// row order. With filters only the dense list is considered, in
    /// similarity order, and each candidate must pass every active stage.
    pub fn hybrid_search(&self, query: &str, top_k: usize, filters: Option<&FilterSpec>) -> Result<Vec<MovieRecord>> {
        if top_k == 0 { return Ok(Vec::new()); }
        let dense = self.semantic_search(query, top_k)?;
        let sparse = self.keyword_search(query, top_k)?;
        debug!(dense = dense.len(), sparse = sparse.len(), filtered = filters.is_some(), "retrieved candidates");

        let records: Vec<MovieRecord> = match filters {
            None => {
                let merged: BTreeSet<RowIndex> = dense.into_iter().chain(sparse).collect();
                merged.into_iter().take(top_k).filter_map(|row| self.corpus.get(row).cloned()).collect()
            }
            Some(spec) => {
                // Keyword candidates are not filtered; only the dense list survives.
                let plan = FilterPlan::new(spec, &self.policy);
                dense
                    .into_iter()
                    .filter_map(|row| self.corpus.get(row).map(|record| Candidate { row, record }))
                    .filter(|candidate| plan.admits(candidate))
                    .take(top_k)
                    .map(|candidate| candidate.record.clone())
                    .collect()
            }
        };
        debug!(returned = records.len(), top_k, "hybrid search done");
        Ok(records)
    }

    /// Keep hit order, drop repeats, and refuse rows the corpus does not have.
    fn rows_of(&self, hits: Vec<SearchHit>, k: usize) -> Result<Vec<RowIndex>> {
        let mut seen = BTreeSet::new();
        let mut rows = Vec::with_capacity(hits.len().min(k));
        for hit in hits {
            if hit.row >= self.corpus.len() {
                return Err(Error::RetrievalUnavailable(format!(
                    "index returned row {} but the corpus has {} rows",
                    hit.row,
                    self.corpus.len()
                )));
            }
            if seen.insert(hit.row) { rows.push(hit.row); }
            if rows.len() == k { break; }
        }
        Ok(rows)
    }
}
