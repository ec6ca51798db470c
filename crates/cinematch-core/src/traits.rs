use crate::types::SearchHit;

/// Sentence encoder shared by the offline build and the dense retriever.
/// Both sides must use the same implementation and weights.
pub trait Embedder: Send + Sync {
    /// Stable identifier stored next to the vectors it produced.
    fn embedder_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Read-only lexical index, one document per corpus row.
pub trait TextIndex: Send + Sync {
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool { self.len() == 0 }
    /// At most `k` hits, best first.
    fn search(&self, query: &str, k: usize) -> anyhow::Result<Vec<SearchHit>>;
}

/// Read-only nearest-neighbour index, one vector per corpus row.
pub trait VectorIndex: Send + Sync {
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool { self.len() == 0 }
    /// At most `k` hits, closest first.
    fn search_vec(&self, query_vec: &[f32], k: usize) -> anyhow::Result<Vec<SearchHit>>;
}

/// Pairwise relevance model: one scalar per (query, document) pair, higher is
/// more relevant.
pub trait CrossEncoder: Send + Sync {
    fn score_pairs(&self, query: &str, documents: &[String]) -> anyhow::Result<Vec<f32>>;
}
