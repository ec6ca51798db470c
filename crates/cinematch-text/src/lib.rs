//! cinematch-text
//!
//! Sparse retrieval: an in-memory Tantivy BM25 index over each movie's
//! generated summary, rebuilt from the corpus at startup.

pub mod index;
pub mod tantivy_utils;

pub use index::Bm25Index;
