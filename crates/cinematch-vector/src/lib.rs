//! cinematch-vector
//!
//! Dense retrieval storage: a LanceDB table with one sentence embedding per
//! corpus row, written by the offline indexer and searched by L2 distance at
//! query time.

pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

pub use search::LanceVectorIndex;
pub use writer::{corpus_fingerprint, write_vector_table, VectorTableWriter};
