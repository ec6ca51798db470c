use anyhow::{anyhow, ensure, Result};
use arrow_array::{Array, Float32Array, Int64Array, RecordBatch};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{DistanceType, Table};
use std::path::Path;
use tokio::runtime::Runtime;
use tracing::{debug, info};

use cinematch_core::corpus::Corpus;
use cinematch_core::error::Error;
use cinematch_core::traits::VectorIndex;
use cinematch_core::types::{RowIndex, SearchHit, SourceKind};

use crate::table::{open_db, read_meta, table_exists, META_CORPUS_FINGERPRINT, META_DIM, META_EMBEDDER_ID, META_ROW_COUNT};
use crate::writer::corpus_fingerprint;

/// Read-only handle on a built vector table.
///
/// LanceDB is async; this type owns a small runtime and blocks on it so the
/// retrieval core stays synchronous. Do not create or drop it from inside
/// another tokio runtime.
pub struct LanceVectorIndex {
	runtime: Runtime,
	table: Table,
	len: usize,
	dim: usize,
}

impl std::fmt::Debug for LanceVectorIndex {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("LanceVectorIndex").field("len", &self.len).field("dim", &self.dim).finish_non_exhaustive()
	}
}

impl LanceVectorIndex {
	/// Open `table_name` and check it was built from `corpus` with the
	/// embedder identified by `embedder_id`. Any disagreement is a
	/// configuration error: the rows would no longer line up.
	pub fn open(
		db_path: &Path,
		table_name: &str,
		meta_table: &str,
		corpus: &Corpus,
		embedder_id: &str,
	) -> cinematch_core::error::Result<Self> {
		let runtime = tokio::runtime::Builder::new_multi_thread()
			.worker_threads(2)
			.enable_all()
			.build()
			.map_err(|e| Error::Configuration(format!("vector runtime: {e}")))?;
		let (table, meta) = runtime
			.block_on(open_with_meta(db_path, table_name, meta_table))
			.map_err(|e| Error::configuration("opening vector index", &e))?;

		match meta.embedder_id.as_deref() {
			Some(stored) if stored == embedder_id => {}
			Some(stored) => {
				return Err(Error::Configuration(format!(
					"vector table was built with embedder '{stored}' but '{embedder_id}' is loaded; rebuild the index"
				)))
			}
			None => return Err(Error::Configuration("vector table has no embedder id; rebuild the index".to_string())),
		}
		corpus.check_alignment("vector index", meta.rows)?;
		if meta.row_count.is_some_and(|n| n != meta.rows) {
			return Err(Error::Configuration(format!(
				"vector table holds {} rows but its meta records {:?}",
				meta.rows, meta.row_count
			)));
		}
		if meta.fingerprint.as_deref() != Some(corpus_fingerprint(corpus).as_str()) {
			return Err(Error::Configuration(
				"vector table was built from a different corpus (ids or order changed); rebuild the index".to_string(),
			));
		}
		info!(rows = meta.rows, dim = meta.dim, table = table_name, "vector index opened");
		Ok(Self { runtime, table, len: meta.rows, dim: meta.dim })
	}

	pub fn dim(&self) -> usize { self.dim }

	async fn nearest(&self, query_vec: &[f32], k: usize) -> Result<Vec<SearchHit>> {
		let mut stream = self
			.table
			.vector_search(query_vec.to_vec())?
			.distance_type(DistanceType::L2)
			.limit(k)
			.execute()
			.await?;
		let mut hits = Vec::with_capacity(k);
		while let Some(batch) = stream.try_next().await? {
			read_hits(&batch, &mut hits)?;
		}
		Ok(hits)
	}
}

impl VectorIndex for LanceVectorIndex {
	fn len(&self) -> usize { self.len }

	/// Closest rows first. Scores are negated L2 distances so that higher is
	/// better; equal distances fall back to row order.
	fn search_vec(&self, query_vec: &[f32], k: usize) -> Result<Vec<SearchHit>> {
		if k == 0 || self.len == 0 { return Ok(Vec::new()); }
		ensure!(query_vec.len() == self.dim, "query vector has {} dimensions, index has {}", query_vec.len(), self.dim);
		let mut hits = self.runtime.block_on(self.nearest(query_vec, k))?;
		hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.row.cmp(&b.row)));
		hits.dedup_by_key(|h| h.row);
		hits.truncate(k);
		debug!(k, hits = hits.len(), "vector search");
		Ok(hits)
	}
}

struct TableMeta {
	rows: usize,
	dim: usize,
	row_count: Option<usize>,
	embedder_id: Option<String>,
	fingerprint: Option<String>,
}

async fn open_with_meta(db_path: &Path, table_name: &str, meta_table: &str) -> Result<(Table, TableMeta)> {
	ensure!(db_path.exists(), "{} does not exist; run the indexer first", db_path.display());
	let db = open_db(db_path).await?;
	if !table_exists(&db, table_name).await? {
		return Err(anyhow!("table {table_name} not found in {}; run the indexer first", db_path.display()));
	}
	let table = db.open_table(table_name).execute().await?;
	let rows = table.count_rows(None).await?;
	let mut meta = read_meta(&db, meta_table).await?;
	let dim = meta
		.get(META_DIM)
		.ok_or_else(|| anyhow!("meta table {meta_table} has no {META_DIM}"))?
		.parse::<usize>()?;
	let row_count = meta.get(META_ROW_COUNT).map(|v| v.parse::<usize>()).transpose()?;
	let embedder_id = meta.remove(META_EMBEDDER_ID);
	let fingerprint = meta.remove(META_CORPUS_FINGERPRINT);
	Ok((table, TableMeta { rows, dim, row_count, embedder_id, fingerprint }))
}

fn read_hits(batch: &RecordBatch, hits: &mut Vec<SearchHit>) -> Result<()> {
	let rows = batch
		.column_by_name("row")
		.and_then(|c| c.as_any().downcast_ref::<Int64Array>())
		.ok_or_else(|| anyhow!("vector result without a row column"))?;
	let distances = batch
		.column_by_name("_distance")
		.and_then(|c| c.as_any().downcast_ref::<Float32Array>())
		.ok_or_else(|| anyhow!("vector result without a _distance column"))?;
	for i in 0..batch.num_rows() {
		if rows.is_null(i) { continue; }
		let row = RowIndex::try_from(rows.value(i))?;
		hits.push(SearchHit { row, score: -distances.value(i), source: SourceKind::Vector });
	}
	Ok(())
}
