use anyhow::{anyhow, ensure, Result};
use arrow_array::types::Float32Type;
use arrow_array::{FixedSizeListArray, Int64Array, RecordBatch, RecordBatchIterator, StringArray};
use arrow_schema::DataType;
use lancedb::Connection;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use cinematch_core::corpus::Corpus;

use crate::schema::build_vector_schema;
use crate::table::{open_db, table_exists, write_meta, META_CORPUS_FINGERPRINT, META_DIM, META_EMBEDDER_ID, META_ROW_COUNT};

const INSERT_BATCH: usize = 1000;

/// Identity of a corpus as the vector table sees it: ids and titles in row
/// order. Reordering, inserting or dropping rows changes it.
pub fn corpus_fingerprint(corpus: &Corpus) -> String {
	let mut hasher = blake3::Hasher::new();
	for record in corpus.records() {
		hasher.update(&record.id.to_le_bytes());
		hasher.update(record.title.as_bytes());
		hasher.update(&[0]);
	}
	hasher.finalize().to_hex().to_string()
}

/// Replaces the vector table with one vector per corpus row and records the
/// build in the meta table.
pub struct VectorTableWriter { db: Connection, table_name: String, meta_table: String }

impl VectorTableWriter {
	pub async fn open(db_path: &Path, table_name: &str, meta_table: &str) -> Result<Self> {
		std::fs::create_dir_all(db_path)?;
		let db = open_db(db_path).await?;
		Ok(Self { db, table_name: table_name.to_string(), meta_table: meta_table.to_string() })
	}

	/// `embeddings[i]` must be the embedding of corpus row `i`.
	pub async fn write(&self, corpus: &Corpus, embeddings: &[Vec<f32>], embedder_id: &str) -> Result<()> {
		ensure!(corpus.len() == embeddings.len(), "{} rows but {} embeddings", corpus.len(), embeddings.len());
		let dim = embeddings.first().map_or(0, Vec::len);
		ensure!(dim > 0 || embeddings.is_empty(), "embeddings have zero dimensions");
		if let Some(bad) = embeddings.iter().position(|v| v.len() != dim) {
			return Err(anyhow!("embedding for row {bad} has {} dimensions, expected {dim}", embeddings[bad].len()));
		}
		let dim = i32::try_from(dim)?;

		self.clear_table(dim).await?;
		let records = corpus.records();
		let mut start = 0usize;
		while start < records.len() {
			let end = (start + INSERT_BATCH).min(records.len());
			let batch = to_record_batch(corpus, start..end, &embeddings[start..end], dim)?;
			self.insert_batch(batch).await?;
			start = end;
		}

		let meta = [
			(META_EMBEDDER_ID, embedder_id.to_string()),
			(META_ROW_COUNT, corpus.len().to_string()),
			(META_DIM, dim.to_string()),
			(META_CORPUS_FINGERPRINT, corpus_fingerprint(corpus)),
		];
		write_meta(&self.db, &self.meta_table, &meta).await?;
		info!(rows = corpus.len(), dim, table = %self.table_name, "vector table written");
		Ok(())
	}

	async fn clear_table(&self, dim: i32) -> Result<()> {
		if !table_exists(&self.db, &self.table_name).await? { return Ok(()); }
		let table = self.db.open_table(&self.table_name).execute().await?;
		let schema = table.schema().await?;
		let stored_dim = match schema.field_with_name("vector").map(|f| f.data_type()) {
			Ok(DataType::FixedSizeList(_, d)) => Some(*d),
			_ => None,
		};
		if dim > 0 && stored_dim != Some(dim) {
			return Err(anyhow!(
				"table {} holds vectors of dimension {stored_dim:?}, not {dim}; remove it before rebuilding",
				self.table_name
			));
		}
		table.delete("row IS NOT NULL").await?;
		Ok(())
	}

	async fn insert_batch(&self, batch: RecordBatch) -> Result<()> {
		let schema = batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
		if table_exists(&self.db, &self.table_name).await? {
			self.db.open_table(&self.table_name).execute().await?.add(reader).execute().await?;
		} else {
			self.db.create_table(&self.table_name, reader).execute().await?;
		}
		Ok(())
	}
}

fn to_record_batch(corpus: &Corpus, rows: std::ops::Range<usize>, embeddings: &[Vec<f32>], dim: i32) -> Result<RecordBatch> {
	let records = &corpus.records()[rows.clone()];
	let row_ids = rows.map(i64::try_from).collect::<Result<Vec<_>, _>>()?;
	let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
	let titles: Vec<&str> = records.iter().map(|r| r.title.as_str()).collect();
	let vectors = embeddings.iter().map(|v| Some(v.iter().copied().map(Some).collect::<Vec<_>>()));
	Ok(RecordBatch::try_new(
		build_vector_schema(dim),
		vec![
			Arc::new(Int64Array::from(row_ids)),
			Arc::new(Int64Array::from(ids)),
			Arc::new(StringArray::from(titles)),
			Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, dim)),
		],
	)?)
}

/// Blocking entry point for callers outside an async runtime.
pub fn write_vector_table(
	db_path: &Path,
	table_name: &str,
	meta_table: &str,
	corpus: &Corpus,
	embeddings: &[Vec<f32>],
	embedder_id: &str,
) -> Result<()> {
	let rt = tokio::runtime::Runtime::new()?;
	rt.block_on(async {
		let writer = VectorTableWriter::open(db_path, table_name, meta_table).await?;
		writer.write(corpus, embeddings, embedder_id).await
	})
}
