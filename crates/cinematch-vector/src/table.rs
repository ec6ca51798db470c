//! LanceDB connection and the build metadata kept next to the vectors.
//!
//! The meta table is a small key/value table recording which embedder, corpus
//! and row count the vectors were built from. It is written once per build and
//! read whole at load.
use anyhow::{anyhow, Result};
use arrow_array::{RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray};
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::query::ExecutableQuery;
use lancedb::{connect, Connection};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::schema::build_meta_schema;

pub const META_EMBEDDER_ID: &str = "embedder_id";
pub const META_ROW_COUNT: &str = "row_count";
pub const META_DIM: &str = "dim";
pub const META_CORPUS_FINGERPRINT: &str = "corpus_fingerprint";

pub type BuildMeta = BTreeMap<String, String>;

pub async fn open_db(path: &Path) -> Result<Connection> {
	Ok(connect(path.to_string_lossy().as_ref()).execute().await?)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
	let names = conn.table_names().execute().await?;
	Ok(names.iter().any(|n| n == name))
}

/// Upsert every entry in one merge on `key`.
pub async fn write_meta(conn: &Connection, table: &str, entries: &[(&str, String)]) -> Result<()> {
	let schema = build_meta_schema();
	let now = Utc::now().timestamp_millis();
	let batch = RecordBatch::try_new(
		schema.clone(),
		vec![
			Arc::new(StringArray::from_iter_values(entries.iter().map(|(k, _)| *k))),
			Arc::new(StringArray::from_iter_values(entries.iter().map(|(_, v)| v.as_str()))),
			Arc::new(TimestampMillisecondArray::from(vec![now; entries.len()])),
		],
	)?;
	let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
	if !table_exists(conn, table).await? {
		conn.create_table(table, reader).execute().await?;
		return Ok(());
	}
	let t = conn.open_table(table).execute().await?;
	let mut merge = t.merge_insert(&["key"]);
	merge.when_matched_update_all(None).when_not_matched_insert_all();
	merge.execute(reader).await?;
	Ok(())
}

/// All entries of the meta table; empty when the table does not exist.
pub async fn read_meta(conn: &Connection, table: &str) -> Result<BuildMeta> {
	let mut meta = BuildMeta::new();
	if !table_exists(conn, table).await? { return Ok(meta); }
	let t = conn.open_table(table).execute().await?;
	let mut stream = t.query().execute().await?;
	while let Some(batch) = stream.try_next().await? {
		let (keys, values) = (string_column(&batch, "key")?, string_column(&batch, "value")?);
		for i in 0..batch.num_rows() {
			meta.insert(keys.value(i).to_string(), values.value(i).to_string());
		}
	}
	Ok(meta)
}

fn string_column<'b>(batch: &'b RecordBatch, name: &str) -> Result<&'b StringArray> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<StringArray>())
		.ok_or_else(|| anyhow!("meta table has no {name} column"))
}
