use arrow_schema::{DataType, Field, Schema, TimeUnit};
use std::sync::Arc;

/// One row per movie: `row` is the corpus offset, `id`/`title` let a reader
/// eyeball the table, `vector` is the sentence embedding.
pub fn build_vector_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("row", DataType::Int64, false),
		Field::new("id", DataType::Int64, false),
		Field::new("title", DataType::Utf8, false),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}

pub fn build_meta_schema() -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("key", DataType::Utf8, false),
		Field::new("value", DataType::Utf8, false),
		Field::new("updated_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
	]))
}
