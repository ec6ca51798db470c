use tantivy::schema::{IndexRecordOption, Schema, TextFieldIndexing, TextOptions, FAST, INDEXED, STORED};
use tantivy::tokenizer::{LowerCaser, TextAnalyzer, WhitespaceTokenizer};
use tantivy::Index;

pub const SUMMARY_TOKENIZER: &str = "summary_whitespace";

/// `row` ties each document to its corpus offset; `summary` holds the
/// generated summary, indexed with term frequencies for BM25.
pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	let _row_field = schema_builder.add_u64_field("row", INDEXED | STORED | FAST);
	let summary_indexing = TextFieldIndexing::default().set_tokenizer(SUMMARY_TOKENIZER).set_index_option(IndexRecordOption::WithFreqs);
	let summary_options = TextOptions::default().set_indexing_options(summary_indexing);
	let _summary_field = schema_builder.add_text_field("summary", summary_options);
	schema_builder.build()
}

/// Whitespace split plus lower-casing. No stemming, no stop words.
pub fn register_tokenizer(index: &Index) {
	let tokenizer = TextAnalyzer::builder(WhitespaceTokenizer::default())
		.filter(LowerCaser)
		.build();
	index.tokenizers().register(SUMMARY_TOKENIZER, tokenizer);
}
