use anyhow::{anyhow, Result};
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::tokenizer::TokenStream;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, info};

use cinematch_core::corpus::Corpus;
use cinematch_core::traits::TextIndex;
use cinematch_core::types::{RowIndex, SearchHit, SourceKind};

use crate::tantivy_utils::{build_schema, register_tokenizer};

/// BM25 over generated summaries, held entirely in RAM.
///
/// Every corpus row is a document, including rows whose summary is empty, so
/// document `n` always answers for row `n`.
pub struct Bm25Index {
	index: Index,
	reader: IndexReader,
	row_field: Field,
	summary_field: Field,
	num_docs: usize,
}

impl Bm25Index {
	pub fn from_corpus(corpus: &Corpus) -> Result<Self> {
		Self::build(corpus.records().iter().map(|r| r.summary_text()))
	}

	/// Index `texts` in order; the i-th text becomes row i.
	pub fn build<'a, I>(texts: I) -> Result<Self>
	where
		I: IntoIterator<Item = &'a str>,
	{
		let schema = build_schema();
		let index = Index::create_in_ram(schema.clone());
		register_tokenizer(&index);
		let row_field = schema.get_field("row")?;
		let summary_field = schema.get_field("summary")?;

		let mut index_writer: IndexWriter = index.writer_with_num_threads(1, 50_000_000)?;
		let mut num_docs = 0usize;
		for (row, text) in texts.into_iter().enumerate() {
			index_writer.add_document(doc!(
				row_field => row as u64,
				summary_field => text,
			))?;
			num_docs += 1;
		}
		index_writer.commit()?;

		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
		info!(docs = num_docs, "lexical index built");
		Ok(Self { index, reader, row_field, summary_field, num_docs })
	}

	fn query_terms(&self, query: &str) -> Result<Vec<Term>> {
		let mut analyzer = self.index.tokenizer_for_field(self.summary_field)?;
		let mut stream = analyzer.token_stream(query);
		let mut terms = Vec::new();
		while stream.advance() {
			terms.push(Term::from_field_text(self.summary_field, &stream.token().text));
		}
		Ok(terms)
	}

	/// BM25 score of every row; rows without any query term score 0.
	fn score_all(&self, query: &str) -> Result<Vec<f32>> {
		let mut scores = vec![0f32; self.num_docs];
		let terms = self.query_terms(query)?;
		if terms.is_empty() || self.num_docs == 0 { return Ok(scores); }

		// Repeated query tokens stay repeated: each occurrence adds its term score.
		let clauses: Vec<(Occur, Box<dyn Query>)> = terms
			.into_iter()
			.map(|t| (Occur::Should, Box::new(TermQuery::new(t, IndexRecordOption::WithFreqs)) as Box<dyn Query>))
			.collect();
		let query = BooleanQuery::new(clauses);
		let searcher = self.reader.searcher();
		let top_docs = searcher.search(&query, &TopDocs::with_limit(self.num_docs))?;
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr)?;
			let row = doc
				.get_first(self.row_field)
				.and_then(|v| v.as_u64())
				.ok_or_else(|| anyhow!("lexical document without a row"))? as RowIndex;
			if let Some(slot) = scores.get_mut(row) { *slot = score; }
		}
		Ok(scores)
	}
}

impl TextIndex for Bm25Index {
	fn len(&self) -> usize { self.num_docs }

	/// The `k` best rows by BM25, descending; equal scores keep row order, and
	/// non-matching rows fill the tail when fewer than `k` match.
	fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
		if k == 0 { return Ok(Vec::new()); }
		let scores = self.score_all(query)?;
		let mut rows: Vec<RowIndex> = (0..scores.len()).collect();
		rows.sort_by(|a, b| scores[*b].total_cmp(&scores[*a]));
		rows.truncate(k);
		debug!(query_len = query.len(), hits = rows.len(), "keyword search");
		Ok(rows.into_iter().map(|row| SearchHit { row, score: scores[row], source: SourceKind::Text }).collect())
	}
}
