use std::collections::HashSet;
use std::sync::Arc;

use anyhow::anyhow;
use cinematch_core::corpus::Corpus;
use cinematch_core::error::Error;
use cinematch_core::traits::{TextIndex, VectorIndex};
use cinematch_core::types::{FilterPolicy, FilterSpec, MovieRecord, SearchHit, SourceKind};
use cinematch_embed::FakeEmbedder;
use cinematch_hybrid::HybridRetriever;
use cinematch_text::Bm25Index;

/// Returns a fixed ranking regardless of the query vector.
struct FixedVectors { ranking: Vec<usize>, len: usize }

impl VectorIndex for FixedVectors {
    fn len(&self) -> usize { self.len }
    fn search_vec(&self, _q: &[f32], k: usize) -> anyhow::Result<Vec<SearchHit>> {
        Ok(self
            .ranking
            .iter()
            .take(k)
            .enumerate()
            .map(|(i, &row)| SearchHit { row, score: -(i as f32), source: SourceKind::Vector })
            .collect())
    }
}

/// Ignores `k` and repeats whatever ranking it was given.
struct SloppyVectors { ranking: Vec<usize>, len: usize }

impl VectorIndex for SloppyVectors {
    fn len(&self) -> usize { self.len }
    fn search_vec(&self, _q: &[f32], _k: usize) -> anyhow::Result<Vec<SearchHit>> {
        Ok(self.ranking.iter().map(|&row| SearchHit { row, score: 0.0, source: SourceKind::Vector }).collect())
    }
}

struct BrokenVectors { len: usize }

impl VectorIndex for BrokenVectors {
    fn len(&self) -> usize { self.len }
    fn search_vec(&self, _q: &[f32], _k: usize) -> anyhow::Result<Vec<SearchHit>> {
        Err(anyhow!("table unreadable"))
    }
}

struct FixedText { ranking: Vec<usize>, len: usize }

impl TextIndex for FixedText {
    fn len(&self) -> usize { self.len }
    fn search(&self, _q: &str, k: usize) -> anyhow::Result<Vec<SearchHit>> {
        Ok(self.ranking.iter().take(k).map(|&row| SearchHit { row, score: 1.0, source: SourceKind::Text }).collect())
    }
}

fn movie(id: i64, title: &str, genres: &str, year: i32, rating: f32, summary: &str) -> MovieRecord {
    serde_json::from_value(serde_json::json!({
        "id": id, "title": title, "year": year, "imdb_rating": rating,
        "genres": genres, "directors": "Some Director", "stars": "Some Star",
        "plot": summary, "generated_summary": summary,
    }))
    .expect("record")
}

fn corpus() -> Arc<Corpus> {
    Arc::new(Corpus::new(vec![
        movie(100, "Laugh Track", "Comedy", 1995, 6.1, "a sitcom writer loses his voice"),
        movie(101, "Night Shift", "Horror, Thriller", 2003, 5.5, "a night guard hears things"),
        movie(102, "Romcom Redux", "Comedy, Romance", 2012, 7.2, "two exes plan the same wedding"),
        movie(103, "Deep Field", "Sci-Fi, Drama", 2014, 8.3, "astronauts search for a new home"),
        movie(104, "Scary Laughs", "Comedy, Horror", 2019, 6.8, "a haunted comedy club"),
        movie(105, "Quiet Days", "Drama", 1988, 7.9, "a family farm in a dry summer"),
    ]))
}

fn retriever(dense: Vec<usize>, sparse: Vec<usize>, policy: FilterPolicy) -> HybridRetriever<FixedText, FixedVectors> {
    let corpus = corpus();
    let len = corpus.len();
    HybridRetriever::new(
        corpus,
        FixedText { ranking: sparse, len },
        FixedVectors { ranking: dense, len },
        Box::new(FakeEmbedder::new(16)),
        policy,
    )
    .expect("aligned")
}

fn titles(records: &[MovieRecord]) -> Vec<&str> {
    records.iter().map(|r| r.title.as_str()).collect()
}

#[test]
fn unfiltered_merge_is_union_in_row_order() {
    let r = retriever(vec![4, 1], vec![3, 1, 0], FilterPolicy::default());
    let out = r.hybrid_search("anything", 10, None).unwrap();
    let ids: Vec<i64> = out.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![100, 101, 103, 104]);
}

#[test]
fn unfiltered_merge_truncates_to_top_k() {
    let r = retriever(vec![5, 4, 3, 2, 1, 0], vec![0, 1, 2, 3, 4, 5], FilterPolicy::default());
    for top_k in 1..8 {
        let out = r.hybrid_search("q", top_k, None).unwrap();
        assert!(out.len() <= top_k);
    }
    assert_eq!(titles(&r.hybrid_search("q", 2, None).unwrap()), vec!["Laugh Track", "Night Shift"]);
}

#[test]
fn top_k_zero_is_empty_not_an_error() {
    let r = retriever(vec![0, 1], vec![2], FilterPolicy::default());
    assert!(r.hybrid_search("q", 0, None).unwrap().is_empty());
    assert!(r.semantic_search("q", 0).unwrap().is_empty());
}

#[test]
fn filters_use_dense_order_and_drop_keyword_hits() {
    let r = retriever(vec![4, 1, 2, 0], vec![3, 5], FilterPolicy::default());
    let spec = FilterSpec { liked_genres: vec!["Com".into()], ..FilterSpec::default() };
    let out = r.hybrid_search("q", 10, Some(&spec)).unwrap();
    assert_eq!(titles(&out), vec!["Scary Laughs", "Romcom Redux", "Laugh Track"]);

    let spec = FilterSpec {
        liked_genres: vec!["Com".into()],
        disliked_genres: vec!["Horror".into()],
        ..FilterSpec::default()
    };
    let out = r.hybrid_search("q", 10, Some(&spec)).unwrap();
    assert_eq!(titles(&out), vec!["Romcom Redux", "Laugh Track"]);

    let out = r.hybrid_search("q", 1, Some(&spec)).unwrap();
    assert_eq!(titles(&out), vec!["Romcom Redux"]);
}

#[test]
fn filtering_narrows_the_dense_list() {
    let r = retriever(vec![0, 1, 2, 3, 4, 5], vec![], FilterPolicy::default());
    let dense: HashSet<i64> = r
        .semantic_search("q", 2)
        .unwrap()
        .into_iter()
        .map(|row| r.corpus().get(row).unwrap().id)
        .collect();
    let spec = FilterSpec { disliked_genres: vec!["Drama".into()], ..FilterSpec::default() };
    let filtered = r.hybrid_search("q", 2, Some(&spec)).unwrap();
    assert!(filtered.iter().all(|m| dense.contains(&m.id)));
}

#[test]
fn optional_stages_only_run_when_enabled() {
    let spec: FilterSpec = FilterSpec::from_json(r#"{"liked_years": [2010, false], "liked_rating": 7.5}"#).unwrap();

    let off = retriever(vec![0, 1, 2, 3, 4, 5], vec![], FilterPolicy::default());
    assert_eq!(off.hybrid_search("q", 10, Some(&spec)).unwrap().len(), 6);

    let on = retriever(vec![0, 1, 2, 3, 4, 5], vec![], FilterPolicy { years: true, rating: true, ..FilterPolicy::default() });
    assert_eq!(titles(&on.hybrid_search("q", 10, Some(&spec)).unwrap()), vec!["Deep Field"]);
}

#[test]
fn malformed_filter_field_skips_only_that_stage() {
    let spec = FilterSpec::from_json(r#"{"liked_genres": ["Drama"], "liked_years": "nineties"}"#).unwrap();
    let r = retriever(vec![5, 3, 0], vec![], FilterPolicy { years: true, ..FilterPolicy::default() });
    let out = r.hybrid_search("q", 10, Some(&spec)).unwrap();
    assert_eq!(titles(&out), vec!["Quiet Days", "Deep Field"]);
}

#[test]
fn backend_failure_is_retrieval_unavailable() {
    let corpus = corpus();
    let len = corpus.len();
    let r = HybridRetriever::new(
        corpus,
        FixedText { ranking: vec![0], len },
        BrokenVectors { len },
        Box::new(FakeEmbedder::new(16)),
        FilterPolicy::default(),
    )
    .unwrap();
    assert!(matches!(r.hybrid_search("q", 3, None), Err(Error::RetrievalUnavailable(_))));
}

#[test]
fn misaligned_index_is_rejected_at_construction() {
    let corpus = corpus();
    let len = corpus.len();
    let result = HybridRetriever::new(
        corpus,
        FixedText { ranking: vec![], len },
        FixedVectors { ranking: vec![], len: len + 1 },
        Box::new(FakeEmbedder::new(16)),
        FilterPolicy::default(),
    );
    assert!(matches!(result, Err(Error::Configuration(_))));
}

#[test]
fn real_lexical_index_with_empty_query() {
    let corpus = corpus();
    let text = Bm25Index::from_corpus(&corpus).unwrap();
    let len = corpus.len();
    let r = HybridRetriever::new(
        corpus,
        text,
        FixedVectors { ranking: vec![2], len },
        Box::new(FakeEmbedder::new(16)),
        FilterPolicy::default(),
    )
    .unwrap();

    let rows = r.keyword_search("astronauts home", 1).unwrap();
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[0], 3);
    let unique: HashSet<_> = rows.iter().collect();
    assert_eq!(unique.len(), rows.len());

    let out = r.hybrid_search("", 3, None).expect("empty query must not fail");
    assert!(out.len() <= 3);
}

#[test]
fn semantic_search_caps_at_overfetch_and_drops_repeats() {
    let records: Vec<MovieRecord> =
        (0..12).map(|i| movie(200 + i, &format!("Movie {i}"), "Drama", 2000, 7.0, "a plot")).collect();
    let corpus = Arc::new(Corpus::new(records));
    let len = corpus.len();
    let ranking = vec![3, 3, 0, 1, 2, 4, 5, 6, 7, 8, 9, 10, 11];
    let r = HybridRetriever::new(
        corpus,
        FixedText { ranking: vec![], len },
        SloppyVectors { ranking, len },
        Box::new(FakeEmbedder::new(16)),
        FilterPolicy::default(),
    )
    .unwrap();

    let rows = r.semantic_search("q", 2).unwrap();
    assert_eq!(rows, vec![3, 0, 1, 2, 4, 5, 6, 7, 8, 9]);
    let unique: HashSet<_> = rows.iter().collect();
    assert_eq!(unique.len(), rows.len());
}
