use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::anyhow;
use cinematch_core::error::Error;
use cinematch_core::traits::CrossEncoder;
use cinematch_core::types::MovieRecord;
use candle_core::{Device, Tensor};
use cinematch_rerank::{candidate_text, relevance, weighted_rating, FakeCrossEncoder, Reranker};

/// Scores documents by a lookup on their `plot:` line; counts invocations.
struct ScriptedModel { scores: Vec<(&'static str, f32)>, calls: Arc<AtomicUsize> }

impl CrossEncoder for ScriptedModel {
    fn score_pairs(&self, _query: &str, documents: &[String]) -> anyhow::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(documents
            .iter()
            .map(|d| self.scores.iter().find(|(plot, _)| d.ends_with(plot)).map_or(0.0, |(_, s)| *s))
            .collect())
    }
}

struct ShortModel;

impl CrossEncoder for ShortModel {
    fn score_pairs(&self, _query: &str, _documents: &[String]) -> anyhow::Result<Vec<f32>> { Ok(vec![1.0]) }
}

struct FailingModel;

impl CrossEncoder for FailingModel {
    fn score_pairs(&self, _query: &str, _documents: &[String]) -> anyhow::Result<Vec<f32>> {
        Err(anyhow!("model crashed"))
    }
}

fn movie(title: &str, plot: &str, rating: f32) -> MovieRecord {
    serde_json::from_value(serde_json::json!({
        "id": 1, "title": title, "year": 2001, "imdb_rating": rating,
        "genres": "Drama, Crime", "directors": ["Ann Lee"], "stars": "Tom Hanks, Meg Ryan", "plot": plot,
    }))
    .expect("record")
}

fn scripted(scores: Vec<(&'static str, f32)>) -> (Reranker, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    (Reranker::new(Box::new(ScriptedModel { scores, calls: calls.clone() })), calls)
}

#[test]
fn candidate_text_has_fixed_line_order() {
    let text = candidate_text(&movie("T", "a plot", 7.0));
    assert_eq!(text, "directors: Ann Lee\nstars: Tom Hanks, Meg Ryan\ngenres: Drama, Crime\nplot: a plot");
}

#[test]
fn empty_candidates_skip_the_model() {
    let (reranker, calls) = scripted(vec![]);
    let out = reranker.rerank("anything", Vec::new(), None).unwrap();
    assert!(out.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn sorts_by_relevance_in_one_call() {
    let (reranker, calls) = scripted(vec![("low", 0.1), ("high", 0.9), ("mid", 0.5)]);
    let input = vec![movie("L", "low", 9.0), movie("H", "high", 1.0), movie("M", "mid", 5.0)];
    let out = reranker.rerank("q", input, None).unwrap();
    let titles: Vec<_> = out.iter().map(|m| m.title.as_str()).collect();
    assert_eq!(titles, vec!["H", "M", "L"]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn weighted_rating_can_overturn_relevance() {
    let (reranker, _) = scripted(vec![("a", 0.5), ("b", 0.9)]);
    let combine = weighted_rating(0.1);
    let out = reranker
        .rerank("q", vec![movie("B", "b", 2.0), movie("A", "a", 8.0)], Some(&combine))
        .unwrap();
    assert_eq!(out[0].title, "A", "0.5 + 0.8 beats 0.9 + 0.2");
    assert!((combine(0.5, 8.0) - 1.3).abs() < 1e-6);
}

#[test]
fn ties_keep_input_order() {
    let (reranker, _) = scripted(vec![("same", 0.4)]);
    let input = vec![movie("first", "same", 1.0), movie("second", "same", 1.0), movie("third", "same", 1.0)];
    let out = reranker.rerank("q", input, None).unwrap();
    let titles: Vec<_> = out.iter().map(|m| m.title.as_str()).collect();
    assert_eq!(titles, vec!["first", "second", "third"]);
}

#[test]
fn model_failures_are_retrieval_unavailable() {
    let two = vec![movie("A", "a", 1.0), movie("B", "b", 1.0)];
    let short = Reranker::new(Box::new(ShortModel)).rerank("q", two.clone(), None);
    assert!(matches!(short, Err(Error::RetrievalUnavailable(_))));

    let failing = Reranker::new(Box::new(FailingModel)).rerank("q", two, None);
    assert!(matches!(failing, Err(Error::RetrievalUnavailable(_))));
}

#[test]
fn fake_cross_encoder_counts_query_terms() {
    let docs = vec!["plot: a heist in the city".to_string(), "plot: a quiet farm".to_string()];
    let scores = FakeCrossEncoder.score_pairs("City HEIST", &docs).unwrap();
    assert_eq!(scores, vec![2.0, 0.0]);
}

#[test]
fn zero_rating_weight_ranks_by_relevance_alone() {
    let (reranker, _) = scripted(vec![("a", 0.5), ("b", 0.9)]);
    let input = vec![movie("A", "a", 8.0), movie("B", "b", 2.0)];
    let out = reranker.rerank_with_rating("q", input.clone(), 0.0).unwrap();
    assert_eq!(out[0].title, "B");
    let out = reranker.rerank_with_rating("q", input, 0.1).unwrap();
    assert_eq!(out[0].title, "A");
}

#[test]
fn logits_become_probabilities_so_rating_can_tip_the_order() {
    let logits = Tensor::from_slice(&[4.0f32, 1.0, -11.0, 11.0], 4, &Device::Cpu).unwrap();
    let scores = relevance(&logits).unwrap();
    assert!(scores.iter().all(|s| *s > 0.0 && *s < 1.0), "{scores:?}");
    assert!((scores[0] - 0.982).abs() < 1e-3 && (scores[1] - 0.731).abs() < 1e-3);

    // Strongly relevant but poorly rated loses to weaker but well rated.
    let combine = weighted_rating(0.1);
    assert!(combine(scores[1], 9.0) > combine(scores[0], 2.0));
}
