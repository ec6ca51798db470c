//! cinematch-rerank
//!
//! Orders retrieval candidates by cross-encoder relevance to the query,
//! optionally fused with the movie's IMDb rating.

use tracing::debug;

use cinematch_core::error::{Error, Result};
use cinematch_core::traits::CrossEncoder;
use cinematch_core::types::{join, MovieRecord};

mod cross_encoder;

pub use cross_encoder::{load_cross_encoder, relevance, BertCrossEncoder, FakeCrossEncoder};

/// Fusion of (relevance, imdb_rating) into a single sort key.
pub type CombineFn<'a> = &'a dyn Fn(f32, f32) -> f32;

/// `relevance + weight * rating`.
pub fn weighted_rating(weight: f32) -> impl Fn(f32, f32) -> f32 {
    move |relevance, rating| relevance + weight * rating
}

/// The text a candidate is judged on, one field per line.
pub fn candidate_text(record: &MovieRecord) -> String {
    format!(
        "directors: {}\nstars: {}\ngenres: {}\nplot: {}",
        join(&record.directors),
        join(&record.stars),
        join(&record.genres),
        record.plot
    )
}

pub struct Reranker {
    model: Box<dyn CrossEncoder>,
}

impl Reranker {
    pub fn new(model: Box<dyn CrossEncoder>) -> Self { Self { model } }

    /// Score every candidate against `query` in one model call and return
    /// them best first. Ties keep their input order.
    pub fn rerank(&self, query: &str, candidates: Vec<MovieRecord>, combine: Option<CombineFn<'_>>) -> Result<Vec<MovieRecord>> {
        if candidates.is_empty() { return Ok(candidates); }
        let texts: Vec<String> = candidates.iter().map(candidate_text).collect();
        let relevance = self.model.score_pairs(query, &texts).map_err(|e| Error::retrieval("cross-encoder", &e))?;
        if relevance.len() != candidates.len() {
            return Err(Error::RetrievalUnavailable(format!(
                "cross-encoder returned {} scores for {} candidates",
                relevance.len(),
                candidates.len()
            )));
        }

        let mut scored: Vec<(f32, MovieRecord)> = relevance
            .into_iter()
            .zip(candidates)
            .map(|(r, record)| {
                let key = combine.map_or(r, |f| f(r, record.imdb_rating));
                debug!(title = %record.title, relevance = r, rating = record.imdb_rating, key, "reranked");
                (key, record)
            })
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        Ok(scored.into_iter().map(|(_, record)| record).collect())
    }

    /// [`Reranker::rerank`] fused with [`weighted_rating`]; a zero weight
    /// ranks by relevance alone.
    pub fn rerank_with_rating(&self, query: &str, candidates: Vec<MovieRecord>, weight: f32) -> Result<Vec<MovieRecord>> {
        if weight.abs() < f32::EPSILON { return self.rerank(query, candidates, None); }
        let fusion = weighted_rating(weight);
        self.rerank(query, candidates, Some(&fusion))
    }
}
