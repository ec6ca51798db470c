//! Preference filters applied to dense candidates.
//!
//! Matching is by substring and case-sensitive: a wanted value matches when it
//! occurs inside any of the movie's values, so `"Com"` matches `"Comedy"` but
//! `"comedy"` does not.

use tracing::{debug, warn};

use cinematch_core::error::Result;
use cinematch_core::types::{Candidate, FilterPolicy, FilterSpec, FilterValue, MovieRecord, YearRange};

#[derive(Debug, Clone, PartialEq)]
pub enum Stage<'f> {
    LikedGenres(&'f [String]),
    DislikedGenres(&'f [String]),
    LikedStars(&'f [String]),
    DislikedStars(&'f [String]),
    LikedDirectors(&'f [String]),
    DislikedDirectors(&'f [String]),
    Years(YearRange),
    MinRating(f32),
}

impl Stage<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::LikedGenres(_) => "liked_genres",
            Self::DislikedGenres(_) => "disliked_genres",
            Self::LikedStars(_) => "liked_stars",
            Self::DislikedStars(_) => "disliked_stars",
            Self::LikedDirectors(_) => "liked_directors",
            Self::DislikedDirectors(_) => "disliked_directors",
            Self::Years(_) => "liked_years",
            Self::MinRating(_) => "liked_rating",
        }
    }

    pub fn admits(&self, record: &MovieRecord) -> bool {
        match self {
            Self::LikedGenres(wanted) => any_substring(wanted, &record.genres),
            Self::DislikedGenres(unwanted) => !any_substring(unwanted, &record.genres),
            Self::LikedStars(wanted) => any_substring(wanted, &record.stars),
            Self::DislikedStars(unwanted) => !any_substring(unwanted, &record.stars),
            Self::LikedDirectors(wanted) => any_substring(wanted, &record.directors),
            Self::DislikedDirectors(unwanted) => !any_substring(unwanted, &record.directors),
            Self::Years(range) => range.contains(record.year),
            Self::MinRating(min) => record.imdb_rating >= *min,
        }
    }
}

fn any_substring(wanted: &[String], have: &[String]) -> bool {
    wanted.iter().any(|w| have.iter().any(|h| h.contains(w.as_str())))
}

/// The stages one query runs, in order. Built once per query so malformed
/// fields are reported once, not once per candidate.
#[derive(Debug, Clone, Default)]
pub struct FilterPlan<'f> {
    stages: Vec<Stage<'f>>,
}

impl<'f> FilterPlan<'f> {
    pub fn new(spec: &'f FilterSpec, policy: &FilterPolicy) -> Self {
        let mut stages = Vec::new();
        if !spec.liked_genres.is_empty() { stages.push(Stage::LikedGenres(&spec.liked_genres)); }
        if !spec.disliked_genres.is_empty() { stages.push(Stage::DislikedGenres(&spec.disliked_genres)); }
        if policy.stars {
            if !spec.liked_stars.is_empty() { stages.push(Stage::LikedStars(&spec.liked_stars)); }
            if !spec.disliked_stars.is_empty() { stages.push(Stage::DislikedStars(&spec.disliked_stars)); }
        }
        if policy.directors {
            if !spec.liked_directors.is_empty() { stages.push(Stage::LikedDirectors(&spec.liked_directors)); }
            if !spec.disliked_directors.is_empty() { stages.push(Stage::DislikedDirectors(&spec.disliked_directors)); }
        }
        if policy.years {
            if let Some(range) = resolve("liked_years", &spec.liked_years) { stages.push(Stage::Years(range)); }
        }
        if policy.rating {
            if let Some(min) = resolve("liked_rating", &spec.liked_rating) { stages.push(Stage::MinRating(min)); }
        }
        Self { stages }
    }

    pub fn stages(&self) -> &[Stage<'f>] { &self.stages }

    /// First stage rejecting `candidate`, or `None` when every stage admits it.
    pub fn rejection(&self, candidate: &Candidate<'_>) -> Option<&Stage<'f>> {
        self.stages.iter().find(|stage| !stage.admits(candidate.record))
    }

    pub fn admits(&self, candidate: &Candidate<'_>) -> bool {
        match self.rejection(candidate) {
            None => true,
            Some(stage) => {
                debug!(row = candidate.row, title = %candidate.record.title, stage = stage.name(), "candidate rejected");
                false
            }
        }
    }
}

fn resolve<T: Copy>(field: &str, value: &FilterValue<T>) -> Option<T> {
    let resolved: Result<Option<&T>> = value.get();
    match resolved {
        Ok(v) => v.copied(),
        Err(err) => {
            warn!(field, error = %err, "skipping filter stage");
            None
        }
    }
}
