use tracing::{debug, warn};

use cinematch_core::types::FilterSpec;

use crate::client::{GenerationOptions, TextGenerator};
use crate::error::{Error, Result};

/// Genres offered to the model when the corpus provides none.
pub const FALLBACK_GENRES: [&str; 12] = [
	"action", "comedy", "drama", "horror", "thriller", "sci-fi", "romance", "mystery", "crime", "animation",
	"adventure", "fantasy",
];

/// Query understanding: likes and dislikes pulled out of free text as a
/// [`FilterSpec`]. Genres are chosen from the corpus vocabulary so they match
/// the records' own spelling.
pub struct FeatureExtractor<G> {
	generator: G,
	genres: Vec<String>,
}

impl<G: TextGenerator> FeatureExtractor<G> {
	pub fn new(generator: G, genres: Vec<String>) -> Self {
		let genres = if genres.is_empty() {
			FALLBACK_GENRES.iter().map(|g| (*g).to_string()).collect()
		} else {
			genres
		};
		Self { generator, genres }
	}

	pub fn genres(&self) -> &[String] { &self.genres }

	pub fn extract(&self, query: &str) -> Result<FilterSpec> {
		let raw = self.generator.generate(&self.prompt(query), &GenerationOptions::default().json())?;
		let spec = FilterSpec::from_json(strip_code_fence(&raw)).map_err(|e| {
			warn!(error = %e, "feature extractor returned unusable JSON");
			Error::invalid_response(e.to_string())
		})?;
		debug!(?spec, "extracted features");
		Ok(spec)
	}

	fn prompt(&self, query: &str) -> String {
		format!(
			"Based on the user query: '{query}', identify the movie features the user likes and dislikes.

Answer with a single JSON object with these fields:
liked_genres: list of genres the user likes, chosen from the genres list
disliked_genres: list of genres the user dislikes, chosen from the genres list
liked_stars: list of actors the user likes (optional)
disliked_stars: list of actors the user dislikes (optional)
liked_directors: list of directors the user likes (optional)
disliked_directors: list of directors the user dislikes (optional)
liked_years: [start year, end year]; write false for an open bound, e.g. the 90s is [1990, 1999], \
until 2010 is [false, 2010], after 2010 is [2010, false] (optional)
liked_rating: minimum IMDb rating as a number, e.g. \"8+\" is 8.0 (optional)

Genres list: {genres:?}

Be flexible and consider every genre in the list.",
			genres = self.genres
		)
	}
}

/// Models sometimes wrap JSON in a markdown fence even in JSON mode.
fn strip_code_fence(raw: &str) -> &str {
	let trimmed = raw.trim();
	trimmed
		.strip_prefix("```json")
		.or_else(|| trimmed.strip_prefix("```"))
		.and_then(|rest| rest.strip_suffix("```"))
		.map_or(trimmed, str::trim)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn strips_markdown_fences() {
		assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
		assert_eq!(strip_code_fence("  {\"a\": 1} "), "{\"a\": 1}");
	}
}
