use cinematch_core::types::{join, MovieRecord};

use crate::client::{GenerationOptions, TextGenerator};
use crate::error::Result;

/// Offline enrichment: a compact summary per movie, which becomes the text
/// of the lexical index and part of the embedded text.
pub struct Summarizer<G> {
	generator: G,
}

impl<G: TextGenerator> Summarizer<G> {
	pub fn new(generator: G) -> Self { Self { generator } }

	pub fn summarize(&self, movie: &MovieRecord) -> Result<String> {
		self.generator.generate(&prompt(movie), &GenerationOptions::default())
	}
}

fn prompt(movie: &MovieRecord) -> String {
	format!(
		"Write a short, spoiler-free summary of the movie below in plain prose. Mention its genre, tone, setting \
and main themes, and the people involved, so someone searching by mood or subject would find it. \
At most four sentences, no headings.

Title: {title} ({year})
Genres: {genres}
Directors: {directors}
Stars: {stars}
Plot: {plot}",
		title = movie.title,
		year = movie.year,
		genres = join(&movie.genres),
		directors = join(&movie.directors),
		stars = join(&movie.stars),
		plot = movie.plot,
	)
}
