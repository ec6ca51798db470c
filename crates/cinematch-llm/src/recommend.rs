use serde::Serialize;

use cinematch_core::types::{join, MovieRecord};

use crate::client::{GenerationOptions, TextGenerator};
use crate::error::Result;

pub const NO_MATCHES: &str =
	"Sorry, no movies in the catalogue match that request. Try loosening the genres, years or rating you asked for.";

/// Writes the final answer: a short read of the user's taste and picks from
/// the ranked list, each with its details and a reason.
pub struct RecommendationWriter<G> {
	generator: G,
}

impl<G: TextGenerator> RecommendationWriter<G> {
	pub fn new(generator: G) -> Self { Self { generator } }

	/// `movies` is the reranked list, best first. An empty list answers
	/// [`NO_MATCHES`] without calling the model.
	pub fn write(&self, query: &str, movies: &[MovieRecord]) -> Result<String> {
		if movies.is_empty() { return Ok(NO_MATCHES.to_string()); }
		let listing = serde_json::to_string_pretty(&movies.iter().map(MovieCard::from).collect::<Vec<_>>())?;
		let options = GenerationOptions::default().with_max_output_tokens(5000);
		self.generator.generate(&prompt(query, &listing), &options)
	}
}

/// What the model sees of each movie.
#[derive(Debug, Serialize)]
struct MovieCard<'a> {
	title: &'a str,
	year: i32,
	length: Option<&'a str>,
	pg_rating: Option<&'a str>,
	imdb_rating: f32,
	metascore: f32,
	genres: String,
	directors: String,
	stars: String,
	plot: &'a str,
	link: Option<&'a str>,
}

impl<'a> From<&'a MovieRecord> for MovieCard<'a> {
	fn from(m: &'a MovieRecord) -> Self {
		Self {
			title: &m.title,
			year: m.year,
			length: m.length.as_deref(),
			pg_rating: m.pg_rating.as_deref(),
			imdb_rating: m.imdb_rating,
			metascore: m.metascore,
			genres: join(&m.genres),
			directors: join(&m.directors),
			stars: join(&m.stars),
			plot: &m.plot,
			link: m.link.as_deref(),
		}
	}
}

fn prompt(query: &str, listing: &str) -> String {
	format!(
		"Act as a movie recommendation engine. Use the retrieved list of movies below, ordered best match first, \
to suggest films tailored to the user's request.

Retrieved movies:
{listing}

Task:
1. Work out what the user asks for: genre, mood, director, actor or themes.
2. Pick the movies from the list that match best. Prefer close matches in genre, people and themes.
3. If nothing matches exactly, relax the criteria (similar genres, related directors) and say so.
4. Answer with:
   - a one-paragraph summary of the user's preferences;
   - 3 recommendations, one meeting every constraint and two with relaxed ones. For each give Year, Length, \
PG Rating, IMDb Rating, Metascore, Genre, Director, Stars, Plot Summary and Link, a Reason tying it to the \
request, and a Note when criteria were relaxed.

Rules:
- Only suggest movies from the retrieved list.
- No spoilers.
- Friendly, engaging tone.

User query: {query}"
	)
}
