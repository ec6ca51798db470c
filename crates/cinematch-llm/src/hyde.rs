use tracing::debug;

use crate::client::{GenerationOptions, TextGenerator};
use crate::error::Result;

/// Hypothetical-document expansion: turns a short request into the kind of
/// synopsis the corpus is made of, which then drives retrieval.
pub struct QueryExpander<G> {
	generator: G,
}

impl<G: TextGenerator> QueryExpander<G> {
	pub fn new(generator: G) -> Self { Self { generator } }

	pub fn expand(&self, query: &str) -> Result<String> {
		let options = GenerationOptions::default().with_temperature(1.0);
		let passage = self.generator.generate(&prompt(query), &options)?;
		debug!(query, passage = %passage, "expanded query");
		Ok(passage)
	}
}

fn prompt(query: &str) -> String {
	format!(
		"Based on the user's description, write a short but detailed synopsis of a movie that matches what \
they might be thinking of. Focus on the main plot, setting and key themes. Do not mention a title or any \
names unless the user did. Keep it natural, like a summary on the back of a DVD case, in one unstructured \
paragraph.

Example output:
A bounty hunter and his captured outlaw get trapped in a remote cabin during a brutal snowstorm. As more \
strangers arrive, tensions rise, secrets come out, and the night turns into a deadly game of deception and survival.

User input: {query}
Output:"
	)
}
