//! cinematch-llm
//!
//! Generative-text collaborators of the recommender: query expansion,
//! preference extraction, the final narrative, and offline summaries. Each
//! one owns the generator it is built with.

use std::time::Duration;

use cinematch_core::settings::{GenerationModel, LlmSettings};

pub mod client;
pub mod error;
pub mod features;
pub mod hyde;
pub mod limiter;
pub mod recommend;
pub mod summarize;

pub use client::{GeminiClient, GenerationOptions, TextGenerator};
pub use error::{Error, Result};
pub use features::FeatureExtractor;
pub use hyde::QueryExpander;
pub use limiter::{RateLimiter, ResilientGenerator, RetryPolicy};
pub use recommend::{RecommendationWriter, NO_MATCHES};
pub use summarize::Summarizer;

/// A Gemini client for `model`, rate limited and retried per `settings`.
pub fn gemini(settings: &LlmSettings, model: &GenerationModel) -> Result<ResilientGenerator<GeminiClient>> {
	let client = GeminiClient::from_env(
		&settings.api_base,
		&settings.api_key_env,
		&model.name,
		Duration::from_secs(settings.timeout_secs),
	)?;
	let retry = RetryPolicy { attempts: settings.retry_attempts, delay: Duration::from_secs(settings.retry_delay_secs) };
	Ok(ResilientGenerator::new(client, model.rpm, retry))
}
