use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Per-call generation knobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
	pub temperature: f32,
	pub max_output_tokens: u32,
	/// Ask the model for a JSON document instead of prose.
	pub json: bool,
}

impl Default for GenerationOptions {
	fn default() -> Self {
		Self { temperature: 0.7, max_output_tokens: 300, json: false }
	}
}

impl GenerationOptions {
	pub fn with_temperature(mut self, temperature: f32) -> Self {
		self.temperature = temperature;
		self
	}

	pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
		self.max_output_tokens = max_output_tokens;
		self
	}

	pub fn json(mut self) -> Self {
		self.json = true;
		self
	}
}

/// Anything that turns a prompt into text.
pub trait TextGenerator: Send + Sync {
	fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String>;
}

impl<T: TextGenerator + ?Sized> TextGenerator for Box<T> {
	fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
		(**self).generate(prompt, options)
	}
}

/// Blocking client for the Gemini `generateContent` endpoint.
pub struct GeminiClient {
	http: Client,
	api_base: String,
	api_key: String,
	model: String,
}

impl GeminiClient {
	pub fn new(api_base: &str, api_key: &str, model: &str, timeout: Duration) -> Result<Self> {
		let http = Client::builder().timeout(timeout).build()?;
		Ok(Self {
			http,
			api_base: api_base.trim_end_matches('/').to_string(),
			api_key: api_key.to_string(),
			model: model.to_string(),
		})
	}

	/// Read the API key from the environment variable `var`.
	pub fn from_env(api_base: &str, var: &str, model: &str, timeout: Duration) -> Result<Self> {
		let api_key = std::env::var(var)
			.ok()
			.filter(|k| !k.trim().is_empty())
			.ok_or_else(|| Error::MissingApiKey { var: var.to_string() })?;
		Self::new(api_base, &api_key, model, timeout)
	}

	pub fn model(&self) -> &str { &self.model }

	fn endpoint(&self) -> String {
		format!("{}/models/{}:generateContent", self.api_base, self.model)
	}
}

impl TextGenerator for GeminiClient {
	fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
		let body = GenerateRequest::new(prompt, options);
		debug!(model = %self.model, prompt_len = prompt.len(), json = options.json, "generateContent");
		let res = self
			.http
			.post(self.endpoint())
			.header("x-goog-api-key", &self.api_key)
			.json(&body)
			.send()?;
		let json: GenerateResponse = res.error_for_status()?.json()?;
		parse_generated_text(json)
	}
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
	contents: Vec<Content<'a>>,
	generation_config: GenerationConfig,
}

impl<'a> GenerateRequest<'a> {
	fn new(prompt: &'a str, options: &GenerationOptions) -> Self {
		Self {
			contents: vec![Content { parts: vec![Part { text: prompt }] }],
			generation_config: GenerationConfig {
				temperature: options.temperature,
				max_output_tokens: options.max_output_tokens,
				response_mime_type: options.json.then_some("application/json"),
			},
		}
	}
}

#[derive(Debug, Serialize)]
struct Content<'a> {
	parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
	text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
	temperature: f32,
	max_output_tokens: u32,
	#[serde(skip_serializing_if = "Option::is_none")]
	response_mime_type: Option<&'static str>,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
	#[serde(default)]
	candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
	content: Option<CandidateContent>,
	#[serde(rename = "finishReason")]
	finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
	#[serde(default)]
	parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
	#[serde(default)]
	text: String,
}

fn parse_generated_text(res: GenerateResponse) -> Result<String> {
	let Some(candidate) = res.candidates.into_iter().next() else {
		return Err(Error::invalid_response("response has no candidates"));
	};
	let text: String = candidate
		.content
		.map(|c| c.parts.into_iter().map(|p| p.text).collect())
		.unwrap_or_default();
	if text.trim().is_empty() {
		return Err(Error::invalid_response(format!(
			"candidate has no text (finish reason: {})",
			candidate.finish_reason.as_deref().unwrap_or("unknown")
		)));
	}
	Ok(text.trim().to_string())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn request_uses_camel_case_and_optional_mime_type() {
		let prose = serde_json::to_value(GenerateRequest::new("hi", &GenerationOptions::default())).unwrap();
		assert_eq!(prose["contents"][0]["parts"][0]["text"], "hi");
		assert_eq!(prose["generationConfig"]["maxOutputTokens"], 300);
		assert!(prose["generationConfig"].get("responseMimeType").is_none());

		let json = serde_json::to_value(GenerateRequest::new("hi", &GenerationOptions::default().json())).unwrap();
		assert_eq!(json["generationConfig"]["responseMimeType"], "application/json");
	}

	#[test]
	fn parses_first_candidate_text() {
		let res: GenerateResponse = serde_json::from_value(serde_json::json!({
			"candidates": [
				{ "content": { "parts": [{ "text": "  a synopsis " }, { "text": "continued" }] }, "finishReason": "STOP" }
			]
		}))
		.unwrap();
		assert_eq!(parse_generated_text(res).unwrap(), "a synopsis continued");
	}

	#[test]
	fn empty_or_blocked_responses_are_invalid() {
		let none: GenerateResponse = serde_json::from_value(serde_json::json!({})).unwrap();
		assert!(matches!(parse_generated_text(none), Err(Error::InvalidResponse { .. })));

		let blocked: GenerateResponse =
			serde_json::from_value(serde_json::json!({ "candidates": [{ "finishReason": "SAFETY" }] })).unwrap();
		match parse_generated_text(blocked) {
			Err(Error::InvalidResponse { message }) => assert!(message.contains("SAFETY")),
			other => panic!("expected invalid response, got {other:?}"),
		}
	}

	#[test]
	fn missing_key_is_reported_by_variable_name() {
		let var = "CINEMATCH_TEST_KEY_THAT_IS_NOT_SET";
		std::env::remove_var(var);
		match GeminiClient::from_env("http://localhost", var, "m", Duration::from_secs(1)) {
			Err(Error::MissingApiKey { var: v }) => assert_eq!(v, var),
			Err(other) => panic!("unexpected error {other}"),
			Ok(_) => panic!("expected missing key"),
		}
	}
}
