pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Http(#[from] reqwest::Error),
	#[error(transparent)]
	Json(#[from] serde_json::Error),
	#[error("{message}")]
	InvalidResponse { message: String },
	#[error("environment variable {var} holding the API key is not set")]
	MissingApiKey { var: String },
	#[error("gave up after {attempts} attempts: {last}")]
	RetriesExhausted {
		attempts: u32,
		#[source]
		last: Box<Error>,
	},
}

impl Error {
	pub fn invalid_response(message: impl Into<String>) -> Self {
		Self::InvalidResponse { message: message.into() }
	}
}
