use thiserror::Error;

/// Failures surfaced by the retrieval core.
///
/// Filter problems are reported as [`Error::FilterMismatch`] but never abort a
/// query: the offending filter stage is skipped and logged.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    #[error("Filter mismatch: {0}")]
    FilterMismatch(String),
}

impl Error {
    /// Wrap a backend failure (index, embedder, relevance model) raised mid-query.
    pub fn retrieval(context: &str, err: &anyhow::Error) -> Self {
        Self::RetrievalUnavailable(format!("{context}: {err:#}"))
    }

    /// Wrap a failure raised while loading resources at startup.
    pub fn configuration(context: &str, err: &anyhow::Error) -> Self {
        Self::Configuration(format!("{context}: {err:#}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
