//! Typed view over the merged configuration. Every field has a default so an
//! empty `config.toml` is a valid deployment.

use serde::{Deserialize, Serialize};

use crate::types::FilterPolicy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub models: ModelSettings,
    pub retrieval: RetrievalSettings,
    pub filters: FilterPolicy,
    pub rerank: RerankSettings,
    pub llm: LlmSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    /// JSON or JSON Lines file with one movie per row.
    pub corpus_path: String,
    pub lancedb_dir: String,
    pub vector_table: String,
    pub meta_table: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            corpus_path: "data/movies.json".to_string(),
            lancedb_dir: "data/indexes/lancedb".to_string(),
            vector_table: "movie_vectors".to_string(),
            meta_table: "index_meta".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub embedding_dir: String,
    pub reranker_dir: String,
    /// Token budget for both encoders.
    pub max_len: usize,
    pub embed_batch_size: usize,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            embedding_dir: "models/all-MiniLM-L6-v2".to_string(),
            reranker_dir: "models/ms-marco-MiniLM-L-6-v2".to_string(),
            max_len: 256,
            embed_batch_size: 32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_k: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankSettings {
    /// Weight of the IMDb rating in `relevance + weight * rating`. Zero ranks by
    /// relevance alone.
    pub rating_weight: f32,
}

impl Default for RerankSettings {
    fn default() -> Self {
        Self { rating_weight: 0.1 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub api_base: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub retry_attempts: u32,
    pub retry_delay_secs: u64,
    pub hyde: GenerationModel,
    pub extractor: GenerationModel,
    pub recommendation: GenerationModel,
    pub summary: GenerationModel,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            timeout_secs: 60,
            retry_attempts: 3,
            retry_delay_secs: 5,
            hyde: GenerationModel::new("gemini-2.0-flash", 20),
            extractor: GenerationModel::new("gemini-2.0-flash", 20),
            recommendation: GenerationModel::new("gemini-2.0-flash", 20),
            summary: GenerationModel::new("gemini-2.0-flash-lite", 30),
        }
    }
}

/// A generation model and its requests-per-minute allowance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationModel {
    pub name: String,
    pub rpm: usize,
}

impl GenerationModel {
    pub fn new(name: &str, rpm: usize) -> Self {
        Self { name: name.to_string(), rpm }
    }
}
