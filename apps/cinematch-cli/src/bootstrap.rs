//! Process start-up: every long-lived handle is built here once, from
//! configuration, and handed to the components that use it.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use cinematch_core::config::Config;
use cinematch_core::corpus::Corpus;
use cinematch_core::settings::Settings;
use cinematch_embed::load_embedder;
use cinematch_hybrid::HybridRetriever;
use cinematch_llm::{gemini, FeatureExtractor, GeminiClient, QueryExpander, RecommendationWriter, ResilientGenerator};
use cinematch_rerank::{load_cross_encoder, Reranker};
use cinematch_text::Bm25Index;
use cinematch_vector::LanceVectorIndex;

use crate::pipeline::Collaborators;

pub type Retriever = HybridRetriever<Bm25Index, LanceVectorIndex>;
pub type Generator = ResilientGenerator<GeminiClient>;

/// The retrieval side of the process: corpus, both indexes, relevance model.
pub struct Handles {
    pub settings: Settings,
    pub retriever: Retriever,
    pub reranker: Reranker,
}

pub fn load_config(dir: Option<&Path>) -> anyhow::Result<Config> {
    let config = match dir {
        Some(dir) => Config::load_from(dir),
        None => Config::load(),
    };
    config.context("loading configuration")
}

pub fn load_handles(config: &Config) -> anyhow::Result<Handles> {
    let settings = config.settings()?;
    let corpus_path = config.path(&settings.data.corpus_path);
    let corpus = Arc::new(Corpus::load(&corpus_path)?);

    let embedder = load_embedder(&config.path(&settings.models.embedding_dir), settings.models.max_len, settings.models.embed_batch_size)
        .context("loading sentence encoder")?;
    let vector = LanceVectorIndex::open(
        &config.path(&settings.data.lancedb_dir),
        &settings.data.vector_table,
        &settings.data.meta_table,
        &corpus,
        embedder.embedder_id(),
    )?;
    let text = Bm25Index::from_corpus(&corpus).context("building lexical index")?;
    let retriever = HybridRetriever::new(corpus, text, vector, embedder, settings.filters)?;

    let cross_encoder = load_cross_encoder(&config.path(&settings.models.reranker_dir), settings.models.max_len)
        .context("loading cross-encoder")?;
    info!(rows = retriever.corpus().len(), filters = ?settings.filters, "retrieval ready");
    Ok(Handles { settings, retriever, reranker: Reranker::new(cross_encoder) })
}

/// One Gemini client per collaborator, each with its own model and rate limit.
pub fn load_collaborators(settings: &Settings, corpus: &Corpus) -> anyhow::Result<Collaborators<Generator>> {
    let llm = &settings.llm;
    Ok(Collaborators {
        expander: QueryExpander::new(gemini(llm, &llm.hyde)?),
        extractor: FeatureExtractor::new(gemini(llm, &llm.extractor)?, corpus.genre_vocabulary()),
        writer: RecommendationWriter::new(gemini(llm, &llm.recommendation)?),
    })
}
