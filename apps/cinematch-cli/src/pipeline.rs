use tracing::{info, warn};

use cinematch_core::traits::{TextIndex, VectorIndex};
use cinematch_core::types::{FilterSpec, MovieRecord};
use cinematch_hybrid::HybridRetriever;
use cinematch_llm::{Error as LlmError, FeatureExtractor, QueryExpander, RecommendationWriter, TextGenerator};
use cinematch_rerank::Reranker;

/// The generative side of a recommendation.
pub struct Collaborators<G> {
    pub expander: QueryExpander<G>,
    pub extractor: FeatureExtractor<G>,
    pub writer: RecommendationWriter<G>,
}

#[derive(Debug, Clone)]
pub struct Recommendation {
    /// `None` when filtering was disabled or extraction failed.
    pub filters: Option<FilterSpec>,
    pub expanded_query: String,
    pub movies: Vec<MovieRecord>,
    pub narrative: String,
}

pub struct Recommender<TI, VI, G> where TI: TextIndex, VI: VectorIndex, G: TextGenerator {
    retriever: HybridRetriever<TI, VI>,
    reranker: Reranker,
    llm: Collaborators<G>,
    rating_weight: f32,
}

impl<TI, VI, G> Recommender<TI, VI, G> where TI: TextIndex, VI: VectorIndex, G: TextGenerator {
    pub fn new(retriever: HybridRetriever<TI, VI>, reranker: Reranker, llm: Collaborators<G>, rating_weight: f32) -> Self {
        Self { retriever, reranker, llm, rating_weight }
    }

    /// Extract preferences and expand the raw query, retrieve and rerank on
    /// the expansion, then narrate over the ranked list. An unreadable
    /// extraction drops the filters; failed calls to the model propagate.
    pub fn recommend(&self, query: &str, top_k: usize, use_filters: bool) -> anyhow::Result<Recommendation> {
        let filters = if use_filters {
            match self.llm.extractor.extract(query) {
                Ok(spec) => Some(spec),
                // An answer we cannot read costs the filters, not the request.
                Err(err @ LlmError::InvalidResponse { .. }) => {
                    warn!(error = %err, "feature extraction unusable, continuing without filters");
                    None
                }
                Err(err) => return Err(err.into()),
            }
        } else {
            None
        };

        let expanded_query = self.llm.expander.expand(query)?;
        let candidates = self.retriever.hybrid_search(&expanded_query, top_k, filters.as_ref())?;
        let movies = self.reranker.rerank_with_rating(&expanded_query, candidates, self.rating_weight)?;
        info!(candidates = movies.len(), filtered = filters.is_some(), "ranked recommendations");

        let narrative = self.llm.writer.write(query, &movies)?;
        Ok(Recommendation { filters, expanded_query, movies, narrative })
    }
}
