//! cinematch command line: the recommendation pipeline, a retrieval-only
//! search for inspecting candidates, and the offline indexer.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cinematch_core::types::{FilterSpec, MovieRecord};

pub mod bootstrap;
pub mod indexer;
pub mod pipeline;

use bootstrap::{load_collaborators, load_config, load_handles};
use pipeline::Recommender;

#[derive(Debug, Parser)]
#[command(name = "cinematch", about = "Movie recommendations from a natural-language request", rename_all = "kebab")]
pub struct Args {
    /// Directory holding config.toml.
    #[arg(long, short = 'c', value_name = "DIR", global = true)]
    pub config_dir: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Full pipeline: preferences, expansion, retrieval, reranking, narrative.
    Recommend {
        query: String,
        #[arg(long, value_name = "N")]
        top_k: Option<usize>,
        /// Skip preference extraction and filtering.
        #[arg(long)]
        no_filters: bool,
    },
    /// Retrieval only, on the raw query. Makes no generative calls.
    Search {
        query: String,
        #[arg(long, value_name = "N")]
        top_k: Option<usize>,
        /// Filter spec as JSON, e.g. '{"liked_genres": ["Comedy"]}'.
        #[arg(long, value_name = "JSON")]
        filters: Option<String>,
        /// Reorder candidates with the cross-encoder.
        #[arg(long)]
        rerank: bool,
    },
}

/// `RUST_LOG` when set, `info` otherwise. Logs go to stderr.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

pub fn run(args: Args) -> anyhow::Result<()> {
    let config = load_config(args.config_dir.as_deref())?;
    let handles = load_handles(&config)?;
    match args.command {
        Command::Recommend { query, top_k, no_filters } => {
            let top_k = top_k.unwrap_or(handles.settings.retrieval.top_k);
            let llm = load_collaborators(&handles.settings, handles.retriever.corpus())?;
            let recommender = Recommender::new(handles.retriever, handles.reranker, llm, handles.settings.rerank.rating_weight);
            let rec = recommender.recommend(&query, top_k, !no_filters)?;
            println!("{}", rec.narrative);
        }
        Command::Search { query, top_k, filters, rerank } => {
            let top_k = top_k.unwrap_or(handles.settings.retrieval.top_k);
            let filters = filters.as_deref().map(FilterSpec::from_json).transpose()?;
            let mut movies = handles.retriever.hybrid_search(&query, top_k, filters.as_ref())?;
            if rerank {
                movies = handles.reranker.rerank_with_rating(&query, movies, handles.settings.rerank.rating_weight)?;
            }
            print_ranked(&movies);
        }
    }
    Ok(())
}

fn print_ranked(movies: &[MovieRecord]) {
    if movies.is_empty() {
        println!("No matches.");
        return;
    }
    for (i, m) in movies.iter().enumerate() {
        println!("{:>2}. {} ({}) ⭐ {:.1}  [{}]", i + 1, m.title, m.year, m.imdb_rating, m.genres.join(", "));
    }
}
