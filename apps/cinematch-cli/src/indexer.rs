//! Offline build: fill in summaries, embed every row, write the vector table.

use std::path::PathBuf;

use anyhow::{ensure, Context};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use cinematch_core::corpus::Corpus;
use cinematch_core::traits::Embedder;
use cinematch_core::types::MovieRecord;
use cinematch_embed::load_embedder;
use cinematch_llm::{gemini, GeminiClient, Summarizer, TextGenerator};
use cinematch_vector::write_vector_table;

use crate::bootstrap::load_config;

/// Summaries written between two saves of the enriched corpus.
const CHECKPOINT_EVERY: usize = 25;

#[derive(Debug, Parser)]
#[command(name = "cinematch-indexer", about = "Build the movie vector index from the corpus", rename_all = "kebab")]
pub struct IndexerArgs {
    /// Directory holding config.toml.
    #[arg(long, short = 'c', value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
    /// Corpus file to index instead of `data.corpus_path`.
    #[arg(long, value_name = "FILE")]
    pub corpus: Option<PathBuf>,
    /// Generate missing summaries with the summary model instead of copying the plot.
    #[arg(long)]
    pub summarize: bool,
    /// Texts per embedding call.
    #[arg(long, value_name = "N")]
    pub batch_size: Option<usize>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SummaryStats {
    pub generated: usize,
    pub from_plot: usize,
}

pub fn run_indexer(args: IndexerArgs) -> anyhow::Result<()> {
    let config = load_config(args.config_dir.as_deref())?;
    let settings = config.settings()?;
    let corpus_path = args.corpus.clone().unwrap_or_else(|| config.path(&settings.data.corpus_path));
    let mut corpus = Corpus::load(&corpus_path)?;
    ensure!(!corpus.is_empty(), "corpus {} has no rows", corpus_path.display());

    let stats = if args.summarize {
        let summarizer = Summarizer::new(gemini(&settings.llm, &settings.llm.summary)?);
        fill_summaries(&mut corpus, Some(&summarizer), |c| c.save(&corpus_path))?
    } else {
        fill_summaries(&mut corpus, None::<&Summarizer<GeminiClient>>, |_| Ok(()))?
    };
    corpus.save(&corpus_path).with_context(|| format!("saving {}", corpus_path.display()))?;
    info!(generated = stats.generated, from_plot = stats.from_plot, "summaries complete");

    let batch_size = args.batch_size.unwrap_or(settings.models.embed_batch_size);
    let embedder = load_embedder(&config.path(&settings.models.embedding_dir), settings.models.max_len, batch_size)?;
    let embeddings = embed_corpus(&corpus, embedder.as_ref(), batch_size)?;

    let db_path = config.path(&settings.data.lancedb_dir);
    write_vector_table(&db_path, &settings.data.vector_table, &settings.data.meta_table, &corpus, &embeddings, embedder.embedder_id())?;

    println!("✅ Indexed {} movies into {}", corpus.len(), db_path.display());
    println!("📊 Summaries: {} generated, {} copied from plot", stats.generated, stats.from_plot);
    Ok(())
}

/// Give every row a summary. Rows that already have one are left alone, so an
/// interrupted run resumes where it stopped; `checkpoint` is called every few
/// generated summaries. A row the summarizer fails on gets its plot.
pub fn fill_summaries<G: TextGenerator>(
    corpus: &mut Corpus,
    summarizer: Option<&Summarizer<G>>,
    mut checkpoint: impl FnMut(&Corpus) -> anyhow::Result<()>,
) -> anyhow::Result<SummaryStats> {
    let mut stats = SummaryStats::default();
    let pending: Vec<usize> = corpus.records().iter().enumerate().filter(|(_, r)| !r.has_summary()).map(|(i, _)| i).collect();
    if pending.is_empty() { return Ok(stats); }
    info!(pending = pending.len(), generate = summarizer.is_some(), "filling summaries");

    for row in pending {
        let summary = match summarizer {
            Some(s) => match s.summarize(&corpus.records()[row]) {
                Ok(text) => Some(text),
                Err(err) => {
                    warn!(row, error = %err, "summary failed, using plot");
                    None
                }
            },
            None => None,
        };
        let record: &mut MovieRecord = &mut corpus.records_mut()[row];
        match summary {
            Some(text) => {
                record.generated_summary = Some(text);
                stats.generated += 1;
                if stats.generated % CHECKPOINT_EVERY == 0 { checkpoint(&*corpus)?; }
            }
            None => {
                record.generated_summary = Some(record.plot.clone());
                stats.from_plot += 1;
            }
        }
    }
    Ok(stats)
}

/// Embed `record.embedding_text()` for every row, in order.
pub fn embed_corpus(corpus: &Corpus, embedder: &dyn Embedder, batch_size: usize) -> anyhow::Result<Vec<Vec<f32>>> {
    let texts: Vec<String> = corpus.records().iter().map(MovieRecord::embedding_text).collect();
    let pb = ProgressBar::new(texts.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} movies ({percent}%) {msg}")?
            .progress_chars("#>-"),
    );
    let mut embeddings = Vec::with_capacity(texts.len());
    for chunk in texts.chunks(batch_size.max(1)) {
        let batch = embedder.embed_batch(chunk)?;
        ensure!(batch.len() == chunk.len(), "embedder returned {} vectors for {} texts", batch.len(), chunk.len());
        embeddings.extend(batch);
        pb.inc(chunk.len() as u64);
    }
    pb.finish_with_message("embedded");
    Ok(embeddings)
}
