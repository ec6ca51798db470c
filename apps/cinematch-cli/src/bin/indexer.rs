use clap::Parser;

use cinematch_cli::indexer::{run_indexer, IndexerArgs};

fn main() -> anyhow::Result<()> {
    cinematch_cli::init_tracing();
    run_indexer(IndexerArgs::parse())
}
