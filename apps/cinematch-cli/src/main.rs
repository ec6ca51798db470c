use clap::Parser;

fn main() -> anyhow::Result<()> {
    cinematch_cli::init_tracing();
    cinematch_cli::run(cinematch_cli::Args::parse())
}
