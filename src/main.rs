//! ctxpack - pack text sources into token-bounded chunks for LLM calls
//!
//! ctxpack provides:
//! - Source scanning with configurable ignore rules
//! - Token measurement with tiktoken encodings or a fast heuristic
//! - Greedy, sequential, balanced and exhaustive bin packing
//! - Unified output format (jsonl/json/md/raw)

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod backends;
mod cli;
mod core;
mod flows;
mod packing;

fn init_logging(cli: &cli::Cli) {
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    // stdout carries records; diagnostics go to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(!cli.no_color)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    init_logging(&cli);
    cli::run(cli)
}
