//! CLI module - Command-line interface definitions and handlers

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::warn;

use crate::backends::scan::{ScanOptions, DEFAULT_EXTENSIONS};
use crate::core::file_reader::{EncodingStrategy, FileReadConfig, DEFAULT_MAX_FILE_SIZE};
use crate::core::render::{OutputFormat, RenderConfig};
use crate::core::tokenizer::TokenModel;
use crate::flows::pack::PackOptions;
use crate::packing::{
    CapacityStep, OversizePolicy, PackConfig, Strategy, DEFAULT_CAPACITY, DEFAULT_MAX_ITERATIONS,
    DEFAULT_SEARCH_BUDGET, DEFAULT_TARGET_SPREAD,
};

/// ctxpack - pack documents, notebooks and source files into token-bounded chunks.
#[derive(Parser, Debug)]
#[command(name = "ctxpack")]
#[command(
    author,
    version,
    about,
    long_about = r#"ctxpack groups text sources into chunks that each fit a model's input limit.

Every source is measured in tokens, then packed by one of several strategies.
Each command prints its records in the selected format (default: jsonl).

Output formats:
- jsonl: one JSON object per line (best for piping into tools/LLMs)
- json: a single JSON array
- md: human-friendly Markdown
- raw: chunk texts only, separated by '---'

Examples:
    ctxpack scan --ext md,ipynb
    ctxpack pack --capacity 8000
    ctxpack pack --strategy balanced --target-spread 200 --stats
    ctxpack pack --strategy exhaustive --oversized skip --format md
"#
)]
pub struct Cli {
    /// Root directory for all operations.
    #[arg(
        long,
        global = true,
        default_value = ".",
        value_name = "ROOT",
        long_help = "Root directory for all operations (defaults to the current directory).\n\n\
Item identifiers in every record are paths relative to this root."
    )]
    pub root: PathBuf,

    /// Output format (jsonl/json/md/raw).
    #[arg(
        long,
        global = true,
        default_value = "jsonl",
        value_name = "FORMAT",
        long_help = "Select the output format.\n\n\
Supported values:\n\
- jsonl (default)\n\
- json\n\
- md (markdown)\n\
- raw\n\n\
Tip: Prefer jsonl when you want stable, line-oriented output for piping and prompts."
    )]
    pub format: String,

    /// Disable colored output (when applicable).
    #[arg(
        long,
        global = true,
        long_help = "Disable colored output. This is useful when piping to files or when your\n\
terminal does not support ANSI colors."
    )]
    pub no_color: bool,

    /// Quiet mode (errors only on stderr).
    #[arg(
        short,
        long,
        global = true,
        long_help = "Only log errors to stderr. Records are still printed to stdout.\n\n\
RUST_LOG, when set, takes precedence."
    )]
    pub quiet: bool,

    /// Verbose mode (debug logging).
    #[arg(
        short,
        long,
        global = true,
        long_help = "Log debug diagnostics to stderr, including every balancing attempt.\n\n\
RUST_LOG, when set, takes precedence."
    )]
    pub verbose: bool,

    /// Pretty-print JSON/JSONL output with indentation.
    #[arg(
        long,
        global = true,
        long_help = "Pretty-print JSON and JSONL output with indentation for human readability.\n\n\
Has no effect on md/raw formats."
    )]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Which sources to read and how to measure them
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Limit scanning to a subdirectory under ROOT.
    #[arg(long, value_name = "PATH")]
    pub scope: Option<PathBuf>,

    /// Maximum directory depth from the scan start.
    #[arg(
        long,
        value_name = "N",
        long_help = "Maximum directory depth from the scan start (ROOT or --scope).\n\n\
If omitted, all depths are scanned."
    )]
    pub max_depth: Option<usize>,

    /// Include hidden files/directories (dotfiles).
    #[arg(long)]
    pub hidden: bool,

    /// Disable .gitignore and other ignore rules.
    #[arg(long)]
    pub no_ignore: bool,

    /// File extensions to read (comma-separated).
    #[arg(
        long,
        value_name = "EXTS",
        long_help = "Comma-separated list of file extensions to read.\n\n\
Defaults to md,ipynb,py,pdf. PDFs contribute the text of every page; add txt for plain text."
    )]
    pub ext: Option<String>,

    /// Token model used to measure sources.
    #[arg(
        long,
        env = "CTXPACK_MODEL",
        default_value = "cl100k",
        value_name = "MODEL",
        long_help = "Token model used to measure every source.\n\n\
Supported values: cl100k, o200k, gpt4, gpt4o, gpt35, claude3, heuristic."
    )]
    pub model: String,

    /// How to handle invalid UTF-8 (lossy/skip).
    #[arg(long, default_value = "lossy", value_name = "MODE")]
    pub encoding: String,

    /// Skip files larger than this many bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_FILE_SIZE, value_name = "BYTES")]
    pub max_file_size: u64,
}

impl SourceArgs {
    fn scan_options(&self) -> ScanOptions {
        let extensions = match &self.ext {
            Some(list) => ScanOptions::parse_extensions(list),
            None => DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        };
        ScanOptions {
            scope: self.scope.clone(),
            max_depth: self.max_depth,
            hidden: self.hidden,
            no_ignore: self.no_ignore,
            extensions,
        }
    }

    fn read_config(&self) -> Result<FileReadConfig> {
        Ok(FileReadConfig {
            max_file_size: self.max_file_size,
            encoding_strategy: self.encoding.parse::<EncodingStrategy>().map_err(|e| anyhow!(e))?,
        })
    }

    fn token_model(&self) -> Result<TokenModel> {
        self.model.parse::<TokenModel>().map_err(|e| anyhow!(e))
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Measure every source and list it with its token size.
    #[command(
        long_about = "Scan ROOT (or --scope) for supported sources, read them and emit one item\n\
record per source with its measured size. Sources that cannot be read are reported as\n\
warning records. Output is sorted by path.\n\n\
Examples:\n\
  ctxpack scan\n\
  ctxpack scan --ext md,txt --model o200k\n\
  ctxpack scan --scope lessons --max-depth 2\n"
    )]
    Scan {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Pack sources into chunks that fit the capacity.
    #[command(
        long_about = r#"Measure every source, then partition the items into chunks whose total size
never exceeds --capacity.

Strategies:
- greedy (default): repeated first-fit scans, one chunk per scan
- sequential: one running chunk, closed when the next item overflows it
- balanced: sequential packing at a shrinking capacity until the chunk
  sizes are within --target-spread of each other
- exhaustive: each chunk is the best-fitting subset of the remaining items
- balanced-exhaustive: exhaustive packing under the balancing loop

Items larger than the capacity fail the run unless --oversized skip is given.

Examples:
    ctxpack pack --capacity 4000
    ctxpack pack --strategy balanced --max-iterations 50 --stats
    ctxpack pack --strategy exhaustive --search-budget 200000 --no-text
"#
    )]
    Pack {
        #[command(flatten)]
        source: SourceArgs,

        /// Maximum total tokens per chunk.
        #[arg(long, env = "CTXPACK_CAPACITY", default_value_t = DEFAULT_CAPACITY, value_name = "N")]
        capacity: usize,

        /// Packing strategy.
        #[arg(long, default_value = "greedy", value_name = "STRATEGY")]
        strategy: String,

        /// Attempts allowed to the balancing strategies.
        #[arg(
            long,
            env = "CTXPACK_MAX_ITERATIONS",
            default_value_t = DEFAULT_MAX_ITERATIONS,
            value_name = "N"
        )]
        max_iterations: usize,

        /// Acceptable spread between the largest and smallest chunk.
        #[arg(
            long,
            env = "CTXPACK_TARGET_SPREAD",
            default_value_t = DEFAULT_TARGET_SPREAD,
            value_name = "N"
        )]
        target_spread: usize,

        /// Node budget for each best-subset search.
        #[arg(
            long,
            env = "CTXPACK_SEARCH_BUDGET",
            default_value_t = DEFAULT_SEARCH_BUDGET,
            value_name = "N",
            long_help = "Maximum search nodes visited while choosing one chunk with the exhaustive\n\
strategies. When the budget runs out the best subset found so far is used."
        )]
        search_budget: usize,

        /// Capacity decrement for balancing (unit/proportional).
        #[arg(
            long,
            value_name = "STEP",
            long_help = "How far the balancing loop lowers capacity after a miss.\n\n\
- unit: one token per attempt (default for balanced)\n\
- proportional: (spread - target) / chunk count (default for balanced-exhaustive)"
        )]
        step: Option<String>,

        /// What to do with items larger than capacity (reject/skip).
        #[arg(long, default_value = "reject", value_name = "POLICY")]
        oversized: String,

        /// Omit chunk text from chunk records.
        #[arg(long)]
        no_text: bool,

        /// Show packing statistics on stderr.
        #[arg(long)]
        stats: bool,
    },

    /// Check which tokenizer encodings can be loaded.
    Doctor,
}

/// Run the CLI with parsed arguments
pub fn run(cli: Cli) -> Result<()> {
    let format: OutputFormat = cli.format.parse().map_err(|e: String| anyhow!(e))?;
    let render_config = RenderConfig::with_pretty(format, cli.pretty);

    if cli.no_color {
        colored::control::set_override(false);
    }

    let root = cli.root.canonicalize().unwrap_or(cli.root);

    match cli.command {
        Commands::Scan { source } => crate::backends::scan::run_scan(
            &root,
            &source.scan_options(),
            &source.read_config()?,
            &source.token_model()?,
            render_config,
        ),

        Commands::Pack {
            source,
            capacity,
            strategy,
            max_iterations,
            target_spread,
            search_budget,
            step,
            oversized,
            no_text,
            stats,
        } => {
            let strategy: Strategy = strategy.parse().map_err(|e: String| anyhow!(e))?;
            let oversize: OversizePolicy = oversized.parse().map_err(|e: String| anyhow!(e))?;

            let mut config = PackConfig::new(capacity)
                .with_max_iterations(max_iterations)
                .with_target_spread(target_spread)
                .with_search_budget(search_budget)
                .with_oversize(oversize);
            if let Some(step) = step {
                let step: CapacityStep = step.parse().map_err(|e: String| anyhow!(e))?;
                if !strategy.is_balancing() {
                    warn!(%strategy, "--step only applies to balancing strategies");
                }
                config = config.with_step(step);
            }
            config.validate()?;

            let options = PackOptions {
                strategy,
                config,
                include_text: !no_text,
            };
            crate::flows::pack::run_pack(
                &root,
                &source.scan_options(),
                &source.read_config()?,
                &source.token_model()?,
                options,
                stats,
                render_config,
            )
        }

        Commands::Doctor => crate::backends::doctor::run_doctor(render_config),
    }
}
