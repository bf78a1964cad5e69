use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use repseek::config::parse_config;
use repseek::logging::init_logger;
use repseek::simulate::{evaluate, parse_planted, write_pair, Simulator, DEFAULT_SEED};
use repseek::{
    read_pair, write_reports, FinderOptions, FinderOptionsBuilder, IndexSide, PositionStyle,
    RepeatFinder, ReverseRule, Strategy,
};

#[derive(Parser)]
#[command(name = "repseek")]
#[command(about = "Forward, tandem and reverse-complement repeat search between two DNA sequences", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v progress, -vv per-length detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search a query sequence against a reference
    Find(FindArgs),

    /// Generate a reference/query pair with planted repeats
    Simulate(SimulateArgs),
}

#[derive(Args)]
struct FindArgs {
    /// Reference sequence (plain text or FASTA)
    reference: PathBuf,

    /// Query sequence (plain text or FASTA)
    query: PathBuf,

    /// TOML file with a [search] table; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Start from the fuzzy preset (lengths 50-101, threshold 0.99)
    #[arg(long)]
    fuzzy: bool,

    #[arg(long)]
    min_length: Option<usize>,

    #[arg(long)]
    max_length: Option<usize>,

    /// Cap on collected candidates
    #[arg(long)]
    max_repeats: Option<usize>,

    /// Similarity threshold in (0, 1]; 1 means exact matching
    #[arg(long)]
    threshold: Option<f64>,

    /// Focus offset of the long-window heuristic (default: SPECIAL_CHECK_AREA or the query midpoint)
    #[arg(long)]
    focus: Option<usize>,

    /// Worker threads (0 = all cores)
    #[arg(short = 'T', long)]
    threads: Option<usize>,

    #[arg(long, value_enum)]
    strategy: Option<Strategy>,

    #[arg(long, value_enum)]
    index_side: Option<IndexSide>,

    #[arg(long, value_enum)]
    reverse_rule: Option<ReverseRule>,

    /// Output files are <prefix>.csv and <prefix>.details.txt
    #[arg(short, long, default_value = "repeats")]
    output_prefix: PathBuf,

    /// Report position + length instead of the start position
    #[arg(long)]
    end_positions: bool,

    /// Number of repeats printed to stdout
    #[arg(long, default_value_t = 10)]
    top: usize,

    /// planted.csv written by `simulate`; reports how many planted repeats were found
    #[arg(long)]
    planted: Option<PathBuf>,
}

impl FindArgs {
    fn options(&self) -> Result<FinderOptions> {
        let mut builder = match &self.config {
            Some(path) => {
                let config = parse_config(path)
                    .with_context(|| format!("Failed to load config: {}", path.display()))?;
                let mut settings = config.search;
                settings.fuzzy |= self.fuzzy;
                settings.to_builder()
            }
            None if self.fuzzy => FinderOptions::fuzzy().into_builder(),
            None => FinderOptions::builder(),
        };
        builder = self.apply(builder);
        Ok(builder.build()?)
    }

    fn apply(&self, mut builder: FinderOptionsBuilder) -> FinderOptionsBuilder {
        if let Some(v) = self.min_length {
            builder = builder.min_length(v);
        }
        if let Some(v) = self.max_length {
            builder = builder.max_length(v);
        }
        if let Some(v) = self.max_repeats {
            builder = builder.max_repeats(v);
        }
        if let Some(v) = self.threshold {
            builder = builder.similarity_threshold(v);
        }
        if let Some(v) = self.focus {
            builder = builder.focus_offset(v);
        }
        if let Some(v) = self.threads {
            builder = builder.worker_count(v);
        }
        if let Some(v) = self.strategy {
            builder = builder.strategy(v);
        }
        if let Some(v) = self.index_side {
            builder = builder.index_side(v);
        }
        if let Some(v) = self.reverse_rule {
            builder = builder.reverse_rule(v);
        }
        builder
    }
}

#[derive(Args)]
struct SimulateArgs {
    /// Length of both generated sequences
    #[arg(short, long, default_value_t = 10_000)]
    length: usize,

    /// Number of planted repeats
    #[arg(short, long, default_value_t = 10)]
    repeats: usize,

    #[arg(short, long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Directory receiving reference.txt, query.txt and planted.csv
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,
}

fn run_find(args: &FindArgs) -> Result<()> {
    let options = args.options()?;
    let (reference, query) = read_pair(&args.reference, &args.query)?;
    log::info!(
        "reference: {} bp, query: {} bp",
        reference.len(),
        query.len()
    );

    let start = Instant::now();
    let repeats = RepeatFinder::new(options)?.find(&query, &reference)?;
    log::info!("search finished in {:.2?}", start.elapsed());

    let style = if args.end_positions {
        PositionStyle::End
    } else {
        PositionStyle::Start
    };
    let paths = write_reports(&args.output_prefix, &repeats, style)?;

    println!("Found {} repeats", repeats.len());
    for (i, repeat) in repeats.iter().take(args.top).enumerate() {
        println!("Repeat #{}: {}", i + 1, repeat);
    }
    println!("Results: {}", paths.csv.display());
    println!("Details: {}", paths.details.display());

    if let Some(path) = &args.planted {
        let planted = parse_planted(path)
            .with_context(|| format!("Failed to load answer key: {}", path.display()))?;
        let evaluation = evaluate(&planted, &repeats);
        println!(
            "Detected {}/{} planted repeats ({:.1}%)",
            evaluation.detected,
            evaluation.planted,
            evaluation.detection_rate() * 100.0
        );
    }
    Ok(())
}

fn run_simulate(args: &SimulateArgs) -> Result<()> {
    let pair = Simulator::new(args.seed)
        .reference_length(args.length)
        .query_length(args.length)
        .repeats(args.repeats)
        .generate();
    write_pair(&args.output_dir, &pair).with_context(|| {
        format!(
            "Failed to write simulated sequences to {}",
            args.output_dir.display()
        )
    })?;
    println!(
        "Planted {} repeats in {}",
        pair.planted.len(),
        args.output_dir.display()
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match &cli.command {
        Commands::Find(args) => run_find(args),
        Commands::Simulate(args) => run_simulate(args),
    }
}
