use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::Context;
use clap::builder::TypedValueParser;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tree_pair_dists::runner::{run, RunConfig, RunSummary, DEFAULT_OUTPUT, DEFAULT_WORKERS};

/// Compute RF, normalized RF, weighted RF and branch-score distances between
/// trees of two directories, paired by filename stem, and write one CSV row
/// per pair.
#[derive(Parser, Debug)]
#[command(
    name = "tree-pair-dists",
    version,
    about = "Pairwise tree distances between two directories"
)]
struct Args {
    /// Directory of reference trees (.nwk, .nw, .newick)
    #[arg(value_name = "REFERENCE")]
    reference: PathBuf,

    /// Directory of trees to compare against the reference ones
    #[arg(value_name = "COMPARISON")]
    comparison: PathBuf,

    /// Output CSV path (`.gz` for gzip, `-` for stdout)
    #[arg(short = 'o', long = "output", default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Number of worker threads
    #[arg(
        short = 'w',
        long = "workers",
        default_value_t = DEFAULT_WORKERS,
        value_parser = clap::value_parser!(u16).range(1..).map(usize::from)
    )]
    workers: usize,

    /// Quiet mode: only warnings and errors are logged, no progress bar
    #[arg(short = 'q', long = "quiet", default_value_t = false, conflicts_with = "verbose")]
    quiet: bool,

    /// Log every compared pair
    #[arg(short = 'v', long = "verbose", default_value_t = false)]
    verbose: bool,
}

impl Args {
    fn config(&self) -> RunConfig {
        RunConfig {
            reference_dir: self.reference.clone(),
            comparison_dir: self.comparison.clone(),
            output: self.output.clone(),
            workers: self.workers,
            progress: !self.quiet,
        }
    }
}

fn init_tracing(args: &Args) {
    let level = match (args.quiet, args.verbose) {
        (true, _) => "warn",
        (_, true) => "debug",
        _ => "info",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn execute(args: &Args) -> anyhow::Result<RunSummary> {
    let config = args.config();
    run(&config).with_context(|| {
        format!(
            "comparing {} against {}",
            config.reference_dir.display(),
            config.comparison_dir.display()
        )
    })
}

fn main() -> ExitCode {
    // Usage errors exit with 1 like every other failure; --help and --version with 0.
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    init_tracing(&args);

    let t0 = Instant::now();
    match execute(&args) {
        Ok(_) => {
            info!("Finished in {:.3}s", t0.elapsed().as_secs_f64());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
