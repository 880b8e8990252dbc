//! One complete comparison run: pair the directories, open the sink, drive
//! the pipeline.
//!
//! Everything that must fail before any work starts (listing directories,
//! opening the output) happens here, in that order.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::error::Result;
use crate::io::{NewickLoader, ResultWriter};
use crate::pairing::resolve_pairs;
use crate::pipeline::Pipeline;

/// Default number of worker threads.
pub const DEFAULT_WORKERS: usize = 6;

/// Default output path.
pub const DEFAULT_OUTPUT: &str = "output.csv";

/// Resolved settings of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub reference_dir: PathBuf,
    pub comparison_dir: PathBuf,
    /// CSV destination; `.gz` compresses, `-` is stdout.
    pub output: PathBuf,
    pub workers: usize,
    /// Draw a progress bar on stderr while comparing.
    pub progress: bool,
}

impl RunConfig {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(reference_dir: P, comparison_dir: Q) -> Self {
        RunConfig {
            reference_dir: reference_dir.into(),
            comparison_dir: comparison_dir.into(),
            output: PathBuf::from(DEFAULT_OUTPUT),
            workers: DEFAULT_WORKERS,
            progress: false,
        }
    }
}

/// What a run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub compared: usize,
    pub failed: usize,
    pub unmatched: usize,
}

/// Compare every matched pair of `config.reference_dir` and
/// `config.comparison_dir`, writing one row per successful pair.
///
/// # Errors
/// Only fatal conditions: unreadable directories, an output that cannot be
/// opened or written, a worker pool that cannot start. Pair-level failures
/// and unmatched files are logged and counted in the summary.
pub fn run(config: &RunConfig) -> Result<RunSummary> {
    info!(
        "Comparing {} and {} to {} (on {} threads)",
        config.reference_dir.display(),
        config.comparison_dir.display(),
        config.output.display(),
        config.workers
    );

    let pairing = resolve_pairs(&config.reference_dir, &config.comparison_dir)?;
    pairing.warn_unmatched();
    info!(
        "{} pairs matched, {} files without a counterpart",
        pairing.units.len(),
        pairing.unmatched.len()
    );

    let mut writer = ResultWriter::create(&config.output)?;
    let pipeline = Pipeline::new(config.workers)?.with_progress(config.progress);

    let batch = pipeline.run(pairing.units, Arc::new(NewickLoader), |record| match record.outcome {
        Ok(distances) => writer.write_row(&record.id, &distances),
        Err(_) => Ok(()),
    })?;
    let rows = writer.finish()?;

    let summary = RunSummary {
        compared: rows,
        failed: batch.failed,
        unmatched: pairing.unmatched.len(),
    };
    info!(
        "Done: {} pairs compared, {} failed, {} unmatched files",
        summary.compared, summary.failed, summary.unmatched
    );
    Ok(summary)
}
