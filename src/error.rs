//! Error type shared by every stage of a comparison run.
//!
//! Variants fall in two groups. Per-unit failures (tree loading, tip checks,
//! cancellation, worker panics) end up inside a [`ComparisonRecord`] and
//! never stop the batch. Fatal failures (directories, output sink, worker
//! pool) abort the run before or while the pipeline drains.
//!
//! [`ComparisonRecord`]: crate::pipeline::ComparisonRecord

use std::any::Any;
use std::io;
use std::path::PathBuf;

use phylotree::tree::TreeError;
use thiserror::Error;

use crate::pairing::UnmatchedEntry;

pub type Result<T> = std::result::Result<T, TreeDistError>;

#[derive(Debug, Error)]
pub enum TreeDistError {
    /// The tree file could not be read from disk.
    #[error("could not read tree file {}", path.display())]
    ReadTree {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The tree file was read but is not valid Newick.
    #[error("could not parse tree file {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    /// The parsed tree is structurally unusable (no root, dangling node ids).
    #[error("malformed tree: {0}")]
    MalformedTree(String),

    /// The two trees of a pair do not share the same tip label set.
    #[error("{id}: trees have different tip sets ({detail})")]
    TipMismatch { id: String, detail: String },

    #[error("{id}: {side} tree has a tip without a label")]
    UnnamedTip { id: String, side: &'static str },

    #[error("{id}: {side} tree has tip label '{label}' more than once")]
    DuplicateTip {
        id: String,
        side: &'static str,
        label: String,
    },

    #[error(
        "could not find matching tree for {} in {}",
        .0.path.display(),
        .0.missing_from.display()
    )]
    UnmatchedEntry(UnmatchedEntry),

    #[error("could not read directory {}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not write results to {}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The unit was dequeued after the pipeline was cancelled.
    #[error("{id}: comparison cancelled")]
    Cancelled { id: String },

    #[error("{id}: worker panicked: {message}")]
    WorkerPanic { id: String, message: String },

    #[error("could not start worker pool: {0}")]
    Pool(String),

    /// Workers exited before every unit produced a record.
    #[error("pipeline lost results: expected {expected}, received {received}")]
    LostResults { expected: usize, received: usize },
}

/// Text of a panic payload caught with `catch_unwind`.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl From<TreeError> for TreeDistError {
    fn from(err: TreeError) -> Self {
        TreeDistError::MalformedTree(err.to_string())
    }
}

impl TreeDistError {
    /// Whether this error only concerns a single comparison unit.
    pub fn is_per_unit(&self) -> bool {
        matches!(
            self,
            TreeDistError::ReadTree { .. }
                | TreeDistError::Parse { .. }
                | TreeDistError::MalformedTree(_)
                | TreeDistError::TipMismatch { .. }
                | TreeDistError::UnnamedTip { .. }
                | TreeDistError::DuplicateTip { .. }
                | TreeDistError::UnmatchedEntry(_)
                | TreeDistError::Cancelled { .. }
                | TreeDistError::WorkerPanic { .. }
        )
    }
}
