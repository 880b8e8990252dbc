//! Crate root: lightweight module orchestration and public re-exports.
//!
//! Modules:
//! - `bitset`: compact tip-set representation, used as bipartition key.
//! - `tips`: tip compatibility check and shared tip numbering.
//! - `bipartition`: per-tree index of internal-edge splits and lengths.
//! - `distances`: RF / normalized RF / weighted RF / branch score engine.
//! - `pairing`: match tree files of two directories by filename stem.
//! - `pipeline`: worker pool comparing many pairs with per-pair failure isolation.
//! - `io`: Newick loading and the CSV result sink.
//! - `runner`: one complete run from two directories to one table.
//! - `error`: the crate-wide error type.
//! - `api`: Python bindings via `pyo3` (gated behind "python" feature).

pub mod bipartition;
pub mod bitset;
pub mod distances;
pub mod error;
pub mod io;
pub mod pairing;
pub mod pipeline;
pub mod runner;
pub mod tips;

#[cfg(feature = "python")]
pub mod api;

// Re-export frequently used types & functions
pub use bipartition::BipartitionIndex;
pub use bitset::Bitset;
pub use distances::{compare_indexes, compare_trees, TreeDistances};
pub use error::{Result, TreeDistError};
pub use io::{NewickLoader, ResultWriter, TreeLoader};
pub use pairing::{resolve_pairs, ComparisonUnit, Pairing, UnmatchedEntry};
pub use pipeline::{BatchSummary, ComparisonRecord, Pipeline};
pub use runner::{run, RunConfig, RunSummary};
pub use tips::TipIndex;
