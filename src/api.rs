//! Python binding layer for tree pair comparisons.
//!
//! Provides Python functions for comparing two Newick strings and for running
//! a whole directory comparison.

use std::path::Path;
use std::sync::Arc;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::distances::compare_trees;
use crate::io::{parse_newick, NewickLoader};
use crate::pairing::resolve_pairs;
use crate::pipeline::Pipeline;
use crate::runner::DEFAULT_WORKERS;

type Row = (String, usize, f64, f64, f64);

fn value_error(e: impl std::fmt::Display) -> PyErr {
    PyValueError::new_err(e.to_string())
}

/// Compare two trees given as Newick strings.
///
/// Args:
///     reference: Newick string of the reference tree
///     comparison: Newick string of the comparison tree
///
/// Returns:
///     A tuple (rf, norm_rf, weighted_rf, branch_score)
///
/// Raises:
///     ValueError: If a tree cannot be parsed or the tip sets differ
#[pyfunction]
fn tree_distances(reference: &str, comparison: &str) -> PyResult<(usize, f64, f64, f64)> {
    let ref_tree = parse_newick(Path::new("<reference>"), reference).map_err(value_error)?;
    let comp_tree = parse_newick(Path::new("<comparison>"), comparison).map_err(value_error)?;
    let d = compare_trees("pair", &ref_tree, &comp_tree).map_err(value_error)?;
    Ok((d.rf, d.norm_rf, d.weighted_rf, d.branch_score))
}

/// Compare every pair of trees matched by filename stem across two directories.
///
/// Args:
///     reference: Directory of reference trees (.nwk, .nw, .newick)
///     comparison: Directory of trees to compare
///     workers: Number of worker threads (default: 6)
///
/// Returns:
///     A list of (id, rf, norm_rf, weighted_rf, branch_score) tuples sorted by id.
///     Pairs that fail to load or have different tip sets are logged and omitted.
///
/// Raises:
///     ValueError: If a directory cannot be read or workers is 0
#[pyfunction]
#[pyo3(signature = (reference, comparison, workers=DEFAULT_WORKERS))]
fn compare_directories(reference: &str, comparison: &str, workers: usize) -> PyResult<Vec<Row>> {
    let pairing = resolve_pairs(reference, comparison).map_err(value_error)?;
    pairing.warn_unmatched();

    let pipeline = Pipeline::new(workers).map_err(value_error)?;
    let records = pipeline
        .collect(pairing.units, Arc::new(NewickLoader))
        .map_err(value_error)?;

    let mut rows: Vec<Row> = records
        .into_iter()
        .filter_map(|record| {
            let d = record.outcome.ok()?;
            Some((record.id, d.rf, d.norm_rf, d.weighted_rf, d.branch_score))
        })
        .collect();
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(rows)
}

/// Python module definition
#[pymodule]
fn tree_pair_dists(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(tree_distances, m)?)?;
    m.add_function(wrap_pyfunction!(compare_directories, m)?)?;
    Ok(())
}
