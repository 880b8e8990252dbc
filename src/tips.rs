//! Tip compatibility check and shared tip numbering.
//!
//! Bipartition keys from two trees are only comparable if both trees number
//! their tips the same way. Node ids are assigned during parsing and differ
//! across files, so ids are assigned from tip LABELS instead: labels are sorted
//! and numbered `0..n`. Tip 0 is therefore the first label alphabetically in
//! both trees.

use std::collections::{BTreeSet, HashMap};

use itertools::Itertools;
use phylotree::tree::Tree as PhyloTree;

use crate::error::{Result, TreeDistError};

/// Number of missing labels quoted in a [`TreeDistError::TipMismatch`] message.
const MISMATCH_SAMPLE: usize = 5;

/// Shared numbering of tip labels, valid for both trees of one pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TipIndex {
    ids: HashMap<String, usize>,
}

impl TipIndex {
    /// Check that `reference` and `comparison` carry the same tip label set and
    /// build the numbering used for both.
    ///
    /// `id` names the comparison unit in any error.
    ///
    /// # Errors
    /// - [`TreeDistError::UnnamedTip`] / [`TreeDistError::DuplicateTip`] when a
    ///   tree's own labels are unusable;
    /// - [`TreeDistError::TipMismatch`] when the label sets differ.
    pub fn shared(id: &str, reference: &PhyloTree, comparison: &PhyloTree) -> Result<Self> {
        let ref_tips = tip_labels(id, "reference", reference)?;
        let comp_tips = tip_labels(id, "comparison", comparison)?;

        if ref_tips != comp_tips {
            return Err(TreeDistError::TipMismatch {
                id: id.to_string(),
                detail: describe_mismatch(&ref_tips, &comp_tips),
            });
        }

        Ok(Self::from_sorted(ref_tips))
    }

    /// Numbering for a single tree, without any compatibility check.
    pub fn for_tree(id: &str, tree: &PhyloTree) -> Result<Self> {
        Ok(Self::from_sorted(tip_labels(id, "reference", tree)?))
    }

    fn from_sorted(labels: BTreeSet<String>) -> Self {
        let ids = labels
            .into_iter()
            .enumerate()
            .map(|(idx, label)| (label, idx))
            .collect();
        TipIndex { ids }
    }

    /// Id assigned to `label`, if it is a tip of the pair.
    pub fn id(&self, label: &str) -> Option<usize> {
        self.ids.get(label).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Sorted, de-duplicated tip labels of one tree.
fn tip_labels(id: &str, side: &'static str, tree: &PhyloTree) -> Result<BTreeSet<String>> {
    let mut labels = BTreeSet::new();
    for leaf_id in tree.get_leaves() {
        let label = tree
            .get(&leaf_id)?
            .name
            .clone()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| TreeDistError::UnnamedTip {
                id: id.to_string(),
                side,
            })?;
        if labels.contains(&label) {
            return Err(TreeDistError::DuplicateTip {
                id: id.to_string(),
                side,
                label,
            });
        }
        labels.insert(label);
    }
    Ok(labels)
}

fn describe_mismatch(reference: &BTreeSet<String>, comparison: &BTreeSet<String>) -> String {
    let mut detail = format!(
        "{} reference tips vs {} comparison tips",
        reference.len(),
        comparison.len()
    );
    let only_ref = reference.difference(comparison).take(MISMATCH_SAMPLE).join(", ");
    if !only_ref.is_empty() {
        detail.push_str(&format!("; missing from comparison: {only_ref}"));
    }
    let only_comp = comparison.difference(reference).take(MISMATCH_SAMPLE).join(", ");
    if !only_comp.is_empty() {
        detail.push_str(&format!("; missing from reference: {only_comp}"));
    }
    detail
}
