//! Tree distance metrics between two bipartition indexes.
//!
//! This module implements four measures over the informative splits of a
//! reference tree R and a comparison tree C:
//!
//! 1. **Robinson-Foulds (RF)**: number of splits present in exactly one tree.
//!
//! 2. **Normalized RF**: `RF / (RF + 2·|d|)` where `|d|` counts the shared
//!    splits whose lengths DIFFER. Shared splits of equal length do not enter
//!    the denominator. This is not the textbook normalization, which divides
//!    by the total number of internal edges.
//!
//! 3. **Weighted Robinson-Foulds**: sum of the unmatched split lengths plus
//!    `|length_r - length_c|` for shared splits.
//!
//! 4. **Kuhner-Felsenstein (Branch Score)**: `sqrt(Σ v²)` over the same values.

use phylotree::tree::Tree as PhyloTree;

use crate::bipartition::BipartitionIndex;
use crate::error::Result;
use crate::tips::TipIndex;

/// The four statistics produced for one tree pair.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TreeDistances {
    pub rf: usize,
    pub norm_rf: f64,
    pub weighted_rf: f64,
    pub branch_score: f64,
}

/// Splits of two indexes sorted into the classes the metrics are built from.
///
/// Shared splits with identical lengths appear in none of the three lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitComparison {
    /// Lengths of splits only in the reference tree.
    pub ref_only: Vec<f64>,
    /// Lengths of splits only in the comparison tree.
    pub comp_only: Vec<f64>,
    /// `length_r - length_c` for shared splits whose lengths differ.
    pub differing: Vec<f64>,
}

impl SplitComparison {
    /// Count of splits present in exactly one tree.
    pub fn unmatched(&self) -> usize {
        self.ref_only.len() + self.comp_only.len()
    }

    /// Every value entering the weighted metrics: differences first, then
    /// reference-only lengths, then comparison-only lengths.
    fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.differing
            .iter()
            .chain(&self.ref_only)
            .chain(&self.comp_only)
            .copied()
    }

    pub fn distances(&self) -> TreeDistances {
        let rf = self.unmatched();
        let denominator = rf + 2 * self.differing.len();
        let norm_rf = if denominator == 0 {
            0.0
        } else {
            rf as f64 / denominator as f64
        };

        let (weighted_rf, sum_squared) = self
            .values()
            .fold((0.0, 0.0), |(abs, sq), v| (abs + v.abs(), sq + v * v));

        TreeDistances {
            rf,
            norm_rf,
            weighted_rf,
            branch_score: sum_squared.sqrt(),
        }
    }
}

/// Sort the splits of `reference` and `comparison` into [`SplitComparison`] classes.
///
/// # Algorithm
/// One pass over C's splits looking each up in R (comp-only or shared), then
/// one pass over R's splits looking each up in C (ref-only). Both lookups are
/// O(1) hash probes on the canonical key.
///
/// # Example
/// ```text
/// R: {A,B}:1.0  {C,D}:0.5  {E,F}:2.0
/// C: {A,B}:1.0  {C,D}:0.25 {A,E}:3.0
///
/// ref-only  = [2.0]    ({E,F})
/// comp-only = [3.0]    ({A,E})
/// differing = [0.25]   ({C,D}: 0.5 - 0.25)
/// ```
pub fn classify_splits(
    reference: &BipartitionIndex,
    comparison: &BipartitionIndex,
) -> SplitComparison {
    let mut classes = SplitComparison::default();

    for (split, comp_len) in comparison.iter() {
        match reference.length(split) {
            None => classes.comp_only.push(comp_len),
            Some(ref_len) if ref_len != comp_len => classes.differing.push(ref_len - comp_len),
            Some(_) => {}
        }
    }

    for (split, ref_len) in reference.iter() {
        if !comparison.contains(split) {
            classes.ref_only.push(ref_len);
        }
    }

    classes
}

/// Compute all four statistics from two pre-built indexes.
pub fn compare_indexes(
    reference: &BipartitionIndex,
    comparison: &BipartitionIndex,
) -> TreeDistances {
    classify_splits(reference, comparison).distances()
}

/// Compare two trees: tip compatibility check, then both indexes, then the
/// distance engine.
///
/// `id` names the comparison unit in errors.
///
/// # Errors
/// - [`TreeDistError::TipMismatch`] (and the unnamed / duplicate tip variants)
///   if the tip label sets are not identical;
/// - [`TreeDistError::MalformedTree`] if either tree cannot be walked.
///
/// [`TreeDistError::TipMismatch`]: crate::error::TreeDistError::TipMismatch
/// [`TreeDistError::MalformedTree`]: crate::error::TreeDistError::MalformedTree
pub fn compare_trees(
    id: &str,
    reference: &PhyloTree,
    comparison: &PhyloTree,
) -> Result<TreeDistances> {
    let tips = TipIndex::shared(id, reference, comparison)?;
    let ref_index = BipartitionIndex::from_tree(reference, &tips)?;
    let comp_index = BipartitionIndex::from_tree(comparison, &tips)?;

    Ok(compare_indexes(&ref_index, &comp_index))
}

/// Robinson-Foulds distance between two trees.
pub fn robinson_foulds(tree_a: &PhyloTree, tree_b: &PhyloTree) -> Result<usize> {
    Ok(compare_trees("", tree_a, tree_b)?.rf)
}

/// Weighted Robinson-Foulds distance between two trees.
pub fn weighted_robinson_foulds(tree_a: &PhyloTree, tree_b: &PhyloTree) -> Result<f64> {
    Ok(compare_trees("", tree_a, tree_b)?.weighted_rf)
}

/// Kuhner-Felsenstein branch score between two trees.
pub fn kuhner_felsenstein(tree_a: &PhyloTree, tree_b: &PhyloTree) -> Result<f64> {
    Ok(compare_trees("", tree_a, tree_b)?.branch_score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitset::Bitset;
    use crate::error::TreeDistError;
    use itertools::Itertools;

    const TOLERANCE: f64 = 1e-12;

    // Trees and RF distances according to
    // https://evolution.genetics.washington.edu/phylip/doc/treedist.html
    const TREEDIST_TREES: [&str; 12] = [
        "(A:0.1,(B:0.1,(H:0.1,(D:0.1,(J:0.1,(((G:0.1,E:0.1):0.1,(F:0.1,I:0.1):0.1):0.1,C:0.1):0.1):0.1):0.1):0.1):0.1);",
        "(A:0.1,(B:0.1,(D:0.1,((J:0.1,H:0.1):0.1,(((G:0.1,E:0.1):0.1,(F:0.1,I:0.1):0.1):0.1,C:0.1):0.1):0.1):0.1):0.1);",
        "(A:0.1,(B:0.1,(D:0.1,(H:0.1,(J:0.1,(((G:0.1,E:0.1):0.1,(F:0.1,I:0.1):0.1):0.1,C:0.1):0.1):0.1):0.1):0.1):0.1);",
        "(A:0.1,(B:0.1,(E:0.1,(G:0.1,((F:0.1,I:0.1):0.1,((J:0.1,(H:0.1,D:0.1):0.1):0.1,C:0.1):0.1):0.1):0.1):0.1):0.1);",
        "(A:0.1,(B:0.1,(E:0.1,(G:0.1,((F:0.1,I:0.1):0.1,(((J:0.1,H:0.1):0.1,D:0.1):0.1,C:0.1):0.1):0.1):0.1):0.1):0.1);",
        "(A:0.1,(B:0.1,(E:0.1,((F:0.1,I:0.1):0.1,(G:0.1,((J:0.1,(H:0.1,D:0.1):0.1):0.1,C:0.1):0.1):0.1):0.1):0.1):0.1);",
        "(A:0.1,(B:0.1,(E:0.1,((F:0.1,I:0.1):0.1,(G:0.1,(((J:0.1,H:0.1):0.1,D:0.1):0.1,C:0.1):0.1):0.1):0.1):0.1):0.1);",
        "(A:0.1,(B:0.1,(E:0.1,((G:0.1,(F:0.1,I:0.1):0.1):0.1,((J:0.1,(H:0.1,D:0.1):0.1):0.1,C:0.1):0.1):0.1):0.1):0.1);",
        "(A:0.1,(B:0.1,(E:0.1,((G:0.1,(F:0.1,I:0.1):0.1):0.1,(((J:0.1,H:0.1):0.1,D:0.1):0.1,C:0.1):0.1):0.1):0.1):0.1);",
        "(A:0.1,(B:0.1,(E:0.1,(G:0.1,((F:0.1,I:0.1):0.1,((J:0.1,(H:0.1,D:0.1):0.1):0.1,C:0.1):0.1):0.1):0.1):0.1):0.1);",
        "(A:0.1,(B:0.1,(D:0.1,(H:0.1,(J:0.1,(((G:0.1,E:0.1):0.1,(F:0.1,I:0.1):0.1):0.1,C:0.1):0.1):0.1):0.1):0.1):0.1);",
        "(A:0.1,(B:0.1,(E:0.1,((G:0.1,(F:0.1,I:0.1):0.1):0.1,((J:0.1,(H:0.1,D:0.1):0.1):0.1,C:0.1):0.1):0.1):0.1):0.1);",
    ];

    const TREEDIST_RF: [[usize; 12]; 12] = [
        [0, 4, 2, 10, 10, 10, 10, 10, 10, 10, 2, 10],
        [4, 0, 2, 10, 8, 10, 8, 10, 8, 10, 2, 10],
        [2, 2, 0, 10, 10, 10, 10, 10, 10, 10, 0, 10],
        [10, 10, 10, 0, 2, 2, 4, 2, 4, 0, 10, 2],
        [10, 8, 10, 2, 0, 4, 2, 4, 2, 2, 10, 4],
        [10, 10, 10, 2, 4, 0, 2, 2, 4, 2, 10, 2],
        [10, 8, 10, 4, 2, 2, 0, 4, 2, 4, 10, 4],
        [10, 10, 10, 2, 4, 2, 4, 0, 2, 2, 10, 0],
        [10, 8, 10, 4, 2, 4, 2, 2, 0, 4, 10, 2],
        [10, 10, 10, 0, 2, 2, 4, 2, 4, 0, 10, 2],
        [2, 2, 0, 10, 10, 10, 10, 10, 10, 10, 0, 10],
        [10, 10, 10, 2, 4, 2, 4, 0, 2, 2, 10, 0],
    ];

    fn tree(newick: &str) -> PhyloTree {
        PhyloTree::from_newick(newick).unwrap()
    }

    fn key(num_tips: usize, ids: &[usize]) -> Bitset {
        let mut bs = Bitset::with_tips(num_tips);
        ids.iter().for_each(|&i| bs.set(i));
        bs.canonical(num_tips)
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= TOLERANCE,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn robinson_foulds_treedist() {
        for indices in (0..TREEDIST_TREES.len()).combinations(2) {
            let (i0, i1) = (indices[0], indices[1]);
            let t0 = tree(TREEDIST_TREES[i0]);
            let t1 = tree(TREEDIST_TREES[i1]);

            assert_eq!(robinson_foulds(&t0, &t1).unwrap(), TREEDIST_RF[i0][i1], "[{i0}, {i1}]");
        }
    }

    #[test]
    // Every branch is 0.1 long, so each unmatched split adds 0.1 to the
    // weighted RF and 0.01 under the branch-score root.
    fn weighted_metrics_treedist() {
        for indices in (0..TREEDIST_TREES.len()).combinations(2) {
            let (i0, i1) = (indices[0], indices[1]);
            let t0 = tree(TREEDIST_TREES[i0]);
            let t1 = tree(TREEDIST_TREES[i1]);
            let rf = TREEDIST_RF[i0][i1] as f64;

            assert_close(weighted_robinson_foulds(&t0, &t1).unwrap(), rf * 0.1);
            assert_close(kuhner_felsenstein(&t0, &t1).unwrap(), (rf * 0.01).sqrt());
        }
    }

    #[test]
    fn identical_trees_are_at_distance_zero() {
        for newick in TREEDIST_TREES {
            let d = compare_trees("self", &tree(newick), &tree(newick)).unwrap();
            assert_eq!(d, TreeDistances::default());
        }
    }

    #[test]
    fn swapping_trees_keeps_every_statistic() {
        let a = tree("((A:0.1,B:0.2):0.3,(C:0.4,(D:0.5,E:0.6):0.7):0.8,F:0.9);");
        let b = tree("((A:0.1,C:0.2):0.35,(B:0.4,(D:0.5,E:0.6):0.2):0.8,F:0.9);");

        let ab = compare_trees("ab", &a, &b).unwrap();
        let ba = compare_trees("ba", &b, &a).unwrap();

        assert_eq!(ab.rf, ba.rf);
        assert_close(ab.norm_rf, ba.norm_rf);
        assert_close(ab.weighted_rf, ba.weighted_rf);
        assert_close(ab.branch_score, ba.branch_score);
    }

    #[test]
    fn classes_and_statistics_by_hand() {
        // Six tips: A=0 .. F=5
        let reference = BipartitionIndex::from_splits(
            6,
            [(key(6, &[0, 1]), 1.0), (key(6, &[2, 3]), 0.5), (key(6, &[4, 5]), 2.0)],
        );
        let comparison = BipartitionIndex::from_splits(
            6,
            [(key(6, &[0, 1]), 1.0), (key(6, &[2, 3]), 0.25), (key(6, &[0, 4]), 3.0)],
        );

        let classes = classify_splits(&reference, &comparison);
        assert_eq!(classes.ref_only, vec![2.0]);
        assert_eq!(classes.comp_only, vec![3.0]);
        assert_eq!(classes.differing, vec![0.25]);

        let d = classes.distances();
        assert_eq!(d.rf, 2);
        assert_close(d.norm_rf, 0.5);
        assert_close(d.weighted_rf, 5.25);
        assert_close(d.branch_score, 13.0625f64.sqrt());
    }

    #[test]
    fn single_split_with_different_lengths() {
        // One shared split, length 1.0 against 2.0: d = [-1.0]
        let split = key(4, &[2, 3]);
        let reference = BipartitionIndex::from_splits(4, [(split.clone(), 1.0)]);
        let comparison = BipartitionIndex::from_splits(4, [(split, 2.0)]);

        let classes = classify_splits(&reference, &comparison);
        assert_eq!(classes.differing, vec![-1.0]);
        assert_eq!(
            classes.distances(),
            TreeDistances { rf: 0, norm_rf: 0.0, weighted_rf: 1.0, branch_score: 1.0 }
        );
    }

    #[test]
    fn two_tip_trees_only_have_terminal_edges() {
        let same = compare_trees("xy", &tree("(x:1.0,y:1.0);"), &tree("(x:1.0,y:1.0);")).unwrap();
        assert_eq!(same, TreeDistances::default());

        let longer = compare_trees("xy", &tree("(x:1.0,y:1.0);"), &tree("(x:2.0,y:1.0);")).unwrap();
        assert_eq!(longer, TreeDistances::default());
    }

    #[test]
    fn norm_rf_is_zero_not_nan_without_differences() {
        let d = compare_indexes(&BipartitionIndex::default(), &BipartitionIndex::default());
        assert_eq!(d.norm_rf, 0.0);
        assert!(!d.norm_rf.is_nan());
    }

    #[test]
    // u / (u + 2|d|) reaches 1 when no shared split differs in length.
    fn norm_rf_counts_only_differing_shared_splits() {
        let t0 = tree(TREEDIST_TREES[0]);
        let t1 = tree(TREEDIST_TREES[1]);
        let d = compare_trees("p", &t0, &t1).unwrap();
        assert_eq!(d.rf, 4);
        assert_eq!(d.norm_rf, 1.0);

        let a = tree("((A:1,B:1):1,(C:1,D:1):1,(E:1,F:1):1);");
        let b = tree("((A:1,B:1):2,(C:1,E:1):1,(D:1,F:1):1);");
        let d = compare_trees("p", &a, &b).unwrap();
        assert_eq!(d.rf, 4);
        assert_close(d.norm_rf, 4.0 / 6.0);
    }

    #[test]
    fn rf_is_bounded_by_twice_the_internal_edges() {
        for indices in (0..TREEDIST_TREES.len()).combinations(2) {
            let t0 = tree(TREEDIST_TREES[indices[0]]);
            let t1 = tree(TREEDIST_TREES[indices[1]]);
            let tips = TipIndex::shared("b", &t0, &t1).unwrap();
            let larger = BipartitionIndex::from_tree(&t0, &tips)
                .unwrap()
                .len()
                .max(BipartitionIndex::from_tree(&t1, &tips).unwrap().len());

            assert!(robinson_foulds(&t0, &t1).unwrap() <= 2 * larger);
        }
    }

    #[test]
    fn tip_mismatch_is_reported_for_the_unit() {
        let a = tree("((A:1,B:1):1,(C:1,D:1):1);");
        let b = tree("((A:1,B:1):1,(C:1,X:1):1);");

        match compare_trees("unit-7", &a, &b).unwrap_err() {
            TreeDistError::TipMismatch { id, .. } => assert_eq!(id, "unit-7"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
