//! Per-tree index of internal-edge bipartitions.
//!
//! # Overview
//! A [`BipartitionIndex`] maps every informative split of a tree to the length
//! of the edge that induces it. Two indexes built over the same [`TipIndex`]
//! can be matched key by key, without relying on node ids of two
//! independently parsed trees.
//!
//! # What is a bipartition?
//! Removing an edge divides the tips into two groups:
//! ```text
//!   A          C
//!    \        /
//!     x------y       edge x-y induces {A,B} | {C,D}
//!    /        \
//!   B          D
//! ```
//! Terminal edges (one tip on one side) are skipped: every pair of trees over
//! the same tips shares them, so they carry no topological information.
//!
//! [`TipIndex`]: crate::tips::TipIndex

use std::collections::HashMap;

use phylotree::tree::Tree as PhyloTree;

use crate::bitset::Bitset;
use crate::error::{Result, TreeDistError};
use crate::tips::TipIndex;

/// Canonical split keys of one tree's internal edges, with their lengths.
///
/// # Canonicalization
/// Keys always hold the side of the split that does NOT contain tip 0
/// (see [`Bitset::canonical`]), so `{A,B}|{C,D}` and `{C,D}|{A,B}` share one key.
///
/// # Rooted input
/// A rooted binary tree has two root edges that induce the same unrooted
/// split. Their lengths are summed into one entry, which is the length of the
/// single edge the unrooted tree has in their place. Keys are therefore
/// pairwise distinct.
///
/// Splits are kept in discovery (post-order) order next to the hash map, so
/// iterating an index is deterministic for a given tree.
#[derive(Debug, Clone, Default)]
pub struct BipartitionIndex {
    order: Vec<Bitset>,
    lengths: HashMap<Bitset, f64>,
    num_tips: usize,
}

impl BipartitionIndex {
    /// Build the index of `tree`, numbering tips through `tips`.
    ///
    /// # Algorithm
    /// 1. Post-order walk from the root, building the tip set below each node
    ///    (a tip sets its own bit, an internal node ORs its children).
    /// 2. For every non-root node, canonicalize the set into a key.
    /// 3. Drop trivial keys (terminal edges).
    /// 4. Insert `key → parent_edge`, a missing length counting as `0.0`.
    ///
    /// # Errors
    /// [`TreeDistError::MalformedTree`] if the tree has no root, references a
    /// missing node, or has a tip outside `tips`.
    pub fn from_tree(tree: &PhyloTree, tips: &TipIndex) -> Result<Self> {
        let num_tips = tips.len();
        let root_id = tree.get_root()?;
        let below = Self::compute_bitsets(tree, root_id, tips)?;

        let mut index = BipartitionIndex {
            order: Vec::with_capacity(below.len().saturating_sub(num_tips)),
            lengths: HashMap::with_capacity(below.len().saturating_sub(num_tips)),
            num_tips,
        };

        for (node_id, bitset) in below {
            // The root has no parent edge
            if node_id == root_id {
                continue;
            }
            let key = bitset.canonical(num_tips);
            if key.is_trivial_split(num_tips) {
                continue;
            }
            let length = tree.get(&node_id)?.parent_edge.unwrap_or(0.0);
            index.insert(key, length);
        }

        Ok(index)
    }

    /// Build an index from already canonical keys. Repeated keys are summed.
    pub fn from_splits<I>(num_tips: usize, splits: I) -> Self
    where
        I: IntoIterator<Item = (Bitset, f64)>,
    {
        let mut index = BipartitionIndex {
            num_tips,
            ..Default::default()
        };
        for (key, length) in splits {
            index.insert(key, length);
        }
        index
    }

    fn insert(&mut self, key: Bitset, length: f64) {
        match self.lengths.get_mut(&key) {
            Some(existing) => *existing += length,
            None => {
                self.order.push(key.clone());
                self.lengths.insert(key, length);
            }
        }
    }

    /// Tip sets below every node, in post-order.
    ///
    /// Iterative so that deep caterpillar trees cannot exhaust the stack.
    fn compute_bitsets(
        tree: &PhyloTree,
        root_id: usize,
        tips: &TipIndex,
    ) -> Result<Vec<(usize, Bitset)>> {
        let num_tips = tips.len();
        let mut cache: HashMap<usize, Bitset> = HashMap::new();
        let mut order = Vec::new();
        let mut stack = vec![(root_id, false)];

        while let Some((node_id, expanded)) = stack.pop() {
            let node = tree.get(&node_id)?;

            if node.children.is_empty() {
                let label = node.name.as_deref().unwrap_or_default();
                let tip = tips.id(label).ok_or_else(|| {
                    TreeDistError::MalformedTree(format!("tip '{label}' is not in the tip set"))
                })?;
                let mut bitset = Bitset::with_tips(num_tips);
                bitset.set(tip);
                cache.insert(node_id, bitset);
                order.push(node_id);
            } else if expanded {
                let mut bitset = Bitset::with_tips(num_tips);
                for child_id in &node.children {
                    let child = cache.get(child_id).ok_or_else(|| {
                        let reason = format!("node {child_id} visited out of order");
                        TreeDistError::MalformedTree(reason)
                    })?;
                    bitset.or_assign(child);
                }
                cache.insert(node_id, bitset);
                order.push(node_id);
            } else {
                stack.push((node_id, true));
                stack.extend(node.children.iter().map(|&child_id| (child_id, false)));
            }
        }

        order
            .into_iter()
            .map(|node_id| {
                cache
                    .remove(&node_id)
                    .map(|bitset| (node_id, bitset))
                    .ok_or_else(|| {
                        TreeDistError::MalformedTree(format!("node {node_id} reached twice"))
                    })
            })
            .collect()
    }

    /// Length stored for `key`, if the split exists in this tree.
    pub fn length(&self, key: &Bitset) -> Option<f64> {
        self.lengths.get(key).copied()
    }

    pub fn contains(&self, key: &Bitset) -> bool {
        self.lengths.contains_key(key)
    }

    /// Splits and lengths in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = (&Bitset, f64)> + '_ {
        self.order.iter().map(|key| (key, self.lengths[key]))
    }

    /// Number of internal edges (distinct informative splits).
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn num_tips(&self) -> usize {
        self.num_tips
    }
}
