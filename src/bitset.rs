//! Compact bitset representation for tip sets, used as bipartition keys.
//!
//! # Overview
//! Each bit position corresponds to a tip id handed out by [`TipIndex`].
//! The tip set below a node is the OR of its children's sets; the set is then
//! canonicalized so that both sides of the same split map to one key.
//!
//! # Example
//! For a tree with tips [A, B, C, D] mapped to ids [0, 1, 2, 3]:
//! - Split {A, B} | {C, D} → canonical side {C, D} → `0b1100`
//! - Split {A, C} | {B, D} → canonical side {B, D} → `0b1010`
//!
//! [`TipIndex`]: crate::tips::TipIndex

/// A compact bitset of tip ids.
///
/// Internally stores bits in `Vec<u64>` words to support arbitrarily large trees.
/// Each u64 word holds 64 tip ids. Bits past `num_tips` are always zero, so two
/// bitsets built over the same tip numbering compare and hash equal exactly when
/// they hold the same tips.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Bitset(pub Vec<u64>);

impl Bitset {
    /// Creates a bitset with room for `num_tips` ids and no bit set.
    ///
    /// # Example
    /// ```
    /// # use tree_pair_dists::bitset::Bitset;
    /// // 100 tips need 2 words (128 bits)
    /// let bs = Bitset::with_tips(100);
    /// assert_eq!(bs.0.len(), 2);
    /// assert_eq!(bs.count_ones(), 0);
    /// ```
    pub fn with_tips(num_tips: usize) -> Self {
        Bitset(vec![0u64; num_tips.div_ceil(64)])
    }

    /// Sets the bit at the given index to 1.
    ///
    /// # Example
    /// ```
    /// # use tree_pair_dists::bitset::Bitset;
    /// let mut bs = Bitset::with_tips(8);
    /// bs.set(0);
    /// bs.set(5);
    /// assert_eq!(bs.0[0], 0b00100001);
    /// ```
    #[inline]
    pub fn set(&mut self, idx: usize) {
        let word = idx >> 6; // idx / 64
        let bit = idx & 63; // idx % 64
        self.0[word] |= 1u64 << bit;
    }

    /// Returns whether `idx` is in the set. Out-of-range ids are absent.
    #[inline]
    pub fn contains(&self, idx: usize) -> bool {
        self.0
            .get(idx >> 6)
            .is_some_and(|word| word & (1u64 << (idx & 63)) != 0)
    }

    /// Union in place: `self` becomes `self ∪ other`.
    #[inline]
    pub fn or_assign(&mut self, other: &Bitset) {
        for (a, b) in self.0.iter_mut().zip(&other.0) {
            *a |= *b;
        }
    }

    /// Number of tips in the set.
    #[inline]
    pub fn count_ones(&self) -> usize {
        self.0.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// The other side of the split, restricted to the first `num_tips` ids.
    ///
    /// Works a word at a time and masks the unused high bits of the last word.
    ///
    /// # Example
    /// ```
    /// # use tree_pair_dists::bitset::Bitset;
    /// let mut bs = Bitset::with_tips(4);
    /// bs.set(0);
    /// bs.set(1);
    /// assert_eq!(bs.complement(4).0[0], 0b1100);
    /// ```
    pub fn complement(&self, num_tips: usize) -> Bitset {
        let mut words: Vec<u64> = self.0.iter().map(|w| !w).collect();
        let tail = num_tips & 63;
        if tail != 0 {
            if let Some(last) = words.last_mut() {
                *last &= (1u64 << tail) - 1;
            }
        }
        Bitset(words)
    }

    /// Canonical key of the split this set describes.
    ///
    /// Both sides of a bipartition describe the same split, so we always keep
    /// the side that does NOT contain tip 0. Tip 0 is the first label in sorted
    /// order, which makes the choice identical across independently parsed trees.
    ///
    /// ```text
    /// tips: A=0 B=1 C=2 D=3
    /// {A,B} = 0b0011  has A → flip → {C,D} = 0b1100
    /// {C,D} = 0b1100  no A  → keep → {C,D} = 0b1100
    /// ```
    pub fn canonical(self, num_tips: usize) -> Bitset {
        if self.contains(0) {
            self.complement(num_tips)
        } else {
            self
        }
    }

    /// Whether the split isolates at most one tip on either side.
    ///
    /// Such splits come from terminal edges (or from a root edge mirroring one)
    /// and are shared by every pair of trees over the same tips.
    pub fn is_trivial_split(&self, num_tips: usize) -> bool {
        let ones = self.count_ones();
        ones <= 1 || ones + 1 >= num_tips
    }
}
