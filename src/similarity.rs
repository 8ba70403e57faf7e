//! Pairwise co-occurrence counts for unsupervised forests.
//!
//! Observations that repeatedly land in the same leaf across an ensemble are
//! similar; the accumulated pair counts form an approximate proximity matrix.
//! Accumulation is lock-free: each rayon worker folds finished trees into its
//! own accumulator and the per-thread accumulators are merged when the forest
//! completes, instead of serializing every pair update behind one lock.

use std::collections::HashMap;

use crate::tree::{LeafRecord, Tree};

/// Canonical unordered-pair key.
fn pair_key(a: usize, b: usize) -> (usize, usize) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Pairwise leaf co-occurrence counts, mirrored for out-of-bag-only pairs.
#[derive(Debug, Clone, Default)]
pub struct SimilarityAccumulator {
    in_bag: HashMap<(usize, usize), u64>,
    out_bag: HashMap<(usize, usize), u64>,
}

impl SimilarityAccumulator {
    /// Create an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one finished tree's leaves into the counts. Called once per tree.
    pub fn record_tree(&mut self, tree: &Tree) {
        for leaf in tree.leaf_records() {
            self.record_leaf(leaf);
        }
    }

    /// Count every unordered pair within one leaf, the observation paired
    /// with itself included. In-bag lists retain bootstrap multiplicity, so a
    /// twice-drawn observation contributes multiplicity-weighted counts.
    pub fn record_leaf(&mut self, leaf: &LeafRecord) {
        for (i, &a) in leaf.in_bag.iter().enumerate() {
            for &b in &leaf.in_bag[..=i] {
                *self.in_bag.entry(pair_key(a, b)).or_insert(0) += 1;
            }
        }
        for (i, &a) in leaf.out_bag.iter().enumerate() {
            for &b in &leaf.out_bag[..=i] {
                *self.out_bag.entry(pair_key(a, b)).or_insert(0) += 1;
            }
        }
    }

    /// Merge another accumulator into this one.
    pub fn merge(&mut self, other: SimilarityAccumulator) {
        for (key, count) in other.in_bag {
            *self.in_bag.entry(key).or_insert(0) += count;
        }
        for (key, count) in other.out_bag {
            *self.out_bag.entry(key).or_insert(0) += count;
        }
    }

    /// In-bag co-occurrence count for an unordered observation pair.
    #[must_use]
    pub fn count(&self, a: usize, b: usize) -> u64 {
        self.in_bag.get(&pair_key(a, b)).copied().unwrap_or(0)
    }

    /// Out-of-bag co-occurrence count for an unordered observation pair.
    #[must_use]
    pub fn out_bag_count(&self, a: usize, b: usize) -> u64 {
        self.out_bag.get(&pair_key(a, b)).copied().unwrap_or(0)
    }

    /// Iterate the in-bag pair counts.
    pub fn pairs(&self) -> impl Iterator<Item = ((usize, usize), u64)> + '_ {
        self.in_bag.iter().map(|(&k, &v)| (k, v))
    }

    /// Iterate the out-of-bag pair counts.
    pub fn out_bag_pairs(&self) -> impl Iterator<Item = ((usize, usize), u64)> + '_ {
        self.out_bag.iter().map(|(&k, &v)| (k, v))
    }

    /// Number of distinct in-bag pairs seen.
    #[must_use]
    pub fn n_pairs(&self) -> usize {
        self.in_bag.len()
    }
}

#[cfg(test)]
mod tests {
    use super::SimilarityAccumulator;
    use crate::tree::LeafRecord;

    fn leaf(in_bag: &[usize], out_bag: &[usize]) -> LeafRecord {
        LeafRecord {
            in_bag: in_bag.to_vec(),
            out_bag: out_bag.to_vec(),
        }
    }

    #[test]
    fn co_occurrence_in_three_of_five_trees() {
        // Observations 1 and 2 share a leaf in trees 1-3 but are separated
        // in trees 4 and 5: their pair count must be exactly 3.
        let mut acc = SimilarityAccumulator::new();
        for _ in 0..3 {
            acc.record_leaf(&leaf(&[1, 2], &[]));
        }
        for _ in 0..2 {
            acc.record_leaf(&leaf(&[1], &[]));
            acc.record_leaf(&leaf(&[2], &[]));
        }
        assert_eq!(acc.count(1, 2), 3);
        assert_eq!(acc.count(2, 1), 3);
        assert_eq!(acc.count(1, 1), 5);
    }

    #[test]
    fn self_pairs_counted() {
        let mut acc = SimilarityAccumulator::new();
        acc.record_leaf(&leaf(&[4, 7], &[]));
        assert_eq!(acc.count(4, 4), 1);
        assert_eq!(acc.count(7, 7), 1);
        assert_eq!(acc.count(4, 7), 1);
        assert_eq!(acc.count(4, 9), 0);
    }

    #[test]
    fn multiplicity_weights_pairs() {
        // Observation 3 drawn twice into the same leaf: the (3, 5) pair is
        // counted once per copy and the self-pair picks up the cross term.
        let mut acc = SimilarityAccumulator::new();
        acc.record_leaf(&leaf(&[3, 3, 5], &[]));
        assert_eq!(acc.count(3, 5), 2);
        assert_eq!(acc.count(3, 3), 3);
    }

    #[test]
    fn out_bag_counts_mirrored_separately() {
        let mut acc = SimilarityAccumulator::new();
        acc.record_leaf(&leaf(&[1, 2], &[8, 9]));
        assert_eq!(acc.out_bag_count(8, 9), 1);
        assert_eq!(acc.out_bag_count(8, 8), 1);
        assert_eq!(acc.count(8, 9), 0);
        assert_eq!(acc.out_bag_count(1, 2), 0);
    }

    #[test]
    fn merge_adds_counts() {
        let mut a = SimilarityAccumulator::new();
        a.record_leaf(&leaf(&[1, 2], &[]));
        let mut b = SimilarityAccumulator::new();
        b.record_leaf(&leaf(&[1, 2], &[]));
        b.record_leaf(&leaf(&[2, 6], &[]));
        a.merge(b);
        assert_eq!(a.count(1, 2), 2);
        assert_eq!(a.count(2, 6), 1);
    }
}
