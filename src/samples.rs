//! Per-node observation membership and the sample partitioner.

use crate::dataset::Dataset;
use crate::node::FeatureIndex;

/// The in-bag and out-of-bag observation indices routed to one node,
/// stratified into buckets.
///
/// For classification the bucket index is the class label, so per-class
/// counts fall out of the bucket sizes without re-reading labels. Regression
/// and unsupervised trees use a single bucket. In-bag lists retain bootstrap
/// multiplicity; out-of-bag lists are duplicate-free by construction.
#[derive(Debug, Clone)]
pub(crate) struct NodeSamples {
    in_bag: Vec<Vec<usize>>,
    out_bag: Vec<Vec<usize>>,
}

impl NodeSamples {
    pub(crate) fn new(in_bag: Vec<Vec<usize>>, out_bag: Vec<Vec<usize>>) -> Self {
        debug_assert_eq!(in_bag.len(), out_bag.len());
        Self { in_bag, out_bag }
    }

    /// Number of stratification buckets (classes, or 1 when unlabeled).
    pub(crate) fn n_buckets(&self) -> usize {
        self.in_bag.len()
    }

    /// Total in-bag count, bootstrap multiplicity included.
    pub(crate) fn in_bag_size(&self) -> usize {
        self.in_bag.iter().map(Vec::len).sum()
    }

    /// Total out-of-bag count.
    pub(crate) fn out_bag_size(&self) -> usize {
        self.out_bag.iter().map(Vec::len).sum()
    }

    /// Per-bucket in-bag counts (the class counts for classification).
    pub(crate) fn bucket_sizes(&self) -> Vec<usize> {
        self.in_bag.iter().map(Vec::len).collect()
    }

    pub(crate) fn in_bag(&self) -> &[Vec<usize>] {
        &self.in_bag
    }

    pub(crate) fn out_bag(&self) -> &[Vec<usize>] {
        &self.out_bag
    }

    /// All in-bag indices flattened across buckets, multiplicity retained.
    pub(crate) fn flatten_in_bag(&self) -> Vec<usize> {
        self.in_bag.iter().flatten().copied().collect()
    }

    /// All out-of-bag indices flattened across buckets.
    pub(crate) fn flatten_out_bag(&self) -> Vec<usize> {
        self.out_bag.iter().flatten().copied().collect()
    }

    /// Partition every in-bag and out-of-bag index into left/right children
    /// on `value <= threshold`, preserving bucket stratification.
    ///
    /// # Panics
    ///
    /// Panics if either child's in-bag set comes out empty. The split
    /// evaluators only report boundaries strictly between two distinct
    /// values, so an empty side is a contract breach between the evaluator
    /// and this partitioner, not a recoverable condition.
    pub(crate) fn split(
        &self,
        dataset: &Dataset,
        feature: FeatureIndex,
        threshold: f64,
    ) -> (NodeSamples, NodeSamples) {
        let column = dataset.column(feature.index());

        let route = |bucket: &[usize]| -> (Vec<usize>, Vec<usize>) {
            let mut left = Vec::new();
            let mut right = Vec::new();
            for &obs in bucket {
                if column[obs] <= threshold {
                    left.push(obs);
                } else {
                    right.push(obs);
                }
            }
            (left, right)
        };

        let mut left_in = Vec::with_capacity(self.n_buckets());
        let mut right_in = Vec::with_capacity(self.n_buckets());
        for bucket in &self.in_bag {
            let (l, r) = route(bucket);
            left_in.push(l);
            right_in.push(r);
        }

        let mut left_out = Vec::with_capacity(self.n_buckets());
        let mut right_out = Vec::with_capacity(self.n_buckets());
        for bucket in &self.out_bag {
            let (l, r) = route(bucket);
            left_out.push(l);
            right_out.push(r);
        }

        let left = NodeSamples::new(left_in, left_out);
        let right = NodeSamples::new(right_in, right_out);
        assert!(
            left.in_bag_size() > 0 && right.in_bag_size() > 0,
            "split on feature {feature} at {threshold} produced an empty child partition"
        );
        (left, right)
    }
}
