//! Streaming split search for the labeled tree kinds.
//!
//! Both evaluators sweep candidate boundaries left-to-right over one feature
//! at a time, maintaining running statistics so each position costs O(1)
//! (classification additionally keeps the running sum of squared class
//! counts). Runs of identical feature values are merged into a single
//! candidate boundary: a split is only ever proposed between two distinct
//! values, so the decision for a mixed-label run is deferred until the run
//! ends and finalized at the first boundary after it.

use rand::Rng;

use crate::dataset::Dataset;
use crate::node::FeatureIndex;
use crate::samples::NodeSamples;

/// The winning split of a node-level search.
#[derive(Debug, Clone)]
pub(crate) struct GainSplit {
    /// Feature used for the split.
    pub(crate) feature: FeatureIndex,
    /// Threshold: midpoint of the winning boundary's flanking values.
    pub(crate) threshold: f64,
    /// Impurity reduction achieved (strictly positive).
    pub(crate) gain: f64,
    /// Left side's count-weighted impurity, handed down to the left child.
    pub(crate) left_impurity: f64,
    /// Right side's count-weighted impurity, handed down to the right child.
    pub(crate) right_impurity: f64,
}

/// Count-weighted Gini complement: `Σ c_k (1 - c_k / n)`.
///
/// Zero for a pure or empty node. Count-weighted (not normalized) so parent
/// and child figures subtract directly in the gain formula.
pub(crate) fn weighted_gini(counts: &[usize]) -> f64 {
    let n: usize = counts.iter().sum();
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    let sum_sq: f64 = counts.iter().map(|&c| (c * c) as f64).sum();
    n - sum_sq / n
}

/// Total sum of squared error about the mean, accumulated uncentered.
pub(crate) fn sum_squared_error(values: impl Iterator<Item = f64>) -> f64 {
    let mut n = 0usize;
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for v in values {
        n += 1;
        sum += v;
        sum_sq += v * v;
    }
    if n == 0 {
        return 0.0;
    }
    sum_sq - sum * sum / n as f64
}

/// Pick the candidate features for one node: a partial Fisher-Yates shuffle
/// taking the first `n_candidates` positions.
pub(crate) fn candidate_features(
    n_features: usize,
    n_candidates: usize,
    rng: &mut impl Rng,
) -> Vec<usize> {
    let mut order: Vec<usize> = (0..n_features).collect();
    let take = n_candidates.min(n_features);
    for i in 0..take {
        let j = rng.gen_range(i..n_features);
        order.swap(i, j);
    }
    order.truncate(take);
    order
}

/// Midpoint threshold for a boundary between two distinct values, or `None`
/// when the midpoint rounds onto the right-hand value (adjacent floats) and
/// could not separate the two sides.
fn boundary_threshold(left: f64, right: f64) -> Option<f64> {
    let mid = (left + right) / 2.0;
    if mid == right { None } else { Some(mid) }
}

/// Find the best classification split for a node.
///
/// For each candidate feature the `(value, class)` pairs are sorted by value
/// (stable, so ties keep their natural order) and swept once. The score at a
/// boundary is `node_impurity` minus the count-weighted Gini complements of
/// the two sides; the running best is carried across features and only
/// replaced on strictly greater gain. Returns `None` when no boundary
/// achieves positive gain.
pub(crate) fn best_classification_split(
    dataset: &Dataset,
    samples: &NodeSamples,
    candidates: &[usize],
    node_impurity: f64,
) -> Option<GainSplit> {
    let n_classes = samples.n_buckets();
    let parent_counts = samples.bucket_sizes();
    let n_samples = samples.in_bag_size();
    if n_samples < 2 {
        return None;
    }

    let mut best: Option<GainSplit> = None;
    let mut best_gain = 0.0f64;

    for &feature in candidates {
        let column = dataset.column(feature);

        let mut pairs: Vec<(f64, usize)> = Vec::with_capacity(n_samples);
        for (class, bucket) in samples.in_bag().iter().enumerate() {
            pairs.extend(bucket.iter().map(|&obs| (column[obs], class)));
        }
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_counts = vec![0usize; n_classes];
        let mut right_counts = parent_counts.clone();
        // Running Σ c_k² for each side, updated in O(1) per moved sample.
        let mut left_sum_sq = 0.0f64;
        let mut right_sum_sq: f64 = right_counts.iter().map(|&c| (c * c) as f64).sum();

        for i in 0..n_samples - 1 {
            let (value, class) = pairs[i];
            left_sum_sq += (2 * left_counts[class] + 1) as f64;
            left_counts[class] += 1;
            right_sum_sq -= (2 * right_counts[class] - 1) as f64;
            right_counts[class] -= 1;

            let next = pairs[i + 1].0;
            if value == next {
                continue;
            }
            let Some(threshold) = boundary_threshold(value, next) else {
                continue;
            };

            let n_left = (i + 1) as f64;
            let n_right = (n_samples - i - 1) as f64;
            let left_impurity = n_left - left_sum_sq / n_left;
            let right_impurity = n_right - right_sum_sq / n_right;
            let gain = node_impurity - left_impurity - right_impurity;

            if gain > best_gain {
                best_gain = gain;
                best = Some(GainSplit {
                    feature: FeatureIndex::new(feature),
                    threshold,
                    gain,
                    left_impurity,
                    right_impurity,
                });
            }
        }
    }

    best
}

/// Find the best regression split for a node.
///
/// Same sweep discipline as classification, scoring `node_impurity` (the
/// node's total SSE) minus the left/right sums of squared error about each
/// side's mean. SSE is tracked as `Σy² - (Σy)²/n` from running sums.
pub(crate) fn best_regression_split(
    dataset: &Dataset,
    samples: &NodeSamples,
    targets: &[f64],
    candidates: &[usize],
    node_impurity: f64,
) -> Option<GainSplit> {
    let n_samples = samples.in_bag_size();
    if n_samples < 2 {
        return None;
    }

    let total_sum: f64 = samples
        .in_bag()
        .iter()
        .flatten()
        .map(|&obs| targets[obs])
        .sum();
    let total_sum_sq: f64 = samples
        .in_bag()
        .iter()
        .flatten()
        .map(|&obs| targets[obs] * targets[obs])
        .sum();

    let mut best: Option<GainSplit> = None;
    let mut best_gain = 0.0f64;

    for &feature in candidates {
        let column = dataset.column(feature);

        let mut pairs: Vec<(f64, f64)> = samples
            .in_bag()
            .iter()
            .flatten()
            .map(|&obs| (column[obs], targets[obs]))
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_sum = 0.0f64;
        let mut left_sum_sq = 0.0f64;

        for i in 0..n_samples - 1 {
            let (value, target) = pairs[i];
            left_sum += target;
            left_sum_sq += target * target;

            let next = pairs[i + 1].0;
            if value == next {
                continue;
            }
            let Some(threshold) = boundary_threshold(value, next) else {
                continue;
            };

            let n_left = (i + 1) as f64;
            let n_right = (n_samples - i - 1) as f64;
            let right_sum = total_sum - left_sum;
            let right_sum_sq = total_sum_sq - left_sum_sq;
            let left_impurity = left_sum_sq - left_sum * left_sum / n_left;
            let right_impurity = right_sum_sq - right_sum * right_sum / n_right;
            let gain = node_impurity - left_impurity - right_impurity;

            if gain > best_gain {
                best_gain = gain;
                best = Some(GainSplit {
                    feature: FeatureIndex::new(feature),
                    threshold,
                    gain,
                    left_impurity,
                    right_impurity,
                });
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::{
        best_classification_split, best_regression_split, sum_squared_error, weighted_gini,
    };
    use crate::dataset::Dataset;
    use crate::samples::NodeSamples;

    fn all_features(n: usize) -> Vec<usize> {
        (0..n).collect()
    }

    #[test]
    fn weighted_gini_pure_is_zero() {
        assert_eq!(weighted_gini(&[10, 0]), 0.0);
    }

    #[test]
    fn weighted_gini_balanced_binary() {
        // 5+5 samples, gini 0.5, count-weighted: 10 * 0.5 = 5.
        assert!((weighted_gini(&[5, 5]) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn classification_picks_midpoint_between_classes() {
        // x = [1, 2, 3, 4], y = [0, 0, 1, 1]: the boundary at 2.5 separates
        // the classes perfectly.
        let ds = Dataset::from_rows(&[vec![1.0], vec![2.0], vec![3.0], vec![4.0]]).unwrap();
        let samples = NodeSamples::new(vec![vec![0, 1], vec![2, 3]], vec![vec![], vec![]]);
        let impurity = weighted_gini(&samples.bucket_sizes());

        let split = best_classification_split(&ds, &samples, &all_features(1), impurity)
            .expect("should find a split");
        assert_eq!(split.feature.index(), 0);
        assert!((split.threshold - 2.5).abs() < 1e-12);
        assert!(split.gain > 0.0);
        assert_eq!(split.left_impurity, 0.0);
        assert_eq!(split.right_impurity, 0.0);
    }

    #[test]
    fn constant_feature_yields_none() {
        let ds = Dataset::from_rows(&[vec![5.0], vec![5.0], vec![5.0], vec![5.0]]).unwrap();
        let samples = NodeSamples::new(vec![vec![0, 1], vec![2, 3]], vec![vec![], vec![]]);
        let impurity = weighted_gini(&samples.bucket_sizes());
        assert!(best_classification_split(&ds, &samples, &all_features(1), impurity).is_none());
    }

    #[test]
    fn mixed_label_run_defers_to_run_end() {
        // Values [1, 2, 2, 2, 3] with labels [0, 0, 1, 0, 1]: the run of 2s
        // mixes labels, so the only candidate boundaries are 1.5 and 2.5,
        // never inside the run.
        let ds = Dataset::from_rows(&[vec![1.0], vec![2.0], vec![2.0], vec![2.0], vec![3.0]])
            .unwrap();
        let samples = NodeSamples::new(vec![vec![0, 1, 3], vec![2, 4]], vec![vec![], vec![]]);
        let impurity = weighted_gini(&samples.bucket_sizes());

        let split = best_classification_split(&ds, &samples, &all_features(1), impurity)
            .expect("should find a split");
        assert!(
            (split.threshold - 1.5).abs() < 1e-12 || (split.threshold - 2.5).abs() < 1e-12,
            "threshold {} fell inside the run",
            split.threshold
        );
    }

    #[test]
    fn repeated_values_deterministic() {
        let rows: Vec<Vec<f64>> = [1.0, 1.0, 2.0, 2.0, 2.0, 7.0, 7.0, 9.0]
            .iter()
            .map(|&v| vec![v])
            .collect();
        let ds = Dataset::from_rows(&rows).unwrap();
        let samples = NodeSamples::new(
            vec![vec![0, 1, 2, 5], vec![3, 4, 6, 7]],
            vec![vec![], vec![]],
        );
        let impurity = weighted_gini(&samples.bucket_sizes());

        let a = best_classification_split(&ds, &samples, &all_features(1), impurity).unwrap();
        let b = best_classification_split(&ds, &samples, &all_features(1), impurity).unwrap();
        assert_eq!(a.threshold, b.threshold);
        assert_eq!(a.gain, b.gain);
    }

    #[test]
    fn regression_step_function() {
        // x = [1, 2, 3, 4], y = [1, 1, 9, 9]: splitting at 2.5 zeroes the
        // residual error on both sides.
        let ds = Dataset::from_rows(&[vec![1.0], vec![2.0], vec![3.0], vec![4.0]]).unwrap();
        let samples = NodeSamples::new(vec![vec![0, 1, 2, 3]], vec![vec![]]);
        let targets = [1.0, 1.0, 9.0, 9.0];
        let impurity = sum_squared_error(targets.iter().copied());

        let split =
            best_regression_split(&ds, &samples, &targets, &all_features(1), impurity)
                .expect("should find a split");
        assert!((split.threshold - 2.5).abs() < 1e-12);
        assert!(split.left_impurity.abs() < 1e-9);
        assert!(split.right_impurity.abs() < 1e-9);
        assert!((split.gain - impurity).abs() < 1e-9);
    }

    #[test]
    fn regression_constant_targets_yields_none() {
        let ds = Dataset::from_rows(&[vec![1.0], vec![2.0], vec![3.0]]).unwrap();
        let samples = NodeSamples::new(vec![vec![0, 1, 2]], vec![vec![]]);
        let targets = [4.0, 4.0, 4.0];
        let impurity = sum_squared_error(targets.iter().copied());
        assert!(
            best_regression_split(&ds, &samples, &targets, &all_features(1), impurity).is_none()
        );
    }
}
