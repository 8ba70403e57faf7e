//! Unsupervised two-mean split search.
//!
//! Partitions one feature's values to minimize the pooled within-group
//! variance, one step of k-means with k = 2. Costs are accumulated as
//! uncentered sums of squared deviations (`Σv² - (Σv)²/count`, never divided
//! by the count) so they stay additive across run lengths; callers normalize
//! only where a genuine variance is needed.
//!
//! Zero-valued entries get a dedicated bucket (sparse-data optimization):
//! they are stripped from the sorted non-zero sequence and folded into the
//! left side of every candidate boundary, contributing count but no sum. The
//! bucket only applies to non-negative features; with negative values present
//! a zero no longer sorts below every non-zero value and the plain sweep is
//! used instead.

use crate::dataset::Dataset;
use crate::node::FeatureIndex;
use crate::samples::NodeSamples;

/// The winning two-mean split of a node-level search.
#[derive(Debug, Clone)]
pub(crate) struct TwoMeanSplit {
    /// Feature used for the split.
    pub(crate) feature: FeatureIndex,
    /// Threshold: midpoint of the winning boundary, or half the smallest
    /// non-zero value for the zero/non-zero baseline split.
    pub(crate) threshold: f64,
    /// Minimized total deviation (left + right).
    pub(crate) impurity: f64,
    /// Left side's contribution, handed down to the left child.
    pub(crate) left_impurity: f64,
    /// Right side's contribution, handed down to the right child.
    pub(crate) right_impurity: f64,
}

/// Best split of one feature's values, or `None` when the feature is
/// unusable: fewer than two entries, all values identical, or a zero bucket
/// with fewer than two non-zero entries.
#[derive(Debug, Clone, Copy)]
struct FeatureSplit {
    threshold: f64,
    impurity: f64,
    left_impurity: f64,
    right_impurity: f64,
}

fn two_mean_feature_split(values: &[f64]) -> Option<FeatureSplit> {
    let n = values.len();
    if n < 2 {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    if sorted[0] == sorted[n - 1] {
        return None;
    }

    // The zero bucket requires zeros to sort below every non-zero value.
    let (n_zero, nonzero): (usize, &[f64]) = if sorted[0] >= 0.0 {
        let first_nonzero = sorted.iter().position(|&v| v != 0.0).unwrap_or(n);
        (first_nonzero, &sorted[first_nonzero..])
    } else {
        (0, &sorted[..])
    };

    let n_nonzero = nonzero.len();
    if n_nonzero < 2 && n_zero > 0 {
        return None;
    }

    let total_sum: f64 = nonzero.iter().sum();
    let total_sum_sq: f64 = nonzero.iter().map(|v| v * v).sum();

    // Baseline when zeros exist: all zeros left, every non-zero right.
    let mut best: Option<FeatureSplit> = None;
    if n_zero > 0 {
        let right = total_sum_sq - total_sum * total_sum / n_nonzero as f64;
        best = Some(FeatureSplit {
            threshold: nonzero[0] / 2.0,
            impurity: right,
            left_impurity: 0.0,
            right_impurity: right,
        });
    }

    let mut left_sum = 0.0f64;
    let mut left_sum_sq = 0.0f64;
    for i in 0..n_nonzero.saturating_sub(1) {
        let value = nonzero[i];
        left_sum += value;
        left_sum_sq += value * value;

        let next = nonzero[i + 1];
        if value == next {
            continue;
        }
        let threshold = (value + next) / 2.0;
        if threshold == next {
            continue;
        }

        // Zeros fold into the left side: count but no sum.
        let left_count = (n_zero + i + 1) as f64;
        let right_count = (n_nonzero - i - 1) as f64;
        let left_err = left_sum_sq - left_sum * left_sum / left_count;
        let right_sum = total_sum - left_sum;
        let right_err = (total_sum_sq - left_sum_sq) - right_sum * right_sum / right_count;
        let total = left_err + right_err;

        if best.is_none_or(|b| total < b.impurity) {
            best = Some(FeatureSplit {
                threshold,
                impurity: total,
                left_impurity: left_err,
                right_impurity: right_err,
            });
        }
    }

    best
}

/// Find the best two-mean split for a node: the candidate feature with the
/// strictly smallest total deviation. Returns `None` when every candidate
/// feature is unusable (forces a leaf upstream).
pub(crate) fn best_two_mean_split(
    dataset: &Dataset,
    samples: &NodeSamples,
    candidates: &[usize],
) -> Option<TwoMeanSplit> {
    let mut best: Option<TwoMeanSplit> = None;

    for &feature in candidates {
        let column = dataset.column(feature);
        let values: Vec<f64> = samples
            .in_bag()
            .iter()
            .flatten()
            .map(|&obs| column[obs])
            .collect();

        if let Some(split) = two_mean_feature_split(&values)
            && best.as_ref().is_none_or(|b| split.impurity < b.impurity)
        {
            best = Some(TwoMeanSplit {
                feature: FeatureIndex::new(feature),
                threshold: split.threshold,
                impurity: split.impurity,
                left_impurity: split.left_impurity,
                right_impurity: split.right_impurity,
            });
        }
    }

    best
}
