//! Configuration builder for forest training.
//!
//! An explicit config value passed into training; there is no process-wide
//! parameter store. Construct via [`ForestConfig::new`], then chain `with_*`
//! methods; dataset-dependent validation happens inside the `fit_*` calls.

use crate::dataset::Dataset;
use crate::error::ForestError;
use crate::result::ForestFit;

/// Strategy for the number of candidate features examined at each node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureSubset {
    /// All features (no subsampling).
    All,
    /// Square root of the feature count, rounded up.
    Sqrt,
    /// Log base 2 of the feature count, rounded up, at least 1.
    Log2,
    /// A fixed count.
    Fixed(usize),
}

impl FeatureSubset {
    /// Resolve to a concrete candidate count for `n_features` columns.
    pub(crate) fn resolve(self, n_features: usize) -> Result<usize, ForestError> {
        let resolved = match self {
            FeatureSubset::All => n_features,
            FeatureSubset::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            FeatureSubset::Log2 => (n_features as f64).log2().ceil().max(1.0) as usize,
            FeatureSubset::Fixed(n) => n,
        };
        if resolved == 0 || resolved > n_features {
            return Err(ForestError::InvalidFeatureSubset {
                resolved,
                n_features,
            });
        }
        Ok(resolved)
    }
}

/// Configuration for forest training.
///
/// # Defaults
///
/// | Parameter            | Default            |
/// |----------------------|--------------------|
/// | `min_parent`         | 1                  |
/// | `max_depth`          | `None` (unlimited) |
/// | `feature_subset`     | `All`              |
/// | `bootstrap_fraction` | 1.0                |
/// | `seed`               | 42                 |
#[derive(Debug, Clone)]
pub struct ForestConfig {
    n_trees: usize,
    min_parent: usize,
    max_depth: Option<usize>,
    feature_subset: FeatureSubset,
    bootstrap_fraction: f64,
    seed: u64,
}

impl ForestConfig {
    /// Create a new config with the given number of trees.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::InvalidTreeCount`] if `n_trees` is zero.
    pub fn new(n_trees: usize) -> Result<Self, ForestError> {
        if n_trees == 0 {
            return Err(ForestError::InvalidTreeCount { n_trees });
        }
        Ok(Self {
            n_trees,
            min_parent: 1,
            max_depth: None,
            feature_subset: FeatureSubset::All,
            bootstrap_fraction: 1.0,
            seed: 42,
        })
    }

    // --- Setters ---

    /// Set the minimum in-bag size a node needs to be considered for a
    /// split; nodes at or below it become leaves. Must be at least 1.
    #[must_use]
    pub fn with_min_parent(mut self, min_parent: usize) -> Self {
        self.min_parent = min_parent;
        self
    }

    /// Set the maximum tree depth.
    ///
    /// `None` grows until the stopping conditions trigger on their own;
    /// `Some(d)` requires `d >= 1` (a zero limit is rejected at fit time, so
    /// "depth 0" cannot be mistaken for "unlimited").
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the candidate-feature strategy used at each node.
    #[must_use]
    pub fn with_feature_subset(mut self, feature_subset: FeatureSubset) -> Self {
        self.feature_subset = feature_subset;
        self
    }

    /// Set the fraction of observations drawn (with replacement) per tree.
    #[must_use]
    pub fn with_bootstrap_fraction(mut self, bootstrap_fraction: f64) -> Self {
        self.bootstrap_fraction = bootstrap_fraction;
        self
    }

    /// Set the random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    // --- Getters ---

    /// Return the number of trees.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    /// Return the minimum parent size.
    #[must_use]
    pub fn min_parent(&self) -> usize {
        self.min_parent
    }

    /// Return the maximum depth limit, if any.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Return the candidate-feature strategy.
    #[must_use]
    pub fn feature_subset(&self) -> FeatureSubset {
        self.feature_subset
    }

    /// Return the bootstrap fraction.
    #[must_use]
    pub fn bootstrap_fraction(&self) -> f64 {
        self.bootstrap_fraction
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Train a classification forest on `dataset` with zero-based class
    /// labels.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`ForestError::LabelCountMismatch`] | `labels` doesn't match the dataset |
    /// | [`ForestError::InvalidMinParent`] | `min_parent` is 0 |
    /// | [`ForestError::InvalidMaxDepth`] | `max_depth` is `Some(0)` |
    /// | [`ForestError::InvalidBootstrapFraction`] | fraction outside (0.0, 1.0] |
    /// | [`ForestError::InvalidFeatureSubset`] | subset resolves outside [1, n_features] |
    pub fn fit_classification(
        &self,
        dataset: &Dataset,
        labels: &[usize],
    ) -> Result<ForestFit, ForestError> {
        crate::forest::train_classification(self, dataset, labels)
    }

    /// Train a regression forest on `dataset` with numeric targets.
    ///
    /// # Errors
    ///
    /// As [`ForestConfig::fit_classification`], with
    /// [`ForestError::TargetCountMismatch`] / [`ForestError::NonFiniteTarget`]
    /// in place of the label check.
    pub fn fit_regression(
        &self,
        dataset: &Dataset,
        targets: &[f64],
    ) -> Result<ForestFit, ForestError> {
        crate::forest::train_regression(self, dataset, targets)
    }

    /// Train an unsupervised forest on `dataset`, producing a similarity
    /// matrix alongside the trees.
    ///
    /// # Errors
    ///
    /// As [`ForestConfig::fit_classification`], minus the label check.
    pub fn fit_unsupervised(&self, dataset: &Dataset) -> Result<ForestFit, ForestError> {
        crate::forest::train_unsupervised(self, dataset)
    }
}
