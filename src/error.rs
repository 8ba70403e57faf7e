use crate::forest::TaskKind;

/// Errors from forest training and prediction.
#[derive(Debug, thiserror::Error)]
pub enum ForestError {
    /// Returned when n_trees is zero.
    #[error("n_trees must be at least 1, got {n_trees}")]
    InvalidTreeCount {
        /// The invalid n_trees value provided.
        n_trees: usize,
    },

    /// Returned when min_parent is zero.
    #[error("min_parent must be at least 1, got {min_parent}")]
    InvalidMinParent {
        /// The invalid min_parent value provided.
        min_parent: usize,
    },

    /// Returned when max_depth is zero.
    #[error("max_depth must be at least 1, got {max_depth}")]
    InvalidMaxDepth {
        /// The invalid max_depth value provided.
        max_depth: usize,
    },

    /// Returned when bootstrap_fraction is not in (0.0, 1.0].
    #[error("bootstrap_fraction must be in (0.0, 1.0], got {fraction}")]
    InvalidBootstrapFraction {
        /// The invalid bootstrap_fraction value provided.
        fraction: f64,
    },

    /// Returned when the feature subset resolves to 0 or exceeds n_features.
    #[error("feature subset resolved to {resolved}, but must be in [1, {n_features}]")]
    InvalidFeatureSubset {
        /// The resolved candidate-feature count.
        resolved: usize,
        /// The number of features in the dataset.
        n_features: usize,
    },

    /// Returned when the training dataset has zero observations.
    #[error("dataset has zero observations")]
    EmptyDataset,

    /// Returned when the training dataset has zero feature columns.
    #[error("dataset has zero feature columns")]
    ZeroFeatures,

    /// Returned when an observation has a different number of features than expected.
    #[error("observation {observation} has {got} features, expected {expected}")]
    FeatureCountMismatch {
        /// The expected number of features.
        expected: usize,
        /// The actual number of features in the observation.
        got: usize,
        /// The zero-based index of the offending observation.
        observation: usize,
    },

    /// Returned when a feature value is NaN or infinite.
    #[error("non-finite value at observation {observation}, feature {feature}")]
    NonFiniteValue {
        /// The zero-based index of the offending observation.
        observation: usize,
        /// The zero-based index of the offending feature column.
        feature: usize,
    },

    /// Returned when the label vector length does not match the dataset.
    #[error("got {n_labels} labels for {n_observations} observations")]
    LabelCountMismatch {
        /// The number of labels provided.
        n_labels: usize,
        /// The number of observations in the dataset.
        n_observations: usize,
    },

    /// Returned when the regression target vector length does not match the dataset.
    #[error("got {n_targets} targets for {n_observations} observations")]
    TargetCountMismatch {
        /// The number of targets provided.
        n_targets: usize,
        /// The number of observations in the dataset.
        n_observations: usize,
    },

    /// Returned when a regression target is NaN or infinite.
    #[error("non-finite target at observation {observation}")]
    NonFiniteTarget {
        /// The zero-based index of the offending observation.
        observation: usize,
    },

    /// Returned when a prediction input has the wrong number of features.
    #[error("prediction input has {got} features, expected {expected}")]
    PredictionFeatureMismatch {
        /// The expected number of features.
        expected: usize,
        /// The actual number of features in the prediction input.
        got: usize,
    },

    /// Returned when an operation is called on a forest of the wrong kind.
    #[error("operation requires a {expected:?} forest, got {got:?}")]
    TaskMismatch {
        /// The forest kind the operation requires.
        expected: TaskKind,
        /// The kind of the forest it was called on.
        got: TaskKind,
    },
}
