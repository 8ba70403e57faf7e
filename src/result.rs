//! Training result types.

use crate::forest::{Forest, TaskKind};
use crate::similarity::SimilarityAccumulator;

/// Metadata about a training run.
#[derive(Debug, Clone)]
pub struct TrainingMetadata {
    /// Number of trees trained.
    pub n_trees: usize,
    /// Number of features in the dataset.
    pub n_features: usize,
    /// Number of distinct classes (0 for regression and unsupervised).
    pub n_classes: usize,
    /// Number of observations in the dataset.
    pub n_observations: usize,
    /// Resolved candidate-feature count examined per node.
    pub n_candidate_features: usize,
}

/// Result of training a forest: the ensemble itself, the similarity matrix
/// for unsupervised fits, and run metadata. Per-tree OOB tallies live on the
/// trees; the pooled ratios here aggregate them with the zero-denominator
/// guard applied.
#[derive(Debug)]
pub struct ForestFit {
    forest: Forest,
    similarity: Option<SimilarityAccumulator>,
    metadata: TrainingMetadata,
}

impl ForestFit {
    pub(crate) fn new(
        forest: Forest,
        similarity: Option<SimilarityAccumulator>,
        metadata: TrainingMetadata,
    ) -> Self {
        Self {
            forest,
            similarity,
            metadata,
        }
    }

    /// Borrow the trained forest.
    #[must_use]
    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    /// Consume the fit and return the trained forest.
    #[must_use]
    pub fn into_forest(self) -> Forest {
        self.forest
    }

    /// The accumulated similarity matrix (unsupervised fits only).
    #[must_use]
    pub fn similarity(&self) -> Option<&SimilarityAccumulator> {
        self.similarity.as_ref()
    }

    /// Borrow the training metadata.
    #[must_use]
    pub fn metadata(&self) -> &TrainingMetadata {
        &self.metadata
    }

    /// Pooled OOB accuracy across all trees (classification fits), or `None`
    /// when no tree ever saw an out-of-bag observation.
    #[must_use]
    pub fn oob_accuracy(&self) -> Option<f64> {
        if self.forest.kind() != TaskKind::Classification {
            return None;
        }
        let (correct, total) = self.forest.trees().iter().fold((0, 0), |(c, t), tree| {
            let tally = tree.oob_tally();
            (c + tally.correct(), t + tally.total())
        });
        (total > 0).then(|| correct as f64 / total as f64)
    }

    /// Pooled OOB mean squared error across all trees (regression fits), or
    /// `None` when no tree ever saw an out-of-bag observation.
    #[must_use]
    pub fn oob_mean_squared_error(&self) -> Option<f64> {
        if self.forest.kind() != TaskKind::Regression {
            return None;
        }
        let (error, total) = self.forest.trees().iter().fold((0.0, 0), |(e, t), tree| {
            let tally = tree.oob_tally();
            (e + tally.squared_error(), t + tally.total())
        });
        (total > 0).then(|| error / total as f64)
    }
}
