//! Forest training and ensemble prediction.
//!
//! One tree per rayon task: each tree owns a private bootstrap sample, work
//! list, and node arena, so growth needs no locking. The only logically
//! shared structure, the unsupervised similarity accumulator, is built
//! from per-thread partials and merged once the trees are done.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IntoParallelIterator, IntoParallelRefIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::bootstrap;
use crate::config::ForestConfig;
use crate::dataset::Dataset;
use crate::error::ForestError;
use crate::node::LeafValue;
use crate::result::{ForestFit, TrainingMetadata};
use crate::similarity::SimilarityAccumulator;
use crate::tree::{self, Tree, TreeSettings, TreeTask};

/// The kind of problem a forest was trained for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TaskKind {
    /// Majority-class leaves, Gini split criterion.
    Classification,
    /// Mean-target leaves, MSE split criterion.
    Regression,
    /// Unlabeled leaves, two-mean split criterion, similarity output.
    Unsupervised,
}

/// A trained ensemble of packed trees.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Forest {
    pub(crate) trees: Vec<Tree>,
    pub(crate) n_features: usize,
    pub(crate) n_classes: usize,
    pub(crate) kind: TaskKind,
}

/// Resolve and validate the per-tree growth settings.
fn resolve_settings(
    config: &ForestConfig,
    n_features: usize,
) -> Result<TreeSettings, ForestError> {
    if config.min_parent() == 0 {
        return Err(ForestError::InvalidMinParent { min_parent: 0 });
    }
    if let Some(d) = config.max_depth()
        && d == 0
    {
        return Err(ForestError::InvalidMaxDepth { max_depth: 0 });
    }
    let fraction = config.bootstrap_fraction();
    if fraction <= 0.0 || fraction > 1.0 {
        return Err(ForestError::InvalidBootstrapFraction { fraction });
    }
    let n_candidates = config.feature_subset().resolve(n_features)?;
    Ok(TreeSettings {
        min_parent: config.min_parent(),
        max_depth: config.max_depth(),
        n_candidates,
    })
}

/// Per-tree seeds drawn from a master RNG, so results are reproducible
/// regardless of how the trees interleave across threads.
fn tree_seeds(seed: u64, n_trees: usize) -> Vec<u64> {
    let mut master = ChaCha8Rng::seed_from_u64(seed);
    (0..n_trees).map(|_| master.r#gen()).collect()
}

/// Materialize one observation as a row vector for prediction.
fn dataset_row(dataset: &Dataset, observation: usize) -> Vec<f64> {
    (0..dataset.n_features())
        .map(|feature| dataset.value(observation, feature))
        .collect()
}

fn metadata(
    config: &ForestConfig,
    dataset: &Dataset,
    n_classes: usize,
    settings: &TreeSettings,
) -> TrainingMetadata {
    TrainingMetadata {
        n_trees: config.n_trees(),
        n_features: dataset.n_features(),
        n_classes,
        n_observations: dataset.n_observations(),
        n_candidate_features: settings.n_candidates,
    }
}

/// Train a classification forest.
#[instrument(skip_all, fields(n_trees = config.n_trees(), n_observations = dataset.n_observations()))]
pub(crate) fn train_classification(
    config: &ForestConfig,
    dataset: &Dataset,
    labels: &[usize],
) -> Result<ForestFit, ForestError> {
    if labels.len() != dataset.n_observations() {
        return Err(ForestError::LabelCountMismatch {
            n_labels: labels.len(),
            n_observations: dataset.n_observations(),
        });
    }
    let settings = resolve_settings(config, dataset.n_features())?;
    let n_classes = labels.iter().max().copied().unwrap_or(0) + 1;

    info!(
        n_classes,
        n_candidates = settings.n_candidates,
        "training classification forest"
    );

    let fraction = config.bootstrap_fraction();
    let trees: Vec<Tree> = tree_seeds(config.seed(), config.n_trees())
        .into_par_iter()
        .map(|seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let root = bootstrap::stratified(labels, n_classes, fraction, &mut rng);
            tree::grow(
                dataset,
                &TreeTask::Classification { n_classes },
                root,
                &settings,
                &mut rng,
            )
        })
        .collect();

    debug!(n_trees = trees.len(), "classification forest trained");

    let meta = metadata(config, dataset, n_classes, &settings);
    let forest = Forest {
        trees,
        n_features: dataset.n_features(),
        n_classes,
        kind: TaskKind::Classification,
    };
    Ok(ForestFit::new(forest, None, meta))
}

/// Train a regression forest.
#[instrument(skip_all, fields(n_trees = config.n_trees(), n_observations = dataset.n_observations()))]
pub(crate) fn train_regression(
    config: &ForestConfig,
    dataset: &Dataset,
    targets: &[f64],
) -> Result<ForestFit, ForestError> {
    if targets.len() != dataset.n_observations() {
        return Err(ForestError::TargetCountMismatch {
            n_targets: targets.len(),
            n_observations: dataset.n_observations(),
        });
    }
    for (observation, &t) in targets.iter().enumerate() {
        if !t.is_finite() {
            return Err(ForestError::NonFiniteTarget { observation });
        }
    }
    let settings = resolve_settings(config, dataset.n_features())?;

    info!(n_candidates = settings.n_candidates, "training regression forest");

    let fraction = config.bootstrap_fraction();
    let n_observations = dataset.n_observations();
    let trees: Vec<Tree> = tree_seeds(config.seed(), config.n_trees())
        .into_par_iter()
        .map(|seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let root = bootstrap::plain(n_observations, fraction, &mut rng);
            tree::grow(
                dataset,
                &TreeTask::Regression { targets },
                root,
                &settings,
                &mut rng,
            )
        })
        .collect();

    debug!(n_trees = trees.len(), "regression forest trained");

    let meta = metadata(config, dataset, 0, &settings);
    let forest = Forest {
        trees,
        n_features: dataset.n_features(),
        n_classes: 0,
        kind: TaskKind::Regression,
    };
    Ok(ForestFit::new(forest, None, meta))
}

/// Train an unsupervised forest and accumulate its similarity matrix.
#[instrument(skip_all, fields(n_trees = config.n_trees(), n_observations = dataset.n_observations()))]
pub(crate) fn train_unsupervised(
    config: &ForestConfig,
    dataset: &Dataset,
) -> Result<ForestFit, ForestError> {
    let settings = resolve_settings(config, dataset.n_features())?;

    info!(
        n_candidates = settings.n_candidates,
        "training unsupervised forest"
    );

    let fraction = config.bootstrap_fraction();
    let n_observations = dataset.n_observations();
    let trees: Vec<Tree> = tree_seeds(config.seed(), config.n_trees())
        .into_par_iter()
        .map(|seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let root = bootstrap::plain(n_observations, fraction, &mut rng);
            tree::grow(dataset, &TreeTask::Unsupervised, root, &settings, &mut rng)
        })
        .collect();

    // Per-thread accumulators merged at completion; no lock around the maps.
    let similarity = trees
        .par_iter()
        .fold(SimilarityAccumulator::new, |mut acc, tree| {
            acc.record_tree(tree);
            acc
        })
        .reduce(SimilarityAccumulator::new, |mut a, b| {
            a.merge(b);
            a
        });

    debug!(
        n_trees = trees.len(),
        n_pairs = similarity.n_pairs(),
        "unsupervised forest trained"
    );

    let meta = metadata(config, dataset, 0, &settings);
    let forest = Forest {
        trees,
        n_features: dataset.n_features(),
        n_classes: 0,
        kind: TaskKind::Unsupervised,
    };
    Ok(ForestFit::new(forest, Some(similarity), meta))
}

impl Forest {
    /// Predict the class of one observation by majority vote across trees.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::TaskMismatch`] | not a classification forest |
    /// | [`ForestError::PredictionFeatureMismatch`] | wrong feature count |
    pub fn predict_class(&self, observation: &[f64]) -> Result<usize, ForestError> {
        if self.kind != TaskKind::Classification {
            return Err(ForestError::TaskMismatch {
                expected: TaskKind::Classification,
                got: self.kind,
            });
        }
        let mut votes = vec![0usize; self.n_classes];
        for tree in &self.trees {
            match tree.predict(observation)? {
                LeafValue::Class(class) => votes[class] += 1,
                _ => unreachable!("classification trees store class leaves"),
            }
        }
        Ok(votes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.cmp(b.1))
            .map(|(class, _)| class)
            .unwrap_or(0))
    }

    /// Predict the target of one observation as the mean over trees.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::TaskMismatch`] | not a regression forest |
    /// | [`ForestError::PredictionFeatureMismatch`] | wrong feature count |
    pub fn predict_value(&self, observation: &[f64]) -> Result<f64, ForestError> {
        if self.kind != TaskKind::Regression {
            return Err(ForestError::TaskMismatch {
                expected: TaskKind::Regression,
                got: self.kind,
            });
        }
        let mut sum = 0.0;
        for tree in &self.trees {
            match tree.predict(observation)? {
                LeafValue::Value(v) => sum += v,
                _ => unreachable!("regression trees store value leaves"),
            }
        }
        Ok(sum / self.trees.len() as f64)
    }

    /// Fraction of a labeled test set predicted correctly.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::TaskMismatch`] | not a classification forest |
    /// | [`ForestError::LabelCountMismatch`] | labels don't match the dataset |
    /// | [`ForestError::PredictionFeatureMismatch`] | dataset has wrong feature count |
    pub fn test_accuracy(&self, dataset: &Dataset, labels: &[usize]) -> Result<f64, ForestError> {
        if labels.len() != dataset.n_observations() {
            return Err(ForestError::LabelCountMismatch {
                n_labels: labels.len(),
                n_observations: dataset.n_observations(),
            });
        }
        let mut correct = 0usize;
        for (obs, &label) in labels.iter().enumerate() {
            if self.predict_class(&dataset_row(dataset, obs))? == label {
                correct += 1;
            }
        }
        Ok(correct as f64 / labels.len() as f64)
    }

    /// Mean squared error over a regression test set.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::TaskMismatch`] | not a regression forest |
    /// | [`ForestError::TargetCountMismatch`] | targets don't match the dataset |
    /// | [`ForestError::PredictionFeatureMismatch`] | dataset has wrong feature count |
    pub fn test_mean_squared_error(
        &self,
        dataset: &Dataset,
        targets: &[f64],
    ) -> Result<f64, ForestError> {
        if targets.len() != dataset.n_observations() {
            return Err(ForestError::TargetCountMismatch {
                n_targets: targets.len(),
                n_observations: dataset.n_observations(),
            });
        }
        let mut sum = 0.0;
        for (obs, &target) in targets.iter().enumerate() {
            let residual = self.predict_value(&dataset_row(dataset, obs))? - target;
            sum += residual * residual;
        }
        Ok(sum / targets.len() as f64)
    }

    /// Borrow the trees of the ensemble.
    #[must_use]
    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    /// Number of trees in the ensemble.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Number of features this forest was trained on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Number of classes (0 for regression and unsupervised forests).
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// The kind of problem this forest was trained for.
    #[must_use]
    pub fn kind(&self) -> TaskKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{FeatureSubset, ForestConfig};
    use crate::dataset::Dataset;
    use crate::error::ForestError;

    /// Three well-separated classes along the first feature.
    fn separable_data() -> (Dataset, Vec<usize>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for class in 0..3usize {
            for i in 0..20 {
                rows.push(vec![class as f64 * 10.0 + i as f64 * 0.15, 0.5]);
                labels.push(class);
            }
        }
        (Dataset::from_rows(&rows).unwrap(), labels)
    }

    #[test]
    fn classification_recovers_separable_classes() {
        let (dataset, labels) = separable_data();
        let fit = ForestConfig::new(30)
            .unwrap()
            .with_seed(42)
            .fit_classification(&dataset, &labels)
            .unwrap();

        let accuracy = fit.forest().test_accuracy(&dataset, &labels).unwrap();
        assert!(accuracy > 0.95, "accuracy = {accuracy}");
    }

    #[test]
    fn oob_accuracy_high_on_separable_data() {
        let (dataset, labels) = separable_data();
        let fit = ForestConfig::new(30)
            .unwrap()
            .with_seed(42)
            .fit_classification(&dataset, &labels)
            .unwrap();

        let oob = fit.oob_accuracy().expect("bootstrap leaves OOB samples");
        assert!(oob > 0.8, "oob accuracy = {oob}");
    }

    #[test]
    fn deterministic_with_same_seed() {
        let (dataset, labels) = separable_data();
        let a = ForestConfig::new(10)
            .unwrap()
            .with_seed(99)
            .fit_classification(&dataset, &labels)
            .unwrap();
        let b = ForestConfig::new(10)
            .unwrap()
            .with_seed(99)
            .fit_classification(&dataset, &labels)
            .unwrap();

        for obs in 0..dataset.n_observations() {
            let row: Vec<f64> = (0..dataset.n_features())
                .map(|f| dataset.value(obs, f))
                .collect();
            assert_eq!(
                a.forest().predict_class(&row).unwrap(),
                b.forest().predict_class(&row).unwrap()
            );
        }
    }

    #[test]
    fn regression_fits_linear_trend() {
        let rows: Vec<Vec<f64>> = (0..50).map(|i| vec![i as f64]).collect();
        let targets: Vec<f64> = (0..50).map(|i| 2.0 * i as f64).collect();
        let dataset = Dataset::from_rows(&rows).unwrap();

        let fit = ForestConfig::new(30)
            .unwrap()
            .with_seed(42)
            .fit_regression(&dataset, &targets)
            .unwrap();

        let mse = fit
            .forest()
            .test_mean_squared_error(&dataset, &targets)
            .unwrap();
        assert!(mse < 20.0, "mse = {mse}");
    }

    #[test]
    fn unsupervised_similarity_separates_clusters() {
        // Two tight clusters: within-cluster pairs should co-occur far more
        // often than cross-cluster pairs.
        let mut rows = Vec::new();
        for i in 0..10 {
            rows.push(vec![i as f64 * 0.1, 0.0]);
        }
        for i in 0..10 {
            rows.push(vec![50.0 + i as f64 * 0.1, 1.0]);
        }
        let dataset = Dataset::from_rows(&rows).unwrap();

        let fit = ForestConfig::new(25)
            .unwrap()
            .with_seed(42)
            .with_min_parent(5)
            .fit_unsupervised(&dataset)
            .unwrap();

        let similarity = fit.similarity().expect("unsupervised fit has similarity");
        let within = similarity.count(0, 1);
        let across = similarity.count(0, 15);
        assert!(
            within > across,
            "within-cluster count {within} <= cross-cluster count {across}"
        );
        // Unsupervised trees have no labels: the OOB ratio must stay guarded.
        assert!(fit.forest().trees().iter().all(|t| t.oob_tally().accuracy().is_none()));
    }

    #[test]
    fn task_mismatch_rejected() {
        let (dataset, labels) = separable_data();
        let fit = ForestConfig::new(3)
            .unwrap()
            .fit_classification(&dataset, &labels)
            .unwrap();
        let err = fit.forest().predict_value(&[0.0, 0.0]).unwrap_err();
        assert!(matches!(err, ForestError::TaskMismatch { .. }));
    }

    #[test]
    fn label_count_mismatch_rejected() {
        let (dataset, _) = separable_data();
        let err = ForestConfig::new(3)
            .unwrap()
            .fit_classification(&dataset, &[0, 1])
            .unwrap_err();
        assert!(matches!(err, ForestError::LabelCountMismatch { .. }));
    }

    #[test]
    fn invalid_config_rejected() {
        let (dataset, labels) = separable_data();
        assert!(matches!(
            ForestConfig::new(3)
                .unwrap()
                .with_min_parent(0)
                .fit_classification(&dataset, &labels)
                .unwrap_err(),
            ForestError::InvalidMinParent { .. }
        ));
        assert!(matches!(
            ForestConfig::new(3)
                .unwrap()
                .with_max_depth(Some(0))
                .fit_classification(&dataset, &labels)
                .unwrap_err(),
            ForestError::InvalidMaxDepth { .. }
        ));
        assert!(matches!(
            ForestConfig::new(3)
                .unwrap()
                .with_bootstrap_fraction(1.5)
                .fit_classification(&dataset, &labels)
                .unwrap_err(),
            ForestError::InvalidBootstrapFraction { .. }
        ));
        assert!(matches!(
            ForestConfig::new(3)
                .unwrap()
                .with_feature_subset(FeatureSubset::Fixed(7))
                .fit_classification(&dataset, &labels)
                .unwrap_err(),
            ForestError::InvalidFeatureSubset { .. }
        ));
    }
}
