//! Column-major numeric dataset, the narrow data-access interface consumed by
//! the tree builder.

use crate::error::ForestError;

/// A validated tabular numeric dataset.
///
/// Stored column-major so split evaluators can sweep one feature's values
/// contiguously. Constructed from row-major input via [`Dataset::from_rows`].
#[derive(Debug, Clone)]
pub struct Dataset {
    columns: Vec<Vec<f64>>,
    n_observations: usize,
}

impl Dataset {
    /// Build a dataset from row-major observations.
    ///
    /// `rows[observation][feature]`: every row must have the same length and
    /// every value must be finite.
    ///
    /// # Errors
    ///
    /// | Variant                               | When                             |
    /// |---------------------------------------|----------------------------------|
    /// | [`ForestError::EmptyDataset`]         | `rows` is empty                  |
    /// | [`ForestError::ZeroFeatures`]         | rows have zero feature columns   |
    /// | [`ForestError::FeatureCountMismatch`] | rows have inconsistent lengths   |
    /// | [`ForestError::NonFiniteValue`]       | any value is NaN or infinite     |
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, ForestError> {
        if rows.is_empty() {
            return Err(ForestError::EmptyDataset);
        }
        let n_observations = rows.len();
        let n_features = rows[0].len();
        if n_features == 0 {
            return Err(ForestError::ZeroFeatures);
        }

        for (observation, row) in rows.iter().enumerate() {
            if row.len() != n_features {
                return Err(ForestError::FeatureCountMismatch {
                    expected: n_features,
                    got: row.len(),
                    observation,
                });
            }
            for (feature, &val) in row.iter().enumerate() {
                if !val.is_finite() {
                    return Err(ForestError::NonFiniteValue {
                        observation,
                        feature,
                    });
                }
            }
        }

        let columns: Vec<Vec<f64>> = (0..n_features)
            .map(|feature| rows.iter().map(|row| row[feature]).collect())
            .collect();

        Ok(Self {
            columns,
            n_observations,
        })
    }

    /// Return the number of observations.
    #[must_use]
    pub fn n_observations(&self) -> usize {
        self.n_observations
    }

    /// Return the number of feature columns.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    /// Return one feature value.
    ///
    /// # Panics
    ///
    /// Panics if `observation` or `feature` is out of range.
    #[must_use]
    pub fn value(&self, observation: usize, feature: usize) -> f64 {
        self.columns[feature][observation]
    }

    /// Borrow one feature column, indexed by observation.
    pub(crate) fn column(&self, feature: usize) -> &[f64] {
        &self.columns[feature]
    }
}
