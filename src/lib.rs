//! Packed random forests over tabular numeric data: classification,
//! regression, and unsupervised structure discovery.
//!
//! Trees are stored as flat node arenas with integer child links and grown
//! iteratively from a pending-node work list: no recursion, no pointer
//! chasing. Split search streams per-class counts (Gini), running target
//! sums (MSE), or two-mean pooled deviations (unsupervised) in a single
//! left-to-right sweep per feature. Training parallelizes one tree per rayon
//! task with out-of-bag accounting per tree, and unsupervised forests
//! accumulate a pairwise leaf co-occurrence similarity matrix.

mod bootstrap;
mod config;
mod dataset;
mod error;
mod forest;
mod node;
mod oob;
mod result;
mod samples;
mod similarity;
mod split;
mod tree;
mod two_means;

pub use config::{FeatureSubset, ForestConfig};
pub use dataset::Dataset;
pub use error::ForestError;
pub use forest::{Forest, TaskKind};
pub use node::{FeatureIndex, LeafValue, Node, NodeIndex};
pub use oob::OobTally;
pub use result::{ForestFit, TrainingMetadata};
pub use similarity::SimilarityAccumulator;
pub use tree::{LeafRecord, Tree};
