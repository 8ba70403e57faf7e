//! Packed tree construction: a flat node arena driven by a pending-node
//! work list.
//!
//! Trees are grown iteratively, not recursively. The work list starts with
//! one pending node covering the whole bootstrap sample; each pop either
//! finalizes a leaf or appends an internal node and pushes its two children
//! (left first, then right, so the right child is processed next: a
//! depth-first, right-biased traversal). Growth terminates when the list is
//! empty; the arena and leaf records are then in their final, queryable
//! state.

use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::dataset::Dataset;
use crate::error::ForestError;
use crate::node::{ChildSide, FeatureIndex, LeafValue, Node, NodeIndex};
use crate::oob::OobTally;
use crate::samples::NodeSamples;
use crate::split::{
    best_classification_split, best_regression_split, candidate_features, sum_squared_error,
    weighted_gini,
};
use crate::two_means::best_two_mean_split;

/// What a tree is trained against.
#[derive(Debug, Clone, Copy)]
pub(crate) enum TreeTask<'a> {
    Classification { n_classes: usize },
    Regression { targets: &'a [f64] },
    Unsupervised,
}

/// Growth parameters resolved by the forest driver.
#[derive(Debug, Clone)]
pub(crate) struct TreeSettings {
    /// A node with in-bag size at or below this becomes a leaf.
    pub(crate) min_parent: usize,
    /// Depth limit; `None` grows until the data runs out.
    pub(crate) max_depth: Option<usize>,
    /// Number of candidate features examined per node.
    pub(crate) n_candidates: usize,
}

/// Retained membership of one leaf, used by the similarity aggregator after
/// the tree has finished growing. The arena node stores only the prediction
/// and depth; this record keeps the full index sets.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LeafRecord {
    /// In-bag observation indices, bootstrap multiplicity retained.
    pub in_bag: Vec<usize>,
    /// Out-of-bag observation indices.
    pub out_bag: Vec<usize>,
}

/// A work-list entry: one node waiting to be resolved into a leaf or an
/// internal split. Owns its index sets until consumed; ownership then moves
/// to the two children (internal) or into a [`LeafRecord`] (leaf).
struct PendingNode {
    parent: Option<(NodeIndex, ChildSide)>,
    depth: usize,
    impurity: f64,
    samples: NodeSamples,
}

/// The resolved fate of a pending node.
enum Outcome {
    Leaf(LeafValue),
    Internal {
        feature: FeatureIndex,
        threshold: f64,
        left_impurity: f64,
        right_impurity: f64,
    },
}

/// A fully grown packed tree.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
    leaves: Vec<LeafRecord>,
    oob: OobTally,
    n_features: usize,
}

/// Decide a pending node's fate.
///
/// The three stopping conditions are checked in order, each independently
/// sufficient: impurity already at or below zero, in-bag size at or below
/// `min_parent`, depth at or beyond `max_depth`. Only if none trigger is the
/// split search consulted; a search that finds nothing also forces a leaf.
fn resolve(
    dataset: &Dataset,
    task: &TreeTask<'_>,
    node: &PendingNode,
    settings: &TreeSettings,
    rng: &mut ChaCha8Rng,
) -> Outcome {
    let stop = node.impurity <= 0.0
        || node.samples.in_bag_size() <= settings.min_parent
        || settings.max_depth.is_some_and(|d| node.depth >= d);

    if !stop {
        let candidates = candidate_features(dataset.n_features(), settings.n_candidates, rng);
        let found = match task {
            TreeTask::Classification { .. } => {
                best_classification_split(dataset, &node.samples, &candidates, node.impurity).map(
                    |s| Outcome::Internal {
                        feature: s.feature,
                        threshold: s.threshold,
                        left_impurity: s.left_impurity,
                        right_impurity: s.right_impurity,
                    },
                )
            }
            TreeTask::Regression { targets } => best_regression_split(
                dataset,
                &node.samples,
                targets,
                &candidates,
                node.impurity,
            )
            .map(|s| Outcome::Internal {
                feature: s.feature,
                threshold: s.threshold,
                left_impurity: s.left_impurity,
                right_impurity: s.right_impurity,
            }),
            TreeTask::Unsupervised => {
                best_two_mean_split(dataset, &node.samples, &candidates).map(|s| {
                    Outcome::Internal {
                        feature: s.feature,
                        threshold: s.threshold,
                        left_impurity: s.left_impurity,
                        right_impurity: s.right_impurity,
                    }
                })
            }
        };
        if let Some(outcome) = found {
            return outcome;
        }
    }

    Outcome::Leaf(leaf_value(task, &node.samples))
}

/// The prediction a node would carry as a leaf.
fn leaf_value(task: &TreeTask<'_>, samples: &NodeSamples) -> LeafValue {
    match task {
        TreeTask::Classification { .. } => {
            let majority = samples
                .bucket_sizes()
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.cmp(b.1))
                .map(|(class, _)| class)
                .unwrap_or(0);
            LeafValue::Class(majority)
        }
        TreeTask::Regression { targets } => {
            let n = samples.in_bag_size();
            let sum: f64 = samples
                .in_bag()
                .iter()
                .flatten()
                .map(|&obs| targets[obs])
                .sum();
            LeafValue::Value(sum / n as f64)
        }
        TreeTask::Unsupervised => LeafValue::Unlabeled,
    }
}

/// The impurity of the root pending node.
///
/// Children inherit the side impurities reported by the split that created
/// them; only the root needs a direct computation. Unsupervised roots have no
/// parent split to inherit from and no cheap node-level figure, so they start
/// unbounded and always reach the split search.
fn root_impurity(task: &TreeTask<'_>, samples: &NodeSamples) -> f64 {
    match task {
        TreeTask::Classification { .. } => weighted_gini(&samples.bucket_sizes()),
        TreeTask::Regression { targets } => sum_squared_error(
            samples
                .in_bag()
                .iter()
                .flatten()
                .map(|&obs| targets[obs]),
        ),
        TreeTask::Unsupervised => f64::INFINITY,
    }
}

/// Grow one tree from its bootstrap sample.
pub(crate) fn grow(
    dataset: &Dataset,
    task: &TreeTask<'_>,
    root: NodeSamples,
    settings: &TreeSettings,
    rng: &mut ChaCha8Rng,
) -> Tree {
    let mut nodes: Vec<Node> = Vec::new();
    let mut leaves: Vec<LeafRecord> = Vec::new();
    let mut oob = OobTally::default();

    let mut pending = vec![PendingNode {
        parent: None,
        depth: 0,
        impurity: root_impurity(task, &root),
        samples: root,
    }];

    while let Some(node) = pending.pop() {
        match resolve(dataset, task, &node, settings, rng) {
            Outcome::Leaf(value) => {
                let index = NodeIndex::new(nodes.len());
                nodes.push(Node::Leaf {
                    value,
                    depth: node.depth,
                });
                link_to_parent(&mut nodes, node.parent, index);
                record_oob(&mut oob, task, &node.samples, value);
                leaves.push(LeafRecord {
                    in_bag: node.samples.flatten_in_bag(),
                    out_bag: node.samples.flatten_out_bag(),
                });
            }
            Outcome::Internal {
                feature,
                threshold,
                left_impurity,
                right_impurity,
            } => {
                let index = NodeIndex::new(nodes.len());
                nodes.push(Node::Internal {
                    feature,
                    threshold,
                    depth: node.depth,
                    left: None,
                    right: None,
                });
                link_to_parent(&mut nodes, node.parent, index);

                let (left, right) = node.samples.split(dataset, feature, threshold);
                let child_depth = node.depth + 1;
                pending.push(PendingNode {
                    parent: Some((index, ChildSide::Left)),
                    depth: child_depth,
                    impurity: left_impurity,
                    samples: left,
                });
                pending.push(PendingNode {
                    parent: Some((index, ChildSide::Right)),
                    depth: child_depth,
                    impurity: right_impurity,
                    samples: right,
                });
            }
        }
    }

    debug!(
        n_nodes = nodes.len(),
        n_leaves = leaves.len(),
        "tree grown"
    );

    Tree {
        nodes,
        leaves,
        oob,
        n_features: dataset.n_features(),
    }
}

fn link_to_parent(
    nodes: &mut [Node],
    parent: Option<(NodeIndex, ChildSide)>,
    child: NodeIndex,
) {
    if let Some((parent, side)) = parent {
        nodes[parent.index()].link_child(side, child);
    }
}

/// Evaluate a finalized leaf against the node's out-of-bag observations.
fn record_oob(oob: &mut OobTally, task: &TreeTask<'_>, samples: &NodeSamples, value: LeafValue) {
    match (task, value) {
        (TreeTask::Classification { .. }, LeafValue::Class(class)) => {
            let correct = samples.out_bag()[class].len();
            oob.record_classification(correct, samples.out_bag_size());
        }
        (TreeTask::Regression { targets }, LeafValue::Value(mean)) => {
            for &obs in samples.out_bag().iter().flatten() {
                oob.record_residual(targets[obs] - mean);
            }
        }
        (TreeTask::Unsupervised, LeafValue::Unlabeled) => {}
        _ => unreachable!("leaf value kind always matches the tree task"),
    }
}

impl Tree {
    /// Borrow the packed node arena.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Total number of nodes.
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of leaf nodes.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Maximum node depth; 0 for a root-only tree.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.nodes.iter().map(Node::depth).max().unwrap_or(0)
    }

    /// Sum of all leaf depths, a cheap balance diagnostic.
    #[must_use]
    pub fn leaf_depth_sum(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.is_leaf())
            .map(|n| n.depth())
            .sum()
    }

    /// Borrow the retained leaf membership records.
    #[must_use]
    pub fn leaf_records(&self) -> &[LeafRecord] {
        &self.leaves
    }

    /// This tree's out-of-bag tally.
    #[must_use]
    pub fn oob_tally(&self) -> &OobTally {
        &self.oob
    }

    /// Descend from the root to a leaf and return its stored prediction.
    /// O(tree depth).
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::PredictionFeatureMismatch`] when
    /// `observation.len() != n_features`.
    pub fn predict(&self, observation: &[f64]) -> Result<LeafValue, ForestError> {
        if observation.len() != self.n_features {
            return Err(ForestError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: observation.len(),
            });
        }
        let mut index = 0usize;
        loop {
            match &self.nodes[index] {
                Node::Leaf { value, .. } => return Ok(*value),
                Node::Internal {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    let side = if observation[feature.index()] <= *threshold {
                        left
                    } else {
                        right
                    };
                    index = side.expect("grown internal node has both children").index();
                }
            }
        }
    }
}
