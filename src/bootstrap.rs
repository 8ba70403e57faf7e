//! Bootstrap sampling: per-tree in-bag multisets and their out-of-bag
//! complements.

use rand::Rng;

use crate::samples::NodeSamples;

/// Draw a stratified bootstrap sample for a classification tree.
///
/// Each class is sampled with replacement from its own observations,
/// `ceil(class_size * fraction)` draws per class, so class proportions carry
/// into every bootstrap. The out-of-bag complement keeps the same per-class
/// bucket layout.
pub(crate) fn stratified(
    labels: &[usize],
    n_classes: usize,
    fraction: f64,
    rng: &mut impl Rng,
) -> NodeSamples {
    let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
    for (obs, &label) in labels.iter().enumerate() {
        by_class[label].push(obs);
    }

    let mut drawn = vec![false; labels.len()];
    let mut in_bag: Vec<Vec<usize>> = Vec::with_capacity(n_classes);
    for members in &by_class {
        let mut bucket = Vec::new();
        if !members.is_empty() {
            let draws = ((members.len() as f64) * fraction).ceil() as usize;
            for _ in 0..draws {
                let obs = members[rng.gen_range(0..members.len())];
                bucket.push(obs);
                drawn[obs] = true;
            }
        }
        in_bag.push(bucket);
    }

    let out_bag: Vec<Vec<usize>> = by_class
        .iter()
        .map(|members| {
            members
                .iter()
                .copied()
                .filter(|&obs| !drawn[obs])
                .collect()
        })
        .collect();

    NodeSamples::new(in_bag, out_bag)
}

/// Draw a plain bootstrap sample (regression and unsupervised trees).
///
/// Single-bucket layout: `ceil(n * fraction)` draws with replacement, with
/// the undrawn observations as the out-of-bag set.
pub(crate) fn plain(n_observations: usize, fraction: f64, rng: &mut impl Rng) -> NodeSamples {
    let draws = ((n_observations as f64) * fraction).ceil() as usize;
    let mut drawn = vec![false; n_observations];
    let mut bucket = Vec::with_capacity(draws);
    for _ in 0..draws {
        let obs = rng.gen_range(0..n_observations);
        bucket.push(obs);
        drawn[obs] = true;
    }
    let out_bag: Vec<usize> = (0..n_observations).filter(|&obs| !drawn[obs]).collect();
    NodeSamples::new(vec![bucket], vec![out_bag])
}
