//! Regression trees for the ensemble models
//!
//! Trees are grown best-first: the leaf whose split yields the largest gain
//! is expanded next, until the depth limit, the leaf budget or the minimum
//! leaf size stops growth. Split gain uses an L2 penalty on leaf values, so
//! with a zero penalty it reduces to plain variance reduction.

use crate::error::{ForecastError, Result};
use ndarray::{Array2, ArrayView1};
use rand::seq::index;
use rand::Rng;

const MIN_GAIN: f64 = 1e-12;

/// Growth limits for one tree
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: usize,
    pub max_leaves: Option<usize>,
    pub min_samples_leaf: usize,
    pub min_samples_split: usize,
    pub l2_regularization: f64,
    /// Fraction of features considered by this tree
    pub colsample: f64,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// A leaf that may still be split
#[derive(Debug)]
struct Frontier {
    node: usize,
    samples: Vec<usize>,
    depth: usize,
    split: Option<SplitCandidate>,
}

/// Binary regression tree stored as a node arena
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Fit a tree to `targets` using only the rows listed in `samples`
    ///
    /// `samples` may contain repeats, as produced by bootstrap sampling.
    pub fn fit<R: Rng + ?Sized>(
        features: &Array2<f64>,
        targets: &[f64],
        samples: &[usize],
        params: &TreeParams,
        rng: &mut R,
    ) -> Result<Self> {
        if samples.is_empty() {
            return Err(ForecastError::FitError(
                "Cannot grow a tree without samples".to_string(),
            ));
        }
        if features.nrows() != targets.len() {
            return Err(ForecastError::ValidationError(format!(
                "{} feature rows for {} targets",
                features.nrows(),
                targets.len()
            )));
        }

        let n_features = features.ncols();
        let n_selected =
            ((params.colsample * n_features as f64).round() as usize).clamp(1, n_features.max(1));
        let mut selected = index::sample(rng, n_features, n_selected).into_vec();
        selected.sort_unstable();

        let grower = Grower {
            features,
            targets,
            selected: &selected,
            params,
        };

        let mut nodes = vec![Node::Leaf {
            value: grower.leaf_value(samples),
        }];
        let mut frontier = vec![grower.frontier(0, samples.to_vec(), 0)];
        let mut leaves = 1usize;

        loop {
            if params.max_leaves.map_or(false, |max| leaves >= max) {
                break;
            }

            let best = frontier
                .iter()
                .enumerate()
                .filter_map(|(i, f)| f.split.map(|s| (i, s.gain)))
                .fold(None, |best: Option<(usize, f64)>, (i, gain)| match best {
                    Some((_, best_gain)) if best_gain >= gain => best,
                    _ => Some((i, gain)),
                });
            let Some((position, _)) = best else {
                break;
            };

            let leaf = frontier.swap_remove(position);
            let Some(split) = leaf.split else {
                break;
            };
            let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = leaf
                .samples
                .iter()
                .copied()
                .partition(|&s| features[[s, split.feature]] <= split.threshold);

            let left = nodes.len();
            nodes.push(Node::Leaf {
                value: grower.leaf_value(&left_samples),
            });
            let right = nodes.len();
            nodes.push(Node::Leaf {
                value: grower.leaf_value(&right_samples),
            });
            nodes[leaf.node] = Node::Split {
                feature: split.feature,
                threshold: split.threshold,
                left,
                right,
            };
            leaves += 1;

            frontier.push(grower.frontier(left, left_samples, leaf.depth + 1));
            frontier.push(grower.frontier(right, right_samples, leaf.depth + 1));
        }

        Ok(Self { nodes })
    }

    /// Predict the target for one feature row
    pub fn predict(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node, Node::Leaf { .. }))
            .count()
    }

    pub fn depth(&self) -> usize {
        fn depth_of(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => {
                    1 + depth_of(nodes, *left).max(depth_of(nodes, *right))
                }
            }
        }
        depth_of(&self.nodes, 0)
    }
}

struct Grower<'a> {
    features: &'a Array2<f64>,
    targets: &'a [f64],
    selected: &'a [usize],
    params: &'a TreeParams,
}

impl Grower<'_> {
    fn leaf_value(&self, samples: &[usize]) -> f64 {
        let sum: f64 = samples.iter().map(|&s| self.targets[s]).sum();
        sum / (samples.len() as f64 + self.params.l2_regularization)
    }

    fn frontier(&self, node: usize, samples: Vec<usize>, depth: usize) -> Frontier {
        let split = if depth < self.params.max_depth
            && samples.len() >= self.params.min_samples_split
            && samples.len() >= 2 * self.params.min_samples_leaf
        {
            self.best_split(&samples)
        } else {
            None
        };
        Frontier {
            node,
            samples,
            depth,
            split,
        }
    }

    fn score(&self, sum: f64, count: usize) -> f64 {
        sum * sum / (count as f64 + self.params.l2_regularization)
    }

    fn best_split(&self, samples: &[usize]) -> Option<SplitCandidate> {
        let n = samples.len();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let total: f64 = samples.iter().map(|&s| self.targets[s]).sum();
        let parent = self.score(total, n);

        let mut best: Option<SplitCandidate> = None;
        let mut order = samples.to_vec();
        for &feature in self.selected {
            order.sort_by(|&a, &b| {
                self.features[[a, feature]].total_cmp(&self.features[[b, feature]])
            });

            let mut left_sum = 0.0;
            for i in 1..n {
                left_sum += self.targets[order[i - 1]];
                let lower = self.features[[order[i - 1], feature]];
                let upper = self.features[[order[i], feature]];
                if i < min_leaf || n - i < min_leaf || lower == upper {
                    continue;
                }

                let gain = self.score(left_sum, i) + self.score(total - left_sum, n - i) - parent;
                if gain > MIN_GAIN && best.map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: lower + (upper - lower) / 2.0,
                        gain,
                    });
                }
            }
        }
        best
    }
}
