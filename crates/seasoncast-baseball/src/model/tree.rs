// CART regression tree shared by the forest and the boosted ensemble.
//
// Nodes live in a flat arena so a fitted tree serializes without recursion.
// Splits are found per feature by sorting the node's rows once and scanning
// prefix sums of the target.

use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// L2 penalty on leaf values; leaf value is `sum / (count + lambda)`.
    pub lambda: f64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
            lambda: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        value: f64,
    },
    /// Rows with `x[feature] <= threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Copy)]
struct Split {
    feature: usize,
    threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Fit on the rows of `x` listed in `rows` (duplicates allowed), using
    /// only the columns in `features`. `y` is indexed by row of `x`.
    pub fn fit(
        x: ArrayView2<'_, f64>,
        y: &[f64],
        rows: Vec<usize>,
        features: &[usize],
        params: &TreeParams,
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(x, y, rows, features, params, 0);
        tree
    }

    fn grow(
        &mut self,
        x: ArrayView2<'_, f64>,
        y: &[f64],
        rows: Vec<usize>,
        features: &[usize],
        params: &TreeParams,
        depth: usize,
    ) -> usize {
        let sum: f64 = rows.iter().map(|&r| y[r]).sum();
        let value = if rows.is_empty() {
            0.0
        } else {
            sum / (rows.len() as f64 + params.lambda)
        };

        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf { value });

        if depth >= params.max_depth || rows.len() < params.min_samples_split.max(2) {
            return idx;
        }
        let Some(split) = best_split(x, y, &rows, features, params, sum) else {
            return idx;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&r| x[[r, split.feature]] <= split.threshold);

        let left = self.grow(x, y, left_rows, features, params, depth + 1);
        let right = self.grow(x, y, right_rows, features, params, depth + 1);
        self.nodes[idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        idx
    }

    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match nodes.get(idx) {
                Some(Node::Split { left, right, .. }) => 1 + walk(nodes, *left).max(walk(nodes, *right)),
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }
}

/// Best split by the score `sum_l^2 / (n_l + lambda) + sum_r^2 / (n_r + lambda)`,
/// which for `lambda = 0` is equivalent to maximal squared-error reduction.
fn best_split(
    x: ArrayView2<'_, f64>,
    y: &[f64],
    rows: &[usize],
    features: &[usize],
    params: &TreeParams,
    sum: f64,
) -> Option<Split> {
    let n = rows.len();
    let min_leaf = params.min_samples_leaf.max(1);
    let parent = sum * sum / (n as f64 + params.lambda);
    let tolerance = 1e-10 * (1.0 + parent.abs());

    let mut best: Option<Split> = None;
    let mut best_score = parent + tolerance;
    let mut ordered: Vec<(f64, f64)> = Vec::with_capacity(n);

    for &feature in features {
        ordered.clear();
        ordered.extend(rows.iter().map(|&r| (x[[r, feature]], y[r])));
        ordered.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_sum = 0.0;
        for k in 0..n - 1 {
            left_sum += ordered[k].1;
            let n_left = k + 1;
            let n_right = n - n_left;
            if n_left < min_leaf || n_right < min_leaf || ordered[k].0 == ordered[k + 1].0 {
                continue;
            }
            let right_sum = sum - left_sum;
            let score = left_sum * left_sum / (n_left as f64 + params.lambda)
                + right_sum * right_sum / (n_right as f64 + params.lambda);
            if score > best_score {
                best_score = score;
                best = Some(Split {
                    feature,
                    threshold: threshold_between(ordered[k].0, ordered[k + 1].0),
                });
            }
        }
    }

    best
}

/// Threshold separating `lower` (goes left) from `upper` (goes right). The
/// midpoint can round onto `upper` for adjacent floats; `lower` is used then.
fn threshold_between(lower: f64, upper: f64) -> f64 {
    let mid = 0.5 * (lower + upper);
    if lower <= mid && mid < upper {
        mid
    } else {
        lower
    }
}
