// Gradient-boosted regression trees on squared error.

use ndarray::{ArrayView1, ArrayView2};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::tree::{RegressionTree, TreeParams};
use super::ModelError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoostingParams {
    pub rounds: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    /// Fraction of rows sampled (without replacement) per round.
    pub subsample: f64,
    /// Fraction of features sampled per round.
    pub colsample: f64,
    /// L2 regularization on leaf values.
    pub lambda: f64,
    pub seed: u64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            rounds: 500,
            learning_rate: 0.05,
            max_depth: 6,
            subsample: 0.8,
            colsample: 0.8,
            lambda: 1.0,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoosting {
    base_score: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
}

fn sample_count(total: usize, fraction: f64) -> usize {
    ((total as f64 * fraction.clamp(0.0, 1.0)).ceil() as usize).clamp(1, total)
}

impl GradientBoosting {
    pub fn fit(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>, params: &BoostingParams) -> Result<Self, ModelError> {
        let n = x.nrows();
        let p = x.ncols();
        if n == 0 {
            return Err(ModelError::EmptyTrainingSet);
        }
        if n != y.len() {
            return Err(ModelError::DimensionMismatch {
                expected: n,
                found: y.len(),
            });
        }

        let base_score = y.sum() / n as f64;
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            lambda: params.lambda,
            ..TreeParams::default()
        };
        let n_rows = sample_count(n, params.subsample);
        let n_cols = sample_count(p.max(1), params.colsample);

        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
        let mut predictions = vec![base_score; n];
        let mut residuals = vec![0.0; n];
        let mut trees = Vec::with_capacity(params.rounds);

        for _ in 0..params.rounds {
            for i in 0..n {
                residuals[i] = y[i] - predictions[i];
            }

            let mut rows = sample(&mut rng, n, n_rows).into_vec();
            rows.sort_unstable();
            let mut cols = if p == 0 {
                Vec::new()
            } else {
                sample(&mut rng, p, n_cols).into_vec()
            };
            cols.sort_unstable();

            let tree = RegressionTree::fit(x, &residuals, rows, &cols, &tree_params);
            // Every row advances, not only the sampled ones.
            for (i, pred) in predictions.iter_mut().enumerate() {
                *pred += params.learning_rate * tree.predict_row(x.row(i));
            }
            trees.push(tree);
        }

        Ok(Self {
            base_score,
            learning_rate: params.learning_rate,
            trees,
        })
    }

    pub fn n_rounds(&self) -> usize {
        self.trees.len()
    }

    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        self.base_score
            + self.learning_rate * self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};

    fn small() -> BoostingParams {
        BoostingParams {
            rounds: 150,
            learning_rate: 0.1,
            max_depth: 3,
            ..BoostingParams::default()
        }
    }

    fn training_error(model: &GradientBoosting, x: &Array2<f64>, y: &Array1<f64>) -> f64 {
        x.rows()
            .into_iter()
            .zip(y.iter())
            .map(|(r, t)| (model.predict_row(r) - t).abs())
            .sum::<f64>()
            / y.len() as f64
    }

    #[test]
    fn boosting_reduces_error_below_mean_baseline() {
        let x = Array2::from_shape_fn((100, 2), |(i, j)| if j == 0 { (i % 10) as f64 } else { (i / 10) as f64 });
        let y: Array1<f64> = x.rows().into_iter().map(|r| 2.0 * r[0] - r[1]).collect();
        let mean = y.mean().unwrap_or(0.0);
        let baseline = y.iter().map(|v| (v - mean).abs()).sum::<f64>() / y.len() as f64;

        let model = GradientBoosting::fit(x.view(), y.view(), &small()).unwrap();
        let err = training_error(&model, &x, &y);
        assert!(err < baseline * 0.2, "err={err} baseline={baseline}");
    }

    #[test]
    fn zero_rounds_predicts_mean() {
        let x = Array2::from_shape_fn((4, 1), |(i, _)| i as f64);
        let y = Array1::from(vec![1.0, 2.0, 3.0, 6.0]);
        let params = BoostingParams {
            rounds: 0,
            ..BoostingParams::default()
        };
        let model = GradientBoosting::fit(x.view(), y.view(), &params).unwrap();
        assert_eq!(model.predict_row(x.row(0)), 3.0);
    }

    #[test]
    fn fit_is_reproducible() {
        let x = Array2::from_shape_fn((40, 3), |(i, j)| ((i * 5 + j) % 9) as f64);
        let y: Array1<f64> = x.rows().into_iter().map(|r| r[0] * r[2]).collect();
        let a = GradientBoosting::fit(x.view(), y.view(), &small()).unwrap();
        let b = GradientBoosting::fit(x.view(), y.view(), &small()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.n_rounds(), 150);
    }

    #[test]
    fn sample_count_is_clamped() {
        assert_eq!(sample_count(10, 0.8), 8);
        assert_eq!(sample_count(3, 0.01), 1);
        assert_eq!(sample_count(5, 2.0), 5);
    }
}
