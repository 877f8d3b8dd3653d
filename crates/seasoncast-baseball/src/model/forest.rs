// Bootstrap-bagged regression forest.

use ndarray::{ArrayView1, ArrayView2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::tree::{RegressionTree, TreeParams};
use super::ModelError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 300,
            max_depth: 10,
            min_samples_leaf: 1,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    /// Every tree sees a bootstrap sample of the rows and considers all
    /// features at each split. Tree `t` is seeded with `seed + t`, so the fit
    /// is reproducible regardless of thread scheduling.
    pub fn fit(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>, params: &ForestParams) -> Result<Self, ModelError> {
        let n = x.nrows();
        if n == 0 {
            return Err(ModelError::EmptyTrainingSet);
        }
        if n != y.len() {
            return Err(ModelError::DimensionMismatch {
                expected: n,
                found: y.len(),
            });
        }

        let targets = y.to_vec();
        let features: Vec<usize> = (0..x.ncols()).collect();
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_leaf: params.min_samples_leaf,
            ..TreeParams::default()
        };

        let trees = (0..params.n_trees.max(1))
            .into_par_iter()
            .map(|t| {
                let mut rng = ChaCha8Rng::seed_from_u64(params.seed.wrapping_add(t as u64));
                let rows: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::fit(x, &targets, rows, &features, &tree_params)
            })
            .collect();

        Ok(Self { trees })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / self.trees.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1, Array2};

    fn small() -> ForestParams {
        ForestParams {
            n_trees: 25,
            max_depth: 6,
            ..ForestParams::default()
        }
    }

    #[test]
    fn forest_tracks_monotone_signal() {
        let x = Array2::from_shape_fn((80, 2), |(i, j)| if j == 0 { i as f64 } else { (i % 7) as f64 });
        let y: Array1<f64> = x.column(0).mapv(|v| 3.0 * v);
        let forest = RandomForest::fit(x.view(), y.view(), &small()).unwrap();
        let low = forest.predict_row(array![5.0, 0.0].view());
        let high = forest.predict_row(array![75.0, 0.0].view());
        assert!(high > low + 100.0, "low={low} high={high}");
    }

    #[test]
    fn fit_is_reproducible() {
        let x = Array2::from_shape_fn((30, 3), |(i, j)| ((i * 7 + j * 3) % 11) as f64);
        let y: Array1<f64> = x.rows().into_iter().map(|r| r.sum()).collect();
        let a = RandomForest::fit(x.view(), y.view(), &small()).unwrap();
        let b = RandomForest::fit(x.view(), y.view(), &small()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.n_trees(), 25);
    }

    #[test]
    fn empty_input_is_rejected() {
        let x = Array2::<f64>::zeros((0, 2));
        let y = Array1::<f64>::zeros(0);
        assert_eq!(
            RandomForest::fit(x.view(), y.view(), &small()).unwrap_err(),
            ModelError::EmptyTrainingSet
        );
    }
}
