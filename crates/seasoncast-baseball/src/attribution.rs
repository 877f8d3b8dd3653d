// Model-agnostic feature attribution by sampled permutation Shapley values.
//
// For each explained row, a random feature ordering and a random background
// row are drawn; features are switched from the background value to the
// row's value one at a time in that order, and each switch's change in the
// prediction is credited to the switched feature. Only `predict` is used.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::seq::{index, SliceRandom};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use seasoncast_core::config::AttributionConfig;
use seasoncast_core::records::{AttributionRow, Effect};

use crate::model::Estimator;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AttributionError {
    #[error("no rows to explain")]
    NoRows,

    #[error("attribution for feature `{0}` is not finite")]
    NonFinite(String),

    #[error("expected {expected} feature names, found {found}")]
    FeatureCount { expected: usize, found: usize },
}

/// Deterministic subsample of at most `max_rows` row indices out of `n`,
/// in ascending order.
pub fn sample_rows(n: usize, max_rows: usize, seed: u64) -> Vec<usize> {
    if n <= max_rows {
        return (0..n).collect();
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut rows = index::sample(&mut rng, n, max_rows).into_vec();
    rows.sort_unstable();
    rows
}

/// Attribution matrix (`rows.len()` x features) for the rows of `x` listed in
/// `rows`, using all of `background` as the reference distribution. Row `k`
/// is seeded with `seed + rows[k]`.
pub fn shapley_values(
    estimator: &Estimator,
    x: ArrayView2<'_, f64>,
    rows: &[usize],
    background: ArrayView2<'_, f64>,
    permutations: usize,
    seed: u64,
) -> Array2<f64> {
    let p = x.ncols();
    let permutations = permutations.max(1);
    let mut values = Array2::<f64>::zeros((rows.len(), p));
    if background.nrows() == 0 || p == 0 {
        return values;
    }

    let per_row: Vec<Vec<f64>> = rows
        .par_iter()
        .map(|&r| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(r as u64));
            let instance = x.row(r);
            let mut phi = vec![0.0; p];
            let mut order: Vec<usize> = (0..p).collect();

            for _ in 0..permutations {
                order.shuffle(&mut rng);
                let b = rng.gen_range(0..background.nrows());
                let mut coalition: Array1<f64> = background.row(b).to_owned();
                let mut before = estimator.predict_row(coalition.view());
                for &f in &order {
                    coalition[f] = instance[f];
                    let after = estimator.predict_row(coalition.view());
                    phi[f] += after - before;
                    before = after;
                }
            }

            phi.iter_mut().for_each(|v| *v /= permutations as f64);
            phi
        })
        .collect();

    for (mut out, phi) in values.axis_iter_mut(Axis(0)).zip(per_row) {
        out.assign(&Array1::from(phi));
    }
    values
}

/// Pearson correlation, or `None` when either side has zero variance.
pub fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    let n = a.len().min(b.len());
    if n < 2 {
        return None;
    }
    let mean_a = a[..n].iter().sum::<f64>() / n as f64;
    let mean_b = b[..n].iter().sum::<f64>() / n as f64;
    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for i in 0..n {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    let denom = (var_a * var_b).sqrt();
    if denom <= f64::EPSILON || !denom.is_finite() {
        return None;
    }
    Some(cov / denom)
}

/// Importance rows for a model-agnostic estimator.
///
/// `z` is the standardized training matrix the estimator was fitted on and
/// `raw` the same rows unstandardized. Importance is mean |attribution|;
/// direction is the correlation between raw values and attributions, 0.0
/// when undefined. Rows come back sorted by descending importance.
pub fn attribution_importance(
    estimator: &Estimator,
    z: ArrayView2<'_, f64>,
    raw: ArrayView2<'_, f64>,
    features: &[String],
    config: &AttributionConfig,
) -> Result<Vec<AttributionRow>, AttributionError> {
    if features.len() != z.ncols() {
        return Err(AttributionError::FeatureCount {
            expected: z.ncols(),
            found: features.len(),
        });
    }
    if z.nrows() == 0 {
        return Err(AttributionError::NoRows);
    }

    let rows = sample_rows(z.nrows(), config.max_rows.max(1), config.seed);
    let phi = shapley_values(estimator, z, &rows, z, config.permutations, config.seed);

    let mut out = Vec::with_capacity(features.len());
    for (j, feature) in features.iter().enumerate() {
        let column: Vec<f64> = phi.column(j).to_vec();
        let importance = column.iter().map(|v| v.abs()).sum::<f64>() / column.len() as f64;
        if !importance.is_finite() {
            return Err(AttributionError::NonFinite(feature.clone()));
        }
        let raw_values: Vec<f64> = rows.iter().map(|&r| raw[[r, j]]).collect();
        let direction = pearson(&raw_values, &column).unwrap_or(0.0);
        out.push(AttributionRow {
            feature: feature.clone(),
            importance,
            direction,
            effect: Effect::from_direction(direction),
        });
    }

    out.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    Ok(out)
}
