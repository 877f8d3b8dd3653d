// Regression estimators and the fitted-estimator wrapper the trainer and
// evaluator work with.

pub mod boosting;
pub mod forest;
pub mod linear;
pub mod scaler;
pub mod tree;

use ndarray::{Array1, ArrayView1, ArrayView2};
use seasoncast_core::catalog::EstimatorKind;
use serde::{Deserialize, Serialize};

use boosting::{BoostingParams, GradientBoosting};
use forest::{ForestParams, RandomForest};
use linear::LinearModel;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("cannot fit on an empty training set")]
    EmptyTrainingSet,

    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("normal equations are singular")]
    SingularSystem,
}

// ---------------------------------------------------------------------------
// Hyperparameters
// ---------------------------------------------------------------------------

/// Fixed hyperparameters for all four estimator kinds. `Default` is the
/// production configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorParams {
    pub ridge_alpha: f64,
    pub forest: ForestParams,
    pub boosting: BoostingParams,
}

impl Default for EstimatorParams {
    fn default() -> Self {
        Self {
            ridge_alpha: 10.0,
            forest: ForestParams::default(),
            boosting: BoostingParams::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Fitted estimators
// ---------------------------------------------------------------------------

/// How a fitted estimator's feature importance is obtained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Attribution<'a> {
    /// Coefficients in standardized feature space, one per input column.
    Coefficients(&'a [f64]),
    /// Only `predict` is available; importance must be estimated from
    /// prediction behavior.
    ModelAgnostic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "model")]
pub enum Estimator {
    LinearRegression(LinearModel),
    Ridge(LinearModel),
    RandomForest(RandomForest),
    #[serde(rename = "XGBoost")]
    GradientBoosting(GradientBoosting),
}

impl Estimator {
    pub fn fit(
        kind: EstimatorKind,
        params: &EstimatorParams,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
    ) -> Result<Self, ModelError> {
        Ok(match kind {
            EstimatorKind::LinearRegression => Estimator::LinearRegression(LinearModel::fit(x, y, 0.0)?),
            EstimatorKind::Ridge => Estimator::Ridge(LinearModel::fit(x, y, params.ridge_alpha)?),
            EstimatorKind::RandomForest => Estimator::RandomForest(RandomForest::fit(x, y, &params.forest)?),
            EstimatorKind::GradientBoosting => {
                Estimator::GradientBoosting(GradientBoosting::fit(x, y, &params.boosting)?)
            }
        })
    }

    pub fn kind(&self) -> EstimatorKind {
        match self {
            Estimator::LinearRegression(_) => EstimatorKind::LinearRegression,
            Estimator::Ridge(_) => EstimatorKind::Ridge,
            Estimator::RandomForest(_) => EstimatorKind::RandomForest,
            Estimator::GradientBoosting(_) => EstimatorKind::GradientBoosting,
        }
    }

    pub fn attribution(&self) -> Attribution<'_> {
        match self {
            Estimator::LinearRegression(m) | Estimator::Ridge(m) => Attribution::Coefficients(m.coefficients()),
            Estimator::RandomForest(_) | Estimator::GradientBoosting(_) => Attribution::ModelAgnostic,
        }
    }

    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        match self {
            Estimator::LinearRegression(m) | Estimator::Ridge(m) => m.predict_row(row),
            Estimator::RandomForest(m) => m.predict_row(row),
            Estimator::GradientBoosting(m) => m.predict_row(row),
        }
    }

    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Array1<f64> {
        x.rows().into_iter().map(|row| self.predict_row(row)).collect()
    }
}
