// Per-feature standardization (z-score).

use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use super::ModelError;

/// Fitted `(x - mean) / scale` transform. Scale is the population standard
/// deviation; zero-variance features get scale 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl Standardizer {
    pub fn fit(x: ArrayView2<'_, f64>) -> Result<Self, ModelError> {
        if x.nrows() == 0 {
            return Err(ModelError::EmptyTrainingSet);
        }
        let n = x.nrows() as f64;
        let mean = x.sum_axis(Axis(0)) / n;
        let scale = x
            .axis_iter(Axis(1))
            .zip(mean.iter())
            .map(|(col, &m)| {
                let var = col.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
                let sd = var.sqrt();
                if sd > f64::EPSILON && sd.is_finite() {
                    sd
                } else {
                    1.0
                }
            })
            .collect::<Array1<f64>>();
        Ok(Self { mean, scale })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn scale(&self) -> &Array1<f64> {
        &self.scale
    }

    pub fn transform(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, ModelError> {
        if x.ncols() != self.n_features() {
            return Err(ModelError::DimensionMismatch {
                expected: self.n_features(),
                found: x.ncols(),
            });
        }
        Ok((&x - &self.mean) / &self.scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn standardized_training_columns_have_zero_mean_unit_variance() {
        let x = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0]];
        let scaler = Standardizer::fit(x.view()).unwrap();
        let z = scaler.transform(x.view()).unwrap();
        for col in z.axis_iter(Axis(1)) {
            let mean = col.mean().unwrap();
            let var = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 4.0;
            assert!(mean.abs() < 1e-12);
            assert!((var - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn zero_variance_feature_gets_unit_scale() {
        let x = array![[5.0, 1.0], [5.0, 2.0], [5.0, 3.0]];
        let scaler = Standardizer::fit(x.view()).unwrap();
        assert_eq!(scaler.scale()[0], 1.0);
        let z = scaler.transform(x.view()).unwrap();
        assert!(z.column(0).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn transform_checks_width() {
        let scaler = Standardizer::fit(array![[1.0, 2.0], [3.0, 4.0]].view()).unwrap();
        let err = scaler.transform(array![[1.0]].view()).unwrap_err();
        assert_eq!(err, ModelError::DimensionMismatch { expected: 2, found: 1 });
    }

    #[test]
    fn empty_input_is_rejected() {
        let x = Array2::<f64>::zeros((0, 3));
        assert_eq!(Standardizer::fit(x.view()).unwrap_err(), ModelError::EmptyTrainingSet);
    }
}
