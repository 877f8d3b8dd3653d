// Trainer: season split, design matrices, standardization, and estimator
// fitting for one target statistic.

pub mod dataset;
pub mod split;

use ndarray::{Array1, Array2};
use rayon::prelude::*;
use seasoncast_core::catalog::{EstimatorKind, TargetStat};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::features::TrainingRow;
use crate::model::scaler::Standardizer;
use crate::model::{Estimator, EstimatorParams, ModelError};
use crate::selection::FeaturePolicy;

pub use dataset::{build_design_matrix, feature_columns, DesignMatrix, MissingFeatureValue};
pub use split::{split_by_season, SeasonSplit};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrainingError {
    #[error("no training rows were built")]
    NoTrainingRows,

    #[error("{target}: no complete training rows before held-out season {season}")]
    EmptyTrainingPartition { target: TargetStat, season: i32 },

    #[error("{target}: no complete held-out rows for season {season}")]
    EmptyHeldOutPartition { target: TargetStat, season: i32 },

    #[error("standardization failed: {0}")]
    Standardization(#[source] ModelError),

    #[error("{kind}: {source}")]
    Model {
        kind: EstimatorKind,
        #[source]
        source: ModelError,
    },
}

// ---------------------------------------------------------------------------
// Prepared data
// ---------------------------------------------------------------------------

/// Everything the estimators for one target share: both partitions, the
/// standardizer fitted on the training partition, and the standardized
/// matrices. Built once per target and only read afterwards.
#[derive(Debug, Clone)]
pub struct PreparedTarget<'a> {
    pub target: TargetStat,
    pub held_out_season: i32,
    pub features: Vec<String>,
    pub train: DesignMatrix<'a>,
    pub held_out: DesignMatrix<'a>,
    pub standardizer: Standardizer,
    pub train_z: Array2<f64>,
    pub held_out_z: Array2<f64>,
}

impl PreparedTarget<'_> {
    pub fn excluded_rows(&self) -> usize {
        self.train.excluded + self.held_out.excluded
    }
}

/// Split `rows`, build both design matrices from the policy's inputs for
/// `target`, and fit the standardizer on the training partition only.
pub fn prepare<'a>(
    rows: &'a [TrainingRow],
    target: TargetStat,
    policy: &FeaturePolicy,
) -> Result<PreparedTarget<'a>, TrainingError> {
    let split = split_by_season(rows)?;
    let inputs = policy.select(target);

    let train = build_design_matrix(&split.train, target, inputs, "train");
    let held_out = build_design_matrix(&split.held_out, target, inputs, "held-out");

    if train.is_empty() {
        return Err(TrainingError::EmptyTrainingPartition {
            target,
            season: split.held_out_season,
        });
    }
    if held_out.is_empty() {
        return Err(TrainingError::EmptyHeldOutPartition {
            target,
            season: split.held_out_season,
        });
    }

    let standardizer = Standardizer::fit(train.x.view()).map_err(TrainingError::Standardization)?;
    let train_z = standardizer
        .transform(train.x.view())
        .map_err(TrainingError::Standardization)?;
    let held_out_z = standardizer
        .transform(held_out.x.view())
        .map_err(TrainingError::Standardization)?;

    info!(
        "{}: {} training rows, {} held-out rows (season {}), {} excluded",
        target,
        train.len(),
        held_out.len(),
        split.held_out_season,
        train.excluded + held_out.excluded
    );

    Ok(PreparedTarget {
        target,
        held_out_season: split.held_out_season,
        features: feature_columns(inputs),
        train,
        held_out,
        standardizer,
        train_z,
        held_out_z,
    })
}

// ---------------------------------------------------------------------------
// Trained models
// ---------------------------------------------------------------------------

/// Fitted standardizer plus estimator for one (target, estimator kind).
/// Serialized as the model artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub stat: TargetStat,
    pub features: Vec<String>,
    pub standardizer: Standardizer,
    pub estimator: Estimator,
}

impl TrainedModel {
    pub fn kind(&self) -> EstimatorKind {
        self.estimator.kind()
    }

    /// Predict from raw (unstandardized) feature rows.
    pub fn predict_raw(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        let z = self.standardizer.transform(x.view())?;
        Ok(self.estimator.predict(z.view()))
    }
}

/// Fit one estimator on the prepared training partition.
pub fn fit_model(
    prepared: &PreparedTarget<'_>,
    kind: EstimatorKind,
    params: &EstimatorParams,
) -> Result<TrainedModel, TrainingError> {
    let estimator = Estimator::fit(kind, params, prepared.train_z.view(), prepared.train.y.view())
        .map_err(|source| TrainingError::Model { kind, source })?;
    info!("{} {}: fitted", prepared.target, kind);
    Ok(TrainedModel {
        stat: prepared.target,
        features: prepared.features.clone(),
        standardizer: prepared.standardizer.clone(),
        estimator,
    })
}

/// Fit every requested kind in parallel over the same shared matrices.
/// Results come back in the order of `kinds`.
pub fn train_all(
    prepared: &PreparedTarget<'_>,
    kinds: &[EstimatorKind],
    params: &EstimatorParams,
) -> Vec<(EstimatorKind, Result<TrainedModel, TrainingError>)> {
    kinds
        .par_iter()
        .map(|&kind| (kind, fit_model(prepared, kind, params)))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::boosting::BoostingParams;
    use crate::model::forest::ForestParams;
    use crate::park::ParkFactors;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashMap;

    pub(crate) fn quick_params() -> EstimatorParams {
        EstimatorParams {
            ridge_alpha: 10.0,
            forest: ForestParams {
                n_trees: 20,
                max_depth: 5,
                ..ForestParams::default()
            },
            boosting: BoostingParams {
                rounds: 60,
                learning_rate: 0.1,
                max_depth: 3,
                ..BoostingParams::default()
            },
        }
    }

    /// Rows for `players` over `first..last` current seasons. Inputs are
    /// seeded noise; next-season HR is `100 * ISO + 5`.
    pub(crate) fn synthetic_rows(players: usize, first: i32, last: i32) -> Vec<TrainingRow> {
        let policy = FeaturePolicy::canonical();
        let inputs = policy.select(TargetStat::Hr).to_vec();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut rows = Vec::new();
        for p in 0..players {
            for season in first..last {
                let current: HashMap<String, Option<f64>> = inputs
                    .iter()
                    .map(|name| (name.clone(), Some(rng.gen_range(0.0..1.0))))
                    .collect();
                let iso = current["ISO"].unwrap_or(0.0);
                let next = HashMap::from([("HR".to_string(), Some(100.0 * iso + 5.0))]);
                rows.push(TrainingRow {
                    player: format!("Player {p}"),
                    current_season: season,
                    next_season: season + 1,
                    current_team: "NYY".into(),
                    next_team: "NYY".into(),
                    current,
                    next,
                    park: Some(ParkFactors { current: 100.0, next: 100.0 }),
                });
            }
        }
        rows
    }

    #[test]
    fn standardizer_ignores_held_out_rows() {
        let rows = synthetic_rows(4, 2020, 2024);
        let policy = FeaturePolicy::canonical();
        let baseline = prepare(&rows, TargetStat::Hr, &policy).unwrap().standardizer;

        let mut perturbed = rows.clone();
        for row in perturbed.iter_mut().filter(|r| r.next_season == 2024) {
            for value in row.current.values_mut() {
                *value = value.map(|v| v * 1000.0 + 17.0);
            }
        }
        let after = prepare(&perturbed, TargetStat::Hr, &policy).unwrap().standardizer;
        assert_eq!(baseline, after);
    }

    #[test]
    fn prepare_reports_partition_sizes() {
        let rows = synthetic_rows(3, 2021, 2024);
        let prepared = prepare(&rows, TargetStat::Hr, &FeaturePolicy::canonical()).unwrap();
        assert_eq!(prepared.held_out_season, 2024);
        assert_eq!(prepared.train.len(), 6);
        assert_eq!(prepared.held_out.len(), 3);
        assert_eq!(prepared.features.len(), 12);
        assert_eq!(prepared.train_z.dim(), (6, 12));
    }

    #[test]
    fn missing_held_out_values_exclude_rows_without_failing() {
        let mut rows = synthetic_rows(3, 2021, 2024);
        if let Some(row) = rows.iter_mut().find(|r| r.next_season == 2024) {
            row.current.insert("EV".into(), None);
        }
        if let Some(row) = rows.iter_mut().find(|r| r.next_season == 2022) {
            row.next.insert("HR".into(), None);
        }
        let prepared = prepare(&rows, TargetStat::Hr, &FeaturePolicy::canonical()).unwrap();
        assert_eq!(prepared.held_out.len(), 2);
        assert_eq!(prepared.train.len(), 5);
        assert_eq!(prepared.excluded_rows(), 2);
    }

    #[test]
    fn empty_held_out_partition_is_an_error() {
        let mut rows = synthetic_rows(2, 2021, 2023);
        for row in rows.iter_mut().filter(|r| r.next_season == 2023) {
            row.park = None;
        }
        let err = prepare(&rows, TargetStat::Hr, &FeaturePolicy::canonical()).unwrap_err();
        assert_eq!(
            err,
            TrainingError::EmptyHeldOutPartition {
                target: TargetStat::Hr,
                season: 2023
            }
        );
    }

    #[test]
    fn train_all_returns_every_kind_in_order() {
        let rows = synthetic_rows(4, 2020, 2024);
        let prepared = prepare(&rows, TargetStat::Hr, &FeaturePolicy::canonical()).unwrap();
        let results = train_all(&prepared, &EstimatorKind::ALL, &quick_params());
        let kinds: Vec<_> = results.iter().map(|(k, _)| *k).collect();
        assert_eq!(kinds, EstimatorKind::ALL.to_vec());
        for (kind, result) in results {
            let model = result.unwrap();
            assert_eq!(model.kind(), kind);
            assert_eq!(model.features, prepared.features);
        }
    }

    #[test]
    fn predict_raw_matches_standardized_prediction() {
        let rows = synthetic_rows(3, 2021, 2024);
        let prepared = prepare(&rows, TargetStat::Hr, &FeaturePolicy::canonical()).unwrap();
        let model = fit_model(&prepared, EstimatorKind::Ridge, &quick_params()).unwrap();
        let raw = model.predict_raw(&prepared.held_out.x).unwrap();
        let direct = model.estimator.predict(prepared.held_out_z.view());
        for (a, b) in raw.iter().zip(direct.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }
}
