// Held-out evaluation and feature importance for a fitted model.

use chrono::{DateTime, Utc};
use seasoncast_core::config::AttributionConfig;
use seasoncast_core::records::{
    CoefficientRow, ImportanceTable, MetricsRecord, PredictionRecord,
};
use tracing::warn;

use crate::attribution::{attribution_importance, AttributionError};
use crate::model::Attribution;
use crate::training::{PreparedTarget, TrainedModel};

/// The held-out target has zero variance, so R² is undefined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("held-out target has zero variance")]
pub struct DegenerateTargetVariance;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("held-out partition is empty")]
    EmptyHeldOut,

    #[error("feature attribution failed: {0}")]
    Attribution(#[from] AttributionError),
}

/// Mean of |predicted - actual|. Zero for empty input.
pub fn mean_absolute_error(predicted: &[f64], actual: &[f64]) -> f64 {
    let n = predicted.len().min(actual.len());
    if n == 0 {
        return 0.0;
    }
    predicted
        .iter()
        .zip(actual)
        .map(|(p, a)| (p - a).abs())
        .sum::<f64>()
        / n as f64
}

/// `1 - SS_res / SS_tot` around the mean of `actual`.
pub fn r_squared(predicted: &[f64], actual: &[f64]) -> Result<f64, DegenerateTargetVariance> {
    let n = predicted.len().min(actual.len());
    if n == 0 {
        return Err(DegenerateTargetVariance);
    }
    let mean = actual[..n].iter().sum::<f64>() / n as f64;
    let ss_tot: f64 = actual[..n].iter().map(|a| (a - mean).powi(2)).sum();
    if ss_tot <= f64::EPSILON * n as f64 * mean.abs().max(1.0) {
        return Err(DegenerateTargetVariance);
    }
    let ss_res: f64 = predicted
        .iter()
        .zip(actual)
        .map(|(p, a)| (a - p).powi(2))
        .sum();
    Ok(1.0 - ss_res / ss_tot)
}

/// Importance table for a fitted model, dispatched on its capability tag.
/// Coefficients are sorted by descending magnitude; attributions by
/// descending importance.
pub fn importance_table(
    model: &TrainedModel,
    prepared: &PreparedTarget<'_>,
    config: &AttributionConfig,
) -> Result<ImportanceTable, AttributionError> {
    match model.estimator.attribution() {
        Attribution::Coefficients(coefficients) => {
            let mut rows: Vec<CoefficientRow> = model
                .features
                .iter()
                .zip(coefficients)
                .map(|(feature, &coefficient)| CoefficientRow {
                    feature: feature.clone(),
                    coefficient,
                })
                .collect();
            rows.sort_by(|a, b| b.coefficient.abs().total_cmp(&a.coefficient.abs()));
            Ok(ImportanceTable::Coefficients(rows))
        }
        Attribution::ModelAgnostic => {
            let rows = attribution_importance(
                &model.estimator,
                prepared.train_z.view(),
                prepared.train.x.view(),
                &model.features,
                config,
            )?;
            Ok(ImportanceTable::Attributions(rows))
        }
    }
}

/// Everything published for one (target, estimator) pair besides the model.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub metrics: MetricsRecord,
    pub predictions: Vec<PredictionRecord>,
    pub importance: ImportanceTable,
}

/// Score `model` on the held-out partition and compute its importance table.
pub fn evaluate(
    model: &TrainedModel,
    prepared: &PreparedTarget<'_>,
    config: &AttributionConfig,
    trained_at: DateTime<Utc>,
) -> Result<Evaluation, EvalError> {
    if prepared.held_out.is_empty() {
        return Err(EvalError::EmptyHeldOut);
    }

    let predicted = model.estimator.predict(prepared.held_out_z.view()).to_vec();
    let actual = prepared.held_out.y.to_vec();

    let mae = mean_absolute_error(&predicted, &actual);
    let r2 = match r_squared(&predicted, &actual) {
        Ok(r2) => Some(r2),
        Err(e) => {
            warn!("{} {}: {}; R² undefined", prepared.target, model.kind(), e);
            None
        }
    };

    let predictions = prepared
        .held_out
        .rows
        .iter()
        .zip(predicted.iter().zip(&actual))
        .map(|(row, (&p, &a))| {
            PredictionRecord::new(
                &row.player,
                row.current_season,
                row.next_season,
                &row.current_team,
                &row.next_team,
                a,
                p,
            )
        })
        .collect();

    let importance = importance_table(model, prepared, config)?;

    Ok(Evaluation {
        metrics: MetricsRecord {
            stat: prepared.target,
            model: model.kind(),
            mae,
            r2,
            train_rows: prepared.train.len(),
            held_out_rows: prepared.held_out.len(),
            excluded_rows: prepared.excluded_rows(),
            held_out_season: prepared.held_out_season,
            trained_at,
        },
        predictions,
        importance,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::FeaturePolicy;
    use crate::training::tests::{quick_params, synthetic_rows};
    use crate::training::{fit_model, prepare};
    use seasoncast_core::catalog::{EstimatorKind, TargetStat};
    use seasoncast_core::records::Effect;

    fn attribution() -> AttributionConfig {
        AttributionConfig {
            max_rows: 30,
            permutations: 4,
            seed: 42,
        }
    }

    #[test]
    fn perfect_predictions_have_r2_one() {
        let actual = [1.0, 2.0, 4.0, 8.0];
        assert_eq!(r_squared(&actual, &actual), Ok(1.0));
        assert_eq!(mean_absolute_error(&actual, &actual), 0.0);
    }

    #[test]
    fn constant_actuals_make_r2_undefined() {
        assert_eq!(r_squared(&[1.0, 2.0, 3.0], &[5.0, 5.0, 5.0]), Err(DegenerateTargetVariance));
        assert_eq!(r_squared(&[], &[]), Err(DegenerateTargetVariance));
    }

    #[test]
    fn mae_averages_absolute_errors() {
        assert!((mean_absolute_error(&[1.0, 5.0], &[2.0, 3.0]) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn linear_importance_recovers_the_synthetic_slope() {
        // Next-season HR is `100 * Current_ISO + 5`; nothing else matters.
        let rows = synthetic_rows(10, 2018, 2024);
        let prepared = prepare(&rows, TargetStat::Hr, &FeaturePolicy::canonical()).unwrap();
        let iso = prepared.features.iter().position(|f| f == "Current_ISO").unwrap();
        for kind in [EstimatorKind::LinearRegression, EstimatorKind::Ridge] {
            let model = fit_model(&prepared, kind, &quick_params()).unwrap();
            let ImportanceTable::Coefficients(rows) =
                importance_table(&model, &prepared, &attribution()).unwrap()
            else {
                panic!("{kind} should produce a coefficient table");
            };
            assert_eq!(rows.len(), prepared.features.len());
            assert_eq!(rows[0].feature, "Current_ISO");
            assert!(rows[0].coefficient > 0.0, "{kind}: {}", rows[0].coefficient);
            assert!(rows
                .windows(2)
                .all(|w| w[0].coefficient.abs() >= w[1].coefficient.abs()));

            if kind == EstimatorKind::LinearRegression {
                let raw_slope = rows[0].coefficient / model.standardizer.scale()[iso];
                assert!((raw_slope - 100.0).abs() < 1e-4, "slope {raw_slope}");
                assert!(rows[1..].iter().all(|r| r.coefficient.abs() < 1e-4));
            }
        }
    }

    #[test]
    fn tree_importance_uses_attribution_rows() {
        let rows = synthetic_rows(8, 2018, 2024);
        let prepared = prepare(&rows, TargetStat::Hr, &FeaturePolicy::canonical()).unwrap();
        let model = fit_model(&prepared, EstimatorKind::RandomForest, &quick_params()).unwrap();
        let table = importance_table(&model, &prepared, &attribution()).unwrap();
        let ImportanceTable::Attributions(rows) = table else {
            panic!("forest should produce an attribution table");
        };
        assert_eq!(rows.len(), prepared.features.len());
        assert_eq!(rows[0].feature, "Current_ISO");
        // Park factors are constant in the fixture.
        let park = rows.iter().find(|r| r.feature == "Next_Park_Factor").unwrap();
        assert_eq!(park.effect, Effect::Neutral);
    }

    #[test]
    fn evaluation_produces_one_prediction_per_held_out_row() {
        let rows = synthetic_rows(4, 2020, 2024);
        let prepared = prepare(&rows, TargetStat::Hr, &FeaturePolicy::canonical()).unwrap();
        let model = fit_model(&prepared, EstimatorKind::Ridge, &quick_params()).unwrap();
        let eval = evaluate(&model, &prepared, &attribution(), Utc::now()).unwrap();

        assert_eq!(eval.predictions.len(), prepared.held_out.len());
        assert!(eval.predictions.iter().all(|p| p.next_season == 2024));
        assert!(eval
            .predictions
            .iter()
            .all(|p| (p.error - (p.predicted - p.actual)).abs() < 1e-12));
        assert_eq!(eval.metrics.held_out_season, 2024);
        assert_eq!(eval.metrics.train_rows, 12);
        assert_eq!(eval.metrics.model, EstimatorKind::Ridge);
        assert!(eval.metrics.r2.is_some());
    }

    #[test]
    fn constant_held_out_target_reports_undefined_r2() {
        let mut rows = synthetic_rows(4, 2020, 2024);
        for row in rows.iter_mut().filter(|r| r.next_season == 2024) {
            row.next.insert("HR".into(), Some(30.0));
        }
        let prepared = prepare(&rows, TargetStat::Hr, &FeaturePolicy::canonical()).unwrap();
        let model = fit_model(&prepared, EstimatorKind::LinearRegression, &quick_params()).unwrap();
        let eval = evaluate(&model, &prepared, &attribution(), Utc::now()).unwrap();
        assert_eq!(eval.metrics.r2, None);
        assert!(eval.metrics.mae.is_finite());
    }
}
