// Output records shared by the evaluator, the publisher, and the read surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{EstimatorKind, TargetStat};

/// One held-out prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub player: String,
    pub current_season: i32,
    pub next_season: i32,
    pub current_team: String,
    pub next_team: String,
    pub actual: f64,
    pub predicted: f64,
    /// `predicted - actual`.
    pub error: f64,
    pub abs_error: f64,
}

impl PredictionRecord {
    pub fn new(
        player: &str,
        current_season: i32,
        next_season: i32,
        current_team: &str,
        next_team: &str,
        actual: f64,
        predicted: f64,
    ) -> Self {
        let error = predicted - actual;
        Self {
            player: player.to_string(),
            current_season,
            next_season,
            current_team: current_team.to_string(),
            next_team: next_team.to_string(),
            actual,
            predicted,
            error,
            abs_error: error.abs(),
        }
    }
}

/// Held-out accuracy for one (stat, estimator) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub stat: TargetStat,
    pub model: EstimatorKind,
    pub mae: f64,
    /// Coefficient of determination. `None` when the held-out target has zero
    /// variance.
    pub r2: Option<f64>,
    pub train_rows: usize,
    pub held_out_rows: usize,
    pub excluded_rows: usize,
    pub held_out_season: i32,
    pub trained_at: DateTime<Utc>,
}

impl MetricsRecord {
    pub fn r2_or_nan(&self) -> f64 {
        self.r2.unwrap_or(f64::NAN)
    }
}

/// Direction in which a feature moves a tree model's prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    #[serde(rename = "Increases prediction")]
    Increases,
    #[serde(rename = "Decreases prediction")]
    Decreases,
    #[serde(rename = "No directional effect")]
    Neutral,
}

impl Effect {
    /// Positive direction increases, negative decreases; zero and NaN are
    /// neutral.
    pub fn from_direction(direction: f64) -> Self {
        if direction > 0.0 {
            Effect::Increases
        } else if direction < 0.0 {
            Effect::Decreases
        } else {
            Effect::Neutral
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Effect::Increases => "Increases prediction",
            Effect::Decreases => "Decreases prediction",
            Effect::Neutral => "No directional effect",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientRow {
    pub feature: String,
    pub coefficient: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionRow {
    pub feature: String,
    /// Mean absolute attribution.
    pub importance: f64,
    /// Correlation between raw feature values and their attributions.
    pub direction: f64,
    pub effect: Effect,
}

/// Importance table for one pair. The schema differs by estimator family, so
/// consumers have to branch on the variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", content = "rows", rename_all = "snake_case")]
pub enum ImportanceTable {
    Coefficients(Vec<CoefficientRow>),
    Attributions(Vec<AttributionRow>),
}

impl ImportanceTable {
    pub fn len(&self) -> usize {
        match self {
            ImportanceTable::Coefficients(rows) => rows.len(),
            ImportanceTable::Attributions(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Feature names in ranked order.
    pub fn features(&self) -> Vec<&str> {
        match self {
            ImportanceTable::Coefficients(rows) => rows.iter().map(|r| r.feature.as_str()).collect(),
            ImportanceTable::Attributions(rows) => rows.iter().map(|r| r.feature.as_str()).collect(),
        }
    }
}
