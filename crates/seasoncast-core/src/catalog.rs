// Target statistics, estimator kinds, and the names derived from them.
//
// Every table name and artifact location in the system is built here from the
// enumerated (TargetStat, EstimatorKind) pairs. User-supplied strings must be
// parsed into these enums first; nothing else produces a resource name.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("unknown target statistic `{0}` (expected one of HR, AVG, OPS, wRC+)")]
    UnknownTargetStatistic(String),

    #[error("unknown estimator `{0}` (expected one of LinearRegression, Ridge, RandomForest, XGBoost)")]
    UnknownEstimator(String),
}

/// Lowercase a name and drop separators so `Random Forest`, `random_forest`
/// and `RandomForest` compare equal.
fn normalize(name: &str) -> String {
    name.trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .flat_map(|c| c.to_lowercase())
        .collect()
}

// ---------------------------------------------------------------------------
// Target statistics
// ---------------------------------------------------------------------------

/// A next-season statistic the pipeline can project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TargetStat {
    #[serde(rename = "HR")]
    Hr,
    #[serde(rename = "AVG")]
    Avg,
    #[serde(rename = "OPS")]
    Ops,
    #[serde(rename = "wRC+")]
    WrcPlus,
}

impl TargetStat {
    pub const ALL: [TargetStat; 4] = [
        TargetStat::Hr,
        TargetStat::Avg,
        TargetStat::Ops,
        TargetStat::WrcPlus,
    ];

    /// Column name of this statistic in the raw season table.
    pub fn column(&self) -> &'static str {
        match self {
            TargetStat::Hr => "HR",
            TargetStat::Avg => "AVG",
            TargetStat::Ops => "OPS",
            TargetStat::WrcPlus => "wRC+",
        }
    }

    /// Identifier-safe key used in table names and artifact locations.
    pub fn key(&self) -> &'static str {
        match self {
            TargetStat::Hr => "hr",
            TargetStat::Avg => "avg",
            TargetStat::Ops => "ops",
            TargetStat::WrcPlus => "wrc_plus",
        }
    }
}

impl fmt::Display for TargetStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for TargetStat {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "hr" => Ok(TargetStat::Hr),
            "avg" | "ba" => Ok(TargetStat::Avg),
            "ops" => Ok(TargetStat::Ops),
            "wrc+" | "wrcplus" => Ok(TargetStat::WrcPlus),
            _ => Err(CatalogError::UnknownTargetStatistic(s.trim().to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Estimator kinds
// ---------------------------------------------------------------------------

/// The four regression estimators trained for every target statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EstimatorKind {
    LinearRegression,
    Ridge,
    RandomForest,
    /// Gradient-boosted trees. Published under the name `XGBoost`, which is
    /// what the read surface and dashboard expect.
    #[serde(rename = "XGBoost")]
    GradientBoosting,
}

impl EstimatorKind {
    pub const ALL: [EstimatorKind; 4] = [
        EstimatorKind::LinearRegression,
        EstimatorKind::Ridge,
        EstimatorKind::RandomForest,
        EstimatorKind::GradientBoosting,
    ];

    /// Display name on the read surface.
    pub fn name(&self) -> &'static str {
        match self {
            EstimatorKind::LinearRegression => "LinearRegression",
            EstimatorKind::Ridge => "Ridge",
            EstimatorKind::RandomForest => "RandomForest",
            EstimatorKind::GradientBoosting => "XGBoost",
        }
    }

    /// Lowercase key used in table names and artifact locations.
    pub fn key(&self) -> &'static str {
        match self {
            EstimatorKind::LinearRegression => "linearregression",
            EstimatorKind::Ridge => "ridge",
            EstimatorKind::RandomForest => "randomforest",
            EstimatorKind::GradientBoosting => "xgboost",
        }
    }
}

impl fmt::Display for EstimatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EstimatorKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "linearregression" | "linear" | "ols" => Ok(EstimatorKind::LinearRegression),
            "ridge" | "ridgeregression" => Ok(EstimatorKind::Ridge),
            "randomforest" => Ok(EstimatorKind::RandomForest),
            "xgboost" | "gradientboosting" => Ok(EstimatorKind::GradientBoosting),
            _ => Err(CatalogError::UnknownEstimator(s.trim().to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Artifact and table naming
// ---------------------------------------------------------------------------

/// The kinds of artifact published for each (stat, estimator) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactKind {
    Model,
    Metrics,
    Importance,
    Predictions,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArtifactKind::Model => "model",
            ArtifactKind::Metrics => "metrics",
            ArtifactKind::Importance => "importance",
            ArtifactKind::Predictions => "predictions",
        };
        f.write_str(s)
    }
}

/// Per-pair tables in the queryable store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Predictions,
    Importance,
}

impl TableKind {
    fn suffix(&self) -> &'static str {
        match self {
            TableKind::Predictions => "predictions",
            TableKind::Importance => "importance",
        }
    }
}

/// Table name for a pair: `<stat_key>_<model_key>_<suffix>`, e.g.
/// `wrc_plus_xgboost_predictions`.
pub fn table_name(stat: TargetStat, model: EstimatorKind, table: TableKind) -> String {
    format!("{}_{}_{}", stat.key(), model.key(), table.suffix())
}

/// Location of a pair's artifact relative to the artifact store root.
pub fn artifact_location(stat: TargetStat, model: EstimatorKind, artifact: ArtifactKind) -> String {
    let stem = format!("{}_{}", stat.key(), model.key());
    match artifact {
        ArtifactKind::Model => format!("models/{stem}.json"),
        ArtifactKind::Metrics => format!("metrics/{stem}.json"),
        ArtifactKind::Importance => format!("importance/{stem}.json"),
        ArtifactKind::Predictions => format!("predictions/{stem}.csv"),
    }
}

/// Every (stat, estimator) pair the read surface may ask for.
pub fn available_combinations() -> Vec<(TargetStat, EstimatorKind)> {
    TargetStat::ALL
        .iter()
        .flat_map(|&stat| EstimatorKind::ALL.iter().map(move |&model| (stat, model)))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_stat_parses_case_insensitively() {
        assert_eq!("HR".parse::<TargetStat>().unwrap(), TargetStat::Hr);
        assert_eq!("avg".parse::<TargetStat>().unwrap(), TargetStat::Avg);
        assert_eq!(" Ops ".parse::<TargetStat>().unwrap(), TargetStat::Ops);
        assert_eq!("wRC+".parse::<TargetStat>().unwrap(), TargetStat::WrcPlus);
        assert_eq!("wrc_plus".parse::<TargetStat>().unwrap(), TargetStat::WrcPlus);
    }

    #[test]
    fn unknown_target_statistic_is_rejected() {
        let err = "FOO".parse::<TargetStat>().unwrap_err();
        assert_eq!(err, CatalogError::UnknownTargetStatistic("FOO".into()));
    }

    #[test]
    fn estimator_parses_names_and_keys() {
        assert_eq!(
            "XGBoost".parse::<EstimatorKind>().unwrap(),
            EstimatorKind::GradientBoosting
        );
        assert_eq!(
            "Random Forest".parse::<EstimatorKind>().unwrap(),
            EstimatorKind::RandomForest
        );
        assert_eq!(
            "linearregression".parse::<EstimatorKind>().unwrap(),
            EstimatorKind::LinearRegression
        );
        assert!("svm".parse::<EstimatorKind>().is_err());
    }

    #[test]
    fn table_names_follow_read_surface_contract() {
        assert_eq!(
            table_name(TargetStat::Hr, EstimatorKind::GradientBoosting, TableKind::Predictions),
            "hr_xgboost_predictions"
        );
        assert_eq!(
            table_name(TargetStat::WrcPlus, EstimatorKind::Ridge, TableKind::Importance),
            "wrc_plus_ridge_importance"
        );
    }

    #[test]
    fn table_names_are_identifier_safe() {
        for (stat, model) in available_combinations() {
            let name = table_name(stat, model, TableKind::Predictions);
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "unsafe table name {name}"
            );
        }
    }

    #[test]
    fn artifact_locations_are_distinct_per_pair() {
        let mut seen = std::collections::HashSet::new();
        for (stat, model) in available_combinations() {
            assert!(seen.insert(artifact_location(stat, model, ArtifactKind::Model)));
        }
        assert_eq!(seen.len(), 16);
        assert_eq!(
            artifact_location(TargetStat::Avg, EstimatorKind::LinearRegression, ArtifactKind::Metrics),
            "metrics/avg_linearregression.json"
        );
    }

    #[test]
    fn display_uses_published_names() {
        assert_eq!(TargetStat::WrcPlus.to_string(), "wRC+");
        assert_eq!(EstimatorKind::GradientBoosting.to_string(), "XGBoost");
    }
}
