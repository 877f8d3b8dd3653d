// Read surface over published predictions. Responses serialize to the JSON
// shapes the `meta`, `predictions`, and `player` subcommands print.

use seasoncast_core::catalog::{self, CatalogError, EstimatorKind, TargetStat};
use seasoncast_core::db::Database;
use seasoncast_core::records::PredictionRecord;
use serde::Serialize;

pub const DEFAULT_LIMIT: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("no predictions found for player matching `{0}`")]
    PlayerNotFound(String),

    #[error("query failed: {0:#}")]
    Database(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Combination {
    pub stat: &'static str,
    pub model: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetaResponse {
    pub available_predictions: Vec<Combination>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionsResponse {
    pub stat: &'static str,
    pub model: &'static str,
    pub count: usize,
    pub predictions: Vec<PredictionRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerEntry {
    pub stat: &'static str,
    pub model: &'static str,
    #[serde(flatten)]
    pub record: PredictionRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerResponse {
    pub player: String,
    pub count: usize,
    pub predictions: Vec<PlayerEntry>,
}

/// Every (stat, model) combination the read surface accepts.
pub fn meta() -> MetaResponse {
    MetaResponse {
        available_predictions: catalog::available_combinations()
            .into_iter()
            .map(|(stat, model)| Combination {
                stat: stat.key(),
                model: model.name(),
            })
            .collect(),
    }
}

/// First `limit` held-out predictions for a pair, ordered by player. Both
/// names are parsed against the allow-list before the store is touched.
pub fn predictions(
    db: &Database,
    stat: &str,
    model: &str,
    limit: usize,
) -> Result<PredictionsResponse, QueryError> {
    let stat: TargetStat = stat.parse()?;
    let model: EstimatorKind = model.parse()?;
    let predictions = db.predictions(stat, model, limit)?;
    Ok(PredictionsResponse {
        stat: stat.key(),
        model: model.name(),
        count: predictions.len(),
        predictions,
    })
}

/// Latest prediction per pair for players whose name contains `name`.
pub fn player(db: &Database, name: &str) -> Result<PlayerResponse, QueryError> {
    let found = db.player_predictions(name)?;
    if found.is_empty() {
        return Err(QueryError::PlayerNotFound(name.trim().to_string()));
    }
    let predictions: Vec<PlayerEntry> = found
        .into_iter()
        .map(|p| PlayerEntry {
            stat: p.stat.key(),
            model: p.model.name(),
            record: p.record,
        })
        .collect();
    Ok(PlayerResponse {
        player: name.trim().to_string(),
        count: predictions.len(),
        predictions,
    })
}
