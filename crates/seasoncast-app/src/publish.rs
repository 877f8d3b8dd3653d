// Artifact publisher: writes a pair's model, metrics, importance, and
// predictions to the artifact store and the queryable store.

use seasoncast_baseball::evaluation::Evaluation;
use seasoncast_baseball::training::TrainedModel;
use seasoncast_core::artifacts::{ArtifactError, ArtifactStore};
use seasoncast_core::catalog::{artifact_location, ArtifactKind, EstimatorKind, TargetStat};
use seasoncast_core::db::Database;
use seasoncast_core::records::PredictionRecord;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Store(#[from] ArtifactError),

    #[error("database write failed: {0:#}")]
    Database(#[from] anyhow::Error),
}

/// Where an artifact is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// The filesystem artifact store.
    Store,
    /// The queryable SQLite store.
    Database,
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Destination::Store => write!(f, "artifact store"),
            Destination::Database => write!(f, "database"),
        }
    }
}

/// One write of one artifact of one pair could not be persisted.
#[derive(Debug, thiserror::Error)]
#[error("failed to publish {artifact} for {stat} {model} to the {destination}: {source}")]
pub struct ArtifactPublishFailure {
    pub artifact: ArtifactKind,
    pub destination: Destination,
    pub stat: TargetStat,
    pub model: EstimatorKind,
    #[source]
    pub source: PublishError,
}

pub struct Publisher<'a> {
    store: &'a dyn ArtifactStore,
    db: &'a Database,
}

fn predictions_csv(rows: &[PredictionRecord]) -> Result<Vec<u8>, PublishError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| PublishError::Csv(e.into_error().into()))
}

impl<'a> Publisher<'a> {
    pub fn new(store: &'a dyn ArtifactStore, db: &'a Database) -> Self {
        Self { store, db }
    }

    fn write_json<T: serde::Serialize>(&self, location: &str, value: &T) -> Result<(), PublishError> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.store.write(location, &bytes)?;
        Ok(())
    }

    /// Every write an artifact needs, each attempted on its own.
    fn publish_one(
        &self,
        artifact: ArtifactKind,
        model: &TrainedModel,
        eval: &Evaluation,
    ) -> Vec<(Destination, Result<(), PublishError>)> {
        let (stat, kind) = (model.stat, model.kind());
        let location = artifact_location(stat, kind, artifact);
        match artifact {
            ArtifactKind::Model => vec![(Destination::Store, self.write_json(&location, model))],
            ArtifactKind::Metrics => vec![
                (Destination::Store, self.write_json(&location, &eval.metrics)),
                (
                    Destination::Database,
                    self.db.upsert_metrics(&eval.metrics).map_err(PublishError::from),
                ),
            ],
            ArtifactKind::Importance => vec![
                (Destination::Store, self.write_json(&location, &eval.importance)),
                (
                    Destination::Database,
                    self.db
                        .replace_importance(stat, kind, &eval.importance)
                        .map_err(PublishError::from),
                ),
            ],
            ArtifactKind::Predictions => vec![
                (
                    Destination::Database,
                    self.db
                        .replace_predictions(stat, kind, &eval.predictions)
                        .map_err(PublishError::from),
                ),
                (
                    Destination::Store,
                    predictions_csv(&eval.predictions).and_then(|bytes| {
                        self.store.write(&location, &bytes).map_err(PublishError::from)
                    }),
                ),
            ],
        }
    }

    /// Publish every artifact of a pair. A failing write does not stop the
    /// remaining ones, including the other destination of the same artifact;
    /// all failures are returned.
    pub fn publish(&self, model: &TrainedModel, eval: &Evaluation) -> Vec<ArtifactPublishFailure> {
        let mut failures = Vec::new();
        for artifact in [
            ArtifactKind::Model,
            ArtifactKind::Metrics,
            ArtifactKind::Importance,
            ArtifactKind::Predictions,
        ] {
            for (destination, result) in self.publish_one(artifact, model, eval) {
                if let Err(source) = result {
                    let failure = ArtifactPublishFailure {
                        artifact,
                        destination,
                        stat: model.stat,
                        model: model.kind(),
                        source,
                    };
                    warn!("{}", failure);
                    failures.push(failure);
                }
            }
        }
        if failures.is_empty() {
            info!("{} {}: published all artifacts", model.stat, model.kind());
        }
        failures
    }
}
