// Orchestrator: load seasons, build and enrich training rows, then train,
// evaluate, and publish every (target, estimator) pair.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use rayon::prelude::*;
use seasoncast_baseball::evaluation::{evaluate, EvalError};
use seasoncast_baseball::features::{build_training_rows, TrainingRow};
use seasoncast_baseball::model::EstimatorParams;
use seasoncast_baseball::park::{enrich, ParkFactorTable};
use seasoncast_baseball::seasons::{SeasonLoadError, SeasonSource};
use seasoncast_baseball::selection::FeaturePolicy;
use seasoncast_baseball::training::{prepare, train_all, TrainingError};
use seasoncast_core::artifacts::ArtifactStore;
use seasoncast_core::catalog::{CatalogError, EstimatorKind, TargetStat};
use seasoncast_core::config::{AttributionConfig, Config};
use seasoncast_core::db::Database;
use seasoncast_core::records::MetricsRecord;
use tracing::{info, warn};

use crate::publish::{ArtifactPublishFailure, Publisher};

// ---------------------------------------------------------------------------
// Error and outcome types
// ---------------------------------------------------------------------------

/// Run-level failure. Nothing has been trained or published.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("failed to load season records: {0}")]
    Load(#[from] SeasonLoadError),
}

/// Failure scoped to one (target, estimator) pair.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PairError {
    #[error("training failed: {0}")]
    Training(#[from] TrainingError),

    #[error("evaluation failed: {0}")]
    Evaluation(#[from] EvalError),
}

#[derive(Debug)]
pub enum PairOutcome {
    /// Every artifact was written.
    Published(MetricsRecord),
    /// Trained and evaluated, but some artifacts failed to persist.
    PartiallyPublished {
        metrics: MetricsRecord,
        failures: Vec<ArtifactPublishFailure>,
    },
    Failed(PairError),
}

impl PairOutcome {
    pub fn metrics(&self) -> Option<&MetricsRecord> {
        match self {
            PairOutcome::Published(metrics) | PairOutcome::PartiallyPublished { metrics, .. } => {
                Some(metrics)
            }
            PairOutcome::Failed(_) => None,
        }
    }

    pub fn is_published(&self) -> bool {
        matches!(self, PairOutcome::Published(_))
    }
}

/// Per-pair results of one run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Training rows built from the season records.
    pub training_rows: usize,
    /// Team codes that fell back to the sentinel park factor.
    pub unresolved_teams: BTreeSet<String>,
    pub outcomes: BTreeMap<(TargetStat, EstimatorKind), PairOutcome>,
}

impl RunReport {
    pub fn outcome(&self, stat: TargetStat, model: EstimatorKind) -> Option<&PairOutcome> {
        self.outcomes.get(&(stat, model))
    }

    pub fn published(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_published()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .values()
            .filter(|o| matches!(o, PairOutcome::Failed(_)))
            .count()
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.values().all(PairOutcome::is_published)
    }
}

/// Parse target names into statistics, dropping repeats and keeping order.
pub fn parse_targets(names: &[String]) -> Result<Vec<TargetStat>, CatalogError> {
    let mut targets = Vec::with_capacity(names.len());
    for name in names {
        let target: TargetStat = name.parse()?;
        if !targets.contains(&target) {
            targets.push(target);
        }
    }
    Ok(targets)
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline<'a> {
    source: &'a dyn SeasonSource,
    store: &'a dyn ArtifactStore,
    db: &'a Database,
    policy: FeaturePolicy,
    parks: ParkFactorTable,
    params: EstimatorParams,
    attribution: AttributionConfig,
}

impl<'a> Pipeline<'a> {
    /// Pipeline with the canonical feature policy, the reference park
    /// factors, and production estimator parameters.
    pub fn new(
        source: &'a dyn SeasonSource,
        store: &'a dyn ArtifactStore,
        db: &'a Database,
    ) -> Self {
        Self {
            source,
            store,
            db,
            policy: FeaturePolicy::canonical(),
            parks: ParkFactorTable::reference_2024(),
            params: EstimatorParams::default(),
            attribution: AttributionConfig::default(),
        }
    }

    /// Pipeline configured from `pipeline.toml`. Fails if a feature
    /// override names an unknown target.
    pub fn from_config(
        config: &Config,
        source: &'a dyn SeasonSource,
        store: &'a dyn ArtifactStore,
        db: &'a Database,
    ) -> Result<Self, CatalogError> {
        Ok(Self::new(source, store, db)
            .with_policy(FeaturePolicy::with_overrides(&config.features)?)
            .with_park_factors(ParkFactorTable::from_config(&config.park_factors))
            .with_attribution(config.attribution.clone()))
    }

    pub fn with_policy(mut self, policy: FeaturePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_park_factors(mut self, parks: ParkFactorTable) -> Self {
        self.parks = parks;
        self
    }

    pub fn with_params(mut self, params: EstimatorParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_attribution(mut self, attribution: AttributionConfig) -> Self {
        self.attribution = attribution;
        self
    }

    /// Run for the named targets. Names are validated before any data is
    /// loaded.
    pub fn run(&self, target_names: &[String]) -> Result<RunReport, PipelineError> {
        let targets = parse_targets(target_names)?;
        self.run_targets(&targets)
    }

    pub fn run_targets(&self, targets: &[TargetStat]) -> Result<RunReport, PipelineError> {
        let records = self.source.load()?;
        info!("Loaded {} season records", records.len());

        let mut rows = build_training_rows(&records, &self.policy.tracked_statistics());
        let enrichment = enrich(&mut rows, &self.parks);

        let mut report = RunReport {
            training_rows: rows.len(),
            unresolved_teams: enrichment.unresolved,
            outcomes: BTreeMap::new(),
        };

        let trained_at = Utc::now();
        for &target in targets {
            self.run_target(&rows, target, trained_at, &mut report);
        }

        info!(
            "Run finished: {} of {} pairs published, {} failed",
            report.published(),
            report.outcomes.len(),
            report.failed()
        );
        Ok(report)
    }

    fn run_target(
        &self,
        rows: &[TrainingRow],
        target: TargetStat,
        trained_at: chrono::DateTime<Utc>,
        report: &mut RunReport,
    ) {
        let prepared = match prepare(rows, target, &self.policy) {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!("{}: {}; skipping all estimators", target, e);
                for kind in EstimatorKind::ALL {
                    report
                        .outcomes
                        .insert((target, kind), PairOutcome::Failed(e.clone().into()));
                }
                return;
            }
        };

        let attribution = &self.attribution;
        let evaluated: Vec<_> = train_all(&prepared, &EstimatorKind::ALL, &self.params)
            .into_par_iter()
            .map(|(kind, fitted)| {
                let result = fitted.map_err(PairError::from).and_then(|model| {
                    let evaluation = evaluate(&model, &prepared, attribution, trained_at)?;
                    Ok((model, evaluation))
                });
                (kind, result)
            })
            .collect();

        let publisher = Publisher::new(self.store, self.db);
        for (kind, result) in evaluated {
            let outcome = match result {
                Ok((model, evaluation)) => {
                    let r2 = evaluation
                        .metrics
                        .r2
                        .map_or_else(|| "undefined".to_string(), |r2| format!("{r2:.4}"));
                    info!(
                        "{} {}: MAE {:.4}, R² {} on season {}",
                        target, kind, evaluation.metrics.mae, r2, evaluation.metrics.held_out_season
                    );
                    let failures = publisher.publish(&model, &evaluation);
                    if failures.is_empty() {
                        PairOutcome::Published(evaluation.metrics)
                    } else {
                        PairOutcome::PartiallyPublished {
                            metrics: evaluation.metrics,
                            failures,
                        }
                    }
                }
                Err(e) => {
                    warn!("{} {}: {}", target, kind, e);
                    PairOutcome::Failed(e)
                }
            };
            report.outcomes.insert((target, kind), outcome);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
