// SQLite persistence for metrics, importance, and prediction tables.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::catalog::{self, EstimatorKind, TableKind, TargetStat};
use crate::records::{
    AttributionRow, CoefficientRow, Effect, ImportanceTable, MetricsRecord, PredictionRecord,
};

/// A prediction found by player lookup, tagged with the pair it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerPrediction {
    pub stat: TargetStat,
    pub model: EstimatorKind,
    pub record: PredictionRecord,
}

/// SQLite-backed queryable store. Per-pair tables are named only through
/// `catalog::table_name`, so callers never splice their own strings into SQL.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure the shared
    /// tables exist. Pass `":memory:"` for an ephemeral database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS model_metrics (
                stat            TEXT NOT NULL,
                model           TEXT NOT NULL,
                mae             REAL NOT NULL,
                r2              REAL,
                train_rows      INTEGER NOT NULL,
                held_out_rows   INTEGER NOT NULL,
                excluded_rows   INTEGER NOT NULL,
                held_out_season INTEGER NOT NULL,
                trained_at      TEXT NOT NULL,
                PRIMARY KEY (stat, model)
            );
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // -- Writes --------------------------------------------------------------

    /// Insert or replace the metrics row for a pair.
    pub fn upsert_metrics(&self, metrics: &MetricsRecord) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR REPLACE INTO model_metrics
                (stat, model, mae, r2, train_rows, held_out_rows, excluded_rows, held_out_season, trained_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                metrics.stat.key(),
                metrics.model.key(),
                metrics.mae,
                metrics.r2,
                metrics.train_rows as i64,
                metrics.held_out_rows as i64,
                metrics.excluded_rows as i64,
                metrics.held_out_season,
                metrics.trained_at.to_rfc3339(),
            ],
        )
        .context("failed to upsert metrics")?;
        Ok(())
    }

    /// Replace a pair's prediction table with `rows` in one transaction.
    pub fn replace_predictions(
        &self,
        stat: TargetStat,
        model: EstimatorKind,
        rows: &[PredictionRecord],
    ) -> Result<()> {
        let table = catalog::table_name(stat, model, TableKind::Predictions);
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;

        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {table};
             CREATE TABLE {table} (
                player         TEXT NOT NULL,
                current_season INTEGER NOT NULL,
                next_season    INTEGER NOT NULL,
                current_team   TEXT NOT NULL,
                next_team      TEXT NOT NULL,
                actual         REAL NOT NULL,
                predicted      REAL NOT NULL,
                error          REAL NOT NULL,
                abs_error      REAL NOT NULL
             );"
        ))
        .with_context(|| format!("failed to recreate {table}"))?;

        {
            let mut stmt = tx
                .prepare(&format!(
                    "INSERT INTO {table}
                        (player, current_season, next_season, current_team, next_team, actual, predicted, error, abs_error)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                ))
                .with_context(|| format!("failed to prepare insert into {table}"))?;
            for row in rows {
                stmt.execute(params![
                    row.player,
                    row.current_season,
                    row.next_season,
                    row.current_team,
                    row.next_team,
                    row.actual,
                    row.predicted,
                    row.error,
                    row.abs_error,
                ])
                .with_context(|| format!("failed to insert prediction into {table}"))?;
            }
        }

        tx.commit().context("failed to commit predictions")?;
        debug!("wrote {} rows to {}", rows.len(), table);
        Ok(())
    }

    /// Replace a pair's importance table. The column layout follows the
    /// table's family: `(rank, feature, coefficient)` for coefficients,
    /// `(rank, feature, importance, direction, effect)` for attributions.
    pub fn replace_importance(
        &self,
        stat: TargetStat,
        model: EstimatorKind,
        importance: &ImportanceTable,
    ) -> Result<()> {
        let table = catalog::table_name(stat, model, TableKind::Importance);
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;

        let columns = match importance {
            ImportanceTable::Coefficients(_) => "coefficient REAL NOT NULL",
            ImportanceTable::Attributions(_) => {
                "importance REAL NOT NULL, direction REAL NOT NULL, effect TEXT NOT NULL"
            }
        };
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {table};
             CREATE TABLE {table} (rank INTEGER PRIMARY KEY, feature TEXT NOT NULL, {columns});"
        ))
        .with_context(|| format!("failed to recreate {table}"))?;

        match importance {
            ImportanceTable::Coefficients(rows) => {
                let mut stmt = tx
                    .prepare(&format!(
                        "INSERT INTO {table} (rank, feature, coefficient) VALUES (?1, ?2, ?3)"
                    ))
                    .with_context(|| format!("failed to prepare insert into {table}"))?;
                for (rank, row) in rows.iter().enumerate() {
                    stmt.execute(params![rank as i64 + 1, row.feature, row.coefficient])
                        .with_context(|| format!("failed to insert into {table}"))?;
                }
            }
            ImportanceTable::Attributions(rows) => {
                let mut stmt = tx
                    .prepare(&format!(
                        "INSERT INTO {table} (rank, feature, importance, direction, effect)
                         VALUES (?1, ?2, ?3, ?4, ?5)"
                    ))
                    .with_context(|| format!("failed to prepare insert into {table}"))?;
                for (rank, row) in rows.iter().enumerate() {
                    stmt.execute(params![
                        rank as i64 + 1,
                        row.feature,
                        row.importance,
                        row.direction,
                        row.effect.label(),
                    ])
                    .with_context(|| format!("failed to insert into {table}"))?;
                }
            }
        }

        tx.commit().context("failed to commit importance")?;
        debug!("wrote {} importance rows to {}", importance.len(), table);
        Ok(())
    }

    // -- Reads ---------------------------------------------------------------

    fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            params![table],
            |row| row.get(0),
        )
        .context("failed to check table existence")
    }

    fn map_prediction(row: &rusqlite::Row<'_>) -> rusqlite::Result<PredictionRecord> {
        Ok(PredictionRecord {
            player: row.get(0)?,
            current_season: row.get(1)?,
            next_season: row.get(2)?,
            current_team: row.get(3)?,
            next_team: row.get(4)?,
            actual: row.get(5)?,
            predicted: row.get(6)?,
            error: row.get(7)?,
            abs_error: row.get(8)?,
        })
    }

    /// Predictions for a pair ordered by player name. Returns an empty list
    /// if the pair has not been published yet.
    pub fn predictions(
        &self,
        stat: TargetStat,
        model: EstimatorKind,
        limit: usize,
    ) -> Result<Vec<PredictionRecord>> {
        let table = catalog::table_name(stat, model, TableKind::Predictions);
        let conn = self.conn();
        if !Self::table_exists(&conn, &table)? {
            return Ok(Vec::new());
        }
        let mut stmt = conn
            .prepare(&format!(
                "SELECT player, current_season, next_season, current_team, next_team,
                        actual, predicted, error, abs_error
                 FROM {table} ORDER BY player LIMIT ?1"
            ))
            .context("failed to prepare predictions query")?;
        let rows = stmt
            .query_map(params![limit as i64], Self::map_prediction)
            .context("failed to query predictions")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map prediction rows")?;
        Ok(rows)
    }

    /// Latest prediction per published pair for players whose name contains
    /// `name_fragment` (case-insensitive).
    pub fn player_predictions(&self, name_fragment: &str) -> Result<Vec<PlayerPrediction>> {
        let pattern = format!("%{}%", escape_like(name_fragment.trim()));
        let conn = self.conn();
        let mut found = Vec::new();

        for (stat, model) in catalog::available_combinations() {
            let table = catalog::table_name(stat, model, TableKind::Predictions);
            if !Self::table_exists(&conn, &table)? {
                continue;
            }
            let record = conn
                .query_row(
                    &format!(
                        "SELECT player, current_season, next_season, current_team, next_team,
                                actual, predicted, error, abs_error
                         FROM {table} WHERE player LIKE ?1 ESCAPE '\\'
                         ORDER BY next_season DESC LIMIT 1"
                    ),
                    params![pattern],
                    Self::map_prediction,
                )
                .optional()
                .with_context(|| format!("failed to query {table}"))?;
            if let Some(record) = record {
                found.push(PlayerPrediction { stat, model, record });
            }
        }

        Ok(found)
    }

    /// Metrics row for a pair, if published.
    pub fn metrics(&self, stat: TargetStat, model: EstimatorKind) -> Result<Option<MetricsRecord>> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT mae, r2, train_rows, held_out_rows, excluded_rows, held_out_season, trained_at
                 FROM model_metrics WHERE stat = ?1 AND model = ?2",
                params![stat.key(), model.key()],
                |row| {
                    Ok((
                        row.get::<_, f64>(0)?,
                        row.get::<_, Option<f64>>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, i32>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()
            .context("failed to query metrics")?;

        let Some((mae, r2, train, held_out, excluded, season, trained_at)) = row else {
            return Ok(None);
        };
        let trained_at = DateTime::parse_from_rfc3339(&trained_at)
            .context("failed to parse trained_at timestamp")?
            .with_timezone(&Utc);

        Ok(Some(MetricsRecord {
            stat,
            model,
            mae,
            r2,
            train_rows: train as usize,
            held_out_rows: held_out as usize,
            excluded_rows: excluded as usize,
            held_out_season: season,
            trained_at,
        }))
    }

    /// Importance table for a pair, if published. The family is recovered
    /// from the table's columns.
    pub fn importance(
        &self,
        stat: TargetStat,
        model: EstimatorKind,
    ) -> Result<Option<ImportanceTable>> {
        let table = catalog::table_name(stat, model, TableKind::Importance);
        let conn = self.conn();
        if !Self::table_exists(&conn, &table)? {
            return Ok(None);
        }

        let is_coefficient_table = conn
            .prepare(&format!("SELECT coefficient FROM {table} LIMIT 0"))
            .is_ok();

        if is_coefficient_table {
            let mut stmt = conn
                .prepare(&format!("SELECT feature, coefficient FROM {table} ORDER BY rank"))
                .context("failed to prepare importance query")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(CoefficientRow {
                        feature: row.get(0)?,
                        coefficient: row.get(1)?,
                    })
                })
                .context("failed to query importance")?
                .collect::<std::result::Result<Vec<_>, _>>()
                .context("failed to map importance rows")?;
            return Ok(Some(ImportanceTable::Coefficients(rows)));
        }

        let mut stmt = conn
            .prepare(&format!(
                "SELECT feature, importance, direction, effect FROM {table} ORDER BY rank"
            ))
            .context("failed to prepare importance query")?;
        let rows = stmt
            .query_map([], |row| {
                let direction: f64 = row.get(2)?;
                Ok(AttributionRow {
                    feature: row.get(0)?,
                    importance: row.get(1)?,
                    direction,
                    effect: Effect::from_direction(direction),
                })
            })
            .context("failed to query importance")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map importance rows")?;
        Ok(Some(ImportanceTable::Attributions(rows)))
    }
}

/// Escape LIKE wildcards so a name fragment matches literally under
/// `ESCAPE '\'`.
fn escape_like(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len());
    for c in fragment.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
