// Feature matrix and target vector construction for one target statistic.

use ndarray::{Array1, Array2};
use seasoncast_core::catalog::TargetStat;
use tracing::{debug, warn};

use crate::features::TrainingRow;

pub const CURRENT_PARK_FACTOR: &str = "Current_Park_Factor";
pub const NEXT_PARK_FACTOR: &str = "Next_Park_Factor";

/// A required value was absent for a row; the row is left out of its matrix.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("missing {feature} for {player} ({season})")]
pub struct MissingFeatureValue {
    pub player: String,
    pub season: i32,
    pub feature: String,
}

/// Design-matrix column names: `Current_<input>` for each input, then the
/// two park-factor columns.
pub fn feature_columns(inputs: &[String]) -> Vec<String> {
    inputs
        .iter()
        .map(|i| format!("Current_{i}"))
        .chain([CURRENT_PARK_FACTOR.to_string(), NEXT_PARK_FACTOR.to_string()])
        .collect()
}

/// Rows of one partition that had every required value.
#[derive(Debug, Clone)]
pub struct DesignMatrix<'a> {
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    /// Source row for each matrix row, in matrix order.
    pub rows: Vec<&'a TrainingRow>,
    pub excluded: usize,
}

impl DesignMatrix<'_> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn row_values(
    row: &TrainingRow,
    target: TargetStat,
    inputs: &[String],
) -> Result<(Vec<f64>, f64), MissingFeatureValue> {
    let missing = |feature: String| MissingFeatureValue {
        player: row.player.clone(),
        season: row.current_season,
        feature,
    };

    let mut values = Vec::with_capacity(inputs.len() + 2);
    for input in inputs {
        let value = row
            .current_value(input)
            .ok_or_else(|| missing(format!("Current_{input}")))?;
        values.push(value);
    }
    let park = row.park.ok_or_else(|| missing(CURRENT_PARK_FACTOR.to_string()))?;
    values.push(park.current);
    values.push(park.next);

    let y = row
        .target_value(target.column())
        .ok_or_else(|| missing(format!("Target_{}", target.column())))?;
    Ok((values, y))
}

/// Build the matrix for one partition. Rows missing any input, park factor,
/// or the target are excluded and counted, never imputed.
pub fn build_design_matrix<'a>(
    partition: &[&'a TrainingRow],
    target: TargetStat,
    inputs: &[String],
    label: &str,
) -> DesignMatrix<'a> {
    let width = inputs.len() + 2;
    let mut data = Vec::with_capacity(partition.len() * width);
    let mut ys = Vec::with_capacity(partition.len());
    let mut kept = Vec::with_capacity(partition.len());
    let mut excluded = 0usize;

    for &row in partition {
        match row_values(row, target, inputs) {
            Ok((values, y)) => {
                data.extend(values);
                ys.push(y);
                kept.push(row);
            }
            Err(e) => {
                debug!("{label} {target}: excluding row: {e}");
                excluded += 1;
            }
        }
    }

    if excluded > 0 {
        warn!(
            "{} {}: excluded {} of {} rows with missing values",
            target,
            label,
            excluded,
            partition.len()
        );
    }

    // Width and length are consistent by construction.
    let x = Array2::from_shape_vec((kept.len(), width), data)
        .unwrap_or_else(|_| Array2::zeros((0, width)));

    DesignMatrix {
        x,
        y: Array1::from(ys),
        rows: kept,
        excluded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::park::ParkFactors;
    use std::collections::HashMap;

    fn row(player: &str, iso: Option<f64>, target: Option<f64>, park: bool) -> TrainingRow {
        TrainingRow {
            player: player.into(),
            current_season: 2023,
            next_season: 2024,
            current_team: "NYY".into(),
            next_team: "NYY".into(),
            current: HashMap::from([("ISO".to_string(), iso), ("Age".to_string(), Some(27.0))]),
            next: HashMap::from([("HR".to_string(), target)]),
            park: park.then_some(ParkFactors { current: 100.0, next: 105.0 }),
        }
    }

    fn inputs() -> Vec<String> {
        vec!["Age".into(), "ISO".into()]
    }

    #[test]
    fn columns_end_with_park_factors() {
        assert_eq!(
            feature_columns(&inputs()),
            vec!["Current_Age", "Current_ISO", "Current_Park_Factor", "Next_Park_Factor"]
        );
    }

    #[test]
    fn complete_rows_fill_the_matrix() {
        let rows = [row("A", Some(0.2), Some(30.0), true), row("B", Some(0.1), Some(10.0), true)];
        let refs: Vec<&TrainingRow> = rows.iter().collect();
        let m = build_design_matrix(&refs, TargetStat::Hr, &inputs(), "train");
        assert_eq!(m.x.dim(), (2, 4));
        assert_eq!(m.x[[0, 1]], 0.2);
        assert_eq!(m.x[[1, 3]], 105.0);
        assert_eq!(m.y.to_vec(), vec![30.0, 10.0]);
        assert_eq!(m.excluded, 0);
    }

    #[test]
    fn rows_with_missing_values_are_excluded_and_counted() {
        let rows = [
            row("Full", Some(0.2), Some(30.0), true),
            row("NoIso", None, Some(20.0), true),
            row("NoTarget", Some(0.3), None, true),
            row("NoPark", Some(0.3), Some(5.0), false),
        ];
        let refs: Vec<&TrainingRow> = rows.iter().collect();
        let m = build_design_matrix(&refs, TargetStat::Hr, &inputs(), "held-out");
        assert_eq!(m.len(), 1);
        assert_eq!(m.rows[0].player, "Full");
        assert_eq!(m.excluded, 3);
        assert!(m.x.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn all_rows_missing_gives_empty_matrix() {
        let rows = [row("NoIso", None, Some(1.0), true)];
        let refs: Vec<&TrainingRow> = rows.iter().collect();
        let m = build_design_matrix(&refs, TargetStat::Hr, &inputs(), "train");
        assert!(m.is_empty());
        assert_eq!(m.x.dim(), (0, 4));
    }
}
