// Fixed train / held-out partition by next season.

use crate::features::TrainingRow;

use super::TrainingError;

/// Rows partitioned around the most recent next-season year `Y`: training
/// rows have `next_season != Y`, held-out rows have `next_season == Y`.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonSplit<'a> {
    pub held_out_season: i32,
    pub train: Vec<&'a TrainingRow>,
    pub held_out: Vec<&'a TrainingRow>,
}

/// Deterministic: the same rows always produce the same partitions in the
/// same order.
pub fn split_by_season(rows: &[TrainingRow]) -> Result<SeasonSplit<'_>, TrainingError> {
    let held_out_season = rows
        .iter()
        .map(|r| r.next_season)
        .max()
        .ok_or(TrainingError::NoTrainingRows)?;

    let (held_out, train): (Vec<&TrainingRow>, Vec<&TrainingRow>) =
        rows.iter().partition(|r| r.next_season == held_out_season);

    Ok(SeasonSplit {
        held_out_season,
        train,
        held_out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn row(player: &str, current: i32) -> TrainingRow {
        TrainingRow {
            player: player.into(),
            current_season: current,
            next_season: current + 1,
            current_team: "NYY".into(),
            next_team: "NYY".into(),
            current: HashMap::new(),
            next: HashMap::new(),
            park: None,
        }
    }

    #[test]
    fn newest_next_season_is_held_out() {
        let rows = vec![row("A", 2021), row("A", 2022), row("B", 2022), row("C", 2020)];
        let split = split_by_season(&rows).unwrap();
        assert_eq!(split.held_out_season, 2023);
        assert_eq!(split.held_out.len(), 2);
        assert!(split.train.iter().all(|r| r.next_season != 2023));
        assert_eq!(split.train.len() + split.held_out.len(), rows.len());
    }

    #[test]
    fn split_is_deterministic() {
        let rows = vec![row("B", 2023), row("A", 2022), row("A", 2023), row("C", 2021)];
        let a = split_by_season(&rows).unwrap();
        let b = split_by_season(&rows).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_rows_fail() {
        assert!(matches!(split_by_season(&[]), Err(TrainingError::NoTrainingRows)));
    }
}
