// Adjacent-season pairing of raw season records into training rows.

use std::collections::{BTreeMap, HashMap};

use tracing::{info, warn};

use crate::park::ParkFactors;
use crate::seasons::SeasonRecord;

/// One player's transition from a season to the immediately following one.
///
/// `current` and `next` carry a value for every tracked statistic; `None`
/// marks a statistic the source did not provide.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingRow {
    pub player: String,
    pub current_season: i32,
    pub next_season: i32,
    pub current_team: String,
    pub next_team: String,
    pub current: HashMap<String, Option<f64>>,
    pub next: HashMap<String, Option<f64>>,
    /// Set by the park-factor enricher.
    pub park: Option<ParkFactors>,
}

impl TrainingRow {
    /// `Current_<stat>` value.
    pub fn current_value(&self, stat: &str) -> Option<f64> {
        self.current.get(stat).copied().flatten()
    }

    /// `Target_<stat>` value.
    pub fn target_value(&self, stat: &str) -> Option<f64> {
        self.next.get(stat).copied().flatten()
    }
}

fn snapshot(record: &SeasonRecord, tracked: &[String]) -> HashMap<String, Option<f64>> {
    tracked
        .iter()
        .map(|stat| (stat.clone(), record.stat(stat)))
        .collect()
}

/// Build training rows from raw records.
///
/// Records are grouped by player and sorted by season; each consecutive pair
/// with `next == current + 1` yields one row and gap pairs yield none.
/// Duplicate (player, season) records collapse to the last occurrence. Rows
/// come out ordered by player, then season.
pub fn build_training_rows(records: &[SeasonRecord], tracked: &[String]) -> Vec<TrainingRow> {
    let mut by_player: BTreeMap<&str, BTreeMap<i32, &SeasonRecord>> = BTreeMap::new();
    let mut duplicates = 0usize;

    for record in records {
        let seasons = by_player.entry(record.name.as_str()).or_default();
        if seasons.insert(record.season, record).is_some() {
            duplicates += 1;
            warn!(
                "duplicate season record for '{}' in {}, using latest occurrence",
                record.name, record.season
            );
        }
    }

    let mut rows = Vec::new();
    let mut gaps = 0usize;
    for (player, seasons) in &by_player {
        let ordered: Vec<&SeasonRecord> = seasons.values().copied().collect();
        for pair in ordered.windows(2) {
            let (cur, nxt) = (pair[0], pair[1]);
            if nxt.season != cur.season + 1 {
                gaps += 1;
                continue;
            }
            rows.push(TrainingRow {
                player: player.to_string(),
                current_season: cur.season,
                next_season: nxt.season,
                current_team: cur.team.clone(),
                next_team: nxt.team.clone(),
                current: snapshot(cur, tracked),
                next: snapshot(nxt, tracked),
                park: None,
            });
        }
    }

    info!(
        "built {} training rows from {} players ({} gap pairs skipped, {} duplicates collapsed)",
        rows.len(),
        by_player.len(),
        gaps,
        duplicates
    );
    rows
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
