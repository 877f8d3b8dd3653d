// Park factors and the enricher that attaches them to training rows.

use std::collections::{BTreeSet, HashMap};

use seasoncast_core::config::ParkFactorConfig;
use tracing::{debug, warn};

use crate::features::TrainingRow;

/// Value used when the sentinel itself has no entry.
const NEUTRAL: f64 = 100.0;

/// 2024 park factors (100 = neutral). Provider and legacy codes are both
/// listed so that either spelling resolves.
const PARK_FACTORS_2024: [(&str, f64); 37] = [
    ("ARI", 101.0),
    ("ATL", 100.0),
    ("BAL", 99.0),
    ("BOS", 107.0),
    ("CHC", 97.0),
    ("CHW", 99.0),
    ("CIN", 105.0),
    ("CLE", 97.0),
    ("COL", 112.0),
    ("DET", 98.0),
    ("HOU", 100.0),
    ("KC", 104.0),
    ("KCR", 104.0),
    ("LAA", 100.0),
    ("LAD", 100.0),
    ("MIA", 101.0),
    ("MIL", 97.0),
    ("MIN", 102.0),
    ("NYM", 97.0),
    ("NYY", 100.0),
    ("OAK", 97.0),
    ("ATH", 97.0),
    ("PHI", 101.0),
    ("PIT", 101.0),
    ("SD", 96.0),
    ("SDP", 96.0),
    ("SEA", 91.0),
    ("SF", 97.0),
    ("SFG", 97.0),
    ("STL", 100.0),
    ("TB", 96.0),
    ("TBR", 96.0),
    ("TEX", 101.0),
    ("TOR", 100.0),
    ("WSH", 101.0),
    ("WSN", 101.0),
    ("MULTI", 100.0),
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no park factor for team code `{0}`")]
pub struct UnresolvedTeamCode(pub String);

/// Current- and next-season park factors for one training row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParkFactors {
    pub current: f64,
    pub next: f64,
}

/// Team code to park factor for one reference season.
#[derive(Debug, Clone, PartialEq)]
pub struct ParkFactorTable {
    factors: HashMap<String, f64>,
    sentinel: String,
}

impl ParkFactorTable {
    pub fn new(factors: HashMap<String, f64>, sentinel: impl Into<String>) -> Self {
        Self {
            factors,
            sentinel: sentinel.into(),
        }
    }

    /// Built-in 2024 table with the `MULTI` sentinel.
    pub fn reference_2024() -> Self {
        Self::new(
            PARK_FACTORS_2024
                .iter()
                .map(|(team, pf)| (team.to_string(), *pf))
                .collect(),
            crate::seasons::MULTI_TEAM,
        )
    }

    /// Table from configuration. An empty configured table keeps the built-in
    /// factors under the configured sentinel.
    pub fn from_config(config: &ParkFactorConfig) -> Self {
        if config.table.is_empty() {
            let mut table = Self::reference_2024();
            if config.sentinel_code != table.sentinel {
                let neutral = table.sentinel_value();
                table.factors.insert(config.sentinel_code.clone(), neutral);
                table.sentinel = config.sentinel_code.clone();
            }
            table
        } else {
            Self::new(config.table.clone(), config.sentinel_code.clone())
        }
    }

    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }

    pub fn sentinel_value(&self) -> f64 {
        self.factors.get(&self.sentinel).copied().unwrap_or(NEUTRAL)
    }

    pub fn resolve(&self, team: &str) -> Result<f64, UnresolvedTeamCode> {
        self.factors
            .get(team.trim())
            .copied()
            .ok_or_else(|| UnresolvedTeamCode(team.trim().to_string()))
    }

    /// Resolve `team`, falling back to the sentinel value for unknown codes.
    pub fn resolve_or_sentinel(&self, team: &str) -> f64 {
        self.resolve(team).unwrap_or_else(|_| self.sentinel_value())
    }
}

impl Default for ParkFactorTable {
    fn default() -> Self {
        Self::reference_2024()
    }
}

/// Outcome of enriching a row set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichmentSummary {
    pub rows: usize,
    /// Distinct team codes that fell back to the sentinel.
    pub unresolved: BTreeSet<String>,
}

/// Attach park factors to every row. Unknown team codes resolve to the
/// sentinel value and are reported in the summary.
pub fn enrich(rows: &mut [TrainingRow], table: &ParkFactorTable) -> EnrichmentSummary {
    let mut summary = EnrichmentSummary {
        rows: rows.len(),
        ..Default::default()
    };

    let mut lookup = |team: &str, player: &str| match table.resolve(team) {
        Ok(pf) => pf,
        Err(e) => {
            debug!("{} for {}; using sentinel {}", e, player, table.sentinel());
            summary.unresolved.insert(e.0);
            table.sentinel_value()
        }
    };

    for row in rows.iter_mut() {
        let current = lookup(&row.current_team, &row.player);
        let next = lookup(&row.next_team, &row.player);
        row.park = Some(ParkFactors { current, next });
    }

    if !summary.unresolved.is_empty() {
        warn!(
            "{} team codes had no park factor and used sentinel {}: {:?}",
            summary.unresolved.len(),
            table.sentinel(),
            summary.unresolved
        );
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(current_team: &str, next_team: &str) -> TrainingRow {
        TrainingRow {
            player: "Test".into(),
            current_season: 2023,
            next_season: 2024,
            current_team: current_team.into(),
            next_team: next_team.into(),
            current: HashMap::new(),
            next: HashMap::new(),
            park: None,
        }
    }

    #[test]
    fn reference_table_resolves_aliases() {
        let table = ParkFactorTable::reference_2024();
        assert_eq!(table.resolve("COL"), Ok(112.0));
        assert_eq!(table.resolve("KC"), table.resolve("KCR"));
        assert_eq!(table.resolve("ATH"), table.resolve("OAK"));
        assert_eq!(table.resolve("MULTI"), Ok(100.0));
    }

    #[test]
    fn unknown_code_is_unresolved() {
        let table = ParkFactorTable::reference_2024();
        assert_eq!(table.resolve("MON"), Err(UnresolvedTeamCode("MON".into())));
        assert_eq!(table.resolve_or_sentinel("MON"), 100.0);
    }

    #[test]
    fn enrich_attaches_factors_and_reports_unknown_codes() {
        let table = ParkFactorTable::reference_2024();
        let mut rows = vec![row("COL", "SEA"), row("MON", "MULTI"), row("XXX", "MON")];
        let summary = enrich(&mut rows, &table);

        assert_eq!(rows[0].park, Some(ParkFactors { current: 112.0, next: 91.0 }));
        assert_eq!(rows[1].park, Some(ParkFactors { current: 100.0, next: 100.0 }));
        assert_eq!(summary.rows, 3);
        assert_eq!(
            summary.unresolved.into_iter().collect::<Vec<_>>(),
            vec!["MON".to_string(), "XXX".to_string()]
        );
    }

    #[test]
    fn config_table_replaces_reference() {
        let config = ParkFactorConfig {
            sentinel_code: "TOT".into(),
            table: HashMap::from([("NYY".into(), 110.0), ("TOT".into(), 95.0)]),
        };
        let table = ParkFactorTable::from_config(&config);
        assert_eq!(table.resolve("NYY"), Ok(110.0));
        assert!(table.resolve("COL").is_err());
        assert_eq!(table.resolve_or_sentinel("COL"), 95.0);
    }

    #[test]
    fn empty_config_table_keeps_reference_with_custom_sentinel() {
        let config = ParkFactorConfig {
            sentinel_code: "TOT".into(),
            table: HashMap::new(),
        };
        let table = ParkFactorTable::from_config(&config);
        assert_eq!(table.sentinel(), "TOT");
        assert_eq!(table.resolve("TOT"), Ok(100.0));
        assert_eq!(table.resolve("BOS"), Ok(107.0));
    }
}
