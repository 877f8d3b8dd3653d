// Raw season loading.
//
// Reads FanGraphs-style batting exports: one row per player per season with
// `Name`, `Season` and `Team` columns followed by any number of numeric
// statistic columns. Statistic columns are discovered from the header.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use tracing::{info, warn};

/// Team code assigned to players who changed teams mid-season.
pub const MULTI_TEAM: &str = "MULTI";

/// Marker the provider writes in the team column for multi-team seasons.
const PROVIDER_MULTI_MARKER: &str = "- - -";

const IDENTITY_COLUMNS: [&str; 3] = ["Name", "Season", "Team"];

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// One player's statistics for one season.
///
/// A statistic that was empty, non-numeric, or non-finite in the source is
/// absent from `stats`. It is never stored as zero.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonRecord {
    pub name: String,
    pub season: i32,
    pub team: String,
    pub stats: HashMap<String, f64>,
}

impl SeasonRecord {
    pub fn stat(&self, name: &str) -> Option<f64> {
        self.stats.get(name).copied()
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SeasonLoadError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("season table is missing required column `{0}`")]
    MissingColumn(&'static str),

    #[error("season table produced zero valid rows")]
    Empty,
}

// ---------------------------------------------------------------------------
// Source seam
// ---------------------------------------------------------------------------

/// Supplier of raw season records.
pub trait SeasonSource {
    fn load(&self) -> Result<Vec<SeasonRecord>, SeasonLoadError>;
}

/// Season source backed by a CSV file on disk.
#[derive(Debug, Clone)]
pub struct CsvSeasonSource {
    path: String,
}

impl CsvSeasonSource {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl SeasonSource for CsvSeasonSource {
    fn load(&self) -> Result<Vec<SeasonRecord>, SeasonLoadError> {
        load_seasons(Path::new(&self.path))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn normalize_team(raw: &str) -> String {
    let team = raw.trim();
    if team.is_empty() || team == PROVIDER_MULTI_MARKER {
        MULTI_TEAM.to_string()
    } else {
        team.to_string()
    }
}

/// Parse a statistic cell. Percent signs are tolerated; anything that does not
/// produce a finite number is missing.
fn parse_stat(cell: &str) -> Option<f64> {
    let cell = cell.trim().trim_end_matches('%').trim();
    if cell.is_empty() {
        return None;
    }
    cell.parse::<f64>().ok().filter(|v| v.is_finite())
}

// ---------------------------------------------------------------------------
// Reader-based loader
// ---------------------------------------------------------------------------

fn load_seasons_from_reader<R: Read>(rdr: R) -> Result<Vec<SeasonRecord>, SeasonLoadError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(rdr);
    let headers = reader
        .headers()
        .map_err(|e| SeasonLoadError::Csv {
            path: "<reader>".into(),
            source: e,
        })?
        .clone();

    let column = |name: &'static str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or(SeasonLoadError::MissingColumn(name))
    };
    let name_idx = column(IDENTITY_COLUMNS[0])?;
    let season_idx = column(IDENTITY_COLUMNS[1])?;
    let team_idx = column(IDENTITY_COLUMNS[2])?;

    let stat_columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !IDENTITY_COLUMNS.contains(&h.trim()))
        .map(|(i, h)| (i, h.trim().to_string()))
        .collect();

    let mut records = Vec::new();
    for result in reader.records() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                warn!("skipping malformed season row: {}", e);
                continue;
            }
        };

        let name = row.get(name_idx).unwrap_or("").trim();
        if name.is_empty() {
            warn!("skipping season row with empty Name");
            continue;
        }
        let Some(season) = row
            .get(season_idx)
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|s| s.is_finite() && s.fract() == 0.0)
        else {
            warn!("skipping season row for '{}': invalid Season value", name);
            continue;
        };

        let stats = stat_columns
            .iter()
            .filter_map(|(i, col)| {
                row.get(*i)
                    .and_then(parse_stat)
                    .map(|v| (col.clone(), v))
            })
            .collect();

        records.push(SeasonRecord {
            name: name.to_string(),
            season: season as i32,
            team: normalize_team(row.get(team_idx).unwrap_or("")),
            stats,
        });
    }

    Ok(records)
}

// ---------------------------------------------------------------------------
// Public path-based loader
// ---------------------------------------------------------------------------

/// Load season records from a CSV file. Fails if the file yields no rows.
pub fn load_seasons(path: &Path) -> Result<Vec<SeasonRecord>, SeasonLoadError> {
    let file = std::fs::File::open(path).map_err(|e| SeasonLoadError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let records = load_seasons_from_reader(file).map_err(|e| match e {
        SeasonLoadError::Csv { source, .. } => SeasonLoadError::Csv {
            path: path.display().to_string(),
            source,
        },
        other => other,
    })?;

    if records.is_empty() {
        return Err(SeasonLoadError::Empty);
    }
    info!("loaded {} season records from {}", records.len(), path.display());
    Ok(records)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn load(csv: &str) -> Vec<SeasonRecord> {
        load_seasons_from_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn parses_identity_and_stats() {
        let records = load(
            "Season,Name,Team,Age,PA,HR,ISO\n\
             2023,Aaron Judge,NYY,31,458,37,0.346\n",
        );
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.name, "Aaron Judge");
        assert_eq!(r.season, 2023);
        assert_eq!(r.team, "NYY");
        assert_eq!(r.stat("HR"), Some(37.0));
        assert_eq!(r.stat("ISO"), Some(0.346));
        assert!(!r.stats.contains_key("Team"));
    }

    #[test]
    fn multi_team_marker_is_normalized() {
        let records = load("Season,Name,Team,HR\n2022,Joey Gallo,- - -,19\n");
        assert_eq!(records[0].team, MULTI_TEAM);
    }

    #[test]
    fn empty_and_invalid_cells_are_missing_not_zero() {
        let records = load(
            "Season,Name,Team,HR,xBA,EV\n\
             2024,Player A,SEA,,NaN,abc\n",
        );
        let r = &records[0];
        assert_eq!(r.stat("HR"), None);
        assert_eq!(r.stat("xBA"), None);
        assert_eq!(r.stat("EV"), None);
    }

    #[test]
    fn percent_cells_are_accepted() {
        let records = load("Season,Name,Team,K%\n2024,Player A,SEA,22.5 %\n");
        assert_eq!(records[0].stat("K%"), Some(22.5));
    }

    #[test]
    fn rows_with_bad_identity_are_skipped() {
        let records = load(
            "Season,Name,Team,HR\n\
             ,No Season,NYY,10\n\
             2023,,NYY,10\n\
             2023.5,Half,NYY,10\n\
             2023,Good,NYY,10\n",
        );
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Good");
    }

    #[test]
    fn missing_identity_column_is_an_error() {
        let err = load_seasons_from_reader("Name,Team,HR\nA,NYY,1\n".as_bytes()).unwrap_err();
        assert!(matches!(err, SeasonLoadError::MissingColumn("Season")));
    }

    #[test]
    fn load_seasons_reports_missing_file() {
        let err = load_seasons(Path::new("/nonexistent/batting.csv")).unwrap_err();
        assert!(matches!(err, SeasonLoadError::Io { .. }));
    }

    #[test]
    fn load_seasons_rejects_empty_table() {
        let path = std::env::temp_dir().join("seasoncast_seasons_empty.csv");
        std::fs::write(&path, "Season,Name,Team,HR\n").unwrap();
        let err = load_seasons(&path).unwrap_err();
        assert!(matches!(err, SeasonLoadError::Empty));
        let _ = std::fs::remove_file(&path);
    }
}
