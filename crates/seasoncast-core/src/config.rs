// Configuration loading and parsing (config/pipeline.toml).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name of the pipeline configuration inside `config/` and `defaults/`.
pub const PIPELINE_FILE: &str = "pipeline.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize {path}: {message}")]
    InitError { path: PathBuf, message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub data: DataPaths,
    pub artifacts: ArtifactPaths,
    pub run: RunConfig,
    pub attribution: AttributionConfig,
    pub park_factors: ParkFactorConfig,
    /// Per-target input overrides, keyed by the target name as written in the
    /// file. Parsed into target statistics by the pipeline.
    pub features: HashMap<String, Vec<String>>,
}

// ---------------------------------------------------------------------------
// pipeline.toml structs
// ---------------------------------------------------------------------------

/// Raw (de)serialization target for the entire pipeline.toml file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PipelineFile {
    data: DataPaths,
    artifacts: ArtifactSection,
    run: RunConfig,
    #[serde(default)]
    attribution: AttributionConfig,
    #[serde(default)]
    park_factors: ParkFactorConfig,
    #[serde(default)]
    features: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Raw season table location (CSV).
    pub seasons: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ArtifactSection {
    /// Artifact root. Empty means the platform data directory.
    #[serde(default)]
    root: String,
    database: String,
}

/// Resolved artifact locations.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub root: PathBuf,
    pub database: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Target statistic names, e.g. `["HR", "AVG"]`.
    pub targets: Vec<String>,
}

/// Sampling parameters for model-agnostic attribution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AttributionConfig {
    /// Upper bound on training rows explained per estimator.
    pub max_rows: usize,
    /// Feature permutations sampled per explained row.
    pub permutations: usize,
    pub seed: u64,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            max_rows: 200,
            permutations: 16,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ParkFactorConfig {
    /// Team code used for players who changed teams mid-season, and the
    /// fallback for unknown codes.
    pub sentinel_code: String,
    /// Replacement park-factor table. Empty keeps the built-in table.
    pub table: HashMap<String, f64>,
}

impl Default for ParkFactorConfig {
    fn default() -> Self {
        Self {
            sentinel_code: "MULTI".into(),
            table: HashMap::new(),
        }
    }
}

impl Default for PipelineFile {
    fn default() -> Self {
        Self {
            data: DataPaths {
                seasons: "data/batting.csv".into(),
            },
            artifacts: ArtifactSection {
                root: "artifacts".into(),
                database: "seasoncast.db".into(),
            },
            run: RunConfig {
                targets: ["HR", "AVG", "OPS", "wRC+"].map(String::from).to_vec(),
            },
            attribution: AttributionConfig::default(),
            park_factors: ParkFactorConfig::default(),
            features: HashMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/pipeline.toml` relative to
/// `base_dir`. Does not copy defaults; prefer `load_config()`.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(PIPELINE_FILE);
    let text = read_file(&path)?;
    let file: PipelineFile = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        source: e,
    })?;

    let root = if file.artifacts.root.trim().is_empty() {
        default_artifact_root()
    } else {
        base_dir.join(file.artifacts.root.trim())
    };
    let database = {
        let db = Path::new(file.artifacts.database.trim());
        if db.is_absolute() {
            db.to_path_buf()
        } else {
            root.join(db)
        }
    };

    let config = Config {
        data: DataPaths {
            seasons: base_dir.join(file.data.seasons.trim()).display().to_string(),
        },
        artifacts: ArtifactPaths { root, database },
        run: file.run,
        attribution: file.attribution,
        park_factors: file.park_factors,
        features: file.features,
    };

    validate(&config)?;

    Ok(config)
}

/// Create `config/pipeline.toml` if it is missing. The annotated
/// `defaults/pipeline.toml` is used when present; otherwise the built-in
/// defaults are serialized. Returns the path when a file was created.
pub fn ensure_config_file(base_dir: &Path) -> Result<Option<PathBuf>, ConfigError> {
    let config_dir = base_dir.join("config");
    let target = config_dir.join(PIPELINE_FILE);
    if target.exists() {
        return Ok(None);
    }

    let init_error = |message: String| ConfigError::InitError {
        path: target.clone(),
        message,
    };

    let contents = match std::fs::read_to_string(base_dir.join("defaults").join(PIPELINE_FILE)) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            toml::to_string_pretty(&PipelineFile::default())
                .map_err(|e| init_error(format!("failed to serialize defaults: {e}")))?
        }
        Err(e) => return Err(init_error(format!("failed to read defaults: {e}"))),
    };

    std::fs::create_dir_all(&config_dir)
        .map_err(|e| init_error(format!("failed to create config directory: {e}")))?;
    match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&target)
    {
        Ok(mut dest) => {
            std::io::Write::write_all(&mut dest, contents.as_bytes())
                .map_err(|e| init_error(format!("write failed: {e}")))?;
            Ok(Some(target.clone()))
        }
        // Another process created it in between.
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
        Err(e) => Err(init_error(format!("create failed: {e}"))),
    }
}

/// Convenience wrapper: creates the config file if needed, then loads config
/// relative to `base_dir`.
pub fn load_config(base_dir: &Path) -> Result<Config, ConfigError> {
    ensure_config_file(base_dir)?;
    load_config_from(base_dir)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn default_artifact_root() -> PathBuf {
    directories::ProjectDirs::from("", "", "seasoncast")
        .map(|dirs| dirs.data_dir().join("artifacts"))
        .unwrap_or_else(|| PathBuf::from("artifacts"))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.data.seasons.trim().is_empty() {
        return Err(invalid("data.seasons", "must not be empty"));
    }

    if config.run.targets.is_empty() {
        return Err(invalid("run.targets", "must list at least one target statistic"));
    }

    if config.attribution.max_rows == 0 {
        return Err(invalid("attribution.max_rows", "must be > 0"));
    }
    if config.attribution.permutations == 0 {
        return Err(invalid("attribution.permutations", "must be > 0"));
    }

    if config.park_factors.sentinel_code.trim().is_empty() {
        return Err(invalid("park_factors.sentinel_code", "must not be empty"));
    }
    for (team, factor) in &config.park_factors.table {
        if !factor.is_finite() || *factor <= 0.0 {
            return Err(invalid(
                &format!("park_factors.table.{team}"),
                format!("must be a positive finite number, got {factor}"),
            ));
        }
    }
    if !config.park_factors.table.is_empty()
        && !config
            .park_factors
            .table
            .contains_key(config.park_factors.sentinel_code.trim())
    {
        return Err(invalid(
            "park_factors.table",
            format!(
                "must contain an entry for the sentinel code `{}`",
                config.park_factors.sentinel_code
            ),
        ));
    }

    for (target, inputs) in &config.features {
        if inputs.is_empty() {
            return Err(invalid(&format!("features.{target}"), "must list at least one input"));
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
