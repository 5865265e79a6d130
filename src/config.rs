//! Search and run configuration.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::{ConfigError, SelectionMode};

const DEFAULT_WARMUP_TRIALS: usize = 3;
const DEFAULT_SEARCH_CYCLES: usize = 25;
const DEFAULT_REPORT_EVERY: usize = 100;

/// Immutable settings for one [`SearchEngine`](crate::SearchEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchConfig {
    #[serde(default)]
    pub mode: SelectionMode,
    /// Random partners drawn for every element during warm-up.
    #[serde(default = "default_warmup_trials")]
    pub warmup_trials: usize,
    #[serde(default = "default_search_cycles")]
    pub search_cycles: usize,
    #[serde(default)]
    pub hide_progress: bool,
    /// Log the best score so far every this many search cycles.
    #[serde(default = "default_report_every")]
    pub report_every: usize,
    /// Seed for the engine RNG. `None` draws one from the OS.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            mode: SelectionMode::default(),
            warmup_trials: DEFAULT_WARMUP_TRIALS,
            search_cycles: DEFAULT_SEARCH_CYCLES,
            hide_progress: false,
            report_every: DEFAULT_REPORT_EVERY,
            seed: None,
        }
    }
}

impl SearchConfig {
    /// Default settings with the mode given by name.
    pub fn with_mode(mode: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            mode: mode.parse()?,
            ..Self::default()
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.warmup_trials == 0 {
            return Err(ConfigError::InvalidField {
                field: "warmup_trials".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.report_every == 0 {
            return Err(ConfigError::InvalidField {
                field: "report_every".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn default_warmup_trials() -> usize {
    DEFAULT_WARMUP_TRIALS
}

fn default_search_cycles() -> usize {
    DEFAULT_SEARCH_CYCLES
}

fn default_report_every() -> usize {
    DEFAULT_REPORT_EVERY
}

/// Logging block of a run file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    /// Write logs here instead of stdout.
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            file: None,
            json: false,
        }
    }
}

impl LoggingConfig {
    pub fn level(&self) -> Option<Level> {
        self.level.parse::<Level>().ok()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.level().is_none() {
            return Err(ConfigError::InvalidField {
                field: "logging.level".to_string(),
                message: format!("unknown level {:?}", self.level),
            });
        }
        Ok(())
    }
}

fn default_level() -> String {
    "info".to_string()
}

/// A complete run loaded from YAML: search settings plus where inputs and outputs live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub search: SearchConfig,
    /// One element file per slot, in slot order.
    pub slots: Vec<PathBuf>,
    /// Keep at most this many elements per slot.
    #[serde(default)]
    pub max_per_slot: Option<usize>,
    /// `name,score` table used to score combinations.
    pub scores: PathBuf,
    #[serde(default = "default_separator")]
    pub separator: String,
    /// JSON-lines file receiving every hit.
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_separator() -> String {
    ".".to_string()
}

impl RunConfig {
    /// Load configuration from a YAML file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ConfigError::Read {
            source,
            path: path.to_path_buf(),
        })?;
        let cfg: RunConfig = serde_yaml::from_reader(BufReader::new(file)).map_err(|source| {
            ConfigError::Parse {
                source,
                path: path.to_path_buf(),
            }
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate the configuration without performing I/O.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.search.validate()?;
        self.logging.validate()?;
        if self.slots.is_empty() {
            return Err(ConfigError::InvalidField {
                field: "slots".to_string(),
                message: "at least one slot file is required".to_string(),
            });
        }
        if self.max_per_slot == Some(0) {
            return Err(ConfigError::InvalidField {
                field: "max_per_slot".to_string(),
                message: "must be at least 1 when set".to_string(),
            });
        }
        Ok(())
    }
}
