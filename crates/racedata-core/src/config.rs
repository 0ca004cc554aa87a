use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use racedata_parser::DEFAULT_MILLIS_THRESHOLD;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

pub const DEFAULT_DATA_ROOT: &str = "cleaned_data";

/// Laps slower than `median * ratio` are read as pit laps when no pit flag exists.
///
/// Heuristic: nothing in the exports validates 30% as the right margin.
pub const DEFAULT_PIT_THRESHOLD_RATIO: f64 = 1.3;

pub const DATA_ROOT_ENV: &str = "CLEANED_DATA_PATH";
pub const RESOLVE_MODE_ENV: &str = "RACEDATA_RESOLVE_MODE";
pub const PIT_THRESHOLD_ENV: &str = "RACEDATA_PIT_THRESHOLD";
pub const MILLIS_THRESHOLD_ENV: &str = "RACEDATA_MILLIS_THRESHOLD";

/// How the resolver treats a pattern that matches more than one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolveMode {
    /// Fail with `Ambiguous`.
    #[default]
    Strict,
    /// Take the lexicographically smallest path.
    BestEffort,
}

impl FromStr for ResolveMode {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(ResolveMode::Strict),
            "best-effort" | "best_effort" | "besteffort" => Ok(ResolveMode::BestEffort),
            other => Err(format!("unknown resolve mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub data_root: PathBuf,
    pub resolve_mode: ResolveMode,
    pub pit_threshold_ratio: f64,
    pub millis_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from(DEFAULT_DATA_ROOT),
            resolve_mode: ResolveMode::Strict,
            pit_threshold_ratio: DEFAULT_PIT_THRESHOLD_RATIO,
            millis_threshold: DEFAULT_MILLIS_THRESHOLD,
        }
    }
}

impl EngineConfig {
    pub fn with_data_root(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
            .map_err(|err| EngineError::Config(format!("{}: {err}", path.display())))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(content).map_err(|err| EngineError::Config(err.to_string()))?;
        config.validate()
    }

    /// Overlays any `CLEANED_DATA_PATH` / `RACEDATA_*` variables.
    pub fn apply_env(self) -> Result<Self> {
        self.apply_overrides(|key| match env::var(key) {
            Ok(value) => Ok(Some(value)),
            Err(env::VarError::NotPresent) => Ok(None),
            Err(err) => Err(EngineError::Config(format!("{key}: {err}"))),
        })
    }

    /// Overlays values looked up by environment variable name, then validates.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<Option<String>>,
    {
        if let Some(root) = lookup(DATA_ROOT_ENV)? {
            self.data_root = PathBuf::from(root);
        }
        if let Some(mode) = parse_override(&lookup, RESOLVE_MODE_ENV)? {
            self.resolve_mode = mode;
        }
        if let Some(ratio) = parse_override(&lookup, PIT_THRESHOLD_ENV)? {
            self.pit_threshold_ratio = ratio;
        }
        if let Some(threshold) = parse_override(&lookup, MILLIS_THRESHOLD_ENV)? {
            self.millis_threshold = threshold;
        }
        self.validate()
    }

    pub fn validate(self) -> Result<Self> {
        if !self.pit_threshold_ratio.is_finite() || self.pit_threshold_ratio <= 1.0 {
            return Err(EngineError::Config(format!(
                "pit_threshold_ratio must be a finite number above 1.0, got {}",
                self.pit_threshold_ratio
            )));
        }
        if !self.millis_threshold.is_finite() || self.millis_threshold <= 0.0 {
            return Err(EngineError::Config(format!(
                "millis_threshold must be a finite positive number, got {}",
                self.millis_threshold
            )));
        }
        Ok(self)
    }
}

fn parse_override<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Result<Option<String>>,
{
    let Some(raw) = lookup(key)? else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|err| EngineError::Config(format!("{key}='{raw}': {err}")))
}
