use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use polars::prelude::DataFrame;
use racedata_parser::read_table;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{EngineConfig, ResolveMode};
use crate::error::{EngineError, Result};

/// Vendors disagree on `.csv` versus `.CSV`, so file patterns ignore case.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// One export file located for a `(track, race, pattern)` query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimingArtifact {
    pub track: String,
    pub race: String,
    pub pattern: String,
    pub path: PathBuf,
}

/// Maps `(track, race, pattern)` to exactly one file under
/// `<data_root>/<TRACK_UPPER>/<race>/`.
///
/// Nothing is cached: every call lists the race folder again.
#[derive(Debug, Clone)]
pub struct ArtifactResolver {
    data_root: PathBuf,
    mode: ResolveMode,
}

impl ArtifactResolver {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            mode: ResolveMode::Strict,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.data_root.clone()).with_mode(config.resolve_mode)
    }

    pub fn with_mode(mut self, mode: ResolveMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn race_folder(&self, track: &str, race: &str) -> Result<PathBuf> {
        let track = canonical_track(track)?;
        let race = checked_segment("race", race)?;
        Ok(self.data_root.join(track).join(race))
    }

    pub fn resolve(&self, track: &str, race: &str, pattern: &str) -> Result<TimingArtifact> {
        let folder = self.race_folder(track, race)?;
        let matcher = Pattern::new(pattern).map_err(|source| EngineError::Pattern {
            pattern: pattern.to_string(),
            source,
        })?;

        let mut matches = matching_files(&folder, &matcher)?;
        let track = canonical_track(track)?;
        let race = race.trim().to_string();

        let path = match matches.len() {
            0 => {
                return Err(EngineError::NotFound {
                    track,
                    race,
                    pattern: pattern.to_string(),
                    folder,
                })
            }
            1 => matches.remove(0),
            _ if self.mode == ResolveMode::BestEffort => {
                let chosen = matches.remove(0);
                warn!(
                    track = %track,
                    race = %race,
                    pattern,
                    chosen = %chosen.display(),
                    skipped = matches.len(),
                    "pattern matched several files; using the first in path order"
                );
                chosen
            }
            _ => {
                return Err(EngineError::Ambiguous {
                    track,
                    race,
                    pattern: pattern.to_string(),
                    matches,
                })
            }
        };

        debug!(
            track = %track,
            race = %race,
            pattern,
            path = %path.display(),
            "resolved artifact"
        );
        Ok(TimingArtifact {
            track,
            race,
            pattern: pattern.to_string(),
            path,
        })
    }

    /// Like [`resolve`](Self::resolve), but a missing artifact is `Ok(None)`.
    pub fn resolve_optional(
        &self,
        track: &str,
        race: &str,
        pattern: &str,
    ) -> Result<Option<TimingArtifact>> {
        match self.resolve(track, race, pattern) {
            Ok(artifact) => Ok(Some(artifact)),
            Err(EngineError::NotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn read(&self, artifact: &TimingArtifact) -> Result<DataFrame> {
        read_table(&artifact.path).map_err(|source| EngineError::Load {
            path: artifact.path.clone(),
            pattern: artifact.pattern.clone(),
            source,
        })
    }

    pub fn load(
        &self,
        track: &str,
        race: &str,
        pattern: &str,
    ) -> Result<(TimingArtifact, DataFrame)> {
        let artifact = self.resolve(track, race, pattern)?;
        let df = self.read(&artifact)?;
        Ok((artifact, df))
    }

    /// Track directory names under the data root, sorted.
    pub fn list_tracks(&self) -> Result<Vec<String>> {
        list_directories(&self.data_root)
    }

    /// Race directory names for a track, sorted. An unknown track has no races.
    pub fn list_races(&self, track: &str) -> Result<Vec<String>> {
        let folder = self.data_root.join(canonical_track(track)?);
        match list_directories(&folder) {
            Err(EngineError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                Ok(Vec::new())
            }
            other => other,
        }
    }
}

fn canonical_track(track: &str) -> Result<String> {
    checked_segment("track", track).map(|track| track.to_uppercase())
}

fn checked_segment<'a>(kind: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidInput(format!("{kind} must not be empty")));
    }
    if trimmed == "." || trimmed == ".." || trimmed.contains(['/', '\\']) {
        return Err(EngineError::InvalidInput(format!(
            "{kind} '{trimmed}' must be a single directory name"
        )));
    }
    Ok(trimmed)
}

fn matching_files(folder: &Path, matcher: &Pattern) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(EngineError::Io {
                path: folder.to_path_buf(),
                source,
            })
        }
    };

    let mut matches = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| EngineError::Io {
            path: folder.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if matcher.matches_with(name, MATCH_OPTIONS) {
            matches.push(path);
        }
    }
    matches.sort();
    Ok(matches)
}

fn list_directories(folder: &Path) -> Result<Vec<String>> {
    let entries = fs::read_dir(folder).map_err(|source| EngineError::Io {
        path: folder.to_path_buf(),
        source,
    })?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| EngineError::Io {
            path: folder.to_path_buf(),
            source,
        })?;
        if entry.path().is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}
