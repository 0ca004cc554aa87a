use racedata_parser::{infer_numeric_columns, normalize};
use tracing::info;

use crate::config::EngineConfig;
use crate::drivers::{self, DriverAnalysis};
use crate::error::Result;
use crate::pits::{self, PitSettings, PitWindows};
use crate::resolver::ArtifactResolver;
use crate::results::{self, JoinMode, ResultsComparison};
use crate::sanitize::{frame_records, sanitize, Datum};
use crate::summary::{self, RaceSummary};
use crate::weather::{self, WeatherSummary};

/// Entry point for callers: one method per derivation, all reading fresh from disk.
///
/// Holds only configuration, so a single engine can serve any number of threads.
#[derive(Debug, Clone)]
pub struct RaceEngine {
    config: EngineConfig,
    resolver: ArtifactResolver,
}

impl RaceEngine {
    pub fn new(config: EngineConfig) -> Self {
        let resolver = ArtifactResolver::from_config(&config);
        Self { config, resolver }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tracks(&self) -> Result<Vec<String>> {
        self.resolver.list_tracks()
    }

    pub fn races(&self, track: &str) -> Result<Vec<String>> {
        self.resolver.list_races(track)
    }

    pub fn summary(&self, track: &str, race: &str) -> Result<RaceSummary> {
        summary::summarize(&self.resolver, track, race)
    }

    pub fn drivers(&self, track: &str, race: &str) -> Result<DriverAnalysis> {
        drivers::analyze(&self.resolver, track, race)
    }

    pub fn pit_windows(&self, track: &str, race: &str) -> Result<PitWindows> {
        let settings = PitSettings {
            threshold_ratio: self.config.pit_threshold_ratio,
            millis_threshold: self.config.millis_threshold,
        };
        pits::detect_pit_windows(&self.resolver, track, race, settings)
    }

    pub fn compare_results(
        &self,
        track: &str,
        race: &str,
        join: JoinMode,
    ) -> Result<ResultsComparison> {
        results::compare(&self.resolver, track, race, join)
    }

    pub fn weather(&self, track: &str, race: &str) -> Result<WeatherSummary> {
        weather::summarize_weather(&self.resolver, track, race)
    }

    /// A normalized artifact as sanitized row records, numeric columns typed as numbers.
    pub fn records(&self, track: &str, race: &str, pattern: &str) -> Result<Datum> {
        let (artifact, raw) = self.resolver.load(track, race, pattern)?;
        let typed = infer_numeric_columns(&normalize(raw)?)?;
        info!(
            track = %artifact.track,
            race = %artifact.race,
            pattern,
            rows = typed.height(),
            "artifact dumped as records"
        );
        Ok(sanitize(&frame_records(&typed)))
    }
}
