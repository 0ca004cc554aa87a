pub mod config;
pub mod drivers;
pub mod engine;
pub mod error;
pub mod pits;
pub mod resolver;
pub mod results;
pub mod sanitize;
pub mod stats;
pub mod summary;
pub mod weather;

pub use config::{EngineConfig, ResolveMode};
pub use drivers::{DriverAnalysis, DriverMetrics};
pub use engine::RaceEngine;
pub use error::{EngineError, Result};
pub use pits::{PitStrategy, PitWindows};
pub use racedata_parser::DetectedColumn;
pub use resolver::{ArtifactResolver, TimingArtifact};
pub use results::{JoinMode, PositionChange, ResultsComparison};
pub use sanitize::{frame_records, sanitize, Datum, ToDatum};
pub use summary::RaceSummary;
pub use weather::{WeatherSample, WeatherSummary};
