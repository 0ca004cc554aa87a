use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use polars::prelude::*;
use racedata_parser::{
    driver_key_value, format_lap_time, has_column, normalize, parse_i64_cell, parse_lap_time,
    string_column, CanonicalField,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::resolver::ArtifactResolver;

pub const OFFICIAL_RESULTS_PATTERN: &str = "*Results*Official*.csv";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FastestLap {
    pub number: Option<String>,
    pub seconds: f64,
    pub formatted: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Winner {
    pub number: Option<String>,
    pub vehicle: Option<String>,
    pub pos: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryMetrics {
    pub total_drivers: usize,
    pub total_laps: i64,
    pub fastest_lap: Option<FastestLap>,
    pub winner: Option<Winner>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceSummary {
    pub track: String,
    pub race: String,
    pub files: BTreeMap<String, PathBuf>,
    pub metrics: SummaryMetrics,
    pub diagnostics: Vec<String>,
}

/// Headline numbers for one race, taken from its official results.
pub fn summarize(resolver: &ArtifactResolver, track: &str, race: &str) -> Result<RaceSummary> {
    let (artifact, raw) = resolver.load(track, race, OFFICIAL_RESULTS_PATTERN)?;
    let results = normalize(raw)?;

    let (metrics, diagnostics) = summarize_results(&results);
    for diagnostic in &diagnostics {
        warn!(
            track = %artifact.track,
            race = %artifact.race,
            path = %artifact.path.display(),
            "{diagnostic}"
        );
    }
    info!(
        track = %artifact.track,
        race = %artifact.race,
        total_drivers = metrics.total_drivers,
        total_laps = metrics.total_laps,
        "race summary derived"
    );

    let mut files = BTreeMap::new();
    files.insert("results".to_string(), artifact.path);

    Ok(RaceSummary {
        track: artifact.track,
        race: artifact.race,
        files,
        metrics,
        diagnostics,
    })
}

/// Derives the summary metrics from a normalized results table.
///
/// Never fails: every missing or unreadable column degrades its metric to `0` or `None`
/// and adds a line to the returned diagnostics.
pub fn summarize_results(results: &DataFrame) -> (SummaryMetrics, Vec<String>) {
    let mut diagnostics = Vec::new();
    let numbers = string_column(results, CanonicalField::Number.column_name());

    let total_drivers = match numbers {
        Some(numbers) => numbers
            .into_iter()
            .filter_map(driver_key_value)
            .collect::<HashSet<_>>()
            .len(),
        None => {
            diagnostics.push(format!(
                "column {} missing; total_drivers counts rows",
                CanonicalField::Number
            ));
            results.height()
        }
    };

    let total_laps = match string_column(results, CanonicalField::Laps.column_name()) {
        Some(laps) => match laps.into_iter().filter_map(parse_i64_cell).max() {
            Some(max) => max,
            None => {
                diagnostics.push(format!(
                    "column {} has no numeric values; total_laps set to 0",
                    CanonicalField::Laps
                ));
                0
            }
        },
        None => {
            diagnostics.push(missing(CanonicalField::Laps, "total_laps set to 0"));
            0
        }
    };

    let fastest_lap = match string_column(results, CanonicalField::BestLapTime.column_name()) {
        Some(best) => {
            let mut fastest: Option<(usize, f64)> = None;
            for (idx, seconds) in best.into_iter().enumerate() {
                let Some(seconds) = parse_lap_time(seconds) else {
                    continue;
                };
                if fastest.is_none_or(|(_, current)| seconds < current) {
                    fastest = Some((idx, seconds));
                }
            }
            if fastest.is_none() {
                diagnostics.push(format!(
                    "column {} has no parseable lap times",
                    CanonicalField::BestLapTime
                ));
            }
            fastest.map(|(idx, seconds)| FastestLap {
                number: cell_text(numbers, idx),
                seconds,
                formatted: format_lap_time(seconds),
            })
        }
        None => {
            diagnostics.push(missing(CanonicalField::BestLapTime, "fastest_lap is null"));
            None
        }
    };

    let winner = match string_column(results, CanonicalField::Pos.column_name()) {
        Some(positions) => {
            let mut best: Option<(usize, i64)> = None;
            for (idx, pos) in positions.into_iter().enumerate() {
                let Some(pos) = parse_i64_cell(pos) else {
                    continue;
                };
                if best.is_none_or(|(_, current)| pos < current) {
                    best = Some((idx, pos));
                }
            }
            if best.is_none() {
                diagnostics.push(format!(
                    "column {} has no numeric positions",
                    CanonicalField::Pos
                ));
            }
            let vehicles = string_column(results, CanonicalField::Vehicle.column_name());
            best.map(|(idx, pos)| Winner {
                number: cell_text(numbers, idx),
                vehicle: vehicles.and_then(|v| v.get(idx)).map(str::to_string),
                pos,
            })
        }
        None => {
            diagnostics.push(missing(CanonicalField::Pos, "winner is null"));
            None
        }
    };

    if !has_column(results, CanonicalField::Vehicle.column_name()) {
        diagnostics.push(missing(CanonicalField::Vehicle, "winner vehicle is null"));
    }

    let metrics = SummaryMetrics {
        total_drivers,
        total_laps,
        fastest_lap,
        winner,
    };
    (metrics, diagnostics)
}

fn missing(field: CanonicalField, consequence: &str) -> String {
    format!("column {field} missing; {consequence}")
}

fn cell_text(column: Option<&StringChunked>, idx: usize) -> Option<String> {
    driver_key_value(column?.get(idx))
}
