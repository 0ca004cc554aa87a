use std::collections::HashMap;
use std::path::PathBuf;

use polars::prelude::*;
use racedata_parser::{
    driver_key_value, find_column_ignore_case, normalize, parse_i64_cell, parse_lap_time,
    require_lap_slots, string_column, CanonicalField, DetectedColumn, SchemaError, DRIVER_KEY,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{EngineError, Result};
use crate::resolver::ArtifactResolver;
use crate::stats::{mean, min, sample_std_dev};
use crate::summary::OFFICIAL_RESULTS_PATTERN;

pub const BEST_LAPS_PATTERN: &str = "*Best*Laps*.csv";

/// One best-laps row, joined with its official results metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverMetrics {
    pub driver: Option<String>,
    pub fastest: Option<f64>,
    pub avg_time: Option<f64>,
    pub consistency: Option<f64>,
    pub laps_counted: usize,
    #[serde(rename = "NUMBER")]
    pub number: Option<String>,
    #[serde(rename = "VEHICLE")]
    pub vehicle: Option<String>,
    #[serde(rename = "POS")]
    pub pos: Option<i64>,
    #[serde(rename = "ELAPSED")]
    pub elapsed: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverAnalysis {
    pub driver_key: DetectedColumn,
    /// Column used to look drivers up in the results table, if any.
    pub results_key: Option<String>,
    pub metrics: Vec<DriverMetrics>,
    pub used_file: PathBuf,
}

pub fn analyze(resolver: &ArtifactResolver, track: &str, race: &str) -> Result<DriverAnalysis> {
    let (best_artifact, best_raw) = resolver.load(track, race, BEST_LAPS_PATTERN)?;
    let (_, results_raw) = resolver.load(track, race, OFFICIAL_RESULTS_PATTERN)?;
    let best_laps = normalize(best_raw)?;
    let results = normalize(results_raw)?;

    let context = best_artifact.path.display().to_string();
    let (driver_key, results_key, metrics) = analyze_frames(&best_laps, &results, &context)
        .map_err(|source| EngineError::Schema {
            track: best_artifact.track.clone(),
            race: best_artifact.race.clone(),
            source,
        })?;

    info!(
        track = %best_artifact.track,
        race = %best_artifact.race,
        driver_key = %driver_key.column,
        drivers = metrics.len(),
        "driver performance derived"
    );

    Ok(DriverAnalysis {
        driver_key,
        results_key,
        metrics,
        used_file: best_artifact.path,
    })
}

/// Per-driver lap statistics over normalized best-laps and results tables.
///
/// Every best-laps row yields exactly one metrics row. Results metadata is attached by
/// driver key; drivers absent from the results keep null metadata.
pub fn analyze_frames(
    best_laps: &DataFrame,
    results: &DataFrame,
    context: &str,
) -> std::result::Result<(DetectedColumn, Option<String>, Vec<DriverMetrics>), SchemaError> {
    let driver_key = DRIVER_KEY.require(best_laps, context)?;
    let slots = require_lap_slots(best_laps, context)?;

    let drivers = string_column(best_laps, &driver_key.column);
    let slot_columns: Vec<&StringChunked> = slots
        .iter()
        .filter_map(|slot| string_column(best_laps, slot))
        .collect();

    let results_key = find_column_ignore_case(results, &driver_key.column)
        .or_else(|| find_column_ignore_case(results, CanonicalField::Number.column_name()));
    if results_key.is_none() {
        warn!(context, "results carry no driver key column; metadata left empty");
    }
    let lookup = ResultsLookup::new(results, results_key.as_deref());

    let metrics = (0..best_laps.height())
        .map(|idx| {
            let driver = drivers.and_then(|column| driver_key_value(column.get(idx)));
            let times: Vec<f64> = slot_columns
                .iter()
                .filter_map(|column| parse_lap_time(column.get(idx)))
                .collect();

            let mut row = DriverMetrics {
                driver: driver.clone(),
                fastest: min(&times),
                avg_time: mean(&times),
                consistency: sample_std_dev(&times),
                laps_counted: times.len(),
                number: None,
                vehicle: None,
                pos: None,
                elapsed: None,
            };
            if let Some(result_idx) = driver.as_deref().and_then(|key| lookup.position(key)) {
                lookup.fill(result_idx, &mut row);
            }
            row
        })
        .collect();

    Ok((driver_key, results_key, metrics))
}

/// First-occurrence index of each driver key in a results table.
struct ResultsLookup<'a> {
    rows: HashMap<String, usize>,
    number: Option<&'a StringChunked>,
    vehicle: Option<&'a StringChunked>,
    pos: Option<&'a StringChunked>,
    elapsed: Option<&'a StringChunked>,
}

impl<'a> ResultsLookup<'a> {
    fn new(results: &'a DataFrame, key: Option<&str>) -> Self {
        let mut rows = HashMap::new();
        if let Some(keys) = key.and_then(|key| string_column(results, key)) {
            for (idx, cell) in keys.into_iter().enumerate() {
                let Some(value) = driver_key_value(cell) else {
                    continue;
                };
                if rows.contains_key(&value) {
                    warn!(driver = %value, "duplicate driver key in results; keeping first row");
                    continue;
                }
                rows.insert(value, idx);
            }
        }

        Self {
            rows,
            number: string_column(results, CanonicalField::Number.column_name()),
            vehicle: string_column(results, CanonicalField::Vehicle.column_name()),
            pos: string_column(results, CanonicalField::Pos.column_name()),
            elapsed: string_column(results, CanonicalField::Elapsed.column_name()),
        }
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.rows.get(key).copied()
    }

    fn fill(&self, idx: usize, row: &mut DriverMetrics) {
        row.number = self.number.and_then(|c| driver_key_value(c.get(idx)));
        row.vehicle = self.vehicle.and_then(|c| c.get(idx)).map(str::to_string);
        row.pos = self.pos.and_then(|c| parse_i64_cell(c.get(idx)));
        row.elapsed = self.elapsed.and_then(|c| c.get(idx)).map(str::to_string);
    }
}
