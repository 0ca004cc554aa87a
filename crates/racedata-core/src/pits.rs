//! Pit-stop windows from a lap log.
//!
//! An explicit pit-crossing flag is trusted when the log has one. Otherwise a lap counts as
//! a pit lap when it is slower than the car's median lap by more than the configured ratio.

use std::collections::{HashMap, HashSet};

use polars::prelude::*;
use racedata_parser::{
    driver_key_value, parse_flag_cell, parse_i64_cell, parse_lap_value, string_column,
    DetectedColumn, SchemaError, LAP_LOG_CAR, LAP_NUMBER, LAP_TIME, PIT_FLAG,
};
use serde::{Serialize, Serializer};
use tracing::{debug, info};

use crate::error::{EngineError, Result};
use crate::resolver::ArtifactResolver;
use crate::stats::median;

pub const LAP_LOG_PATTERN: &str = "*lap_time*.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PitStrategy {
    Flag,
    Statistical,
}

impl PitStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PitStrategy::Flag => "flag",
            PitStrategy::Statistical => "statistical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitSettings {
    pub threshold_ratio: f64,
    pub millis_threshold: f64,
}

/// Laps per car, cars ordered by number.
pub type PitWindowMap = Vec<(String, Vec<i64>)>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PitWindows {
    Detected {
        strategy: PitStrategy,
        #[serde(serialize_with = "columns_by_field")]
        columns: Vec<DetectedColumn>,
        #[serde(serialize_with = "laps_by_car")]
        windows: PitWindowMap,
    },
    /// No car had a pit lap. `cars_analyzed` counts cars with usable laps, so zero means
    /// the log held nothing to analyze.
    NoneFound {
        strategy: PitStrategy,
        #[serde(serialize_with = "columns_by_field")]
        columns: Vec<DetectedColumn>,
        cars_analyzed: usize,
    },
}

fn columns_by_field<S: Serializer>(
    columns: &[DetectedColumn],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_map(columns.iter().map(|detected| (detected.field, &detected.column)))
}

fn laps_by_car<S: Serializer>(
    windows: &[(String, Vec<i64>)],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_map(windows.iter().map(|(car, laps)| (car, laps)))
}

impl PitWindows {
    pub fn strategy(&self) -> PitStrategy {
        match self {
            PitWindows::Detected { strategy, .. } | PitWindows::NoneFound { strategy, .. } => {
                *strategy
            }
        }
    }

    pub fn windows(&self) -> &[(String, Vec<i64>)] {
        match self {
            PitWindows::Detected { windows, .. } => windows,
            PitWindows::NoneFound { .. } => &[],
        }
    }

    pub fn laps_for(&self, car: &str) -> Option<&[i64]> {
        self.windows()
            .iter()
            .find(|(number, _)| number == car)
            .map(|(_, laps)| laps.as_slice())
    }
}

pub fn detect_pit_windows(
    resolver: &ArtifactResolver,
    track: &str,
    race: &str,
    settings: PitSettings,
) -> Result<PitWindows> {
    let (artifact, laps) = resolver.load(track, race, LAP_LOG_PATTERN)?;
    if laps.height() == 0 {
        return Err(EngineError::InvalidInput(format!(
            "lap log {} for {}/{} (pattern '{}') has no rows",
            artifact.path.display(),
            artifact.track,
            artifact.race,
            artifact.pattern
        )));
    }

    let context = artifact.path.display().to_string();
    let windows =
        detect_in_frame(&laps, settings, &context).map_err(|source| EngineError::Schema {
            track: artifact.track.clone(),
            race: artifact.race.clone(),
            source,
        })?;

    info!(
        track = %artifact.track,
        race = %artifact.race,
        strategy = windows.strategy().as_str(),
        cars_with_stops = windows.windows().len(),
        "pit windows derived"
    );
    Ok(windows)
}

/// Pit windows for one lap-log table.
///
/// The car column is required. Lap numbers come from the lap-number column when present
/// and from each lap's 1-based position within its car otherwise. A repeated lap number
/// keeps its first row, and rows with a lap number that is not a positive integer are
/// skipped.
pub fn detect_in_frame(
    laps: &DataFrame,
    settings: PitSettings,
    context: &str,
) -> std::result::Result<PitWindows, SchemaError> {
    let car = LAP_LOG_CAR.require(laps, context)?;
    let lap_number = LAP_NUMBER.probe(laps);
    let pit_flag = PIT_FLAG.probe(laps);

    let (strategy, value_column) = match pit_flag {
        Some(flag) => (PitStrategy::Flag, flag),
        None => (PitStrategy::Statistical, LAP_TIME.require(laps, context)?),
    };

    let cars = group_laps(laps, &car, lap_number.as_ref(), &value_column);

    let mut columns = vec![car];
    columns.extend(lap_number);
    columns.push(value_column);
    debug!(context, strategy = strategy.as_str(), ?columns, "pit detection columns");

    let mut windows = Vec::new();
    let mut cars_analyzed = 0;

    for (number, rows) in cars {
        let pit_laps: Vec<i64> = match strategy {
            PitStrategy::Flag => {
                cars_analyzed += 1;
                rows.iter()
                    .filter(|(_, value)| parse_flag_cell(value.as_deref()))
                    .map(|(lap, _)| *lap)
                    .collect()
            }
            PitStrategy::Statistical => {
                let times: Vec<(i64, f64)> = rows
                    .iter()
                    .filter_map(|(lap, value)| {
                        parse_lap_value(value.as_deref(), settings.millis_threshold)
                            .map(|seconds| (*lap, seconds))
                    })
                    .collect();
                let seconds: Vec<f64> = times.iter().map(|(_, seconds)| *seconds).collect();
                let Some(typical) = median(&seconds) else {
                    debug!(context, car = %number, "no parseable lap times; car skipped");
                    continue;
                };
                cars_analyzed += 1;
                let threshold = typical * settings.threshold_ratio;
                times
                    .iter()
                    .filter(|(_, seconds)| *seconds > threshold)
                    .map(|(lap, _)| *lap)
                    .collect()
            }
        };

        if !pit_laps.is_empty() {
            windows.push((number, pit_laps));
        }
    }

    if windows.is_empty() {
        return Ok(PitWindows::NoneFound {
            strategy,
            columns,
            cars_analyzed,
        });
    }
    Ok(PitWindows::Detected {
        strategy,
        columns,
        windows,
    })
}

/// `(lap number, raw value)` rows per car, laps ascending and cars in number order.
///
/// A car only gets an entry once one of its rows has a usable lap number.
fn group_laps(
    laps: &DataFrame,
    car: &DetectedColumn,
    lap_number: Option<&DetectedColumn>,
    value: &DetectedColumn,
) -> Vec<(String, Vec<(i64, Option<String>)>)> {
    let cars = string_column(laps, &car.column);
    let lap_numbers = lap_number.and_then(|detected| string_column(laps, &detected.column));
    let values = string_column(laps, &value.column);

    let mut grouped: HashMap<String, Vec<(i64, Option<String>)>> = HashMap::new();
    let mut seen: HashSet<(String, i64)> = HashSet::new();

    for idx in 0..laps.height() {
        let Some(number) = cars.and_then(|column| driver_key_value(column.get(idx))) else {
            continue;
        };
        let lap = match lap_numbers {
            Some(column) => match parse_i64_cell(column.get(idx)) {
                Some(lap) if lap > 0 => lap,
                _ => continue,
            },
            None => grouped.get(&number).map_or(0, Vec::len) as i64 + 1,
        };
        if !seen.insert((number.clone(), lap)) {
            continue;
        }
        let raw = values.and_then(|column| column.get(idx)).map(str::to_string);
        grouped.entry(number).or_default().push((lap, raw));
    }

    let mut cars: Vec<_> = grouped.into_iter().collect();
    cars.sort_by(|(a, _), (b, _)| car_order(a, b));
    for (_, rows) in &mut cars {
        rows.sort_by_key(|(lap, _)| *lap);
    }
    cars
}

/// Numeric car numbers first in numeric order, then everything else as text.
fn car_order(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        (Ok(_), Err(_)) => std::cmp::Ordering::Less,
        (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
