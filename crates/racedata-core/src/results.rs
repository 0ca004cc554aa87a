use std::cmp::Ordering;
use std::collections::HashMap;

use polars::prelude::*;
use racedata_parser::{
    column_names, driver_key_value, normalize, parse_i64_cell, string_column, CanonicalField,
    DetectedColumn, SchemaError, DRIVER_KEY,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{EngineError, Result};
use crate::resolver::ArtifactResolver;
use crate::summary::OFFICIAL_RESULTS_PATTERN;

pub const PROVISIONAL_RESULTS_PATTERN: &str = "*Provisional*Results*";

/// Which cars a comparison keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinMode {
    /// Every car from either side; the missing side's position is null.
    #[default]
    Outer,
    /// Only cars classified in both result sets.
    Inner,
}

impl JoinMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinMode::Outer => "outer",
            JoinMode::Inner => "inner",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionChange {
    pub number: String,
    pub vehicle: Option<String>,
    pub provisional_pos: Option<i64>,
    pub official_pos: Option<i64>,
    /// `provisional_pos - official_pos`: positive when the car moved up in the official
    /// classification.
    pub position_change: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultsComparison {
    pub driver_key: DetectedColumn,
    pub join: JoinMode,
    pub entries: Vec<PositionChange>,
}

pub fn compare(
    resolver: &ArtifactResolver,
    track: &str,
    race: &str,
    join: JoinMode,
) -> Result<ResultsComparison> {
    let (provisional_artifact, provisional_raw) =
        resolver.load(track, race, PROVISIONAL_RESULTS_PATTERN)?;
    let (_, official_raw) = resolver.load(track, race, OFFICIAL_RESULTS_PATTERN)?;
    let provisional = normalize(provisional_raw)?;
    let official = normalize(official_raw)?;

    let context = format!(
        "{}/{} provisional vs official results",
        provisional_artifact.track, provisional_artifact.race
    );
    let comparison =
        compare_frames(&provisional, &official, join, &context).map_err(|source| {
            EngineError::Schema {
                track: provisional_artifact.track.clone(),
                race: provisional_artifact.race.clone(),
                source,
            }
        })?;

    info!(
        track = %provisional_artifact.track,
        race = %provisional_artifact.race,
        join = comparison.join.as_str(),
        driver_key = %comparison.driver_key.column,
        entries = comparison.entries.len(),
        "results reconciled"
    );
    Ok(comparison)
}

/// Joins two normalized result tables on the first driver key both of them carry.
///
/// Entries follow join order (provisional rows, then official-only rows) before a stable
/// sort on `position_change`, largest first, with nulls last.
pub fn compare_frames(
    provisional: &DataFrame,
    official: &DataFrame,
    join: JoinMode,
    context: &str,
) -> std::result::Result<ResultsComparison, SchemaError> {
    let (driver_key, official_key) = DRIVER_KEY
        .probe_common(provisional, official)
        .ok_or_else(|| {
            SchemaError::new(
                context,
                format!(
                    "no driver_key column common to both tables (tried {}); provisional has [{}]",
                    DRIVER_KEY.candidates.join(", "),
                    column_names(provisional).join(", ")
                ),
                column_names(official),
            )
        })?;

    let provisional_side = ResultSide::new(provisional, &driver_key.column, "provisional");
    let official_side = ResultSide::new(official, &official_key.column, "official");

    let mut entries = Vec::new();
    for (key, provisional_idx) in &provisional_side.order {
        let official_idx = official_side.index.get(key).copied();
        if join == JoinMode::Inner && official_idx.is_none() {
            continue;
        }
        entries.push(entry(
            key,
            Some((&provisional_side, *provisional_idx)),
            official_idx.map(|idx| (&official_side, idx)),
        ));
    }
    if join == JoinMode::Outer {
        for (key, official_idx) in &official_side.order {
            if provisional_side.index.contains_key(key) {
                continue;
            }
            entries.push(entry(key, None, Some((&official_side, *official_idx))));
        }
    }

    entries.sort_by(|a, b| descending_nulls_last(a.position_change, b.position_change));

    Ok(ResultsComparison {
        driver_key,
        join,
        entries,
    })
}

fn entry(
    key: &str,
    provisional: Option<(&ResultSide<'_>, usize)>,
    official: Option<(&ResultSide<'_>, usize)>,
) -> PositionChange {
    let provisional_pos = provisional.and_then(|(side, idx)| side.pos(idx));
    let official_pos = official.and_then(|(side, idx)| side.pos(idx));
    let vehicle = official
        .and_then(|(side, idx)| side.vehicle(idx))
        .or_else(|| provisional.and_then(|(side, idx)| side.vehicle(idx)));

    PositionChange {
        number: key.to_string(),
        vehicle,
        provisional_pos,
        official_pos,
        position_change: provisional_pos.zip(official_pos).map(|(p, o)| p - o),
    }
}

fn descending_nulls_last(a: Option<i64>, b: Option<i64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// One result table keyed by driver, first occurrence winning.
struct ResultSide<'a> {
    order: Vec<(String, usize)>,
    index: HashMap<String, usize>,
    pos: Option<&'a StringChunked>,
    vehicle: Option<&'a StringChunked>,
}

impl<'a> ResultSide<'a> {
    fn new(df: &'a DataFrame, key: &str, side: &'static str) -> Self {
        let mut order = Vec::new();
        let mut index = HashMap::new();

        if let Some(keys) = string_column(df, key) {
            for (idx, cell) in keys.into_iter().enumerate() {
                let Some(value) = driver_key_value(cell) else {
                    warn!(side, row = idx, "result row without driver key skipped");
                    continue;
                };
                if index.contains_key(&value) {
                    warn!(side, driver = %value, "duplicate driver key; keeping first row");
                    continue;
                }
                index.insert(value.clone(), idx);
                order.push((value, idx));
            }
        }

        Self {
            order,
            index,
            pos: string_column(df, CanonicalField::Pos.column_name()),
            vehicle: string_column(df, CanonicalField::Vehicle.column_name()),
        }
    }

    fn pos(&self, idx: usize) -> Option<i64> {
        parse_i64_cell(self.pos?.get(idx))
    }

    fn vehicle(&self, idx: usize) -> Option<String> {
        self.vehicle?.get(idx).map(str::to_string)
    }
}
