use std::fmt;

use polars::prelude::*;
use serde::{Serialize, Serializer};

use crate::errors::SchemaError;
use crate::table::{column_names, find_column_ignore_case, has_column};

/// Columns every derivation assumes after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CanonicalField {
    Number,
    Pos,
    Vehicle,
    Laps,
    BestLapTime,
    Elapsed,
}

impl CanonicalField {
    pub fn column_name(&self) -> &'static str {
        match self {
            CanonicalField::Number => "NUMBER",
            CanonicalField::Pos => "POS",
            CanonicalField::Vehicle => "VEHICLE",
            CanonicalField::Laps => "LAPS",
            CanonicalField::BestLapTime => "BEST_LAP_TIME",
            CanonicalField::Elapsed => "ELAPSED",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// Vendor aliases per canonical field, in priority order. Matched case-sensitively.
const RENAME_TABLE: &[(CanonicalField, &[&str])] = &[
    (
        CanonicalField::BestLapTime,
        &["BEST LAP", "BEST LAP TIME", "FASTEST_LAP", "FASTEST_LAP_TIME"],
    ),
    (CanonicalField::Pos, &["POSITION", "PLACE"]),
    (CanonicalField::Elapsed, &["TOTAL_TIME", "RACE_TIME", "TIME"]),
    (CanonicalField::Laps, &["LAP_COUNT", "TOTAL_LAPS"]),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedRename {
    pub source: String,
    pub canonical: CanonicalField,
}

pub fn normalize(df: DataFrame) -> PolarsResult<DataFrame> {
    normalize_with_report(df).map(|(df, _)| df)
}

/// Renames vendor columns onto the canonical schema and reports what was renamed.
///
/// A field whose canonical column already exists is left alone, as are any further
/// aliases once the first present alias has been applied. Unrelated columns keep their
/// names and positions, so normalizing twice is the same as normalizing once.
pub fn normalize_with_report(df: DataFrame) -> PolarsResult<(DataFrame, Vec<AppliedRename>)> {
    let renames: Vec<AppliedRename> = RENAME_TABLE
        .iter()
        .filter(|(field, _)| !has_column(&df, field.column_name()))
        .filter_map(|(field, aliases)| {
            aliases
                .iter()
                .find(|alias| has_column(&df, alias))
                .map(|alias| AppliedRename {
                    source: alias.to_string(),
                    canonical: *field,
                })
        })
        .collect();

    if renames.is_empty() {
        return Ok((df, renames));
    }

    let existing: Vec<&str> = renames.iter().map(|r| r.source.as_str()).collect();
    let new: Vec<&str> = renames.iter().map(|r| r.canonical.column_name()).collect();
    let df = df.lazy().rename(existing, new, true).collect()?;

    Ok((df, renames))
}

/// Which alias was chosen for a logical field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedColumn {
    pub field: &'static str,
    /// Column name as spelled in the frame.
    pub column: String,
}

impl Serialize for DetectedColumn {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.column)
    }
}

/// Ordered candidate column names for one logical field, matched ignoring ASCII case.
#[derive(Debug, Clone, Copy)]
pub struct ColumnProbe {
    pub field: &'static str,
    pub candidates: &'static [&'static str],
}

pub const DRIVER_KEY: ColumnProbe = ColumnProbe {
    field: "driver_key",
    candidates: &["NUMBER", "DRIVER_NUMBER", "CAR", "NO"],
};

pub const LAP_LOG_CAR: ColumnProbe = ColumnProbe {
    field: "car",
    candidates: &["NUMBER", "DRIVER_NUMBER", "CAR", "NO", "VEHICLE_NUMBER"],
};

pub const LAP_NUMBER: ColumnProbe = ColumnProbe {
    field: "lap_number",
    candidates: &["LAP_NUMBER", "LAP"],
};

pub const LAP_TIME: ColumnProbe = ColumnProbe {
    field: "lap_time",
    candidates: &["LAP_TIME", "VALUE"],
};

pub const PIT_FLAG: ColumnProbe = ColumnProbe {
    field: "pit_flag",
    candidates: &["CROSSING_FINISH_LINE_IN_PIT", "PIT_FLAG", "PIT"],
};

impl ColumnProbe {
    pub fn probe(&self, df: &DataFrame) -> Option<DetectedColumn> {
        self.candidates
            .iter()
            .find_map(|candidate| find_column_ignore_case(df, candidate))
            .map(|column| self.detected(column))
    }

    pub fn require(&self, df: &DataFrame, context: &str) -> Result<DetectedColumn, SchemaError> {
        self.probe(df).ok_or_else(|| {
            SchemaError::new(
                context,
                format!(
                    "no {} column found (tried {})",
                    self.field,
                    self.candidates.join(", ")
                ),
                column_names(df),
            )
        })
    }

    /// First candidate present in both frames, so a join never mixes identity columns.
    /// Returns the column as spelled on each side.
    pub fn probe_common(
        &self,
        left: &DataFrame,
        right: &DataFrame,
    ) -> Option<(DetectedColumn, DetectedColumn)> {
        self.candidates.iter().find_map(|candidate| {
            let on_left = find_column_ignore_case(left, candidate)?;
            let on_right = find_column_ignore_case(right, candidate)?;
            Some((self.detected(on_left), self.detected(on_right)))
        })
    }

    fn detected(&self, column: String) -> DetectedColumn {
        DetectedColumn {
            field: self.field,
            column,
        }
    }
}

pub const LAP_SLOT_PREFIX: &str = "BESTLAP_";
const LAP_SLOT_NUMBER_SUFFIX: &str = "_LAPNUM";

/// `BESTLAP_<n>` columns in table order, without their `_LAPNUM` companions.
pub fn lap_slot_columns(df: &DataFrame) -> Vec<String> {
    column_names(df)
        .into_iter()
        .filter(|name| {
            name.starts_with(LAP_SLOT_PREFIX) && !name.ends_with(LAP_SLOT_NUMBER_SUFFIX)
        })
        .collect()
}

pub fn require_lap_slots(df: &DataFrame, context: &str) -> Result<Vec<String>, SchemaError> {
    let slots = lap_slot_columns(df);
    if slots.is_empty() {
        return Err(SchemaError::new(
            context,
            format!("no {LAP_SLOT_PREFIX}X columns found"),
            column_names(df),
        ));
    }
    Ok(slots)
}

/// Canonical text for a driver identifier cell: trimmed, with integral floats such as
/// `"7.0"` written as `"7"` so keys from differently typed exports still join.
pub fn driver_key_value(text: Option<&str>) -> Option<String> {
    let trimmed = text?.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = trimmed.parse::<f64>() {
        if value.is_finite() && value.fract() == 0.0 && trimmed.contains('.') {
            return Some((value as i64).to_string());
        }
    }
    Some(trimmed.to_string())
}
