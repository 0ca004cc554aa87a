//! Transport-safe value tree handed to callers.
//!
//! Derivations compute in `f64` and typed structs. [`Datum`] is where those values, and any
//! cell read straight out of a polars frame, meet the external data model. [`sanitize`] is
//! the one conversion that guarantees no NaN, infinity or library-specific value leaks
//! out.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate};
use polars::prelude::*;
use racedata_parser::column_names;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::Value as JsonValue;

use crate::error::Result;

/// Days from 0001-01-01 (CE) to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

#[derive(Clone)]
pub enum Datum {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Datum>),
    /// Ordered entries; keys keep insertion order.
    Map(Vec<(String, Datum)>),
    /// A value with no structured counterpart, stringified by [`sanitize`].
    Foreign(Arc<dyn fmt::Display + Send + Sync>),
}

/// A derivation result in the external data model.
///
/// The serde representation of a type is its only output schema, so any `Serialize` type
/// converts.
pub trait ToDatum {
    fn to_datum(&self) -> Result<Datum>;
}

impl<T: Serialize + ?Sized> ToDatum for T {
    fn to_datum(&self) -> Result<Datum> {
        Ok(Datum::from(serde_json::to_value(self)?))
    }
}

impl Datum {
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Datum)>,
    {
        Datum::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
        )
    }

    pub fn foreign<T>(value: T) -> Self
    where
        T: fmt::Display + Send + Sync + 'static,
    {
        Datum::Foreign(Arc::new(value))
    }

    pub fn get(&self, key: &str) -> Option<&Datum> {
        match self {
            Datum::Map(entries) => entries
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Datum::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Datum::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Datum]> {
        match self {
            Datum::List(items) => Some(items),
            _ => None,
        }
    }
}

/// Rewrites a value tree into transport-safe primitives.
///
/// Non-finite floats become null and foreign values become their display text. Lists and
/// maps keep their order. The function is total, and applying it twice changes nothing.
pub fn sanitize(value: &Datum) -> Datum {
    match value {
        Datum::Float(number) if !number.is_finite() => Datum::Null,
        Datum::List(items) => Datum::List(items.iter().map(sanitize).collect()),
        Datum::Map(entries) => Datum::Map(
            entries
                .iter()
                .map(|(key, item)| (key.clone(), sanitize(item)))
                .collect(),
        ),
        Datum::Foreign(foreign) => Datum::Text(foreign.to_string()),
        other => other.clone(),
    }
}

/// One map per row, keyed by column name (the "records" orientation).
pub fn frame_records(df: &DataFrame) -> Datum {
    let names = column_names(df);
    let columns = df.get_columns();
    let rows = (0..df.height())
        .map(|idx| {
            Datum::Map(
                names
                    .iter()
                    .zip(columns)
                    .map(|(name, column)| {
                        let cell = column.get(idx).map(Datum::from).unwrap_or(Datum::Null);
                        (name.clone(), cell)
                    })
                    .collect(),
            )
        })
        .collect();
    Datum::List(rows)
}

impl From<AnyValue<'_>> for Datum {
    fn from(value: AnyValue<'_>) -> Self {
        match value {
            AnyValue::Null => Datum::Null,
            AnyValue::Boolean(flag) => Datum::Bool(flag),
            AnyValue::String(text) => Datum::Text(text.to_string()),
            AnyValue::StringOwned(text) => Datum::Text(text.to_string()),
            AnyValue::Int8(number) => Datum::Int(number.into()),
            AnyValue::Int16(number) => Datum::Int(number.into()),
            AnyValue::Int32(number) => Datum::Int(number.into()),
            AnyValue::Int64(number) => Datum::Int(number),
            AnyValue::UInt8(number) => Datum::Int(number.into()),
            AnyValue::UInt16(number) => Datum::Int(number.into()),
            AnyValue::UInt32(number) => Datum::Int(number.into()),
            AnyValue::UInt64(number) => i64::try_from(number)
                .map(Datum::Int)
                .unwrap_or(Datum::Float(number as f64)),
            AnyValue::Float32(number) => Datum::Float(number.into()),
            AnyValue::Float64(number) => Datum::Float(number),
            AnyValue::Date(days) => days
                .checked_add(UNIX_EPOCH_DAYS_FROM_CE)
                .and_then(NaiveDate::from_num_days_from_ce_opt)
                .map(Datum::foreign)
                .unwrap_or(Datum::Null),
            AnyValue::Datetime(ticks, unit, _) => {
                let datetime = match unit {
                    TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(ticks)),
                    TimeUnit::Microseconds => DateTime::from_timestamp_micros(ticks),
                    TimeUnit::Milliseconds => DateTime::from_timestamp_millis(ticks),
                };
                datetime
                    .map(|value| Datum::foreign(value.naive_utc()))
                    .unwrap_or(Datum::Null)
            }
            other => Datum::foreign(other.to_string()),
        }
    }
}

impl From<serde_json::Value> for Datum {
    fn from(value: serde_json::Value) -> Self {
        match value {
            JsonValue::Null => Datum::Null,
            JsonValue::Bool(flag) => Datum::Bool(flag),
            JsonValue::Number(number) => number
                .as_i64()
                .map(Datum::Int)
                .or_else(|| number.as_f64().map(Datum::Float))
                .unwrap_or(Datum::Null),
            JsonValue::String(text) => Datum::Text(text),
            JsonValue::Array(items) => Datum::List(items.into_iter().map(Datum::from).collect()),
            JsonValue::Object(entries) => Datum::Map(
                entries
                    .into_iter()
                    .map(|(key, item)| (key, Datum::from(item)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Datum {
    fn from(value: &str) -> Self {
        Datum::Text(value.to_string())
    }
}

impl fmt::Debug for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Null => f.write_str("Null"),
            Datum::Bool(value) => f.debug_tuple("Bool").field(value).finish(),
            Datum::Int(value) => f.debug_tuple("Int").field(value).finish(),
            Datum::Float(value) => f.debug_tuple("Float").field(value).finish(),
            Datum::Text(value) => f.debug_tuple("Text").field(value).finish(),
            Datum::List(items) => f.debug_list().entries(items).finish(),
            Datum::Map(entries) => f
                .debug_map()
                .entries(entries.iter().map(|(key, value)| (key, value)))
                .finish(),
            Datum::Foreign(value) => write!(f, "Foreign({value})"),
        }
    }
}

impl PartialEq for Datum {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Datum::Null, Datum::Null) => true,
            (Datum::Bool(a), Datum::Bool(b)) => a == b,
            (Datum::Int(a), Datum::Int(b)) => a == b,
            (Datum::Float(a), Datum::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Datum::Text(a), Datum::Text(b)) => a == b,
            (Datum::List(a), Datum::List(b)) => a == b,
            (Datum::Map(a), Datum::Map(b)) => a == b,
            (Datum::Foreign(a), Datum::Foreign(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

impl Serialize for Datum {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Datum::Null => serializer.serialize_none(),
            Datum::Bool(value) => serializer.serialize_bool(*value),
            Datum::Int(value) => serializer.serialize_i64(*value),
            Datum::Float(value) if value.is_finite() => serializer.serialize_f64(*value),
            Datum::Float(_) => serializer.serialize_none(),
            Datum::Text(value) => serializer.serialize_str(value),
            Datum::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Datum::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Datum::Foreign(value) => serializer.collect_str(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::Serialize;

    use super::*;

    fn contains_non_finite(value: &Datum) -> bool {
        match value {
            Datum::Float(number) => !number.is_finite(),
            Datum::List(items) => items.iter().any(contains_non_finite),
            Datum::Map(entries) => entries.iter().any(|(_, item)| contains_non_finite(item)),
            _ => false,
        }
    }

    fn nested_sample() -> Datum {
        Datum::map([
            ("name", Datum::from("car 7")),
            ("pos", Datum::Int(1)),
            ("best", Datum::Float(80.0)),
            ("avg", Datum::Float(f64::NAN)),
            (
                "laps",
                Datum::List(vec![
                    Datum::Float(f64::INFINITY),
                    Datum::Float(90.5),
                    Datum::map([("deep", Datum::Float(f64::NEG_INFINITY))]),
                ]),
            ),
            ("flag", Datum::Bool(true)),
            ("missing", Datum::Null),
            ("when", Datum::foreign(NaiveDate::from_ymd_opt(2025, 4, 27).unwrap())),
        ])
    }

    #[test]
    fn replaces_non_finite_floats_at_any_depth() {
        let clean = sanitize(&nested_sample());

        assert!(!contains_non_finite(&clean));
        assert!(clean.get("avg").unwrap().is_null());
        assert_eq!(clean.get("best"), Some(&Datum::Float(80.0)));

        let laps = clean.get("laps").and_then(Datum::as_list).unwrap();
        assert!(laps[0].is_null());
        assert_eq!(laps[1], Datum::Float(90.5));
        assert!(laps[2].get("deep").unwrap().is_null());
    }

    #[test]
    fn keeps_primitives_and_order() {
        let clean = sanitize(&nested_sample());
        let Datum::Map(entries) = &clean else {
            panic!("expected a map");
        };
        let keys: Vec<&str> = entries.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["name", "pos", "best", "avg", "laps", "flag", "missing", "when"]
        );
        assert_eq!(clean.get("name").and_then(Datum::as_str), Some("car 7"));
        assert_eq!(clean.get("pos").and_then(Datum::as_i64), Some(1));
        assert_eq!(clean.get("flag"), Some(&Datum::Bool(true)));
    }

    #[test]
    fn stringifies_foreign_values() {
        let clean = sanitize(&nested_sample());
        assert_eq!(
            clean.get("when").and_then(Datum::as_str),
            Some("2025-04-27")
        );
    }

    #[test]
    fn sanitize_is_idempotent() {
        let once = sanitize(&nested_sample());
        assert_eq!(sanitize(&once), once);
    }

    #[test]
    fn serializes_as_plain_json() {
        let json = serde_json::to_string(&sanitize(&nested_sample())).unwrap();
        assert_eq!(
            json,
            r#"{"name":"car 7","pos":1,"best":80.0,"avg":null,"laps":[null,90.5,{"deep":null}],"flag":true,"missing":null,"when":"2025-04-27"}"#
        );
    }

    #[derive(Serialize)]
    struct LapRow {
        #[serde(rename = "NUMBER")]
        number: &'static str,
        seconds: f64,
        best: Option<f64>,
        total: u64,
    }

    #[test]
    fn serde_types_convert_in_field_order() {
        let datum = LapRow {
            number: "7",
            seconds: f64::NAN,
            best: Some(80.0),
            total: u64::MAX,
        }
        .to_datum()
        .unwrap();

        let Datum::Map(entries) = &datum else {
            panic!("expected a map");
        };
        let keys: Vec<&str> = entries.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(keys, vec!["NUMBER", "seconds", "best", "total"]);
        assert_eq!(datum.get("NUMBER").and_then(Datum::as_str), Some("7"));
        assert!(datum.get("seconds").unwrap().is_null());
        assert_eq!(datum.get("best"), Some(&Datum::Float(80.0)));
        assert_eq!(datum.get("total"), Some(&Datum::Float(u64::MAX as f64)));
    }

    #[test]
    fn maps_polars_cells() {
        assert_eq!(Datum::from(AnyValue::Int32(7)), Datum::Int(7));
        assert_eq!(Datum::from(AnyValue::UInt64(u64::MAX)), Datum::Float(u64::MAX as f64));
        assert_eq!(Datum::from(AnyValue::Float32(1.5)), Datum::Float(1.5));
        assert_eq!(Datum::from(AnyValue::String("x")), Datum::from("x"));
        assert_eq!(Datum::from(AnyValue::Null), Datum::Null);
        assert_eq!(
            sanitize(&Datum::from(AnyValue::Date(0))),
            Datum::from("1970-01-01")
        );
    }

    #[test]
    fn frame_rows_become_records() {
        let df = DataFrame::new(vec![
            Series::new("NUMBER".into(), vec![Some("7"), Some("12")]).into(),
            Series::new("TIME".into(), vec![Some(80.0), Some(f64::NAN)]).into(),
        ])
        .unwrap();

        let records = sanitize(&frame_records(&df));
        let rows = records.as_list().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("NUMBER").and_then(Datum::as_str), Some("7"));
        assert_eq!(rows[0].get("TIME"), Some(&Datum::Float(80.0)));
        assert!(rows[1].get("TIME").unwrap().is_null());
    }
}
