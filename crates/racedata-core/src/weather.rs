use polars::prelude::*;
use racedata_parser::{find_column_ignore_case, string_column};
use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::resolver::ArtifactResolver;
use crate::stats::{max, mean, round_to};

pub const WEATHER_PATTERN: &str = "*Weather*";

const TIME_COLUMN: &str = "TIME_UTC_STR";
const AIR_TEMP_COLUMN: &str = "AIR_TEMP";
const TRACK_TEMP_COLUMN: &str = "TRACK_TEMP";
const HUMIDITY_COLUMN: &str = "HUMIDITY";
const WIND_SPEED_COLUMN: &str = "WIND_SPEED";
const RAIN_COLUMN: &str = "RAIN";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct WeatherSample {
    pub time_utc_str: Option<String>,
    pub air_temp: Option<f64>,
    pub track_temp: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub rain: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct WeatherSummary {
    pub avg_air_temp: Option<f64>,
    pub max_track_temp: Option<f64>,
    pub avg_humidity: Option<f64>,
    pub avg_wind_speed: Option<f64>,
    /// `None` when the export has no rain column at all.
    pub rain_detected: Option<bool>,
    pub weather_timeline: Vec<WeatherSample>,
}

impl WeatherSummary {
    /// Result for a race without a weather export.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Weather is optional per race: a missing export yields [`WeatherSummary::empty`].
pub fn summarize_weather(
    resolver: &ArtifactResolver,
    track: &str,
    race: &str,
) -> Result<WeatherSummary> {
    let Some(artifact) = resolver.resolve_optional(track, race, WEATHER_PATTERN)? else {
        info!(track, race, "no weather export; returning empty summary");
        return Ok(WeatherSummary::empty());
    };

    let df = resolver.read(&artifact)?;
    let summary = summarize_frame(&df)?;
    info!(
        track = %artifact.track,
        race = %artifact.race,
        samples = summary.weather_timeline.len(),
        "weather summarized"
    );
    Ok(summary)
}

pub fn summarize_frame(df: &DataFrame) -> PolarsResult<WeatherSummary> {
    let air = numeric_values(df, AIR_TEMP_COLUMN)?;
    let track = numeric_values(df, TRACK_TEMP_COLUMN)?;
    let humidity = numeric_values(df, HUMIDITY_COLUMN)?;
    let wind = numeric_values(df, WIND_SPEED_COLUMN)?;
    let rain = numeric_values(df, RAIN_COLUMN)?;
    let times =
        find_column_ignore_case(df, TIME_COLUMN).and_then(|name| string_column(df, &name));

    let weather_timeline = (0..df.height())
        .map(|idx| WeatherSample {
            time_utc_str: times.and_then(|column| column.get(idx)).map(str::to_string),
            air_temp: value_at(air.as_deref(), idx),
            track_temp: value_at(track.as_deref(), idx),
            humidity: value_at(humidity.as_deref(), idx),
            wind_speed: value_at(wind.as_deref(), idx),
            rain: value_at(rain.as_deref(), idx),
        })
        .collect();

    Ok(WeatherSummary {
        avg_air_temp: rounded(air.as_deref(), mean),
        max_track_temp: rounded(track.as_deref(), max),
        avg_humidity: rounded(humidity.as_deref(), mean),
        avg_wind_speed: rounded(wind.as_deref(), mean),
        rain_detected: rain
            .as_ref()
            .map(|values| values.iter().flatten().any(|value| *value > 0.0)),
        weather_timeline,
    })
}

/// A column matched by name ignoring case and cast to `Float64`. Cells that do not parse,
/// or parse to a non-finite value, are null.
fn numeric_values(df: &DataFrame, name: &str) -> PolarsResult<Option<Vec<Option<f64>>>> {
    let Some(actual) = find_column_ignore_case(df, name) else {
        return Ok(None);
    };
    let column = df.column(&actual)?.cast(&DataType::Float64)?;
    let values = column
        .f64()?
        .into_iter()
        .map(|value| value.filter(|number| number.is_finite()))
        .collect();
    Ok(Some(values))
}

fn value_at(values: Option<&[Option<f64>]>, idx: usize) -> Option<f64> {
    values?.get(idx).copied().flatten()
}

fn rounded(
    values: Option<&[Option<f64>]>,
    aggregate: fn(&[f64]) -> Option<f64>,
) -> Option<f64> {
    let present: Vec<f64> = values?.iter().flatten().copied().collect();
    aggregate(&present).map(|value| round_to(value, 2))
}
