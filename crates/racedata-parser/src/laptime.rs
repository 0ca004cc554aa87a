//! Lap-time strings and soft numeric cell parsing.
//!
//! Every parser here returns `None` instead of an error: malformed cells are routine in
//! timing exports and are excluded from aggregates by the callers.

/// Raw lap values above this are read as milliseconds.
///
/// The exports carry no unit tag, so this is a heuristic threshold and not a property of
/// any vendor format.
pub const DEFAULT_MILLIS_THRESHOLD: f64 = 1000.0;

/// Parses `"<minutes>:<seconds.fraction>"` into seconds.
pub fn parse_lap_time(text: Option<&str>) -> Option<f64> {
    let (minutes, seconds) = text?.trim().split_once(':')?;
    let minutes: u32 = minutes.trim().parse().ok()?;
    let seconds: f64 = seconds.trim().parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some(f64::from(minutes) * 60.0 + seconds)
}

/// Formats seconds as `M:SS.mmm`, rounded to the millisecond.
pub fn format_lap_time(seconds: f64) -> Option<String> {
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    let total_millis = (seconds * 1000.0).round() as u64;
    let minutes = total_millis / 60_000;
    let remainder = total_millis % 60_000;
    Some(format!(
        "{}:{:02}.{:03}",
        minutes,
        remainder / 1000,
        remainder % 1000
    ))
}

pub fn interpret_raw_seconds(value: f64, millis_threshold: f64) -> f64 {
    if value > millis_threshold {
        value / 1000.0
    } else {
        value
    }
}

/// Lap value from either a `M:SS.mmm` string or a bare number of seconds/milliseconds.
pub fn parse_lap_value(text: Option<&str>, millis_threshold: f64) -> Option<f64> {
    if let Some(seconds) = parse_lap_time(text) {
        return Some(seconds);
    }
    let raw = parse_f64_cell(text)?;
    if raw < 0.0 {
        return None;
    }
    Some(interpret_raw_seconds(raw, millis_threshold))
}

pub fn parse_f64_cell(text: Option<&str>) -> Option<f64> {
    let trimmed = text?.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Integer cell; integral floats such as `"3.0"` are accepted.
pub fn parse_i64_cell(text: Option<&str>) -> Option<i64> {
    let trimmed = text?.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = trimmed.parse::<i64>() {
        return Some(value);
    }
    let value = trimmed.parse::<f64>().ok()?;
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}

pub fn parse_flag_cell(text: Option<&str>) -> bool {
    let Some(trimmed) = text.map(str::trim) else {
        return false;
    };
    matches!(
        trimmed.to_ascii_lowercase().as_str(),
        "true" | "t" | "yes" | "y" | "1"
    )
}
