pub mod errors;
pub mod laptime;
pub mod schema;
pub mod table;

pub use errors::{SchemaError, TableError};
pub use laptime::{
    format_lap_time, interpret_raw_seconds, parse_f64_cell, parse_flag_cell, parse_i64_cell,
    parse_lap_time, parse_lap_value, DEFAULT_MILLIS_THRESHOLD,
};
pub use schema::{
    driver_key_value, lap_slot_columns, normalize, normalize_with_report, require_lap_slots,
    AppliedRename, CanonicalField, ColumnProbe, DetectedColumn, DRIVER_KEY,
    LAP_LOG_CAR, LAP_NUMBER, LAP_TIME, PIT_FLAG,
};
pub use table::{
    column_names, find_column_ignore_case, has_column, infer_numeric_columns, read_table,
    read_table_str, string_column,
};

#[cfg(test)]
mod tests;
