use std::fs;
use std::path::PathBuf;

use crate::errors::TableError;
use crate::schema::{
    normalize, normalize_with_report, CanonicalField, DRIVER_KEY, LAP_LOG_CAR, LAP_NUMBER, LAP_TIME,
};
use crate::table::{column_names, read_table, read_table_str, sniff_delimiter, string_column};
use crate::{lap_slot_columns, parse_lap_time, require_lap_slots};

fn fixture_path(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/data")
        .join(path)
}

fn fixture(path: &str) -> String {
    let full_path = fixture_path(path);
    fs::read_to_string(&full_path)
        .unwrap_or_else(|err| panic!("failed to read fixture {}: {}", full_path.display(), err))
}

#[test]
fn reads_comma_separated_results() {
    let df = read_table(&fixture_path("05_Results_Race1_Official.csv"))
        .expect("official results failed to load");

    assert_eq!(df.height(), 5);
    assert_eq!(df.width(), 10);
    assert_eq!(column_names(&df)[0], "POSITION");

    let best = string_column(&df, "BEST LAP TIME").expect("best lap column missing");
    assert_eq!(best.get(0), Some("1:39.387"));

    let gap = string_column(&df, "FL_LAPNUM").expect("lap number column missing");
    assert_eq!(gap.get(4), None, "empty cells should load as null");
}

#[test]
fn reads_semicolon_export_with_trailing_delimiter() {
    let df = read_table(&fixture_path("03_Provisional_Results_Race2.CSV"))
        .expect("semicolon results failed to load");

    assert_eq!(
        column_names(&df),
        vec!["POS", "NUMBER", "STATUS", "LAPS", "ELAPSED", "BEST_LAP_TIME", "VEHICLE"]
    );
    assert_eq!(df.height(), 3);
    let vehicle = string_column(&df, "VEHICLE").unwrap();
    assert_eq!(vehicle.get(2), Some("Toyota GR86"));
}

#[test]
fn sniffs_delimiter_from_header_only() {
    assert_eq!(sniff_delimiter(b"A;B;C\n1,5;2;3\n"), b';');
    assert_eq!(sniff_delimiter(b"A,B,C\n1;2;3;4;5\n"), b',');
    assert_eq!(sniff_delimiter(b""), b',');
}

#[test]
fn header_only_file_yields_empty_frame() {
    let df = read_table_str("NUMBER,POS,LAPS\n").expect("header only table should load");
    assert_eq!(df.height(), 0);
    assert_eq!(df.width(), 3);
}

#[test]
fn ragged_rows_are_padded_with_nulls() {
    let df = read_table_str("NUMBER,POS,LAPS\n7,1\n8,2,20,extra\n").unwrap();
    let laps = string_column(&df, "LAPS").unwrap();
    assert_eq!(laps.get(0), None);
    assert_eq!(laps.get(1), Some("20"));
}

#[test]
fn rejects_duplicate_headers() {
    let err = read_table(&fixture_path("duplicate_header.csv")).unwrap_err();
    match err {
        TableError::InvalidHeader { message, .. } => {
            assert!(message.contains("NUMBER"), "unexpected message {message}")
        }
        other => panic!("expected InvalidHeader, got {other:?}"),
    }
}

#[test]
fn rejects_empty_file() {
    let err = read_table_str("").unwrap_err();
    assert!(matches!(err, TableError::InvalidHeader { .. }));
}

#[test]
fn missing_file_is_io_error() {
    let err = read_table(&fixture_path("does_not_exist.csv")).unwrap_err();
    assert!(matches!(err, TableError::Io { .. }));
}

#[test]
fn normalizes_vendor_results_columns() {
    let raw = read_table_str(&fixture("05_Results_Race1_Official.csv")).unwrap();
    let (df, renames) = normalize_with_report(raw).expect("normalize failed");

    assert_eq!(
        column_names(&df),
        vec![
            "POS",
            "NUMBER",
            "STATUS",
            "LAPS",
            "ELAPSED",
            "GAP_FIRST",
            "FL_LAPNUM",
            "BEST_LAP_TIME",
            "CLASS",
            "VEHICLE"
        ]
    );
    let canonical: Vec<CanonicalField> = renames.iter().map(|r| r.canonical).collect();
    assert_eq!(
        canonical,
        vec![
            CanonicalField::BestLapTime,
            CanonicalField::Pos,
            CanonicalField::Elapsed
        ]
    );
    assert_eq!(renames[0].source, "BEST LAP TIME");
}

#[test]
fn normalize_is_idempotent() {
    let raw = read_table_str(&fixture("05_Results_Race1_Official.csv")).unwrap();
    let once = normalize(raw).unwrap();
    let (twice, renames) = normalize_with_report(once.clone()).unwrap();

    assert!(renames.is_empty());
    assert!(once.equals_missing(&twice));
}

#[test]
fn normalize_keeps_existing_canonical_column() {
    let raw = read_table_str("POS,POSITION,PLACE,TIME\n1,2,3,1:00.000\n").unwrap();
    let df = normalize(raw).unwrap();

    assert_eq!(column_names(&df), vec!["POS", "POSITION", "PLACE", "ELAPSED"]);
    assert_eq!(string_column(&df, "POS").unwrap().get(0), Some("1"));
}

#[test]
fn first_present_alias_wins() {
    let raw = read_table_str("PLACE,FASTEST_LAP_TIME,BEST LAP\n1,1:40.000,1:39.000\n").unwrap();
    let df = normalize(raw).unwrap();

    assert_eq!(
        column_names(&df),
        vec!["POS", "FASTEST_LAP_TIME", "BEST_LAP_TIME"]
    );
    assert_eq!(
        string_column(&df, "BEST_LAP_TIME").unwrap().get(0),
        Some("1:39.000")
    );
}

#[test]
fn detects_driver_key_and_lap_slots() {
    let df = read_table_str(&fixture("99_Best_10_Laps_By_Driver_Race1.csv")).unwrap();

    let key = DRIVER_KEY.require(&df, "best laps").expect("driver key missing");
    assert_eq!(key.column, "NUMBER");
    assert_eq!(
        lap_slot_columns(&df),
        vec!["BESTLAP_1", "BESTLAP_2", "BESTLAP_3"]
    );

    let slot = string_column(&df, "BESTLAP_2").unwrap();
    assert_eq!(parse_lap_time(slot.get(2)), None);
}

#[test]
fn driver_key_falls_back_through_aliases() {
    let df = read_table_str("NO,BESTLAP_1\n7,1:40.000\n").unwrap();
    assert_eq!(DRIVER_KEY.probe(&df).unwrap().column, "NO");

    let df = read_table_str("CAR,DRIVER_NUMBER,BESTLAP_1\n7,7,1:40.000\n").unwrap();
    assert_eq!(DRIVER_KEY.probe(&df).unwrap().column, "DRIVER_NUMBER");
}

#[test]
fn missing_driver_key_lists_available_columns() {
    let df = read_table_str("DRIVER,BESTLAP_1\n7,1:40.000\n").unwrap();
    let err = DRIVER_KEY.require(&df, "best laps").unwrap_err();

    assert_eq!(err.available, vec!["DRIVER", "BESTLAP_1"]);
    assert!(err.to_string().contains("DRIVER, BESTLAP_1"));
}

#[test]
fn missing_lap_slots_is_schema_error() {
    let df = read_table_str("NUMBER,BESTLAP_1_LAPNUM\n7,4\n").unwrap();
    let err = require_lap_slots(&df, "best laps").unwrap_err();
    assert!(err.message.contains("BESTLAP_"));
}

#[test]
fn common_probe_requires_both_sides() {
    let left = read_table_str("CAR,NUMBER\n1,1\n").unwrap();
    let right = read_table_str("CAR,POS\n1,1\n").unwrap();
    let (on_left, on_right) = DRIVER_KEY.probe_common(&left, &right).unwrap();
    assert_eq!(on_left.column, "CAR");
    assert_eq!(on_right.column, "CAR");
    assert!(LAP_NUMBER.probe_common(&left, &right).is_none());
}

#[test]
fn probes_ignore_column_case() {
    let df = read_table_str("vehicle_number,lap,value\n5,1,90000\n").unwrap();

    let car = LAP_LOG_CAR.require(&df, "lap log").unwrap();
    assert_eq!(car.field, "car");
    assert_eq!(car.column, "vehicle_number");
    assert_eq!(LAP_NUMBER.probe(&df).unwrap().column, "lap");
    assert_eq!(LAP_TIME.probe(&df).unwrap().column, "value");
}

#[test]
fn common_probe_keeps_each_side_spelling() {
    let left = read_table_str("Number,POS\n7,1\n").unwrap();
    let right = read_table_str("NUMBER,POS\n7,2\n").unwrap();

    let (on_left, on_right) = DRIVER_KEY.probe_common(&left, &right).unwrap();
    assert_eq!(on_left.column, "Number");
    assert_eq!(on_right.column, "NUMBER");
}

#[test]
fn driver_key_values_are_canonical_text() {
    use crate::driver_key_value;

    assert_eq!(driver_key_value(Some(" 7 ")).as_deref(), Some("7"));
    assert_eq!(driver_key_value(Some("7.0")).as_deref(), Some("7"));
    assert_eq!(driver_key_value(Some("7.5")).as_deref(), Some("7.5"));
    assert_eq!(driver_key_value(Some("GR-86")).as_deref(), Some("GR-86"));
    assert_eq!(driver_key_value(Some("")), None);
    assert_eq!(driver_key_value(None), None);
}

#[test]
fn infers_numeric_columns_from_text() {
    use crate::infer_numeric_columns;
    use polars::prelude::DataType;

    let df = read_table(&fixture_path("05_Results_Race1_Official.csv")).unwrap();
    let typed = infer_numeric_columns(&df).unwrap();

    assert_eq!(typed.column("POSITION").unwrap().dtype(), &DataType::Int64);
    assert_eq!(typed.column("NUMBER").unwrap().dtype(), &DataType::Int64);
    assert_eq!(typed.column("FL_LAPNUM").unwrap().dtype(), &DataType::Int64);
    assert_eq!(typed.column("BEST LAP TIME").unwrap().dtype(), &DataType::String);
    assert_eq!(typed.column("STATUS").unwrap().dtype(), &DataType::String);
    assert_eq!(typed.width(), df.width());
}
