use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use racedata_core::{DriverAnalysis, ResultsComparison};

const EMPTY: &str = "-";

pub fn drivers_table(analysis: &DriverAnalysis) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            analysis.driver_key.column.as_str(),
            "Fastest",
            "Average",
            "Std dev",
            "Laps",
            "Pos",
            "Vehicle",
            "Elapsed",
        ]);

    for row in &analysis.metrics {
        table.add_row(vec![
            text(row.driver.as_deref()),
            seconds(row.fastest),
            seconds(row.avg_time),
            seconds(row.consistency),
            row.laps_counted.to_string(),
            number(row.pos),
            text(row.vehicle.as_deref()),
            text(row.elapsed.as_deref()),
        ]);
    }
    table
}

pub fn comparison_table(comparison: &ResultsComparison) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            comparison.driver_key.column.as_str(),
            "Vehicle",
            "Provisional",
            "Official",
            "Change",
        ]);

    for entry in &comparison.entries {
        let change = match entry.position_change {
            Some(change) if change > 0 => format!("+{change}"),
            Some(change) => change.to_string(),
            None => EMPTY.to_string(),
        };
        table.add_row(vec![
            entry.number.clone(),
            text(entry.vehicle.as_deref()),
            number(entry.provisional_pos),
            number(entry.official_pos),
            change,
        ]);
    }
    table
}

fn text(value: Option<&str>) -> String {
    value.unwrap_or(EMPTY).to_string()
}

fn number(value: Option<i64>) -> String {
    value.map_or_else(|| EMPTY.to_string(), |value| value.to_string())
}

fn seconds(value: Option<f64>) -> String {
    value.map_or_else(|| EMPTY.to_string(), |value| format!("{value:.3}"))
}
