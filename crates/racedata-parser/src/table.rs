use std::collections::HashSet;
use std::fs;
use std::path::Path;

use csv::{ByteRecord, ReaderBuilder, Trim};
use polars::prelude::*;

use crate::errors::TableError;

const MEMORY_SOURCE: &str = "<memory>";
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Reads a delimited export with a header row into a frame of nullable string columns.
///
/// Cells are trimmed and empty cells become null. Typing is left to the callers, which
/// parse each cell softly so that one malformed value never rejects the whole file.
pub fn read_table(path: &Path) -> Result<DataFrame, TableError> {
    let source_name = path.display().to_string();
    let content = fs::read(path).map_err(|source| TableError::Io {
        source_name: source_name.clone(),
        source,
    })?;
    parse_table(&source_name, &content)
}

pub fn read_table_str(content: &str) -> Result<DataFrame, TableError> {
    parse_table(MEMORY_SOURCE, content.as_bytes())
}

/// Picks `;` when the header line carries more semicolons than commas.
pub fn sniff_delimiter(content: &[u8]) -> u8 {
    let header = content
        .split(|byte| *byte == b'\n')
        .next()
        .unwrap_or_default();
    let semicolons = header.iter().filter(|byte| **byte == b';').count();
    let commas = header.iter().filter(|byte| **byte == b',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

fn parse_table(source_name: &str, content: &[u8]) -> Result<DataFrame, TableError> {
    let content = content.strip_prefix(UTF8_BOM).unwrap_or(content);
    let mut reader = ReaderBuilder::new()
        .delimiter(sniff_delimiter(content))
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(content);

    let mut records = reader.byte_records();

    let header = records
        .next()
        .ok_or_else(|| TableError::InvalidHeader {
            source_name: source_name.to_string(),
            message: "file is empty".to_string(),
        })?
        .map_err(|source| TableError::Csv {
            source_name: source_name.to_string(),
            source,
        })?;
    let names = header_names(source_name, &header)?;

    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); names.len()];
    for record in records {
        let record = record.map_err(|source| TableError::Csv {
            source_name: source_name.to_string(),
            source,
        })?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        for (idx, column) in cells.iter_mut().enumerate() {
            column.push(decode_cell(record.get(idx)));
        }
    }

    let columns: Vec<Column> = names
        .iter()
        .zip(cells)
        .map(|(name, values)| {
            let values: Vec<Option<&str>> = values.iter().map(|v| v.as_deref()).collect();
            Series::new(name.as_str().into(), values).into()
        })
        .collect();

    DataFrame::new(columns).map_err(|source| TableError::Polars {
        source_name: source_name.to_string(),
        source,
    })
}

fn header_names(source_name: &str, header: &ByteRecord) -> Result<Vec<String>, TableError> {
    let mut names: Vec<String> = header
        .iter()
        .map(|raw| String::from_utf8_lossy(raw).into_owned())
        .collect();

    // Several vendors terminate every line with the delimiter.
    while names.last().is_some_and(|name| name.is_empty()) {
        names.pop();
    }

    if names.is_empty() {
        return Err(TableError::InvalidHeader {
            source_name: source_name.to_string(),
            message: "header row has no column names".to_string(),
        });
    }

    let mut seen = HashSet::with_capacity(names.len());
    for (idx, name) in names.iter().enumerate() {
        if name.is_empty() {
            return Err(TableError::InvalidHeader {
                source_name: source_name.to_string(),
                message: format!("column {} has an empty name", idx + 1),
            });
        }
        if !seen.insert(name.as_str()) {
            return Err(TableError::InvalidHeader {
                source_name: source_name.to_string(),
                message: format!("duplicate column name '{name}'"),
            });
        }
    }

    Ok(names)
}

fn decode_cell(raw: Option<&[u8]>) -> Option<String> {
    raw.filter(|bytes| !bytes.is_empty())
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_index(name).is_some()
}

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect()
}

/// Returns the first column whose name matches `name` ignoring ASCII case.
pub fn find_column_ignore_case(df: &DataFrame, name: &str) -> Option<String> {
    df.get_column_names()
        .into_iter()
        .find(|candidate| candidate.as_str().eq_ignore_ascii_case(name))
        .map(|candidate| candidate.to_string())
}

/// String view of a column, or `None` when the column is absent or not textual.
pub fn string_column<'a>(df: &'a DataFrame, name: &str) -> Option<&'a StringChunked> {
    df.column(name).ok()?.str().ok()
}

/// Casts every text column whose non-null cells all parse as numbers.
///
/// Columns of whole numbers become `Int64`, other numeric columns `Float64`. A column with
/// any cell that fails to parse keeps its text.
pub fn infer_numeric_columns(df: &DataFrame) -> PolarsResult<DataFrame> {
    let columns = df
        .get_columns()
        .iter()
        .map(infer_numeric)
        .collect::<PolarsResult<Vec<_>>>()?;
    DataFrame::new(columns)
}

fn infer_numeric(column: &Column) -> PolarsResult<Column> {
    if column.dtype() != &DataType::String || column.null_count() == column.len() {
        return Ok(column.clone());
    }
    let floats = column.cast(&DataType::Float64)?;
    if floats.null_count() != column.null_count() {
        return Ok(column.clone());
    }
    let whole = floats
        .f64()?
        .into_iter()
        .flatten()
        .all(|value| value.is_finite() && value.fract() == 0.0);
    if whole {
        floats.cast(&DataType::Int64)
    } else {
        Ok(floats)
    }
}
