// crates/racedata-core/src/error.rs

use std::path::PathBuf;

use racedata_parser::{SchemaError, TableError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No files matching pattern '{pattern}' for {track}/{race} in {}", .folder.display())]
    NotFound {
        track: String,
        race: String,
        pattern: String,
        folder: PathBuf,
    },

    #[error(
        "Multiple files found for pattern '{pattern}' for {track}/{race}, please be more specific: {}",
        display_paths(.matches)
    )]
    Ambiguous {
        track: String,
        race: String,
        pattern: String,
        matches: Vec<PathBuf>,
    },

    #[error("Schema error for {track}/{race}: {source}")]
    Schema {
        track: String,
        race: String,
        #[source]
        source: SchemaError,
    },

    #[error("Failed to load {} (pattern '{pattern}'): {source}", .path.display())]
    Load {
        path: PathBuf,
        pattern: String,
        #[source]
        source: TableError,
    },

    #[error("Invalid file pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("File I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),
}

impl EngineError {
    /// Client-facing conditions: the request named data that is missing, ambiguous or
    /// shaped wrongly, as opposed to a fault in the engine itself.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidInput(_)
                | EngineError::NotFound { .. }
                | EngineError::Ambiguous { .. }
                | EngineError::Schema { .. }
                | EngineError::Pattern { .. }
        )
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, EngineError>;
