use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("{source_name}: failed to read file: {source}")]
    Io {
        source_name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{source_name} CSV error: {source}")]
    Csv {
        source_name: String,
        #[source]
        source: csv::Error,
    },

    #[error("{source_name} header row invalid: {message}")]
    InvalidHeader {
        source_name: String,
        message: String,
    },

    #[error("{source_name}: failed to build table: {source}")]
    Polars {
        source_name: String,
        #[source]
        source: PolarsError,
    },
}

/// A required column could not be found under any of its known aliases.
#[derive(Debug, Clone, Error)]
#[error("{context}: {message}. Found: [{}]", .available.join(", "))]
pub struct SchemaError {
    pub context: String,
    pub message: String,
    pub available: Vec<String>,
}

impl SchemaError {
    pub fn new(
        context: impl Into<String>,
        message: impl Into<String>,
        available: Vec<String>,
    ) -> Self {
        Self {
            context: context.into(),
            message: message.into(),
            available,
        }
    }
}
