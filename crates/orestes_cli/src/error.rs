//! CLI error type.

use orestes_core::OrmError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by the commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// A file could not be read or output could not be written.
    #[error("{path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A file is not valid JSON.
    #[error("{path}: invalid JSON: {source}")]
    Json {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },

    /// The mapper rejected the input.
    #[error(transparent)]
    Orm(#[from] OrmError),

    /// Writing the output failed.
    #[error("output error: {0}")]
    Output(#[from] std::io::Error),
}

/// Result type of the commands.
pub type CliResult<T> = Result<T, CliError>;

/// Reads and parses a JSON file.
pub fn read_json(path: &std::path::Path) -> CliResult<serde_json::Value> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CliError::Json {
        path: path.to_path_buf(),
        source,
    })
}
