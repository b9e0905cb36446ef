//! Error types for gammarec-response.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for response-file operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading or querying response histograms.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed response file.
    #[error("parse error in {path} at line {line}: {message}")]
    Parse {
        /// File being parsed.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// A response file does not exist.
    #[error("response file not found: {0}")]
    FileNotFound(PathBuf),

    /// The anchor file does not carry the expected suffix.
    #[error("response file {path} does not end in \"{expected}\"")]
    BadSuffix {
        /// Offending path.
        path: PathBuf,
        /// Required suffix.
        expected: &'static str,
    },

    /// A lookup used the wrong number of axis values.
    #[error("histogram has {expected} axes but {got} values were given")]
    DimensionMismatch {
        /// Number of axes.
        expected: usize,
        /// Number of values supplied.
        got: usize,
    },

    /// An axis definition is unusable.
    #[error("invalid axis \"{0}\": {1}")]
    InvalidAxis(String, String),
}
