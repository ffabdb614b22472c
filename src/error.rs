//! Error types for droidusage
//!
//! This module defines the error types used throughout the droidusage
//! library. All errors are derived from `thiserror` for convenient error
//! handling and automatic `From` implementations.
//!
//! # Example
//!
//! ```
//! use droidusage::error::{DroidusageError, Result};
//!
//! fn example_function() -> Result<()> {
//!     // This will automatically convert io::Error to DroidusageError
//!     let _file = std::fs::read_to_string("nonexistent.txt")?;
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for droidusage operations
///
/// This enum encompasses all possible errors that can occur during
/// droidusage operations, from IO errors to parsing failures.
#[derive(Error, Debug)]
pub enum DroidusageError {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// The sessions directory cannot be read at all
    #[error("Cannot read sessions directory: {0}")]
    SessionsDirectory(PathBuf),

    /// Invalid date format
    #[error("Invalid date format: {0}")]
    InvalidDate(String),

    /// Parse error with file context
    #[error("Parse error in {file}: {error}")]
    Parse {
        /// The file that caused the error
        file: PathBuf,
        /// The error message
        error: String,
    },

    /// An analyzer was handed an unusable session population
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Convenience type alias for Results in droidusage
///
/// # Example
///
/// ```
/// use droidusage::Result;
///
/// fn process_data() -> Result<String> {
///     Ok("Processed successfully".to_string())
/// }
/// ```
pub type Result<T> = std::result::Result<T, DroidusageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = DroidusageError::SessionsDirectory(PathBuf::from("/tmp/sessions"));
        assert_eq!(
            error.to_string(),
            "Cannot read sessions directory: /tmp/sessions"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: DroidusageError = io_error.into();
        assert!(matches!(err, DroidusageError::Io(_)));
    }
}
