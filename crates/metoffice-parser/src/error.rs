//! Error types for the parser crate.

use thiserror::Error;

/// Errors that abort parsing of a whole document.
///
/// Per-cell problems never surface here; see [`crate::table::Cell`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Could not find the start of data in the file ({lines_scanned} lines scanned)")]
    MissingDataHeader { lines_scanned: usize },
}

/// Result type for parser operations.
pub type Result<T> = std::result::Result<T, ParseError>;
