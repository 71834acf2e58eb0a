//! Met Office climate series parser.
//!
//! Turns the plain-text regional series published by the Met Office
//! (`<parameter>/date/<region>.txt`) into typed records:
//!
//! - Header metadata (parameter name, unit, region name) from free-form text
//! - Location of the `year jan feb ...` table header
//! - Normalization of the whitespace-delimited table into monthly, seasonal
//!   and annual records
//!
//! Nothing in this crate performs I/O.

pub mod error;
pub mod header;
pub mod period;
pub mod table;

mod document;

// Re-exports
pub use document::{parse_document, ParsedDocument};
pub use error::{ParseError, Result};
pub use header::{extract_metadata, find_data_start, DatasetMetadata, HeaderRule, MetadataField};
pub use period::{ParsePeriodError, ParsedRecord, PeriodType, RecordBreakdown, MONTH_NAMES};
pub use table::{normalize, AbsentReason, Cell, COLUMNS, MISSING_SENTINEL};
