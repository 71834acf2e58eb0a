use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::header::{extract_metadata, find_data_start, DatasetMetadata};
use crate::period::ParsedRecord;
use crate::table::normalize;

/// A fully parsed series file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedDocument {
    pub metadata: DatasetMetadata,
    pub records: Vec<ParsedRecord>,
}

/// Parse the raw text of one series file.
///
/// Fails only when the `year jan feb ...` table header is missing.
pub fn parse_document(content: &str) -> Result<ParsedDocument> {
    let lines: Vec<&str> = content.trim().lines().collect();

    let metadata = extract_metadata(&lines);
    let data_start = find_data_start(&lines)?;
    let records = normalize(&lines[data_start..]);

    debug!(
        lines = lines.len(),
        data_start = data_start,
        records = records.len(),
        "Parsed series document"
    );

    Ok(ParsedDocument { metadata, records })
}
