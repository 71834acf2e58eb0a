//! Table normalization.
//!
//! Data rows look like
//!
//! ```text
//! 1990   1.0   2.0 ...  12.0    1.5    4.0    7.0   10.0    5.9
//! ```
//!
//! with the columns listed in [`COLUMNS`]. Missing cells are written as a
//! run of dashes, and the current year is usually short of columns.

use tracing::debug;

use crate::period::{ParsedRecord, PeriodType};

/// Column order of a data row.
pub const COLUMNS: [&str; 18] = [
    "year", "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    "win", "spr", "sum", "aut", "ann",
];

/// Placeholder for a cell with no data.
pub const MISSING_SENTINEL: &str = "---";

const FIRST_MONTH_COLUMN: usize = 1;
const WINTER_COLUMN: usize = 13;
const ANNUAL_COLUMN: usize = 17;

/// Why a cell holds no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbsentReason {
    /// The upstream missing-value marker
    Sentinel,
    /// Neither a number nor the sentinel
    Unparseable,
}

/// A typed table cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell {
    Value(f64),
    Absent(AbsentReason),
}

impl Cell {
    /// Convert a raw token. Never fails: bad input becomes [`Cell::Absent`].
    pub fn parse(token: &str) -> Self {
        let token = token.trim();

        if !token.is_empty() && token.chars().all(|c| c == '-') {
            return Self::Absent(AbsentReason::Sentinel);
        }

        match token.parse::<f64>() {
            Ok(value) if value.is_finite() => Self::Value(value),
            _ => Self::Absent(AbsentReason::Unparseable),
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(*v),
            Self::Absent(_) => None,
        }
    }
}

/// Year of a data row, or `None` for lines that are not data rows.
fn row_year(token: &str) -> Option<i32> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

/// Split a line into exactly [`COLUMNS`]`.len()` tokens, padding with the
/// sentinel and dropping extras.
fn repair_columns(line: &str) -> Vec<&str> {
    let mut tokens: Vec<&str> = line.split_whitespace().take(COLUMNS.len()).collect();
    tokens.resize(COLUMNS.len(), MISSING_SENTINEL);
    tokens
}

/// Normalize the data block of a file into records.
///
/// Lines whose first token is not a year are skipped. For each admitted row
/// the output holds, in order: the twelve monthly values, the annual value,
/// then winter, spring, summer and autumn. Absent cells produce no record.
pub fn normalize<S: AsRef<str>>(data_lines: &[S]) -> Vec<ParsedRecord> {
    let mut records = Vec::with_capacity(data_lines.len() * (COLUMNS.len() - 1));
    let mut rows = 0usize;
    let mut skipped_lines = 0usize;
    let mut unparseable_cells = 0usize;

    for line in data_lines {
        let tokens = repair_columns(line.as_ref());
        let Some(year) = row_year(tokens[0]) else {
            skipped_lines += 1;
            continue;
        };
        rows += 1;

        let cells: Vec<Cell> = tokens[1..].iter().map(|t| Cell::parse(t)).collect();
        unparseable_cells += cells
            .iter()
            .filter(|c| matches!(c, Cell::Absent(AbsentReason::Unparseable)))
            .count();
        let cell = |column: usize| cells[column - 1].value();

        for month in 1..=12u8 {
            let column = FIRST_MONTH_COLUMN + usize::from(month) - 1;
            if let Some(record) = cell(column).and_then(|v| ParsedRecord::monthly(year, month, v)) {
                records.push(record);
            }
        }

        if let Some(record) =
            cell(ANNUAL_COLUMN).and_then(|v| ParsedRecord::aggregate(year, PeriodType::Annual, v))
        {
            records.push(record);
        }

        for (offset, season) in PeriodType::SEASONS.iter().enumerate() {
            if let Some(record) = cell(WINTER_COLUMN + offset)
                .and_then(|v| ParsedRecord::aggregate(year, *season, v))
            {
                records.push(record);
            }
        }
    }

    debug!(
        rows = rows,
        skipped_lines = skipped_lines,
        unparseable_cells = unparseable_cells,
        records = records.len(),
        "Normalized data table"
    );

    records
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_ROW: &str =
        "1990 1.0 2.0 3.0 4.0 5.0 6.0 7.0 8.0 9.0 10.0 11.0 12.0 1.5 4.0 7.0 10.0 5.9";

    #[test]
    fn test_cell_parse() {
        assert_eq!(Cell::parse("4.2"), Cell::Value(4.2));
        assert_eq!(Cell::parse("-3.1"), Cell::Value(-3.1));
        assert_eq!(Cell::parse("---"), Cell::Absent(AbsentReason::Sentinel));
        assert_eq!(Cell::parse("-----"), Cell::Absent(AbsentReason::Sentinel));
        assert_eq!(Cell::parse("n/a"), Cell::Absent(AbsentReason::Unparseable));
        assert_eq!(Cell::parse("NaN"), Cell::Absent(AbsentReason::Unparseable));
        assert_eq!(Cell::parse("inf"), Cell::Absent(AbsentReason::Unparseable));
    }

    #[test]
    fn test_row_year() {
        assert_eq!(row_year("1884"), Some(1884));
        assert_eq!(row_year("-12"), None);
        assert_eq!(row_year("Provisional"), None);
        assert_eq!(row_year(""), None);
        assert_eq!(row_year("99999999999"), None);
    }

    #[test]
    fn test_full_row_emission_order() {
        let records = normalize(&[FULL_ROW]);
        assert_eq!(records.len(), 17);

        for (i, record) in records[..12].iter().enumerate() {
            assert_eq!(record.period_type, PeriodType::Monthly);
            assert_eq!(record.month, Some(i as u8 + 1));
            assert_eq!(record.value, (i + 1) as f64);
            assert_eq!(record.year, 1990);
        }

        assert_eq!(records[12].period_type, PeriodType::Annual);
        assert_eq!(records[12].value, 5.9);

        let seasons: Vec<(PeriodType, f64)> =
            records[13..].iter().map(|r| (r.period_type, r.value)).collect();
        assert_eq!(
            seasons,
            vec![
                (PeriodType::Winter, 1.5),
                (PeriodType::Spring, 4.0),
                (PeriodType::Summer, 7.0),
                (PeriodType::Autumn, 10.0),
            ]
        );
        assert!(records[12..].iter().all(|r| r.month.is_none()));
    }

    #[test]
    fn test_sentinel_january() {
        let line = "1990 --- 2.0 3.0 4.0 5.0 6.0 7.0 8.0 9.0 10.0 11.0 12.0 1.5 4.0 7.0 10.0 5.9";
        let records = normalize(&[line]);

        let monthly: Vec<u8> = records
            .iter()
            .filter(|r| r.period_type == PeriodType::Monthly)
            .filter_map(|r| r.month)
            .collect();
        assert_eq!(monthly, (2..=12).collect::<Vec<u8>>());
        assert_eq!(records.len(), 16);
    }

    #[test]
    fn test_short_row_is_padded() {
        // A year in progress: only Jan-Mar published
        let records = normalize(&["2024 4.1 5.2 6.3"]);

        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.period_type == PeriodType::Monthly));
    }

    #[test]
    fn test_long_row_is_truncated() {
        let line = format!("{} 99.0 98.0", FULL_ROW);
        let records = normalize(&[line.as_str()]);

        assert_eq!(records.len(), 17);
        assert!(records.iter().all(|r| r.value < 98.0));
    }

    #[test]
    fn test_non_data_lines_skipped() {
        let lines = [
            "",
            FULL_ROW,
            "   ",
            "Provisional data for the current year",
            "* footnote",
        ];
        let records = normalize(&lines);
        assert_eq!(records.len(), 17);
    }

    #[test]
    fn test_unparseable_cell_is_absent_not_fatal() {
        let line = "1990 1.0 oops 3.0";
        let records = normalize(&[line]);

        let months: Vec<u8> = records.iter().filter_map(|r| r.month).collect();
        assert_eq!(months, vec![1, 3]);
    }

    #[test]
    fn test_all_records_consistent() {
        let lines = [FULL_ROW, "1991 --- --- 3.0", "1992 1 2 3 4 5 6 7 8 9 10 11 12 --- 1 --- 2 3"];
        let records = normalize(&lines);
        assert!(records.iter().all(|r| r.is_consistent()));
    }

    #[test]
    fn test_empty_input() {
        let lines: [&str; 0] = [];
        assert!(normalize(&lines).is_empty());
    }
}
