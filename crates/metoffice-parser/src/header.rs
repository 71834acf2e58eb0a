//! Header metadata extraction and data-block location.
//!
//! The upstream files open with a few lines of free text, e.g.
//!
//! ```text
//! Mean Temperature (°C) for region UK
//! Areal series, starting from 1884
//! year  jan  feb  mar ...
//! ```
//!
//! Metadata is recovered from that text with an ordered list of
//! [`HeaderRule`]s. The heuristics are best effort: a keyword hit names the
//! parameter or region it is associated with even where the real dataset
//! differs (every temperature series reports as "Maximum Temperature").

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ParseError, Result};

/// Metadata is only looked for in the first lines of a file.
pub const HEADER_SCAN_LINES: usize = 10;

static DATA_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*year\s+jan\s+feb").expect("Invalid data header regex"));

static PARAMETER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Parameter:\s*(?P<name>[^(]*?)\s*(?:\((?P<unit>[^)]*)\)|$)")
        .expect("Invalid parameter regex")
});

static REGION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Region:\s*(?P<name>[^(]*?)\s*(?:\(|$)").expect("Invalid region regex")
});

/// Metadata recovered from a file header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub parameter_name: Option<String>,
    pub unit: Option<String>,
    pub region_name: Option<String>,
}

impl DatasetMetadata {
    pub fn is_empty(&self) -> bool {
        self.parameter_name.is_none() && self.unit.is_none() && self.region_name.is_none()
    }

    fn has(&self, field: MetadataField) -> bool {
        match field {
            MetadataField::Parameter => self.parameter_name.is_some(),
            MetadataField::Region => self.region_name.is_some(),
        }
    }
}

/// Which part of [`DatasetMetadata`] a rule fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataField {
    /// Parameter name, and the unit when the rule knows it
    Parameter,
    Region,
}

/// One header heuristic.
#[derive(Debug)]
pub enum HeaderRule {
    /// Case-insensitive substring test.
    ///
    /// Matches when every needle of at least one group occurs in the line.
    Keyword {
        field: MetadataField,
        any_of: &'static [&'static [&'static str]],
        value: &'static str,
        unit: Option<&'static str>,
    },
    /// Structured `Label: text` line, with the captured `name` (and, for
    /// parameters, an optional `unit`) taken verbatim.
    Pattern {
        field: MetadataField,
        regex: &'static Lazy<Regex>,
    },
}

impl HeaderRule {
    pub fn field(&self) -> MetadataField {
        match self {
            Self::Keyword { field, .. } | Self::Pattern { field, .. } => *field,
        }
    }

    fn keyword_matches(&self, lower: &str) -> bool {
        match self {
            Self::Keyword { any_of, .. } => any_of
                .iter()
                .any(|group| group.iter().all(|needle| lower.contains(needle))),
            Self::Pattern { .. } => false,
        }
    }

    fn apply_keyword(&self, metadata: &mut DatasetMetadata) {
        if let Self::Keyword {
            field, value, unit, ..
        } = self
        {
            match field {
                MetadataField::Parameter => {
                    metadata.parameter_name = Some((*value).to_string());
                    metadata.unit = unit.map(str::to_string);
                }
                MetadataField::Region => metadata.region_name = Some((*value).to_string()),
            }
        }
    }

    fn captures<'l>(&self, line: &'l str) -> Option<Captures<'l>> {
        match self {
            Self::Pattern { regex, .. } => regex.captures(line),
            Self::Keyword { .. } => None,
        }
    }
}

/// Header heuristics in evaluation order.
///
/// Within a line, the first keyword rule that matches for a field wins.
/// Across lines, the last matching line wins. Pattern rules only run for a
/// field no keyword rule filled.
pub static HEADER_RULES: [HeaderRule; 11] = [
    HeaderRule::Keyword {
        field: MetadataField::Parameter,
        any_of: &[&["temperature"]],
        value: "Maximum Temperature",
        unit: Some("°C"),
    },
    HeaderRule::Keyword {
        field: MetadataField::Parameter,
        any_of: &[&["rainfall"]],
        value: "Rainfall",
        unit: Some("mm"),
    },
    HeaderRule::Keyword {
        field: MetadataField::Parameter,
        any_of: &[&["sunshine"]],
        value: "Sunshine",
        unit: Some("hours"),
    },
    HeaderRule::Keyword {
        field: MetadataField::Region,
        any_of: &[&["uk"]],
        value: "United Kingdom",
        unit: None,
    },
    HeaderRule::Keyword {
        field: MetadataField::Region,
        any_of: &[&["england", "wales"]],
        value: "England and Wales",
        unit: None,
    },
    HeaderRule::Keyword {
        field: MetadataField::Region,
        any_of: &[&["england"]],
        value: "England",
        unit: None,
    },
    HeaderRule::Keyword {
        field: MetadataField::Region,
        any_of: &[&["scotland"]],
        value: "Scotland",
        unit: None,
    },
    HeaderRule::Keyword {
        field: MetadataField::Region,
        any_of: &[&["wales"]],
        value: "Wales",
        unit: None,
    },
    HeaderRule::Keyword {
        field: MetadataField::Region,
        any_of: &[&["northern ireland"], &["n ireland"]],
        value: "Northern Ireland",
        unit: None,
    },
    HeaderRule::Pattern {
        field: MetadataField::Parameter,
        regex: &PARAMETER_PATTERN,
    },
    HeaderRule::Pattern {
        field: MetadataField::Region,
        regex: &REGION_PATTERN,
    },
];

/// Extract best-effort metadata from the first [`HEADER_SCAN_LINES`] lines.
pub fn extract_metadata<S: AsRef<str>>(lines: &[S]) -> DatasetMetadata {
    let header = &lines[..lines.len().min(HEADER_SCAN_LINES)];
    let mut metadata = DatasetMetadata::default();

    for line in header {
        let lower = line.as_ref().to_lowercase();

        for field in [MetadataField::Parameter, MetadataField::Region] {
            if let Some(rule) = HEADER_RULES
                .iter()
                .filter(|rule| rule.field() == field)
                .find(|rule| rule.keyword_matches(&lower))
            {
                rule.apply_keyword(&mut metadata);
            }
        }
    }

    let found_by_keyword = [MetadataField::Parameter, MetadataField::Region]
        .map(|field| metadata.has(field));

    for line in header {
        for rule in &HEADER_RULES {
            let field = rule.field();
            let already_found = match field {
                MetadataField::Parameter => found_by_keyword[0],
                MetadataField::Region => found_by_keyword[1],
            };
            if already_found {
                continue;
            }

            let Some(caps) = rule.captures(line.as_ref()) else {
                continue;
            };
            let name = caps.name("name").map(|m| m.as_str().trim()).unwrap_or("");
            if name.is_empty() {
                continue;
            }

            match field {
                MetadataField::Parameter => {
                    metadata.parameter_name = Some(name.to_string());
                    metadata.unit = caps
                        .name("unit")
                        .map(|m| m.as_str().trim().to_string())
                        .filter(|u| !u.is_empty());
                }
                MetadataField::Region => metadata.region_name = Some(name.to_string()),
            }
        }
    }

    debug!(
        parameter = ?metadata.parameter_name,
        unit = ?metadata.unit,
        region = ?metadata.region_name,
        "Extracted header metadata"
    );

    metadata
}

/// Index of the first data line: the line after the `year jan feb ...` header.
pub fn find_data_start<S: AsRef<str>>(lines: &[S]) -> Result<usize> {
    lines
        .iter()
        .position(|line| DATA_HEADER.is_match(line.as_ref()))
        .map(|idx| {
            debug!(line = idx, "Found data header");
            idx + 1
        })
        .ok_or(ParseError::MissingDataHeader {
            lines_scanned: lines.len(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temperature_header() {
        let lines = ["Mean Temperature (°C) for region UK", "year jan feb"];
        let metadata = extract_metadata(&lines);

        assert_eq!(metadata.parameter_name.as_deref(), Some("Maximum Temperature"));
        assert_eq!(metadata.unit.as_deref(), Some("°C"));
        assert_eq!(metadata.region_name.as_deref(), Some("United Kingdom"));
    }

    #[test]
    fn test_rainfall_and_sunshine_keywords() {
        let metadata = extract_metadata(&["Rainfall (mm) areal series"]);
        assert_eq!(metadata.parameter_name.as_deref(), Some("Rainfall"));
        assert_eq!(metadata.unit.as_deref(), Some("mm"));

        let metadata = extract_metadata(&["SUNSHINE total"]);
        assert_eq!(metadata.parameter_name.as_deref(), Some("Sunshine"));
        assert_eq!(metadata.unit.as_deref(), Some("hours"));
    }

    #[test]
    fn test_first_parameter_keyword_wins_within_line() {
        let metadata = extract_metadata(&["Temperature and rainfall summary"]);
        assert_eq!(metadata.parameter_name.as_deref(), Some("Maximum Temperature"));
    }

    #[test]
    fn test_region_keyword_priority() {
        let cases = [
            ("Series for England and Wales", "England and Wales"),
            ("Series for England", "England"),
            ("Series for Scotland", "Scotland"),
            ("Series for Wales", "Wales"),
            ("Series for Northern Ireland", "Northern Ireland"),
            ("Series for N Ireland", "Northern Ireland"),
            ("Series for the UK and England", "United Kingdom"),
        ];

        for (line, expected) in cases {
            let metadata = extract_metadata(&[line]);
            assert_eq!(metadata.region_name.as_deref(), Some(expected), "line: {}", line);
        }
    }

    #[test]
    fn test_last_matching_line_wins() {
        let lines = ["Rainfall series", "Region summary for Scotland", "Sunshine for Wales"];
        let metadata = extract_metadata(&lines);

        assert_eq!(metadata.parameter_name.as_deref(), Some("Sunshine"));
        assert_eq!(metadata.region_name.as_deref(), Some("Wales"));
    }

    #[test]
    fn test_only_first_ten_lines_scanned() {
        let mut lines = vec!["filler"; HEADER_SCAN_LINES];
        lines.push("Rainfall for Scotland");
        let metadata = extract_metadata(&lines);

        assert!(metadata.is_empty());
    }

    #[test]
    fn test_pattern_fallback() {
        let lines = ["Parameter: Air Frost (days)", "Region: Midlands"];
        let metadata = extract_metadata(&lines);

        assert_eq!(metadata.parameter_name.as_deref(), Some("Air Frost"));
        assert_eq!(metadata.unit.as_deref(), Some("days"));
        assert_eq!(metadata.region_name.as_deref(), Some("Midlands"));
    }

    #[test]
    fn test_pattern_fallback_without_unit() {
        let metadata = extract_metadata(&["Parameter: Days of ground frost"]);

        assert_eq!(metadata.parameter_name.as_deref(), Some("Days of ground frost"));
        assert_eq!(metadata.unit, None);
    }

    #[test]
    fn test_pattern_only_fills_fields_keywords_missed() {
        let lines = ["Rainfall series", "Parameter: Something else (in)", "Region: East Anglia"];
        let metadata = extract_metadata(&lines);

        assert_eq!(metadata.parameter_name.as_deref(), Some("Rainfall"));
        assert_eq!(metadata.unit.as_deref(), Some("mm"));
        assert_eq!(metadata.region_name.as_deref(), Some("East Anglia"));
    }

    #[test]
    fn test_non_ascii_header_does_not_panic() {
        let lines = ["Mean Temperature (Â°C) Ã© for Écosse", "\u{FFFD}\u{FFFD} year"];
        let metadata = extract_metadata(&lines);
        assert_eq!(metadata.parameter_name.as_deref(), Some("Maximum Temperature"));
    }

    #[test]
    fn test_find_data_start() {
        let lines = ["Header", "", "  YEAR   JAN   FEB   MAR", "1884 1.0 2.0"];
        assert_eq!(find_data_start(&lines).unwrap(), 3);
    }

    #[test]
    fn test_find_data_start_first_match_only() {
        let lines = ["year jan feb", "1990 1.0", "year jan feb", "1991 2.0"];
        assert_eq!(find_data_start(&lines).unwrap(), 1);
    }

    #[test]
    fn test_missing_data_header_is_error() {
        let lines = ["Header", "1990 1.0 2.0"];
        let err = find_data_start(&lines).unwrap_err();
        assert_eq!(err, ParseError::MissingDataHeader { lines_scanned: 2 });
    }
}
