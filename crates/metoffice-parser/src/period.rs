//! Period vocabulary shared by the parser and the store.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// English month names, January first.
pub const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

/// Time span a measurement covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Monthly,
    Winter,
    Spring,
    Summer,
    Autumn,
    Annual,
}

impl PeriodType {
    /// Seasons in the order the upstream table lists them.
    pub const SEASONS: [PeriodType; 4] = [
        PeriodType::Winter,
        PeriodType::Spring,
        PeriodType::Summer,
        PeriodType::Autumn,
    ];

    /// Stable lowercase name, used for storage and the JSON API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Winter => "winter",
            Self::Spring => "spring",
            Self::Summer => "summer",
            Self::Autumn => "autumn",
            Self::Annual => "annual",
        }
    }

    /// Column code in the upstream table header (`win`, `ann`, ...).
    ///
    /// Monthly values are spread across twelve columns, so there is no
    /// single code for them.
    pub fn column_code(&self) -> Option<&'static str> {
        match self {
            Self::Monthly => None,
            Self::Winter => Some("win"),
            Self::Spring => Some("spr"),
            Self::Summer => Some("sum"),
            Self::Autumn => Some("aut"),
            Self::Annual => Some("ann"),
        }
    }

    /// Human-readable period: the month name for monthly values, otherwise
    /// the capitalized period (`Winter`, `Annual`, ...).
    pub fn label(&self, month: Option<u8>) -> &'static str {
        match (self, month) {
            (Self::Monthly, Some(m)) if (1..=12).contains(&m) => MONTH_NAMES[usize::from(m) - 1],
            (Self::Monthly, _) => "Monthly",
            (Self::Winter, _) => "Winter",
            (Self::Spring, _) => "Spring",
            (Self::Summer, _) => "Summer",
            (Self::Autumn, _) => "Autumn",
            (Self::Annual, _) => "Annual",
        }
    }

    pub fn is_seasonal(&self) -> bool {
        Self::SEASONS.contains(self)
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown period type: {0}")]
pub struct ParsePeriodError(pub String);

impl FromStr for PeriodType {
    type Err = ParsePeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "monthly" => Ok(Self::Monthly),
            "winter" | "win" => Ok(Self::Winter),
            "spring" | "spr" => Ok(Self::Spring),
            "summer" | "sum" => Ok(Self::Summer),
            "autumn" | "aut" => Ok(Self::Autumn),
            "annual" | "ann" => Ok(Self::Annual),
            _ => Err(ParsePeriodError(s.to_string())),
        }
    }
}

/// One normalized measurement from a climate table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParsedRecord {
    pub year: i32,
    pub period_type: PeriodType,
    /// 1-12 for monthly records, `None` otherwise
    pub month: Option<u8>,
    pub value: f64,
}

impl ParsedRecord {
    /// Monthly record. Returns `None` when `month` is outside 1-12.
    pub fn monthly(year: i32, month: u8, value: f64) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self {
            year,
            period_type: PeriodType::Monthly,
            month: Some(month),
            value,
        })
    }

    /// Seasonal or annual record. Returns `None` for [`PeriodType::Monthly`].
    pub fn aggregate(year: i32, period_type: PeriodType, value: f64) -> Option<Self> {
        (period_type != PeriodType::Monthly).then_some(Self {
            year,
            period_type,
            month: None,
            value,
        })
    }

    /// Whether `month` agrees with `period_type`.
    pub fn is_consistent(&self) -> bool {
        match (self.period_type, self.month) {
            (PeriodType::Monthly, Some(m)) => (1..=12).contains(&m),
            (PeriodType::Monthly, None) => false,
            (_, month) => month.is_none(),
        }
    }
}

/// Record counts by period family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecordBreakdown {
    pub monthly: usize,
    pub seasonal: usize,
    pub annual: usize,
}

impl RecordBreakdown {
    pub fn from_records(records: &[ParsedRecord]) -> Self {
        records.iter().fold(Self::default(), |mut acc, r| {
            match r.period_type {
                PeriodType::Monthly => acc.monthly += 1,
                PeriodType::Annual => acc.annual += 1,
                _ => acc.seasonal += 1,
            }
            acc
        })
    }

    pub fn total(&self) -> usize {
        self.monthly + self.seasonal + self.annual
    }
}

impl fmt::Display for RecordBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} monthly, {} annual, {} seasonal",
            self.monthly, self.annual, self.seasonal
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_type_round_trips_through_str() {
        for period in [
            PeriodType::Monthly,
            PeriodType::Winter,
            PeriodType::Spring,
            PeriodType::Summer,
            PeriodType::Autumn,
            PeriodType::Annual,
        ] {
            assert_eq!(period.as_str().parse::<PeriodType>().unwrap(), period);
        }
    }

    #[test]
    fn test_period_type_accepts_column_codes() {
        assert_eq!("win".parse::<PeriodType>().unwrap(), PeriodType::Winter);
        assert_eq!("ANN".parse::<PeriodType>().unwrap(), PeriodType::Annual);
        assert_eq!(" aut ".parse::<PeriodType>().unwrap(), PeriodType::Autumn);
        assert!("fortnightly".parse::<PeriodType>().is_err());
    }

    #[test]
    fn test_period_type_serializes_lowercase() {
        let json = serde_json::to_string(&PeriodType::Summer).unwrap();
        assert_eq!(json, "\"summer\"");
    }

    #[test]
    fn test_labels() {
        assert_eq!(PeriodType::Monthly.label(Some(1)), "January");
        assert_eq!(PeriodType::Monthly.label(Some(12)), "December");
        assert_eq!(PeriodType::Monthly.label(None), "Monthly");
        assert_eq!(PeriodType::Monthly.label(Some(13)), "Monthly");
        assert_eq!(PeriodType::Winter.label(None), "Winter");
        assert_eq!(PeriodType::Annual.label(None), "Annual");
    }

    #[test]
    fn test_monthly_constructor_rejects_bad_month() {
        assert!(ParsedRecord::monthly(1990, 0, 1.0).is_none());
        assert!(ParsedRecord::monthly(1990, 13, 1.0).is_none());

        let record = ParsedRecord::monthly(1990, 12, 1.0).unwrap();
        assert_eq!(record.month, Some(12));
        assert!(record.is_consistent());
    }

    #[test]
    fn test_aggregate_constructor_has_no_month() {
        assert!(ParsedRecord::aggregate(1990, PeriodType::Monthly, 1.0).is_none());

        let record = ParsedRecord::aggregate(1990, PeriodType::Winter, 1.5).unwrap();
        assert_eq!(record.month, None);
        assert!(record.is_consistent());
    }

    #[test]
    fn test_inconsistent_records_detected() {
        let record = ParsedRecord {
            year: 2000,
            period_type: PeriodType::Annual,
            month: Some(3),
            value: 0.0,
        };
        assert!(!record.is_consistent());

        let record = ParsedRecord {
            year: 2000,
            period_type: PeriodType::Monthly,
            month: None,
            value: 0.0,
        };
        assert!(!record.is_consistent());
    }

    #[test]
    fn test_breakdown_counts() {
        let records = vec![
            ParsedRecord::monthly(2000, 1, 1.0).unwrap(),
            ParsedRecord::monthly(2000, 2, 1.0).unwrap(),
            ParsedRecord::aggregate(2000, PeriodType::Annual, 1.0).unwrap(),
            ParsedRecord::aggregate(2000, PeriodType::Spring, 1.0).unwrap(),
        ];

        let breakdown = RecordBreakdown::from_records(&records);
        assert_eq!(breakdown.monthly, 2);
        assert_eq!(breakdown.annual, 1);
        assert_eq!(breakdown.seasonal, 1);
        assert_eq!(breakdown.total(), 4);
        assert_eq!(breakdown.to_string(), "2 monthly, 1 annual, 1 seasonal");
    }
}
