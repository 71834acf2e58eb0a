//! Stored entities and query filters.

use metoffice_parser::PeriodType;
use serde::{Deserialize, Serialize};

/// A geographical region, keyed by its upstream code (`UK`, `England_N`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Region {
    pub id: i64,
    pub code: String,
    pub name: String,
}

/// A measured quantity, keyed by its upstream code (`Tmax`, `Rainfall`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Parameter {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub unit: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRegion {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewParameter {
    pub code: String,
    pub name: String,
    pub unit: String,
    pub description: Option<String>,
}

/// One stored measurement, with the codes of its region and parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherDataPoint {
    pub id: i64,
    pub region_code: String,
    pub parameter_code: String,
    pub year: i32,
    pub period_type: PeriodType,
    pub month: Option<u8>,
    pub value: f64,
    pub anomaly: Option<f64>,
    /// Month name, or the capitalized period for seasonal and annual values
    pub period_display: &'static str,
}

/// Row counts across the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub regions: u64,
    pub parameters: u64,
    pub data_points: u64,
}

/// Result of an update-or-create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Filters for data point queries. Unset fields do not filter.
///
/// Results are ordered newest year first, then by period type name, then
/// by month descending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataQuery {
    pub region: Option<String>,
    pub parameter: Option<String>,
    pub year: Option<i32>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    /// Matches any of these; empty means all period types
    pub period_types: Vec<PeriodType>,
    pub month: Option<u8>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl DataQuery {
    /// All data for one region/parameter pair.
    pub fn series(region: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self {
            region: Some(region.into()),
            parameter: Some(parameter.into()),
            ..Default::default()
        }
    }

    pub fn with_period_types(mut self, period_types: impl IntoIterator<Item = PeriodType>) -> Self {
        self.period_types = period_types.into_iter().collect();
        self
    }

    pub fn with_year_range(mut self, start_year: Option<i32>, end_year: Option<i32>) -> Self {
        self.start_year = start_year;
        self.end_year = end_year;
        self
    }
}
