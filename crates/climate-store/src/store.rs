//! Storage abstraction used by the importer and the read API.

use async_trait::async_trait;
use metoffice_parser::ParsedRecord;

use crate::error::Result;
use crate::models::{
    DataQuery, NewParameter, NewRegion, Parameter, Region, StoreStats, UpsertOutcome,
    WeatherDataPoint,
};

/// Persistent store of regions, parameters and their data points.
#[async_trait]
pub trait ClimateStore: Send + Sync {
    async fn find_region(&self, code: &str) -> Result<Option<Region>>;

    /// Insert a region. Fails with `StoreError::Conflict` if the code exists.
    async fn insert_region(&self, region: &NewRegion) -> Result<Region>;

    async fn find_parameter(&self, code: &str) -> Result<Option<Parameter>>;

    /// Insert a parameter. Fails with `StoreError::Conflict` if the code exists.
    async fn insert_parameter(&self, parameter: &NewParameter) -> Result<Parameter>;

    /// Create the data point for the record's natural key, or overwrite the
    /// value of the existing one. Concurrent calls on the same key are safe;
    /// the last write wins.
    async fn upsert_data_point(
        &self,
        region_id: i64,
        parameter_id: i64,
        record: &ParsedRecord,
    ) -> Result<UpsertOutcome>;

    /// Regions ordered by name, optionally filtered by a substring of code or name.
    async fn list_regions(&self, search: Option<&str>) -> Result<Vec<Region>>;

    /// Parameters ordered by name, optionally filtered by a substring of code or name.
    async fn list_parameters(&self, search: Option<&str>) -> Result<Vec<Parameter>>;

    async fn query_data(&self, query: &DataQuery) -> Result<Vec<WeatherDataPoint>>;

    /// Number of data points matching the query, ignoring limit and offset.
    async fn count_data(&self, query: &DataQuery) -> Result<u64>;

    /// Total regions, parameters and data points.
    async fn stats(&self) -> Result<StoreStats>;
}
