//! Relational storage for Met Office regional climate series.
//!
//! Three entities are kept: regions and parameters, each keyed by the code
//! used in upstream URLs, and weather data points keyed by
//! (region, parameter, year, period type, month). The [`ClimateStore`] trait
//! is the seam the importer and the read API work against; [`SqliteStore`]
//! is the sqlx-backed implementation.

pub mod error;
pub mod models;
pub mod sqlite;
pub mod store;

// Re-exports
pub use error::{Result, StoreError};
pub use models::{
    DataQuery, NewParameter, NewRegion, Parameter, Region, StoreStats, UpsertOutcome,
    WeatherDataPoint,
};
pub use sqlite::SqliteStore;
pub use store::ClimateStore;
