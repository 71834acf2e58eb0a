//! Met Office climate series importer.
//!
//! Imports the regional series published by the Met Office into a
//! [`climate_store::ClimateStore`]. Each parameter/region pair runs the same
//! pipeline:
//!
//! 1. [`fetch`] downloads `<base_url>/<parameter>/date/<region>.txt` with retries
//! 2. [`metoffice_parser`] extracts header metadata and normalizes the table
//! 3. [`sink`] resolves the region and parameter and upserts each data point
//!
//! The pipeline is driven either by [`batch::run_batch`] (the `import`
//! command) or by `POST /api/import` in [`server`], which also serves the
//! stored series read-only.

pub mod batch;
pub mod config;
pub mod fetch;
pub mod metrics;
pub mod pipeline;
pub mod server;
pub mod sink;

// Re-exports
pub use batch::{run_batch, BatchAborted, BatchReport, BatchSelection, PairOutcome, PairResult};
pub use config::ImporterConfig;
pub use fetch::{FetchConfig, FetchError, MetOfficeFetcher};
pub use pipeline::{ImportError, ImportOutcome, Importer};
pub use server::{create_router, run_server, ServerState};
pub use sink::{persist, PersistSummary};
