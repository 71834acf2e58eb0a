//! Metric names and the Prometheus exporter.
//!
//! Counters are recorded through the `metrics` facade; without an installed
//! recorder (the batch CLI, tests) they are no-ops.

use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub const FETCH_ATTEMPTS_TOTAL: &str = "importer_fetch_attempts_total";
pub const FETCH_FAILURES_TOTAL: &str = "importer_fetch_failures_total";
pub const RECORDS_IMPORTED_TOTAL: &str = "importer_records_imported_total";
pub const PAIRS_TOTAL: &str = "importer_pairs_total";

/// Count one finished parameter/region import.
pub fn record_pair(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!(PAIRS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_imported(records: usize) {
    counter!(RECORDS_IMPORTED_TOTAL).increment(records as u64);
}

/// Install the global Prometheus recorder and return a handle for rendering.
pub fn install_prometheus() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(handle)
}
