//! Batch import over many parameter/region pairs.

use std::fmt;

use chrono::{DateTime, Utc};
use metoffice_parser::RecordBreakdown;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use crate::metrics;
use crate::pipeline::{ImportError, Importer};

/// Which pairs a batch run covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSelection {
    pub parameter: Option<String>,
    pub region: Option<String>,
    pub all_parameters: bool,
    pub all_regions: bool,
}

impl BatchSelection {
    /// True when exactly one explicit pair was asked for.
    pub fn is_single_pair(&self) -> bool {
        self.parameter.is_some() && self.region.is_some() && !self.all_parameters && !self.all_regions
    }

    /// Default failure policy: keep going unless a single pair was asked for.
    pub fn continue_on_error(&self) -> bool {
        !self.is_single_pair()
    }

    /// Expand the selection against the configured catalog, parameter-major.
    ///
    /// An `all_*` flag wins over an explicit code; a dimension with neither
    /// covers the whole catalog.
    pub fn resolve(&self, parameters: &[String], regions: &[String]) -> Vec<(String, String)> {
        let parameters = pick(self.all_parameters, self.parameter.as_deref(), parameters);
        let regions = pick(self.all_regions, self.region.as_deref(), regions);

        parameters
            .iter()
            .flat_map(|p| regions.iter().map(move |r| (p.clone(), r.clone())))
            .collect()
    }
}

fn pick(all: bool, explicit: Option<&str>, catalog: &[String]) -> Vec<String> {
    match (all, explicit) {
        (false, Some(code)) => vec![code.to_string()],
        _ => catalog.to_vec(),
    }
}

/// What happened to one pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PairResult {
    Imported {
        records: usize,
        breakdown: RecordBreakdown,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairOutcome {
    pub parameter: String,
    pub region: String,
    pub outcome: PairResult,
}

impl PairOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, PairResult::Imported { .. })
    }
}

impl fmt::Display for PairOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            PairResult::Imported { records, breakdown } => write!(
                f,
                "Successfully imported {} records for {} in {} ({})",
                records, self.parameter, self.region, breakdown
            ),
            PairResult::Failed { error } => write!(
                f,
                "Error importing data for {} in {}: {}",
                self.parameter, self.region, error
            ),
        }
    }
}

/// Per-pair outcomes of a batch run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub outcomes: Vec<PairOutcome>,
    pub total_records: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// A batch stopped at its first failure.
#[derive(Error, Debug)]
#[error("Import failed: {source}")]
pub struct BatchAborted {
    pub parameter: String,
    pub region: String,
    #[source]
    pub source: ImportError,
    /// Outcomes up to and including the failed pair
    pub report: BatchReport,
}

/// Import every pair in order.
///
/// With `continue_on_error` a failed pair is recorded and the run moves on;
/// without it the first failure ends the run. `on_outcome` sees each
/// outcome as soon as it is known.
pub async fn run_batch<F>(
    importer: &Importer,
    pairs: &[(String, String)],
    continue_on_error: bool,
    mut on_outcome: F,
) -> Result<BatchReport, BatchAborted>
where
    F: FnMut(&PairOutcome),
{
    let started_at = Utc::now();
    let mut outcomes = Vec::with_capacity(pairs.len());
    let mut total_records = 0;

    info!(
        pairs = pairs.len(),
        continue_on_error = continue_on_error,
        "Starting batch import"
    );

    for (parameter, region) in pairs {
        info!(parameter = %parameter, region = %region, "Importing series");

        match importer.import(parameter, region).await {
            Ok(imported) => {
                let records = imported.records_imported();
                total_records += records;
                metrics::record_pair(true);

                let outcome = PairOutcome {
                    parameter: parameter.clone(),
                    region: region.clone(),
                    outcome: PairResult::Imported {
                        records,
                        breakdown: imported.breakdown,
                    },
                };
                on_outcome(&outcome);
                outcomes.push(outcome);
            }
            Err(e) => {
                metrics::record_pair(false);
                error!(parameter = %parameter, region = %region, error = %e, "Series import failed");

                let outcome = PairOutcome {
                    parameter: parameter.clone(),
                    region: region.clone(),
                    outcome: PairResult::Failed {
                        error: e.to_string(),
                    },
                };
                on_outcome(&outcome);
                outcomes.push(outcome);

                if !continue_on_error {
                    return Err(BatchAborted {
                        parameter: parameter.clone(),
                        region: region.clone(),
                        source: e,
                        report: BatchReport {
                            outcomes,
                            total_records,
                            started_at,
                            finished_at: Utc::now(),
                        },
                    });
                }
            }
        }
    }

    let report = BatchReport {
        outcomes,
        total_records,
        started_at,
        finished_at: Utc::now(),
    };

    info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        total_records = report.total_records,
        "Batch import finished"
    );

    Ok(report)
}
