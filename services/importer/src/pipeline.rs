//! The import pipeline for one parameter/region pair:
//! fetch, parse header, normalize table, persist.

use std::sync::Arc;

use climate_store::{ClimateStore, StoreError};
use metoffice_parser::{parse_document, DatasetMetadata, ParseError, RecordBreakdown};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument};

use crate::fetch::{FetchError, MetOfficeFetcher};
use crate::metrics;
use crate::sink::{persist, PersistSummary};

/// Errors that abort the import of one pair.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of importing one pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportOutcome {
    pub parameter_code: String,
    pub region_code: String,
    pub metadata: DatasetMetadata,
    pub breakdown: RecordBreakdown,
    pub summary: PersistSummary,
}

impl ImportOutcome {
    /// Number of records persisted.
    pub fn records_imported(&self) -> usize {
        self.summary.total()
    }
}

/// Runs the import pipeline against a store.
#[derive(Clone)]
pub struct Importer {
    fetcher: MetOfficeFetcher,
    store: Arc<dyn ClimateStore>,
}

impl Importer {
    pub fn new(fetcher: MetOfficeFetcher, store: Arc<dyn ClimateStore>) -> Self {
        Self { fetcher, store }
    }

    pub fn store(&self) -> &Arc<dyn ClimateStore> {
        &self.store
    }

    pub fn fetcher(&self) -> &MetOfficeFetcher {
        &self.fetcher
    }

    /// Import one series. Stages run in order; the first error aborts.
    #[instrument(skip(self))]
    pub async fn import(
        &self,
        parameter_code: &str,
        region_code: &str,
    ) -> Result<ImportOutcome, ImportError> {
        let content = self.fetcher.fetch(parameter_code, region_code).await?;
        let document = parse_document(&content)?;
        let breakdown = RecordBreakdown::from_records(&document.records);

        let summary = persist(
            self.store.as_ref(),
            parameter_code,
            region_code,
            &document.metadata,
            &document.records,
        )
        .await?;

        metrics::record_imported(summary.total());
        info!(
            parameter = %parameter_code,
            region = %region_code,
            records = summary.total(),
            created = summary.created,
            updated = summary.updated,
            "Imported series"
        );

        Ok(ImportOutcome {
            parameter_code: parameter_code.to_string(),
            region_code: region_code.to_string(),
            metadata: document.metadata,
            breakdown,
            summary,
        })
    }
}
