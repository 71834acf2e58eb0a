//! Persistence sink: resolves reference rows and upserts data points.

use climate_store::{
    ClimateStore, NewParameter, NewRegion, Parameter, Region, Result, StoreError, UpsertOutcome,
};
use metoffice_parser::{DatasetMetadata, ParsedRecord};
use serde::Serialize;
use tracing::{debug, info};

/// Counts of data points written by one persist call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PersistSummary {
    pub created: usize,
    pub updated: usize,
}

impl PersistSummary {
    pub fn total(&self) -> usize {
        self.created + self.updated
    }
}

/// Find a region by code, creating it from the header metadata if absent.
///
/// An existing region is returned untouched.
pub async fn get_or_create_region(
    store: &dyn ClimateStore,
    code: &str,
    metadata: &DatasetMetadata,
) -> Result<Region> {
    if let Some(region) = store.find_region(code).await? {
        return Ok(region);
    }

    let new = NewRegion {
        code: code.to_string(),
        name: metadata
            .region_name
            .clone()
            .unwrap_or_else(|| code.to_string()),
    };

    match store.insert_region(&new).await {
        Ok(region) => {
            info!(code = %region.code, name = %region.name, "Created region");
            Ok(region)
        }
        Err(StoreError::Conflict { entity, code }) => {
            debug!(code = %code, "Region created concurrently, re-resolving");
            store
                .find_region(&code)
                .await?
                .ok_or(StoreError::Conflict { entity, code })
        }
        Err(e) => Err(e),
    }
}

/// Find a parameter by code, creating it from the header metadata if absent.
///
/// An existing parameter is returned untouched.
pub async fn get_or_create_parameter(
    store: &dyn ClimateStore,
    code: &str,
    metadata: &DatasetMetadata,
) -> Result<Parameter> {
    if let Some(parameter) = store.find_parameter(code).await? {
        return Ok(parameter);
    }

    let new = NewParameter {
        code: code.to_string(),
        name: metadata
            .parameter_name
            .clone()
            .unwrap_or_else(|| code.to_string()),
        unit: metadata.unit.clone().unwrap_or_default(),
        description: None,
    };

    match store.insert_parameter(&new).await {
        Ok(parameter) => {
            info!(
                code = %parameter.code,
                name = %parameter.name,
                unit = %parameter.unit,
                "Created parameter"
            );
            Ok(parameter)
        }
        Err(StoreError::Conflict { entity, code }) => {
            debug!(code = %code, "Parameter created concurrently, re-resolving");
            store
                .find_parameter(&code)
                .await?
                .ok_or(StoreError::Conflict { entity, code })
        }
        Err(e) => Err(e),
    }
}

/// Persist the records of one series.
///
/// Each record is upserted on its own; a failure part way leaves the
/// records before it committed.
pub async fn persist(
    store: &dyn ClimateStore,
    parameter_code: &str,
    region_code: &str,
    metadata: &DatasetMetadata,
    records: &[ParsedRecord],
) -> Result<PersistSummary> {
    let region = get_or_create_region(store, region_code, metadata).await?;
    let parameter = get_or_create_parameter(store, parameter_code, metadata).await?;

    let mut summary = PersistSummary::default();
    for record in records {
        match store
            .upsert_data_point(region.id, parameter.id, record)
            .await?
        {
            UpsertOutcome::Created => summary.created += 1,
            UpsertOutcome::Updated => summary.updated += 1,
        }
    }

    debug!(
        parameter = %parameter_code,
        region = %region_code,
        created = summary.created,
        updated = summary.updated,
        "Persisted records"
    );

    Ok(summary)
}
