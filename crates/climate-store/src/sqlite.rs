//! SQLite implementation of [`ClimateStore`] using sqlx.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use metoffice_parser::{ParsedRecord, PeriodType};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::models::{
    DataQuery, NewParameter, NewRegion, Parameter, Region, StoreStats, UpsertOutcome,
    WeatherDataPoint,
};
use crate::store::ClimateStore;

/// Schema, applied statement by statement on open.
///
/// NULL months must collide in the natural key, so the unique index covers
/// `COALESCE(month, 0)` rather than the raw column.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS regions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS parameters (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    unit TEXT NOT NULL DEFAULT '',
    description TEXT
);

CREATE TABLE IF NOT EXISTS weather_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    region_id INTEGER NOT NULL REFERENCES regions(id) ON DELETE CASCADE,
    parameter_id INTEGER NOT NULL REFERENCES parameters(id) ON DELETE CASCADE,
    year INTEGER NOT NULL,
    period_type TEXT NOT NULL
        CHECK (period_type IN ('monthly', 'winter', 'spring', 'summer', 'autumn', 'annual')),
    month INTEGER,
    value REAL NOT NULL,
    anomaly REAL,
    CHECK (
        (period_type = 'monthly' AND month BETWEEN 1 AND 12)
        OR (period_type <> 'monthly' AND month IS NULL)
    )
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_weather_data_key
    ON weather_data (region_id, parameter_id, year, period_type, COALESCE(month, 0));

CREATE INDEX IF NOT EXISTS idx_weather_data_period
    ON weather_data (year, period_type, month)
"#;

/// How long a writer waits for another connection's write to finish.
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

const DATA_POINT_SELECT: &str = r#"
SELECT w.id, r.code AS region_code, p.code AS parameter_code,
       w.year, w.period_type, w.month, w.value, w.anomaly
FROM weather_data w
JOIN regions r ON r.id = w.region_id
JOIN parameters p ON p.id = w.parameter_id
WHERE 1 = 1"#;

const DATA_POINT_ORDER: &str = " ORDER BY w.year DESC, w.period_type ASC, w.month DESC";

#[derive(sqlx::FromRow)]
struct DataPointRow {
    id: i64,
    region_code: String,
    parameter_code: String,
    year: i64,
    period_type: String,
    month: Option<i64>,
    value: f64,
    anomaly: Option<f64>,
}

impl TryFrom<DataPointRow> for WeatherDataPoint {
    type Error = StoreError;

    fn try_from(row: DataPointRow) -> Result<Self> {
        let period_type = row
            .period_type
            .parse::<PeriodType>()
            .map_err(|e| StoreError::InvalidRecord(e.to_string()))?;
        let year = i32::try_from(row.year)
            .map_err(|_| StoreError::InvalidRecord(format!("year out of range: {}", row.year)))?;
        let month = row
            .month
            .map(u8::try_from)
            .transpose()
            .map_err(|_| StoreError::InvalidRecord(format!("month out of range: {:?}", row.month)))?;

        Ok(Self {
            id: row.id,
            region_code: row.region_code,
            parameter_code: row.parameter_code,
            year,
            period_type,
            month,
            value: row.value,
            anomaly: row.anomaly,
            period_display: period_type.label(month),
        })
    }
}

/// Climate store backed by a SQLite database.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open or create the database at the given path.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        info!(path = %path.display(), "Opened climate database");
        Ok(store)
    }

    /// Open an in-memory database (for testing).
    pub async fn open_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to :memory: is a separate database, so keep exactly one alive.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA_SQL.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed).execute(&self.pool).await?;
            }
        }
        Ok(())
    }

    /// Overwrite the value of an existing point. Returns whether a row matched.
    async fn update_value(
        &self,
        region_id: i64,
        parameter_id: i64,
        record: &ParsedRecord,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE weather_data SET value = ?
            WHERE region_id = ? AND parameter_id = ? AND year = ?
              AND period_type = ? AND month IS ?
            "#,
        )
        .bind(record.value)
        .bind(region_id)
        .bind(parameter_id)
        .bind(record.year)
        .bind(record.period_type.as_str())
        .bind(record.month.map(i64::from))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Insert a new point unless the key already exists. Returns whether a row was written.
    async fn insert_if_absent(
        &self,
        region_id: i64,
        parameter_id: i64,
        record: &ParsedRecord,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO weather_data (region_id, parameter_id, year, period_type, month, value)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(region_id)
        .bind(parameter_id)
        .bind(record.year)
        .bind(record.period_type.as_str())
        .bind(record.month.map(i64::from))
        .bind(record.value)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn describe_key(record: &ParsedRecord) -> String {
    match record.month {
        Some(month) => format!("{}-{:02}", record.year, month),
        None => format!("{}-{}", record.year, record.period_type),
    }
}

fn search_pattern(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s))
}

fn push_data_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &DataQuery) {
    if let Some(region) = &query.region {
        builder.push(" AND r.code = ").push_bind(region.clone());
    }
    if let Some(parameter) = &query.parameter {
        builder.push(" AND p.code = ").push_bind(parameter.clone());
    }
    if let Some(year) = query.year {
        builder.push(" AND w.year = ").push_bind(year);
    }
    if let Some(start_year) = query.start_year {
        builder.push(" AND w.year >= ").push_bind(start_year);
    }
    if let Some(end_year) = query.end_year {
        builder.push(" AND w.year <= ").push_bind(end_year);
    }
    if !query.period_types.is_empty() {
        builder.push(" AND w.period_type IN (");
        let mut separated = builder.separated(", ");
        for period in &query.period_types {
            separated.push_bind(period.as_str());
        }
        separated.push_unseparated(")");
    }
    if let Some(month) = query.month {
        builder.push(" AND w.month = ").push_bind(i64::from(month));
    }
}

#[async_trait]
impl ClimateStore for SqliteStore {
    async fn find_region(&self, code: &str) -> Result<Option<Region>> {
        let region = sqlx::query_as::<_, Region>("SELECT id, code, name FROM regions WHERE code = ?")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(region)
    }

    async fn insert_region(&self, region: &NewRegion) -> Result<Region> {
        let result = sqlx::query("INSERT INTO regions (code, name) VALUES (?, ?)")
            .bind(&region.code)
            .bind(&region.name)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::from_insert(e, "Region", &region.code))?;

        debug!(code = %region.code, name = %region.name, "Created region");

        Ok(Region {
            id: result.last_insert_rowid(),
            code: region.code.clone(),
            name: region.name.clone(),
        })
    }

    async fn find_parameter(&self, code: &str) -> Result<Option<Parameter>> {
        let parameter = sqlx::query_as::<_, Parameter>(
            "SELECT id, code, name, unit, description FROM parameters WHERE code = ?",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(parameter)
    }

    async fn insert_parameter(&self, parameter: &NewParameter) -> Result<Parameter> {
        let result = sqlx::query(
            "INSERT INTO parameters (code, name, unit, description) VALUES (?, ?, ?, ?)",
        )
        .bind(&parameter.code)
        .bind(&parameter.name)
        .bind(&parameter.unit)
        .bind(&parameter.description)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::from_insert(e, "Parameter", &parameter.code))?;

        debug!(
            code = %parameter.code,
            name = %parameter.name,
            unit = %parameter.unit,
            "Created parameter"
        );

        Ok(Parameter {
            id: result.last_insert_rowid(),
            code: parameter.code.clone(),
            name: parameter.name.clone(),
            unit: parameter.unit.clone(),
            description: parameter.description.clone(),
        })
    }

    async fn upsert_data_point(
        &self,
        region_id: i64,
        parameter_id: i64,
        record: &ParsedRecord,
    ) -> Result<UpsertOutcome> {
        if !record.is_consistent() {
            return Err(StoreError::InvalidRecord(format!(
                "month {:?} does not match period type {}",
                record.month, record.period_type
            )));
        }
        if !record.value.is_finite() {
            return Err(StoreError::InvalidRecord(format!(
                "non-finite value for {}",
                describe_key(record)
            )));
        }

        // Each statement is its own write transaction, so writers queue on the
        // busy timeout instead of failing a read-to-write lock upgrade.
        if self.update_value(region_id, parameter_id, record).await? {
            return Ok(UpsertOutcome::Updated);
        }
        if self.insert_if_absent(region_id, parameter_id, record).await? {
            return Ok(UpsertOutcome::Created);
        }

        // Another writer created the key between the two statements.
        debug!(key = %describe_key(record), "Data point created concurrently, updating");
        if self.update_value(region_id, parameter_id, record).await? {
            Ok(UpsertOutcome::Updated)
        } else {
            Err(StoreError::Conflict {
                entity: "Data point",
                code: describe_key(record),
            })
        }
    }

    async fn list_regions(&self, search: Option<&str>) -> Result<Vec<Region>> {
        let regions = match search_pattern(search) {
            Some(pattern) => {
                sqlx::query_as::<_, Region>(
                    "SELECT id, code, name FROM regions WHERE code LIKE ? OR name LIKE ? ORDER BY name",
                )
                .bind(&pattern)
                .bind(&pattern)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Region>("SELECT id, code, name FROM regions ORDER BY name")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(regions)
    }

    async fn list_parameters(&self, search: Option<&str>) -> Result<Vec<Parameter>> {
        let parameters = match search_pattern(search) {
            Some(pattern) => {
                sqlx::query_as::<_, Parameter>(
                    r#"
                    SELECT id, code, name, unit, description FROM parameters
                    WHERE code LIKE ? OR name LIKE ?
                    ORDER BY name
                    "#,
                )
                .bind(&pattern)
                .bind(&pattern)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Parameter>(
                    "SELECT id, code, name, unit, description FROM parameters ORDER BY name",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(parameters)
    }

    async fn query_data(&self, query: &DataQuery) -> Result<Vec<WeatherDataPoint>> {
        let mut builder = QueryBuilder::<Sqlite>::new(DATA_POINT_SELECT);
        push_data_filters(&mut builder, query);
        builder.push(DATA_POINT_ORDER);

        if query.limit.is_some() || query.offset.is_some() {
            // SQLite needs a LIMIT before OFFSET; -1 means unbounded.
            let limit = query.limit.map(i64::from).unwrap_or(-1);
            let offset = query.offset.map(i64::from).unwrap_or(0);
            builder.push(" LIMIT ").push_bind(limit);
            builder.push(" OFFSET ").push_bind(offset);
        }

        let rows = builder
            .build_query_as::<DataPointRow>()
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(WeatherDataPoint::try_from).collect()
    }

    async fn count_data(&self, query: &DataQuery) -> Result<u64> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            r#"
SELECT COUNT(*)
FROM weather_data w
JOIN regions r ON r.id = w.region_id
JOIN parameters p ON p.id = w.parameter_id
WHERE 1 = 1"#,
        );
        push_data_filters(&mut builder, query);

        let (count,) = builder
            .build_query_as::<(i64,)>()
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn stats(&self) -> Result<StoreStats> {
        let (regions, parameters, data_points): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT (SELECT COUNT(*) FROM regions),
                   (SELECT COUNT(*) FROM parameters),
                   (SELECT COUNT(*) FROM weather_data)
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(StoreStats {
            regions: regions.max(0) as u64,
            parameters: parameters.max(0) as u64,
            data_points: data_points.max(0) as u64,
        })
    }
}
