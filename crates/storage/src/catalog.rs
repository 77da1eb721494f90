//! Raster catalog using PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use tracing::debug;
use uuid::Uuid;

use crate::{IndexEntry, IndexQuery, RasterIndex, StorageError, StorageResult};

/// Database connection pool and catalog operations.
pub struct Catalog {
    pool: PgPool,
}

impl Catalog {
    /// Create a new catalog connection from database URL.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| StorageError::Database(format!("Connection failed: {}", e)))?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> StorageResult<()> {
        for statement in SCHEMA_SQL.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| StorageError::Database(format!("Migration failed: {}", e)))?;
            }
        }

        Ok(())
    }

    /// Register a raster file, replacing any earlier file for the same slot.
    pub async fn register_raster(&self, entry: &IndexEntry) -> StorageResult<Uuid> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO rasters (
                id, model, parameter, reference_time, forecast_hour,
                valid_time, storage_path
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (model, parameter, reference_time, forecast_hour)
            DO UPDATE SET storage_path = EXCLUDED.storage_path
            "#,
        )
        .bind(id)
        .bind(&entry.model)
        .bind(&entry.parameter)
        .bind(entry.reference_time)
        .bind(hour_column(entry.forecast_hour)?)
        .bind(entry.valid_time())
        .bind(&entry.storage_path)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Database(format!("Insert failed: {}", e)))?;

        Ok(id)
    }
}

/// Forecast hours are stored as INTEGER.
fn hour_column(forecast_hour: u32) -> StorageResult<i32> {
    i32::try_from(forecast_hour).map_err(|_| {
        StorageError::Database(format!(
            "forecast hour {} does not fit the catalog column",
            forecast_hour
        ))
    })
}

#[async_trait]
impl RasterIndex for Catalog {
    async fn find_rasters(&self, query: &IndexQuery) -> StorageResult<Vec<IndexEntry>> {
        let hours = query
            .forecast_hours
            .iter()
            .map(|&h| hour_column(h))
            .collect::<StorageResult<Vec<i32>>>()?;

        let rows = sqlx::query_as::<_, RasterRow>(
            "SELECT model, parameter, reference_time, forecast_hour, storage_path \
             FROM rasters \
             WHERE model = $1 AND parameter = ANY($2) AND reference_time = $3 \
             AND forecast_hour = ANY($4) \
             ORDER BY forecast_hour, parameter",
        )
        .bind(&query.model)
        .bind(&query.parameters)
        .bind(query.model_run)
        .bind(&hours)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Database(format!("Query failed: {}", e)))?;

        debug!(
            model = %query.model,
            model_run = %query.model_run,
            found = rows.len(),
            "Catalog lookup"
        );

        Ok(rows.into_iter().map(IndexEntry::from).collect())
    }
}

/// Internal row type for database queries.
#[derive(FromRow)]
struct RasterRow {
    model: String,
    parameter: String,
    reference_time: DateTime<Utc>,
    forecast_hour: i32,
    storage_path: String,
}

impl From<RasterRow> for IndexEntry {
    fn from(row: RasterRow) -> Self {
        IndexEntry {
            model: row.model,
            parameter: row.parameter,
            reference_time: row.reference_time,
            forecast_hour: row.forecast_hour.max(0) as u32,
            storage_path: row.storage_path,
        }
    }
}

/// Database schema SQL.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS rasters (
    id UUID PRIMARY KEY,
    model VARCHAR(100) NOT NULL,
    parameter VARCHAR(50) NOT NULL,
    reference_time TIMESTAMPTZ NOT NULL,
    forecast_hour INTEGER NOT NULL,
    valid_time TIMESTAMPTZ NOT NULL,
    storage_path TEXT NOT NULL,

    UNIQUE(model, parameter, reference_time, forecast_hour)
);

CREATE INDEX IF NOT EXISTS idx_rasters_run ON rasters(model, reference_time)
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hour_column_rejects_overflow() {
        assert_eq!(hour_column(48).unwrap(), 48);
        assert_eq!(hour_column(i32::MAX as u32).unwrap(), i32::MAX);
        assert!(matches!(
            hour_column(i32::MAX as u32 + 1),
            Err(StorageError::Database(_))
        ));
    }

    #[test]
    fn test_schema_has_one_statement_per_object() {
        let statements: Vec<&str> = SCHEMA_SQL
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        assert_eq!(statements.len(), 2);
        assert!(statements[0].contains("UNIQUE(model, parameter, reference_time, forecast_hour)"));
    }
}
