//! Read access to the PostGIS earthquake schema.
//!
//! The HTTP layer talks to an [`EventStore`]; the Postgres implementation
//! executes statements produced by the query builder against a pooled
//! connection.

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};

use crate::errors::QuakeError;
use crate::models::{Catalog, Earthquake};
use crate::query::{BindValue, BuiltQuery};

/// Active catalogs, ordered by id.
const SELECT_ACTIVE_CATALOGS: &str = "SELECT catalog_id::int4 AS catalog_id, \
     catalog_name::text AS catalog_name, \
     doi::text AS doi, \
     technique::text AS technique, \
     network_codes::text AS network_codes, \
     region::text AS region, \
     num_events::int8 AS num_events, \
     start_date::date AS start_date, \
     end_date::date AS end_date, \
     submitted_by::text AS submitted_by, \
     submission_date::timestamptz AS submission_date, \
     status::text AS status, \
     metadata::jsonb AS metadata \
     FROM earthquake.catalogs \
     WHERE status = 'active' \
     ORDER BY catalog_id";

/// Read-only view of catalogs and their events.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// List catalogs whose status is active.
    async fn list_catalogs(&self) -> Result<Vec<Catalog>, QuakeError>;

    /// Run a built event query.
    async fn fetch_earthquakes(&self, query: &BuiltQuery) -> Result<Vec<Earthquake>, QuakeError>;
}

/// PostgreSQL / PostGIS implementation of [`EventStore`].
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be reached.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, QuakeError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    #[instrument(skip(self))]
    async fn list_catalogs(&self) -> Result<Vec<Catalog>, QuakeError> {
        let rows = sqlx::query(SELECT_ACTIVE_CATALOGS)
            .fetch_all(&self.pool)
            .await?;

        let catalogs = rows
            .iter()
            .map(catalog_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        debug!("fetched {} catalogs", catalogs.len());
        Ok(catalogs)
    }

    #[instrument(skip_all, fields(params = query.params.len()))]
    async fn fetch_earthquakes(&self, query: &BuiltQuery) -> Result<Vec<Earthquake>, QuakeError> {
        debug!(where_clause = %query.where_clause, "running event query");

        let mut statement = sqlx::query(&query.sql);
        for value in &query.params {
            statement = match *value {
                BindValue::Int(v) => statement.bind(v),
                BindValue::BigInt(v) => statement.bind(v),
                BindValue::Float(v) => statement.bind(v),
                BindValue::Timestamp(v) => statement.bind(v),
            };
        }

        let rows = statement.fetch_all(&self.pool).await?;
        let earthquakes = rows
            .iter()
            .map(earthquake_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        debug!("fetched {} events", earthquakes.len());
        Ok(earthquakes)
    }
}

fn catalog_from_row(row: &PgRow) -> Result<Catalog, sqlx::Error> {
    Ok(Catalog {
        catalog_id: row.try_get("catalog_id")?,
        catalog_name: row.try_get("catalog_name")?,
        doi: row.try_get("doi")?,
        technique: row.try_get("technique")?,
        network_codes: row.try_get("network_codes")?,
        region: row.try_get("region")?,
        num_events: row.try_get("num_events")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        submitted_by: row.try_get("submitted_by")?,
        submission_date: row.try_get("submission_date")?,
        status: row.try_get("status")?,
        metadata: row.try_get("metadata")?,
    })
}

fn earthquake_from_row(row: &PgRow) -> Result<Earthquake, sqlx::Error> {
    Ok(Earthquake {
        evid: row.try_get("evid")?,
        longitude: row.try_get("longitude")?,
        latitude: row.try_get("latitude")?,
        depth: row.try_get("depth")?,
        origin_time: row.try_get("origin_time")?,
        magnitude: row.try_get("magnitude")?,
        magnitude_type: row.try_get("magnitude_type")?,
        nsta: row.try_get("nsta")?,
        gap: row.try_get("gap")?,
        horizontal_error_km: row.try_get("horizontal_error_km")?,
        vertical_error_km: row.try_get("vertical_error_km")?,
        rms: row.try_get("rms")?,
        region: row.try_get("region")?,
    })
}
