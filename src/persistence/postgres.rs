//! PostgreSQL implementation of the persistence layer.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use uuid::Uuid;

use super::schema::Statements;
use super::{SeedReport, StatusStore};
use crate::config::DatabaseConfig;
use crate::domain::{AssignmentId, DeviceAssignment, ReferenceData, StatusQuery};
use crate::error::SimulatorError;

type AssignmentRow = (
    Uuid,
    Uuid,
    Uuid,
    Uuid,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
);

fn persistence_error(e: sqlx::Error) -> SimulatorError {
    SimulatorError::Persistence(e.to_string())
}

/// PostgreSQL-backed store using `sqlx::PgPool`.
///
/// Cloning is cheap; clones share the same pool.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
    sql: Statements,
}

impl PostgresStore {
    /// Creates a store over an existing pool, writing into `schema`.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError::InvalidConfig`] if `schema` is not a valid
    /// identifier.
    pub fn new(pool: PgPool, schema: &str) -> Result<Self, SimulatorError> {
        Ok(Self {
            pool,
            sql: Statements::for_schema(schema)?,
        })
    }

    /// Opens a connection pool from configuration and verifies it with a
    /// round trip.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError::Persistence`] if the store is unreachable
    /// or rejects the credentials.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, SimulatorError> {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.name)
            .username(&config.user)
            .password(&config.password)
            .application_name(env!("CARGO_PKG_NAME"))
            .options([(
                "statement_timeout",
                config.statement_timeout.as_millis().to_string(),
            )]);

        tracing::info!(
            host = %config.host,
            port = config.port,
            database = %config.name,
            "connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .acquire_timeout(config.connect_timeout)
            .connect_with(options)
            .await
            .map_err(persistence_error)?;

        let (one,): (i32,) = sqlx::query_as("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(persistence_error)?;
        tracing::debug!(result = one, "database health check passed");

        Self::new(pool, &config.schema)
    }

    /// Closes every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn seed_inner(&self, data: &ReferenceData) -> Result<SeedReport, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let mut report = SeedReport::default();

        for organizer in data.organizers() {
            report.organizers += sqlx::query(&self.sql.insert_organizer)
                .bind(*organizer.id.as_uuid())
                .bind(&organizer.name)
                .bind(&organizer.region)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }

        for venue in data.venues() {
            report.venues += sqlx::query(&self.sql.insert_venue)
                .bind(*venue.id.as_uuid())
                .bind(*venue.organizer_id.as_uuid())
                .bind(&venue.name)
                .bind(&venue.city)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }

        for device in data.devices() {
            report.devices += sqlx::query(&self.sql.insert_device)
                .bind(*device.id.as_uuid())
                .bind(&device.serial)
                .bind(&device.model)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }

        for player in data.players() {
            report.players += sqlx::query(&self.sql.insert_player)
                .bind(*player.id.as_uuid())
                .bind(&player.first_name)
                .bind(&player.last_name)
                .bind(player.birth_date)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }

        for assignment in data.seed_assignments() {
            report.assignments += sqlx::query(&self.sql.insert_assignment)
                .bind(*assignment.id.as_uuid())
                .bind(*assignment.device_id.as_uuid())
                .bind(*assignment.organizer_id.as_uuid())
                .bind(*assignment.venue_id.as_uuid())
                .bind(assignment.valid_from)
                .bind(assignment.valid_to)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }

        tx.commit().await?;
        Ok(report)
    }

    async fn reassign_inner(
        &self,
        closed: AssignmentId,
        closed_at: DateTime<Utc>,
        successor: &DeviceAssignment,
    ) -> Result<u64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let closed_rows = sqlx::query(&self.sql.close_assignment)
            .bind(closed_at)
            .bind(*closed.as_uuid())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if closed_rows != 1 {
            // Dropping the transaction rolls it back.
            return Ok(closed_rows);
        }

        sqlx::query(&self.sql.insert_assignment)
            .bind(*successor.id.as_uuid())
            .bind(*successor.device_id.as_uuid())
            .bind(*successor.organizer_id.as_uuid())
            .bind(*successor.venue_id.as_uuid())
            .bind(successor.valid_from)
            .bind(successor.valid_to)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(closed_rows)
    }
}

impl StatusStore for PostgresStore {
    async fn ensure_schema(&self) -> Result<(), SimulatorError> {
        for ddl in &self.sql.create {
            sqlx::query(ddl)
                .execute(&self.pool)
                .await
                .map_err(persistence_error)?;
        }
        Ok(())
    }

    async fn seed(&self, data: &ReferenceData) -> Result<SeedReport, SimulatorError> {
        self.seed_inner(data).await.map_err(persistence_error)
    }

    async fn active_assignments(&self) -> Result<Vec<DeviceAssignment>, SimulatorError> {
        let rows = sqlx::query_as::<_, AssignmentRow>(&self.sql.select_active_assignments)
            .fetch_all(&self.pool)
            .await
            .map_err(persistence_error)?;

        Ok(rows
            .into_iter()
            .map(
                |(id, device_id, organizer_id, venue_id, valid_from, valid_to)| {
                    DeviceAssignment {
                        id: id.into(),
                        device_id: device_id.into(),
                        organizer_id: organizer_id.into(),
                        venue_id: venue_id.into(),
                        valid_from,
                        valid_to,
                    }
                },
            )
            .collect())
    }

    async fn insert_status_query(&self, query: &StatusQuery) -> Result<(), SimulatorError> {
        sqlx::query(&self.sql.insert_status_query)
            .bind(*query.id.as_uuid())
            .bind(query.observed_at)
            .bind(*query.organizer_id.as_uuid())
            .bind(*query.venue_id.as_uuid())
            .bind(*query.device_id.as_uuid())
            .bind(*query.player_id.as_uuid())
            .bind(&query.first_name)
            .bind(&query.last_name)
            .bind(query.birth_date)
            .execute(&self.pool)
            .await
            .map_err(persistence_error)?;
        Ok(())
    }

    async fn reassign(
        &self,
        closed: AssignmentId,
        closed_at: DateTime<Utc>,
        successor: &DeviceAssignment,
    ) -> Result<(), SimulatorError> {
        let closed_rows = self
            .reassign_inner(closed, closed_at, successor)
            .await
            .map_err(persistence_error)?;
        if closed_rows == 1 {
            Ok(())
        } else {
            Err(SimulatorError::Persistence(format!(
                "assignment {closed} is not active in the store ({closed_rows} rows matched)"
            )))
        }
    }
}
