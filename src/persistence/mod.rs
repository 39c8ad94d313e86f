//! Persistence layer: the relational mirror of the simulator state.
//!
//! [`StatusStore`] is the seam between the generator and the database.
//! The concrete implementation, [`postgres::PostgresStore`], uses
//! `sqlx::PgPool`; tests drive the generator against an in-memory store.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::domain::{AssignmentId, DeviceAssignment, ReferenceData, StatusQuery};
use crate::error::SimulatorError;

#[cfg(test)]
pub(crate) mod memory;
pub mod postgres;
pub mod schema;

/// Rows actually inserted by a seeding pass. Rows that already existed are
/// not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Organizer rows inserted.
    pub organizers: u64,
    /// Venue rows inserted.
    pub venues: u64,
    /// Device rows inserted.
    pub devices: u64,
    /// Player rows inserted.
    pub players: u64,
    /// Assignment rows inserted.
    pub assignments: u64,
}

impl SeedReport {
    /// Total number of inserted rows.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.organizers + self.venues + self.devices + self.players + self.assignments
    }
}

/// Durable store the generator writes through.
///
/// Every method is a single logical operation: it either fully applies or
/// leaves the store unchanged.
pub trait StatusStore {
    /// Creates the namespace and tables if they do not exist yet.
    fn ensure_schema(&self) -> impl Future<Output = Result<(), SimulatorError>> + Send;

    /// Inserts every reference row and seed assignment that is not present
    /// yet, keyed by primary key.
    fn seed(
        &self,
        data: &ReferenceData,
    ) -> impl Future<Output = Result<SeedReport, SimulatorError>> + Send;

    /// Returns every assignment whose `valid_to` is unset.
    fn active_assignments(
        &self,
    ) -> impl Future<Output = Result<Vec<DeviceAssignment>, SimulatorError>> + Send;

    /// Appends one observation.
    fn insert_status_query(
        &self,
        query: &StatusQuery,
    ) -> impl Future<Output = Result<(), SimulatorError>> + Send;

    /// Closes the active assignment `closed` at `closed_at` and inserts
    /// `successor`, atomically.
    fn reassign(
        &self,
        closed: AssignmentId,
        closed_at: DateTime<Utc>,
        successor: &DeviceAssignment,
    ) -> impl Future<Output = Result<(), SimulatorError>> + Send;
}
