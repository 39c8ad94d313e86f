//! Status generator: synthetic observations and device reassignments.
//!
//! Each tick records one [`StatusQuery`] against a random active assignment
//! and a random player. After a successful insert the generator may move a
//! device to a different venue, closing the old assignment and opening a
//! new one.
//!
//! The store is always written first. The in-memory ledger only changes
//! once the store has accepted the mutation, so a failed write leaves both
//! sides as they were.

use std::time::Duration;

use chrono::Utc;
use tokio::time;

use crate::domain::{
    AssignmentLedger, DeviceAssignment, ReferenceData, StatusQuery, Venue,
};
use crate::error::SimulatorError;
use crate::persistence::StatusStore;
use crate::random::{RandomSource, choose};

/// A device moved from one venue to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reassignment {
    /// The superseded assignment, with `valid_to` set.
    pub previous: DeviceAssignment,
    /// The newly opened assignment.
    pub current: DeviceAssignment,
}

/// Result of one periodic step.
///
/// The payloads of `Recorded` are boxed to keep the enum close to the size
/// of the error variant.
#[derive(Debug)]
pub enum TickOutcome {
    /// The status query was written; `reassignment` is set when a device
    /// moved afterwards.
    Recorded {
        /// The observation written this tick.
        status_query: Box<StatusQuery>,
        /// The device move triggered by this tick, if any.
        reassignment: Option<Box<Reassignment>>,
    },
    /// The status query could not be written, or was abandoned after the
    /// tick budget ran out. Nothing changed.
    Failed(SimulatorError),
}

/// Owns the reference snapshot, the assignment ledger, the store handle
/// and the random source.
#[derive(Debug)]
pub struct StatusGenerator<S, R> {
    reference: ReferenceData,
    ledger: AssignmentLedger,
    store: S,
    rng: R,
    reassign_probability: f64,
}

impl<S, R> StatusGenerator<S, R>
where
    S: StatusStore,
    R: RandomSource,
{
    /// Creates a generator over an already prepared store.
    #[must_use]
    pub fn new(
        reference: ReferenceData,
        ledger: AssignmentLedger,
        store: S,
        rng: R,
        reassign_probability: f64,
    ) -> Self {
        Self {
            reference,
            ledger,
            store,
            rng,
            reassign_probability,
        }
    }

    /// Runs the startup sequence: schema, seed data, ledger hydration.
    ///
    /// The ledger is rebuilt from the store's active assignments, so a
    /// restarted process continues from each device's current venue.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError::Persistence`] if the store rejects the
    /// schema or seed data, and [`SimulatorError::ReferenceData`] or
    /// [`SimulatorError::Ledger`] if the stored assignments contradict the
    /// reference data.
    pub async fn bootstrap(
        reference: ReferenceData,
        store: S,
        rng: R,
        reassign_probability: f64,
    ) -> Result<Self, SimulatorError> {
        store.ensure_schema().await?;
        tracing::info!("schema ready");

        let report = store.seed(&reference).await?;
        tracing::info!(
            inserted = report.total(),
            organizers = report.organizers,
            venues = report.venues,
            devices = report.devices,
            players = report.players,
            assignments = report.assignments,
            "reference data seeded"
        );

        let active = store.active_assignments().await?;
        for assignment in &active {
            reference.check_assignment(assignment)?;
        }
        let ledger = AssignmentLedger::from_history(active)?;

        for device in reference.devices() {
            if ledger.active_for(device.id).is_none() {
                tracing::warn!(
                    device = %device.serial,
                    "device has no active assignment and will not be observed"
                );
            }
        }
        tracing::info!(active = ledger.active().len(), "assignment ledger loaded");

        Ok(Self::new(
            reference,
            ledger,
            store,
            rng,
            reassign_probability,
        ))
    }

    /// Runs one periodic step. Never returns an error: failures are logged
    /// and reported through [`TickOutcome::Failed`].
    pub async fn tick(&mut self) -> TickOutcome {
        let recorded = self.record_status().await;
        self.finish_tick(recorded).await
    }

    /// Like [`StatusGenerator::tick`], but gives up on the status insert
    /// after `budget`.
    ///
    /// Only the insert is bounded. A reassignment, once started, always runs
    /// to completion so the ledger learns whether the store committed it.
    pub async fn tick_within(&mut self, budget: Duration) -> TickOutcome {
        let recorded = match time::timeout(budget, self.record_status()).await {
            Ok(result) => result,
            Err(_) => Err(SimulatorError::TickTimedOut(budget)),
        };
        self.finish_tick(recorded).await
    }

    async fn finish_tick(&mut self, recorded: Result<StatusQuery, SimulatorError>) -> TickOutcome {
        let status_query = match recorded {
            Ok(query) => query,
            Err(e @ SimulatorError::TickTimedOut(_)) => {
                tracing::warn!(error = %e, kind = e.kind(), "tick abandoned");
                return TickOutcome::Failed(e);
            }
            Err(e) => {
                tracing::error!(error = %e, kind = e.kind(), "status query insert failed");
                return TickOutcome::Failed(e);
            }
        };

        let reassignment = match self.maybe_reassign().await {
            Ok(moved) => moved.map(Box::new),
            Err(e) => {
                tracing::warn!(error = %e, kind = e.kind(), "reassignment skipped");
                None
            }
        };

        TickOutcome::Recorded {
            status_query: Box::new(status_query),
            reassignment,
        }
    }

    /// Writes one observation of a random player on a random active
    /// assignment.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError::NothingToObserve`] when there is no player
    /// or no active assignment, or the store's error if the insert fails.
    pub async fn record_status(&mut self) -> Result<StatusQuery, SimulatorError> {
        let player = choose(&mut self.rng, self.reference.players())
            .cloned()
            .ok_or(SimulatorError::NothingToObserve("players"))?;
        let assignment = {
            let active = self.ledger.active();
            choose(&mut self.rng, &active)
                .map(|a| (*a).clone())
                .ok_or(SimulatorError::NothingToObserve("active assignments"))?
        };

        let query = StatusQuery::observe(&assignment, &player, Utc::now());
        self.store.insert_status_query(&query).await?;

        tracing::info!(
            status_query = %query.id,
            device = %query.device_id,
            venue = %query.venue_id,
            player = %query.player_id,
            "status query recorded"
        );
        Ok(query)
    }

    /// With probability `reassign_probability`, moves a random active device
    /// to a different random venue.
    ///
    /// Returns `Ok(None)` when the draw says "stay" or no other venue exists.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the move is rejected; the ledger is left
    /// unchanged in that case.
    pub async fn maybe_reassign(&mut self) -> Result<Option<Reassignment>, SimulatorError> {
        if self.rng.unit() >= self.reassign_probability {
            return Ok(None);
        }

        let (current, destination) = {
            let active = self.ledger.active();
            let Some(current) = choose(&mut self.rng, &active).map(|a| (*a).clone()) else {
                return Ok(None);
            };
            let candidates: Vec<&Venue> = self
                .reference
                .venues()
                .iter()
                .filter(|v| v.id != current.venue_id)
                .collect();
            let Some(destination) = choose(&mut self.rng, &candidates).map(|v| (*v).clone())
            else {
                tracing::debug!(device = %current.device_id, "no other venue to move to");
                return Ok(None);
            };
            (current, destination)
        };

        let moved_at = Utc::now().max(current.valid_from);
        let successor = DeviceAssignment::open(current.device_id, &destination, moved_at);

        self.store
            .reassign(current.id, moved_at, &successor)
            .await?;
        self.ledger
            .supersede(current.id, moved_at, successor.clone())?;

        let device = self
            .reference
            .device(current.device_id)
            .map_or_else(|| current.device_id.to_string(), |d| d.serial.clone());
        let from = self
            .reference
            .venue(current.venue_id)
            .map_or_else(|| current.venue_id.to_string(), |v| v.name.clone());
        tracing::info!(
            device = %device,
            from_venue = %from,
            to_venue = %destination.name,
            "device {device} moved from {from} to {}",
            destination.name
        );

        let mut previous = current;
        previous.valid_to = Some(moved_at);
        Ok(Some(Reassignment {
            previous,
            current: successor,
        }))
    }

    /// The in-memory assignment ledger.
    #[must_use]
    pub fn ledger(&self) -> &AssignmentLedger {
        &self.ledger
    }

    /// The reference snapshot.
    #[must_use]
    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }
}
