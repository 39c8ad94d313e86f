//! In-memory working copy of the device assignment history.
//!
//! [`AssignmentLedger`] is the process-local source of truth for "where is
//! device X right now". It enforces two invariants on every mutation:
//!
//! - a device has at most one active assignment (`valid_to == None`);
//! - `valid_to` transitions from `None` to `Some` exactly once.
//!
//! Mutations are validated in full before anything is written, so a
//! rejected call leaves the ledger untouched.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::entities::DeviceAssignment;
use super::ids::{AssignmentId, DeviceId};
use crate::error::SimulatorError;

/// Append-mostly assignment history with an active-assignment index.
#[derive(Debug, Clone, Default)]
pub struct AssignmentLedger {
    assignments: Vec<DeviceAssignment>,
    by_id: HashMap<AssignmentId, usize>,
    active_by_device: HashMap<DeviceId, AssignmentId>,
}

impl AssignmentLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a ledger from an existing history.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError::Ledger`] if an id repeats or a device has
    /// more than one active assignment.
    pub fn from_history<I>(history: I) -> Result<Self, SimulatorError>
    where
        I: IntoIterator<Item = DeviceAssignment>,
    {
        let mut ledger = Self::new();
        for assignment in history {
            ledger.insert(assignment)?;
        }
        Ok(ledger)
    }

    /// Appends an assignment, active or already closed.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError::Ledger`] if the id is already known or the
    /// device already has an active assignment.
    pub fn insert(&mut self, assignment: DeviceAssignment) -> Result<(), SimulatorError> {
        if self.by_id.contains_key(&assignment.id) {
            return Err(SimulatorError::Ledger(format!(
                "assignment {} already recorded",
                assignment.id
            )));
        }
        if assignment.is_active() {
            if let Some(existing) = self.active_by_device.get(&assignment.device_id) {
                return Err(SimulatorError::Ledger(format!(
                    "device {} already active under assignment {existing}",
                    assignment.device_id
                )));
            }
            self.active_by_device
                .insert(assignment.device_id, assignment.id);
        }
        self.by_id.insert(assignment.id, self.assignments.len());
        self.assignments.push(assignment);
        Ok(())
    }

    /// Closes `current` at `at` and opens `successor` for the same device,
    /// as one step.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError::Ledger`] if `current` is unknown or already
    /// closed, `at` precedes its `valid_from`, or `successor` is not an
    /// active assignment of the same device.
    pub fn supersede(
        &mut self,
        current: AssignmentId,
        at: DateTime<Utc>,
        successor: DeviceAssignment,
    ) -> Result<(), SimulatorError> {
        let Some(&index) = self.by_id.get(&current) else {
            return Err(SimulatorError::Ledger(format!(
                "assignment {current} is unknown"
            )));
        };
        let Some(existing) = self.assignments.get(index) else {
            return Err(SimulatorError::Ledger(format!(
                "assignment {current} index is stale"
            )));
        };
        if !existing.is_active() {
            return Err(SimulatorError::Ledger(format!(
                "assignment {current} is already closed"
            )));
        }
        if at < existing.valid_from {
            return Err(SimulatorError::Ledger(format!(
                "assignment {current} cannot end before it starts"
            )));
        }
        if successor.device_id != existing.device_id || !successor.is_active() {
            return Err(SimulatorError::Ledger(format!(
                "successor {} must be an active assignment of device {}",
                successor.id, existing.device_id
            )));
        }
        if self.by_id.contains_key(&successor.id) {
            return Err(SimulatorError::Ledger(format!(
                "assignment {} already recorded",
                successor.id
            )));
        }

        let device_id = existing.device_id;
        if let Some(closing) = self.assignments.get_mut(index) {
            closing.valid_to = Some(at);
        }
        self.active_by_device.remove(&device_id);
        self.insert(successor)
    }

    /// Returns all active assignments in insertion order.
    #[must_use]
    pub fn active(&self) -> Vec<&DeviceAssignment> {
        self.assignments.iter().filter(|a| a.is_active()).collect()
    }

    /// Returns the active assignment of `device`, if any.
    #[must_use]
    pub fn active_for(&self, device: DeviceId) -> Option<&DeviceAssignment> {
        self.active_by_device
            .get(&device)
            .and_then(|id| self.get(*id))
    }

    /// Looks up an assignment by id.
    #[must_use]
    pub fn get(&self, id: AssignmentId) -> Option<&DeviceAssignment> {
        self.by_id.get(&id).and_then(|&i| self.assignments.get(i))
    }

    /// Iterates the full history in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &DeviceAssignment> {
        self.assignments.iter()
    }

    /// Number of recorded assignments, active or closed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}
