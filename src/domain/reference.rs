//! Immutable reference snapshot and seed assignments.
//!
//! [`ReferenceData`] is loaded once at startup, validated for referential
//! integrity, and held in memory for the lifetime of the process. The
//! built-in dataset is embedded from `data/reference.json`; a replacement
//! file of the same shape can be supplied through configuration.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::path::Path;

use serde::Deserialize;

use super::entities::{Device, DeviceAssignment, Organizer, Player, Venue};
use super::ids::{DeviceId, OrganizerId, VenueId};
use crate::error::SimulatorError;

const BUILTIN_REFERENCE_JSON: &str = include_str!("../../data/reference.json");

#[derive(Debug, Deserialize)]
struct RawReferenceData {
    organizers: Vec<Organizer>,
    venues: Vec<Venue>,
    devices: Vec<Device>,
    players: Vec<Player>,
    assignments: Vec<DeviceAssignment>,
}

/// Organizers, venues, devices, players and the seed assignment history.
#[derive(Debug, Clone)]
pub struct ReferenceData {
    organizers: Vec<Organizer>,
    venues: Vec<Venue>,
    devices: Vec<Device>,
    players: Vec<Player>,
    seed_assignments: Vec<DeviceAssignment>,
    venue_index: HashMap<VenueId, usize>,
    device_index: HashMap<DeviceId, usize>,
}

impl ReferenceData {
    /// Loads the dataset embedded in the binary.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError::ReferenceData`] if the embedded JSON does
    /// not parse or fails validation.
    pub fn builtin() -> Result<Self, SimulatorError> {
        Self::from_json(BUILTIN_REFERENCE_JSON)
    }

    /// Loads a dataset from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError::ReferenceData`] if the file cannot be read,
    /// does not parse, or fails validation.
    pub fn from_path(path: &Path) -> Result<Self, SimulatorError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SimulatorError::ReferenceData(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    /// Parses and validates a dataset from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError::ReferenceData`] on malformed JSON or
    /// dangling references.
    pub fn from_json(json: &str) -> Result<Self, SimulatorError> {
        let raw: RawReferenceData = serde_json::from_str(json)
            .map_err(|e| SimulatorError::ReferenceData(e.to_string()))?;
        Self::new(
            raw.organizers,
            raw.venues,
            raw.devices,
            raw.players,
            raw.assignments,
        )
    }

    /// Builds a validated dataset from its parts.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError::ReferenceData`] if ids are duplicated, a
    /// venue names an unknown organizer, or a seed assignment is
    /// inconsistent with the devices and venues.
    pub fn new(
        organizers: Vec<Organizer>,
        venues: Vec<Venue>,
        devices: Vec<Device>,
        players: Vec<Player>,
        seed_assignments: Vec<DeviceAssignment>,
    ) -> Result<Self, SimulatorError> {
        ensure_unique("organizer", organizers.iter().map(|o| o.id))?;
        ensure_unique("venue", venues.iter().map(|v| v.id))?;
        ensure_unique("device", devices.iter().map(|d| d.id))?;
        ensure_unique("player", players.iter().map(|p| p.id))?;
        ensure_unique("assignment", seed_assignments.iter().map(|a| a.id))?;

        let organizer_ids: HashSet<OrganizerId> = organizers.iter().map(|o| o.id).collect();
        if let Some(venue) = venues
            .iter()
            .find(|v| !organizer_ids.contains(&v.organizer_id))
        {
            return Err(SimulatorError::ReferenceData(format!(
                "venue {} references unknown organizer {}",
                venue.id, venue.organizer_id
            )));
        }

        let venue_index: HashMap<VenueId, usize> =
            venues.iter().enumerate().map(|(i, v)| (v.id, i)).collect();
        let device_index: HashMap<DeviceId, usize> =
            devices.iter().enumerate().map(|(i, d)| (d.id, i)).collect();

        let data = Self {
            organizers,
            venues,
            devices,
            players,
            seed_assignments: Vec::new(),
            venue_index,
            device_index,
        };

        let mut active_devices = HashSet::new();
        for assignment in &seed_assignments {
            data.check_assignment(assignment)?;
            if assignment.is_active() && !active_devices.insert(assignment.device_id) {
                return Err(SimulatorError::ReferenceData(format!(
                    "device {} has more than one active seed assignment",
                    assignment.device_id
                )));
            }
        }

        Ok(Self {
            seed_assignments,
            ..data
        })
    }

    /// Verifies that an assignment points at known entities and that its
    /// organizer owns its venue.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError::ReferenceData`] describing the first
    /// inconsistency found.
    pub fn check_assignment(&self, assignment: &DeviceAssignment) -> Result<(), SimulatorError> {
        if self.device(assignment.device_id).is_none() {
            return Err(SimulatorError::ReferenceData(format!(
                "assignment {} references unknown device {}",
                assignment.id, assignment.device_id
            )));
        }
        let Some(venue) = self.venue(assignment.venue_id) else {
            return Err(SimulatorError::ReferenceData(format!(
                "assignment {} references unknown venue {}",
                assignment.id, assignment.venue_id
            )));
        };
        if venue.organizer_id != assignment.organizer_id {
            return Err(SimulatorError::ReferenceData(format!(
                "assignment {} names organizer {} but venue {} belongs to {}",
                assignment.id, assignment.organizer_id, venue.id, venue.organizer_id
            )));
        }
        if let Some(valid_to) = assignment.valid_to
            && valid_to < assignment.valid_from
        {
            return Err(SimulatorError::ReferenceData(format!(
                "assignment {} ends before it starts",
                assignment.id
            )));
        }
        Ok(())
    }

    /// All organizers.
    #[must_use]
    pub fn organizers(&self) -> &[Organizer] {
        &self.organizers
    }

    /// All venues.
    #[must_use]
    pub fn venues(&self) -> &[Venue] {
        &self.venues
    }

    /// All devices.
    #[must_use]
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// All players.
    #[must_use]
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Seed assignment history, one active assignment per seeded device.
    #[must_use]
    pub fn seed_assignments(&self) -> &[DeviceAssignment] {
        &self.seed_assignments
    }

    /// Looks up a venue by id.
    #[must_use]
    pub fn venue(&self, id: VenueId) -> Option<&Venue> {
        self.venue_index.get(&id).and_then(|&i| self.venues.get(i))
    }

    /// Looks up a device by id.
    #[must_use]
    pub fn device(&self, id: DeviceId) -> Option<&Device> {
        self.device_index.get(&id).and_then(|&i| self.devices.get(i))
    }
}

fn ensure_unique<T, I>(kind: &str, ids: I) -> Result<(), SimulatorError>
where
    T: Eq + Hash + std::fmt::Display,
    I: IntoIterator<Item = T>,
{
    let mut seen = HashSet::new();
    for id in ids {
        if seen.contains(&id) {
            return Err(SimulatorError::ReferenceData(format!(
                "duplicate {kind} id {id}"
            )));
        }
        seen.insert(id);
    }
    Ok(())
}
