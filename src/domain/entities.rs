//! Reference entities, device assignments and status queries.
//!
//! Field names match the column names of the backing tables.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{AssignmentId, DeviceId, OrganizerId, PlayerId, StatusQueryId, VenueId};

/// Business entity that owns venues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organizer {
    /// Primary key.
    pub id: OrganizerId,
    /// Display name.
    pub name: String,
    /// Sales region.
    pub region: String,
}

/// Physical location where devices are installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Venue {
    /// Primary key.
    pub id: VenueId,
    /// Owning organizer.
    pub organizer_id: OrganizerId,
    /// Display name.
    pub name: String,
    /// City the venue is located in.
    pub city: String,
}

/// Physical machine whose location changes over time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Primary key.
    pub id: DeviceId,
    /// Manufacturer serial number.
    pub serial: String,
    /// Model designation.
    pub model: String,
}

/// Person observed using a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Primary key.
    pub id: PlayerId,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Date of birth.
    pub birth_date: NaiveDate,
}

/// "Device X was at venue Y during `[valid_from, valid_to)`."
///
/// `valid_to == None` marks the currently active assignment of the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAssignment {
    /// Primary key.
    pub id: AssignmentId,
    /// Assigned device.
    pub device_id: DeviceId,
    /// Organizer owning the venue.
    pub organizer_id: OrganizerId,
    /// Venue the device is located at.
    pub venue_id: VenueId,
    /// Start of the validity interval (inclusive).
    pub valid_from: DateTime<Utc>,
    /// End of the validity interval (exclusive), `None` while active.
    pub valid_to: Option<DateTime<Utc>>,
}

impl DeviceAssignment {
    /// Opens a new active assignment of `device_id` at `venue` starting at `from`.
    #[must_use]
    pub fn open(device_id: DeviceId, venue: &Venue, from: DateTime<Utc>) -> Self {
        Self {
            id: AssignmentId::new(),
            device_id,
            organizer_id: venue.organizer_id,
            venue_id: venue.id,
            valid_from: from,
            valid_to: None,
        }
    }

    /// Returns `true` while the assignment has not been superseded.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.valid_to.is_none()
    }
}

/// Denormalised observation: a player on a device at the device's
/// then-current venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusQuery {
    /// Primary key.
    pub id: StatusQueryId,
    /// Observation instant.
    pub observed_at: DateTime<Utc>,
    /// Organizer of the active assignment.
    pub organizer_id: OrganizerId,
    /// Venue of the active assignment.
    pub venue_id: VenueId,
    /// Observed device.
    pub device_id: DeviceId,
    /// Observed player.
    pub player_id: PlayerId,
    /// Player given name at observation time.
    pub first_name: String,
    /// Player family name at observation time.
    pub last_name: String,
    /// Player date of birth.
    pub birth_date: NaiveDate,
}

impl StatusQuery {
    /// Snapshots `assignment` and `player` into a new observation.
    #[must_use]
    pub fn observe(assignment: &DeviceAssignment, player: &Player, at: DateTime<Utc>) -> Self {
        Self {
            id: StatusQueryId::new(),
            observed_at: at,
            organizer_id: assignment.organizer_id,
            venue_id: assignment.venue_id,
            device_id: assignment.device_id,
            player_id: player.id,
            first_name: player.first_name.clone(),
            last_name: player.last_name.clone(),
            birth_date: player.birth_date,
        }
    }
}
