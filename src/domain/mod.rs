//! Domain layer: identifiers, entities, reference data and the assignment
//! ledger.
//!
//! Nothing in here touches the store or the clock; the generator feeds
//! timestamps in and mirrors accepted mutations to persistence.

pub mod entities;
pub mod ids;
pub mod ledger;
pub mod reference;

pub use entities::{Device, DeviceAssignment, Organizer, Player, StatusQuery, Venue};
pub use ids::{AssignmentId, DeviceId, OrganizerId, PlayerId, StatusQueryId, VenueId};
pub use ledger::AssignmentLedger;
pub use reference::ReferenceData;
