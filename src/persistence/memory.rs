//! In-memory [`StatusStore`] with primary-key and foreign-key checks.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::{SeedReport, StatusStore};
use crate::domain::{
    AssignmentId, Device, DeviceAssignment, DeviceId, Organizer, OrganizerId, Player, PlayerId,
    ReferenceData, StatusQuery, Venue, VenueId,
};
use crate::error::SimulatorError;

#[derive(Debug, Default)]
struct Tables {
    schema_ready: bool,
    organizers: HashMap<OrganizerId, Organizer>,
    venues: HashMap<VenueId, Venue>,
    devices: HashMap<DeviceId, Device>,
    players: HashMap<PlayerId, Player>,
    assignments: HashMap<AssignmentId, DeviceAssignment>,
    status_queries: Vec<StatusQuery>,
    reject_status_inserts: usize,
    reject_reassigns: usize,
}

/// Row counts per table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RowCounts {
    pub(crate) organizers: usize,
    pub(crate) venues: usize,
    pub(crate) devices: usize,
    pub(crate) players: usize,
    pub(crate) assignments: usize,
    pub(crate) status_queries: usize,
}

#[derive(Debug, Default)]
pub(crate) struct MemoryStore {
    tables: Mutex<Tables>,
    insert_delay: Option<Duration>,
    reassign_ack_delay: Option<Duration>,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Every status insert sleeps for `delay` before it applies.
    pub(crate) fn with_insert_delay(delay: Duration) -> Self {
        Self {
            insert_delay: Some(delay),
            ..Self::default()
        }
    }

    /// Every reassignment commits at once, then sleeps for `delay` before
    /// reporting success.
    pub(crate) fn with_reassign_ack_delay(delay: Duration) -> Self {
        Self {
            reassign_ack_delay: Some(delay),
            ..Self::default()
        }
    }

    /// The next `n` status inserts fail as constraint violations.
    pub(crate) fn reject_next_status_inserts(&self, n: usize) {
        self.lock().reject_status_inserts = n;
    }

    /// The next `n` reassignments fail before touching any row.
    pub(crate) fn reject_next_reassigns(&self, n: usize) {
        self.lock().reject_reassigns = n;
    }

    pub(crate) fn counts(&self) -> RowCounts {
        let t = self.lock();
        RowCounts {
            organizers: t.organizers.len(),
            venues: t.venues.len(),
            devices: t.devices.len(),
            players: t.players.len(),
            assignments: t.assignments.len(),
            status_queries: t.status_queries.len(),
        }
    }

    pub(crate) fn status_queries(&self) -> Vec<StatusQuery> {
        self.lock().status_queries.clone()
    }

    pub(crate) fn assignment(&self, id: AssignmentId) -> Option<DeviceAssignment> {
        self.lock().assignments.get(&id).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn ready(&self) -> Result<MutexGuard<'_, Tables>, SimulatorError> {
        let tables = self.lock();
        if tables.schema_ready {
            Ok(tables)
        } else {
            Err(SimulatorError::Persistence(
                "relation does not exist".to_string(),
            ))
        }
    }
}

impl Tables {
    fn check_assignment_refs(&self, a: &DeviceAssignment) -> Result<(), SimulatorError> {
        if !self.devices.contains_key(&a.device_id)
            || !self.organizers.contains_key(&a.organizer_id)
            || !self.venues.contains_key(&a.venue_id)
        {
            return Err(SimulatorError::Persistence(format!(
                "foreign key violation on assignment {}",
                a.id
            )));
        }
        if a.is_active()
            && self
                .assignments
                .values()
                .any(|other| other.device_id == a.device_id && other.is_active())
        {
            return Err(SimulatorError::Persistence(format!(
                "unique violation: device {} already has an active assignment",
                a.device_id
            )));
        }
        Ok(())
    }

    fn apply_reassign(
        &mut self,
        closed: AssignmentId,
        closed_at: DateTime<Utc>,
        successor: &DeviceAssignment,
    ) -> Result<(), SimulatorError> {
        if self.reject_reassigns > 0 {
            self.reject_reassigns -= 1;
            return Err(SimulatorError::Persistence(
                "connection reset by peer".to_string(),
            ));
        }

        let Some(current) = self.assignments.get(&closed).cloned() else {
            return Err(SimulatorError::Persistence(format!(
                "assignment {closed} not found"
            )));
        };
        if !current.is_active() || closed_at < current.valid_from {
            return Err(SimulatorError::Persistence(format!(
                "assignment {closed} cannot be closed at {closed_at}"
            )));
        }

        // Validate the successor as if the old row were already closed.
        let mut staged = current;
        staged.valid_to = Some(closed_at);
        self.assignments.insert(closed, staged);
        if let Err(e) = self.check_assignment_refs(successor) {
            if let Some(row) = self.assignments.get_mut(&closed) {
                row.valid_to = None;
            }
            return Err(e);
        }
        self.assignments.insert(successor.id, successor.clone());
        Ok(())
    }
}

impl StatusStore for MemoryStore {
    async fn ensure_schema(&self) -> Result<(), SimulatorError> {
        self.lock().schema_ready = true;
        Ok(())
    }

    async fn seed(&self, data: &ReferenceData) -> Result<SeedReport, SimulatorError> {
        let mut t = self.ready()?;
        let mut report = SeedReport::default();

        for o in data.organizers() {
            if let Entry::Vacant(row) = t.organizers.entry(o.id) {
                row.insert(o.clone());
                report.organizers += 1;
            }
        }
        for v in data.venues() {
            if !t.organizers.contains_key(&v.organizer_id) {
                return Err(SimulatorError::Persistence(format!(
                    "foreign key violation on venue {}",
                    v.id
                )));
            }
            if let Entry::Vacant(row) = t.venues.entry(v.id) {
                row.insert(v.clone());
                report.venues += 1;
            }
        }
        for d in data.devices() {
            if let Entry::Vacant(row) = t.devices.entry(d.id) {
                row.insert(d.clone());
                report.devices += 1;
            }
        }
        for p in data.players() {
            if let Entry::Vacant(row) = t.players.entry(p.id) {
                row.insert(p.clone());
                report.players += 1;
            }
        }
        for a in data.seed_assignments() {
            if t.assignments.contains_key(&a.id) {
                continue;
            }
            t.check_assignment_refs(a)?;
            t.assignments.insert(a.id, a.clone());
            report.assignments += 1;
        }
        Ok(report)
    }

    async fn active_assignments(&self) -> Result<Vec<DeviceAssignment>, SimulatorError> {
        let t = self.ready()?;
        let mut active: Vec<DeviceAssignment> = t
            .assignments
            .values()
            .filter(|a| a.is_active())
            .cloned()
            .collect();
        active.sort_by_key(|a| (a.valid_from, a.id));
        Ok(active)
    }

    async fn insert_status_query(&self, query: &StatusQuery) -> Result<(), SimulatorError> {
        if let Some(delay) = self.insert_delay {
            tokio::time::sleep(delay).await;
        }
        let mut t = self.ready()?;
        if t.reject_status_inserts > 0 {
            t.reject_status_inserts -= 1;
            return Err(SimulatorError::Persistence(format!(
                "check constraint violated by status query {}",
                query.id
            )));
        }
        if !t.organizers.contains_key(&query.organizer_id)
            || !t.venues.contains_key(&query.venue_id)
            || !t.devices.contains_key(&query.device_id)
            || !t.players.contains_key(&query.player_id)
        {
            return Err(SimulatorError::Persistence(format!(
                "foreign key violation on status query {}",
                query.id
            )));
        }
        if t.status_queries.iter().any(|q| q.id == query.id) {
            return Err(SimulatorError::Persistence(format!(
                "duplicate key on status query {}",
                query.id
            )));
        }
        t.status_queries.push(query.clone());
        Ok(())
    }

    async fn reassign(
        &self,
        closed: AssignmentId,
        closed_at: DateTime<Utc>,
        successor: &DeviceAssignment,
    ) -> Result<(), SimulatorError> {
        self.ready()?
            .apply_reassign(closed, closed_at, successor)?;
        if let Some(delay) = self.reassign_ack_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn reference() -> ReferenceData {
        let Ok(data) = ReferenceData::builtin() else {
            panic!("builtin reference data must load");
        };
        data
    }

    #[tokio::test]
    async fn seeding_twice_yields_same_row_counts() {
        let store = MemoryStore::new();
        let data = reference();
        assert!(store.ensure_schema().await.is_ok());

        let Ok(first) = store.seed(&data).await else {
            panic!("first seed failed");
        };
        let after_first = store.counts();

        assert!(store.ensure_schema().await.is_ok());
        let Ok(second) = store.seed(&data).await else {
            panic!("second seed failed");
        };

        assert_eq!(store.counts(), after_first);
        assert_eq!(first.total(), 3 + 6 + 8 + 12 + 8);
        assert_eq!(second, SeedReport::default());
    }

    #[tokio::test]
    async fn operations_before_schema_fail() {
        let store = MemoryStore::new();
        assert!(store.seed(&reference()).await.is_err());
        assert!(store.active_assignments().await.is_err());
    }

    #[tokio::test]
    async fn reassign_of_closed_assignment_is_rejected() {
        let store = MemoryStore::new();
        let data = reference();
        assert!(store.ensure_schema().await.is_ok());
        assert!(store.seed(&data).await.is_ok());

        let Some(seed) = data.seed_assignments().first().cloned() else {
            panic!("seed assignment expected");
        };
        let Some(target) = data.venues().iter().find(|v| v.id != seed.venue_id) else {
            panic!("second venue expected");
        };
        let now = Utc::now();
        let successor = DeviceAssignment::open(seed.device_id, target, now);
        assert!(store.reassign(seed.id, now, &successor).await.is_ok());

        let again = DeviceAssignment::open(seed.device_id, target, now);
        assert!(store.reassign(seed.id, now, &again).await.is_err());
        assert!(store.assignment(again.id).is_none());
    }
}
