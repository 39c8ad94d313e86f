//! DDL and statement text for the simulator tables.
//!
//! Table names are qualified with the configured schema. The schema name is
//! validated as a plain identifier before any statement is built; every
//! value is bound as a parameter.

use crate::config::validate_identifier;
use crate::error::SimulatorError;

/// Organizer table.
pub const ORGANIZER_TABLE: &str = "veranstalter";
/// Venue table.
pub const VENUE_TABLE: &str = "betriebsstaette";
/// Device table.
pub const DEVICE_TABLE: &str = "geraet";
/// Player table.
pub const PLAYER_TABLE: &str = "player";
/// Device assignment history table.
pub const ASSIGNMENT_TABLE: &str = "device_assignment";
/// Status query fact table.
pub const STATUS_QUERY_TABLE: &str = "status_abfrage";

/// Prepared statement text for one schema.
#[derive(Debug, Clone)]
pub struct Statements {
    /// `CREATE SCHEMA` / `CREATE TABLE` / `CREATE INDEX`, in dependency order.
    pub create: Vec<String>,
    /// Insert-or-ignore organizer.
    pub insert_organizer: String,
    /// Insert-or-ignore venue.
    pub insert_venue: String,
    /// Insert-or-ignore device.
    pub insert_device: String,
    /// Insert-or-ignore player.
    pub insert_player: String,
    /// Insert-or-ignore assignment.
    pub insert_assignment: String,
    /// Close an active assignment.
    pub close_assignment: String,
    /// Select active assignments.
    pub select_active_assignments: String,
    /// Insert a status query.
    pub insert_status_query: String,
}

impl Statements {
    /// Builds all statements for `schema`.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError::InvalidConfig`] if `schema` is not a plain
    /// lowercase identifier.
    pub fn for_schema(schema: &str) -> Result<Self, SimulatorError> {
        validate_identifier(schema)?;
        let t = |table: &str| format!("{schema}.{table}");
        let (org, venue, device, player, assignment, status) = (
            t(ORGANIZER_TABLE),
            t(VENUE_TABLE),
            t(DEVICE_TABLE),
            t(PLAYER_TABLE),
            t(ASSIGNMENT_TABLE),
            t(STATUS_QUERY_TABLE),
        );

        let create = vec![
            format!("CREATE SCHEMA IF NOT EXISTS {schema}"),
            format!(
                "CREATE TABLE IF NOT EXISTS {org} (
                    id UUID PRIMARY KEY,
                    name TEXT NOT NULL,
                    region TEXT NOT NULL
                )"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {venue} (
                    id UUID PRIMARY KEY,
                    organizer_id UUID NOT NULL REFERENCES {org}(id),
                    name TEXT NOT NULL,
                    city TEXT NOT NULL
                )"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {device} (
                    id UUID PRIMARY KEY,
                    serial TEXT NOT NULL,
                    model TEXT NOT NULL
                )"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {player} (
                    id UUID PRIMARY KEY,
                    first_name TEXT NOT NULL,
                    last_name TEXT NOT NULL,
                    birth_date DATE NOT NULL
                )"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {assignment} (
                    id UUID PRIMARY KEY,
                    device_id UUID NOT NULL REFERENCES {device}(id),
                    organizer_id UUID NOT NULL REFERENCES {org}(id),
                    venue_id UUID NOT NULL REFERENCES {venue}(id),
                    valid_from TIMESTAMPTZ NOT NULL,
                    valid_to TIMESTAMPTZ NULL,
                    CHECK (valid_to IS NULL OR valid_to >= valid_from)
                )"
            ),
            format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {ASSIGNMENT_TABLE}_one_active_per_device \
                 ON {assignment} (device_id) WHERE valid_to IS NULL"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {status} (
                    id UUID PRIMARY KEY,
                    observed_at TIMESTAMPTZ NOT NULL,
                    organizer_id UUID NOT NULL REFERENCES {org}(id),
                    venue_id UUID NOT NULL REFERENCES {venue}(id),
                    device_id UUID NOT NULL REFERENCES {device}(id),
                    player_id UUID NOT NULL REFERENCES {player}(id),
                    first_name TEXT NOT NULL,
                    last_name TEXT NOT NULL,
                    birth_date DATE NOT NULL
                )"
            ),
        ];

        Ok(Self {
            create,
            insert_organizer: format!(
                "INSERT INTO {org} (id, name, region) VALUES ($1, $2, $3) \
                 ON CONFLICT (id) DO NOTHING"
            ),
            insert_venue: format!(
                "INSERT INTO {venue} (id, organizer_id, name, city) VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (id) DO NOTHING"
            ),
            insert_device: format!(
                "INSERT INTO {device} (id, serial, model) VALUES ($1, $2, $3) \
                 ON CONFLICT (id) DO NOTHING"
            ),
            insert_player: format!(
                "INSERT INTO {player} (id, first_name, last_name, birth_date) \
                 VALUES ($1, $2, $3, $4) ON CONFLICT (id) DO NOTHING"
            ),
            insert_assignment: format!(
                "INSERT INTO {assignment} (id, device_id, organizer_id, venue_id, valid_from, valid_to) \
                 VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT (id) DO NOTHING"
            ),
            close_assignment: format!(
                "UPDATE {assignment} SET valid_to = $1 WHERE id = $2 AND valid_to IS NULL"
            ),
            select_active_assignments: format!(
                "SELECT id, device_id, organizer_id, venue_id, valid_from, valid_to \
                 FROM {assignment} WHERE valid_to IS NULL ORDER BY valid_from ASC"
            ),
            insert_status_query: format!(
                "INSERT INTO {status} (id, observed_at, organizer_id, venue_id, device_id, \
                 player_id, first_name, last_name, birth_date) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
            ),
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn statements_are_qualified_with_schema() {
        let Ok(sql) = Statements::for_schema("cdc_demo") else {
            panic!("valid schema rejected");
        };
        assert!(sql.insert_status_query.contains("cdc_demo.status_abfrage"));
        assert!(sql.close_assignment.contains("cdc_demo.device_assignment"));
        assert!(sql.create.iter().all(|ddl| ddl.contains("IF NOT EXISTS")));
    }

    #[test]
    fn parents_are_created_before_children() {
        let Ok(sql) = Statements::for_schema("simulator") else {
            panic!("valid schema rejected");
        };
        let position = |needle: &str| {
            sql.create
                .iter()
                .position(|ddl| ddl.contains(&format!("TABLE IF NOT EXISTS simulator.{needle} ")))
        };
        assert!(position(ORGANIZER_TABLE) < position(VENUE_TABLE));
        assert!(position(VENUE_TABLE) < position(ASSIGNMENT_TABLE));
        assert!(position(PLAYER_TABLE) < position(STATUS_QUERY_TABLE));
        assert!(position(STATUS_QUERY_TABLE).is_some());
    }

    #[test]
    fn seeding_statements_ignore_conflicts() {
        let Ok(sql) = Statements::for_schema("simulator") else {
            panic!("valid schema rejected");
        };
        for stmt in [
            &sql.insert_organizer,
            &sql.insert_venue,
            &sql.insert_device,
            &sql.insert_player,
            &sql.insert_assignment,
        ] {
            assert!(stmt.ends_with("ON CONFLICT (id) DO NOTHING"), "{stmt}");
        }
        assert!(!sql.insert_status_query.contains("ON CONFLICT"));
    }

    #[test]
    fn hostile_schema_name_is_rejected() {
        assert!(Statements::for_schema("x; DROP SCHEMA public").is_err());
    }
}
