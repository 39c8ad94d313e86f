//! Simulator error types.
//!
//! [`SimulatorError`] is the central error type for the crate. Startup
//! errors propagate out of `main` and terminate the process; errors raised
//! inside a tick are caught by the generator and logged.

use std::time::Duration;

/// Crate-wide error enum.
///
/// # Categories
///
/// | Variant              | Raised by                 | Fatal at startup |
/// |----------------------|---------------------------|------------------|
/// | `MissingConfig`      | configuration loading     | yes              |
/// | `InvalidConfig`      | configuration loading     | yes              |
/// | `ReferenceData`      | reference data validation | yes              |
/// | `Persistence`        | the backing store         | yes (per tick: logged) |
/// | `Ledger`             | in-memory assignment set  | per tick: logged |
/// | `NothingToObserve`   | periodic step             | per tick: logged |
/// | `TickTimedOut`       | periodic step             | per tick: logged |
#[derive(Debug, thiserror::Error)]
pub enum SimulatorError {
    /// A required environment variable is not set.
    #[error("missing required environment variable {0}")]
    MissingConfig(&'static str),

    /// A configuration value is present but unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Reference data failed to load or violates referential integrity.
    #[error("invalid reference data: {0}")]
    ReferenceData(String),

    /// Backing store failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// An assignment mutation would break the ledger invariants.
    #[error("assignment ledger violation: {0}")]
    Ledger(String),

    /// The periodic step has no player or no active assignment to use.
    #[error("nothing to observe: no {0} available")]
    NothingToObserve(&'static str),

    /// A status insert did not finish within the tick budget.
    #[error("tick timed out after {0:?}")]
    TickTimedOut(Duration),
}

impl SimulatorError {
    /// Returns a short machine-readable label for structured log fields.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MissingConfig(_) | Self::InvalidConfig(_) => "config",
            Self::ReferenceData(_) => "reference_data",
            Self::Persistence(_) => "persistence",
            Self::Ledger(_) => "ledger",
            Self::NothingToObserve(_) => "nothing_to_observe",
            Self::TickTimedOut(_) => "timeout",
        }
    }
}
