//! Service layer: the status generator and its periodic driver.

pub mod generator;
pub mod scheduler;

pub use generator::{Reassignment, StatusGenerator, TickOutcome};
pub use scheduler::{RunSummary, Schedule};
