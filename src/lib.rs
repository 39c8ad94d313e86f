//! # device-status-simulator
//!
//! Synthetic data source for the CDC demo stack. Seeds reference data into
//! PostgreSQL, then periodically records "player observed on device at
//! venue" status queries and occasionally moves a device to another venue,
//! keeping a temporal validity interval on the assignment history.
//!
//! ## Architecture
//!
//! ```text
//! main (config, logging, signals)
//!     │
//!     ├── scheduler (service/)      ticker, timeout, shutdown
//!     ├── StatusGenerator (service/)
//!     │       ├── ReferenceData + AssignmentLedger (domain/)
//!     │       └── RandomSource (random)
//!     │
//!     └── StatusStore (persistence/)
//!             └── PostgreSQL
//! ```

pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod random;
pub mod service;
