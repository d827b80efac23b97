//! `fieldops` - Offline data core for field-operations staff
//!
//! This library keeps employees, doctors, assignments and check-ins in a local
//! key/value store, validates check-ins against the device location, and
//! derives per-employee analytics and activity roundups from the stored data.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod analytics;
pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod geolocation;
pub mod logging;
pub mod model;
pub mod repository;
pub mod storage;
pub mod store;

pub use analytics::{ActivityRoundup, AnalyticsAggregator, EmployeeAnalytics, RoundupPeriod};
pub use app::{App, CheckInOutcome, CheckInRequest};
pub use config::Config;
pub use error::{Error, Result};
pub use geolocation::{GeolocationService, LocationProvider, StaticLocationProvider};
pub use logging::init_logging;
pub use model::{Assignment, AssignmentStatus, CheckIn, Collection, Doctor, Employee, Location};
pub use repository::{AssignmentRepository, CheckInRepository, DoctorRepository, EmployeeRepository};
pub use storage::{KeyValueStore, MemoryKv, SqliteKv};
pub use store::LocalStore;
