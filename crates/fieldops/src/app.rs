//! Explicit wiring of the store, repositories and services.
//!
//! There are no process-wide singletons: whoever owns an [`App`] owns the
//! storage handle and every service built on it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analytics::AnalyticsAggregator;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::geolocation::{check_proximity, GeolocationService, LocationProvider, ProximityCheck, StaticLocationProvider};
use crate::model::{Assignment, AssignmentStatus, CheckIn, Collection, Doctor, Employee, Location};
use crate::repository::{AssignmentRepository, CheckInRepository, DoctorRepository, EmployeeRepository};
use crate::storage::{KeyValueStore, MemoryKv, SqliteKv};
use crate::store::LocalStore;

/// A check-in request.
#[derive(Debug, Clone, Default)]
pub struct CheckInRequest {
    /// Employee checking in.
    pub employee_id: String,
    /// Doctor being visited.
    pub doctor_id: String,
    /// Use this position instead of asking the location provider.
    pub location: Option<Location>,
    /// Record the check-in even when outside the admission radius.
    pub force: bool,
    /// Free-form visit notes.
    pub notes: Option<String>,
}

/// What happened to a check-in request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum CheckInOutcome {
    /// The check-in was stored.
    Recorded {
        /// The stored record.
        check_in: CheckIn,
        /// Distance to the doctor at the time of check-in.
        proximity: ProximityCheck,
    },
    /// The employee was too far from the doctor; nothing was stored.
    OutOfRange {
        /// The failed proximity check.
        proximity: ProximityCheck,
    },
}

/// Owns the store and the services built on it.
#[derive(Debug, Clone)]
pub struct App {
    config: Config,
    store: LocalStore,
    /// Employee lookups.
    pub employees: EmployeeRepository,
    /// Doctor lookups.
    pub doctors: DoctorRepository,
    /// Assignment persistence.
    pub assignments: AssignmentRepository,
    /// Check-in persistence.
    pub check_ins: CheckInRepository,
    /// Location access.
    pub geolocation: GeolocationService,
    /// Derived statistics.
    pub analytics: AnalyticsAggregator,
}

impl App {
    /// Open the on-disk store named by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open(config: Config) -> Result<Self> {
        let kv = SqliteKv::open(config.database_path())?;
        Ok(Self::with_kv(config, Arc::new(kv)))
    }

    /// Build an app over a fresh in-memory store.
    #[must_use]
    pub fn in_memory(config: Config) -> Self {
        Self::with_kv(config, Arc::new(MemoryKv::new()))
    }

    /// Build an app over `kv`, using the configured simulated location if any.
    #[must_use]
    pub fn with_kv(config: Config, kv: Arc<dyn KeyValueStore>) -> Self {
        let provider: Arc<dyn LocationProvider> = match config.geolocation.simulated_location {
            Some(location) => Arc::new(StaticLocationProvider::new(location)),
            None => Arc::new(StaticLocationProvider::without_fix()),
        };
        Self::with_provider(config, kv, provider)
    }

    /// Build an app over `kv` and a specific location provider.
    #[must_use]
    pub fn with_provider(
        config: Config,
        kv: Arc<dyn KeyValueStore>,
        provider: Arc<dyn LocationProvider>,
    ) -> Self {
        let store = LocalStore::with_prefix(kv, config.storage.key_prefix.clone());
        Self {
            employees: EmployeeRepository::new(store.clone()),
            doctors: DoctorRepository::new(store.clone()),
            assignments: AssignmentRepository::new(store.clone()),
            check_ins: CheckInRepository::new(store.clone()),
            geolocation: GeolocationService::new(provider),
            analytics: AnalyticsAggregator::new(store.clone(), config.analytics.admin_id.clone()),
            store,
            config,
        }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The underlying collection store.
    #[must_use]
    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Replace a whole collection with the records in `json`, a JSON array.
    ///
    /// Returns the number of records imported.
    ///
    /// # Errors
    ///
    /// Returns an error if `json` does not hold records of the collection's
    /// type or the collection cannot be written.
    pub async fn import(&self, collection: Collection, json: &str) -> Result<usize> {
        let count = match collection {
            Collection::Employees => self.import_as::<Employee>(json).await?,
            Collection::Doctors => self.import_as::<Doctor>(json).await?,
            Collection::Assignments => self.import_as::<Assignment>(json).await?,
            Collection::CheckIns => self.import_as::<CheckIn>(json).await?,
        };
        info!(%collection, count, "Imported collection");
        Ok(count)
    }

    async fn import_as<T: crate::model::Record>(&self, json: &str) -> Result<usize> {
        let records: Vec<T> = serde_json::from_str(json)?;
        self.store.replace_all(&records).await?;
        Ok(records.len())
    }

    /// Create an active assignment with no progress.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the employee or doctor is unknown, or a
    /// storage error.
    pub async fn assign(
        &self,
        employee_id: &str,
        doctor_id: &str,
        target: u32,
        now: DateTime<Utc>,
    ) -> Result<Assignment> {
        self.require_employee(employee_id).await?;
        self.require_doctor(doctor_id).await?;

        let assignment = Assignment {
            id: Uuid::new_v4().to_string(),
            employee_id: employee_id.to_string(),
            doctor_id: doctor_id.to_string(),
            target,
            assigned_date: now,
            assigned_by: self.config.analytics.admin_id.clone(),
            status: AssignmentStatus::Active,
            current_progress: 0,
        };
        self.assignments.create(assignment).await
    }

    /// Check an employee in at a doctor, validating proximity first.
    ///
    /// Out-of-range requests are stored only when `force` is set. On success
    /// the employee's active assignment for the doctor, if any, gains one
    /// unit of progress. If that update fails the check-in is removed again,
    /// so retrying does not record the visit twice.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLocation`] for a supplied position that is not
    /// a real coordinate, [`Error::NotFound`] for unknown ids, a geolocation
    /// error when no position was supplied and none can be read, or a storage
    /// error.
    pub async fn check_in(&self, request: CheckInRequest, now: DateTime<Utc>) -> Result<CheckInOutcome> {
        if let Some(location) = request.location.filter(|l| !l.is_valid()) {
            return Err(Error::InvalidLocation {
                lat: location.lat,
                lng: location.lng,
            });
        }

        self.require_employee(&request.employee_id).await?;
        let doctor = self.require_doctor(&request.doctor_id).await?;
        let radius = self.config.geolocation.check_in_radius_meters;

        let (current, proximity) = match request.location {
            Some(location) => (location, check_proximity(location, doctor.location, radius)),
            None => self.geolocation.check_proximity_to(doctor.location, radius).await?,
        };

        if !proximity.within_radius {
            if !request.force {
                info!(
                    employee_id = %request.employee_id,
                    doctor_id = %request.doctor_id,
                    distance = proximity.distance_meters,
                    "Check-in rejected, too far from doctor"
                );
                return Ok(CheckInOutcome::OutOfRange { proximity });
            }
            warn!(
                employee_id = %request.employee_id,
                distance = proximity.distance_meters,
                "Forcing out-of-range check-in"
            );
        }

        let active = self
            .assignments
            .get_by_employee(&request.employee_id)
            .await?
            .into_iter()
            .find(|a| a.doctor_id == request.doctor_id && a.status == AssignmentStatus::Active);

        let check_in = self
            .check_ins
            .create(CheckIn {
                id: Uuid::new_v4().to_string(),
                employee_id: request.employee_id.clone(),
                doctor_id: request.doctor_id.clone(),
                timestamp: now,
                location: current,
                notes: request.notes,
            })
            .await?;

        if let Some(assignment) = active {
            if let Err(err) = self.assignments.update_progress(&assignment.id, 1).await {
                warn!(
                    check_in_id = %check_in.id,
                    assignment_id = %assignment.id,
                    error = %err,
                    "Progress update failed, removing check-in"
                );
                if let Err(rollback) = self.check_ins.delete(&check_in.id).await {
                    warn!(check_in_id = %check_in.id, error = %rollback, "Check-in rollback failed");
                }
                return Err(err);
            }
        }

        Ok(CheckInOutcome::Recorded { check_in, proximity })
    }

    async fn require_employee(&self, id: &str) -> Result<Employee> {
        self.employees
            .get_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(Collection::Employees.as_str(), id))
    }

    async fn require_doctor(&self, id: &str) -> Result<Doctor> {
        self.doctors
            .get_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(Collection::Doctors.as_str(), id))
    }
}
