//! Check-in persistence and queries.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{CheckIn, CheckInPatch};
use crate::store::LocalStore;

/// Typed access to the `checkIns` collection.
#[derive(Debug, Clone)]
pub struct CheckInRepository {
    store: LocalStore,
}

impl CheckInRepository {
    /// Create a repository over `store`.
    #[must_use]
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// All check-ins in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub async fn get_all(&self) -> Result<Vec<CheckIn>> {
        self.store.get_all().await
    }

    /// Look up one check-in.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<CheckIn>> {
        self.store.get_by_id(id).await
    }

    /// Store a new check-in.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be written.
    pub async fn create(&self, check_in: CheckIn) -> Result<CheckIn> {
        self.store.create(check_in).await
    }

    /// Apply a partial update to a check-in.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read or written.
    pub async fn update(&self, id: &str, patch: &CheckInPatch) -> Result<Option<CheckIn>> {
        self.store.update(id, patch).await
    }

    /// Remove a check-in.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read or written.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        self.store.delete::<CheckIn>(id).await
    }

    /// Check-ins made by `employee_id`.
    ///
    /// When both `start` and `end` are given, only check-ins with
    /// `start <= timestamp <= end` are kept. A single bound is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub async fn get_by_employee(
        &self,
        employee_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<CheckIn>> {
        let range = start.zip(end);
        Ok(self
            .get_all()
            .await?
            .into_iter()
            .filter(|c| c.employee_id == employee_id)
            .filter(|c| range.map_or(true, |(start, end)| (start..=end).contains(&c.timestamp)))
            .collect())
    }

    /// Check-ins at `doctor_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub async fn get_by_doctor(&self, doctor_id: &str) -> Result<Vec<CheckIn>> {
        Ok(self
            .get_all()
            .await?
            .into_iter()
            .filter(|c| c.doctor_id == doctor_id)
            .collect())
    }
}
