//! Assignment queries and progress tracking.

use tracing::debug;

use crate::error::Result;
use crate::model::{Assignment, AssignmentPatch, AssignmentStatus};
use crate::store::LocalStore;

/// Typed access to the `assignments` collection.
#[derive(Debug, Clone)]
pub struct AssignmentRepository {
    store: LocalStore,
}

impl AssignmentRepository {
    /// Create a repository over `store`.
    #[must_use]
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// All assignments in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub async fn get_all(&self) -> Result<Vec<Assignment>> {
        self.store.get_all().await
    }

    /// Look up one assignment.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Assignment>> {
        self.store.get_by_id(id).await
    }

    /// Assignments held by `employee_id`, in stored order.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub async fn get_by_employee(&self, employee_id: &str) -> Result<Vec<Assignment>> {
        Ok(self
            .get_all()
            .await?
            .into_iter()
            .filter(|a| a.employee_id == employee_id)
            .collect())
    }

    /// Assignments targeting `doctor_id`, in stored order.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub async fn get_by_doctor(&self, doctor_id: &str) -> Result<Vec<Assignment>> {
        Ok(self
            .get_all()
            .await?
            .into_iter()
            .filter(|a| a.doctor_id == doctor_id)
            .collect())
    }

    /// Store a new assignment. Referenced employee and doctor are not checked.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be written.
    pub async fn create(&self, assignment: Assignment) -> Result<Assignment> {
        self.store.create(assignment).await
    }

    /// Add `increment` to an assignment's progress.
    ///
    /// Only `currentProgress` is written. Progress is not clamped to the
    /// target and the status is left alone; completing an assignment is the
    /// caller's decision (see [`Self::update_status`]). Returns `None` without
    /// touching storage when the id is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read or written.
    pub async fn update_progress(
        &self,
        assignment_id: &str,
        increment: u32,
    ) -> Result<Option<Assignment>> {
        let updated = self
            .store
            .update_with(assignment_id, |current: &Assignment| AssignmentPatch {
                current_progress: Some(current.current_progress.saturating_add(increment)),
                ..AssignmentPatch::default()
            })
            .await?;
        if updated.is_none() {
            debug!(assignment_id, "Progress update for unknown assignment");
        }
        Ok(updated)
    }

    /// Set an assignment's status.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read or written.
    pub async fn update_status(
        &self,
        assignment_id: &str,
        status: AssignmentStatus,
    ) -> Result<Option<Assignment>> {
        let patch = AssignmentPatch {
            status: Some(status),
            ..AssignmentPatch::default()
        };
        self.store.update(assignment_id, &patch).await
    }

    /// Remove an assignment.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read or written.
    pub async fn delete(&self, assignment_id: &str) -> Result<bool> {
        self.store.delete::<Assignment>(assignment_id).await
    }
}
