//! Entity repositories.
//!
//! Thin typed query layers over [`LocalStore`]. Queries never fail for "not
//! found": they return `None` or an empty vector.

mod assignment;
mod check_in;

pub use assignment::AssignmentRepository;
pub use check_in::CheckInRepository;

use crate::error::Result;
use crate::model::{Doctor, Employee};
use crate::store::LocalStore;

/// Read access to onboarded employees.
#[derive(Debug, Clone)]
pub struct EmployeeRepository {
    store: LocalStore,
}

impl EmployeeRepository {
    /// Create a repository over `store`.
    #[must_use]
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// All employees in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub async fn get_all(&self) -> Result<Vec<Employee>> {
        self.store.get_all().await
    }

    /// Look up one employee.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Employee>> {
        self.store.get_by_id(id).await
    }
}

/// Read access to doctors and their registered locations.
#[derive(Debug, Clone)]
pub struct DoctorRepository {
    store: LocalStore,
}

impl DoctorRepository {
    /// Create a repository over `store`.
    #[must_use]
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// All doctors in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub async fn get_all(&self) -> Result<Vec<Doctor>> {
        self.store.get_all().await
    }

    /// Look up one doctor.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Doctor>> {
        self.store.get_by_id(id).await
    }

    /// Doctors with the given specialization, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub async fn get_by_specialization(&self, specialization: &str) -> Result<Vec<Doctor>> {
        Ok(self
            .get_all()
            .await?
            .into_iter()
            .filter(|doctor| doctor.specialization.eq_ignore_ascii_case(specialization))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::Location;
    use crate::storage::MemoryKv;

    fn store() -> LocalStore {
        LocalStore::new(Arc::new(MemoryKv::new()))
    }

    #[tokio::test]
    async fn test_employee_lookup() {
        let store = store();
        store
            .create(Employee {
                id: "e1".to_string(),
                name: "Asha Rao".to_string(),
                email: "asha@example.com".to_string(),
                phone: None,
                role: "employee".to_string(),
            })
            .await
            .unwrap();

        let repo = EmployeeRepository::new(store);
        assert_eq!(repo.get_all().await.unwrap().len(), 1);
        assert_eq!(
            repo.get_by_id("e1").await.unwrap().map(|e| e.name),
            Some("Asha Rao".to_string())
        );
        assert!(repo.get_by_id("e2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_doctor_by_specialization() {
        let store = store();
        for (id, specialization) in [("d1", "Cardiology"), ("d2", "Oncology"), ("d3", "cardiology")] {
            store
                .create(Doctor {
                    id: id.to_string(),
                    name: format!("Dr. {id}"),
                    specialization: specialization.to_string(),
                    location: Location::new(28.6, 77.2),
                    address: None,
                })
                .await
                .unwrap();
        }

        let repo = DoctorRepository::new(store);
        let ids: Vec<String> = repo
            .get_by_specialization("CARDIOLOGY")
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["d1", "d3"]);
        assert!(repo.get_by_specialization("Dermatology").await.unwrap().is_empty());
    }
}
