//! Generic collection store over a key/value provider.
//!
//! Each collection is persisted as one JSON array under
//! `"{key_prefix}{collection}"`. Every mutation rewrites the whole array, so
//! this is only suitable for small collections.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::DEFAULT_KEY_PREFIX;
use crate::error::{Error, Result};
use crate::model::{Collection, Record};
use crate::storage::KeyValueStore;

/// Typed CRUD over named collections.
///
/// Cloning is cheap; clones share the provider and the write lock.
#[derive(Clone)]
pub struct LocalStore {
    kv: Arc<dyn KeyValueStore>,
    key_prefix: String,
    // Serializes read-modify-write cycles across tasks
    write_lock: Arc<Mutex<()>>,
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore")
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}

impl LocalStore {
    /// Create a store using the default key prefix.
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self::with_prefix(kv, DEFAULT_KEY_PREFIX)
    }

    /// Create a store with a custom key prefix.
    #[must_use]
    pub fn with_prefix(kv: Arc<dyn KeyValueStore>, key_prefix: impl Into<String>) -> Self {
        Self {
            kv,
            key_prefix: key_prefix.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// The storage key for a collection.
    #[must_use]
    pub fn key_for(&self, collection: Collection) -> String {
        format!("{}{}", self.key_prefix, collection.as_str())
    }

    /// Read a whole collection. A missing collection is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails or the stored JSON is malformed.
    pub async fn get_all<T: Record>(&self) -> Result<Vec<T>> {
        let key = self.key_for(T::COLLECTION);
        match self.kv.get(&key).await? {
            Some(raw) => {
                let records: Vec<T> = serde_json::from_str(&raw)?;
                debug!(collection = %T::COLLECTION, count = records.len(), "Loaded collection");
                Ok(records)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Find a record by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub async fn get_by_id<T: Record>(&self, id: &str) -> Result<Option<T>> {
        Ok(self
            .get_all::<T>()
            .await?
            .into_iter()
            .find(|record| record.id() == id))
    }

    /// Append a record and persist. Duplicate ids are not checked.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read or written.
    pub async fn create<T: Record>(&self, record: T) -> Result<T> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.get_all::<T>().await?;
        records.push(record.clone());
        self.persist(&records).await?;
        info!(collection = %T::COLLECTION, id = record.id(), "Created record");
        Ok(record)
    }

    /// Shallow-merge `patch` into the record with `id` and persist.
    ///
    /// `patch` must serialize to a JSON object; its keys overwrite the
    /// record's. Returns `None` without writing when `id` is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the patch is not an object, the merged record no
    /// longer deserializes, or the provider fails.
    pub async fn update<T: Record, P: Serialize + ?Sized>(
        &self,
        id: &str,
        patch: &P,
    ) -> Result<Option<T>> {
        self.update_with(id, |_: &T| patch).await
    }

    /// Like [`Self::update`], but the patch is computed from the current
    /// record while the write lock is held.
    ///
    /// # Errors
    ///
    /// Same as [`Self::update`].
    pub async fn update_with<T, P, F>(&self, id: &str, make_patch: F) -> Result<Option<T>>
    where
        T: Record,
        P: Serialize,
        F: FnOnce(&T) -> P,
    {
        let _guard = self.write_lock.lock().await;
        let mut records = self.get_all::<T>().await?;
        let Some(slot) = records.iter_mut().find(|record| record.id() == id) else {
            debug!(collection = %T::COLLECTION, id, "Update target not found");
            return Ok(None);
        };

        let Value::Object(fields) = serde_json::to_value(make_patch(&*slot))? else {
            return Err(Error::invalid_patch(
                T::COLLECTION.as_str(),
                "partial update must be a JSON object",
            ));
        };

        let mut merged = serde_json::to_value(&*slot)?;
        if let Value::Object(target) = &mut merged {
            target.extend(fields);
        }
        let updated: T = serde_json::from_value(merged)
            .map_err(|err| Error::invalid_patch(T::COLLECTION.as_str(), err.to_string()))?;

        *slot = updated.clone();
        self.persist(&records).await?;
        info!(collection = %T::COLLECTION, id, "Updated record");
        Ok(Some(updated))
    }

    /// Remove the record with `id`. Returns whether one was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read or written.
    pub async fn delete<T: Record>(&self, id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.get_all::<T>().await?;
        let before = records.len();
        records.retain(|record| record.id() != id);

        if records.len() == before {
            return Ok(false);
        }

        self.persist(&records).await?;
        info!(collection = %T::COLLECTION, id, "Deleted record");
        Ok(true)
    }

    /// Replace a whole collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails.
    pub async fn replace_all<T: Record>(&self, records: &[T]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.persist(records).await?;
        info!(collection = %T::COLLECTION, count = records.len(), "Replaced collection");
        Ok(())
    }

    /// Remove every collection from the provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.kv.clear().await
    }

    /// Number of records in a collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be read.
    pub async fn count<T: Record>(&self) -> Result<usize> {
        Ok(self.get_all::<T>().await?.len())
    }

    async fn persist<T: Record>(&self, records: &[T]) -> Result<()> {
        let raw = serde_json::to_string(records)?;
        self.kv.set(&self.key_for(T::COLLECTION), &raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Assignment, AssignmentPatch, AssignmentStatus, Doctor, Location};
    use crate::storage::MemoryKv;
    use chrono::{TimeZone, Utc};

    fn doctor(id: &str) -> Doctor {
        Doctor {
            id: id.to_string(),
            name: format!("Dr. {id}"),
            specialization: "Cardiology".to_string(),
            location: Location::new(28.6139, 77.209),
            address: None,
        }
    }

    fn assignment(id: &str, progress: u32) -> Assignment {
        Assignment {
            id: id.to_string(),
            employee_id: "e1".to_string(),
            doctor_id: "d1".to_string(),
            target: 10,
            assigned_date: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
            assigned_by: "admin".to_string(),
            status: AssignmentStatus::Active,
            current_progress: progress,
        }
    }

    fn memory_store() -> (Arc<MemoryKv>, LocalStore) {
        crate::logging::init_test_logging();
        let kv = Arc::new(MemoryKv::new());
        let store = LocalStore::new(kv.clone());
        (kv, store)
    }

    #[tokio::test]
    async fn test_missing_collection_is_empty() {
        let (_, store) = memory_store();
        let doctors: Vec<Doctor> = store.get_all().await.unwrap();
        assert!(doctors.is_empty());
    }

    #[tokio::test]
    async fn test_create_then_get_by_id_round_trip() {
        let (_, store) = memory_store();
        let created = store.create(doctor("d1")).await.unwrap();
        assert_eq!(created, doctor("d1"));

        let fetched: Option<Doctor> = store.get_by_id(&created.id).await.unwrap();
        assert_eq!(fetched, Some(created));
    }

    #[tokio::test]
    async fn test_create_keeps_insertion_order_and_duplicates() {
        let (_, store) = memory_store();
        store.create(doctor("d2")).await.unwrap();
        store.create(doctor("d1")).await.unwrap();
        store.create(doctor("d2")).await.unwrap();

        let ids: Vec<String> = store
            .get_all::<Doctor>()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["d2", "d1", "d2"]);
    }

    #[tokio::test]
    async fn test_collections_use_prefixed_keys() {
        let (kv, store) = memory_store();
        store.create(doctor("d1")).await.unwrap();

        let keys = kv.keys().await.unwrap();
        assert_eq!(keys, vec!["@fieldops:doctors"]);
        let raw = kv.get("@fieldops:doctors").await.unwrap().unwrap();
        assert!(raw.starts_with('['));
    }

    #[tokio::test]
    async fn test_update_merges_partial_fields() {
        let (_, store) = memory_store();
        store.create(assignment("a1", 5)).await.unwrap();

        let patch = AssignmentPatch {
            current_progress: Some(7),
            ..AssignmentPatch::default()
        };
        let updated: Assignment = store.update("a1", &patch).await.unwrap().unwrap();
        assert_eq!(updated.current_progress, 7);
        assert_eq!(updated.target, 10);
        assert_eq!(updated.status, AssignmentStatus::Active);

        let stored: Assignment = store.get_by_id("a1").await.unwrap().unwrap();
        assert_eq!(stored, updated);
    }

    #[tokio::test]
    async fn test_update_missing_id_does_not_write() {
        let (kv, store) = memory_store();
        store.create(assignment("a1", 5)).await.unwrap();
        let writes = kv.write_count();

        let result: Option<Assignment> = store
            .update("nope", &serde_json::json!({"currentProgress": 1}))
            .await
            .unwrap();
        assert!(result.is_none());
        assert_eq!(kv.write_count(), writes);
    }

    #[tokio::test]
    async fn test_update_rejects_non_object_patch() {
        let (_, store) = memory_store();
        store.create(assignment("a1", 5)).await.unwrap();

        let result = store.update::<Assignment, _>("a1", &42).await;
        assert!(matches!(result, Err(Error::InvalidPatch { .. })));
    }

    #[tokio::test]
    async fn test_update_rejects_patch_that_breaks_schema() {
        let (_, store) = memory_store();
        store.create(assignment("a1", 5)).await.unwrap();

        let result = store
            .update::<Assignment, _>("a1", &serde_json::json!({"target": "lots"}))
            .await;
        assert!(matches!(result, Err(Error::InvalidPatch { .. })));

        let stored: Assignment = store.get_by_id("a1").await.unwrap().unwrap();
        assert_eq!(stored.target, 10);
    }

    #[tokio::test]
    async fn test_delete_then_get_by_id_is_none() {
        let (_, store) = memory_store();
        store.create(doctor("d1")).await.unwrap();

        assert!(store.delete::<Doctor>("d1").await.unwrap());
        assert!(store.get_by_id::<Doctor>("d1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_returns_false_without_write() {
        let (kv, store) = memory_store();
        store.create(doctor("d1")).await.unwrap();
        let writes = kv.write_count();

        assert!(!store.delete::<Doctor>("d9").await.unwrap());
        assert_eq!(kv.write_count(), writes);
        assert_eq!(store.count::<Doctor>().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_malformed_collection_surfaces_json_error() {
        let (kv, store) = memory_store();
        kv.set("@fieldops:doctors", "{not json").await.unwrap();

        let result = store.get_all::<Doctor>().await;
        assert!(matches!(result, Err(Error::Json(_))));
    }

    #[tokio::test]
    async fn test_replace_all_and_clear() {
        let (_, store) = memory_store();
        store
            .replace_all(&[doctor("d1"), doctor("d2")])
            .await
            .unwrap();
        assert_eq!(store.count::<Doctor>().await.unwrap(), 2);

        store.clear().await.unwrap();
        assert_eq!(store.count::<Doctor>().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_custom_prefix() {
        let kv = Arc::new(MemoryKv::new());
        let store = LocalStore::with_prefix(kv.clone(), "@test:");
        store.create(doctor("d1")).await.unwrap();
        assert_eq!(store.key_for(Collection::Doctors), "@test:doctors");
        assert!(kv.get("@test:doctors").await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_are_not_lost() {
        let (_, store) = memory_store();

        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.create(doctor(&format!("d{i}"))).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.count::<Doctor>().await.unwrap(), 32);
    }
}
