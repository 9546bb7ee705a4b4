//! In-memory resource accumulator
//!
//! Collects flattened records grouped by logical type during one
//! extraction run, then drains the whole set into a [`Target`] once
//! extraction is complete. Mutation and persistence are temporally
//! disjoint: exactly one pass populates the repository, then a single
//! `save_to` reads it. Not safe for concurrent writers.

use crate::flatten::FlatRecord;
use crate::target::{Target, TargetError};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Reserved field present on every stored record. The value of the
/// record's unique-id key is copied here at `add` time, and this field
/// becomes the primary-key column of the record's table.
pub const SYSTEM_UNIQUE_ID_KEY: &str = "id";

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The record lacks the field designated as its unique identifier.
    /// Surfaced to the caller so the extraction run aborts instead of
    /// silently dropping a resource.
    #[error("record of type '{resource_type}' has no unique id key '{unique_id_key}'")]
    MissingUniqueId {
        resource_type: String,
        unique_id_key: String,
    },
}

/// Keeps all extracted resources in memory, grouped by logical type.
///
/// All state is owned by the instance, so multiple extraction runs in the
/// same process stay isolated from each other.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    resources: BTreeMap<String, Vec<FlatRecord>>,
    counts: HashMap<String, usize>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a flattened resource under `resource_type`, taking its unique
    /// identifier from the default [`SYSTEM_UNIQUE_ID_KEY`] field.
    pub fn add(&mut self, resource_type: &str, record: FlatRecord) -> Result<(), RepositoryError> {
        self.add_with_key(resource_type, record, SYSTEM_UNIQUE_ID_KEY)
    }

    /// Add a flattened resource, designating `unique_id_key` as the field
    /// holding its unique identifier.
    ///
    /// The value under `unique_id_key` is copied into the reserved
    /// [`SYSTEM_UNIQUE_ID_KEY`] field, overwriting anything already there.
    /// Fails if the record has no such key.
    pub fn add_with_key(
        &mut self,
        resource_type: &str,
        mut record: FlatRecord,
        unique_id_key: &str,
    ) -> Result<(), RepositoryError> {
        let unique_id = record.get(unique_id_key).cloned().ok_or_else(|| {
            RepositoryError::MissingUniqueId {
                resource_type: resource_type.to_string(),
                unique_id_key: unique_id_key.to_string(),
            }
        })?;
        record.insert(SYSTEM_UNIQUE_ID_KEY.to_string(), unique_id);

        self.resources
            .entry(resource_type.to_string())
            .or_default()
            .push(record);
        *self.counts.entry(resource_type.to_string()).or_insert(0) += 1;
        Ok(())
    }

    /// All accumulated records, keyed by logical type.
    pub fn get_all(&self) -> &BTreeMap<String, Vec<FlatRecord>> {
        &self.resources
    }

    /// Records of one type, in insertion order. Empty for unseen types.
    pub fn get_all_by_type(&self, resource_type: &str) -> &[FlatRecord] {
        self.resources
            .get(resource_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of records added under one type. Zero for unseen types.
    pub fn get_count_by_type(&self, resource_type: &str) -> usize {
        self.counts.get(resource_type).copied().unwrap_or(0)
    }

    /// Persist the full contents through a target. Pure delegation; any
    /// storage error propagates unchanged.
    pub fn save_to<T: Target>(&self, target: &mut T) -> Result<(), TargetError> {
        target.save(&self.resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::flatten;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn test_empty_repository() {
        let repository = MemoryRepository::new();

        assert!(repository.get_all().is_empty());
        assert_eq!(repository.get_count_by_type("unseen"), 0);
        assert!(repository.get_all_by_type("unseen").is_empty());
    }

    #[test]
    fn test_add_stores_record_and_counts() {
        let mut repository = MemoryRepository::new();
        repository
            .add("resource_type_1", flatten(&json!({"id": 1, "name": "vm"})))
            .unwrap();

        assert_eq!(repository.get_count_by_type("resource_type_1"), 1);
        let records = repository.get_all_by_type("resource_type_1");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["name"], "vm");
    }

    #[test]
    fn test_add_copies_unique_id_into_reserved_field() {
        let mut repository = MemoryRepository::new();
        repository
            .add_with_key(
                "subscriptions",
                flatten(&json!({"subscription_id": "sub-1", "id": "stale"})),
                "subscription_id",
            )
            .unwrap();

        let record = &repository.get_all_by_type("subscriptions")[0];
        // The designated key overwrites whatever was under the reserved field.
        assert_eq!(record[SYSTEM_UNIQUE_ID_KEY], "sub-1");
    }

    #[test]
    fn test_add_without_unique_id_fails() {
        let mut repository = MemoryRepository::new();
        let result = repository.add("resource_type_1", flatten(&json!({"name": "vm"})));

        assert!(matches!(
            result,
            Err(RepositoryError::MissingUniqueId { .. })
        ));
        assert_eq!(repository.get_count_by_type("resource_type_1"), 0);
    }

    #[test]
    fn test_instances_do_not_share_state() {
        let mut first = MemoryRepository::new();
        let second = MemoryRepository::new();

        first.add("resource_type_1", flatten(&json!({"id": 1}))).unwrap();

        assert_eq!(first.get_count_by_type("resource_type_1"), 1);
        assert_eq!(second.get_count_by_type("resource_type_1"), 0);
    }

    struct RecordingTarget {
        saved: BTreeMap<String, Vec<FlatRecord>>,
    }

    impl Target for RecordingTarget {
        fn save(&mut self, data: &BTreeMap<String, Vec<FlatRecord>>) -> Result<(), TargetError> {
            self.saved = data.clone();
            Ok(())
        }
    }

    #[test]
    fn test_save_to_delegates_full_mapping() {
        let mut repository = MemoryRepository::new();
        repository.add("type_a", flatten(&json!({"id": 1}))).unwrap();
        repository.add("type_b", flatten(&json!({"id": 2}))).unwrap();

        let mut target = RecordingTarget { saved: BTreeMap::new() };
        repository.save_to(&mut target).unwrap();

        assert_eq!(target.saved.len(), 2);
        assert_eq!(target.saved["type_a"].len(), 1);
        assert_eq!(target.saved["type_b"].len(), 1);
    }
}
