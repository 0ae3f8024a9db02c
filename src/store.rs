//! Record storage behind the protected API
//!
//! The API only needs a map from identifier to record; [`RecordStore`] is that
//! seam, injected into the router. Not-found is reported as `None`/`false` and
//! has nothing to do with authorization.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

/// A protected record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedData {
    pub id: String,
    pub description: String,
}

/// Request body for create and update; any `id` in the body is ignored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordInput {
    pub description: String,
}

pub trait RecordStore: Send + Sync {
    fn list(&self) -> Vec<ProtectedData>;

    fn get(&self, id: &str) -> Option<ProtectedData>;

    /// Store a new record under a fresh identifier
    fn insert(&self, description: String) -> ProtectedData;

    /// Replace the description of an existing record
    fn update(&self, id: &str, description: String) -> Option<ProtectedData>;

    /// `true` when a record was removed
    fn remove(&self, id: &str) -> bool;
}

/// In-process store; identifiers are never reused
#[derive(Debug)]
pub struct InMemoryStore {
    records: RwLock<Vec<ProtectedData>>,
    next_id: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Store holding three sample records
    pub fn seeded() -> Self {
        let store = Self::new();
        for description in [
            "First protected record",
            "Second protected record",
            "Third protected record",
        ] {
            store.insert(description.to_string());
        }
        store
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for InMemoryStore {
    fn list(&self) -> Vec<ProtectedData> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn get(&self, id: &str) -> Option<ProtectedData> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|record| record.id == id)
            .cloned()
    }

    fn insert(&self, description: String) -> ProtectedData {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let record = ProtectedData {
            id: id.to_string(),
            description,
        };
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        record
    }

    fn update(&self, id: &str, description: String) -> Option<ProtectedData> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let record = records.iter_mut().find(|record| record.id == id)?;
        record.description = description;
        Some(record.clone())
    }

    fn remove(&self, id: &str) -> bool {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let before = records.len();
        records.retain(|record| record.id != id);
        records.len() != before
    }
}
