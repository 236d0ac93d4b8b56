//! In-memory fingerprint store implementation for testing.
//!
//! This module provides [`InMemoryFingerprintStore`], a simple in-memory
//! implementation of the [`FingerprintStore`] trait suitable for testing and
//! development.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: No durability, no cross-process
//!   coordination
//! - **Single-process only**: State is not shared across process boundaries

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use driftgate_core::{ResourceDiff, ResourceId};

use super::{DiffFingerprint, FingerprintStore};
use crate::error::{Error, Result};

/// In-memory fingerprint store for testing.
///
/// Provides a thread-safe implementation of the [`FingerprintStore`] trait
/// using `RwLock` for synchronization. The write lock spans each whole
/// read-modify-write, which linearizes mutations per resource id.
///
/// ## Example
///
/// ```rust
/// use driftgate_engine::fingerprint::InMemoryFingerprintStore;
///
/// let store = InMemoryFingerprintStore::new();
/// // Use store in tests...
/// ```
#[derive(Debug, Default)]
pub struct InMemoryFingerprintStore {
    records: RwLock<HashMap<ResourceId, DiffFingerprint>>,
}

/// Converts a lock poison error to a storage error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::storage("fingerprint store lock poisoned")
}

impl InMemoryFingerprintStore {
    /// Creates a new, empty in-memory fingerprint store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current record for a resource, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn record(&self, id: &ResourceId) -> Result<Option<DiffFingerprint>> {
        let records = self.records.read().map_err(poison_err)?;
        Ok(records.get(id).cloned())
    }

    /// Returns the number of resources with a fingerprint record.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        let records = self.records.read().map_err(poison_err)?;
        Ok(records.len())
    }

    /// Returns true if no resource has a fingerprint record.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl FingerprintStore for InMemoryFingerprintStore {
    #[tracing::instrument(skip(self, diff), fields(resource = %id))]
    async fn store(&self, id: &ResourceId, diff: &ResourceDiff) -> Result<()> {
        let digest = diff.digest()?;
        let now = Utc::now();

        let mut records = self.records.write().map_err(poison_err)?;
        match records.get_mut(id) {
            Some(record) if record.digest == digest => {
                record.diff_count += 1;
                record.last_updated_at = now;
            }
            _ => {
                records.insert(id.clone(), DiffFingerprint::new(digest, now));
            }
        }
        Ok(())
    }

    async fn seen(&self, id: &ResourceId, diff: &ResourceDiff) -> Result<bool> {
        let digest = diff.digest()?;
        let records = self.records.read().map_err(poison_err)?;
        Ok(records.get(id).is_some_and(|r| r.digest == digest))
    }

    #[tracing::instrument(skip(self), fields(resource = %id))]
    async fn mark_action_taken(&self, id: &ResourceId) -> Result<()> {
        let mut records = self.records.write().map_err(poison_err)?;
        match records.get_mut(id) {
            Some(record) => {
                record.action_taken_count += 1;
                record.last_updated_at = Utc::now();
                Ok(())
            }
            None => Err(Error::FingerprintNotFound {
                resource: id.clone(),
            }),
        }
    }

    async fn diff_count(&self, id: &ResourceId) -> Result<u32> {
        let records = self.records.read().map_err(poison_err)?;
        Ok(records.get(id).map_or(0, |r| r.diff_count))
    }

    async fn action_taken_count(&self, id: &ResourceId) -> Result<u32> {
        let records = self.records.read().map_err(poison_err)?;
        Ok(records.get(id).map_or(0, |r| r.action_taken_count))
    }

    async fn clear(&self, id: &ResourceId) -> Result<()> {
        let mut records = self.records.write().map_err(poison_err)?;
        records.remove(id);
        Ok(())
    }
}
