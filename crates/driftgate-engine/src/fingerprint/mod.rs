//! Diff-fingerprint tracking for drift deduplication.
//!
//! This module provides:
//!
//! - [`DiffFingerprint`]: The per-resource record of the current drift digest
//! - [`FingerprintStore`]: Trait for fingerprint persistence backends
//! - [`InMemoryFingerprintStore`]: In-memory backend for testing
//!
//! ## Design Principles
//!
//! - **One record per resource**: Storing a diff with a new digest replaces
//!   the record and resets both counters
//! - **Linearizable per id**: Concurrent stores for the same resource must
//!   not interleave into a corrupted record
//! - **Loud failures**: A store that cannot persist fails rather than
//!   pretending the fingerprint was recorded

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use driftgate_core::{DiffDigest, ResourceDiff, ResourceId};

use crate::error::Result;

pub use memory::InMemoryFingerprintStore;

/// The fingerprint record for one managed resource.
///
/// At most one record exists per [`ResourceId`] at any time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffFingerprint {
    /// Digest of the most recently stored diff.
    pub digest: DiffDigest,
    /// Consecutive times this exact digest has been stored since it last
    /// changed.
    pub diff_count: u32,
    /// Times a remediation action has been marked taken while this digest
    /// was current.
    pub action_taken_count: u32,
    /// When this digest was first stored.
    pub first_detected_at: DateTime<Utc>,
    /// When this record was last mutated.
    pub last_updated_at: DateTime<Utc>,
}

impl DiffFingerprint {
    /// Creates a fresh record for a newly observed digest.
    #[must_use]
    pub fn new(digest: DiffDigest, now: DateTime<Utc>) -> Self {
        Self {
            digest,
            diff_count: 1,
            action_taken_count: 0,
            first_detected_at: now,
            last_updated_at: now,
        }
    }
}

/// Persistence for diff fingerprints.
///
/// Implementations must provide per-id atomic read-modify-write: a `store`
/// that resets counters must not be clobbered by a concurrent `store`
/// incrementing from stale state. The in-memory backend takes a write lock
/// across the whole mutation; a SQL backend would use an atomic upsert.
///
/// ## Thread Safety
///
/// All methods are `Send + Sync` to support concurrent access from many
/// reconciliation workers.
#[async_trait]
pub trait FingerprintStore: Send + Sync {
    /// Stores a diff observation for a resource.
    ///
    /// If no record exists, or the stored digest differs from this diff's
    /// digest, the record is created/replaced with `diff_count = 1` and
    /// `action_taken_count = 0`. If the digest matches, `diff_count` is
    /// incremented.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backing store cannot persist the
    /// record. Never fails for a well-formed diff.
    async fn store(&self, id: &ResourceId, diff: &ResourceDiff) -> Result<()>;

    /// Returns true iff a record exists for `id` and its stored digest
    /// exactly equals this diff's digest.
    ///
    /// Does not mutate state.
    async fn seen(&self, id: &ResourceId, diff: &ResourceDiff) -> Result<bool>;

    /// Increments `action_taken_count` for the current record.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FingerprintNotFound`] if no record exists:
    /// callers must `store` before marking an action taken.
    async fn mark_action_taken(&self, id: &ResourceId) -> Result<()>;

    /// Returns the current `diff_count`, or 0 if no record exists.
    async fn diff_count(&self, id: &ResourceId) -> Result<u32>;

    /// Returns the current `action_taken_count`, or 0 if no record exists.
    async fn action_taken_count(&self, id: &ResourceId) -> Result<u32>;

    /// Deletes the record for `id`.
    ///
    /// Succeeds whether or not a record existed.
    async fn clear(&self, id: &ResourceId) -> Result<()>;
}
