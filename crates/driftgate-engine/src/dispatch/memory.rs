//! In-memory dispatch collaborators for testing.
//!
//! This module provides static/recording implementations of the dispatch
//! ports suitable for testing and development:
//!
//! - [`StaticInventory`]: Serves pre-registered workloads per region, with
//!   per-region failure injection
//! - [`StaticArtifacts`]: Serves pre-registered images per region
//! - [`RecordingTaskLauncher`]: Captures every submission and can be told to
//!   reject specific regions
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: No real cloud calls, no persistence
//! - **Single-process only**: State is not shared across process boundaries

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use ulid::Ulid;

use super::{
    ArtifactLookup, ArtifactRef, InventoryService, JobSubmission, TaskHandle, TaskLauncher,
    WorkloadDescription,
};
use crate::error::{Error, Result};

/// Converts a lock poison error to a storage error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::storage("recording launcher lock poisoned")
}

/// Serves pre-registered workloads per region.
#[derive(Debug, Default)]
pub struct StaticInventory {
    workloads: HashMap<String, WorkloadDescription>,
    failing_regions: BTreeSet<String>,
}

impl StaticInventory {
    /// Creates an empty inventory: every lookup returns not-found.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the active workload for a region.
    #[must_use]
    pub fn with_workload(mut self, workload: WorkloadDescription) -> Self {
        self.workloads.insert(workload.region.clone(), workload);
        self
    }

    /// Makes lookups for a region fail with an upstream error.
    #[must_use]
    pub fn with_failing_region(mut self, region: impl Into<String>) -> Self {
        self.failing_regions.insert(region.into());
        self
    }
}

#[async_trait]
impl InventoryService for StaticInventory {
    async fn lookup_active_workload(
        &self,
        _account: &str,
        _cluster: &str,
        region: &str,
        _provider: &str,
    ) -> Result<Option<WorkloadDescription>> {
        if self.failing_regions.contains(region) {
            return Err(Error::upstream(
                "inventory",
                format!("lookup failed in {region}"),
            ));
        }
        Ok(self.workloads.get(region).cloned())
    }
}

/// Serves pre-registered images per region.
#[derive(Debug, Default)]
pub struct StaticArtifacts {
    images: BTreeMap<String, ArtifactRef>,
}

impl StaticArtifacts {
    /// Creates an empty lookup: no region has a qualifying artifact.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the latest qualifying image for a region.
    #[must_use]
    pub fn with_image(mut self, region: impl Into<String>, image_name: impl Into<String>) -> Self {
        self.images.insert(
            region.into(),
            ArtifactRef {
                image_name: image_name.into(),
            },
        );
        self
    }
}

#[async_trait]
impl ArtifactLookup for StaticArtifacts {
    async fn latest_artifacts(
        &self,
        _version: &str,
        _account: &str,
        regions: &BTreeSet<String>,
        _base_os: &str,
    ) -> Result<BTreeMap<String, ArtifactRef>> {
        Ok(self
            .images
            .iter()
            .filter(|(region, _)| regions.contains(*region))
            .map(|(region, image)| (region.clone(), image.clone()))
            .collect())
    }
}

/// Captures every submission; rejects the regions it is told to.
///
/// Task handles are generated with ULIDs, so every accepted submission gets
/// a unique id.
#[derive(Debug, Default)]
pub struct RecordingTaskLauncher {
    attempts: RwLock<Vec<JobSubmission>>,
    failing_regions: BTreeSet<String>,
}

impl RecordingTaskLauncher {
    /// Creates a launcher that accepts every submission.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes submissions whose stages touch `region` fail.
    #[must_use]
    pub fn with_failing_region(mut self, region: impl Into<String>) -> Self {
        self.failing_regions.insert(region.into());
        self
    }

    /// Returns every submission attempted, accepted or not, in arrival
    /// order.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn attempts(&self) -> Result<Vec<JobSubmission>> {
        let attempts = self.attempts.read().map_err(poison_err)?;
        Ok(attempts.clone())
    }

    /// Returns the number of submissions attempted.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn call_count(&self) -> Result<usize> {
        let attempts = self.attempts.read().map_err(poison_err)?;
        Ok(attempts.len())
    }
}

#[async_trait]
impl TaskLauncher for RecordingTaskLauncher {
    async fn submit_job(&self, submission: JobSubmission) -> Result<TaskHandle> {
        let rejected = submission
            .stages
            .iter()
            .any(|stage| self.failing_regions.contains(&stage.region));
        let subject = submission.subject.clone();

        {
            let mut attempts = self.attempts.write().map_err(poison_err)?;
            attempts.push(submission);
        }

        if rejected {
            return Err(Error::upstream("task-launch", "submission rejected"));
        }
        Ok(TaskHandle {
            id: Ulid::new().to_string(),
            name: subject,
        })
    }
}
