//! In-memory veto backing stores for testing.
//!
//! This module provides [`InMemoryVetoRepository`] and
//! [`InMemoryResourceInventory`], simple in-memory implementations of the
//! veto ports suitable for testing and development.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: No persistence, no cross-process
//!   coordination
//! - **Single-process only**: State is not shared across process boundaries

use std::collections::{BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use driftgate_core::ResourceId;

use super::application::{ResourceInventory, VetoRepository};
use crate::error::{Error, Result};

/// Converts a lock poison error to a storage error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::storage("veto repository lock poisoned")
}

/// In-memory opt-out state for testing.
///
/// Writes take the lock exclusively, so opt-in/opt-out is atomic and
/// immediately visible to subsequent checks.
#[derive(Debug, Default)]
pub struct InMemoryVetoRepository {
    opted_out: RwLock<BTreeSet<String>>,
}

impl InMemoryVetoRepository {
    /// Creates a new, empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VetoRepository for InMemoryVetoRepository {
    async fn opt_in(&self, application: &str) -> Result<()> {
        let mut opted_out = self.opted_out.write().map_err(poison_err)?;
        opted_out.remove(application);
        Ok(())
    }

    async fn opt_out(&self, application: &str) -> Result<()> {
        let mut opted_out = self.opted_out.write().map_err(poison_err)?;
        opted_out.insert(application.to_string());
        Ok(())
    }

    async fn is_opted_out(&self, application: &str) -> Result<bool> {
        let opted_out = self.opted_out.read().map_err(poison_err)?;
        Ok(opted_out.contains(application))
    }

    async fn all_opted_out(&self) -> Result<BTreeSet<String>> {
        let opted_out = self.opted_out.read().map_err(poison_err)?;
        Ok(opted_out.clone())
    }
}

/// In-memory application-to-resources inventory for testing.
#[derive(Debug, Default)]
pub struct InMemoryResourceInventory {
    resources: RwLock<HashMap<String, Vec<ResourceId>>>,
}

impl InMemoryResourceInventory {
    /// Creates a new, empty inventory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resource under an application.
    ///
    /// Resources are returned in registration order.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn register(&self, application: &str, id: ResourceId) -> Result<()> {
        let mut resources = self.resources.write().map_err(poison_err)?;
        resources.entry(application.to_string()).or_default().push(id);
        Ok(())
    }
}

#[async_trait]
impl ResourceInventory for InMemoryResourceInventory {
    async fn resources_of_application(&self, application: &str) -> Result<Vec<ResourceId>> {
        let resources = self.resources.read().map_err(poison_err)?;
        Ok(resources.get(application).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opt_out_then_in_round_trips() -> Result<()> {
        let repo = InMemoryVetoRepository::new();
        assert!(!repo.is_opted_out("fnord").await?);

        repo.opt_out("fnord").await?;
        assert!(repo.is_opted_out("fnord").await?);
        assert_eq!(repo.all_opted_out().await?.len(), 1);

        repo.opt_in("fnord").await?;
        assert!(!repo.is_opted_out("fnord").await?);
        assert!(repo.all_opted_out().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn opt_in_for_unknown_application_is_a_no_op() -> Result<()> {
        let repo = InMemoryVetoRepository::new();
        repo.opt_in("never-seen").await?;
        assert!(repo.all_opted_out().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn inventory_preserves_registration_order() -> Result<()> {
        let inventory = InMemoryResourceInventory::new();
        let first: ResourceId = "ec2:cluster:prod:fnord-a".parse().unwrap();
        let second: ResourceId = "ec2:cluster:prod:fnord-b".parse().unwrap();
        inventory.register("fnord", first.clone())?;
        inventory.register("fnord", second.clone())?;

        let resources = inventory.resources_of_application("fnord").await?;
        assert_eq!(resources, vec![first, second]);
        Ok(())
    }

    #[tokio::test]
    async fn inventory_returns_empty_for_unknown_application() -> Result<()> {
        let inventory = InMemoryResourceInventory::new();
        assert!(inventory.resources_of_application("ghost").await?.is_empty());
        Ok(())
    }
}
