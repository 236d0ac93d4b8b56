//! Application-level veto: deny remediation for opted-out applications.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use driftgate_core::{Resource, ResourceId};

use super::{Veto, VetoResponse};
use crate::error::{Error, Result};

/// Backing repository for per-application opt-out state.
///
/// Owned exclusively by the veto; mutated only through opt-in/opt-out,
/// never by the check logic itself. Writes must be immediately visible to
/// subsequent reads.
#[async_trait]
pub trait VetoRepository: Send + Sync {
    /// Records `application` as opted in (remediation allowed).
    async fn opt_in(&self, application: &str) -> Result<()>;

    /// Records `application` as opted out (remediation blocked).
    async fn opt_out(&self, application: &str) -> Result<()>;

    /// Returns true if `application` is currently opted out.
    async fn is_opted_out(&self, application: &str) -> Result<bool>;

    /// Returns every application currently opted out.
    async fn all_opted_out(&self) -> Result<BTreeSet<String>>;
}

/// Read access to the resources owned by an application.
#[async_trait]
pub trait ResourceInventory: Send + Sync {
    /// Returns the resources of `application`, in stable inventory order.
    async fn resources_of_application(&self, application: &str) -> Result<Vec<ResourceId>>;
}

/// The recognized configuration message shape.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct OptOutMessage {
    application: String,
    #[serde(rename = "optedOut")]
    opted_out: bool,
}

/// Denies remediation for resources whose owning application has opted out.
pub struct ApplicationVeto {
    repository: Arc<dyn VetoRepository>,
    inventory: Arc<dyn ResourceInventory>,
}

impl ApplicationVeto {
    /// The name this check registers under.
    pub const NAME: &'static str = "ApplicationVeto";

    /// Creates the veto over its backing repository and resource inventory.
    #[must_use]
    pub fn new(repository: Arc<dyn VetoRepository>, inventory: Arc<dyn ResourceInventory>) -> Self {
        Self {
            repository,
            inventory,
        }
    }

    async fn check_by_application(&self, application: &str) -> Result<VetoResponse> {
        if self.repository.is_opted_out(application).await? {
            return Ok(VetoResponse::denied(
                Self::NAME,
                format!("Application {application} has been opted out."),
            ));
        }
        Ok(VetoResponse::allowed(Self::NAME))
    }
}

#[async_trait]
impl Veto for ApplicationVeto {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn check(&self, resource: &Resource) -> Result<VetoResponse> {
        self.check_by_application(&resource.application).await
    }

    async fn check_application(
        &self,
        _resource_id: &ResourceId,
        application: &str,
    ) -> Result<VetoResponse> {
        self.check_by_application(application).await
    }

    fn message_format(&self) -> BTreeMap<&'static str, &'static str> {
        BTreeMap::from([("application", "String"), ("optedOut", "Boolean")])
    }

    #[tracing::instrument(skip(self, message))]
    async fn pass_message(&self, message: Value) -> Result<()> {
        tracing::debug!(%message, "received veto configuration message");
        let parsed: OptOutMessage =
            serde_json::from_value(message).map_err(|_| Error::MalformedMessage {
                veto: Self::NAME.to_string(),
                expected: self.message_format(),
            })?;
        if parsed.opted_out {
            self.repository.opt_out(&parsed.application).await
        } else {
            self.repository.opt_in(&parsed.application).await
        }
    }

    async fn current_rejections(&self) -> Result<BTreeSet<String>> {
        self.repository.all_opted_out().await
    }

    async fn current_rejections_by_app(&self, application: &str) -> Result<Vec<ResourceId>> {
        self.inventory.resources_of_application(application).await
    }
}
