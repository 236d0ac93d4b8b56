//! Pluggable veto checks that can block remediation.
//!
//! This module provides:
//!
//! - [`Veto`]: Capability trait for independent allow/deny checks
//! - [`VetoGate`]: Ordered registry aggregating checks by unanimous allow
//! - [`ApplicationVeto`]: The canonical check, denying opted-out applications
//!
//! ## Design Principles
//!
//! - **Independence**: Each check inspects a resource without consulting or
//!   affecting any other check
//! - **Unanimity**: A resource is remediation-eligible only if every
//!   registered check allows it
//! - **Observability**: All checks are evaluated even after a denial; the
//!   first denial's reason is surfaced to the operator
//! - **No caching**: Veto state changes take effect immediately for
//!   subsequent checks

pub mod application;
pub mod memory;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use driftgate_core::{Resource, ResourceId};

use crate::error::{Error, Result};
use crate::metrics::EngineMetrics;

pub use application::{ApplicationVeto, ResourceInventory, VetoRepository};
pub use memory::{InMemoryResourceInventory, InMemoryVetoRepository};

/// The outcome of a single veto check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VetoResponse {
    /// Whether the check allows remediation.
    pub allowed: bool,
    /// The name of the check that produced this response.
    pub veto: String,
    /// Human-readable reason, present on denial.
    pub reason: Option<String>,
}

impl VetoResponse {
    /// Creates an allowing response for the named check.
    #[must_use]
    pub fn allowed(veto: impl Into<String>) -> Self {
        Self {
            allowed: true,
            veto: veto.into(),
            reason: None,
        }
    }

    /// Creates a denying response with a reason.
    #[must_use]
    pub fn denied(veto: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            veto: veto.into(),
            reason: Some(reason.into()),
        }
    }
}

/// An independent check that can block remediation for a resource.
///
/// Each check is independently stateful: its backing state is mutated only
/// through [`Veto::pass_message`], never by the check logic itself.
///
/// ## Thread Safety
///
/// All methods are `Send + Sync` to support concurrent access from many
/// reconciliation workers.
#[async_trait]
pub trait Veto: Send + Sync {
    /// The stable name this check is registered and addressed by.
    fn name(&self) -> &'static str;

    /// Checks whether remediation of `resource` is allowed.
    async fn check(&self, resource: &Resource) -> Result<VetoResponse>;

    /// Checks by application name directly.
    ///
    /// Must be consistent with [`Veto::check`] for the same application.
    async fn check_application(
        &self,
        resource_id: &ResourceId,
        application: &str,
    ) -> Result<VetoResponse>;

    /// The recognized shape of configuration messages, as field name to
    /// type name.
    ///
    /// Attached to malformed-message errors so callers can render a help
    /// message.
    fn message_format(&self) -> BTreeMap<&'static str, &'static str>;

    /// Accepts an externally supplied configuration update.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedMessage`] if the message cannot be coerced
    /// into the recognized shape; existing veto state is left unchanged.
    async fn pass_message(&self, message: Value) -> Result<()>;

    /// The application names this check currently rejects.
    async fn current_rejections(&self) -> Result<BTreeSet<String>>;

    /// The resources of `application` this check currently rejects, in
    /// inventory order.
    async fn current_rejections_by_app(&self, application: &str) -> Result<Vec<ResourceId>>;
}

/// The aggregate outcome of running a resource through every registered
/// check.
#[derive(Debug, Clone)]
pub struct GateDecision {
    responses: Vec<VetoResponse>,
}

impl GateDecision {
    /// Returns true iff every check allowed remediation.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        self.responses.iter().all(|r| r.allowed)
    }

    /// Returns the first denial's reason, if any check denied.
    #[must_use]
    pub fn denial_reason(&self) -> Option<&str> {
        self.responses
            .iter()
            .find(|r| !r.allowed)
            .and_then(|r| r.reason.as_deref())
    }

    /// Returns every check's response, in registration order.
    #[must_use]
    pub fn responses(&self) -> &[VetoResponse] {
        &self.responses
    }
}

/// Ordered registry of veto checks, aggregated by unanimous allow.
pub struct VetoGate {
    vetoes: Vec<Arc<dyn Veto>>,
    metrics: EngineMetrics,
}

impl VetoGate {
    /// Creates a gate over the given checks, evaluated in order.
    #[must_use]
    pub fn new(vetoes: Vec<Arc<dyn Veto>>) -> Self {
        Self {
            vetoes,
            metrics: EngineMetrics::new(),
        }
    }

    /// Runs `resource` through every registered check.
    ///
    /// Every check is evaluated even after a denial, so each check's state
    /// is observable; denials are counted per check.
    #[tracing::instrument(skip(self, resource), fields(resource = %resource.id))]
    pub async fn check(&self, resource: &Resource) -> Result<GateDecision> {
        let mut responses = Vec::with_capacity(self.vetoes.len());
        for veto in &self.vetoes {
            let response = veto.check(resource).await?;
            if !response.allowed {
                tracing::info!(
                    veto = %response.veto,
                    reason = response.reason.as_deref().unwrap_or(""),
                    "remediation vetoed"
                );
                self.metrics.record_veto_denial(&response.veto);
            }
            responses.push(response);
        }
        Ok(GateDecision { responses })
    }

    /// Routes a configuration message to the named check.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownVeto`] if no check is registered under
    /// `veto`, or the check's own error if the message is malformed.
    pub async fn pass_message(&self, veto: &str, message: Value) -> Result<()> {
        let Some(target) = self.vetoes.iter().find(|v| v.name() == veto) else {
            return Err(Error::UnknownVeto {
                name: veto.to_string(),
            });
        };
        target.pass_message(message).await
    }

    /// Returns the rejected application names per check.
    pub async fn current_rejections(&self) -> Result<BTreeMap<&'static str, BTreeSet<String>>> {
        let mut rejections = BTreeMap::new();
        for veto in &self.vetoes {
            rejections.insert(veto.name(), veto.current_rejections().await?);
        }
        Ok(rejections)
    }
}
