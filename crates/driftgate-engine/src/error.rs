//! Error types for the decision-and-dispatch engines.
//!
//! Fatal conditions (storage failures, malformed veto messages,
//! pre-submission validation) surface synchronously through this enum.
//! Per-region submission failures are deliberately absent: they are absorbed
//! into a smaller result map plus a log/metric signal, never raised.

use std::collections::BTreeMap;

use driftgate_core::ResourceId;

use crate::dispatch::ArtifactKind;

/// The result type used throughout driftgate-engine.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in gate and dispatch operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A backing store was unavailable or inconsistent.
    ///
    /// Propagated to the caller as-is; retry policy belongs to the caller.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A veto configuration message did not match the recognized shape.
    ///
    /// Veto state is left unchanged. The expected shape is attached so
    /// callers can render a schema/help message.
    #[error("malformed message for veto {veto}: expected shape {expected:?}")]
    MalformedMessage {
        /// The veto check that rejected the message.
        veto: String,
        /// The recognized message shape (field name to type name).
        expected: BTreeMap<&'static str, &'static str>,
    },

    /// No qualifying artifact exists in one or more requested regions.
    ///
    /// Fatal before any job is submitted; dispatch is all-or-nothing at the
    /// artifact resolution stage.
    #[error("no qualifying artifact for version {version} in regions: {}", .missing.join(", "))]
    ArtifactCoverage {
        /// The artifact version that was looked up.
        version: String,
        /// The requested regions with no qualifying artifact.
        missing: Vec<String>,
    },

    /// The source cluster has no active workload in one or more requested
    /// regions.
    ///
    /// Fatal before any job is submitted.
    #[error("source cluster {cluster} has no active workload in regions: {}", .missing.join(", "))]
    MissingSourceRegion {
        /// The source cluster that was resolved.
        cluster: String,
        /// The requested regions with no source workload.
        missing: Vec<String>,
    },

    /// The remediation request carries an artifact kind the dispatcher does
    /// not support.
    ///
    /// Raised before any network call.
    #[error("unsupported artifact kind for canary dispatch: {kind}")]
    UnsupportedArtifact {
        /// The unsupported artifact kind.
        kind: ArtifactKind,
    },

    /// `mark_action_taken` was called for a resource with no fingerprint
    /// record.
    ///
    /// Callers must `store` a diff before marking an action taken; reaching
    /// this state indicates a sequencing bug in the reconciliation loop.
    #[error("no diff fingerprint recorded for resource {resource}")]
    FingerprintNotFound {
        /// The resource that has no fingerprint record.
        resource: ResourceId,
    },

    /// A veto message was routed to a check that is not registered.
    #[error("no veto registered under name {name}")]
    UnknownVeto {
        /// The unrecognized veto name.
        name: String,
    },

    /// An external collaborator failed in a way that is fatal for the
    /// current operation.
    #[error("{service} error: {message}")]
    Upstream {
        /// The collaborating service (e.g. `inventory`, `artifact-lookup`).
        service: &'static str,
        /// Description of the failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An error from driftgate-core.
    #[error("core error: {0}")]
    Core(#[from] driftgate_core::Error),
}

impl Error {
    /// Creates a new storage error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new storage error with a source cause.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new upstream service error.
    #[must_use]
    pub fn upstream(service: &'static str, message: impl Into<String>) -> Self {
        Self::Upstream {
            service,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new upstream service error with a source cause.
    #[must_use]
    pub fn upstream_with_source(
        service: &'static str,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Upstream {
            service,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
