//! # driftgate-engine
//!
//! Decision-and-dispatch engines for the driftgate reconciliation gate.
//!
//! This crate implements the "should we act, and how do we act safely across
//! many regions" core of continuous reconciliation:
//!
//! - **Fingerprint Tracking**: Deduplicates repeated drift signals and
//!   counts how often a given diff has been observed and acted upon
//! - **Veto Gating**: Pluggable, independently stateful checks that can
//!   block remediation for a resource or a whole application
//! - **Canary Dispatch**: Fans one verification task out per region,
//!   tolerating individual region failures
//!
//! ## Control Flow
//!
//! The enclosing reconciliation loop (out of scope here) drives these
//! engines: compute diff, consult the veto gate, consult the fingerprint
//! store, dispatch if warranted, then mark the action taken.
//!
//! ## Guarantees
//!
//! - **Linearizable per resource**: Concurrent fingerprint stores for one
//!   resource never interleave into a corrupted record
//! - **Fail fast, then degrade**: Configuration problems abort a dispatch
//!   before anything is submitted; execution failures after that point are
//!   isolated per region
//! - **Nothing lost silently**: A store that cannot persist fails loudly;
//!   dropped regions are logged and counted
//!
//! ## Example
//!
//! ```rust
//! use driftgate_core::prelude::*;
//! use driftgate_engine::fingerprint::{FingerprintStore, InMemoryFingerprintStore};
//! use driftgate_engine::error::Result;
//! use serde_json::json;
//!
//! # async fn example() -> Result<()> {
//! let store = InMemoryFingerprintStore::new();
//! let id: ResourceId = "ec2:cluster:prod:fnord".parse().unwrap();
//!
//! let mut diff = ResourceDiff::new();
//! diff.record("capacity.desired", Some(json!(3)), Some(json!(5)));
//!
//! // First observation of this drift.
//! assert!(!store.seen(&id, &diff).await?);
//! store.store(&id, &diff).await?;
//! assert!(store.seen(&id, &diff).await?);
//! assert_eq!(store.diff_count(&id).await?, 1);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod fingerprint;
pub mod metrics;
pub mod veto;

pub use error::{Error, Result};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::CanaryDefaults;
    pub use crate::dispatch::{
        ArtifactKind, ArtifactLookup, ArtifactRef, ArtifactSpec, CanaryDispatcher,
        InventoryService, JobSubmission, RemediationRequest, SourceDescriptor, TaskHandle,
        TaskLauncher, WorkloadDescription,
    };
    pub use crate::error::{Error, Result};
    pub use crate::fingerprint::{DiffFingerprint, FingerprintStore, InMemoryFingerprintStore};
    pub use crate::metrics::EngineMetrics;
    pub use crate::veto::{
        ApplicationVeto, GateDecision, ResourceInventory, Veto, VetoGate, VetoRepository,
        VetoResponse,
    };
}
