//! # driftgate-core
//!
//! Core abstractions for the driftgate reconciliation gate.
//!
//! This crate provides the foundational types shared across all driftgate
//! components:
//!
//! - **Identifiers**: Strongly-typed IDs for managed resources
//! - **Diff Model**: Structural desired-vs-observed diffs and their digests
//! - **Canonical JSON**: Deterministic serialization for digest preimages
//! - **Error Types**: Shared error definitions and result types
//!
//! ## Crate Boundary
//!
//! `driftgate-core` is the only crate allowed to define shared primitives.
//! It performs no I/O and has no async surface; the engines in
//! `driftgate-engine` build on these types.
//!
//! ## Example
//!
//! ```rust
//! use driftgate_core::prelude::*;
//! use serde_json::json;
//!
//! let id: ResourceId = "ec2:cluster:prod:fnord".parse().unwrap();
//!
//! let mut diff = ResourceDiff::new();
//! diff.record("capacity.desired", Some(json!(3)), Some(json!(5)));
//!
//! // Digests are stable across entry insertion order.
//! let digest = diff.digest().unwrap();
//! assert!(digest.as_str().starts_with("sha256:"));
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod canonical;
pub mod diff;
pub mod error;
pub mod id;
pub mod resource;

pub use diff::{DiffDigest, FieldDelta, ResourceDiff};
pub use error::{Error, Result};
pub use id::ResourceId;
pub use resource::Resource;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use driftgate_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::diff::{DiffDigest, FieldDelta, ResourceDiff};
    pub use crate::error::{Error, Result};
    pub use crate::id::ResourceId;
    pub use crate::resource::Resource;
}
