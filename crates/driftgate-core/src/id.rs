//! Strongly-typed identifiers for driftgate entities.
//!
//! Resource identifiers are assigned by the resource model that owns the
//! desired/observed state, not generated here. They are:
//!
//! - **Opaque**: The gate never interprets their internal structure
//! - **Stable**: The same resource always presents the same id
//! - **Orderable**: Ids sort lexicographically for deterministic listings
//!
//! # Example
//!
//! ```rust
//! use driftgate_core::id::ResourceId;
//!
//! let id: ResourceId = "ec2:cluster:prod:fnord".parse().unwrap();
//! assert_eq!(id.to_string(), "ec2:cluster:prod:fnord");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// The stable identifier of a managed resource.
///
/// Used as the key for fingerprint records and per-resource veto lookups.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Creates a resource id from a non-empty string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidId`] if the string is empty.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::InvalidId {
                message: "resource id must not be empty".to_string(),
            });
        }
        Ok(Self(id))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ResourceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_id_roundtrip() {
        let id: ResourceId = "ec2:cluster:prod:fnord".parse().unwrap();
        let parsed: ResourceId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn resource_id_rejects_empty() {
        let result: Result<ResourceId> = "".parse();
        assert!(matches!(result, Err(Error::InvalidId { .. })));
    }

    #[test]
    fn resource_id_orders_lexicographically() {
        let a: ResourceId = "aaa".parse().unwrap();
        let b: ResourceId = "bbb".parse().unwrap();
        assert!(a < b);
    }

    #[test]
    fn resource_id_serde_transparent() {
        let id: ResourceId = "ec2:cluster:prod:fnord".parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"ec2:cluster:prod:fnord\"");
    }
}
