//! Minimal managed-resource descriptor.
//!
//! The full resource model (typed specs, desired/observed state) lives
//! outside this system. Veto checks only need the resource's identity and
//! its owning application, so that is all this descriptor carries.

use serde::{Deserialize, Serialize};

use crate::id::ResourceId;

/// A managed resource as seen by the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// The resource's stable identifier.
    pub id: ResourceId,
    /// The resource kind (e.g. `ec2/cluster@v1`).
    pub kind: String,
    /// The application that owns this resource.
    pub application: String,
}

impl Resource {
    /// Creates a new resource descriptor.
    #[must_use]
    pub fn new(id: ResourceId, kind: impl Into<String>, application: impl Into<String>) -> Self {
        Self {
            id,
            kind: kind.into(),
            application: application.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_carries_owning_application() {
        let id: ResourceId = "ec2:cluster:prod:fnord".parse().unwrap();
        let resource = Resource::new(id, "ec2/cluster@v1", "fnord");
        assert_eq!(resource.application, "fnord");
    }
}
