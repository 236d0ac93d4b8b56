//! Configuration for the canary dispatcher.

use serde::{Deserialize, Serialize};

/// Fallback accounts used when a remediation request carries no override.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CanaryDefaults {
    /// Account the canary judge reads metrics from.
    pub metrics_account: Option<String>,
    /// Account canary artifacts and reports are stored in.
    pub storage_account: Option<String>,
    /// Account images are resolved from; falls back to the request's source
    /// account when unset.
    pub image_account: Option<String>,
}

impl CanaryDefaults {
    /// Creates empty defaults (requests must carry their own accounts).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default metrics account.
    #[must_use]
    pub fn with_metrics_account(mut self, account: impl Into<String>) -> Self {
        self.metrics_account = Some(account.into());
        self
    }

    /// Sets the default storage account.
    #[must_use]
    pub fn with_storage_account(mut self, account: impl Into<String>) -> Self {
        self.storage_account = Some(account.into());
        self
    }

    /// Sets the default image resolution account.
    #[must_use]
    pub fn with_image_account(mut self, account: impl Into<String>) -> Self {
        self.image_account = Some(account.into());
        self
    }
}
