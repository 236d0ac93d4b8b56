//! Region-parallel canary remediation dispatch.
//!
//! This module provides:
//!
//! - [`CanaryDispatcher`]: Fans one verification task out per region and
//!   aggregates the survivors
//! - [`RemediationRequest`]: Immutable description of one gated action
//! - Ports for the external inventory, artifact-lookup, and task-launch
//!   services
//!
//! ## Design Principles
//!
//! - **Fail fast on configuration problems**: Missing artifact coverage or
//!   source regions abort before any job is submitted
//! - **Isolate execution failures**: One region's submission failure never
//!   cancels or fails sibling regions; the region is logged, counted, and
//!   absent from the result
//! - **Account for everything started**: All in-flight submissions are
//!   awaited before the dispatcher returns

pub mod job;
pub mod memory;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::config::CanaryDefaults;
use crate::error::{Error, Result};
use crate::metrics::{EngineMetrics, TimingGuard};

pub use job::{CanaryStage, CanaryVariant, Capacity, VariantSpec};
pub use memory::{RecordingTaskLauncher, StaticArtifacts, StaticInventory};

/// The kind of deployable artifact a remediation request carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArtifactKind {
    /// A baked machine image (the only kind this dispatcher supports).
    MachineImage,
    /// A container image.
    Container,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MachineImage => write!(f, "machine-image"),
            Self::Container => write!(f, "container"),
        }
    }
}

/// The artifact under test, with the version already resolved by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactSpec {
    /// Artifact name (package or image family).
    pub name: String,
    /// The resolved version to verify.
    pub version: String,
    /// The artifact kind.
    pub kind: ArtifactKind,
    /// Base operating system the artifact is baked for.
    pub base_os: String,
}

/// A qualifying build/image for one region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRef {
    /// The region-local image name to deploy.
    pub image_name: String,
}

/// Where the current ("source") workload state is read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDescriptor {
    /// The account the source cluster lives in.
    pub account: String,
    /// The source cluster name (moniker form `app-stack-detail`).
    pub cluster: String,
    /// The cloud provider the cluster runs on.
    pub provider: String,
}

/// Immutable description of one gated remediation action.
///
/// Produced by the reconciliation loop, consumed once by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemediationRequest {
    /// The application being remediated.
    pub application: String,
    /// The target environment name.
    pub environment: String,
    /// Notification channels for the submitted tasks.
    pub notifications: Vec<String>,
    /// The service account tasks are submitted as.
    pub service_account: String,
    /// The regions to verify in.
    pub regions: BTreeSet<String>,
    /// Where to read current workload state from.
    pub source: SourceDescriptor,
    /// Instance count for both canary variants.
    pub capacity: u32,
    /// Identifier of the canary judge configuration.
    pub canary_config_id: String,
    /// The artifact under test.
    pub artifact: ArtifactSpec,
    /// Overrides the configured default metrics account when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_account: Option<String>,
    /// Overrides the configured default storage account when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_account: Option<String>,
}

impl RemediationRequest {
    /// The correlation id shared by every job of this logical run.
    ///
    /// Deterministic over application, environment and canary config, so
    /// duplicate submissions for the same run are identifiable downstream.
    #[must_use]
    pub fn correlation_root(&self) -> String {
        format!(
            "canary:{}:{}:{}",
            self.application, self.environment, self.canary_config_id
        )
    }
}

/// The current server-group description for one region.
///
/// Carries every operational attribute the canary variants must copy so the
/// baseline/experiment comparison is apples-to-apples except for the
/// artifact under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadDescription {
    /// Server-group name in moniker form (`app-stack-detail`).
    pub name: String,
    /// The account the workload runs in.
    pub account: String,
    /// The region the workload runs in.
    pub region: String,
    /// The cloud provider.
    pub provider: String,
    /// Availability zones the workload spans.
    pub zones: Vec<String>,
    /// Instance type.
    pub instance_type: String,
    /// IAM role instances run under.
    pub iam_role: String,
    /// SSH key pair name.
    pub key_pair: String,
    /// Health check type (e.g. `EC2`, `ELB`).
    pub health_check_type: String,
    /// Grace period before health checks count, in seconds.
    pub health_check_grace_period_secs: u32,
    /// Attached load balancer names.
    pub load_balancers: Vec<String>,
    /// Attached target group names.
    pub target_groups: Vec<String>,
    /// Attached security group names.
    pub security_groups: Vec<String>,
    /// Subnet placement.
    pub subnet: String,
    /// Scaling processes currently suspended.
    pub suspended_processes: Vec<String>,
    /// Whether instances are EBS-optimized.
    pub ebs_optimized: bool,
    /// Whether detailed instance monitoring is enabled.
    pub detailed_monitoring: bool,
}

/// Handle to a task accepted by the task-launch service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskHandle {
    /// Service-assigned task id.
    pub id: String,
    /// Human-readable task name.
    pub name: String,
}

/// One submission to the task-launch service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSubmission {
    /// The user/service account submitting the job.
    pub user: String,
    /// The application the job belongs to.
    pub application: String,
    /// Notification channels for job updates.
    pub notifications: Vec<String>,
    /// Short subject line.
    pub subject: String,
    /// Longer description.
    pub description: String,
    /// Correlation id for downstream duplicate detection.
    pub correlation_id: String,
    /// The stages to execute.
    pub stages: Vec<CanaryStage>,
}

/// Looks up the current active workload per region.
///
/// ## Thread Safety
///
/// All methods are `Send + Sync` to support concurrent lookups across
/// regions.
#[async_trait]
pub trait InventoryService: Send + Sync {
    /// Returns the active workload of `cluster` in `region`, or `None` if
    /// the cluster has no active workload there.
    ///
    /// # Errors
    ///
    /// Any error other than not-found is a fatal upstream failure.
    async fn lookup_active_workload(
        &self,
        account: &str,
        cluster: &str,
        region: &str,
        provider: &str,
    ) -> Result<Option<WorkloadDescription>>;
}

/// Resolves the latest qualifying artifact per region.
#[async_trait]
pub trait ArtifactLookup: Send + Sync {
    /// Returns the latest qualifying artifact for `version` in each of the
    /// requested regions. Regions with no qualifying artifact are absent
    /// from the result.
    async fn latest_artifacts(
        &self,
        version: &str,
        account: &str,
        regions: &BTreeSet<String>,
        base_os: &str,
    ) -> Result<BTreeMap<String, ArtifactRef>>;
}

/// Submits executable jobs to the downstream orchestration service.
///
/// Submission is fire-and-forget: once accepted, a job is not rolled back by
/// this system.
#[async_trait]
pub trait TaskLauncher: Send + Sync {
    /// Submits one job.
    ///
    /// # Errors
    ///
    /// May fail per call; the dispatcher isolates such failures per region.
    async fn submit_job(&self, submission: JobSubmission) -> Result<TaskHandle>;
}

/// Fans one canary verification task out per requested region.
///
/// ## Example
///
/// ```rust,ignore
/// use driftgate_engine::dispatch::CanaryDispatcher;
///
/// let dispatcher = CanaryDispatcher::new(inventory, artifacts, launcher, defaults);
/// let tasks = dispatcher.dispatch(&request).await?;
/// for (region, task) in &tasks {
///     println!("{region}: launched {}", task.id);
/// }
/// ```
pub struct CanaryDispatcher {
    inventory: Arc<dyn InventoryService>,
    artifacts: Arc<dyn ArtifactLookup>,
    launcher: Arc<dyn TaskLauncher>,
    defaults: CanaryDefaults,
    metrics: EngineMetrics,
}

impl CanaryDispatcher {
    /// Creates a dispatcher over its three collaborating services.
    #[must_use]
    pub fn new(
        inventory: Arc<dyn InventoryService>,
        artifacts: Arc<dyn ArtifactLookup>,
        launcher: Arc<dyn TaskLauncher>,
        defaults: CanaryDefaults,
    ) -> Self {
        Self {
            inventory,
            artifacts,
            launcher,
            defaults,
            metrics: EngineMetrics::new(),
        }
    }

    /// Dispatches one canary verification task per requested region.
    ///
    /// Returns the task handle for every region whose submission was
    /// accepted. Regions whose submission failed are absent from the map;
    /// callers detect them by diffing against the requested region set.
    ///
    /// # Errors
    ///
    /// Fails before submitting anything on an unsupported artifact kind,
    /// incomplete artifact coverage, a fatal inventory failure, or a region
    /// with no source workload. Per-region submission failures are absorbed
    /// into a smaller result map and never surface as an error.
    #[tracing::instrument(
        skip(self, request),
        fields(
            application = %request.application,
            environment = %request.environment,
            regions = request.regions.len()
        )
    )]
    pub async fn dispatch(
        &self,
        request: &RemediationRequest,
    ) -> Result<BTreeMap<String, TaskHandle>> {
        let metrics = self.metrics.clone();
        let _timer = TimingGuard::new(move |duration| {
            metrics.observe_dispatch_duration(duration);
        });

        let result = self.execute(request).await;
        match &result {
            Ok(tasks) => {
                tracing::info!(launched = tasks.len(), "canary dispatch completed");
                self.metrics.record_dispatch("completed");
            }
            Err(error) => {
                tracing::warn!(%error, "canary dispatch failed before submission");
                self.metrics.record_dispatch("failed");
            }
        }
        result
    }

    async fn execute(&self, request: &RemediationRequest) -> Result<BTreeMap<String, TaskHandle>> {
        if request.artifact.kind != ArtifactKind::MachineImage {
            return Err(Error::UnsupportedArtifact {
                kind: request.artifact.kind,
            });
        }

        let images = self.resolve_artifacts(request).await?;
        let sources = self.resolve_sources(request).await?;

        let missing_sources: Vec<String> = request
            .regions
            .iter()
            .filter(|region| !sources.contains_key(*region))
            .cloned()
            .collect();
        if !missing_sources.is_empty() {
            return Err(Error::MissingSourceRegion {
                cluster: request.source.cluster.clone(),
                missing: missing_sources,
            });
        }

        let jobs: BTreeMap<&String, CanaryStage> = request
            .regions
            .iter()
            .map(|region| {
                // Both maps are complete for every requested region by now.
                let stage = job::build_stage(
                    request,
                    &self.defaults,
                    &sources[region],
                    &images[region],
                );
                (region, stage)
            })
            .collect();

        Ok(self.submit_all(request, jobs).await)
    }

    /// Resolves the replacement artifact for every requested region, all or
    /// nothing.
    async fn resolve_artifacts(
        &self,
        request: &RemediationRequest,
    ) -> Result<BTreeMap<String, ArtifactRef>> {
        let account = self
            .defaults
            .image_account
            .as_deref()
            .unwrap_or(&request.source.account);
        let images = self
            .artifacts
            .latest_artifacts(
                &request.artifact.version,
                account,
                &request.regions,
                &request.artifact.base_os,
            )
            .await?;

        let missing: Vec<String> = request
            .regions
            .iter()
            .filter(|region| !images.contains_key(*region))
            .cloned()
            .collect();
        if missing.is_empty() {
            Ok(images)
        } else {
            Err(Error::ArtifactCoverage {
                version: request.artifact.version.clone(),
                missing,
            })
        }
    }

    /// Resolves the source workload per region, concurrently.
    ///
    /// A not-found region is excluded from the map; any other inventory
    /// failure is fatal. Every lookup completes before an error is
    /// surfaced.
    async fn resolve_sources(
        &self,
        request: &RemediationRequest,
    ) -> Result<BTreeMap<String, WorkloadDescription>> {
        let lookups = request.regions.iter().map(|region| async move {
            let workload = self
                .inventory
                .lookup_active_workload(
                    &request.source.account,
                    &request.source.cluster,
                    region,
                    &request.source.provider,
                )
                .await?;
            Ok::<_, Error>(workload.map(|w| (region.clone(), w)))
        });

        let mut sources = BTreeMap::new();
        for resolved in join_all(lookups).await {
            if let Some((region, workload)) = resolved? {
                sources.insert(region, workload);
            }
        }
        Ok(sources)
    }

    /// Submits every regional job concurrently, isolating failures.
    async fn submit_all(
        &self,
        request: &RemediationRequest,
        jobs: BTreeMap<&String, CanaryStage>,
    ) -> BTreeMap<String, TaskHandle> {
        let correlation_root = request.correlation_root();

        let submissions = jobs.into_iter().map(|(region, stage)| {
            let correlation_root = correlation_root.as_str();
            async move {
                let description = format!(
                    "Canary {} for {}/environment {} in {}",
                    request.artifact.version, request.application, request.environment, region
                );
                let submission = JobSubmission {
                    user: request.service_account.clone(),
                    application: request.application.clone(),
                    notifications: request.notifications.clone(),
                    subject: description.clone(),
                    description,
                    correlation_id: format!("{correlation_root}:{region}"),
                    stages: vec![stage],
                };

                match self.launcher.submit_job(submission).await {
                    Ok(task) => Some((region.clone(), task)),
                    Err(error) => {
                        tracing::error!(
                            %region,
                            %error,
                            "canary task submission failed; region excluded from result"
                        );
                        self.metrics.record_regional_submission_failure(region);
                        None
                    }
                }
            }
        });

        join_all(submissions).await.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_root_is_deterministic() {
        let request = RemediationRequest {
            application: "fnord".to_string(),
            environment: "testing".to_string(),
            notifications: vec![],
            service_account: "driftgate@example.com".to_string(),
            regions: BTreeSet::from(["us-east-1".to_string()]),
            source: SourceDescriptor {
                account: "test".to_string(),
                cluster: "fnord-main".to_string(),
                provider: "aws".to_string(),
            },
            capacity: 1,
            canary_config_id: "canary-config-1".to_string(),
            artifact: ArtifactSpec {
                name: "fnord".to_string(),
                version: "fnord-0.312.0".to_string(),
                kind: ArtifactKind::MachineImage,
                base_os: "bionic".to_string(),
            },
            metrics_account: None,
            storage_account: None,
        };
        assert_eq!(
            request.correlation_root(),
            "canary:fnord:testing:canary-config-1"
        );
        assert_eq!(request.correlation_root(), request.correlation_root());
    }

    #[test]
    fn artifact_kind_display() {
        assert_eq!(ArtifactKind::MachineImage.to_string(), "machine-image");
        assert_eq!(ArtifactKind::Container.to_string(), "container");
    }
}
