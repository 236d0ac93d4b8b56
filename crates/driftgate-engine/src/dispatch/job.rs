//! Per-region canary job construction.
//!
//! Each region's job carries two comparable workload descriptions derived
//! from the resolved source workload: a baseline (control) and a canary
//! (experiment) variant. The two differ only in their variant label; every
//! operational attribute is copied verbatim from the source so the
//! comparison is apples-to-apples except for the artifact under test, which
//! the downstream judge swaps into the experiment side.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::CanaryDefaults;

use super::{ArtifactRef, RemediationRequest, WorkloadDescription};

/// Deployment strategy applied to both canary variants.
const STRATEGY: &str = "redblack";

/// Fixed instance counts for a canary variant.
///
/// Canary variants never autoscale: min, max and desired are pinned to the
/// same value so capacity cannot drift during the verification window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capacity {
    /// Minimum instance count.
    pub min: u32,
    /// Maximum instance count.
    pub max: u32,
    /// Desired instance count.
    pub desired: u32,
}

impl Capacity {
    /// Pins min, max and desired to the same value.
    #[must_use]
    pub const fn fixed(count: u32) -> Self {
        Self {
            min: count,
            max: count,
            desired: count,
        }
    }
}

/// The two sides of a canary comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CanaryVariant {
    /// The control side, running the currently deployed artifact.
    Baseline,
    /// The experiment side, running the artifact under test.
    Canary,
}

impl CanaryVariant {
    /// The label appended to the variant's moniker detail.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Canary => "canary",
        }
    }
}

/// Server-group moniker parts (`app-stack-detail`).
#[derive(Debug, Clone, PartialEq, Eq)]
struct Moniker {
    app: String,
    stack: Option<String>,
    detail: Option<String>,
}

/// Parses a server-group name into moniker parts.
///
/// The detail part may itself contain dashes.
fn parse_moniker(name: &str) -> Moniker {
    let mut parts = name.splitn(3, '-');
    let app = parts.next().unwrap_or_default().to_string();
    let stack = parts.next().map(String::from);
    let detail = parts.next().map(String::from);
    Moniker { app, stack, detail }
}

/// One deployable workload variant of a canary comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantSpec {
    /// Application part of the moniker.
    pub application: String,
    /// Stack part of the moniker, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    /// Detail part of the moniker with the variant label appended.
    pub free_form_details: String,
    /// Target region.
    pub region: String,
    /// Target account.
    pub account: String,
    /// Cloud provider.
    pub cloud_provider: String,
    /// Image the variant boots from.
    pub image_name: String,
    /// Availability zones, keyed by region.
    pub availability_zones: BTreeMap<String, Vec<String>>,
    /// Pinned instance counts.
    pub capacity: Capacity,
    /// Whether instances are EBS-optimized.
    pub ebs_optimized: bool,
    /// Grace period before health checks count, in seconds.
    pub health_check_grace_period: u32,
    /// Health check type.
    pub health_check_type: String,
    /// IAM role instances run under.
    pub iam_role: String,
    /// Whether detailed instance monitoring is enabled.
    pub instance_monitoring: bool,
    /// Instance type.
    pub instance_type: String,
    /// SSH key pair name.
    pub key_pair: String,
    /// Attached load balancer names.
    pub load_balancers: Vec<String>,
    /// Attached target group names.
    pub target_groups: Vec<String>,
    /// Attached security group names.
    pub security_groups: Vec<String>,
    /// Deployment strategy.
    pub strategy: String,
    /// Subnet placement.
    pub subnet_type: String,
    /// Scaling processes to suspend.
    pub suspended_processes: Vec<String>,
    /// Always false: capacity comes from the request, never the source.
    pub use_source_capacity: bool,
}

/// The executable stage for one region's canary run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanaryStage {
    /// The region this stage runs in.
    pub region: String,
    /// Account the canary judge reads metrics from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_account: Option<String>,
    /// Account canary artifacts and reports are stored in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_account: Option<String>,
    /// The control variant.
    pub baseline: VariantSpec,
    /// The experiment variant.
    pub canary: VariantSpec,
}

/// Builds the canary stage for one region from the resolved source state.
#[must_use]
pub(super) fn build_stage(
    request: &RemediationRequest,
    defaults: &CanaryDefaults,
    source: &WorkloadDescription,
    image: &ArtifactRef,
) -> CanaryStage {
    let capacity = Capacity::fixed(request.capacity);
    CanaryStage {
        region: source.region.clone(),
        metrics_account: request
            .metrics_account
            .clone()
            .or_else(|| defaults.metrics_account.clone()),
        storage_account: request
            .storage_account
            .clone()
            .or_else(|| defaults.storage_account.clone()),
        baseline: variant_from_source(source, capacity, CanaryVariant::Baseline, &image.image_name),
        canary: variant_from_source(source, capacity, CanaryVariant::Canary, &image.image_name),
    }
}

/// Derives one variant from the source workload.
///
/// Copies every operational attribute; only the moniker detail (variant
/// label) differs between variants built from the same source.
fn variant_from_source(
    source: &WorkloadDescription,
    capacity: Capacity,
    variant: CanaryVariant,
    image_name: &str,
) -> VariantSpec {
    let moniker = parse_moniker(&source.name);
    let free_form_details = match &moniker.detail {
        Some(detail) => format!("{detail}-{}", variant.label()),
        None => variant.label().to_string(),
    };

    VariantSpec {
        application: moniker.app,
        stack: moniker.stack,
        free_form_details,
        region: source.region.clone(),
        account: source.account.clone(),
        cloud_provider: source.provider.clone(),
        image_name: image_name.to_string(),
        availability_zones: BTreeMap::from([(source.region.clone(), source.zones.clone())]),
        capacity,
        ebs_optimized: source.ebs_optimized,
        health_check_grace_period: source.health_check_grace_period_secs,
        health_check_type: source.health_check_type.clone(),
        iam_role: source.iam_role.clone(),
        instance_monitoring: source.detailed_monitoring,
        instance_type: source.instance_type.clone(),
        key_pair: source.key_pair.clone(),
        load_balancers: source.load_balancers.clone(),
        target_groups: source.target_groups.clone(),
        security_groups: source.security_groups.clone(),
        strategy: STRATEGY.to_string(),
        subnet_type: source.subnet.clone(),
        suspended_processes: source.suspended_processes.clone(),
        use_source_capacity: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_workload() -> WorkloadDescription {
        WorkloadDescription {
            name: "fnord-main-blue-v042".to_string(),
            account: "prod".to_string(),
            region: "us-west-2".to_string(),
            provider: "aws".to_string(),
            zones: vec!["us-west-2a".to_string(), "us-west-2b".to_string()],
            instance_type: "m5.large".to_string(),
            iam_role: "fnordInstanceProfile".to_string(),
            key_pair: "fnord-keypair".to_string(),
            health_check_type: "ELB".to_string(),
            health_check_grace_period_secs: 300,
            load_balancers: vec!["fnord-main-frontend".to_string()],
            target_groups: vec!["fnord-main-tg".to_string()],
            security_groups: vec!["fnord".to_string(), "nf-infrastructure".to_string()],
            subnet: "internal".to_string(),
            suspended_processes: vec!["AZRebalance".to_string()],
            ebs_optimized: true,
            detailed_monitoring: false,
        }
    }

    #[test]
    fn moniker_parses_app_stack_detail() {
        let moniker = parse_moniker("fnord-main-blue-v042");
        assert_eq!(moniker.app, "fnord");
        assert_eq!(moniker.stack.as_deref(), Some("main"));
        assert_eq!(moniker.detail.as_deref(), Some("blue-v042"));
    }

    #[test]
    fn moniker_parses_bare_app() {
        let moniker = parse_moniker("fnord");
        assert_eq!(moniker.app, "fnord");
        assert!(moniker.stack.is_none());
        assert!(moniker.detail.is_none());
    }

    #[test]
    fn variants_differ_only_in_detail_label() {
        let source = source_workload();
        let capacity = Capacity::fixed(1);
        let baseline =
            variant_from_source(&source, capacity, CanaryVariant::Baseline, "ami-0abc");
        let canary = variant_from_source(&source, capacity, CanaryVariant::Canary, "ami-0abc");

        assert_eq!(baseline.free_form_details, "blue-v042-baseline");
        assert_eq!(canary.free_form_details, "blue-v042-canary");

        // Everything else is identical.
        let mut relabelled = canary.clone();
        relabelled.free_form_details = baseline.free_form_details.clone();
        assert_eq!(baseline, relabelled);
    }

    #[test]
    fn variant_without_detail_uses_bare_label() {
        let mut source = source_workload();
        source.name = "fnord-main".to_string();
        let variant = variant_from_source(
            &source,
            Capacity::fixed(1),
            CanaryVariant::Baseline,
            "ami-0abc",
        );
        assert_eq!(variant.free_form_details, "baseline");
    }

    #[test]
    fn variant_copies_operational_attributes() {
        let source = source_workload();
        let variant = variant_from_source(
            &source,
            Capacity::fixed(3),
            CanaryVariant::Canary,
            "ami-0abc",
        );

        assert_eq!(variant.instance_type, source.instance_type);
        assert_eq!(variant.iam_role, source.iam_role);
        assert_eq!(variant.health_check_type, source.health_check_type);
        assert_eq!(
            variant.health_check_grace_period,
            source.health_check_grace_period_secs
        );
        assert_eq!(variant.load_balancers, source.load_balancers);
        assert_eq!(variant.security_groups, source.security_groups);
        assert_eq!(variant.subnet_type, source.subnet);
        assert_eq!(variant.suspended_processes, source.suspended_processes);
        assert_eq!(variant.availability_zones[&source.region], source.zones);
        assert_eq!(variant.capacity, Capacity::fixed(3));
        assert!(!variant.use_source_capacity);
    }

    #[test]
    fn capacity_is_pinned() {
        let capacity = Capacity::fixed(5);
        assert_eq!(capacity.min, 5);
        assert_eq!(capacity.max, 5);
        assert_eq!(capacity.desired, 5);
    }

    #[test]
    fn stage_serializes_camel_case() {
        let source = source_workload();
        let variant = variant_from_source(
            &source,
            Capacity::fixed(1),
            CanaryVariant::Baseline,
            "ami-0abc",
        );
        let json = serde_json::to_value(&variant).unwrap();
        assert!(json.get("freeFormDetails").is_some());
        assert!(json.get("healthCheckGracePeriod").is_some());
        assert!(json.get("useSourceCapacity").is_some());
    }
}
