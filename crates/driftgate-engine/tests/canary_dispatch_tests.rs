//! End-to-end tests for region-parallel canary dispatch.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::BTreeSet;
use std::sync::Arc;

use driftgate_engine::config::CanaryDefaults;
use driftgate_engine::dispatch::{
    ArtifactKind, ArtifactSpec, CanaryDispatcher, RecordingTaskLauncher, RemediationRequest,
    SourceDescriptor, StaticArtifacts, StaticInventory, WorkloadDescription,
};
use driftgate_engine::error::{Error, Result};

const REGIONS: [&str; 3] = ["ap-south-1", "eu-west-1", "us-east-1"];

fn workload(region: &str) -> WorkloadDescription {
    WorkloadDescription {
        name: "fnord-main-blue".to_string(),
        account: "prod".to_string(),
        region: region.to_string(),
        provider: "aws".to_string(),
        zones: vec![format!("{region}a"), format!("{region}b")],
        instance_type: "m5.large".to_string(),
        iam_role: "fnordInstanceProfile".to_string(),
        key_pair: "fnord-keypair".to_string(),
        health_check_type: "ELB".to_string(),
        health_check_grace_period_secs: 300,
        load_balancers: vec!["fnord-main-frontend".to_string()],
        target_groups: vec![],
        security_groups: vec!["fnord".to_string(), "nf-infrastructure".to_string()],
        subnet: "internal".to_string(),
        suspended_processes: vec!["AZRebalance".to_string()],
        ebs_optimized: true,
        detailed_monitoring: false,
    }
}

fn request(regions: &[&str]) -> RemediationRequest {
    RemediationRequest {
        application: "fnord".to_string(),
        environment: "testing".to_string(),
        notifications: vec!["#fnord-alerts".to_string()],
        service_account: "driftgate@example.com".to_string(),
        regions: regions.iter().map(ToString::to_string).collect(),
        source: SourceDescriptor {
            account: "prod".to_string(),
            cluster: "fnord-main-blue".to_string(),
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
    }
}

fn full_inventory() -> StaticInventory {
    REGIONS
        .iter()
        .fold(StaticInventory::new(), |inventory, region| {
            inventory.with_workload(workload(region))
        })
}

fn full_artifacts() -> StaticArtifacts {
    REGIONS
        .iter()
        .fold(StaticArtifacts::new(), |artifacts, region| {
            artifacts.with_image(*region, format!("fnord-0.312.0-{region}"))
        })
}

fn dispatcher(
    inventory: StaticInventory,
    artifacts: StaticArtifacts,
    launcher: Arc<RecordingTaskLauncher>,
) -> CanaryDispatcher {
    CanaryDispatcher::new(
        Arc::new(inventory),
        Arc::new(artifacts),
        launcher,
        CanaryDefaults::new()
            .with_metrics_account("atlas")
            .with_storage_account("canary-reports"),
    )
}

#[tokio::test]
async fn dispatch_launches_one_task_per_region() -> Result<()> {
    let launcher = Arc::new(RecordingTaskLauncher::new());
    let subject = dispatcher(full_inventory(), full_artifacts(), Arc::clone(&launcher));

    let tasks = subject.dispatch(&request(&REGIONS)).await?;

    assert_eq!(tasks.len(), REGIONS.len());
    for region in REGIONS {
        assert!(tasks.contains_key(region), "missing task for {region}");
    }
    assert_eq!(launcher.call_count()?, REGIONS.len());
    Ok(())
}

#[tokio::test]
async fn one_failing_region_does_not_fail_its_siblings() -> Result<()> {
    let launcher = Arc::new(RecordingTaskLauncher::new().with_failing_region("eu-west-1"));
    let subject = dispatcher(full_inventory(), full_artifacts(), Arc::clone(&launcher));

    let tasks = subject.dispatch(&request(&REGIONS)).await?;

    assert_eq!(tasks.len(), REGIONS.len() - 1);
    assert!(!tasks.contains_key("eu-west-1"));
    assert!(tasks.contains_key("ap-south-1"));
    assert!(tasks.contains_key("us-east-1"));

    // The failing region was still attempted; the caller can find it by
    // diffing the result against the requested set.
    assert_eq!(launcher.call_count()?, REGIONS.len());
    Ok(())
}

#[tokio::test]
async fn missing_artifact_coverage_fails_fast() -> Result<()> {
    let launcher = Arc::new(RecordingTaskLauncher::new());
    let artifacts = StaticArtifacts::new()
        .with_image("ap-south-1", "fnord-0.312.0-ap-south-1")
        .with_image("us-east-1", "fnord-0.312.0-us-east-1");
    let subject = dispatcher(full_inventory(), artifacts, Arc::clone(&launcher));

    let result = subject.dispatch(&request(&REGIONS)).await;

    let Err(Error::ArtifactCoverage { version, missing }) = result else {
        panic!("expected ArtifactCoverage error");
    };
    assert_eq!(version, "fnord-0.312.0");
    assert_eq!(missing, vec!["eu-west-1".to_string()]);
    assert_eq!(launcher.call_count()?, 0);
    Ok(())
}

#[tokio::test]
async fn missing_source_region_fails_fast() -> Result<()> {
    let launcher = Arc::new(RecordingTaskLauncher::new());
    let inventory = StaticInventory::new()
        .with_workload(workload("ap-south-1"))
        .with_workload(workload("us-east-1"));
    let subject = dispatcher(inventory, full_artifacts(), Arc::clone(&launcher));

    let result = subject.dispatch(&request(&REGIONS)).await;

    let Err(Error::MissingSourceRegion { cluster, missing }) = result else {
        panic!("expected MissingSourceRegion error");
    };
    assert_eq!(cluster, "fnord-main-blue");
    assert_eq!(missing, vec!["eu-west-1".to_string()]);
    assert_eq!(launcher.call_count()?, 0);
    Ok(())
}

#[tokio::test]
async fn fatal_inventory_failure_aborts_the_dispatch() -> Result<()> {
    let launcher = Arc::new(RecordingTaskLauncher::new());
    let inventory = full_inventory().with_failing_region("us-east-1");
    let subject = dispatcher(inventory, full_artifacts(), Arc::clone(&launcher));

    let result = subject.dispatch(&request(&REGIONS)).await;

    assert!(matches!(result, Err(Error::Upstream { .. })));
    assert_eq!(launcher.call_count()?, 0);
    Ok(())
}

#[tokio::test]
async fn unsupported_artifact_kind_is_rejected_before_any_call() -> Result<()> {
    let launcher = Arc::new(RecordingTaskLauncher::new());
    let subject = dispatcher(full_inventory(), full_artifacts(), Arc::clone(&launcher));

    let mut container_request = request(&REGIONS);
    container_request.artifact.kind = ArtifactKind::Container;

    let result = subject.dispatch(&container_request).await;

    assert!(matches!(result, Err(Error::UnsupportedArtifact { .. })));
    assert_eq!(launcher.call_count()?, 0);
    Ok(())
}

#[tokio::test]
async fn submissions_carry_deterministic_correlation_ids() -> Result<()> {
    let launcher = Arc::new(RecordingTaskLauncher::new());
    let subject = dispatcher(full_inventory(), full_artifacts(), Arc::clone(&launcher));

    subject.dispatch(&request(&["us-east-1"])).await?;
    subject.dispatch(&request(&["us-east-1"])).await?;

    let attempts = launcher.attempts()?;
    assert_eq!(attempts.len(), 2);
    assert_eq!(
        attempts[0].correlation_id,
        "canary:fnord:testing:canary-config-1:us-east-1"
    );
    assert_eq!(attempts[0].correlation_id, attempts[1].correlation_id);
    Ok(())
}

#[tokio::test]
async fn submitted_stages_copy_the_source_workload() -> Result<()> {
    let launcher = Arc::new(RecordingTaskLauncher::new());
    let subject = dispatcher(full_inventory(), full_artifacts(), Arc::clone(&launcher));

    subject.dispatch(&request(&["eu-west-1"])).await?;

    let attempts = launcher.attempts()?;
    assert_eq!(attempts.len(), 1);
    let submission = &attempts[0];
    assert_eq!(submission.user, "driftgate@example.com");
    assert_eq!(submission.application, "fnord");
    assert_eq!(submission.notifications, vec!["#fnord-alerts".to_string()]);
    assert_eq!(submission.stages.len(), 1);

    let stage = &submission.stages[0];
    assert_eq!(stage.region, "eu-west-1");
    assert_eq!(stage.metrics_account.as_deref(), Some("atlas"));
    assert_eq!(stage.storage_account.as_deref(), Some("canary-reports"));

    let source = workload("eu-west-1");
    for variant in [&stage.baseline, &stage.canary] {
        assert_eq!(variant.application, "fnord");
        assert_eq!(variant.stack.as_deref(), Some("main"));
        assert_eq!(variant.instance_type, source.instance_type);
        assert_eq!(variant.iam_role, source.iam_role);
        assert_eq!(variant.health_check_type, source.health_check_type);
        assert_eq!(variant.load_balancers, source.load_balancers);
        assert_eq!(variant.security_groups, source.security_groups);
        assert_eq!(variant.subnet_type, source.subnet);
        assert_eq!(variant.suspended_processes, source.suspended_processes);
        assert_eq!(variant.image_name, "fnord-0.312.0-eu-west-1");
        assert_eq!(variant.capacity.desired, 1);
        assert!(!variant.use_source_capacity);
    }
    assert_eq!(stage.baseline.free_form_details, "blue-baseline");
    assert_eq!(stage.canary.free_form_details, "blue-canary");
    Ok(())
}

#[tokio::test]
async fn request_accounts_override_the_defaults() -> Result<()> {
    let launcher = Arc::new(RecordingTaskLauncher::new());
    let subject = dispatcher(full_inventory(), full_artifacts(), Arc::clone(&launcher));

    let mut overridden = request(&["us-east-1"]);
    overridden.metrics_account = Some("custom-atlas".to_string());
    overridden.storage_account = Some("custom-reports".to_string());

    subject.dispatch(&overridden).await?;

    let attempts = launcher.attempts()?;
    let stage = &attempts[0].stages[0];
    assert_eq!(stage.metrics_account.as_deref(), Some("custom-atlas"));
    assert_eq!(stage.storage_account.as_deref(), Some("custom-reports"));
    Ok(())
}

#[tokio::test]
async fn extra_source_regions_are_ignored() -> Result<()> {
    // The inventory knows more regions than the request asks for.
    let launcher = Arc::new(RecordingTaskLauncher::new());
    let subject = dispatcher(full_inventory(), full_artifacts(), Arc::clone(&launcher));

    let tasks = subject.dispatch(&request(&["us-east-1"])).await?;

    assert_eq!(tasks.len(), 1);
    assert_eq!(launcher.call_count()?, 1);
    Ok(())
}

#[tokio::test]
async fn all_regions_failing_yields_an_empty_result_without_error() -> Result<()> {
    let launcher = Arc::new(
        REGIONS
            .iter()
            .fold(RecordingTaskLauncher::new(), |launcher, region| {
                launcher.with_failing_region(*region)
            }),
    );
    let subject = dispatcher(full_inventory(), full_artifacts(), Arc::clone(&launcher));

    let tasks = subject.dispatch(&request(&REGIONS)).await?;

    assert!(tasks.is_empty());
    assert_eq!(launcher.call_count()?, REGIONS.len());
    Ok(())
}

#[tokio::test]
async fn task_subjects_describe_the_run() -> Result<()> {
    let launcher = Arc::new(RecordingTaskLauncher::new());
    let subject = dispatcher(full_inventory(), full_artifacts(), Arc::clone(&launcher));

    let tasks = subject.dispatch(&request(&["us-east-1"])).await?;

    let attempts = launcher.attempts()?;
    assert_eq!(
        attempts[0].subject,
        "Canary fnord-0.312.0 for fnord/environment testing in us-east-1"
    );
    assert_eq!(tasks["us-east-1"].name, attempts[0].subject);

    let request_regions: BTreeSet<String> = ["us-east-1".to_string()].into();
    let launched: BTreeSet<String> = tasks.keys().cloned().collect();
    assert_eq!(request_regions, launched);
    Ok(())
}
