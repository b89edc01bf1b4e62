//! The two opsflow stacks

use crate::descriptor::Descriptor;
use crate::error::Result;
use crate::network::build_network;
use crate::role::{build_roles, shared_compute_role};
use crate::storage::{BucketDescriptor, FlowLogDescriptor};
use crate::trust::{FederatedTrust, OidcProviderDescriptor, build_trust, provider_arn};
use opsflow_cloud::{Output, OutputValue, StackManifest};
use opsflow_config::{BaseSettings, CiRoleSettings, OidcProviderMode};

pub const BASE_STACK: &str = "OpsBaseStack";
pub const CI_ROLES_STACK: &str = "CircleCIRolesStack";

/// Network, buckets and the shared compute role for one environment
pub fn base_stack(settings: &BaseSettings) -> Result<StackManifest> {
    let env_name = settings.env_name.as_str();
    let mut stack = StackManifest::new(BASE_STACK, &settings.account, &settings.region);
    stack.add_tag("Environment", env_name);
    stack.add_tag("Owner", "BaseStack");

    let network = build_network(
        &format!("{}-main-vpc", env_name),
        &settings.region,
        settings.max_azs,
        settings.nat_gateways,
    )?;
    let main_bucket = BucketDescriptor::ephemeral("MainBucket", &settings.main_bucket_name, true)
        .with_tag("Type", "primary");
    let log_bucket = BucketDescriptor::ephemeral("LogBucket", &settings.log_bucket_name, false)
        .with_tag("Type", "logs");
    let flow_log = FlowLogDescriptor::to_bucket(network.logical_id(), &log_bucket);
    let shared_role = shared_compute_role(env_name);

    for mut resource in network.to_resources() {
        if resource.resource_type == "AWS::EC2::VPC" {
            resource = resource.with_tag("Purpose", "shared-network");
        }
        stack.add_resource(resource)?;
    }
    flow_log.declare(&mut stack)?;
    main_bucket.declare(&mut stack)?;
    log_bucket.declare(&mut stack)?;
    shared_role.declare(&mut stack)?;

    stack.add_output(Output::new(
        "VpcId",
        OutputValue::reference(network.logical_id()),
    ))?;
    stack.add_output(Output::new(
        "MainBucketName",
        OutputValue::reference(main_bucket.logical_id()),
    ))?;
    stack.add_output(Output::new(
        "LogBucketName",
        OutputValue::reference(log_bucket.logical_id()),
    ))?;
    stack.add_output(Output::new(
        "SharedRoleArn",
        OutputValue::attribute(shared_role.logical_id(), "Arn"),
    ))?;
    stack.add_output(
        Output::new(
            "DefaultInstanceType",
            OutputValue::Literal(settings.instance_type.clone()),
        )
        .with_description("Instance type for compute stacks deployed into this network"),
    )?;

    tracing::info!(
        "Built {} for {} ({} resources)",
        BASE_STACK,
        env_name,
        stack.resources.len()
    );
    Ok(stack)
}

/// OIDC trust plus the CI infra and app roles
pub fn ci_roles_stack(settings: &CiRoleSettings) -> Result<StackManifest> {
    // Fails before anything is declared when project scoping cannot be honored.
    let condition = build_trust(
        &settings.issuer,
        &settings.org_id,
        settings.project_id.as_deref(),
        settings.restrict_to_project,
    )?;

    let mut stack = StackManifest::new(CI_ROLES_STACK, &settings.account, &settings.region);
    stack.add_tag("Owner", CI_ROLES_STACK);

    let trust = match settings.provider_mode {
        OidcProviderMode::Existing => {
            let arn = provider_arn(&settings.account, &settings.issuer, &settings.org_id);
            tracing::debug!("Trusting existing identity provider {}", arn);
            FederatedTrust::existing(arn, condition)
        }
        OidcProviderMode::Create => {
            let provider = OidcProviderDescriptor::for_org(&settings.issuer, &settings.org_id);
            provider.declare(&mut stack)?;
            FederatedTrust::provisioned(&provider, condition)
        }
    };

    let (infra_role, app_role) = build_roles(&trust, &settings.app_managed_policies);
    infra_role.declare(&mut stack)?;
    app_role.declare(&mut stack)?;

    stack.add_output(Output::new(
        "InfraRoleArn",
        OutputValue::attribute(infra_role.logical_id(), "Arn"),
    ))?;
    stack.add_output(Output::new(
        "AppRoleArn",
        OutputValue::attribute(app_role.logical_id(), "Arn"),
    ))?;
    stack.add_output(Output::new("OidcProviderArn", trust.provider.clone()))?;

    tracing::info!(
        "Built {} for org {} ({} resources)",
        CI_ROLES_STACK,
        settings.org_id,
        stack.resources.len()
    );
    Ok(stack)
}
