//! IAM role descriptors

use crate::descriptor::Descriptor;
use crate::iam::{PolicyDocument, PolicyStatement, Principal, managed_policy_arn};
use crate::trust::FederatedTrust;
use opsflow_cloud::ResourceConfig;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;

/// Session cap for every CI role
pub const MAX_SESSION_DURATION: Duration = Duration::from_secs(3600);

const INFRA_MANAGED_POLICIES: [&str; 6] = [
    "AdministratorAccess",
    "AmazonS3FullAccess",
    "AWSLambda_FullAccess",
    "AmazonEC2FullAccess",
    "AmazonEventBridgeFullAccess",
    "AmazonDynamoDBFullAccess",
];

const APP_DEPLOYMENT_ACTIONS: [&str; 10] = [
    "lambda:UpdateFunctionCode",
    "lambda:UpdateFunctionConfiguration",
    "s3:PutObject",
    "s3:GetObject",
    "ecs:UpdateService",
    "cloudfront:CreateInvalidation",
    "ssm:GetParameter",
    "ssm:GetParametersByPath",
    "logs:CreateLogStream",
    "logs:PutLogEvents",
];

const SHARED_COMPUTE_SERVICES: [&str; 4] = [
    "ec2.amazonaws.com",
    "batch.amazonaws.com",
    "lambda.amazonaws.com",
    "apigateway.amazonaws.com",
];

const SHARED_COMPUTE_MANAGED_POLICIES: [&str; 5] = [
    "AmazonS3FullAccess",
    "AmazonEC2FullAccess",
    "AmazonAPIGatewayAdministrator",
    "AmazonDynamoDBFullAccess",
    "AWSLambda_FullAccess",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleKind {
    /// Provisions stacks; broad managed policies
    Infra,
    /// Deploys application code; narrow inline actions
    App,
    /// Assumed by AWS compute services
    SharedCompute,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDescriptor {
    pub kind: RoleKind,
    pub logical_id: String,
    pub role_name: String,
    pub description: Option<String>,
    pub assume_role_policy: PolicyDocument,
    /// AWS managed policy names
    pub managed_policies: Vec<String>,
    /// Inline policies by name
    pub inline_policies: BTreeMap<String, PolicyDocument>,
    pub max_session_duration: Option<Duration>,
    pub depends_on: Vec<String>,
}

impl RoleDescriptor {
    pub fn managed_policy_arns(&self) -> Vec<String> {
        self.managed_policies
            .iter()
            .map(|name| managed_policy_arn(name))
            .collect()
    }
}

impl Descriptor for RoleDescriptor {
    fn logical_id(&self) -> &str {
        &self.logical_id
    }

    fn to_resources(&self) -> Vec<ResourceConfig> {
        let mut properties = json!({
            "RoleName": self.role_name,
            "AssumeRolePolicyDocument": self.assume_role_policy,
        });
        if let Some(description) = &self.description {
            properties["Description"] = json!(description);
        }
        if !self.managed_policies.is_empty() {
            properties["ManagedPolicyArns"] = json!(self.managed_policy_arns());
        }
        if !self.inline_policies.is_empty() {
            let policies: Vec<_> = self
                .inline_policies
                .iter()
                .map(|(name, document)| json!({ "PolicyName": name, "PolicyDocument": document }))
                .collect();
            properties["Policies"] = json!(policies);
        }
        if let Some(duration) = self.max_session_duration {
            properties["MaxSessionDuration"] = json!(duration.as_secs());
        }

        let mut resource = ResourceConfig::new("AWS::IAM::Role", &self.logical_id, properties);
        for dependency in &self.depends_on {
            resource = resource.depends_on(dependency);
        }
        vec![resource]
    }
}

/// Build the CI infra and app roles over a shared trust
///
/// `app_managed_policies` adds AWS managed policies for auxiliary services
/// to the app role on top of its inline deployment actions.
pub fn build_roles(
    trust: &FederatedTrust,
    app_managed_policies: &[String],
) -> (RoleDescriptor, RoleDescriptor) {
    let assume_role_policy = trust.assume_role_policy();
    let depends_on: Vec<String> = trust
        .provider_dependency()
        .map(str::to_string)
        .into_iter()
        .collect();

    let infra = RoleDescriptor {
        kind: RoleKind::Infra,
        logical_id: "CircleCIInfraRole".to_string(),
        role_name: "CircleCIInfraRole".to_string(),
        description: Some(
            "CircleCI Infra role for provisioning stacks and AWS resources".to_string(),
        ),
        assume_role_policy: assume_role_policy.clone(),
        managed_policies: INFRA_MANAGED_POLICIES.iter().map(|p| p.to_string()).collect(),
        inline_policies: BTreeMap::new(),
        max_session_duration: Some(MAX_SESSION_DURATION),
        depends_on: depends_on.clone(),
    };

    let mut inline_policies = BTreeMap::new();
    inline_policies.insert(
        "AppDeploymentPolicy".to_string(),
        PolicyDocument::new(vec![PolicyStatement::allow(APP_DEPLOYMENT_ACTIONS, &["*"])]),
    );

    let app = RoleDescriptor {
        kind: RoleKind::App,
        logical_id: "CircleCIAppRole".to_string(),
        role_name: "CircleCIAppRole".to_string(),
        description: Some("CircleCI App deployment role with scoped permissions".to_string()),
        assume_role_policy,
        managed_policies: app_managed_policies.to_vec(),
        inline_policies,
        max_session_duration: Some(MAX_SESSION_DURATION),
        depends_on,
    };

    tracing::debug!(
        "Built roles {} ({} managed policies) and {} ({} actions)",
        infra.role_name,
        infra.managed_policies.len(),
        app.role_name,
        APP_DEPLOYMENT_ACTIONS.len()
    );
    (infra, app)
}

/// Role shared by EC2, Batch, Lambda and API Gateway workloads
pub fn shared_compute_role(env_name: &str) -> RoleDescriptor {
    let principal = Principal::Service(
        SHARED_COMPUTE_SERVICES
            .iter()
            .map(|s| s.to_string())
            .collect(),
    );

    RoleDescriptor {
        kind: RoleKind::SharedCompute,
        logical_id: "SharedComputeRole".to_string(),
        role_name: format!("{}-shared-compute-role", env_name),
        description: None,
        assume_role_policy: PolicyDocument::new(vec![PolicyStatement::trust(
            principal,
            "sts:AssumeRole",
        )]),
        managed_policies: SHARED_COMPUTE_MANAGED_POLICIES
            .iter()
            .map(|p| p.to_string())
            .collect(),
        inline_policies: BTreeMap::new(),
        max_session_duration: None,
        depends_on: Vec::new(),
    }
}
