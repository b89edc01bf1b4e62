//! OIDC federation: trust conditions and the identity provider

use crate::descriptor::Descriptor;
use crate::error::{AwsError, Result};
use crate::iam::{ConditionOperator, PolicyDocument, PolicyStatement, Principal, TrustCondition};
use opsflow_cloud::{OutputValue, ResourceConfig};
use serde_json::json;

pub const ASSUME_ROLE_WITH_WEB_IDENTITY: &str = "sts:AssumeRoleWithWebIdentity";

/// Build the claim conditions for roles assumed through the OIDC issuer
///
/// The audience clause is always present. With `restrict_to_project` the
/// subject must also match `org/{org}/project/{project}/user/*`; in that
/// case a missing project id is an error, never an unscoped trust.
pub fn build_trust(
    issuer: &str,
    org_id: &str,
    project_id: Option<&str>,
    restrict_to_project: bool,
) -> Result<TrustCondition> {
    let claim_prefix = format!("{}/org/{}", issuer, org_id);

    let mut condition = TrustCondition::new();
    condition.insert(
        ConditionOperator::StringEquals,
        format!("{}:aud", claim_prefix),
        org_id,
    );

    if restrict_to_project {
        let project_id = project_id
            .filter(|p| !p.is_empty())
            .ok_or_else(|| AwsError::MissingRequiredSetting("oidc_project_id".to_string()))?;
        condition.insert(
            ConditionOperator::StringLike,
            format!("{}:sub", claim_prefix),
            format!("org/{}/project/{}/user/*", org_id, project_id),
        );
    } else {
        tracing::warn!(
            "Trust for org {} is not restricted to a project; any project in the org can assume the roles",
            org_id
        );
    }

    Ok(condition)
}

/// ARN of the identity provider registered for an org
pub fn provider_arn(account: &str, issuer: &str, org_id: &str) -> String {
    format!(
        "arn:aws:iam::{}:oidc-provider/{}/org/{}",
        account, issuer, org_id
    )
}

/// Identity provider provisioned alongside the roles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OidcProviderDescriptor {
    pub logical_id: String,
    pub url: String,
    pub client_ids: Vec<String>,
    pub thumbprints: Vec<String>,
}

impl OidcProviderDescriptor {
    /// CircleCI-style issuer: one provider per org, the org id as audience
    pub fn for_org(issuer: &str, org_id: &str) -> Self {
        Self {
            logical_id: "CircleCIOidcProvider".to_string(),
            url: format!("https://{}/org/{}", issuer, org_id),
            client_ids: vec![org_id.to_string()],
            thumbprints: Vec::new(),
        }
    }
}

impl Descriptor for OidcProviderDescriptor {
    fn logical_id(&self) -> &str {
        &self.logical_id
    }

    fn to_resources(&self) -> Vec<ResourceConfig> {
        let mut properties = json!({
            "Url": self.url,
            "ClientIdList": self.client_ids,
        });
        if !self.thumbprints.is_empty() {
            properties["ThumbprintList"] = json!(self.thumbprints);
        }
        vec![ResourceConfig::new(
            "AWS::IAM::OIDCProvider",
            &self.logical_id,
            properties,
        )]
    }
}

/// Trust statement backed by an OIDC identity provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedTrust {
    /// The provider ARN, or a reference when the provider is provisioned here
    pub provider: OutputValue,
    pub condition: TrustCondition,
}

impl FederatedTrust {
    /// Trust a provider that already exists in the account
    pub fn existing(arn: impl Into<String>, condition: TrustCondition) -> Self {
        Self {
            provider: OutputValue::Literal(arn.into()),
            condition,
        }
    }

    /// Trust a provider declared in the same stack
    pub fn provisioned(provider: &OidcProviderDescriptor, condition: TrustCondition) -> Self {
        Self {
            provider: OutputValue::reference(&provider.logical_id),
            condition,
        }
    }

    /// Logical id the roles must wait for, if the provider is provisioned here
    pub fn provider_dependency(&self) -> Option<&str> {
        self.provider.referenced_id()
    }

    pub fn assume_role_policy(&self) -> PolicyDocument {
        PolicyDocument::new(vec![
            PolicyStatement::trust(
                Principal::Federated(self.provider.clone()),
                ASSUME_ROLE_WITH_WEB_IDENTITY,
            )
            .with_condition(self.condition.clone()),
        ])
    }
}
