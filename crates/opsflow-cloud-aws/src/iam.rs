//! IAM policy documents

use opsflow_cloud::OutputValue;
use serde::Serialize;
use std::collections::BTreeMap;

const POLICY_VERSION: &str = "2012-10-17";

/// ARN of an AWS managed policy
pub fn managed_policy_arn(name: &str) -> String {
    format!("arn:aws:iam::aws:policy/{}", name)
}

/// Condition operators used in trust policies
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ConditionOperator {
    StringEquals,
    StringLike,
}

/// Expected value of a claim: one string or any of several
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ClaimValue {
    One(String),
    Any(Vec<String>),
}

impl From<&str> for ClaimValue {
    fn from(value: &str) -> Self {
        ClaimValue::One(value.to_string())
    }
}

impl From<String> for ClaimValue {
    fn from(value: String) -> Self {
        ClaimValue::One(value)
    }
}

/// Operator -> claim key -> expected value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TrustCondition {
    clauses: BTreeMap<ConditionOperator, BTreeMap<String, ClaimValue>>,
}

impl TrustCondition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        operator: ConditionOperator,
        claim: impl Into<String>,
        value: impl Into<ClaimValue>,
    ) {
        self.clauses
            .entry(operator)
            .or_default()
            .insert(claim.into(), value.into());
    }

    pub fn get(&self, operator: ConditionOperator) -> Option<&BTreeMap<String, ClaimValue>> {
        self.clauses.get(&operator)
    }

    pub fn operators(&self) -> impl Iterator<Item = ConditionOperator> + '_ {
        self.clauses.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// Who a trust statement applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Principal {
    /// A federated identity provider, by ARN or by reference
    Federated(OutputValue),
    /// AWS service principals (e.g., "lambda.amazonaws.com")
    Service(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    pub effect: Effect,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    pub action: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<TrustCondition>,
}

impl PolicyStatement {
    /// Allow `actions` on `resources`
    pub fn allow<I, S>(actions: I, resources: &[&str]) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            effect: Effect::Allow,
            principal: None,
            action: actions.into_iter().map(Into::into).collect(),
            resource: Some(resources.iter().map(|r| r.to_string()).collect()),
            condition: None,
        }
    }

    /// Allow `principal` to perform `action` (for assume-role policies)
    pub fn trust(principal: Principal, action: &str) -> Self {
        Self {
            effect: Effect::Allow,
            principal: Some(principal),
            action: vec![action.to_string()],
            resource: None,
            condition: None,
        }
    }

    pub fn with_condition(mut self, condition: TrustCondition) -> Self {
        if !condition.is_empty() {
            self.condition = Some(condition);
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: &'static str,
    pub statement: Vec<PolicyStatement>,
}

impl PolicyDocument {
    pub fn new(statement: Vec<PolicyStatement>) -> Self {
        Self {
            version: POLICY_VERSION,
            statement,
        }
    }

    /// Every action allowed by the document
    pub fn actions(&self) -> impl Iterator<Item = &str> {
        self.statement
            .iter()
            .flat_map(|s| s.action.iter().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_managed_policy_arn() {
        assert_eq!(
            managed_policy_arn("AmazonS3FullAccess"),
            "arn:aws:iam::aws:policy/AmazonS3FullAccess"
        );
    }

    #[test]
    fn test_condition_serialization() {
        let mut condition = TrustCondition::new();
        condition.insert(ConditionOperator::StringLike, "x:sub", "org/1/*");
        condition.insert(
            ConditionOperator::StringEquals,
            "x:aud",
            ClaimValue::Any(vec!["a".to_string(), "b".to_string()]),
        );

        assert_eq!(
            serde_json::to_value(&condition).unwrap(),
            json!({
                "StringEquals": { "x:aud": ["a", "b"] },
                "StringLike": { "x:sub": "org/1/*" },
            })
        );
    }

    #[test]
    fn test_trust_statement_serialization() {
        let statement = PolicyStatement::trust(
            Principal::Federated(OutputValue::reference("Provider")),
            "sts:AssumeRoleWithWebIdentity",
        );
        let document = PolicyDocument::new(vec![statement]);

        assert_eq!(
            serde_json::to_value(&document).unwrap(),
            json!({
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Allow",
                    "Principal": { "Federated": { "Ref": "Provider" } },
                    "Action": ["sts:AssumeRoleWithWebIdentity"],
                }],
            })
        );
    }

    #[test]
    fn test_empty_condition_is_dropped() {
        let statement = PolicyStatement::trust(
            Principal::Service(vec!["ec2.amazonaws.com".to_string()]),
            "sts:AssumeRole",
        )
        .with_condition(TrustCondition::new());
        assert!(statement.condition.is_none());
    }

    #[test]
    fn test_allow_statement() {
        let document = PolicyDocument::new(vec![PolicyStatement::allow(
            ["s3:GetObject", "s3:PutObject"],
            &["*"],
        )]);
        assert_eq!(
            document.actions().collect::<Vec<_>>(),
            vec!["s3:GetObject", "s3:PutObject"]
        );
        assert_eq!(
            serde_json::to_value(&document).unwrap()["Statement"][0]["Resource"],
            json!(["*"])
        );
    }
}
