//! Stack manifests: the declarative output handed to the toolchain

use crate::error::{CloudError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

/// Key/value tags, ordered for stable output
pub type Tags = BTreeMap<String, String>;

/// A single declared resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Resource type understood by the toolchain (e.g., "AWS::S3::Bucket")
    pub resource_type: String,

    /// Identifier unique within the stack
    pub logical_id: String,

    /// Resource-specific properties
    pub properties: Value,

    /// Logical ids that must exist before this resource
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    /// Resource-level tags, layered over the stack tags
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: Tags,

    /// Whether the resource type accepts tags at all
    #[serde(default = "default_taggable")]
    pub taggable: bool,

    /// What the toolchain does with the resource when it leaves the stack
    /// (e.g., "Delete", "Retain")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<String>,

    /// Toolchain hints that are not resource properties
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

fn default_taggable() -> bool {
    true
}

impl ResourceConfig {
    pub fn new(
        resource_type: impl Into<String>,
        logical_id: impl Into<String>,
        properties: Value,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            logical_id: logical_id.into(),
            properties,
            depends_on: Vec::new(),
            tags: Tags::new(),
            taggable: true,
            deletion_policy: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn depends_on(mut self, logical_id: impl Into<String>) -> Self {
        self.depends_on.push(logical_id.into());
        self
    }

    pub fn with_deletion_policy(mut self, policy: impl Into<String>) -> Self {
        self.deletion_policy = Some(policy.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Mark the resource as not accepting tags
    pub fn untaggable(mut self) -> Self {
        self.taggable = false;
        self
    }
}

/// Resources of one stack, indexed by logical id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSet {
    pub resources: BTreeMap<String, ResourceConfig>,
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, resource: ResourceConfig) -> Result<()> {
        if self.resources.contains_key(&resource.logical_id) {
            return Err(CloudError::DuplicateLogicalId(resource.logical_id));
        }
        self.resources.insert(resource.logical_id.clone(), resource);
        Ok(())
    }

    pub fn get(&self, logical_id: &str) -> Option<&ResourceConfig> {
        self.resources.get(logical_id)
    }

    pub fn contains(&self, logical_id: &str) -> bool {
        self.resources.contains_key(logical_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceConfig> {
        self.resources.values()
    }

    pub fn by_type(&self, resource_type: &str) -> Vec<&ResourceConfig> {
        self.resources
            .values()
            .filter(|r| r.resource_type == resource_type)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Value of a stack output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputValue {
    /// A value known at synthesis time
    Literal(String),
    /// The primary identifier of a resource (`Ref`)
    Ref(String),
    /// An attribute of a resource (`Fn::GetAtt`)
    Attribute {
        logical_id: String,
        attribute: String,
    },
}

impl OutputValue {
    pub fn reference(logical_id: impl Into<String>) -> Self {
        Self::Ref(logical_id.into())
    }

    pub fn attribute(logical_id: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::Attribute {
            logical_id: logical_id.into(),
            attribute: attribute.into(),
        }
    }

    /// The resource this value points at, if any
    pub fn referenced_id(&self) -> Option<&str> {
        match self {
            OutputValue::Literal(_) => None,
            OutputValue::Ref(id) => Some(id),
            OutputValue::Attribute { logical_id, .. } => Some(logical_id),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            OutputValue::Literal(value) => json!(value),
            OutputValue::Ref(id) => json!({ "Ref": id }),
            OutputValue::Attribute {
                logical_id,
                attribute,
            } => json!({ "Fn::GetAtt": [logical_id, attribute] }),
        }
    }
}

impl Serialize for OutputValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// A named value exported for downstream consumption
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Output {
    pub name: String,
    pub value: OutputValue,
    pub description: Option<String>,
}

impl Output {
    pub fn new(name: impl Into<String>, value: OutputValue) -> Self {
        Self {
            name: name.into(),
            value,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Everything one stack declares
#[derive(Debug, Clone, Serialize)]
pub struct StackManifest {
    pub stack_name: String,
    pub account: String,
    pub region: String,
    /// Tags applied to every taggable resource in the stack
    pub tags: Tags,
    pub resources: ResourceSet,
    pub outputs: Vec<Output>,
}

impl StackManifest {
    pub fn new(
        stack_name: impl Into<String>,
        account: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            stack_name: stack_name.into(),
            account: account.into(),
            region: region.into(),
            tags: Tags::new(),
            resources: ResourceSet::new(),
            outputs: Vec::new(),
        }
    }

    pub fn add_tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.tags.insert(key.into(), value.into());
    }

    pub fn add_resource(&mut self, resource: ResourceConfig) -> Result<()> {
        tracing::debug!(
            "{}: declaring {} ({})",
            self.stack_name,
            resource.logical_id,
            resource.resource_type
        );
        self.resources.add(resource)
    }

    pub fn add_output(&mut self, output: Output) -> Result<()> {
        if self.outputs.iter().any(|o| o.name == output.name) {
            return Err(CloudError::DuplicateOutput(output.name));
        }
        self.outputs.push(output);
        Ok(())
    }

    pub fn output(&self, name: &str) -> Option<&Output> {
        self.outputs.iter().find(|o| o.name == name)
    }

    /// Stack tags overlaid with the resource's own tags
    pub fn effective_tags(&self, resource: &ResourceConfig) -> Tags {
        if !resource.taggable {
            return Tags::new();
        }
        let mut tags = self.tags.clone();
        tags.extend(resource.tags.clone());
        tags
    }

    /// Check that every reference points at a declared resource
    pub fn validate(&self) -> Result<()> {
        for output in &self.outputs {
            if let Some(id) = output.value.referenced_id()
                && !self.resources.contains(id)
            {
                return Err(CloudError::DanglingReference {
                    from: output.name.clone(),
                    logical_id: id.to_string(),
                });
            }
        }
        for resource in self.resources.iter() {
            for dependency in &resource.depends_on {
                if !self.resources.contains(dependency) {
                    return Err(CloudError::DanglingReference {
                        from: resource.logical_id.clone(),
                        logical_id: dependency.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Render the template document the toolchain consumes
    pub fn to_document(&self) -> Value {
        let mut resources = Map::new();
        for resource in self.resources.iter() {
            let mut properties = resource.properties.clone();
            let tags = self.effective_tags(resource);
            if !tags.is_empty()
                && let Some(object) = properties.as_object_mut()
            {
                let tag_list: Vec<Value> = tags
                    .iter()
                    .map(|(k, v)| json!({ "Key": k, "Value": v }))
                    .collect();
                object.insert("Tags".to_string(), Value::Array(tag_list));
            }

            let mut entry = Map::new();
            entry.insert("Type".to_string(), json!(resource.resource_type));
            entry.insert("Properties".to_string(), properties);
            if !resource.depends_on.is_empty() {
                entry.insert("DependsOn".to_string(), json!(resource.depends_on));
            }
            if let Some(policy) = &resource.deletion_policy {
                entry.insert("DeletionPolicy".to_string(), json!(policy));
                entry.insert("UpdateReplacePolicy".to_string(), json!(policy));
            }
            if !resource.metadata.is_empty() {
                entry.insert("Metadata".to_string(), json!(resource.metadata));
            }
            resources.insert(resource.logical_id.clone(), Value::Object(entry));
        }

        let mut outputs = Map::new();
        for output in &self.outputs {
            let mut entry = Map::new();
            entry.insert("Value".to_string(), output.value.to_json());
            if let Some(description) = &output.description {
                entry.insert("Description".to_string(), json!(description));
            }
            outputs.insert(output.name.clone(), Value::Object(entry));
        }

        json!({
            "StackName": self.stack_name,
            "Environment": {
                "Account": self.account,
                "Region": self.region,
            },
            "Resources": resources,
            "Outputs": outputs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(id: &str) -> ResourceConfig {
        ResourceConfig::new("AWS::S3::Bucket", id, json!({ "BucketName": id }))
    }

    #[test]
    fn test_duplicate_logical_id() {
        let mut set = ResourceSet::new();
        set.add(bucket("MainBucket")).unwrap();
        let err = set.add(bucket("MainBucket")).unwrap_err();
        assert!(matches!(err, CloudError::DuplicateLogicalId(id) if id == "MainBucket"));
    }

    #[test]
    fn test_by_type() {
        let mut set = ResourceSet::new();
        set.add(bucket("MainBucket")).unwrap();
        set.add(ResourceConfig::new("AWS::EC2::VPC", "MainVpc", json!({})))
            .unwrap();

        assert_eq!(set.by_type("AWS::S3::Bucket").len(), 1);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_resource_tags_override_stack_tags() {
        let mut stack = StackManifest::new("TestStack", "123456789012", "ap-southeast-1");
        stack.add_tag("Environment", "dev");
        stack.add_tag("Type", "stack");
        stack
            .add_resource(bucket("MainBucket").with_tag("Type", "primary"))
            .unwrap();

        let resource = stack.resources.get("MainBucket").unwrap();
        let tags = stack.effective_tags(resource);
        assert_eq!(tags.get("Environment").unwrap(), "dev");
        assert_eq!(tags.get("Type").unwrap(), "primary");
    }

    #[test]
    fn test_untaggable_resources_get_no_tags() {
        let mut stack = StackManifest::new("TestStack", "123456789012", "ap-southeast-1");
        stack.add_tag("Environment", "dev");
        stack
            .add_resource(
                ResourceConfig::new("AWS::EC2::Route", "PublicRoute", json!({})).untaggable(),
            )
            .unwrap();

        let document = stack.to_document();
        assert!(document["Resources"]["PublicRoute"]["Properties"]["Tags"].is_null());
    }

    #[test]
    fn test_deletion_policy_and_metadata() {
        let mut stack = StackManifest::new("TestStack", "123456789012", "ap-southeast-1");
        stack
            .add_resource(
                bucket("LogBucket")
                    .with_deletion_policy("Delete")
                    .with_metadata("opsflow:auto-delete-objects", json!(true)),
            )
            .unwrap();

        let entry = &stack.to_document()["Resources"]["LogBucket"];
        assert_eq!(entry["DeletionPolicy"], "Delete");
        assert_eq!(entry["UpdateReplacePolicy"], "Delete");
        assert_eq!(entry["Metadata"]["opsflow:auto-delete-objects"], true);
    }

    #[test]
    fn test_dangling_dependency() {
        let mut stack = StackManifest::new("TestStack", "123456789012", "ap-southeast-1");
        stack
            .add_resource(bucket("MainBucket").depends_on("LogBucket"))
            .unwrap();
        assert!(stack.validate().is_err());
    }

    #[test]
    fn test_dangling_output_reference() {
        let mut stack = StackManifest::new("TestStack", "123456789012", "ap-southeast-1");
        stack
            .add_output(Output::new("VpcId", OutputValue::reference("MainVpc")))
            .unwrap();

        let err = stack.validate().unwrap_err();
        assert!(matches!(err, CloudError::DanglingReference { .. }));
    }

    #[test]
    fn test_duplicate_output() {
        let mut stack = StackManifest::new("TestStack", "123456789012", "ap-southeast-1");
        let output = Output::new("Name", OutputValue::Literal("x".to_string()));
        stack.add_output(output.clone()).unwrap();
        assert!(stack.add_output(output).is_err());
    }

    #[test]
    fn test_document_shape() {
        let mut stack = StackManifest::new("TestStack", "123456789012", "ap-southeast-1");
        stack.add_tag("Environment", "dev");
        stack.add_resource(bucket("MainBucket")).unwrap();
        stack
            .add_output(
                Output::new("MainBucketArn", OutputValue::attribute("MainBucket", "Arn"))
                    .with_description("Main bucket ARN"),
            )
            .unwrap();
        stack.validate().unwrap();

        let document = stack.to_document();
        assert_eq!(document["StackName"], "TestStack");
        assert_eq!(document["Environment"]["Region"], "ap-southeast-1");
        assert_eq!(document["Resources"]["MainBucket"]["Type"], "AWS::S3::Bucket");
        assert_eq!(
            document["Resources"]["MainBucket"]["Properties"]["Tags"][0],
            json!({ "Key": "Environment", "Value": "dev" })
        );
        assert_eq!(
            document["Outputs"]["MainBucketArn"]["Value"],
            json!({ "Fn::GetAtt": ["MainBucket", "Arn"] })
        );
        assert_eq!(
            document["Outputs"]["MainBucketArn"]["Description"],
            "Main bucket ARN"
        );
    }
}
