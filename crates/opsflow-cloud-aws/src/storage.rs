//! Buckets and VPC flow logs

use crate::descriptor::Descriptor;
use opsflow_cloud::{OutputValue, ResourceConfig, Tags};
use serde_json::json;

/// What happens to a resource when it is removed from the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalPolicy {
    Destroy,
    Retain,
}

impl RemovalPolicy {
    fn as_deletion_policy(&self) -> &'static str {
        match self {
            RemovalPolicy::Destroy => "Delete",
            RemovalPolicy::Retain => "Retain",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketDescriptor {
    pub logical_id: String,
    pub bucket_name: String,
    pub versioned: bool,
    pub removal_policy: RemovalPolicy,
    /// Empty the bucket before deleting it on teardown
    pub auto_delete_objects: bool,
    pub tags: Tags,
}

impl BucketDescriptor {
    /// Bucket torn down together with the stack
    pub fn ephemeral(logical_id: &str, bucket_name: &str, versioned: bool) -> Self {
        Self {
            logical_id: logical_id.to_string(),
            bucket_name: bucket_name.to_string(),
            versioned,
            removal_policy: RemovalPolicy::Destroy,
            auto_delete_objects: true,
            tags: Tags::new(),
        }
    }

    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.tags.insert(key.to_string(), value.to_string());
        self
    }

    pub fn arn(&self) -> String {
        format!("arn:aws:s3:::{}", self.bucket_name)
    }
}

impl Descriptor for BucketDescriptor {
    fn logical_id(&self) -> &str {
        &self.logical_id
    }

    fn to_resources(&self) -> Vec<ResourceConfig> {
        let mut properties = json!({ "BucketName": self.bucket_name });
        if self.versioned {
            properties["VersioningConfiguration"] = json!({ "Status": "Enabled" });
        }

        let mut resource = ResourceConfig::new("AWS::S3::Bucket", &self.logical_id, properties)
            .with_deletion_policy(self.removal_policy.as_deletion_policy());
        if self.auto_delete_objects {
            resource = resource.with_metadata("opsflow:auto-delete-objects", json!(true));
        }
        resource.tags.extend(self.tags.clone());
        vec![resource]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficType {
    All,
    Accept,
    Reject,
}

impl TrafficType {
    fn as_str(&self) -> &'static str {
        match self {
            TrafficType::All => "ALL",
            TrafficType::Accept => "ACCEPT",
            TrafficType::Reject => "REJECT",
        }
    }
}

/// Ships a VPC's flow logs to an S3 bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowLogDescriptor {
    pub logical_id: String,
    pub vpc_logical_id: String,
    /// Destination, addressed by name so the bucket may live elsewhere
    pub destination_bucket_name: String,
    pub traffic_type: TrafficType,
    /// Declared bucket to wait for, when the destination is in the same stack
    pub depends_on: Option<String>,
}

impl FlowLogDescriptor {
    pub fn to_bucket(vpc_logical_id: &str, bucket: &BucketDescriptor) -> Self {
        Self {
            logical_id: "VpcFlowLogs".to_string(),
            vpc_logical_id: vpc_logical_id.to_string(),
            destination_bucket_name: bucket.bucket_name.clone(),
            traffic_type: TrafficType::All,
            depends_on: Some(bucket.logical_id.clone()),
        }
    }
}

impl Descriptor for FlowLogDescriptor {
    fn logical_id(&self) -> &str {
        &self.logical_id
    }

    fn to_resources(&self) -> Vec<ResourceConfig> {
        let mut resource = ResourceConfig::new(
            "AWS::EC2::FlowLog",
            &self.logical_id,
            json!({
                "ResourceId": OutputValue::reference(&self.vpc_logical_id).to_json(),
                "ResourceType": "VPC",
                "TrafficType": self.traffic_type.as_str(),
                "LogDestinationType": "s3",
                "LogDestination": format!("arn:aws:s3:::{}", self.destination_bucket_name),
            }),
        );
        if let Some(bucket_id) = &self.depends_on {
            resource = resource.depends_on(bucket_id);
        }
        vec![resource]
    }
}
