//! AWS stacks for opsflow
//!
//! Builds the declarative descriptors of the two opsflow stacks and reduces
//! them to [`opsflow_cloud::StackManifest`]s:
//!
//! - **Base stack**: segmented VPC with flow logs, primary and log buckets,
//!   a shared compute role
//! - **CI roles stack**: OIDC trust for CircleCI, a broad infra role and a
//!   scoped app deployment role
//!
//! Nothing here talks to AWS. The manifests are handed to a
//! [`opsflow_cloud::ProvisioningToolchain`].
//!
//! # Example
//!
//! ```ignore
//! use opsflow_cloud_aws::trust::build_trust;
//!
//! let condition = build_trust("oidc.circleci.com", "org-id", Some("project-id"), true)?;
//! assert!(condition.get(ConditionOperator::StringLike).is_some());
//! ```

pub mod descriptor;
pub mod error;
pub mod iam;
pub mod network;
pub mod role;
pub mod stacks;
pub mod storage;
pub mod trust;

pub use descriptor::Descriptor;
pub use error::{AwsError, Result};
pub use iam::{ConditionOperator, PolicyDocument, PolicyStatement, Principal, TrustCondition};
pub use network::{NetworkDescriptor, SubnetTier, build_network};
pub use role::{RoleDescriptor, RoleKind, build_roles, shared_compute_role};
pub use stacks::{BASE_STACK, CI_ROLES_STACK, base_stack, ci_roles_stack};
pub use storage::{BucketDescriptor, FlowLogDescriptor, RemovalPolicy};
pub use trust::{FederatedTrust, OidcProviderDescriptor, build_trust};
