//! Common shape of all descriptors

use opsflow_cloud::{ResourceConfig, StackManifest};

/// A declarative value object that reduces to one or more resources
pub trait Descriptor {
    /// Logical id of the primary resource
    fn logical_id(&self) -> &str;

    /// Resources this descriptor declares, primary resource first
    fn to_resources(&self) -> Vec<ResourceConfig>;

    /// Add every resource to a stack
    fn declare(&self, stack: &mut StackManifest) -> opsflow_cloud::Result<()> {
        for resource in self.to_resources() {
            stack.add_resource(resource)?;
        }
        Ok(())
    }
}
