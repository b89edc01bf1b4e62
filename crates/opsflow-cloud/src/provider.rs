//! Provisioning toolchain trait definition

use crate::error::Result;
use crate::manifest::StackManifest;
use serde::Serialize;
use std::path::PathBuf;

/// The external side that turns manifests into cloud resources
///
/// opsflow only declares resources; a toolchain implementation receives the
/// finished manifests and owns diffing, applying and state.
pub trait ProvisioningToolchain {
    /// Returns the toolchain name (e.g., "manifest-dir")
    fn name(&self) -> &str;

    /// Returns the toolchain display name for UI
    fn display_name(&self) -> &str;

    /// Hand a set of validated stack manifests over in one pass
    fn emit(&self, stacks: &[StackManifest]) -> Result<EmitResult>;
}

/// Result of emitting manifests
#[derive(Debug, Clone, Default, Serialize)]
pub struct EmitResult {
    /// Stacks that were handed over
    pub stacks: Vec<String>,

    /// Files written, if the toolchain is file based
    pub artifacts: Vec<PathBuf>,

    /// Total number of resources across all stacks
    pub resource_count: usize,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl EmitResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_stack(&mut self, stack: &StackManifest, artifact: Option<PathBuf>) {
        self.stacks.push(stack.stack_name.clone());
        self.resource_count += stack.resources.len();
        if let Some(path) = artifact {
            self.artifacts.push(path);
        }
    }
}
