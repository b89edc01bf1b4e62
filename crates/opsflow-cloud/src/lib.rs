//! opsflow cloud manifests
//!
//! This crate holds the provider-neutral side of opsflow: the resource
//! descriptors every stack is reduced to, and the seam through which they
//! are handed to an external provisioning toolchain.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  opsflow CLI                     │
//! │              (opsflow synth/config)              │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                opsflow-cloud                     │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │        Toolchain Abstraction              │   │
//! │  │  trait ProvisioningToolchain { ... }      │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │  Manifests   │  │   Emission   │            │
//! │  └──────────────┘  └──────────────┘            │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼───────┐
//! │  AWS stacks   │
//! │(opsflow-cloud-│
//! │     aws)      │
//! └───────────────┘
//! ```
//!
//! Diffing, applying and state tracking belong to the toolchain, not here.

pub mod emit;
pub mod error;
pub mod manifest;
pub mod provider;

// Re-exports
pub use emit::ManifestDirectory;
pub use error::{CloudError, Result};
pub use manifest::{Output, OutputValue, ResourceConfig, ResourceSet, StackManifest, Tags};
pub use provider::{EmitResult, ProvisioningToolchain};
