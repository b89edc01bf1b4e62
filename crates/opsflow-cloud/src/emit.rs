//! Manifest directory toolchain
//!
//! Writes one `<Stack>.template.json` per stack plus a `manifest.json`
//! index into an output directory, the same layout a cloud assembly uses.
//! Output is byte-for-byte reproducible for the same stacks, and templates
//! of stacks no longer emitted are removed so the directory always matches
//! its index.

use crate::error::{CloudError, Result};
use crate::manifest::StackManifest;
use crate::provider::{EmitResult, ProvisioningToolchain};
use serde_json::json;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

const INDEX_FILE: &str = "manifest.json";
const TEMPLATE_SUFFIX: &str = ".template.json";
const MANIFEST_VERSION: u32 = 1;

/// Emits manifests as files for an external deploy tool to pick up
pub struct ManifestDirectory {
    out_dir: PathBuf,
}

impl ManifestDirectory {
    pub fn new(out_dir: impl AsRef<Path>) -> Self {
        Self {
            out_dir: out_dir.as_ref().to_path_buf(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Path of the template file for a stack
    pub fn template_path(&self, stack_name: &str) -> PathBuf {
        self.out_dir.join(format!("{}{}", stack_name, TEMPLATE_SUFFIX))
    }

    /// Remove templates left behind by earlier runs that emitted more stacks
    fn remove_stale_templates(&self, keep: &BTreeSet<PathBuf>) -> Result<()> {
        for entry in std::fs::read_dir(&self.out_dir)? {
            let path = entry?.path();
            let is_template = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(TEMPLATE_SUFFIX));
            if is_template && path.is_file() && !keep.contains(&path) {
                std::fs::remove_file(&path)?;
                tracing::info!("Removed stale template {}", path.display());
            }
        }
        Ok(())
    }

    fn write(&self, path: &Path, value: &serde_json::Value) -> Result<()> {
        let content = serde_json::to_string_pretty(value)?;
        std::fs::write(path, content).map_err(|source| CloudError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl ProvisioningToolchain for ManifestDirectory {
    fn name(&self) -> &str {
        "manifest-dir"
    }

    fn display_name(&self) -> &str {
        "Manifest directory"
    }

    fn emit(&self, stacks: &[StackManifest]) -> Result<EmitResult> {
        let start = std::time::Instant::now();

        // Nothing is written unless every stack is consistent.
        for stack in stacks {
            stack.validate()?;
        }

        if !self.out_dir.exists() {
            std::fs::create_dir_all(&self.out_dir)?;
            tracing::debug!("Created output directory: {}", self.out_dir.display());
        }

        let mut result = EmitResult::new();
        let mut index = Vec::new();
        let mut written = BTreeSet::new();
        for stack in stacks {
            let path = self.template_path(&stack.stack_name);
            self.write(&path, &stack.to_document())?;
            tracing::info!(
                "Wrote {} ({} resources) to {}",
                stack.stack_name,
                stack.resources.len(),
                path.display()
            );

            index.push(json!({
                "stack_name": stack.stack_name,
                "account": stack.account,
                "region": stack.region,
                "template": path.file_name().map(|n| n.to_string_lossy().into_owned()),
                "outputs": stack.outputs,
            }));
            written.insert(path.clone());
            result.add_stack(stack, Some(path));
        }
        self.remove_stale_templates(&written)?;

        let index_path = self.out_dir.join(INDEX_FILE);
        self.write(
            &index_path,
            &json!({
                "version": MANIFEST_VERSION,
                "stacks": index,
            }),
        )?;
        result.artifacts.push(index_path);

        result.duration_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{Output, OutputValue, ResourceConfig};
    use tempfile::tempdir;

    fn sample_stack() -> StackManifest {
        let mut stack = StackManifest::new("SampleStack", "123456789012", "ap-southeast-1");
        stack
            .add_resource(ResourceConfig::new(
                "AWS::S3::Bucket",
                "MainBucket",
                json!({ "BucketName": "dev-main-bucket-123456789012" }),
            ))
            .unwrap();
        stack
            .add_output(Output::new("MainBucketName", OutputValue::reference("MainBucket")))
            .unwrap();
        stack
    }

    #[test]
    fn test_emit_writes_templates_and_index() {
        let temp_dir = tempdir().unwrap();
        let toolchain = ManifestDirectory::new(temp_dir.path().join("out"));

        let result = toolchain.emit(&[sample_stack()]).unwrap();
        assert_eq!(result.stacks, vec!["SampleStack"]);
        assert_eq!(result.resource_count, 1);
        assert_eq!(result.artifacts.len(), 2);

        let template = std::fs::read_to_string(toolchain.template_path("SampleStack")).unwrap();
        let template: serde_json::Value = serde_json::from_str(&template).unwrap();
        assert_eq!(template["Resources"]["MainBucket"]["Type"], "AWS::S3::Bucket");

        let index = std::fs::read_to_string(temp_dir.path().join("out/manifest.json")).unwrap();
        let index: serde_json::Value = serde_json::from_str(&index).unwrap();
        assert_eq!(index["stacks"][0]["template"], "SampleStack.template.json");
        assert_eq!(
            index["stacks"][0]["outputs"][0]["value"],
            json!({ "Ref": "MainBucket" })
        );
    }

    #[test]
    fn test_emit_writes_nothing_for_invalid_stack() {
        let temp_dir = tempdir().unwrap();
        let out_dir = temp_dir.path().join("out");
        let toolchain = ManifestDirectory::new(&out_dir);

        let mut stack = sample_stack();
        stack
            .add_output(Output::new("VpcId", OutputValue::reference("MainVpc")))
            .unwrap();

        assert!(toolchain.emit(&[stack]).is_err());
        assert!(!out_dir.exists());
    }

    fn read_all(dir: &Path) -> Vec<(PathBuf, Vec<u8>)> {
        let mut files: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| {
                let path = entry.unwrap().path();
                let bytes = std::fs::read(&path).unwrap();
                (path, bytes)
            })
            .collect();
        files.sort();
        files
    }

    #[test]
    fn test_emit_is_reproducible() {
        let temp_dir = tempdir().unwrap();
        let out_dir = temp_dir.path().join("out");
        let toolchain = ManifestDirectory::new(&out_dir);

        toolchain.emit(&[sample_stack()]).unwrap();
        let first = read_all(&out_dir);
        toolchain.emit(&[sample_stack()]).unwrap();
        let second = read_all(&out_dir);

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }

    #[test]
    fn test_emit_removes_templates_of_dropped_stacks() {
        let temp_dir = tempdir().unwrap();
        let out_dir = temp_dir.path().join("out");
        let toolchain = ManifestDirectory::new(&out_dir);

        let mut other = StackManifest::new("OtherStack", "123456789012", "ap-southeast-1");
        other
            .add_resource(ResourceConfig::new(
                "AWS::S3::Bucket",
                "LogBucket",
                json!({ "BucketName": "dev-log-bucket-123456789012" }),
            ))
            .unwrap();
        toolchain.emit(&[sample_stack(), other]).unwrap();
        assert!(toolchain.template_path("OtherStack").exists());

        // Unrelated files are left alone.
        std::fs::write(out_dir.join("notes.txt"), "keep me").unwrap();

        toolchain.emit(&[sample_stack()]).unwrap();
        assert!(toolchain.template_path("SampleStack").exists());
        assert!(!toolchain.template_path("OtherStack").exists());
        assert!(out_dir.join("notes.txt").exists());

        let index = std::fs::read_to_string(out_dir.join("manifest.json")).unwrap();
        let index: serde_json::Value = serde_json::from_str(&index).unwrap();
        assert_eq!(index["stacks"].as_array().unwrap().len(), 1);
    }
}
