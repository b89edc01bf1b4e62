use crate::StackSelection;
use colored::Colorize;
use opsflow_cloud::{ManifestDirectory, ProvisioningToolchain, StackManifest};
use opsflow_cloud_aws::{base_stack, ci_roles_stack};
use opsflow_config::{BaseSettings, CiRoleSettings, Sources};
use std::path::Path;

pub fn handle(
    sources: &Sources,
    selection: StackSelection,
    out: &Path,
    to_stdout: bool,
) -> anyhow::Result<()> {
    // Resolve everything first: a missing setting must stop the run before
    // any stack is built or written.
    let base_settings = if selection.includes_base() {
        Some(BaseSettings::resolve(sources)?)
    } else {
        None
    };
    let ci_settings = if selection.includes_ci_roles() {
        Some(CiRoleSettings::resolve(sources)?)
    } else {
        None
    };

    let mut stacks = Vec::new();
    if let Some(settings) = &base_settings {
        stacks.push(base_stack(settings)?);
    }
    if let Some(settings) = &ci_settings {
        stacks.push(ci_roles_stack(settings)?);
    }

    if to_stdout {
        for stack in &stacks {
            stack.validate()?;
        }
        let documents: Vec<_> = stacks.iter().map(StackManifest::to_document).collect();
        println!("{}", serde_json::to_string_pretty(&documents)?);
        return Ok(());
    }

    let toolchain = ManifestDirectory::new(out);
    tracing::debug!("Emitting {} stack(s) via {}", stacks.len(), toolchain.name());
    let result = toolchain.emit(&stacks)?;

    println!(
        "{} {} stack(s), {} resources → {}",
        "✓".green().bold(),
        result.stacks.len(),
        result.resource_count,
        toolchain.out_dir().display().to_string().cyan()
    );
    println!(
        "  {}",
        format!("{} in {}ms", toolchain.display_name(), result.duration_ms).dimmed()
    );
    for stack in &stacks {
        print_stack(stack);
    }
    Ok(())
}

fn print_stack(stack: &StackManifest) {
    println!();
    println!(
        "{} ({} / {})",
        stack.stack_name.bold(),
        stack.account,
        stack.region
    );
    println!("  resources: {}", stack.resources.len());
    if stack.outputs.is_empty() {
        return;
    }
    println!("  outputs:");
    for output in &stack.outputs {
        println!(
            "    {} = {}",
            output.name.cyan(),
            serde_json::to_string(&output.value).unwrap_or_default()
        );
    }
}
