//! Cloud assembly output: one template file per stack plus a manifest.
//!
//! All templates are rendered and digested before anything touches the
//! output directory, so a failure never leaves a partial assembly behind.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::digest;
use crate::domain::error::Result;
use crate::obs;
use crate::stack::SynthesizedStack;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const ASSEMBLY_SCHEMA_VERSION: &str = "1.0";

/// Manifest entry for one stack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StackArtifact {
    #[serde(rename = "type")]
    pub artifact_type: String,
    pub environment: String,
    pub template_file: String,
    pub template_digest: String,
    pub resource_count: usize,
}

/// `manifest.json` contents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssemblyManifest {
    pub version: String,
    pub artifacts: BTreeMap<String, StackArtifact>,
}

/// Template file name for a stack.
pub fn template_file_name(stack_name: &str) -> String {
    format!("{}.template.json", stack_name)
}

/// Write templates and manifest into `out_dir`, creating it if needed.
pub fn write_assembly(out_dir: &Path, stacks: &[SynthesizedStack]) -> Result<AssemblyManifest> {
    let mut rendered: Vec<(PathBuf, String)> = Vec::with_capacity(stacks.len());
    let mut artifacts = BTreeMap::new();

    for stack in stacks {
        let template = stack.template();
        let template_digest = digest::template_digest(stack.name(), &template)?;
        let file_name = template_file_name(stack.name());
        let mut body = serde_json::to_string_pretty(&template)?;
        body.push('\n');

        artifacts.insert(
            stack.name().to_string(),
            StackArtifact {
                artifact_type: "aws:cloudformation:stack".to_string(),
                environment: stack.environment().uri(),
                template_file: file_name.clone(),
                template_digest,
                resource_count: template["Resources"]
                    .as_object()
                    .map(|r| r.len())
                    .unwrap_or_default(),
            },
        );
        rendered.push((out_dir.join(file_name), body));
    }

    let manifest = AssemblyManifest {
        version: ASSEMBLY_SCHEMA_VERSION.to_string(),
        artifacts,
    };
    let mut manifest_body = serde_json::to_string_pretty(&manifest)?;
    manifest_body.push('\n');

    std::fs::create_dir_all(out_dir)?;
    for (path, body) in &rendered {
        std::fs::write(path, body)?;
        obs::emit_template_written(&path.display().to_string(), body.len());
    }
    std::fs::write(out_dir.join(MANIFEST_FILE), manifest_body)?;
    obs::emit_assembly_written(&out_dir.display().to_string(), stacks.len());

    Ok(manifest)
}

/// Read a previously written manifest.
pub fn read_manifest(out_dir: &Path) -> Result<AssemblyManifest> {
    let content = std::fs::read_to_string(out_dir.join(MANIFEST_FILE))?;
    Ok(serde_json::from_str(&content)?)
}
