//! CLI command implementations.

pub mod check;
pub mod config;
pub mod evaluate;
pub mod version;

use std::path::Path;

use anyhow::{Context, Result};
use attrgate_abac::CompiledPolicy;
use attrgate_config::policy_file;

/// Reads and compiles a policy document.
fn compile_policy_file(path: &Path) -> Result<CompiledPolicy> {
    let raw = policy_file::load_policy_file(path)
        .with_context(|| format!("Failed to load policy from {}", path.display()))?;
    attrgate_abac::compile(&raw).with_context(|| format!("Invalid policy in {}", path.display()))
}
