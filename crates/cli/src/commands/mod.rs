//! CLI command implementations

pub mod run;
pub mod targets;

use std::path::Path;

use anyhow::Context;
use webcompat_harness::{FrameworkTarget, HarnessConfig, DEFAULT_CONFIG_FILE};

/// Load the harness config and resolve its targets from the working
/// directory. An explicitly given config file must exist; the default one
/// is optional.
pub fn load_targets(
    config_path: Option<&Path>,
) -> anyhow::Result<(HarnessConfig, Vec<FrameworkTarget>)> {
    let config = match config_path {
        Some(path) => HarnessConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => HarnessConfig::load_or_default(Path::new(DEFAULT_CONFIG_FILE))
            .with_context(|| format!("failed to load {}", DEFAULT_CONFIG_FILE))?,
    };
    let cwd = std::env::current_dir()?;
    let targets = config.resolve(&cwd)?;
    Ok((config, targets))
}
