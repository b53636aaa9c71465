use std::path::Path;

use crate::commands::load_targets;
use crate::output::{print_list, OutputFormat};

pub fn execute(config_path: Option<&Path>, format: OutputFormat) -> anyhow::Result<()> {
    let (_, targets) = load_targets(config_path)?;
    print_list(&targets, format);
    Ok(())
}
