//! Show the effective configuration.

use std::path::PathBuf;

use vidmix_common::config::{config_file_path, VidmixConfig};

pub fn run(config: &VidmixConfig, path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = path.unwrap_or_else(config_file_path);
    let source = if path.exists() { "file" } else { "defaults" };

    println!("# {} ({source})", path.display());
    println!("{}", serde_json::to_string_pretty(config)?);

    Ok(())
}
