use std::path::Path;

use anyhow::Result;

use flux::FluxConfig;

pub fn cmd_config(config_path: &Path, path_only: bool) -> Result<()> {
    if path_only {
        println!("{}", config_path.display());
        return Ok(());
    }

    let config = FluxConfig::load_from(config_path)?;
    if !config_path.exists() {
        eprintln!("⚠️  {} not found, showing defaults", config_path.display());
    }
    print!("{}", config.to_toml()?);

    Ok(())
}
