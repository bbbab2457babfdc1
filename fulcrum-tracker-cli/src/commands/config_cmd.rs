use anyhow::Result;
use std::path::Path;

use crate::config::Config;

pub fn show_config(path: Option<&Path>, url: Option<String>) -> Result<()> {
    let config = Config::load(path)?.with_base_url(url);
    let config_str = toml::to_string_pretty(&config)?;

    println!("Current Configuration ({})", Config::resolve_path(path)?.display());
    println!("────────────────────────────────");
    println!();
    println!("{}", config_str);

    Ok(())
}

pub fn init_config(path: Option<&Path>, force: bool) -> Result<()> {
    let config_file = Config::resolve_path(path)?;

    if config_file.exists() && !force {
        println!(
            "Configuration file already exists at: {}",
            config_file.display()
        );
        println!("Use --force to overwrite");
        return Ok(());
    }

    let written = Config::default().save(path)?;
    println!("✓ Configuration initialized at: {}", written.display());

    Ok(())
}
