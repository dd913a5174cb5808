//! Writes a starting `theme-builder.toml`.

use crate::settings::Settings;
use anyhow::{Context, Result};
use dialoguer::theme::ColorfulTheme;
use dialoguer::Confirm;
use std::path::Path;

/// Write the default settings to `path`, asking before overwriting an existing file
pub fn run(path: &Path) -> Result<()> {
    let config = default_config()?;

    if path.exists()
        && !Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!(
                "{} already exists, do you want to override it?",
                path.display()
            ))
            .interact()?
    {
        println!("Configuration:");
        println!("{}", config);
    } else {
        std::fs::write(path, config)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("{} written!", path.display());
    }

    Ok(())
}

fn default_config() -> Result<String> {
    toml::to_string_pretty(&Settings::default())
        .with_context(|| "Failed to convert configuration to TOML")
}
