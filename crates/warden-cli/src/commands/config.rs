//! Config command - show the effective configuration and where it came from.

use anyhow::Result;
use colored::Colorize;
use warden_config::{ConfigLayer, ResolvedConfig};

use super::OutputFormat;
use crate::config_bridge;
use crate::theme::Theme;

/// Print the merged configuration as TOML, or JSON in json mode.
pub(crate) fn show(resolved: &ResolvedConfig, format: OutputFormat, sources: bool) -> Result<()> {
    match format {
        OutputFormat::Pretty => println!("{}", resolved.to_toml()?),
        OutputFormat::Json => println!("{}", resolved.to_json()?),
    }

    if sources {
        let mut overridden: Vec<_> = resolved
            .field_sources
            .iter()
            .filter(|(_, layer)| **layer != ConfigLayer::Defaults)
            .collect();
        overridden.sort_by(|a, b| a.0.cmp(b.0));

        println!("{}", Theme::header("Overridden fields"));
        if overridden.is_empty() {
            println!("{}", Theme::dimmed("  (all defaults)"));
        }
        for (field, layer) in overridden {
            println!("  {:<40} {}", field, layer.to_string().dimmed());
        }
    }
    Ok(())
}

/// Print config files and storage locations.
pub(crate) fn paths(resolved: &ResolvedConfig) {
    println!("\n{}", Theme::header("Paths"));
    println!("{}", Theme::separator());
    println!(
        "{}",
        Theme::kv("warden home", &resolved.warden_home.display().to_string())
    );
    println!(
        "{}",
        Theme::kv(
            "grants",
            &config_bridge::grants_path(resolved).display().to_string()
        )
    );
    println!(
        "{}",
        Theme::kv(
            "audit log",
            &config_bridge::audit_path(resolved).display().to_string()
        )
    );
    if !resolved.config.storage.persist {
        println!("{}", Theme::warning("persistence disabled: grants are kept in memory only"));
    }

    println!("\n{}", Theme::header("Loaded config files"));
    if resolved.loaded_files.is_empty() {
        println!("{}", Theme::dimmed("  (none, using defaults)"));
    }
    for file in &resolved.loaded_files {
        println!("  {file}");
    }
    println!();
}
