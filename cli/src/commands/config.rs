// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use hive_core::domain::node_config::HiveConfig;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./hive-config.yaml)
        #[arg(short, long, default_value = "./hive-config.yaml")]
        output: PathBuf,

        /// Include every tunable with comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = HiveConfig::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. HIVE_CONFIG_PATH: {}",
            std::env::var("HIVE_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./hive-config.yaml");
        println!("  4. ~/.hive/config.yaml");
        println!("  5. /etc/hive/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", config.metadata.name);
    println!();

    let coordinator = &config.spec.coordinator;
    println!("{}", "Coordinator:".bold());
    println!("  Tick interval: {}ms", coordinator.tick_interval_ms);
    for (domain, pool) in &coordinator.domains {
        println!("  {} (max concurrent: {})", domain.as_str().bold(), pool.max_concurrent);
    }
    println!();

    let memory = &config.spec.memory;
    println!("{}", "Pattern Memory:".bold());
    println!("  Dimensions: {}", memory.dimensions);
    println!("  Learning rate: {}", memory.learning_rate);
    println!(
        "  Tiers: silver ≥ {}, gold ≥ {}, platinum ≥ {}",
        memory.tiers.silver, memory.tiers.gold, memory.tiers.platinum
    );
    println!(
        "  Index: m={} ef_construction={} ef_search={} max_level={}",
        memory.index.m, memory.index.ef_construction, memory.index.ef_search, memory.index.max_level
    );
    if memory.consolidation.enabled {
        println!(
            "  Consolidation: every {}s, similarity > {}, batch {}",
            memory.consolidation.interval_seconds,
            memory.consolidation.similarity_threshold,
            memory.consolidation.batch_size
        );
    } else {
        println!("  Consolidation: {}", "disabled".dimmed());
    }
    println!();

    println!("{}", "Event Bus:".bold());
    println!("  History: {} events", config.spec.event_bus.max_history);
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = HiveConfig::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    };

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_parse_and_validate() {
        for template in [
            include_str!("../../templates/config-minimal.yaml"),
            include_str!("../../templates/config-with-examples.yaml"),
        ] {
            let config = HiveConfig::from_yaml_str(template).unwrap();
            config.validate().unwrap();
        }
    }
}
