mod cli;
mod config;
mod config_exec;
mod image_ops;
mod progress;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use sferase_lib::utils::Utils;
use sferase_lib::{EraseFlashParams, EraseRegionFile, EraseRegionParams};

use crate::cli::{Cli, CommandSource, Commands, MergedConfig, get_command_source, merge_config};
use crate::config::SfEraseConfig;

fn parse_regions(regions: &[String]) -> Result<Vec<EraseRegionFile>> {
    regions
        .iter()
        .map(|region| {
            Utils::parse_erase_region(region)
                .with_context(|| format!("Failed to parse erase region {}", region))
        })
        .collect()
}

fn execute_cli_command(command: Commands, merged: &MergedConfig) -> Result<()> {
    match command {
        Commands::Plan(params) => {
            let regions = parse_regions(&params.region)?;
            image_ops::execute_plan(&regions, &merged.geometry, params.json)
        }
        Commands::EraseRegion(params) => {
            let erase_region_params = EraseRegionParams {
                regions: parse_regions(&params.region)?,
                verify: params.verify,
            };
            image_ops::execute_erase_region(merged, &erase_region_params)
        }
        Commands::EraseFlash(params) => {
            let erase_flash_params = EraseFlashParams {
                verify: params.verify,
            };
            image_ops::execute_erase_flash(merged, &erase_flash_params)
        }
        Commands::CreateImage => image_ops::execute_create_image(merged),
    }
}

fn run(args: Cli) -> Result<()> {
    let config = match args.config.as_deref() {
        Some(path) => {
            let config = SfEraseConfig::from_file(path)
                .map_err(|e| anyhow!("Failed to load config file '{}': {}", path, e))?;
            config
                .validate()
                .map_err(|e| anyhow!("Invalid config file '{}': {}", path, e))?;
            Some(config)
        }
        None => None,
    };

    let merged = merge_config(&args, config.as_ref())?;
    tracing::debug!("Merged configuration: {:?}", merged);

    match get_command_source(&args, config)? {
        CommandSource::Cli(command) => execute_cli_command(command, &merged),
        CommandSource::Config(config) => config_exec::execute_config_command(&config, &merged),
    }
}

fn main() {
    // Initialize tracing, set log level from environment variable
    // Log level can be controlled by setting the RUST_LOG environment variable, e.g.:
    // RUST_LOG=debug, RUST_LOG=sferase_lib=trace, RUST_LOG=info
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("off"));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    let args = Cli::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {:?}", e);
        std::process::exit(1);
    }
}
