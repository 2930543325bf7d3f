use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use sferase_lib::utils::Utils;
use sferase_lib::{EraseGeometry, ShortRangePolicy};

use crate::config::{Defaults, SfEraseConfig};

/// Settings shared by every command after merging CLI arguments with the
/// configuration file.
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub image: Option<String>,
    pub capacity: u32,
    pub geometry: EraseGeometry,
    pub quiet: bool,
}

impl MergedConfig {
    pub fn image(&self) -> Result<&str> {
        match self.image.as_deref() {
            Some(image) => Ok(image),
            None => bail!("Flash image must be specified either via --image or in config file"),
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "sferase CLI", long_about = None)]
pub struct Cli {
    /// JSON configuration file path
    #[arg(long = "config", short = 'f')]
    pub config: Option<String>,

    /// Flash image file
    #[arg(short = 'i', long = "image")]
    pub image: Option<String>,

    /// Flash capacity in bytes, used by create_image (default: 0x1000000)
    #[arg(long = "capacity")]
    pub capacity: Option<String>,

    /// Sector erase size (default: 0x1000)
    #[arg(long = "sector-size")]
    pub sector_size: Option<String>,

    /// 32K block erase size (default: 0x8000)
    #[arg(long = "block32-size")]
    pub block32_size: Option<String>,

    /// 64K block erase size (default: 0x10000)
    #[arg(long = "block64-size")]
    pub block64_size: Option<String>,

    /// Erase strategy for ranges shorter than one 64K block (default: coarsest)
    #[arg(long = "short-range", value_enum)]
    pub short_range: Option<ShortRangePolicy>,

    /// Suppress progress bar output (default: false)
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Print the erase plan for one or more regions without erasing
    #[command(name = "plan")]
    Plan(Plan),

    /// Erase a region of the flash image
    #[command(name = "erase_region")]
    EraseRegion(EraseRegion),

    /// Erase the entire flash image
    #[command(name = "erase_flash")]
    EraseFlash(EraseFlash),

    /// Create an erased flash image
    #[command(name = "create_image")]
    CreateImage,
}

#[derive(Parser, Debug, Clone)]
#[command(about = "Print the erase plan for one or more regions")]
pub struct Plan {
    /// Print the plan as JSON
    #[arg(long = "json")]
    pub json: bool,

    /// Erase region (format: <address:size>)
    #[arg(required = true)]
    pub region: Vec<String>,
}

#[derive(Parser, Debug, Clone)]
#[command(about = "Erase a region of the flash image")]
pub struct EraseRegion {
    /// Read back the erased regions and check they are blank
    #[arg(long = "verify")]
    pub verify: bool,

    /// Erase region (format: <address:size>)
    #[arg(required = true)]
    pub region: Vec<String>,
}

#[derive(Parser, Debug, Clone)]
#[command(about = "Erase the entire flash image")]
pub struct EraseFlash {
    /// Read back the flash image and check it is blank
    #[arg(long = "verify")]
    pub verify: bool,
}

fn parse_size(arg: Option<&String>, name: &str) -> Result<Option<u32>> {
    arg.map(|s| Utils::str_to_u32(s).with_context(|| format!("Invalid {} '{}'", name, s)))
        .transpose()
}

/// Merge CLI arguments with configuration file, CLI args take precedence
pub fn merge_config(args: &Cli, config: Option<&SfEraseConfig>) -> Result<MergedConfig> {
    let base_config = config.cloned().unwrap_or_else(SfEraseConfig::with_defaults);

    let image = args.image.clone().or_else(|| base_config.image.clone());

    let capacity = match parse_size(args.capacity.as_ref(), "capacity")? {
        Some(capacity) => capacity,
        None => base_config
            .capacity()
            .map_err(|e| anyhow!("Invalid capacity in config: {}", e))?
            .unwrap_or(Defaults::CAPACITY),
    };

    let mut geometry = base_config
        .geometry()
        .map_err(|e| anyhow!("Invalid geometry in config: {}", e))?;
    if let Some(size) = parse_size(args.sector_size.as_ref(), "sector size")? {
        geometry.sector_size = size;
    }
    if let Some(size) = parse_size(args.block32_size.as_ref(), "block32 size")? {
        geometry.block32_size = size;
    }
    if let Some(size) = parse_size(args.block64_size.as_ref(), "block64 size")? {
        geometry.block64_size = size;
    }
    if let Some(policy) = args.short_range {
        geometry.short_range = policy;
    }
    geometry.validate().context("Invalid erase geometry")?;

    let quiet = args.quiet || base_config.quiet;

    Ok(MergedConfig {
        image,
        capacity,
        geometry,
        quiet,
    })
}

/// Determine which command to execute from CLI args or config file
#[derive(Debug)]
pub enum CommandSource {
    Cli(Commands),
    Config(SfEraseConfig),
}

pub fn get_command_source(args: &Cli, config: Option<SfEraseConfig>) -> Result<CommandSource> {
    match (&args.command, config) {
        (Some(cmd), _) => Ok(CommandSource::Cli(cmd.clone())),
        (None, Some(cfg)) => Ok(CommandSource::Config(cfg)),
        (None, None) => {
            bail!("No command specified. Use a subcommand or provide a config file with a command.")
        }
    }
}
