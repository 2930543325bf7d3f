use anyhow::{Result, anyhow, bail};
use sferase_lib::{EraseFlashParams, EraseRegionFile, EraseRegionParams};

use crate::cli::MergedConfig;
use crate::config::{RegionItemConfig, SfEraseConfig};
use crate::image_ops;

fn parse_regions(regions: &[RegionItemConfig]) -> Result<Vec<EraseRegionFile>> {
    regions
        .iter()
        .map(|region| region.to_region().map_err(|e| anyhow!(e)))
        .collect()
}

/// Execute command from config file
pub fn execute_config_command(config: &SfEraseConfig, merged: &MergedConfig) -> Result<()> {
    if let Some(ref plan) = config.plan {
        let regions = parse_regions(&plan.regions)?;
        image_ops::execute_plan(&regions, &merged.geometry, plan.json)
    } else if let Some(ref erase_region) = config.erase_region {
        let params = EraseRegionParams {
            regions: parse_regions(&erase_region.regions)?,
            verify: erase_region.verify,
        };
        image_ops::execute_erase_region(merged, &params)
    } else if let Some(ref erase_flash) = config.erase_flash {
        let params = EraseFlashParams {
            verify: erase_flash.verify,
        };
        image_ops::execute_erase_flash(merged, &params)
    } else if config.create_image.is_some() {
        image_ops::execute_create_image(merged)
    } else {
        bail!("No valid command found in config file.")
    }
}
