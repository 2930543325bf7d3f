use anyhow::{Context, Result};
use serde::Serialize;
use sferase_lib::device::ImageFlash;
use sferase_lib::progress::ProgressCallbackArc;
use sferase_lib::{
    EraseFlashParams, EraseGeometry, ErasePlan, EraseRegionFile, EraseRegionParams, EraseRequest,
    Granularity, SfEraseTool,
};
use strum::IntoEnumIterator;

use crate::cli::MergedConfig;
use crate::progress::create_indicatif_progress_callback;

#[derive(Serialize)]
struct StepOutput {
    granularity: String,
    address: String,
    size: String,
}

#[derive(Serialize)]
struct PlanOutput {
    address: String,
    size: String,
    start: String,
    end: String,
    steps: Vec<StepOutput>,
}

impl PlanOutput {
    fn new(region: &EraseRegionFile, plan: &ErasePlan) -> Self {
        let range = plan.range();
        Self {
            address: format!("0x{:08X}", region.address),
            size: format!("0x{:X}", region.size),
            start: format!("0x{:08X}", range.start),
            end: format!("0x{:08X}", range.end()),
            steps: plan
                .iter()
                .map(|step| StepOutput {
                    granularity: step.granularity.to_string(),
                    address: format!("0x{:08X}", step.address),
                    size: format!("0x{:X}", step.size),
                })
                .collect(),
        }
    }
}

fn progress_callback(config: &MergedConfig) -> ProgressCallbackArc {
    if config.quiet {
        sferase_lib::progress::no_op_progress_callback()
    } else {
        create_indicatif_progress_callback()
    }
}

fn open_tool(config: &MergedConfig) -> Result<SfEraseTool<ImageFlash>> {
    let path = config.image()?;
    let image = ImageFlash::open(path, config.geometry)
        .with_context(|| format!("Failed to open flash image '{}'", path))?;
    let tool = SfEraseTool::new(image, config.geometry)?.with_progress(progress_callback(config));
    Ok(tool)
}

fn summary(plan: &ErasePlan) -> String {
    Granularity::iter()
        .rev()
        .map(|granularity| format!("{} x{}", granularity, plan.count(granularity)))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn execute_plan(
    regions: &[EraseRegionFile],
    geometry: &EraseGeometry,
    json: bool,
) -> Result<()> {
    let mut outputs = Vec::new();
    for region in regions {
        let plan = ErasePlan::build(EraseRequest::new(region.address, region.size), geometry)
            .with_context(|| {
                format!(
                    "Failed to plan region 0x{:08X}:0x{:X}",
                    region.address, region.size
                )
            })?;

        if json {
            outputs.push(PlanOutput::new(region, &plan));
            continue;
        }

        let range = plan.range();
        println!(
            "Region 0x{:08X}:0x{:X} -> 0x{:08X}..0x{:08X} ({} steps: {})",
            region.address,
            region.size,
            range.start,
            range.end(),
            plan.len(),
            summary(&plan)
        );
        for step in plan.iter() {
            println!("  {}", step);
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&outputs)?);
    }
    Ok(())
}

pub fn execute_erase_region(config: &MergedConfig, params: &EraseRegionParams) -> Result<()> {
    let mut tool = open_tool(config)?;
    let plans = tool.erase_region(params)?;
    tool.device().flush().context("Failed to flush flash image")?;

    let steps: usize = plans.iter().map(ErasePlan::len).sum();
    let bytes: u64 = plans.iter().map(ErasePlan::total_bytes).sum();
    tracing::info!(
        "Erased {} regions, 0x{:X} bytes in {} steps",
        plans.len(),
        bytes,
        steps
    );
    Ok(())
}

pub fn execute_erase_flash(config: &MergedConfig, params: &EraseFlashParams) -> Result<()> {
    let mut tool = open_tool(config)?;
    let plan = tool.erase_flash(params)?;
    tool.device().flush().context("Failed to flush flash image")?;

    tracing::info!("Erased flash image: {}", summary(&plan));
    Ok(())
}

pub fn execute_create_image(config: &MergedConfig) -> Result<()> {
    let path = config.image()?;
    ImageFlash::create(path, config.capacity, config.geometry)
        .with_context(|| format!("Failed to create flash image '{}'", path))?;
    if !config.quiet {
        println!(
            "Created erased flash image '{}' (0x{:X} bytes)",
            path, config.capacity
        );
    }
    Ok(())
}
