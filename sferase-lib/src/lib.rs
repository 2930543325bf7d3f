pub mod device;
pub mod driver;
pub mod erase_flash;
pub mod error;
pub mod geometry;
pub mod plan;
pub mod progress;
pub mod utils;

pub use crate::error::{Error, Result};
pub use crate::geometry::{EraseGeometry, Granularity, ShortRangePolicy};
pub use crate::plan::{ErasePlan, EraseRequest, EraseStep, NormalizedRange};

use crate::driver::FlashDevice;
use crate::erase_flash::EraseOps;
use crate::progress::{ProgressCallbackArc, ProgressHelper};

/// 单个擦除区域
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EraseRegionFile {
    pub address: u32,
    pub size: u32,
}

#[derive(Debug, Clone, Default)]
pub struct EraseRegionParams {
    pub regions: Vec<EraseRegionFile>,
    /// 擦除后回读检查
    pub verify: bool,
}

#[derive(Debug, Clone, Default)]
pub struct EraseFlashParams {
    pub verify: bool,
}

/// 在一个 Flash 设备上规划并执行擦除
pub struct SfEraseTool<D> {
    device: D,
    geometry: EraseGeometry,
    progress: ProgressHelper,
}

impl<D: FlashDevice> SfEraseTool<D> {
    /// 创建工具，设备自带几何参数时其块大小必须与 `geometry` 一致
    pub fn new(device: D, geometry: EraseGeometry) -> Result<Self> {
        geometry.validate()?;
        if let Some(device_geometry) = device.erase_geometry()
            && !device_geometry.same_sizes(&geometry)
        {
            return Err(Error::config(format!(
                "erase geometry {} does not match device geometry {}",
                geometry.describe(),
                device_geometry.describe()
            )));
        }
        Ok(Self {
            device,
            geometry,
            progress: ProgressHelper::default(),
        })
    }

    /// 设置进度回调
    pub fn with_progress(mut self, callback: ProgressCallbackArc) -> Self {
        self.progress = ProgressHelper::new(callback, 0);
        self
    }

    pub fn geometry(&self) -> &EraseGeometry {
        &self.geometry
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn into_device(self) -> D {
        self.device
    }

    /// 只生成擦除计划，不执行
    pub fn plan(&self, region: &EraseRegionFile) -> Result<ErasePlan> {
        let request = EraseRequest::new(region.address, region.size);
        let plan = ErasePlan::build(request, &self.geometry)?;
        self.check_capacity(&plan)?;
        Ok(plan)
    }

    /// 擦除指定区域
    ///
    /// 所有区域的计划在执行前生成并检查，任何区域越界时不会擦除任何内容。
    pub fn erase_region(&mut self, params: &EraseRegionParams) -> Result<Vec<ErasePlan>> {
        let plans = params
            .regions
            .iter()
            .map(|region| self.plan(region))
            .collect::<Result<Vec<_>>>()?;

        for plan in plans.iter() {
            EraseOps::execute(&mut self.device, plan, &self.progress)?;
            if params.verify {
                EraseOps::verify_erased(
                    &mut self.device,
                    plan.range(),
                    &self.geometry,
                    &self.progress,
                )?;
            }
        }
        Ok(plans)
    }

    /// 擦除整个 Flash
    pub fn erase_flash(&mut self, params: &EraseFlashParams) -> Result<ErasePlan> {
        let capacity = self.device.capacity();
        let Ok(size) = u32::try_from(capacity) else {
            return Err(Error::invalid_input(format!(
                "device capacity 0x{:X} cannot be erased in a single request",
                capacity
            )));
        };

        let region = EraseRegionFile { address: 0, size };
        let plan = self.plan(&region)?;
        EraseOps::execute(&mut self.device, &plan, &self.progress)?;
        if params.verify {
            EraseOps::verify_erased(
                &mut self.device,
                plan.range(),
                &self.geometry,
                &self.progress,
            )?;
        }
        Ok(plan)
    }

    fn check_capacity(&self, plan: &ErasePlan) -> Result<()> {
        let range = plan.range();
        let capacity = self.device.capacity();
        if range.end() > capacity {
            return Err(Error::OutOfRange {
                address: range.start,
                len: range.length,
                capacity,
            });
        }
        Ok(())
    }
}
