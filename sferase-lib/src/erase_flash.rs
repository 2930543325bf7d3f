use crate::driver::{EraseDriver, FlashDevice};
use crate::geometry::EraseGeometry;
use crate::plan::{ErasePlan, EraseRequest, NormalizedRange};
use crate::progress::{EraseProgress, ProgressHelper, ProgressStatus};
use crate::{Error, Result};

/// Flash 擦除操作实现
pub struct EraseOps;

impl EraseOps {
    /// 规划并执行一次擦除请求，返回已执行的擦除计划
    ///
    /// 任一擦除步骤失败时立即返回该错误，剩余步骤不再执行。
    pub fn plan_and_execute<D>(
        driver: &mut D,
        address: u32,
        length: u32,
        geometry: &EraseGeometry,
        progress: &ProgressHelper,
    ) -> Result<ErasePlan>
    where
        D: EraseDriver + ?Sized,
    {
        let plan = ErasePlan::build(EraseRequest::new(address, length), geometry)?;
        Self::execute(driver, &plan, progress)?;
        Ok(plan)
    }

    /// 按地址递增顺序执行擦除计划
    pub fn execute<D>(driver: &mut D, plan: &ErasePlan, progress: &ProgressHelper) -> Result<()>
    where
        D: EraseDriver + ?Sized,
    {
        let range = plan.range();
        if plan.is_empty() {
            tracing::debug!("Empty erase range at 0x{:08X}, nothing to do", range.start);
            return Ok(());
        }

        let total = plan.total_bytes();
        let steps = plan.len();
        tracing::info!(
            "Erasing 0x{:08X}..0x{:08X} in {} steps",
            range.start,
            range.end(),
            steps
        );

        let bar = progress.create_bar(
            total,
            format!(
                "Erasing 0x{:08X} region at address 0x{:08X} ...",
                range.length, range.start
            ),
        );

        let mut erased = 0u64;
        for (index, step) in plan.iter().enumerate() {
            tracing::debug!("Erase step {}/{}: {}", index + 1, steps, step);
            if let Err(e) = driver.erase(step.granularity, step.address) {
                tracing::error!(
                    "{} erase at 0x{:08X} failed: {}",
                    step.granularity,
                    step.address,
                    e
                );
                bar.finish(
                    ProgressStatus::Failed,
                    format!(
                        "Failed to erase 0x{:08X} region at address 0x{:08X}",
                        range.length, range.start
                    ),
                );
                return Err(e);
            }

            erased += u64::from(step.size);
            bar.advance(&EraseProgress {
                step: index + 1,
                steps,
                granularity: step.granularity,
                address: step.address,
                erased,
                total,
            });
        }

        bar.finish(
            ProgressStatus::Success,
            format!("Erasing region successfully: 0x{:08X}", range.start),
        );
        Ok(())
    }

    /// 回读区间并检查是否全部为擦除状态
    pub fn verify_erased<D>(
        device: &mut D,
        range: NormalizedRange,
        geometry: &EraseGeometry,
        progress: &ProgressHelper,
    ) -> Result<()>
    where
        D: FlashDevice + ?Sized,
    {
        if range.is_empty() {
            return Ok(());
        }

        let spinner = progress.create_spinner(format!(
            "Verifying 0x{:08X}..0x{:08X} is erased ...",
            range.start,
            range.end()
        ));

        let chunk = u64::from(geometry.sector_size);
        let mut buffer = vec![0u8; geometry.sector_size as usize];
        let mut address = u64::from(range.start);
        while address < range.end() {
            let len = chunk.min(range.end() - address) as usize;
            let buf = &mut buffer[..len];
            // address < range.end() <= 2^32
            let base = address as u32;
            if let Err(e) = device.read(base, buf) {
                spinner.finish(ProgressStatus::Failed, "Verify failed");
                return Err(e);
            }

            if let Some(offset) = buf.iter().position(|&b| b != crate::device::ERASED_BYTE) {
                let error = Error::NotErased {
                    address: base + offset as u32,
                    value: buf[offset],
                };
                tracing::warn!("{}", error);
                spinner.finish(ProgressStatus::Failed, "Verify failed");
                return Err(error);
            }
            address += len as u64;
        }

        spinner.finish(ProgressStatus::Success, "Verify success");
        Ok(())
    }
}
