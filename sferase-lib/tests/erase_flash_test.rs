use sferase_lib::device::MemoryFlash;
use sferase_lib::driver::{EraseDriver, FlashDevice};
use sferase_lib::erase_flash::EraseOps;
use sferase_lib::progress::{
    EraseProgress, ProgressCallback, ProgressHelper, ProgressId, ProgressInfo, ProgressStatus,
    ProgressType,
};
use sferase_lib::{
    Error, EraseFlashParams, EraseGeometry, ErasePlan, EraseRegionFile, EraseRegionParams,
    EraseRequest, Granularity, Result, SfEraseTool, ShortRangePolicy,
};
use std::sync::{Arc, Mutex};

/// Records every erase call and optionally fails on the n-th one.
#[derive(Default)]
struct RecordingDriver {
    calls: Vec<(Granularity, u32)>,
    fail_on: Option<usize>,
}

impl RecordingDriver {
    fn failing_on(call: usize) -> Self {
        Self {
            calls: Vec::new(),
            fail_on: Some(call),
        }
    }

    fn record(&mut self, granularity: Granularity, address: u32) -> Result<()> {
        self.calls.push((granularity, address));
        if self.fail_on == Some(self.calls.len()) {
            return Err(Error::device("protection fault"));
        }
        Ok(())
    }
}

impl EraseDriver for RecordingDriver {
    fn erase_sector(&mut self, address: u32) -> Result<()> {
        self.record(Granularity::Sector, address)
    }

    fn erase_block32(&mut self, address: u32) -> Result<()> {
        self.record(Granularity::Block32, address)
    }

    fn erase_block64(&mut self, address: u32) -> Result<()> {
        self.record(Granularity::Block64, address)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Start(ProgressType),
    Advance(EraseProgress),
    Finish(ProgressStatus),
}

#[derive(Default)]
struct RecordingProgress {
    events: Mutex<Vec<Event>>,
}

impl RecordingProgress {
    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn percents(&self) -> Vec<f64> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Advance(p) => Some(p.percent()),
                _ => None,
            })
            .collect()
    }
}

impl ProgressCallback for RecordingProgress {
    fn start(&self, info: ProgressInfo) -> ProgressId {
        self.events
            .lock()
            .unwrap()
            .push(Event::Start(info.progress_type));
        ProgressId(1)
    }

    fn advance(&self, _id: ProgressId, progress: &EraseProgress) {
        self.events.lock().unwrap().push(Event::Advance(*progress));
    }

    fn finish(&self, _id: ProgressId, status: ProgressStatus, _final_message: String) {
        self.events.lock().unwrap().push(Event::Finish(status));
    }
}

/// Accepts erase commands but never changes the contents.
struct StuckFlash(MemoryFlash);

impl EraseDriver for StuckFlash {
    fn erase_sector(&mut self, _address: u32) -> Result<()> {
        Ok(())
    }

    fn erase_block32(&mut self, _address: u32) -> Result<()> {
        Ok(())
    }

    fn erase_block64(&mut self, _address: u32) -> Result<()> {
        Ok(())
    }
}

impl FlashDevice for StuckFlash {
    fn capacity(&self) -> u64 {
        self.0.capacity()
    }

    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<()> {
        self.0.read(address, buf)
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Result<()> {
        self.0.write(address, data)
    }
}

fn programmed_flash(capacity: u32) -> MemoryFlash {
    MemoryFlash::from_bytes(vec![0u8; capacity as usize], EraseGeometry::default()).unwrap()
}

#[test]
fn executes_plan_in_address_order() {
    let mut driver = RecordingDriver::default();
    let plan = EraseOps::plan_and_execute(
        &mut driver,
        0x1000,
        0x10000,
        &EraseGeometry::default(),
        &ProgressHelper::default(),
    )
    .unwrap();

    let planned: Vec<_> = plan.iter().map(|s| (s.granularity, s.address)).collect();
    assert_eq!(driver.calls, planned);
    assert!(driver.calls.windows(2).all(|w| w[0].1 < w[1].1));
}

#[test]
fn driver_failure_aborts_remaining_steps() {
    let geometry = EraseGeometry::default();
    let plan = ErasePlan::build(EraseRequest::new(0, 0x5000), &geometry).unwrap();
    assert_eq!(plan.len(), 5);

    let progress = Arc::new(RecordingProgress::default());
    let helper = ProgressHelper::new(progress.clone(), 0);
    let mut driver = RecordingDriver::failing_on(3);

    let err = EraseOps::execute(&mut driver, &plan, &helper).unwrap_err();
    assert!(matches!(err, Error::Device(ref msg) if msg == "protection fault"));
    assert_eq!(
        driver.calls,
        vec![
            (Granularity::Sector, 0x0000),
            (Granularity::Sector, 0x1000),
            (Granularity::Sector, 0x2000),
        ]
    );

    assert_eq!(progress.percents(), vec![20.0, 40.0]);
    assert_eq!(
        progress.events().last(),
        Some(&Event::Finish(ProgressStatus::Failed))
    );
}

#[test]
fn progress_reported_after_every_step() {
    let progress = Arc::new(RecordingProgress::default());
    let helper = ProgressHelper::new(progress.clone(), 0);
    let mut driver = RecordingDriver::default();

    let plan = EraseOps::plan_and_execute(
        &mut driver,
        0x7000,
        0x20000,
        &EraseGeometry::default(),
        &helper,
    )
    .unwrap();

    let events = progress.events();
    assert_eq!(
        events.first(),
        Some(&Event::Start(ProgressType::Bar {
            total: plan.total_bytes()
        }))
    );
    assert_eq!(events.last(), Some(&Event::Finish(ProgressStatus::Success)));

    let percents = progress.percents();
    assert_eq!(percents.len(), plan.len());
    assert!(percents.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(percents.last(), Some(&100.0));
    assert!(percents.iter().all(|p| (0.0..=100.0).contains(p)));
    assert_eq!(helper.current_step(), 1);
}

#[test]
fn empty_request_touches_nothing() {
    let progress = Arc::new(RecordingProgress::default());
    let mut driver = RecordingDriver::default();
    let plan = EraseOps::plan_and_execute(
        &mut driver,
        0x1000,
        0,
        &EraseGeometry::default(),
        &ProgressHelper::new(progress.clone(), 0),
    )
    .unwrap();

    assert!(plan.is_empty());
    assert!(driver.calls.is_empty());
    assert!(progress.events().is_empty());
}

#[test]
fn works_through_trait_object() {
    let mut driver = RecordingDriver::default();
    let dyn_driver: &mut dyn EraseDriver = &mut driver;
    EraseOps::plan_and_execute(
        dyn_driver,
        0,
        0x10000,
        &EraseGeometry::default(),
        &ProgressHelper::default(),
    )
    .unwrap();
    assert_eq!(driver.calls, vec![(Granularity::Block64, 0)]);
}

#[test]
fn erase_region_clears_only_covered_sectors() {
    let mut tool = SfEraseTool::new(programmed_flash(0x40000), EraseGeometry::default()).unwrap();
    let params = EraseRegionParams {
        regions: vec![
            EraseRegionFile {
                address: 0x1234,
                size: 0x100,
            },
            EraseRegionFile {
                address: 0x1F000,
                size: 0x11000,
            },
        ],
        verify: true,
    };

    let plans = tool.erase_region(&params).unwrap();
    assert_eq!(plans.len(), 2);

    let data = tool.device().as_bytes();
    assert!(data[..0x1000].iter().all(|&b| b == 0x00));
    assert!(data[0x1000..0x2000].iter().all(|&b| b == 0xFF));
    assert!(data[0x2000..0x1F000].iter().all(|&b| b == 0x00));
    assert!(data[0x1F000..0x30000].iter().all(|&b| b == 0xFF));
    assert!(data[0x30000..].iter().all(|&b| b == 0x00));
}

#[test]
fn tool_rejects_geometry_that_differs_from_device() {
    let geometry = EraseGeometry::new(0x1000, 0x4000, 0x10000).unwrap();
    let result = SfEraseTool::new(programmed_flash(0x40000), geometry);
    assert!(matches!(result, Err(Error::Config(_))));

    // 几何参数一致时，计划范围之外的数据保持不变
    let device = MemoryFlash::from_bytes(vec![0x00; 0x40000], geometry).unwrap();
    let mut tool = SfEraseTool::new(device, geometry).unwrap();
    let params = EraseRegionParams {
        regions: vec![EraseRegionFile {
            address: 0x10000,
            size: 0x14000,
        }],
        verify: true,
    };
    let plans = tool.erase_region(&params).unwrap();
    assert_eq!(plans[0].range().end(), 0x24000);

    let data = tool.device().as_bytes();
    assert!(data[0x10000..0x24000].iter().all(|&b| b == 0xFF));
    assert!(data[0x24000..].iter().all(|&b| b == 0x00));
}

#[test]
fn tool_accepts_different_short_range_policy() {
    let geometry = EraseGeometry::default().with_short_range(ShortRangePolicy::SectorsOnly);
    assert!(SfEraseTool::new(programmed_flash(0x10000), geometry).is_ok());
}

#[test]
fn out_of_range_region_erases_nothing() {
    let mut tool = SfEraseTool::new(programmed_flash(0x20000), EraseGeometry::default()).unwrap();
    let params = EraseRegionParams {
        regions: vec![
            EraseRegionFile {
                address: 0,
                size: 0x1000,
            },
            EraseRegionFile {
                address: 0x1F800,
                size: 0x1000,
            },
        ],
        verify: false,
    };

    let err = tool.erase_region(&params).unwrap_err();
    assert!(matches!(
        err,
        Error::OutOfRange {
            address: 0x1F000,
            len: 0x2000,
            capacity: 0x20000
        }
    ));
    assert!(tool.device().as_bytes().iter().all(|&b| b == 0x00));
}

#[test]
fn erase_flash_clears_whole_device() {
    let mut tool = SfEraseTool::new(programmed_flash(0x3D000), EraseGeometry::default()).unwrap();
    let plan = tool.erase_flash(&EraseFlashParams { verify: true }).unwrap();

    assert_eq!(plan.total_bytes(), 0x3D000);
    assert_eq!(plan.count(Granularity::Block64), 3);
    assert_eq!(plan.count(Granularity::Block32), 1);
    assert_eq!(plan.count(Granularity::Sector), 5);
    assert!(tool.into_device().as_bytes().iter().all(|&b| b == 0xFF));
}

#[test]
fn verify_detects_unerased_bytes() {
    let geometry = EraseGeometry::default();
    let mut device = StuckFlash(programmed_flash(0x10000));
    let plan = EraseOps::plan_and_execute(
        &mut device,
        0x1000,
        0x2000,
        &geometry,
        &ProgressHelper::default(),
    )
    .unwrap();

    let err =
        EraseOps::verify_erased(&mut device, plan.range(), &geometry, &ProgressHelper::default())
            .unwrap_err();
    assert!(matches!(
        err,
        Error::NotErased {
            address: 0x1000,
            value: 0x00
        }
    ));
}

#[test]
fn memory_flash_rejects_misaligned_and_out_of_range_erases() {
    let mut flash = MemoryFlash::new(0x20000, EraseGeometry::default());

    assert!(matches!(
        flash.erase_block32(0x1000),
        Err(Error::Misaligned {
            granularity: Granularity::Block32,
            address: 0x1000,
            size: 0x8000
        })
    ));
    assert!(matches!(
        flash.erase_block64(0x20000),
        Err(Error::OutOfRange { .. })
    ));
    assert!(flash.erase(Granularity::Block64, 0x10000).is_ok());
}

#[test]
fn memory_flash_programs_with_nor_semantics() {
    let mut flash = MemoryFlash::new(0x2000, EraseGeometry::default());
    flash.write(0x10, &[0xF0, 0x0F]).unwrap();
    flash.write(0x10, &[0x3C, 0xFF]).unwrap();

    let mut buf = [0u8; 2];
    flash.read(0x10, &mut buf).unwrap();
    assert_eq!(buf, [0x30, 0x0F]);

    flash.erase_sector(0).unwrap();
    flash.read(0x10, &mut buf).unwrap();
    assert_eq!(buf, [0xFF, 0xFF]);

    assert!(flash.read(0x1FFF, &mut buf).is_err());
}
