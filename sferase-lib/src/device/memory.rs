use super::{ERASED_BYTE, check_erase, check_range, program};
use crate::driver::{EraseDriver, FlashDevice};
use crate::geometry::{EraseGeometry, Granularity};
use crate::{Error, Result};

/// In-memory flash device.
#[derive(Debug, Clone)]
pub struct MemoryFlash {
    data: Vec<u8>,
    geometry: EraseGeometry,
}

impl MemoryFlash {
    /// Creates an erased device of `capacity` bytes.
    pub fn new(capacity: u32, geometry: EraseGeometry) -> Self {
        Self {
            data: vec![ERASED_BYTE; capacity as usize],
            geometry,
        }
    }

    /// Wraps existing flash contents.
    pub fn from_bytes(data: Vec<u8>, geometry: EraseGeometry) -> Result<Self> {
        if data.len() as u64 > u64::from(u32::MAX) + 1 {
            return Err(Error::invalid_input(format!(
                "flash contents of {} bytes exceed the 32-bit address space",
                data.len()
            )));
        }
        Ok(Self { data, geometry })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn erase_unit(&mut self, granularity: Granularity, address: u32) -> Result<()> {
        let range = check_erase(&self.geometry, self.capacity(), granularity, address)?;
        tracing::trace!("memory flash: {} erase at 0x{:08X}", granularity, address);
        self.data[range].fill(ERASED_BYTE);
        Ok(())
    }
}

impl EraseDriver for MemoryFlash {
    fn erase_sector(&mut self, address: u32) -> Result<()> {
        self.erase_unit(Granularity::Sector, address)
    }

    fn erase_block32(&mut self, address: u32) -> Result<()> {
        self.erase_unit(Granularity::Block32, address)
    }

    fn erase_block64(&mut self, address: u32) -> Result<()> {
        self.erase_unit(Granularity::Block64, address)
    }
}

impl FlashDevice for MemoryFlash {
    fn capacity(&self) -> u64 {
        self.data.len() as u64
    }

    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<()> {
        let range = check_range(address, buf.len() as u64, self.capacity())?;
        buf.copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Result<()> {
        let range = check_range(address, data.len() as u64, self.capacity())?;
        program(&mut self.data[range], data);
        Ok(())
    }

    fn erase_geometry(&self) -> Option<&EraseGeometry> {
        Some(&self.geometry)
    }
}
