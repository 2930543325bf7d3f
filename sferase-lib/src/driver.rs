use crate::Result;
use crate::geometry::{EraseGeometry, Granularity};

/// Erase primitives of a NOR flash driver.
///
/// Callers guarantee that every address is aligned to the size of the
/// primitive being invoked. Each call blocks until the erase is complete.
pub trait EraseDriver {
    /// Erases the 4 KiB sector starting at `address`.
    fn erase_sector(&mut self, address: u32) -> Result<()>;

    /// Erases the 32 KiB block starting at `address`.
    fn erase_block32(&mut self, address: u32) -> Result<()>;

    /// Erases the 64 KiB block starting at `address`.
    fn erase_block64(&mut self, address: u32) -> Result<()>;

    /// Dispatches to the primitive matching `granularity`.
    fn erase(&mut self, granularity: Granularity, address: u32) -> Result<()> {
        match granularity {
            Granularity::Sector => self.erase_sector(address),
            Granularity::Block32 => self.erase_block32(address),
            Granularity::Block64 => self.erase_block64(address),
        }
    }
}

/// A complete flash device: erase primitives plus byte-granular read and
/// program.
pub trait FlashDevice: EraseDriver {
    /// Size of the device in bytes.
    fn capacity(&self) -> u64;

    /// Reads flash contents into `buf`, starting at `address`.
    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<()>;

    /// Programs `data` at `address`. Programming can only clear bits; erased
    /// bytes read back as `0xFF`.
    fn write(&mut self, address: u32, data: &[u8]) -> Result<()>;

    /// Unit sizes the device erases with, if it enforces its own.
    fn erase_geometry(&self) -> Option<&EraseGeometry> {
        None
    }
}

impl<T: EraseDriver + ?Sized> EraseDriver for &mut T {
    fn erase_sector(&mut self, address: u32) -> Result<()> {
        (**self).erase_sector(address)
    }

    fn erase_block32(&mut self, address: u32) -> Result<()> {
        (**self).erase_block32(address)
    }

    fn erase_block64(&mut self, address: u32) -> Result<()> {
        (**self).erase_block64(address)
    }
}
