//! Flash 镜像文件设备
//!
//! 镜像文件通过 `memmap2` 映射到内存，擦除和编程直接作用于映射区域，
//! 调用 [`ImageFlash::flush`] 时同步写回文件。

use super::{ERASED_BYTE, check_erase, check_range, program};
use crate::driver::{EraseDriver, FlashDevice};
use crate::geometry::{EraseGeometry, Granularity};
use crate::{Error, Result};
use memmap2::MmapMut;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// 基于镜像文件的 Flash 设备
pub struct ImageFlash {
    path: PathBuf,
    map: MmapMut,
    geometry: EraseGeometry,
    _file: File,
}

impl std::fmt::Debug for ImageFlash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageFlash")
            .field("path", &self.path)
            .field("capacity", &self.map.len())
            .finish()
    }
}

impl ImageFlash {
    /// 打开已有的镜像文件
    pub fn open(path: impl AsRef<Path>, geometry: EraseGeometry) -> Result<Self> {
        geometry.validate()?;
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();
        if len == 0 {
            return Err(Error::invalid_input(format!(
                "flash image '{}' is empty",
                path.display()
            )));
        }
        if len > u64::from(u32::MAX) + 1 {
            return Err(Error::invalid_input(format!(
                "flash image '{}' of {} bytes exceeds the 32-bit address space",
                path.display(),
                len
            )));
        }

        tracing::debug!("Opening flash image {} (0x{:X} bytes)", path.display(), len);
        Self::map(path, file, geometry)
    }

    /// 创建一个已擦除（全部为 0xFF）的镜像文件，已存在的文件会被覆盖
    pub fn create(path: impl AsRef<Path>, capacity: u32, geometry: EraseGeometry) -> Result<Self> {
        geometry.validate()?;
        let path = path.as_ref();
        if capacity == 0 {
            return Err(Error::invalid_input("flash image capacity must not be zero"));
        }
        if capacity % geometry.sector_size != 0 {
            return Err(Error::invalid_input(format!(
                "flash image capacity 0x{:X} is not a multiple of the sector size 0x{:X}",
                capacity, geometry.sector_size
            )));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(u64::from(capacity))?;

        tracing::info!(
            "Creating flash image {} (0x{:X} bytes)",
            path.display(),
            capacity
        );
        let mut image = Self::map(path, file, geometry)?;
        image.map.fill(ERASED_BYTE);
        image.flush()?;
        Ok(image)
    }

    fn map(path: &Path, file: File, geometry: EraseGeometry) -> Result<Self> {
        // SAFETY: the image is owned by this process for the lifetime of the
        // mapping; concurrent modification by other processes is not supported.
        let map = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self {
            path: path.to_path_buf(),
            map,
            geometry,
            _file: file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 把映射区域的修改写回文件
    pub fn flush(&self) -> Result<()> {
        self.map.flush()?;
        Ok(())
    }

    fn erase_unit(&mut self, granularity: Granularity, address: u32) -> Result<()> {
        let range = check_erase(&self.geometry, self.capacity(), granularity, address)?;
        tracing::trace!("image flash: {} erase at 0x{:08X}", granularity, address);
        self.map[range].fill(ERASED_BYTE);
        Ok(())
    }
}

impl EraseDriver for ImageFlash {
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

impl FlashDevice for ImageFlash {
    fn capacity(&self) -> u64 {
        self.map.len() as u64
    }

    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<()> {
        let range = check_range(address, buf.len() as u64, self.capacity())?;
        buf.copy_from_slice(&self.map[range]);
        Ok(())
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Result<()> {
        let range = check_range(address, data.len() as u64, self.capacity())?;
        program(&mut self.map[range], data);
        Ok(())
    }

    fn erase_geometry(&self) -> Option<&EraseGeometry> {
        Some(&self.geometry)
    }
}
