//! 参考 Flash 设备实现
//!
//! `MemoryFlash` 把 Flash 内容保存在内存中，`ImageFlash` 把 Flash 镜像文件
//! 映射到内存。两者遵循相同的 NOR 语义：擦除后读出 `0xFF`，编程只能清除位。

pub mod image;
pub mod memory;

pub use image::ImageFlash;
pub use memory::MemoryFlash;

use crate::geometry::{EraseGeometry, Granularity};
use crate::{Error, Result};

/// 擦除后的字节值
pub const ERASED_BYTE: u8 = 0xFF;

/// 检查 `address..address + len` 是否落在设备容量之内，返回对应的字节区间
pub(crate) fn check_range(address: u32, len: u64, capacity: u64) -> Result<std::ops::Range<usize>> {
    let end = u64::from(address) + len;
    if end > capacity {
        return Err(Error::OutOfRange {
            address,
            len,
            capacity,
        });
    }
    Ok(address as usize..end as usize)
}

/// 检查擦除地址的对齐和范围
pub(crate) fn check_erase(
    geometry: &EraseGeometry,
    capacity: u64,
    granularity: Granularity,
    address: u32,
) -> Result<std::ops::Range<usize>> {
    let size = geometry.size_of(granularity);
    if !geometry.is_aligned(granularity, address) {
        return Err(Error::Misaligned {
            granularity,
            address,
            size,
        });
    }
    check_range(address, u64::from(size), capacity)
}

/// NOR 编程：新数据只能把 1 改为 0
pub(crate) fn program(dst: &mut [u8], data: &[u8]) {
    for (cell, byte) in dst.iter_mut().zip(data) {
        *cell &= *byte;
    }
}
