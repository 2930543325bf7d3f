//! 擦除粒度与 Flash 几何参数
//!
//! NOR Flash 提供三种固定粒度的擦除指令。各粒度的大小在这里集中定义，
//! 规划算法只通过 [`EraseGeometry`] 访问它们。

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};

/// 擦除粒度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter)]
pub enum Granularity {
    /// 4 KiB 扇区擦除
    #[strum(serialize = "sector")]
    Sector,
    /// 32 KiB 块擦除
    #[strum(serialize = "block32")]
    Block32,
    /// 64 KiB 块擦除
    #[strum(serialize = "block64")]
    Block64,
}

/// 规范化长度小于 64 KiB 时的擦除策略
///
/// `SectorsOnly` 与 EasyFlash 移植层的行为一致；默认的 `Coarsest` 步数更少。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum ShortRangePolicy {
    /// 区间内完整且对齐的 32 KiB 片段使用块擦除，其余使用扇区擦除
    #[default]
    #[cfg_attr(feature = "cli", clap(name = "coarsest"))]
    Coarsest,
    /// 全部使用扇区擦除
    #[cfg_attr(feature = "cli", clap(name = "sectors_only"))]
    SectorsOnly,
}

/// Flash 擦除几何参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EraseGeometry {
    pub sector_size: u32,
    pub block32_size: u32,
    pub block64_size: u32,
    pub short_range: ShortRangePolicy,
}

impl EraseGeometry {
    pub const SECTOR_SIZE: u32 = 0x1000;
    pub const BLOCK32_SIZE: u32 = 0x8000;
    pub const BLOCK64_SIZE: u32 = 0x10000;

    /// 使用指定的粒度大小创建几何参数，并检查其有效性
    pub fn new(sector_size: u32, block32_size: u32, block64_size: u32) -> Result<Self> {
        let geometry = Self {
            sector_size,
            block32_size,
            block64_size,
            short_range: ShortRangePolicy::default(),
        };
        geometry.validate()?;
        Ok(geometry)
    }

    pub fn with_short_range(mut self, policy: ShortRangePolicy) -> Self {
        self.short_range = policy;
        self
    }

    /// 每种粒度的大小必须是 2 的幂，且严格递增
    pub fn validate(&self) -> Result<()> {
        for (name, size) in [
            ("sector", self.sector_size),
            ("block32", self.block32_size),
            ("block64", self.block64_size),
        ] {
            if !size.is_power_of_two() {
                return Err(Error::config(format!(
                    "{} size 0x{:X} is not a power of two",
                    name, size
                )));
            }
        }

        if !(self.sector_size < self.block32_size && self.block32_size < self.block64_size) {
            return Err(Error::config(format!(
                "erase sizes must increase: sector 0x{:X}, block32 0x{:X}, block64 0x{:X}",
                self.sector_size, self.block32_size, self.block64_size
            )));
        }

        Ok(())
    }

    pub fn size_of(&self, granularity: Granularity) -> u32 {
        match granularity {
            Granularity::Sector => self.sector_size,
            Granularity::Block32 => self.block32_size,
            Granularity::Block64 => self.block64_size,
        }
    }

    pub fn is_aligned(&self, granularity: Granularity, address: u32) -> bool {
        address % self.size_of(granularity) == 0
    }

    /// 三种擦除单元大小是否相同（忽略短区间策略）
    pub fn same_sizes(&self, other: &EraseGeometry) -> bool {
        Granularity::iter().all(|g| self.size_of(g) == other.size_of(g))
    }

    pub fn describe(&self) -> String {
        format!(
            "0x{:X}/0x{:X}/0x{:X}",
            self.sector_size, self.block32_size, self.block64_size
        )
    }
}

impl Default for EraseGeometry {
    fn default() -> Self {
        Self {
            sector_size: Self::SECTOR_SIZE,
            block32_size: Self::BLOCK32_SIZE,
            block64_size: Self::BLOCK64_SIZE,
            short_range: ShortRangePolicy::default(),
        }
    }
}
