//! Erase range planning.
//!
//! A request is first normalized onto sector boundaries and then split into
//! aligned erase steps, preferring the coarsest granularity the alignment
//! allows.

use crate::geometry::{EraseGeometry, Granularity, ShortRangePolicy};
use crate::{Error, Result};
use std::fmt;

/// One past the highest addressable byte.
const ADDRESS_SPACE_END: u64 = 1 << 32;

/// A caller's erase request. Neither field needs to be aligned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EraseRequest {
    pub address: u32,
    pub length: u32,
}

impl EraseRequest {
    pub fn new(address: u32, length: u32) -> Self {
        Self { address, length }
    }

    pub fn normalize(&self, geometry: &EraseGeometry) -> Result<NormalizedRange> {
        normalize(self.address, u64::from(self.length), geometry.sector_size)
    }
}

/// Sector aligned range covering a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizedRange {
    pub start: u32,
    pub length: u64,
}

impl NormalizedRange {
    /// Exclusive end address.
    pub fn end(&self) -> u64 {
        u64::from(self.start) + self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

/// Rounds `address` down and `address + length` up to `sector_size`.
///
/// A zero length stays zero. The rounded end may reach but not pass the end
/// of the 32-bit address space.
pub fn normalize(address: u32, length: u64, sector_size: u32) -> Result<NormalizedRange> {
    if !sector_size.is_power_of_two() {
        return Err(Error::invalid_input(format!(
            "sector size 0x{:X} is not a power of two",
            sector_size
        )));
    }
    let sector = u64::from(sector_size);
    let start = address - address % sector_size;
    if length == 0 {
        return Ok(NormalizedRange { start, length: 0 });
    }

    let end = u64::from(address) + length;
    let end = end.div_ceil(sector) * sector;
    if end > ADDRESS_SPACE_END {
        return Err(Error::invalid_input(format!(
            "erase range 0x{:08X}+0x{:X} exceeds the 32-bit address space",
            address, length
        )));
    }

    Ok(NormalizedRange {
        start,
        length: end - u64::from(start),
    })
}

/// A single aligned erase operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EraseStep {
    pub granularity: Granularity,
    pub address: u32,
    pub size: u32,
}

impl EraseStep {
    pub fn end(&self) -> u64 {
        u64::from(self.address) + u64::from(self.size)
    }
}

impl fmt::Display for EraseStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<7} 0x{:08X}..0x{:08X}",
            self.granularity,
            self.address,
            self.end()
        )
    }
}

/// Ordered, contiguous list of erase steps covering a normalized range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErasePlan {
    range: NormalizedRange,
    steps: Vec<EraseStep>,
}

impl ErasePlan {
    /// Normalizes `request` and decomposes it into erase steps.
    pub fn build(request: EraseRequest, geometry: &EraseGeometry) -> Result<Self> {
        geometry.validate()?;
        let range = request.normalize(geometry)?;
        let mut builder = PlanBuilder::new(range, geometry);

        let sector = u64::from(geometry.sector_size);
        let block32 = u64::from(geometry.block32_size);
        let block64 = u64::from(geometry.block64_size);

        if range.is_empty() {
            return Ok(builder.finish());
        }

        if range.length == sector {
            builder.repeat(Granularity::Sector, 1);
            return Ok(builder.finish());
        }

        if range.length < block64 {
            match geometry.short_range {
                ShortRangePolicy::SectorsOnly => {
                    builder.repeat(Granularity::Sector, range.length / sector);
                }
                ShortRangePolicy::Coarsest => builder.fill_short(),
            }
            return Ok(builder.finish());
        }

        // Ramp up to the next 64K boundary so the bulk can use block64.
        let misalignment = builder.cursor % block64;
        if misalignment != 0 {
            let distance = block64 - misalignment;
            if distance >= block32 {
                builder.repeat(Granularity::Sector, (distance - block32) / sector);
                builder.repeat(Granularity::Block32, 1);
            } else {
                builder.repeat(Granularity::Sector, distance / sector);
            }
        }

        let remaining = builder.remaining();
        builder.repeat(Granularity::Block64, remaining / block64);
        builder.repeat(Granularity::Block32, (remaining % block64) / block32);
        builder.repeat(Granularity::Sector, (remaining % block32) / sector);

        Ok(builder.finish())
    }

    pub fn range(&self) -> NormalizedRange {
        self.range
    }

    pub fn steps(&self) -> &[EraseStep] {
        &self.steps
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EraseStep> {
        self.steps.iter()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Total number of bytes the plan erases.
    pub fn total_bytes(&self) -> u64 {
        self.steps.iter().map(|step| u64::from(step.size)).sum()
    }

    /// Number of steps using `granularity`.
    pub fn count(&self, granularity: Granularity) -> usize {
        self.steps
            .iter()
            .filter(|step| step.granularity == granularity)
            .count()
    }
}

impl<'a> IntoIterator for &'a ErasePlan {
    type Item = &'a EraseStep;
    type IntoIter = std::slice::Iter<'a, EraseStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

struct PlanBuilder<'g> {
    geometry: &'g EraseGeometry,
    range: NormalizedRange,
    cursor: u64,
    steps: Vec<EraseStep>,
}

impl<'g> PlanBuilder<'g> {
    fn new(range: NormalizedRange, geometry: &'g EraseGeometry) -> Self {
        Self {
            geometry,
            range,
            cursor: u64::from(range.start),
            steps: Vec::new(),
        }
    }

    fn remaining(&self) -> u64 {
        self.range.end() - self.cursor
    }

    fn push(&mut self, granularity: Granularity) {
        let size = self.geometry.size_of(granularity);
        debug_assert!(self.cursor % u64::from(size) == 0);
        debug_assert!(self.cursor + u64::from(size) <= self.range.end());
        // cursor stays below the range end, which never passes 2^32
        self.steps.push(EraseStep {
            granularity,
            address: self.cursor as u32,
            size,
        });
        self.cursor += u64::from(size);
    }

    fn repeat(&mut self, granularity: Granularity, count: u64) {
        for _ in 0..count {
            self.push(granularity);
        }
    }

    /// Covers a range shorter than one block64, using block32 wherever an
    /// aligned block32 lies entirely inside the range.
    fn fill_short(&mut self) {
        let block32 = u64::from(self.geometry.block32_size);
        while self.cursor < self.range.end() {
            if self.cursor % block32 == 0 && self.remaining() >= block32 {
                self.push(Granularity::Block32);
            } else {
                self.push(Granularity::Sector);
            }
        }
    }

    fn finish(self) -> ErasePlan {
        debug_assert_eq!(self.cursor, self.range.end());
        ErasePlan {
            range: self.range,
            steps: self.steps,
        }
    }
}
