use crate::{Error, EraseRegionFile, Result};

pub struct Utils;
impl Utils {
    pub fn str_to_u32(s: &str) -> Result<u32> {
        let s = s.trim();

        let (num_str, multiplier) = match s.chars().last() {
            Some('k') | Some('K') => (&s[..s.len() - 1], 1_000u32),
            Some('m') | Some('M') => (&s[..s.len() - 1], 1_000_000u32),
            Some('g') | Some('G') => (&s[..s.len() - 1], 1_000_000_000u32),
            _ => (s, 1),
        };

        let unsigned: u32 = if let Some(hex) = num_str.strip_prefix("0x") {
            u32::from_str_radix(hex, 16)?
        } else if let Some(bin) = num_str.strip_prefix("0b") {
            u32::from_str_radix(bin, 2)?
        } else if let Some(oct) = num_str.strip_prefix("0o") {
            u32::from_str_radix(oct, 8)?
        } else {
            num_str.parse()?
        };

        unsigned
            .checked_mul(multiplier)
            .ok_or_else(|| Error::invalid_input(format!("'{}' does not fit in 32 bits", s)))
    }

    /// 解析区域参数 (address:size格式)
    pub fn parse_erase_region(region_spec: &str) -> Result<EraseRegionFile> {
        let Some((addr_str, size_str)) = region_spec.split_once(':') else {
            return Err(Error::invalid_input(format!(
                "Invalid region format: {}. Expected: address:size",
                region_spec
            )));
        };

        let address = Utils::str_to_u32(addr_str)
            .map_err(|e| Error::invalid_input(format!("Invalid address '{}': {}", addr_str, e)))?;
        let size = Utils::str_to_u32(size_str)
            .map_err(|e| Error::invalid_input(format!("Invalid size '{}': {}", size_str, e)))?;

        if size == 0 {
            return Err(Error::invalid_input(format!(
                "Invalid region {}: size must not be zero",
                region_spec
            )));
        }

        Ok(EraseRegionFile { address, size })
    }
}
