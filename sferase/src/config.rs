use serde::{Deserialize, Serialize};
use sferase_lib::{EraseGeometry, EraseRegionFile, ShortRangePolicy};

/// 应用程序的默认配置值
pub struct Defaults;

impl Defaults {
    pub const CAPACITY: u32 = 0x100_0000;
    pub const SECTOR_SIZE: u32 = EraseGeometry::SECTOR_SIZE;
    pub const BLOCK32_SIZE: u32 = EraseGeometry::BLOCK32_SIZE;
    pub const BLOCK64_SIZE: u32 = EraseGeometry::BLOCK64_SIZE;
}

/// 十六进制字符串，例如 "0x12000000"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HexString(pub String);

impl HexString {
    pub fn to_u32(&self) -> Result<u32, String> {
        let Some(hex_part) = self.0.strip_prefix("0x") else {
            return Err(format!("Invalid hex string format: {}", self.0));
        };

        u32::from_str_radix(hex_part, 16)
            .map_err(|e| format!("Failed to parse hex string '{}': {}", self.0, e))
    }
}

/// 区域配置（用于规划和擦除区域）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionItemConfig {
    pub address: HexString,
    pub size: HexString,
}

impl RegionItemConfig {
    pub fn to_region(&self) -> Result<EraseRegionFile, String> {
        let address = self
            .address
            .to_u32()
            .map_err(|e| format!("Invalid region address: {}", e))?;
        let size = self
            .size
            .to_u32()
            .map_err(|e| format!("Invalid region size: {}", e))?;
        if size == 0 {
            return Err(format!("Region at {} has zero size", self.address.0));
        }
        Ok(EraseRegionFile { address, size })
    }
}

/// 擦除几何参数配置，未指定的字段使用默认值
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeometryConfig {
    pub sector_size: Option<HexString>,
    pub block32_size: Option<HexString>,
    pub block64_size: Option<HexString>,
    #[serde(default)]
    pub short_range: ShortRangePolicy,
}

/// 规划命令配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanCommandConfig {
    #[serde(default)]
    pub json: bool,
    pub regions: Vec<RegionItemConfig>,
}

/// 擦除区域命令配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EraseRegionCommandConfig {
    #[serde(default)]
    pub verify: bool,
    pub regions: Vec<RegionItemConfig>,
}

/// 擦除整个 Flash 命令配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EraseFlashCommandConfig {
    #[serde(default)]
    pub verify: bool,
}

/// 创建镜像命令配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateImageCommandConfig {}

/// JSON 配置文件的根结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SfEraseConfig {
    pub image: Option<String>,
    pub capacity: Option<HexString>,
    #[serde(default)]
    pub geometry: GeometryConfig,
    #[serde(default)]
    pub quiet: bool,

    // 命令 - 只能存在其中一个
    pub plan: Option<PlanCommandConfig>,
    pub erase_region: Option<EraseRegionCommandConfig>,
    pub erase_flash: Option<EraseFlashCommandConfig>,
    pub create_image: Option<CreateImageCommandConfig>,
}

impl SfEraseConfig {
    /// 从 JSON 文件加载配置
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: SfEraseConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// 创建一个具有所有默认值的配置
    pub fn with_defaults() -> Self {
        Self {
            image: None,
            capacity: None,
            geometry: GeometryConfig::default(),
            quiet: false,
            plan: None,
            erase_region: None,
            erase_flash: None,
            create_image: None,
        }
    }

    pub fn capacity(&self) -> Result<Option<u32>, String> {
        self.capacity
            .as_ref()
            .map(|capacity| {
                capacity
                    .to_u32()
                    .map_err(|e| format!("Invalid capacity: {}", e))
            })
            .transpose()
    }

    /// 把几何参数配置转换为 EraseGeometry（不做有效性检查）
    pub fn geometry(&self) -> Result<EraseGeometry, String> {
        let size = |value: &Option<HexString>, name: &str, default: u32| {
            value
                .as_ref()
                .map(|v| v.to_u32().map_err(|e| format!("Invalid {}: {}", name, e)))
                .unwrap_or(Ok(default))
        };

        Ok(EraseGeometry {
            sector_size: size(&self.geometry.sector_size, "sector_size", Defaults::SECTOR_SIZE)?,
            block32_size: size(
                &self.geometry.block32_size,
                "block32_size",
                Defaults::BLOCK32_SIZE,
            )?,
            block64_size: size(
                &self.geometry.block64_size,
                "block64_size",
                Defaults::BLOCK64_SIZE,
            )?,
            short_range: self.geometry.short_range,
        })
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<(), String> {
        // 检查是否恰好有一个命令
        let command_count = [
            self.plan.is_some(),
            self.erase_region.is_some(),
            self.erase_flash.is_some(),
            self.create_image.is_some(),
        ]
        .iter()
        .filter(|&&x| x)
        .count();

        if command_count != 1 {
            return Err("Configuration must contain exactly one command (plan, erase_region, erase_flash, or create_image)".to_string());
        }

        self.capacity()?;
        self.geometry()?
            .validate()
            .map_err(|e| format!("Invalid geometry: {}", e))?;

        let regions = self
            .plan
            .iter()
            .flat_map(|plan| plan.regions.iter())
            .chain(self.erase_region.iter().flat_map(|erase| erase.regions.iter()));
        for region in regions {
            region.to_region()?;
        }

        let needs_image = self.plan.is_none();
        if needs_image && self.image.is_none() {
            return Err("Configuration must specify an image for this command".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_erase_region_config() {
        let json = r#"{
            "image": "flash.bin",
            "geometry": { "block64_size": "0x10000", "short_range": "sectors_only" },
            "erase_region": {
                "verify": true,
                "regions": [{ "address": "0x1000", "size": "0x2000" }]
            }
        }"#;
        let config: SfEraseConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());

        let geometry = config.geometry().unwrap();
        assert_eq!(geometry.sector_size, 0x1000);
        assert_eq!(geometry.short_range, ShortRangePolicy::SectorsOnly);

        let erase = config.erase_region.unwrap();
        assert!(erase.verify);
        assert_eq!(
            erase.regions[0].to_region().unwrap(),
            EraseRegionFile {
                address: 0x1000,
                size: 0x2000
            }
        );
    }

    #[test]
    fn reject_invalid_configs() {
        let no_command: SfEraseConfig = serde_json::from_str(r#"{ "image": "a.bin" }"#).unwrap();
        assert!(no_command.validate().is_err());

        let two_commands: SfEraseConfig = serde_json::from_str(
            r#"{ "image": "a.bin", "erase_flash": {}, "create_image": {} }"#,
        )
        .unwrap();
        assert!(two_commands.validate().is_err());

        let bad_hex: SfEraseConfig = serde_json::from_str(
            r#"{ "plan": { "regions": [{ "address": "1000", "size": "0x10" }] } }"#,
        )
        .unwrap();
        assert!(bad_hex.validate().is_err());

        let missing_image: SfEraseConfig =
            serde_json::from_str(r#"{ "erase_flash": { "verify": true } }"#).unwrap();
        assert!(missing_image.validate().is_err());

        let bad_geometry: SfEraseConfig = serde_json::from_str(
            r#"{ "geometry": { "sector_size": "0x3000" }, "plan": { "regions": [] } }"#,
        )
        .unwrap();
        assert!(bad_geometry.validate().is_err());
    }

    #[test]
    fn hex_string_parsing() {
        assert_eq!(HexString("0x12000000".into()).to_u32().unwrap(), 0x1200_0000);
        assert!(HexString("12000000".into()).to_u32().is_err());
        assert!(HexString("0xZZ".into()).to_u32().is_err());
    }
}
