//! TOML board description
//!
//! Describes devices and the partitions carved out of them:
//!
//! ```toml
//! [erase]
//! value = 0xFF
//! chunk_size = 64
//! eeprom = true
//!
//! [[device]]
//! name = "flash0"
//! kind = "flash"
//! size = "64 KiB"
//! sector_size = "4 KiB"
//! image = "flash0.bin"
//!
//! [[partition]]
//! name = "storage"
//! parent = "flash0"
//! offset = 0x8000
//! size = "16 KiB"
//! ```
//!
//! The core does not know how to open devices; [`Config::build_registry`]
//! asks a caller-supplied factory for the driver of each device.

use std::boxed::Box;
use std::format;
use std::fs;
use std::path::{Path, PathBuf};
use std::string::String;
use std::vec::Vec;

use crate::backend::{StorageDriver, StorageKind};
use crate::emulate::EraseSettings;
use crate::error::ConfigError;
use crate::registry::{Registry, RegistryBuilder};

/// Whole configuration file
#[derive(Debug, serde::Deserialize)]
struct TomlConfigFile {
    erase: Option<TomlErase>,
    #[serde(default)]
    device: Vec<TomlDevice>,
    #[serde(default)]
    partition: Vec<TomlPartition>,
}

#[derive(Debug, serde::Deserialize)]
struct TomlErase {
    #[serde(default, deserialize_with = "deserialize_opt_u8")]
    value: Option<u8>,
    chunk_size: Option<usize>,
    eeprom: Option<bool>,
}

#[derive(Debug, serde::Deserialize)]
struct TomlDevice {
    name: String,
    kind: StorageKind,
    #[serde(deserialize_with = "deserialize_size")]
    size: u32,
    #[serde(default, deserialize_with = "deserialize_opt_size")]
    sector_size: Option<u32>,
    #[serde(default)]
    read_only: bool,
    image: Option<PathBuf>,
}

#[derive(Debug, serde::Deserialize)]
struct TomlPartition {
    name: String,
    parent: String,
    #[serde(deserialize_with = "deserialize_size")]
    offset: u32,
    #[serde(deserialize_with = "deserialize_size")]
    size: u32,
    #[serde(default)]
    read_only: bool,
}

/// Integer or string field
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum NumOrStr {
    Int(u64),
    Str(String),
}

fn deserialize_size<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    match NumOrStr::deserialize(deserializer)? {
        NumOrStr::Int(n) => u32::try_from(n).map_err(serde::de::Error::custom),
        NumOrStr::Str(s) => parse_size(&s).map_err(serde::de::Error::custom),
    }
}

fn deserialize_opt_size<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    deserialize_size(deserializer).map(Some)
}

fn deserialize_opt_u8<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let n = deserialize_size(deserializer)?;
    u8::try_from(n).map(Some).map_err(serde::de::Error::custom)
}

/// Parse a size or offset: decimal, `0x` hex, or with a B/KiB/MiB suffix
pub fn parse_size(s: &str) -> Result<u32, String> {
    let s = s.trim();

    if let Ok(n) = s.parse::<u32>() {
        return Ok(n);
    }

    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u32::from_str_radix(hex.trim(), 16).map_err(|e| format!("invalid hex: {}", e));
    }

    let s_lower = s.to_lowercase();
    let (num_str, multiplier) = if let Some(n) = s_lower.strip_suffix("mib") {
        (n.trim(), 1024 * 1024)
    } else if let Some(n) = s_lower.strip_suffix("kib") {
        (n.trim(), 1024)
    } else if let Some(n) = s_lower.strip_suffix('b') {
        (n.trim(), 1)
    } else {
        return Err(format!("invalid size: {}", s));
    };

    let num: u32 = num_str.parse().map_err(|_| format!("invalid size: {}", s))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size too large: {}", s))
}

/// A device entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDesc {
    /// Item name
    pub name: String,
    /// Medium kind
    pub kind: StorageKind,
    /// Addressable size in bytes
    pub size: u32,
    /// Erase granularity hint for drivers
    pub sector_size: Option<u32>,
    /// Device-level read-only flag
    pub read_only: bool,
    /// Backing image file, relative to the configuration file
    pub image: Option<PathBuf>,
}

/// A partition entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionDesc {
    /// Item name
    pub name: String,
    /// Name of the parent device or partition
    pub parent: String,
    /// Offset within the parent
    pub offset: u32,
    /// Size in bytes
    pub size: u32,
    /// Partition-level read-only flag
    pub read_only: bool,
}

/// Parsed board description
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Config {
    /// Erase emulation settings
    pub erase: EraseSettings,
    /// Devices in file order
    pub devices: Vec<DeviceDesc>,
    /// Partitions in file order
    pub partitions: Vec<PartitionDesc>,
    /// Directory relative image paths are resolved against
    pub base_dir: Option<PathBuf>,
}

impl Config {
    /// Load a configuration from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            log::error!("failed to read {}: {}", path.display(), e);
            ConfigError::IoError
        })?;
        let mut config = Self::from_toml_str(&content)?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Parse a configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: TomlConfigFile = toml::from_str(content).map_err(|e| {
            log::error!("config parse error: {}", e);
            ConfigError::ParseError
        })?;

        let mut erase = EraseSettings::default();
        if let Some(e) = file.erase {
            if let Some(value) = e.value {
                erase.value = value;
            }
            if let Some(chunk_size) = e.chunk_size {
                erase.chunk_size = chunk_size;
            }
            if let Some(eeprom) = e.eeprom {
                erase.eeprom = eeprom;
            }
        }
        erase.validate()?;

        let devices = file
            .device
            .into_iter()
            .map(|d| DeviceDesc {
                name: d.name,
                kind: d.kind,
                size: d.size,
                sector_size: d.sector_size,
                read_only: d.read_only,
                image: d.image,
            })
            .collect();

        let partitions = file
            .partition
            .into_iter()
            .map(|p| PartitionDesc {
                name: p.name,
                parent: p.parent,
                offset: p.offset,
                size: p.size,
                read_only: p.read_only,
            })
            .collect();

        Ok(Self {
            erase,
            devices,
            partitions,
            base_dir: None,
        })
    }

    /// Image path of a device, resolved against the config directory
    pub fn image_path(&self, device: &DeviceDesc) -> Option<PathBuf> {
        let image = device.image.as_ref()?;
        match &self.base_dir {
            Some(dir) if image.is_relative() => Some(dir.join(image)),
            _ => Some(image.clone()),
        }
    }

    /// Build a registry, opening each device through `open`
    ///
    /// Partitions may appear before their parent in the file; they are added
    /// once the parent exists. Whatever is left when no more progress can be
    /// made names a missing parent or is part of a cycle.
    pub fn build_registry<F>(&self, mut open: F) -> Result<Registry, ConfigError>
    where
        F: FnMut(&DeviceDesc) -> Result<Box<dyn StorageDriver>, ConfigError>,
    {
        let mut builder = RegistryBuilder::new(self.erase)?;

        for device in &self.devices {
            let driver = open(device)?;
            builder.add_device(&device.name, driver, device.size, device.read_only)?;
        }

        let mut pending: Vec<&PartitionDesc> = self.partitions.iter().collect();
        while !pending.is_empty() {
            let before = pending.len();
            let mut deferred = Vec::new();

            for part in pending {
                match builder.find(&part.parent) {
                    Some(parent) => {
                        builder.add_partition(
                            &part.name,
                            parent,
                            part.offset,
                            part.size,
                            part.read_only,
                        )?;
                    }
                    None => deferred.push(part),
                }
            }

            if deferred.len() == before {
                return Err(self.unresolved_error(&deferred));
            }
            pending = deferred;
        }

        Ok(builder.build())
    }

    fn unresolved_error(&self, stuck: &[&PartitionDesc]) -> ConfigError {
        let known = |name: &str| {
            self.devices.iter().any(|d| d.name == name)
                || self.partitions.iter().any(|p| p.name == name)
        };
        if stuck.iter().all(|p| known(&p.parent)) {
            ConfigError::ParentCycle
        } else {
            ConfigError::UnknownParent
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CallLog, StubDriver};
    use std::string::ToString;

    const BOARD: &str = r#"
[erase]
value = 0x00
chunk_size = 32

[[device]]
name = "flash0"
kind = "flash"
size = "64 KiB"
sector_size = "4 KiB"
image = "flash0.bin"

[[device]]
name = "eeprom0"
kind = "eeprom"
size = 512
read_only = true

[[device]]
name = "retainedmem0"
kind = "retained"
size = "0x100"

[[partition]]
name = "scratch"
parent = "storage"
offset = 0x1000
size = "4 KiB"

[[partition]]
name = "storage"
parent = "flash0"
offset = 0x8000
size = "16 KiB"
"#;

    fn open_stub(device: &DeviceDesc) -> Result<Box<dyn StorageDriver>, ConfigError> {
        Ok(Box::new(StubDriver::new(
            device.kind,
            device.size as usize,
            CallLog::default(),
        )))
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("4096").unwrap(), 4096);
        assert_eq!(parse_size("0x1000").unwrap(), 4096);
        assert_eq!(parse_size("4 KiB").unwrap(), 4096);
        assert_eq!(parse_size("4kib").unwrap(), 4096);
        assert_eq!(parse_size("16 MiB").unwrap(), 16 * 1024 * 1024);
        assert_eq!(parse_size("12 B").unwrap(), 12);
        assert!(parse_size("lots").is_err());
        assert!(parse_size("8192 MiB").is_err());
    }

    #[test]
    fn test_parse_board() {
        let config = Config::from_toml_str(BOARD).unwrap();
        assert_eq!(config.erase.value, 0x00);
        assert_eq!(config.erase.chunk_size, 32);
        assert!(config.erase.eeprom);

        assert_eq!(config.devices.len(), 3);
        assert_eq!(config.devices[0].kind, StorageKind::Flash);
        assert_eq!(config.devices[0].size, 64 * 1024);
        assert_eq!(config.devices[0].sector_size, Some(4096));
        assert_eq!(config.devices[1].kind, StorageKind::Eeprom);
        assert!(config.devices[1].read_only);
        assert_eq!(config.devices[2].kind, StorageKind::RetainedMemory);
        assert_eq!(config.devices[2].size, 0x100);

        assert_eq!(config.partitions[1].name, "storage");
        assert_eq!(config.partitions[1].offset, 0x8000);
    }

    #[test]
    fn test_build_out_of_order() {
        let config = Config::from_toml_str(BOARD).unwrap();
        let registry = config.build_registry(open_stub).unwrap();

        let scratch = registry.find("scratch").unwrap();
        assert_eq!(registry.device_offset(scratch), Some(0x9000));
        assert_eq!(registry.get_type(scratch), StorageKind::Flash);
        assert_eq!(
            registry.get_type(registry.find("retainedmem0").unwrap()),
            StorageKind::RetainedMemory
        );
    }

    #[test]
    fn test_image_path() {
        let mut config = Config::from_toml_str(BOARD).unwrap();
        config.base_dir = Some(PathBuf::from("/boards/demo"));
        assert_eq!(
            config.image_path(&config.devices[0]),
            Some(PathBuf::from("/boards/demo/flash0.bin"))
        );
        assert_eq!(config.image_path(&config.devices[1]), None);
    }

    #[test]
    fn test_unknown_parent_and_cycle() {
        let missing = r#"
[[device]]
name = "flash0"
kind = "flash"
size = 4096

[[partition]]
name = "a"
parent = "flash1"
offset = 0
size = 16
"#;
        let config = Config::from_toml_str(missing).unwrap();
        assert_eq!(
            config.build_registry(open_stub).unwrap_err(),
            ConfigError::UnknownParent
        );

        let cycle = r#"
[[device]]
name = "flash0"
kind = "flash"
size = 4096

[[partition]]
name = "a"
parent = "b"
offset = 0
size = 16

[[partition]]
name = "b"
parent = "a"
offset = 0
size = 16
"#;
        let config = Config::from_toml_str(cycle).unwrap();
        assert_eq!(
            config.build_registry(open_stub).unwrap_err(),
            ConfigError::ParentCycle
        );
    }

    #[test]
    fn test_rejects_bad_values() {
        let bad_chunk = "[erase]\nchunk_size = 0\n";
        assert_eq!(
            Config::from_toml_str(bad_chunk).unwrap_err(),
            ConfigError::InvalidChunkSize(0)
        );

        let bad_kind = "[[device]]\nname = \"x\"\nkind = \"tape\"\nsize = 1\n";
        assert_eq!(
            Config::from_toml_str(bad_kind).unwrap_err(),
            ConfigError::ParseError
        );

        let overflow = r#"
[[device]]
name = "flash0"
kind = "flash"
size = 4096

[[partition]]
name = "big"
parent = "flash0"
offset = "2 KiB"
size = "4 KiB"
"#;
        let config = Config::from_toml_str(overflow).unwrap();
        assert!(matches!(
            config.build_registry(open_stub).unwrap_err(),
            ConfigError::PartitionOutOfBounds { .. }
        ));
    }

    #[test]
    fn test_driver_failure_propagates() {
        let config = Config::from_toml_str(BOARD).unwrap();
        let err = config
            .build_registry(|_| Err(ConfigError::DriverUnavailable))
            .unwrap_err();
        assert_eq!(err, ConfigError::DriverUnavailable);
        assert_eq!(err.to_string(), "failed to open device driver");
    }
}
