//! Board loading
//!
//! A board is a configuration file plus one simulated device per `[[device]]`
//! entry. Devices with an `image` are loaded from that file and written back
//! by [`Board::save`].

use nvmp_core::config::{Config, DeviceDesc};
use nvmp_core::{ConfigError, ItemId, Registry, StorageDriver, StorageKind};
use nvmp_sim::{Medium, SimConfig, SimDevice, SimError, SimHandle};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors opening a board
#[derive(Debug, Error)]
pub enum BoardError {
    /// The configuration could not be loaded or describes an invalid tree
    #[error("{path}: {source}")]
    Config {
        /// Configuration path
        path: String,
        /// What went wrong
        source: ConfigError,
    },

    /// A device image could not be loaded or saved
    #[error(transparent)]
    Image(#[from] SimError),

    /// No item with the given name
    #[error("no device or partition named '{0}'")]
    UnknownItem(String),
}

/// A simulated device and where its contents live
struct DeviceImage {
    name: String,
    path: Option<PathBuf>,
    handle: SimHandle,
}

/// A loaded board
pub struct Board {
    /// Parsed configuration
    pub config: Config,
    /// Registry over the board's devices
    pub registry: Registry,
    images: Vec<DeviceImage>,
}

impl Board {
    /// Load the configuration at `path` and open every device
    pub fn open(path: &Path) -> Result<Self, BoardError> {
        let config_error = |source| BoardError::Config {
            path: path.display().to_string(),
            source,
        };
        let config = Config::from_toml_file(path).map_err(config_error)?;

        let mut images = Vec::new();
        let mut image_error = None;
        let registry = config.build_registry(|desc| match open_device(&config, desc) {
            Ok(device) => {
                images.push(DeviceImage {
                    name: desc.name.clone(),
                    path: config.image_path(desc),
                    handle: device.handle(),
                });
                Ok(Box::new(device) as Box<dyn StorageDriver>)
            }
            Err(e) => {
                image_error = Some(e);
                Err(ConfigError::DriverUnavailable)
            }
        });

        let registry = match (registry, image_error) {
            (Ok(registry), _) => registry,
            (Err(_), Some(e)) => return Err(e.into()),
            (Err(e), None) => return Err(config_error(e)),
        };
        log::debug!(
            "loaded {} with {} item(s)",
            path.display(),
            registry.len()
        );

        Ok(Self {
            config,
            registry,
            images,
        })
    }

    /// Look up an item by name
    pub fn find(&self, name: &str) -> Result<ItemId, BoardError> {
        self.registry
            .find(name)
            .ok_or_else(|| BoardError::UnknownItem(name.to_string()))
    }

    /// Image file backing a device, if any
    pub fn image_path(&self, device: &str) -> Option<&Path> {
        self.images
            .iter()
            .find(|image| image.name == device)
            .and_then(|image| image.path.as_deref())
    }

    /// Write every image-backed device back to its file
    pub fn save(&self) -> Result<(), BoardError> {
        for image in &self.images {
            match &image.path {
                Some(path) => image.handle.save_image(path)?,
                None => log::debug!("{} has no image, changes are discarded", image.name),
            }
        }
        Ok(())
    }
}

fn open_device(config: &Config, desc: &DeviceDesc) -> Result<SimDevice, SimError> {
    let size = desc.size as usize;
    let mut sim = match Medium::from(desc.kind) {
        Medium::Flash => SimConfig::flash(size),
        Medium::Eeprom => SimConfig::eeprom(size),
        Medium::RetainedMem => SimConfig::retained(size),
    };
    if desc.kind == StorageKind::Unknown {
        log::warn!("{}: unknown storage kind, simulating flash", desc.name);
    }
    if let Some(sector_size) = desc.sector_size {
        sim = sim.with_sector_size(sector_size as usize);
    }

    match config.image_path(desc) {
        Some(path) => SimDevice::from_image(sim, &path),
        None => Ok(SimDevice::new(sim)),
    }
}
