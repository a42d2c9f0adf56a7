//! Storage backends
//!
//! A [`Backend`] wraps a [`StorageDriver`] (the primitive read/write/erase
//! implementation for one physical device) together with the device kind and
//! the erase strategy chosen for it when it was constructed.

use alloc::boxed::Box;
use bitflags::bitflags;

use crate::emulate::{self, EraseSettings};
use crate::error::{BackendFailure, Error, Result};

/// Kind of storage medium behind a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "std", derive(serde::Deserialize))]
#[cfg_attr(feature = "std", serde(rename_all = "snake_case"))]
pub enum StorageKind {
    /// Block-erasable flash
    Flash,
    /// Byte-addressable EEPROM
    Eeprom,
    /// Retained (battery or power-domain backed) RAM
    #[cfg_attr(feature = "std", serde(alias = "retained"))]
    RetainedMemory,
    /// Unknown or absent
    Unknown,
}

impl StorageKind {
    /// Short lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flash => "flash",
            Self::Eeprom => "eeprom",
            Self::RetainedMemory => "retained",
            Self::Unknown => "unknown",
        }
    }
}

impl core::fmt::Display for StorageKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags! {
    /// Capabilities advertised by a storage driver
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BackendFeatures: u32 {
        /// Driver implements an erase primitive
        const NATIVE_ERASE      = 1 << 0;
        /// Programming can only clear bits; the range must be erased first
        const WRITE_NEEDS_ERASE = 1 << 1;
    }
}

impl Default for BackendFeatures {
    fn default() -> Self {
        BackendFeatures::empty()
    }
}

/// Primitive operations of a physical storage device
///
/// Addresses are absolute device offsets. Implementations do not need to
/// check item bounds or permissions, the dispatcher does that before calling
/// in, but they must reject accesses beyond the physical device.
///
/// Drivers are `Send + Sync` so a registry can be moved behind a lock or
/// shared by reference between threads.
pub trait StorageDriver: Send + Sync {
    /// Kind of medium this driver talks to
    fn kind(&self) -> StorageKind;

    /// Capabilities of this driver
    fn features(&self) -> BackendFeatures;

    /// Whether the device can currently accept requests
    fn is_ready(&self) -> bool {
        true
    }

    /// Read `buf.len()` bytes starting at `addr`
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> core::result::Result<(), BackendFailure>;

    /// Write `data` starting at `addr`
    ///
    /// Must not erase implicitly.
    fn write(&mut self, addr: u32, data: &[u8]) -> core::result::Result<(), BackendFailure>;

    /// Erase `len` bytes starting at `addr`
    ///
    /// Only called when [`BackendFeatures::NATIVE_ERASE`] is advertised.
    fn erase(&mut self, addr: u32, len: u32) -> core::result::Result<(), BackendFailure> {
        let _ = (addr, len);
        Err(BackendFailure::NotSupported)
    }
}

/// How a backend services erase requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseStrategy {
    /// Call the driver's erase primitive
    Native,
    /// Write the fill value in chunks
    Emulated(EraseSettings),
    /// Erase is rejected with [`Error::Unsupported`]
    Unsupported,
}

impl EraseStrategy {
    /// Pick the strategy for a driver of `kind` with `features`
    ///
    /// A native erase primitive always wins. Otherwise retained memory is
    /// always emulated, EEPROM is emulated only when `settings.eeprom` is set,
    /// and flash or unknown media cannot erase at all.
    pub fn select(kind: StorageKind, features: BackendFeatures, settings: EraseSettings) -> Self {
        if features.contains(BackendFeatures::NATIVE_ERASE) {
            return Self::Native;
        }

        match kind {
            StorageKind::RetainedMemory => Self::Emulated(settings),
            StorageKind::Eeprom if settings.eeprom => Self::Emulated(settings),
            StorageKind::Eeprom | StorageKind::Flash | StorageKind::Unknown => Self::Unsupported,
        }
    }
}

/// A physical storage endpoint owned by a root item
pub struct Backend {
    kind: StorageKind,
    features: BackendFeatures,
    erase: EraseStrategy,
    driver: Box<dyn StorageDriver>,
}

impl Backend {
    /// Wrap a driver, selecting its erase strategy from `settings`
    pub fn new(driver: Box<dyn StorageDriver>, settings: EraseSettings) -> Self {
        let kind = driver.kind();
        let features = driver.features();
        let erase = EraseStrategy::select(kind, features, settings);
        log::debug!("{} backend, features {:?}, erase {:?}", kind, features, erase);
        Self {
            kind,
            features,
            erase,
            driver,
        }
    }

    /// Kind of the underlying medium
    pub fn kind(&self) -> StorageKind {
        self.kind
    }

    /// Features reported by the driver at construction
    pub fn features(&self) -> BackendFeatures {
        self.features
    }

    /// Erase strategy chosen at construction
    pub fn erase_strategy(&self) -> EraseStrategy {
        self.erase
    }

    /// Whether the driver currently reports ready
    pub fn is_ready(&self) -> bool {
        self.driver.is_ready()
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.driver.is_ready() {
            Ok(())
        } else {
            Err(Error::DeviceUnavailable)
        }
    }

    /// Read primitive at an absolute device offset
    pub fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        self.ensure_ready()?;
        log::debug!("read {} byte at 0x{:x}", buf.len(), addr);
        self.driver.read(addr, buf).map_err(Error::from)
    }

    /// Write primitive at an absolute device offset
    pub fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        self.ensure_ready()?;
        log::debug!("write {} byte at 0x{:x}", data.len(), addr);
        self.driver.write(addr, data).map_err(Error::from)
    }

    /// Erase at an absolute device offset using the selected strategy
    pub fn erase(&mut self, addr: u32, len: u32) -> Result<()> {
        match self.erase {
            EraseStrategy::Native => {
                self.ensure_ready()?;
                log::debug!("erase {} byte at 0x{:x}", len, addr);
                self.driver.erase(addr, len).map_err(Error::from)
            }
            EraseStrategy::Emulated(settings) => {
                log::debug!("emulated erase {} byte at 0x{:x}", len, addr);
                emulate::emulate_erase(self, addr, len, settings.value, settings.chunk_size)
            }
            EraseStrategy::Unsupported => Err(Error::Unsupported),
        }
    }
}

impl core::fmt::Debug for Backend {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Backend")
            .field("kind", &self.kind)
            .field("features", &self.features)
            .field("erase", &self.erase)
            .finish_non_exhaustive()
    }
}
