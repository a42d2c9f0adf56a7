//! nvmp-sim - In-memory storage devices for testing
//!
//! This crate provides simulated flash, EEPROM and retained RAM devices that
//! implement [`StorageDriver`]. It's useful for tests and for running the CLI
//! against image files without real hardware.
//!
//! Each [`SimDevice`] hands out a [`SimHandle`] that stays usable after the
//! device has been moved into a registry. The handle can take the device
//! offline, make a chosen write call fail, count primitive calls and copy
//! out the contents.

mod error;

pub use error::{Result, SimError};

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use nvmp_core::{BackendFailure, BackendFeatures, StorageDriver, StorageKind};

/// Default flash sector size for erase
pub const DEFAULT_SECTOR_SIZE: usize = 4096;

/// Storage medium to simulate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Medium {
    /// NOR flash: programming clears bits, erase sets whole sectors to 0xFF
    Flash,
    /// EEPROM: bytes are overwritten, no erase primitive
    Eeprom,
    /// Retained RAM: bytes are overwritten, no erase primitive
    RetainedMem,
}

impl Medium {
    /// Storage kind reported to the core
    pub fn kind(&self) -> StorageKind {
        match self {
            Self::Flash => StorageKind::Flash,
            Self::Eeprom => StorageKind::Eeprom,
            Self::RetainedMem => StorageKind::RetainedMemory,
        }
    }

    /// Contents of a fresh device
    pub fn blank_value(&self) -> u8 {
        match self {
            Self::Flash | Self::Eeprom => 0xFF,
            Self::RetainedMem => 0x00,
        }
    }
}

impl From<StorageKind> for Medium {
    fn from(kind: StorageKind) -> Self {
        match kind {
            StorageKind::Flash | StorageKind::Unknown => Self::Flash,
            StorageKind::Eeprom => Self::Eeprom,
            StorageKind::RetainedMemory => Self::RetainedMem,
        }
    }
}

/// Configuration for a simulated device
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Medium to simulate
    pub medium: Medium,
    /// Device size in bytes
    pub size: usize,
    /// Erase granularity (flash only)
    pub sector_size: usize,
}

impl SimConfig {
    /// Flash with 4 KiB sectors
    pub fn flash(size: usize) -> Self {
        Self {
            medium: Medium::Flash,
            size,
            sector_size: DEFAULT_SECTOR_SIZE,
        }
    }

    /// EEPROM
    pub fn eeprom(size: usize) -> Self {
        Self {
            medium: Medium::Eeprom,
            size,
            sector_size: 1,
        }
    }

    /// Retained RAM
    pub fn retained(size: usize) -> Self {
        Self {
            medium: Medium::RetainedMem,
            size,
            sector_size: 1,
        }
    }

    /// Override the erase granularity
    pub fn with_sector_size(mut self, sector_size: usize) -> Self {
        self.sector_size = sector_size.max(1);
        self
    }
}

#[derive(Debug)]
struct Shared {
    data: Mutex<Vec<u8>>,
    ready: AtomicBool,
    reads: AtomicUsize,
    writes: AtomicUsize,
    erases: AtomicUsize,
    fail_write_on: AtomicUsize,
}

impl Shared {
    fn data(&self) -> MutexGuard<'_, Vec<u8>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Control and inspection handle for a [`SimDevice`]
#[derive(Debug, Clone)]
pub struct SimHandle {
    shared: Arc<Shared>,
}

impl SimHandle {
    /// Bring the device online or take it offline
    pub fn set_ready(&self, ready: bool) {
        self.shared.ready.store(ready, Ordering::SeqCst);
    }

    /// Make the `n`th write call (counted from device creation, 1-based)
    /// fail; 0 disables injection
    pub fn fail_write_on(&self, n: usize) {
        self.shared.fail_write_on.store(n, Ordering::SeqCst);
    }

    /// Number of read calls so far
    pub fn reads(&self) -> usize {
        self.shared.reads.load(Ordering::SeqCst)
    }

    /// Number of write calls so far, failed ones included
    pub fn writes(&self) -> usize {
        self.shared.writes.load(Ordering::SeqCst)
    }

    /// Number of erase calls so far
    pub fn erases(&self) -> usize {
        self.shared.erases.load(Ordering::SeqCst)
    }

    /// Copy of the device contents
    pub fn snapshot(&self) -> Vec<u8> {
        self.shared.data().clone()
    }

    /// Write the device contents to an image file
    pub fn save_image(&self, path: &Path) -> Result<()> {
        let data = self.snapshot();
        fs::write(path, &data).map_err(|source| SimError::ImageWrite {
            path: path.display().to_string(),
            source,
        })?;
        log::debug!("saved {} bytes to {}", data.len(), path.display());
        Ok(())
    }
}

/// Simulated storage device
#[derive(Debug)]
pub struct SimDevice {
    config: SimConfig,
    shared: Arc<Shared>,
}

impl SimDevice {
    /// Create a blank device
    pub fn new(config: SimConfig) -> Self {
        let data = vec![config.medium.blank_value(); config.size];
        Self {
            config,
            shared: Arc::new(Shared {
                data: Mutex::new(data),
                ready: AtomicBool::new(true),
                reads: AtomicUsize::new(0),
                writes: AtomicUsize::new(0),
                erases: AtomicUsize::new(0),
                fail_write_on: AtomicUsize::new(0),
            }),
        }
    }

    /// Create a device with pre-filled data
    ///
    /// Data beyond the device size is ignored.
    pub fn with_data(config: SimConfig, initial_data: &[u8]) -> Self {
        let device = Self::new(config);
        {
            let mut data = device.shared.data();
            let len = core::cmp::min(initial_data.len(), data.len());
            data[..len].copy_from_slice(&initial_data[..len]);
        }
        device
    }

    /// Load contents from an image file
    ///
    /// A missing file gives a blank device. A file larger than the device
    /// is rejected; a shorter one is padded with the blank value.
    pub fn from_image(config: SimConfig, path: &Path) -> Result<Self> {
        let image = match fs::read(path) {
            Ok(image) => image,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::info!("{} not found, starting blank", path.display());
                return Ok(Self::new(config));
            }
            Err(source) => {
                return Err(SimError::ImageRead {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        if image.len() > config.size {
            return Err(SimError::ImageTooLarge {
                path: path.display().to_string(),
                len: image.len(),
                size: config.size,
            });
        }
        log::debug!("loaded {} bytes from {}", image.len(), path.display());
        Ok(Self::with_data(config, &image))
    }

    /// Handle for controlling this device after it has been boxed
    pub fn handle(&self) -> SimHandle {
        SimHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    fn range(
        &self,
        addr: u32,
        len: usize,
    ) -> core::result::Result<core::ops::Range<usize>, BackendFailure> {
        let start = addr as usize;
        match start.checked_add(len) {
            Some(end) if end <= self.config.size => Ok(start..end),
            _ => Err(BackendFailure::OutOfRange { addr }),
        }
    }
}

impl StorageDriver for SimDevice {
    fn kind(&self) -> StorageKind {
        self.config.medium.kind()
    }

    fn features(&self) -> BackendFeatures {
        match self.config.medium {
            Medium::Flash => BackendFeatures::NATIVE_ERASE | BackendFeatures::WRITE_NEEDS_ERASE,
            Medium::Eeprom | Medium::RetainedMem => BackendFeatures::empty(),
        }
    }

    fn is_ready(&self) -> bool {
        self.shared.ready.load(Ordering::SeqCst)
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> core::result::Result<(), BackendFailure> {
        self.shared.reads.fetch_add(1, Ordering::SeqCst);
        let range = self.range(addr, buf.len())?;
        buf.copy_from_slice(&self.shared.data()[range]);
        Ok(())
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> core::result::Result<(), BackendFailure> {
        let call = self.shared.writes.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.shared.fail_write_on.load(Ordering::SeqCst) {
            log::debug!("injected failure on write {} at 0x{:x}", call, addr);
            return Err(BackendFailure::WriteFailed { addr });
        }

        let range = self.range(addr, data.len())?;
        let mut mem = self.shared.data();
        match self.config.medium {
            // Flash programming: can only change 1 -> 0
            Medium::Flash => {
                for (cell, &byte) in mem[range].iter_mut().zip(data) {
                    *cell &= byte;
                }
            }
            Medium::Eeprom | Medium::RetainedMem => mem[range].copy_from_slice(data),
        }
        Ok(())
    }

    fn erase(&mut self, addr: u32, len: u32) -> core::result::Result<(), BackendFailure> {
        self.shared.erases.fetch_add(1, Ordering::SeqCst);
        if self.config.medium != Medium::Flash {
            return Err(BackendFailure::NotSupported);
        }

        let sector = self.config.sector_size;
        if (addr as usize) % sector != 0 || (len as usize) % sector != 0 {
            return Err(BackendFailure::InvalidAlignment { addr });
        }

        let range = self.range(addr, len as usize)?;
        self.shared.data()[range].fill(0xFF);
        Ok(())
    }
}
