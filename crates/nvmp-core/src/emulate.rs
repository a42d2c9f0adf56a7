//! Erase emulation
//!
//! EEPROM and retained memory have no erase primitive. Erasing them means
//! writing a fill value over the range, a bounded chunk at a time, through
//! the backend's ordinary write path.

use crate::backend::Backend;
use crate::error::{ConfigError, Error, Result};

/// Size of the stack buffer used for emulated erase
pub const MAX_ERASE_CHUNK: usize = 256;

/// Default number of bytes written per emulated erase step
pub const DEFAULT_ERASE_CHUNK: usize = 64;

/// Default fill value, matching the erased state of NOR flash
pub const DEFAULT_ERASE_VALUE: u8 = 0xFF;

/// Erase emulation settings shared by all emulated backends of a registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EraseSettings {
    /// Byte written over erased ranges
    pub value: u8,
    /// Bytes per write call, `1..=MAX_ERASE_CHUNK`
    pub chunk_size: usize,
    /// Whether EEPROM backends may emulate erase
    pub eeprom: bool,
}

impl Default for EraseSettings {
    fn default() -> Self {
        Self {
            value: DEFAULT_ERASE_VALUE,
            chunk_size: DEFAULT_ERASE_CHUNK,
            eeprom: true,
        }
    }
}

impl EraseSettings {
    /// Check the chunk size fits the erase buffer
    pub fn validate(&self) -> core::result::Result<(), ConfigError> {
        if self.chunk_size == 0 || self.chunk_size > MAX_ERASE_CHUNK {
            return Err(ConfigError::InvalidChunkSize(self.chunk_size));
        }
        Ok(())
    }
}

/// Erase `len` bytes at absolute offset `addr` by writing `fill`
///
/// Writes go out in chunks of at most `chunk_size` bytes. The first failing
/// write aborts the erase and its error is returned; chunks written before it
/// stay written. A zero-length erase performs no write.
pub fn emulate_erase(
    backend: &mut Backend,
    addr: u32,
    len: u32,
    fill: u8,
    chunk_size: usize,
) -> Result<()> {
    if len == 0 {
        return Ok(());
    }
    if chunk_size == 0 || chunk_size > MAX_ERASE_CHUNK {
        return Err(Error::InvalidArgument);
    }

    let buf = [fill; MAX_ERASE_CHUNK];
    let mut addr = addr;
    let mut remaining = len as usize;

    while remaining != 0 {
        let n = core::cmp::min(remaining, chunk_size);
        if let Err(e) = backend.write(addr, &buf[..n]) {
            log::warn!(
                "emulated erase stopped at 0x{:x}, {} byte left unerased: {}",
                addr,
                remaining,
                e
            );
            return Err(e);
        }
        remaining -= n;
        addr += n as u32;
    }

    Ok(())
}
