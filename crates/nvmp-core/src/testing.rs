//! Stub driver for unit tests

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use std::sync::{Mutex, MutexGuard};

use crate::backend::{BackendFeatures, StorageDriver, StorageKind};
use crate::error::BackendFailure;

#[derive(Debug, Default)]
struct State {
    data: Vec<u8>,
    not_ready: bool,
    reads: usize,
    writes: usize,
    erases: usize,
    fail_write_on: usize,
}

/// Shared view of a stub driver's memory and call counters
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<State>>);

impl CallLog {
    fn state(&self) -> MutexGuard<'_, State> {
        self.0.lock().unwrap()
    }

    pub fn set_ready(&self, ready: bool) {
        self.state().not_ready = !ready;
    }

    /// Make the `n`th write call (1-based) fail
    pub fn fail_write_on(&self, n: usize) {
        self.state().fail_write_on = n;
    }

    pub fn reads(&self) -> usize {
        self.state().reads
    }

    pub fn writes(&self) -> usize {
        self.state().writes
    }

    pub fn erases(&self) -> usize {
        self.state().erases
    }

    pub fn total(&self) -> usize {
        let s = self.state();
        s.reads + s.writes + s.erases
    }

    pub fn snapshot(&self) -> Vec<u8> {
        self.state().data.clone()
    }
}

/// Byte-array driver; flash stubs erase natively to 0xFF
pub struct StubDriver {
    kind: StorageKind,
    log: CallLog,
}

impl StubDriver {
    pub fn new(kind: StorageKind, size: usize, log: CallLog) -> Self {
        log.state().data = vec![0u8; size];
        Self { kind, log }
    }

    fn check(
        data: &[u8],
        addr: u32,
        len: usize,
    ) -> Result<core::ops::Range<usize>, BackendFailure> {
        let start = addr as usize;
        let end = start + len;
        if end > data.len() {
            return Err(BackendFailure::OutOfRange { addr });
        }
        Ok(start..end)
    }
}

impl StorageDriver for StubDriver {
    fn kind(&self) -> StorageKind {
        self.kind
    }

    fn features(&self) -> BackendFeatures {
        match self.kind {
            StorageKind::Flash => BackendFeatures::NATIVE_ERASE,
            _ => BackendFeatures::empty(),
        }
    }

    fn is_ready(&self) -> bool {
        !self.log.state().not_ready
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), BackendFailure> {
        let mut s = self.log.state();
        s.reads += 1;
        let range = Self::check(&s.data, addr, buf.len())?;
        buf.copy_from_slice(&s.data[range]);
        Ok(())
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), BackendFailure> {
        let mut s = self.log.state();
        s.writes += 1;
        if s.fail_write_on != 0 && s.writes == s.fail_write_on {
            return Err(BackendFailure::WriteFailed { addr });
        }
        let range = Self::check(&s.data, addr, data.len())?;
        s.data[range].copy_from_slice(data);
        Ok(())
    }

    fn erase(&mut self, addr: u32, len: u32) -> Result<(), BackendFailure> {
        let mut s = self.log.state();
        s.erases += 1;
        let range = Self::check(&s.data, addr, len as usize)?;
        s.data[range].fill(0xFF);
        Ok(())
    }
}
