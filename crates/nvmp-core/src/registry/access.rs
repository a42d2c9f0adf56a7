//! Bounds-checked item access
//!
//! Every request is validated against the item before anything reaches a
//! backend: write and erase check the read-only flag first, then every
//! request checks its range.
//! A rejected request never touches the device. Once a backend primitive is
//! called its result is returned as is.

use alloc::vec;
use alloc::vec::Vec;

use super::{ItemId, Registry};
use crate::backend::StorageKind;
use crate::error::{Error, Result};

/// True when `[offset, offset + len)` is not inside `[0, size)`
///
/// `len` is compared first so `size - len` cannot underflow.
fn bounds_error(size: u32, offset: u32, len: u32) -> bool {
    size < len || size - len < offset
}

impl Registry {
    /// Size of an item in bytes, 0 for an absent item
    pub fn get_size(&self, id: ItemId) -> u32 {
        self.item(id).map_or(0, |item| item.size())
    }

    /// Kind of the medium behind an item, `Unknown` for an absent item
    pub fn get_type(&self, id: ItemId) -> StorageKind {
        self.backend_of(id)
            .map_or(StorageKind::Unknown, |backend| backend.kind())
    }

    /// Validate a request and return its length as a device quantity
    fn check_range(&self, id: ItemId, offset: u32, len: usize) -> Result<u32> {
        let item = self.item(id).ok_or(Error::InvalidArgument)?;
        let len = u32::try_from(len).map_err(|_| Error::InvalidArgument)?;
        if bounds_error(item.size(), offset, len) {
            return Err(Error::InvalidArgument);
        }
        Ok(len)
    }

    fn check_writable(&self, id: ItemId) -> Result<()> {
        match self.item(id) {
            Some(item) if item.is_read_only() => Err(Error::PermissionDenied),
            Some(_) => Ok(()),
            None => Err(Error::InvalidArgument),
        }
    }

    /// Read `buf.len()` bytes at `offset` within an item
    pub fn read(&mut self, id: ItemId, offset: u32, buf: &mut [u8]) -> Result<()> {
        self.check_range(id, offset, buf.len())?;
        let target = self.resolve(id).ok_or(Error::InvalidArgument)?;
        self.backends[target.backend.0].read(target.offset + offset, buf)
    }

    /// Write `data` at `offset` within an item
    ///
    /// Flash must have been erased first; nothing is erased implicitly.
    pub fn write(&mut self, id: ItemId, offset: u32, data: &[u8]) -> Result<()> {
        self.check_writable(id)?;
        self.check_range(id, offset, data.len())?;
        let target = self.resolve(id).ok_or(Error::InvalidArgument)?;
        self.backends[target.backend.0].write(target.offset + offset, data)
    }

    /// Erase `len` bytes at `offset` within an item
    ///
    /// Backends without an erase primitive write the configured fill value
    /// instead. That emulation is not atomic: on failure part of the range
    /// may already hold the fill value, and the caller should erase again.
    ///
    /// A valid zero-length erase succeeds without calling the backend.
    pub fn erase(&mut self, id: ItemId, offset: u32, len: u32) -> Result<()> {
        self.check_writable(id)?;
        self.check_range(id, offset, len as usize)?;
        if len == 0 {
            return Ok(());
        }
        let target = self.resolve(id).ok_or(Error::InvalidArgument)?;
        self.backends[target.backend.0].erase(target.offset + offset, len)
    }

    /// Read a whole item
    pub fn read_all(&mut self, id: ItemId) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.get_size(id) as usize];
        self.read(id, 0, &mut buf)?;
        Ok(buf)
    }

    /// Erase a whole item
    pub fn erase_all(&mut self, id: ItemId) -> Result<()> {
        let size = self.get_size(id);
        self.erase(id, 0, size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulate::EraseSettings;
    use crate::error::BackendFailure;
    use crate::registry::RegistryBuilder;
    use crate::testing::{CallLog, StubDriver};
    use alloc::boxed::Box;

    struct Board {
        registry: Registry,
        flash_log: CallLog,
        eeprom_log: CallLog,
        flash: ItemId,
        storage: ItemId,
        nested: ItemId,
        locked: ItemId,
        locked_child: ItemId,
        eeprom: ItemId,
        eeprom_part: ItemId,
    }

    /// flash0 (4 KiB) with storage@0x800 (1 KiB) holding nested@0x100 (256 B),
    /// a read-only locked@0 (1 KiB) with an unflagged child, and eeprom0
    /// (512 B) with eeprom_part@0x40 (128 B). Erase emulation uses 16 byte
    /// chunks and fills with 0xE5.
    fn board() -> Board {
        let settings = EraseSettings {
            value: 0xE5,
            chunk_size: 16,
            eeprom: true,
        };
        let flash_log = CallLog::default();
        let eeprom_log = CallLog::default();
        let mut b = RegistryBuilder::new(settings).unwrap();

        let flash = b
            .add_device(
                "flash0",
                Box::new(StubDriver::new(StorageKind::Flash, 0x1000, flash_log.clone())),
                0x1000,
                false,
            )
            .unwrap();
        let storage = b.add_partition("storage", flash, 0x800, 0x400, false).unwrap();
        let nested = b.add_partition("nested", storage, 0x100, 0x100, false).unwrap();
        let locked = b.add_partition("locked", flash, 0, 0x400, true).unwrap();
        let locked_child = b.add_partition("locked_child", locked, 0x40, 0x40, false).unwrap();
        let eeprom = b
            .add_device(
                "eeprom0",
                Box::new(StubDriver::new(StorageKind::Eeprom, 0x200, eeprom_log.clone())),
                0x200,
                false,
            )
            .unwrap();
        let eeprom_part = b.add_partition("eeprom_part", eeprom, 0x40, 0x80, false).unwrap();

        Board {
            registry: b.build(),
            flash_log,
            eeprom_log,
            flash,
            storage,
            nested,
            locked,
            locked_child,
            eeprom,
            eeprom_part,
        }
    }

    #[test]
    fn test_bounds_error() {
        assert!(!bounds_error(16, 0, 16));
        assert!(!bounds_error(16, 16, 0));
        assert!(!bounds_error(16, 15, 1));
        assert!(bounds_error(16, 15, 2));
        assert!(bounds_error(16, 0, 17));
        assert!(bounds_error(16, 17, 0));
        assert!(bounds_error(16, u32::MAX, 1));
        assert!(bounds_error(0, 0, 1));
        assert!(!bounds_error(0, 0, 0));
    }

    #[test]
    fn test_out_of_bounds_never_reaches_backend() {
        let mut b = board();
        let mut buf = [0u8; 32];
        let cases: [(u32, usize); 4] = [(0x3F0, 32), (0x400, 1), (0, 0x401), (u32::MAX, 1)];

        for (offset, len) in cases {
            assert_eq!(
                b.registry.read(b.storage, offset, &mut vec![0u8; len]),
                Err(Error::InvalidArgument)
            );
            assert_eq!(
                b.registry.write(b.storage, offset, &vec![0u8; len]),
                Err(Error::InvalidArgument)
            );
            assert_eq!(
                b.registry.erase(b.storage, offset, len as u32),
                Err(Error::InvalidArgument)
            );
        }
        assert_eq!(
            b.registry.read(b.eeprom_part, 0x70, &mut buf),
            Err(Error::InvalidArgument)
        );
        assert_eq!(b.flash_log.total(), 0);
        assert_eq!(b.eeprom_log.total(), 0);

        // the last byte is fine
        assert!(b.registry.read(b.storage, 0x3FF, &mut buf[..1]).is_ok());
        assert_eq!(b.flash_log.reads(), 1);
    }

    #[test]
    fn test_absent_item() {
        let mut b = board();
        let ghost = ItemId(99);
        let mut buf = [0u8; 4];

        assert_eq!(b.registry.read(ghost, 0, &mut buf), Err(Error::InvalidArgument));
        assert_eq!(b.registry.write(ghost, 0, &buf), Err(Error::InvalidArgument));
        assert_eq!(b.registry.erase(ghost, 0, 4), Err(Error::InvalidArgument));
        assert_eq!(b.registry.get_size(ghost), 0);
        assert_eq!(b.registry.get_type(ghost), StorageKind::Unknown);
    }

    #[test]
    fn test_size_and_type() {
        let b = board();
        assert_eq!(b.registry.get_size(b.flash), 0x1000);
        assert_eq!(b.registry.get_size(b.nested), 0x100);
        assert_eq!(b.registry.get_type(b.nested), StorageKind::Flash);
        assert_eq!(b.registry.get_type(b.eeprom_part), StorageKind::Eeprom);
    }

    #[test]
    fn test_read_only_rejects_write_and_erase() {
        let mut b = board();
        let data = [0x42u8; 16];

        for id in [b.locked, b.locked_child] {
            let size = b.registry.get_size(id);
            for offset in [0, 1, size - 16] {
                assert_eq!(
                    b.registry.write(id, offset, &data),
                    Err(Error::PermissionDenied)
                );
                assert_eq!(b.registry.erase(id, offset, 16), Err(Error::PermissionDenied));
            }
            assert_eq!(b.registry.erase_all(id), Err(Error::PermissionDenied));

            // out-of-range requests are still refused as read-only
            assert_eq!(
                b.registry.write(id, size, &data),
                Err(Error::PermissionDenied)
            );
            assert_eq!(
                b.registry.erase(id, 0, size + 1),
                Err(Error::PermissionDenied)
            );
        }
        assert_eq!(b.flash_log.total(), 0);

        // reading is still allowed
        let mut buf = [0u8; 16];
        assert!(b.registry.read(b.locked_child, 0, &mut buf).is_ok());
    }

    #[test]
    fn test_round_trip() {
        let mut b = board();
        let pattern: Vec<u8> = (0..=255u8).collect();

        for id in [b.flash, b.storage, b.nested, b.eeprom, b.eeprom_part] {
            let n = core::cmp::min(pattern.len(), b.registry.get_size(id) as usize);
            b.registry.write(id, 0, &pattern[..n]).unwrap();
            let mut back = vec![0u8; n];
            b.registry.read(id, 0, &mut back).unwrap();
            assert_eq!(back, &pattern[..n]);
        }
    }

    #[test]
    fn test_partition_writes_land_at_absolute_offset() {
        let mut b = board();
        let data = *b"partition";

        b.registry.write(b.nested, 7, &data).unwrap();

        let mut via_parent = [0u8; 9];
        b.registry.read(b.storage, 0x100 + 7, &mut via_parent).unwrap();
        assert_eq!(via_parent, data);

        let mut via_root = [0u8; 9];
        b.registry.read(b.flash, 0x800 + 0x100 + 7, &mut via_root).unwrap();
        assert_eq!(via_root, data);

        let raw = b.flash_log.snapshot();
        assert_eq!(&raw[0x907..0x910], &data);
    }

    #[test]
    fn test_native_erase_on_flash() {
        let mut b = board();
        b.registry.write(b.storage, 0, &[0u8; 64]).unwrap();
        b.registry.erase(b.storage, 0, 64).unwrap();

        assert_eq!(b.flash_log.erases(), 1);
        assert_eq!(b.flash_log.writes(), 1);
        let raw = b.flash_log.snapshot();
        assert!(raw[0x800..0x840].iter().all(|&x| x == 0xFF));
    }

    #[test]
    fn test_emulated_erase_fills() {
        let mut b = board();
        b.registry.write(b.eeprom_part, 0, &[0x11u8; 0x80]).unwrap();

        // shorter than a chunk, then not a multiple of the chunk size
        for (offset, len) in [(2u32, 5u32), (0x10, 0x25)] {
            b.registry.erase(b.eeprom_part, offset, len).unwrap();
            let mut back = vec![0u8; len as usize];
            b.registry.read(b.eeprom_part, offset, &mut back).unwrap();
            assert!(back.iter().all(|&x| x == 0xE5));
        }

        let mut around = [0u8; 2];
        b.registry.read(b.eeprom_part, 0x35, &mut around).unwrap();
        assert_eq!(around, [0x11, 0x11]);
        assert_eq!(b.eeprom_log.erases(), 0);
    }

    #[test]
    fn test_zero_length_erase() {
        let mut b = board();
        b.registry.erase(b.eeprom_part, 0x10, 0).unwrap();
        b.registry.erase(b.eeprom_part, 0x80, 0).unwrap();
        assert_eq!(b.eeprom_log.writes(), 0);

        // native erase: no driver call, even unaligned or while offline
        assert_eq!(b.registry.erase(b.storage, 0x10, 0), Ok(()));
        assert_eq!(b.registry.erase(b.nested, 0x100, 0), Ok(()));
        b.flash_log.set_ready(false);
        assert_eq!(b.registry.erase(b.flash, 0x3, 0), Ok(()));
        assert_eq!(b.flash_log.erases(), 0);

        // still bounds and permission checked
        assert_eq!(b.registry.erase(b.storage, 0x401, 0), Err(Error::InvalidArgument));
        assert_eq!(b.registry.erase(b.locked, 0, 0), Err(Error::PermissionDenied));
    }

    #[test]
    fn test_partial_emulated_erase_failure() {
        let mut b = board();
        b.registry.write(b.eeprom_part, 0, &[0x11u8; 0x80]).unwrap();
        // one write above, then chunks 1..=5 of the erase; fail chunk 3
        b.eeprom_log.fail_write_on(1 + 3);

        let result = b.registry.erase(b.eeprom_part, 0, 5 * 16);
        assert_eq!(
            result,
            Err(Error::Backend(BackendFailure::WriteFailed { addr: 0x40 + 32 }))
        );
        assert_eq!(b.eeprom_log.writes(), 4);

        let mut back = [0u8; 80];
        b.registry.read(b.eeprom_part, 0, &mut back).unwrap();
        assert!(back[..32].iter().all(|&x| x == 0xE5));
        assert!(back[32..].iter().all(|&x| x == 0x11));
    }

    #[test]
    fn test_device_unavailable() {
        let mut b = board();
        b.flash_log.set_ready(false);
        let mut buf = [0u8; 8];

        for id in [b.flash, b.storage, b.nested] {
            assert_eq!(b.registry.read(id, 0, &mut buf), Err(Error::DeviceUnavailable));
            assert_eq!(b.registry.write(id, 0, &buf), Err(Error::DeviceUnavailable));
            assert_eq!(b.registry.erase(id, 0, 8), Err(Error::DeviceUnavailable));
        }
        assert_eq!(b.flash_log.total(), 0);

        b.eeprom_log.set_ready(false);
        assert_eq!(
            b.registry.erase(b.eeprom_part, 0, 8),
            Err(Error::DeviceUnavailable)
        );
        assert_eq!(b.eeprom_log.total(), 0);

        // other devices are unaffected
        b.flash_log.set_ready(true);
        assert!(b.registry.read(b.nested, 0, &mut buf).is_ok());
    }

    #[test]
    fn test_backend_error_passed_through() {
        let mut b = board();
        b.eeprom_log.fail_write_on(1);
        assert_eq!(
            b.registry.write(b.eeprom, 0x10, &[1, 2, 3]),
            Err(Error::Backend(BackendFailure::WriteFailed { addr: 0x10 }))
        );
    }

    #[test]
    fn test_whole_item_helpers() {
        let mut b = board();
        b.registry.write(b.eeprom_part, 0, &[0x33u8; 0x80]).unwrap();
        b.registry.erase_all(b.eeprom_part).unwrap();
        let all = b.registry.read_all(b.eeprom_part).unwrap();
        assert_eq!(all.len(), 0x80);
        assert!(all.iter().all(|&x| x == 0xE5));

        // the rest of the eeprom is untouched
        let raw = b.eeprom_log.snapshot();
        assert_eq!(raw[0x3F], 0x00);
        assert_eq!(raw[0xC0], 0x00);
    }
}
