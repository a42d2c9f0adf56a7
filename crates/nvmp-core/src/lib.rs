//! nvmp-core - Partitioned access to non-volatile and retained memory
//!
//! This crate lets code read, write and erase named regions of flash, EEPROM
//! or retained RAM without caring which medium is underneath. Devices can be
//! split into partitions, and partitions into further partitions; every
//! access is bounds checked against the item it names and then resolved to an
//! absolute offset on the owning device.
//!
//! It is `no_std` compatible (it needs `alloc`).
//!
//! # Features
//!
//! - `std` - Enable the TOML configuration loader and `std::error::Error`
//!
//! # Example
//!
//! ```ignore
//! use nvmp_core::{Registry, StorageKind};
//!
//! let mut builder = Registry::builder();
//! let eeprom = builder.add_device("eeprom0", Box::new(driver), 512, false)?;
//! let settings = builder.add_partition("settings", eeprom, 0x100, 0x80, false)?;
//! let mut registry = builder.build();
//!
//! assert_eq!(registry.get_type(settings), StorageKind::Eeprom);
//! registry.erase(settings, 0, 0x80)?; // written as 0xFF in chunks
//! registry.write(settings, 0, &[1, 2, 3])?;
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

extern crate alloc;

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod backend;
#[cfg(feature = "std")]
pub mod config;
pub mod emulate;
pub mod error;
pub mod registry;

#[cfg(test)]
mod testing;

pub use backend::{Backend, BackendFeatures, EraseStrategy, StorageDriver, StorageKind};
pub use emulate::EraseSettings;
pub use error::{BackendFailure, ConfigError, Error, Result};
pub use registry::{Item, ItemId, Registry, RegistryBuilder};
