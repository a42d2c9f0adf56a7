//! Registry construction
//!
//! Items are appended one at a time and a partition can only name a parent
//! that is already present, so the parent graph is a tree by construction.
//! Window and name checks happen here, once, instead of on every access.

use alloc::boxed::Box;
use alloc::vec::Vec;

use super::{BackendId, Item, ItemId, ItemName, Node, Registry};
use crate::backend::{Backend, StorageDriver};
use crate::emulate::EraseSettings;
use crate::error::ConfigError;

/// Incrementally builds a [`Registry`]
#[derive(Debug)]
pub struct RegistryBuilder {
    settings: EraseSettings,
    items: Vec<Item>,
    backends: Vec<Backend>,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self {
            settings: EraseSettings::default(),
            items: Vec::new(),
            backends: Vec::new(),
        }
    }
}

impl RegistryBuilder {
    /// Create a builder with custom erase emulation settings
    pub fn new(settings: EraseSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self {
            settings,
            ..Self::default()
        })
    }

    /// Erase settings applied to backends added from now on
    pub fn settings(&self) -> EraseSettings {
        self.settings
    }

    fn make_name(&self, name: &str) -> Result<ItemName, ConfigError> {
        let mut label = ItemName::new();
        label
            .push_str(name)
            .map_err(|_| ConfigError::NameTooLong)?;
        if self.items.iter().any(|item| item.name == label) {
            return Err(ConfigError::DuplicateName);
        }
        Ok(label)
    }

    /// Add a device backed by `driver`
    ///
    /// `size` is the addressable length; 0 marks an absent device.
    pub fn add_device(
        &mut self,
        name: &str,
        driver: Box<dyn StorageDriver>,
        size: u32,
        read_only: bool,
    ) -> Result<ItemId, ConfigError> {
        let name = self.make_name(name)?;
        let backend = BackendId(self.backends.len());
        self.backends.push(Backend::new(driver, self.settings));

        let id = ItemId(self.items.len());
        log::debug!("device {} ({} bytes) as {:?}", name, size, id);
        self.items.push(Item {
            name,
            size,
            own_read_only: read_only,
            read_only,
            node: Node::Root { backend },
        });
        Ok(id)
    }

    /// Add a partition of `size` bytes at `offset` within `parent`
    ///
    /// The partition inherits read-only from its parent.
    pub fn add_partition(
        &mut self,
        name: &str,
        parent: ItemId,
        offset: u32,
        size: u32,
        read_only: bool,
    ) -> Result<ItemId, ConfigError> {
        let name = self.make_name(name)?;
        let parent_item = self
            .items
            .get(parent.0)
            .ok_or(ConfigError::UnknownParent)?;

        let fits = match offset.checked_add(size) {
            Some(end) => end <= parent_item.size,
            None => false,
        };
        if !fits {
            return Err(ConfigError::PartitionOutOfBounds {
                offset,
                size,
                parent_size: parent_item.size,
            });
        }

        let inherited = parent_item.read_only;
        let id = ItemId(self.items.len());
        log::debug!(
            "partition {} at 0x{:x}+0x{:x} of {} as {:?}",
            name,
            offset,
            size,
            parent_item.name,
            id
        );
        self.items.push(Item {
            name,
            size,
            own_read_only: read_only,
            read_only: read_only || inherited,
            node: Node::Partition { parent, offset },
        });
        Ok(id)
    }

    /// Look up an item added so far
    pub fn find(&self, name: &str) -> Option<ItemId> {
        self.items
            .iter()
            .position(|item| item.name.as_str() == name)
            .map(ItemId)
    }

    /// Finish construction
    pub fn build(self) -> Registry {
        Registry {
            items: self.items,
            backends: self.backends,
        }
    }
}
