//! Partition resolution

use super::{BackendId, ItemId, Node, Registry};
use crate::backend::Backend;

/// Result of walking an item up to its device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    /// The device item at the top of the chain
    pub root: ItemId,
    /// Backend owned by the device
    pub backend: BackendId,
    /// Absolute device offset of the item's byte 0
    pub offset: u32,
}

impl Registry {
    /// Walk from `id` to its device, summing relative offsets
    ///
    /// Returns `None` only for an id that is not in this registry. Parents
    /// always have a lower index than their children, so the walk ends.
    pub fn resolve(&self, id: ItemId) -> Option<Resolved> {
        let mut current = id;
        let mut offset = 0u32;

        loop {
            let item = self.items.get(current.0)?;
            match item.node {
                Node::Partition {
                    parent,
                    offset: relative,
                } => {
                    // windows were checked against their parent when added
                    offset += relative;
                    current = parent;
                }
                Node::Root { backend } => {
                    log::trace!(
                        "{:?} resolves to {} at 0x{:x}",
                        id,
                        item.name,
                        offset
                    );
                    return Some(Resolved {
                        root: current,
                        backend,
                        offset,
                    });
                }
            }
        }
    }

    /// Absolute offset of an item on its device
    pub fn device_offset(&self, id: ItemId) -> Option<u32> {
        self.resolve(id).map(|r| r.offset)
    }

    /// Device item an item belongs to
    pub fn root_of(&self, id: ItemId) -> Option<ItemId> {
        self.resolve(id).map(|r| r.root)
    }

    /// Backend serving an item
    pub fn backend_of(&self, id: ItemId) -> Option<&Backend> {
        self.resolve(id).and_then(|r| self.backends.get(r.backend.0))
    }
}
