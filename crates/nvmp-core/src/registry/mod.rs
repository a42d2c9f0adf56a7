//! Item registry
//!
//! All devices and partitions live in one arena owned by a [`Registry`].
//! Items refer to their parent by [`ItemId`], an index into that arena, and a
//! root item owns its [`Backend`] through a [`BackendId`].
//!
//! # Example
//!
//! ```ignore
//! let mut builder = Registry::builder();
//! let flash = builder.add_device("flash0", Box::new(driver), 0x10000, false)?;
//! let storage = builder.add_partition("storage", flash, 0x8000, 0x4000, false)?;
//! let mut registry = builder.build();
//!
//! registry.erase(storage, 0, 0x1000)?;
//! registry.write(storage, 0, b"hello")?;
//! ```

mod access;
mod builder;
mod resolve;

pub use builder::RegistryBuilder;
pub use resolve::Resolved;

use alloc::vec::Vec;

use crate::backend::Backend;

/// Maximum length of an item name in bytes
pub const MAX_NAME_LEN: usize = 32;

/// Bounded item name usable without an allocator
pub type ItemName = heapless::String<MAX_NAME_LEN>;

/// Index of an item in its registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(usize);

impl ItemId {
    /// Position of the item in the arena
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Index of a backend in its registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackendId(usize);

impl BackendId {
    /// Position of the backend in the arena
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Where an item's bytes come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    /// A device, backed directly by a backend
    Root {
        /// Backend owned by this item
        backend: BackendId,
    },
    /// A window into a parent item
    Partition {
        /// Parent item (device or partition)
        parent: ItemId,
        /// Offset of byte 0 of this partition within the parent
        offset: u32,
    },
}

/// A device or partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    name: ItemName,
    size: u32,
    own_read_only: bool,
    read_only: bool,
    node: Node,
}

impl Item {
    /// Item name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Addressable size in bytes
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Effective read-only flag (own flag or any ancestor's)
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Read-only flag as configured on this item alone
    pub fn own_read_only(&self) -> bool {
        self.own_read_only
    }

    /// Root or partition link
    pub fn node(&self) -> Node {
        self.node
    }

    /// Whether this item is a partition
    pub fn is_partition(&self) -> bool {
        matches!(self.node, Node::Partition { .. })
    }

    /// Parent item, `None` for a device
    pub fn parent(&self) -> Option<ItemId> {
        match self.node {
            Node::Root { .. } => None,
            Node::Partition { parent, .. } => Some(parent),
        }
    }

    /// Offset within the parent (0 for a device)
    pub fn relative_offset(&self) -> u32 {
        match self.node {
            Node::Root { .. } => 0,
            Node::Partition { offset, .. } => offset,
        }
    }
}

/// Immutable item tree plus the backends that serve it
#[derive(Debug)]
pub struct Registry {
    items: Vec<Item>,
    backends: Vec<Backend>,
}

impl Registry {
    /// Start building a registry with default erase settings
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the registry has no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Look up an item by id
    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.get(id.0)
    }

    /// Find an item by name (case-sensitive)
    pub fn find(&self, name: &str) -> Option<ItemId> {
        self.items
            .iter()
            .position(|item| item.name.as_str() == name)
            .map(ItemId)
    }

    /// All items in insertion order; parents always precede their children
    pub fn items(&self) -> impl Iterator<Item = (ItemId, &Item)> {
        self.items.iter().enumerate().map(|(i, item)| (ItemId(i), item))
    }

    /// Parent of an item
    pub fn parent(&self, id: ItemId) -> Option<ItemId> {
        self.item(id).and_then(Item::parent)
    }

    /// Direct children of an item
    pub fn children(&self, id: ItemId) -> impl Iterator<Item = ItemId> + '_ {
        self.items()
            .filter(move |(_, item)| item.parent() == Some(id))
            .map(|(child, _)| child)
    }

    /// Look up a backend by id
    pub fn backend(&self, id: BackendId) -> Option<&Backend> {
        self.backends.get(id.0)
    }
}
