//! Error types for nvmp-core
//!
//! Access errors are small `Copy` values so they can be returned from
//! `no_std` code without allocation. Construction-time problems are reported
//! through the separate [`ConfigError`].

use core::fmt;

/// Failure reported by a storage driver primitive
///
/// The dispatcher never interprets these; they are handed back to the caller
/// exactly as the driver produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendFailure {
    /// Read primitive failed
    ReadFailed {
        /// Device address of the failed access
        addr: u32,
    },
    /// Write/program primitive failed
    WriteFailed {
        /// Device address of the failed access
        addr: u32,
    },
    /// Erase primitive failed
    EraseFailed {
        /// Device address of the failed access
        addr: u32,
    },
    /// Address or length not aligned to what the device requires
    InvalidAlignment {
        /// Offending device address
        addr: u32,
    },
    /// Access beyond the end of the physical device
    OutOfRange {
        /// Offending device address
        addr: u32,
    },
    /// Driver has no such primitive
    NotSupported,
    /// Driver specific error code
    Other(i32),
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Item is absent or the requested range lies outside it
    InvalidArgument,
    /// Write or erase on a read-only item (own flag or inherited)
    PermissionDenied,
    /// The backing device reports that it is not ready
    DeviceUnavailable,
    /// Erase requested on a backend that can neither erase nor emulate it
    Unsupported,
    /// The backend primitive itself failed
    Backend(BackendFailure),
}

impl From<BackendFailure> for Error {
    fn from(failure: BackendFailure) -> Self {
        Self::Backend(failure)
    }
}

impl fmt::Display for BackendFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFailed { addr } => write!(f, "read failed at address 0x{:08X}", addr),
            Self::WriteFailed { addr } => write!(f, "write failed at address 0x{:08X}", addr),
            Self::EraseFailed { addr } => write!(f, "erase failed at address 0x{:08X}", addr),
            Self::InvalidAlignment { addr } => {
                write!(f, "unaligned access at address 0x{:08X}", addr)
            }
            Self::OutOfRange { addr } => {
                write!(f, "address 0x{:08X} is beyond the device", addr)
            }
            Self::NotSupported => write!(f, "operation not supported by driver"),
            Self::Other(code) => write!(f, "driver error {}", code),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::PermissionDenied => write!(f, "item is read-only"),
            Self::DeviceUnavailable => write!(f, "device not ready"),
            Self::Unsupported => write!(f, "erase not supported on this device"),
            Self::Backend(failure) => write!(f, "{}", failure),
        }
    }
}

/// Errors that can occur while building a registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Two items share a name
    DuplicateName,
    /// Item name does not fit the name buffer
    NameTooLong,
    /// A partition names a parent that does not exist
    UnknownParent,
    /// Partitions refer to each other in a loop
    ParentCycle,
    /// A partition window does not fit inside its parent
    PartitionOutOfBounds {
        /// Partition offset within the parent
        offset: u32,
        /// Partition size
        size: u32,
        /// Parent size
        parent_size: u32,
    },
    /// Erase chunk size is zero or larger than the erase buffer
    InvalidChunkSize(usize),
    /// Failed to parse the configuration
    ParseError,
    /// Failed to read the configuration
    IoError,
    /// The driver factory could not open a device
    DriverUnavailable,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateName => write!(f, "duplicate item name"),
            Self::NameTooLong => write!(f, "item name too long"),
            Self::UnknownParent => write!(f, "partition parent not found"),
            Self::ParentCycle => write!(f, "partitions form a parent cycle"),
            Self::PartitionOutOfBounds {
                offset,
                size,
                parent_size,
            } => write!(
                f,
                "partition 0x{:08X}+0x{:X} does not fit parent of {} bytes",
                offset, size, parent_size
            ),
            Self::InvalidChunkSize(size) => write!(f, "invalid erase chunk size {}", size),
            Self::ParseError => write!(f, "failed to parse configuration"),
            Self::IoError => write!(f, "I/O error"),
            Self::DriverUnavailable => write!(f, "failed to open device driver"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl std::error::Error for BackendFailure {}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
