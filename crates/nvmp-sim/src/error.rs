//! Error types for image-backed devices

use thiserror::Error;

/// Result type for image operations
pub type Result<T> = std::result::Result<T, SimError>;

/// Errors loading or saving a device image
#[derive(Debug, Error)]
pub enum SimError {
    /// The image file could not be read
    #[error("failed to read image {path}: {source}")]
    ImageRead {
        /// Image path
        path: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The image file could not be written
    #[error("failed to write image {path}: {source}")]
    ImageWrite {
        /// Image path
        path: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The image holds more data than the device
    #[error("image {path} is {len} bytes but the device holds {size}")]
    ImageTooLarge {
        /// Image path
        path: String,
        /// Image length
        len: usize,
        /// Device size
        size: usize,
    },
}
