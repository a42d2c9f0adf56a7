//! CLI command implementations
//!
//! Every command works on a named item of a loaded
//! [`Board`](crate::board::Board). Offsets given
//! on the command line are relative to that item; the registry translates
//! them to device offsets and rejects anything outside the item.

mod erase;
mod list;
mod read;
mod verify;
mod write;

pub use erase::run_erase;
pub use list::{run_check, run_list};
pub use read::run_read;
pub use verify::run_verify;
pub use write::run_write;

use indicatif::{ProgressBar, ProgressStyle};
use nvmp_core::{BackendFeatures, ItemId, Registry};

/// Transfer size for reads, writes and verification
const CHUNK_SIZE: usize = 4096;

/// Create a progress bar with custom phase message
fn create_progress_bar_with_phase(
    total: u64,
    phase: &str,
) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {}",
                phase
            ))?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Create a standard spinner style
fn create_spinner_style() -> Result<ProgressStyle, Box<dyn std::error::Error>> {
    Ok(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?)
}

/// Format a byte count for display
fn format_size(bytes: u32) -> String {
    if bytes >= 1024 * 1024 && bytes % (1024 * 1024) == 0 {
        format!("{} MiB", bytes / (1024 * 1024))
    } else if bytes >= 1024 && bytes % 1024 == 0 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}

/// Length of the range starting at `offset`, defaulting to the rest of the item
fn range_len(
    registry: &Registry,
    id: ItemId,
    name: &str,
    offset: u32,
    length: Option<u32>,
) -> Result<u32, Box<dyn std::error::Error>> {
    let size = registry.get_size(id);
    let len = match length {
        Some(len) => len,
        None => size.saturating_sub(offset),
    };

    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(len),
        _ => Err(format!(
            "Range 0x{:X}+0x{:X} does not fit in '{}' ({} bytes)",
            offset, len, name, size
        )
        .into()),
    }
}

/// Whether the medium behind an item must be erased before it is written
fn write_needs_erase(registry: &Registry, id: ItemId) -> bool {
    registry
        .backend_of(id)
        .is_some_and(|b| b.features().contains(BackendFeatures::WRITE_NEEDS_ERASE))
}

/// Print where an item lives
fn print_target(registry: &Registry, id: ItemId, name: &str, offset: u32, len: u32) {
    let base = registry.device_offset(id).unwrap_or(0);
    let root = registry
        .root_of(id)
        .and_then(|root| registry.item(root))
        .map(|item| item.name())
        .unwrap_or("?");
    println!(
        "{} ({}): 0x{:08X} - 0x{:08X} on {}, {} bytes",
        name,
        registry.get_type(id),
        base + offset,
        (base + offset + len).saturating_sub(1),
        root,
        len
    );
}
