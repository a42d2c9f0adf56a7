//! Erase command

use super::{create_spinner_style, print_target, range_len};
use crate::board::Board;
use indicatif::ProgressBar;
use nvmp_core::EraseStrategy;
use std::time::Duration;

/// Erase `length` bytes at `offset` of an item
pub fn run_erase(
    board: &mut Board,
    item: &str,
    offset: u32,
    length: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let id = board.find(item)?;
    let len = range_len(&board.registry, id, item, offset, length)?;
    print_target(&board.registry, id, item, offset, len);

    match board.registry.backend_of(id).map(|b| b.erase_strategy()) {
        Some(EraseStrategy::Emulated(settings)) => println!(
            "Erase is emulated: writing 0x{:02X} in {} byte chunks",
            settings.value, settings.chunk_size
        ),
        Some(EraseStrategy::Unsupported) => {
            log::warn!("{} has no erase support", board.registry.get_type(id));
        }
        _ => {}
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(create_spinner_style()?);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(format!("Erasing {}...", item));

    if let Err(e) = board.registry.erase(id, offset, len) {
        pb.abandon_with_message("Erase failed!");
        return Err(format!("Erase of '{}' failed: {}", item, e).into());
    }

    pb.finish_with_message("Erase complete");
    Ok(())
}
