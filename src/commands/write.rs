//! Write command

use super::verify::verify_range;
use super::{
    create_progress_bar_with_phase, create_spinner_style, print_target, range_len,
    write_needs_erase, CHUNK_SIZE,
};
use crate::board::Board;
use indicatif::ProgressBar;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Write the contents of `input` to an item at `offset`
pub fn run_write(
    board: &mut Board,
    item: &str,
    input: &Path,
    offset: u32,
    erase: bool,
    verify: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let id = board.find(item)?;
    let data = fs::read(input)?;
    println!("Read {} bytes from {:?}", data.len(), input);

    let len = u32::try_from(data.len())
        .map_err(|_| format!("File {:?} is too large", input))?;
    range_len(&board.registry, id, item, offset, Some(len))?;
    print_target(&board.registry, id, item, offset, len);

    if board.registry.item(id).is_some_and(|i| i.is_read_only()) {
        return Err(format!("'{}' is read-only", item).into());
    }

    if erase {
        let pb = ProgressBar::new_spinner();
        pb.set_style(create_spinner_style()?);
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message(format!("Erasing {} bytes...", len));
        if let Err(e) = board.registry.erase(id, offset, len) {
            pb.abandon_with_message("Erase failed!");
            return Err(e.into());
        }
        pb.finish_with_message("Erase complete");
    } else if write_needs_erase(&board.registry, id) {
        log::warn!(
            "{} is {}: writing only clears bits, use --erase unless the range is blank",
            item,
            board.registry.get_type(id)
        );
    }

    let pb = create_progress_bar_with_phase(len as u64, "Writing")?;
    let mut pos = offset;
    for chunk in data.chunks(CHUNK_SIZE) {
        if let Err(e) = board.registry.write(id, pos, chunk) {
            pb.abandon_with_message("Write failed!");
            return Err(format!("Write to '{}' failed at offset 0x{:X}: {}", item, pos, e).into());
        }
        pos += chunk.len() as u32;
        pb.inc(chunk.len() as u64);
    }
    pb.finish_with_message("Write complete");

    if verify {
        verify_range(&mut board.registry, id, item, offset, &data)?;
    }

    println!("Wrote {} bytes to '{}'", len, item);
    Ok(())
}
