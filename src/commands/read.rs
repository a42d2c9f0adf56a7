//! Read command

use super::{create_progress_bar_with_phase, print_target, range_len, CHUNK_SIZE};
use crate::board::Board;
use std::fs;
use std::path::Path;

/// Read `length` bytes at `offset` of an item into `output`
pub fn run_read(
    board: &mut Board,
    item: &str,
    output: &Path,
    offset: u32,
    length: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let id = board.find(item)?;
    let len = range_len(&board.registry, id, item, offset, length)?;
    print_target(&board.registry, id, item, offset, len);

    let mut data = vec![0u8; len as usize];
    let pb = create_progress_bar_with_phase(len as u64, "Reading")?;

    let mut pos = offset;
    for chunk in data.chunks_mut(CHUNK_SIZE) {
        if let Err(e) = board.registry.read(id, pos, chunk) {
            pb.abandon_with_message("Read failed!");
            return Err(format!("Read of '{}' failed at offset 0x{:X}: {}", item, pos, e).into());
        }
        pos += chunk.len() as u32;
        pb.inc(chunk.len() as u64);
    }

    pb.finish_with_message("Read complete");

    fs::write(output, &data)?;
    println!("Wrote {} bytes to {:?}", data.len(), output);

    Ok(())
}
