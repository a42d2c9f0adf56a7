//! Verify command

use super::{create_progress_bar_with_phase, print_target, range_len, CHUNK_SIZE};
use crate::board::Board;
use nvmp_core::{ItemId, Registry};
use std::fs;
use std::path::Path;

/// Compare a chunk with expected data and return detailed error on mismatch
fn verify_chunk(
    chunk: &[u8],
    expected_chunk: &[u8],
    base_offset: u32,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(i) = chunk
        .iter()
        .zip(expected_chunk)
        .position(|(a, b)| a != b)
    {
        return Err(format!(
            "Verification failed in '{}' at offset 0x{:08X}: expected 0x{:02X}, got 0x{:02X}",
            name,
            base_offset as usize + i,
            expected_chunk[i],
            chunk[i]
        )
        .into());
    }
    Ok(())
}

/// Compare the item contents at `offset` with `expected`
pub(super) fn verify_range(
    registry: &mut Registry,
    id: ItemId,
    name: &str,
    offset: u32,
    expected: &[u8],
) -> Result<(), Box<dyn std::error::Error>> {
    let pb = create_progress_bar_with_phase(expected.len() as u64, "Verifying")?;
    let mut buf = vec![0u8; CHUNK_SIZE];

    let mut pos = offset;
    for expected_chunk in expected.chunks(CHUNK_SIZE) {
        let chunk = &mut buf[..expected_chunk.len()];
        registry.read(id, pos, chunk)?;

        if let Err(e) = verify_chunk(chunk, expected_chunk, pos, name) {
            pb.abandon_with_message("Verification failed!");
            return Err(e);
        }

        pos += expected_chunk.len() as u32;
        pb.inc(expected_chunk.len() as u64);
    }

    pb.finish_with_message("Verification passed");
    Ok(())
}

/// Compare an item against the contents of `input`
pub fn run_verify(
    board: &mut Board,
    item: &str,
    input: &Path,
    offset: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let id = board.find(item)?;
    let expected = fs::read(input)?;
    println!("Read {} bytes from {:?}", expected.len(), input);

    let len = u32::try_from(expected.len())
        .map_err(|_| format!("File {:?} is too large", input))?;
    range_len(&board.registry, id, item, offset, Some(len))?;
    print_target(&board.registry, id, item, offset, len);

    verify_range(&mut board.registry, id, item, offset, &expected)?;
    println!("Verification passed!");

    Ok(())
}
