//! List and check commands

use super::{format_size, write_needs_erase};
use crate::board::Board;
use nvmp_core::{EraseStrategy, ItemId, Registry};

fn strategy_str(strategy: EraseStrategy) -> String {
    match strategy {
        EraseStrategy::Native => "native".to_string(),
        EraseStrategy::Emulated(s) => format!("emulated (0x{:02X})", s.value),
        EraseStrategy::Unsupported => "none".to_string(),
    }
}

fn print_tree(registry: &Registry, id: ItemId, depth: usize) {
    let Some(item) = registry.item(id) else {
        return;
    };

    let flags = match (item.is_read_only(), item.own_read_only()) {
        (true, true) => "ro",
        (true, false) => "ro (inherited)",
        _ => "",
    };
    let name = format!("{}{}", "  ".repeat(depth), item.name());
    println!(
        "{:<28} {:<16} 0x{:08X} {:>10} {}",
        name,
        registry.get_type(id),
        registry.device_offset(id).unwrap_or(0),
        format_size(item.size()),
        flags
    );

    for child in registry.children(id) {
        print_tree(registry, child, depth + 1);
    }
}

/// List devices and their partitions as a tree
pub fn run_list(board: &Board) {
    let registry = &board.registry;
    println!(
        "{:<28} {:<16} {:<10} {:>10} Flags",
        "Name", "Type", "Offset", "Size"
    );
    println!("{}", "-".repeat(74));

    for (id, item) in registry.items() {
        if !item.is_partition() {
            print_tree(registry, id, 0);
        }
    }
}

/// Report each device's erase handling and readiness
pub fn run_check(board: &Board) -> Result<(), Box<dyn std::error::Error>> {
    let registry = &board.registry;
    let mut devices = 0;
    let mut not_ready = Vec::new();

    for (id, item) in registry.items() {
        if item.is_partition() {
            continue;
        }
        devices += 1;

        let Some(backend) = registry.backend_of(id) else {
            continue;
        };
        let image = board
            .image_path(item.name())
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(in memory)".to_string());
        let program = if write_needs_erase(registry, id) {
            "erase first"
        } else {
            "overwrite"
        };
        println!(
            "{:<16} {:<16} erase: {:<18} write: {:<12} {}",
            item.name(),
            backend.kind(),
            strategy_str(backend.erase_strategy()),
            program,
            image
        );
        if !backend.is_ready() {
            not_ready.push(item.name().to_string());
        }
    }

    let settings = board.config.erase;
    println!();
    println!(
        "Erase fill 0x{:02X}, chunk {} bytes, EEPROM emulation {}",
        settings.value,
        settings.chunk_size,
        if settings.eeprom { "on" } else { "off" }
    );
    println!(
        "{} device(s), {} partition(s)",
        devices,
        registry.len() - devices
    );

    if !not_ready.is_empty() {
        return Err(format!("Device(s) not ready: {}", not_ready.join(", ")).into());
    }
    println!("Configuration OK");
    Ok(())
}
