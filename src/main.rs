//! nvmp - Partitioned flash, EEPROM and retained memory access
//!
//! The board is described by a TOML file listing devices and the partitions
//! carved out of them. Devices are simulated in memory and backed by image
//! files, so the same read, write, erase and verify commands work on any
//! item regardless of the medium underneath.

mod board;
mod cli;
mod commands;

use board::Board;
use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let mut board = Board::open(&cli.config)?;
    log::info!(
        "Loaded {} item(s) from {}",
        board.registry.len(),
        cli.config.display()
    );

    match cli.command {
        Commands::List => {
            commands::run_list(&board);
            Ok(())
        }
        Commands::Check => commands::run_check(&board),
        Commands::Read {
            item,
            output,
            offset,
            length,
        } => commands::run_read(&mut board, &item, &output, offset, length),
        Commands::Write {
            item,
            input,
            offset,
            erase,
            no_verify,
        } => {
            let result = commands::run_write(&mut board, &item, &input, offset, erase, !no_verify);
            // Partial writes stay on the images
            board.save()?;
            result
        }
        Commands::Erase {
            item,
            offset,
            length,
        } => {
            let result = commands::run_erase(&mut board, &item, offset, length);
            board.save()?;
            result
        }
        Commands::Verify {
            item,
            input,
            offset,
        } => commands::run_verify(&mut board, &item, &input, offset),
    }
}
