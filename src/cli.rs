//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

#[derive(Parser)]
#[command(name = "nvmp")]
#[command(author, version, about = "Flash, EEPROM and retained memory access", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Board configuration file (TOML format)
    #[arg(short, long, default_value = "nvmp.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List devices and partitions
    List,

    /// Validate the configuration and open every device
    Check,

    /// Read an item to a file
    Read {
        /// Device or partition name
        item: String,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Offset within the item (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        offset: u32,

        /// Number of bytes to read (defaults to the rest of the item)
        #[arg(long, value_parser = parse_hex_u32)]
        length: Option<u32>,
    },

    /// Write a file to an item
    Write {
        /// Device or partition name
        item: String,

        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Offset within the item (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        offset: u32,

        /// Erase the target range before writing
        #[arg(long)]
        erase: bool,

        /// Skip reading back the written data
        #[arg(long)]
        no_verify: bool,
    },

    /// Erase a range of an item
    Erase {
        /// Device or partition name
        item: String,

        /// Offset within the item (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        offset: u32,

        /// Number of bytes to erase (defaults to the rest of the item)
        #[arg(long, value_parser = parse_hex_u32)]
        length: Option<u32>,
    },

    /// Compare an item against a file
    Verify {
        /// Device or partition name
        item: String,

        /// Input file path to verify against
        #[arg(short, long)]
        input: PathBuf,

        /// Offset within the item (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        offset: u32,
    },
}
