//! Configuration module.
//!
//! This module defines the command-line interface (CLI) for the patcher using `clap`.
//! Addresses and words accept either `0x`-prefixed hex or decimal.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Patch PowerPC instructions into GameCube/Wii DOL executables.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    #[command(subcommand)]
    pub command: Command,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info", help = "Set the logging level")]
    pub log_level: String,
}

/// The available subcommands. Each takes the DOL file path first.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the segment table, BSS range and entry point.
    Info {
        image: PathBuf,
    },
    /// Hex dump bytes at a virtual address.
    Read {
        image: PathBuf,
        #[arg(value_parser = parse_u32)]
        address: u32,
        #[arg(short, long, default_value_t = 16)]
        length: usize,
    },
    /// Write raw 32-bit words starting at a virtual address.
    Patch {
        image: PathBuf,
        #[arg(value_parser = parse_u32)]
        address: u32,
        #[arg(required = true, num_args = 1.., value_parser = parse_u32)]
        words: Vec<u32>,
    },
    /// Overwrite instructions with `nop`.
    Nop {
        image: PathBuf,
        #[arg(value_parser = parse_u32)]
        address: u32,
        #[arg(short, long, default_value_t = 1)]
        count: usize,
    },
    /// Write a `b` (or `bl`) to a target address.
    Branch {
        image: PathBuf,
        #[arg(value_parser = parse_u32)]
        address: u32,
        #[arg(value_parser = parse_u32)]
        target: u32,
        /// Set the link register (`bl`)
        #[arg(long)]
        link: bool,
    },
}

/// Parses `0x`-prefixed hex or plain decimal.
pub fn parse_u32(s: &str) -> Result<u32, String> {
    let s = s.replace('_', "");
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid number `{s}`: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numbers() {
        assert_eq!(parse_u32("0x80003100"), Ok(0x8000_3100));
        assert_eq!(parse_u32("0X8000_3100"), Ok(0x8000_3100));
        assert_eq!(parse_u32("41"), Ok(41));
        assert!(parse_u32("0x1_0000_0000").is_err());
        assert!(parse_u32("r3").is_err());
    }

    #[test]
    fn parses_patch_command() {
        let config = Config::parse_from(["dolpatch", "patch", "main.dol", "0x80003104", "0x7FC3F378", "0x38800029"]);
        match config.command {
            Command::Patch { address, words, .. } => {
                assert_eq!(address, 0x8000_3104);
                assert_eq!(words, [0x7FC3_F378, 0x3880_0029]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(config.log_level, "info");
    }
}
