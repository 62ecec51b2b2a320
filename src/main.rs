//! Entry point for the dolpatch tool.
//!
//! This file handles high-level application flow:
//! 1. Parse command-line arguments using `clap`.
//! 2. Install the `tracing` subscriber at the requested level.
//! 3. Open the DOL image and run the subcommand, patching inside a session.
//!
//! Error handling is done via `anyhow`.

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use dolpatch::config::{Command, Config};
use dolpatch::image::Image;
use dolpatch::Instruction;

fn main() -> Result<()> {
    let config = Config::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("invalid log level")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match config.command {
        Command::Info { image } => {
            let dol = Image::open_path(&image)
                .with_context(|| format!("failed to open {}", image.display()))?;
            println!("{}", image.display());
            for segment in dol.segments().iter() {
                println!(
                    "  {:<7} {:#010x}..{:#010x}  file {:#08x}  size {:#x}",
                    segment.kind.to_string(),
                    segment.address,
                    segment.end(),
                    segment.file_offset,
                    segment.size
                );
            }
            let bss = dol.bss();
            println!("  bss     {:#010x}..{:#010x}", bss.address, u64::from(bss.address) + u64::from(bss.size));
            println!("  entry   {:#010x}", dol.entry_point());
        }
        Command::Read { image, address, length } => {
            let dol = Image::open_path(&image)
                .with_context(|| format!("failed to open {}", image.display()))?;
            let bytes = dol.read_bytes(address, length)?;
            for (i, line) in bytes.chunks(16).enumerate() {
                let hex: Vec<String> = line.iter().map(|b| format!("{b:02x}")).collect();
                println!("{:08x}: {}", address as usize + i * 16, hex.join(" "));
            }
        }
        Command::Patch { image, address, words } => {
            let instructions: Vec<Instruction> = words.into_iter().map(Instruction::Raw).collect();
            patch(&image, address, &instructions)?;
        }
        Command::Nop { image, address, count } => {
            patch(&image, address, &vec![Instruction::Nop; count])?;
        }
        Command::Branch { image, address, target, link } => {
            let instruction = if link { Instruction::bl(target) } else { Instruction::b(target) };
            patch(&image, address, &[instruction])?;
        }
    }
    Ok(())
}

fn patch(path: &std::path::Path, address: u32, instructions: &[Instruction]) -> Result<()> {
    let mut dol = Image::open_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut session = dol.edit()?;
    session
        .write_instructions(address, instructions)
        .with_context(|| format!("failed to patch {address:#010x}"))?;
    session.finish().context("failed to write image")?;

    for (i, instruction) in instructions.iter().enumerate() {
        tracing::info!("{:#010x}: {instruction}", address as usize + i * 4);
    }
    println!("Patched {} instruction(s) in {}", instructions.len(), path.display());
    Ok(())
}
