//! DOL patching library.
//!
//! This library assembles PowerPC instructions and writes them into GameCube/Wii
//! DOL executables at virtual addresses. It is organized into several modules:
//! - `isa`: Instruction model, operand types and encoding.
//! - `assembler`: Instruction sequences with labels and multi-word helpers.
//! - `symbol`: Label table for symbolic branch targets.
//! - `header`: The fixed DOL header.
//! - `segment`: Segment table and address translation.
//! - `store`: Backing storage for images.
//! - `image`: The in-memory image and its edit/commit protocol.
//! - `session`: Scoped patch sessions.
//! - `writer`: Building new DOL files.
//! - `config`: CLI configuration.

pub mod assembler;
pub mod config;
pub mod error;
pub mod header;
pub mod image;
pub mod isa;
pub mod segment;
pub mod session;
pub mod store;
pub mod symbol;
pub mod utils;
pub mod writer;

pub use error::{Error, Result};
pub use image::Image;
pub use isa::{BranchTarget, Instruction};
pub use session::PatchSession;
pub use symbol::SymbolTable;
