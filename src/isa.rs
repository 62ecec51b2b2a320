//! PowerPC instruction model.
//!
//! This module covers the 32-bit PowerPC subset used by the GameCube and Wii CPUs.
//! It is split into:
//! - `register`: typed register operands.
//! - `form`: the bit-field layouts of the fixed-width instruction forms.
//! - `instruction`: the closed set of supported instructions and their encoding.
//!
//! Nothing in here touches a container; encoding is a pure function of the
//! instruction and, for relative branches, the address it will be placed at.

pub mod form;
pub mod instruction;
pub mod register;

pub use instruction::{BranchTarget, Instruction};
pub use register::*;
