//! Instruction sequences.
//!
//! Turns a list of [`Item`]s into bytes for a given start address. Items may
//! carry labels, which are bound to their address before anything is encoded, so
//! branches can refer to code earlier or later in the same sequence. A few
//! items expand to more than one instruction.

use crate::error::Result;
use crate::isa::instruction::INSTRUCTION_SIZE;
use crate::isa::{Gpr, Instruction};
use crate::symbol::SymbolTable;

/// What an [`Item`] emits. Every variant expands to a fixed number of words,
/// so label addresses are known before anything is encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Instruction(Instruction),
    /// A group of instructions placed and labelled as one unit.
    Composite(Vec<Instruction>),
    /// `lis rd, value@h; ori rd, rd, value@l`
    LoadImmediate32 { rd: Gpr, value: u32 },
    /// Loads this item's own address plus `offset_words` instructions.
    LoadCurrentAddress { rd: Gpr, offset_words: i32 },
}

/// One entry in an assembled sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Name bound to the address of the first word this item emits.
    pub label: Option<String>,
    pub op: Op,
}

impl Item {
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn byte_count(&self) -> u32 {
        match &self.op {
            Op::Instruction(_) => INSTRUCTION_SIZE,
            Op::Composite(instructions) => instructions.len() as u32 * INSTRUCTION_SIZE,
            Op::LoadImmediate32 { .. } | Op::LoadCurrentAddress { .. } => 2 * INSTRUCTION_SIZE,
        }
    }

    /// The plain instructions this item stands for when placed at `address`.
    pub fn expand(&self, address: u32) -> Vec<Instruction> {
        match &self.op {
            Op::Instruction(instruction) => vec![instruction.clone()],
            Op::Composite(instructions) => instructions.clone(),
            Op::LoadImmediate32 { rd, value } => load_immediate_32(*rd, *value).to_vec(),
            Op::LoadCurrentAddress { rd, offset_words } => {
                let value = address.wrapping_add(offset_words.wrapping_mul(4) as u32);
                load_immediate_32(*rd, value).to_vec()
            }
        }
    }
}

impl From<Instruction> for Item {
    fn from(instruction: Instruction) -> Self {
        Item { label: None, op: Op::Instruction(instruction) }
    }
}

impl From<Vec<Instruction>> for Item {
    fn from(instructions: Vec<Instruction>) -> Self {
        Item { label: None, op: Op::Composite(instructions) }
    }
}

impl From<Op> for Item {
    fn from(op: Op) -> Self {
        Item { label: None, op }
    }
}

/// Loads a full 32-bit constant in two instructions.
pub fn load_immediate_32(rd: Gpr, value: u32) -> [Instruction; 2] {
    [
        Instruction::Lis { rd, imm: (value >> 16) as i32 },
        Instruction::Ori { ra: rd, rs: rd, uimm: (value & 0xFFFF) as i32 },
    ]
}

pub fn load_current_address(rd: Gpr, offset_words: i32) -> Item {
    Op::LoadCurrentAddress { rd, offset_words }.into()
}

pub fn byte_count<'a>(items: impl IntoIterator<Item = &'a Item>) -> u32 {
    items.into_iter().map(Item::byte_count).sum()
}

/// Binds every label in `items` to its address, on top of `symbols`.
pub fn bind_labels(address: u32, items: &[Item], symbols: &SymbolTable) -> SymbolTable {
    let mut table = symbols.clone();
    let mut cursor = address;
    for item in items {
        if let Some(label) = &item.label {
            if let Some(previous) = table.insert(label.clone(), cursor) {
                tracing::warn!("label `{label}` at {cursor:#010x} shadows {previous:#010x}");
            }
        }
        cursor = cursor.wrapping_add(item.byte_count());
    }
    table
}

/// Encodes `items` as if placed starting at `address`.
///
/// Nothing is returned unless every item encodes.
pub fn assemble(address: u32, items: &[Item], symbols: &SymbolTable) -> Result<Vec<u8>> {
    let symbols = bind_labels(address, items, symbols);
    let mut out = Vec::with_capacity(byte_count(items) as usize);
    let mut cursor = address;
    for item in items {
        for instruction in item.expand(cursor) {
            out.extend_from_slice(&instruction.encode_with(cursor, &symbols)?);
            tracing::trace!("{cursor:#010x}: {instruction}");
            cursor = cursor.wrapping_add(INSTRUCTION_SIZE);
        }
    }
    Ok(out)
}

/// Encodes plain instructions at consecutive words starting at `address`.
pub fn encode_all(address: u32, instructions: &[Instruction]) -> Result<Vec<u8>> {
    let symbols = SymbolTable::new();
    let mut out = Vec::with_capacity(instructions.len() * INSTRUCTION_SIZE as usize);
    for (i, instruction) in instructions.iter().enumerate() {
        let at = address.wrapping_add(i as u32 * INSTRUCTION_SIZE);
        out.extend_from_slice(&instruction.encode_with(at, &symbols)?);
    }
    Ok(out)
}
