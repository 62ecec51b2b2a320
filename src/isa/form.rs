//! Instruction form layouts.
//!
//! Every PowerPC instruction is one of a handful of fixed 32-bit layouts. A
//! [`Form`] lists its fields from the most significant bit down; each field
//! carries its width and whether it holds a two's-complement value.
//! [`Form::compose`] packs operand values into a word and rejects any value that
//! does not fit its field.

use crate::error::{Error, Result};

/// One bit field of an instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Operand name used in range errors.
    pub name: &'static str,
    /// Width in bits.
    pub width: u32,
    /// Whether the field holds a two's complement value.
    pub signed: bool,
}

impl Field {
    const fn unsigned(name: &'static str, width: u32) -> Self {
        Field { name, width, signed: false }
    }

    const fn signed(name: &'static str, width: u32) -> Self {
        Field { name, width, signed: true }
    }

    /// Inclusive range of values the field accepts.
    pub fn range(&self) -> (i64, i64) {
        if self.signed {
            (-(1 << (self.width - 1)), (1 << (self.width - 1)) - 1)
        } else {
            (0, (1 << self.width) - 1)
        }
    }

    fn pack(&self, value: i64) -> Result<u32> {
        let (min, max) = self.range();
        if value < min || value > max {
            return Err(Error::OperandOutOfRange {
                operand: self.name,
                value,
                width: self.width,
                signed: self.signed,
            });
        }
        let mask = (1u64 << self.width) - 1;
        Ok((value as u64 & mask) as u32)
    }
}

/// An instruction layout: its fields from the most significant bit down.
/// The widths of a form always add up to 32.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Form {
    pub name: &'static str,
    pub fields: &'static [Field],
}

impl Form {
    pub const fn width(&self) -> u32 {
        let mut total = 0;
        let mut i = 0;
        while i < self.fields.len() {
            total += self.fields[i].width;
            i += 1;
        }
        total
    }

    /// Bit offset of field `index`, counted from the least significant bit.
    pub fn shift(&self, index: usize) -> u32 {
        self.fields[index + 1..].iter().map(|f| f.width).sum()
    }

    /// Packs `values`, one per field, into an instruction word.
    pub fn compose(&self, values: &[i64]) -> Result<u32> {
        debug_assert_eq!(values.len(), self.fields.len(), "{} form arity", self.name);
        let mut word = 0u32;
        for (field, &value) in self.fields.iter().zip(values) {
            word = (word << field.width) | field.pack(value)?;
        }
        Ok(word)
    }
}

const OPCD: Field = Field::unsigned("opcode", 6);
const RT: Field = Field::unsigned("rD", 5);
const RS: Field = Field::unsigned("rS", 5);
const RA: Field = Field::unsigned("rA", 5);
const RB: Field = Field::unsigned("rB", 5);
const XO10: Field = Field::unsigned("extended opcode", 10);
const RC: Field = Field::unsigned("Rc", 1);
const AA: Field = Field::unsigned("AA", 1);
const LK: Field = Field::unsigned("LK", 1);
const BO: Field = Field::unsigned("BO", 5);
const BI: Field = Field::unsigned("BI", 5);
const BF: Field = Field::unsigned("crfD", 3);
const ZERO1: Field = Field::unsigned("reserved", 1);
const L: Field = Field::unsigned("L", 1);

/// `opcode rD, rA, SIMM` (addi, loads, stores).
pub const D_SIGNED: Form = Form {
    name: "D",
    fields: &[OPCD, RT, RA, Field::signed("SIMM", 16)],
};

/// `opcode rS, rA, UIMM` (ori, addis).
pub const D_UNSIGNED: Form = Form {
    name: "D",
    fields: &[OPCD, RS, RA, Field::unsigned("UIMM", 16)],
};

/// `cmpi crfD, L, rA, SIMM`.
pub const D_COMPARE: Form = Form {
    name: "D",
    fields: &[OPCD, BF, ZERO1, L, RA, Field::signed("SIMM", 16)],
};

/// `opcode rD, rA, rB, XO, Rc`.
pub const X: Form = Form {
    name: "X",
    fields: &[OPCD, RT, RA, RB, XO10, RC],
};

/// `cmp crfD, L, rA, rB`.
pub const X_COMPARE: Form = Form {
    name: "X",
    fields: &[OPCD, BF, ZERO1, L, RA, RB, XO10, ZERO1],
};

/// `opcode rD, rA, rB, OE, XO, Rc` (integer arithmetic).
pub const XO: Form = Form {
    name: "XO",
    fields: &[
        OPCD,
        RT,
        RA,
        RB,
        Field::unsigned("OE", 1),
        Field::unsigned("extended opcode", 9),
        RC,
    ],
};

/// `rlwinm rA, rS, SH, MB, ME`.
pub const M: Form = Form {
    name: "M",
    fields: &[
        OPCD,
        RS,
        RA,
        Field::unsigned("SH", 5),
        Field::unsigned("MB", 5),
        Field::unsigned("ME", 5),
        RC,
    ],
};

/// Unconditional branch: 24-bit signed word displacement.
pub const I: Form = Form {
    name: "I",
    fields: &[OPCD, Field::signed("LI", 24), AA, LK],
};

/// Conditional branch: 14-bit signed word displacement.
pub const B: Form = Form {
    name: "B",
    fields: &[OPCD, BO, BI, Field::signed("BD", 14), AA, LK],
};

/// Branch to LR/CTR.
pub const XL: Form = Form {
    name: "XL",
    fields: &[OPCD, BO, BI, Field::unsigned("reserved", 3), Field::unsigned("BH", 2), XO10, LK],
};

/// `mtspr`/`mfspr`; the SPR number is split into two swapped halves.
pub const XFX: Form = Form {
    name: "XFX",
    fields: &[
        OPCD,
        RT,
        Field::unsigned("SPR[5:9]", 5),
        Field::unsigned("SPR[0:4]", 5),
        XO10,
        ZERO1,
    ],
};

/// Floating-point arithmetic `opcode frD, frA, frB, frC, XO, Rc`.
pub const A: Form = Form {
    name: "A",
    fields: &[
        OPCD,
        Field::unsigned("frD", 5),
        Field::unsigned("frA", 5),
        Field::unsigned("frB", 5),
        Field::unsigned("frC", 5),
        Field::unsigned("extended opcode", 5),
        RC,
    ],
};

pub const ALL: [Form; 12] = [D_SIGNED, D_UNSIGNED, D_COMPARE, X, X_COMPARE, XO, M, I, B, XL, XFX, A];

const _: () = {
    let mut i = 0;
    while i < ALL.len() {
        assert!(ALL[i].width() == 32);
        i += 1;
    }
};
