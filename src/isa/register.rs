//! Register operands.

use std::fmt;

use crate::error::{Error, Result};

fn check_index(n: u8, width: u32, operand: &'static str) -> Result<u8> {
    if u32::from(n) < (1 << width) {
        Ok(n)
    } else {
        Err(Error::OperandOutOfRange {
            operand,
            value: i64::from(n),
            width,
            signed: false,
        })
    }
}

/// A general-purpose register, `r0` to `r31`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Gpr(u8);

impl Gpr {
    pub fn new(n: u8) -> Result<Self> {
        check_index(n, 5, "general-purpose register").map(Gpr)
    }

    pub fn number(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Gpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// A floating-point register, `f0` to `f31`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fpr(u8);

impl Fpr {
    pub fn new(n: u8) -> Result<Self> {
        check_index(n, 5, "floating-point register").map(Fpr)
    }

    pub fn number(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Fpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{}", self.0)
    }
}

/// One of the eight condition register fields, `cr0` to `cr7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CrField(u8);

impl CrField {
    pub fn new(n: u8) -> Result<Self> {
        check_index(n, 3, "condition register field").map(CrField)
    }

    pub fn number(self) -> u8 {
        self.0
    }
}

impl fmt::Display for CrField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cr{}", self.0)
    }
}

/// A special-purpose register number.
///
/// The SPR field is 10 bits wide and is encoded with its two 5-bit halves swapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Spr(u16);

impl Spr {
    pub fn new(n: u16) -> Result<Self> {
        if n < (1 << 10) {
            Ok(Spr(n))
        } else {
            Err(Error::OperandOutOfRange {
                operand: "special-purpose register",
                value: i64::from(n),
                width: 10,
                signed: false,
            })
        }
    }

    pub fn number(self) -> u16 {
        self.0
    }

    /// Low five bits, which go first in the encoded field.
    pub(crate) fn low(self) -> u16 {
        self.0 & 0b11111
    }

    pub(crate) fn high(self) -> u16 {
        self.0 >> 5
    }
}

impl fmt::Display for Spr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            LR => f.write_str("lr"),
            CTR => f.write_str("ctr"),
            Spr(n) => write!(f, "{n}"),
        }
    }
}

/// Link register.
pub const LR: Spr = Spr(8);
/// Count register.
pub const CTR: Spr = Spr(9);

pub const CR0: CrField = CrField(0);

macro_rules! registers {
    ($ty:ident: $($name:ident = $n:expr),* $(,)?) => {
        $(pub const $name: $ty = $ty($n);)*
    };
}

registers!(Gpr:
    R0 = 0, R1 = 1, R2 = 2, R3 = 3, R4 = 4, R5 = 5, R6 = 6, R7 = 7,
    R8 = 8, R9 = 9, R10 = 10, R11 = 11, R12 = 12, R13 = 13, R14 = 14, R15 = 15,
    R16 = 16, R17 = 17, R18 = 18, R19 = 19, R20 = 20, R21 = 21, R22 = 22, R23 = 23,
    R24 = 24, R25 = 25, R26 = 26, R27 = 27, R28 = 28, R29 = 29, R30 = 30, R31 = 31,
);

registers!(Fpr:
    F0 = 0, F1 = 1, F2 = 2, F3 = 3, F4 = 4, F5 = 5, F6 = 6, F7 = 7,
    F8 = 8, F9 = 9, F10 = 10, F11 = 11, F12 = 12, F13 = 13, F14 = 14, F15 = 15,
    F16 = 16, F17 = 17, F18 = 18, F19 = 19, F20 = 20, F21 = 21, F22 = 22, F23 = 23,
    F24 = 24, F25 = 25, F26 = 26, F27 = 27, F28 = 28, F29 = 29, F30 = 30, F31 = 31,
);
