//! Supported instructions.
//!
//! [`Instruction`] is a closed set: one variant per mnemonic, each holding only the
//! operands its form needs. Simplified mnemonics (`li`, `nop`, `mr`, `blr`, ...)
//! are kept as their own variants so they print the way they are written, but
//! they encode by rewriting into their general form via [`Instruction::canonical`].

use std::fmt;

use super::form::{self, Form};
use super::register::{CrField, Fpr, Gpr, Spr, CTR, LR, R0};
use crate::error::{Error, Result};
use crate::symbol::SymbolTable;

/// Size of every encoded instruction in bytes.
pub const INSTRUCTION_SIZE: u32 = 4;

/// BO value: branch always.
pub const BO_ALWAYS: u8 = 20;
/// BO value: branch if the condition bit is set.
pub const BO_TRUE: u8 = 12;
/// BO value: branch if the condition bit is clear.
pub const BO_FALSE: u8 = 4;
/// BO value: decrement CTR, branch if it is non-zero.
pub const BO_DNZ: u8 = 16;

/// Condition bits within `cr0`.
pub const CR_LT: u8 = 0;
pub const CR_GT: u8 = 1;
pub const CR_EQ: u8 = 2;

/// Where a branch goes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BranchTarget {
    /// A virtual address; the encoder computes the displacement from the
    /// instruction's own address.
    Absolute(u32),
    /// A byte displacement from the instruction's own address.
    Relative(i32),
    /// A name looked up in a [`SymbolTable`] at encode time.
    Symbol(String),
}

impl BranchTarget {
    /// Effective address of the branch when placed at `address`.
    pub fn resolve(&self, address: u32, symbols: &SymbolTable) -> Result<u32> {
        match self {
            BranchTarget::Absolute(target) => Ok(*target),
            BranchTarget::Relative(displacement) => Ok(address.wrapping_add(*displacement as u32)),
            BranchTarget::Symbol(name) => symbols.resolve(name),
        }
    }

    /// Signed byte displacement from `address`. Address arithmetic wraps at 2^32.
    pub fn displacement(&self, address: u32, symbols: &SymbolTable) -> Result<i64> {
        match self {
            BranchTarget::Relative(displacement) => Ok(i64::from(*displacement)),
            _ => {
                let target = self.resolve(address, symbols)?;
                Ok(i64::from(target.wrapping_sub(address) as i32))
            }
        }
    }
}

impl From<u32> for BranchTarget {
    fn from(address: u32) -> Self {
        BranchTarget::Absolute(address)
    }
}

impl From<&str> for BranchTarget {
    fn from(name: &str) -> Self {
        BranchTarget::Symbol(name.to_string())
    }
}

impl From<String> for BranchTarget {
    fn from(name: String) -> Self {
        BranchTarget::Symbol(name)
    }
}

impl fmt::Display for BranchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchTarget::Absolute(address) => write!(f, "{address:#010x}"),
            BranchTarget::Relative(d) if *d < 0 => write!(f, "$-{:#x}", d.unsigned_abs()),
            BranchTarget::Relative(d) => write!(f, "$+{d:#x}"),
            BranchTarget::Symbol(name) => f.write_str(name),
        }
    }
}

/// A single PowerPC instruction with its operands.
///
/// Simplified mnemonics (`li`, `mr`, `blr`, ...) are their own variants and
/// encode to the same word as the general form they stand for; see
/// [`Instruction::canonical`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Instruction {
    /// A pre-encoded word, written as-is.
    Raw(u32),

    /// `rD = rA + rB`
    Add { rd: Gpr, ra: Gpr, rb: Gpr },
    /// `rD = (rA|0) + SIMM`
    Addi { rd: Gpr, ra: Gpr, simm: i32 },
    /// `rD = (rA|0) + (UIMM << 16)`
    Addis { rd: Gpr, ra: Gpr, imm: i32 },
    /// `addi rD, r0, SIMM`
    Li { rd: Gpr, simm: i32 },
    /// `addis rD, r0, UIMM`
    Lis { rd: Gpr, imm: i32 },
    /// `rD = rA * SIMM`
    Mulli { rd: Gpr, ra: Gpr, simm: i32 },
    /// `rA = rS | rB`
    Or { ra: Gpr, rs: Gpr, rb: Gpr, record: bool },
    /// `or rA, rS, rS`
    Mr { ra: Gpr, rs: Gpr },
    /// `rA = rS | UIMM`
    Ori { ra: Gpr, rs: Gpr, uimm: i32 },
    /// `ori r0, r0, 0`
    Nop,
    /// Rotate left then AND with the mask `MB..=ME`.
    Rlwinm { ra: Gpr, rs: Gpr, sh: u8, mb: u8, me: u8 },

    Cmp { crf: CrField, l: bool, ra: Gpr, rb: Gpr },
    /// `cmp crfD, 0, rA, rB`
    Cmpw { crf: CrField, ra: Gpr, rb: Gpr },
    Cmpwi { crf: CrField, ra: Gpr, simm: i32 },

    Lwz { rd: Gpr, d: i32, ra: Gpr },
    Lhz { rd: Gpr, d: i32, ra: Gpr },
    Lbz { rd: Gpr, d: i32, ra: Gpr },
    /// Load `rD..=r31` from consecutive words.
    Lmw { rd: Gpr, d: i32, ra: Gpr },
    Lfs { frd: Fpr, d: i32, ra: Gpr },
    /// `rD = *(rA + rB)`
    Lwzx { rd: Gpr, ra: Gpr, rb: Gpr },

    Stw { rs: Gpr, d: i32, ra: Gpr },
    Stwu { rs: Gpr, d: i32, ra: Gpr },
    Stb { rs: Gpr, d: i32, ra: Gpr },
    Stmw { rs: Gpr, d: i32, ra: Gpr },
    Stfs { frs: Fpr, d: i32, ra: Gpr },

    /// Unconditional branch (`b`, `bl`, `ba`, `bla`).
    B { target: BranchTarget, link: bool, absolute: bool },
    /// Conditional branch (`bc` and its simplified forms).
    Bc { bo: u8, bi: u8, target: BranchTarget, link: bool, absolute: bool },
    /// Branch conditional to the link register.
    Bclr { bo: u8, bi: u8, bh: u8, link: bool },
    /// `bclr 20, 0`
    Blr,
    /// Branch conditional to the count register.
    Bcctr { bo: u8, bi: u8, bh: u8, link: bool },
    /// `bcctrl 20, 0`
    Bctrl,

    Mtspr { spr: Spr, rs: Gpr },
    Mfspr { rd: Gpr, spr: Spr },
    Mtctr { rs: Gpr },
    Mtlr { rs: Gpr },
    Mflr { rd: Gpr },

    Sync,
    Isync,
    Icbi { ra: Gpr, rb: Gpr },
    Dcbi { ra: Gpr, rb: Gpr },

    /// `frD = frA * frC` (single precision)
    Fmuls { frd: Fpr, fra: Fpr, frc: Fpr },
    /// `frD = frA / frB` (single precision)
    Fdivs { frd: Fpr, fra: Fpr, frb: Fpr },
}

fn reg(r: Gpr) -> i64 {
    i64::from(r.number())
}

fn freg(r: Fpr) -> i64 {
    i64::from(r.number())
}

fn compose<const N: usize>(form: &Form, values: [i64; N]) -> Result<u32> {
    form.compose(&values)
}

/// Turns a byte displacement or address into a word field value.
fn word_field(value: i64) -> Result<i64> {
    if value % 4 != 0 {
        return Err(Error::MisalignedTarget { displacement: value });
    }
    Ok(value / 4)
}

fn branch_field(
    target: &BranchTarget,
    address: u32,
    absolute: bool,
    symbols: &SymbolTable,
) -> Result<i64> {
    if absolute {
        let ea = target.resolve(address, symbols)?;
        word_field(i64::from(ea as i32))
    } else {
        word_field(target.displacement(address, symbols)?)
    }
}

impl Instruction {
    pub fn b(target: impl Into<BranchTarget>) -> Self {
        Instruction::B { target: target.into(), link: false, absolute: false }
    }

    pub fn bl(target: impl Into<BranchTarget>) -> Self {
        Instruction::B { target: target.into(), link: true, absolute: false }
    }

    pub fn bc(bo: u8, bi: u8, target: impl Into<BranchTarget>) -> Self {
        Instruction::Bc { bo, bi, target: target.into(), link: false, absolute: false }
    }

    /// Decrement CTR and branch while it is non-zero.
    pub fn bdnz(target: impl Into<BranchTarget>) -> Self {
        Self::bc(BO_DNZ, 0, target)
    }

    pub fn beq(target: impl Into<BranchTarget>) -> Self {
        Self::bc(BO_TRUE, CR_EQ, target)
    }

    pub fn bne(target: impl Into<BranchTarget>) -> Self {
        Self::bc(BO_FALSE, CR_EQ, target)
    }

    pub fn bgt(target: impl Into<BranchTarget>) -> Self {
        Self::bc(BO_TRUE, CR_GT, target)
    }

    pub fn bge(target: impl Into<BranchTarget>) -> Self {
        Self::bc(BO_FALSE, CR_LT, target)
    }

    pub fn ble(target: impl Into<BranchTarget>) -> Self {
        Self::bc(BO_FALSE, CR_GT, target)
    }

    pub fn blt(target: impl Into<BranchTarget>) -> Self {
        Self::bc(BO_TRUE, CR_LT, target)
    }

    /// The general form a simplified mnemonic stands for. Other instructions are
    /// returned unchanged.
    pub fn canonical(&self) -> Instruction {
        match *self {
            Instruction::Li { rd, simm } => Instruction::Addi { rd, ra: R0, simm },
            Instruction::Lis { rd, imm } => Instruction::Addis { rd, ra: R0, imm },
            Instruction::Mr { ra, rs } => Instruction::Or { ra, rs, rb: rs, record: false },
            Instruction::Nop => Instruction::Ori { ra: R0, rs: R0, uimm: 0 },
            Instruction::Cmpw { crf, ra, rb } => Instruction::Cmp { crf, l: false, ra, rb },
            Instruction::Blr => Instruction::Bclr { bo: BO_ALWAYS, bi: 0, bh: 0, link: false },
            Instruction::Bctrl => Instruction::Bcctr { bo: BO_ALWAYS, bi: 0, bh: 0, link: true },
            Instruction::Mtctr { rs } => Instruction::Mtspr { spr: CTR, rs },
            Instruction::Mtlr { rs } => Instruction::Mtspr { spr: LR, rs },
            Instruction::Mflr { rd } => Instruction::Mfspr { rd, spr: LR },
            _ => self.clone(),
        }
    }

    /// Whether encoding depends on where the instruction is placed.
    pub fn is_position_dependent(&self) -> bool {
        matches!(
            self,
            Instruction::B { absolute: false, .. } | Instruction::Bc { absolute: false, .. }
        )
    }

    /// Encodes the instruction placed at `address`. Symbolic branch targets fail
    /// with [`Error::UndefinedSymbol`]; use [`Instruction::encode_with`] for those.
    pub fn encode(&self, address: u32) -> Result<[u8; 4]> {
        self.encode_with(address, &SymbolTable::new())
    }

    pub fn encode_with(&self, address: u32, symbols: &SymbolTable) -> Result<[u8; 4]> {
        self.word(address, symbols).map(u32::to_be_bytes)
    }

    /// The instruction as a native-endian word.
    pub fn word(&self, address: u32, symbols: &SymbolTable) -> Result<u32> {
        use Instruction::*;

        match self {
            Raw(word) => Ok(*word),

            Add { rd, ra, rb } => compose(&form::XO, [31, reg(*rd), reg(*ra), reg(*rb), 0, 266, 0]),
            Addi { rd, ra, simm } => compose(&form::D_SIGNED, [14, reg(*rd), reg(*ra), i64::from(*simm)]),
            Addis { rd, ra, imm } => compose(&form::D_UNSIGNED, [15, reg(*rd), reg(*ra), i64::from(*imm)]),
            Mulli { rd, ra, simm } => compose(&form::D_SIGNED, [7, reg(*rd), reg(*ra), i64::from(*simm)]),
            Or { ra, rs, rb, record } => compose(
                &form::X,
                [31, reg(*rs), reg(*ra), reg(*rb), 444, i64::from(*record)],
            ),
            Ori { ra, rs, uimm } => compose(&form::D_UNSIGNED, [24, reg(*rs), reg(*ra), i64::from(*uimm)]),
            Rlwinm { ra, rs, sh, mb, me } => compose(
                &form::M,
                [21, reg(*rs), reg(*ra), i64::from(*sh), i64::from(*mb), i64::from(*me), 0],
            ),

            Cmp { crf, l, ra, rb } => compose(
                &form::X_COMPARE,
                [31, i64::from(crf.number()), 0, i64::from(*l), reg(*ra), reg(*rb), 0, 0],
            ),
            Cmpwi { crf, ra, simm } => compose(
                &form::D_COMPARE,
                [11, i64::from(crf.number()), 0, 0, reg(*ra), i64::from(*simm)],
            ),

            Lwz { rd, d, ra } => compose(&form::D_SIGNED, [32, reg(*rd), reg(*ra), i64::from(*d)]),
            Lbz { rd, d, ra } => compose(&form::D_SIGNED, [34, reg(*rd), reg(*ra), i64::from(*d)]),
            Lhz { rd, d, ra } => compose(&form::D_SIGNED, [40, reg(*rd), reg(*ra), i64::from(*d)]),
            Lmw { rd, d, ra } => compose(&form::D_SIGNED, [46, reg(*rd), reg(*ra), i64::from(*d)]),
            Lfs { frd, d, ra } => compose(&form::D_SIGNED, [48, freg(*frd), reg(*ra), i64::from(*d)]),
            Lwzx { rd, ra, rb } => compose(&form::X, [31, reg(*rd), reg(*ra), reg(*rb), 23, 0]),

            Stw { rs, d, ra } => compose(&form::D_SIGNED, [36, reg(*rs), reg(*ra), i64::from(*d)]),
            Stwu { rs, d, ra } => compose(&form::D_SIGNED, [37, reg(*rs), reg(*ra), i64::from(*d)]),
            Stb { rs, d, ra } => compose(&form::D_SIGNED, [38, reg(*rs), reg(*ra), i64::from(*d)]),
            Stmw { rs, d, ra } => compose(&form::D_SIGNED, [47, reg(*rs), reg(*ra), i64::from(*d)]),
            Stfs { frs, d, ra } => compose(&form::D_SIGNED, [52, freg(*frs), reg(*ra), i64::from(*d)]),

            B { target, link, absolute } => {
                let li = branch_field(target, address, *absolute, symbols)?;
                compose(&form::I, [18, li, i64::from(*absolute), i64::from(*link)])
            }
            Bc { bo, bi, target, link, absolute } => {
                let bd = branch_field(target, address, *absolute, symbols)?;
                compose(
                    &form::B,
                    [16, i64::from(*bo), i64::from(*bi), bd, i64::from(*absolute), i64::from(*link)],
                )
            }
            Bclr { bo, bi, bh, link } => compose(
                &form::XL,
                [19, i64::from(*bo), i64::from(*bi), 0, i64::from(*bh), 16, i64::from(*link)],
            ),
            Bcctr { bo, bi, bh, link } => compose(
                &form::XL,
                [19, i64::from(*bo), i64::from(*bi), 0, i64::from(*bh), 528, i64::from(*link)],
            ),

            Mtspr { spr, rs } => compose(
                &form::XFX,
                [31, reg(*rs), i64::from(spr.low()), i64::from(spr.high()), 467, 0],
            ),
            Mfspr { rd, spr } => compose(
                &form::XFX,
                [31, reg(*rd), i64::from(spr.low()), i64::from(spr.high()), 339, 0],
            ),

            Sync => compose(&form::X, [31, 0, 0, 0, 598, 0]),
            Isync => compose(&form::XL, [19, 0, 0, 0, 0, 150, 0]),
            Icbi { ra, rb } => compose(&form::X, [31, 0, reg(*ra), reg(*rb), 982, 0]),
            Dcbi { ra, rb } => compose(&form::X, [31, 0, reg(*ra), reg(*rb), 470, 0]),

            Fmuls { frd, fra, frc } => compose(&form::A, [59, freg(*frd), freg(*fra), 0, freg(*frc), 25, 0]),
            Fdivs { frd, fra, frb } => compose(&form::A, [59, freg(*frd), freg(*fra), freg(*frb), 0, 18, 0]),

            Li { .. } | Lis { .. } | Mr { .. } | Nop | Cmpw { .. } | Blr | Bctrl | Mtctr { .. }
            | Mtlr { .. } | Mflr { .. } => self.canonical().word(address, symbols),
        }
    }
}

struct SignedHex(i32);

impl fmt::Display for SignedHex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < 0 {
            write!(f, "-{:#x}", self.0.unsigned_abs())
        } else {
            write!(f, "{:#x}", self.0)
        }
    }
}

fn branch_suffix(link: bool, absolute: bool) -> &'static str {
    match (link, absolute) {
        (false, false) => "",
        (true, false) => "l",
        (false, true) => "a",
        (true, true) => "la",
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;

        match self {
            Raw(word) => write!(f, ".long {word:#010x}"),
            Add { rd, ra, rb } => write!(f, "add {rd}, {ra}, {rb}"),
            Addi { rd, ra, simm } => write!(f, "addi {rd}, {ra}, {simm}"),
            Addis { rd, ra, imm } => write!(f, "addis {rd}, {ra}, {imm:#x}"),
            Li { rd, simm } => write!(f, "li {rd}, {simm}"),
            Lis { rd, imm } => write!(f, "lis {rd}, {imm:#x}"),
            Mulli { rd, ra, simm } => write!(f, "mulli {rd}, {ra}, {simm}"),
            Or { ra, rs, rb, record } => write!(f, "or{} {ra}, {rs}, {rb}", if *record { "." } else { "" }),
            Mr { ra, rs } => write!(f, "mr {ra}, {rs}"),
            Ori { ra, rs, uimm } => write!(f, "ori {ra}, {rs}, {uimm:#x}"),
            Nop => f.write_str("nop"),
            Rlwinm { ra, rs, sh, mb, me } => write!(f, "rlwinm {ra}, {rs}, {sh}, {mb}, {me}"),
            Cmp { crf, l, ra, rb } => write!(f, "cmp {crf}, {}, {ra}, {rb}", u8::from(*l)),
            Cmpw { crf, ra, rb } => write!(f, "cmpw {crf}, {ra}, {rb}"),
            Cmpwi { crf, ra, simm } => write!(f, "cmpwi {crf}, {ra}, {simm}"),
            Lwz { rd, d, ra } => write!(f, "lwz {rd}, {}({ra})", SignedHex(*d)),
            Lhz { rd, d, ra } => write!(f, "lhz {rd}, {}({ra})", SignedHex(*d)),
            Lbz { rd, d, ra } => write!(f, "lbz {rd}, {}({ra})", SignedHex(*d)),
            Lmw { rd, d, ra } => write!(f, "lmw {rd}, {}({ra})", SignedHex(*d)),
            Lfs { frd, d, ra } => write!(f, "lfs {frd}, {}({ra})", SignedHex(*d)),
            Lwzx { rd, ra, rb } => write!(f, "lwzx {rd}, {ra}, {rb}"),
            Stw { rs, d, ra } => write!(f, "stw {rs}, {}({ra})", SignedHex(*d)),
            Stwu { rs, d, ra } => write!(f, "stwu {rs}, {}({ra})", SignedHex(*d)),
            Stb { rs, d, ra } => write!(f, "stb {rs}, {}({ra})", SignedHex(*d)),
            Stmw { rs, d, ra } => write!(f, "stmw {rs}, {}({ra})", SignedHex(*d)),
            Stfs { frs, d, ra } => write!(f, "stfs {frs}, {}({ra})", SignedHex(*d)),
            B { target, link, absolute } => write!(f, "b{} {target}", branch_suffix(*link, *absolute)),
            Bc { bo, bi, target, link, absolute } => {
                write!(f, "bc{} {bo}, {bi}, {target}", branch_suffix(*link, *absolute))
            }
            Bclr { bo, bi, bh, link } => write!(f, "bclr{} {bo}, {bi}, {bh}", if *link { "l" } else { "" }),
            Blr => f.write_str("blr"),
            Bcctr { bo, bi, bh, link } => write!(f, "bcctr{} {bo}, {bi}, {bh}", if *link { "l" } else { "" }),
            Bctrl => f.write_str("bctrl"),
            Mtspr { spr, rs } => write!(f, "mtspr {spr}, {rs}"),
            Mfspr { rd, spr } => write!(f, "mfspr {rd}, {spr}"),
            Mtctr { rs } => write!(f, "mtctr {rs}"),
            Mtlr { rs } => write!(f, "mtlr {rs}"),
            Mflr { rd } => write!(f, "mflr {rd}"),
            Sync => f.write_str("sync"),
            Isync => f.write_str("isync"),
            Icbi { ra, rb } => write!(f, "icbi {ra}, {rb}"),
            Dcbi { ra, rb } => write!(f, "dcbi {ra}, {rb}"),
            Fmuls { frd, fra, frc } => write!(f, "fmuls {frd}, {fra}, {frc}"),
            Fdivs { frd, fra, frb } => write!(f, "fdivs {frd}, {fra}, {frb}"),
        }
    }
}
