//! Error types.
//!
//! Every failure in the library is surfaced as an [`Error`] at the point of the
//! offending call. Nothing is retried and nothing is downgraded to a partial result.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while encoding or patching.
#[derive(Debug, Error)]
pub enum Error {
    /// A register, immediate or displacement does not fit its field.
    #[error("{operand} value {value} does not fit its {width}-bit field (signed: {signed})")]
    OperandOutOfRange {
        operand: &'static str,
        value: i64,
        width: u32,
        signed: bool,
    },

    /// Branch displacement is not a multiple of four.
    #[error("branch displacement {displacement:#x} is not word aligned")]
    MisalignedTarget { displacement: i64 },

    /// Instruction sequences must start on a word boundary.
    #[error("instruction address {address:#010x} is not word aligned")]
    MisalignedAddress { address: u32 },

    #[error("undefined symbol `{0}`")]
    UndefinedSymbol(String),

    /// Address lies outside every file-backed segment.
    #[error("address {address:#010x} (+{length:#x}) is not mapped by any file-backed segment")]
    AddressNotMapped { address: u32, length: usize },

    /// Write span leaves the segment it starts in.
    #[error("write of {length:#x} bytes at {address:#010x} crosses a segment boundary")]
    CrossSegmentWrite { address: u32, length: usize },

    #[error("image is not editable; open a patch session first")]
    NotEditable,

    #[error("a patch session is already active on this image")]
    SessionAlreadyHeld,

    /// The header violates a structural invariant.
    #[error("invalid DOL image: {0}")]
    Format(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Error::Format(msg.into())
    }
}
