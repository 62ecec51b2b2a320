//! DOL header.
//!
//! The header is a fixed 0x100-byte block of big-endian words at the start of the
//! file: offsets, load addresses and sizes for seven text and eleven data
//! segments, then the BSS range and the entry point. The trailing padding is kept
//! verbatim so a parsed header serializes back to the exact bytes it came from.

use object::endian::{BigEndian, U32Bytes};
use object::pod::{self, Pod};

use crate::error::{Error, Result};

pub const HEADER_SIZE: usize = 0x100;
pub const TEXT_SEGMENTS: usize = 7;
pub const DATA_SEGMENTS: usize = 11;

type Word = U32Bytes<BigEndian>;

fn word(v: u32) -> Word {
    U32Bytes::new(BigEndian, v)
}

/// The fixed 0x100-byte header at the start of every DOL file.
///
/// Slot `i` of the offset, address and size arrays together describe one
/// segment. A slot with size 0 is unused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct DolHeader {
    /// File offsets of the text segments.
    pub text_offsets: [Word; TEXT_SEGMENTS],
    /// File offsets of the data segments.
    pub data_offsets: [Word; DATA_SEGMENTS],
    /// Load addresses of the text segments.
    pub text_addresses: [Word; TEXT_SEGMENTS],
    /// Load addresses of the data segments.
    pub data_addresses: [Word; DATA_SEGMENTS],
    pub text_sizes: [Word; TEXT_SEGMENTS],
    pub data_sizes: [Word; DATA_SEGMENTS],
    pub bss_address: Word,
    pub bss_size: Word,
    pub entry_point: Word,
    /// Unused tail of the header, kept byte for byte.
    pub padding: [u8; 0x1C],
}

// Only byte arrays, no padding between fields.
unsafe impl Pod for DolHeader {}

const _: () = assert!(std::mem::size_of::<DolHeader>() == HEADER_SIZE);

/// Offset, load address and size of one header slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlotInfo {
    pub offset: u32,
    pub address: u32,
    pub size: u32,
}

impl Default for DolHeader {
    fn default() -> Self {
        Self {
            text_offsets: [word(0); TEXT_SEGMENTS],
            data_offsets: [word(0); DATA_SEGMENTS],
            text_addresses: [word(0); TEXT_SEGMENTS],
            data_addresses: [word(0); DATA_SEGMENTS],
            text_sizes: [word(0); TEXT_SEGMENTS],
            data_sizes: [word(0); DATA_SEGMENTS],
            bss_address: word(0),
            bss_size: word(0),
            entry_point: word(0),
            padding: [0; 0x1C],
        }
    }
}

impl DolHeader {
    /// Reads the header from the start of `data`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::format(format!(
                "file is {:#x} bytes, shorter than the {HEADER_SIZE:#x}-byte header",
                data.len()
            )));
        }
        let (header, _) = pod::from_bytes::<DolHeader>(&data[..HEADER_SIZE])
            .map_err(|()| Error::format("unable to read header"))?;
        Ok(*header)
    }

    pub fn as_bytes(&self) -> &[u8] {
        pod::bytes_of(self)
    }

    pub fn text(&self, index: usize) -> SlotInfo {
        SlotInfo {
            offset: self.text_offsets[index].get(BigEndian),
            address: self.text_addresses[index].get(BigEndian),
            size: self.text_sizes[index].get(BigEndian),
        }
    }

    pub fn data(&self, index: usize) -> SlotInfo {
        SlotInfo {
            offset: self.data_offsets[index].get(BigEndian),
            address: self.data_addresses[index].get(BigEndian),
            size: self.data_sizes[index].get(BigEndian),
        }
    }

    pub fn set_text(&mut self, index: usize, slot: SlotInfo) {
        self.text_offsets[index] = word(slot.offset);
        self.text_addresses[index] = word(slot.address);
        self.text_sizes[index] = word(slot.size);
    }

    pub fn set_data(&mut self, index: usize, slot: SlotInfo) {
        self.data_offsets[index] = word(slot.offset);
        self.data_addresses[index] = word(slot.address);
        self.data_sizes[index] = word(slot.size);
    }

    pub fn bss(&self) -> (u32, u32) {
        (self.bss_address.get(BigEndian), self.bss_size.get(BigEndian))
    }

    pub fn set_bss(&mut self, address: u32, size: u32) {
        self.bss_address = word(address);
        self.bss_size = word(size);
    }

    pub fn entry_point(&self) -> u32 {
        self.entry_point.get(BigEndian)
    }

    pub fn set_entry_point(&mut self, address: u32) {
        self.entry_point = word(address);
    }
}
