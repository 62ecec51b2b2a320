//! Segment table.
//!
//! This module maps virtual addresses to file offsets. A DOL image loads up to
//! seven text and eleven data segments; both kinds are treated the same for
//! addressing. The BSS range has no file representation and never translates.

use std::fmt;
use std::ops::Range;

use crate::error::{Error, Result};
use crate::header::{DolHeader, HEADER_SIZE, DATA_SEGMENTS, TEXT_SEGMENTS};

/// Which header slot a segment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    Text(usize),
    Data(usize),
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentKind::Text(i) => write!(f, "text{i}"),
            SegmentKind::Data(i) => write!(f, "data{i}"),
        }
    }
}

/// One contiguous loaded region of the executable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    /// The file offset where this segment's bytes start.
    pub file_offset: u32,
    /// The virtual address the segment is loaded at.
    pub address: u32,
    /// Size in bytes, both in the file and in memory.
    pub size: u32,
}

impl Segment {
    /// One past the last address, widened so segments ending at 2^32 still work.
    pub fn end(&self) -> u64 {
        u64::from(self.address) + u64::from(self.size)
    }

    pub fn contains(&self, address: u32) -> bool {
        address >= self.address && u64::from(address) < self.end()
    }

    pub fn file_range(&self) -> Range<usize> {
        self.file_offset as usize..self.file_offset as usize + self.size as usize
    }
}

/// Uninitialized data: occupies memory at runtime but has no file bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bss {
    pub address: u32,
    pub size: u32,
}

impl Bss {
    pub fn contains(&self, address: u32) -> bool {
        address >= self.address && u64::from(address) < u64::from(self.address) + u64::from(self.size)
    }
}

/// The file-backed segments of an image, sorted by load address.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SegmentTable {
    segments: Vec<Segment>,
    bss: Bss,
}

impl SegmentTable {
    /// Builds the table from a header, checking it against a file of `file_len` bytes.
    ///
    /// Slots with size zero are unused. Every used slot must lie after the header
    /// and inside the file, and no two may overlap in address space.
    pub fn from_header(header: &DolHeader, file_len: usize) -> Result<Self> {
        let mut segments = Vec::new();
        let slots = (0..TEXT_SEGMENTS)
            .map(|i| (SegmentKind::Text(i), header.text(i)))
            .chain((0..DATA_SEGMENTS).map(|i| (SegmentKind::Data(i), header.data(i))));

        for (kind, slot) in slots {
            if slot.size == 0 {
                continue;
            }
            let segment = Segment {
                kind,
                file_offset: slot.offset,
                address: slot.address,
                size: slot.size,
            };
            if (segment.file_offset as usize) < HEADER_SIZE {
                return Err(Error::format(format!(
                    "{kind} starts at file offset {:#x}, inside the header",
                    segment.file_offset
                )));
            }
            if segment.file_range().end > file_len {
                return Err(Error::format(format!(
                    "{kind} ends at file offset {:#x}, past the end of the {file_len:#x}-byte file",
                    segment.file_range().end
                )));
            }
            if segment.end() > 1 << 32 {
                return Err(Error::format(format!(
                    "{kind} at {:#010x} wraps past the top of the address space",
                    segment.address
                )));
            }
            segments.push(segment);
        }

        let (address, size) = header.bss();
        Self::new(segments, Bss { address, size })
    }

    pub fn new(mut segments: Vec<Segment>, bss: Bss) -> Result<Self> {
        segments.sort_by_key(|s| s.address);
        for pair in segments.windows(2) {
            if pair[0].end() > u64::from(pair[1].address) {
                return Err(Error::format(format!(
                    "{} ({:#010x}..{:#010x}) overlaps {} at {:#010x}",
                    pair[0].kind,
                    pair[0].address,
                    pair[0].end(),
                    pair[1].kind,
                    pair[1].address
                )));
            }
        }
        Ok(Self { segments, bss })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn bss(&self) -> Bss {
        self.bss
    }

    pub fn get(&self, kind: SegmentKind) -> Option<&Segment> {
        self.segments.iter().find(|s| s.kind == kind)
    }

    /// The file-backed segment containing `address`, if any.
    pub fn segment_for(&self, address: u32) -> Option<&Segment> {
        let index = self.segments.partition_point(|s| s.address <= address);
        let segment = self.segments.get(index.checked_sub(1)?)?;
        segment.contains(address).then_some(segment)
    }

    /// File offset backing `address`.
    pub fn offset_for(&self, address: u32) -> Result<usize> {
        let segment = self
            .segment_for(address)
            .ok_or(Error::AddressNotMapped { address, length: 1 })?;
        Ok(segment.file_offset as usize + (address - segment.address) as usize)
    }

    /// Virtual address of the byte at file `offset`, if a segment covers it.
    pub fn address_for(&self, offset: usize) -> Option<u32> {
        self.segments
            .iter()
            .find(|s| s.file_range().contains(&offset))
            .map(|s| s.address + (offset - s.file_offset as usize) as u32)
    }

    /// File range backing `length` bytes at `address`, all inside one segment.
    ///
    /// Fails with `AddressNotMapped` when `address` itself is unmapped and with
    /// `CrossSegmentWrite` when the span starts mapped but runs past its segment.
    pub fn span_for(&self, address: u32, length: usize) -> Result<Range<usize>> {
        let segment = self
            .segment_for(address)
            .ok_or(Error::AddressNotMapped { address, length })?;
        let end = u64::from(address).checked_add(length as u64);
        if end.map_or(true, |end| end > segment.end()) {
            return Err(Error::CrossSegmentWrite { address, length });
        }
        let start = segment.file_offset as usize + (address - segment.address) as usize;
        Ok(start..start + length)
    }

    /// File ranges backing `length` bytes at `address`, which may run through
    /// several address-contiguous segments.
    pub fn ranges_for(&self, address: u32, length: usize) -> Result<Vec<Range<usize>>> {
        let not_mapped = Error::AddressNotMapped { address, length };
        let mut ranges = Vec::new();
        let mut cursor = u64::from(address);
        let end = cursor
            .checked_add(length as u64)
            .ok_or(Error::AddressNotMapped { address, length })?;
        while cursor < end {
            let current = u32::try_from(cursor).map_err(|_| Error::AddressNotMapped { address, length })?;
            let segment = match self.segment_for(current) {
                Some(segment) => segment,
                None => return Err(not_mapped),
            };
            let chunk_end = end.min(segment.end());
            let start = segment.file_offset as usize + (current - segment.address) as usize;
            ranges.push(start..start + (chunk_end - cursor) as usize);
            cursor = chunk_end;
        }
        Ok(ranges)
    }
}
