//! DOL image container.
//!
//! [`Image`] owns the full file contents in memory together with the parsed
//! header and segment table. Reads are always allowed. Writes are only accepted
//! while the image is editable, which is the window between [`Image::begin_edit`]
//! and [`Image::commit`] (usually managed by a [`PatchSession`]). A commit flushes
//! only the regions written since the last successful commit.
//!
//! ```text
//! ReadOnly --begin_edit--> Editable --commit--> ReadOnly
//! ```

use std::ops::Range;
use std::path::Path;

use crate::assembler::{self, Item};
use crate::error::{Error, Result};
use crate::header::DolHeader;
use crate::isa::instruction::INSTRUCTION_SIZE;
use crate::isa::Instruction;
use crate::segment::{Bss, SegmentTable};
use crate::session::PatchSession;
use crate::store::{BackingStore, FileStore};
use crate::symbol::SymbolTable;

/// Whether an image currently accepts writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    ReadOnly,
    Editable,
}

/// A DOL executable loaded from a [`BackingStore`].
///
/// Holds the working copy of the file, the parsed header and segment table,
/// and the set of regions written since the last commit.
pub struct Image<S: BackingStore> {
    store: S,
    /// Working copy; reads and writes go here.
    buffer: Vec<u8>,
    /// Contents as of the last successful commit.
    baseline: Vec<u8>,
    header: DolHeader,
    segments: SegmentTable,
    /// File ranges not yet flushed, sorted and disjoint.
    dirty: Vec<Range<usize>>,
    state: State,
}

impl Image<FileStore> {
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(FileStore::open(path)?)
    }
}

impl Image<Vec<u8>> {
    /// An image whose backing store is an in-memory copy of `data`.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Result<Self> {
        Self::open(data.into())
    }
}

impl<S: BackingStore> Image<S> {
    /// Loads the image from `store` and validates its header.
    pub fn open(mut store: S) -> Result<Self> {
        let buffer = store.load()?;
        let header = DolHeader::parse(&buffer)?;
        let segments = SegmentTable::from_header(&header, buffer.len())?;
        tracing::debug!(
            "opened image: {} bytes, {} segments, entry {:#010x}",
            buffer.len(),
            segments.len(),
            header.entry_point()
        );
        Ok(Self {
            store,
            baseline: buffer.clone(),
            buffer,
            header,
            segments,
            dirty: Vec::new(),
            state: State::ReadOnly,
        })
    }

    pub fn header(&self) -> &DolHeader {
        &self.header
    }

    pub fn segments(&self) -> &SegmentTable {
        &self.segments
    }

    pub fn bss(&self) -> Bss {
        self.segments.bss()
    }

    pub fn entry_point(&self) -> u32 {
        self.header.entry_point()
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_editable(&self) -> bool {
        self.state == State::Editable
    }

    /// Whether there are writes not yet flushed to the backing store.
    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// File ranges written since the last successful commit, sorted and disjoint.
    pub fn dirty_regions(&self) -> &[Range<usize>] {
        &self.dirty
    }

    /// The whole file as it currently stands in memory.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.buffer.clone()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Releases the backing store. Uncommitted writes are dropped.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Copies `length` bytes at `address`. The span may run through
    /// address-contiguous segments but every byte must be file-backed.
    pub fn read_bytes(&self, address: u32, length: usize) -> Result<Vec<u8>> {
        let ranges = self.segments.ranges_for(address, length)?;
        let mut out = Vec::with_capacity(ranges.iter().map(|r| r.len()).sum());
        for range in ranges {
            out.extend_from_slice(&self.buffer[range]);
        }
        Ok(out)
    }

    pub fn read_u32(&self, address: u32) -> Result<u32> {
        let bytes = self.read_bytes(address, 4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Writes `bytes` at `address`. The whole span must sit inside one segment;
    /// nothing is written otherwise.
    pub fn write_bytes(&mut self, address: u32, bytes: &[u8]) -> Result<()> {
        if !self.is_editable() {
            return Err(Error::NotEditable);
        }
        let range = self.segments.span_for(address, bytes.len())?;
        if range.is_empty() {
            return Ok(());
        }
        tracing::trace!("write {:#x} bytes at {address:#010x} (file {:#x})", bytes.len(), range.start);
        self.buffer[range.clone()].copy_from_slice(bytes);
        self.mark_dirty(range);
        Ok(())
    }

    /// Encodes `instructions` at consecutive words from `address` and writes them.
    ///
    /// Every instruction is encoded before anything is written, so a failure
    /// leaves the image untouched.
    pub fn write_instructions(&mut self, address: u32, instructions: &[Instruction]) -> Result<()> {
        self.check_instruction_write(address)?;
        let bytes = assembler::encode_all(address, instructions)?;
        self.write_bytes(address, &bytes)
    }

    /// Like [`Image::write_instructions`], for items with labels and multi-word ops.
    pub fn write_items(&mut self, address: u32, items: &[Item], symbols: &SymbolTable) -> Result<()> {
        self.check_instruction_write(address)?;
        let bytes = assembler::assemble(address, items, symbols)?;
        self.write_bytes(address, &bytes)
    }

    fn check_instruction_write(&self, address: u32) -> Result<()> {
        if !self.is_editable() {
            return Err(Error::NotEditable);
        }
        if address % INSTRUCTION_SIZE != 0 {
            return Err(Error::MisalignedAddress { address });
        }
        Ok(())
    }

    fn mark_dirty(&mut self, range: Range<usize>) {
        let index = self.dirty.partition_point(|r| r.end < range.start);
        let mut merged = range;
        while index < self.dirty.len() && self.dirty[index].start <= merged.end {
            let r = self.dirty.remove(index);
            merged = merged.start.min(r.start)..merged.end.max(r.end);
        }
        self.dirty.insert(index, merged);
    }

    /// Makes the image editable.
    pub fn begin_edit(&mut self) -> Result<()> {
        if self.state == State::Editable {
            return Err(Error::SessionAlreadyHeld);
        }
        self.state = State::Editable;
        Ok(())
    }

    /// Flushes dirty regions to the backing store and returns to read-only.
    ///
    /// If the flush fails the image is still returned to read-only, but the
    /// dirty regions are kept so a later commit writes them again.
    pub fn commit(&mut self) -> Result<()> {
        if self.state != State::Editable {
            return Err(Error::NotEditable);
        }
        self.state = State::ReadOnly;
        if self.dirty.is_empty() {
            return Ok(());
        }
        self.store.commit(&self.buffer, &self.dirty)?;
        for range in self.dirty.drain(..) {
            self.baseline[range.clone()].copy_from_slice(&self.buffer[range]);
        }
        tracing::debug!("committed image");
        Ok(())
    }

    /// Throws away every write since the last successful commit.
    pub fn revert(&mut self) {
        for range in self.dirty.drain(..) {
            self.buffer[range.clone()].copy_from_slice(&self.baseline[range]);
        }
    }

    /// Opens a patch session; it commits when finished or dropped.
    pub fn edit(&mut self) -> Result<PatchSession<'_, S>> {
        PatchSession::new(self)
    }

    pub(crate) fn release(&mut self) {
        self.state = State::ReadOnly;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::{R3, R30, R4};
    use crate::writer::DolBuilder;
    use pretty_assertions::assert_eq;
    use std::io;

    fn sample() -> Vec<u8> {
        DolBuilder::new(0x8000_3100)
            .text(0x8000_3100, vec![0u8; 0x200])
            .data(0x8040_0000, vec![0x11; 0x40])
            .bss(0x8050_0000, 0x100)
            .build()
            .unwrap()
    }

    #[test]
    fn opens_and_reads() {
        let image = Image::from_bytes(sample()).unwrap();
        assert_eq!(image.segments().len(), 2);
        assert_eq!(image.entry_point(), 0x8000_3100);
        assert_eq!(image.bss(), Bss { address: 0x8050_0000, size: 0x100 });
        assert_eq!(image.read_bytes(0x8040_0000, 4).unwrap(), [0x11; 4]);
        assert!(matches!(
            image.read_bytes(0x8050_0000, 4),
            Err(Error::AddressNotMapped { .. })
        ));
    }

    #[test]
    fn oversized_reads_are_not_mapped() {
        let image = Image::from_bytes(sample()).unwrap();
        assert!(matches!(
            image.read_bytes(0x9000_0000, usize::MAX >> 1),
            Err(Error::AddressNotMapped { address: 0x9000_0000, .. })
        ));
        assert!(matches!(
            image.read_bytes(0x8000_3100, usize::MAX),
            Err(Error::AddressNotMapped { address: 0x8000_3100, .. })
        ));
        assert!(matches!(
            image.read_bytes(0x8000_3100, 0x201),
            Err(Error::AddressNotMapped { .. })
        ));
    }

    #[test]
    fn writes_require_edit_mode() {
        let mut image = Image::from_bytes(sample()).unwrap();
        assert!(matches!(image.write_bytes(0x8000_3100, &[1]), Err(Error::NotEditable)));
        assert!(matches!(
            image.write_instructions(0x8000_3100, &[Instruction::Nop]),
            Err(Error::NotEditable)
        ));
        assert!(matches!(image.commit(), Err(Error::NotEditable)));
    }

    #[test]
    fn begin_edit_is_not_reentrant() {
        let mut image = Image::from_bytes(sample()).unwrap();
        image.begin_edit().unwrap();
        assert!(matches!(image.begin_edit(), Err(Error::SessionAlreadyHeld)));
        image.commit().unwrap();
        image.begin_edit().unwrap();
    }

    #[test]
    fn commit_flushes_to_store() {
        let original = sample();
        let mut image = Image::from_bytes(original.clone()).unwrap();
        image.begin_edit().unwrap();
        image
            .write_instructions(0x8000_3104, &[Instruction::Mr { ra: R3, rs: R30 }, Instruction::Li { rd: R4, simm: 0x29 }])
            .unwrap();
        assert_eq!(image.store().as_slice(), original.as_slice());
        assert_eq!(image.dirty_regions(), &[0x104..0x10C]);
        image.commit().unwrap();
        assert!(!image.is_dirty());
        assert_eq!(
            &image.store()[0x104..0x10C],
            &[0x7F, 0xC3, 0xF3, 0x78, 0x38, 0x80, 0x00, 0x29]
        );
    }

    #[test]
    fn misaligned_instruction_address() {
        let mut image = Image::from_bytes(sample()).unwrap();
        image.begin_edit().unwrap();
        assert!(matches!(
            image.write_instructions(0x8000_3102, &[Instruction::Nop]),
            Err(Error::MisalignedAddress { address: 0x8000_3102 })
        ));
    }

    #[test]
    fn dirty_regions_merge() {
        let mut image = Image::from_bytes(sample()).unwrap();
        image.begin_edit().unwrap();
        image.write_bytes(0x8000_3110, &[1; 4]).unwrap();
        image.write_bytes(0x8000_3100, &[1; 4]).unwrap();
        image.write_bytes(0x8000_3104, &[1; 4]).unwrap();
        image.write_bytes(0x8000_3120, &[1; 4]).unwrap();
        image.write_bytes(0x8000_310C, &[1; 8]).unwrap();
        assert_eq!(image.dirty_regions(), &[0x100..0x108, 0x10C..0x114, 0x120..0x124]);
    }

    #[test]
    fn revert_restores_baseline() {
        let original = sample();
        let mut image = Image::from_bytes(original.clone()).unwrap();
        image.begin_edit().unwrap();
        image.write_bytes(0x8040_0000, &[0xFF; 8]).unwrap();
        image.revert();
        assert_eq!(image.as_bytes(), original.as_slice());
        assert!(!image.is_dirty());
    }

    /// A store whose flushes can be made to fail.
    struct FlakyStore {
        data: Vec<u8>,
        fail: bool,
    }

    impl BackingStore for FlakyStore {
        fn load(&mut self) -> io::Result<Vec<u8>> {
            Ok(self.data.clone())
        }

        fn commit(&mut self, buffer: &[u8], dirty: &[Range<usize>]) -> io::Result<()> {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            self.data.commit(buffer, dirty)
        }
    }

    #[test]
    fn failed_commit_keeps_dirty_regions() {
        let mut image = Image::open(FlakyStore { data: sample(), fail: true }).unwrap();
        image.begin_edit().unwrap();
        image.write_bytes(0x8000_3100, &[0xAB; 4]).unwrap();
        assert!(matches!(image.commit(), Err(Error::Io(_))));
        assert!(!image.is_editable());
        assert_eq!(image.dirty_regions(), &[0x100..0x104]);

        image.store.fail = false;
        image.begin_edit().unwrap();
        image.commit().unwrap();
        assert_eq!(&image.store().data[0x100..0x104], &[0xAB; 4]);
        assert!(!image.is_dirty());
    }

    #[test]
    fn discard_drops_writes_kept_by_failed_commit() {
        let original = sample();
        let mut image = Image::open(FlakyStore { data: original.clone(), fail: true }).unwrap();
        image.begin_edit().unwrap();
        image.write_bytes(0x8000_3100, &[0xAB; 4]).unwrap();
        assert!(image.commit().is_err());

        let mut session = image.edit().unwrap();
        session.write_bytes(0x8040_0000, &[0xCD; 4]).unwrap();
        session.discard();

        assert!(!image.is_dirty());
        assert!(!image.is_editable());
        assert_eq!(image.as_bytes(), original.as_slice());
    }

    #[test]
    fn bad_header_is_a_format_error() {
        let mut data = sample();
        // text0 size now runs off the end of the file
        data[0x90..0x94].copy_from_slice(&0x1000_0000u32.to_be_bytes());
        assert!(matches!(Image::from_bytes(data), Err(Error::Format(_))));
        assert!(matches!(Image::from_bytes(vec![0u8; 0x20]), Err(Error::Format(_))));
    }
}
