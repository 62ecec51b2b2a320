//! Patch sessions.
//!
//! A [`PatchSession`] is the scope in which an [`Image`] may be written. It holds
//! the image mutably for its whole lifetime, so no other session or read can
//! overlap it. When the session ends its writes are committed exactly once:
//! explicitly through [`PatchSession::finish`], which reports flush errors, or
//! implicitly on drop (including while unwinding), which can only log them.
//! [`PatchSession::discard`] ends the session without committing.

use crate::assembler::Item;
use crate::error::Result;
use crate::image::Image;
use crate::isa::Instruction;
use crate::store::BackingStore;
use crate::symbol::SymbolTable;

/// An open edit window on an [`Image`].
///
/// Created by [`Image::edit`]. Writes go straight to the image buffer and reach
/// the backing store when the session ends.
pub struct PatchSession<'a, S: BackingStore> {
    image: &'a mut Image<S>,
    /// Set once the session has committed or discarded.
    released: bool,
}

impl<'a, S: BackingStore> PatchSession<'a, S> {
    pub(crate) fn new(image: &'a mut Image<S>) -> Result<Self> {
        image.begin_edit()?;
        Ok(Self { image, released: false })
    }

    pub fn image(&self) -> &Image<S> {
        self.image
    }

    pub fn read_bytes(&self, address: u32, length: usize) -> Result<Vec<u8>> {
        self.image.read_bytes(address, length)
    }

    pub fn write_bytes(&mut self, address: u32, bytes: &[u8]) -> Result<()> {
        self.image.write_bytes(address, bytes)
    }

    pub fn write_instructions(&mut self, address: u32, instructions: &[Instruction]) -> Result<()> {
        self.image.write_instructions(address, instructions)
    }

    pub fn write_items(&mut self, address: u32, items: &[Item], symbols: &SymbolTable) -> Result<()> {
        self.image.write_items(address, items, symbols)
    }

    /// Ends the session and commits its writes.
    pub fn finish(mut self) -> Result<()> {
        self.released = true;
        self.image.commit()
    }

    /// Ends the session and throws away everything not yet committed.
    pub fn discard(mut self) {
        self.released = true;
        self.image.revert();
        self.image.release();
    }
}

impl<S: BackingStore> Drop for PatchSession<'_, S> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = self.image.commit() {
            tracing::error!("failed to commit patch session: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::isa::{R3, R4};
    use crate::writer::DolBuilder;

    fn image() -> Image<Vec<u8>> {
        let data = DolBuilder::new(0x8000_3100)
            .text(0x8000_3100, vec![0u8; 0x200])
            .build()
            .unwrap();
        Image::from_bytes(data).unwrap()
    }

    #[test]
    fn finish_commits() {
        let mut image = image();
        let mut session = image.edit().unwrap();
        session.write_instructions(0x8000_3100, &[Instruction::Blr]).unwrap();
        assert_eq!(session.read_bytes(0x8000_3100, 4).unwrap(), [0x4E, 0x80, 0x00, 0x20]);
        session.finish().unwrap();

        assert!(!image.is_editable());
        assert_eq!(&image.store()[0x100..0x104], &[0x4E, 0x80, 0x00, 0x20]);
    }

    #[test]
    fn drop_commits() {
        let mut image = image();
        {
            let mut session = image.edit().unwrap();
            session.write_bytes(0x8000_3200, &[1, 2, 3, 4]).unwrap();
        }
        assert!(!image.is_editable());
        assert!(!image.is_dirty());
        assert_eq!(&image.store()[0x200..0x204], &[1, 2, 3, 4]);
    }

    #[test]
    fn unwinding_commits_writes_made_so_far() {
        let mut image = image();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut session = image.edit().unwrap();
            session.write_bytes(0x8000_3100, &[9; 4]).unwrap();
            panic!("patch script failed");
        }));
        assert!(result.is_err());
        assert!(!image.is_editable());
        assert_eq!(&image.store()[0x100..0x104], &[9; 4]);
    }

    #[test]
    fn discard_reverts() {
        let mut image = image();
        let before = image.to_bytes();
        let mut session = image.edit().unwrap();
        session
            .write_instructions(0x8000_3100, &[Instruction::Li { rd: R3, simm: 1 }, Instruction::Li { rd: R4, simm: 2 }])
            .unwrap();
        session.discard();
        assert!(!image.is_editable());
        assert_eq!(image.as_bytes(), before.as_slice());
        assert_eq!(image.store().as_slice(), before.as_slice());
    }

    #[test]
    fn explicit_edit_blocks_a_session() {
        let mut image = image();
        image.begin_edit().unwrap();
        assert!(matches!(image.edit(), Err(Error::SessionAlreadyHeld)));
    }
}
