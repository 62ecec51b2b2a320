//! Backing stores.
//!
//! An image keeps its bytes in memory and only talks to storage twice: once to
//! load everything on open, and once per commit to write back the regions that
//! changed. The [`BackingStore`] trait is that seam; [`FileStore`] writes through a
//! memory map and `Vec<u8>` keeps everything in memory.

use memmap2::{Mmap, MmapMut};
use std::fs::{File, OpenOptions};
use std::io;
use std::ops::Range;
use std::path::{Path, PathBuf};

pub trait BackingStore {
    /// Reads the whole image.
    fn load(&mut self) -> io::Result<Vec<u8>>;

    /// Writes `buffer[range]` back at the same offset for every range in `dirty`
    /// and makes the result durable.
    ///
    /// The store is the same length as `buffer`; it is never resized.
    fn commit(&mut self, buffer: &[u8], dirty: &[Range<usize>]) -> io::Result<()>;
}

/// An image file on disk.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    file: File,
}

impl FileStore {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn length_mismatch(expected: usize, actual: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("backing store is {actual:#x} bytes, expected {expected:#x}"),
    )
}

impl BackingStore for FileStore {
    fn load(&mut self) -> io::Result<Vec<u8>> {
        if self.file.metadata()?.len() == 0 {
            return Ok(Vec::new());
        }
        let mmap = unsafe { Mmap::map(&self.file)? };
        Ok(mmap.to_vec())
    }

    fn commit(&mut self, buffer: &[u8], dirty: &[Range<usize>]) -> io::Result<()> {
        if dirty.is_empty() {
            return Ok(());
        }
        let mut mmap = unsafe { MmapMut::map_mut(&self.file)? };
        if mmap.len() != buffer.len() {
            return Err(length_mismatch(buffer.len(), mmap.len()));
        }
        for range in dirty {
            mmap[range.clone()].copy_from_slice(&buffer[range.clone()]);
            mmap.flush_range(range.start, range.len())?;
        }
        tracing::debug!("flushed {} region(s) to {}", dirty.len(), self.path.display());
        Ok(())
    }
}

impl BackingStore for Vec<u8> {
    fn load(&mut self) -> io::Result<Vec<u8>> {
        Ok(self.clone())
    }

    fn commit(&mut self, buffer: &[u8], dirty: &[Range<usize>]) -> io::Result<()> {
        if self.len() != buffer.len() {
            return Err(length_mismatch(buffer.len(), self.len()));
        }
        for range in dirty {
            self[range.clone()].copy_from_slice(&buffer[range.clone()]);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn vec_store_writes_only_dirty_ranges() {
        let mut store = vec![0u8; 8];
        let buffer = [1u8; 8];
        store.commit(&buffer, &[1..3, 6..7]).unwrap();
        assert_eq!(store, [0, 1, 1, 0, 0, 0, 1, 0]);
    }

    #[test]
    fn vec_store_rejects_length_change() {
        let mut store = vec![0u8; 4];
        assert!(store.commit(&[0u8; 8], &[0..1]).is_err());
    }

    #[test]
    fn file_store_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0xAA; 16]).unwrap();
        file.flush().unwrap();

        let mut store = FileStore::open(file.path()).unwrap();
        let mut buffer = store.load().unwrap();
        assert_eq!(buffer, [0xAA; 16]);

        buffer[4..8].copy_from_slice(&[1, 2, 3, 4]);
        buffer[12] = 0;
        store.commit(&buffer, &[4..8]).unwrap();

        let on_disk = std::fs::read(file.path()).unwrap();
        let mut expected = [0xAA; 16];
        expected[4..8].copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(on_disk, expected);
    }
}
