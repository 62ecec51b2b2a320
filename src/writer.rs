//! DOL file writer.
//!
//! Builds a complete DOL image from segment payloads. Payloads are laid out
//! after the header in slot order (text first, then data), each at a 32-byte
//! aligned file offset, and the header is derived from that layout.

use crate::error::{Error, Result};
use crate::header::{DolHeader, SlotInfo, DATA_SEGMENTS, HEADER_SIZE, TEXT_SEGMENTS};
use crate::utils::align_up;

const SEGMENT_ALIGN: u32 = 0x20;

struct Payload {
    address: u32,
    data: Vec<u8>,
}

/// Builds a new DOL file from segment payloads.
///
/// Payloads are laid out after the header, text before data and otherwise in
/// the order they were added, each at a 0x20-aligned file offset.
pub struct DolBuilder {
    text: Vec<Payload>,
    data: Vec<Payload>,
    bss: (u32, u32),
    entry_point: u32,
}

impl DolBuilder {
    pub fn new(entry_point: u32) -> Self {
        Self {
            text: Vec::new(),
            data: Vec::new(),
            bss: (0, 0),
            entry_point,
        }
    }

    pub fn text(mut self, address: u32, data: impl Into<Vec<u8>>) -> Self {
        self.text.push(Payload { address, data: data.into() });
        self
    }

    pub fn data(mut self, address: u32, data: impl Into<Vec<u8>>) -> Self {
        self.data.push(Payload { address, data: data.into() });
        self
    }

    pub fn bss(mut self, address: u32, size: u32) -> Self {
        self.bss = (address, size);
        self
    }

    pub fn build(&self) -> Result<Vec<u8>> {
        if self.text.len() > TEXT_SEGMENTS {
            return Err(Error::format(format!(
                "{} text segments, at most {TEXT_SEGMENTS} fit in the header",
                self.text.len()
            )));
        }
        if self.data.len() > DATA_SEGMENTS {
            return Err(Error::format(format!(
                "{} data segments, at most {DATA_SEGMENTS} fit in the header",
                self.data.len()
            )));
        }

        let mut header = DolHeader::default();
        let mut buffer = vec![0u8; HEADER_SIZE];

        let place = |payload: &Payload, buffer: &mut Vec<u8>| -> Result<SlotInfo> {
            let size = u32::try_from(payload.data.len())
                .map_err(|_| Error::format("segment larger than 4 GiB"))?;
            let offset = align_up(buffer.len() as u32, SEGMENT_ALIGN);
            buffer.resize(offset as usize, 0);
            buffer.extend_from_slice(&payload.data);
            Ok(SlotInfo { offset, address: payload.address, size })
        };

        for (i, payload) in self.text.iter().enumerate() {
            let slot = place(payload, &mut buffer)?;
            header.set_text(i, slot);
        }
        for (i, payload) in self.data.iter().enumerate() {
            let slot = place(payload, &mut buffer)?;
            header.set_data(i, slot);
        }
        header.set_bss(self.bss.0, self.bss.1);
        header.set_entry_point(self.entry_point);

        buffer[..HEADER_SIZE].copy_from_slice(header.as_bytes());
        Ok(buffer)
    }
}
