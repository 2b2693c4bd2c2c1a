// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Buffers incoming image bytes into blocks sized to the host's minimum
//! program unit and flushes them to the [`RomBackend`], tracking the linear
//! write offset as it goes.

use crate::hal::RomBackend;

/// Byte written into the unused tail of the final block on `end_write`.
pub const PAD_BYTE: u8 = 0xFF;

/// Accumulates payload bytes into `BLOCK`-sized writes.
///
/// `BLOCK` should match the host's minimum flash program unit (e.g. 256 for
/// the RP2040). Buffering is fully static: no allocation, one `BLOCK`-sized
/// array of working memory. The backend is owned by value rather than
/// borrowed, so a writer can be held as a long-lived field (across many
/// `poll()` calls spanning an entire update) without fighting the borrow
/// checker over who else holds the backend meanwhile.
pub struct ImageWriter<B: RomBackend, const BLOCK: usize> {
    backend: B,
    block: [u8; BLOCK],
    block_len: usize,
    offset: u32,
    total_written: u32,
}

impl<B: RomBackend, const BLOCK: usize> ImageWriter<B, BLOCK> {
    pub fn begin_write(backend: B) -> Self {
        Self {
            backend,
            block: [0u8; BLOCK],
            block_len: 0,
            offset: 0,
            total_written: 0,
        }
    }

    /// Append `bytes`, flushing full blocks to the backend as they fill.
    /// May be called with any length, including zero.
    pub fn write(&mut self, mut bytes: &[u8]) -> Result<(), B::WriteError> {
        while !bytes.is_empty() {
            let space = BLOCK - self.block_len;
            let n = space.min(bytes.len());
            self.block[self.block_len..self.block_len + n].copy_from_slice(&bytes[..n]);
            self.block_len += n;
            self.total_written += n as u32;
            bytes = &bytes[n..];
            if self.block_len == BLOCK {
                self.flush_block()?;
            }
        }
        Ok(())
    }

    fn flush_block(&mut self) -> Result<(), B::WriteError> {
        self.backend.write(self.offset, &self.block[..self.block_len])?;
        self.offset += self.block_len as u32;
        self.block_len = 0;
        Ok(())
    }

    /// Flush a padded partial trailing block, if any, and hand the backend
    /// back regardless of outcome — a write failure here must not strand
    /// the caller without its own hardware handle.
    pub fn end_write(mut self) -> (Result<u32, B::WriteError>, B) {
        if self.block_len > 0 {
            for b in &mut self.block[self.block_len..] {
                *b = PAD_BYTE;
            }
            if let Err(e) = self.backend.write(self.offset, &self.block) {
                return (Err(e), self.backend);
            }
        }
        (Ok(self.total_written), self.backend)
    }

    pub fn bytes_written(&self) -> u32 {
        self.total_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeFlash {
        data: [u8; 1024],
        fail_at: Option<u32>,
    }

    impl RomBackend for FakeFlash {
        type WriteError = ();
        fn read(&self, offset: u32, dst: &mut [u8]) {
            let offset = offset as usize;
            dst.copy_from_slice(&self.data[offset..offset + dst.len()]);
        }
        fn write(&mut self, offset: u32, src: &[u8]) -> Result<(), ()> {
            if self.fail_at == Some(offset) {
                return Err(());
            }
            let offset = offset as usize;
            self.data[offset..offset + src.len()].copy_from_slice(src);
            Ok(())
        }
    }

    #[test]
    fn buffers_and_flushes_full_blocks() {
        let flash = FakeFlash { data: [0; 1024], fail_at: None };
        let mut writer: ImageWriter<FakeFlash, 16> = ImageWriter::begin_write(flash);
        writer.write(&[1u8; 20]).unwrap();
        assert_eq!(writer.bytes_written(), 20);
        let (total, flash) = writer.end_write();
        assert_eq!(total.unwrap(), 20);
        assert_eq!(&flash.data[0..16], &[1u8; 16]);
        assert_eq!(&flash.data[16..20], &[1u8; 4]);
        assert_eq!(&flash.data[20..32], &[PAD_BYTE; 12]);
    }

    #[test]
    fn zero_length_write_is_a_no_op() {
        let flash = FakeFlash { data: [0xAA; 1024], fail_at: None };
        let mut writer: ImageWriter<FakeFlash, 16> = ImageWriter::begin_write(flash);
        writer.write(&[]).unwrap();
        assert_eq!(writer.bytes_written(), 0);
    }

    #[test]
    fn backend_failure_propagates() {
        let flash = FakeFlash { data: [0; 1024], fail_at: Some(0) };
        let mut writer: ImageWriter<FakeFlash, 16> = ImageWriter::begin_write(flash);
        assert!(writer.write(&[1u8; 16]).is_err());
    }

    #[test]
    fn end_write_returns_backend_even_on_failure() {
        let flash = FakeFlash { data: [0; 1024], fail_at: Some(0) };
        let mut writer: ImageWriter<FakeFlash, 16> = ImageWriter::begin_write(flash);
        writer.write(&[1u8; 4]).unwrap();
        let (result, _flash) = writer.end_write();
        assert!(result.is_err());
    }
}
