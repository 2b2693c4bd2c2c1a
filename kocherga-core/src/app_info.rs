// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Locates and verifies the `AppInfo` descriptor embedded in the resident
//! application image. This is the one thing the state machine trusts before
//! handing off control, and the last thing it can trust after an interrupted
//! write.

use crate::hal::RomBackend;
use crate::integrity::CRC64;

/// Literal signature a descriptor starts with.
pub const SIGNATURE: [u8; 8] = *b"APDesc00";

/// Fixed size of the descriptor, in bytes.
pub const DESCRIPTOR_SIZE: usize = 32;

/// Descriptors are only ever looked for at multiples of this alignment.
pub const ALIGNMENT: usize = 8;

const FIELD_IMAGE_CRC: core::ops::Range<usize> = 8..16;
const FIELD_IMAGE_SIZE: core::ops::Range<usize> = 16..20;
const FIELD_VCS_REVISION: core::ops::Range<usize> = 20..24;
const FIELD_BUILD_TIMESTAMP: core::ops::Range<usize> = 28..32;

/// Bit flags stored in the descriptor's `Flags` byte.
pub mod flags {
    pub const RELEASE: u8 = 1 << 0;
    pub const DIRTY: u8 = 1 << 1;
}

/// A verified (or at least self-consistent) application descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppInfo {
    pub image_crc: u64,
    pub image_size: u32,
    pub vcs_revision: u32,
    pub version_major: u8,
    pub version_minor: u8,
    pub flags: u8,
    pub build_timestamp_utc: u32,
}

impl AppInfo {
    pub fn is_release(&self) -> bool {
        self.flags & flags::RELEASE != 0
    }

    pub fn is_dirty(&self) -> bool {
        self.flags & flags::DIRTY != 0
    }

    fn parse(bytes: &[u8; DESCRIPTOR_SIZE]) -> Self {
        Self {
            image_crc: u64::from_le_bytes(bytes[FIELD_IMAGE_CRC].try_into().unwrap()),
            image_size: u32::from_le_bytes(bytes[FIELD_IMAGE_SIZE].try_into().unwrap()),
            vcs_revision: u32::from_le_bytes(bytes[FIELD_VCS_REVISION].try_into().unwrap()),
            version_major: bytes[24],
            version_minor: bytes[25],
            flags: bytes[26],
            build_timestamp_utc: u32::from_le_bytes(bytes[FIELD_BUILD_TIMESTAMP].try_into().unwrap()),
        }
    }
}

/// Outcome of [`locate_and_verify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyError {
    /// No descriptor with a self-consistent `ImageSize` was found.
    NotFound,
    /// A candidate descriptor was found but its image does not hash to the
    /// stored `ImageCRC`.
    CrcMismatch,
}

/// A read-only, length-bounded view into ROM, relative to the start of the
/// image region.
pub struct RomRegion<'a, B: RomBackend> {
    backend: &'a B,
    region_len: usize,
}

impl<'a, B: RomBackend> RomRegion<'a, B> {
    pub fn new(backend: &'a B, region_len: usize) -> Self {
        Self { backend, region_len }
    }

    pub fn len(&self) -> usize {
        self.region_len
    }

    pub fn is_empty(&self) -> bool {
        self.region_len == 0
    }

    fn read(&self, offset: usize, dst: &mut [u8]) {
        self.backend.read(offset as u32, dst);
    }
}

/// Scan 8-byte-aligned offsets of `rom` for the first self-consistent
/// `AppInfo` descriptor: signature matches, `ImageSize` reaches at least
/// past the descriptor itself, fits within the region, and is a multiple
/// of 8. The descriptor's reserved byte is not constrained.
pub fn locate<B: RomBackend>(rom: &RomRegion<'_, B>) -> Option<(AppInfo, usize)> {
    let mut offset = 0usize;
    while offset + DESCRIPTOR_SIZE <= rom.len() {
        let mut raw = [0u8; DESCRIPTOR_SIZE];
        rom.read(offset, &mut raw);
        if raw[0..8] == SIGNATURE {
            let info = AppInfo::parse(&raw);
            let size = info.image_size as usize;
            let descriptor_end = offset + DESCRIPTOR_SIZE;
            if size >= descriptor_end && size <= rom.len() && size % 8 == 0 {
                return Some((info, offset));
            }
        }
        offset += ALIGNMENT;
    }
    None
}

/// Recompute CRC-64/WE over `[0, info.image_size)`, treating the 8 bytes of
/// the descriptor's `ImageCRC` field (at `descriptor_offset + 8`) as zero,
/// and compare against the stored value.
pub fn verify<B: RomBackend>(rom: &RomRegion<'_, B>, descriptor_offset: usize, info: &AppInfo) -> bool {
    let crc_field = descriptor_offset + 8..descriptor_offset + 16;

    let mut digest = CRC64.digest();
    let mut buf = [0u8; 256];
    let mut pos = 0usize;
    let end = info.image_size as usize;
    while pos < end {
        let n = buf.len().min(end - pos);
        rom.read(pos, &mut buf[..n]);
        for (i, b) in buf[..n].iter_mut().enumerate() {
            if crc_field.contains(&(pos + i)) {
                *b = 0;
            }
        }
        digest.update(&buf[..n]);
        pos += n;
    }
    digest.finalize() == info.image_crc
}

/// Locate and verify in one step: the operation the state machine runs at
/// every boot before handing off control.
pub fn locate_and_verify<B: RomBackend>(rom: &RomRegion<'_, B>) -> Result<(AppInfo, usize), VerifyError> {
    let (info, offset) = locate(rom).ok_or(VerifyError::NotFound)?;
    if verify(rom, offset, &info) {
        Ok((info, offset))
    } else {
        Err(VerifyError::CrcMismatch)
    }
}
