// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! CRC primitives used throughout the bootloader: CRC-64/WE over firmware
//! images and `VolatileStorage` records, CRC-32C (Castagnoli) over serial
//! frames.
//!
//! Both are exposed as `static` [`Crc`] tables rather than the usual `const`
//! so that a [`crc::Digest`] borrowed from them can live as long as `'static`
//! and be stored across calls, which the serial parser needs to do while it
//! streams header and payload bytes in one at a time.

use crc::{Crc, CRC_32_ISCSI, CRC_64_WE};

/// CRC-64/WE: polynomial 0x42F0E1EBA9EA3693, non-reflected, init/xorout all-ones.
pub static CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_WE);

/// CRC-32C (Castagnoli): reflected polynomial 0x82F63B78, init/xorout all-ones.
pub static CRC32C: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

/// The value a CRC-64/WE register holds after ingesting its own trailer.
pub fn crc64_residue() -> u64 {
    CRC64.algorithm.residue
}

/// The value a CRC-32C register holds after ingesting its own trailer.
pub fn crc32c_residue() -> u32 {
    CRC32C.algorithm.residue
}
