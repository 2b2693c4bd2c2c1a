// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Host-facing contracts the core consumes. Each concrete platform (the
//! embedded binary, a simulation harness, unit tests) supplies its own
//! implementations; nothing in this crate talks to real hardware directly.

/// Flash-style backend: addresses are relative to the image region, and
/// writes are atomic only at the platform's program unit.
pub trait RomBackend {
    type WriteError;

    /// Read `dst.len()` bytes starting at `offset`. Infallible: reading
    /// unprogrammed or unmapped flash yields whatever bytes are there.
    fn read(&self, offset: u32, dst: &mut [u8]);

    /// Program `src` at `offset`. May fail; a failure here is always fatal
    /// to the in-progress update session.
    fn write(&mut self, offset: u32, src: &[u8]) -> Result<(), Self::WriteError>;
}

/// Non-blocking byte-level serial port.
pub trait SerialPort {
    fn receive(&mut self) -> Option<u8>;
    fn send(&mut self, byte: u8) -> bool;
}

/// Monotonic microsecond clock. Must never go backwards.
pub trait Clock {
    fn uptime_us(&self) -> u64;
}

/// Platform reset request. May not return.
pub trait ResetRequest {
    fn request_reset(&mut self) -> !;
}
