// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Byte-level serial transport for the bootloader link. Implements
//! [`kocherga_core::hal::SerialPort`] directly, so the host speaks the exact
//! same framing (`kocherga_core::serial`) the device's own USB CDC transport
//! does — there is no separate host-side wire format to keep in sync.

use std::io::{Read, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use kocherga_core::hal::SerialPort;

/// Short enough that `receive()` behaves like a poll rather than a block,
/// long enough not to burn the host CPU busy-looping on every byte.
const POLL_TIMEOUT: Duration = Duration::from_millis(2);

/// USB CDC transport for communicating with the bootloader.
pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialTransport {
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(POLL_TIMEOUT)
            .open()
            .with_context(|| format!("failed to open serial port {port_name}"))?;
        Ok(Self { port })
    }

    pub fn port_name(&self) -> String {
        self.port.name().unwrap_or_else(|| "?".to_string())
    }
}

impl SerialPort for SerialTransport {
    fn receive(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        match self.port.read(&mut byte) {
            Ok(1) => Some(byte[0]),
            _ => None,
        }
    }

    fn send(&mut self, byte: u8) -> bool {
        self.port.write_all(&[byte]).is_ok()
    }
}
