// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Firmware upload tool for kocherga-bootloader via USB CDC.
//!
//! Usage:
//!   kocherga-upload --port /dev/ttyACM0 status
//!   kocherga-upload --port /dev/ttyACM0 upload firmware.bin --remote-path fw/image.bin
//!   kocherga-upload --port /dev/ttyACM0 restart

mod cli;
mod commands;
mod transport;

use anyhow::Result;
use clap::Parser;

/// The bounded payload size the link is parsed with; must match the
/// bootloader's own `Parser`/`SerialNode` instantiation for the frames to
/// agree on what fits in one transfer.
pub const LINK_BUF: usize = kocherga_core::serial::DEFAULT_MAX_PAYLOAD;
pub type Link<'a> = kocherga_core::serial::SerialNode<'a, transport::SerialTransport, LINK_BUF>;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    cli::run(args)
}
