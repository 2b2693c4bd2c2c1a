// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Portable core of the Kocherga bootloader: integrity primitives, the
//! application descriptor verifier, the image writer, the UAVCAN/serial
//! framing codec, the node-protocol reactor, and the top-level state
//! machine.
//!
//! Everything here is `no_std` and allocation-free. Host collaborators
//! (flash, serial port, clock, reset) are consumed through the traits in
//! [`hal`]; nothing in this crate talks to real hardware directly.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod app_info;
pub mod fsm;
pub mod hal;
pub mod hexdump;
pub mod image_writer;
pub mod integrity;
pub mod reactor;
pub mod serial;
pub mod transfer;
pub mod volatile;

pub use app_info::AppInfo;
pub use fsm::{Bootloader, Config, State};
pub use transfer::{DataSpec, NodeId, Priority, Transfer};
