// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! [`ResetRequest`] backed by the Cortex-M system reset.

use kocherga_core::hal::ResetRequest;

pub struct SysReset;

impl ResetRequest for SysReset {
    fn request_reset(&mut self) -> ! {
        // Give any in-flight response a moment to drain out of the USB FIFO.
        cortex_m::asm::delay(12_000_000);
        cortex_m::peripheral::SCB::sys_reset();
    }
}
