// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Handoff to the application once the core state machine reports
//! `ReadyToBoot`. The core has already located and CRC-verified the app's
//! descriptor; this module's job is purely the ARM-level jump: relocate the
//! vector table and transfer control.

const SCB_VTOR: *mut u32 = 0xE000_ED08 as *mut u32;

struct VectorTable {
    initial_sp: u32,
    reset_vector: u32,
}

impl VectorTable {
    unsafe fn read_from(addr: u32) -> Self {
        Self {
            initial_sp: (addr as *const u32).read_volatile(),
            reset_vector: (addr as *const u32).offset(1).read_volatile(),
        }
    }
}

/// Relocate the vector table to `app_addr` and jump there. Never returns.
///
/// # Safety
/// `app_addr` must point to a valid Cortex-M vector table (initial SP
/// followed by a reset vector), as already established by the caller via
/// `Bootloader::get_app_info`.
pub unsafe fn jump_to_app(app_addr: u32) -> ! {
    cortex_m::interrupt::disable();

    SCB_VTOR.write_volatile(app_addr);
    cortex_m::asm::dsb();
    cortex_m::asm::isb();

    let vt = VectorTable::read_from(app_addr);

    core::arch::asm!(
        "msr msp, {sp}",
        "cpsie i",
        "bx {reset}",
        sp = in(reg) vt.initial_sp,
        reset = in(reg) vt.reset_vector,
        options(noreturn)
    );
}
