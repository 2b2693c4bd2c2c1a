// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Kocherga bootloader for RP2040: wires the portable core to real flash,
//! USB CDC, the hardware timer, and the Cortex-M system reset.

#![no_std]
#![no_main]

mod boot;
mod clock;
mod flash;
mod peripherals;
mod reset;
mod usb_transport;

use defmt_rtt as _;
use panic_probe as _;

defmt::timestamp!("{=u64:us}", { 0 });

use cortex_m_rt::entry;
use kocherga_core::fsm::{Bootloader, Config, State};
use kocherga_core::reactor::{NodeInfoResponse, NodeName, Reactor};
use kocherga_core::serial::{SerialNode, DEFAULT_MAX_PAYLOAD};
use kocherga_core::transfer::NodeId;
use rp2040_hal::usb::UsbBus;
use usb_device::class_prelude::UsbBusAllocator;

#[unsafe(link_section = ".boot2")]
#[used]
pub static BOOT2: [u8; 256] = rp2040_boot2::BOOT_LOADER_GENERIC_03H;

const LOCAL_NODE_ID: NodeId = NodeId(125);
const MAX_NODES: usize = 1;
const FLASH_BLOCK: usize = flash::FLASH_PAGE_SIZE as usize;

/// Reserved RAM for the cross-reset resume hint (spec.md §4.1's
/// VolatileStorage channel). Must be excluded from `.bss`/`.data`/the stack
/// by the link step; left as a fixed address pending a dedicated NOINIT
/// linker section, the same way the teacher reserves a RAM flag address.
const VOLATILE_REGION_ADDR: u32 = 0x2003_FF00;

fn state_label(state: State) -> &'static str {
    match state {
        State::NoAppToBoot => "NoAppToBoot",
        State::BootDelay => "BootDelay",
        State::BootCancelled => "BootCancelled",
        State::AppUpgradeInProgress => "AppUpgradeInProgress",
        State::ReadyToBoot => "ReadyToBoot",
    }
}

#[entry]
fn main() -> ! {
    defmt::println!("Kocherga bootloader init");

    let mut p = peripherals::init();
    peripherals::blink(&mut p.led_pin, &mut p.timer, 3, 200);
    flash::init();

    let clock = clock::TimerClock::new(p.timer);

    let node_info = NodeInfoResponse::new(
        (1, 0),
        (1, 0),
        // TODO: read the 64-bit flash UID via the QSPI unique-id command
        // instead of reporting all zeroes.
        [0u8; 16],
        NodeName::from_bytes(b"kocherga-bootloader"),
    );
    let reactor = Reactor::<MAX_NODES>::new(node_info, 512, 500_000, 3);

    let mut usb = p.usb.take().expect("USB peripherals already taken");
    let usb_bus = UsbBusAllocator::new(UsbBus::new(
        usb.regs,
        usb.dpram,
        usb.clock,
        true,
        &mut usb.resets,
    ));
    peripherals::store_usb_bus(usb_bus);
    let mut transport = usb_transport::UsbTransport::new(peripherals::usb_bus_ref());
    let mut node: SerialNode<'_, usb_transport::UsbTransport, DEFAULT_MAX_PAYLOAD> =
        SerialNode::new(&mut transport, LOCAL_NODE_ID);

    let mut bl: Bootloader<
        '_,
        flash::FlashBackend,
        clock::TimerClock,
        reset::SysReset,
        MAX_NODES,
        FLASH_BLOCK,
    > = unsafe {
        Bootloader::new(
            flash::FlashBackend,
            flash::APP_REGION_LEN as usize,
            clock,
            reset::SysReset,
            reactor,
            Config::default(),
            VOLATILE_REGION_ADDR as *mut u8,
        )
    };
    bl.add_node(&mut node).ok();

    defmt::println!("State: {}", state_label(bl.get_state()));
    let mut last_state = bl.get_state();

    loop {
        let state = bl.poll();
        if state != last_state {
            defmt::println!("State: {}", state_label(state));
            last_state = state;
        }
        if state == State::ReadyToBoot {
            break;
        }
    }

    defmt::println!("Jumping to application");
    unsafe { boot::jump_to_app(flash::APP_FLASH_ADDR) }
}
