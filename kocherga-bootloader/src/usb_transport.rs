// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! USB CDC byte transport. Framing (delimiter, escaping, CRC) is entirely
//! `kocherga_core::serial`'s concern; this module only moves bytes in and
//! out of the USB FIFOs and buffers what the hardware hands back in bursts.

use kocherga_core::hal::SerialPort;
use rp2040_hal::usb::UsbBus;
use usb_device::class_prelude::UsbBusAllocator;
use usb_device::prelude::*;
use usbd_serial::SerialPort as UsbdSerialPort;

const RX_BUF_SIZE: usize = 256;

pub struct UsbTransport {
    serial: UsbdSerialPort<'static, UsbBus>,
    usb_dev: UsbDevice<'static, UsbBus>,
    rx_buf: [u8; RX_BUF_SIZE],
    rx_len: usize,
    rx_pos: usize,
}

impl UsbTransport {
    pub fn new(usb_bus: &'static UsbBusAllocator<UsbBus>) -> Self {
        let serial = UsbdSerialPort::new(usb_bus);
        let usb_dev = UsbDeviceBuilder::new(usb_bus, UsbVidPid(0x2E8A, 0x000A))
            .strings(&[StringDescriptors::default()
                .manufacturer("ADNT")
                .product("Kocherga Bootloader")
                .serial_number("0001")])
            .unwrap()
            .device_class(usbd_serial::USB_CLASS_CDC)
            .build();

        Self {
            serial,
            usb_dev,
            rx_buf: [0u8; RX_BUF_SIZE],
            rx_len: 0,
            rx_pos: 0,
        }
    }

    /// Poll the USB device. Must be called frequently regardless of whether
    /// a byte is pulled this cycle, to keep enumeration and flow control
    /// alive.
    pub fn poll_usb(&mut self) -> bool {
        self.usb_dev.poll(&mut [&mut self.serial])
    }

    fn refill(&mut self) {
        if self.rx_pos < self.rx_len {
            return;
        }
        match self.serial.read(&mut self.rx_buf) {
            Ok(n) if n > 0 => {
                self.rx_len = n;
                self.rx_pos = 0;
            }
            _ => {
                self.rx_len = 0;
                self.rx_pos = 0;
            }
        }
    }
}

impl SerialPort for UsbTransport {
    fn receive(&mut self) -> Option<u8> {
        self.poll_usb();
        self.refill();
        if self.rx_pos < self.rx_len {
            let byte = self.rx_buf[self.rx_pos];
            self.rx_pos += 1;
            Some(byte)
        } else {
            None
        }
    }

    fn send(&mut self, byte: u8) -> bool {
        matches!(self.serial.write(&[byte]), Ok(n) if n > 0)
    }
}
