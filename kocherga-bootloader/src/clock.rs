// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! [`Clock`] backed by the RP2040's free-running microsecond timer.

use kocherga_core::hal::Clock;
use rp2040_hal::Timer;

pub struct TimerClock {
    timer: Timer,
}

impl TimerClock {
    pub fn new(timer: Timer) -> Self {
        Self { timer }
    }
}

impl Clock for TimerClock {
    fn uptime_us(&self) -> u64 {
        self.timer.get_counter().ticks()
    }
}
