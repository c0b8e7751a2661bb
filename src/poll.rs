// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bounded busy-waiting.
//!
//! Nothing at this stage sleeps; waiting means spinning on a status bit. Every
//! such spin goes through a `Stopwatch` so it gives up eventually and the
//! caller gets a `Timeout` to classify.

use crate::error::Timeout;
use crate::soc::RegisterAccess;

/// Lock time allowed for a PLL.
pub const PLL_TIMEOUT_US: u64 = 20_000;
/// Time allowed for the USB PHY clock to come up.
pub const USB_TIMEOUT_US: u64 = 200_000;

/// A free-running monotonic microsecond counter.
pub trait Timer {
    fn now_us(&self) -> u64;
}

pub struct Stopwatch<'a> {
    timer: &'a dyn Timer,
    start: u64,
    timeout_us: u64,
}

impl<'a> Stopwatch<'a> {
    pub fn new(timer: &'a dyn Timer, timeout_us: u64) -> Self {
        Self {
            timer,
            start: timer.now_us(),
            timeout_us,
        }
    }

    pub fn elapsed_us(&self) -> u64 {
        self.timer.now_us().wrapping_sub(self.start)
    }

    pub fn expired(&self) -> bool {
        self.elapsed_us() >= self.timeout_us
    }
}

/// Spins until `done` returns true or `timeout_us` passes.
pub fn wait_until(
    timer: &dyn Timer,
    timeout_us: u64,
    mut done: impl FnMut() -> bool,
) -> Result<(), Timeout> {
    let sw = Stopwatch::new(timer, timeout_us);
    loop {
        if done() {
            return Ok(());
        }
        if sw.expired() {
            // One last look, in case we were descheduled by a slow bus.
            return if done() { Ok(()) } else { Err(Timeout(timeout_us)) };
        }
    }
}

/// Spins until every bit of `mask` reads back set at `addr`.
pub fn wait_for_bits(
    regs: &dyn RegisterAccess,
    timer: &dyn Timer,
    addr: u64,
    mask: u32,
    timeout_us: u64,
) -> Result<(), Timeout> {
    wait_until(timer, timeout_us, || regs.read32(addr) & mask == mask)
}
