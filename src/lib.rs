//! Handoff from coreboot's last stage to ARM Trusted Firmware.
//!
//! This crate loads BL31 (and, on boards that have one, the secure OS) out of
//! the boot flash, preferring images a verification stage has already
//! measured, then builds the parameter blocks BL31 expects and jumps to it
//! with caches clean and the MMU off.
//!
//! Hardware access goes through the traits in `media`, `soc` and `arch`, so
//! the whole sequence runs in unit tests against in-memory fakes.

#![cfg_attr(not(test), no_std)]

pub mod arch;
pub mod bsp;
pub mod config;
pub mod error;
pub mod fuses;
pub mod gbb;
pub mod loader;
pub mod media;
pub mod mtc;
pub mod params;
pub mod poll;
pub mod registry;
pub mod soc;
pub mod tlk;
pub mod transition;
pub mod vbnv;
pub mod vpd;

#[cfg(test)]
mod testutil;

use bsp::Bsp;
use transition::{BootContext, Payload, Platform};

// Select the appropriate BSP type as `Board`
cfg_if::cfg_if! {
    if #[cfg(feature = "target-board-smaug")] {
        pub use bsp::smaug::Board;
    } else if #[cfg(feature = "target-board-qemu-virt")] {
        pub use bsp::qemu_virt::Board;
    }
}

/// Name of the board this image was built for.
pub const BOARD_NAME: &str = env!("RYUBOOT_BOARD");

/// Hands off to BL31 using the selected board's configuration and hooks.
pub fn boot(platform: &mut Platform<'_>, payload: Payload) -> ! {
    log::info!("ryuboot: handoff on {}", BOARD_NAME);
    let mut hooks = <Board as Bsp>::Hooks::default();
    BootContext::new(Board::CONFIG, &mut hooks).run_bl31(platform, payload)
}
