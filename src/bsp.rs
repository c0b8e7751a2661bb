// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Types and hooks for implementing Board Support Packages (BSPs).
//!
//! Most of what differs between boards is data: which images exist, where
//! they are found, how much of the TZ carveout BL31 gets. That lives in a
//! `BootConfig`. The rest is the handoff hooks, for boards whose secure OS
//! wants more than an entry point.
//!
//! To implement a BSP:
//!
//! 1. Create a module within `ryuboot::bsp` named after your board.
//! 2. Define a type in the module called `Board`. This type will never be
//!    instantiated, so it can be arbitrary; an empty enum is easy.
//! 3. Implement `ryuboot::bsp::Bsp` for your `Board` type.
//! 4. Add a `target-board-*` feature to `Cargo.toml`.
//! 5. Add a branch to the `cfg_if` in `src/lib.rs` to detect your board and
//!    select the right `Board` type.

// Note that these modules are not conditionally included. We always compile
// every BSP so that all of them keep building, whichever one is selected.
pub mod qemu_virt;
pub mod smaug;

use crate::config::BootConfig;
use crate::transition::PlatformHooks;

/// Requirements placed upon a BSP type.
pub trait Bsp {
    /// Static description of the board's images and memory layout.
    const CONFIG: BootConfig;

    /// Hooks run during the handoff. Use `transition::NoHooks` if the board
    /// needs none.
    type Hooks: PlatformHooks + Default;
}
