// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! BSP for the QEMU `virt` machine.
//!
//! This is the simplest BSP: no verification stage, no secure OS, no memory
//! training. BL31 comes straight from the container and goes straight to
//! BL33.

use super::Bsp;
use crate::cbfs_name;
use crate::config::{BootConfig, Fallback, StageSpec, UartId};
use crate::registry::ComponentIndex;
use crate::transition::NoHooks;

pub enum Board {}

impl Bsp for Board {
    const CONFIG: BootConfig = BootConfig {
        verified_boot: false,
        bl31: StageSpec {
            index: ComponentIndex(1),
            name: cbfs_name!("bl31"),
            fallback: Fallback::Container,
        },
        secure_os: None,
        bl31_size_mib: 1,
        uart: UartId::None,
        mtc: None,
    };

    type Hooks = NoHooks;
}
