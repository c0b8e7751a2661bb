// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! BSP for Smaug (Tegra210).
//!
//! Smaug runs TLK as its secure OS, copied raw into the TZ carveout, and
//! trains DRAM with MTC before the handoff.

use super::Bsp;
use crate::cbfs_name;
use crate::config::{
    BootConfig, Fallback, MtcConfig, SecureOsConfig, SecureOsLoad, StageSpec, UartId,
};
use crate::registry::ComponentIndex;
use crate::tlk::TlkHooks;

pub enum Board {}

impl Bsp for Board {
    const CONFIG: BootConfig = BootConfig {
        verified_boot: true,
        bl31: StageSpec {
            index: ComponentIndex(1),
            name: cbfs_name!("bl31"),
            fallback: Fallback::Container,
        },
        secure_os: Some(SecureOsConfig {
            stage: StageSpec {
                index: ComponentIndex(2),
                name: cbfs_name!("secure_os"),
                fallback: Fallback::Container,
            },
            load: SecureOsLoad::Raw,
        }),
        bl31_size_mib: 1,
        uart: UartId::A,
        mtc: Some(MtcConfig {
            stage: StageSpec {
                index: ComponentIndex(3),
                name: cbfs_name!("tegra_mtc"),
                fallback: Fallback::Container,
            },
            load_address: 0x8000_1000,
            max_size: 0x2_0000,
        }),
    };

    type Hooks = TlkHooks;
}
