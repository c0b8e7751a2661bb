// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Boot arguments for the Trusted Little Kernel (TLK), our BL32.
//!
//! TLK takes four registers on entry:
//!
//! - x0: bytes of TZ DRAM it may use, counted from its own load address
//! - x1: reserved, zero
//! - x2: address of a `PlatBl32Params` block
//! - x3: `BL32_TLK_MAGIC_VALUE`, so it can tell the block is there
//!
//! The block carries the chip identity, the memory layout and two secrets:
//! the GBB root key (for keymaster) and the encrypted key store from VPD.
//! Missing secrets don't stop the boot; they show up as a zero size and TLK
//! decides what to do without them.

use core::mem::size_of;

use log::warn;
use static_assertions::const_assert_eq;
use zerocopy::{AsBytes, FromBytes};

use crate::arch::{address_of, clean_object};
use crate::config::BootConfig;
use crate::error::BootError;
use crate::fuses::{self, FUSE_UID_WORDS};
use crate::gbb;
use crate::params::{Aapcs64Params, EntryPointInfo, Spsr};
use crate::soc::{Carveout, MIB};
use crate::transition::{bl32_load_addr, Platform, PlatformHooks};
use crate::vpd;

pub const MAX_KEYMASTER_KEY_SIZE: usize = 4096;
pub const MAX_EKS_SIZE: usize = 2048;

pub const TLK_BOOT_PARAMS_VERSION: u32 = 1;
pub const BL32_TLK_MAGIC_VALUE: u64 = 0xCAFE_BABE;

/// The block TLK finds through x2. Memory ranges are in MiB.
#[derive(Copy, Clone, AsBytes, FromBytes)]
#[repr(C)]
pub struct PlatBl32Params {
    pub version: u32,
    pub uart_id: u32,
    pub chip_uid: [u32; FUSE_UID_WORDS],
    pub primary_dram_base: u64,
    pub primary_dram_size: u64,
    pub extended_dram_base: u64,
    pub extended_dram_size: u64,
    pub tsec_carveout_base: u64,
    pub tsec_carveout_size: u64,
    /// Not used on any board we build for; always zero.
    pub dtb_load_addr: u64,
    pub is_unlocked: u8,
    _pad0: [u8; 3],
    pub keymaster_key_size: u32,
    pub keymaster_key: [u8; MAX_KEYMASTER_KEY_SIZE],
    pub encrypted_key_size: u32,
    pub encrypted_keys: [u8; MAX_EKS_SIZE],
    _pad1: [u8; 4],
}

const_assert_eq!(size_of::<PlatBl32Params>(), 6240);

impl PlatBl32Params {
    pub fn new() -> Self {
        Self::new_zeroed()
    }

    /// Rebuilds the block from scratch and points `args` at it.
    ///
    /// Memory geometry and the chip ID are required; an error there is
    /// returned and the boot should not go on. The secrets are optional.
    pub fn fill(
        &mut self,
        platform: &mut Platform<'_>,
        config: &BootConfig,
        args: &mut Aapcs64Params,
    ) -> Result<(), BootError> {
        // Nothing from a previous fill survives, secrets included, even if
        // this one fails part way.
        self.as_bytes_mut().fill(0);

        let tz = platform.soc.carveout(Carveout::Tz)?;
        let tz_end = tz.end_mib() * MIB;
        let bl32_base = bl32_load_addr(tz, config.bl31_size_mib, 0)?;

        self.version = TLK_BOOT_PARAMS_VERSION;
        self.uart_id = config.uart as u32;
        self.chip_uid = fuses::read_uid(platform.regs);

        let below = platform.soc.memory_below_4g()?;
        self.primary_dram_base = below.base_mib;
        self.primary_dram_size = below.size_mib;
        if let Some(above) = platform.soc.memory_above_4g()? {
            self.extended_dram_base = above.base_mib;
            self.extended_dram_size = above.size_mib;
        }

        let tsec = platform.soc.carveout(Carveout::Tsec)?;
        self.tsec_carveout_base = tsec.base_mib;
        self.tsec_carveout_size = tsec.size_mib;

        self.is_unlocked = u8::from(platform.soc.developer_mode());

        self.keymaster_key_size = match gbb::read_root_key(platform.media, &mut self.keymaster_key) {
            Ok(n) => n as u32,
            Err(e) => {
                warn!("keymaster key unavailable: {}", e);
                self.keymaster_key.fill(0);
                0
            }
        };

        self.encrypted_key_size = match vpd::read_eks(platform.vpd, &mut self.encrypted_keys) {
            Ok(n) => n as u32,
            Err(_) => {
                warn!("WARNING: No EKS");
                0
            }
        };

        clean_object(platform.cpu, &*self);

        args.arg0 = tz_end - bl32_base;
        args.arg1 = 0;
        args.arg2 = address_of(&*self);
        args.arg3 = BL32_TLK_MAGIC_VALUE;
        Ok(())
    }
}

/// Hooks for boards that run TLK as BL32. TLK is an AArch32 kernel.
pub struct TlkHooks {
    params: PlatBl32Params,
}

impl TlkHooks {
    pub fn new() -> Self {
        Self {
            params: PlatBl32Params::new(),
        }
    }

    pub fn params(&self) -> &PlatBl32Params {
        &self.params
    }
}

impl Default for TlkHooks {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformHooks for TlkHooks {
    fn prepare_bl32(
        &mut self,
        platform: &mut Platform<'_>,
        config: &BootConfig,
        ep: &mut EntryPointInfo,
    ) -> Result<(), BootError> {
        ep.spsr |= Spsr::ERET_32.bits();
        self.params.fill(platform, config, &mut ep.args)
    }
}
