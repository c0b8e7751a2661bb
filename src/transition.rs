// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Handoff from this stage to BL31.
//!
//! The sequence is fixed:
//!
//! 1. Load BL31 (the secure monitor).
//! 2. If the board has one, load BL32 (the secure OS).
//! 3. Fill in the entry point descriptors and the BL31 parameter block,
//!    giving the board hooks a chance to add their own.
//! 4. Clean everything BL31 will read to the point of coherency.
//! 5. Turn off the data cache and the MMU.
//! 6. Jump.
//!
//! Everything up to step 4 can fail, and any failure is fatal. Steps 5 and 6
//! don't fail; if BL31 ever returns, that is fatal too.

use log::{debug, info};

use crate::arch::{address_of, clean_object, Cpu};
use crate::config::{BootConfig, SecureOsConfig, SecureOsLoad};
use crate::error::{die, BootError};
use crate::loader::{load_stage, locate_raw, read_raw};
use crate::media::BootMedia;
use crate::params::{
    Bl31Params, EntryPointInfo, Spsr, PARAM_EP_NON_SECURE, PARAM_EP_SECURE,
};
use crate::registry::ComponentRegistry;
use crate::soc::{Carveout, Dram, MibRange, RegisterAccess, SocDrivers, MIB};
use crate::vpd::VpdStore;

/// Where the handoff currently is. Only ever moves forward.
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub enum Phase {
    Init,
    LoadSecureMonitor,
    LoadSecureOs,
    AssembleParams,
    FlushCache,
    DisableTranslation,
    TransferControl,
}

/// The normal-world payload (BL33), already loaded by the caller.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Payload {
    pub entry: u64,
    pub arg0: u64,
    pub spsr: u32,
}

/// The collaborators a handoff talks to.
pub struct Platform<'a> {
    pub media: &'a mut dyn BootMedia,
    pub registry: ComponentRegistry,
    pub soc: &'a dyn SocDrivers,
    pub regs: &'a dyn RegisterAccess,
    pub vpd: Option<&'a dyn VpdStore>,
    pub cpu: &'a mut dyn Cpu,
    pub dram: &'a mut dyn Dram,
}

/// Board-specific additions to the handoff. Both methods default to doing
/// nothing, which is right for a board without a secure OS.
pub trait PlatformHooks {
    /// Last chance to adjust the BL32 entry point before it is cleaned and
    /// handed over.
    fn prepare_bl32(
        &mut self,
        _platform: &mut Platform<'_>,
        _config: &BootConfig,
        _ep: &mut EntryPointInfo,
    ) -> Result<(), BootError> {
        Ok(())
    }

    /// Returns the address of an extra platform parameter block for BL31, or
    /// `None` for none (BL31 sees zero in x1).
    fn bl31_plat_params(
        &mut self,
        _platform: &mut Platform<'_>,
        _params: &mut Bl31Params,
    ) -> Option<u64> {
        None
    }
}

#[derive(Copy, Clone, Debug, Default)]
pub struct NoHooks;

impl PlatformHooks for NoHooks {}

/// What the final jump needs: BL31's entry and the two pointers it takes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Handoff {
    pub bl31_entry: u64,
    pub params: u64,
    pub plat_params: u64,
}

/// Physical address at which a raw BL32 of `len` bytes is placed: just past
/// the space reserved for BL31 at the bottom of the TZ carveout.
pub fn bl32_load_addr(tz: MibRange, bl31_size_mib: u64, len: usize) -> Result<u64, BootError> {
    let too_large = BootError::Bl32TooLarge { len };
    let addr = tz
        .base_mib
        .checked_add(bl31_size_mib)
        .and_then(|mib| mib.checked_mul(MIB))
        .ok_or(too_large)?;
    let end = addr.checked_add(len as u64).ok_or(too_large)?;
    if end > tz.end_mib() * MIB {
        return Err(too_large);
    }
    Ok(addr)
}

/// State of one handoff. The parameter blocks handed to BL31 live in here, so
/// the context must stay put from `prepare` until the jump; `run_bl31` takes
/// it by value for that reason.
pub struct BootContext<'h> {
    config: BootConfig,
    hooks: &'h mut dyn PlatformHooks,
    phase: Phase,
    bl31_params: Bl31Params,
    bl32_ep_info: EntryPointInfo,
    bl33_ep_info: EntryPointInfo,
}

impl<'h> BootContext<'h> {
    pub fn new(config: BootConfig, hooks: &'h mut dyn PlatformHooks) -> Self {
        Self {
            config,
            hooks,
            phase: Phase::Init,
            bl31_params: Bl31Params::new(),
            bl32_ep_info: EntryPointInfo::default(),
            bl33_ep_info: EntryPointInfo::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn bl31_params(&self) -> &Bl31Params {
        &self.bl31_params
    }

    pub fn bl32_ep_info(&self) -> &EntryPointInfo {
        &self.bl32_ep_info
    }

    pub fn bl33_ep_info(&self) -> &EntryPointInfo {
        &self.bl33_ep_info
    }

    fn enter(&mut self, phase: Phase) {
        debug_assert!(phase >= self.phase);
        debug!("handoff: {:?}", phase);
        self.phase = phase;
    }

    /// Loads the secure images and builds everything BL31 will read, cleaned
    /// from the cache. Returns what the jump needs.
    pub fn prepare(
        &mut self,
        platform: &mut Platform<'_>,
        payload: Payload,
    ) -> Result<Handoff, BootError> {
        self.enter(Phase::LoadSecureMonitor);
        let bl31 = load_stage(&self.config, &platform.registry, platform.media, &self.config.bl31)?;

        self.bl31_params = Bl31Params::new();

        let secure_os_pc = match self.config.secure_os {
            Some(secure_os) => {
                self.enter(Phase::LoadSecureOs);
                Some(self.load_secure_os(platform, &secure_os)?)
            }
            None => None,
        };

        self.enter(Phase::AssembleParams);
        if let Some(pc) = secure_os_pc {
            let spsr = Spsr::EXCEPTION_MASK | Spsr::eret_el(1);
            self.bl32_ep_info = EntryPointInfo::new(PARAM_EP_SECURE, pc, spsr.bits());
            self.hooks
                .prepare_bl32(platform, &self.config, &mut self.bl32_ep_info)?;
            self.bl31_params.bl32_ep_info = address_of(&self.bl32_ep_info);
        }

        self.bl33_ep_info = EntryPointInfo::new(PARAM_EP_NON_SECURE, payload.entry, payload.spsr);
        self.bl33_ep_info.args.arg0 = payload.arg0;
        self.bl31_params.bl33_ep_info = address_of(&self.bl33_ep_info);

        let plat_params = self
            .hooks
            .bl31_plat_params(platform, &mut self.bl31_params)
            .unwrap_or(0);

        self.enter(Phase::FlushCache);
        if secure_os_pc.is_some() {
            clean_object(platform.cpu, &self.bl32_ep_info);
        }
        clean_object(platform.cpu, &self.bl31_params);
        clean_object(platform.cpu, &self.bl33_ep_info);

        Ok(Handoff {
            bl31_entry: bl31.entry,
            params: address_of(&self.bl31_params),
            plat_params,
        })
    }

    fn load_secure_os(
        &mut self,
        platform: &mut Platform<'_>,
        secure_os: &SecureOsConfig,
    ) -> Result<u64, BootError> {
        match secure_os.load {
            SecureOsLoad::Stage => {
                let loaded = load_stage(
                    &self.config,
                    &platform.registry,
                    platform.media,
                    &secure_os.stage,
                )?;
                Ok(loaded.entry)
            }
            SecureOsLoad::Raw => {
                let region =
                    locate_raw(&self.config, &platform.registry, platform.media, &secure_os.stage)?;
                let len = region.len as usize;

                // Placement is checked before a single byte is read.
                let tz = platform.soc.carveout(Carveout::Tz)?;
                let addr = bl32_load_addr(tz, self.config.bl31_size_mib, len)?;

                let dest = platform.dram.window(addr, len)?;
                read_raw(platform.media, region, dest)?;
                info!(
                    "Loaded {} bytes of {} from {:#010x} to {:#x}",
                    len, secure_os.stage.name, region.offset, addr
                );
                Ok(addr)
            }
        }
    }

    /// Performs the whole handoff. Never returns: either BL31 runs, or we
    /// halt.
    pub fn run_bl31(mut self, platform: &mut Platform<'_>, payload: Payload) -> ! {
        let handoff = match self.prepare(platform, payload) {
            Ok(handoff) => handoff,
            Err(e) => die(format_args!("handoff failed in {:?}: {}", self.phase, e)),
        };

        self.enter(Phase::DisableTranslation);
        platform.cpu.dcache_mmu_disable();

        self.enter(Phase::TransferControl);
        // Safety: `prepare` loaded BL31 at `bl31_entry` and cleaned every
        // block reachable from the parameter pointers, which point into
        // `self` and so stay valid for as long as this frame does.
        unsafe {
            platform
                .cpu
                .enter_bl31(handoff.bl31_entry, handoff.params, handoff.plat_params);
        }

        die(format_args!("BL31 returned!"))
    }
}
