// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Contracts for the SoC drivers the handoff pulls data from.
//!
//! The drivers themselves (memory controller, carveouts, clocks) live outside
//! this crate. We only describe what we need from them.

use num_derive::FromPrimitive;

use crate::error::DriverError;

/// Raw 32-bit register access.
pub trait RegisterAccess {
    fn read32(&self, addr: u64) -> u32;
    fn write32(&self, addr: u64, value: u32);
}

/// Read-modify-write of one register. Not atomic; nothing else runs.
pub fn modify32(regs: &dyn RegisterAccess, addr: u64, f: impl FnOnce(u32) -> u32) {
    let value = regs.read32(addr);
    regs.write32(addr, f(value));
}

/// Volatile access to identity-mapped device memory.
pub struct Mmio;

impl RegisterAccess for Mmio {
    fn read32(&self, addr: u64) -> u32 {
        // Safety: addresses handed to `Mmio` come from the SoC address map
        // and refer to device registers, which are always mapped at this
        // stage (MMU off, or identity-mapped as device memory).
        unsafe { core::ptr::read_volatile(addr as usize as *const u32) }
    }

    fn write32(&self, addr: u64, value: u32) {
        // Safety: as above.
        unsafe { core::ptr::write_volatile(addr as usize as *mut u32, value) }
    }
}

/// A physical range, in MiB.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct MibRange {
    pub base_mib: u64,
    pub size_mib: u64,
}

impl MibRange {
    pub const fn end_mib(&self) -> u64 {
        self.base_mib + self.size_mib
    }
}

/// Memory-controller carveouts, numbered as the memory controller driver
/// numbers them.
#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive)]
pub enum Carveout {
    Tz = 0,
    Sec = 1,
    Mts = 2,
    Vpr = 3,
    Gpu = 4,
    Nvdec = 5,
    Tsec = 6,
}

pub trait SocDrivers {
    /// DRAM below the 4 GiB boundary.
    fn memory_below_4g(&self) -> Result<MibRange, DriverError>;
    /// DRAM above the 4 GiB boundary, if the board has any.
    fn memory_above_4g(&self) -> Result<Option<MibRange>, DriverError>;
    fn carveout(&self, which: Carveout) -> Result<MibRange, DriverError>;
    /// Whether the device is in developer (unlocked) mode.
    fn developer_mode(&self) -> bool;
}

/// Byte access to physical DRAM, for images copied rather than stage-loaded.
pub trait Dram {
    fn window(&mut self, base: u64, len: usize) -> Result<&mut [u8], DriverError>;
}

/// DRAM reached directly through physical addresses.
pub struct IdentityDram;

impl Dram for IdentityDram {
    fn window(&mut self, base: u64, len: usize) -> Result<&mut [u8], DriverError> {
        if base == 0 || base.checked_add(len as u64).is_none() {
            return Err(DriverError::Window { base, len });
        }
        // Safety: callers only ask for windows inside carveouts or regions
        // the board reserved for this stage, which nothing else references
        // while the handoff runs.
        Ok(unsafe { core::slice::from_raw_parts_mut(base as usize as *mut u8, len) })
    }
}

pub const MIB: u64 = 1 << 20;
