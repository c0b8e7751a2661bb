// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Memory training code (MTC).
//!
//! MTC is a vendor blob that trains DRAM at every supported frequency and
//! leaves behind a table of the results. We copy it to a fixed address, call
//! it, and keep a copy of its table for the payload, which finds it through
//! an `LbRange` record in the coreboot tables.

use core::mem::size_of;

use log::{error, info};
use static_assertions::const_assert_eq;
use thiserror::Error;
use zerocopy::{AsBytes, FromBytes};

use crate::arch::address_of;
use crate::config::BootConfig;
use crate::error::{DriverError, LoadError};
use crate::loader::{locate_raw, read_raw};
use crate::transition::Platform;

pub const MAX_MTC_TABLE_ENTRIES: usize = 20;
pub const MTC_TABLE_ENTRY_SIZE: usize = 4880;
pub const MTC_TABLE_MAX_SIZE: usize = MAX_MTC_TABLE_ENTRIES * MTC_TABLE_ENTRY_SIZE;

/// Coreboot table tag for the training table record.
pub const LB_TAG_MTC: u32 = 0x2b;

/// Coreboot table record describing a range of memory.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, AsBytes, FromBytes)]
#[repr(C)]
pub struct LbRange {
    pub tag: u32,
    pub size: u32,
    pub range_start: u64,
    pub range_size: u32,
    _pad: u32,
}

const_assert_eq!(size_of::<LbRange>(), 24);

/// A way to run the training blob once it is in memory.
pub trait MtcFirmware {
    /// Calls the blob at `entry`. Returns the address and size of the table
    /// it produced.
    ///
    /// # Safety
    ///
    /// `entry` must hold a complete copy of the blob.
    unsafe fn run(&mut self, entry: u64) -> (u64, usize);
}

/// Calls the blob in place, with the C calling convention it was built for.
pub struct NativeMtc;

impl MtcFirmware for NativeMtc {
    unsafe fn run(&mut self, entry: u64) -> (u64, usize) {
        let mut table: *mut u8 = core::ptr::null_mut();
        // Safety: the caller promises `entry` is the loaded blob, whose entry
        // point is `size_t mtc(void **table)`.
        let mtc: extern "C" fn(*mut *mut u8) -> usize =
            unsafe { core::mem::transmute(entry as usize) };
        let size = mtc(&mut table);
        (table as u64, size)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum MtcError {
    #[error("board has no MTC")]
    NotConfigured,
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error("MTC of {size:#x} bytes exceeds its {max:#x} byte region")]
    TooLarge { size: usize, max: usize },
    #[error("MTC training table size {0:#x} is invalid")]
    InvalidTableSize(usize),
    #[error("no room for {size:#x} byte training table")]
    NoRoom { size: usize },
}

/// The training table, once copied to its final home.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MtcTable {
    pub start: u64,
    pub size: usize,
}

impl MtcTable {
    pub fn lb_record(&self) -> LbRange {
        LbRange {
            tag: LB_TAG_MTC,
            size: size_of::<LbRange>() as u32,
            range_start: self.start,
            range_size: self.size as u32,
            _pad: 0,
        }
    }
}

/// Loads and runs MTC, then copies its table into `table`.
pub fn run_mtc(
    platform: &mut Platform<'_>,
    config: &BootConfig,
    runner: &mut dyn MtcFirmware,
    table: &mut [u8],
) -> Result<MtcTable, MtcError> {
    let mtc = config.mtc.ok_or(MtcError::NotConfigured)?;

    let region = locate_raw(config, &platform.registry, platform.media, &mtc.stage)?;
    let len = region.len as usize;
    if len > mtc.max_size {
        return Err(MtcError::TooLarge { size: len, max: mtc.max_size });
    }

    let dest = platform.dram.window(mtc.load_address, len)?;
    if let Err(e) = read_raw(platform.media, region, dest) {
        error!("MTC read failed: {}", e);
        return Err(e.into());
    }
    info!(
        "MTC: {} bytes loaded from offset {:#x} @ {:#x}",
        len, region.offset, mtc.load_address
    );

    // Safety: the blob was copied to `load_address` in full just above.
    let (src, size) = unsafe { runner.run(mtc.load_address) };
    if size == 0 || size > MTC_TABLE_MAX_SIZE {
        error!("MTC training table size is invalid");
        return Err(MtcError::InvalidTableSize(size));
    }
    info!("MTC: Done. Entries size {:#x} located at {:#x}", size, src);

    let out = table.get_mut(..size).ok_or(MtcError::NoRoom { size })?;
    out.copy_from_slice(platform.dram.window(src, size)?);
    info!("MTC: Copied {:#x} bytes from {:#x} to {:#x}", size, src, address_of(&*out));

    Ok(MtcTable {
        start: address_of(&*out),
        size,
    })
}
