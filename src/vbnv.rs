// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Vboot non-volatile storage (VBNV): the 16-byte block that survives reboots
//! and carries, among other things, the reason for entering recovery.

use crc_catalog::CRC_8_SMBUS;
use log::info;

pub const VBNV_BLOCK_SIZE: usize = 16;
pub const RECOVERY_OFFSET: usize = 2;
/// The last byte is a CRC-8 of all the others.
pub const CRC_OFFSET: usize = 15;

pub type VbnvBlock = [u8; VBNV_BLOCK_SIZE];

/// Wherever the board keeps its VBNV block (EC, CMOS, flash...).
pub trait NvStorage {
    fn read_vbnv(&mut self) -> VbnvBlock;
    fn save_vbnv(&mut self, block: &VbnvBlock);
}

/// CRC over the bytes that precede the CRC byte.
pub fn block_crc(block: &VbnvBlock) -> u8 {
    tinycrc::checksum(&CRC_8_SMBUS, &block[..CRC_OFFSET])
}

pub fn is_valid(block: &VbnvBlock) -> bool {
    block[CRC_OFFSET] == block_crc(block)
}

/// Stores `reason` as the recovery request and re-seals the block.
pub fn update_recovery(nv: &mut dyn NvStorage, reason: u8) {
    let mut block = nv.read_vbnv();
    block[RECOVERY_OFFSET] = reason;
    block[CRC_OFFSET] = block_crc(&block);
    nv.save_vbnv(&block);
}

/// Records a pending recovery request, unless the EC is running its RO image
/// (in which case it will come back around to recovery by itself). Returns
/// whether anything was written.
pub fn record_recovery_request(nv: &mut dyn NvStorage, reason: u8, ec_in_ro: bool) -> bool {
    if reason == 0 || ec_in_ro {
        return false;
    }
    info!("saving recovery reason {:#04x}", reason);
    update_recovery(nv, reason);
    true
}
