// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Chip unique ID, reassembled from the manufacturing fuses.
//!
//! The fuses hold the ID as eight narrow fields (vendor, fab, lot codes,
//! wafer, die coordinates...). The 128-bit ID is those fields packed back to
//! back, low word first:
//!
//! ```text
//!   31 30 29     24 23      15 14       6 5      0
//!  +-----+---------+----------+----------+--------+
//!  |LOT1 |  WAFER  |  X_COOR  |  Y_COOR  |  RSVD  |  uid[0]
//!  |(1:0)|         |          |          |        |
//!  +-----+---------+----------+----------+--------+
//!  | LOT0 (5:0) |           LOT1 (27:2)           |  uid[1]
//!  +------------+---------------------------------+
//!  |    FAB     |           LOT0 (31:6)           |  uid[2]
//!  +------------+---------------------------------+
//!  |                                     | VENDOR |  uid[3]
//!  +-------------------------------------+--------+
//! ```

use crate::soc::{modify32, RegisterAccess};

pub const TEGRA_FUSE_BASE: u64 = 0x7000_f800;
pub const CLK_RST_BASE: u64 = 0x6000_6000;
/// `CLK_RST_CONTROLLER_MISC_CLK_ENB`, which holds the fuse visibility bit.
pub const MISC_CLK_ENB: u64 = CLK_RST_BASE + 0x48;
pub const FUSE_ALL_VISIBLE_SHIFT: u32 = 28;

pub const FUSE_UID_WORDS: usize = 4;

/// A fuse register that feeds the unique ID.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(usize)]
pub enum FuseField {
    VendorCode,
    FabCode,
    LotCode0,
    LotCode1,
    WaferId,
    XCoord,
    YCoord,
    OpsReserved,
}

impl FuseField {
    pub const ALL: [FuseField; 8] = [
        FuseField::VendorCode,
        FuseField::FabCode,
        FuseField::LotCode0,
        FuseField::LotCode1,
        FuseField::WaferId,
        FuseField::XCoord,
        FuseField::YCoord,
        FuseField::OpsReserved,
    ];

    /// Register offset from the fuse block base and the mask of valid bits.
    pub const fn register(self) -> (u64, u32) {
        match self {
            FuseField::VendorCode => (0x200, 0xf),
            FuseField::FabCode => (0x204, 0x3f),
            FuseField::LotCode0 => (0x208, 0xffff_ffff),
            FuseField::LotCode1 => (0x20c, 0x0fff_ffff),
            FuseField::WaferId => (0x210, 0x3f),
            FuseField::XCoord => (0x214, 0x1ff),
            FuseField::YCoord => (0x218, 0x1ff),
            FuseField::OpsReserved => (0x220, 0x3f),
        }
    }
}

/// Raw (masked) fuse values, indexed by `FuseField`.
pub type RawFuses = [u32; 8];

/// One slice of a fuse field placed into the ID.
#[derive(Copy, Clone, Debug)]
pub struct UidPiece {
    /// Destination word of the ID.
    pub word: usize,
    pub source: FuseField,
    /// Bits of the source below this shift belong to another piece.
    pub source_shift: u32,
    /// Bit position in the destination word.
    pub dest_shift: u32,
    pub width: u32,
}

const fn piece(
    word: usize,
    source: FuseField,
    source_shift: u32,
    dest_shift: u32,
    width: u32,
) -> UidPiece {
    UidPiece {
        word,
        source,
        source_shift,
        dest_shift,
        width,
    }
}

/// The layout in the diagram above, as data.
pub const UID_LAYOUT: [UidPiece; 10] = [
    piece(0, FuseField::OpsReserved, 0, 0, 6),
    piece(0, FuseField::YCoord, 0, 6, 9),
    piece(0, FuseField::XCoord, 0, 15, 9),
    piece(0, FuseField::WaferId, 0, 24, 6),
    piece(0, FuseField::LotCode1, 0, 30, 2),
    piece(1, FuseField::LotCode1, 2, 0, 26),
    piece(1, FuseField::LotCode0, 0, 26, 6),
    piece(2, FuseField::LotCode0, 6, 0, 26),
    piece(2, FuseField::FabCode, 0, 26, 6),
    piece(3, FuseField::VendorCode, 0, 0, 4),
];

/// Packs raw fuse values into the unique ID according to `layout`.
pub fn pack_uid(fuses: &RawFuses, layout: &[UidPiece]) -> [u32; FUSE_UID_WORDS] {
    let mut uid = [0u32; FUSE_UID_WORDS];
    for p in layout {
        let mask = if p.width >= 32 { u32::MAX } else { (1 << p.width) - 1 };
        let bits = (fuses[p.source as usize] >> p.source_shift) & mask;
        uid[p.word] |= bits << p.dest_shift;
    }
    uid
}

/// Reads the ID fuses, temporarily making the fuse registers visible if they
/// weren't already.
pub fn read_raw_fuses(regs: &dyn RegisterAccess) -> RawFuses {
    let visible = (regs.read32(MISC_CLK_ENB) >> FUSE_ALL_VISIBLE_SHIFT) & 1 != 0;
    if !visible {
        set_visibility(regs, true);
    }

    let mut raw = [0u32; 8];
    for field in FuseField::ALL {
        let (offset, mask) = field.register();
        raw[field as usize] = regs.read32(TEGRA_FUSE_BASE + offset) & mask;
    }

    if !visible {
        set_visibility(regs, false);
    }
    raw
}

fn set_visibility(regs: &dyn RegisterAccess, visible: bool) {
    modify32(regs, MISC_CLK_ENB, |v| {
        (v & !(1 << FUSE_ALL_VISIBLE_SHIFT)) | (u32::from(visible) << FUSE_ALL_VISIBLE_SHIFT)
    });
}

pub fn read_uid(regs: &dyn RegisterAccess) -> [u32; FUSE_UID_WORDS] {
    pack_uid(&read_raw_fuses(regs), &UID_LAYOUT)
}
