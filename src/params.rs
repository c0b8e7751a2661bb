// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ARM Trusted Firmware parameter structures, version 1.
//!
//! These are read by BL31 with its MMU and caches in whatever state it
//! chooses, so the layouts here are an ABI: field order, sizes and padding
//! must match what BL31 was built against. Pointers are carried as `u64`.

use core::mem::size_of;

use bitflags::bitflags;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use static_assertions::const_assert_eq;
use zerocopy::{AsBytes, FromBytes};

#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive)]
pub enum ParamType {
    EntryPoint = 0x01,
    ImageBinary = 0x02,
    Bl31 = 0x03,
}

pub const VERSION_1: u8 = 0x01;

/// `attr` bit 0 of an entry point header: which world the image runs in.
pub const PARAM_EP_SECURE: u32 = 0x0;
pub const PARAM_EP_NON_SECURE: u32 = 0x1;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, AsBytes, FromBytes)]
#[repr(C)]
pub struct ParamHeader {
    pub type_: u8,
    pub version: u8,
    /// Size of the whole structure this header starts, in bytes.
    pub size: u16,
    pub attr: u32,
}

impl ParamHeader {
    /// Builds the header for a structure of type `T`.
    pub fn for_struct<T>(kind: ParamType, version: u8, attr: u32) -> Self {
        Self {
            type_: kind as u8,
            version,
            size: size_of::<T>() as u16,
            attr,
        }
    }

    pub fn kind(&self) -> Option<ParamType> {
        ParamType::from_u8(self.type_)
    }
}

/// Argument registers x0-x7 handed to an image on entry.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, AsBytes, FromBytes)]
#[repr(C)]
pub struct Aapcs64Params {
    pub arg0: u64,
    pub arg1: u64,
    pub arg2: u64,
    pub arg3: u64,
    pub arg4: u64,
    pub arg5: u64,
    pub arg6: u64,
    pub arg7: u64,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, AsBytes, FromBytes)]
#[repr(C)]
pub struct EntryPointInfo {
    pub h: ParamHeader,
    pub pc: u64,
    pub spsr: u32,
    _pad: u32,
    pub args: Aapcs64Params,
}

impl EntryPointInfo {
    pub fn new(attr: u32, pc: u64, spsr: u32) -> Self {
        Self {
            h: ParamHeader::for_struct::<Self>(ParamType::EntryPoint, VERSION_1, attr),
            pc,
            spsr,
            _pad: 0,
            args: Aapcs64Params::default(),
        }
    }
}

/// The block BL31 receives in x0.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, AsBytes, FromBytes)]
#[repr(C)]
pub struct Bl31Params {
    pub h: ParamHeader,
    pub bl31_image_info: u64,
    pub bl32_ep_info: u64,
    pub bl32_image_info: u64,
    pub bl33_ep_info: u64,
    pub bl33_image_info: u64,
}

impl Bl31Params {
    pub fn new() -> Self {
        Self {
            h: ParamHeader::for_struct::<Self>(ParamType::Bl31, VERSION_1, 0),
            ..Self::default()
        }
    }
}

const_assert_eq!(size_of::<ParamHeader>(), 8);
const_assert_eq!(size_of::<Aapcs64Params>(), 64);
const_assert_eq!(size_of::<EntryPointInfo>(), 88);
const_assert_eq!(size_of::<Bl31Params>(), 48);

bitflags! {
    /// Saved program status for an exception return into the next image.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct Spsr: u32 {
        /// Stack pointer select: SP_ELx rather than SP_EL0.
        const SP_ELX = 1 << 0;
        const EL_MASK = 0b11 << 2;
        /// Return into AArch32 state.
        const ERET_32 = 1 << 4;
        const FIQ = 1 << 6;
        const IRQ = 1 << 7;
        const SERROR = 1 << 8;
        const DEBUG = 1 << 9;

        const EXCEPTION_MASK = Self::FIQ.bits()
            | Self::IRQ.bits()
            | Self::SERROR.bits()
            | Self::DEBUG.bits();
    }
}

impl Spsr {
    /// Mode bits for an exception return to `el` using SP_EL0 (`t` variant).
    pub const fn eret_el(el: u32) -> Self {
        Self::from_bits_retain((el & 0b11) << 2)
    }
}
