// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Read access to the verified-component registry left behind by verstage.
//!
//! Verstage zeroes the whole component array before filling in the images it
//! managed to verify, so a record with `size == 0` is simply "not verified".
//! There is no other presence flag.

use core::mem::size_of;

use static_assertions::const_assert_eq;
use zerocopy::{AsBytes, FromBytes};

use crate::media::read_prefix;

/// Number of slots in the handoff component array. Fixed by the producer.
pub const MAX_PARSED_FW_COMPONENTS: usize = 6;

/// One verified image: where it sits on the boot media and how long it is.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, AsBytes, FromBytes)]
#[repr(C)]
pub struct FirmwareComponent {
    pub address: u32,
    pub size: u32,
}

const_assert_eq!(size_of::<FirmwareComponent>(), 8);

impl FirmwareComponent {
    pub fn is_present(&self) -> bool {
        self.size != 0
    }
}

/// Leading, fixed part of the vboot handoff record. The shared-data area that
/// follows the component array is not ours to read.
#[derive(Copy, Clone, Debug, AsBytes, FromBytes)]
#[repr(C)]
pub struct VbootHandoff {
    pub init_flags: u32,
    pub out_flags: u32,
    pub selected_firmware: u32,
    pub components: [FirmwareComponent; MAX_PARSED_FW_COMPONENTS],
}

const_assert_eq!(size_of::<VbootHandoff>(), 12 + 8 * MAX_PARSED_FW_COMPONENTS);

/// Index of an image in the component array.
///
/// The set of indices is fixed per build, so an out-of-range index is a bug in
/// the board configuration rather than something to recover from.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ComponentIndex(pub u8);

/// View of the handoff record, which may not exist at all (e.g. on a build
/// that ran no verification stage, or a recovery boot).
#[derive(Copy, Clone, Debug, Default)]
pub struct ComponentRegistry {
    handoff: Option<VbootHandoff>,
}

impl ComponentRegistry {
    pub const fn new(handoff: Option<VbootHandoff>) -> Self {
        Self { handoff }
    }

    /// Builds a registry from the raw bytes of the handoff region. Returns an
    /// unavailable registry if the region is too short to hold the record.
    pub fn from_bytes(region: Option<&[u8]>) -> Self {
        Self {
            handoff: region.and_then(read_prefix::<VbootHandoff>),
        }
    }

    pub fn is_available(&self) -> bool {
        self.handoff.is_some()
    }

    /// Returns the record at `index`, present or not, or `None` if there is no
    /// handoff record.
    pub fn component(&self, index: ComponentIndex) -> Option<FirmwareComponent> {
        assert!((index.0 as usize) < MAX_PARSED_FW_COMPONENTS);
        let handoff = self.handoff.as_ref()?;
        Some(handoff.components[index.0 as usize])
    }

    /// Like `component`, but folds "absent" (`size == 0`) into `None`.
    pub fn verified(&self, index: ComponentIndex) -> Option<FirmwareComponent> {
        self.component(index).filter(FirmwareComponent::is_present)
    }
}
