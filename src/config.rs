// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Static boot configuration.
//!
//! Each BSP provides one `BootConfig` as an associated constant. Nothing here
//! is read at runtime from anywhere but the binary itself.

use num_derive::FromPrimitive;

use crate::registry::ComponentIndex;

/// What to do when an image cannot be loaded from the verified registry.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Fallback {
    /// Load it from the stage container by name, unverified.
    Container,
    /// The image must come from the verified registry; anything else is
    /// fatal.
    Forbidden,
}

/// How to find one next-stage image.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StageSpec {
    pub index: ComponentIndex,
    pub name: &'static str,
    pub fallback: Fallback,
}

/// How the secure OS (BL32) gets into memory.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SecureOsLoad {
    /// Copied byte-for-byte into the TZ carveout, right after the space
    /// reserved for BL31.
    Raw,
    /// Loaded as a regular container stage.
    Stage,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SecureOsConfig {
    pub stage: StageSpec,
    pub load: SecureOsLoad,
}

/// Memory training code location.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MtcConfig {
    pub stage: StageSpec,
    /// Physical address the blob is copied to and run from.
    pub load_address: u64,
    /// Space reserved at `load_address`.
    pub max_size: usize,
}

/// Console UART, numbered the way the TLK boot arguments expect.
#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive)]
pub enum UartId {
    None = 0,
    A = 1,
    B = 2,
    C = 3,
    D = 4,
    E = 5,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BootConfig {
    /// Whether a verification stage ran and left a component registry.
    pub verified_boot: bool,
    pub bl31: StageSpec,
    pub secure_os: Option<SecureOsConfig>,
    /// Space at the bottom of the TZ carveout reserved for BL31, in MiB.
    pub bl31_size_mib: u64,
    pub uart: UartId,
    pub mtc: Option<MtcConfig>,
}

/// Names a file under the prefix where the stage container keeps the
/// fallback images, e.g. `cbfs_name!("bl31")` is `"fallback/bl31"`.
#[macro_export]
macro_rules! cbfs_name {
    ($name:literal) => {
        concat!("fallback/", $name)
    };
}
