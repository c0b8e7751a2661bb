// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Google Binary Block: the flash-resident header that locates the root
//! public key, among other things.

use core::mem::size_of;

use log::{error, info};
use sha2::{Digest, Sha256};
use static_assertions::const_assert_eq;
use thiserror::Error;
use zerocopy::{AsBytes, FromBytes};

use crate::error::MediaError;
use crate::media::{read_prefix, BootMedia, OpenMedia, Region};

pub const GBB_AREA: &str = "GBB";
pub const GBB_SIGNATURE: [u8; 4] = *b"$GBB";

#[derive(Copy, Clone, Debug, AsBytes, FromBytes)]
#[repr(C)]
pub struct GbbHeader {
    pub signature: [u8; 4],
    pub major_version: u16,
    pub minor_version: u16,
    pub header_size: u32,
    pub flags: u32,
    pub hwid_offset: u32,
    pub hwid_size: u32,
    pub rootkey_offset: u32,
    pub rootkey_size: u32,
    pub bmpfv_offset: u32,
    pub bmpfv_size: u32,
    pub recovery_key_offset: u32,
    pub recovery_key_size: u32,
    pub hwid_digest: [u8; 32],
    pub pad: [u8; 48],
}

const_assert_eq!(size_of::<GbbHeader>(), 128);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum GbbError {
    #[error("no GBB area in flash map")]
    NoArea,
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error("GBB signature mismatch")]
    BadSignature,
    #[error("root key {offset:#x}+{size:#x} outside the GBB")]
    KeyOutOfBounds { offset: u32, size: u32 },
    #[error("root key of {size} bytes exceeds {max}")]
    KeyTooLarge { size: u32, max: usize },
    #[error("root key hash mismatch")]
    HashMismatch,
    #[error("no expected root key digest provisioned")]
    NoExpectedDigest,
}

/// Finds the root key inside the GBB and returns its location on the media.
fn locate_root_key(media: &dyn BootMedia) -> Result<Region, GbbError> {
    let area = media.find_area(GBB_AREA).ok_or(GbbError::NoArea)?;

    let mapped = media.map(area.offset, size_of::<GbbHeader>() as u32)?;
    let header: GbbHeader = read_prefix(mapped).ok_or(MediaError::InvalidMap {
        offset: area.offset,
        len: size_of::<GbbHeader>() as u32,
    })?;

    if header.signature != GBB_SIGNATURE {
        return Err(GbbError::BadSignature);
    }

    area.subrange(header.rootkey_offset, header.rootkey_size)
        .ok_or(GbbError::KeyOutOfBounds {
            offset: header.rootkey_offset,
            size: header.rootkey_size,
        })
}

/// Copies the GBB root key into `key` and returns its length.
///
/// A key that does not fit in `key` is refused, never truncated.
pub fn read_root_key(media: &mut dyn BootMedia, key: &mut [u8]) -> Result<usize, GbbError> {
    let media = OpenMedia::new(media)?;
    let region = locate_root_key(&*media)?;

    if region.len as usize > key.len() {
        return Err(GbbError::KeyTooLarge {
            size: region.len,
            max: key.len(),
        });
    }

    let blob = media.map(region.offset, region.len)?;
    key[..blob.len()].copy_from_slice(blob);
    Ok(blob.len())
}

/// Checks that the GBB root key hashes to `expected`.
///
/// An all-zero `expected` is refused outright.
pub fn verify_root_key(media: &mut dyn BootMedia, expected: &[u8; 32]) -> Result<(), GbbError> {
    if expected.iter().all(|&b| b == 0) {
        return Err(GbbError::NoExpectedDigest);
    }

    let media = OpenMedia::new(media)?;
    let region = locate_root_key(&*media)?;
    let key = media.map(region.offset, region.len)?;

    let digest = Sha256::digest(key);
    if digest.as_slice() != expected {
        error!("root key hash compare failed");
        return Err(GbbError::HashMismatch);
    }

    info!("root key hash compare successful");
    Ok(())
}
