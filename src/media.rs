// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Contract for the boot flash: the flash map, the stage container inside it,
//! and bounds-checked raw access.
//!
//! Nothing in this crate interprets the container format. Image decompression
//! and relocation happen behind `load_stage`/`load_stage_by_offset`, which
//! hand back a runnable entry address.

use core::mem::size_of;
use core::ops::{Deref, DerefMut};

use zerocopy::{AsBytes, FromBytes};

use crate::error::MediaError;

/// A byte range on the boot media.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Region {
    pub offset: u32,
    pub len: u32,
}

impl Region {
    pub const fn new(offset: u32, len: u32) -> Self {
        Self { offset, len }
    }

    /// Returns the subrange `[start, start + len)` relative to this region,
    /// or `None` if any part of it falls outside.
    pub fn subrange(&self, start: u32, len: u32) -> Option<Region> {
        let end = start.checked_add(len)?;
        if end > self.len {
            return None;
        }
        Some(Region::new(self.offset.checked_add(start)?, len))
    }
}

pub trait BootMedia {
    fn open(&mut self) -> Result<(), MediaError>;
    fn close(&mut self);

    /// Looks up a named flash map area (e.g. `"GBB"`, `"RO_VPD"`).
    fn find_area(&self, name: &str) -> Option<Region>;

    /// Looks up a file in the stage container by name, without loading it.
    fn locate_file(&self, name: &str) -> Result<Region, MediaError>;

    /// Loads the stage called `name` and returns its entry point.
    fn load_stage(&mut self, name: &str) -> Result<u64, MediaError>;

    /// Loads the stage whose container entry starts at `offset` and returns
    /// its entry point.
    fn load_stage_by_offset(&mut self, offset: u32) -> Result<u64, MediaError>;

    /// Maps `len` bytes at `offset`. The mapping lives until the next mutable
    /// use of the media.
    fn map(&self, offset: u32, len: u32) -> Result<&[u8], MediaError>;

    /// Copies from `offset` into `dest` and returns how many bytes arrived.
    fn read(&mut self, dest: &mut [u8], offset: u32) -> usize;
}

/// An opened boot media, closed again when dropped.
pub struct OpenMedia<'a> {
    media: &'a mut dyn BootMedia,
}

impl<'a> OpenMedia<'a> {
    pub fn new(media: &'a mut dyn BootMedia) -> Result<Self, MediaError> {
        media.open()?;
        Ok(Self { media })
    }
}

impl<'a> Deref for OpenMedia<'a> {
    type Target = dyn BootMedia + 'a;

    fn deref(&self) -> &Self::Target {
        &*self.media
    }
}

impl<'a> DerefMut for OpenMedia<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.media
    }
}

impl Drop for OpenMedia<'_> {
    fn drop(&mut self) {
        self.media.close();
    }
}

/// Copies a fixed-layout structure out of the front of `bytes`.
///
/// Flash mappings carry no alignment promise, so we copy rather than pun.
pub(crate) fn read_prefix<T: FromBytes + AsBytes>(bytes: &[u8]) -> Option<T> {
    let src = bytes.get(..size_of::<T>())?;
    let mut value = T::new_zeroed();
    value.as_bytes_mut().copy_from_slice(src);
    Some(value)
}
