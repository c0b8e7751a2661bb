// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Vital product data: finding the read-only VPD blob, looking keys up in
//! it, and decoding the encrypted key store (EKS) value kept there.
//!
//! Only Google VPD 2.0 is understood. The blob is a run of entries:
//!
//! ```text
//! type:u8  len(key)  key  len(value)  value
//! ```
//!
//! where lengths are base-128, most significant group first, with the top bit
//! of each byte meaning "more to come".

use log::{error, warn};
use thiserror::Error;

use crate::media::{read_prefix, BootMedia, Region};

pub const RO_VPD_AREA: &str = "RO_VPD";
pub const EKS_KEY: &str = "eks";

/// In VPD 2.0 the blob starts at a fixed offset into its flash area.
pub const GOOGLE_VPD_2_0_OFFSET: u32 = 0x600;
/// Magic of the optional `google_vpd_info` header that records the real blob
/// size.
pub const VPD_INFO_MAGIC: [u8; 12] = *b"\xfe\x09gVpdInfo\x04\0";

const TYPE_TERMINATOR: u8 = 0x00;
const TYPE_STRING: u8 = 0x01;
const TYPE_INFO: u8 = 0xfe;
const TYPE_IMPLICIT_TERMINATOR: u8 = 0xff;

#[derive(Copy, Clone, Debug, zerocopy::AsBytes, zerocopy::FromBytes)]
#[repr(C)]
struct GoogleVpdInfo {
    magic: [u8; 12],
    size: u32,
}

/// Locates the VPD blob inside `area`.
///
/// The blob's extent is assumed to be the rest of the area, unless a
/// `google_vpd_info` header at the start says otherwise.
pub fn find_blob(media: &mut dyn BootMedia, area: Region) -> Option<Region> {
    let info_len = core::mem::size_of::<GoogleVpdInfo>() as u32;
    if area.len <= GOOGLE_VPD_2_0_OFFSET + info_len {
        return None;
    }

    let base = area.offset + GOOGLE_VPD_2_0_OFFSET;
    let size = area.len - GOOGLE_VPD_2_0_OFFSET;

    let mut raw = [0u8; 16];
    if media.read(&mut raw, base) == raw.len() {
        if let Some(info) = read_prefix::<GoogleVpdInfo>(&raw) {
            let fits = info
                .size
                .checked_add(info_len)
                .is_some_and(|n| n <= size);
            if info.magic == VPD_INFO_MAGIC && fits {
                return Some(Region::new(base + info_len, info.size));
            }
        }
    }

    Some(Region::new(base, size))
}

/// Read-only lookup by key.
pub trait VpdStore {
    fn find(&self, key: &str) -> Option<&[u8]>;
}

/// A decoded view of a read-only VPD blob.
pub struct RoVpd<'a> {
    blob: &'a [u8],
}

impl<'a> RoVpd<'a> {
    pub fn new(blob: &'a [u8]) -> Self {
        Self { blob }
    }

    /// Maps the blob in the `RO_VPD` flash area of `media`.
    pub fn from_media(media: &'a mut dyn BootMedia) -> Option<Self> {
        let Some(area) = media.find_area(RO_VPD_AREA) else {
            warn!("no {} area in flash map", RO_VPD_AREA);
            return None;
        };
        let blob = find_blob(&mut *media, area)?;

        let media: &'a dyn BootMedia = media;
        match media.map(blob.offset, blob.len) {
            Ok(bytes) => Some(Self::new(bytes)),
            Err(e) => {
                warn!("RO VPD map failed: {}", e);
                None
            }
        }
    }

    pub fn entries(&self) -> Entries<'a> {
        Entries { rest: self.blob }
    }
}

impl VpdStore for RoVpd<'_> {
    fn find(&self, key: &str) -> Option<&[u8]> {
        self.entries()
            .find(|(k, _)| *k == key.as_bytes())
            .map(|(_, v)| v)
    }
}

/// Iterator over the string entries of a VPD blob. Stops at a terminator or
/// at the first malformed entry.
pub struct Entries<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for Entries<'a> {
    type Item = (&'a [u8], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (&kind, rest) = self.rest.split_first()?;
            match kind {
                TYPE_TERMINATOR | TYPE_IMPLICIT_TERMINATOR => {
                    self.rest = &[];
                    return None;
                }
                TYPE_STRING | TYPE_INFO => {
                    let Some((key, value, rest)) = split_entry(rest) else {
                        self.rest = &[];
                        return None;
                    };
                    self.rest = rest;
                    if kind == TYPE_STRING {
                        return Some((key, value));
                    }
                }
                _ => {
                    self.rest = &[];
                    return None;
                }
            }
        }
    }
}

fn split_entry(bytes: &[u8]) -> Option<(&[u8], &[u8], &[u8])> {
    let (key_len, bytes) = decode_len(bytes)?;
    let (key, bytes) = split_checked(bytes, key_len)?;
    let (value_len, bytes) = decode_len(bytes)?;
    let (value, bytes) = split_checked(bytes, value_len)?;
    Some((key, value, bytes))
}

fn split_checked(bytes: &[u8], len: usize) -> Option<(&[u8], &[u8])> {
    (len <= bytes.len()).then(|| bytes.split_at(len))
}

/// Decodes a base-128 length, returning it and the remaining bytes.
fn decode_len(bytes: &[u8]) -> Option<(usize, &[u8])> {
    let mut len: usize = 0;
    for (i, &b) in bytes.iter().enumerate() {
        // A length longer than the blob itself is nonsense; bail before the
        // shift overflows.
        if i >= 4 {
            return None;
        }
        len = (len << 7) | usize::from(b & 0x7f);
        if b & 0x80 == 0 {
            return Some((len, &bytes[i + 1..]));
        }
    }
    None
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum EksError {
    #[error("no EKS entry in VPD")]
    Missing,
    #[error("EKS of {len} hex digits does not fit {max} bytes")]
    TooLong { len: usize, max: usize },
    #[error("EKS hex decode failed")]
    Decode,
}

/// Decodes the ASCII-hex EKS value from `vpd` into `buf` and returns the
/// decoded length.
///
/// `buf` is zeroed first, and again on a failed decode, so the caller never
/// sees a partially decoded key store.
pub fn read_eks(vpd: Option<&dyn VpdStore>, buf: &mut [u8]) -> Result<usize, EksError> {
    buf.fill(0);

    let Some(value) = vpd.and_then(|v| v.find(EKS_KEY)) else {
        error!("EKS read failure");
        return Err(EksError::Missing);
    };

    if value.len() > buf.len() * 2 {
        error!("EKS read failure");
        return Err(EksError::TooLong {
            len: value.len(),
            max: buf.len(),
        });
    }

    let out = &mut buf[..value.len() / 2];
    if let Err(e) = hex::decode_to_slice(value, out) {
        warn!("EKS digit decode error: {}", e);
        buf.fill(0);
        return Err(EksError::Decode);
    }
    Ok(value.len() / 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{FakeMedia, FakeVpd};

    fn entry(key: &[u8], value: &[u8]) -> Vec<u8> {
        let mut out = vec![TYPE_STRING];
        out.extend(encode_len(key.len()));
        out.extend_from_slice(key);
        out.extend(encode_len(value.len()));
        out.extend_from_slice(value);
        out
    }

    fn encode_len(mut len: usize) -> Vec<u8> {
        let mut groups = vec![(len & 0x7f) as u8];
        len >>= 7;
        while len != 0 {
            groups.push((len & 0x7f) as u8 | 0x80);
            len >>= 7;
        }
        groups.reverse();
        groups
    }

    #[test]
    fn finds_string_entries() {
        let mut blob = entry(b"serial_number", b"ABC123");
        blob.extend(entry(b"eks", b"00ff"));
        blob.push(TYPE_TERMINATOR);
        blob.extend(entry(b"after_end", b"x"));

        let vpd = RoVpd::new(&blob);
        assert_eq!(vpd.find("serial_number"), Some(&b"ABC123"[..]));
        assert_eq!(vpd.find("eks"), Some(&b"00ff"[..]));
        assert_eq!(vpd.find("after_end"), None);
        assert_eq!(vpd.find("eks2"), None);
    }

    #[test]
    fn info_entries_are_skipped() {
        let mut blob = entry(b"gVpdInfo", &[0; 4]);
        blob[0] = TYPE_INFO;
        blob.extend(entry(b"region", b"us"));
        blob.push(TYPE_IMPLICIT_TERMINATOR);

        let vpd = RoVpd::new(&blob);
        assert_eq!(vpd.entries().count(), 1);
        assert_eq!(vpd.find("gVpdInfo"), None);
        assert_eq!(vpd.find("region"), Some(&b"us"[..]));
    }

    #[test]
    fn long_values_use_multibyte_lengths() {
        let value = vec![b'a'; 300];
        let blob = entry(b"k", &value);
        assert_eq!(&blob[3..5], &[0x82, 0x2c]);
        assert_eq!(RoVpd::new(&blob).find("k").map(<[u8]>::len), Some(300));
    }

    #[test]
    fn truncated_entry_stops_iteration() {
        let mut blob = entry(b"good", b"1");
        let mut bad = entry(b"bad", b"0123456789");
        bad.truncate(bad.len() - 3);
        blob.extend(bad);

        let vpd = RoVpd::new(&blob);
        assert_eq!(vpd.find("good"), Some(&b"1"[..]));
        assert_eq!(vpd.find("bad"), None);
    }

    #[test]
    fn blob_without_info_header_spans_area() {
        let mut media = FakeMedia::new(0x4000);
        let area = Region::new(0x1000, 0x1000);
        assert_eq!(find_blob(&mut media, area), Some(Region::new(0x1600, 0xa00)));
    }

    #[test]
    fn info_header_narrows_blob() {
        let mut media = FakeMedia::new(0x4000);
        media.write(0x1600, &VPD_INFO_MAGIC);
        media.write(0x160c, &0x80u32.to_le_bytes());
        let area = Region::new(0x1000, 0x1000);
        assert_eq!(find_blob(&mut media, area), Some(Region::new(0x1610, 0x80)));
    }

    #[test]
    fn tiny_area_has_no_blob() {
        let mut media = FakeMedia::new(0x4000);
        assert_eq!(find_blob(&mut media, Region::new(0, 0x600)), None);
    }

    #[test]
    fn eks_decodes_mixed_case() {
        let vpd = FakeVpd::with(&[("eks", b"00fFA5")]);
        let mut buf = [0u8; 8];
        assert_eq!(read_eks(Some(&vpd), &mut buf), Ok(3));
        assert_eq!(&buf[..4], &[0x00, 0xff, 0xa5, 0x00]);
    }

    #[test]
    fn eks_odd_length_fails_clean() {
        let vpd = FakeVpd::with(&[("eks", b"abcde")]);
        let mut buf = [0u8; 8];
        assert_eq!(read_eks(Some(&vpd), &mut buf), Err(EksError::Decode));
        assert_eq!(buf, [0; 8]);
    }

    #[test]
    fn eks_bad_digit_leaves_nothing_behind() {
        let vpd = FakeVpd::with(&[("eks", b"0102zz04")]);
        let mut buf = [0u8; 8];
        assert_eq!(read_eks(Some(&vpd), &mut buf), Err(EksError::Decode));
        assert_eq!(buf, [0; 8]);
    }

    #[test]
    fn eks_too_long_for_buffer() {
        let vpd = FakeVpd::with(&[("eks", b"0011223344")]);
        let mut buf = [0xaau8; 4];
        assert_eq!(
            read_eks(Some(&vpd), &mut buf),
            Err(EksError::TooLong { len: 10, max: 4 })
        );
        assert_eq!(buf, [0; 4]);
    }

    #[test]
    fn eks_missing() {
        let mut buf = [0xaau8; 4];
        assert_eq!(read_eks(None, &mut buf), Err(EksError::Missing));
        assert_eq!(buf, [0; 4]);

        buf = [0xaa; 4];
        let vpd = FakeVpd::with(&[("serial_number", b"x")]);
        assert_eq!(read_eks(Some(&vpd), &mut buf), Err(EksError::Missing));
        assert_eq!(buf, [0; 4]);
    }

    #[test]
    fn eks_read_from_flash_area() {
        let mut blob = entry(b"eks", b"c0ffee");
        blob.push(TYPE_TERMINATOR);
        let mut media = FakeMedia::new(0x4000);
        media.add_area(RO_VPD_AREA, Region::new(0x1000, 0x1000));
        media.write(0x1600, &VPD_INFO_MAGIC);
        media.write(0x160c, &(blob.len() as u32).to_le_bytes());
        media.write(0x1610, &blob);

        let vpd = RoVpd::from_media(&mut media).unwrap();
        let mut buf = [0u8; 4];

        assert_eq!(vpd.entries().count(), 1);
        assert_eq!(read_eks(Some(&vpd), &mut buf), Ok(3));
        assert_eq!(buf, [0xc0, 0xff, 0xee, 0]);
    }

    #[test]
    fn no_vpd_area() {
        let mut media = FakeMedia::new(0x4000);
        assert!(RoVpd::from_media(&mut media).is_none());
    }
}
