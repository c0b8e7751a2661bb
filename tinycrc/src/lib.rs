//! `tinycrc`: a tiny CRC implementation.
//!
//! This is a CRC8 implementation that focuses on size over performance. It
//! uses no lookup tables and a couple of bytes of state, which is all the
//! vboot non-volatile block needs.
//!
//! Algorithms are those defined in the `crc_catalog` crate, used by `crc` (a
//! crate that you should use instead if performance is important).

#![no_std]

use crc_catalog::Algorithm;

/// A CRC8 operation-in-progress using a particular algorithm.
#[derive(Clone, Debug)]
pub struct Crc8 {
    /// Algorithm polynomial, already bit-reversed if input is reflected.
    poly: u8,
    /// Should data be bit-reversed on the way in?
    reflect_in: bool,
    /// Should data be bit-reversed on the way out?
    reflect_out: bool,
    /// Value to XOR into the CRC at the end.
    xorout: u8,
    /// Current CRC value.
    value: u8,
}

impl Crc8 {
    /// Creates a new `Crc8` using `algorithm`'s settings.
    pub fn new(algorithm: &Algorithm<u8>) -> Self {
        let (poly, value) = if algorithm.refin {
            (algorithm.poly.reverse_bits(), algorithm.init.reverse_bits())
        } else {
            (algorithm.poly, algorithm.init)
        };
        Self {
            poly,
            reflect_in: algorithm.refin,
            reflect_out: algorithm.refout,
            xorout: algorithm.xorout,
            value,
        }
    }

    /// Updates this CRC with the content of `data`.
    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            let v = self.value ^ byte;
            self.value = if self.reflect_in {
                crc8_reflect(self.poly, v)
            } else {
                crc8(self.poly, v)
            };
        }
    }

    /// Performs any final computations required and returns the computed CRC8.
    pub fn finish(mut self) -> u8 {
        if self.reflect_in ^ self.reflect_out {
            self.value = self.value.reverse_bits();
        }
        self.value ^ self.xorout
    }
}

/// One-shot convenience wrapper.
pub fn checksum(algorithm: &Algorithm<u8>, data: &[u8]) -> u8 {
    let mut crc = Crc8::new(algorithm);
    crc.update(data);
    crc.finish()
}

fn crc8_reflect(poly: u8, mut value: u8) -> u8 {
    for _ in 0..8 {
        value = (value >> 1) ^ ((value & 1) * poly);
    }
    value
}

fn crc8(poly: u8, mut value: u8) -> u8 {
    for _ in 0..8 {
        value = (value << 1) ^ ((value >> 7) * poly);
    }
    value
}
