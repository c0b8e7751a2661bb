// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types shared across the handoff sequence.
//!
//! There are three broad classes of failure here:
//!
//! - Fatal ones, which end up as a `BootError` and halt the boot in
//!   `transition::BootContext::run_bl31`.
//! - Degraded ones (missing root key, missing EKS), which are logged and
//!   turned into zero-size fields by the parameter assembler.
//! - Timeouts from bounded polling, which the caller classifies.

use thiserror::Error;

/// Failures reported by the boot media (flash container, flash map, raw
/// reads).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum MediaError {
    #[error("media could not be opened")]
    Open,
    #[error("file not found in container")]
    NotFound,
    #[error("invalid map of {len:#x} bytes at {offset:#x}")]
    InvalidMap { offset: u32, len: u32 },
    #[error("stage load failed")]
    Load,
}

/// Failures resolving or copying a next-stage image.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum LoadError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0} must come from a verified component")]
    VerificationRequired(&'static str),
    #[error("read {actual} of {expected} bytes")]
    ShortRead { expected: usize, actual: usize },
}

/// Failures from platform register or memory-geometry drivers.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum DriverError {
    #[error("memory range unavailable")]
    MemoryRange,
    #[error("carveout {0} unavailable")]
    Carveout(u32),
    #[error("physical window {base:#x}+{len:#x} is not addressable")]
    Window { base: u64, len: usize },
}

/// A bounded poll ran out of time.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
#[error("timed out after {0} us")]
pub struct Timeout(pub u64);

/// Anything that stops the handoff cold.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum BootError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error("BL32 of {len:#x} bytes does not fit in the TZ carveout")]
    Bl32TooLarge { len: usize },
    #[error(transparent)]
    Timeout(#[from] Timeout),
}

/// Logs `msg` and halts.
///
/// The halt itself is the panic handler of whatever image links this crate;
/// from here on nothing is trusted to make progress.
#[cold]
pub fn die(msg: core::fmt::Arguments<'_>) -> ! {
    log::error!("{}", msg);
    panic!("{}", msg)
}
