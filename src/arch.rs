// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! What the handoff needs from the CPU: cache maintenance on the structures
//! the next stage will read, turning translation off, and the jump itself.

#[cfg(target_arch = "aarch64")]
pub mod aarch64;

use zerocopy::AsBytes;

pub trait Cpu {
    /// Cleans `[addr, addr + len)` to the point of coherency, so that a
    /// reader with caches off sees what we wrote.
    fn dcache_clean_by_mva(&mut self, addr: u64, len: usize);

    /// Cleans and invalidates the whole data cache, then turns off the data
    /// cache and the MMU for the current exception level.
    fn dcache_mmu_disable(&mut self);

    /// Branches to BL31 with `params` in x0 and `plat_params` in x1.
    ///
    /// # Safety
    ///
    /// `entry` must be the entry point of a loaded BL31, and both pointers
    /// must refer to parameter blocks that were cleaned to the point of
    /// coherency. On hardware this does not return; if it does anyway, the
    /// caller must treat it as fatal.
    unsafe fn enter_bl31(&mut self, entry: u64, params: u64, plat_params: u64);
}

/// Cleans the bytes of `object` from the data cache.
pub fn clean_object<T: AsBytes + ?Sized>(cpu: &mut dyn Cpu, object: &T) {
    let bytes = object.as_bytes();
    cpu.dcache_clean_by_mva(bytes.as_ptr() as u64, bytes.len());
}

/// Physical address of `object`, as the next stage will see it. Memory is
/// identity mapped at this point, so this is just the pointer value.
pub fn address_of<T: ?Sized>(object: &T) -> u64 {
    object as *const T as *const u8 as u64
}
