// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `Cpu` for the core we are running on.

use aarch64_cpu::asm::barrier;
use aarch64_cpu::registers::{CurrentEL, SCTLR_EL1, SCTLR_EL2};
use core::arch::asm;
use tock_registers::interfaces::{ReadWriteable, Readable, Writeable};

use super::Cpu;

/// Cache identification registers, and SCTLR_EL3, which the register crate
/// leaves out.
#[allow(non_snake_case)]
mod sysregs {
    use core::arch::asm;
    use tock_registers::interfaces::{Readable, Writeable};
    use tock_registers::register_bitfields;

    register_bitfields! {u64,
        pub CTR_EL0 [
            /// Log2 of the number of words in the smallest data cache line.
            DMINLINE OFFSET(16) NUMBITS(4) []
        ],

        pub CLIDR_EL1 [
            /// Level of coherency.
            LOC OFFSET(24) NUMBITS(3) []
        ],

        pub CSSELR_EL1 [
            LEVEL OFFSET(1) NUMBITS(3) [],
            IND OFFSET(0) NUMBITS(1) [
                DataOrUnified = 0,
                Instruction = 1
            ]
        ],

        pub CCSIDR_EL1 [
            NUMSETS OFFSET(13) NUMBITS(15) [],
            ASSOCIATIVITY OFFSET(3) NUMBITS(10) [],
            LINESIZE OFFSET(0) NUMBITS(3) []
        ],

        pub SCTLR_EL3 [
            C OFFSET(2) NUMBITS(1) [
                NonCacheable = 0,
                Cacheable = 1
            ],
            M OFFSET(0) NUMBITS(1) [
                Disable = 0,
                Enable = 1
            ]
        ]
    }

    macro_rules! read_only {
        ($ty:ident, $reg:ident, $name:literal) => {
            pub struct $ty;

            impl Readable for $ty {
                type T = u64;
                type R = $reg::Register;

                #[inline]
                fn get(&self) -> u64 {
                    let value;
                    unsafe {
                        asm!(concat!("mrs {}, ", $name), out(reg) value, options(nomem, nostack))
                    };
                    value
                }
            }

            pub const $reg: $ty = $ty;
        };
    }

    macro_rules! read_write {
        ($ty:ident, $reg:ident, $name:literal) => {
            read_only!($ty, $reg, $name);

            impl Writeable for $ty {
                type T = u64;
                type R = $reg::Register;

                #[inline]
                fn set(&self, value: u64) {
                    unsafe {
                        asm!(concat!("msr ", $name, ", {}"), in(reg) value, options(nomem, nostack))
                    };
                }
            }
        };
    }

    read_only!(CtrEl0, CTR_EL0, "ctr_el0");
    read_only!(ClidrEl1, CLIDR_EL1, "clidr_el1");
    read_only!(CcsidrEl1, CCSIDR_EL1, "ccsidr_el1");
    read_write!(CsselrEl1, CSSELR_EL1, "csselr_el1");
    read_write!(SctlrEl3, SCTLR_EL3, "sctlr_el3");
}

use sysregs::{CCSIDR_EL1, CLIDR_EL1, CSSELR_EL1, CTR_EL0, SCTLR_EL3};

pub struct Aarch64;

/// Smallest data cache line, in bytes.
fn dcache_line_size() -> u64 {
    4 << CTR_EL0.read(CTR_EL0::DMINLINE)
}

fn dsb_isb() {
    barrier::dsb(barrier::SY);
    barrier::isb(barrier::SY);
}

/// Clean and invalidate every data/unified cache up to the level of
/// coherency, by set/way.
fn dcache_clean_invalidate_all() {
    let clidr = CLIDR_EL1.get();
    let loc = CLIDR_EL1.read(CLIDR_EL1::LOC);

    for level in 0..loc {
        // Cache type 2 and up have a data side worth flushing.
        if (clidr >> (level * 3)) & 0x7 < 2 {
            continue;
        }

        CSSELR_EL1.write(CSSELR_EL1::LEVEL.val(level) + CSSELR_EL1::IND::DataOrUnified);
        barrier::isb(barrier::SY);
        let line_shift = CCSIDR_EL1.read(CCSIDR_EL1::LINESIZE) + 4;
        let ways = CCSIDR_EL1.read(CCSIDR_EL1::ASSOCIATIVITY) + 1;
        let sets = CCSIDR_EL1.read(CCSIDR_EL1::NUMSETS) + 1;
        let way_shift = u64::from(((ways - 1) as u32).leading_zeros());

        for way in 0..ways {
            for set in 0..sets {
                let sw = (way << way_shift) | (set << line_shift) | (level << 1);
                unsafe { asm!("dc cisw, {}", in(reg) sw, options(nostack, preserves_flags)) };
            }
        }
    }
    dsb_isb();
}

impl Cpu for Aarch64 {
    fn dcache_clean_by_mva(&mut self, addr: u64, len: usize) {
        if len == 0 {
            return;
        }
        let line = dcache_line_size();
        let end = addr + len as u64;
        let mut line_addr = addr & !(line - 1);
        while line_addr < end {
            unsafe { asm!("dc cvac, {}", in(reg) line_addr, options(nostack, preserves_flags)) };
            line_addr += line;
        }
        dsb_isb();
    }

    fn dcache_mmu_disable(&mut self) {
        dcache_clean_invalidate_all();
        match CurrentEL.read_as_enum(CurrentEL::EL) {
            Some(CurrentEL::EL::Value::EL3) => {
                SCTLR_EL3.modify(SCTLR_EL3::M::Disable + SCTLR_EL3::C::NonCacheable)
            }
            Some(CurrentEL::EL::Value::EL2) => {
                SCTLR_EL2.modify(SCTLR_EL2::M::Disable + SCTLR_EL2::C::NonCacheable)
            }
            _ => SCTLR_EL1.modify(SCTLR_EL1::M::Disable + SCTLR_EL1::C::NonCacheable),
        }
        barrier::isb(barrier::SY);
        // Lines allocated between the flush and the SCTLR write are cleaned
        // out too.
        dcache_clean_invalidate_all();
    }

    unsafe fn enter_bl31(&mut self, entry: u64, params: u64, plat_params: u64) {
        let bl31: extern "C" fn(u64, u64) = core::mem::transmute(entry as usize);
        bl31(params, plat_params);
    }
}
