// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory stand-ins for the boot media, SoC drivers, registers and CPU.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::sync::Once;

use log::{Level, LevelFilter, Log, Metadata, Record};

use crate::arch::Cpu;
use crate::cbfs_name;
use crate::config::{BootConfig, Fallback, SecureOsConfig, SecureOsLoad, StageSpec, UartId};
use crate::error::{DriverError, MediaError};
use crate::media::{BootMedia, Region};
use crate::poll::Timer;
use crate::registry::{ComponentIndex, ComponentRegistry};
use crate::soc::{Carveout, Dram, MibRange, RegisterAccess, SocDrivers, MIB};
use crate::transition::Platform;
use crate::vpd::VpdStore;

pub const BL31: StageSpec = StageSpec {
    index: ComponentIndex(1),
    name: cbfs_name!("bl31"),
    fallback: Fallback::Container,
};

pub const SECURE_OS: StageSpec = StageSpec {
    index: ComponentIndex(2),
    name: cbfs_name!("secure_os"),
    fallback: Fallback::Container,
};

/// A board with a raw-loaded secure OS and one MiB reserved for BL31.
pub fn config(verified_boot: bool) -> BootConfig {
    BootConfig {
        verified_boot,
        bl31: BL31,
        secure_os: Some(SecureOsConfig {
            stage: SECURE_OS,
            load: SecureOsLoad::Raw,
        }),
        bl31_size_mib: 1,
        uart: UartId::A,
        mtc: None,
    }
}

/// Flash image backed by a `Vec`. Unwritten bytes read as erased (0xff).
pub struct FakeMedia {
    data: Vec<u8>,
    areas: Vec<(&'static str, Region)>,
    files: Vec<(&'static str, Region)>,
    stages_at: Vec<(u32, u64)>,
    named_stages: Vec<(&'static str, u64)>,
    broken_stages: Vec<(&'static str, MediaError)>,
    open: bool,
    pub fail_open: bool,
    pub named_loads: usize,
    pub offset_loads: usize,
    pub reads: usize,
}

impl FakeMedia {
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0xff; size],
            areas: Vec::new(),
            files: Vec::new(),
            stages_at: Vec::new(),
            named_stages: Vec::new(),
            broken_stages: Vec::new(),
            open: false,
            fail_open: false,
            named_loads: 0,
            offset_loads: 0,
            reads: 0,
        }
    }

    pub fn add_area(&mut self, name: &'static str, region: Region) {
        self.areas.push((name, region));
    }

    pub fn add_file(&mut self, name: &'static str, region: Region) {
        self.files.push((name, region));
    }

    pub fn add_stage_at(&mut self, offset: u32, entry: u64) {
        self.stages_at.push((offset, entry));
    }

    pub fn add_named_stage(&mut self, name: &'static str, entry: u64) {
        self.named_stages.push((name, entry));
    }

    /// A container entry whose load fails with `error`.
    pub fn add_broken_stage(&mut self, name: &'static str, error: MediaError) {
        self.broken_stages.push((name, error));
    }

    pub fn write(&mut self, offset: u32, bytes: &[u8]) {
        let start = offset as usize;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

impl BootMedia for FakeMedia {
    fn open(&mut self) -> Result<(), MediaError> {
        if self.fail_open {
            return Err(MediaError::Open);
        }
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn find_area(&self, name: &str) -> Option<Region> {
        self.areas.iter().find(|(n, _)| *n == name).map(|&(_, r)| r)
    }

    fn locate_file(&self, name: &str) -> Result<Region, MediaError> {
        self.files
            .iter()
            .find(|(n, _)| *n == name)
            .map(|&(_, r)| r)
            .ok_or(MediaError::NotFound)
    }

    fn load_stage(&mut self, name: &str) -> Result<u64, MediaError> {
        self.named_loads += 1;
        if let Some(&(_, e)) = self.broken_stages.iter().find(|(n, _)| *n == name) {
            return Err(e);
        }
        self.named_stages
            .iter()
            .find(|(n, _)| *n == name)
            .map(|&(_, entry)| entry)
            .ok_or(MediaError::NotFound)
    }

    fn load_stage_by_offset(&mut self, offset: u32) -> Result<u64, MediaError> {
        self.offset_loads += 1;
        self.stages_at
            .iter()
            .find(|(o, _)| *o == offset)
            .map(|&(_, entry)| entry)
            .ok_or(MediaError::Load)
    }

    fn map(&self, offset: u32, len: u32) -> Result<&[u8], MediaError> {
        let start = offset as usize;
        start
            .checked_add(len as usize)
            .and_then(|end| self.data.get(start..end))
            .ok_or(MediaError::InvalidMap { offset, len })
    }

    fn read(&mut self, dest: &mut [u8], offset: u32) -> usize {
        self.reads += 1;
        let start = (offset as usize).min(self.data.len());
        let n = dest.len().min(self.data.len() - start);
        dest[..n].copy_from_slice(&self.data[start..start + n]);
        n
    }
}

/// Register file where every address reads back what was last written (zero
/// before that). Writes are logged in order.
#[derive(Default)]
pub struct FakeRegs {
    values: RefCell<BTreeMap<u64, u32>>,
    log: RefCell<Vec<(u64, u32)>>,
}

impl FakeRegs {
    pub fn writes_to(&self, addr: u64) -> Vec<u32> {
        self.log
            .borrow()
            .iter()
            .filter(|(a, _)| *a == addr)
            .map(|&(_, v)| v)
            .collect()
    }
}

impl RegisterAccess for FakeRegs {
    fn read32(&self, addr: u64) -> u32 {
        self.values.borrow().get(&addr).copied().unwrap_or(0)
    }

    fn write32(&self, addr: u64, value: u32) {
        self.values.borrow_mut().insert(addr, value);
        self.log.borrow_mut().push((addr, value));
    }
}

/// A clock that advances by `step` every time it is read.
pub struct StepTimer {
    now: Cell<u64>,
    step: u64,
}

impl StepTimer {
    pub fn new(start: u64, step: u64) -> Self {
        Self {
            now: Cell::new(start),
            step,
        }
    }
}

impl Timer for StepTimer {
    fn now_us(&self) -> u64 {
        let now = self.now.get();
        self.now.set(now + self.step);
        now
    }
}

pub struct FakeVpd {
    entries: Vec<(String, Vec<u8>)>,
}

impl FakeVpd {
    pub fn with(entries: &[(&str, &[u8])]) -> Self {
        Self {
            entries: entries
                .iter()
                .map(|&(k, v)| (k.to_string(), v.to_vec()))
                .collect(),
        }
    }
}

impl VpdStore for FakeVpd {
    fn find(&self, key: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }
}

/// Memory geometry of a small board: 2 GiB at 2 GiB, 1 GiB above 4 GiB, and
/// a 4 MiB TZ carveout at 1 GiB.
pub struct FakeSoc {
    pub below_4g: Result<MibRange, DriverError>,
    pub above_4g: Option<MibRange>,
    pub tz: MibRange,
    pub tsec: Option<MibRange>,
    pub developer_mode: bool,
}

impl Default for FakeSoc {
    fn default() -> Self {
        Self {
            below_4g: Ok(MibRange {
                base_mib: 2048,
                size_mib: 2048,
            }),
            above_4g: Some(MibRange {
                base_mib: 4096,
                size_mib: 1024,
            }),
            tz: MibRange {
                base_mib: 1024,
                size_mib: 4,
            },
            tsec: Some(MibRange {
                base_mib: 3000,
                size_mib: 2,
            }),
            developer_mode: false,
        }
    }
}

impl SocDrivers for FakeSoc {
    fn memory_below_4g(&self) -> Result<MibRange, DriverError> {
        self.below_4g
    }

    fn memory_above_4g(&self) -> Result<Option<MibRange>, DriverError> {
        Ok(self.above_4g)
    }

    fn carveout(&self, which: Carveout) -> Result<MibRange, DriverError> {
        match which {
            Carveout::Tz => Ok(self.tz),
            Carveout::Tsec => self.tsec.ok_or(DriverError::Carveout(which as u32)),
            _ => Err(DriverError::Carveout(which as u32)),
        }
    }

    fn developer_mode(&self) -> bool {
        self.developer_mode
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CpuEvent {
    Clean { addr: u64, len: usize },
    MmuOff,
    Enter { entry: u64, params: u64, plat_params: u64 },
}

/// Records what it is asked to do. `enter_bl31` returns, like a BL31 that
/// came straight back.
#[derive(Default)]
pub struct FakeCpu {
    pub events: Vec<CpuEvent>,
}

impl FakeCpu {
    /// Whether `[addr, addr + len)` lies within one cleaned range.
    pub fn cleaned(&self, addr: u64, len: usize) -> bool {
        self.events.iter().any(|e| match *e {
            CpuEvent::Clean { addr: a, len: l } => {
                a <= addr && addr + len as u64 <= a + l as u64
            }
            _ => false,
        })
    }

    pub fn position(&self, event: impl Fn(&CpuEvent) -> bool) -> Option<usize> {
        self.events.iter().position(event)
    }
}

impl Cpu for FakeCpu {
    fn dcache_clean_by_mva(&mut self, addr: u64, len: usize) {
        self.events.push(CpuEvent::Clean { addr, len });
    }

    fn dcache_mmu_disable(&mut self) {
        self.events.push(CpuEvent::MmuOff);
    }

    unsafe fn enter_bl31(&mut self, entry: u64, params: u64, plat_params: u64) {
        self.events.push(CpuEvent::Enter {
            entry,
            params,
            plat_params,
        });
    }
}

/// A window of physical memory starting at `base`.
pub struct FakeDram {
    pub base: u64,
    pub mem: Vec<u8>,
}

impl FakeDram {
    pub fn new(base: u64, len: usize) -> Self {
        Self {
            base,
            mem: vec![0; len],
        }
    }

    /// The bytes at physical address `addr`.
    pub fn at(&self, addr: u64, len: usize) -> &[u8] {
        let start = (addr - self.base) as usize;
        &self.mem[start..start + len]
    }
}

impl Dram for FakeDram {
    fn window(&mut self, base: u64, len: usize) -> Result<&mut [u8], DriverError> {
        let err = DriverError::Window { base, len };
        let start = base.checked_sub(self.base).ok_or(err)? as usize;
        let end = start.checked_add(len).ok_or(err)?;
        self.mem.get_mut(start..end).ok_or(err)
    }
}

/// Everything a handoff touches, owned in one place.
pub struct Rig {
    pub media: FakeMedia,
    pub registry: ComponentRegistry,
    pub soc: FakeSoc,
    pub regs: FakeRegs,
    pub vpd: Option<FakeVpd>,
    pub cpu: FakeCpu,
    pub dram: FakeDram,
}

impl Rig {
    pub fn new() -> Self {
        let soc = FakeSoc::default();
        let dram = FakeDram::new(soc.tz.base_mib * MIB, (soc.tz.size_mib * MIB) as usize);
        Self {
            media: FakeMedia::new(0x10_0000),
            registry: ComponentRegistry::new(None),
            soc,
            regs: FakeRegs::default(),
            vpd: None,
            cpu: FakeCpu::default(),
            dram,
        }
    }

    pub fn platform(&mut self) -> Platform<'_> {
        Platform {
            media: &mut self.media,
            registry: self.registry,
            soc: &self.soc,
            regs: &self.regs,
            vpd: self.vpd.as_ref().map(|v| v as &dyn VpdStore),
            cpu: &mut self.cpu,
            dram: &mut self.dram,
        }
    }
}

thread_local! {
    static CAPTURED: RefCell<Vec<(Level, String)>> = const { RefCell::new(Vec::new()) };
}

/// Logger that keeps each test thread's records apart.
struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, _: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        CAPTURED.with(|c| c.borrow_mut().push((record.level(), record.args().to_string())));
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;

/// Runs `f` and returns what it logged on this thread.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, Vec<(Level, String)>) {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        // Nothing else installs a logger in tests.
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(LevelFilter::Trace);
    });
    CAPTURED.with(|c| c.borrow_mut().clear());
    let result = f();
    (result, CAPTURED.with(|c| c.borrow_mut().drain(..).collect()))
}
