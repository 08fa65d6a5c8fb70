// Copyright 2024 The ppc-mac Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Address translation and the guest-load/guest-store fast path.
//!
//! Probes the BAT arrays first; on a miss, walks the segment-register + hashed-page-table
//! path; applies protection; then resolves the resulting physical address against RAM or
//! the MMIO [`devices::Bus`]. A small direct-mapped translation cache memoises the BAT/PTE
//! outcome per `(virtual page, intent)` and is invalidated in bulk whenever the mapping it
//! depends on changes (segment register, SDR1, or BAT writes, and explicit `tlbie`).

mod bat;
mod error;
mod pagetable;
mod ram;
mod segment;
mod tlb;

use devices::{Bus, Width};

pub use bat::{Bat, BatArray};
pub use error::MmuFault;
pub use pagetable::{Pte, SDR1};
pub use ram::Ram;
pub use segment::{SegmentRegisters, Vsid};
use tlb::TranslationCache;

/// What the access is for; governs which BAT array and which segment permission bit
/// applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Fetch,
    Load,
    Store,
}

/// Protection outcome of a successful translation, carried from the BAT or PTE hit
/// through to the RAM/MMIO access so alignment and WIMG handling can use it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Protection {
    pub writable: bool,
    pub executable: bool,
    /// WIMG bit 'I': caching inhibited. Informational to the core in general, but
    /// required to be honored when deciding whether an unaligned access is permitted.
    pub cache_inhibited: bool,
}

impl Protection {
    const RAM_DEFAULT: Protection = Protection {
        writable: true,
        executable: true,
        cache_inhibited: false,
    };
}

/// Translation control bits the MMU needs from MSR; kept separate from `cpu::GuestState`
/// so this crate has no dependency on the decoder/dispatch core.
#[derive(Debug, Clone, Copy, Default)]
pub struct TranslationMode {
    pub instr_relocate: bool, // MSR[IR]
    pub data_relocate: bool,  // MSR[DR]
    pub privileged: bool,     // !MSR[PR]
}

/// Owns guest RAM, the BAT arrays, segment registers, and the translation cache; routes
/// a miss past RAM to the shared [`Bus`].
pub struct Mmu {
    pub ram: Ram,
    pub ibat: BatArray,
    pub dbat: BatArray,
    pub segments: SegmentRegisters,
    pub sdr1: SDR1,
    cache: TranslationCache,
}

impl Mmu {
    pub fn new(ram_size: usize) -> Mmu {
        Mmu {
            ram: Ram::new(ram_size),
            ibat: BatArray::default(),
            dbat: BatArray::default(),
            segments: SegmentRegisters::default(),
            sdr1: SDR1::default(),
            cache: TranslationCache::new(),
        }
    }

    /// Invalidates the whole translation cache. Called on `tlbie`/`tlbia`, segment
    /// register writes, SDR1 writes, and BAT writes.
    pub fn invalidate_translations(&mut self) {
        log::debug!("translation cache invalidated");
        self.cache.clear();
    }

    /// Invalidates a single virtual page's cached translations (`tlbie`).
    pub fn invalidate_page(&mut self, vaddr: u32) {
        self.cache.invalidate_page(vaddr >> 12);
    }

    pub fn write_ibat(&mut self, index: usize, upper: u32, lower: u32) {
        self.ibat.0[index] = Bat::from_upper_lower(upper, lower);
        self.invalidate_translations();
    }

    pub fn write_dbat(&mut self, index: usize, upper: u32, lower: u32) {
        self.dbat.0[index] = Bat::from_upper_lower(upper, lower);
        self.invalidate_translations();
    }

    pub fn write_sr(&mut self, index: usize, value: u32) {
        self.segments.0[index] = value;
        self.invalidate_translations();
    }

    pub fn write_sdr1(&mut self, value: u32) {
        self.sdr1 = SDR1(value);
        self.invalidate_translations();
    }

    /// Full translation procedure: BAT probe, page-table walk, protection check. Does
    /// not touch RAM/MMIO.
    pub fn translate(
        &mut self,
        vaddr: u32,
        mode: TranslationMode,
        intent: Intent,
    ) -> Result<(u32, Protection), MmuFault> {
        let relocate = match intent {
            Intent::Fetch => mode.instr_relocate,
            Intent::Load | Intent::Store => mode.data_relocate,
        };
        if !relocate {
            return Ok((vaddr, Protection::RAM_DEFAULT));
        }

        let page = vaddr >> 12;
        if let Some(hit) = self.cache.lookup(page, intent) {
            return self.check_protection(vaddr, hit.0, hit.1, intent);
        }

        let bats = match intent {
            Intent::Fetch => &self.ibat,
            Intent::Load | Intent::Store => &self.dbat,
        };
        if let Some(bat) = bats.0.iter().find(|b| b.valid_for(mode.privileged) && b.contains(vaddr))
        {
            let phys = bat.translate(vaddr);
            let prot = Protection {
                writable: bat.writable(),
                executable: true,
                cache_inhibited: bat.cache_inhibited(),
            };
            self.cache.insert(page, intent, phys >> 12, prot);
            return self.check_protection(vaddr, phys, prot, intent);
        }

        let vsid = self.segments.vsid(vaddr);
        if intent == Intent::Fetch && self.segments.no_execute(vaddr) {
            return Err(MmuFault::Isi { vaddr, cause: "segment marked no-execute" });
        }

        let pte = pagetable::walk(&self.ram, self.sdr1, vsid, vaddr).ok_or_else(|| {
            let cause = "no matching PTE";
            match intent {
                Intent::Fetch => MmuFault::Isi { vaddr, cause },
                Intent::Load | Intent::Store => MmuFault::Dsi { vaddr, cause, is_store: intent == Intent::Store },
            }
        })?;

        // The storage key for the current privilege level narrows the PTE's own PP
        // permission rather than replacing it: a set key forces the page read-only even
        // if PP would otherwise permit writes.
        let keyed = self.segments.key_for(vaddr, mode.privileged);
        let prot = Protection {
            writable: pte.writable() && !keyed,
            executable: true,
            cache_inhibited: pte.cache_inhibited(),
        };
        let phys = pte.physical_address(vaddr);
        self.cache.insert(page, intent, phys >> 12, prot);
        self.check_protection(vaddr, phys, prot, intent)
    }

    fn check_protection(
        &self,
        vaddr: u32,
        phys: u32,
        prot: Protection,
        intent: Intent,
    ) -> Result<(u32, Protection), MmuFault> {
        if intent == Intent::Store && !prot.writable {
            return Err(MmuFault::Dsi {
                vaddr,
                cause: "protection violation",
                is_store: true,
            });
        }
        Ok((phys, prot))
    }

    /// Reads `width` bytes from `phys`, routing to RAM or the MMIO bus. Caller has
    /// already handled translation and alignment splitting.
    fn read_phys(&self, bus: &Bus, phys: u32, width: Width) -> Result<u64, MmuFault> {
        if bus.contains(phys as u64) {
            bus.dispatch_read(phys as u64, width)
                .map_err(|e| MmuFault::MachineCheck(e.to_string()))
        } else {
            self.ram
                .read(phys, width)
                .ok_or(MmuFault::MachineCheck(format!(
                    "physical address {phys:#x} is outside RAM and unmapped"
                )))
        }
    }

    fn write_phys(&mut self, bus: &Bus, phys: u32, width: Width, value: u64) -> Result<(), MmuFault> {
        if bus.contains(phys as u64) {
            bus.dispatch_write(phys as u64, width, value)
                .map_err(|e| MmuFault::MachineCheck(e.to_string()))
        } else {
            self.ram
                .write(phys, width, value)
                .ok_or_else(|| MmuFault::MachineCheck(format!(
                    "physical address {phys:#x} is outside RAM and unmapped"
                )))
        }
    }

    /// Reads one half of a page-straddling access. `len` is whatever's left on this side
    /// of the boundary and generally isn't a valid [`Width`]; RAM handles any byte count
    /// directly, but an MMIO half still has to resolve to a real device width; a `load`
    /// calling this only ever does so after confirming via `Protection::cache_inhibited`
    /// that the half isn't MMIO, so the `Width::from_bytes` fallback below is unreached in
    /// practice and exists only so this never panics if that invariant changes.
    fn read_phys_split(&self, bus: &Bus, phys: u32, len: u32) -> Result<u64, MmuFault> {
        if bus.contains(phys as u64) {
            let width = Width::from_bytes(len as u8).ok_or(MmuFault::Alignment(phys))?;
            bus.dispatch_read(phys as u64, width)
                .map_err(|e| MmuFault::MachineCheck(e.to_string()))
        } else {
            self.ram
                .read_len(phys, len as usize)
                .ok_or(MmuFault::MachineCheck(format!(
                    "physical address {phys:#x} is outside RAM and unmapped"
                )))
        }
    }

    /// Writes one half of a page-straddling access. See [`Mmu::read_phys_split`].
    fn write_phys_split(
        &mut self,
        bus: &Bus,
        phys: u32,
        len: u32,
        value: u64,
    ) -> Result<(), MmuFault> {
        if bus.contains(phys as u64) {
            let width = Width::from_bytes(len as u8).ok_or(MmuFault::Alignment(phys))?;
            bus.dispatch_write(phys as u64, width, value)
                .map_err(|e| MmuFault::MachineCheck(e.to_string()))
        } else {
            self.ram
                .write_len(phys, len as usize, value)
                .ok_or_else(|| MmuFault::MachineCheck(format!(
                    "physical address {phys:#x} is outside RAM and unmapped"
                )))
        }
    }

    /// Splits an access that straddles a page boundary into two single-page accesses
    /// performed as a unit: if the second half faults, the first half must not have been
    /// visible to software. Since loads only read and RAM/MMIO reads have no side effect
    /// observable before the value is returned to the caller, this is satisfied by simply
    /// not writing `dest`/committing until both halves succeed. Returns `Err` before any
    /// store has taken effect if the split straddles an MMIO (cache-inhibited) region,
    /// which is architecturally disallowed; an ordinary RAM split succeeds regardless of
    /// how the access width divides across the boundary.
    fn access_split(vaddr: u32, width: u32) -> Option<(u32, u32, u32, u32)> {
        let page = vaddr & !0xFFF;
        let next_page = page.wrapping_add(0x1000);
        if vaddr + width <= page + 0x1000 {
            return None; // fits in one page
        }
        let first_len = (page + 0x1000) - vaddr;
        let second_len = width - first_len;
        Some((vaddr, first_len, next_page, second_len))
    }

    pub fn load(
        &mut self,
        bus: &Bus,
        vaddr: u32,
        width_bytes: u32,
        mode: TranslationMode,
    ) -> Result<u64, MmuFault> {
        let width = Width::from_bytes(width_bytes as u8).expect("caller passes a valid width");
        if let Some((a0, l0, a1, l1)) = Self::access_split(vaddr, width_bytes) {
            let (phys0, prot0) = self.translate(a0, mode, Intent::Load)?;
            if prot0.cache_inhibited {
                return Err(MmuFault::Alignment(vaddr));
            }
            let (phys1, prot1) = self.translate(a1, mode, Intent::Load)?;
            if prot1.cache_inhibited {
                return Err(MmuFault::Alignment(vaddr));
            }
            let hi = self.read_phys_split(bus, phys0, l0)?;
            let lo = self.read_phys_split(bus, phys1, l1)?;
            return Ok((hi << (l1 * 8)) | lo);
        }
        let (phys, _prot) = self.translate(vaddr, mode, Intent::Load)?;
        self.read_phys(bus, phys, width)
    }

    pub fn store(
        &mut self,
        bus: &Bus,
        vaddr: u32,
        width_bytes: u32,
        value: u64,
        mode: TranslationMode,
    ) -> Result<(), MmuFault> {
        let width = Width::from_bytes(width_bytes as u8).expect("caller passes a valid width");
        if let Some((a0, l0, a1, l1)) = Self::access_split(vaddr, width_bytes) {
            let (phys0, prot0) = self.translate(a0, mode, Intent::Store)?;
            if prot0.cache_inhibited {
                return Err(MmuFault::Alignment(vaddr));
            }
            let (phys1, prot1) = self.translate(a1, mode, Intent::Store)?;
            if prot1.cache_inhibited {
                return Err(MmuFault::Alignment(vaddr));
            }
            let hi = value >> (l1 * 8);
            let lo = value & ((1u64 << (l1 * 8)) - 1);
            self.write_phys_split(bus, phys0, l0, hi)?;
            self.write_phys_split(bus, phys1, l1, lo)?;
            return Ok(());
        }
        // `translate` already enforces write permission for `Intent::Store` (see
        // `check_protection`), so a successful translation here is guaranteed writable.
        let (phys, _prot) = self.translate(vaddr, mode, Intent::Store)?;
        self.write_phys(bus, phys, width, value)
    }
}
