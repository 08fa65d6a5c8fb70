// Copyright 2024 The ppc-mac Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The hashed page table: SDR1 locates a guest-physical region of 8-byte PTEs grouped
//! into 8-entry buckets (PTEGs); a PTE's VSID and abbreviated page index (API) are
//! matched against the primary and secondary hash of the faulting address.

use zerocopy::byteorder::big_endian::U32 as BeU32;
use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::ram::Ram;
use crate::segment::Vsid;

/// SDR1: page-table base and size. Bits 0-15 give the 64 KiB-aligned table base;
/// bits 23-31 give a 9-bit mask selecting how many PTEGs (8-entry, 64-byte buckets)
/// the table holds beyond the architectural minimum of 1024.
#[derive(Debug, Clone, Copy, Default)]
pub struct SDR1(pub u32);

impl SDR1 {
    fn htaborg(&self) -> u32 {
        self.0 & 0xFFFF_0000
    }

    fn mask(&self) -> u32 {
        self.0 & 0x1FF
    }
}

#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
struct RawPte {
    upper: BeU32,
    lower: BeU32,
}

/// A decoded page table entry.
#[derive(Debug, Clone, Copy)]
pub struct Pte {
    upper: u32,
    lower: u32,
}

impl Pte {
    fn valid(&self) -> bool {
        self.upper & 0x8000_0000 != 0
    }

    fn vsid(&self) -> u32 {
        (self.upper >> 7) & 0x00FF_FFFF
    }

    fn hash_secondary(&self) -> bool {
        self.upper & 0x0000_0040 != 0
    }

    fn api(&self) -> u32 {
        self.upper & 0x3F
    }

    fn rpn(&self) -> u32 {
        self.lower & 0xFFFF_F000
    }

    pub fn writable(&self) -> bool {
        // PP: 00/01 = read-only, 10/11 treated as read/write in this simplified model.
        self.lower & 0b11 >= 0b10
    }

    pub fn cache_inhibited(&self) -> bool {
        self.lower & 0x0000_0040 != 0 // WIMG 'I' bit
    }

    pub fn physical_address(&self, vaddr: u32) -> u32 {
        self.rpn() | (vaddr & 0x0000_0FFF)
    }
}

fn read_pte(ram: &Ram, addr: u32) -> Option<Pte> {
    let bytes = ram.as_slice().get(addr as usize..addr as usize + 8)?;
    let raw = RawPte::ref_from_bytes(bytes).ok()?;
    Some(Pte {
        upper: raw.upper.get(),
        lower: raw.lower.get(),
    })
}

fn search_pteg(ram: &Ram, pteg_addr: u32, vsid: Vsid, api: u32, secondary: bool) -> Option<Pte> {
    for slot in 0..8 {
        let pte = read_pte(ram, pteg_addr + slot * 8)?;
        if pte.valid() && pte.vsid() == vsid && pte.api() == api && pte.hash_secondary() == secondary {
            return Some(pte);
        }
    }
    None
}

/// Walks the primary then secondary hash bucket for `vaddr` under segment `vsid`.
pub fn walk(ram: &Ram, sdr1: SDR1, vsid: Vsid, vaddr: u32) -> Option<Pte> {
    let page_index = (vaddr >> 12) & 0xFFFF;
    let api = (page_index >> 10) & 0x3F;

    let primary_hash = vsid ^ page_index;
    let pteg_count_mask = sdr1.mask();
    let primary_pteg = sdr1.htaborg() | ((primary_hash & pteg_count_mask) << 6);
    if let Some(pte) = search_pteg(ram, primary_pteg, vsid, api, false) {
        return Some(pte);
    }

    let secondary_hash = (!primary_hash) & pteg_count_mask;
    let secondary_pteg = sdr1.htaborg() | (secondary_hash << 6);
    search_pteg(ram, secondary_pteg, vsid, api, true)
}
