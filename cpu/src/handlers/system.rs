// Copyright 2024 The ppc-mac Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Privileged and system-register instructions.

use crate::decode::{DecodeTables, Instr};
use crate::dispatch::ExecContext;
use crate::exception::Exception;
use crate::state::Msr;

mod spr {
    pub const XER: u32 = 1;
    pub const LR: u32 = 8;
    pub const CTR: u32 = 9;
    pub const DSISR: u32 = 18;
    pub const DAR: u32 = 19;
    pub const DEC: u32 = 22;
    pub const SDR1: u32 = 25;
    pub const SRR0: u32 = 26;
    pub const SRR1: u32 = 27;
    pub const PVR: u32 = 287;
    pub const IBAT0U: u32 = 528;
    pub const DBAT0U: u32 = 536;
}

pub fn populate(tables: &mut DecodeTables) {
    tables.set_extended_31(467, mtspr);
    tables.set_extended_31(339, mfspr);
    tables.set_extended_31(146, mtmsr);
    tables.set_extended_31(83, mfmsr);
    tables.set_extended_31(19, mfcr);
    tables.set_extended_31(144, mtcrf);
    tables.set_extended_31(210, mtsr);
    tables.set_extended_31(242, mtsrin);
    tables.set_extended_31(595, mfsr);
    tables.set_extended_31(659, mfsrin);
    tables.set_extended_31(306, tlbie);
    tables.set_extended_31(370, tlbia);
    tables.set_extended_19(50, rfi);
    tables.set_primary(17, sc);
}

fn mtspr(ctx: &mut ExecContext, instr: Instr) {
    let n = instr.spr();
    let value = ctx.state.gpr(instr.rs());
    match n {
        spr::XER => ctx.state.xer.set_bits(value),
        spr::LR => ctx.state.lr = value,
        spr::CTR => ctx.state.ctr = value,
        spr::DEC => ctx.state.dec = value,
        spr::DSISR => {}
        spr::DAR => ctx.state.dar = value,
        spr::SRR0 => ctx.state.srr0 = value,
        spr::SRR1 => ctx.state.srr1 = value,
        spr::SDR1 => ctx.mmu.write_sdr1(value),
        n if (spr::IBAT0U..spr::IBAT0U + 8).contains(&n) => {
            let idx = ((n - spr::IBAT0U) / 2) as usize;
            if (n - spr::IBAT0U) % 2 == 0 {
                let lower = ctx.mmu.ibat.0[idx].lower();
                ctx.mmu.write_ibat(idx, value, lower);
            } else {
                let upper = ctx.mmu.ibat.0[idx].upper();
                ctx.mmu.write_ibat(idx, upper, value);
            }
        }
        n if (spr::DBAT0U..spr::DBAT0U + 8).contains(&n) => {
            let idx = ((n - spr::DBAT0U) / 2) as usize;
            if (n - spr::DBAT0U) % 2 == 0 {
                let lower = ctx.mmu.dbat.0[idx].lower();
                ctx.mmu.write_dbat(idx, value, lower);
            } else {
                let upper = ctx.mmu.dbat.0[idx].upper();
                ctx.mmu.write_dbat(idx, upper, value);
            }
        }
        _ => log::warn!("mtspr to unimplemented SPR {n}"),
    }
}

fn mfspr(ctx: &mut ExecContext, instr: Instr) {
    let n = instr.spr();
    let value = match n {
        spr::XER => ctx.state.xer.bits(),
        spr::LR => ctx.state.lr,
        spr::CTR => ctx.state.ctr,
        spr::DEC => ctx.state.dec,
        spr::DAR => ctx.state.dar,
        spr::SRR0 => ctx.state.srr0,
        spr::SRR1 => ctx.state.srr1,
        spr::SDR1 => ctx.mmu.sdr1.0,
        spr::PVR => ctx.state.pvr,
        _ => {
            log::warn!("mfspr from unimplemented SPR {n}");
            0
        }
    };
    ctx.state.set_gpr(instr.rt(), value);
}

fn mtmsr(ctx: &mut ExecContext, instr: Instr) {
    ctx.state.msr = Msr::from_bits_truncate(ctx.state.gpr(instr.rs()));
}

fn mfmsr(ctx: &mut ExecContext, instr: Instr) {
    ctx.state.set_gpr(instr.rt(), ctx.state.msr.bits());
}

fn mfcr(ctx: &mut ExecContext, instr: Instr) {
    ctx.state.set_gpr(instr.rt(), ctx.state.cr.bits());
}

/// `mtcrf`: each set bit of the 8-bit `FXM` mask copies the corresponding 4-bit field of
/// `rS` into CR.
fn mtcrf(ctx: &mut ExecContext, instr: Instr) {
    let rs = ctx.state.gpr(instr.rs());
    let mut cr = ctx.state.cr.bits();
    for field in 0..8 {
        if instr.fxm() & (1 << (7 - field)) != 0 {
            let shift = (7 - field) * 4;
            let mask = 0xFu32 << shift;
            cr = (cr & !mask) | (rs & mask);
        }
    }
    ctx.state.cr.set_bits(cr);
}

fn mtsr(ctx: &mut ExecContext, instr: Instr) {
    let index = ((instr.0 >> 16) & 0xF) as usize;
    let value = ctx.state.gpr(instr.rs());
    ctx.mmu.write_sr(index, value);
}

fn mtsrin(ctx: &mut ExecContext, instr: Instr) {
    let index = ((ctx.state.gpr(instr.rb()) >> 28) & 0xF) as usize;
    let value = ctx.state.gpr(instr.rs());
    ctx.mmu.write_sr(index, value);
}

fn mfsr(ctx: &mut ExecContext, instr: Instr) {
    let index = ((instr.0 >> 16) & 0xF) as usize;
    let value = ctx.mmu.segments.0[index];
    ctx.state.set_gpr(instr.rt(), value);
}

fn mfsrin(ctx: &mut ExecContext, instr: Instr) {
    let index = ((ctx.state.gpr(instr.rb()) >> 28) & 0xF) as usize;
    let value = ctx.mmu.segments.0[index];
    ctx.state.set_gpr(instr.rt(), value);
}

fn tlbie(ctx: &mut ExecContext, instr: Instr) {
    let vaddr = ctx.state.gpr(instr.rb());
    ctx.mmu.invalidate_page(vaddr);
}

fn tlbia(ctx: &mut ExecContext, _instr: Instr) {
    ctx.mmu.invalidate_translations();
}

/// Returns from an exception: restores PC and MSR from SRR0/SRR1.
fn rfi(ctx: &mut ExecContext, _instr: Instr) {
    ctx.state.pc = ctx.state.srr0;
    ctx.state.msr = Msr::from_bits_truncate(ctx.state.srr1);
}

fn sc(ctx: &mut ExecContext, _instr: Instr) {
    ctx.raise(Exception::SystemCall);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::GuestState;
    use devices::Bus;
    use mmu::Mmu;

    fn ctx<'a>(state: &'a mut GuestState, mmu: &'a mut Mmu, bus: &'a Bus) -> ExecContext<'a> {
        ExecContext { state, mmu, bus, pending_exception: None }
    }

    #[test]
    fn mtsr_then_mfsr_round_trips() {
        let mut state = GuestState::new(0);
        let mut mmu = Mmu::new(0x1000);
        let bus = Bus::new();
        state.set_gpr(3, 0xABCD_1234);
        let mtsr_word = (31u32 << 26) | (3 << 21) | (5 << 16) | (210 << 1); // mtsr sr=5, rs=3
        let mut c = ctx(&mut state, &mut mmu, &bus);
        mtsr(&mut c, Instr(mtsr_word));

        let mfsr_word = (31u32 << 26) | (4 << 21) | (5 << 16) | (595 << 1); // mfsr rt=4, sr=5
        mfsr(&mut c, Instr(mfsr_word));
        assert_eq!(state.gpr(4), 0xABCD_1234);
    }

    #[test]
    fn mtsrin_then_mfsrin_round_trips() {
        let mut state = GuestState::new(0);
        let mut mmu = Mmu::new(0x1000);
        let bus = Bus::new();
        state.set_gpr(3, 0x5555_AAAA); // value
        state.set_gpr(6, 7 << 28); // selects SR7 from its top 4 bits
        let mtsrin_word = (31u32 << 26) | (3 << 21) | (6 << 11) | (242 << 1); // mtsrin rs=3, rb=6
        let mut c = ctx(&mut state, &mut mmu, &bus);
        mtsrin(&mut c, Instr(mtsrin_word));

        let mfsrin_word = (31u32 << 26) | (4 << 21) | (6 << 11) | (659 << 1); // mfsrin rt=4, rb=6
        mfsrin(&mut c, Instr(mfsrin_word));
        assert_eq!(state.gpr(4), 0x5555_AAAA);
    }
}
