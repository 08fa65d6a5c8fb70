// Copyright 2024 The ppc-mac Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Load/store instructions. D-form effective address is always `(rA|0) + d`; X-form is
//! `(rA|0) + rB`. Update forms additionally write the effective address back to `rA`
//! (architecturally undefined, and here simply skipped, when `rA == 0` or, for GPR
//! loads, when `rA == rT`).

use crate::decode::{DecodeTables, Instr};
use crate::dispatch::ExecContext;
use crate::exception::Exception;
use crate::state::Fpr;

pub fn populate(tables: &mut DecodeTables) {
    tables.set_primary(32, lwz);
    tables.set_primary(33, lwzu);
    tables.set_primary(36, stw);
    tables.set_primary(37, stwu);
    tables.set_primary(34, lbz);
    tables.set_primary(38, stb);
    tables.set_primary(40, lhz);
    tables.set_primary(44, sth);
    tables.set_primary(50, lfd);
    tables.set_primary(54, stfd);
    tables.set_primary(48, lfs);
    tables.set_primary(52, stfs);
    tables.set_primary(49, lfsu);
    tables.set_extended_31(983, stfiwx);
    tables.set_extended_31(23, lwzx);
    tables.set_extended_31(151, stwx);
    tables.set_extended_31(183, stwux);
    tables.set_extended_31(87, lbzx);
    tables.set_extended_31(215, stbx);
    tables.set_extended_31(279, lhzx);
    tables.set_extended_31(407, sthx);
    tables.set_extended_31(535, lfsx);
    tables.set_extended_31(567, lfsux);
    tables.set_extended_31(663, stfsx);
    tables.set_extended_31(695, stfsux);
    tables.set_extended_31(599, lfdx);
    tables.set_extended_31(727, stfdx);
}

fn ea(ctx: &ExecContext, instr: Instr) -> u32 {
    ctx.state.gpr_or_zero(instr.ra()).wrapping_add(instr.simm() as u32)
}

fn ea_x(ctx: &ExecContext, instr: Instr) -> u32 {
    ctx.state.gpr_or_zero(instr.ra()).wrapping_add(ctx.state.gpr(instr.rb()))
}

fn writeback(ctx: &mut ExecContext, instr: Instr, addr: u32) {
    if instr.ra() != 0 {
        ctx.state.set_gpr(instr.ra(), addr);
    }
}

/// Update-form GPR loads with `rA = 0` or `rA = rT` are an illegal instruction form:
/// there is no well-defined register to hold the base for the writeback, or the
/// writeback would be clobbered by the load's own destination.
fn update_form_is_illegal(instr: Instr) -> bool {
    instr.ra() == 0 || instr.ra() == instr.rt()
}

/// Update-form floating-point loads write the effective address back to the GPR `rA`,
/// not to `frT`, so there's no clobber hazard between the two — only `rA = 0` (no base
/// register to hold the writeback) makes the form illegal.
fn illegal_if_ra_zero(instr: Instr) -> bool {
    instr.ra() == 0
}

fn lwz(ctx: &mut ExecContext, instr: Instr) {
    let addr = ea(ctx, instr);
    if let Some(v) = ctx.load(addr, 4) {
        ctx.state.set_gpr(instr.rt(), v as u32);
    }
}

fn lwzu(ctx: &mut ExecContext, instr: Instr) {
    if update_form_is_illegal(instr) {
        ctx.raise(Exception::Program { illegal: true, privileged: false, fp_enabled_exception: false });
        return;
    }
    let addr = ea(ctx, instr);
    if let Some(v) = ctx.load(addr, 4) {
        ctx.state.set_gpr(instr.rt(), v as u32);
        writeback(ctx, instr, addr);
    }
}

fn lwzx(ctx: &mut ExecContext, instr: Instr) {
    let addr = ea_x(ctx, instr);
    if let Some(v) = ctx.load(addr, 4) {
        ctx.state.set_gpr(instr.rt(), v as u32);
    }
}

fn lbz(ctx: &mut ExecContext, instr: Instr) {
    let addr = ea(ctx, instr);
    if let Some(v) = ctx.load(addr, 1) {
        ctx.state.set_gpr(instr.rt(), v as u32);
    }
}

fn lbzx(ctx: &mut ExecContext, instr: Instr) {
    let addr = ea_x(ctx, instr);
    if let Some(v) = ctx.load(addr, 1) {
        ctx.state.set_gpr(instr.rt(), v as u32);
    }
}

fn lhz(ctx: &mut ExecContext, instr: Instr) {
    let addr = ea(ctx, instr);
    if let Some(v) = ctx.load(addr, 2) {
        ctx.state.set_gpr(instr.rt(), v as u32);
    }
}

fn lhzx(ctx: &mut ExecContext, instr: Instr) {
    let addr = ea_x(ctx, instr);
    if let Some(v) = ctx.load(addr, 2) {
        ctx.state.set_gpr(instr.rt(), v as u32);
    }
}

fn stw(ctx: &mut ExecContext, instr: Instr) {
    let addr = ea(ctx, instr);
    let value = ctx.state.gpr(instr.rt());
    ctx.store(addr, 4, value as u64);
}

fn stwx(ctx: &mut ExecContext, instr: Instr) {
    let addr = ea_x(ctx, instr);
    let value = ctx.state.gpr(instr.rt());
    ctx.store(addr, 4, value as u64);
}

fn stwu(ctx: &mut ExecContext, instr: Instr) {
    if instr.ra() == 0 {
        ctx.raise(Exception::Program { illegal: true, privileged: false, fp_enabled_exception: false });
        return;
    }
    let addr = ea(ctx, instr);
    let value = ctx.state.gpr(instr.rt());
    if ctx.store(addr, 4, value as u64) {
        writeback(ctx, instr, addr);
    }
}

fn stwux(ctx: &mut ExecContext, instr: Instr) {
    if update_form_is_illegal(instr) {
        ctx.raise(Exception::Program { illegal: true, privileged: false, fp_enabled_exception: false });
        return;
    }
    let addr = ea_x(ctx, instr);
    let value = ctx.state.gpr(instr.rt());
    if ctx.store(addr, 4, value as u64) {
        writeback(ctx, instr, addr);
    }
}

fn stb(ctx: &mut ExecContext, instr: Instr) {
    let addr = ea(ctx, instr);
    let value = ctx.state.gpr(instr.rt());
    ctx.store(addr, 1, value as u64);
}

fn stbx(ctx: &mut ExecContext, instr: Instr) {
    let addr = ea_x(ctx, instr);
    let value = ctx.state.gpr(instr.rt());
    ctx.store(addr, 1, value as u64);
}

fn sth(ctx: &mut ExecContext, instr: Instr) {
    let addr = ea(ctx, instr);
    let value = ctx.state.gpr(instr.rt());
    ctx.store(addr, 2, value as u64);
}

fn sthx(ctx: &mut ExecContext, instr: Instr) {
    let addr = ea_x(ctx, instr);
    let value = ctx.state.gpr(instr.rt());
    ctx.store(addr, 2, value as u64);
}

fn lfd(ctx: &mut ExecContext, instr: Instr) {
    let addr = ea(ctx, instr);
    if let Some(v) = ctx.load(addr, 8) {
        ctx.state.fpr[instr.frt() as usize] = Fpr::from_bits(v);
    }
}

fn lfdx(ctx: &mut ExecContext, instr: Instr) {
    let addr = ea_x(ctx, instr);
    if let Some(v) = ctx.load(addr, 8) {
        ctx.state.fpr[instr.frt() as usize] = Fpr::from_bits(v);
    }
}

fn stfd(ctx: &mut ExecContext, instr: Instr) {
    let addr = ea(ctx, instr);
    let value = ctx.state.fpr[instr.frt() as usize].as_bits();
    ctx.store(addr, 8, value);
}

fn stfdx(ctx: &mut ExecContext, instr: Instr) {
    let addr = ea_x(ctx, instr);
    let value = ctx.state.fpr[instr.frt() as usize].as_bits();
    ctx.store(addr, 8, value);
}

/// `lfs` converts the memory single-precision value to the internal double-precision
/// format on load.
fn lfs(ctx: &mut ExecContext, instr: Instr) {
    let addr = ea(ctx, instr);
    if let Some(v) = ctx.load(addr, 4) {
        let single = f32::from_bits(v as u32);
        ctx.state.fpr[instr.frt() as usize] = Fpr::from_f64(single as f64);
    }
}

/// `lfsu`: D-form, additionally writes the effective address back to `rA`.
fn lfsu(ctx: &mut ExecContext, instr: Instr) {
    if illegal_if_ra_zero(instr) {
        ctx.raise(Exception::Program { illegal: true, privileged: false, fp_enabled_exception: false });
        return;
    }
    let addr = ea(ctx, instr);
    if let Some(v) = ctx.load(addr, 4) {
        let single = f32::from_bits(v as u32);
        ctx.state.fpr[instr.frt() as usize] = Fpr::from_f64(single as f64);
        writeback(ctx, instr, addr);
    }
}

fn lfsx(ctx: &mut ExecContext, instr: Instr) {
    let addr = ea_x(ctx, instr);
    if let Some(v) = ctx.load(addr, 4) {
        let single = f32::from_bits(v as u32);
        ctx.state.fpr[instr.frt() as usize] = Fpr::from_f64(single as f64);
    }
}

fn lfsux(ctx: &mut ExecContext, instr: Instr) {
    if illegal_if_ra_zero(instr) {
        ctx.raise(Exception::Program { illegal: true, privileged: false, fp_enabled_exception: false });
        return;
    }
    let addr = ea_x(ctx, instr);
    if let Some(v) = ctx.load(addr, 4) {
        let single = f32::from_bits(v as u32);
        ctx.state.fpr[instr.frt() as usize] = Fpr::from_f64(single as f64);
        writeback(ctx, instr, addr);
    }
}

fn stfs(ctx: &mut ExecContext, instr: Instr) {
    let addr = ea(ctx, instr);
    let double = ctx.state.fpr[instr.frt() as usize].as_f64();
    let single = double as f32;
    ctx.store(addr, 4, single.to_bits() as u64);
}

fn stfsx(ctx: &mut ExecContext, instr: Instr) {
    let addr = ea_x(ctx, instr);
    let double = ctx.state.fpr[instr.frt() as usize].as_f64();
    let single = double as f32;
    ctx.store(addr, 4, single.to_bits() as u64);
}

fn stfsux(ctx: &mut ExecContext, instr: Instr) {
    if illegal_if_ra_zero(instr) {
        ctx.raise(Exception::Program { illegal: true, privileged: false, fp_enabled_exception: false });
        return;
    }
    let addr = ea_x(ctx, instr);
    let double = ctx.state.fpr[instr.frt() as usize].as_f64();
    let single = double as f32;
    if ctx.store(addr, 4, single.to_bits() as u64) {
        writeback(ctx, instr, addr);
    }
}

/// `stfiwx`: stores the low 32 bits of the raw FPR integer view, unconverted — this is
/// the instruction the FPR/GPR bit-aliasing invariant exists for.
fn stfiwx(ctx: &mut ExecContext, instr: Instr) {
    let addr = ea_x(ctx, instr);
    let bits = ctx.state.fpr[instr.frt() as usize].low_u32();
    ctx.store(addr, 4, bits as u64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::GuestState;
    use devices::Bus;
    use mmu::{Mmu, TranslationMode};

    fn untranslated() -> TranslationMode {
        TranslationMode { instr_relocate: false, data_relocate: false, privileged: true }
    }

    #[test]
    fn stw_then_lwz_round_trips() {
        let mut state = GuestState::new(0);
        let mut mmu = Mmu::new(0x1000);
        let bus = Bus::new();
        state.set_gpr(3, 0); // base
        state.set_gpr(4, 0xDEAD_BEEF);
        let store_word = (36u32 << 26) | (4 << 21) | (3 << 16) | 0x10; // stw r4, 0x10(r3)
        let mut c = ExecContext { state: &mut state, mmu: &mut mmu, bus: &bus, pending_exception: None };
        stw(&mut c, Instr(store_word));
        assert!(c.pending_exception.is_none());

        let load_word = (32u32 << 26) | (5 << 21) | (3 << 16) | 0x10; // lwz r5, 0x10(r3)
        lwz(&mut c, Instr(load_word));
        assert_eq!(state.gpr(5), 0xDEAD_BEEF);
        let _ = untranslated();
    }

    #[test]
    fn stfiwx_stores_raw_bits_not_converted_integer() {
        let mut state = GuestState::new(0);
        let mut mmu = Mmu::new(0x1000);
        let bus = Bus::new();
        state.fpr[6] = Fpr::from_f64(1.5);
        state.set_gpr(3, 0);
        state.set_gpr(4, 0x20);
        let word = (31u32 << 26) | (6 << 21) | (3 << 16) | (4 << 11) | (983 << 1);
        let mut c = ExecContext { state: &mut state, mmu: &mut mmu, bus: &bus, pending_exception: None };
        stfiwx(&mut c, Instr(word));
        let low_bits = (1.5f64).to_bits() as u32;
        assert_eq!(mmu.ram.read(0x20, devices::Width::Dword).unwrap() as u32, low_bits);
    }

    #[test]
    fn stwx_then_lwzx_round_trips() {
        let mut state = GuestState::new(0);
        let mut mmu = Mmu::new(0x1000);
        let bus = Bus::new();
        state.set_gpr(3, 0x10); // base
        state.set_gpr(4, 0x20); // index
        state.set_gpr(5, 0xCAFE_BABE);
        let store_word = (31u32 << 26) | (5 << 21) | (3 << 16) | (4 << 11) | (151 << 1); // stwx r5, r3, r4
        let mut c = ExecContext { state: &mut state, mmu: &mut mmu, bus: &bus, pending_exception: None };
        stwx(&mut c, Instr(store_word));
        assert!(c.pending_exception.is_none());

        let load_word = (31u32 << 26) | (6 << 21) | (3 << 16) | (4 << 11) | (23 << 1); // lwzx r6, r3, r4
        lwzx(&mut c, Instr(load_word));
        assert_eq!(state.gpr(6), 0xCAFE_BABE);
    }

    #[test]
    fn stwux_with_ra_zero_is_illegal() {
        let mut state = GuestState::new(0);
        let mut mmu = Mmu::new(0x1000);
        let bus = Bus::new();
        state.set_gpr(4, 0x10); // rB, used as the whole EA since rA = 0
        let word = (31u32 << 26) | (5 << 21) | (0 << 16) | (4 << 11) | (183 << 1); // stwux r5, r0, r4
        let mut c = ExecContext { state: &mut state, mmu: &mut mmu, bus: &bus, pending_exception: None };
        stwux(&mut c, Instr(word));
        assert!(matches!(c.pending_exception, Some(Exception::Program { illegal: true, .. })));
    }

    #[test]
    fn stwux_writes_back_the_computed_address_to_ra() {
        let mut state = GuestState::new(0);
        let mut mmu = Mmu::new(0x1000);
        let bus = Bus::new();
        state.set_gpr(3, 0x10); // rA
        state.set_gpr(4, 0x20); // rB
        state.set_gpr(5, 0x1234);
        let word = (31u32 << 26) | (5 << 21) | (3 << 16) | (4 << 11) | (183 << 1); // stwux r5, r3, r4
        let mut c = ExecContext { state: &mut state, mmu: &mut mmu, bus: &bus, pending_exception: None };
        stwux(&mut c, Instr(word));
        assert!(c.pending_exception.is_none());
        assert_eq!(state.gpr(3), 0x30);
        assert_eq!(mmu.ram.read(0x30, devices::Width::Dword).unwrap() as u32, 0x1234);
    }

    #[test]
    fn lfsu_allows_ra_equal_frt_since_they_are_different_register_files() {
        let mut state = GuestState::new(0);
        let mut mmu = Mmu::new(0x1000);
        let bus = Bus::new();
        mmu.ram.write(0x10, devices::Width::Dword, (2.5f32).to_bits() as u64).unwrap();
        state.set_gpr(2, 0); // rA — numerically equal to frT=2, but that's a different file
        let word = (49u32 << 26) | (2 << 21) | (2 << 16) | 0x10; // lfsu frt=2, 0x10(r2)
        let mut c = ExecContext { state: &mut state, mmu: &mut mmu, bus: &bus, pending_exception: None };
        lfsu(&mut c, Instr(word));
        assert!(c.pending_exception.is_none());
        assert_eq!(state.fpr[2].as_f64(), 2.5);
        assert_eq!(state.gpr(2), 0x10);
    }

    #[test]
    fn lfsu_with_ra_zero_is_illegal() {
        let mut state = GuestState::new(0);
        let mut mmu = Mmu::new(0x1000);
        let bus = Bus::new();
        let word = (49u32 << 26) | (2 << 21) | (0 << 16) | 0x10; // lfsu frt=2, 0x10(r0)
        let mut c = ExecContext { state: &mut state, mmu: &mut mmu, bus: &bus, pending_exception: None };
        lfsu(&mut c, Instr(word));
        assert!(matches!(c.pending_exception, Some(Exception::Program { illegal: true, .. })));
    }
}
