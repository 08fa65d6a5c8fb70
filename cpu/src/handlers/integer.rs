// Copyright 2024 The ppc-mac Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Fixed-point arithmetic and logical instructions.

use crate::decode::{DecodeTables, Instr};
use crate::dispatch::ExecContext;
use crate::state::Cond;

pub fn populate(tables: &mut DecodeTables) {
    tables.set_primary(14, addi);
    tables.set_primary(15, addis);
    tables.set_primary(24, ori);
    tables.set_primary(25, oris);
    tables.set_primary(28, andi_dot);
    tables.set_primary(29, andis_dot);
    tables.set_primary(11, cmpi);
    tables.set_primary(10, cmpli);

    // `add`/`addc`/`subf` carry an OE bit (bit 10) that XO-form encodes separately from
    // the 9-bit XO field proper; `extended_opcode()` reads the combined 10-bit span (the
    // same span non-OE X-form ops use for their full XO), so each OE-bearing op needs a
    // second table entry with that bit folded in.
    set_oe_bearing(tables, 266, add);
    set_oe_bearing(tables, 10, addc);
    set_oe_bearing(tables, 40, subf);
    tables.set_extended_31(28, and);
    tables.set_extended_31(444, or);
    tables.set_extended_31(316, xor);
    tables.set_extended_31(0, cmp);
    tables.set_extended_31(32, cmpl);
    tables.set_extended_31(24, slw);
    tables.set_extended_31(536, srw);
    tables.set_extended_31(824, sraw);
}

fn set_oe_bearing(tables: &mut DecodeTables, xo: u32, handler: crate::handlers::Handler) {
    tables.set_extended_31(xo, handler);
    tables.set_extended_31(xo | 0x200, handler);
}

/// Sets CR0 from a signed result and the current XER[SO]: `Rc=1` sets CR0 from the
/// result, with XER[SO] copied into CR0[SO].
fn set_cr0(ctx: &mut ExecContext, result: i32) {
    let cond = Cond::from_signed_compare(result, ctx.state.xer.summary_overflow());
    ctx.state.cr.set_field(0, cond);
}

fn maybe_set_cr0(ctx: &mut ExecContext, instr: Instr, result: i32) {
    if instr.rc_bit() {
        set_cr0(ctx, result);
    }
}

fn add(ctx: &mut ExecContext, instr: Instr) {
    let a = ctx.state.gpr(instr.ra()) as i32;
    let b = ctx.state.gpr(instr.rb()) as i32;
    let (result, overflowed) = a.overflowing_add(b);
    ctx.state.set_gpr(instr.rt(), result as u32);
    if instr.oe_bit() {
        ctx.state.xer.record_overflow(overflowed);
    }
    maybe_set_cr0(ctx, instr, result);
}

fn addc(ctx: &mut ExecContext, instr: Instr) {
    let a = ctx.state.gpr(instr.ra());
    let b = ctx.state.gpr(instr.rb());
    let (result, carried) = a.overflowing_add(b);
    ctx.state.xer.set_carry(carried);
    if instr.oe_bit() {
        let (_, overflowed) = (a as i32).overflowing_add(b as i32);
        ctx.state.xer.record_overflow(overflowed);
    }
    ctx.state.set_gpr(instr.rt(), result);
    maybe_set_cr0(ctx, instr, result as i32);
}

fn subf(ctx: &mut ExecContext, instr: Instr) {
    let a = ctx.state.gpr(instr.ra()) as i32;
    let b = ctx.state.gpr(instr.rb()) as i32;
    let (result, overflowed) = b.overflowing_sub(a);
    ctx.state.set_gpr(instr.rt(), result as u32);
    if instr.oe_bit() {
        ctx.state.xer.record_overflow(overflowed);
    }
    maybe_set_cr0(ctx, instr, result);
}

fn addi(ctx: &mut ExecContext, instr: Instr) {
    let a = ctx.state.gpr_or_zero(instr.ra()) as i32;
    let result = a.wrapping_add(instr.simm());
    ctx.state.set_gpr(instr.rt(), result as u32);
}

fn addis(ctx: &mut ExecContext, instr: Instr) {
    let a = ctx.state.gpr_or_zero(instr.ra()) as i32;
    let result = a.wrapping_add(instr.simm() << 16);
    ctx.state.set_gpr(instr.rt(), result as u32);
}

fn and(ctx: &mut ExecContext, instr: Instr) {
    let result = ctx.state.gpr(instr.rs()) & ctx.state.gpr(instr.rb());
    ctx.state.set_gpr(instr.ra(), result);
    maybe_set_cr0(ctx, instr, result as i32);
}

fn or(ctx: &mut ExecContext, instr: Instr) {
    let result = ctx.state.gpr(instr.rs()) | ctx.state.gpr(instr.rb());
    ctx.state.set_gpr(instr.ra(), result);
    maybe_set_cr0(ctx, instr, result as i32);
}

fn xor(ctx: &mut ExecContext, instr: Instr) {
    let result = ctx.state.gpr(instr.rs()) ^ ctx.state.gpr(instr.rb());
    ctx.state.set_gpr(instr.ra(), result);
    maybe_set_cr0(ctx, instr, result as i32);
}

fn ori(ctx: &mut ExecContext, instr: Instr) {
    let result = ctx.state.gpr(instr.rs()) | instr.uimm();
    ctx.state.set_gpr(instr.ra(), result);
}

fn oris(ctx: &mut ExecContext, instr: Instr) {
    let result = ctx.state.gpr(instr.rs()) | (instr.uimm() << 16);
    ctx.state.set_gpr(instr.ra(), result);
}

fn andi_dot(ctx: &mut ExecContext, instr: Instr) {
    let result = ctx.state.gpr(instr.rs()) & instr.uimm();
    ctx.state.set_gpr(instr.ra(), result);
    set_cr0(ctx, result as i32);
}

fn andis_dot(ctx: &mut ExecContext, instr: Instr) {
    let result = ctx.state.gpr(instr.rs()) & (instr.uimm() << 16);
    ctx.state.set_gpr(instr.ra(), result);
    set_cr0(ctx, result as i32);
}

fn slw(ctx: &mut ExecContext, instr: Instr) {
    let shift = ctx.state.gpr(instr.rb()) & 0x3F;
    let result = if shift >= 32 { 0 } else { ctx.state.gpr(instr.rs()) << shift };
    ctx.state.set_gpr(instr.ra(), result);
    maybe_set_cr0(ctx, instr, result as i32);
}

fn srw(ctx: &mut ExecContext, instr: Instr) {
    let shift = ctx.state.gpr(instr.rb()) & 0x3F;
    let result = if shift >= 32 { 0 } else { ctx.state.gpr(instr.rs()) >> shift };
    ctx.state.set_gpr(instr.ra(), result);
    maybe_set_cr0(ctx, instr, result as i32);
}

fn sraw(ctx: &mut ExecContext, instr: Instr) {
    let shift = ctx.state.gpr(instr.rb()) & 0x3F;
    let value = ctx.state.gpr(instr.rs()) as i32;
    let (result, carry) = if shift >= 32 {
        (if value < 0 { -1i32 } else { 0 }, value < 0)
    } else {
        let r = value >> shift;
        let shifted_out_ones = shift > 0 && value < 0 && (value & ((1u32 << shift) as i32 - 1)) != 0;
        (r, shifted_out_ones)
    };
    ctx.state.xer.set_carry(carry);
    ctx.state.set_gpr(instr.ra(), result as u32);
    maybe_set_cr0(ctx, instr, result);
}

/// Shared comparison core for `cmp`/`cmpi` (signed) and `cmpl`/`cmpli` (unsigned), both
/// of which write to an explicit `crfD` field rather than always CR0.
fn compare_signed(ctx: &mut ExecContext, crf: usize, a: i32, b: i32) {
    let cond = Cond {
        less_than: a < b,
        greater_than: a > b,
        equal: a == b,
        summary_overflow: ctx.state.xer.summary_overflow(),
    };
    ctx.state.cr.set_field(crf, cond);
}

fn compare_unsigned(ctx: &mut ExecContext, crf: usize, a: u32, b: u32) {
    let cond = Cond {
        less_than: a < b,
        greater_than: a > b,
        equal: a == b,
        summary_overflow: ctx.state.xer.summary_overflow(),
    };
    ctx.state.cr.set_field(crf, cond);
}

fn cmp(ctx: &mut ExecContext, instr: Instr) {
    let a = ctx.state.gpr(instr.ra()) as i32;
    let b = ctx.state.gpr(instr.rb()) as i32;
    compare_signed(ctx, instr.crfd(), a, b);
}

fn cmpl(ctx: &mut ExecContext, instr: Instr) {
    let a = ctx.state.gpr(instr.ra());
    let b = ctx.state.gpr(instr.rb());
    compare_unsigned(ctx, instr.crfd(), a, b);
}

fn cmpi(ctx: &mut ExecContext, instr: Instr) {
    let a = ctx.state.gpr(instr.ra()) as i32;
    compare_signed(ctx, instr.crfd(), a, instr.simm());
}

fn cmpli(ctx: &mut ExecContext, instr: Instr) {
    let a = ctx.state.gpr(instr.ra());
    compare_unsigned(ctx, instr.crfd(), a, instr.uimm());
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
    fn add_with_oe_sets_overflow_and_so() {
        let mut state = GuestState::new(0);
        let mut mmu = Mmu::new(0x1000);
        let bus = Bus::new();
        state.set_gpr(3, i32::MAX as u32);
        state.set_gpr(4, 1);
        // add. rt=5, ra=3, rb=4, OE=1, Rc=1
        let word = (31 << 26) | (5 << 21) | (3 << 16) | (4 << 11) | (1 << 10) | (266 << 1) | 1;
        let mut c = ctx(&mut state, &mut mmu, &bus);
        add(&mut c, Instr(word));
        assert_eq!(state.gpr(5), i32::MIN as u32);
        assert!(state.xer.overflow());
        assert!(state.xer.summary_overflow());
        assert!(state.cr.field(0).summary_overflow);
    }

    #[test]
    fn cmpi_sets_requested_crf_not_just_cr0() {
        let mut state = GuestState::new(0);
        let mut mmu = Mmu::new(0x1000);
        let bus = Bus::new();
        state.set_gpr(3, 5);
        // cmpi crf=2, ra=3, simm=5
        let word = (11 << 26) | (2 << 23) | (3 << 16) | 5;
        let mut c = ctx(&mut state, &mut mmu, &bus);
        cmpi(&mut c, Instr(word));
        assert!(state.cr.field(2).equal);
        assert!(!state.cr.field(0).equal);
    }
}
