// Copyright 2024 The ppc-mac Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Branch instructions.
//!
//! `dispatch::step` advances `state.pc` past the current instruction before calling the
//! handler, so these only need to overwrite `state.pc` when the branch is taken and
//! otherwise leave the already-advanced value alone.

use crate::decode::{DecodeTables, Instr};
use crate::dispatch::ExecContext;

pub fn populate(tables: &mut DecodeTables) {
    tables.set_primary(18, b);
    tables.set_primary(16, bc);
    tables.set_extended_19(16, bclr);
    tables.set_extended_19(528, bcctr);
}

fn b(ctx: &mut ExecContext, instr: Instr) {
    // `state.pc` has already been advanced to the next instruction by `step()`; the
    // link address for `bl` is that value, and `AA` selects whether `LI` is relative to
    // that old base (the instruction's own address) or absolute.
    let next = ctx.state.pc;
    let here = next.wrapping_sub(4);
    let target = if instr.aa_bit() { instr.li() as u32 } else { here.wrapping_add(instr.li() as u32) };
    if instr.lk_bit() {
        ctx.state.lr = next;
    }
    ctx.state.pc = target;
}

/// Evaluates the BO field against CTR and CR[BI] per the architecture's condition
/// (ignoring the "branch always"/decrement-disabled variants the `BO` encoding also
/// supports, which are expressed here as the general case since `BO`'s don't-care bits
/// fold naturally into the boolean logic below).
fn should_branch(ctx: &mut ExecContext, instr: Instr) -> bool {
    let bo = instr.bo();
    let decrement_ctr = bo & 0b00100 == 0;
    if decrement_ctr {
        ctx.state.ctr = ctx.state.ctr.wrapping_sub(1);
    }
    let ctr_ok = bo & 0b00100 != 0 || ((ctx.state.ctr != 0) == (bo & 0b00010 == 0));
    let cond_ok = bo & 0b10000 != 0 || {
        let bi = instr.bi() as usize;
        let field = bi / 4;
        let bit = bi % 4;
        let cr = ctx.state.cr.field(field);
        let set = match bit {
            0 => cr.less_than,
            1 => cr.greater_than,
            2 => cr.equal,
            3 => cr.summary_overflow,
            _ => unreachable!(),
        };
        set == (bo & 0b01000 != 0)
    };
    ctr_ok && cond_ok
}

fn bc(ctx: &mut ExecContext, instr: Instr) {
    let next = ctx.state.pc;
    let here = next.wrapping_sub(4);
    let taken = should_branch(ctx, instr);
    if instr.lk_bit() {
        ctx.state.lr = next;
    }
    if taken {
        let target = if instr.aa_bit() { instr.bd() as u32 } else { here.wrapping_add(instr.bd() as u32) };
        ctx.state.pc = target;
    }
}

fn bclr(ctx: &mut ExecContext, instr: Instr) {
    let next = ctx.state.pc;
    let taken = should_branch(ctx, instr);
    let target = ctx.state.lr & !0x3;
    if instr.lk_bit() {
        ctx.state.lr = next;
    }
    if taken {
        ctx.state.pc = target;
    }
}

fn bcctr(ctx: &mut ExecContext, instr: Instr) {
    let next = ctx.state.pc;
    // `bcctr`'s BO always has the decrement-disabled bit set architecturally; honor
    // whatever the caller encoded rather than special-casing it.
    let taken = should_branch(ctx, instr);
    let target = ctx.state.ctr & !0x3;
    if instr.lk_bit() {
        ctx.state.lr = next;
    }
    if taken {
        ctx.state.pc = target;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Cond, GuestState};
    use devices::Bus;
    use mmu::Mmu;

    fn ctx<'a>(state: &'a mut GuestState, mmu: &'a mut Mmu, bus: &'a Bus) -> ExecContext<'a> {
        ExecContext { state, mmu, bus, pending_exception: None }
    }

    #[test]
    fn unconditional_branch_with_link_sets_lr_to_next_instruction() {
        let mut state = GuestState::new(0);
        let mut mmu = Mmu::new(0x1000);
        let bus = Bus::new();
        state.pc = 0x1000;
        // Simulate step()'s pre-advance.
        state.pc = state.pc.wrapping_add(4);
        let word = (18u32 << 26) | (0x20 & 0x03FF_FFFC) | 0b01; // LI=0x20, AA=0, LK=1
        let mut c = ctx(&mut state, &mut mmu, &bus);
        b(&mut c, Instr(word));
        assert_eq!(state.lr, 0x1004);
        assert_eq!(state.pc, 0x1000 + 0x20);
    }

    #[test]
    fn bc_not_taken_leaves_pc_at_fallthrough() {
        let mut state = GuestState::new(0);
        let mut mmu = Mmu::new(0x1000);
        let bus = Bus::new();
        state.cr.set_field(0, Cond { equal: false, ..Default::default() });
        state.pc = 0x1004;
        // BO=0b01100 (ignore CTR, branch if CR bit set), BI=2 (CR0[EQ]), BD=0x10
        let word = (16u32 << 26) | (0b01100 << 21) | (2 << 16) | 0x10;
        let mut c = ctx(&mut state, &mut mmu, &bus);
        bc(&mut c, Instr(word));
        assert_eq!(state.pc, 0x1004);
    }
}
