// Copyright 2024 The ppc-mac Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The fetch-decode-execute loop.
//!
//! One `step()` call fetches the instruction at PC, decodes it against the tables built
//! in [`crate::decode`], and invokes the matching handler. Handlers signal faults by
//! setting [`ExecContext::pending_exception`] rather than returning `Result`; `step()`
//! checks that slot after the call and delivers the exception if one was raised.

use std::sync::OnceLock;

use devices::Bus;
use mmu::{Mmu, TranslationMode};

use crate::decode::{DecodeTables, Instr};
use crate::exception::{self, Exception};
use crate::state::GuestState;

fn tables() -> &'static DecodeTables {
    static TABLES: OnceLock<DecodeTables> = OnceLock::new();
    TABLES.get_or_init(DecodeTables::new)
}

/// Everything a handler needs: the register file, the MMU, and the shared MMIO bus.
/// Borrowed for the duration of a single `step()` call.
pub struct ExecContext<'a> {
    pub state: &'a mut GuestState,
    pub mmu: &'a mut Mmu,
    pub bus: &'a Bus,
    /// Set by a handler that hit a fault or an architectural exception condition
    /// (illegal instruction, privileged instruction in user mode, `sc`, ...). Checked by
    /// `step()` after the handler returns; never consumed by handler code itself.
    pub pending_exception: Option<Exception>,
}

impl<'a> ExecContext<'a> {
    pub fn translation_mode(&self) -> TranslationMode {
        TranslationMode {
            instr_relocate: self.state.msr.contains(crate::state::Msr::IR),
            data_relocate: self.state.msr.contains(crate::state::Msr::DR),
            privileged: self.state.msr.privileged(),
        }
    }

    /// Performs a guest load, recording the translated fault (if any) as the pending
    /// exception and returning `None` so the handler can bail out without a `Result`.
    pub fn load(&mut self, vaddr: u32, width_bytes: u32) -> Option<u64> {
        let mode = self.translation_mode();
        match self.mmu.load(self.bus, vaddr, width_bytes, mode) {
            Ok(v) => Some(v),
            Err(fault) => {
                self.pending_exception = Some(exception::from_mmu_fault(&fault));
                None
            }
        }
    }

    pub fn store(&mut self, vaddr: u32, width_bytes: u32, value: u64) -> bool {
        let mode = self.translation_mode();
        match self.mmu.store(self.bus, vaddr, width_bytes, value, mode) {
            Ok(()) => true,
            Err(fault) => {
                self.pending_exception = Some(exception::from_mmu_fault(&fault));
                false
            }
        }
    }

    pub fn raise(&mut self, exception: Exception) {
        self.pending_exception = Some(exception);
    }
}

/// Fetches, decodes, and executes one instruction; delivers any resulting exception.
/// Returns `false` if the fetch itself faulted (so the caller's instruction count does
/// not advance past a faulted fetch), `true` otherwise.
pub fn step(state: &mut GuestState, mmu: &mut Mmu, bus: &Bus) -> bool {
    let mode = TranslationMode {
        instr_relocate: state.msr.contains(crate::state::Msr::IR),
        data_relocate: state.msr.contains(crate::state::Msr::DR),
        privileged: state.msr.privileged(),
    };
    let here = state.pc;
    let word = match mmu.load(bus, here, 4, mode) {
        Ok(w) => w as u32,
        Err(fault) => {
            exception::deliver(state, exception::from_mmu_fault(&fault));
            return false;
        }
    };
    state.current_instruction = word;
    // Advance to the sequentially-next instruction before dispatch: branch handlers
    // overwrite `state.pc` with their target, and non-branch handlers rely on this
    // already pointing past the current instruction (e.g. `bl`'s link value).
    state.pc = here.wrapping_add(4);

    let instr = Instr(word);
    let mut ctx = ExecContext { state, mmu, bus, pending_exception: None };

    match tables().lookup(word) {
        Some(handler) => {
            handler(&mut ctx, instr);
            if let Some(exception) = ctx.pending_exception {
                // Every synchronous exception but `sc` is precise and re-points SRR0 at
                // the instruction that caused it, not the sequentially-next one `step`
                // already advanced to.
                if !matches!(exception, Exception::SystemCall) {
                    ctx.state.pc = here;
                }
                exception::deliver(ctx.state, exception);
            }
        }
        None => {
            log::warn!("illegal instruction {word:#010x} at pc={here:#010x}");
            state.pc = here;
            exception::deliver(
                state,
                Exception::Program { illegal: true, privileged: false, fp_enabled_exception: false },
            );
        }
    }
    true
}
