// Copyright 2024 The ppc-mac Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Exception delivery: vector selection and the SRR0/SRR1/MSR/PC update sequence.

use mmu::MmuFault;

use crate::state::Msr;

/// One architectural exception class. Each carries just what [`deliver`] needs beyond
/// the guest state it already has access to.
#[derive(Debug, Clone, Copy)]
pub enum Exception {
    MachineCheck,
    DataStorage { dar: u32, store: bool },
    InstructionStorage,
    ExternalInterrupt,
    Alignment { dar: u32 },
    Program { illegal: bool, privileged: bool, fp_enabled_exception: bool },
    FloatingPointUnavailable,
    Decrementer,
    SystemCall,
}

impl Exception {
    /// Offset within the vector table.
    fn vector_offset(self) -> u32 {
        match self {
            Exception::MachineCheck => 0x0200,
            Exception::DataStorage { .. } => 0x0300,
            Exception::InstructionStorage => 0x0400,
            Exception::ExternalInterrupt => 0x0500,
            Exception::Alignment { .. } => 0x0600,
            Exception::Program { .. } => 0x0700,
            Exception::FloatingPointUnavailable => 0x0800,
            Exception::Decrementer => 0x0900,
            Exception::SystemCall => 0x0C00,
        }
    }

    /// Whether this class is precise: delivered with SRR0 pointing at the faulting
    /// instruction, as opposed to the next one. Every exception this core raises is
    /// precise; asynchronous delivery
    /// (external/decrementer) still resumes from the instruction that was about to
    /// execute when the interrupt was recognized, which `Machine::run_until` already
    /// arranges by checking for pending interrupts between instructions rather than
    /// mid-instruction.
    pub fn is_precise(self) -> bool {
        true
    }
}

/// Converts an MMU fault encountered mid-instruction into the matching architectural
/// exception. Handlers never see `MmuFault` directly past this point.
pub fn from_mmu_fault(fault: &MmuFault) -> Exception {
    match *fault {
        MmuFault::Dsi { vaddr, is_store, .. } => Exception::DataStorage { dar: vaddr, store: is_store },
        MmuFault::Isi { .. } => Exception::InstructionStorage,
        MmuFault::Alignment(dar) => Exception::Alignment { dar },
        MmuFault::MachineCheck(_) => Exception::MachineCheck,
    }
}

/// Delivers `exception` against `state`: saves SRR0/SRR1, updates MSR (disabling
/// translation and external interrupts, matching the hardware's non-reentrant window),
/// and redirects PC to the vector table.
pub fn deliver(state: &mut crate::state::GuestState, exception: Exception) {
    match exception {
        Exception::MachineCheck => {
            log::error!("delivering exception {exception:?} at pc={:#010x}", state.pc);
        }
        _ => log::debug!("delivering exception {exception:?} at pc={:#010x}", state.pc),
    }

    state.srr0 = state.pc;
    state.srr1 = state.msr.bits() & 0xFFFF;

    if let Exception::DataStorage { dar, .. } | Exception::Alignment { dar } = exception {
        state.dar = dar;
    }

    let mut msr = state.msr;
    msr.remove(Msr::IR | Msr::DR | Msr::EE | Msr::PR | Msr::FP | Msr::RI);
    state.msr = msr;

    let base = if state.msr.contains(Msr::IP) { 0xFFF0_0000 } else { 0 };
    state.pc = base | exception.vector_offset();
}
