// Copyright 2024 The ppc-mac Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use thiserror::Error;

/// Architectural faults the MMU can raise. These are never propagated as a bare
/// `Result` error past the instruction handler that triggered them: every one of these
/// is turned into a guest exception by `cpu::exception::deliver`, which matches on this
/// enum's variants to pick the vector and SRR1 cause bits.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MmuFault {
    #[error("data storage interrupt at {vaddr:#010x}: {cause} (store={is_store})")]
    Dsi {
        vaddr: u32,
        cause: &'static str,
        is_store: bool,
    },
    #[error("instruction storage interrupt at {vaddr:#010x}: {cause}")]
    Isi { vaddr: u32, cause: &'static str },
    #[error("alignment exception at {0:#010x}")]
    Alignment(u32),
    #[error("machine check: {0}")]
    MachineCheck(String),
}
