// Copyright 2024 The ppc-mac Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::path::PathBuf;

use thiserror::Error;

/// Host-side bring-up failures: these occur before the dispatch loop ever starts and are
/// reported as ordinary `Result` values, distinct from the architectural exceptions
/// `mmu::MmuFault`/`devices::BusError` model.
#[derive(Debug, Error)]
pub enum MachineError {
    #[error("ROM image {0} not found")]
    RomNotFound(PathBuf),
    #[error("failed to register MMIO region: {0}")]
    Bus(#[from] devices::BusError),
}
