// Copyright 2024 The ppc-mac Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Instruction handler bodies, grouped by architectural class. Every handler has the
//! signature [`Handler`]: it receives the shared [`crate::dispatch::ExecContext`] and
//! the decoded [`crate::decode::Instr`], mutates guest state directly, and signals
//! faults through `ctx.pending_exception` rather than a `Result` return.

mod branch;
mod fpu;
mod integer;
mod memory;
mod system;

use crate::decode::{DecodeTables, Instr};
use crate::dispatch::ExecContext;

pub type Handler = fn(&mut ExecContext, Instr);

pub fn populate(tables: &mut DecodeTables) {
    integer::populate(tables);
    branch::populate(tables);
    memory::populate(tables);
    system::populate(tables);
    fpu::populate(tables);
}
