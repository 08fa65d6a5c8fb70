// Copyright 2024 The ppc-mac Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The PowerPC instruction interpreter: register file, decode tables, dispatch loop,
//! and exception delivery.
//!
//! Register state is kept separate from the run loop: [`state::GuestState`] is pure
//! data, [`decode`] turns a raw instruction word into a handler, [`dispatch::step`]
//! wires fetch to execute to exception delivery, and [`handlers`] holds the actual
//! instruction semantics.

mod decode;
mod dispatch;
mod exception;
mod fpscr;
mod handlers;
mod state;

pub use dispatch::{step, ExecContext};
pub use exception::{deliver, from_mmu_fault, Exception};
pub use fpscr::{FpExceptions, Fpscr, RoundingMode};
pub use state::{Cond, ConditionRegister, Fpr, GuestState, Msr, Xer};
