// Copyright 2024 The ppc-mac Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Memory-mapped I/O routing and interrupt aggregation.
//!
//! This crate has no knowledge of the PowerPC CPU core or the MMU; it only models the
//! contract a device endpoint must satisfy to be reachable from a guest physical address,
//! and the contract an interrupt controller must satisfy to aggregate device interrupt
//! lines into the CPU's external-interrupt input. The MMU (in the `mmu` crate) is the
//! only caller of `Bus::dispatch_read`/`dispatch_write` on the hot load/store path.

mod bus;
mod irqchip;

pub use bus::{Bus, BusDevice, BusError, BusRange, Width};
pub use irqchip::{InterruptController, IrqCookie, IrqKind};
