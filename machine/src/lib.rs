// Copyright 2024 The ppc-mac Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Wires a [`cpu::GuestState`], an [`mmu::Mmu`], and a [`devices::Bus`]/[`InterruptController`]
//! pair into a runnable machine, and drives the fetch-decode-execute loop between the
//! points where an interrupt may be taken.

pub mod config;
mod error;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use devices::{Bus, BusDevice, InterruptController, Width};
use mmu::Mmu;

pub use config::{Cli, MachineConfig};
pub use devices::IrqCookie;
pub use error::MachineError;

/// Physical base of the interrupt controller's guest-visible register block. Chosen in
/// the low-MMIO range classic Mac I/O ASICs occupy; nothing in the core depends on the
/// exact value beyond it not overlapping RAM or the ROM image.
const IRQCHIP_BASE: u64 = 0xF300_0000;
const IRQCHIP_LEN: u64 = 0x30;

/// Physical base the ROM image is mapped at. Chosen so the hard-reset vector
/// (`0xFFF0_0100`, per `GuestState::new` with MSR[IP] set) falls inside it without
/// requiring guest RAM to extend anywhere near the top of the 32-bit physical space.
const ROM_BASE: u64 = 0xFFF0_0000;

/// A flat, read-only byte region backing a mapped ROM image. Writes are logged and
/// dropped rather than rejected outright — real firmware occasionally probes for
/// writability during startup, and silently ignoring the write (as real ROM hardware
/// does) is closer to guest-visible reality than faulting.
struct RomImage(Vec<u8>);

impl BusDevice for RomImage {
    fn debug_label(&self) -> String {
        "rom".to_string()
    }

    fn read(&self, offset: u64, width: Width) -> u64 {
        let start = offset as usize;
        let len = width.bytes() as usize;
        let mut buf = [0u8; 8];
        if let Some(slice) = self.0.get(start..start + len) {
            buf[8 - len..].copy_from_slice(slice);
        }
        u64::from_be_bytes(buf)
    }

    fn write(&self, offset: u64, _width: Width, _value: u64) {
        log::warn!("ignoring guest write to ROM at offset {offset:#x}");
    }
}

/// Owns the whole assembled machine: guest register file, MMU (and through it, guest
/// RAM), the shared MMIO bus, and the interrupt controller the bus and the dispatch loop
/// both read from.
pub struct Machine {
    pub state: cpu::GuestState,
    pub mmu: Mmu,
    pub bus: Bus,
    interrupts: Arc<InterruptController>,
}

impl Machine {
    /// Assembles a machine from `config` with no pre-registered device interrupt
    /// sources. Equivalent to `with_interrupt_sources(config, 0)` for callers that don't
    /// need any (e.g. a headless CPU/MMU conformance test).
    pub fn new(config: &MachineConfig) -> Result<Machine, MachineError> {
        Machine::with_interrupt_sources(config, 0).map(|(machine, _)| machine)
    }

    /// Assembles a machine from `config`, pre-registering `device_source_count` edge-
    /// sensitive interrupt sources on the controller before it is frozen into the shared
    /// handle the `Bus` and the dispatch loop both read from. Device models (out of this
    /// core's scope) register their sources this way at machine-assembly time; the
    /// returned cookies are handed to those device constructors.
    pub fn with_interrupt_sources(
        config: &MachineConfig,
        device_source_count: u32,
    ) -> Result<(Machine, Vec<IrqCookie>), MachineError> {
        let mut irqchip = InterruptController::new();
        let cookies = (0..device_source_count)
            .map(|id| irqchip.register_device_interrupt(id))
            .collect();
        let interrupts = Arc::new(irqchip);

        let mut bus = Bus::new();
        bus.register_region(IRQCHIP_BASE, IRQCHIP_LEN, Box::new(Arc::clone(&interrupts)))?;

        let mmu = Mmu::new(config.ram_size);
        if let Some(rom_path) = &config.rom_path {
            let bytes = std::fs::read(rom_path)
                .map_err(|_| MachineError::RomNotFound(rom_path.clone()))?;
            let rom_len = bytes.len() as u64;
            bus.register_region(ROM_BASE, rom_len, Box::new(RomImage(bytes)))?;
        }

        let state = cpu::GuestState::new(config.pvr);
        let machine = Machine { state, mmu, bus, interrupts };
        Ok((machine, cookies))
    }

    /// The interrupt controller's shared handle, for a test or a machine-assembly layer
    /// that needs to assert/deassert a line or poll aggregation state directly rather
    /// than through the guest-visible register block.
    pub fn interrupts(&self) -> &InterruptController {
        &self.interrupts
    }

    /// Resets architectural state to the hard-reset vector rules: a fresh `GuestState`
    /// with MSR[IP] set and everything else clear, SPR 287 carrying the configured PVR,
    /// and PC at the hard-reset vector.
    pub fn reset(&mut self, config: &MachineConfig) {
        self.state = cpu::GuestState::new(config.pvr);
    }

    /// Executes exactly one instruction and the interrupt-recognition point that follows
    /// it: DEC underflow first, then the aggregated external line, both gated by
    /// MSR[EE]. This is the single unit `run_until` repeats; exposed separately so a
    /// caller (or a test) can observe machine state between instructions.
    pub fn step(&mut self) {
        cpu::step(&mut self.state, &mut self.mmu, &self.bus);

        let (next_dec, underflowed) = self.state.dec.overflowing_sub(1);
        self.state.dec = next_dec;

        if self.state.msr.contains(cpu::Msr::EE) {
            if underflowed {
                cpu::deliver(&mut self.state, cpu::Exception::Decrementer);
            } else if self.interrupts.external_interrupt_pending() {
                cpu::deliver(&mut self.state, cpu::Exception::ExternalInterrupt);
            }
        }
    }

    /// The fetch-decode-execute loop. Runs until `stop` is observed set at an instruction
    /// boundary; completes the current instruction first (the stop flag is advisory, not
    /// a synchronization point for guest-visible state).
    pub fn run_until(&mut self, stop: &AtomicBool) {
        while !stop.load(Ordering::Relaxed) {
            self.step();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_machine_resets_to_the_hard_reset_vector() {
        let config = MachineConfig { ram_size: 0x1_0000, ..Default::default() };
        let machine = Machine::new(&config).unwrap();
        assert_eq!(machine.state.pc, 0xFFF0_0100);
        assert_eq!(machine.state.pvr, config.pvr);
    }

    #[test]
    fn missing_rom_is_reported_before_the_dispatch_loop_starts() {
        let config = MachineConfig {
            ram_size: 0x1_0000,
            rom_path: Some("/nonexistent/rom.bin".into()),
            ..Default::default()
        };
        assert!(matches!(Machine::new(&config), Err(MachineError::RomNotFound(_))));
    }
}
