// Copyright 2024 The ppc-mac Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The guest architectural register file.
//!
//! Register field layouts (MSR, XER, CR) follow the PowerPC architecture's own bit
//! assignments, reimplemented here by hand with `bitflags` for the single-bit flags and
//! a small manual accessor for the few multi-bit fields (XER's byte count, CR's
//! per-field nibbles).

use bitflags::bitflags;

bitflags! {
    /// Machine State Register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Msr: u32 {
        /// Little-endian mode. Not supported by this core; always 0.
        const LE   = 1 << 0;
        /// Whether the last exception is recoverable.
        const RI   = 1 << 1;
        /// Data address translation enabled.
        const DR   = 1 << 4;
        /// Instruction address translation enabled.
        const IR   = 1 << 5;
        /// Exception vector prefix: 0 = 0x000n_nnnn, 1 = 0xFFFn_nnnn.
        const IP   = 1 << 6;
        const FE1  = 1 << 8;
        const FE0  = 1 << 11;
        /// Machine check exceptions enabled.
        const ME   = 1 << 12;
        /// Floating point available.
        const FP   = 1 << 13;
        /// Problem (user) state.
        const PR   = 1 << 14;
        /// External interrupts enabled.
        const EE   = 1 << 15;
        const EXCEPTION_LE = 1 << 16;
    }
}

impl Msr {
    /// Reset value: exception vectors at 0xFFFn_nnnn, everything else off.
    pub fn reset_value() -> Msr {
        Msr::IP
    }

    pub fn privileged(&self) -> bool {
        !self.contains(Msr::PR)
    }
}

bitflags! {
    /// Fixed-point Exception Register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    struct XerFlags: u32 {
        const CA = 1 << 29;
        const OV = 1 << 30;
        const SO = 1 << 31;
    }
}

/// XER: carry/overflow/summary-overflow plus the byte count used by `lswx`/`stswx`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Xer(u32);

impl Xer {
    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn set_bits(&mut self, bits: u32) {
        self.0 = bits;
    }

    pub fn byte_count(&self) -> u32 {
        self.0 & 0x7F
    }

    pub fn set_byte_count(&mut self, count: u32) {
        self.0 = (self.0 & !0x7F) | (count & 0x7F);
    }

    pub fn carry(&self) -> bool {
        XerFlags::from_bits_truncate(self.0).contains(XerFlags::CA)
    }

    pub fn set_carry(&mut self, value: bool) {
        self.set_flag(XerFlags::CA, value);
    }

    pub fn overflow(&self) -> bool {
        XerFlags::from_bits_truncate(self.0).contains(XerFlags::OV)
    }

    pub fn set_overflow(&mut self, value: bool) {
        self.set_flag(XerFlags::OV, value);
    }

    pub fn summary_overflow(&self) -> bool {
        XerFlags::from_bits_truncate(self.0).contains(XerFlags::SO)
    }

    pub fn set_summary_overflow(&mut self, value: bool) {
        self.set_flag(XerFlags::SO, value);
    }

    /// `OE`-bit semantics: set OV to the new overflow state, and latch SO (sticky) if it
    /// occurred.
    pub fn record_overflow(&mut self, overflowed: bool) {
        self.set_overflow(overflowed);
        if overflowed {
            self.set_summary_overflow(true);
        }
    }

    fn set_flag(&mut self, flag: XerFlags, value: bool) {
        let mut flags = XerFlags::from_bits_truncate(self.0);
        flags.set(flag, value);
        self.0 = flags.bits();
    }
}

/// One 4-bit condition-field cell (CR0..CR7 or a comparison destination field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cond {
    pub less_than: bool,
    pub greater_than: bool,
    pub equal: bool,
    pub summary_overflow: bool,
}

impl Cond {
    fn to_nibble(self) -> u32 {
        (self.less_than as u32) << 3
            | (self.greater_than as u32) << 2
            | (self.equal as u32) << 1
            | (self.summary_overflow as u32)
    }

    fn from_nibble(n: u32) -> Cond {
        Cond {
            less_than: n & 0b1000 != 0,
            greater_than: n & 0b0100 != 0,
            equal: n & 0b0010 != 0,
            summary_overflow: n & 0b0001 != 0,
        }
    }

    /// The field an integer compare-to-zero (`Rc`/`cmp`) produces, carrying XER[SO].
    pub fn from_signed_compare(value: i32, so: bool) -> Cond {
        Cond {
            less_than: value < 0,
            greater_than: value > 0,
            equal: value == 0,
            summary_overflow: so,
        }
    }
}

/// The 32-bit condition register, eight 4-bit fields with CR0 as the most significant
/// nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConditionRegister(u32);

impl ConditionRegister {
    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn set_bits(&mut self, bits: u32) {
        self.0 = bits;
    }

    fn shift_for(field: usize) -> u32 {
        debug_assert!(field < 8);
        (7 - field as u32) * 4
    }

    pub fn field(&self, field: usize) -> Cond {
        Cond::from_nibble((self.0 >> Self::shift_for(field)) & 0xF)
    }

    pub fn set_field(&mut self, field: usize, value: Cond) {
        let shift = Self::shift_for(field);
        self.0 = (self.0 & !(0xF << shift)) | (value.to_nibble() << shift);
    }
}

/// A floating-point register's dual view: an IEEE-754 double and its raw 64-bit integer
/// pattern, required to alias the same storage. Modelled as a single `u64` storage cell
/// with bit-preserving conversions in both directions rather than relying on
/// language-level aliasing rules.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Fpr(u64);

impl Fpr {
    pub fn from_f64(value: f64) -> Fpr {
        Fpr(value.to_bits())
    }

    pub fn from_bits(bits: u64) -> Fpr {
        Fpr(bits)
    }

    pub fn as_f64(self) -> f64 {
        f64::from_bits(self.0)
    }

    pub fn as_bits(self) -> u64 {
        self.0
    }

    pub fn low_u32(self) -> u32 {
        self.0 as u32
    }

    /// `stfiwx` writes the low 32 bits of the raw integer view without conversion.
    pub fn set_low_u32(&mut self, value: u32) {
        self.0 = (self.0 & 0xFFFF_FFFF_0000_0000) | value as u64;
    }

    /// Marks the high 32 bits as holding an integer payload (used by `fctiw`/`fctiwz`):
    /// the high 32 bits are set to `0xFFF80000`.
    pub fn from_integer_result(low: u32) -> Fpr {
        Fpr((0xFFF8_0000u64 << 32) | low as u64)
    }
}

/// The full guest register file plus the PC. Passed by `&mut` to every instruction
/// handler.
#[derive(Debug, Clone)]
pub struct GuestState {
    /// General-purpose registers. Storage is 64-bit even though this profile only ever
    /// uses the low 32 bits.
    gpr: [u64; 32],
    pub fpr: [Fpr; 32],
    pub cr: ConditionRegister,
    pub xer: Xer,
    pub lr: u32,
    pub ctr: u32,
    pub fpscr: crate::fpscr::Fpscr,
    pub msr: Msr,
    /// The currently executing instruction word, the "well-known slot" the handler
    /// contract reads from.
    pub current_instruction: u32,
    pub pc: u32,
    pub srr0: u32,
    pub srr1: u32,
    /// Data Address Register: faulting address latched by DSI/alignment exceptions.
    pub dar: u32,
    pub pvr: u32,
    /// Decrementer; underflow raises the decrementer exception.
    pub dec: u32,
}

impl GuestState {
    pub fn new(pvr: u32) -> GuestState {
        GuestState {
            gpr: [0; 32],
            fpr: [Fpr::default(); 32],
            cr: ConditionRegister::default(),
            xer: Xer::default(),
            lr: 0,
            ctr: 0,
            fpscr: crate::fpscr::Fpscr::default(),
            msr: Msr::reset_value(),
            current_instruction: 0,
            pc: 0xFFF0_0100,
            srr0: 0,
            srr1: 0,
            dar: 0,
            pvr,
            dec: 0xFFFF_FFFF,
        }
    }

    pub fn gpr(&self, r: u8) -> u32 {
        self.gpr[r as usize] as u32
    }

    pub fn set_gpr(&mut self, r: u8, value: u32) {
        self.gpr[r as usize] = value as u64;
    }

    /// `rA|0`: register number 0 reads as the literal value zero.
    pub fn gpr_or_zero(&self, r: u8) -> u32 {
        if r == 0 {
            0
        } else {
            self.gpr(r)
        }
    }
}
