// Copyright 2024 The ppc-mac Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Floating-Point Status and Control Register.

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    struct Bits: u32 {
        const FX       = 1 << 31;
        const FEX      = 1 << 30;
        const VX       = 1 << 29;
        const OX       = 1 << 28;
        const UX       = 1 << 27;
        const ZX       = 1 << 26;
        const XX       = 1 << 25;
        const VXSNAN   = 1 << 24;
        const VXISI    = 1 << 23;
        const VXIDI    = 1 << 22;
        const VXZDZ    = 1 << 21;
        const VXIMZ    = 1 << 20;
        const VXVC     = 1 << 19;
        const FR       = 1 << 18;
        const FI       = 1 << 17;
        const FPRF_FL  = 1 << 16;
        const FPRF_FG  = 1 << 15;
        const FPRF_FE  = 1 << 14;
        const FPRF_FU  = 1 << 13;
        const VXSOFT   = 1 << 10;
        const VXSQRT   = 1 << 9;
        const VXCVI    = 1 << 8;
        const VE       = 1 << 7;
        const OE       = 1 << 6;
        const UE       = 1 << 5;
        const ZE       = 1 << 4;
        const XE       = 1 << 3;
    }
}

/// Rounding mode, FPSCR[30:31].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoundingMode {
    #[default]
    Nearest,
    TowardZero,
    TowardPositive,
    TowardNegative,
}

impl RoundingMode {
    fn from_bits(bits: u32) -> RoundingMode {
        match bits & 0b11 {
            0 => RoundingMode::Nearest,
            1 => RoundingMode::TowardZero,
            2 => RoundingMode::TowardPositive,
            3 => RoundingMode::TowardNegative,
            _ => unreachable!(),
        }
    }

    fn to_bits(self) -> u32 {
        match self {
            RoundingMode::Nearest => 0,
            RoundingMode::TowardZero => 1,
            RoundingMode::TowardPositive => 2,
            RoundingMode::TowardNegative => 3,
        }
    }
}

/// The exception-cause bits a floating-point instruction can raise. Handlers accumulate
/// these and hand them to [`Fpscr::record`], which derives FX/FEX and the FPRF field.
#[derive(Debug, Clone, Copy, Default)]
pub struct FpExceptions {
    pub invalid_snan: bool,
    pub invalid_isi: bool,
    pub invalid_idi: bool,
    pub invalid_zdz: bool,
    pub invalid_imz: bool,
    pub invalid_vc: bool,
    pub invalid_soft: bool,
    pub invalid_sqrt: bool,
    pub invalid_cvi: bool,
    pub overflow: bool,
    pub underflow: bool,
    pub zero_divide: bool,
    pub inexact: bool,
}

impl FpExceptions {
    pub fn any_invalid(&self) -> bool {
        self.invalid_snan
            || self.invalid_isi
            || self.invalid_idi
            || self.invalid_zdz
            || self.invalid_imz
            || self.invalid_vc
            || self.invalid_soft
            || self.invalid_sqrt
            || self.invalid_cvi
    }

    pub fn any(&self) -> bool {
        self.any_invalid() || self.overflow || self.underflow || self.zero_divide || self.inexact
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fpscr(u32);

impl Fpscr {
    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn set_bits(&mut self, bits: u32) {
        // FX/FEX (bits 31/30) are sticky status derived by hardware, not settable
        // directly by `mtfsf`; callers that need to clear them use `record`/explicit
        // field setters instead.
        self.0 = bits;
    }

    pub fn rounding_mode(&self) -> RoundingMode {
        RoundingMode::from_bits(self.0)
    }

    pub fn set_rounding_mode(&mut self, mode: RoundingMode) {
        self.0 = (self.0 & !0b11) | mode.to_bits();
    }

    fn flags(&self) -> Bits {
        Bits::from_bits_truncate(self.0)
    }

    fn set_flag(&mut self, flag: Bits, value: bool) {
        let mut flags = self.flags();
        flags.set(flag, value);
        self.0 = flags.bits();
    }

    /// Sets FX unconditionally, for callers that know a result merits the exception
    /// summary bit independent of any single cause bit (e.g. a NaN propagated from a
    /// QNaN operand, which sets FPCC_FU and FX without an invalid-operation cause).
    pub fn force_fx(&mut self) {
        self.set_flag(Bits::FX, true);
    }

    pub fn enables_invalid_trap(&self) -> bool {
        self.flags().contains(Bits::VE)
    }

    pub fn enables_overflow_trap(&self) -> bool {
        self.flags().contains(Bits::OE)
    }

    pub fn enables_zero_divide_trap(&self) -> bool {
        self.flags().contains(Bits::ZE)
    }

    /// Sets the FPRF comparison-result nibble (the four FL/FG/FE/FU bits) after a
    /// compare or a result-producing arithmetic op.
    pub fn set_class(&mut self, less: bool, greater: bool, equal: bool, unordered: bool) {
        self.set_flag(Bits::FPRF_FL, less);
        self.set_flag(Bits::FPRF_FG, greater);
        self.set_flag(Bits::FPRF_FE, equal);
        self.set_flag(Bits::FPRF_FU, unordered);
    }

    /// Folds the per-instruction exception set into FPSCR. Each cause bit this
    /// instruction's operation class can raise is sticky: it is set when the condition
    /// fires, but a cause this instruction doesn't touch (e.g. `VXSQRT` during an
    /// `fadd`) is left exactly as a prior instruction left it rather than cleared.
    /// VX and FEX are then recomputed from the current (possibly inherited) cause bits
    /// against their enables. Returns whether the combination of cause bits and enable
    /// bits makes this exception's delivery disabled (non-trapping), in which case the
    /// handler proceeds with the default untrapped result rather than raising a program
    /// exception.
    pub fn record(&mut self, exc: FpExceptions) -> bool {
        if exc.invalid_snan {
            self.set_flag(Bits::VXSNAN, true);
        }
        if exc.invalid_isi {
            self.set_flag(Bits::VXISI, true);
        }
        if exc.invalid_idi {
            self.set_flag(Bits::VXIDI, true);
        }
        if exc.invalid_zdz {
            self.set_flag(Bits::VXZDZ, true);
        }
        if exc.invalid_imz {
            self.set_flag(Bits::VXIMZ, true);
        }
        if exc.invalid_vc {
            self.set_flag(Bits::VXVC, true);
        }
        if exc.invalid_soft {
            self.set_flag(Bits::VXSOFT, true);
        }
        if exc.invalid_sqrt {
            self.set_flag(Bits::VXSQRT, true);
        }
        if exc.invalid_cvi {
            self.set_flag(Bits::VXCVI, true);
        }
        if exc.overflow {
            self.set_flag(Bits::OX, true);
        }
        if exc.underflow {
            self.set_flag(Bits::UX, true);
        }
        if exc.zero_divide {
            self.set_flag(Bits::ZX, true);
        }
        if exc.inexact {
            self.set_flag(Bits::XX, true);
        }

        let vx_sub_causes = Bits::VXSNAN
            | Bits::VXISI
            | Bits::VXIDI
            | Bits::VXZDZ
            | Bits::VXIMZ
            | Bits::VXVC
            | Bits::VXSOFT
            | Bits::VXSQRT
            | Bits::VXCVI;
        self.set_flag(Bits::VX, self.flags().intersects(vx_sub_causes));

        let flags = self.flags();
        let enabled_fired = (flags.contains(Bits::VX) && flags.contains(Bits::VE))
            || (flags.contains(Bits::OX) && flags.contains(Bits::OE))
            || (flags.contains(Bits::UX) && flags.contains(Bits::UE))
            || (flags.contains(Bits::ZX) && flags.contains(Bits::ZE))
            || (flags.contains(Bits::XX) && flags.contains(Bits::XE));
        self.set_flag(Bits::FX, flags.contains(Bits::FX) || exc.any());
        self.set_flag(Bits::FEX, enabled_fired);
        enabled_fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_sets_vx_from_any_sub_cause() {
        let mut fpscr = Fpscr::default();
        let exc = FpExceptions { invalid_isi: true, ..Default::default() };
        fpscr.record(exc);
        assert!(fpscr.flags().contains(Bits::VX));
        assert!(fpscr.flags().contains(Bits::VXISI));
        assert!(fpscr.flags().contains(Bits::FX));
    }

    #[test]
    fn fex_set_only_when_enabled_and_fired() {
        let mut fpscr = Fpscr::default();
        let exc = FpExceptions { zero_divide: true, ..Default::default() };
        let trapped = fpscr.record(exc);
        assert!(!trapped, "ZE not set, so the trap shouldn't fire");
        assert!(fpscr.flags().contains(Bits::ZX));

        fpscr.set_flag(Bits::ZE, true);
        let trapped = fpscr.record(exc);
        assert!(trapped);
    }

    #[test]
    fn record_does_not_clear_an_unrelated_sticky_cause() {
        let mut fpscr = Fpscr::default();
        fpscr.record(FpExceptions { invalid_sqrt: true, ..Default::default() });
        assert!(fpscr.flags().contains(Bits::VXSQRT));

        // A later, unrelated instruction (e.g. fadd) reports no invalid-operation cause
        // of its own; VXSQRT must remain latched from the fsqrt above.
        fpscr.record(FpExceptions::default());
        assert!(fpscr.flags().contains(Bits::VXSQRT));
        assert!(fpscr.flags().contains(Bits::VX));
    }

    #[test]
    fn rounding_mode_round_trips() {
        let mut fpscr = Fpscr::default();
        fpscr.set_rounding_mode(RoundingMode::TowardNegative);
        assert_eq!(fpscr.rounding_mode(), RoundingMode::TowardNegative);
    }
}
