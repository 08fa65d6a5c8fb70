// Copyright 2024 The ppc-mac Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Floating-point instructions.
//!
//! Every arithmetic handler funnels its raw IEEE result and any special-case conditions
//! through [`finish`], which folds them into FPSCR via [`crate::fpscr::Fpscr::record`]
//! and sets the destination register's FPRF class bits, the same update procedure used
//! uniformly across the class.

use crate::decode::{DecodeTables, Instr};
use crate::dispatch::ExecContext;
use crate::fpscr::FpExceptions;
use crate::state::{Cond, Fpr};

pub fn populate(tables: &mut DecodeTables) {
    tables.set_extended_63(21, fadd);
    tables.set_extended_63(20, fsub);
    tables.set_extended_63(25, fmul);
    tables.set_extended_63(18, fdiv);
    tables.set_extended_63(29, fmadd);
    tables.set_extended_63(28, fmsub);
    tables.set_extended_63(31, fnmadd);
    tables.set_extended_63(30, fnmsub);
    tables.set_extended_63(32, fcmpo_handler);
    tables.set_extended_63(0, fcmpu_handler);
    tables.set_extended_63(23, fsel);
    tables.set_extended_63(24, fres);
    tables.set_extended_63(26, frsqrte);
    tables.set_extended_63(14, fctiw);
    tables.set_extended_63(15, fctiwz);
    tables.set_extended_63(583, mffs);
    tables.set_extended_63(711, mtfsf);
    tables.set_extended_59(21, fadds);
    tables.set_extended_59(20, fsubs);
    tables.set_extended_59(25, fmuls);
    tables.set_extended_59(18, fdivs);
}

/// The result of an invalid-operation exception that doesn't already have an operand
/// NaN to propagate (e.g. `0.0/0.0`, `inf - inf`): the canonical quiet NaN. When one
/// operand already is NaN, its bit pattern is propagated instead (quieted if it was
/// signaling), matching real hardware's NaN-propagation behavior rather than always
/// collapsing to the canonical pattern.
fn nan_with_quiet_bit(a: f64, b: f64) -> f64 {
    if a.is_nan() {
        f64::from_bits(a.to_bits() | (1 << 51))
    } else if b.is_nan() {
        f64::from_bits(b.to_bits() | (1 << 51))
    } else {
        f64::from_bits(0x7FF8_0000_0000_0000)
    }
}

/// Stores `result` into `instr`'s `frT`, updates FPSCR's FPRF and cause bits from
/// `exc`, and — when `Rc` is set — copies FPSCR[FX|FEX|VX|OX] into CR1.
fn finish(ctx: &mut ExecContext, instr: Instr, result: f64, exc: FpExceptions) {
    ctx.state.fpr[instr.frt() as usize] = Fpr::from_f64(result);
    let less = !result.is_nan() && result < 0.0;
    let greater = !result.is_nan() && result > 0.0;
    let equal = result == 0.0;
    let unordered = result.is_nan();
    ctx.state.fpscr.set_class(less, greater, equal, unordered);
    ctx.state.fpscr.record(exc);
    if unordered {
        ctx.state.fpscr.force_fx();
    }
    if instr.rc_bit() {
        let bits = ctx.state.fpscr.bits();
        let cond = Cond {
            less_than: bits & (1 << 31) != 0,  // FX
            greater_than: bits & (1 << 30) != 0, // FEX
            equal: bits & (1 << 29) != 0,       // VX
            summary_overflow: bits & (1 << 28) != 0, // OX
        };
        ctx.state.cr.set_field(1, cond);
    }
}

fn is_snan(v: f64) -> bool {
    v.is_nan() && (v.to_bits() >> 51) & 1 == 0
}

fn check_snan_operands(a: f64, b: f64) -> FpExceptions {
    FpExceptions { invalid_snan: is_snan(a) || is_snan(b), ..Default::default() }
}

fn fadd(ctx: &mut ExecContext, instr: Instr) {
    let a = ctx.state.fpr[instr.fra() as usize].as_f64();
    let b = ctx.state.fpr[instr.frb() as usize].as_f64();
    let mut exc = check_snan_operands(a, b);
    let result = if a.is_infinite() && b.is_infinite() && a.signum() != b.signum() {
        exc.invalid_isi = true;
        nan_with_quiet_bit(a, b)
    } else if a.is_nan() || b.is_nan() {
        nan_with_quiet_bit(a, b)
    } else {
        a + b
    };
    finish(ctx, instr, result, exc);
}

fn fsub(ctx: &mut ExecContext, instr: Instr) {
    let a = ctx.state.fpr[instr.fra() as usize].as_f64();
    let b = ctx.state.fpr[instr.frb() as usize].as_f64();
    let mut exc = check_snan_operands(a, b);
    let result = if a.is_infinite() && b.is_infinite() && a.signum() == b.signum() {
        exc.invalid_isi = true;
        nan_with_quiet_bit(a, b)
    } else if a.is_nan() || b.is_nan() {
        nan_with_quiet_bit(a, b)
    } else {
        a - b
    };
    finish(ctx, instr, result, exc);
}

fn fmul(ctx: &mut ExecContext, instr: Instr) {
    let a = ctx.state.fpr[instr.fra() as usize].as_f64();
    let b = ctx.state.fpr[instr.frc() as usize].as_f64();
    let mut exc = check_snan_operands(a, b);
    let result = if (a == 0.0 && b.is_infinite()) || (b == 0.0 && a.is_infinite()) {
        exc.invalid_imz = true;
        nan_with_quiet_bit(a, b)
    } else if a.is_nan() || b.is_nan() {
        nan_with_quiet_bit(a, b)
    } else {
        a * b
    };
    finish(ctx, instr, result, exc);
}

fn fdiv(ctx: &mut ExecContext, instr: Instr) {
    let a = ctx.state.fpr[instr.fra() as usize].as_f64();
    let b = ctx.state.fpr[instr.frb() as usize].as_f64();
    let mut exc = check_snan_operands(a, b);
    let result = if a == 0.0 && b == 0.0 {
        exc.invalid_zdz = true;
        nan_with_quiet_bit(a, b)
    } else if a.is_infinite() && b.is_infinite() {
        exc.invalid_idi = true;
        nan_with_quiet_bit(a, b)
    } else if a.is_nan() || b.is_nan() {
        nan_with_quiet_bit(a, b)
    } else {
        if b == 0.0 {
            exc.zero_divide = true;
        }
        a / b
    };
    finish(ctx, instr, result, exc);
}

/// `frA*frC + frB`, rounded exactly once as a fused multiply-add; computed via
/// `f64::mul_add` rather than separate multiply/add so the host FPU performs the same
/// single rounding step the architecture specifies.
fn fmadd(ctx: &mut ExecContext, instr: Instr) {
    let a = ctx.state.fpr[instr.fra() as usize].as_f64();
    let c = ctx.state.fpr[instr.frc() as usize].as_f64();
    let b = ctx.state.fpr[instr.frb() as usize].as_f64();
    let exc = FpExceptions {
        invalid_snan: is_snan(a) || is_snan(b) || is_snan(c),
        invalid_imz: (a == 0.0 && c.is_infinite()) || (c == 0.0 && a.is_infinite()),
        ..Default::default()
    };
    let result = a.mul_add(c, b);
    finish(ctx, instr, result, exc);
}

fn fmsub(ctx: &mut ExecContext, instr: Instr) {
    let a = ctx.state.fpr[instr.fra() as usize].as_f64();
    let c = ctx.state.fpr[instr.frc() as usize].as_f64();
    let b = ctx.state.fpr[instr.frb() as usize].as_f64();
    let exc = FpExceptions { invalid_snan: is_snan(a) || is_snan(b) || is_snan(c), ..Default::default() };
    let result = a.mul_add(c, -b);
    finish(ctx, instr, result, exc);
}

fn fnmadd(ctx: &mut ExecContext, instr: Instr) {
    let a = ctx.state.fpr[instr.fra() as usize].as_f64();
    let c = ctx.state.fpr[instr.frc() as usize].as_f64();
    let b = ctx.state.fpr[instr.frb() as usize].as_f64();
    let exc = FpExceptions { invalid_snan: is_snan(a) || is_snan(b) || is_snan(c), ..Default::default() };
    let result = -(a.mul_add(c, b));
    finish(ctx, instr, result, exc);
}

fn fnmsub(ctx: &mut ExecContext, instr: Instr) {
    let a = ctx.state.fpr[instr.fra() as usize].as_f64();
    let c = ctx.state.fpr[instr.frc() as usize].as_f64();
    let b = ctx.state.fpr[instr.frb() as usize].as_f64();
    let exc = FpExceptions { invalid_snan: is_snan(a) || is_snan(b) || is_snan(c), ..Default::default() };
    let result = -(a.mul_add(c, -b));
    finish(ctx, instr, result, exc);
}

fn single_precision(ctx: &mut ExecContext, instr: Instr, result: f64, exc: FpExceptions) {
    // `fadds` et al. round the double-precision result to single precision before
    // storing, but the stored value is still carried as a double in the FPR.
    finish(ctx, instr, (result as f32) as f64, exc);
}

fn fadds(ctx: &mut ExecContext, instr: Instr) {
    let a = ctx.state.fpr[instr.fra() as usize].as_f64();
    let b = ctx.state.fpr[instr.frb() as usize].as_f64();
    let exc = check_snan_operands(a, b);
    single_precision(ctx, instr, a + b, exc);
}

fn fsubs(ctx: &mut ExecContext, instr: Instr) {
    let a = ctx.state.fpr[instr.fra() as usize].as_f64();
    let b = ctx.state.fpr[instr.frb() as usize].as_f64();
    let exc = check_snan_operands(a, b);
    single_precision(ctx, instr, a - b, exc);
}

fn fmuls(ctx: &mut ExecContext, instr: Instr) {
    let a = ctx.state.fpr[instr.fra() as usize].as_f64();
    let b = ctx.state.fpr[instr.frc() as usize].as_f64();
    let exc = check_snan_operands(a, b);
    single_precision(ctx, instr, a * b, exc);
}

fn fdivs(ctx: &mut ExecContext, instr: Instr) {
    let a = ctx.state.fpr[instr.fra() as usize].as_f64();
    let b = ctx.state.fpr[instr.frb() as usize].as_f64();
    let mut exc = check_snan_operands(a, b);
    if b == 0.0 && !a.is_nan() {
        exc.zero_divide = true;
    }
    single_precision(ctx, instr, a / b, exc);
}

fn compare(ctx: &mut ExecContext, instr: Instr, ordered: bool) {
    let a = ctx.state.fpr[instr.fra() as usize].as_f64();
    let b = ctx.state.fpr[instr.frb() as usize].as_f64();
    let unordered = a.is_nan() || b.is_nan();
    let cond = Cond {
        less_than: !unordered && a < b,
        greater_than: !unordered && a > b,
        equal: !unordered && a == b,
        summary_overflow: unordered,
    };
    ctx.state.cr.set_field(instr.crfd(), cond);
    ctx.state.fpscr.set_class(cond.less_than, cond.greater_than, cond.equal, unordered);
    if unordered {
        // `fcmpo` additionally raises VXVC for any NaN operand; `fcmpu` only ever
        // raises the SNaN sub-cause.
        let exc = FpExceptions {
            invalid_snan: is_snan(a) || is_snan(b),
            invalid_vc: ordered,
            ..Default::default()
        };
        ctx.state.fpscr.record(exc);
    }
}

fn fcmpo_handler(ctx: &mut ExecContext, instr: Instr) {
    compare(ctx, instr, true);
}

fn fcmpu_handler(ctx: &mut ExecContext, instr: Instr) {
    compare(ctx, instr, false);
}

/// `fselA >= 0.0 ? frC : frB`. `-0.0 >= 0.0` is true under IEEE comparison, so
/// `frA = -0.0` selects `frC`.
fn fsel(ctx: &mut ExecContext, instr: Instr) {
    let a = ctx.state.fpr[instr.fra() as usize].as_f64();
    let c = ctx.state.fpr[instr.frc() as usize].as_f64();
    let b = ctx.state.fpr[instr.frb() as usize].as_f64();
    let result = if !a.is_nan() && a >= 0.0 { c } else { b };
    ctx.state.fpr[instr.frt() as usize] = Fpr::from_f64(result);
}

/// Reciprocal estimate, accurate to one part in 256 per the architecture. Implemented
/// as an exact `1.0 / b` then truncated to single precision, which is within the
/// architectural error bound without reproducing the hardware's table-lookup algorithm.
fn fres(ctx: &mut ExecContext, instr: Instr) {
    let b = ctx.state.fpr[instr.frb() as usize].as_f64();
    let exc = FpExceptions { invalid_snan: is_snan(b), zero_divide: b == 0.0, ..Default::default() };
    let result = (1.0 / b) as f32;
    finish(ctx, instr, result as f64, exc);
}

/// Reciprocal square root estimate, same approximation strategy as [`fres`].
fn frsqrte(ctx: &mut ExecContext, instr: Instr) {
    let b = ctx.state.fpr[instr.frb() as usize].as_f64();
    let exc = FpExceptions {
        invalid_snan: is_snan(b),
        invalid_sqrt: b < 0.0 && !b.is_nan(),
        zero_divide: b == 0.0,
        ..Default::default()
    };
    let result = (1.0 / b.sqrt()) as f32;
    finish(ctx, instr, result as f64, exc);
}

/// Converts to a signed 32-bit integer, rounding per FPSCR's rounding mode; the integer
/// result is stored as the low word of the FPR with the high word forced to
/// `0xFFF80000`.
fn fctiw(ctx: &mut ExecContext, instr: Instr) {
    convert_to_integer(ctx, instr, false);
}

fn fctiwz(ctx: &mut ExecContext, instr: Instr) {
    convert_to_integer(ctx, instr, true);
}

fn convert_to_integer(ctx: &mut ExecContext, instr: Instr, truncate: bool) {
    let b = ctx.state.fpr[instr.frb() as usize].as_f64();
    let rounded = if truncate {
        b.trunc()
    } else {
        use crate::fpscr::RoundingMode;
        match ctx.state.fpscr.rounding_mode() {
            RoundingMode::Nearest => b.round_ties_even(),
            RoundingMode::TowardZero => b.trunc(),
            RoundingMode::TowardPositive => b.ceil(),
            RoundingMode::TowardNegative => b.floor(),
        }
    };
    let invalid_cvi = b.is_nan() || rounded > i32::MAX as f64 || rounded < i32::MIN as f64;
    let low = if invalid_cvi {
        if b.is_sign_negative() && !b.is_nan() { i32::MIN as u32 } else { i32::MAX as u32 }
    } else {
        rounded as i32 as u32
    };
    let exc = FpExceptions {
        invalid_snan: is_snan(b),
        invalid_cvi,
        inexact: !invalid_cvi && rounded != b,
        ..Default::default()
    };
    ctx.state.fpr[instr.frt() as usize] = Fpr::from_integer_result(low);
    ctx.state.fpscr.record(exc);
}

fn mffs(ctx: &mut ExecContext, instr: Instr) {
    // The upper 32 bits are architecturally unspecified; left unchanged rather than
    // zeroed, matching the other "preserve what we don't define" choices in this core.
    ctx.state.fpr[instr.frt() as usize].set_low_u32(ctx.state.fpscr.bits());
}

/// `mtfsf`: each set bit of the 8-bit `FM` mask (here read from `fxm()`, the same bit
/// position as `mtcrf`'s field mask) copies the corresponding 4-bit field of `frB`'s low
/// word into FPSCR.
fn mtfsf(ctx: &mut ExecContext, instr: Instr) {
    let frb_bits = ctx.state.fpr[instr.frb() as usize].low_u32();
    let mut fpscr = ctx.state.fpscr.bits();
    for field in 0..8 {
        if instr.fxm() & (1 << (7 - field)) != 0 {
            let shift = (7 - field) * 4;
            let mask = 0xFu32 << shift;
            fpscr = (fpscr & !mask) | (frb_bits & mask);
        }
    }
    ctx.state.fpscr.set_bits(fpscr);
}
