use devices::{Bus, Width};
use mmu::Mmu;

use cpu::{Fpr, GuestState};

fn harness() -> (GuestState, Mmu, Bus) {
    let mut state = GuestState::new(0);
    state.pc = 0; // untranslated mode (MSR[IR|DR]=0 at reset), RAM starts at 0
    let mmu = Mmu::new(0x1_0000);
    let bus = Bus::new();
    (state, mmu, bus)
}

fn place(mmu: &mut Mmu, addr: u32, word: u32) {
    mmu.ram.write(addr, Width::Dword, word as u64).unwrap();
}

/// `fadd.` of a NaN frA propagates the NaN and sets CR1 from FPSCR.
#[test]
fn fadd_propagates_nan_and_sets_cr1() {
    let (mut state, mut mmu, bus) = harness();
    state.fpr[1] = Fpr::from_bits(0x7FF8_0000_0000_0000);
    state.fpr[2] = Fpr::from_f64(1.0);
    // fadd. frt=3, fra=1, frb=2, Rc=1
    let word = (63u32 << 26) | (3 << 21) | (1 << 16) | (2 << 11) | (21 << 1) | 1;
    place(&mut mmu, 0, word);

    cpu::step(&mut state, &mut mmu, &bus);

    assert_eq!(state.fpr[3].as_bits(), 0x7FF8_0000_0000_0000);
    assert!(state.fpscr.bits() & (1 << 31) != 0, "FX should be set");
    assert!(state.fpscr.bits() & (1 << 13) != 0, "FPCC_FU should be set");
    // CR1 carries FX/FEX/VX/OX, so its LT bit (mirroring FX) must be set.
    assert!(state.cr.field(1).less_than);
}

/// `fctiwz` of a value outside i32 range saturates and sets VXCVI.
#[test]
fn fctiwz_overflow_saturates_and_sets_vxcvi() {
    let (mut state, mut mmu, bus) = harness();
    state.fpr[1] = Fpr::from_f64(3.0e10);
    // fctiwz frt=2, frb=1
    let word = (63u32 << 26) | (2 << 21) | (1 << 11) | (15 << 1);
    place(&mut mmu, 0, word);

    cpu::step(&mut state, &mut mmu, &bus);

    let bits = state.fpr[2].as_bits();
    assert_eq!(bits as u32, 0x7FFF_FFFF);
    assert_eq!((bits >> 32) as u32, 0xFFF8_0000);
    assert!(state.fpscr.bits() & (1 << 31) != 0, "FX");
    assert!(state.fpscr.bits() & (1 << 29) != 0, "VX");
    assert!(state.fpscr.bits() & (1 << 8) != 0, "VXCVI");
}

/// `lwzu` with `rA = rT = 0` is an illegal instruction form.
#[test]
fn lwzu_update_form_illegal() {
    let (mut state, mut mmu, bus) = harness();
    state.set_gpr(0, 0xAAAA_AAAA);
    // lwzu r0, 4(r0)
    let word = (33u32 << 26) | (0 << 21) | (0 << 16) | 4;
    place(&mut mmu, 0, word);

    cpu::step(&mut state, &mut mmu, &bus);

    assert_eq!(state.srr0, 0, "SRR0 must point at the faulting instruction, not the next one");
    assert_eq!(state.gpr(0), 0xAAAA_AAAA, "r0 must be unchanged");
    assert_eq!(state.pc, 0xFFF0_0700, "PC must be redirected to the program exception vector");
}

/// `add.` wraps mod 2^32 and sets CR0 from the signed result.
#[test]
fn property_add_wraps_mod_2_32_and_sets_cr0() {
    let (mut state, mut mmu, bus) = harness();
    state.set_gpr(3, 0xFFFF_FFFF); // -1
    state.set_gpr(4, 2);
    // add. rt=5, ra=3, rb=4, Rc=1
    let word = (31u32 << 26) | (5 << 21) | (3 << 16) | (4 << 11) | (266 << 1) | 1;
    place(&mut mmu, 0, word);

    cpu::step(&mut state, &mut mmu, &bus);

    assert_eq!(state.gpr(5), 1); // (-1 + 2) mod 2^32 == 1
    assert!(state.cr.field(0).greater_than);
}

/// `fsel` never faults, even on NaN operands.
#[test]
fn property_fsel_never_faults_on_nan() {
    let (mut state, mut mmu, bus) = harness();
    state.fpr[1] = Fpr::from_bits(0x7FF8_0000_0000_0000); // NaN in frA
    state.fpr[2] = Fpr::from_f64(2.0);
    state.fpr[3] = Fpr::from_f64(3.0);
    // fsel frt=4, fra=1, frb=3, frc=2
    let word = (63u32 << 26) | (4 << 21) | (1 << 16) | (3 << 11) | (2 << 6) | (23 << 1);
    place(&mut mmu, 0, word);

    cpu::step(&mut state, &mut mmu, &bus);

    assert_eq!(state.fpr[4].as_f64(), 3.0, "NaN frA must fall through to frB");
    assert!(state.fpscr.bits() & (1 << 29) == 0, "VX must not be set");
}

/// A handful of IEEE special cases for `fdiv`.
#[test]
fn property_fdiv_ieee_special_cases() {
    let (mut state, mut mmu, bus) = harness();
    state.fpr[1] = Fpr::from_f64(0.0);
    state.fpr[2] = Fpr::from_f64(0.0);
    // fdiv frt=3, fra=1, frb=2
    let word = (63u32 << 26) | (3 << 21) | (1 << 16) | (2 << 11) | (18 << 1);
    place(&mut mmu, 0, word);

    cpu::step(&mut state, &mut mmu, &bus);

    assert!(state.fpr[3].as_f64().is_nan(), "0/0 must be NaN");
    assert!(state.fpscr.bits() & (1 << 21) != 0, "VXZDZ must be set");
}
