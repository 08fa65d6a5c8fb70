use devices::Bus;
use mmu::{Intent, Mmu, MmuFault, TranslationMode};

fn relocated_mode() -> TranslationMode {
    TranslationMode {
        instr_relocate: true,
        data_relocate: true,
        privileged: true,
    }
}

fn identity_dbat(mmu: &mut Mmu, index: usize, base: u32) {
    // Vp=bit0, Vs=bit1, EPI/RPN occupy bits 17..31 of the upper/lower words
    // respectively (see `Bat`'s field layout), block_length_mask=0 => 128 KiB block.
    let upper = 0b11u32 | ((base >> 17) << 17);
    let lower = ((base >> 17) << 17) | 0b11;
    mmu.write_dbat(index, upper, lower);
}

#[test]
fn bat_miss_falls_back_to_pte_walk() {
    let mut mmu = Mmu::new(0x2_0000);
    let bus = Bus::new();
    let mode = relocated_mode();

    identity_dbat(&mut mmu, 0, 0x0000_0000);

    mmu.ram.write(0x1000, devices::Width::Dword, 0xCAFEBABE).unwrap();
    let value = mmu.load(&bus, 0x1000, 4, mode).expect("BAT-mapped RAM read");
    assert_eq!(value, 0xCAFEBABE);

    // Clear DBAT0: next access to the same address must miss the BAT. With no PTE
    // installed, the hashed page table walk also misses, producing a DSI.
    mmu.write_dbat(0, 0, 0);
    let err = mmu.load(&bus, 0x1000, 4, mode).unwrap_err();
    assert!(matches!(err, MmuFault::Dsi { .. }));
}

#[test]
fn translation_cache_is_populated_after_first_translate() {
    let mut mmu = Mmu::new(0x2_0000);
    identity_dbat(&mut mmu, 0, 0);
    let mode = relocated_mode();

    assert!(mmu.translate(0x500, mode, Intent::Load).is_ok());
    // A second translate of the same page must still succeed and agree with the first.
    // We can't observe the cache's internal hit counter from outside the crate, so we
    // assert the externally-visible contract: identical inputs produce identical outputs
    // with no observable side effect.
    let (phys_a, _) = mmu.translate(0x500, mode, Intent::Load).unwrap();
    let (phys_b, _) = mmu.translate(0x500, mode, Intent::Load).unwrap();
    assert_eq!(phys_a, phys_b);
}

#[test]
fn untranslated_mode_passes_address_through() {
    let mut mmu = Mmu::new(0x1000);
    let mode = TranslationMode {
        instr_relocate: false,
        data_relocate: false,
        privileged: true,
    };
    let (phys, _) = mmu.translate(0x123, mode, Intent::Load).unwrap();
    assert_eq!(phys, 0x123);
}

#[test]
fn store_without_write_permission_faults() {
    let mut mmu = Mmu::new(0x2_0000);
    let bus = Bus::new();
    let mode = relocated_mode();

    // Read-only BAT: PP = 0b10 is read-only in this model (writable() requires PP==0b11).
    let upper = 0b11u32; // Vp=Vs=1
    let lower = 0b10; // read-only
    mmu.write_dbat(0, upper, lower);

    let err = mmu.store(&bus, 0x10, 4, 0xDEAD_BEEF, mode).unwrap_err();
    assert!(matches!(err, MmuFault::Dsi { is_store: true, .. }));
}

#[test]
fn unaligned_ram_access_across_a_page_boundary_splits_and_succeeds() {
    let mut mmu = Mmu::new(0x2_0000);
    let bus = Bus::new();
    let mode = relocated_mode();
    identity_dbat(&mut mmu, 0, 0);

    // 3 bytes before the 0x1000 boundary: a 4-byte access here splits into a 3-byte and
    // a 1-byte sub-access, neither of which is a power-of-two width.
    let vaddr = 0xFFD;
    mmu.store(&bus, vaddr, 4, 0xAABBCCDD, mode).expect("unaligned RAM split should succeed");
    let value = mmu.load(&bus, vaddr, 4, mode).expect("unaligned RAM split should succeed");
    assert_eq!(value, 0xAABBCCDD);
}
