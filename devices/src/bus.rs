// Copyright 2024 The ppc-mac Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fmt;

use thiserror::Error;

/// Access width of a single MMIO transaction, in bytes.
///
/// Widths 1/2/4 must be supported by every device; width 8 is optional and a device that
/// does not implement it must report `BusError::UnsupportedWidth` via
/// `BusDevice::supports_width` rather than silently truncating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Width {
    Byte = 1,
    Word = 2,
    Dword = 4,
    Qword = 8,
}

impl Width {
    pub fn from_bytes(n: u8) -> Option<Width> {
        match n {
            1 => Some(Width::Byte),
            2 => Some(Width::Word),
            4 => Some(Width::Dword),
            8 => Some(Width::Qword),
            _ => None,
        }
    }

    pub fn bytes(self) -> u64 {
        self as u64
    }
}

/// A half-open guest-physical range `[start, start + len)` claimed by a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusRange {
    pub start: u64,
    pub len: u64,
}

impl BusRange {
    pub fn end(&self) -> u64 {
        self.start + self.len
    }

    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.end()
    }

    fn overlaps(&self, other: &BusRange) -> bool {
        self.start < other.end() && other.start < self.end()
    }
}

/// A region endpoint reachable from the MMIO router.
///
/// Implementors are invoked only from the single dispatch thread that owns the CPU and
/// MMU; any state the device shares with another host thread (an audio ring buffer, a
/// DMA completion queue, ...) is that device's own responsibility to synchronize.
/// `read`/`write` take `&self` for this reason: a device that needs to mutate itself on
/// access owns a `RefCell`/`Mutex` internally.
pub trait BusDevice: Send + Sync {
    /// A short name used only for diagnostics (logged at registration).
    fn debug_label(&self) -> String {
        "unknown".to_string()
    }

    /// Read `width` bytes at `offset` (relative to the region's start).
    fn read(&self, offset: u64, width: Width) -> u64;

    /// Write `width` bytes of `value` at `offset` (relative to the region's start).
    fn write(&self, offset: u64, width: Width, value: u64);

    /// Whether this device implements the given access width. Every device must support
    /// byte/word/dword; 8-byte access is opt-in.
    fn supports_width(&self, width: Width) -> bool {
        !matches!(width, Width::Qword)
    }
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("MMIO region [{0:#x}, {1:#x}) overlaps an already-registered region")]
    Overlap(u64, u64),
    #[error("no MMIO region claims guest physical address {0:#x}")]
    Unmapped(u64),
    #[error("device at {0:#x} does not support {1}-byte access")]
    UnsupportedWidth(u64, u8),
}

struct Entry {
    range: BusRange,
    device: Box<dyn BusDevice>,
}

/// Ordered registry of non-overlapping MMIO regions.
///
/// Built once at machine-construction time and read-only for the remainder of the
/// machine's life, then consulted on every guest physical access that misses RAM.
#[derive(Default)]
pub struct Bus {
    entries: Vec<Entry>,
}

impl Bus {
    pub fn new() -> Bus {
        Bus { entries: Vec::new() }
    }

    /// Registers `device` to handle accesses to `[start, start + len)`. Fails if the new
    /// range overlaps any already-registered range.
    pub fn register_region(
        &mut self,
        start: u64,
        len: u64,
        device: Box<dyn BusDevice>,
    ) -> Result<(), BusError> {
        let range = BusRange { start, len };
        if let Some(existing) = self.entries.iter().find(|e| e.range.overlaps(&range)) {
            log::error!(
                "rejecting MMIO region [{:#x}, {:#x}) for {}: overlaps [{:#x}, {:#x})",
                range.start,
                range.end(),
                device.debug_label(),
                existing.range.start,
                existing.range.end(),
            );
            return Err(BusError::Overlap(start, start + len));
        }
        log::info!(
            "registered MMIO region [{:#x}, {:#x}) for {}",
            range.start,
            range.end(),
            device.debug_label()
        );
        let insert_at = self
            .entries
            .partition_point(|e| e.range.start < range.start);
        self.entries.insert(insert_at, Entry { range, device });
        Ok(())
    }

    fn find(&self, addr: u64) -> Option<&Entry> {
        // `entries` is sorted by start and non-overlapping, so a binary search on start
        // followed by a containment check on the predecessor bucket suffices.
        let idx = self.entries.partition_point(|e| e.range.start <= addr);
        self.entries[..idx]
            .last()
            .filter(|e| e.range.contains(addr))
    }

    /// Whether `addr` falls inside a registered MMIO region (used by the MMU to decide
    /// between routing here and indexing into RAM).
    pub fn contains(&self, addr: u64) -> bool {
        self.find(addr).is_some()
    }

    pub fn dispatch_read(&self, addr: u64, width: Width) -> Result<u64, BusError> {
        let entry = self.find(addr).ok_or(BusError::Unmapped(addr))?;
        if !entry.device.supports_width(width) {
            return Err(BusError::UnsupportedWidth(addr, width.bytes() as u8));
        }
        Ok(entry.device.read(addr - entry.range.start, width))
    }

    pub fn dispatch_write(&self, addr: u64, width: Width, value: u64) -> Result<(), BusError> {
        let entry = self.find(addr).ok_or(BusError::Unmapped(addr))?;
        if !entry.device.supports_width(width) {
            return Err(BusError::UnsupportedWidth(addr, width.bytes() as u8));
        }
        entry.device.write(addr - entry.range.start, width, value);
        Ok(())
    }
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| (e.range, e.device.debug_label())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Counter {
        last_write: Cell<Option<(u64, Width, u64)>>,
    }

    impl BusDevice for Counter {
        fn debug_label(&self) -> String {
            "counter".to_string()
        }

        fn read(&self, offset: u64, _width: Width) -> u64 {
            offset
        }

        fn write(&self, offset: u64, width: Width, value: u64) {
            self.last_write.set(Some((offset, width, value)));
        }
    }

    #[test]
    fn register_rejects_overlap() {
        let mut bus = Bus::new();
        bus.register_region(
            0x1000,
            0x100,
            Box::new(Counter { last_write: Cell::new(None) }),
        )
        .unwrap();
        let err = bus
            .register_region(
                0x1080,
                0x100,
                Box::new(Counter { last_write: Cell::new(None) }),
            )
            .unwrap_err();
        assert!(matches!(err, BusError::Overlap(0x1080, 0x1180)));
    }

    #[test]
    fn dispatch_routes_with_region_relative_offset() {
        // A write to an address inside the region invokes the device with the offset
        // relative to the region's start, exactly once.
        let mut bus = Bus::new();
        bus.register_region(
            0xF300_0000,
            0x8_0000,
            Box::new(Counter { last_write: Cell::new(None) }),
        )
        .unwrap();

        bus.dispatch_write(0xF300_0020, Width::Dword, 0xDEAD_BEEF)
            .unwrap();

        // `Counter::read` echoes the offset it was given, so reading back confirms the
        // bus translated the absolute address into a region-relative offset of 0x20.
        assert_eq!(bus.dispatch_read(0xF300_0020, Width::Dword).unwrap(), 0x20);
    }

    #[test]
    fn unmapped_address_is_reported() {
        let bus = Bus::new();
        assert!(matches!(
            bus.dispatch_read(0x1234, Width::Byte),
            Err(BusError::Unmapped(0x1234))
        ));
    }

    #[test]
    fn unsupported_width_is_reported() {
        let mut bus = Bus::new();
        bus.register_region(
            0,
            0x10,
            Box::new(Counter { last_write: Cell::new(None) }),
        )
        .unwrap();
        assert!(matches!(
            bus.dispatch_read(4, Width::Qword),
            Err(BusError::UnsupportedWidth(4, 8))
        ));
    }
}
