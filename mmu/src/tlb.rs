// Copyright 2024 The ppc-mac Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! A small direct-mapped translation cache keyed by `(virtual page, intent)`. Memoising
//! the BAT/PTE outcome here means two consecutive identical loads with no intervening
//! invalidation hit this cache on the second access instead of re-walking the page table.

use crate::Intent;
use crate::Protection;

const SLOTS: usize = 256;

#[derive(Clone, Copy)]
struct Slot {
    tag: u32,
    intent: Option<Intent>,
    phys_page: u32,
    protection: Protection,
}

impl Default for Slot {
    fn default() -> Self {
        Slot {
            tag: 0,
            intent: None,
            phys_page: 0,
            protection: Protection {
                writable: false,
                executable: false,
                cache_inhibited: false,
            },
        }
    }
}

pub struct TranslationCache {
    slots: Box<[Slot; SLOTS]>,
}

impl TranslationCache {
    pub fn new() -> TranslationCache {
        TranslationCache {
            slots: Box::new([Slot::default(); SLOTS]),
        }
    }

    fn index(vpage: u32) -> usize {
        (vpage as usize) % SLOTS
    }

    pub fn lookup(&self, vpage: u32, intent: Intent) -> Option<(u32, Protection)> {
        let slot = &self.slots[Self::index(vpage)];
        if slot.tag == vpage && slot.intent == Some(intent) {
            Some((slot.phys_page, slot.protection))
        } else {
            None
        }
    }

    pub fn insert(&mut self, vpage: u32, intent: Intent, phys_page: u32, protection: Protection) {
        self.slots[Self::index(vpage)] = Slot {
            tag: vpage,
            intent: Some(intent),
            phys_page,
            protection,
        };
    }

    pub fn clear(&mut self) {
        *self.slots = [Slot::default(); SLOTS];
    }

    pub fn invalidate_page(&mut self, vpage: u32) {
        let slot = &mut self.slots[Self::index(vpage)];
        if slot.tag == vpage {
            *slot = Slot::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_after_insert_returns_same_translation() {
        let mut cache = TranslationCache::new();
        let prot = Protection {
            writable: true,
            executable: false,
            cache_inhibited: false,
        };
        cache.insert(5, Intent::Load, 9, prot);
        assert_eq!(cache.lookup(5, Intent::Load), Some((9, prot)));
        assert_eq!(cache.lookup(5, Intent::Store), None);
    }

    #[test]
    fn clear_evicts_everything() {
        let mut cache = TranslationCache::new();
        let prot = Protection {
            writable: true,
            executable: true,
            cache_inhibited: false,
        };
        cache.insert(1, Intent::Fetch, 1, prot);
        cache.clear();
        assert_eq!(cache.lookup(1, Intent::Fetch), None);
    }
}
