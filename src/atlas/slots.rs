// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::error::{AtlasError, Capacity, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SlotEntry {
    slot: u32,
    refs: u32,
}

/// Outcome of dropping one reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// Other references remain.
    Retained { refs: u32 },
    /// Last reference gone; the slot is back on the free list.
    Freed { slot: u32 },
}

/// Reference-counted identity -> slot mapping with a lowest-first free list.
///
/// Slots are stable for the lifetime of an identity and are reused only
/// after its last reference is released.
#[derive(Debug, Clone)]
pub struct SlotManager {
    entries: HashMap<String, SlotEntry>,
    free: BinaryHeap<Reverse<u32>>,
    next_unused: u32,
    capacity: u32,
    max_capacity: u32,
}

impl SlotManager {
    pub fn new(capacity: u32, max_capacity: u32) -> Self {
        Self {
            entries: HashMap::new(),
            free: BinaryHeap::new(),
            next_unused: 0,
            capacity: capacity.min(max_capacity),
            max_capacity,
        }
    }

    pub fn get(&self, identity: &str) -> Option<u32> {
        self.entries.get(identity).map(|e| e.slot)
    }

    pub fn refs(&self, identity: &str) -> u32 {
        self.entries.get(identity).map_or(0, |e| e.refs)
    }

    /// Add a reference to a resident identity. Returns its slot.
    pub fn retain(&mut self, identity: &str) -> Option<u32> {
        let entry = self.entries.get_mut(identity)?;
        entry.refs += 1;
        Some(entry.slot)
    }

    /// True when issuing one more slot requires a larger lookup table first.
    pub fn is_full(&self) -> bool {
        self.free.is_empty() && self.next_unused >= self.capacity
    }

    /// Capacity after the next doubling, clamped to the hardware maximum.
    pub fn grown_capacity(&self) -> Result<u32> {
        if self.capacity >= self.max_capacity {
            return Err(AtlasError::CapacityExceeded(Capacity::Slots {
                requested: self.capacity + 1,
                max: self.max_capacity,
            }));
        }
        Ok((self.capacity.max(1) * 2).min(self.max_capacity))
    }

    pub fn set_capacity(&mut self, capacity: u32) {
        debug_assert!(capacity >= self.next_unused);
        self.capacity = capacity.min(self.max_capacity);
    }

    /// Issue a slot for an identity that is not resident yet, with one reference.
    /// The caller grows the table first when [`is_full`](Self::is_full).
    pub fn insert(&mut self, identity: &str) -> Result<u32> {
        if let Some(slot) = self.retain(identity) {
            return Ok(slot);
        }
        let slot = match self.free.pop() {
            Some(Reverse(slot)) => slot,
            None if self.next_unused < self.capacity => {
                self.next_unused += 1;
                self.next_unused - 1
            }
            None => {
                return Err(AtlasError::CapacityExceeded(Capacity::Slots {
                    requested: self.capacity + 1,
                    max: self.capacity,
                }));
            }
        };
        self.entries
            .insert(identity.to_string(), SlotEntry { slot, refs: 1 });
        Ok(slot)
    }

    /// Drop one reference.
    pub fn release(&mut self, identity: &str) -> Result<Release> {
        let entry = self
            .entries
            .get_mut(identity)
            .ok_or_else(|| AtlasError::NotFound(identity.to_string()))?;
        entry.refs -= 1;
        if entry.refs > 0 {
            return Ok(Release::Retained { refs: entry.refs });
        }
        let slot = entry.slot;
        self.entries.remove(identity);
        self.free.push(Reverse(slot));
        Ok(Release::Freed { slot })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn max_capacity(&self) -> u32 {
        self.max_capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), e.slot))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.free.clear();
        self.next_unused = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issues_dense_slots() {
        let mut slots = SlotManager::new(4, 16);
        assert_eq!(slots.insert("a").unwrap(), 0);
        assert_eq!(slots.insert("b").unwrap(), 1);
        assert_eq!(slots.insert("c").unwrap(), 2);
    }

    #[test]
    fn test_dedup_counts_references() {
        let mut slots = SlotManager::new(4, 16);
        let a = slots.insert("a").unwrap();
        assert_eq!(slots.insert("a").unwrap(), a);
        assert_eq!(slots.refs("a"), 2);
        assert_eq!(slots.release("a").unwrap(), Release::Retained { refs: 1 });
        assert_eq!(slots.release("a").unwrap(), Release::Freed { slot: a });
        assert!(slots.get("a").is_none());
    }

    #[test]
    fn test_reuses_lowest_free_slot() {
        let mut slots = SlotManager::new(8, 16);
        for id in ["a", "b", "c", "d"] {
            slots.insert(id).unwrap();
        }
        slots.release("c").unwrap();
        slots.release("b").unwrap();
        assert_eq!(slots.insert("e").unwrap(), 1);
        assert_eq!(slots.insert("f").unwrap(), 2);
        assert_eq!(slots.insert("g").unwrap(), 4);
    }

    #[test]
    fn test_growth_is_bounded() {
        let mut slots = SlotManager::new(2, 4);
        slots.insert("a").unwrap();
        slots.insert("b").unwrap();
        assert!(slots.is_full());
        assert!(slots.insert("c").is_err());

        let grown = slots.grown_capacity().unwrap();
        assert_eq!(grown, 4);
        slots.set_capacity(grown);
        slots.insert("c").unwrap();
        slots.insert("d").unwrap();
        assert!(matches!(
            slots.grown_capacity(),
            Err(AtlasError::CapacityExceeded(Capacity::Slots { max: 4, .. }))
        ));
    }

    #[test]
    fn test_release_unknown_is_not_found() {
        let mut slots = SlotManager::new(2, 2);
        assert!(matches!(slots.release("x"), Err(AtlasError::NotFound(_))));
    }
}
