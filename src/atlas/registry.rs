// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use super::region::AtlasRegion;
use super::slots::{Release, SlotManager};
use super::table::RegionTable;
use super::uv::{UvTable, uv_layout};
use crate::error::Result;
use crate::gpu::AtlasBackend;

/// One slot space: regions, reference-counted slots and the UV lookup
/// texture that mirrors them. Images and textures each get one.
#[derive(Debug)]
pub struct Registry<T> {
    regions: RegionTable,
    slots: SlotManager,
    uvs: UvTable<T>,
}

impl<T> Registry<T> {
    pub fn new<B>(backend: &mut B, label: &str, capacity: u32) -> Result<Self>
    where
        B: AtlasBackend<Texture = T>,
    {
        let (_, max_slots) = uv_layout(backend.max_texture_size());
        let capacity = capacity.clamp(1, max_slots);
        Ok(Self {
            regions: RegionTable::default(),
            slots: SlotManager::new(capacity, max_slots),
            uvs: UvTable::new(backend, label, capacity)?,
        })
    }

    pub fn regions(&self) -> &RegionTable {
        &self.regions
    }

    pub fn slots(&self) -> &SlotManager {
        &self.slots
    }

    pub fn uv_texture(&self) -> &T {
        self.uvs.texture()
    }

    pub fn region(&self, identity: &str) -> Result<AtlasRegion> {
        self.regions.get(identity).copied()
    }

    /// Add a reference to a resident identity.
    pub fn retain(&mut self, identity: &str) -> Option<(u32, AtlasRegion)> {
        let region = *self.regions.get(identity).ok()?;
        let slot = self.slots.retain(identity)?;
        Some((slot, region))
    }

    /// Fail with `CapacityExceeded(Slots)` if [`reserve`](Self::reserve)
    /// would, without touching anything.
    pub fn check_reserve(&self) -> Result<()> {
        if self.slots.is_full() {
            self.slots.grown_capacity()?;
        }
        Ok(())
    }

    /// Make sure one more slot can be issued, growing the lookup texture
    /// when the free list is empty.
    pub fn reserve<B>(&mut self, backend: &mut B) -> Result<()>
    where
        B: AtlasBackend<Texture = T>,
    {
        if !self.slots.is_full() {
            return Ok(());
        }
        let capacity = self.slots.grown_capacity()?;
        self.uvs.grow(backend, capacity)?;
        self.slots.set_capacity(capacity);
        log::debug!("Slot capacity raised to {capacity}");
        Ok(())
    }

    /// Register a new identity with one reference. Call [`reserve`](Self::reserve) first.
    pub fn insert(&mut self, identity: &str, region: AtlasRegion) -> Result<u32> {
        let slot = self.slots.insert(identity)?;
        self.regions.put(identity, region);
        self.uvs.set(slot, region.uv_row());
        Ok(slot)
    }

    /// Drop one reference. On the last one the slot and region are forgotten.
    pub fn release(&mut self, identity: &str) -> Result<Release> {
        let release = self.slots.release(identity)?;
        if let Release::Freed { .. } = release {
            self.regions.remove(identity);
        }
        Ok(release)
    }

    /// Move an identity to a new rectangle; its slot keeps its number.
    pub fn relocate(&mut self, identity: &str, region: AtlasRegion) {
        self.regions.put(identity, region);
        if let Some(slot) = self.slots.get(identity) {
            self.uvs.set(slot, region.uv_row());
        }
    }

    pub fn flush<B>(&mut self, backend: &mut B) -> Result<()>
    where
        B: AtlasBackend<Texture = T>,
    {
        self.uvs.flush(backend)
    }

    pub fn clear(&mut self) {
        self.regions.clear();
        self.slots.clear();
    }

    pub fn destroy<B>(self, backend: &mut B)
    where
        B: AtlasBackend<Texture = T>,
    {
        self.uvs.destroy(backend);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::CpuBackend;

    #[test]
    fn test_release_forgets_region_with_last_reference() {
        let mut backend = CpuBackend::new(64);
        let mut registry = Registry::new(&mut backend, "uv", 4).unwrap();
        let region = AtlasRegion::new((64, 64), 0, 0, 8, 8);
        let slot = registry.insert("a", region).unwrap();
        assert_eq!(registry.retain("a"), Some((slot, region)));

        assert_eq!(registry.release("a").unwrap(), Release::Retained { refs: 1 });
        assert!(registry.regions().contains("a"));
        assert_eq!(registry.release("a").unwrap(), Release::Freed { slot });
        assert!(!registry.regions().contains("a"));
    }

    #[test]
    fn test_reserve_grows_full_table() {
        let mut backend = CpuBackend::new(64);
        let mut registry = Registry::new(&mut backend, "uv", 1).unwrap();
        let region = AtlasRegion::new((64, 64), 0, 0, 1, 1);
        registry.insert("a", region).unwrap();
        assert!(registry.slots().is_full());

        registry.reserve(&mut backend).unwrap();
        assert_eq!(registry.slots().capacity(), 2);
        assert_eq!(registry.insert("b", region).unwrap(), 1);
    }

    #[test]
    fn test_relocate_keeps_slot() {
        let mut backend = CpuBackend::new(64);
        let mut registry = Registry::new(&mut backend, "uv", 4).unwrap();
        let slot = registry
            .insert("a", AtlasRegion::new((64, 64), 0, 0, 4, 4))
            .unwrap();
        let moved = AtlasRegion::new((64, 64), 10, 10, 4, 4);
        registry.relocate("a", moved);
        assert_eq!(registry.region("a").unwrap(), moved);
        assert_eq!(registry.slots().get("a"), Some(slot));
    }
}
