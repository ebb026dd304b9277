// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use bytemuck::{Pod, Zeroable};

use crate::constants::{UV_FLOATS_PER_SLOT, UV_TEXELS_PER_SLOT, UV_TEXTURE_WIDTH};
use crate::error::Result;
use crate::gpu::{AtlasBackend, TexelFormat};

/// One lookup row: four (u, v) corners as two RGBA32F texels.
/// Must match the layout the sprite shader samples.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct UvEntry {
    pub coords: [f32; UV_FLOATS_PER_SLOT],
}

/// Slots per texture row and the largest slot count a device can hold.
pub fn uv_layout(max_texture_size: u32) -> (u32, u32) {
    let texels_per_row = UV_TEXTURE_WIDTH.min(max_texture_size);
    let slots_per_row = (texels_per_row / UV_TEXELS_PER_SLOT).max(1);
    (slots_per_row, slots_per_row.saturating_mul(max_texture_size))
}

/// CPU arena of UV rows indexed by slot, mirrored into a lookup texture.
///
/// The arena always covers whole texture rows. Writes mark a dirty slot
/// range; `flush` uploads only the rows it touches.
#[derive(Debug)]
pub struct UvTable<T> {
    label: String,
    entries: Vec<UvEntry>,
    slots_per_row: u32,
    rows: u32,
    texture: T,
    dirty: Option<(u32, u32)>,
}

impl<T> UvTable<T> {
    pub fn new<B>(backend: &mut B, label: &str, capacity: u32) -> Result<Self>
    where
        B: AtlasBackend<Texture = T>,
    {
        let (slots_per_row, _) = uv_layout(backend.max_texture_size());
        let rows = capacity.max(1).div_ceil(slots_per_row);
        let texture = backend.create_texture(
            label,
            slots_per_row * UV_TEXELS_PER_SLOT,
            rows,
            TexelFormat::Rgba32Float,
        )?;
        Ok(Self {
            label: label.to_string(),
            entries: vec![UvEntry::default(); (rows * slots_per_row) as usize],
            slots_per_row,
            rows,
            texture,
            dirty: None,
        })
    }

    pub fn set(&mut self, slot: u32, coords: [f32; UV_FLOATS_PER_SLOT]) {
        self.entries[slot as usize] = UvEntry { coords };
        self.dirty = Some(match self.dirty {
            Some((lo, hi)) => (lo.min(slot), hi.max(slot)),
            None => (slot, slot),
        });
    }

    pub fn get(&self, slot: u32) -> Option<&UvEntry> {
        self.entries.get(slot as usize)
    }

    /// Slots the current texture can address.
    pub fn slot_capacity(&self) -> u32 {
        self.rows * self.slots_per_row
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.is_some()
    }

    pub fn texture(&self) -> &T {
        &self.texture
    }

    /// Make room for `capacity` slots. A new texture is filled completely
    /// before it replaces the old one, so readers never see a partial table.
    pub fn grow<B>(&mut self, backend: &mut B, capacity: u32) -> Result<()>
    where
        B: AtlasBackend<Texture = T>,
    {
        let rows = capacity.div_ceil(self.slots_per_row);
        if rows <= self.rows {
            return Ok(());
        }

        let width = self.slots_per_row * UV_TEXELS_PER_SLOT;
        let texture = backend.create_texture(&self.label, width, rows, TexelFormat::Rgba32Float)?;
        let mut entries = self.entries.clone();
        entries.resize((rows * self.slots_per_row) as usize, UvEntry::default());
        if let Err(e) = backend.write_subimage(
            &texture,
            0,
            0,
            width,
            rows,
            bytemuck::cast_slice(&entries),
        ) {
            backend.destroy_texture(texture);
            return Err(e);
        }

        log::debug!(
            "Grew UV table '{}' from {} to {} slots",
            self.label,
            self.slot_capacity(),
            rows * self.slots_per_row
        );
        let old = std::mem::replace(&mut self.texture, texture);
        backend.destroy_texture(old);
        self.entries = entries;
        self.rows = rows;
        self.dirty = None;
        Ok(())
    }

    /// Upload the rows touched since the last flush.
    pub fn flush<B>(&mut self, backend: &mut B) -> Result<()>
    where
        B: AtlasBackend<Texture = T>,
    {
        let Some((lo, hi)) = self.dirty else {
            return Ok(());
        };
        let first_row = lo / self.slots_per_row;
        let last_row = hi / self.slots_per_row;
        let start = (first_row * self.slots_per_row) as usize;
        let end = ((last_row + 1) * self.slots_per_row) as usize;
        backend.write_subimage(
            &self.texture,
            0,
            first_row,
            self.slots_per_row * UV_TEXELS_PER_SLOT,
            last_row - first_row + 1,
            bytemuck::cast_slice(&self.entries[start..end]),
        )?;
        self.dirty = None;
        Ok(())
    }

    pub fn destroy<B>(self, backend: &mut B)
    where
        B: AtlasBackend<Texture = T>,
    {
        backend.destroy_texture(self.texture);
    }
}
