// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use image::{Rgba, RgbaImage};

use super::allocator::ShelfAllocator;
use super::config::AtlasConfig;
use super::handle::{AtlasKey, ReleaseQueue, TextureHandle};
use super::rebuild::{self, PackEntry, Rebuild, RebuildStage, RepackPlan};
use super::region::AtlasRegion;
use super::registry::Registry;
use super::slots::Release;
use super::surface::AtlasSurface;
use crate::constants::BYTES_PER_PIXEL;
use crate::error::{AtlasError, Capacity, Result};
use crate::gpu::AtlasBackend;
use crate::texture::{ImageData, Texture, VertexOrder};

#[derive(Debug)]
struct ImageEntry {
    /// CPU copy of the pixels, dropped when the atlas does not keep pixels.
    image: Option<Arc<ImageData>>,
    width: u32,
    height: u32,
}

/// What the atlas remembers about a texture besides its region.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureEntry {
    pub image_hash: String,
    pub vertex_order: VertexOrder,
    pub file_path: Option<PathBuf>,
    pub crop: Option<[u32; 4]>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtlasStats {
    pub width: u32,
    pub height: u32,
    pub images: usize,
    pub textures: usize,
    /// Area handed out by the allocator since the last rebuild, borders included.
    pub allocated_area: u64,
    /// Part of `allocated_area` still owned by a live image.
    pub live_area: u64,
    pub utilization: f32,
}

/// How to make room for one more image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Growth {
    Fits,
    Compact,
    Resize(u32, u32),
    Repack(u32, u32),
}

/// Packs images into one backend texture and hands out stable slots for
/// their UV rows.
///
/// Images are deduplicated by content hash. Textures are views of an image
/// with a corner order and share the image's pixels. Every mutating call
/// either succeeds or leaves the atlas as it was.
#[derive(Debug)]
pub struct TextureAtlas<B: AtlasBackend> {
    backend: B,
    name: String,
    border: u32,
    auto_resize: bool,
    keep_pixels: bool,
    max_size: (u32, u32),
    allocator: ShelfAllocator,
    surface: AtlasSurface<B::Texture>,
    images: HashMap<String, ImageEntry>,
    image_registry: Registry<B::Texture>,
    textures: HashMap<String, TextureEntry>,
    texture_registry: Registry<B::Texture>,
    releases: ReleaseQueue,
}

impl<B: AtlasBackend> TextureAtlas<B> {
    pub fn new(mut backend: B, config: AtlasConfig) -> Result<Self> {
        let limit = backend.max_texture_size();
        let max_size = match config.max_size {
            Some([w, h]) => (w.min(limit), h.min(limit)),
            None => (limit, limit),
        };
        let [width, height] = config.size;
        check_size(width, height, max_size)?;

        let surface = AtlasSurface::new(
            &mut backend,
            &format!("{}.surface", config.name),
            width,
            height,
        )?;
        let image_registry = Registry::new(
            &mut backend,
            &format!("{}.image_uvs", config.name),
            config.image_slots,
        )?;
        let texture_registry = Registry::new(
            &mut backend,
            &format!("{}.texture_uvs", config.name),
            config.texture_slots,
        )?;

        log::info!(
            "Created atlas '{}' {}x{} (border {}, max {}x{})",
            config.name,
            width,
            height,
            config.border,
            max_size.0,
            max_size.1
        );

        Ok(Self {
            backend,
            name: config.name,
            border: config.border,
            auto_resize: config.auto_resize,
            keep_pixels: config.keep_pixels,
            max_size,
            allocator: ShelfAllocator::new(width, height),
            surface,
            images: HashMap::new(),
            image_registry,
            textures: HashMap::new(),
            texture_registry,
            releases: ReleaseQueue::default(),
        })
    }

    // ---- Images ----

    /// Add one reference to `image`, packing it on first sight.
    /// Returns its image slot and region.
    pub fn add(&mut self, image: impl Into<Arc<ImageData>>) -> Result<(u32, AtlasRegion)> {
        let image = image.into();
        if let Some(hit) = self.image_registry.retain(image.hash()) {
            return Ok(hit);
        }

        self.image_registry.check_reserve()?;
        let (width, height) = image.size();
        self.make_room(width, height)?;
        self.image_registry.reserve(&mut self.backend)?;

        let before = self.allocator.clone();
        let (px, py) = self
            .allocator
            .allocate(width + 2 * self.border, height + 2 * self.border)?;
        let (x, y) = (px + self.border, py + self.border);
        let region = AtlasRegion::new(self.size(), x, y, width, height);

        let written = self
            .surface
            .write_image(&mut self.backend, x, y, &image, self.border)
            .and_then(|()| self.image_registry.insert(image.hash(), region));
        let slot = match written {
            Ok(slot) => slot,
            Err(e) => {
                self.allocator = before;
                return Err(e);
            }
        };

        self.images.insert(
            image.hash().to_string(),
            ImageEntry {
                image: self.keep_pixels.then(|| image.clone()),
                width,
                height,
            },
        );
        self.image_registry.flush(&mut self.backend)?;
        log::debug!(
            "Packed image {} ({}x{}) at ({}, {}) in slot {}",
            image.hash(),
            width,
            height,
            x,
            y,
            slot
        );
        Ok((slot, region))
    }

    /// Add raw RGBA8 pixels under a hash computed by the caller.
    pub fn add_pixels(
        &mut self,
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        hash: &str,
    ) -> Result<(u32, AtlasRegion)> {
        if let Some(hit) = self.image_registry.retain(hash) {
            return Ok(hit);
        }
        self.add(ImageData::with_hash(pixels, width, height, hash)?)
    }

    /// Like [`add`](Self::add), but the reference is owned by a handle.
    pub fn acquire_image(&mut self, image: impl Into<Arc<ImageData>>) -> Result<TextureHandle> {
        let image = image.into();
        let (slot, _) = self.add(image.clone())?;
        Ok(TextureHandle::new(
            AtlasKey::Image(image.hash().to_string()),
            slot,
            self.releases.clone(),
        ))
    }

    /// Drop one reference to an image. The slot is freed with the last
    /// reference; the packed pixels stay until the next rebuild.
    pub fn remove(&mut self, hash: &str) -> Result<()> {
        if let Release::Freed { slot } = self.image_registry.release(hash)? {
            self.images.remove(hash);
            log::debug!("Released image {hash} from slot {slot}");
        }
        Ok(())
    }

    pub fn get_region(&self, hash: &str) -> Result<AtlasRegion> {
        self.image_registry.region(hash)
    }

    pub fn get_slot(&self, hash: &str) -> Result<u32> {
        self.image_registry
            .slots()
            .get(hash)
            .ok_or_else(|| AtlasError::NotFound(hash.to_string()))
    }

    pub fn has_image(&self, hash: &str) -> bool {
        self.images.contains_key(hash)
    }

    /// Overwrite the pixels of a resident image in place.
    pub fn update_image(&mut self, image: impl Into<Arc<ImageData>>) -> Result<()> {
        let image = image.into();
        let region = self.image_registry.region(image.hash())?;
        if image.size() != (region.width, region.height) {
            return Err(AtlasError::ShapeMismatch {
                expected: region.width as usize * region.height as usize * BYTES_PER_PIXEL,
                actual: image.pixels().len(),
            });
        }
        self.surface
            .write_image(&mut self.backend, region.x, region.y, &image, self.border)?;
        if let Some(entry) = self.images.get_mut(image.hash()) {
            if entry.image.is_some() {
                entry.image = Some(image);
            }
        }
        Ok(())
    }

    /// Read an image back from the surface, picking up edits made there.
    pub fn read_image(&mut self, hash: &str) -> Result<ImageData> {
        let region = self.image_registry.region(hash)?;
        let pixels = self.surface.read_region(
            &mut self.backend,
            region.x,
            region.y,
            region.width,
            region.height,
        )?;
        ImageData::with_hash(pixels, region.width, region.height, hash)
    }

    // ---- Textures ----

    /// Add one reference to `texture`. Its first addition also adds one
    /// reference to the underlying image.
    pub fn add_texture(&mut self, texture: &Texture) -> Result<(u32, AtlasRegion)> {
        let name = texture.atlas_name();
        if let Some(hit) = self.texture_registry.retain(&name) {
            return Ok(hit);
        }

        self.texture_registry.check_reserve()?;
        let image_hash = texture.image().hash().to_string();
        let (_, image_region) = self.add(texture.image().clone())?;
        let region = image_region.with_vertex_order(texture.vertex_order());
        let inserted = self
            .texture_registry
            .reserve(&mut self.backend)
            .and_then(|()| self.texture_registry.insert(&name, region));
        let slot = match inserted {
            Ok(slot) => slot,
            Err(e) => {
                self.remove(&image_hash)?;
                return Err(e);
            }
        };

        self.textures.insert(
            name,
            TextureEntry {
                image_hash,
                vertex_order: texture.vertex_order(),
                file_path: texture.file_path().map(PathBuf::from),
                crop: texture.crop_values(),
            },
        );
        self.texture_registry.flush(&mut self.backend)?;
        Ok((slot, region))
    }

    pub fn acquire_texture(&mut self, texture: &Texture) -> Result<TextureHandle> {
        let (slot, _) = self.add_texture(texture)?;
        Ok(TextureHandle::new(
            AtlasKey::Texture(texture.atlas_name()),
            slot,
            self.releases.clone(),
        ))
    }

    pub fn remove_texture(&mut self, name: &str) -> Result<()> {
        if let Release::Freed { slot } = self.texture_registry.release(name)? {
            log::debug!("Released texture {name} from slot {slot}");
            if let Some(entry) = self.textures.remove(name) {
                self.remove(&entry.image_hash)?;
            }
        }
        Ok(())
    }

    pub fn texture_region(&self, name: &str) -> Result<AtlasRegion> {
        self.texture_registry.region(name)
    }

    pub fn texture_slot(&self, name: &str) -> Result<u32> {
        self.texture_registry
            .slots()
            .get(name)
            .ok_or_else(|| AtlasError::NotFound(name.to_string()))
    }

    pub fn has_texture(&self, name: &str) -> bool {
        self.textures.contains_key(name)
    }

    /// Release every entry whose last handle was dropped. Returns how many
    /// releases were processed.
    pub fn collect_garbage(&mut self) -> usize {
        let released = self.releases.drain();
        for key in &released {
            let result = match key {
                AtlasKey::Image(hash) => self.remove(hash),
                AtlasKey::Texture(name) => self.remove_texture(name),
            };
            if let Err(e) = result {
                log::warn!("Skipping release of {key:?}: {e}");
            }
        }
        if !released.is_empty() {
            log::debug!(
                "Atlas '{}' collected {} released handles",
                self.name,
                released.len()
            );
        }
        released.len()
    }

    pub fn pending_releases(&self) -> usize {
        self.releases.len()
    }

    // ---- Layout ----

    /// Repack every live image at the current size, reclaiming the space of
    /// removed ones.
    pub fn rebuild(&mut self) -> Result<()> {
        let (width, height) = self.size();
        self.repack_to(width, height)
    }

    /// Change the surface size. Growth keeps every image in place; any other
    /// change repacks.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        check_size(width, height, self.max_size)?;
        let (current_w, current_h) = self.size();
        if (width, height) == (current_w, current_h) {
            return Ok(());
        }
        if width < current_w || height < current_h {
            return self.repack_to(width, height);
        }

        let label = self.label("surface");
        let grown = self
            .surface
            .resized(&mut self.backend, &label, width, height)?;
        let old = std::mem::replace(&mut self.surface, grown);
        old.destroy(&mut self.backend);
        self.allocator.grow(width, height);
        self.refresh_regions();
        self.flush()?;
        log::info!("Resized atlas '{}' to {}x{}", self.name, width, height);
        Ok(())
    }

    fn make_room(&mut self, width: u32, height: u32) -> Result<()> {
        match self.plan_growth(width, height)? {
            Growth::Fits => Ok(()),
            Growth::Compact => {
                log::info!(
                    "Compacting atlas '{}' to reclaim {} pixels",
                    self.name,
                    self.dead_area()
                );
                self.rebuild()
            }
            Growth::Resize(w, h) => self.resize(w, h),
            Growth::Repack(w, h) => self.repack_to(w, h),
        }
    }

    /// Decide on a copy of the allocator how to fit one more image, so a
    /// request that cannot be satisfied changes nothing.
    fn plan_growth(&self, width: u32, height: u32) -> Result<Growth> {
        let padded = (width + 2 * self.border, height + 2 * self.border);
        if self.allocator.clone().allocate(padded.0, padded.1).is_ok() {
            return Ok(Growth::Fits);
        }

        let (current_w, current_h) = self.size();
        if !self.auto_resize {
            return Err(AtlasError::OutOfSpace {
                width: padded.0,
                height: padded.1,
                atlas_width: current_w,
                atlas_height: current_h,
            });
        }
        check_size(padded.0, padded.1, self.max_size)?;

        if self.dead_area() > 0 {
            if let Ok(mut plan) = rebuild::repack(&self.live_entries(), current_w, current_h, self.border)
            {
                if plan.allocator.allocate(padded.0, padded.1).is_ok() {
                    return Ok(Growth::Compact);
                }
            }
        }

        let live = self.live_entries();
        let mut size = (current_w, current_h);
        loop {
            size = self.next_size(size)?;
            let mut probe = self.allocator.clone();
            if probe.grow(size.0, size.1) && probe.allocate(padded.0, padded.1).is_ok() {
                return Ok(Growth::Resize(size.0, size.1));
            }
            // Growing in place keeps stale shelves; a fresh pack may still fit.
            if let Ok(mut plan) = rebuild::repack(&live, size.0, size.1, self.border) {
                if plan.allocator.allocate(padded.0, padded.1).is_ok() {
                    return Ok(Growth::Repack(size.0, size.1));
                }
            }
        }
    }

    /// Double the smaller dimension (width on ties) within the maximum.
    fn next_size(&self, (width, height): (u32, u32)) -> Result<(u32, u32)> {
        let (max_w, max_h) = self.max_size;
        let width_open = width < max_w;
        let height_open = height < max_h;
        let grow_width = match (width_open, height_open) {
            (false, false) => {
                return Err(AtlasError::CapacityExceeded(Capacity::Size {
                    width,
                    height,
                    max_width: max_w,
                    max_height: max_h,
                }));
            }
            (true, false) => true,
            (false, true) => false,
            (true, true) => width <= height,
        };
        Ok(if grow_width {
            (width.saturating_mul(2).min(max_w), height)
        } else {
            (width, height.saturating_mul(2).min(max_h))
        })
    }

    fn repack_to(&mut self, width: u32, height: u32) -> Result<()> {
        let mut stage = Rebuild::start(&self.name);
        stage.advance(RebuildStage::Collecting);
        let entries = self.live_entries();

        stage.advance(RebuildStage::Repacking);
        let plan = rebuild::repack(&entries, width, height, self.border)?;

        stage.advance(RebuildStage::Writing);
        let label = self.label("surface");
        let surface = AtlasSurface::new(&mut self.backend, &label, width, height)?;
        if let Err(e) = self.write_plan(&surface, &plan) {
            surface.destroy(&mut self.backend);
            return Err(e);
        }

        stage.advance(RebuildStage::Swapping);
        let old = std::mem::replace(&mut self.surface, surface);
        old.destroy(&mut self.backend);
        self.allocator = plan.allocator;
        for placement in &plan.placements {
            let region = AtlasRegion::new(
                (width, height),
                placement.x,
                placement.y,
                placement.width,
                placement.height,
            );
            self.image_registry.relocate(&placement.hash, region);
        }
        self.refresh_texture_regions();
        self.flush()?;
        stage.advance(RebuildStage::Idle);

        log::info!(
            "Rebuilt atlas '{}' at {}x{} with {} images",
            self.name,
            width,
            height,
            plan.placements.len()
        );
        Ok(())
    }

    fn write_plan(&mut self, surface: &AtlasSurface<B::Texture>, plan: &RepackPlan) -> Result<()> {
        for placement in &plan.placements {
            let kept = self
                .images
                .get(&placement.hash)
                .and_then(|entry| entry.image.clone());
            let image = match kept {
                Some(image) => image,
                None => {
                    let old = self.image_registry.region(&placement.hash)?;
                    let pixels = self.surface.read_region(
                        &mut self.backend,
                        old.x,
                        old.y,
                        old.width,
                        old.height,
                    )?;
                    Arc::new(ImageData::with_hash(
                        pixels,
                        old.width,
                        old.height,
                        placement.hash.clone(),
                    )?)
                }
            };
            surface.write_image(&mut self.backend, placement.x, placement.y, &image, self.border)?;
        }
        Ok(())
    }

    fn live_entries(&self) -> Vec<PackEntry> {
        rebuild::collect(
            self.images
                .iter()
                .map(|(hash, entry)| (hash.as_str(), entry.width, entry.height)),
        )
    }

    /// Recompute UVs after the surface size changed under fixed placements.
    fn refresh_regions(&mut self) {
        let size = self.size();
        let moved: Vec<(String, AtlasRegion)> = self
            .image_registry
            .regions()
            .iter()
            .map(|(hash, region)| (hash.to_string(), region.rescaled(size, VertexOrder::IDENTITY)))
            .collect();
        for (hash, region) in moved {
            self.image_registry.relocate(&hash, region);
        }
        self.refresh_texture_regions();
    }

    fn refresh_texture_regions(&mut self) {
        for (name, entry) in &self.textures {
            if let Ok(image_region) = self.image_registry.region(&entry.image_hash) {
                self.texture_registry
                    .relocate(name, image_region.with_vertex_order(entry.vertex_order));
            }
        }
    }

    fn live_area(&self) -> u64 {
        self.images
            .values()
            .map(|e| (e.width + 2 * self.border) as u64 * (e.height + 2 * self.border) as u64)
            .sum()
    }

    fn dead_area(&self) -> u64 {
        self.allocator.used_area().saturating_sub(self.live_area())
    }

    // ---- Surface access ----

    pub fn read_region(&mut self, x: u32, y: u32, width: u32, height: u32) -> Result<Vec<u8>> {
        self.surface.read_region(&mut self.backend, x, y, width, height)
    }

    pub fn write_region(
        &mut self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<()> {
        self.surface
            .write_region(&mut self.backend, x, y, width, height, pixels)
    }

    /// The whole surface as tightly packed RGBA8.
    pub fn to_pixels(&mut self) -> Result<Vec<u8>> {
        self.surface.read_all(&mut self.backend)
    }

    /// The whole surface as an image, optionally outlining every image region.
    pub fn to_image(&mut self, outline: Option<[u8; 4]>) -> Result<RgbaImage> {
        let (width, height) = self.size();
        let pixels = self.to_pixels()?;
        let actual = pixels.len();
        let mut image = RgbaImage::from_raw(width, height, pixels).ok_or(AtlasError::ShapeMismatch {
            expected: width as usize * height as usize * BYTES_PER_PIXEL,
            actual,
        })?;
        if let Some(color) = outline {
            for (_, region) in self.image_registry.regions().iter() {
                draw_outline(&mut image, region, Rgba(color));
            }
        }
        Ok(image)
    }

    /// Upload pending UV rows. Mutating calls do this on their own.
    pub fn flush(&mut self) -> Result<()> {
        self.image_registry.flush(&mut self.backend)?;
        self.texture_registry.flush(&mut self.backend)
    }

    /// Forget every entry and start over with an empty surface of the same size.
    pub fn clear(&mut self) -> Result<()> {
        let (width, height) = self.size();
        let label = self.label("surface");
        let surface = AtlasSurface::new(&mut self.backend, &label, width, height)?;
        let old = std::mem::replace(&mut self.surface, surface);
        old.destroy(&mut self.backend);

        self.allocator.reset(width, height);
        self.images.clear();
        self.textures.clear();
        self.image_registry.clear();
        self.texture_registry.clear();
        self.releases.drain();
        log::info!("Cleared atlas '{}'", self.name);
        Ok(())
    }

    pub fn stats(&self) -> AtlasStats {
        let (width, height) = self.size();
        AtlasStats {
            width,
            height,
            images: self.images.len(),
            textures: self.textures.len(),
            allocated_area: self.allocator.used_area(),
            live_area: self.live_area(),
            utilization: self.allocator.utilization(),
        }
    }

    // ---- Accessors ----

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> (u32, u32) {
        self.surface.size()
    }

    pub fn border(&self) -> u32 {
        self.border
    }

    pub fn max_size(&self) -> (u32, u32) {
        self.max_size
    }

    pub fn images(&self) -> impl Iterator<Item = (&str, &AtlasRegion)> {
        self.image_registry.regions().iter()
    }

    pub fn textures(&self) -> impl Iterator<Item = (&str, &TextureEntry)> {
        self.textures.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn surface_texture(&self) -> &B::Texture {
        self.surface.texture()
    }

    pub fn image_uv_texture(&self) -> &B::Texture {
        self.image_registry.uv_texture()
    }

    pub fn texture_uv_texture(&self) -> &B::Texture {
        self.texture_registry.uv_texture()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Release every backend texture and hand the backend back.
    pub fn into_backend(self) -> B {
        let Self {
            mut backend,
            surface,
            image_registry,
            texture_registry,
            ..
        } = self;
        surface.destroy(&mut backend);
        image_registry.destroy(&mut backend);
        texture_registry.destroy(&mut backend);
        backend
    }

    fn label(&self, part: &str) -> String {
        format!("{}.{part}", self.name)
    }
}

fn check_size(width: u32, height: u32, (max_width, max_height): (u32, u32)) -> Result<()> {
    if width > max_width || height > max_height {
        return Err(AtlasError::CapacityExceeded(Capacity::Size {
            width,
            height,
            max_width,
            max_height,
        }));
    }
    Ok(())
}

fn draw_outline(image: &mut RgbaImage, region: &AtlasRegion, color: Rgba<u8>) {
    if region.width == 0 || region.height == 0 {
        return;
    }
    let right = region.x + region.width - 1;
    let bottom = region.y + region.height - 1;
    for x in region.x..=right {
        image.put_pixel(x, region.y, color);
        image.put_pixel(x, bottom, color);
    }
    for y in region.y..=bottom {
        image.put_pixel(region.x, y, color);
        image.put_pixel(right, y, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::uv::uv_layout;
    use crate::gpu::CpuBackend;
    use crate::texture::Transform;

    fn atlas(width: u32, height: u32, border: u32, auto_resize: bool) -> TextureAtlas<CpuBackend> {
        let config = AtlasConfig {
            size: [width, height],
            border,
            auto_resize,
            ..Default::default()
        };
        TextureAtlas::new(CpuBackend::new(256), config).unwrap()
    }

    fn solid(width: u32, height: u32, shade: u8) -> Arc<ImageData> {
        Arc::new(ImageData::solid(width, height, [shade, 0, 0, 255]).unwrap())
    }

    fn pattern(width: u32, height: u32, seed: u8) -> Arc<ImageData> {
        let mut pixels = Vec::new();
        for y in 0..height {
            for x in 0..width {
                pixels.extend_from_slice(&[x as u8, y as u8, seed, 255]);
            }
        }
        Arc::new(ImageData::new(pixels, width, height).unwrap())
    }

    fn uv_row(atlas: &mut TextureAtlas<CpuBackend>, slot: u32) -> [f32; 8] {
        let (slots_per_row, _) = uv_layout(256);
        let texture = *atlas.image_uv_texture();
        let bytes = atlas
            .backend
            .read_subimage(&texture, (slot % slots_per_row) * 2, slot / slots_per_row, 2, 1)
            .unwrap();
        let floats = bytemuck::pod_collect_to_vec::<u8, f32>(&bytes);
        floats.try_into().unwrap()
    }

    fn regions(atlas: &TextureAtlas<CpuBackend>) -> HashMap<String, AtlasRegion> {
        atlas.images().map(|(h, r)| (h.to_string(), *r)).collect()
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut atlas = atlas(64, 64, 1, false);
        let image = solid(8, 8, 10);
        let first = atlas.add(image.clone()).unwrap();
        let allocated = atlas.stats().allocated_area;

        for _ in 0..3 {
            assert_eq!(atlas.add(image.clone()).unwrap(), first);
        }
        // A separate buffer with the same bytes is the same image.
        assert_eq!(atlas.add(solid(8, 8, 10)).unwrap(), first);
        assert_eq!(atlas.stats().allocated_area, allocated);
        assert_eq!(atlas.stats().images, 1);

        for _ in 0..4 {
            atlas.remove(image.hash()).unwrap();
        }
        assert!(atlas.has_image(image.hash()));
        atlas.remove(image.hash()).unwrap();
        assert!(!atlas.has_image(image.hash()));
    }

    #[test]
    fn test_regions_never_overlap() {
        let mut atlas = atlas(64, 64, 2, true);
        for i in 0..20u32 {
            let image = solid(5 + (i * 7) % 23, 4 + (i * 11) % 19, i as u8);
            atlas.add(image).unwrap();
        }

        let (width, height) = atlas.size();
        let all: Vec<AtlasRegion> = atlas.images().map(|(_, r)| *r).collect();
        assert_eq!(all.len(), 20);
        for (i, a) in all.iter().enumerate() {
            assert!(a.x >= 2 && a.y >= 2);
            assert!(a.x + a.width + 2 <= width && a.y + a.height + 2 <= height);
            for b in &all[i + 1..] {
                assert!(!a.intersects(b, 2), "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn test_uvs_round_trip_after_resize() {
        let mut atlas = atlas(64, 64, 0, false);
        let image = solid(10, 6, 1);
        let (_, before) = atlas.add(image.clone()).unwrap();
        atlas.resize(128, 256).unwrap();

        let region = atlas.get_region(image.hash()).unwrap();
        assert_eq!((region.x, region.y), (before.x, before.y));
        let (x, y, w, h) = region.pixel_rect_from_uvs((128, 256));
        assert!((x - region.x as f32).abs() < 1e-3);
        assert!((y - region.y as f32).abs() < 1e-3);
        assert!((w - 10.0).abs() < 1e-3);
        assert!((h - 6.0).abs() < 1e-3);
    }

    #[test]
    fn test_rebuild_preserves_slots() {
        let mut atlas = atlas(64, 64, 1, false);
        let a = pattern(8, 8, 1);
        let b = pattern(8, 8, 2);
        let c = pattern(8, 8, 3);
        assert_eq!(atlas.add(a.clone()).unwrap().0, 0);
        assert_eq!(atlas.add(b.clone()).unwrap().0, 1);
        assert_eq!(atlas.add(c.clone()).unwrap().0, 2);

        atlas.remove(b.hash()).unwrap();
        atlas.rebuild().unwrap();

        assert_eq!(atlas.get_slot(a.hash()).unwrap(), 0);
        assert_eq!(atlas.get_slot(c.hash()).unwrap(), 2);
        assert!(matches!(atlas.get_slot(b.hash()), Err(AtlasError::NotFound(_))));
        assert_eq!(atlas.read_image(a.hash()).unwrap().pixels(), a.pixels());
        assert_eq!(atlas.read_image(c.hash()).unwrap().pixels(), c.pixels());

        let d = pattern(8, 8, 4);
        assert_eq!(atlas.add(d).unwrap().0, 1);
    }

    #[test]
    fn test_resize_beyond_maximum_changes_nothing() {
        let mut atlas = TextureAtlas::new(
            CpuBackend::new(128),
            AtlasConfig {
                size: [64, 64],
                ..Default::default()
            },
        )
        .unwrap();
        let a = solid(10, 10, 1);
        let b = solid(12, 12, 2);
        atlas.add(a.clone()).unwrap();
        atlas.add(b.clone()).unwrap();
        let before = regions(&atlas);

        let err = atlas.resize(129, 64).unwrap_err();
        assert!(matches!(
            err,
            AtlasError::CapacityExceeded(Capacity::Size { width: 129, max_width: 128, .. })
        ));
        assert_eq!(atlas.size(), (64, 64));
        assert_eq!(regions(&atlas), before);
        assert_eq!(atlas.get_slot(a.hash()).unwrap(), 0);
        assert_eq!(atlas.get_slot(b.hash()).unwrap(), 1);
    }

    #[test]
    fn test_hundred_pixel_atlas_with_border() {
        let mut atlas = atlas(100, 100, 1, false);
        let a = pattern(30, 30, 1);
        let b = pattern(30, 30, 2);
        let c = pattern(30, 30, 3);
        let slots: Vec<u32> = [&a, &b, &c]
            .into_iter()
            .map(|image| atlas.add(image.clone()).unwrap().0)
            .collect();
        assert_eq!(slots, [0, 1, 2]);

        let before = regions(&atlas);
        let all: Vec<&AtlasRegion> = before.values().collect();
        assert!(!all[0].intersects(all[1], 1));
        assert!(!all[0].intersects(all[2], 1));
        assert!(!all[1].intersects(all[2], 1));

        atlas.resize(100, 100).unwrap();
        assert_eq!(regions(&atlas), before);

        // The first shelf is full, a second one opens below it.
        let (_, d) = atlas.add(pattern(30, 30, 4)).unwrap();
        assert_eq!((d.x, d.y), (1, 33));
        for image in [&a, &b, &c] {
            assert_eq!(atlas.get_region(image.hash()).unwrap(), before[image.hash()]);
            assert_eq!(atlas.read_image(image.hash()).unwrap().pixels(), image.pixels());
        }
    }

    #[test]
    fn test_out_of_space_without_auto_resize() {
        let mut atlas = atlas(16, 16, 0, false);
        atlas.add(solid(16, 16, 1)).unwrap();
        let stats = atlas.stats();

        let err = atlas.add(solid(1, 1, 2)).unwrap_err();
        assert!(matches!(err, AtlasError::OutOfSpace { .. }));
        assert!(err.is_capacity());
        assert_eq!(atlas.stats(), stats);
        assert_eq!(atlas.get_slot(solid(1, 1, 2).hash()).ok(), None);
    }

    #[test]
    fn test_slot_table_ceiling() {
        let config = AtlasConfig {
            size: [4, 4],
            border: 0,
            auto_resize: false,
            image_slots: 2,
            ..Default::default()
        };
        let mut atlas = TextureAtlas::new(CpuBackend::new(4), config).unwrap();
        for shade in 0..8 {
            atlas.add(solid(1, 1, shade)).unwrap();
        }
        let stats = atlas.stats();

        let err = atlas.add(solid(1, 1, 8)).unwrap_err();
        assert!(matches!(
            err,
            AtlasError::CapacityExceeded(Capacity::Slots { max: 8, .. })
        ));
        assert_eq!(atlas.stats(), stats);
    }

    #[test]
    fn test_auto_resize_doubles_width_on_tie() {
        let mut atlas = atlas(64, 64, 0, true);
        let a = pattern(48, 48, 1);
        let b = pattern(48, 48, 2);
        atlas.add(a.clone()).unwrap();
        let (_, region_b) = atlas.add(b.clone()).unwrap();

        assert_eq!(atlas.size(), (128, 64));
        assert_eq!((region_b.x, region_b.y), (48, 0));
        let region_a = atlas.get_region(a.hash()).unwrap();
        assert_eq!((region_a.x, region_a.y), (0, 0));
        assert_eq!(region_a.texture_coordinates[2], [0.375, 0.75]);
        assert_eq!(atlas.read_image(a.hash()).unwrap().pixels(), a.pixels());
    }

    #[test]
    fn test_auto_resize_compacts_before_growing() {
        let mut atlas = atlas(64, 64, 0, true);
        let a = pattern(64, 32, 1);
        let b = pattern(64, 32, 2);
        let c = pattern(64, 32, 3);
        atlas.add(a.clone()).unwrap();
        atlas.add(b.clone()).unwrap();
        atlas.remove(a.hash()).unwrap();

        let (slot_c, region_c) = atlas.add(c.clone()).unwrap();
        assert_eq!(atlas.size(), (64, 64));
        assert_eq!(slot_c, 0);
        assert_eq!(region_c.y, 32);
        assert_eq!(atlas.get_region(b.hash()).unwrap().y, 0);
        assert_eq!(atlas.get_slot(b.hash()).unwrap(), 1);
        assert_eq!(atlas.read_image(b.hash()).unwrap().pixels(), b.pixels());
        assert_eq!(atlas.stats().allocated_area, atlas.stats().live_area);
    }

    #[test]
    fn test_auto_resize_stops_at_maximum() {
        let config = AtlasConfig {
            size: [64, 64],
            border: 0,
            max_size: Some([128, 64]),
            ..Default::default()
        };
        let mut atlas = TextureAtlas::new(CpuBackend::new(256), config).unwrap();
        atlas.add(solid(64, 64, 1)).unwrap();
        atlas.add(solid(64, 64, 2)).unwrap();
        assert_eq!(atlas.size(), (128, 64));
        let before = regions(&atlas);

        let err = atlas.add(solid(64, 64, 3)).unwrap_err();
        assert!(matches!(
            err,
            AtlasError::CapacityExceeded(Capacity::Size { width: 128, height: 64, .. })
        ));
        assert_eq!(atlas.size(), (128, 64));
        assert_eq!(regions(&atlas), before);
    }

    #[test]
    fn test_auto_resize_repacks_when_growth_alone_is_not_enough() {
        let config = AtlasConfig {
            size: [64, 64],
            border: 0,
            max_size: Some([128, 64]),
            ..Default::default()
        };
        let mut atlas = TextureAtlas::new(CpuBackend::new(256), config).unwrap();
        let a = pattern(40, 64, 1);
        let b = pattern(24, 64, 2);
        atlas.add(a.clone()).unwrap();
        let (slot_b, _) = atlas.add(b.clone()).unwrap();
        atlas.remove(a.hash()).unwrap();

        // Grown in place the shelf keeps A's dead columns; only a repack at
        // 128x64 leaves room for 24 + 100 pixels.
        let c = pattern(100, 64, 3);
        let (_, region_c) = atlas.add(c.clone()).unwrap();
        assert_eq!(atlas.size(), (128, 64));
        assert_eq!((region_c.x, region_c.y), (24, 0));

        let region_b = atlas.get_region(b.hash()).unwrap();
        assert_eq!((region_b.x, region_b.y), (0, 0));
        assert!(!region_b.intersects(&region_c, 0));
        assert_eq!(atlas.get_slot(b.hash()).unwrap(), slot_b);
        assert_eq!(uv_row(&mut atlas, slot_b), region_b.uv_row());
        assert_eq!(atlas.read_image(b.hash()).unwrap().pixels(), b.pixels());
        assert_eq!(atlas.read_image(c.hash()).unwrap().pixels(), c.pixels());
    }

    #[test]
    fn test_failed_shrink_changes_nothing() {
        let mut atlas = atlas(64, 64, 0, false);
        let image = pattern(40, 40, 1);
        let (slot, _) = atlas.add(image.clone()).unwrap();
        let before = regions(&atlas);
        let row = uv_row(&mut atlas, slot);

        let err = atlas.resize(32, 32).unwrap_err();
        assert!(matches!(err, AtlasError::CapacityExceeded(Capacity::Repack { .. })));
        assert_eq!(atlas.size(), (64, 64));
        assert_eq!(regions(&atlas), before);
        assert_eq!(atlas.get_slot(image.hash()).unwrap(), slot);
        assert_eq!(uv_row(&mut atlas, slot), row);
        assert_eq!(atlas.read_image(image.hash()).unwrap().pixels(), image.pixels());
    }

    #[test]
    fn test_rejected_add_keeps_slot_capacity() {
        let config = AtlasConfig {
            size: [16, 16],
            border: 0,
            auto_resize: false,
            image_slots: 2,
            ..Default::default()
        };
        let mut atlas = TextureAtlas::new(CpuBackend::new(256), config).unwrap();
        atlas.add(solid(8, 16, 1)).unwrap();
        atlas.add(solid(8, 16, 2)).unwrap();
        assert_eq!(atlas.image_registry.slots().capacity(), 2);

        let err = atlas.add(solid(1, 1, 3)).unwrap_err();
        assert!(matches!(err, AtlasError::OutOfSpace { .. }));
        assert_eq!(atlas.image_registry.slots().capacity(), 2);

        let texture = Texture::new(solid(1, 1, 4));
        assert!(atlas.add_texture(&texture).is_err());
        assert_eq!(atlas.texture_registry.slots().capacity(), 512);
        assert_eq!(atlas.stats().textures, 0);
    }

    #[test]
    fn test_rebuild_reads_back_without_cpu_pixels() {
        let config = AtlasConfig {
            size: [64, 64],
            keep_pixels: false,
            auto_resize: false,
            ..Default::default()
        };
        let mut atlas = TextureAtlas::new(CpuBackend::new(256), config).unwrap();
        let a = pattern(10, 10, 1);
        let b = pattern(20, 5, 2);
        let c = pattern(7, 12, 3);
        for image in [&a, &b, &c] {
            atlas.add(image.clone()).unwrap();
        }
        atlas.remove(a.hash()).unwrap();
        atlas.rebuild().unwrap();

        assert_eq!(atlas.read_image(b.hash()).unwrap().pixels(), b.pixels());
        assert_eq!(atlas.read_image(c.hash()).unwrap().pixels(), c.pixels());
    }

    #[test]
    fn test_transformed_textures_share_image_region() {
        let mut atlas = atlas(64, 64, 1, false);
        let texture = Texture::new(pattern(8, 4, 1));
        let rotated = texture.rotate_90();

        let (slot, region) = atlas.add_texture(&texture).unwrap();
        let (rotated_slot, rotated_region) = atlas.add_texture(&rotated).unwrap();
        let image_region = atlas.get_region(texture.image().hash()).unwrap();

        assert_ne!(slot, rotated_slot);
        assert_eq!(region, image_region);
        assert_eq!(
            rotated_region,
            image_region.with_vertex_order(VertexOrder::IDENTITY.then(Transform::Rotate90))
        );
        assert_eq!(atlas.stats().images, 1);
        assert_eq!(atlas.stats().textures, 2);

        atlas.remove_texture(&texture.atlas_name()).unwrap();
        assert!(atlas.has_image(texture.image().hash()));
        atlas.remove_texture(&rotated.atlas_name()).unwrap();
        assert!(!atlas.has_image(texture.image().hash()));
    }

    #[test]
    fn test_texture_regions_follow_rebuild() {
        let mut atlas = atlas(64, 64, 0, false);
        let filler = solid(32, 32, 9);
        atlas.add(filler.clone()).unwrap();
        let texture = Texture::new(pattern(8, 8, 1)).flip_left_right();
        let (slot, _) = atlas.add_texture(&texture).unwrap();

        atlas.remove(filler.hash()).unwrap();
        atlas.rebuild().unwrap();

        let image_region = atlas.get_region(texture.image().hash()).unwrap();
        assert_eq!((image_region.x, image_region.y), (0, 0));
        assert_eq!(atlas.texture_slot(&texture.atlas_name()).unwrap(), slot);
        assert_eq!(
            atlas.texture_region(&texture.atlas_name()).unwrap(),
            image_region.with_vertex_order(texture.vertex_order())
        );
    }

    #[test]
    fn test_dropped_handles_release_on_collect() {
        let mut atlas = atlas(64, 64, 1, false);
        let texture = Texture::new(solid(4, 4, 1));
        let name = texture.atlas_name();

        let handle = atlas.acquire_texture(&texture).unwrap();
        let copy = handle.clone();
        assert_eq!(handle.name(), name);

        drop(handle);
        assert_eq!(atlas.collect_garbage(), 0);
        assert!(atlas.has_texture(&name));

        drop(copy);
        assert_eq!(atlas.pending_releases(), 1);
        assert_eq!(atlas.collect_garbage(), 1);
        assert!(!atlas.has_texture(&name));
        assert!(!atlas.has_image(texture.image().hash()));
    }

    #[test]
    fn test_update_image_rewrites_in_place() {
        let mut atlas = atlas(32, 32, 1, false);
        let original = pattern(4, 4, 1);
        atlas.add(original.clone()).unwrap();

        let edited = ImageData::with_hash(vec![200; 4 * 4 * 4], 4, 4, original.hash()).unwrap();
        atlas.update_image(edited.clone()).unwrap();
        assert_eq!(atlas.read_image(original.hash()).unwrap().pixels(), edited.pixels());

        let wrong = ImageData::with_hash(vec![0; 2 * 2 * 4], 2, 2, original.hash()).unwrap();
        assert!(matches!(
            atlas.update_image(wrong),
            Err(AtlasError::ShapeMismatch { expected: 64, actual: 16 })
        ));
    }

    #[test]
    fn test_clear_releases_everything() {
        let mut atlas = atlas(32, 32, 1, false);
        let image = solid(4, 4, 1);
        atlas.add(image.clone()).unwrap();
        atlas.add_texture(&Texture::new(solid(2, 2, 2))).unwrap();

        atlas.clear().unwrap();
        assert_eq!(atlas.stats().images, 0);
        assert_eq!(atlas.stats().textures, 0);
        assert_eq!(atlas.stats().allocated_area, 0);
        assert_eq!(atlas.add(image).unwrap().0, 0);
    }

    #[test]
    fn test_to_image_outlines_regions() {
        let mut atlas = atlas(32, 32, 1, false);
        let black = Arc::new(ImageData::solid(4, 4, [0, 0, 0, 255]).unwrap());
        let (_, region) = atlas.add(black).unwrap();
        let magenta = [255, 0, 255, 255];

        let plain = atlas.to_image(None).unwrap();
        assert_eq!(plain.get_pixel(region.x, region.y).0, [0, 0, 0, 255]);

        let outlined = atlas.to_image(Some(magenta)).unwrap();
        assert_eq!(outlined.get_pixel(region.x, region.y).0, magenta);
        assert_eq!(outlined.get_pixel(region.x + 3, region.y + 3).0, magenta);
        assert_eq!(outlined.get_pixel(region.x + 1, region.y + 1).0, [0, 0, 0, 255]);
    }

    #[test]
    fn test_uv_table_mirrors_regions() {
        let mut atlas = atlas(64, 64, 0, false);
        let image = solid(16, 8, 1);
        let (slot, region) = atlas.add(image.clone()).unwrap();
        assert_eq!(uv_row(&mut atlas, slot), region.uv_row());

        atlas.resize(128, 64).unwrap();
        let moved = atlas.get_region(image.hash()).unwrap();
        assert_ne!(moved, region);
        assert_eq!(uv_row(&mut atlas, slot), moved.uv_row());
    }

    #[test]
    fn test_into_backend_releases_textures() {
        let mut atlas = atlas(64, 64, 0, false);
        atlas.add(solid(16, 8, 1)).unwrap();
        let backend = atlas.into_backend();
        assert_eq!(backend.texture_count(), 0);
    }
}
