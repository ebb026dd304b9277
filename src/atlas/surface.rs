// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::constants::BYTES_PER_PIXEL;
use crate::error::{Result, check_shape};
use crate::gpu::backend::check_bounds;
use crate::gpu::{AtlasBackend, TexelFormat};
use crate::texture::ImageData;

/// The RGBA8 texture images are packed into.
#[derive(Debug)]
pub struct AtlasSurface<T> {
    texture: T,
    width: u32,
    height: u32,
}

impl<T> AtlasSurface<T> {
    pub fn new<B>(backend: &mut B, label: &str, width: u32, height: u32) -> Result<Self>
    where
        B: AtlasBackend<Texture = T>,
    {
        let texture = backend.create_texture(label, width, height, TexelFormat::Rgba8)?;
        Ok(Self {
            texture,
            width,
            height,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn texture(&self) -> &T {
        &self.texture
    }

    /// Write a tightly packed RGBA8 block. Out-of-bounds rectangles and
    /// wrongly sized buffers are rejected before anything is written.
    pub fn write_region<B>(
        &self,
        backend: &mut B,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<()>
    where
        B: AtlasBackend<Texture = T>,
    {
        check_bounds(x, y, width, height, self.width, self.height)?;
        check_shape(width, height, BYTES_PER_PIXEL, pixels.len())?;
        backend.write_subimage(&self.texture, x, y, width, height, pixels)
    }

    pub fn read_region<B>(
        &self,
        backend: &mut B,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>>
    where
        B: AtlasBackend<Texture = T>,
    {
        check_bounds(x, y, width, height, self.width, self.height)?;
        backend.read_subimage(&self.texture, x, y, width, height)
    }

    pub fn read_all<B>(&self, backend: &mut B) -> Result<Vec<u8>>
    where
        B: AtlasBackend<Texture = T>,
    {
        backend.read(&self.texture)
    }

    /// Write `image` with its interior at (`x`, `y`) and its edge pixels
    /// extruded `border` pixels outward, so bilinear sampling at the edge
    /// never picks up a neighbour.
    pub fn write_image<B>(
        &self,
        backend: &mut B,
        x: u32,
        y: u32,
        image: &ImageData,
        border: u32,
    ) -> Result<()>
    where
        B: AtlasBackend<Texture = T>,
    {
        if border == 0 {
            return self.write_region(backend, x, y, image.width(), image.height(), image.pixels());
        }
        let padded = extrude(image, border);
        self.write_region(
            backend,
            x - border,
            y - border,
            image.width() + 2 * border,
            image.height() + 2 * border,
            &padded,
        )
    }

    /// New surface of a different size holding this one's pixels at the
    /// same positions. `self` is left untouched; the caller swaps.
    pub fn resized<B>(&self, backend: &mut B, label: &str, width: u32, height: u32) -> Result<Self>
    where
        B: AtlasBackend<Texture = T>,
    {
        let grown = Self::new(backend, label, width, height)?;
        let copy_w = self.width.min(width);
        let copy_h = self.height.min(height);
        let copied = self
            .read_region(backend, 0, 0, copy_w, copy_h)
            .and_then(|pixels| grown.write_region(backend, 0, 0, copy_w, copy_h, &pixels));
        match copied {
            Ok(()) => Ok(grown),
            Err(e) => {
                grown.destroy(backend);
                Err(e)
            }
        }
    }

    pub fn destroy<B>(self, backend: &mut B)
    where
        B: AtlasBackend<Texture = T>,
    {
        backend.destroy_texture(self.texture);
    }
}

/// Pad an image by repeating its outermost pixels `border` times.
fn extrude(image: &ImageData, border: u32) -> Vec<u8> {
    let (w, h) = image.size();
    let padded_w = w + 2 * border;
    let padded_h = h + 2 * border;
    let src = image.pixels();
    let mut out = Vec::with_capacity(padded_w as usize * padded_h as usize * BYTES_PER_PIXEL);
    for py in 0..padded_h {
        let sy = py.saturating_sub(border).min(h - 1);
        for px in 0..padded_w {
            let sx = px.saturating_sub(border).min(w - 1);
            let start = (sy as usize * w as usize + sx as usize) * BYTES_PER_PIXEL;
            out.extend_from_slice(&src[start..start + BYTES_PER_PIXEL]);
        }
    }
    out
}
