// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::error::{AtlasError, Result};

/// Texel layouts the atlas needs: RGBA8 for image surfaces, RGBA32F for UV tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TexelFormat {
    Rgba8,
    Rgba32Float,
}

impl TexelFormat {
    pub fn bytes_per_texel(self) -> usize {
        match self {
            Self::Rgba8 => 4,
            Self::Rgba32Float => 16,
        }
    }
}

/// The graphics context the atlas draws its storage from.
///
/// All calls happen on the thread that owns the context. Implementations must
/// validate bounds and buffer sizes and leave the texture untouched on error.
pub trait AtlasBackend {
    type Texture;

    /// Largest width or height a single texture may have.
    fn max_texture_size(&self) -> u32;

    fn create_texture(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
        format: TexelFormat,
    ) -> Result<Self::Texture>;

    /// Width, height and format of a texture created by this backend.
    fn texture_extent(&self, texture: &Self::Texture) -> (u32, u32, TexelFormat);

    #[allow(clippy::too_many_arguments)]
    fn write_subimage(
        &mut self,
        texture: &Self::Texture,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        data: &[u8],
    ) -> Result<()>;

    /// Read the whole texture back, tightly packed rows.
    fn read(&mut self, texture: &Self::Texture) -> Result<Vec<u8>>;

    fn read_subimage(
        &mut self,
        texture: &Self::Texture,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>> {
        let (tex_width, tex_height, format) = self.texture_extent(texture);
        check_bounds(x, y, width, height, tex_width, tex_height)?;
        let full = self.read(texture)?;
        Ok(crop_rows(
            &full,
            tex_width,
            format.bytes_per_texel(),
            x,
            y,
            width,
            height,
        ))
    }

    fn destroy_texture(&mut self, texture: Self::Texture) {
        drop(texture);
    }
}

pub fn check_bounds(
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    surface_width: u32,
    surface_height: u32,
) -> Result<()> {
    let fits_x = x.checked_add(width).is_some_and(|r| r <= surface_width);
    let fits_y = y.checked_add(height).is_some_and(|b| b <= surface_height);
    if fits_x && fits_y {
        Ok(())
    } else {
        Err(AtlasError::RegionOutOfBounds {
            x,
            y,
            width,
            height,
            surface_width,
            surface_height,
        })
    }
}

/// Copy a `width`x`height` window out of a tightly packed row-major buffer.
pub fn crop_rows(
    data: &[u8],
    stride_texels: u32,
    bytes_per_texel: usize,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let row_bytes = width as usize * bytes_per_texel;
    let stride = stride_texels as usize * bytes_per_texel;
    let mut out = Vec::with_capacity(row_bytes * height as usize);
    for row in y..y + height {
        let start = row as usize * stride + x as usize * bytes_per_texel;
        out.extend_from_slice(&data[start..start + row_bytes]);
    }
    out
}
