// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::Path;

use anyhow::{Context, Result};

use crate::atlas::TextureAtlas;
use crate::gpu::AtlasBackend;

pub fn save_png(pixels: &[u8], width: u32, height: u32, path: &Path) -> Result<()> {
    let img = image::RgbaImage::from_raw(width, height, pixels.to_vec())
        .context("Failed to create image from pixel data")?;
    img.save(path)
        .with_context(|| format!("Failed to save PNG to {}", path.display()))?;
    log::info!("Saved {}x{} PNG to {}", width, height, path.display());
    Ok(())
}

/// Dump the atlas surface, optionally outlining every image region.
pub fn save_atlas_png<B: AtlasBackend>(
    atlas: &mut TextureAtlas<B>,
    path: &Path,
    outline: Option<[u8; 4]>,
) -> Result<()> {
    let image = atlas
        .to_image(outline)
        .with_context(|| format!("Failed to read back atlas '{}'", atlas.name()))?;
    save_png(image.as_raw(), image.width(), image.height(), path)
}
