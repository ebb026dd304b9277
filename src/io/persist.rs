// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Experimental save/load of a whole atlas: `<name>.png` holds the surface,
//! `<name>.json` describes what lives where. The format is not stable.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use super::export::save_atlas_png;
use crate::atlas::{AtlasConfig, AtlasRegion, TextureAtlas};
use crate::gpu::AtlasBackend;
use crate::gpu::backend::check_bounds;
use crate::texture::{ImageData, Texture, VertexOrder};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestImage {
    pub hash: String,
    pub region: AtlasRegion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestTexture {
    /// Hash of the image the texture shows.
    pub hash: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop: Option<[u32; 4]>,

    pub points: VertexOrder,
    pub region: AtlasRegion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtlasManifest {
    pub name: String,
    pub size: [u32; 2],
    pub border: u32,
    pub images: Vec<ManifestImage>,
    pub textures: Vec<ManifestTexture>,
}

impl AtlasManifest {
    /// Snapshot of the atlas contents, ordered by slot.
    pub fn describe<B: AtlasBackend>(atlas: &TextureAtlas<B>) -> Self {
        let mut images: Vec<(u32, ManifestImage)> = atlas
            .images()
            .map(|(hash, region)| {
                let slot = atlas.get_slot(hash).unwrap_or(u32::MAX);
                let image = ManifestImage {
                    hash: hash.to_string(),
                    region: *region,
                };
                (slot, image)
            })
            .collect();
        images.sort_by_key(|(slot, _)| *slot);

        let mut textures: Vec<(u32, ManifestTexture)> = atlas
            .textures()
            .filter_map(|(name, entry)| {
                let region = atlas.texture_region(name).ok()?;
                let slot = atlas.texture_slot(name).ok()?;
                let texture = ManifestTexture {
                    hash: entry.image_hash.clone(),
                    path: entry
                        .file_path
                        .as_ref()
                        .map(|p| p.to_string_lossy().into_owned()),
                    crop: entry.crop,
                    points: entry.vertex_order,
                    region,
                };
                Some((slot, texture))
            })
            .collect();
        textures.sort_by_key(|(slot, _)| *slot);

        let (width, height) = atlas.size();
        Self {
            name: atlas.name().to_string(),
            size: [width, height],
            border: atlas.border(),
            images: images.into_iter().map(|(_, i)| i).collect(),
            textures: textures.into_iter().map(|(_, t)| t).collect(),
        }
    }
}

/// Write `<name>.png` and `<name>.json` into `dir`. Returns the manifest path.
pub fn save_atlas<B: AtlasBackend>(atlas: &mut TextureAtlas<B>, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

    let png_path = dir.join(format!("{}.png", atlas.name()));
    save_atlas_png(atlas, &png_path, None)?;

    let manifest = AtlasManifest::describe(atlas);
    let manifest_path = dir.join(format!("{}.json", atlas.name()));
    let json = serde_json::to_string_pretty(&manifest).context("Failed to serialize atlas manifest")?;
    fs::write(&manifest_path, json)
        .with_context(|| format!("Failed to write atlas manifest: {}", manifest_path.display()))?;

    log::info!(
        "Saved atlas '{}' ({} images, {} textures) to {}",
        manifest.name,
        manifest.images.len(),
        manifest.textures.len(),
        manifest_path.display()
    );
    Ok(manifest_path)
}

/// Recreate an atlas from a manifest and the PNG next to it.
///
/// Image pixels are cut out of the PNG at their recorded regions and keep
/// their recorded hashes. The returned textures hold the only references to
/// images they show; images without a texture keep one reference owned by
/// the caller.
pub fn load_atlas<B: AtlasBackend>(
    backend: B,
    manifest_path: &Path,
) -> Result<(TextureAtlas<B>, Vec<Texture>)> {
    let contents = fs::read_to_string(manifest_path)
        .with_context(|| format!("Failed to read atlas manifest: {}", manifest_path.display()))?;
    let manifest: AtlasManifest = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse atlas manifest: {}", manifest_path.display()))?;

    let png_path = manifest_path.with_extension("png");
    let surface = image::open(&png_path)
        .with_context(|| format!("Failed to load atlas image: {}", png_path.display()))?
        .to_rgba8();

    let config = AtlasConfig {
        name: manifest.name.clone(),
        size: manifest.size,
        border: manifest.border,
        ..Default::default()
    };
    let mut atlas = TextureAtlas::new(backend, config)?;

    let mut images: HashMap<&str, Arc<ImageData>> = HashMap::new();
    for entry in &manifest.images {
        let AtlasRegion {
            x,
            y,
            width,
            height,
            ..
        } = entry.region;
        check_bounds(x, y, width, height, surface.width(), surface.height())
            .with_context(|| format!("Region of image {} lies outside the atlas image", entry.hash))?;
        let pixels = image::imageops::crop_imm(&surface, x, y, width, height)
            .to_image()
            .into_raw();
        let image = Arc::new(ImageData::with_hash(pixels, width, height, entry.hash.clone())?);
        atlas.add(image.clone())?;
        images.insert(entry.hash.as_str(), image);
    }

    let mut textures = Vec::with_capacity(manifest.textures.len());
    for entry in &manifest.textures {
        let Some(image) = images.get(entry.hash.as_str()) else {
            bail!("Texture refers to unknown image {}", entry.hash);
        };
        let mut texture = Texture::new(image.clone()).with_vertex_order(entry.points);
        texture.set_provenance(entry.path.as_ref().map(PathBuf::from), entry.crop);
        atlas.add_texture(&texture)?;
        textures.push(texture);
    }

    // Hand image ownership over to the textures that show them.
    for entry in &manifest.images {
        if manifest.textures.iter().any(|t| t.hash == entry.hash) {
            atlas.remove(&entry.hash)?;
        }
    }

    log::info!(
        "Loaded atlas '{}' ({} images, {} textures) from {}",
        manifest.name,
        manifest.images.len(),
        textures.len(),
        manifest_path.display()
    );
    Ok((atlas, textures))
}
