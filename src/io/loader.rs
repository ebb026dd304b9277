// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::atlas::AtlasConfig;
use crate::texture::{Texture, Transform};

/// One source file to pack, with an optional crop `[x, y, w, h]` and
/// transforms applied in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackImage {
    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop: Option<[u32; 4]>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transforms: Vec<Transform>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackJob {
    #[serde(default)]
    pub atlas: AtlasConfig,

    #[serde(default, alias = "textures")]
    pub images: Vec<PackImage>,

    /// Output directory for the PNG and manifest. Defaults to the job's directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

pub fn load_job(path: &Path) -> Result<PackJob> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read pack job: {}", path.display()))?;

    let mut job: PackJob = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse JSON pack job: {}", path.display()))?,
        _ => serde_yml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML pack job: {}", path.display()))?,
    };

    // Relative paths are relative to the job file, not the CWD.
    let job_dir = path.parent().unwrap_or(Path::new("."));
    for image in &mut job.images {
        image.path = resolve_resource_path(job_dir, &image.path);
    }
    let output = match job.output.take() {
        Some(dir) if Path::new(&dir).is_relative() => job_dir.join(dir),
        Some(dir) => PathBuf::from(dir),
        None => job_dir.to_path_buf(),
    };
    job.output = Some(output.to_string_lossy().into_owned());

    log::info!(
        "Loaded pack job '{}': {} images",
        job.atlas.name,
        job.images.len()
    );
    Ok(job)
}

/// Resolve a relative resource path:
/// 1. as-is if it already exists from the CWD
/// 2. relative to the job file's directory
/// 3. next to the executable
/// 4. unchanged, so the caller reports the missing file
pub fn resolve_resource_path(base_dir: &Path, relative: &str) -> String {
    if Path::new(relative).exists() {
        return relative.to_string();
    }
    let base_relative = base_dir.join(relative);
    if base_relative.exists() {
        return base_relative.to_string_lossy().into_owned();
    }
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        let beside_exe = dir.join(relative);
        if beside_exe.exists() {
            return beside_exe.to_string_lossy().into_owned();
        }
    }
    relative.to_string()
}

/// Decode one job entry into a texture, applying its crop and transforms.
pub fn load_texture(image: &PackImage) -> Result<Texture> {
    let path = Path::new(&image.path);
    let mut texture = Texture::from_file(path)
        .with_context(|| format!("Failed to load texture: {}", path.display()))?;
    if let Some([x, y, w, h]) = image.crop {
        texture = texture
            .crop(x, y, w, h)
            .with_context(|| format!("Failed to crop {} to {w}x{h} at ({x}, {y})", path.display()))?;
    }
    for transform in &image.transforms {
        texture = texture.transform(*transform);
    }
    Ok(texture)
}
