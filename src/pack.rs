// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::atlas::TextureAtlas;
use crate::constants::DEFAULT_OUTLINE_COLOR;
use crate::gpu::{AtlasBackend, CpuBackend, GpuContext};
use crate::io::{PackJob, load_job, load_texture, save_atlas, save_atlas_png};

#[derive(Debug, Clone, Copy, Default)]
pub struct PackOptions {
    /// Pack on a headless wgpu device instead of in memory.
    pub use_gpu: bool,
    /// Also write `<name>.outline.png` with every image region outlined.
    pub outline: bool,
}

/// Run a pack job file and return the path of the written manifest.
pub fn run(job_path: &Path, options: PackOptions) -> Result<PathBuf> {
    let job = load_job(job_path)?;
    if options.use_gpu {
        pack(GpuContext::headless()?, &job, options)
    } else {
        pack(CpuBackend::default(), &job, options)
    }
}

pub fn pack<B: AtlasBackend>(backend: B, job: &PackJob, options: PackOptions) -> Result<PathBuf> {
    let mut atlas = TextureAtlas::new(backend, job.atlas.clone())
        .with_context(|| format!("Failed to create atlas '{}'", job.atlas.name))?;

    for entry in &job.images {
        let texture = load_texture(entry)?;
        let (slot, region) = atlas
            .add_texture(&texture)
            .with_context(|| format!("Failed to pack {}", entry.path))?;
        log::debug!(
            "{} -> slot {} at ({}, {}) {}x{}",
            entry.path,
            slot,
            region.x,
            region.y,
            region.width,
            region.height
        );
    }

    let stats = atlas.stats();
    log::info!(
        "Packed {} textures from {} images into {}x{} ({:.1}% used)",
        stats.textures,
        stats.images,
        stats.width,
        stats.height,
        stats.utilization * 100.0
    );

    let output = Path::new(job.output.as_deref().unwrap_or("."));
    let manifest = save_atlas(&mut atlas, output)?;
    if options.outline {
        let path = output.join(format!("{}.outline.png", atlas.name()));
        save_atlas_png(&mut atlas, &path, Some(DEFAULT_OUTLINE_COLOR))?;
    }
    Ok(manifest)
}
