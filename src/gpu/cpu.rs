// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use std::collections::HashMap;

use super::backend::{AtlasBackend, TexelFormat, check_bounds, crop_rows};
use crate::constants::CPU_MAX_TEXTURE_SIZE;
use crate::error::{AtlasError, Result, check_shape};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CpuTextureId(u32);

#[derive(Debug)]
struct CpuTexture {
    width: u32,
    height: u32,
    format: TexelFormat,
    data: Vec<u8>,
}

/// Row-major in-memory textures. Used by the offline packer and by tests.
#[derive(Debug)]
pub struct CpuBackend {
    max_texture_size: u32,
    textures: HashMap<CpuTextureId, CpuTexture>,
    next_id: u32,
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new(CPU_MAX_TEXTURE_SIZE)
    }
}

impl CpuBackend {
    pub fn new(max_texture_size: u32) -> Self {
        Self {
            max_texture_size,
            textures: HashMap::new(),
            next_id: 0,
        }
    }

    /// Number of textures currently alive.
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    fn get(&self, id: &CpuTextureId) -> Result<&CpuTexture> {
        self.textures
            .get(id)
            .ok_or_else(|| AtlasError::Gpu(format!("unknown texture {id:?}")))
    }
}

impl AtlasBackend for CpuBackend {
    type Texture = CpuTextureId;

    fn max_texture_size(&self) -> u32 {
        self.max_texture_size
    }

    fn create_texture(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
        format: TexelFormat,
    ) -> Result<CpuTextureId> {
        if width == 0 || height == 0 {
            return Err(AtlasError::Gpu(format!(
                "texture '{label}' must not be empty ({width}x{height})"
            )));
        }
        if width > self.max_texture_size || height > self.max_texture_size {
            return Err(AtlasError::Gpu(format!(
                "texture '{label}' of {width}x{height} exceeds device limit {}",
                self.max_texture_size
            )));
        }
        let id = CpuTextureId(self.next_id);
        self.next_id += 1;
        self.textures.insert(
            id,
            CpuTexture {
                width,
                height,
                format,
                data: vec![0; width as usize * height as usize * format.bytes_per_texel()],
            },
        );
        Ok(id)
    }

    fn texture_extent(&self, texture: &CpuTextureId) -> (u32, u32, TexelFormat) {
        self.textures
            .get(texture)
            .map(|t| (t.width, t.height, t.format))
            .unwrap_or((0, 0, TexelFormat::Rgba8))
    }

    fn write_subimage(
        &mut self,
        texture: &CpuTextureId,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        data: &[u8],
    ) -> Result<()> {
        let tex = self
            .textures
            .get_mut(texture)
            .ok_or_else(|| AtlasError::Gpu(format!("unknown texture {texture:?}")))?;
        let bpt = tex.format.bytes_per_texel();
        check_bounds(x, y, width, height, tex.width, tex.height)?;
        check_shape(width, height, bpt, data.len())?;

        let row_bytes = width as usize * bpt;
        let stride = tex.width as usize * bpt;
        for (row, src) in data.chunks_exact(row_bytes.max(1)).enumerate() {
            let start = (y as usize + row) * stride + x as usize * bpt;
            tex.data[start..start + row_bytes].copy_from_slice(src);
        }
        Ok(())
    }

    fn read(&mut self, texture: &CpuTextureId) -> Result<Vec<u8>> {
        Ok(self.get(texture)?.data.clone())
    }

    fn read_subimage(
        &mut self,
        texture: &CpuTextureId,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>> {
        let tex = self.get(texture)?;
        check_bounds(x, y, width, height, tex.width, tex.height)?;
        Ok(crop_rows(
            &tex.data,
            tex.width,
            tex.format.bytes_per_texel(),
            x,
            y,
            width,
            height,
        ))
    }

    fn destroy_texture(&mut self, texture: CpuTextureId) {
        self.textures.remove(&texture);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read_subimage() {
        let mut backend = CpuBackend::new(16);
        let tex = backend
            .create_texture("t", 4, 4, TexelFormat::Rgba8)
            .unwrap();
        let patch: Vec<u8> = (0..2 * 2 * 4).map(|i| i as u8).collect();
        backend.write_subimage(&tex, 1, 2, 2, 2, &patch).unwrap();

        assert_eq!(backend.read_subimage(&tex, 1, 2, 2, 2).unwrap(), patch);
        // Untouched texel stays zeroed.
        assert_eq!(backend.read_subimage(&tex, 0, 0, 1, 1).unwrap(), vec![0; 4]);
    }

    #[test]
    fn test_rejects_oversized_texture() {
        let mut backend = CpuBackend::new(8);
        assert!(backend.create_texture("big", 9, 1, TexelFormat::Rgba8).is_err());
    }

    #[test]
    fn test_bad_write_leaves_texture_untouched() {
        let mut backend = CpuBackend::new(8);
        let tex = backend
            .create_texture("t", 2, 2, TexelFormat::Rgba8)
            .unwrap();
        let err = backend.write_subimage(&tex, 0, 0, 2, 2, &[7; 3]).unwrap_err();
        assert!(matches!(err, AtlasError::ShapeMismatch { expected: 16, actual: 3 }));
        assert!(backend.read(&tex).unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_destroy_frees_texture() {
        let mut backend = CpuBackend::default();
        let tex = backend
            .create_texture("t", 1, 1, TexelFormat::Rgba32Float)
            .unwrap();
        assert_eq!(backend.texture_count(), 1);
        backend.destroy_texture(tex);
        assert_eq!(backend.texture_count(), 0);
    }
}
