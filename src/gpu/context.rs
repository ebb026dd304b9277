// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use anyhow::Result;

use super::backend::{AtlasBackend, TexelFormat, check_bounds};
use super::buffers::{create_atlas_texture, read_texture_region, texel_format};
use crate::error::{self, check_shape};

/// Headless wgpu device that backs atlas surfaces and UV tables with real textures.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter: wgpu::Adapter,
}

impl GpuContext {
    pub fn headless() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| anyhow::anyhow!("No suitable GPU adapter found"))?;

        let info = adapter.get_info();
        log::info!("Using GPU: {} (backend: {:?})", info.name, info.backend);

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Atlas Device"),
                required_features: wgpu::Features::empty(),
                required_limits: adapter.limits(),
                ..Default::default()
            },
            None,
        ))?;

        Ok(Self {
            device,
            queue,
            adapter,
        })
    }

    pub fn from_parts(device: wgpu::Device, queue: wgpu::Queue, adapter: wgpu::Adapter) -> Self {
        Self {
            device,
            queue,
            adapter,
        }
    }
}

impl AtlasBackend for GpuContext {
    type Texture = wgpu::Texture;

    fn max_texture_size(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    fn create_texture(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
        format: TexelFormat,
    ) -> error::Result<wgpu::Texture> {
        let max = self.max_texture_size();
        if width == 0 || height == 0 || width > max || height > max {
            return Err(error::AtlasError::Gpu(format!(
                "texture '{label}' of {width}x{height} is outside the device limit {max}"
            )));
        }
        Ok(create_atlas_texture(
            &self.device,
            width,
            height,
            format,
            label,
        ))
    }

    fn texture_extent(&self, texture: &wgpu::Texture) -> (u32, u32, TexelFormat) {
        (
            texture.width(),
            texture.height(),
            texel_format(texture.format()),
        )
    }

    fn write_subimage(
        &mut self,
        texture: &wgpu::Texture,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        data: &[u8],
    ) -> error::Result<()> {
        let (tex_width, tex_height, format) = self.texture_extent(texture);
        let bytes_per_texel = format.bytes_per_texel();
        check_bounds(x, y, width, height, tex_width, tex_height)?;
        check_shape(width, height, bytes_per_texel, data.len())?;
        if width == 0 || height == 0 {
            return Ok(());
        }

        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x, y, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(width * bytes_per_texel as u32),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn read(&mut self, texture: &wgpu::Texture) -> error::Result<Vec<u8>> {
        let (width, height, _) = self.texture_extent(texture);
        self.read_subimage(texture, 0, 0, width, height)
    }

    fn read_subimage(
        &mut self,
        texture: &wgpu::Texture,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> error::Result<Vec<u8>> {
        let (tex_width, tex_height, format) = self.texture_extent(texture);
        check_bounds(x, y, width, height, tex_width, tex_height)?;
        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }
        read_texture_region(
            &self.device,
            &self.queue,
            texture,
            x,
            y,
            width,
            height,
            format.bytes_per_texel() as u32,
        )
    }

    fn destroy_texture(&mut self, texture: wgpu::Texture) {
        texture.destroy();
    }
}
