// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::error::{AtlasError, Result};

use super::backend::TexelFormat;

pub fn wgpu_format(format: TexelFormat) -> wgpu::TextureFormat {
    match format {
        TexelFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
        TexelFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
    }
}

pub fn texel_format(format: wgpu::TextureFormat) -> TexelFormat {
    match format {
        wgpu::TextureFormat::Rgba32Float => TexelFormat::Rgba32Float,
        _ => TexelFormat::Rgba8,
    }
}

/// Row pitch for texture-to-buffer copies, rounded up to wgpu's alignment.
pub fn padded_bytes_per_row(unpadded: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

pub fn create_atlas_texture(
    device: &wgpu::Device,
    width: u32,
    height: u32,
    format: TexelFormat,
    label: &str,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu_format(format),
        usage: wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}

/// Copy a texture window into a staging buffer and strip the row padding.
#[allow(clippy::too_many_arguments)]
pub fn read_texture_region(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    bytes_per_texel: u32,
) -> Result<Vec<u8>> {
    let bytes_per_row_unpadded = width * bytes_per_texel;
    let bytes_per_row_padded = padded_bytes_per_row(bytes_per_row_unpadded);

    let staging_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("atlas readback staging"),
        size: (bytes_per_row_padded * height) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("atlas readback encoder"),
    });

    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d { x, y, z: 0 },
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: &staging_buffer,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row_padded),
                rows_per_image: None,
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );

    queue.submit(std::iter::once(encoder.finish()));

    let buffer_slice = staging_buffer.slice(..);
    let (sender, receiver) = std::sync::mpsc::channel();
    buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device.poll(wgpu::Maintain::Wait);

    match receiver.recv() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(AtlasError::Gpu(format!("failed to map readback buffer: {e}"))),
        Err(e) => return Err(AtlasError::Gpu(format!("readback callback dropped: {e}"))),
    }

    let data = buffer_slice.get_mapped_range();
    let mut pixels = Vec::with_capacity((bytes_per_row_unpadded * height) as usize);
    for row in 0..height {
        let start = (row * bytes_per_row_padded) as usize;
        let end = start + bytes_per_row_unpadded as usize;
        pixels.extend_from_slice(&data[start..end]);
    }
    drop(data);
    staging_buffer.unmap();

    Ok(pixels)
}
