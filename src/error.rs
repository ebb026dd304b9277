// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AtlasError>;

/// Which limit a [`AtlasError::CapacityExceeded`] ran into.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Capacity {
    #[error("surface size {width}x{height} exceeds the maximum of {max_width}x{max_height}")]
    Size {
        width: u32,
        height: u32,
        max_width: u32,
        max_height: u32,
    },
    #[error("{requested} slots requested but the lookup table holds at most {max}")]
    Slots { requested: u32, max: u32 },
    #[error("live regions do not fit into a {width}x{height} surface")]
    Repack { width: u32, height: u32 },
}

#[derive(Debug, Error)]
pub enum AtlasError {
    #[error("no free space for a {width}x{height} region in a {atlas_width}x{atlas_height} atlas")]
    OutOfSpace {
        width: u32,
        height: u32,
        atlas_width: u32,
        atlas_height: u32,
    },

    #[error("capacity exceeded: {0}")]
    CapacityExceeded(Capacity),

    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error(
        "region {width}x{height} at ({x}, {y}) lies outside the {surface_width}x{surface_height} surface"
    )]
    RegionOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        surface_width: u32,
        surface_height: u32,
    },

    #[error("no atlas entry for '{0}'")]
    NotFound(String),

    #[error("GPU backend error: {0}")]
    Gpu(String),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl AtlasError {
    /// True for errors that mean "the atlas is full", as opposed to caller bugs.
    pub fn is_capacity(&self) -> bool {
        matches!(self, Self::OutOfSpace { .. } | Self::CapacityExceeded(_))
    }
}

/// Validate that `actual` bytes describe a `width`x`height` buffer of `bytes_per_texel`.
pub fn check_shape(width: u32, height: u32, bytes_per_texel: usize, actual: usize) -> Result<()> {
    let expected = width as usize * height as usize * bytes_per_texel;
    if expected != actual {
        return Err(AtlasError::ShapeMismatch { expected, actual });
    }
    Ok(())
}
