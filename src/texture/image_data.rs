// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;

use image::RgbaImage;
use twox_hash::XxHash64;

use crate::constants::{BYTES_PER_PIXEL, CONTENT_HASH_SEED};
use crate::error::{AtlasError, Result, check_shape};

/// Decoded RGBA8 pixels plus the content hash that identifies them.
///
/// Equality and hashing go through `hash` only: two buffers with identical
/// bytes are the same image as far as the atlas is concerned.
#[derive(Clone)]
pub struct ImageData {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    hash: String,
}

impl ImageData {
    /// Wrap a tightly packed RGBA8 buffer and compute its content hash.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        validate(&pixels, width, height)?;
        let hash = identity_of(&pixels, width, height);
        Ok(Self {
            pixels,
            width,
            height,
            hash,
        })
    }

    /// Wrap pixels under a hash computed elsewhere (an asset pipeline, a saved manifest).
    pub fn with_hash(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        hash: impl Into<String>,
    ) -> Result<Self> {
        validate(&pixels, width, height)?;
        Ok(Self {
            pixels,
            width,
            height,
            hash: hash.into(),
        })
    }

    pub fn from_rgba(image: RgbaImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height)
    }

    pub fn open(path: &Path) -> Result<Self> {
        let image = image::open(path)?.to_rgba8();
        log::debug!(
            "Decoded '{}' ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );
        Self::from_rgba(image)
    }

    /// A single-colour image.
    pub fn solid(width: u32, height: u32, color: [u8; 4]) -> Result<Self> {
        let pixels = color.repeat(width as usize * height as usize);
        Self::new(pixels, width, height)
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Copy out a sub-rectangle as a new image with its own identity.
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Result<Self> {
        crate::gpu::backend::check_bounds(x, y, width, height, self.width, self.height)?;
        let pixels = crate::gpu::backend::crop_rows(
            &self.pixels,
            self.width,
            BYTES_PER_PIXEL,
            x,
            y,
            width,
            height,
        );
        Self::new(pixels, width, height)
    }

    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
    }
}

fn validate(pixels: &[u8], width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(AtlasError::ShapeMismatch {
            expected: 0,
            actual: pixels.len(),
        });
    }
    check_shape(width, height, BYTES_PER_PIXEL, pixels.len())
}

/// Content identity of an RGBA8 buffer: XxHash64 over the dimensions and bytes.
///
/// Dimensions are part of the digest so a 2x1 and a 1x2 image with the same
/// bytes stay distinct.
pub fn identity_of(pixels: &[u8], width: u32, height: u32) -> String {
    let mut hasher = XxHash64::with_seed(CONTENT_HASH_SEED);
    hasher.write(&width.to_le_bytes());
    hasher.write(&height.to_le_bytes());
    hasher.write(pixels);
    format!("{:016x}", hasher.finish())
}

impl PartialEq for ImageData {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for ImageData {}

impl Hash for ImageData {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

impl fmt::Debug for ImageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageData")
            .field("hash", &self.hash)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}
