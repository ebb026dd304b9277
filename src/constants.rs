// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

// Pixel layout: every atlas surface is RGBA8
pub const BYTES_PER_PIXEL: usize = 4;

// Atlas defaults
pub const DEFAULT_ATLAS_NAME: &str = "default";
pub const DEFAULT_ATLAS_SIZE: [u32; 2] = [512, 512];
pub const DEFAULT_BORDER: u32 = 1;
pub const DEFAULT_IMAGE_SLOTS: u32 = 256;
pub const DEFAULT_TEXTURE_SLOTS: u32 = 512;

// UV lookup textures: RGBA32F, two texels (four u,v pairs) per slot
pub const UV_TEXTURE_WIDTH: u32 = 4096;
pub const UV_TEXELS_PER_SLOT: u32 = 2;
pub const UV_FLOATS_PER_SLOT: usize = 8;

// Hardware limit assumed by the in-memory backend
pub const CPU_MAX_TEXTURE_SIZE: u32 = 8192;

// Seed for content hashing. Changing it invalidates saved manifests.
pub const CONTENT_HASH_SEED: u64 = 0;

// Debug export
pub const DEFAULT_OUTLINE_COLOR: [u8; 4] = [255, 0, 255, 255];
