// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod atlas;
pub mod constants;
pub mod error;
pub mod gpu;
pub mod io;
pub mod pack;
pub mod texture;

pub use atlas::{AtlasConfig, AtlasRegion, AtlasStats, TextureAtlas, TextureHandle};
pub use error::{AtlasError, Capacity, Result};
pub use gpu::{AtlasBackend, CpuBackend, GpuContext};
pub use texture::{ImageData, Texture, Transform, VertexOrder};
