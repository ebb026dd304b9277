// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod allocator;
pub mod config;
pub mod handle;
pub mod rebuild;
pub mod region;
pub mod registry;
pub mod slots;
pub mod surface;
pub mod table;
pub mod texture_atlas;
pub mod uv;

pub use allocator::ShelfAllocator;
pub use config::AtlasConfig;
pub use handle::{AtlasKey, ReleaseQueue, TextureHandle};
pub use rebuild::RebuildStage;
pub use region::{AtlasRegion, TexCoords};
pub use texture_atlas::{AtlasStats, TextureAtlas, TextureEntry};
