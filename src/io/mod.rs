// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod export;
pub mod loader;
pub mod persist;

pub use export::{save_atlas_png, save_png};
pub use loader::{PackImage, PackJob, load_job, load_texture};
pub use persist::{AtlasManifest, load_atlas, save_atlas};
