// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod image_data;
#[allow(clippy::module_inception)]
pub mod texture;
pub mod transform;

pub use image_data::ImageData;
pub use texture::Texture;
pub use transform::{Transform, VertexOrder};
