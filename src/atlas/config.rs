// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_ATLAS_NAME, DEFAULT_ATLAS_SIZE, DEFAULT_BORDER, DEFAULT_IMAGE_SLOTS,
    DEFAULT_TEXTURE_SLOTS,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtlasConfig {
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default = "default_size")]
    pub size: [u32; 2],

    /// Padding in pixels around every image, filled with its edge pixels.
    #[serde(default = "default_border")]
    pub border: u32,

    #[serde(default = "default_true")]
    pub auto_resize: bool,

    /// Upper bound for auto-resize and explicit resizes. The device limit
    /// applies when unset or larger.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<[u32; 2]>,

    /// Keep CPU copies of image pixels. Without them a rebuild reads the
    /// pixels back from the old surface.
    #[serde(default = "default_true")]
    pub keep_pixels: bool,

    #[serde(default = "default_image_slots")]
    pub image_slots: u32,

    #[serde(default = "default_texture_slots")]
    pub texture_slots: u32,
}

fn default_name() -> String {
    DEFAULT_ATLAS_NAME.to_string()
}

fn default_size() -> [u32; 2] {
    DEFAULT_ATLAS_SIZE
}

fn default_border() -> u32 {
    DEFAULT_BORDER
}

fn default_true() -> bool {
    true
}

fn default_image_slots() -> u32 {
    DEFAULT_IMAGE_SLOTS
}

fn default_texture_slots() -> u32 {
    DEFAULT_TEXTURE_SLOTS
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            size: default_size(),
            border: default_border(),
            auto_resize: true,
            max_size: None,
            keep_pixels: true,
            image_slots: default_image_slots(),
            texture_slots: default_texture_slots(),
        }
    }
}
