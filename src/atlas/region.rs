// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::constants::UV_FLOATS_PER_SLOT;
use crate::texture::VertexOrder;

/// Four (u, v) corners: top-left, top-right, bottom-right, bottom-left,
/// or a permutation of them produced by a texture transform.
pub type TexCoords = [[f32; 2]; 4];

/// Where one image (or one texture variant of it) lives in the atlas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AtlasRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub texture_coordinates: TexCoords,
}

impl AtlasRegion {
    /// Region for a pixel rectangle inside an `atlas_width`x`atlas_height` surface.
    pub fn new(atlas_size: (u32, u32), x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            texture_coordinates: corner_uvs(atlas_size, x, y, width, height),
        }
    }

    /// Same rectangle, corners reordered for a transformed texture.
    pub fn with_vertex_order(&self, order: VertexOrder) -> Self {
        Self {
            texture_coordinates: order.apply(self.texture_coordinates),
            ..*self
        }
    }

    /// Recompute UVs after the surface changed size; the pixels stay put.
    pub fn rescaled(&self, atlas_size: (u32, u32), order: VertexOrder) -> Self {
        Self::new(atlas_size, self.x, self.y, self.width, self.height).with_vertex_order(order)
    }

    /// Flattened corners as uploaded into a UV lookup row.
    pub fn uv_row(&self) -> [f32; UV_FLOATS_PER_SLOT] {
        let mut row = [0.0; UV_FLOATS_PER_SLOT];
        for (i, [u, v]) in self.texture_coordinates.iter().enumerate() {
            row[i * 2] = *u;
            row[i * 2 + 1] = *v;
        }
        row
    }

    /// The rectangle grown by `border` on every side: the space actually reserved.
    pub fn padded(&self, border: u32) -> (u32, u32, u32, u32) {
        (
            self.x - border,
            self.y - border,
            self.width + 2 * border,
            self.height + 2 * border,
        )
    }

    /// True when the two rectangles, each grown by `border`, share any pixel.
    pub fn intersects(&self, other: &Self, border: u32) -> bool {
        let (ax, ay, aw, ah) = self.padded(border);
        let (bx, by, bw, bh) = other.padded(border);
        ax < bx + bw && bx < ax + aw && ay < by + bh && by < ay + ah
    }

    /// Pixel rectangle recovered from the UV corners, for an identity-ordered region.
    pub fn pixel_rect_from_uvs(&self, atlas_size: (u32, u32)) -> (f32, f32, f32, f32) {
        let scale = Vec2::new(atlas_size.0 as f32, atlas_size.1 as f32);
        let top_left = Vec2::from(self.texture_coordinates[0]) * scale;
        let bottom_right = Vec2::from(self.texture_coordinates[2]) * scale;
        let size = bottom_right - top_left;
        (top_left.x, top_left.y, size.x, size.y)
    }
}

fn corner_uvs(atlas_size: (u32, u32), x: u32, y: u32, width: u32, height: u32) -> TexCoords {
    let size = Vec2::new(atlas_size.0 as f32, atlas_size.1 as f32);
    let top_left = Vec2::new(x as f32, y as f32) / size;
    let bottom_right = Vec2::new((x + width) as f32, (y + height) as f32) / size;
    [
        [top_left.x, top_left.y],
        [bottom_right.x, top_left.y],
        [bottom_right.x, bottom_right.y],
        [top_left.x, bottom_right.y],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::Transform;

    #[test]
    fn test_uvs_reproduce_pixel_rect() {
        let atlas = (512, 256);
        let region = AtlasRegion::new(atlas, 33, 17, 40, 25);
        let (x, y, w, h) = region.pixel_rect_from_uvs(atlas);
        assert!((x - 33.0).abs() < 1e-3);
        assert!((y - 17.0).abs() < 1e-3);
        assert!((w - 40.0).abs() < 1e-3);
        assert!((h - 25.0).abs() < 1e-3);
    }

    #[test]
    fn test_corner_winding() {
        let region = AtlasRegion::new((100, 100), 10, 20, 30, 40);
        let [tl, tr, br, bl] = region.texture_coordinates;
        assert_eq!(tl, [0.1, 0.2]);
        assert_eq!(tr, [0.4, 0.2]);
        assert_eq!(br, [0.4, 0.6]);
        assert_eq!(bl, [0.1, 0.6]);
    }

    #[test]
    fn test_vertex_order_only_permutes_corners() {
        let region = AtlasRegion::new((64, 64), 0, 0, 16, 8);
        let flipped = region.with_vertex_order(VertexOrder::IDENTITY.then(Transform::FlipLeftRight));
        assert_eq!(flipped.x, region.x);
        assert_eq!(flipped.width, region.width);
        assert_eq!(flipped.texture_coordinates[0], region.texture_coordinates[1]);
        assert_eq!(flipped.texture_coordinates[1], region.texture_coordinates[0]);
    }

    #[test]
    fn test_intersects_accounts_for_border() {
        let a = AtlasRegion::new((100, 100), 2, 2, 30, 30);
        let b = AtlasRegion::new((100, 100), 34, 2, 30, 30);
        assert!(!a.intersects(&b, 1));
        assert!(a.intersects(&b, 2));
    }

    #[test]
    fn test_uv_row_layout() {
        let region = AtlasRegion::new((2, 2), 0, 0, 1, 1);
        assert_eq!(region.uv_row(), [0.0, 0.0, 0.5, 0.0, 0.5, 0.5, 0.0, 0.5]);
    }
}
