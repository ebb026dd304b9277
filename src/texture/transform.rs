// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use std::fmt;

use serde::{Deserialize, Serialize};

/// Corner indices into a region's texture coordinates.
/// Corners are stored top-left, top-right, bottom-right, bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VertexOrder(pub [u8; 4]);

impl VertexOrder {
    pub const IDENTITY: Self = Self([0, 1, 2, 3]);

    pub fn is_identity(self) -> bool {
        self == Self::IDENTITY
    }

    /// Apply `transform` on top of this order.
    pub fn then(self, transform: Transform) -> Self {
        let perm = transform.permutation();
        let cur = self.0;
        Self([
            cur[perm[0] as usize],
            cur[perm[1] as usize],
            cur[perm[2] as usize],
            cur[perm[3] as usize],
        ])
    }

    /// Reorder four corners according to this order.
    pub fn apply<T: Copy>(self, corners: [T; 4]) -> [T; 4] {
        let [a, b, c, d] = self.0;
        [
            corners[a as usize],
            corners[b as usize],
            corners[c as usize],
            corners[d as usize],
        ]
    }

    /// True when the texture shows its image rotated by a quarter turn.
    pub fn swaps_axes(self) -> bool {
        // In a quarter-turned or transposed order the top edge runs between
        // corners that were vertically adjacent.
        let [tl, tr, _, _] = self.0;
        matches!((tl, tr), (0, 3) | (3, 0) | (1, 2) | (2, 1))
    }

    pub fn is_valid(self) -> bool {
        let mut seen = [false; 4];
        for i in self.0 {
            if i > 3 || seen[i as usize] {
                return false;
            }
            seen[i as usize] = true;
        }
        true
    }
}

impl Default for VertexOrder {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl fmt::Display for VertexOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{a}{b}{c}{d}")
    }
}

/// Pixel-free texture transforms, expressed as corner permutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    /// Quarter turn clockwise.
    Rotate90,
    Rotate180,
    Rotate270,
    FlipLeftRight,
    FlipTopBottom,
    /// Mirror across the top-left/bottom-right diagonal.
    Transpose,
    /// Mirror across the top-right/bottom-left diagonal.
    Transverse,
}

impl Transform {
    fn permutation(self) -> [u8; 4] {
        match self {
            Self::Rotate90 => [3, 0, 1, 2],
            Self::Rotate180 => [2, 3, 0, 1],
            Self::Rotate270 => [1, 2, 3, 0],
            Self::FlipLeftRight => [1, 0, 3, 2],
            Self::FlipTopBottom => [3, 2, 1, 0],
            Self::Transpose => [0, 3, 2, 1],
            Self::Transverse => [2, 1, 0, 3],
        }
    }
}
