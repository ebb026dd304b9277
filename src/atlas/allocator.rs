// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::error::{AtlasError, Result};

/// A horizontal strip of the surface. Rectangles are appended left to right.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Shelf {
    y: u32,
    height: u32,
    cursor: u32,
}

/// Best-fit shelf packer.
///
/// Each request goes to the existing shelf that wastes the least height
/// (first shelf on ties); failing that a new shelf is opened below the last
/// one. Placement depends only on the request sequence and the surface size.
/// Individual rectangles cannot be freed; space comes back through `reset`.
#[derive(Debug, Clone)]
pub struct ShelfAllocator {
    width: u32,
    height: u32,
    shelves: Vec<Shelf>,
    allocations: usize,
    used_area: u64,
}

impl ShelfAllocator {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            shelves: Vec::new(),
            allocations: 0,
            used_area: 0,
        }
    }

    /// Reserve a `width`x`height` rectangle and return its top-left corner.
    pub fn allocate(&mut self, width: u32, height: u32) -> Result<(u32, u32)> {
        let out_of_space = AtlasError::OutOfSpace {
            width,
            height,
            atlas_width: self.width,
            atlas_height: self.height,
        };
        if width > self.width || height > self.height {
            return Err(out_of_space);
        }

        let mut best: Option<(usize, u32)> = None;
        for (i, shelf) in self.shelves.iter().enumerate() {
            if height > shelf.height || self.width - shelf.cursor < width {
                continue;
            }
            let waste = shelf.height - height;
            if best.is_none_or(|(_, w)| waste < w) {
                best = Some((i, waste));
            }
        }

        let position = if let Some((i, _)) = best {
            let shelf = &mut self.shelves[i];
            let position = (shelf.cursor, shelf.y);
            shelf.cursor += width;
            position
        } else {
            let y = self.shelves.last().map_or(0, |s| s.y + s.height);
            if self.height - y < height {
                return Err(out_of_space);
            }
            self.shelves.push(Shelf {
                y,
                height,
                cursor: width,
            });
            (0, y)
        };

        self.allocations += 1;
        self.used_area += width as u64 * height as u64;
        Ok(position)
    }

    /// Forget every allocation and adopt a new surface size.
    pub fn reset(&mut self, width: u32, height: u32) {
        *self = Self::new(width, height);
    }

    /// Enlarge the surface while keeping every existing placement.
    /// Returns false (and changes nothing) when the new size would cut off
    /// an existing rectangle.
    pub fn grow(&mut self, width: u32, height: u32) -> bool {
        let (used_w, used_h) = self.extent();
        if width < used_w || height < used_h {
            return false;
        }
        self.width = width;
        self.height = height;
        true
    }

    /// High-water mark: the smallest surface that contains every placement.
    pub fn extent(&self) -> (u32, u32) {
        let used_w = self.shelves.iter().map(|s| s.cursor).max().unwrap_or(0);
        let used_h = self.shelves.last().map_or(0, |s| s.y + s.height);
        (used_w, used_h)
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn allocations(&self) -> usize {
        self.allocations
    }

    /// Total area handed out since the last reset, including space whose
    /// owner has since been removed.
    pub fn used_area(&self) -> u64 {
        self.used_area
    }

    pub fn utilization(&self) -> f32 {
        let total = self.width as u64 * self.height as u64;
        if total == 0 {
            0.0
        } else {
            self.used_area as f32 / total as f32
        }
    }
}
