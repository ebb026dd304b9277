// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use std::cmp::Reverse;
use std::fmt;

use super::allocator::ShelfAllocator;
use crate::error::{AtlasError, Capacity, Result};

/// Rebuild progress. Every rebuild walks the stages in order and returns
/// to `Idle`, also when it fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildStage {
    Idle,
    Collecting,
    Repacking,
    Writing,
    Swapping,
}

impl fmt::Display for RebuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Collecting => "collecting",
            Self::Repacking => "repacking",
            Self::Writing => "writing",
            Self::Swapping => "swapping",
        };
        f.write_str(name)
    }
}

/// Tracks the stage of one rebuild and logs each transition.
#[derive(Debug)]
pub struct Rebuild {
    atlas: String,
    stage: RebuildStage,
}

impl Rebuild {
    pub fn start(atlas: &str) -> Self {
        Self {
            atlas: atlas.to_string(),
            stage: RebuildStage::Idle,
        }
    }

    pub fn advance(&mut self, next: RebuildStage) {
        log::debug!("Atlas '{}' rebuild: {} -> {}", self.atlas, self.stage, next);
        self.stage = next;
    }
}

impl Drop for Rebuild {
    fn drop(&mut self) {
        if self.stage != RebuildStage::Idle {
            self.advance(RebuildStage::Idle);
        }
    }
}

/// A live image as seen by the repacker: identity plus interior size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackEntry {
    pub hash: String,
    pub width: u32,
    pub height: u32,
}

/// Interior position of one entry in the repacked surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub hash: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct RepackPlan {
    pub width: u32,
    pub height: u32,
    pub allocator: ShelfAllocator,
    pub placements: Vec<Placement>,
}

/// Gather live entries in packing order: tallest first, then widest,
/// then by hash so equal sizes always land the same way.
pub fn collect<'a, I>(entries: I) -> Vec<PackEntry>
where
    I: IntoIterator<Item = (&'a str, u32, u32)>,
{
    let mut collected: Vec<PackEntry> = entries
        .into_iter()
        .map(|(hash, width, height)| PackEntry {
            hash: hash.to_string(),
            width,
            height,
        })
        .collect();
    collected.sort_by(|a, b| {
        (Reverse(a.height), Reverse(a.width), &a.hash).cmp(&(
            Reverse(b.height),
            Reverse(b.width),
            &b.hash,
        ))
    });
    collected
}

/// Place every entry into a fresh `width`x`height` allocator. Fails as a
/// whole when any entry does not fit.
pub fn repack(entries: &[PackEntry], width: u32, height: u32, border: u32) -> Result<RepackPlan> {
    let mut allocator = ShelfAllocator::new(width, height);
    let mut placements = Vec::with_capacity(entries.len());
    for entry in entries {
        let (x, y) = allocator
            .allocate(entry.width + 2 * border, entry.height + 2 * border)
            .map_err(|_| AtlasError::CapacityExceeded(Capacity::Repack { width, height }))?;
        placements.push(Placement {
            hash: entry.hash.clone(),
            x: x + border,
            y: y + border,
            width: entry.width,
            height: entry.height,
        });
    }
    Ok(RepackPlan {
        width,
        height,
        allocator,
        placements,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_orders_by_size_then_hash() {
        let order: Vec<String> = collect([("c", 10, 10), ("a", 20, 10), ("b", 10, 30), ("d", 10, 10)])
            .into_iter()
            .map(|e| e.hash)
            .collect();
        assert_eq!(order, ["b", "a", "c", "d"]);
    }

    #[test]
    fn test_repack_offsets_by_border() {
        let entries = collect([("a", 8, 8), ("b", 8, 8)]);
        let plan = repack(&entries, 32, 32, 1).unwrap();
        assert_eq!((plan.placements[0].x, plan.placements[0].y), (1, 1));
        assert_eq!((plan.placements[1].x, plan.placements[1].y), (11, 1));
        assert_eq!(plan.allocator.allocations(), 2);
    }

    #[test]
    fn test_repack_failure_is_capacity_error() {
        let entries = collect([("a", 20, 20), ("b", 20, 20)]);
        let err = repack(&entries, 32, 32, 0).unwrap_err();
        assert!(matches!(
            err,
            AtlasError::CapacityExceeded(Capacity::Repack { width: 32, height: 32 })
        ));
    }
}
