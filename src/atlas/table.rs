// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use std::collections::HashMap;

use super::region::AtlasRegion;
use crate::error::{AtlasError, Result};

/// Authoritative identity -> region map. Images are keyed by content hash,
/// textures by their atlas name.
#[derive(Debug, Clone, Default)]
pub struct RegionTable {
    regions: HashMap<String, AtlasRegion>,
}

impl RegionTable {
    pub fn get(&self, identity: &str) -> Result<&AtlasRegion> {
        self.regions
            .get(identity)
            .ok_or_else(|| AtlasError::NotFound(identity.to_string()))
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.regions.contains_key(identity)
    }

    /// Insert or overwrite.
    pub fn put(&mut self, identity: impl Into<String>, region: AtlasRegion) {
        self.regions.insert(identity.into(), region);
    }

    pub fn remove(&mut self, identity: &str) -> Option<AtlasRegion> {
        self.regions.remove(identity)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AtlasRegion)> {
        self.regions.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn clear(&mut self) {
        self.regions.clear();
    }
}
