// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Which registry an identity lives in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AtlasKey {
    Image(String),
    Texture(String),
}

/// Identities whose last handle was dropped, waiting for
/// `TextureAtlas::collect_garbage`.
#[derive(Debug, Clone, Default)]
pub struct ReleaseQueue(Rc<RefCell<Vec<AtlasKey>>>);

impl ReleaseQueue {
    pub fn push(&self, key: AtlasKey) {
        self.0.borrow_mut().push(key);
    }

    pub fn drain(&self) -> Vec<AtlasKey> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

struct HandleInner {
    key: AtlasKey,
    slot: u32,
    queue: ReleaseQueue,
}

impl Drop for HandleInner {
    fn drop(&mut self) {
        self.queue.push(self.key.clone());
    }
}

/// Owning reference to one atlas entry. Clones share the reference; when
/// the last clone goes away the entry is queued for release.
#[derive(Clone)]
pub struct TextureHandle {
    inner: Rc<HandleInner>,
}

impl TextureHandle {
    pub(crate) fn new(key: AtlasKey, slot: u32, queue: ReleaseQueue) -> Self {
        Self {
            inner: Rc::new(HandleInner { key, slot, queue }),
        }
    }

    pub fn key(&self) -> &AtlasKey {
        &self.inner.key
    }

    /// Identity inside its registry: an image hash or a texture atlas name.
    pub fn name(&self) -> &str {
        match &self.inner.key {
            AtlasKey::Image(name) | AtlasKey::Texture(name) => name,
        }
    }

    /// Slot index into the matching UV lookup texture. Stable across rebuilds.
    pub fn slot(&self) -> u32 {
        self.inner.slot
    }
}

impl fmt::Debug for TextureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureHandle")
            .field("key", &self.inner.key)
            .field("slot", &self.inner.slot)
            .field("clones", &Rc::strong_count(&self.inner))
            .finish()
    }
}
