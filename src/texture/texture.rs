// Copyright (C) Pavlo Hrytsenko <pashagricenko@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::image_data::ImageData;
use super::transform::{Transform, VertexOrder};
use crate::error::Result;

/// A drawable view of an image: shared pixels plus a corner order.
///
/// Textures that differ only by transform share one image region in the
/// atlas; each still gets its own texture slot.
#[derive(Debug, Clone)]
pub struct Texture {
    image: Arc<ImageData>,
    vertex_order: VertexOrder,
    file_path: Option<PathBuf>,
    crop_values: Option<[u32; 4]>,
}

impl Texture {
    pub fn new(image: impl Into<Arc<ImageData>>) -> Self {
        Self {
            image: image.into(),
            vertex_order: VertexOrder::IDENTITY,
            file_path: None,
            crop_values: None,
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let image = ImageData::open(path)?;
        Ok(Self {
            file_path: Some(path.to_path_buf()),
            ..Self::new(image)
        })
    }

    pub fn with_vertex_order(mut self, order: VertexOrder) -> Self {
        self.vertex_order = order;
        self
    }

    /// A new texture showing the same pixels through `transform`.
    pub fn transform(&self, transform: Transform) -> Self {
        Self {
            vertex_order: self.vertex_order.then(transform),
            ..self.clone()
        }
    }

    pub fn rotate_90(&self) -> Self {
        self.transform(Transform::Rotate90)
    }

    pub fn rotate_180(&self) -> Self {
        self.transform(Transform::Rotate180)
    }

    pub fn rotate_270(&self) -> Self {
        self.transform(Transform::Rotate270)
    }

    pub fn flip_left_right(&self) -> Self {
        self.transform(Transform::FlipLeftRight)
    }

    pub fn flip_top_bottom(&self) -> Self {
        self.transform(Transform::FlipTopBottom)
    }

    /// Crop the underlying image. The result owns new pixels with a new hash
    /// and keeps this texture's corner order.
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Result<Self> {
        let image = self.image.crop(x, y, width, height)?;
        Ok(Self {
            image: Arc::new(image),
            vertex_order: self.vertex_order,
            file_path: self.file_path.clone(),
            crop_values: Some([x, y, width, height]),
        })
    }

    /// Identity inside the atlas: content hash plus corner order.
    pub fn atlas_name(&self) -> String {
        format!("{}|{}", self.image.hash(), self.vertex_order)
    }

    pub fn image(&self) -> &Arc<ImageData> {
        &self.image
    }

    pub fn vertex_order(&self) -> VertexOrder {
        self.vertex_order
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    pub fn crop_values(&self) -> Option<[u32; 4]> {
        self.crop_values
    }

    pub(crate) fn set_provenance(&mut self, file_path: Option<PathBuf>, crop: Option<[u32; 4]>) {
        self.file_path = file_path;
        self.crop_values = crop;
    }

    /// Size as drawn: quarter turns swap width and height.
    pub fn size(&self) -> (u32, u32) {
        let (w, h) = self.image.size();
        if self.vertex_order.swaps_axes() {
            (h, w)
        } else {
            (w, h)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Texture {
        Texture::new(ImageData::solid(8, 4, [1, 2, 3, 255]).unwrap())
    }

    #[test]
    fn test_transforms_share_image_but_not_identity() {
        let base = sample();
        let rotated = base.rotate_90();
        assert!(Arc::ptr_eq(base.image(), rotated.image()));
        assert_ne!(base.atlas_name(), rotated.atlas_name());
        assert!(rotated.atlas_name().starts_with(base.image().hash()));
    }

    #[test]
    fn test_rotation_swaps_size() {
        let base = sample();
        assert_eq!(base.size(), (8, 4));
        assert_eq!(base.rotate_90().size(), (4, 8));
        assert_eq!(base.rotate_180().size(), (8, 4));
    }

    #[test]
    fn test_equal_transforms_produce_equal_names() {
        let base = sample();
        let a = base.rotate_90().rotate_90();
        let b = base.rotate_180();
        assert_eq!(a.atlas_name(), b.atlas_name());
    }

    #[test]
    fn test_crop_records_provenance() {
        let cropped = sample().flip_left_right().crop(0, 0, 2, 2).unwrap();
        assert_eq!(cropped.crop_values(), Some([0, 0, 2, 2]));
        assert_eq!(cropped.image().size(), (2, 2));
        assert_eq!(cropped.vertex_order(), sample().flip_left_right().vertex_order());
    }
}
