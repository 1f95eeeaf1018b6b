// SPDX-License-Identifier: MPL-2.0

//! Image decoding from the asset directory.

use crate::{
    assets::{self, IMAGE_EXTENSIONS, ImageId},
    error::{Error, Result},
    platform::ImageDecoder,
    render::Bitmap,
};
use image::RgbaImage;
use std::path::PathBuf;

/// Decodes `<dir>/<name>.{png,jpg,jpeg,webp}` with the `image` crate.
#[derive(Debug, Clone)]
pub struct AssetDecoder {
    dir: PathBuf,
}

impl AssetDecoder {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Names of images with no matching file.
    pub fn missing(&self) -> Vec<&'static str> {
        ImageId::all()
            .filter(|id| assets::locate(&self.dir, id.name(), IMAGE_EXTENSIONS).is_err())
            .map(ImageId::name)
            .collect()
    }
}

impl ImageDecoder for AssetDecoder {
    fn decode(&self, id: ImageId) -> Result<Bitmap> {
        let path = assets::locate(&self.dir, id.name(), IMAGE_EXTENSIONS)?;
        let image = image::open(&path).map_err(|source| Error::Image { id, source })?;

        let bitmap = bitmap_from_rgba(&image.to_rgba8())?;
        tracing::debug!(
            %id,
            path = %path.display(),
            width = bitmap.width(),
            height = bitmap.height(),
            "decoded image"
        );
        Ok(bitmap)
    }
}

/// Converts straight RGBA into premultiplied BGRA.
pub fn bitmap_from_rgba(image: &RgbaImage) -> Result<Bitmap> {
    let (width, height) = image.dimensions();
    let mut pixels = Vec::with_capacity(image.as_raw().len());

    for px in image.pixels() {
        let [r, g, b, a] = px.0;
        let premultiply = |c: u8| ((u16::from(c) * u16::from(a) + 127) / 255) as u8;
        pixels.extend_from_slice(&[premultiply(b), premultiply(g), premultiply(r), a]);
    }

    Bitmap::from_bgra(width, height, pixels)
}
