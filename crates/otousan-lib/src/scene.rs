// SPDX-License-Identifier: MPL-2.0

//! Everything that touches the render surface, kept behind one lock so the
//! event thread and the animation thread never hold the canvas at once.

use crate::{
    assets::{FrameSet, ImageId},
    cache::ImageCache,
    platform::ImageDecoder,
    render::{self, Surface},
};

pub(crate) struct Scene<S, D> {
    surface: S,
    decoder: D,
    images: ImageCache,
    frames: FrameSet,
    frame_index: usize,
}

impl<S: Surface, D: ImageDecoder> Scene<S, D> {
    pub(crate) fn new(surface: S, decoder: D) -> Self {
        Self {
            surface,
            decoder,
            images: ImageCache::new(),
            frames: FrameSet::default(),
            frame_index: 0,
        }
    }

    pub(crate) fn frames(&self) -> &FrameSet {
        &self.frames
    }

    pub(crate) fn frame_index(&self) -> usize {
        self.frame_index
    }

    /// Moves to the next talking frame and returns its index.
    pub(crate) fn advance(&mut self) -> usize {
        self.frame_index = self.frames.advance(self.frame_index);
        self.frame_index
    }

    /// Back to the idle frame.
    pub(crate) fn reset(&mut self) {
        self.frame_index = 0;
    }

    pub(crate) fn draw_current(&mut self) -> bool {
        self.draw(self.frames.frame(self.frame_index))
    }

    /// Decodes `id` on first use and draws it. Failures are logged and
    /// reported as `false`.
    pub(crate) fn draw(&mut self, id: ImageId) -> bool {
        let decoder = &self.decoder;
        let bitmap = match self
            .images
            .get_or_try_insert_with(id.slot(), || decoder.decode(id))
        {
            Ok(bitmap) => bitmap,
            Err(why) => {
                tracing::warn!(%id, ?why, "failed to load frame");
                return false;
            }
        };

        match render::draw_bitmap(&self.surface, bitmap) {
            Ok(drawn) => drawn,
            Err(why) => {
                tracing::warn!(%id, ?why, "failed to draw frame");
                false
            }
        }
    }

    /// Releases every decoded image; returns how many were cached.
    pub(crate) fn release(&mut self) -> usize {
        self.images.release_all()
    }

    pub(crate) fn cached_images(&self) -> usize {
        self.images.len()
    }
}
