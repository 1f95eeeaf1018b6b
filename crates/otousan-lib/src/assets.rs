// SPDX-License-Identifier: MPL-2.0

//! The fixed, build-time set of frame images and voice clips.
//!
//! Frame images are addressed by [`ImageId`]: slots `0..TALKING_FRAMES` are the
//! talking animation (slot 0 doubles as the idle image), the remaining slots
//! are the four gaze images in [`Quadrant`] order. Clips are addressed by
//! [`ClipId`]. Both ids are plain slot indices so caches can be fixed arrays.

use crate::{
    error::{Error, Result},
    touch::Quadrant,
};
use rand::Rng;
use std::{
    fmt,
    path::{Path, PathBuf},
};

pub const TALKING_FRAMES: usize = 6;
pub const GAZE_FRAMES: usize = 4;
pub const IMAGE_COUNT: usize = TALKING_FRAMES + GAZE_FRAMES;
pub const CLIP_COUNT: usize = 10;

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];
pub const AUDIO_EXTENSIONS: &[&str] = &["ogg", "mp3", "wav", "flac"];

const IMAGE_NAMES: [&str; IMAGE_COUNT] = [
    "image01",
    "image02_1",
    "image02_2",
    "image02_3",
    "image03_1",
    "image03_2",
    // top-left, top-right, bottom-left, bottom-right
    "image04_1",
    "image05_1",
    "image04_2",
    "image05_2",
];

const CLIP_NAMES: [&str; CLIP_COUNT] = [
    "sound0", "sound1", "sound2", "sound3", "sound4", "sound5", "sound6", "sound7", "sound8",
    "sound9",
];

/// A frame image slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageId(usize);

impl ImageId {
    pub const IDLE: ImageId = ImageId(0);

    /// Talking frame `index`, wrapped into the animation length.
    #[must_use]
    pub const fn talking(index: usize) -> Self {
        Self(index % TALKING_FRAMES)
    }

    #[must_use]
    pub const fn gaze(quadrant: Quadrant) -> Self {
        Self(TALKING_FRAMES + quadrant.index())
    }

    #[must_use]
    pub const fn slot(self) -> usize {
        self.0
    }

    /// Inverse of [`ImageId::slot`].
    #[must_use]
    pub const fn from_slot(slot: usize) -> Option<Self> {
        if slot < IMAGE_COUNT {
            Some(Self(slot))
        } else {
            None
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        IMAGE_NAMES[self.0]
    }

    pub fn all() -> impl Iterator<Item = ImageId> {
        (0..IMAGE_COUNT).map(ImageId)
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A voice clip slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClipId(usize);

impl ClipId {
    #[must_use]
    pub const fn new(slot: usize) -> Option<Self> {
        if slot < CLIP_COUNT {
            Some(Self(slot))
        } else {
            None
        }
    }

    /// Picks a clip uniformly at random.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self(rng.random_range(0..CLIP_COUNT))
    }

    #[must_use]
    pub const fn slot(self) -> usize {
        self.0
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        CLIP_NAMES[self.0]
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Talking animation order and the quadrant to gaze image mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSet {
    talking: [ImageId; TALKING_FRAMES],
    gaze: [ImageId; GAZE_FRAMES],
}

impl Default for FrameSet {
    fn default() -> Self {
        Self {
            talking: std::array::from_fn(ImageId::talking),
            gaze: Quadrant::ALL.map(ImageId::gaze),
        }
    }
}

impl FrameSet {
    #[must_use]
    pub fn len(&self) -> usize {
        self.talking.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.talking.is_empty()
    }

    /// The frame index following `index`, wrapping to the start.
    #[must_use]
    pub fn advance(&self, index: usize) -> usize {
        (index + 1) % self.len()
    }

    #[must_use]
    pub fn frame(&self, index: usize) -> ImageId {
        self.talking[index % self.len()]
    }

    #[must_use]
    pub fn gaze(&self, quadrant: Quadrant) -> ImageId {
        self.gaze[quadrant.index()]
    }
}

/// Finds `<dir>/<name>.<ext>` for the first extension that exists.
pub fn locate(dir: &Path, name: &'static str, extensions: &[&str]) -> Result<PathBuf> {
    extensions
        .iter()
        .map(|ext| dir.join(format!("{name}.{ext}")))
        .find(|path| path.is_file())
        .ok_or_else(|| Error::MissingAsset {
            name,
            dir: dir.to_owned(),
        })
}
