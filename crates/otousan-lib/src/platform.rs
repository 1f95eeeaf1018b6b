// SPDX-License-Identifier: MPL-2.0

//! Services the wallpaper expects from its host.

use crate::{
    assets::{ClipId, ImageId},
    cache::Release,
    error::Result,
    render::{Bitmap, Surface},
};

/// Runs once when a clip finishes playing.
pub type Completion = Box<dyn FnOnce() + Send + 'static>;

pub trait ImageDecoder: Send {
    fn decode(&self, id: ImageId) -> Result<Bitmap>;
}

/// A prepared clip that can be started repeatedly.
pub trait AudioClip: Release {
    /// Starts playback from the beginning.
    ///
    /// `on_completion` is invoked once, from another thread, after playback
    /// ends. It must never be called from inside `start`.
    fn start(&mut self, on_completion: Completion) -> Result<()>;
}

pub trait AudioService {
    type Clip: AudioClip;

    fn prepare(&self, id: ClipId) -> Result<Self::Clip>;
}

pub trait RingerMode {
    /// `false` when the device is silenced or set to vibrate.
    fn is_normal(&self) -> bool;
}

/// The set of host services a [`WallpaperEngine`](crate::WallpaperEngine) runs on.
pub trait Platform: 'static {
    type Surface: Surface + 'static;
    type Decoder: ImageDecoder + 'static;
    type Audio: AudioService;
    type Ringer: RingerMode;
}
