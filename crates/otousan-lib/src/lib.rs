// SPDX-License-Identifier: MPL-2.0

pub mod animation;
pub mod assets;
pub mod audio;
pub mod cache;
pub mod decode;
pub mod engine;
pub mod error;
pub mod platform;
pub mod playback;
pub mod render;
pub mod ringer;
mod scene;
pub mod touch;
pub mod wayland;

#[cfg(test)]
mod testing;

pub use engine::{InteractionState, Released, WallpaperEngine};
pub use error::{Error, Result};
pub use platform::Platform;
pub use wayland::{WaylandHost, WaylandPlatform};
