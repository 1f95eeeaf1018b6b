// SPDX-License-Identifier: MPL-2.0

use crate::assets::{ClipId, ImageId};
use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no asset named `{name}` in {}", dir.display())]
    MissingAsset { name: &'static str, dir: PathBuf },

    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode image {id}")]
    Image {
        id: ImageId,
        #[source]
        source: image::ImageError,
    },

    #[error("bitmap of {width}x{height} needs {expected} bytes, got {actual}")]
    BitmapSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("failed to decode clip {id}")]
    ClipDecode {
        id: ClipId,
        #[source]
        source: rodio::decoder::DecoderError,
    },

    #[error("audio output unavailable")]
    AudioStream(#[from] rodio::StreamError),

    #[error("failed to start clip {id}")]
    ClipStart {
        id: ClipId,
        #[source]
        source: rodio::PlayError,
    },

    #[error("failed to spawn thread")]
    Spawn(#[source] std::io::Error),

    #[error("ringer query failed")]
    Ringer(#[from] zbus::Error),
}
