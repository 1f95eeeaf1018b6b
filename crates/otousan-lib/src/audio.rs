// SPDX-License-Identifier: MPL-2.0

//! Voice clip playback through `rodio`.

use crate::{
    assets::{self, AUDIO_EXTENSIONS, ClipId},
    cache::Release,
    error::{Error, Result},
    platform::{AudioClip, AudioService, Completion},
};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use std::{
    cell::RefCell,
    io::Cursor,
    path::PathBuf,
    sync::Arc,
    thread,
};

const THREAD_NAME: &str = "otousan-voice";

/// Opens the default output device on first use and keeps it open.
pub struct RodioAudio {
    dir: PathBuf,
    volume: f32,
    // The stream must outlive every sink created from its handle.
    output: RefCell<Option<(OutputStream, OutputStreamHandle)>>,
}

impl std::fmt::Debug for RodioAudio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RodioAudio")
            .field("dir", &self.dir)
            .field("volume", &self.volume)
            .field("open", &self.output.borrow().is_some())
            .finish()
    }
}

impl RodioAudio {
    pub fn new(dir: impl Into<PathBuf>, volume: f32) -> Self {
        Self {
            dir: dir.into(),
            volume: volume.clamp(0.0, 1.0),
            output: RefCell::new(None),
        }
    }

    fn handle(&self) -> Result<OutputStreamHandle> {
        let mut output = self.output.borrow_mut();
        if let Some((_, handle)) = output.as_ref() {
            return Ok(handle.clone());
        }

        let (stream, handle) = OutputStream::try_default()?;
        tracing::debug!("opened audio output");
        *output = Some((stream, handle.clone()));
        Ok(handle)
    }
}

impl AudioService for RodioAudio {
    type Clip = RodioClip;

    fn prepare(&self, id: ClipId) -> Result<RodioClip> {
        let path = assets::locate(&self.dir, id.name(), AUDIO_EXTENSIONS)?;
        let bytes: Arc<[u8]> = std::fs::read(&path)
            .map_err(|source| Error::Io {
                path: path.clone(),
                source,
            })?
            .into();

        // Fail here rather than mid-interaction on an undecodable file.
        Decoder::new(Cursor::new(Arc::clone(&bytes)))
            .map_err(|source| Error::ClipDecode { id, source })?;

        let handle = self.handle()?;
        tracing::debug!(%id, path = %path.display(), bytes = bytes.len(), "prepared clip");

        Ok(RodioClip {
            id,
            bytes,
            handle,
            volume: self.volume,
            sink: None,
        })
    }
}

/// An in-memory clip; each start plays it from the beginning on a new sink.
pub struct RodioClip {
    id: ClipId,
    bytes: Arc<[u8]>,
    handle: OutputStreamHandle,
    volume: f32,
    sink: Option<Arc<Sink>>,
}

impl AudioClip for RodioClip {
    fn start(&mut self, on_completion: Completion) -> Result<()> {
        let id = self.id;
        let source = Decoder::new(Cursor::new(Arc::clone(&self.bytes)))
            .map_err(|source| Error::ClipDecode { id, source })?;
        let sink = Sink::try_new(&self.handle).map_err(|source| Error::ClipStart { id, source })?;
        sink.set_volume(self.volume);
        sink.append(source);

        let sink = Arc::new(sink);
        let watched = Arc::clone(&sink);
        thread::Builder::new()
            .name(THREAD_NAME.into())
            .spawn(move || {
                watched.sleep_until_end();
                tracing::trace!(%id, "clip drained");
                on_completion();
            })
            .map_err(Error::Spawn)?;

        if let Some(previous) = self.sink.replace(sink) {
            previous.stop();
        }
        Ok(())
    }
}

impl Release for RodioClip {
    fn release(self) {
        if let Some(sink) = self.sink {
            sink.stop();
        }
        tracing::trace!(id = %self.id, "released clip");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// 16-bit mono PCM WAV with `samples` frames of silence.
    fn wav(samples: u32) -> Vec<u8> {
        let data_len = samples * 2;
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVEfmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&8000u32.to_le_bytes());
        out.extend_from_slice(&16000u32.to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        out.resize(out.len() + data_len as usize, 0);
        out
    }

    fn asset_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("otousan-audio-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn generated_wav_decodes() {
        assert!(Decoder::new(Cursor::new(wav(800))).is_ok());
    }

    #[test]
    fn missing_clip_is_reported_before_opening_output() {
        let dir = asset_dir("missing");
        let audio = RodioAudio::new(&dir, 1.0);

        assert!(matches!(
            audio.prepare(ClipId::new(3).unwrap()),
            Err(Error::MissingAsset { name: "sound3", .. })
        ));
        assert!(audio.output.borrow().is_none());

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn undecodable_clip_is_reported_before_opening_output() {
        let dir = asset_dir("corrupt");
        fs::write(dir.join("sound0.wav"), b"RIFF garbage").unwrap();
        let audio = RodioAudio::new(&dir, 1.0);

        assert!(matches!(
            audio.prepare(ClipId::new(0).unwrap()),
            Err(Error::ClipDecode { .. })
        ));
        assert!(audio.output.borrow().is_none());

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn volume_is_clamped() {
        assert_eq!(RodioAudio::new("/nonexistent", 3.0).volume, 1.0);
        assert_eq!(RodioAudio::new("/nonexistent", -1.0).volume, 0.0);
    }
}
