// SPDX-License-Identifier: MPL-2.0

//! In-memory host services for engine tests.

use crate::{
    WallpaperEngine,
    assets::{ClipId, IMAGE_COUNT, ImageId},
    cache::Release,
    error::{Error, Result},
    platform::{AudioClip, AudioService, Completion, ImageDecoder, Platform, RingerMode},
    render::{Bitmap, Canvas, Surface},
};
use std::{
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

pub(crate) struct MockPlatform;

impl Platform for MockPlatform {
    type Surface = MockSurface;
    type Decoder = MockDecoder;
    type Audio = MockAudio;
    type Ringer = MockRinger;
}

/// Handles onto the mocks an engine was built from.
#[derive(Default)]
pub(crate) struct Mocks {
    pub surface: MockSurface,
    pub decoder: MockDecoder,
    pub audio: MockAudio,
    pub ringer: MockRinger,
}

impl Mocks {
    pub fn engine(&self) -> WallpaperEngine<MockPlatform> {
        WallpaperEngine::new(
            self.surface.clone(),
            self.decoder.clone(),
            self.audio.clone(),
            self.ringer.clone(),
        )
    }
}

#[derive(Default)]
struct SurfaceLog {
    unavailable: AtomicBool,
    posts: AtomicUsize,
    drawn: Mutex<Vec<ImageId>>,
}

/// Records which image each posted frame showed.
#[derive(Clone, Default)]
pub(crate) struct MockSurface(Arc<SurfaceLog>);

impl MockSurface {
    pub fn drawn(&self) -> Vec<ImageId> {
        self.0.drawn.lock().unwrap().clone()
    }

    pub fn posts(&self) -> usize {
        self.0.posts.load(Ordering::SeqCst)
    }

    pub fn set_available(&self, available: bool) {
        self.0.unavailable.store(!available, Ordering::SeqCst);
    }
}

pub(crate) struct MockCanvas<'a> {
    log: &'a SurfaceLog,
    drawn: Option<ImageId>,
}

impl Canvas for MockCanvas<'_> {
    fn draw_bitmap(&mut self, bitmap: &Bitmap, _x: i32, _y: i32) -> Result<()> {
        self.drawn = ImageId::from_slot(usize::from(bitmap.pixels()[0]));
        Ok(())
    }
}

impl Surface for MockSurface {
    type Canvas<'a> = MockCanvas<'a>;

    fn lock_canvas(&self) -> Option<MockCanvas<'_>> {
        if self.0.unavailable.load(Ordering::SeqCst) {
            return None;
        }
        Some(MockCanvas {
            log: &self.0,
            drawn: None,
        })
    }

    fn unlock_canvas_and_post(&self, canvas: MockCanvas<'_>) {
        canvas.log.posts.fetch_add(1, Ordering::SeqCst);
        if let Some(id) = canvas.drawn {
            canvas.log.drawn.lock().unwrap().push(id);
        }
    }
}

#[derive(Default)]
struct DecoderLog {
    decodes: Mutex<[usize; IMAGE_COUNT]>,
    failing: Mutex<Vec<ImageId>>,
}

/// Produces 1x1 bitmaps whose first byte is the image slot.
#[derive(Clone, Default)]
pub(crate) struct MockDecoder(Arc<DecoderLog>);

impl MockDecoder {
    pub fn decodes(&self, id: ImageId) -> usize {
        self.0.decodes.lock().unwrap()[id.slot()]
    }

    pub fn fail(&self, id: ImageId) {
        self.0.failing.lock().unwrap().push(id);
    }
}

impl ImageDecoder for MockDecoder {
    fn decode(&self, id: ImageId) -> Result<Bitmap> {
        if self.0.failing.lock().unwrap().contains(&id) {
            return Err(Error::MissingAsset {
                name: id.name(),
                dir: PathBuf::new(),
            });
        }
        self.0.decodes.lock().unwrap()[id.slot()] += 1;
        Ok(Bitmap::solid(1, 1, [id.slot() as u8, 0, 0, 0xff]))
    }
}

#[derive(Default)]
struct AudioLog {
    failing: AtomicBool,
    start_failing: AtomicBool,
    prepared: AtomicUsize,
    releases: AtomicUsize,
    started: Mutex<Vec<ClipId>>,
    pending: Mutex<Vec<Completion>>,
}

/// Holds completions until the test fires them.
#[derive(Clone, Default)]
pub(crate) struct MockAudio(Arc<AudioLog>);

impl MockAudio {
    pub fn set_failing(&self, failing: bool) {
        self.0.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_start_failing(&self, failing: bool) {
        self.0.start_failing.store(failing, Ordering::SeqCst);
    }

    pub fn prepared(&self) -> usize {
        self.0.prepared.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.0.releases.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> Vec<ClipId> {
        self.0.started.lock().unwrap().clone()
    }

    pub fn take_completions(&self) -> Vec<Completion> {
        std::mem::take(&mut *self.0.pending.lock().unwrap())
    }

    /// Fires every pending completion and returns how many there were.
    pub fn complete_all(&self) -> usize {
        let pending = self.take_completions();
        let count = pending.len();
        for complete in pending {
            complete();
        }
        count
    }
}

impl AudioService for MockAudio {
    type Clip = MockClip;

    fn prepare(&self, id: ClipId) -> Result<MockClip> {
        if self.0.failing.load(Ordering::SeqCst) {
            return Err(Error::AudioStream(rodio::StreamError::NoDevice));
        }
        self.0.prepared.fetch_add(1, Ordering::SeqCst);
        Ok(MockClip {
            id,
            log: Arc::clone(&self.0),
        })
    }
}

pub(crate) struct MockClip {
    id: ClipId,
    log: Arc<AudioLog>,
}

impl AudioClip for MockClip {
    fn start(&mut self, on_completion: Completion) -> Result<()> {
        if self.log.start_failing.load(Ordering::SeqCst) {
            return Err(Error::AudioStream(rodio::StreamError::NoDevice));
        }
        self.log.started.lock().unwrap().push(self.id);
        self.log.pending.lock().unwrap().push(on_completion);
        Ok(())
    }
}

impl Release for MockClip {
    fn release(self) {
        self.log.releases.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Clone)]
pub(crate) struct MockRinger(Arc<AtomicBool>);

impl Default for MockRinger {
    fn default() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }
}

impl MockRinger {
    pub fn set_normal(&self, normal: bool) {
        self.0.store(normal, Ordering::SeqCst);
    }
}

impl RingerMode for MockRinger {
    fn is_normal(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
