// SPDX-License-Identifier: MPL-2.0

use crate::{
    animation::{AnimationTask, FRAME_INTERVAL},
    assets::ClipId,
    cache::AudioCache,
    error::Result,
    platform::{AudioClip, AudioService, Platform, RingerMode},
    playback::Playback,
    scene::Scene,
    touch::{self, Bounds, Gaze, Point},
};
use rand::{SeedableRng, rngs::StdRng};
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, Weak,
    atomic::{AtomicBool, Ordering},
};

type ClipOf<P> = <<P as Platform>::Audio as AudioService>::Clip;

/// State shared with the animation thread and the audio completion callback.
struct Shared<P: Platform> {
    scene: Mutex<Scene<P::Surface, P::Decoder>>,
    playback: Mutex<Playback<AnimationTask>>,
    visible: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Point-in-time view of the interaction state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InteractionState {
    pub touch_down: Option<Point>,
    pub talking: bool,
    pub frame_index: usize,
    pub visible: bool,
    pub bounds: Option<Bounds>,
}

/// What a teardown released.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Released {
    pub images: usize,
    pub clips: usize,
}

/// The live wallpaper: reacts to host lifecycle and touch events by drawing
/// idle, gaze and talking frames and by playing voice clips.
///
/// All methods are meant to be called from the host's event thread.
pub struct WallpaperEngine<P: Platform> {
    shared: Arc<Shared<P>>,
    audio: P::Audio,
    clips: AudioCache<ClipOf<P>>,
    ringer: P::Ringer,
    rng: StdRng,
    touch_down: Option<Point>,
    bounds: Option<Bounds>,
}

impl<P: Platform> std::fmt::Debug for WallpaperEngine<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WallpaperEngine")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<P: Platform> WallpaperEngine<P> {
    pub fn new(surface: P::Surface, decoder: P::Decoder, audio: P::Audio, ringer: P::Ringer) -> Self {
        Self {
            shared: Arc::new(Shared {
                scene: Mutex::new(Scene::new(surface, decoder)),
                playback: Mutex::new(Playback::default()),
                visible: AtomicBool::new(false),
            }),
            audio,
            clips: AudioCache::new(),
            ringer,
            rng: StdRng::from_os_rng(),
            touch_down: None,
            bounds: None,
        }
    }

    /// Replaces the clip picker's random source.
    #[must_use]
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    #[must_use]
    pub fn state(&self) -> InteractionState {
        InteractionState {
            touch_down: self.touch_down,
            talking: self.is_talking(),
            frame_index: lock(&self.shared.scene).frame_index(),
            visible: self.is_visible(),
            bounds: self.bounds,
        }
    }

    #[must_use]
    pub fn is_talking(&self) -> bool {
        lock(&self.shared.playback).is_talking()
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.shared.visible.load(Ordering::Acquire)
    }

    /// Number of finished playbacks since the engine was created.
    #[must_use]
    pub fn completed_playbacks(&self) -> u64 {
        lock(&self.shared.playback).completed()
    }

    pub fn surface_created(&mut self, bounds: Bounds) {
        tracing::debug!(?bounds, "surface created");
        self.bounds = Some(bounds);
        lock(&self.shared.scene).draw_current();
    }

    pub fn surface_changed(&mut self, bounds: Bounds) {
        tracing::debug!(?bounds, "surface changed");
        self.bounds = Some(bounds);
        lock(&self.shared.scene).draw_current();
    }

    pub fn visibility_changed(&mut self, visible: bool) {
        tracing::debug!(visible, "visibility changed");
        self.shared.visible.store(visible, Ordering::Release);
        if visible {
            lock(&self.shared.scene).draw_current();
        }
    }

    pub fn touch_down(&mut self, point: Point) {
        tracing::trace!(x = point.x, y = point.y, "touch down");
        self.touch_down = Some(point);
    }

    /// Looks toward the touched quadrant, or straight ahead near the center.
    pub fn touch_move(&mut self, point: Point) {
        let Some(bounds) = self.bounds else {
            return;
        };

        let mut scene = lock(&self.shared.scene);
        match touch::classify_move(point, bounds) {
            Gaze::Center => {
                scene.draw_current();
            }
            Gaze::Quadrant(quadrant) => {
                let id = scene.frames().gaze(quadrant);
                scene.draw(id);
            }
        }
    }

    pub fn touch_up(&mut self, point: Point) {
        tracing::trace!(x = point.x, y = point.y, "touch up");
        let Some(down) = self.touch_down.take() else {
            return;
        };

        if !touch::is_tap(down, point) {
            return;
        }

        if !self.is_visible() {
            tracing::debug!("tap while hidden, ignoring");
            return;
        }

        if !self.ringer.is_normal() {
            tracing::debug!("ringer silenced, ignoring tap");
            return;
        }

        self.speak();
    }

    /// Forgets a pending touch without treating it as released.
    pub fn touch_cancelled(&mut self) {
        self.touch_down = None;
    }

    /// Starts a random clip and the mouth animation, unless already talking.
    fn speak(&mut self) {
        let clip = ClipId::random(&mut self.rng);
        let shared = Arc::clone(&self.shared);
        let weak = Arc::downgrade(&self.shared);
        let audio = &self.audio;
        let clips = &mut self.clips;

        let mut playback = lock(&shared.playback);
        let started = playback.try_start(clip, |generation| -> Result<AnimationTask> {
            let handle = clips.get_or_try_insert_with(clip.slot(), || audio.prepare(clip))?;

            // A started clip must always have a task to stop.
            let animated = Arc::clone(&shared);
            let mut task = AnimationTask::spawn(FRAME_INTERVAL, move || {
                let mut scene = lock(&animated.scene);
                scene.advance();
                scene.draw_current();
            })?;

            if let Err(why) = handle.start(on_completion(weak, generation)) {
                task.stop();
                let mut scene = lock(&shared.scene);
                scene.reset();
                scene.draw_current();
                return Err(why);
            }
            Ok(task)
        });

        match started {
            Ok(Some(generation)) => tracing::info!(%clip, generation, "speaking"),
            Ok(None) => tracing::debug!("already talking, ignoring tap"),
            Err(why) => tracing::warn!(%clip, ?why, "failed to start clip"),
        }
    }

    /// Stops playback and releases every cached image and clip. Idempotent.
    pub fn surface_destroyed(&mut self) -> Released {
        if let Some((clip, mut task)) = lock(&self.shared.playback).abort() {
            tracing::debug!(%clip, "stopping playback for teardown");
            task.stop();
        }

        let released = Released {
            images: {
                let mut scene = lock(&self.shared.scene);
                scene.reset();
                scene.release()
            },
            clips: self.clips.release_all(),
        };

        self.shared.visible.store(false, Ordering::Release);
        self.touch_down = None;
        self.bounds = None;

        if released != Released::default() {
            tracing::debug!(?released, "surface destroyed");
        }
        released
    }

    #[must_use]
    pub fn cached_images(&self) -> usize {
        lock(&self.shared.scene).cached_images()
    }

    #[must_use]
    pub fn cached_clips(&self) -> usize {
        self.clips.len()
    }
}

impl<P: Platform> Drop for WallpaperEngine<P> {
    fn drop(&mut self) {
        self.surface_destroyed();
    }
}

fn on_completion<P: Platform>(shared: Weak<Shared<P>>, generation: u64) -> crate::platform::Completion {
    Box::new(move || {
        if let Some(shared) = shared.upgrade() {
            finish_playback(&shared, generation);
        }
    })
}

/// Returns to idle if `generation` is still the playback in progress.
fn finish_playback<P: Platform>(shared: &Shared<P>, generation: u64) {
    let mut playback = lock(&shared.playback);
    let Some((clip, mut task)) = playback.complete(generation) else {
        tracing::debug!(generation, "ignoring stale completion");
        return;
    };

    // Join while still holding the lock so no tap can observe idle early.
    task.stop();
    drop(playback);

    let mut scene = lock(&shared.scene);
    scene.reset();
    if shared.visible.load(Ordering::Acquire) {
        scene.draw_current();
    }

    tracing::info!(%clip, generation, "finished speaking");
}
