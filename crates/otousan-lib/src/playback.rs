// SPDX-License-Identifier: MPL-2.0

//! The idle/talking state machine.
//!
//! Every accepted playback gets a fresh generation number. Completion
//! notifications carry the generation they were issued for, so a late
//! notification from an earlier clip can never end a newer one.

use crate::assets::ClipId;

#[derive(Debug)]
pub enum PlaybackState<T> {
    Idle,
    Talking {
        clip: ClipId,
        generation: u64,
        task: T,
    },
}

/// Playback state guarding at most one clip (and its animation task `T`)
/// at a time.
#[derive(Debug)]
pub struct Playback<T> {
    state: PlaybackState<T>,
    next_generation: u64,
    completed: u64,
}

impl<T> Default for Playback<T> {
    fn default() -> Self {
        Self {
            state: PlaybackState::Idle,
            next_generation: 1,
            completed: 0,
        }
    }
}

impl<T> Playback<T> {
    #[must_use]
    pub fn is_talking(&self) -> bool {
        matches!(self.state, PlaybackState::Talking { .. })
    }

    #[cfg(test)]
    pub fn state(&self) -> &PlaybackState<T> {
        &self.state
    }

    /// Generation of the playback in progress, if any.
    #[cfg(test)]
    pub fn generation(&self) -> Option<u64> {
        match self.state {
            PlaybackState::Talking { generation, .. } => Some(generation),
            PlaybackState::Idle => None,
        }
    }

    /// Number of talking → idle transitions so far.
    #[must_use]
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Starts `clip` if idle.
    ///
    /// `start` receives the generation to tag the playback with and returns
    /// the task that animates it. Returns `Ok(None)` without calling `start`
    /// while already talking; a failed `start` leaves the state idle.
    pub fn try_start<E>(
        &mut self,
        clip: ClipId,
        start: impl FnOnce(u64) -> Result<T, E>,
    ) -> Result<Option<u64>, E> {
        if self.is_talking() {
            return Ok(None);
        }

        let generation = self.next_generation;
        self.next_generation += 1;

        let task = start(generation)?;
        self.state = PlaybackState::Talking {
            clip,
            generation,
            task,
        };

        Ok(Some(generation))
    }

    /// Ends the playback tagged `generation` and hands back its task.
    ///
    /// Returns `None`, leaving the state untouched, when idle or when
    /// `generation` is stale.
    pub fn complete(&mut self, generation: u64) -> Option<(ClipId, T)> {
        match self.state {
            PlaybackState::Talking {
                generation: current,
                ..
            } if current == generation => {}
            _ => return None,
        }

        let finished = self.take();
        self.completed += 1;
        finished
    }

    /// Ends whatever is playing regardless of generation.
    pub fn abort(&mut self) -> Option<(ClipId, T)> {
        self.take()
    }

    fn take(&mut self) -> Option<(ClipId, T)> {
        match std::mem::replace(&mut self.state, PlaybackState::Idle) {
            PlaybackState::Talking { clip, task, .. } => Some((clip, task)),
            PlaybackState::Idle => None,
        }
    }
}
