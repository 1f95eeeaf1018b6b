// SPDX-License-Identifier: MPL-2.0

//! Decode-once caches keyed by fixed slot indices.

use crate::assets::{CLIP_COUNT, IMAGE_COUNT};
use crate::render::Bitmap;

/// A decoded resource that must be explicitly released rather than dropped.
pub trait Release {
    fn release(self);
}

/// Fixed-capacity, lazily populated cache.
///
/// Every populated slot is released exactly once, either by
/// [`SlotCache::release_all`] or when the cache is dropped.
pub struct SlotCache<T: Release, const N: usize> {
    slots: [Option<T>; N],
}

pub type ImageCache = SlotCache<Bitmap, IMAGE_COUNT>;
pub type AudioCache<C> = SlotCache<C, CLIP_COUNT>;

impl<T: Release, const N: usize> Default for SlotCache<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Release, const N: usize> SlotCache<T, N> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }

    #[cfg(test)]
    pub fn get(&self, slot: usize) -> Option<&T> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    /// Returns the cached value for `slot`, creating it with `load` on first use.
    ///
    /// A failed load leaves the slot empty so a later call retries.
    ///
    /// # Panics
    ///
    /// Panics if `slot >= N`.
    pub fn get_or_try_insert_with<E>(
        &mut self,
        slot: usize,
        load: impl FnOnce() -> Result<T, E>,
    ) -> Result<&mut T, E> {
        let entry = &mut self.slots[slot];
        let value = match entry.take() {
            Some(value) => value,
            None => load()?,
        };
        Ok(entry.insert(value))
    }

    /// Number of populated slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Releases every populated slot and returns how many there were.
    pub fn release_all(&mut self) -> usize {
        let mut released = 0;
        for value in self.slots.iter_mut().filter_map(Option::take) {
            value.release();
            released += 1;
        }
        released
    }
}

impl<T: Release, const N: usize> Drop for SlotCache<T, N> {
    fn drop(&mut self) {
        let released = self.release_all();
        if released > 0 {
            tracing::trace!(released, "released cache on drop");
        }
    }
}
