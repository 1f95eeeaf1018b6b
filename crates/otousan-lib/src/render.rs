// SPDX-License-Identifier: MPL-2.0

//! Bitmaps, drawable surfaces and the lock/draw/post discipline.

use crate::{
    cache::Release,
    error::{Error, Result},
};
use std::fmt;

const BYTES_PER_PIXEL: usize = 4;

/// A decoded image in premultiplied BGRA byte order.
///
/// This matches `wl_shm` `Argb8888` on little-endian hosts, so the software
/// canvas can copy rows straight into a shm buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

// Manual Debug impl to keep pixel data out of logs
impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl Bitmap {
    pub fn from_bgra(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if pixels.len() != expected {
            return Err(Error::BitmapSize {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }

        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// A bitmap filled with one premultiplied BGRA pixel.
    #[cfg(test)]
    pub fn solid(width: u32, height: u32, bgra: [u8; 4]) -> Self {
        let pixels = bgra.repeat(width as usize * height as usize);
        Self {
            width,
            height,
            pixels,
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    fn row(&self, y: usize) -> &[u8] {
        let stride = self.width as usize * BYTES_PER_PIXEL;
        &self.pixels[y * stride..(y + 1) * stride]
    }
}

impl Release for Bitmap {
    fn release(self) {
        tracing::trace!(width = self.width, height = self.height, "released bitmap");
    }
}

/// The drawable buffer handed out while a [`Surface`] is locked.
pub trait Canvas {
    fn draw_bitmap(&mut self, bitmap: &Bitmap, x: i32, y: i32) -> Result<()>;
}

/// A host render surface whose drawable buffer must be locked for drawing
/// and posted afterwards.
pub trait Surface: Send + Sync {
    type Canvas<'a>: Canvas
    where
        Self: 'a;

    /// Locks the drawable buffer, or `None` when it is unavailable.
    fn lock_canvas(&self) -> Option<Self::Canvas<'_>>;

    /// Releases the buffer and publishes what was drawn.
    fn unlock_canvas_and_post(&self, canvas: Self::Canvas<'_>);
}

/// Posts the canvas back to its surface when dropped.
struct LockedCanvas<'s, S: Surface> {
    surface: &'s S,
    canvas: Option<S::Canvas<'s>>,
}

impl<S: Surface> Drop for LockedCanvas<'_, S> {
    fn drop(&mut self) {
        if let Some(canvas) = self.canvas.take() {
            self.surface.unlock_canvas_and_post(canvas);
        }
    }
}

/// Draws `bitmap` at the origin of `surface`.
///
/// Returns `Ok(false)` when the surface could not be locked. Once locked, the
/// canvas is posted on every path, including a failed draw.
pub fn draw_bitmap<S: Surface>(surface: &S, bitmap: &Bitmap) -> Result<bool> {
    let Some(canvas) = surface.lock_canvas() else {
        tracing::trace!("surface unavailable, skipping frame");
        return Ok(false);
    };

    let mut locked = LockedCanvas {
        surface,
        canvas: Some(canvas),
    };

    if let Some(canvas) = locked.canvas.as_mut() {
        canvas.draw_bitmap(bitmap, 0, 0)?;
    }

    Ok(true)
}

/// Software canvas in the same byte order as [`Bitmap`].
#[derive(Clone, Default, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl PixelBuffer {
    /// Opaque black buffer of the given size.
    #[cfg(test)]
    pub fn new(width: u32, height: u32) -> Self {
        let mut buffer = Self::default();
        buffer.resize(width, height);
        buffer
    }

    /// Resizes and clears to opaque black.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.data.clear();
        self.data
            .resize(width as usize * height as usize * BYTES_PER_PIXEL, 0);
        for px in self.data.chunks_exact_mut(BYTES_PER_PIXEL) {
            px[3] = 0xff;
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn stride(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    /// Source-over blit of `bitmap` with its top-left corner at `(x, y)`,
    /// clipped to the buffer.
    pub fn blit(&mut self, bitmap: &Bitmap, x: i32, y: i32) {
        let (dst_w, dst_h) = (i64::from(self.width), i64::from(self.height));
        let (x, y) = (i64::from(x), i64::from(y));

        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x + i64::from(bitmap.width)).min(dst_w);
        let y1 = (y + i64::from(bitmap.height)).min(dst_h);
        if x0 >= x1 || y0 >= y1 {
            return;
        }

        let stride = self.stride();
        let columns = (x1 - x0) as usize;
        let src_x = (x0 - x) as usize;

        for dst_y in y0..y1 {
            let src_row = bitmap.row((dst_y - y) as usize);
            let src = &src_row[src_x * BYTES_PER_PIXEL..(src_x + columns) * BYTES_PER_PIXEL];
            let start = dst_y as usize * stride + x0 as usize * BYTES_PER_PIXEL;
            let dst = &mut self.data[start..start + columns * BYTES_PER_PIXEL];

            for (d, s) in dst
                .chunks_exact_mut(BYTES_PER_PIXEL)
                .zip(src.chunks_exact(BYTES_PER_PIXEL))
            {
                blend_over(d, s);
            }
        }
    }
}

impl Canvas for PixelBuffer {
    fn draw_bitmap(&mut self, bitmap: &Bitmap, x: i32, y: i32) -> Result<()> {
        self.blit(bitmap, x, y);
        Ok(())
    }
}

/// Premultiplied source-over for one pixel.
fn blend_over(dst: &mut [u8], src: &[u8]) {
    match src[3] {
        0xff => dst.copy_from_slice(src),
        0 => {}
        alpha => {
            let inverse = 255 - u16::from(alpha);
            for (d, s) in dst.iter_mut().zip(src) {
                let blended = u16::from(*s) + (u16::from(*d) * inverse + 127) / 255;
                *d = blended.min(255) as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    };

    const RED: [u8; 4] = [0, 0, 0xff, 0xff];

    #[derive(Default)]
    struct CountingSurface {
        unavailable: AtomicBool,
        fail_draws: AtomicBool,
        locks: AtomicUsize,
        posts: AtomicUsize,
        buffer: Mutex<PixelBuffer>,
    }

    struct CountingCanvas<'a> {
        surface: &'a CountingSurface,
    }

    impl Canvas for CountingCanvas<'_> {
        fn draw_bitmap(&mut self, bitmap: &Bitmap, x: i32, y: i32) -> Result<()> {
            if self.surface.fail_draws.load(Ordering::SeqCst) {
                return Err(Error::Io {
                    path: "canvas".into(),
                    source: std::io::Error::other("draw failed"),
                });
            }
            self.surface.buffer.lock().unwrap().blit(bitmap, x, y);
            Ok(())
        }
    }

    impl Surface for CountingSurface {
        type Canvas<'a> = CountingCanvas<'a>;

        fn lock_canvas(&self) -> Option<CountingCanvas<'_>> {
            if self.unavailable.load(Ordering::SeqCst) {
                return None;
            }
            self.locks.fetch_add(1, Ordering::SeqCst);
            Some(CountingCanvas { surface: self })
        }

        fn unlock_canvas_and_post(&self, _canvas: CountingCanvas<'_>) {
            self.posts.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn surface(width: u32, height: u32) -> CountingSurface {
        CountingSurface {
            buffer: Mutex::new(PixelBuffer::new(width, height)),
            ..CountingSurface::default()
        }
    }

    #[test]
    fn draw_locks_blits_and_posts() {
        let surface = surface(2, 2);

        assert!(draw_bitmap(&surface, &Bitmap::solid(1, 1, RED)).unwrap());

        assert_eq!(surface.locks.load(Ordering::SeqCst), 1);
        assert_eq!(surface.posts.load(Ordering::SeqCst), 1);
        assert_eq!(&surface.buffer.lock().unwrap().data()[..4], &RED);
    }

    #[test]
    fn unavailable_surface_skips_the_frame() {
        let surface = surface(2, 2);
        surface.unavailable.store(true, Ordering::SeqCst);

        assert!(!draw_bitmap(&surface, &Bitmap::solid(1, 1, RED)).unwrap());
        assert_eq!(surface.posts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failed_draw_still_posts_the_canvas() {
        let surface = surface(2, 2);
        surface.fail_draws.store(true, Ordering::SeqCst);

        assert!(draw_bitmap(&surface, &Bitmap::solid(1, 1, RED)).is_err());
        assert_eq!(surface.locks.load(Ordering::SeqCst), 1);
        assert_eq!(surface.posts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn blit_is_clipped_to_the_buffer() {
        let mut buffer = PixelBuffer::new(3, 2);

        buffer.blit(&Bitmap::solid(4, 4, RED), 1, 1);

        let red_pixels: Vec<usize> = buffer
            .data()
            .chunks_exact(4)
            .enumerate()
            .filter(|(_, px)| *px == RED)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(red_pixels, vec![4, 5]);
    }

    #[test]
    fn blit_outside_the_buffer_is_a_no_op() {
        let mut buffer = PixelBuffer::new(2, 2);
        let before = buffer.clone();

        buffer.blit(&Bitmap::solid(2, 2, RED), -2, 0);
        buffer.blit(&Bitmap::solid(2, 2, RED), 0, 5);

        assert_eq!(buffer, before);
    }

    #[test]
    fn translucent_pixels_blend_over_black() {
        let mut buffer = PixelBuffer::new(1, 1);

        // 50% white, premultiplied.
        buffer.blit(&Bitmap::solid(1, 1, [0x80, 0x80, 0x80, 0x80]), 0, 0);

        assert_eq!(buffer.data(), &[0x80u8, 0x80, 0x80, 0xff]);
    }

    #[test]
    fn transparent_pixels_leave_the_buffer_untouched() {
        let mut buffer = PixelBuffer::new(1, 1);

        buffer.blit(&Bitmap::solid(1, 1, [0xff, 0, 0, 0]), 0, 0);

        assert_eq!(buffer.data(), &[0u8, 0, 0, 0xff]);
    }

    #[test]
    fn bitmap_rejects_mismatched_buffers() {
        assert!(Bitmap::from_bgra(2, 2, vec![0; 16]).is_ok());
        assert!(matches!(
            Bitmap::from_bgra(2, 2, vec![0; 15]),
            Err(Error::BitmapSize {
                expected: 16,
                actual: 15,
                ..
            })
        ));
    }
}
