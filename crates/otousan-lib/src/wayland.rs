// SPDX-License-Identifier: MPL-2.0

//! Runs the wallpaper as a background layer surface on a Wayland compositor.

use crate::{
    audio::RodioAudio,
    decode::AssetDecoder,
    engine::WallpaperEngine,
    error::Result,
    platform::Platform,
    render::{Bitmap, Canvas, PixelBuffer, Surface},
    ringer::Ringer,
    touch::{Bounds, Point},
};
use eyre::{Context, eyre};
use otousan_config::Config;
use sctk::{
    compositor::{CompositorHandler, CompositorState},
    delegate_compositor, delegate_layer, delegate_output, delegate_pointer, delegate_registry,
    delegate_seat, delegate_shm, delegate_touch,
    output::{OutputHandler, OutputState},
    reexports::{
        calloop::{self, EventLoop},
        calloop_wayland_source::WaylandSource,
        client::{
            Connection, QueueHandle,
            globals::registry_queue_init,
            protocol::{
                wl_output::{self, WlOutput},
                wl_pointer::WlPointer,
                wl_seat::WlSeat,
                wl_shm,
                wl_surface::WlSurface,
                wl_touch::WlTouch,
            },
        },
    },
    registry::{ProvidesRegistryState, RegistryState},
    registry_handlers,
    seat::{
        Capability, SeatHandler, SeatState,
        pointer::{PointerEvent, PointerEventKind, PointerHandler},
        touch::TouchHandler,
    },
    shell::{
        WaylandSurface,
        wlr_layer::{
            Anchor, KeyboardInteractivity, Layer, LayerShell, LayerShellHandler, LayerSurface,
            LayerSurfaceConfigure,
        },
    },
    shm::{
        Shm, ShmHandler,
        slot::{Buffer, SlotPool},
    },
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// linux/input-event-codes.h
const BTN_LEFT: u32 = 0x110;

/// The services a Wayland session provides to the engine.
pub struct WaylandPlatform;

impl Platform for WaylandPlatform {
    type Surface = SharedFramebuffer;
    type Decoder = AssetDecoder;
    type Audio = RodioAudio;
    type Ringer = Ringer;
}

struct FramebufferInner {
    pixels: Mutex<PixelBuffer>,
    wake: Mutex<calloop::channel::Sender<()>>,
}

/// Software framebuffer drawn by the engine and presented by the event loop.
///
/// Posting a canvas wakes the event loop, which copies the pixels into a shm
/// buffer and commits it.
#[derive(Clone)]
pub struct SharedFramebuffer(Arc<FramebufferInner>);

impl std::fmt::Debug for SharedFramebuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SharedFramebuffer")
            .field(&*self.pixels())
            .finish()
    }
}

impl SharedFramebuffer {
    pub fn new(wake: calloop::channel::Sender<()>) -> Self {
        Self(Arc::new(FramebufferInner {
            pixels: Mutex::new(PixelBuffer::default()),
            wake: Mutex::new(wake),
        }))
    }

    fn pixels(&self) -> MutexGuard<'_, PixelBuffer> {
        self.0.pixels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resizes the buffer, clearing it, if the size changed.
    pub fn resize(&self, width: u32, height: u32) {
        let mut pixels = self.pixels();
        if (pixels.width(), pixels.height()) != (width, height) {
            pixels.resize(width, height);
        }
    }

    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        let pixels = self.pixels();
        (pixels.width(), pixels.height())
    }

    /// Copies the pixels into `dst`; `false` if the sizes differ.
    pub fn copy_into(&self, dst: &mut [u8]) -> bool {
        let pixels = self.pixels();
        if pixels.data().len() != dst.len() {
            return false;
        }
        dst.copy_from_slice(pixels.data());
        true
    }
}

pub struct FramebufferCanvas<'a>(MutexGuard<'a, PixelBuffer>);

impl Canvas for FramebufferCanvas<'_> {
    fn draw_bitmap(&mut self, bitmap: &Bitmap, x: i32, y: i32) -> Result<()> {
        self.0.blit(bitmap, x, y);
        Ok(())
    }
}

impl Surface for SharedFramebuffer {
    type Canvas<'a> = FramebufferCanvas<'a>;

    fn lock_canvas(&self) -> Option<FramebufferCanvas<'_>> {
        let pixels = self.pixels();
        if pixels.is_empty() {
            return None;
        }
        Some(FramebufferCanvas(pixels))
    }

    fn unlock_canvas_and_post(&self, canvas: FramebufferCanvas<'_>) {
        drop(canvas);
        let wake = self.0.wake.lock().unwrap_or_else(PoisonError::into_inner);
        if wake.send(()).is_err() {
            tracing::trace!("event loop gone, frame not presented");
        }
    }
}

pub struct WaylandHost {
    registry_state: RegistryState,
    output_state: OutputState,
    compositor_state: CompositorState,
    seat_state: SeatState,
    shm_state: Shm,
    layer: LayerSurface,
    pool: Option<SlotPool>,
    buffer: Option<Buffer>,
    framebuffer: SharedFramebuffer,
    engine: WallpaperEngine<WaylandPlatform>,
    configured: bool,
    entered: Vec<WlOutput>,
    pointer: Option<WlPointer>,
    pointer_pressed: bool,
    touch: Option<WlTouch>,
    primary_touch: Option<(i32, Point)>,
    exit: bool,
}

impl std::fmt::Debug for WaylandHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaylandHost")
            .field("engine", &self.engine)
            .field("configured", &self.configured)
            .field("entered", &self.entered.len())
            .field("exit", &self.exit)
            .finish_non_exhaustive()
    }
}

impl WaylandHost {
    pub fn run(config: &Config) -> eyre::Result<()> {
        let conn = Connection::connect_to_env().wrap_err("wayland client connection failed")?;

        let mut event_loop: EventLoop<'static, WaylandHost> =
            EventLoop::try_new().wrap_err("failed to create event loop")?;

        let (globals, event_queue) =
            registry_queue_init(&conn).wrap_err("failed to initialize registry queue")?;

        let qh = event_queue.handle();

        WaylandSource::new(conn, event_queue)
            .insert(event_loop.handle())
            .map_err(|err| err.error)
            .wrap_err("failed to insert main EventLoop into WaylandSource")?;

        let (wake_tx, wake_rx) = calloop::channel::channel();
        event_loop
            .handle()
            .insert_source(wake_rx, |event, (), host| {
                if let calloop::channel::Event::Msg(()) = event {
                    host.present();
                }
            })
            .map_err(|err| eyre!("failed to insert wake channel into event loop: {err}"))?;

        let compositor_state =
            CompositorState::bind(&globals, &qh).wrap_err("wl_compositor not available")?;
        let layer_shell = LayerShell::bind(&globals, &qh).wrap_err("layer shell not available")?;
        let shm_state = Shm::bind(&globals, &qh).wrap_err("wl_shm not available")?;

        let surface = compositor_state.create_surface(&qh);
        let layer = layer_shell.create_layer_surface(
            &qh,
            surface,
            Layer::Background,
            Some(config.namespace.clone()),
            None,
        );
        layer.set_anchor(Anchor::all());
        layer.set_exclusive_zone(-1);
        layer.set_keyboard_interactivity(KeyboardInteractivity::None);
        layer.commit();

        let decoder = AssetDecoder::new(&config.assets);
        let missing = decoder.missing();
        if !missing.is_empty() {
            tracing::warn!(dir = %config.assets.display(), ?missing, "wallpaper images missing");
        }

        let framebuffer = SharedFramebuffer::new(wake_tx);
        let engine = WallpaperEngine::new(
            framebuffer.clone(),
            decoder,
            RodioAudio::new(&config.assets, config.clamped_volume()),
            Ringer::from_source(config.ringer),
        );

        let mut host = WaylandHost {
            registry_state: RegistryState::new(&globals),
            output_state: OutputState::new(&globals, &qh),
            compositor_state,
            seat_state: SeatState::new(&globals, &qh),
            shm_state,
            layer,
            pool: None,
            buffer: None,
            framebuffer,
            engine,
            configured: false,
            entered: Vec::new(),
            pointer: None,
            pointer_pressed: false,
            touch: None,
            primary_touch: None,
            exit: false,
        };

        tracing::info!(assets = %config.assets.display(), ringer = %config.ringer, "wallpaper started");

        loop {
            event_loop.dispatch(None, &mut host)?;

            if host.exit {
                break;
            }
        }

        let released = host.engine.surface_destroyed();
        tracing::info!(?released, "wallpaper stopped");
        Ok(())
    }

    /// Copies the framebuffer into a fresh shm buffer and commits it.
    fn present(&mut self) {
        if !self.configured {
            return;
        }

        let Some(pool) = self.pool.as_mut() else {
            return;
        };

        let (width, height) = self.framebuffer.size();
        let stride = width as i32 * 4;
        let (buffer, canvas) = match pool.create_buffer(
            width as i32,
            height as i32,
            stride,
            wl_shm::Format::Argb8888,
        ) {
            Ok(created) => created,
            Err(why) => {
                tracing::error!(?why, "failed to create buffer");
                return;
            }
        };

        if !self.framebuffer.copy_into(canvas) {
            tracing::debug!("framebuffer resized during present");
            return;
        }

        let surface = self.layer.wl_surface();
        if let Err(why) = buffer.attach_to(surface) {
            tracing::error!(?why, "failed to attach buffer");
            return;
        }
        surface.damage_buffer(0, 0, width as i32, height as i32);
        self.layer.commit();

        self.buffer = Some(buffer);
    }

    fn set_visible_outputs(&mut self, entered: bool, output: &WlOutput) {
        let was_visible = !self.entered.is_empty();
        if entered {
            if !self.entered.contains(output) {
                self.entered.push(output.clone());
            }
        } else {
            self.entered.retain(|o| o != output);
        }

        let visible = !self.entered.is_empty();
        if visible != was_visible {
            self.engine.visibility_changed(visible);
        }
    }

    fn is_our_surface(&self, surface: &WlSurface) -> bool {
        self.layer.wl_surface() == surface
    }
}

impl CompositorHandler for WaylandHost {
    fn scale_factor_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &WlSurface,
        _new_factor: i32,
    ) {
    }

    fn transform_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &WlSurface,
        _new_transform: wl_output::Transform,
    ) {
    }

    fn frame(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &WlSurface,
        _time: u32,
    ) {
    }

    fn surface_enter(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        surface: &WlSurface,
        output: &WlOutput,
    ) {
        if self.is_our_surface(surface) {
            self.set_visible_outputs(true, output);
        }
    }

    fn surface_leave(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        surface: &WlSurface,
        output: &WlOutput,
    ) {
        if self.is_our_surface(surface) {
            self.set_visible_outputs(false, output);
        }
    }
}

impl OutputHandler for WaylandHost {
    fn output_state(&mut self) -> &mut OutputState {
        &mut self.output_state
    }

    fn new_output(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, output: WlOutput) {
        if let Some(info) = self.output_state.info(&output) {
            tracing::debug!(output_name = ?info.name, "new output");
        }
    }

    fn update_output(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _output: WlOutput) {}

    fn output_destroyed(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, output: WlOutput) {
        self.set_visible_outputs(false, &output);
    }
}

impl LayerShellHandler for WaylandHost {
    fn closed(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _layer: &LayerSurface) {
        tracing::debug!("layer surface closed");
        self.engine.surface_destroyed();
        self.exit = true;
    }

    fn configure(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _layer: &LayerSurface,
        configure: LayerSurfaceConfigure,
        _serial: u32,
    ) {
        let span = tracing::debug_span!("<WaylandHost as LayerShellHandler>::configure");
        let _handle = span.enter();

        let (w, h) = configure.new_size;
        if w == 0 || h == 0 {
            tracing::warn!(w, h, "compositor left the surface size to us, ignoring");
            return;
        }

        let len = w as usize * h as usize * 4;
        if let Some(pool) = self.pool.as_mut() {
            if let Err(why) = pool.resize(len) {
                tracing::error!(?why, "failed to resize pool");
                return;
            }
        } else {
            match SlotPool::new(len, &self.shm_state) {
                Ok(pool) => {
                    self.pool.replace(pool);
                }
                Err(why) => {
                    tracing::error!(?why, "failed to create pool");
                    return;
                }
            }
        }

        self.framebuffer.resize(w, h);
        let bounds = Bounds::from_size(w, h);
        if self.configured {
            self.engine.surface_changed(bounds);
        } else {
            self.configured = true;
            self.engine.surface_created(bounds);
        }

        // Map the surface even when nothing could be drawn.
        self.present();
    }
}

impl SeatHandler for WaylandHost {
    fn seat_state(&mut self) -> &mut SeatState {
        &mut self.seat_state
    }

    fn new_seat(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _seat: WlSeat) {}

    fn new_capability(
        &mut self,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
        seat: WlSeat,
        capability: Capability,
    ) {
        match capability {
            Capability::Pointer if self.pointer.is_none() => {
                match self.seat_state.get_pointer(qh, &seat) {
                    Ok(pointer) => self.pointer = Some(pointer),
                    Err(why) => tracing::warn!(?why, "failed to get pointer"),
                }
            }
            Capability::Touch if self.touch.is_none() => {
                match self.seat_state.get_touch(qh, &seat) {
                    Ok(touch) => self.touch = Some(touch),
                    Err(why) => tracing::warn!(?why, "failed to get touch"),
                }
            }
            _ => {}
        }
    }

    fn remove_capability(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _seat: WlSeat,
        capability: Capability,
    ) {
        match capability {
            Capability::Pointer => {
                self.pointer = None;
                if std::mem::take(&mut self.pointer_pressed) {
                    self.engine.touch_cancelled();
                }
            }
            Capability::Touch => {
                self.touch = None;
                if self.primary_touch.take().is_some() {
                    self.engine.touch_cancelled();
                }
            }
            _ => {}
        }
    }

    fn remove_seat(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _seat: WlSeat) {}
}

impl PointerHandler for WaylandHost {
    fn pointer_frame(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _pointer: &WlPointer,
        events: &[PointerEvent],
    ) {
        for event in events {
            if !self.is_our_surface(&event.surface) {
                continue;
            }

            let point = Point::new(event.position.0, event.position.1);
            match event.kind {
                PointerEventKind::Press {
                    button: BTN_LEFT, ..
                } => {
                    self.pointer_pressed = true;
                    self.engine.touch_down(point);
                }
                PointerEventKind::Motion { .. } if self.pointer_pressed => {
                    self.engine.touch_move(point);
                }
                PointerEventKind::Release {
                    button: BTN_LEFT, ..
                } if self.pointer_pressed => {
                    self.pointer_pressed = false;
                    self.engine.touch_up(point);
                }
                PointerEventKind::Leave { .. } if self.pointer_pressed => {
                    self.pointer_pressed = false;
                    self.engine.touch_cancelled();
                }
                _ => {}
            }
        }
    }
}

impl TouchHandler for WaylandHost {
    fn down(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _touch: &WlTouch,
        _serial: u32,
        _time: u32,
        surface: WlSurface,
        id: i32,
        position: (f64, f64),
    ) {
        if self.primary_touch.is_some() || !self.is_our_surface(&surface) {
            return;
        }

        let point = Point::new(position.0, position.1);
        self.primary_touch = Some((id, point));
        self.engine.touch_down(point);
    }

    fn up(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _touch: &WlTouch,
        _serial: u32,
        _time: u32,
        id: i32,
    ) {
        // wl_touch.up carries no position, so the last motion stands in.
        if let Some((primary, point)) = self.primary_touch {
            if primary == id {
                self.primary_touch = None;
                self.engine.touch_up(point);
            }
        }
    }

    fn motion(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _touch: &WlTouch,
        _time: u32,
        id: i32,
        position: (f64, f64),
    ) {
        if let Some((primary, last)) = self.primary_touch.as_mut() {
            if *primary == id {
                *last = Point::new(position.0, position.1);
                let point = *last;
                self.engine.touch_move(point);
            }
        }
    }

    fn shape(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _touch: &WlTouch,
        _id: i32,
        _major: f64,
        _minor: f64,
    ) {
    }

    fn orientation(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _touch: &WlTouch,
        _id: i32,
        _orientation: f64,
    ) {
    }

    fn cancel(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _touch: &WlTouch) {
        if self.primary_touch.take().is_some() {
            self.engine.touch_cancelled();
        }
    }
}

impl ShmHandler for WaylandHost {
    fn shm_state(&mut self) -> &mut Shm {
        &mut self.shm_state
    }
}

delegate_compositor!(WaylandHost);
delegate_output!(WaylandHost);
delegate_shm!(WaylandHost);
delegate_seat!(WaylandHost);
delegate_pointer!(WaylandHost);
delegate_touch!(WaylandHost);
delegate_layer!(WaylandHost);
delegate_registry!(WaylandHost);

impl ProvidesRegistryState for WaylandHost {
    fn registry(&mut self) -> &mut RegistryState {
        &mut self.registry_state
    }
    registry_handlers![OutputState, SeatState];
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render;
    use std::time::Duration;

    fn framebuffer() -> (SharedFramebuffer, EventLoop<'static, usize>) {
        let (tx, rx) = calloop::channel::channel();
        let event_loop = EventLoop::try_new().unwrap();
        event_loop
            .handle()
            .insert_source(rx, |event, (), wakes: &mut usize| {
                if let calloop::channel::Event::Msg(()) = event {
                    *wakes += 1;
                }
            })
            .unwrap();
        (SharedFramebuffer::new(tx), event_loop)
    }

    #[test]
    fn unsized_framebuffer_cannot_be_locked() {
        let (framebuffer, _event_loop) = framebuffer();

        assert!(framebuffer.lock_canvas().is_none());
        assert!(!render::draw_bitmap(&framebuffer, &Bitmap::solid(1, 1, [1, 2, 3, 255])).unwrap());
    }

    #[test]
    fn posting_wakes_the_event_loop() {
        let (framebuffer, mut event_loop) = framebuffer();
        framebuffer.resize(2, 1);

        assert!(render::draw_bitmap(&framebuffer, &Bitmap::solid(1, 1, [1, 2, 3, 255])).unwrap());

        let mut wakes = 0;
        event_loop
            .dispatch(Some(Duration::ZERO), &mut wakes)
            .unwrap();
        assert_eq!(wakes, 1);

        let mut shm = vec![0u8; 8];
        assert!(framebuffer.copy_into(&mut shm));
        assert_eq!(shm, vec![1, 2, 3, 255, 0, 0, 0, 255]);
    }

    #[test]
    fn copy_rejects_mismatched_sizes() {
        let (framebuffer, _event_loop) = framebuffer();
        framebuffer.resize(2, 2);

        assert!(!framebuffer.copy_into(&mut [0u8; 8]));
    }

    #[test]
    fn resize_to_same_size_keeps_pixels() {
        let (framebuffer, _event_loop) = framebuffer();
        framebuffer.resize(1, 1);
        render::draw_bitmap(&framebuffer, &Bitmap::solid(1, 1, [9, 9, 9, 255])).unwrap();

        framebuffer.resize(1, 1);

        let mut shm = [0u8; 4];
        assert!(framebuffer.copy_into(&mut shm));
        assert_eq!(shm, [9, 9, 9, 255]);
    }
}
