//! The double-buffered drawing surface shared between user code and the
//! frame scheduler.
//!
//! Two [`PixelBuffer`]s of identical size play the *back* and *front* roles.
//! User drawing only ever locks the back buffer; presenting only ever locks
//! the front one. A swap holds both locks (back first, then front, the only
//! order any code path acquires them in) and exchanges the buffers, so a
//! draw call either finishes before the swap or starts after it, and the
//! blit never sees a half-drawn frame.

use std::{
    mem,
    path::Path,
    sync::{
        atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use delegate::delegate;
use derive_getters::Getters;
use snafu::ensure;
use spinning_top::Spinlock;

use crate::{
    events::{EventKind, EventQueue, EventSender, DEFAULT_CAPACITY},
    graphics::{
        buffer::PixelBuffer,
        command::{Draw, DrawCommand, Style},
    },
    input::InputState,
    keyboard::{Key, Modifiers},
    mouse::MouseButton,
    prelude::*,
    window::WindowConfig,
};

/// What the back buffer holds right after a swap.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
pub enum FrameMode {
    /// A copy of the frame just presented, so drawing accumulates.
    #[default]
    Retain,
    /// The background color; every frame is drawn from scratch.
    Clear,
}

#[derive(Clone, Debug, Getters)]
pub struct CanvasConfig {
    size: Size,
    title: String,
    target_fps: u32,
    background: Color,
    frame_mode: FrameMode,
    queue_capacity: usize,
    auto_present: bool,
}

impl CanvasConfig {
    pub fn new(width: UCoordinate, height: UCoordinate) -> Self {
        Self {
            size: Size::new(width, height),
            title: "easel".to_owned(),
            target_fps: 60,
            background: Color::WHITE,
            frame_mode: FrameMode::Retain,
            queue_capacity: DEFAULT_CAPACITY,
            auto_present: true,
        }
    }
    pub fn set_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
    pub fn set_target_fps(mut self, target_fps: u32) -> Self {
        self.target_fps = target_fps;
        self
    }
    pub fn set_background(mut self, background: Color) -> Self {
        self.background = background;
        self
    }
    pub fn set_frame_mode(mut self, frame_mode: FrameMode) -> Self {
        self.frame_mode = frame_mode;
        self
    }
    pub fn set_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }
    /// With auto-present off, frames reach the window only after
    /// [`Canvas::present`].
    pub fn set_auto_present(mut self, auto_present: bool) -> Self {
        self.auto_present = auto_present;
        self
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            !self.size.is_empty(),
            InvalidConfigSnafu {
                reason: format!(
                    "canvas size {}x{} has no pixels",
                    self.size.width, self.size.height
                ),
            }
        );
        ensure!(
            self.target_fps > 0,
            InvalidConfigSnafu {
                reason: "target frame rate must be positive",
            }
        );
        Ok(())
    }
}

fn lock(buffer: &Mutex<PixelBuffer>) -> MutexGuard<'_, PixelBuffer> {
    buffer.lock().unwrap_or_else(PoisonError::into_inner)
}

fn pack_size(size: Size) -> u64 {
    u64::from(size.width) << 32 | u64::from(size.height)
}

fn unpack_size(packed: u64) -> Size {
    Size::new((packed >> 32) as UCoordinate, packed as UCoordinate)
}

fn pack_color(color: Color) -> u32 {
    u32::from_be_bytes([color.r, color.g, color.b, color.a])
}

fn unpack_color(packed: u32) -> Color {
    let [r, g, b, a] = packed.to_be_bytes();
    Color::rgba(r, g, b, a)
}

struct SharedCanvas {
    back: Mutex<PixelBuffer>,
    front: Mutex<PixelBuffer>,
    // Copies of the buffers' size and background, written while both locks
    // are held so readers never need a lock.
    size: AtomicU64,
    background: AtomicU32,
    title: String,
    target_fps: u32,
    frame_mode: FrameMode,
    frames: AtomicU64,
    auto_present: AtomicBool,
    present_requested: AtomicBool,
    visible: AtomicBool,
    input: Spinlock<InputState>,
    events: EventQueue,
}

/// Handle to the shared drawing surface. Clones refer to the same canvas.
#[derive(Clone)]
pub struct Canvas {
    shared: Arc<SharedCanvas>,
}

impl Canvas {
    pub fn new(config: CanvasConfig) -> Result<Self> {
        config.validate()?;
        let buffer = PixelBuffer::new(config.size, config.background);
        log::debug!(
            "Created {}x{} canvas \"{}\"",
            config.size.width,
            config.size.height,
            config.title
        );
        Ok(Self {
            shared: Arc::new(SharedCanvas {
                back: Mutex::new(buffer.clone()),
                front: Mutex::new(buffer),
                size: AtomicU64::new(pack_size(config.size)),
                background: AtomicU32::new(pack_color(config.background)),
                title: config.title,
                target_fps: config.target_fps,
                frame_mode: config.frame_mode,
                frames: AtomicU64::new(0),
                auto_present: AtomicBool::new(config.auto_present),
                present_requested: AtomicBool::new(false),
                visible: AtomicBool::new(false),
                input: Spinlock::new(InputState::default()),
                events: EventQueue::with_capacity(config.queue_capacity),
            }),
        })
    }

    /// Locks the back buffer for a batch of drawing calls. The scheduler
    /// cannot swap while the returned frame is alive, so everything drawn
    /// through it is presented together.
    ///
    /// Draw through the returned frame, not through this canvas: the
    /// drawing methods, [`Canvas::resize`], [`Canvas::set_background`] and
    /// [`Canvas::clear_to_background`] lock the back buffer again and
    /// deadlock if called on the same thread while the frame is alive. So
    /// does [`FrameScheduler::stop`](crate::scheduler::FrameScheduler::stop),
    /// which waits for a tick that is waiting for the frame. The size,
    /// background, input and event queries do not lock it.
    pub fn frame(&self) -> Frame<'_> {
        Frame {
            buffer: lock(&self.shared.back),
        }
    }

    delegate! {
        to self.frame() {
            pub fn draw(&self, command: DrawCommand) -> Result<()>;
            pub fn set_pixel(&self, x: ICoordinate, y: ICoordinate, color: Color) -> Result<()>;
            pub fn draw_line(&self, from: Point, to: Point, color: Color) -> Result<()>;
            pub fn draw_line_with_width(
                &self,
                from: Point,
                to: Point,
                color: Color,
                width: UCoordinate,
            ) -> Result<()>;
            pub fn draw_rect(
                &self,
                left: ICoordinate,
                top: ICoordinate,
                width: ICoordinate,
                height: ICoordinate,
                style: Style,
            ) -> Result<()>;
            pub fn fill_rect(
                &self,
                left: ICoordinate,
                top: ICoordinate,
                width: ICoordinate,
                height: ICoordinate,
                color: Color,
            ) -> Result<()>;
            pub fn draw_ellipse(
                &self,
                left: ICoordinate,
                top: ICoordinate,
                width: ICoordinate,
                height: ICoordinate,
                style: Style,
            ) -> Result<()>;
            pub fn draw_polygon(&self, vertices: &[Point], style: Style) -> Result<()>;
            pub fn draw_text(
                &self,
                text: &str,
                left: ICoordinate,
                baseline: ICoordinate,
                color: Color,
            ) -> Result<()>;
            pub fn draw_text_scaled(
                &self,
                text: &str,
                left: ICoordinate,
                baseline: ICoordinate,
                color: Color,
                scale: UCoordinate,
            ) -> Result<()>;
            pub fn draw_image(&self, origin: Point, image: Arc<PixelBuffer>) -> Result<()>;
            pub fn clear(&self, color: Color);
        }
    }

    pub fn clear_to_background(&self) {
        let mut back = self.frame();
        let background = back.background();
        back.clear(background);
    }

    pub fn size(&self) -> Size {
        unpack_size(self.shared.size.load(Ordering::Acquire))
    }

    pub fn width(&self) -> UCoordinate {
        self.size().width
    }

    pub fn height(&self) -> UCoordinate {
        self.size().height
    }

    pub fn title(&self) -> &str {
        &self.shared.title
    }

    pub fn target_fps(&self) -> u32 {
        self.shared.target_fps
    }

    pub fn frame_mode(&self) -> FrameMode {
        self.shared.frame_mode
    }

    pub fn background(&self) -> Color {
        unpack_color(self.shared.background.load(Ordering::Acquire))
    }

    /// Changes the color used by [`Canvas::clear_to_background`],
    /// [`FrameMode::Clear`] and newly exposed area after a resize. Pixels
    /// already drawn keep their color.
    pub fn set_background(&self, background: Color) {
        let mut back = lock(&self.shared.back);
        let mut front = lock(&self.shared.front);
        back.set_background(background);
        front.set_background(background);
        self.shared
            .background
            .store(pack_color(background), Ordering::Release);
    }

    /// Replaces both buffers with buffers of `size`, keeping the overlapping
    /// top-left region of each. The window follows on the next tick.
    pub fn resize(&self, size: Size) -> Result<()> {
        ensure!(
            !size.is_empty(),
            InvalidGeometrySnafu {
                reason: format!("canvas size {}x{} has no pixels", size.width, size.height),
            }
        );
        let mut back = lock(&self.shared.back);
        let mut front = lock(&self.shared.front);
        if back.size() == size {
            return Ok(());
        }
        *back = back.resized(size);
        *front = front.resized(size);
        self.shared.size.store(pack_size(size), Ordering::Release);
        log::debug!("Canvas resized to {}x{}", size.width, size.height);
        Ok(())
    }

    /// Asks the scheduler to show the back buffer at its next tick. Only
    /// needed when auto-present is off.
    pub fn present(&self) {
        self.shared.present_requested.store(true, Ordering::Release);
    }

    pub fn is_auto_present(&self) -> bool {
        self.shared.auto_present.load(Ordering::Acquire)
    }

    pub fn set_auto_present(&self, auto_present: bool) {
        log::debug!("Auto-present {}", if auto_present { "on" } else { "off" });
        self.shared.auto_present.store(auto_present, Ordering::Release);
    }

    /// How many frames have been swapped to the front so far.
    pub fn frame_count(&self) -> u64 {
        self.shared.frames.load(Ordering::Acquire)
    }

    /// Whether a window currently shows this canvas.
    pub fn is_visible(&self) -> bool {
        self.shared.visible.load(Ordering::Acquire)
    }

    /// A copy of the frame the window is showing.
    pub fn front_buffer(&self) -> PixelBuffer {
        lock(&self.shared.front).clone()
    }

    /// Writes the frame the window is showing to `path`; the extension picks
    /// the format.
    pub fn save_frame(&self, path: impl AsRef<Path>) -> Result<()> {
        self.front_buffer().save(path)
    }

    pub fn events(&self) -> &EventQueue {
        &self.shared.events
    }

    pub fn is_key_down(&self, key: Key) -> bool {
        self.shared.input.lock().is_key_down(key)
    }

    /// Presses of `key` since the previous call asking about the same key.
    pub fn key_presses_since_last_asked(&self, key: Key) -> u32 {
        self.shared.input.lock().take_key_presses(key)
    }

    /// Modifier keys reported with the latest key event.
    pub fn modifiers(&self) -> Modifiers {
        self.shared.input.lock().modifiers()
    }

    pub fn is_shift_down(&self) -> bool {
        self.modifiers().shift()
    }

    pub fn is_control_down(&self) -> bool {
        self.modifiers().control()
    }

    pub fn is_alt_down(&self) -> bool {
        self.modifiers().alt()
    }

    pub fn mouse_position(&self) -> Point {
        self.shared.input.lock().mouse_position()
    }

    pub fn is_mouse_button_down(&self, button: MouseButton) -> bool {
        self.shared.input.lock().is_mouse_button_down(button)
    }

    /// Presses of `button` since the previous call asking about the same
    /// button.
    pub fn mouse_presses_since_last_asked(&self, button: MouseButton) -> u32 {
        self.shared.input.lock().take_mouse_presses(button)
    }

    pub(crate) fn window_config(&self) -> WindowConfig {
        WindowConfig::new(self.size(), self.shared.title.clone())
    }

    pub(crate) fn event_sender(&self) -> EventSender {
        self.shared.events.sender()
    }

    pub(crate) fn record_input(&self, event: &EventKind) {
        self.shared.input.lock().apply(event);
    }

    pub(crate) fn set_visible(&self, visible: bool) {
        self.shared.visible.store(visible, Ordering::Release);
    }

    /// Whether the back buffer should be presented at this tick. Consumes a
    /// pending [`Canvas::present`] request.
    pub(crate) fn take_present_request(&self) -> bool {
        let requested = self.shared.present_requested.swap(false, Ordering::AcqRel);
        requested || self.is_auto_present()
    }

    /// Exchanges the buffer roles and prepares the new back buffer according
    /// to the frame mode. Returns the number of the frame now in front.
    pub(crate) fn swap(&self) -> u64 {
        let mut back = lock(&self.shared.back);
        let mut front = lock(&self.shared.front);
        mem::swap(&mut *back, &mut *front);
        match self.shared.frame_mode {
            FrameMode::Retain => back.copy_from(&front),
            FrameMode::Clear => {
                let background = back.background();
                back.fill(background);
            }
        }
        let frame = self.shared.frames.fetch_add(1, Ordering::AcqRel) + 1;
        log::trace!("Swapped in frame {}", frame);
        frame
    }

    /// Runs `f` on the front buffer. Drawing proceeds meanwhile; only a swap
    /// or resize waits.
    pub(crate) fn with_front<R>(&self, f: impl FnOnce(&PixelBuffer) -> R) -> R {
        f(&*lock(&self.shared.front))
    }
}

/// Exclusive access to the back buffer. See [`Canvas::frame`].
pub struct Frame<'a> {
    buffer: MutexGuard<'a, PixelBuffer>,
}

impl Frame<'_> {
    delegate! {
        to self.buffer {
            pub fn size(&self) -> Size;
            pub fn background(&self) -> Color;
            pub fn get(&self, x: ICoordinate, y: ICoordinate) -> Color;
        }
    }
}

impl Draw for Frame<'_> {
    fn draw(&mut self, command: DrawCommand) -> Result<()> {
        self.buffer.draw(command)
    }

    fn clear(&mut self, color: Color) {
        self.buffer.fill(color);
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{mpsc, Arc},
        thread,
        time::Duration,
    };

    use super::{Canvas, CanvasConfig, FrameMode};
    use crate::{
        events::EventKind,
        graphics::{
            buffer::PixelBuffer,
            command::{Draw, Style},
            Color, Point, Size,
        },
        keyboard::{Key, Modifiers},
        prelude::Error,
    };

    fn canvas(width: u32, height: u32) -> Canvas {
        Canvas::new(CanvasConfig::new(width, height)).unwrap()
    }

    #[test]
    fn swapped_line_is_in_front() {
        let canvas = canvas(10, 10);
        canvas.clear(Color::BLACK);
        canvas
            .draw_line(Point::new(0, 0), Point::new(9, 9), Color::WHITE)
            .unwrap();
        assert_eq!(canvas.front_buffer().get(5, 5), Color::WHITE);

        assert_eq!(canvas.swap(), 1);
        let front = canvas.front_buffer();
        for y in 0..10 {
            for x in 0..10 {
                let expected = if x == y { Color::WHITE } else { Color::BLACK };
                assert_eq!(front.get(x, y), expected, "pixel ({x}, {y})");
            }
        }
        assert_eq!(canvas.frame_count(), 1);
    }

    #[test]
    fn drawing_does_not_touch_front_until_swap() {
        let canvas = canvas(4, 4);
        canvas.fill_rect(0, 0, 4, 4, Color::RED).unwrap();
        assert!(canvas.front_buffer().as_rgba().chunks(4).all(|p| p == [255, 255, 255, 255]));
        canvas.swap();
        assert_eq!(canvas.front_buffer().get(3, 3), Color::RED);
    }

    #[test]
    fn retain_mode_keeps_drawing_after_swap() {
        let canvas = canvas(4, 4);
        canvas.set_pixel(1, 1, Color::BLUE).unwrap();
        canvas.swap();
        canvas.set_pixel(2, 2, Color::GREEN).unwrap();
        canvas.swap();
        let front = canvas.front_buffer();
        assert_eq!(front.get(1, 1), Color::BLUE);
        assert_eq!(front.get(2, 2), Color::GREEN);
    }

    #[test]
    fn clear_mode_starts_each_frame_blank() {
        let config = CanvasConfig::new(4, 4)
            .set_frame_mode(FrameMode::Clear)
            .set_background(Color::BLACK);
        let canvas = Canvas::new(config).unwrap();
        canvas.set_pixel(1, 1, Color::BLUE).unwrap();
        canvas.swap();
        assert_eq!(canvas.front_buffer().get(1, 1), Color::BLUE);
        assert_eq!(canvas.frame().get(1, 1), Color::BLACK);
        canvas.swap();
        assert_eq!(canvas.front_buffer().get(1, 1), Color::BLACK);
    }

    #[test]
    fn invalid_config_is_rejected() {
        assert!(matches!(
            Canvas::new(CanvasConfig::new(0, 10)),
            Err(Error::InvalidConfig { .. })
        ));
        assert!(matches!(
            Canvas::new(CanvasConfig::new(10, 10).set_target_fps(0)),
            Err(Error::InvalidConfig { .. })
        ));
    }

    #[test]
    fn config_defaults() {
        let config = CanvasConfig::new(3, 2);
        assert_eq!(*config.size(), Size::new(3, 2));
        assert_eq!(config.title(), "easel");
        assert_eq!(*config.target_fps(), 60);
        assert_eq!(*config.background(), Color::WHITE);
        assert_eq!(*config.frame_mode(), FrameMode::Retain);
        assert!(*config.auto_present());
    }

    #[test]
    fn invalid_geometry_leaves_buffer_untouched() {
        let canvas = canvas(4, 4);
        let result = canvas.draw_rect(0, 0, -1, 2, Style::fill(Color::RED));
        assert!(matches!(result, Err(Error::InvalidGeometry { .. })));
        let result = canvas.draw_polygon(&[Point::new(0, 0), Point::new(3, 3)], Style::fill(Color::RED));
        assert!(matches!(result, Err(Error::InvalidGeometry { .. })));
        assert_eq!(canvas.frame().get(0, 0), Color::WHITE);
    }

    #[test]
    fn resize_keeps_overlap_in_both_buffers() {
        let canvas = canvas(4, 4);
        canvas.set_pixel(1, 1, Color::RED).unwrap();
        canvas.swap();
        canvas.resize(Size::new(6, 2)).unwrap();
        assert_eq!(canvas.size(), Size::new(6, 2));
        let front = canvas.front_buffer();
        assert_eq!(front.size(), Size::new(6, 2));
        assert_eq!(front.get(1, 1), Color::RED);
        assert_eq!(front.get(5, 1), Color::WHITE);
        assert_eq!(canvas.frame().get(1, 1), Color::RED);
        assert!(canvas.resize(Size::new(0, 3)).is_err());
    }

    #[test]
    fn present_request_is_consumed_once() {
        let canvas = Canvas::new(CanvasConfig::new(2, 2).set_auto_present(false)).unwrap();
        assert!(!canvas.take_present_request());
        canvas.present();
        assert!(canvas.take_present_request());
        assert!(!canvas.take_present_request());
        canvas.set_auto_present(true);
        assert!(canvas.take_present_request());
    }

    #[test]
    fn frame_batches_drawing() {
        let canvas = canvas(8, 8);
        {
            let mut frame = canvas.frame();
            frame.clear(Color::BLACK);
            frame
                .draw_rect(1, 1, 3, 3, Style::stroke(Color::GREEN))
                .unwrap();
            assert_eq!(frame.size(), Size::new(8, 8));
        }
        canvas.swap();
        let front = canvas.front_buffer();
        assert_eq!(front.get(1, 1), Color::GREEN);
        assert_eq!(front.get(2, 2), Color::BLACK);
    }

    #[test]
    fn clones_share_the_surface_across_threads() {
        let canvas = canvas(4, 4);
        let other = canvas.clone();
        thread::spawn(move || other.fill_rect(0, 0, 2, 2, Color::RED).unwrap())
            .join()
            .unwrap();
        assert_eq!(canvas.frame().get(1, 1), Color::RED);
    }

    #[test]
    fn image_commands_composite_into_back_buffer() {
        let canvas = canvas(4, 4);
        let sprite = Arc::new(PixelBuffer::new(Size::new(2, 2), Color::BLUE));
        canvas.draw_image(Point::new(3, 3), sprite).unwrap();
        assert_eq!(canvas.frame().get(3, 3), Color::BLUE);
        assert_eq!(canvas.frame().get(2, 2), Color::WHITE);
    }

    #[test]
    fn input_queries_follow_recorded_events() {
        let canvas = canvas(4, 4);
        canvas.record_input(&EventKind::KeyDown {
            key: Key::UP,
            modifiers: Modifiers::empty(),
        });
        canvas.record_input(&EventKind::MouseMove {
            position: Point::new(2, 3),
        });
        assert!(canvas.is_key_down(Key::UP));
        assert_eq!(canvas.key_presses_since_last_asked(Key::UP), 1);
        assert_eq!(canvas.key_presses_since_last_asked(Key::UP), 0);
        assert_eq!(canvas.mouse_position(), Point::new(2, 3));
    }

    #[test]
    fn save_frame_writes_front_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let canvas = canvas(3, 3);
        canvas.fill_rect(0, 0, 3, 3, Color::RED).unwrap();
        canvas.save_frame(&path).unwrap();
        assert_eq!(PixelBuffer::load(&path).unwrap().get(1, 1), Color::WHITE);
        canvas.swap();
        canvas.save_frame(&path).unwrap();
        assert_eq!(PixelBuffer::load(&path).unwrap().get(1, 1), Color::RED);
    }

    #[test]
    fn queries_answer_while_a_frame_is_open() {
        let canvas = canvas(5, 3);
        canvas.set_background(Color::BLACK);
        let frame = canvas.frame();
        let (tx, rx) = mpsc::channel();
        let other = canvas.clone();
        thread::spawn(move || {
            let answers = (
                other.size(),
                other.width(),
                other.background(),
                other.modifiers(),
                other.is_visible(),
            );
            let _ = tx.send(answers);
        });
        let answers = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        drop(frame);
        assert_eq!(
            answers,
            (Size::new(5, 3), 5, Color::BLACK, Modifiers::empty(), false)
        );
    }

    #[test]
    fn size_and_background_follow_changes() {
        let canvas = canvas(2, 2);
        canvas.resize(Size::new(7, 1)).unwrap();
        canvas.set_background(Color::rgba(1, 2, 3, 4));
        assert_eq!(canvas.size(), Size::new(7, 1));
        assert_eq!(canvas.height(), 1);
        assert_eq!(canvas.background(), Color::rgba(1, 2, 3, 4));
        assert_eq!(canvas.frame().background(), Color::rgba(1, 2, 3, 4));
    }

    #[test]
    fn modifier_queries_follow_key_events() {
        let canvas = canvas(2, 2);
        assert!(!canvas.is_shift_down());
        canvas.record_input(&EventKind::KeyDown {
            key: Key::A,
            modifiers: Modifiers::L_SHIFT | Modifiers::R_CONTROL,
        });
        assert!(canvas.is_shift_down());
        assert!(canvas.is_control_down());
        assert!(!canvas.is_alt_down());
        canvas.record_input(&EventKind::KeyUp {
            key: Key::A,
            modifiers: Modifiers::L_ALT,
        });
        assert_eq!(canvas.modifiers(), Modifiers::L_ALT);
        assert!(!canvas.is_shift_down());
        assert!(canvas.is_alt_down());
    }
}
