//! A small immediate-mode drawing surface for learning programs.
//!
//! User code draws into a [`Canvas`](canvas::Canvas) from its own thread while a
//! [`FrameScheduler`](scheduler::FrameScheduler) repaints a native window at a
//! fixed cadence on a dedicated thread. Input coming back from the window is
//! funnelled through an [`EventQueue`](events::EventQueue) that the user polls.

pub mod canvas;
pub mod events;
pub mod graphics;
pub mod input;
pub mod keyboard;
pub mod logger;
pub mod mouse;
pub mod scheduler;
pub(crate) mod timer;
pub mod window;

pub use canvas::{Canvas, CanvasConfig, Frame, FrameMode};
pub use events::{EventKind, EventQueue, EventSender, InputEvent};
pub use graphics::{
    buffer::PixelBuffer,
    command::{Draw, DrawCommand, Style, MAX_LINE_WIDTH},
    Color, Point, Rectangle, Size,
};
pub use input::InputState;
pub use keyboard::{Key, Modifiers};
pub use mouse::{MouseButton, MouseButtons};
pub use scheduler::{FrameScheduler, FrameStats, SchedulerState, StopHandle};
pub use window::{
    headless::{HeadlessProbe, HeadlessWindowSystem},
    WindowConfig, WindowSystem, WindowSystemError,
};

pub mod prelude {
    pub use crate::graphics::{Color, ICoordinate, Point, Size, UCoordinate};

    use snafu::Snafu;

    pub type Result<T> = ::core::result::Result<T, Error>;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(crate)))]
    pub enum Error {
        #[snafu(display("Pixel ({x}, {y}) lies outside the canvas"))]
        OutOfBounds { x: ICoordinate, y: ICoordinate },
        #[snafu(display("Invalid geometry: {reason}"))]
        InvalidGeometry { reason: String },
        #[snafu(display("Invalid configuration: {reason}"))]
        InvalidConfig { reason: String },
        #[snafu(display("Window system failure: {message}"))]
        WindowSystem { message: String },
        #[snafu(display("Unsupported image format for {}", path.display()))]
        UnsupportedImageFormat { path: std::path::PathBuf },
        #[snafu(display("Image codec error: {source}"))]
        Image { source: image::ImageError },
        #[snafu(display("Unable to spawn the scheduler thread: {source}"))]
        SpawnScheduler { source: std::io::Error },
        #[snafu(display("Scheduler is {state:?}"))]
        SchedulerState {
            state: crate::scheduler::SchedulerState,
        },
    }
}
