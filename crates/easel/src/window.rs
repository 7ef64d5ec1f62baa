//! The native window collaborator.
//!
//! Everything here runs on the scheduler thread: the backend is constructed
//! there, and no other thread ever calls into it. Toolkits that insist on a
//! single GUI thread are therefore satisfied without further work.

pub mod headless;

use derive_getters::Getters;
use snafu::Snafu;

use crate::{events::EventKind, graphics::buffer::PixelBuffer, prelude::Size};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum WindowSystemError {
    #[snafu(display("Unable to create window: {message}"))]
    CreateWindow { message: String },
    #[snafu(display("Unable to present frame: {message}"))]
    Blit { message: String },
    #[snafu(display("Unable to resize window: {message}"))]
    ResizeWindow { message: String },
    #[snafu(display("Native event source failed: {message}"))]
    NativeEvents { message: String },
    #[snafu(display("Window system panicked: {message}"))]
    Panicked { message: String },
}

/// What the window should look like when it is created.
#[derive(Clone, PartialEq, Eq, Debug, Getters)]
pub struct WindowConfig {
    size: Size,
    title: String,
}

impl WindowConfig {
    pub fn new(size: Size, title: impl Into<String>) -> Self {
        Self {
            size,
            title: title.into(),
        }
    }
}

/// A native windowing toolkit, seen through the four calls the scheduler
/// needs.
pub trait WindowSystem {
    type Handle;

    fn create_window(&mut self, config: &WindowConfig)
        -> Result<Self::Handle, WindowSystemError>;

    /// Shows `frame`. The frame is the front buffer and stays untouched for
    /// the duration of the call.
    fn blit(&mut self, handle: &Self::Handle, frame: &PixelBuffer)
        -> Result<(), WindowSystemError>;

    /// Input collected since the last call, oldest first.
    fn poll_native_events(
        &mut self,
        handle: &Self::Handle,
    ) -> Result<Vec<EventKind>, WindowSystemError>;

    /// Follows a canvas resized from user code. Backends whose windows adapt
    /// to the frame they are given can keep the default.
    fn resize_window(&mut self, _handle: &Self::Handle, _size: Size) -> Result<(), WindowSystemError> {
        Ok(())
    }

    fn destroy_window(&mut self, handle: Self::Handle);
}
