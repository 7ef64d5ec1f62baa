//! A window system without a screen.
//!
//! Frames are kept in memory and input is injected through a
//! [`HeadlessProbe`], which makes the scheduler drivable from tests, CI
//! machines and the demo binary.

use std::{
    collections::VecDeque,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use super::{BlitSnafu, CreateWindowSnafu, WindowConfig, WindowSystem, WindowSystemError};
use crate::{events::EventKind, graphics::buffer::PixelBuffer, prelude::Size};

#[derive(Default)]
struct ProbeState {
    window: Option<WindowConfig>,
    destroyed: bool,
    pending: VecDeque<EventKind>,
    last_frame: Option<PixelBuffer>,
    blits: u64,
    fail_create: Option<String>,
    fail_blit: Option<String>,
}

/// Test-side view of a [`HeadlessWindowSystem`]. Clones share the same
/// window.
#[derive(Clone, Default)]
pub struct HeadlessProbe {
    state: Arc<Mutex<ProbeState>>,
    blitted: Arc<Condvar>,
}

impl HeadlessProbe {
    fn locked(&self) -> MutexGuard<'_, ProbeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a native event for the next poll.
    pub fn send(&self, event: EventKind) {
        self.locked().pending.push_back(event);
    }

    /// Queues several events so that a single poll returns all of them.
    pub fn send_all(&self, events: impl IntoIterator<Item = EventKind>) {
        self.locked().pending.extend(events);
    }

    /// What a user clicking the close button would produce.
    pub fn request_close(&self) {
        self.send(EventKind::CloseRequested);
    }

    /// What a user dragging the window border would produce.
    pub fn resize(&self, size: Size) {
        let mut state = self.locked();
        if let Some(window) = state.window.as_mut() {
            window.size = size;
        }
        state.pending.push_back(EventKind::Resize { size });
    }

    pub fn fail_create(&self, message: impl Into<String>) {
        self.locked().fail_create = Some(message.into());
    }

    /// Makes every following blit fail.
    pub fn fail_blits(&self, message: impl Into<String>) {
        self.locked().fail_blit = Some(message.into());
    }

    pub fn window(&self) -> Option<WindowConfig> {
        self.locked().window.clone()
    }

    pub fn is_destroyed(&self) -> bool {
        self.locked().destroyed
    }

    pub fn blit_count(&self) -> u64 {
        self.locked().blits
    }

    /// The most recently presented frame.
    pub fn last_frame(&self) -> Option<PixelBuffer> {
        self.locked().last_frame.clone()
    }

    /// Blocks until at least `count` frames were presented in total. Returns
    /// false on timeout.
    pub fn wait_for_blits(&self, count: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.locked();
        while state.blits < count {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = self
                .blitted
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}

pub struct HeadlessWindow {
    id: u64,
}

impl HeadlessWindow {
    pub fn id(&self) -> u64 {
        self.id
    }
}

#[derive(Default)]
pub struct HeadlessWindowSystem {
    probe: HeadlessProbe,
    next_id: u64,
}

impl HeadlessWindowSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_probe(probe: HeadlessProbe) -> Self {
        Self { probe, next_id: 0 }
    }

    pub fn probe(&self) -> HeadlessProbe {
        self.probe.clone()
    }
}

impl WindowSystem for HeadlessWindowSystem {
    type Handle = HeadlessWindow;

    fn create_window(&mut self, config: &WindowConfig) -> Result<HeadlessWindow, WindowSystemError> {
        let mut state = self.probe.locked();
        if let Some(message) = state.fail_create.take() {
            return CreateWindowSnafu { message }.fail();
        }
        state.window = Some(config.clone());
        state.destroyed = false;
        self.next_id += 1;
        log::debug!(
            "Headless window #{} \"{}\" is {}x{}",
            self.next_id,
            config.title(),
            config.size().width,
            config.size().height
        );
        Ok(HeadlessWindow { id: self.next_id })
    }

    fn blit(&mut self, _handle: &HeadlessWindow, frame: &PixelBuffer) -> Result<(), WindowSystemError> {
        let mut state = self.probe.locked();
        if let Some(message) = state.fail_blit.clone() {
            return BlitSnafu { message }.fail();
        }
        state.last_frame = Some(frame.clone());
        state.blits += 1;
        drop(state);
        self.probe.blitted.notify_all();
        Ok(())
    }

    fn poll_native_events(&mut self, _handle: &HeadlessWindow) -> Result<Vec<EventKind>, WindowSystemError> {
        Ok(self.probe.locked().pending.drain(..).collect())
    }

    fn resize_window(&mut self, _handle: &HeadlessWindow, size: Size) -> Result<(), WindowSystemError> {
        if let Some(window) = self.probe.locked().window.as_mut() {
            window.size = size;
        }
        Ok(())
    }

    fn destroy_window(&mut self, handle: HeadlessWindow) {
        log::debug!("Headless window #{} destroyed", handle.id);
        self.probe.locked().destroyed = true;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::HeadlessWindowSystem;
    use crate::{
        events::EventKind,
        graphics::{buffer::PixelBuffer, Color, Size},
        window::{WindowConfig, WindowSystem, WindowSystemError},
    };

    #[test]
    fn probe_sees_what_the_backend_does() {
        let mut system = HeadlessWindowSystem::new();
        let probe = system.probe();
        let handle = system
            .create_window(&WindowConfig::new(Size::new(3, 2), "probe"))
            .unwrap();
        assert_eq!(probe.window().unwrap().title(), "probe");

        let frame = PixelBuffer::new(Size::new(3, 2), Color::RED);
        system.blit(&handle, &frame).unwrap();
        assert_eq!(probe.blit_count(), 1);
        assert!(probe.wait_for_blits(1, Duration::from_millis(1)));
        assert_eq!(probe.last_frame().unwrap().get(2, 1), Color::RED);

        probe.request_close();
        assert_eq!(
            system.poll_native_events(&handle).unwrap(),
            vec![EventKind::CloseRequested]
        );
        assert!(system.poll_native_events(&handle).unwrap().is_empty());

        system.destroy_window(handle);
        assert!(probe.is_destroyed());
    }

    #[test]
    fn injected_failures_surface_as_errors() {
        let mut system = HeadlessWindowSystem::new();
        let probe = system.probe();
        probe.fail_create("no display");
        assert!(matches!(
            system.create_window(&WindowConfig::new(Size::new(1, 1), "x")),
            Err(WindowSystemError::CreateWindow { .. })
        ));

        let handle = system
            .create_window(&WindowConfig::new(Size::new(1, 1), "x"))
            .unwrap();
        probe.fail_blits("lost surface");
        let frame = PixelBuffer::new(Size::new(1, 1), Color::RED);
        assert!(matches!(
            system.blit(&handle, &frame),
            Err(WindowSystemError::Blit { .. })
        ));
        assert_eq!(probe.blit_count(), 0);
    }
}
