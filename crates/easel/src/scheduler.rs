//! The repaint loop.
//!
//! A [`FrameScheduler`] owns one dedicated thread that builds the window
//! system, creates the window and then ticks at the target rate until it is
//! stopped, the user closes the window, or the window system fails. Each
//! tick:
//!
//! 1. leaves the loop if a stop was requested,
//! 2. swaps the canvas buffers when auto-present is on or a present was
//!    requested,
//! 3. blits the front buffer,
//! 4. drains native input into the canvas input state and event queue,
//! 5. sleeps for what is left of the frame budget.
//!
//! The sleep wakes early when the scheduler is stopped. Pacing is best
//! effort: a late frame is counted in [`FrameStats`] and the next tick
//! starts right away, with no attempt to catch up.
//!
//! A panic inside the window system is caught on the scheduler thread and
//! handled like any other window system failure.

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::{mpsc, Arc, Condvar, Mutex, MutexGuard, PoisonError},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use derive_getters::Getters;
use snafu::ensure;
use spinning_top::Spinlock;

use crate::{
    canvas::Canvas,
    events::{EventKind, EventSender},
    prelude::*,
    timer::FramePacer,
    window::{PanickedSnafu, WindowSystem, WindowSystemError},
};

const THREAD_NAME: &str = "easel-scheduler";

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Getters)]
pub struct FrameStats {
    /// Frames swapped to the front.
    frames: u64,
    ticks: u64,
    missed_deadlines: u64,
}

struct Control {
    state: Mutex<SchedulerState>,
    changed: Condvar,
    stats: Spinlock<FrameStats>,
    last_error: Spinlock<Option<String>>,
}

impl Control {
    fn new() -> Self {
        Self {
            state: Mutex::new(SchedulerState::Idle),
            changed: Condvar::new(),
            stats: Spinlock::new(FrameStats::default()),
            last_error: Spinlock::new(None),
        }
    }

    fn locked(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> SchedulerState {
        *self.locked()
    }

    fn set_state(&self, state: SchedulerState) {
        *self.locked() = state;
        self.changed.notify_all();
    }

    fn request_stop(&self) {
        let mut state = self.locked();
        match *state {
            SchedulerState::Idle => *state = SchedulerState::Stopped,
            SchedulerState::Running => {
                log::info!("Stopping frame scheduler");
                *state = SchedulerState::Stopping;
            }
            SchedulerState::Stopping | SchedulerState::Stopped => return,
        }
        drop(state);
        self.changed.notify_all();
    }

    /// Sleeps up to `duration` unless the scheduler leaves `Running`.
    fn sleep(&self, duration: Duration) {
        let state = self.locked();
        let _ = self
            .changed
            .wait_timeout_while(state, duration, |state| *state == SchedulerState::Running)
            .unwrap_or_else(PoisonError::into_inner);
    }

    fn wait_until_stopped(&self, timeout: Duration) -> bool {
        let state = self.locked();
        let (state, _) = self
            .changed
            .wait_timeout_while(state, timeout, |state| *state != SchedulerState::Stopped)
            .unwrap_or_else(PoisonError::into_inner);
        *state == SchedulerState::Stopped
    }
}

/// Requests a stop from anywhere, including threads that do not own the
/// scheduler.
#[derive(Clone)]
pub struct StopHandle {
    control: Arc<Control>,
}

impl StopHandle {
    /// Asks the loop to finish its current tick and exit. Returns at once;
    /// [`FrameScheduler::stop`] also waits for the shutdown.
    pub fn stop(&self) {
        self.control.request_stop();
    }

    pub fn state(&self) -> SchedulerState {
        self.control.state()
    }
}

/// Drives a [`Canvas`] onto a window. See the module docs for the tick
/// order. Dropping a running scheduler stops it.
pub struct FrameScheduler {
    canvas: Canvas,
    control: Arc<Control>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl FrameScheduler {
    pub fn new(canvas: &Canvas) -> Self {
        Self {
            canvas: canvas.clone(),
            control: Arc::new(Control::new()),
            thread: Mutex::new(None),
        }
    }

    /// Leaves `Idle` and starts ticking at `target_fps`.
    ///
    /// `backend` runs on the scheduler thread, which then owns the window
    /// system for its whole life. Returns once the window exists, or with the
    /// window creation error, in which case the scheduler is `Stopped` and a
    /// [`EventKind::BackendFailed`] event is queued.
    pub fn start<W, F>(&self, target_fps: u32, backend: F) -> Result<()>
    where
        W: WindowSystem,
        F: FnOnce() -> W + Send + 'static,
    {
        ensure!(
            target_fps > 0,
            InvalidConfigSnafu {
                reason: "target frame rate must be positive",
            }
        );
        {
            let mut state = self.control.locked();
            ensure!(
                *state == SchedulerState::Idle,
                SchedulerStateSnafu { state: *state }
            );
            *state = SchedulerState::Running;
        }

        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let canvas = self.canvas.clone();
        let control = self.control.clone();
        // The slot stays locked until the handle is in it, so a concurrent
        // `stop` always finds the thread to join.
        let mut slot = self.thread_slot();
        let spawned = thread::Builder::new()
            .name(THREAD_NAME.to_owned())
            .spawn(move || run(canvas, control, target_fps, backend, ready_tx));
        match spawned {
            Ok(handle) => *slot = Some(handle),
            Err(source) => {
                drop(slot);
                self.control.set_state(SchedulerState::Stopped);
                return Err(Error::SpawnScheduler { source });
            }
        }
        drop(slot);

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(message)) => {
                self.join();
                WindowSystemSnafu { message }.fail()
            }
            Err(_) => {
                self.join();
                WindowSystemSnafu {
                    message: "scheduler thread exited before creating the window",
                }
                .fail()
            }
        }
    }

    /// Stops the loop and waits for the window to be released. Safe to call
    /// at any time, any number of times.
    pub fn stop(&self) {
        self.control.request_stop();
        self.join();
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            control: self.control.clone(),
        }
    }

    /// Blocks until the scheduler is `Stopped`, for example after the user
    /// closed the window. Returns false on timeout.
    pub fn wait_until_stopped(&self, timeout: Duration) -> bool {
        self.control.wait_until_stopped(timeout)
    }

    pub fn state(&self) -> SchedulerState {
        self.control.state()
    }

    pub fn stats(&self) -> FrameStats {
        *self.control.stats.lock()
    }

    /// Why the window system gave up, if it did.
    pub fn last_error(&self) -> Option<String> {
        self.control.last_error.lock().clone()
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    fn thread_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.thread.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn join(&self) {
        let handle = self.thread_slot().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("Frame scheduler thread panicked");
                self.canvas.set_visible(false);
                self.control.set_state(SchedulerState::Stopped);
            }
        }
    }
}

impl Drop for FrameScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run<W, F>(
    canvas: Canvas,
    control: Arc<Control>,
    target_fps: u32,
    backend: F,
    ready: mpsc::SyncSender<core::result::Result<(), String>>,
) where
    W: WindowSystem,
    F: FnOnce() -> W,
{
    let events = canvas.event_sender();
    let config = canvas.window_config();
    let opened = catch_panic(|| {
        let mut system = backend();
        let handle = system.create_window(&config)?;
        Ok((system, handle))
    });
    let (mut system, handle) = match opened {
        Ok(opened) => opened,
        Err(error) => {
            let message = error.to_string();
            fail(&control, &events, &error);
            let _ = ready.send(Err(message));
            return;
        }
    };
    log::info!(
        "Opened {}x{} window \"{}\" at {} fps",
        config.size().width,
        config.size().height,
        config.title(),
        target_fps
    );
    canvas.set_visible(true);
    let _ = ready.send(Ok(()));

    let outcome = catch_panic(|| {
        Ticker {
            canvas: &canvas,
            control: &control,
            events: &events,
            system: &mut system,
            handle: &handle,
            window_size: *config.size(),
        }
        .run(FramePacer::new(target_fps))
    });

    let destroyed = catch_panic(|| {
        system.destroy_window(handle);
        Ok(())
    });
    if let Err(error) = destroyed {
        log::error!("Unable to release the window: {}", error);
    }
    canvas.set_visible(false);
    if let Err(error) = outcome {
        fail(&control, &events, &error);
    } else {
        log::info!("Frame scheduler stopped");
        control.set_state(SchedulerState::Stopped);
    }
}

/// Runs `f`, turning a panic into [`WindowSystemError::Panicked`].
fn catch_panic<T>(
    f: impl FnOnce() -> core::result::Result<T, WindowSystemError>,
) -> core::result::Result<T, WindowSystemError> {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        PanickedSnafu {
            message: panic_message(payload.as_ref()),
        }
        .fail()
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}

fn fail(control: &Control, events: &EventSender, error: &WindowSystemError) {
    log::error!("Window system failed: {}", error);
    let message = error.to_string();
    *control.last_error.lock() = Some(message.clone());
    events.send(EventKind::BackendFailed { message });
    control.set_state(SchedulerState::Stopped);
}

struct Ticker<'a, W: WindowSystem> {
    canvas: &'a Canvas,
    control: &'a Control,
    events: &'a EventSender,
    system: &'a mut W,
    handle: &'a W::Handle,
    window_size: Size,
}

impl<W: WindowSystem> Ticker<'_, W> {
    fn run(&mut self, mut pacer: FramePacer) -> core::result::Result<(), WindowSystemError> {
        loop {
            let started = Instant::now();
            if self.control.state() != SchedulerState::Running {
                return Ok(());
            }
            self.tick()?;

            let rest = pacer.remaining(started.elapsed());
            {
                let mut stats = self.control.stats.lock();
                stats.ticks += 1;
                stats.missed_deadlines = pacer.missed();
            }
            if !rest.is_zero() {
                self.control.sleep(rest);
            }
        }
    }

    fn tick(&mut self) -> core::result::Result<(), WindowSystemError> {
        if self.canvas.take_present_request() {
            let frame = self.canvas.swap();
            self.control.stats.lock().frames = frame;
        }

        let size = self.canvas.size();
        if size != self.window_size {
            log::debug!("Resizing window to {}x{}", size.width, size.height);
            self.system.resize_window(self.handle, size)?;
            self.window_size = size;
        }

        let (system, handle) = (&mut *self.system, self.handle);
        self.canvas.with_front(|front| system.blit(handle, front))?;

        for event in self.system.poll_native_events(self.handle)? {
            self.canvas.record_input(&event);
            match &event {
                EventKind::Resize { size } if !size.is_empty() => {
                    self.window_size = *size;
                    if let Err(error) = self.canvas.resize(*size) {
                        log::warn!("Ignoring window resize: {}", error);
                    }
                }
                EventKind::CloseRequested => self.control.request_stop(),
                _ => {}
            }
            self.events.send(event);
        }
        log::trace!("Tick done");
        Ok(())
    }
}
