//! Input flowing from the window system back to user code.
//!
//! Producers (the scheduler thread, or a toolkit callback thread holding an
//! [`EventSender`]) push; the user thread polls. The queue is bounded. When
//! it is full the oldest *droppable* event is discarded to make room
//! (drop-oldest), so a stalled consumer sees the most recent input.
//! [`EventKind::is_priority`] events are never discarded: they displace a
//! droppable event instead, and only when none is left may the queue grow
//! past its capacity. A queued [`EventKind::Resize`] is superseded by a newer
//! one, since only the latest size matters; this keeps a burst of resizes
//! from growing the queue.

use std::{
    collections::VecDeque,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use crate::{
    keyboard::{Key, Modifiers},
    mouse::MouseButton,
    prelude::*,
};

pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum EventKind {
    KeyDown { key: Key, modifiers: Modifiers },
    KeyUp { key: Key, modifiers: Modifiers },
    MouseMove { position: Point },
    MouseButton {
        button: MouseButton,
        pressed: bool,
        position: Point,
    },
    Resize { size: Size },
    CloseRequested,
    /// The window system failed and the scheduler shut down. Always the
    /// last event of a run.
    BackendFailed { message: String },
}

impl EventKind {
    /// Whether the queue must deliver this event even under overflow.
    pub fn is_priority(&self) -> bool {
        matches!(
            self,
            EventKind::Resize { .. } | EventKind::CloseRequested | EventKind::BackendFailed { .. }
        )
    }
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct InputEvent {
    pub timestamp: Instant,
    pub kind: EventKind,
}

impl InputEvent {
    pub fn new(kind: EventKind) -> Self {
        Self::at(Instant::now(), kind)
    }
    pub fn at(timestamp: Instant, kind: EventKind) -> Self {
        Self { timestamp, kind }
    }
}

struct QueueState {
    items: VecDeque<InputEvent>,
    dropped: u64,
    overflowed: bool,
}

struct SharedState {
    state: Mutex<QueueState>,
    available: Condvar,
    capacity: usize,
}

impl SharedState {
    fn locked(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, event: InputEvent) -> Option<InputEvent> {
        let mut state = self.locked();
        let superseded = match event.kind {
            EventKind::Resize { .. } => state
                .items
                .iter()
                .position(|e| matches!(e.kind, EventKind::Resize { .. })),
            _ => None,
        };
        let displaced = if let Some(stale) = superseded {
            let displaced = state.items.remove(stale);
            state.items.push_back(event);
            log::trace!("Superseded a queued resize");
            displaced
        } else if state.items.len() < self.capacity {
            state.items.push_back(event);
            None
        } else if let Some(oldest) = state.items.iter().position(|e| !e.kind.is_priority()) {
            let displaced = state.items.remove(oldest);
            state.items.push_back(event);
            displaced
        } else if event.kind.is_priority() {
            state.items.push_back(event);
            None
        } else {
            Some(event)
        };
        if displaced.is_some() {
            state.dropped += 1;
        }
        if displaced.is_some() && superseded.is_none() {
            if !state.overflowed {
                state.overflowed = true;
                log::warn!(
                    "Event queue overflowed its capacity of {}; dropping oldest input",
                    self.capacity
                );
            } else {
                log::debug!("Event queue dropped {} events so far", state.dropped);
            }
        }
        drop(state);
        self.available.notify_one();
        displaced
    }
}

/// Bounded, thread-safe FIFO of [`InputEvent`]s. See the module docs for the
/// overflow policy.
pub struct EventQueue {
    shared: Arc<SharedState>,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl EventQueue {
    /// A queue holding up to `capacity` droppable events. Zero is promoted
    /// to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            shared: Arc::new(SharedState {
                state: Mutex::new(QueueState {
                    items: VecDeque::with_capacity(capacity),
                    dropped: 0,
                    overflowed: false,
                }),
                available: Condvar::new(),
                capacity,
            }),
        }
    }

    /// A handle for producers on other threads.
    pub fn sender(&self) -> EventSender {
        EventSender {
            shared: self.shared.clone(),
        }
    }

    /// Appends `event` without blocking. Returns the event that was
    /// discarded to respect the capacity or superseded by a newer resize, if
    /// any; that may be `event` itself when only priority events are queued.
    pub fn push(&self, event: InputEvent) -> Option<InputEvent> {
        self.shared.push(event)
    }

    /// Removes and returns the oldest event, or `None` if there is none.
    pub fn poll(&self) -> Option<InputEvent> {
        self.shared.locked().items.pop_front()
    }

    /// Like [`EventQueue::poll`], but waits up to `timeout` for an event to
    /// arrive.
    pub fn poll_timeout(&self, timeout: Duration) -> Option<InputEvent> {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.locked();
        loop {
            if let Some(event) = state.items.pop_front() {
                return Some(event);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            state = self
                .shared
                .available
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Removes every queued event, oldest first.
    pub fn drain(&self) -> Vec<InputEvent> {
        self.shared.locked().items.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.shared.locked().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// How many events overflow or a newer resize has discarded so far.
    pub fn dropped_count(&self) -> u64 {
        self.shared.locked().dropped
    }
}

/// Producer side of an [`EventQueue`].
#[derive(Clone)]
pub struct EventSender {
    shared: Arc<SharedState>,
}

impl EventSender {
    pub fn push(&self, event: InputEvent) -> Option<InputEvent> {
        self.shared.push(event)
    }

    pub fn send(&self, kind: EventKind) -> Option<InputEvent> {
        self.push(InputEvent::new(kind))
    }
}

#[cfg(test)]
mod tests {
    use std::{
        thread,
        time::{Duration, Instant},
    };

    use super::{EventKind, EventQueue, InputEvent};
    use crate::graphics::{Point, Size};

    fn moved(x: i32) -> InputEvent {
        InputEvent::new(EventKind::MouseMove {
            position: Point::new(x, 0),
        })
    }

    fn kinds(queue: &EventQueue) -> Vec<EventKind> {
        queue.drain().into_iter().map(|e| e.kind).collect()
    }

    #[test]
    fn events_come_out_in_push_order() {
        let queue = EventQueue::with_capacity(8);
        queue.push(moved(1));
        queue.push(InputEvent::new(EventKind::CloseRequested));
        queue.push(moved(3));
        assert_eq!(queue.poll().map(|e| e.kind), Some(moved(1).kind));
        assert_eq!(queue.poll().map(|e| e.kind), Some(EventKind::CloseRequested));
        assert_eq!(queue.poll().map(|e| e.kind), Some(moved(3).kind));
        assert_eq!(queue.poll(), None);
    }

    #[test]
    fn overflow_drops_oldest_droppable() {
        let queue = EventQueue::with_capacity(3);
        for x in 0..4 {
            queue.push(moved(x));
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dropped_count(), 1);
        assert_eq!(
            kinds(&queue),
            vec![moved(1).kind, moved(2).kind, moved(3).kind]
        );
    }

    #[test]
    fn push_reports_displaced_event() {
        let queue = EventQueue::with_capacity(1);
        assert_eq!(queue.push(moved(0)), None);
        let displaced = queue.push(moved(1));
        assert_eq!(displaced.map(|e| e.kind), Some(moved(0).kind));
    }

    #[test]
    fn close_request_survives_overflow() {
        let queue = EventQueue::with_capacity(2);
        queue.push(InputEvent::new(EventKind::CloseRequested));
        for x in 0..10 {
            queue.push(moved(x));
        }
        let drained = kinds(&queue);
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0], EventKind::CloseRequested);
        assert_eq!(drained[1], moved(9).kind);
    }

    #[test]
    fn priority_event_displaces_droppable_when_full() {
        let queue = EventQueue::with_capacity(2);
        queue.push(moved(0));
        queue.push(moved(1));
        let resize = EventKind::Resize {
            size: Size::new(4, 4),
        };
        let displaced = queue.push(InputEvent::new(resize.clone()));
        assert_eq!(displaced.map(|e| e.kind), Some(moved(0).kind));
        assert_eq!(kinds(&queue), vec![moved(1).kind, resize]);
    }

    #[test]
    fn priority_events_exceed_capacity_rather_than_drop() {
        let queue = EventQueue::with_capacity(1);
        queue.push(InputEvent::new(EventKind::CloseRequested));
        assert_eq!(
            queue.push(InputEvent::new(EventKind::CloseRequested)),
            None
        );
        let rejected = queue.push(moved(5));
        assert_eq!(rejected.map(|e| e.kind), Some(moved(5).kind));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn zero_capacity_is_promoted_to_one() {
        let queue = EventQueue::with_capacity(0);
        assert_eq!(queue.capacity(), 1);
        queue.push(moved(0));
        queue.push(moved(1));
        assert_eq!(kinds(&queue), vec![moved(1).kind]);
    }

    #[test]
    fn poll_timeout_gives_up() {
        let queue = EventQueue::with_capacity(4);
        let started = Instant::now();
        assert_eq!(queue.poll_timeout(Duration::from_millis(20)), None);
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn poll_timeout_wakes_on_push_from_other_thread() {
        let queue = EventQueue::with_capacity(4);
        let sender = queue.sender();
        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            sender.send(EventKind::CloseRequested);
        });
        let event = queue.poll_timeout(Duration::from_secs(5));
        producer.join().unwrap();
        assert_eq!(event.map(|e| e.kind), Some(EventKind::CloseRequested));
    }

    #[test]
    fn single_producer_order_is_preserved_across_threads() {
        let queue = EventQueue::with_capacity(1024);
        let sender = queue.sender();
        let producer = thread::spawn(move || {
            for x in 0..1000 {
                sender.push(moved(x));
            }
        });
        let mut seen = Vec::new();
        while seen.len() < 1000 {
            if let Some(event) = queue.poll_timeout(Duration::from_secs(5)) {
                if let EventKind::MouseMove { position } = event.kind {
                    seen.push(position.x);
                }
            } else {
                break;
            }
        }
        producer.join().unwrap();
        assert_eq!(seen, (0..1000).collect::<Vec<_>>());
    }

    #[test]
    fn newer_resize_supersedes_queued_one() {
        let queue = EventQueue::with_capacity(2);
        let resize = |w| {
            InputEvent::new(EventKind::Resize {
                size: Size::new(w, 1),
            })
        };
        queue.push(resize(1));
        queue.push(moved(0));
        for w in 2..100 {
            let superseded = queue.push(resize(w));
            assert_eq!(superseded.map(|e| e.kind), Some(resize(w - 1).kind));
        }
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped_count(), 98);
        assert_eq!(kinds(&queue), vec![moved(0).kind, resize(99).kind]);
    }

    #[test]
    fn priority_only_queue_stays_bounded_under_resize_bursts() {
        let queue = EventQueue::with_capacity(1);
        queue.push(InputEvent::new(EventKind::CloseRequested));
        for w in 1..50 {
            queue.push(InputEvent::new(EventKind::Resize {
                size: Size::new(w, w),
            }));
        }
        assert_eq!(queue.len(), 2);
    }
}
