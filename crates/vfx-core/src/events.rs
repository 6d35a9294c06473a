//! Frame lifecycle events and listeners.
//!
//! Frames report their lifecycle two ways:
//! - Listeners registered with `on_begin`, `on_progress`, `on_end` and
//!   `on_error`, called with a [`FrameStatus`] snapshot
//! - A pollable [`EventQueue`] of [`FrameEvent`]s drained by the owner
//!
//! # Usage
//!
//! ```ignore
//! frame.on_end(|status| println!("{} ended after {} cycles", status.frame_id, status.cycle));
//!
//! for event in frame.drain_events() {
//!     if let FrameEvent::WriteFailed { target, message, .. } = event {
//!         eprintln!("{target}: {message}");
//!     }
//! }
//! ```

use crate::error::SurfaceError;
use crate::stat::Stat;
use crate::sync;
use crate::types::{FrameId, FramePhase};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Event emitted when a frame changes state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FrameEvent {
    /// Units were initialized and the first step was taken.
    Began { frame_id: FrameId },
    /// The forward pass completed and the reverse pass started.
    Reversing { frame_id: FrameId },
    /// A loop cycle completed and the next one started.
    Cycled { frame_id: FrameId, cycle: u32 },
    /// The final cycle completed.
    Ended { frame_id: FrameId },
    /// A surface rejected a write.
    WriteFailed {
        frame_id: FrameId,
        target: String,
        message: String,
    },
}

impl FrameEvent {
    pub fn frame_id(&self) -> FrameId {
        match self {
            Self::Began { frame_id }
            | Self::Reversing { frame_id }
            | Self::Cycled { frame_id, .. }
            | Self::Ended { frame_id }
            | Self::WriteFailed { frame_id, .. } => *frame_id,
        }
    }

    pub fn is_ended(&self) -> bool {
        matches!(self, Self::Ended { .. })
    }
}

impl From<&WriteFailure> for FrameEvent {
    fn from(failure: &WriteFailure) -> Self {
        Self::WriteFailed {
            frame_id: failure.frame_id,
            target: failure.target.clone(),
            message: failure.error.to_string(),
        }
    }
}

/// Events a frame keeps for polling when nobody drains them.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Bounded queue for collecting frame events between polls.
///
/// When full, pushing drops the oldest event and counts it.
#[derive(Debug)]
pub struct EventQueue {
    events: VecDeque<FrameEvent>,
    capacity: usize,
    dropped: u64,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// A queue holding at most `capacity` events (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: VecDeque::new(),
            capacity: capacity.max(1),
            dropped: 0,
        }
    }

    pub fn push(&mut self, event: FrameEvent) {
        if self.events.len() >= self.capacity {
            self.events.pop_front();
            self.dropped += 1;
        }
        self.events.push_back(event);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn pop(&mut self) -> Option<FrameEvent> {
        self.events.pop_front()
    }

    pub fn peek(&self) -> Option<&FrameEvent> {
        self.events.front()
    }

    /// Drain all events, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = FrameEvent> + '_ {
        self.events.drain(..)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

/// A write that failed while a batch executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFailure {
    pub frame_id: FrameId,
    /// Identifier of the surface that failed.
    pub target: String,
    pub error: SurfaceError,
}

/// Snapshot of a frame handed to listeners.
#[derive(Debug, Clone)]
pub struct FrameStatus {
    pub frame_id: FrameId,
    pub phase: FramePhase,
    /// Completed loop restarts.
    pub cycle: u32,
    pub stat: Stat,
}

type StatusListener = Box<dyn FnMut(&FrameStatus) + Send>;
type FailureListener = Box<dyn FnMut(&WriteFailure) + Send>;

/// Registered frame callbacks.
///
/// Each list is taken out of its lock while it runs, so a listener may
/// register further listeners on the same frame.
#[derive(Default)]
pub struct Listeners {
    // Bumped by `reset`; lists taken out for emission are not restored
    // across a reset.
    generation: AtomicU64,
    begin: Mutex<Vec<StatusListener>>,
    progress: Mutex<Vec<StatusListener>>,
    end: Mutex<Vec<StatusListener>>,
    error: Mutex<Vec<FailureListener>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_begin(&self, listener: impl FnMut(&FrameStatus) + Send + 'static) {
        sync::lock(&self.begin).push(Box::new(listener));
    }

    pub fn on_progress(&self, listener: impl FnMut(&FrameStatus) + Send + 'static) {
        sync::lock(&self.progress).push(Box::new(listener));
    }

    pub fn on_end(&self, listener: impl FnMut(&FrameStatus) + Send + 'static) {
        sync::lock(&self.end).push(Box::new(listener));
    }

    pub fn on_error(&self, listener: impl FnMut(&WriteFailure) + Send + 'static) {
        sync::lock(&self.error).push(Box::new(listener));
    }

    pub fn emit_begin(&self, status: &FrameStatus) {
        self.emit(&self.begin, status);
    }

    pub fn emit_progress(&self, status: &FrameStatus) {
        self.emit(&self.progress, status);
    }

    pub fn emit_end(&self, status: &FrameStatus) {
        self.emit(&self.end, status);
    }

    pub fn emit_error(&self, failure: &WriteFailure) {
        self.emit(&self.error, failure);
    }

    /// Drop every registered listener.
    pub fn reset(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        sync::lock(&self.begin).clear();
        sync::lock(&self.progress).clear();
        sync::lock(&self.end).clear();
        sync::lock(&self.error).clear();
    }

    /// Total number of registered listeners.
    pub fn len(&self) -> usize {
        sync::lock(&self.begin).len()
            + sync::lock(&self.progress).len()
            + sync::lock(&self.end).len()
            + sync::lock(&self.error).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn emit<T: ?Sized>(&self, slot: &Mutex<Vec<Box<dyn FnMut(&T) + Send>>>, value: &T) {
        let generation = self.generation.load(Ordering::Acquire);
        let mut running = std::mem::take(&mut *sync::lock(slot));
        if running.is_empty() {
            return;
        }
        for listener in running.iter_mut() {
            listener(value);
        }
        if self.generation.load(Ordering::Acquire) != generation {
            return;
        }
        let mut registered = sync::lock(slot);
        running.append(&mut registered);
        *registered = running;
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners").field("count", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stat::StatConfig;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn status() -> FrameStatus {
        FrameStatus {
            frame_id: FrameId(1),
            phase: FramePhase::Running,
            cycle: 0,
            stat: Stat::new(StatConfig::new(Duration::from_secs(1)), Duration::from_millis(10)),
        }
    }

    #[test]
    fn test_event_queue() {
        let mut queue = EventQueue::new();
        assert!(queue.is_empty());

        queue.push(FrameEvent::Began { frame_id: FrameId(1) });
        queue.push(FrameEvent::Cycled {
            frame_id: FrameId(1),
            cycle: 1,
        });
        queue.push(FrameEvent::Ended { frame_id: FrameId(1) });
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.peek(), Some(&FrameEvent::Began { frame_id: FrameId(1) }));

        let drained: Vec<_> = queue.drain().collect();
        assert_eq!(drained.len(), 3);
        assert!(drained[2].is_ended());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_event_queue_drops_oldest_when_full() {
        let mut queue = EventQueue::with_capacity(3);
        for cycle in 1..=5 {
            queue.push(FrameEvent::Cycled {
                frame_id: FrameId(1),
                cycle,
            });
        }

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dropped(), 2);
        assert_eq!(
            queue.pop(),
            Some(FrameEvent::Cycled {
                frame_id: FrameId(1),
                cycle: 3
            })
        );
        assert_eq!(EventQueue::new().capacity(), DEFAULT_EVENT_CAPACITY);
    }

    #[test]
    fn test_event_serialization() {
        let event = FrameEvent::Cycled {
            frame_id: FrameId(4),
            cycle: 2,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"cycled\""));
        let back: FrameEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.frame_id(), FrameId(4));
    }

    #[test]
    fn test_failure_event() {
        let failure = WriteFailure {
            frame_id: FrameId(3),
            target: "box".to_string(),
            error: SurfaceError::NotFound("width".to_string()),
        };
        match FrameEvent::from(&failure) {
            FrameEvent::WriteFailed { target, message, .. } => {
                assert_eq!(target, "box");
                assert!(message.contains("width"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_listeners_fire_in_order() {
        let listeners = Listeners::new();
        let calls = Arc::new(Mutex::new(Vec::new()));
        for tag in ["a", "b"] {
            let calls = Arc::clone(&calls);
            listeners.on_end(move |_| calls.lock().unwrap().push(tag));
        }

        listeners.emit_end(&status());
        listeners.emit_end(&status());
        assert_eq!(*calls.lock().unwrap(), vec!["a", "b", "a", "b"]);
    }

    #[test]
    fn test_listener_can_register_listener() {
        let listeners = Arc::new(Listeners::new());
        let count = Arc::new(AtomicUsize::new(0));

        let inner = Arc::clone(&listeners);
        let inner_count = Arc::clone(&count);
        listeners.on_begin(move |_| {
            let count = Arc::clone(&inner_count);
            inner.on_begin(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            });
        });

        listeners.emit_begin(&status());
        assert_eq!(count.load(Ordering::SeqCst), 0);
        listeners.emit_begin(&status());
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(listeners.len(), 3);
    }

    #[test]
    fn test_reset_from_inside_listener() {
        let listeners = Arc::new(Listeners::new());
        let count = Arc::new(AtomicUsize::new(0));

        let inner = Arc::clone(&listeners);
        let inner_count = Arc::clone(&count);
        listeners.on_end(move |_| {
            inner_count.fetch_add(1, Ordering::SeqCst);
            inner.reset();
        });
        listeners.on_progress(|_| {});

        listeners.emit_end(&status());
        assert!(listeners.is_empty());
        listeners.emit_end(&status());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_registered_after_reset_survives() {
        let listeners = Arc::new(Listeners::new());
        let inner = Arc::clone(&listeners);
        listeners.on_begin(move |_| {
            inner.reset();
            inner.on_begin(|_| {});
        });

        listeners.emit_begin(&status());
        assert_eq!(listeners.len(), 1);
    }

    #[test]
    fn test_reset() {
        let listeners = Listeners::new();
        listeners.on_begin(|_| {});
        listeners.on_error(|_| {});
        assert_eq!(listeners.len(), 2);
        listeners.reset();
        assert!(listeners.is_empty());
    }
}
