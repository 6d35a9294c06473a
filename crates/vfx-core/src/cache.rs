//! Per-iteration write batch cache.
//!
//! Maps `(frame, iteration)` to the writers computed for that iteration so
//! a frame in its optimize phase can replay them without running its units.
//! Slots grow lazily; entries are shared behind `Arc` so a replayed batch is
//! the same list that was stored.

use crate::sync;
use crate::types::FrameId;
use crate::writer::Writers;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

type Slots = Vec<Option<Arc<Writers>>>;

/// Cache of computed writers, shared by every frame of an engine.
#[derive(Debug, Default)]
pub struct WriteBatchCache {
    frames: RwLock<HashMap<FrameId, Slots>>,
}

impl WriteBatchCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the writers of `iteration`, replacing any previous entry.
    pub fn store(&self, frame: FrameId, iteration: usize, writers: Writers) -> Arc<Writers> {
        let writers = Arc::new(writers);
        let mut frames = sync::write(&self.frames);
        let slots = frames.entry(frame).or_default();
        if slots.len() <= iteration {
            slots.resize(iteration + 1, None);
        }
        slots[iteration] = Some(Arc::clone(&writers));
        writers
    }

    /// Writers stored for `iteration`.
    ///
    /// An index past the known slots reads the last slot.
    pub fn writers(&self, frame: FrameId, iteration: usize) -> Option<Arc<Writers>> {
        let frames = sync::read(&self.frames);
        let slots = frames.get(&frame)?;
        let last = slots.len().checked_sub(1)?;
        slots[iteration.min(last)].clone()
    }

    /// True if `iteration` itself has an entry (no clamping).
    pub fn contains(&self, frame: FrameId, iteration: usize) -> bool {
        sync::read(&self.frames)
            .get(&frame)
            .and_then(|slots| slots.get(iteration))
            .is_some_and(Option::is_some)
    }

    /// Drop a single iteration so it is computed again.
    pub fn clear_iteration(&self, frame: FrameId, iteration: usize) {
        if let Some(slot) = sync::write(&self.frames)
            .get_mut(&frame)
            .and_then(|slots| slots.get_mut(iteration))
        {
            *slot = None;
        }
    }

    /// Drop every entry of a frame.
    pub fn clear(&self, frame: FrameId) {
        sync::write(&self.frames).remove(&frame);
    }

    /// Number of slots allocated for a frame.
    pub fn slots(&self, frame: FrameId) -> usize {
        sync::read(&self.frames).get(&frame).map_or(0, Vec::len)
    }

    /// Number of frames with entries.
    pub fn frame_count(&self) -> usize {
        sync::read(&self.frames).len()
    }
}

static_assertions::assert_impl_all!(WriteBatchCache: Send, Sync);
