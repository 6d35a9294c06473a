//! Core identifiers and lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for an animation frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FrameId(pub u64);

impl FrameId {
    /// Generate a new unique frame ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for FrameId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame-{}", self.0)
    }
}

/// Lifecycle phase of an animation frame.
///
/// ```text
/// Created → Initializing → Running → (Looping ⟲) → Reversing → Ending → Ended
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FramePhase {
    /// Built but not yet ticked.
    #[default]
    Created,
    /// Units are reading their start values.
    Initializing,
    /// Advancing through the forward pass.
    Running,
    /// Stepping back through the reverse pass.
    Reversing,
    /// A cycle finished and another one was started.
    Looping,
    /// Final cycle finished; stop hooks are running.
    Ending,
    /// No further ticks will do any work.
    Ended,
}

impl FramePhase {
    /// Returns true once the frame has reached its terminal phase.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ending | Self::Ended)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_id_uniqueness() {
        let id1 = FrameId::new();
        let id2 = FrameId::new();
        let id3 = FrameId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn test_phase_default() {
        assert_eq!(FramePhase::default(), FramePhase::Created);
        assert!(!FramePhase::Running.is_terminal());
        assert!(FramePhase::Ended.is_terminal());
    }

    #[test]
    fn test_frame_id_display() {
        assert_eq!(FrameId(7).to_string(), "frame-7");
    }
}
