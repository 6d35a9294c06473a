//! Property animation engine: fixed-timestep scheduling, eased interpolation
//! and batched surface writes.
//!
//! This crate provides:
//! - **Easing**: cubic-bezier and stepped curves behind a named registry
//! - **Stat**: per-run progress tracking (forward, reverse, loop cycles)
//! - **Sequences**: pluggable per-property animation units and their registry
//! - **Clock**: a fixed-timestep accumulator with render interpolation
//! - **Frames**: the orchestrator driving units through Init, Update and Write
//! - **Scheduler**: registration of frames against a host refresh callback
//!
//! # Architecture
//!
//! ```text
//! Engine (easings, sequences, write cache, write queue)
//!   └── AnimationFrame
//!         ├── Clock ──update/render──▶ Stat + Bindings (unit × surface)
//!         └── WriteBatch ──▶ WriteQueue ──▶ TargetSurface
//!
//! Scheduler ──▶ HostScheduler (one recurring callback per frame)
//! ```

pub mod cache;
pub mod clock;
pub mod easing;
pub mod engine;
pub mod error;
pub mod events;
pub mod frame;
pub mod host;
pub mod registry;
pub mod scheduler;
pub mod sequence;
pub mod stat;
pub mod surface;
pub mod types;
pub mod units;
pub mod writer;

mod sync;

pub use cache::WriteBatchCache;
pub use clock::{Clock, ClockConfig, ClockTick, StepControl, TimeBehaviour};
pub use easing::{DEFAULT_EASING, EasingCurve, EasingRegistry, Spline, StepPosition};
pub use engine::{Animation, Engine, chain};
pub use error::{Result, ScheduleError, SurfaceError, VfxError};
pub use events::{DEFAULT_EVENT_CAPACITY, EventQueue, FrameEvent, FrameStatus, Listeners, WriteFailure};
pub use frame::{AnimationFrame, TickOutcome};
pub use host::{HostHandle, HostScheduler, ManualHost, ThreadHost, TickCallback};
pub use registry::{ANIMATE_KEY, Animator, Overrides, SequenceRegistry};
pub use scheduler::{FrameHandle, Scheduler};
pub use sequence::{Binding, Capabilities, Progress, Sequence};
pub use stat::{Looping, Stat, StatConfig};
pub use surface::{MemorySurface, ReadValue, SharedSurface, TargetSurface};
pub use types::{FrameId, FramePhase};
pub use writer::{DeferWriter, FailureSink, WriteBatch, WriteGate, WriteQueue, WriteTicket, Writers};

pub use vfx_config::{VfxConfig, WriteMode};
