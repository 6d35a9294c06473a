//! The per-property animation unit contract.
//!
//! A [`Sequence`] animates one property of one surface. Frames drive it
//! through three calls:
//! - `init` once, reading the start value from the surface
//! - `update` every simulation step, with the tracker's progress
//! - `write` every render tick, producing a deferred write
//!
//! Optional behaviour is declared up front through [`Capabilities`] and
//! resolved once when the unit is bound, not checked on every tick.

use crate::easing::{DEFAULT_EASING, EasingCurve};
use crate::error::SurfaceError;
use crate::stat::Stat;
use crate::surface::SharedSurface;
use crate::writer::DeferWriter;
use std::fmt;
use std::ops::BitOr;
use std::time::Duration;

/// Optional behaviours of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const NONE: Self = Self(0);
    /// `reset` is called at the start of every loop cycle.
    pub const RESETTABLE: Self = Self(1);
    /// `stop` is called when the frame ends.
    pub const STOPPABLE: Self = Self(1 << 1);
    /// `first_write_delay` stalls the first batch.
    pub const DELAYED: Self = Self(1 << 2);

    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(&self) -> u8 {
        self.0
    }
}

impl BitOr for Capabilities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Snapshot of tracker progress handed to units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub iteration: u64,
    pub total: u64,
    /// `iteration / total`
    pub ratio: f64,
    /// Simulation step in seconds.
    pub step: f64,
    pub reversed: bool,
}

impl Progress {
    pub fn from_stat(stat: &Stat) -> Self {
        Self {
            iteration: stat.current_iteration(),
            total: stat.total_iterations(),
            ratio: stat.delta_iteration(),
            step: stat.step_delta(),
            reversed: stat.is_reversed(),
        }
    }
}

/// An animatable property of one surface.
pub trait Sequence: Send {
    /// Registry name of the unit, used in logs.
    fn name(&self) -> &str;

    /// Read start values from the target.
    fn init(&mut self, target: &SharedSurface);

    /// Recompute the current value for `progress`.
    fn update(&mut self, progress: &Progress, easing: &EasingCurve);

    /// Deferred write of the current value, if there is one.
    fn write(&self, target: &SharedSurface) -> Option<DeferWriter>;

    /// Write issued right after `init`.
    fn init_writer(&self, target: &SharedSurface) -> Option<DeferWriter> {
        self.write(target)
    }

    /// Name of the easing curve to resolve at bind time.
    fn easing(&self) -> &str {
        DEFAULT_EASING
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
    }

    /// Return run-time state to the post-`init` value.
    fn reset(&mut self) {}

    /// Final hook when the frame ends.
    fn stop(&mut self, _target: &SharedSurface) -> Result<Option<DeferWriter>, SurfaceError> {
        Ok(None)
    }

    /// Stall applied before the very first batch.
    fn first_write_delay(&self) -> Duration {
        Duration::ZERO
    }
}

/// A unit bound to its target, with easing and capabilities resolved.
pub struct Binding {
    unit: Box<dyn Sequence>,
    target: SharedSurface,
    easing: EasingCurve,
    caps: Capabilities,
}

impl Binding {
    pub fn new(unit: Box<dyn Sequence>, target: SharedSurface, easing: EasingCurve) -> Self {
        let caps = unit.capabilities();
        Self {
            unit,
            target,
            easing,
            caps,
        }
    }

    pub fn target(&self) -> &SharedSurface {
        &self.target
    }

    pub fn easing(&self) -> &EasingCurve {
        &self.easing
    }

    pub fn capabilities(&self) -> Capabilities {
        self.caps
    }

    pub fn name(&self) -> &str {
        self.unit.name()
    }

    pub fn init(&mut self) -> Option<DeferWriter> {
        self.unit.init(&self.target);
        self.unit.init_writer(&self.target)
    }

    pub fn update(&mut self, progress: &Progress) {
        self.unit.update(progress, &self.easing);
    }

    pub fn write(&self) -> Option<DeferWriter> {
        self.unit.write(&self.target)
    }

    pub fn reset(&mut self) {
        if self.caps.contains(Capabilities::RESETTABLE) {
            self.unit.reset();
        }
    }

    pub fn stop(&mut self) -> Result<Option<DeferWriter>, SurfaceError> {
        if self.caps.contains(Capabilities::STOPPABLE) {
            self.unit.stop(&self.target)
        } else {
            Ok(None)
        }
    }

    pub fn first_write_delay(&self) -> Duration {
        if self.caps.contains(Capabilities::DELAYED) {
            self.unit.first_write_delay()
        } else {
            Duration::ZERO
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("unit", &self.unit.name())
            .field("target", &self.target.id())
            .field("easing", &self.easing)
            .field("caps", &self.caps)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stat::StatConfig;
    use crate::surface::MemorySurface;
    use std::sync::Arc;

    struct Counter {
        updates: usize,
        resets: usize,
        caps: Capabilities,
    }

    impl Sequence for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn init(&mut self, _target: &SharedSurface) {}

        fn update(&mut self, _progress: &Progress, _easing: &EasingCurve) {
            self.updates += 1;
        }

        fn write(&self, _target: &SharedSurface) -> Option<DeferWriter> {
            None
        }

        fn capabilities(&self) -> Capabilities {
            self.caps
        }

        fn reset(&mut self) {
            self.resets += 1;
        }

        fn first_write_delay(&self) -> Duration {
            Duration::from_millis(5)
        }
    }

    fn binding(caps: Capabilities) -> Binding {
        let unit = Counter {
            updates: 0,
            resets: 0,
            caps,
        };
        Binding::new(Box::new(unit), Arc::new(MemorySurface::new("box")), EasingCurve::Linear)
    }

    #[test]
    fn test_capability_flags() {
        let caps = Capabilities::RESETTABLE | Capabilities::DELAYED;
        assert!(caps.contains(Capabilities::RESETTABLE));
        assert!(caps.contains(Capabilities::DELAYED));
        assert!(!caps.contains(Capabilities::STOPPABLE));
        assert!(caps.contains(Capabilities::NONE));
        assert_eq!(caps.bits(), 0b101);
    }

    #[test]
    fn test_capabilities_gate_optional_calls() {
        let mut plain = binding(Capabilities::NONE);
        plain.reset();
        assert_eq!(plain.first_write_delay(), Duration::ZERO);
        assert!(plain.stop().unwrap().is_none());

        let mut delayed = binding(Capabilities::DELAYED | Capabilities::RESETTABLE);
        delayed.reset();
        assert_eq!(delayed.first_write_delay(), Duration::from_millis(5));
    }

    #[test]
    fn test_progress_from_stat() {
        let mut stat = Stat::new(StatConfig::new(Duration::from_millis(40)), Duration::from_millis(10));
        stat.next(0.01);
        let progress = Progress::from_stat(&stat);
        assert_eq!(progress.iteration, 1);
        assert_eq!(progress.total, 4);
        assert_eq!(progress.ratio, 0.25);
        assert!(!progress.reversed);
    }
}
