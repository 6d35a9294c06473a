//! Fixed-timestep clock with render interpolation.
//!
//! Irregular host callbacks are turned into uniform simulation steps:
//!
//! ```text
//! delta = now - previous          (clamped to max_delta)
//! accumulator += delta
//! while accumulator >= step: update(step, simulated)
//! render(accumulator / step)
//! ```
//!
//! Time is kept as `Duration` so the accumulator is exact. Nothing is
//! dispatched until the delay window (`start + delay`) has elapsed, and
//! paused ticks discard their delta instead of accumulating it.

use std::time::Duration;

/// Receiver of clock steps.
pub trait TimeBehaviour {
    /// One fixed simulation step. `total` is simulated time before this
    /// step, in seconds.
    fn update(&mut self, step: f64, total: f64) -> StepControl;

    /// Called once per clock tick with the leftover step fraction.
    fn render(&mut self, interpolation: f64);
}

/// Returned by [`TimeBehaviour::update`] to continue or halt stepping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepControl {
    Continue,
    /// Stop stepping for this tick; the leftover time is kept.
    Halt,
}

/// Clock timing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockConfig {
    pub fixed_step: Duration,
    pub max_delta: Duration,
    pub delay: Duration,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            fixed_step: Duration::from_millis(10),
            max_delta: Duration::from_millis(250),
            delay: Duration::ZERO,
        }
    }
}

impl ClockConfig {
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Outcome of one clock tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClockTick {
    /// The tick was discarded.
    Paused,
    /// Still inside the delay window.
    Waiting,
    /// Steps were dispatched, followed by one render.
    Ran { updates: u32, interpolation: f64 },
}

/// Fixed-timestep accumulator.
#[derive(Debug, Clone)]
pub struct Clock {
    config: ClockConfig,
    start: Option<Duration>,
    previous: Duration,
    window: Duration,
    accumulator: Duration,
    simulated: Duration,
    consumed: Duration,
}

impl Clock {
    pub fn new(config: ClockConfig) -> Self {
        let fixed_step = config.fixed_step.max(Duration::from_millis(1));
        Self {
            config: ClockConfig {
                fixed_step,
                max_delta: config.max_delta.max(fixed_step),
                ..config
            },
            start: None,
            previous: Duration::ZERO,
            window: Duration::ZERO,
            accumulator: Duration::ZERO,
            simulated: Duration::ZERO,
            consumed: Duration::ZERO,
        }
    }

    pub fn config(&self) -> &ClockConfig {
        &self.config
    }

    /// Host time of the first tick.
    pub fn start(&self) -> Option<Duration> {
        self.start
    }

    pub fn accumulator(&self) -> Duration {
        self.accumulator
    }

    /// Simulated time dispatched through `update`.
    pub fn simulated(&self) -> Duration {
        self.simulated
    }

    /// Sum of clamped deltas accepted into the accumulator.
    pub fn consumed(&self) -> Duration {
        self.consumed
    }

    /// Advance to host time `now`.
    pub fn advance<B: TimeBehaviour>(&mut self, now: Duration, paused: bool, behaviour: &mut B) -> ClockTick {
        if self.start.is_none() {
            self.start = Some(now);
            self.previous = now;
            self.window = now + self.config.delay;
        }

        let delta = now.saturating_sub(self.previous);
        self.previous = now;

        if paused {
            return ClockTick::Paused;
        }
        if now < self.window {
            return ClockTick::Waiting;
        }

        let delta = delta.min(self.config.max_delta).min(now - self.window);
        self.accumulator += delta;
        self.consumed += delta;

        let step = self.config.fixed_step;
        let step_secs = step.as_secs_f64();
        let mut updates = 0;
        while self.accumulator >= step {
            let control = behaviour.update(step_secs, self.simulated.as_secs_f64());
            self.simulated += step;
            self.accumulator -= step;
            updates += 1;
            if control == StepControl::Halt {
                break;
            }
        }

        let interpolation = self.accumulator.as_secs_f64() / step_secs;
        behaviour.render(interpolation);
        ClockTick::Ran { updates, interpolation }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        updates: Vec<(f64, f64)>,
        renders: Vec<f64>,
        halt_after: Option<usize>,
    }

    impl TimeBehaviour for Recorder {
        fn update(&mut self, step: f64, total: f64) -> StepControl {
            self.updates.push((step, total));
            match self.halt_after {
                Some(n) if self.updates.len() >= n => StepControl::Halt,
                _ => StepControl::Continue,
            }
        }

        fn render(&mut self, interpolation: f64) {
            self.renders.push(interpolation);
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_first_tick_only_renders() {
        let mut clock = Clock::new(ClockConfig::default());
        let mut rec = Recorder::default();
        let tick = clock.advance(ms(500), false, &mut rec);
        assert_eq!(tick, ClockTick::Ran { updates: 0, interpolation: 0.0 });
        assert_eq!(clock.start(), Some(ms(500)));
        assert_eq!(rec.renders.len(), 1);
    }

    #[test]
    fn test_fixed_steps_and_interpolation() {
        let mut clock = Clock::new(ClockConfig::default());
        let mut rec = Recorder::default();
        clock.advance(ms(0), false, &mut rec);
        let tick = clock.advance(ms(35), false, &mut rec);

        assert_eq!(rec.updates.len(), 3);
        assert_eq!(rec.updates[0].1, 0.0);
        assert!((rec.updates[2].1 - 0.02).abs() < 1e-9);
        match tick {
            ClockTick::Ran { updates, interpolation } => {
                assert_eq!(updates, 3);
                assert!((interpolation - 0.5).abs() < 1e-9);
            }
            other => panic!("unexpected tick {other:?}"),
        }
    }

    #[test]
    fn test_large_delta_is_clamped() {
        let mut clock = Clock::new(ClockConfig::default());
        let mut rec = Recorder::default();
        clock.advance(ms(0), false, &mut rec);
        clock.advance(ms(10_000), false, &mut rec);
        assert_eq!(rec.updates.len(), 25);
    }

    #[test]
    fn test_delay_window() {
        let mut clock = Clock::new(ClockConfig::default().with_delay(ms(100)));
        let mut rec = Recorder::default();
        assert_eq!(clock.advance(ms(0), false, &mut rec), ClockTick::Waiting);
        assert_eq!(clock.advance(ms(60), false, &mut rec), ClockTick::Waiting);
        assert!(rec.renders.is_empty());

        clock.advance(ms(120), false, &mut rec);
        assert_eq!(rec.updates.len(), 2);
        assert_eq!(clock.consumed(), ms(20));
    }

    #[test]
    fn test_pause_discards_elapsed_time() {
        let mut clock = Clock::new(ClockConfig::default());
        let mut rec = Recorder::default();
        clock.advance(ms(0), false, &mut rec);
        assert_eq!(clock.advance(ms(100), true, &mut rec), ClockTick::Paused);
        assert_eq!(clock.advance(ms(200), true, &mut rec), ClockTick::Paused);
        clock.advance(ms(210), false, &mut rec);
        assert_eq!(rec.updates.len(), 1);
    }

    #[test]
    fn test_halt_keeps_leftover() {
        let mut clock = Clock::new(ClockConfig::default());
        let mut rec = Recorder {
            halt_after: Some(1),
            ..Default::default()
        };
        clock.advance(ms(0), false, &mut rec);
        clock.advance(ms(40), false, &mut rec);
        assert_eq!(rec.updates.len(), 1);
        assert_eq!(clock.accumulator(), ms(30));
    }

    #[test]
    fn test_accumulator_conservation() {
        let mut clock = Clock::new(ClockConfig::default());
        let mut rec = Recorder::default();
        let deltas = [0, 3, 17, 9, 400, 11, 1, 26, 250, 7, 33];
        let mut now = ms(0);
        for delta in deltas {
            now += ms(delta);
            clock.advance(now, false, &mut rec);
        }

        let dispatched = clock.config().fixed_step * rec.updates.len() as u32;
        assert_eq!(dispatched + clock.accumulator(), clock.consumed());
        assert_eq!(clock.simulated(), dispatched);

        let clamped: u64 = deltas.iter().map(|d| (*d).min(250)).sum();
        assert_eq!(clock.consumed(), ms(clamped));
    }

    #[test]
    fn test_zero_step_is_guarded() {
        let mut clock = Clock::new(ClockConfig {
            fixed_step: Duration::ZERO,
            ..ClockConfig::default()
        });
        let mut rec = Recorder::default();
        clock.advance(ms(0), false, &mut rec);
        clock.advance(ms(5), false, &mut rec);
        assert_eq!(rec.updates.len(), 5);
    }
}
