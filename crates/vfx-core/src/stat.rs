//! Progress tracking for one run of an animation.
//!
//! A [`Stat`] pairs the static run configuration (duration, delay, looping,
//! reversal, optimization) with the dynamic counters of the current cycle.
//! Counters only move through [`Stat::next`]; a new cycle starts from
//! [`Stat::fresh`] so completion flags never carry over.

use std::time::Duration;

/// Static configuration of an animation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatConfig {
    /// Length of one forward pass.
    pub duration: Duration,
    /// Wait before the first cycle starts.
    pub delay: Duration,
    /// Additional cycles: 0 runs once, negative loops forever.
    pub loop_count: i32,
    /// Play the forward pass backwards after it completes.
    pub reverse: bool,
    /// Replay cached writes once a forward pass has been computed.
    pub optimize: bool,
}

impl StatConfig {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_loop(mut self, loop_count: i32) -> Self {
        self.loop_count = loop_count;
        self
    }

    pub fn with_reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    pub fn with_optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    pub fn looping(&self) -> Looping {
        match self.loop_count {
            0 => Looping::Once,
            n if n < 0 => Looping::Infinite,
            n => Looping::Times(n.unsigned_abs()),
        }
    }
}

/// How many times a run repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Looping {
    /// A single cycle.
    Once,
    /// This many cycles after the first.
    Times(u32),
    /// Repeat until stopped.
    Infinite,
}

impl Looping {
    /// Returns true if another cycle may start after `completed` restarts.
    pub fn permits(&self, completed: u32) -> bool {
        match self {
            Self::Once => false,
            Self::Times(n) => completed < *n,
            Self::Infinite => true,
        }
    }
}

/// Progress of one animation cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Stat {
    config: StatConfig,
    step: Duration,
    total: u64,
    current: u64,
    step_delta: f64,
    reversed: bool,
    first_pass_complete: bool,
    reverse_pass_complete: bool,
}

impl Stat {
    /// Create a tracker for `config` simulated at `step` per iteration.
    ///
    /// The iteration count is `duration / step` rounded, and never zero.
    pub fn new(config: StatConfig, step: Duration) -> Self {
        let total = if step.is_zero() {
            1
        } else {
            (config.duration.as_secs_f64() / step.as_secs_f64()).round() as u64
        };

        Self {
            config,
            step,
            total: total.max(1),
            current: 0,
            step_delta: 0.0,
            reversed: false,
            first_pass_complete: false,
            reverse_pass_complete: false,
        }
    }

    /// A tracker with the same configuration and every counter at zero.
    pub fn fresh(&self) -> Self {
        Self::new(self.config, self.step)
    }

    /// Advance one simulation step.
    ///
    /// Moves forward until the first pass completes, then backwards if the
    /// run reverses. Counters stay within `0..=total_iterations`.
    pub fn next(&mut self, step_delta: f64) {
        self.step_delta = step_delta;

        if !self.first_pass_complete {
            self.current = (self.current + 1).min(self.total);
            if self.current >= self.total {
                self.first_pass_complete = true;
            }
            return;
        }

        if self.config.reverse && !self.reverse_pass_complete {
            self.reversed = true;
            self.current = self.current.saturating_sub(1);
            if self.current == 0 {
                self.reverse_pass_complete = true;
            }
        }
    }

    /// True once the forward pass, and the reverse pass if any, completed.
    pub fn is_done(&self) -> bool {
        self.first_pass_complete && (!self.config.reverse || self.reverse_pass_complete)
    }

    /// Normalized progress in `[0, 1]`.
    pub fn delta_iteration(&self) -> f64 {
        self.current as f64 / self.total as f64
    }

    pub fn config(&self) -> &StatConfig {
        &self.config
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    pub fn total_iterations(&self) -> u64 {
        self.total
    }

    pub fn current_iteration(&self) -> u64 {
        self.current
    }

    /// Delta recorded by the most recent [`Stat::next`].
    pub fn step_delta(&self) -> f64 {
        self.step_delta
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    pub fn first_pass_complete(&self) -> bool {
        self.first_pass_complete
    }

    pub fn reverse_pass_complete(&self) -> bool {
        self.reverse_pass_complete
    }

    /// True while the tracker is on its forward pass.
    pub fn is_forward(&self) -> bool {
        !self.reversed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEP: Duration = Duration::from_millis(10);

    fn stat(config: StatConfig) -> Stat {
        Stat::new(config, STEP)
    }

    #[test]
    fn test_total_iterations() {
        assert_eq!(stat(StatConfig::new(Duration::from_secs(1))).total_iterations(), 100);
        assert_eq!(stat(StatConfig::new(Duration::from_millis(250))).total_iterations(), 25);
    }

    #[test]
    fn test_zero_duration_has_one_iteration() {
        let mut s = stat(StatConfig::new(Duration::ZERO));
        assert_eq!(s.total_iterations(), 1);
        s.next(0.01);
        assert!(s.is_done());

        let zero_step = Stat::new(StatConfig::new(Duration::from_secs(1)), Duration::ZERO);
        assert_eq!(zero_step.total_iterations(), 1);
    }

    #[test]
    fn test_forward_pass() {
        let mut s = stat(StatConfig::new(Duration::from_millis(50)));
        for expected in 1..=5 {
            assert!(!s.is_done());
            s.next(0.01);
            assert_eq!(s.current_iteration(), expected);
        }
        assert!(s.first_pass_complete());
        assert!(s.is_done());
        assert_eq!(s.delta_iteration(), 1.0);

        s.next(0.01);
        assert_eq!(s.current_iteration(), 5);
    }

    #[test]
    fn test_reverse_pass() {
        let mut s = stat(StatConfig::new(Duration::from_millis(30)).with_reverse(true));
        let mut seen = Vec::new();
        while !s.is_done() {
            s.next(0.01);
            seen.push(s.current_iteration());
        }
        assert_eq!(seen, vec![1, 2, 3, 2, 1, 0]);
        assert!(s.is_reversed());
        assert!(s.reverse_pass_complete());

        s.next(0.01);
        assert_eq!(s.current_iteration(), 0);
    }

    #[test]
    fn test_reverse_completes_after_forward() {
        let mut s = stat(StatConfig::new(Duration::from_millis(20)).with_reverse(true));
        while !s.is_done() {
            s.next(0.01);
            assert!(s.current_iteration() <= s.total_iterations());
            if s.reverse_pass_complete() {
                assert!(s.first_pass_complete());
            }
        }
    }

    #[test]
    fn test_fresh_is_isolated() {
        let mut original = stat(StatConfig::new(Duration::from_millis(40)).with_loop(2));
        original.next(0.01);
        original.next(0.01);

        let mut copy = original.fresh();
        assert_eq!(copy.current_iteration(), 0);
        assert_eq!(copy.config(), original.config());

        copy.next(0.01);
        copy.next(0.01);
        copy.next(0.01);
        assert_eq!(original.current_iteration(), 2);
        assert_eq!(copy.current_iteration(), 3);
    }

    #[test]
    fn test_looping() {
        assert_eq!(StatConfig::default().looping(), Looping::Once);
        assert_eq!(StatConfig::default().with_loop(3).looping(), Looping::Times(3));
        assert_eq!(StatConfig::default().with_loop(-1).looping(), Looping::Infinite);

        assert!(!Looping::Once.permits(0));
        assert!(Looping::Times(2).permits(1));
        assert!(!Looping::Times(2).permits(2));
        assert!(Looping::Infinite.permits(u32::MAX));
    }

    #[test]
    fn test_step_delta_recorded() {
        let mut s = stat(StatConfig::new(Duration::from_secs(1)));
        s.next(0.02);
        assert_eq!(s.step_delta(), 0.02);
    }
}
