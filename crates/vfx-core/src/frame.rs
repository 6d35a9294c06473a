//! The animation frame: one tracker, one clock and a set of bound units.
//!
//! A frame is ticked by the scheduler with the host's current time. Each
//! tick advances its [`Clock`], which calls back into the frame's run state
//! for every fixed step and once more to render:
//!
//! ```text
//! Created → Initializing → Running → (Looping ⟲) → Reversing → Ending → Ended
//! ```
//!
//! - The first step initializes every unit and queues their init writes
//! - Each step advances the [`Stat`] and updates the units, or skips them
//!   when the step can be replayed from the [`WriteBatchCache`]
//! - Each render gathers one [`WriteBatch`] if anything changed and the
//!   previous batch has finished writing
//! - A finished cycle either restarts (fresh tracker, fresh clock) or ends
//!   the frame, running unit stop hooks
//!
//! Listeners and events are dispatched after the frame lock is released.

use crate::cache::WriteBatchCache;
use crate::clock::{Clock, ClockConfig, StepControl, TimeBehaviour};
use crate::events::{EventQueue, FrameEvent, FrameStatus, Listeners, WriteFailure};
use crate::sequence::{Binding, Progress};
use crate::stat::{Looping, Stat};
use crate::surface::SharedSurface;
use crate::sync;
use crate::types::{FrameId, FramePhase};
use crate::writer::{DeferWriter, FailureSink, WriteBatch, WriteGate, WriteQueue, Writers};
use log::{debug, trace, warn};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What the scheduler should do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Keep ticking.
    Running,
    /// Keep ticking, and start the chained frames now.
    ChainReady,
    /// The frame ended; stop ticking and start the chained frames.
    Finished,
}

/// Engine resources shared by every frame.
#[derive(Debug, Clone)]
pub(crate) struct FrameServices {
    pub cache: Arc<WriteBatchCache>,
    pub queue: Arc<WriteQueue>,
    pub clock: ClockConfig,
    pub cache_enabled: bool,
    pub cache_reverse: bool,
}

/// State reachable from write batches running on another thread.
#[derive(Debug, Default)]
struct Shared {
    listeners: Listeners,
    events: Mutex<EventQueue>,
}

impl Shared {
    fn record_failure(&self, failure: WriteFailure) {
        sync::lock(&self.events).push(FrameEvent::from(&failure));
        self.listeners.emit_error(&failure);
    }
}

#[derive(Debug, Default)]
struct Notes {
    began: bool,
    progressed: bool,
    reversing: bool,
    cycled: Option<u32>,
    ended: bool,
    chain_ready: bool,
}

impl Notes {
    fn any(&self) -> bool {
        self.began || self.progressed || self.reversing || self.cycled.is_some() || self.ended
    }
}

/// Mutable run state, driven by the clock.
struct Run {
    id: FrameId,
    initial: Stat,
    stat: Stat,
    bindings: Vec<Binding>,
    surfaces: Vec<SharedSurface>,
    cache: Arc<WriteBatchCache>,
    cache_enabled: bool,
    cache_reverse: bool,
    gate: WriteGate,
    sink: FailureSink,
    phase: FramePhase,
    cycle: u32,
    inited: bool,
    optimized: bool,
    high_water: Option<usize>,
    stale: bool,
    dirty: bool,
    cycle_complete: bool,
    finished: bool,
    pending: Writers,
    outgoing: Option<WriteBatch>,
    notes: Notes,
}

impl Run {
    fn index(&self) -> usize {
        self.stat.current_iteration() as usize
    }

    fn caching(&self) -> bool {
        self.cache_enabled && self.stat.config().optimize
    }

    fn direction_cached(&self) -> bool {
        self.stat.is_forward() || self.cache_reverse
    }

    /// True if the writers of `index` can be served from the cache.
    fn can_replay(&self, index: usize) -> bool {
        self.caching()
            && self.optimized
            && self.direction_cached()
            && self.high_water.is_some_and(|high| index <= high)
            && self.cache.contains(self.id, index)
    }

    fn initialize(&mut self) {
        self.phase = FramePhase::Initializing;
        debug!("{} initializing {} units", self.id, self.bindings.len());

        let delay = self
            .bindings
            .iter()
            .map(Binding::first_write_delay)
            .max()
            .unwrap_or_default();
        if !delay.is_zero() {
            self.pending.push(DeferWriter::sleep(delay));
        }
        for binding in &mut self.bindings {
            if let Some(writer) = binding.init() {
                self.pending.push(writer);
            }
        }

        self.inited = true;
        self.notes.began = true;
    }

    fn update_units(&mut self) {
        let progress = Progress::from_stat(&self.stat);
        for binding in &mut self.bindings {
            binding.update(&progress);
        }
        self.stale = false;
    }

    fn writers_for(&mut self, index: usize) -> Arc<Writers> {
        if self.can_replay(index)
            && let Some(cached) = self.cache.writers(self.id, index)
        {
            trace!("{} replaying iteration {index} from cache", self.id);
            return cached;
        }

        if self.stale {
            self.update_units();
        }
        let fresh: Writers = self.bindings.iter().filter_map(Binding::write).collect();
        if self.caching() && self.direction_cached() {
            self.high_water = Some(self.high_water.map_or(index, |high| high.max(index)));
            self.cache.store(self.id, index, fresh)
        } else {
            Arc::new(fresh)
        }
    }

    /// Apply the end of a cycle: restart it, or finish the frame.
    fn settle(&mut self, clock: &mut Clock, loop_clock: ClockConfig) {
        if self.cycle_complete && !self.finished {
            if self.stat.config().looping().permits(self.cycle) {
                self.restart_cycle();
                *clock = Clock::new(loop_clock);
            } else {
                self.finish();
            }
        }

        if self.finished && !self.dirty && self.pending.is_empty() && self.phase != FramePhase::Ended {
            self.phase = FramePhase::Ended;
            self.notes.ended = true;
            self.cache.clear(self.id);
            debug!("{} ended after {} cycles", self.id, self.cycle);
        }
    }

    fn restart_cycle(&mut self) {
        self.cycle += 1;
        self.stat = self.stat.fresh();
        for binding in &mut self.bindings {
            binding.reset();
        }
        self.cycle_complete = false;
        self.phase = FramePhase::Looping;
        self.notes.cycled = Some(self.cycle);
        if self.stat.config().looping() == Looping::Infinite && self.cycle == 1 {
            self.notes.chain_ready = true;
        }
        debug!("{} starting cycle {}", self.id, self.cycle);
    }

    fn finish(&mut self) {
        self.finished = true;
        self.phase = FramePhase::Ending;

        for binding in &mut self.bindings {
            match binding.stop() {
                Ok(Some(writer)) => self.pending.push(writer),
                Ok(None) => {}
                Err(err) => warn!("{} stop hook of {} failed: {err}", self.id, binding.name()),
            }
        }

        if !self.pending.is_empty() {
            match self.outgoing.as_mut() {
                Some(batch) => batch.push(Arc::new(std::mem::take(&mut self.pending))),
                None => self.dirty = true,
            }
        }
    }

    /// Return to the pre-start state.
    fn rewind(&mut self) {
        self.stat = self.initial.fresh();
        for binding in &mut self.bindings {
            binding.reset();
        }
        self.phase = FramePhase::Created;
        self.cycle = 0;
        self.inited = false;
        self.optimized = false;
        self.high_water = None;
        self.stale = false;
        self.dirty = false;
        self.cycle_complete = false;
        self.finished = false;
        self.pending.clear();
        self.outgoing = None;
        self.notes = Notes::default();
        self.cache.clear(self.id);
    }

    fn status(&self) -> FrameStatus {
        FrameStatus {
            frame_id: self.id,
            phase: self.phase,
            cycle: self.cycle,
            stat: self.stat.clone(),
        }
    }
}

impl TimeBehaviour for Run {
    fn update(&mut self, step: f64, _total: f64) -> StepControl {
        if self.finished || self.cycle_complete {
            return StepControl::Halt;
        }
        if !self.inited {
            self.initialize();
        }

        let was_reversed = self.stat.is_reversed();
        self.stat.next(step);
        if self.stat.is_reversed() && !was_reversed {
            debug!("{} reversing in cycle {}", self.id, self.cycle);
            self.phase = FramePhase::Reversing;
            self.notes.reversing = true;
        } else if matches!(self.phase, FramePhase::Initializing | FramePhase::Looping) {
            self.phase = FramePhase::Running;
        }

        if self.can_replay(self.index()) {
            self.stale = true;
        } else {
            self.update_units();
        }
        self.dirty = true;
        self.notes.progressed = true;

        if self.stat.first_pass_complete() && self.caching() {
            self.optimized = true;
        }
        if self.stat.is_done() {
            self.cycle_complete = true;
            return StepControl::Halt;
        }
        StepControl::Continue
    }

    fn render(&mut self, _interpolation: f64) {
        if !self.dirty {
            return;
        }
        let Some(ticket) = self.gate.try_begin() else {
            trace!("{} writes still in flight, deferring render", self.id);
            return;
        };

        let index = self.index();
        let mut batch = WriteBatch::new(self.id, index as u64, ticket)
            .with_surfaces(self.surfaces.clone())
            .with_sink(Arc::clone(&self.sink));
        if !self.pending.is_empty() {
            batch.push(Arc::new(std::mem::take(&mut self.pending)));
        }
        batch.push(self.writers_for(index));

        self.outgoing = Some(batch);
        self.dirty = false;
    }
}

struct FrameState {
    clock: Clock,
    run: Run,
}

/// An animation: a tracker and a set of units bound to target surfaces.
///
/// Frames are shared as `Arc<AnimationFrame>` between the owner, the
/// scheduler and preceding frames in a chain.
pub struct AnimationFrame {
    id: FrameId,
    services: FrameServices,
    state: Mutex<FrameState>,
    shared: Arc<Shared>,
    gate: WriteGate,
    paused: AtomicBool,
    inited: AtomicBool,
    done: AtomicBool,
    ended: AtomicBool,
    release_listeners: AtomicBool,
    chained: Mutex<Vec<Arc<AnimationFrame>>>,
}

impl AnimationFrame {
    pub(crate) fn new(services: FrameServices, stat: Stat, bindings: Vec<Binding>) -> Self {
        let id = FrameId::new();
        let gate = WriteGate::new();
        let shared = Arc::new(Shared::default());

        let sink_shared = Arc::clone(&shared);
        let sink: FailureSink = Arc::new(move |failure| sink_shared.record_failure(failure));

        let mut surfaces: Vec<SharedSurface> = Vec::new();
        for binding in &bindings {
            if !surfaces.iter().any(|known| Arc::ptr_eq(known, binding.target())) {
                surfaces.push(Arc::clone(binding.target()));
            }
        }

        let clock = Clock::new(services.clock.with_delay(stat.config().delay));
        let run = Run {
            id,
            initial: stat.fresh(),
            stat,
            bindings,
            surfaces,
            cache: Arc::clone(&services.cache),
            cache_enabled: services.cache_enabled,
            cache_reverse: services.cache_reverse,
            gate: gate.clone(),
            sink,
            phase: FramePhase::Created,
            cycle: 0,
            inited: false,
            optimized: false,
            high_water: None,
            stale: false,
            dirty: false,
            cycle_complete: false,
            finished: false,
            pending: Vec::new(),
            outgoing: None,
            notes: Notes::default(),
        };

        Self {
            id,
            services,
            state: Mutex::new(FrameState { clock, run }),
            shared,
            gate,
            paused: AtomicBool::new(false),
            inited: AtomicBool::new(false),
            done: AtomicBool::new(false),
            ended: AtomicBool::new(false),
            release_listeners: AtomicBool::new(false),
            chained: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> FrameId {
        self.id
    }

    /// Advance the frame to host time `now`.
    pub fn tick(&self, now: Duration) -> TickOutcome {
        if self.done.load(Ordering::Acquire) {
            return TickOutcome::Finished;
        }
        let paused = self.paused.load(Ordering::Acquire);
        let loop_clock = self.services.clock.with_delay(Duration::ZERO);

        let (notes, status, batch) = {
            let mut state = sync::lock(&self.state);
            let FrameState { clock, run } = &mut *state;
            clock.advance(now, paused, run);
            run.settle(clock, loop_clock);

            self.inited.store(run.inited, Ordering::Release);
            let notes = std::mem::take(&mut run.notes);
            let status = notes.any().then(|| run.status());
            (notes, status, run.outgoing.take())
        };

        if let Some(batch) = batch {
            self.services.queue.submit(batch);
        }
        if notes.ended {
            self.done.store(true, Ordering::Release);
        }
        if let Some(status) = &status {
            self.dispatch(&notes, status);
        }

        if notes.ended {
            TickOutcome::Finished
        } else if notes.chain_ready {
            TickOutcome::ChainReady
        } else {
            TickOutcome::Running
        }
    }

    fn dispatch(&self, notes: &Notes, status: &FrameStatus) {
        {
            let mut events = sync::lock(&self.shared.events);
            if notes.began {
                events.push(FrameEvent::Began { frame_id: self.id });
            }
            if notes.reversing {
                events.push(FrameEvent::Reversing { frame_id: self.id });
            }
            if let Some(cycle) = notes.cycled {
                events.push(FrameEvent::Cycled {
                    frame_id: self.id,
                    cycle,
                });
            }
            if notes.ended {
                events.push(FrameEvent::Ended { frame_id: self.id });
            }
        }

        let listeners = &self.shared.listeners;
        if notes.began {
            listeners.emit_begin(status);
        }
        if notes.progressed {
            listeners.emit_progress(status);
        }
        if notes.ended && !self.ended.swap(true, Ordering::AcqRel) {
            listeners.emit_end(status);
            if self.release_listeners.load(Ordering::Acquire) {
                listeners.reset();
            }
        }
    }

    /// Stop advancing; elapsed time is discarded until resumed.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Called once, after the first step initialized the units.
    pub fn on_begin(&self, listener: impl FnMut(&FrameStatus) + Send + 'static) {
        self.shared.listeners.on_begin(listener);
    }

    /// Called after every tick that advanced the tracker.
    pub fn on_progress(&self, listener: impl FnMut(&FrameStatus) + Send + 'static) {
        self.shared.listeners.on_progress(listener);
    }

    /// Called once, when the final cycle completed.
    pub fn on_end(&self, listener: impl FnMut(&FrameStatus) + Send + 'static) {
        self.shared.listeners.on_end(listener);
    }

    /// Called for every failed surface write, possibly from the writer thread.
    pub fn on_error(&self, listener: impl FnMut(&WriteFailure) + Send + 'static) {
        self.shared.listeners.on_error(listener);
    }

    pub fn reset_listeners(&self) {
        self.shared.listeners.reset();
    }

    /// Drop every listener once the end listeners ran.
    pub fn release_listeners_on_end(&self, release: bool) {
        self.release_listeners.store(release, Ordering::Release);
    }

    pub fn listener_count(&self) -> usize {
        self.shared.listeners.len()
    }

    /// Take the events recorded since the last call.
    ///
    /// The queue is bounded by
    /// [`DEFAULT_EVENT_CAPACITY`](crate::events::DEFAULT_EVENT_CAPACITY);
    /// older events are dropped and counted by
    /// [`AnimationFrame::dropped_events`].
    pub fn drain_events(&self) -> Vec<FrameEvent> {
        sync::lock(&self.shared.events).drain().collect()
    }

    pub fn dropped_events(&self) -> u64 {
        sync::lock(&self.shared.events).dropped()
    }

    /// Start `next` when this frame ends.
    ///
    /// For a frame that loops forever, `next` starts after the first cycle.
    pub fn then(&self, next: Arc<AnimationFrame>) {
        sync::lock(&self.chained).push(next);
    }

    pub fn chained(&self) -> Vec<Arc<AnimationFrame>> {
        sync::lock(&self.chained).clone()
    }

    /// Return to the pre-start state so the frame can run again.
    ///
    /// Units are initialized again on the next tick, reading their start
    /// values from the surfaces as they are then.
    pub fn reset(&self) {
        let mut state = sync::lock(&self.state);
        let delay = state.run.initial.config().delay;
        state.run.rewind();
        state.clock = Clock::new(self.services.clock.with_delay(delay));

        self.inited.store(false, Ordering::Release);
        self.ended.store(false, Ordering::Release);
        self.done.store(false, Ordering::Release);
        debug!("{} reset", self.id);
    }

    /// Drop every cached writer of this frame; running on recomputes them.
    pub(crate) fn release(&self) {
        let mut state = sync::lock(&self.state);
        state.run.high_water = None;
        self.services.cache.clear(self.id);
    }

    /// Restart timing at the next tick, discarding the time since the last
    /// one. A frame stopped inside its delay waits the full delay again.
    pub(crate) fn reanchor(&self) {
        let mut state = sync::lock(&self.state);
        if state.clock.start().is_none() {
            return;
        }
        let delay = if state.run.inited {
            Duration::ZERO
        } else {
            state.run.initial.config().delay
        };
        state.clock = Clock::new(self.services.clock.with_delay(delay));
    }

    /// Drop the cached writers of one iteration so they are computed again.
    pub fn invalidate(&self, iteration: usize) {
        self.services.cache.clear_iteration(self.id, iteration);
    }

    pub fn status(&self) -> FrameStatus {
        sync::lock(&self.state).run.status()
    }

    pub fn phase(&self) -> FramePhase {
        sync::lock(&self.state).run.phase
    }

    /// Completed loop restarts.
    pub fn cycle(&self) -> u32 {
        sync::lock(&self.state).run.cycle
    }

    pub fn stat(&self) -> Stat {
        sync::lock(&self.state).run.stat.clone()
    }

    pub fn is_inited(&self) -> bool {
        self.inited.load(Ordering::Acquire)
    }

    /// True once the frame ended; stays true until [`AnimationFrame::reset`].
    pub fn is_over(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// True while a write batch of this frame has not finished executing.
    pub fn writes_in_flight(&self) -> bool {
        self.gate.is_in_flight()
    }
}

impl Drop for AnimationFrame {
    fn drop(&mut self) {
        self.services.cache.clear(self.id);
    }
}

impl fmt::Debug for AnimationFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationFrame")
            .field("id", &self.id)
            .field("over", &self.is_over())
            .field("paused", &self.is_paused())
            .finish_non_exhaustive()
    }
}

static_assertions::assert_impl_all!(AnimationFrame: Send, Sync);
