//! Host schedulers: the per-refresh callback facility frames run on.
//!
//! - [`ManualHost`] advances only when told to, for tests and embedding in
//!   an existing loop
//! - [`ThreadHost`] runs its callbacks from a dedicated refresh thread
//!
//! Both take each callback out of the table while it runs, so a callback is
//! never invoked concurrently with itself and may schedule or cancel
//! callbacks (including its own) from inside.

use crate::error::ScheduleError;
use crate::sync;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// A recurring callback, given the host's current time.
pub type TickCallback = Box<dyn FnMut(Duration) + Send>;

/// Handle of a registered callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostHandle(pub u64);

/// A facility invoking callbacks once per display refresh.
pub trait HostScheduler: Send + Sync {
    /// Register `callback` to run on every refresh.
    fn schedule_recurring(&self, callback: TickCallback) -> Result<HostHandle, ScheduleError>;

    /// Deregister a callback. Returns false if it was not registered.
    fn cancel(&self, handle: HostHandle) -> bool;
}

#[derive(Default)]
struct CallbackTable {
    next: AtomicU64,
    // A slot is `None` while its callback runs.
    slots: Mutex<BTreeMap<u64, Option<TickCallback>>>,
}

impl CallbackTable {
    fn insert(&self, callback: TickCallback) -> HostHandle {
        let id = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        sync::lock(&self.slots).insert(id, Some(callback));
        HostHandle(id)
    }

    fn cancel(&self, handle: HostHandle) -> bool {
        sync::lock(&self.slots).remove(&handle.0).is_some()
    }

    fn len(&self) -> usize {
        sync::lock(&self.slots).len()
    }

    /// Run every registered callback once. Returns how many ran.
    fn run_all(&self, now: Duration) -> usize {
        let ids: Vec<u64> = sync::lock(&self.slots).keys().copied().collect();
        let mut ran = 0;
        for id in ids {
            let taken = sync::lock(&self.slots).get_mut(&id).and_then(Option::take);
            let Some(mut callback) = taken else {
                continue;
            };
            callback(now);
            ran += 1;
            if let Some(slot) = sync::lock(&self.slots).get_mut(&id) {
                *slot = Some(callback);
            }
        }
        ran
    }
}

/// A host advanced explicitly by its owner.
pub struct ManualHost {
    table: CallbackTable,
    now: Mutex<Duration>,
    available: AtomicBool,
}

impl ManualHost {
    pub fn new() -> Self {
        Self {
            table: CallbackTable::default(),
            now: Mutex::new(Duration::ZERO),
            available: AtomicBool::new(true),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Refuse new registrations while unavailable.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    pub fn now(&self) -> Duration {
        *sync::lock(&self.now)
    }

    /// Move time forward by `delta` and run every callback once.
    pub fn advance(&self, delta: Duration) -> usize {
        let now = {
            let mut now = sync::lock(&self.now);
            *now += delta;
            *now
        };
        self.table.run_all(now)
    }

    /// Run every callback once without moving time.
    pub fn tick(&self) -> usize {
        self.table.run_all(self.now())
    }

    /// Advance in `step` increments until no callback is left or `limit`
    /// refreshes ran. Returns the number of refreshes.
    pub fn run_until_idle(&self, step: Duration, limit: usize) -> usize {
        let mut refreshes = 0;
        while self.active_count() > 0 && refreshes < limit {
            self.advance(step);
            refreshes += 1;
        }
        refreshes
    }

    pub fn active_count(&self) -> usize {
        self.table.len()
    }
}

impl Default for ManualHost {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ManualHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualHost")
            .field("now", &self.now())
            .field("active", &self.active_count())
            .finish()
    }
}

impl HostScheduler for ManualHost {
    fn schedule_recurring(&self, callback: TickCallback) -> Result<HostHandle, ScheduleError> {
        if !self.available.load(Ordering::Acquire) {
            return Err(ScheduleError::Unavailable);
        }
        Ok(self.table.insert(callback))
    }

    fn cancel(&self, handle: HostHandle) -> bool {
        self.table.cancel(handle)
    }
}

/// A host running callbacks from a refresh thread at a fixed interval.
pub struct ThreadHost {
    table: Arc<CallbackTable>,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    interval: Duration,
}

impl ThreadHost {
    /// Start the refresh thread.
    pub fn spawn(interval: Duration) -> io::Result<Arc<Self>> {
        let table = Arc::new(CallbackTable::default());
        let running = Arc::new(AtomicBool::new(true));

        let thread_table = Arc::clone(&table);
        let thread_running = Arc::clone(&running);
        let worker = thread::Builder::new()
            .name("vfx-refresh".to_string())
            .spawn(move || {
                let epoch = Instant::now();
                while thread_running.load(Ordering::Acquire) {
                    thread_table.run_all(epoch.elapsed());
                    thread::sleep(interval);
                }
                debug!("refresh thread exiting");
            })?;

        Ok(Arc::new(Self {
            table,
            running,
            worker: Mutex::new(Some(worker)),
            interval,
        }))
    }

    /// Start a refresh thread at `hz` refreshes per second.
    pub fn with_rate(hz: u32) -> io::Result<Arc<Self>> {
        Self::spawn(Duration::from_secs_f64(1.0 / f64::from(hz.max(1))))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn active_count(&self) -> usize {
        self.table.len()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop the refresh thread; later registrations fail.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        let Some(worker) = sync::lock(&self.worker).take() else {
            return;
        };
        if worker.thread().id() == thread::current().id() {
            return;
        }
        if worker.join().is_err() {
            warn!("refresh thread panicked");
        }
    }
}

impl Drop for ThreadHost {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for ThreadHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadHost")
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .field("active", &self.active_count())
            .finish()
    }
}

impl HostScheduler for ThreadHost {
    fn schedule_recurring(&self, callback: TickCallback) -> Result<HostHandle, ScheduleError> {
        if !self.is_running() {
            return Err(ScheduleError::Unavailable);
        }
        Ok(self.table.insert(callback))
    }

    fn cancel(&self, handle: HostHandle) -> bool {
        self.table.cancel(handle)
    }
}

static_assertions::assert_impl_all!(ManualHost: Send, Sync);
static_assertions::assert_impl_all!(ThreadHost: Send, Sync);
