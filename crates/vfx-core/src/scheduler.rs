//! Registration of frames against a host scheduler.
//!
//! Each started frame gets exactly one recurring host callback. The callback
//! ticks the frame with the host's time and deregisters itself when the
//! frame ends, then starts any frames chained after it.

use crate::error::Result;
use crate::frame::{AnimationFrame, TickOutcome};
use crate::host::{HostHandle, HostScheduler};
use crate::sync;
use crate::types::FrameId;
use log::{debug, error};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock, Weak};

struct Registration {
    host: HostHandle,
    frame: Weak<AnimationFrame>,
}

struct Inner {
    host: Arc<dyn HostScheduler>,
    active: RwLock<HashMap<FrameId, Registration>>,
}

impl Inner {
    fn start(self: &Arc<Self>, frame: Arc<AnimationFrame>) -> Result<FrameHandle> {
        let id = frame.id();
        let handle = FrameHandle {
            id,
            scheduler: Arc::downgrade(self),
        };

        let mut active = sync::write(&self.active);
        if active.contains_key(&id) {
            return Ok(handle);
        }
        if frame.is_over() {
            frame.reset();
        } else {
            frame.reanchor();
        }

        let registered = Arc::downgrade(&frame);
        let scheduler = Arc::downgrade(self);
        let host_handle = self.host.schedule_recurring(Box::new(move |now| {
            let outcome = frame.tick(now);
            if outcome == TickOutcome::Running {
                return;
            }
            let Some(inner) = scheduler.upgrade() else {
                return;
            };
            if outcome == TickOutcome::Finished {
                inner.stop(frame.id());
            }
            inner.release_chain(&frame);
        }))?;

        active.insert(
            id,
            Registration {
                host: host_handle,
                frame: registered,
            },
        );
        debug!("scheduled {id} as host callback {}", host_handle.0);
        Ok(handle)
    }

    fn stop(&self, id: FrameId) -> bool {
        let Some(registration) = sync::write(&self.active).remove(&id) else {
            return false;
        };
        self.host.cancel(registration.host);
        if let Some(frame) = registration.frame.upgrade() {
            frame.release();
        }
        debug!("stopped {id}");
        true
    }

    fn release_chain(self: &Arc<Self>, frame: &AnimationFrame) {
        for next in frame.chained() {
            let next_id = next.id();
            if let Err(err) = self.start(next) {
                error!("failed to start {next_id} chained after {}: {err}", frame.id());
            }
        }
    }
}

/// Starts and stops frames on a host scheduler.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new(host: Arc<dyn HostScheduler>) -> Self {
        Self {
            inner: Arc::new(Inner {
                host,
                active: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Register `frame` with the host.
    ///
    /// Starting an active frame returns its existing handle. A frame that
    /// already ended is reset first; a stopped one resumes from where it
    /// stopped without catching up the time in between. Fails if the host
    /// refuses the callback.
    pub fn start(&self, frame: Arc<AnimationFrame>) -> Result<FrameHandle> {
        self.inner.start(frame)
    }

    /// Deregister a frame and drop its cached writers. Stopping twice is a
    /// no-op returning false.
    pub fn stop(&self, id: FrameId) -> bool {
        self.inner.stop(id)
    }

    pub fn is_active(&self, id: FrameId) -> bool {
        sync::read(&self.inner.active).contains_key(&id)
    }

    pub fn active_count(&self) -> usize {
        sync::read(&self.inner.active).len()
    }

    pub fn host(&self) -> &Arc<dyn HostScheduler> {
        &self.inner.host
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("active", &self.active_count())
            .finish()
    }
}

/// Handle to a started frame.
#[derive(Debug, Clone)]
pub struct FrameHandle {
    id: FrameId,
    scheduler: Weak<Inner>,
}

impl FrameHandle {
    pub fn id(&self) -> FrameId {
        self.id
    }

    /// Stop ticking the frame. In-flight writes still complete.
    pub fn stop(&self) -> bool {
        self.scheduler
            .upgrade()
            .is_some_and(|inner| inner.stop(self.id))
    }

    pub fn is_active(&self) -> bool {
        self.scheduler
            .upgrade()
            .is_some_and(|inner| sync::read(&inner.active).contains_key(&self.id))
    }
}

impl fmt::Debug for Inner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inner")
            .field("active", &sync::read(&self.active).len())
            .finish()
    }
}

static_assertions::assert_impl_all!(Scheduler: Send, Sync);
static_assertions::assert_impl_all!(FrameHandle: Send, Sync);
