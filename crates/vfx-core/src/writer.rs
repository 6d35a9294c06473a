//! Deferred writers, write batches and the write queue.
//!
//! A [`DeferWriter`] is one committed value waiting to reach its surface.
//! Each render tick gathers the writers of one iteration into a
//! [`WriteBatch`], which owns a [`WriteTicket`] taken from the frame's
//! [`WriteGate`]. The ticket is released when the batch is dropped, after
//! it executed, so a frame never has two batches in flight.
//!
//! Batches run inline or on a dedicated writer thread fed by a bounded
//! channel, depending on [`WriteMode`].

use crate::error::SurfaceError;
use crate::events::WriteFailure;
use crate::surface::SharedSurface;
use crate::types::FrameId;
use log::{debug, warn};
use std::fmt;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use vfx_config::{WriteConfig, WriteMode};

type WriteFn = dyn Fn() -> Result<(), SurfaceError> + Send + Sync;

/// A deferred write to one surface.
#[derive(Clone)]
pub struct DeferWriter {
    target: String,
    fx: Arc<WriteFn>,
}

impl DeferWriter {
    pub fn new<F>(target: impl Into<String>, fx: F) -> Self
    where
        F: Fn() -> Result<(), SurfaceError> + Send + Sync + 'static,
    {
        Self {
            target: target.into(),
            fx: Arc::new(fx),
        }
    }

    /// A writer that stalls the batch it belongs to.
    pub fn sleep(duration: Duration) -> Self {
        Self::new("delay", move || {
            thread::sleep(duration);
            Ok(())
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn write(&self) -> Result<(), SurfaceError> {
        (self.fx)()
    }
}

impl fmt::Debug for DeferWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferWriter")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// Writers of one iteration, in unit order.
pub type Writers = Vec<DeferWriter>;

/// Receives write failures reported by executing batches.
pub type FailureSink = Arc<dyn Fn(WriteFailure) + Send + Sync>;

/// Begin-writing / done-writing handshake of one frame.
#[derive(Debug, Clone, Default)]
pub struct WriteGate(Arc<AtomicBool>);

impl WriteGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the gate if no batch is in flight.
    pub fn try_begin(&self) -> Option<WriteTicket> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| WriteTicket(self.clone()))
    }

    pub fn is_in_flight(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn finish(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Proof that a batch holds its frame's write gate; releases it on drop.
#[derive(Debug)]
pub struct WriteTicket(WriteGate);

impl Drop for WriteTicket {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// All writes of one render tick of one frame.
pub struct WriteBatch {
    frame: FrameId,
    iteration: u64,
    segments: Vec<Arc<Writers>>,
    surfaces: Vec<SharedSurface>,
    sink: Option<FailureSink>,
    _ticket: WriteTicket,
}

impl WriteBatch {
    pub fn new(frame: FrameId, iteration: u64, ticket: WriteTicket) -> Self {
        Self {
            frame,
            iteration,
            segments: Vec::new(),
            surfaces: Vec::new(),
            sink: None,
            _ticket: ticket,
        }
    }

    /// Append a list of writers, shared with the cache when replayed.
    pub fn push(&mut self, writers: Arc<Writers>) {
        if !writers.is_empty() {
            self.segments.push(writers);
        }
    }

    /// Surfaces flushed once every writer ran.
    pub fn with_surfaces(mut self, surfaces: Vec<SharedSurface>) -> Self {
        self.surfaces = surfaces;
        self
    }

    pub fn with_sink(mut self, sink: FailureSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn frame(&self) -> FrameId {
        self.frame
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn len(&self) -> usize {
        self.segments.iter().map(|writers| writers.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every writer, then flush the surfaces.
    ///
    /// A failing writer does not stop the others. Returns the number of
    /// failures reported.
    pub fn execute(self) -> usize {
        let mut failures = 0;

        for writer in self.segments.iter().flat_map(|writers| writers.iter()) {
            if let Err(error) = writer.write() {
                failures += 1;
                self.report(writer.target(), error);
            }
        }

        if !self.segments.is_empty() {
            for surface in &self.surfaces {
                if let Err(error) = surface.flush() {
                    failures += 1;
                    self.report(surface.id(), error);
                }
            }
        }

        failures
    }

    fn report(&self, target: &str, error: SurfaceError) {
        warn!(
            "{} iteration {}: write to {target} failed: {error}",
            self.frame, self.iteration
        );
        if let Some(sink) = &self.sink {
            sink(WriteFailure {
                frame_id: self.frame,
                target: target.to_string(),
                error,
            });
        }
    }
}

impl fmt::Debug for WriteBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteBatch")
            .field("frame", &self.frame)
            .field("iteration", &self.iteration)
            .field("writers", &self.len())
            .finish()
    }
}

/// Executes write batches inline or on a writer thread.
pub struct WriteQueue {
    sender: Option<SyncSender<WriteBatch>>,
    worker: Option<JoinHandle<()>>,
}

impl WriteQueue {
    /// Run every batch on the submitting thread.
    pub fn inline() -> Self {
        Self {
            sender: None,
            worker: None,
        }
    }

    /// Run batches on a writer thread with at most `depth` queued batches.
    pub fn worker(depth: usize) -> io::Result<Self> {
        let (sender, receiver) = mpsc::sync_channel::<WriteBatch>(depth.max(1));
        let worker = thread::Builder::new()
            .name("vfx-writer".to_string())
            .spawn(move || {
                for batch in receiver {
                    batch.execute();
                }
                debug!("write worker exiting");
            })?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    pub fn from_config(config: &WriteConfig) -> io::Result<Self> {
        match config.mode {
            WriteMode::Inline => Ok(Self::inline()),
            WriteMode::Worker => Self::worker(config.queue_depth),
        }
    }

    pub fn is_inline(&self) -> bool {
        self.sender.is_none()
    }

    /// Hand a batch over for execution.
    ///
    /// Never blocks on a full queue; the batch runs inline instead.
    pub fn submit(&self, batch: WriteBatch) {
        let Some(sender) = &self.sender else {
            batch.execute();
            return;
        };

        match sender.try_send(batch) {
            Ok(()) => {}
            Err(TrySendError::Full(batch)) => {
                warn!("write queue full, running {batch:?} inline");
                batch.execute();
            }
            Err(TrySendError::Disconnected(batch)) => {
                warn!("write worker is gone, running {batch:?} inline");
                batch.execute();
            }
        }
    }
}

impl Drop for WriteQueue {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            warn!("write worker panicked");
        }
    }
}

impl fmt::Debug for WriteQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteQueue")
            .field("inline", &self.is_inline())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{MemorySurface, TargetSurface};
    use std::sync::Mutex;

    fn write_to(surface: &Arc<MemorySurface>, property: &'static str, value: &'static str) -> DeferWriter {
        let target = Arc::clone(surface);
        DeferWriter::new(surface.id().to_string(), move || target.write(property, value, false))
    }

    #[test]
    fn test_gate_handshake() {
        let gate = WriteGate::new();
        let ticket = gate.try_begin().unwrap();
        assert!(gate.is_in_flight());
        assert!(gate.try_begin().is_none());

        drop(ticket);
        assert!(!gate.is_in_flight());
        assert!(gate.try_begin().is_some());
    }

    #[test]
    fn test_batch_releases_gate_after_execute() {
        let gate = WriteGate::new();
        let surface = MemorySurface::shared("box");
        let mut batch = WriteBatch::new(FrameId::new(), 1, gate.try_begin().unwrap())
            .with_surfaces(vec![surface.clone() as SharedSurface]);
        batch.push(Arc::new(vec![write_to(&surface, "width", "5px")]));

        assert!(gate.is_in_flight());
        assert_eq!(batch.execute(), 0);
        assert!(!gate.is_in_flight());
        assert_eq!(surface.value("width").as_deref(), Some("5px"));
    }

    #[test]
    fn test_failure_does_not_stop_siblings() {
        let gate = WriteGate::new();
        let surface = MemorySurface::shared("box");
        surface.reject("color");

        let failures = Arc::new(Mutex::new(Vec::new()));
        let sink_failures = Arc::clone(&failures);
        let mut batch = WriteBatch::new(FrameId::new(), 3, gate.try_begin().unwrap())
            .with_surfaces(vec![surface.clone() as SharedSurface])
            .with_sink(Arc::new(move |failure| sink_failures.lock().unwrap().push(failure)));
        batch.push(Arc::new(vec![
            write_to(&surface, "color", "red"),
            write_to(&surface, "width", "8px"),
        ]));

        assert_eq!(batch.execute(), 1);
        assert_eq!(surface.value("width").as_deref(), Some("8px"));

        let failures = failures.lock().unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].target, "box");
        assert!(matches!(failures[0].error, SurfaceError::Rejected { .. }));
    }

    #[test]
    fn test_empty_segments_are_skipped() {
        let gate = WriteGate::new();
        let surface = MemorySurface::shared("box");
        let mut batch = WriteBatch::new(FrameId::new(), 0, gate.try_begin().unwrap())
            .with_surfaces(vec![surface.clone() as SharedSurface]);
        batch.push(Arc::new(Vec::new()));

        assert!(batch.is_empty());
        batch.execute();
        assert_eq!(surface.flush_count(), 0);
    }

    #[test]
    fn test_worker_queue_executes_batches() {
        let queue = WriteQueue::worker(2).unwrap();
        let surface = MemorySurface::shared("box");
        let gate = WriteGate::new();

        let mut batch = WriteBatch::new(FrameId::new(), 1, gate.try_begin().unwrap())
            .with_surfaces(vec![surface.clone() as SharedSurface]);
        batch.push(Arc::new(vec![write_to(&surface, "height", "12px")]));
        queue.submit(batch);

        drop(queue);
        assert!(!gate.is_in_flight());
        assert_eq!(surface.value("height").as_deref(), Some("12px"));
    }

    #[test]
    fn test_inline_queue() {
        let queue = WriteQueue::from_config(&WriteConfig {
            mode: WriteMode::Inline,
            queue_depth: 1,
        })
        .unwrap();
        assert!(queue.is_inline());

        let surface = MemorySurface::shared("box");
        let gate = WriteGate::new();
        let mut batch = WriteBatch::new(FrameId::new(), 1, gate.try_begin().unwrap())
            .with_surfaces(vec![surface.clone() as SharedSurface]);
        batch.push(Arc::new(vec![write_to(&surface, "top", "1px")]));
        queue.submit(batch);
        assert_eq!(surface.value("top").as_deref(), Some("1px"));
    }
}
