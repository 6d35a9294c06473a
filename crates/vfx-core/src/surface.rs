//! Target surfaces: the renderable items whose properties are animated.
//!
//! The engine treats property values as opaque strings. Units parse what
//! they read and format what they write; the surface only stores them.
//! Writes may be staged and committed together on [`TargetSurface::flush`].

use crate::error::SurfaceError;
use crate::sync;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A property value read from a surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadValue {
    pub value: String,
    pub priority: bool,
}

/// A renderable item with readable and writable properties.
pub trait TargetSurface: Send + Sync {
    /// Stable identifier used in logs and failure events.
    fn id(&self) -> &str;

    /// Read a property, optionally restricted by a selector.
    fn read(&self, property: &str, selector: Option<&str>) -> Option<ReadValue>;

    /// Stage a property write.
    fn write(&self, property: &str, value: &str, priority: bool) -> Result<(), SurfaceError>;

    /// Stage one term of a composite property such as `transform`.
    fn write_multivalue(
        &self,
        property: &str,
        key: &str,
        value: &str,
        priority: bool,
    ) -> Result<(), SurfaceError>;

    /// Remove one term of a composite property.
    fn erase_multivalue(&self, property: &str, key: &str) -> Result<(), SurfaceError>;

    /// Commit staged writes.
    fn flush(&self) -> Result<(), SurfaceError>;
}

/// Shared handle to a target surface.
pub type SharedSurface = Arc<dyn TargetSurface>;

#[derive(Debug, Default)]
struct MemoryState {
    committed: HashMap<String, ReadValue>,
    pending: HashMap<String, ReadValue>,
    terms: HashMap<String, BTreeMap<String, String>>,
    dirty_terms: HashSet<String>,
    rejected: HashSet<String>,
    fail_flush: bool,
}

/// In-memory surface with staged writes.
///
/// Plain writes are committed on flush. Multivalue terms are kept per
/// property, keyed by term, and joined with spaces on flush.
#[derive(Default)]
pub struct MemorySurface {
    id: String,
    state: Mutex<MemoryState>,
    writes: AtomicUsize,
    flushes: AtomicUsize,
}

impl MemorySurface {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Create a shared surface.
    pub fn shared(id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(id))
    }

    /// Set a committed property value.
    pub fn with_property(self, property: &str, value: &str) -> Self {
        sync::lock(&self.state).committed.insert(
            property.to_string(),
            ReadValue {
                value: value.to_string(),
                priority: false,
            },
        );
        self
    }

    /// Committed value of a property.
    pub fn value(&self, property: &str) -> Option<String> {
        sync::lock(&self.state)
            .committed
            .get(property)
            .map(|read| read.value.clone())
    }

    /// Make every write to `property` fail.
    pub fn reject(&self, property: &str) {
        sync::lock(&self.state).rejected.insert(property.to_string());
    }

    /// Make flushes fail.
    pub fn fail_flush(&self, fail: bool) {
        sync::lock(&self.state).fail_flush = fail;
    }

    /// Number of successful writes, plain and multivalue.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    fn check(state: &MemoryState, property: &str) -> Result<(), SurfaceError> {
        if state.rejected.contains(property) {
            return Err(SurfaceError::Rejected {
                property: property.to_string(),
                reason: "property is read-only".to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for MemorySurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySurface")
            .field("id", &self.id)
            .field("writes", &self.write_count())
            .field("flushes", &self.flush_count())
            .finish()
    }
}

impl TargetSurface for MemorySurface {
    fn id(&self) -> &str {
        &self.id
    }

    fn read(&self, property: &str, _selector: Option<&str>) -> Option<ReadValue> {
        sync::lock(&self.state).committed.get(property).cloned()
    }

    fn write(&self, property: &str, value: &str, priority: bool) -> Result<(), SurfaceError> {
        let mut state = sync::lock(&self.state);
        Self::check(&state, property)?;
        state.pending.insert(
            property.to_string(),
            ReadValue {
                value: value.to_string(),
                priority,
            },
        );
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn write_multivalue(
        &self,
        property: &str,
        key: &str,
        value: &str,
        _priority: bool,
    ) -> Result<(), SurfaceError> {
        let mut state = sync::lock(&self.state);
        Self::check(&state, property)?;
        state
            .terms
            .entry(property.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        state.dirty_terms.insert(property.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn erase_multivalue(&self, property: &str, key: &str) -> Result<(), SurfaceError> {
        let mut state = sync::lock(&self.state);
        Self::check(&state, property)?;
        if let Some(terms) = state.terms.get_mut(property) {
            terms.remove(key);
        }
        state.dirty_terms.insert(property.to_string());
        Ok(())
    }

    fn flush(&self) -> Result<(), SurfaceError> {
        let mut state = sync::lock(&self.state);
        if state.fail_flush {
            return Err(SurfaceError::Flush(format!("surface {} is detached", self.id)));
        }

        let pending = std::mem::take(&mut state.pending);
        state.committed.extend(pending);

        let dirty = std::mem::take(&mut state.dirty_terms);
        for property in dirty {
            let joined = state
                .terms
                .get(&property)
                .map(|terms| terms.values().cloned().collect::<Vec<_>>().join(" "))
                .unwrap_or_default();
            if joined.is_empty() {
                state.committed.remove(&property);
            } else {
                state.committed.insert(
                    property,
                    ReadValue {
                        value: joined,
                        priority: false,
                    },
                );
            }
        }

        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
