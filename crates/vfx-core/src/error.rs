//! Error types for the animation engine.

use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, VfxError>;

/// Errors reported synchronously by the construction and scheduling APIs.
#[derive(Error, Debug)]
pub enum VfxError {
    /// No sequence is registered under the requested name.
    #[error("no sequence registered with name [{0}]")]
    UnknownSequence(String),

    /// A prototype did not serialize to a map of fields.
    #[error("prototype for sequence [{name}] is not a struct of fields")]
    InvalidPrototype { name: String },

    /// The override map could not populate the unit's configuration.
    #[error("malformed overrides for sequence [{name}]: {source}")]
    InvalidOverrides {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// The unit rejected a configured value.
    #[error("invalid value for sequence [{name}]: {reason}")]
    InvalidValue { name: String, reason: String },

    /// A declarative property map does not say which sequence to build.
    #[error("animation entry {index} has no `animate` attribute")]
    MissingSequenceName { index: usize },

    /// A frame was requested without any surface to animate.
    #[error("animation frame has no target surfaces")]
    NoTargets,

    /// The host scheduler refused the frame.
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    /// The deferred writer thread could not be spawned.
    #[error("failed to spawn write worker: {0}")]
    Worker(#[from] std::io::Error),
}

/// Errors raised by a target surface while reading or writing properties.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    /// The property does not exist on the surface.
    #[error("property `{0}` not found")]
    NotFound(String),

    /// The surface refused the write.
    #[error("write to `{property}` rejected: {reason}")]
    Rejected { property: String, reason: String },

    /// Committing staged writes failed.
    #[error("flush failed: {0}")]
    Flush(String),
}

/// Errors raised by a host scheduler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// The host cannot accept new recurring callbacks.
    #[error("host scheduler is unavailable")]
    Unavailable,
}
