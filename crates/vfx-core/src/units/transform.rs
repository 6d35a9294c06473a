use super::{format_number, parse_number};
use crate::easing::{DEFAULT_EASING, EasingCurve};
use crate::error::SurfaceError;
use crate::registry::Animator;
use crate::sequence::{Capabilities, Progress, Sequence};
use crate::surface::SharedSurface;
use crate::writer::DeferWriter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const TRANSFORM: &str = "transform";

/// Configuration of one transform term, such as `rotate(30deg)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Transform function name, such as `rotate` or `translateX`.
    pub function: String,
    /// Target value.
    pub value: f64,
    /// Explicit start value; read from the surface when absent.
    #[serde(default)]
    pub from: Option<f64>,
    /// Value assumed when the surface has no such term.
    pub rest: f64,
    pub unit: String,
    pub easing: String,
    /// First-write delay in milliseconds.
    pub delay: u64,
    /// Remove the term from the surface when the frame ends.
    pub clear_on_end: bool,
}

impl TransformConfig {
    pub fn term(function: &str, unit: &str, rest: f64) -> Self {
        Self {
            function: function.to_string(),
            value: rest,
            from: None,
            rest,
            unit: unit.to_string(),
            easing: DEFAULT_EASING.to_string(),
            delay: 0,
            clear_on_end: false,
        }
    }
}

/// Value of `function(...)` inside a transform list.
///
/// `parse_term("translateX(4px) rotate(30deg)", "rotate")` is `Some(30.0)`.
pub fn parse_term(transform: &str, function: &str) -> Option<f64> {
    let mut rest = transform;
    while let Some(at) = rest.find(function) {
        let after = &rest[at + function.len()..];
        let preceded_by_name = rest[..at]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '-');
        if !preceded_by_name && let Some(args) = after.strip_prefix('(') {
            let inner = &args[..args.find(')')?];
            return parse_number(inner).map(|(value, _)| value);
        }
        rest = after;
    }
    None
}

/// Animates one term of the `transform` property.
#[derive(Debug)]
pub struct TransformUnit {
    config: TransformConfig,
    start: f64,
    current: f64,
}

impl TransformUnit {
    pub fn current(&self) -> f64 {
        self.current
    }

    fn term(&self) -> String {
        format!(
            "{}({}{})",
            self.config.function,
            format_number(self.current),
            self.config.unit
        )
    }
}

impl Animator for TransformUnit {
    type Config = TransformConfig;

    fn from_config(config: TransformConfig) -> Result<Self, String> {
        let valid_name = !config.function.is_empty()
            && config.function.chars().all(|c| c.is_ascii_alphanumeric());
        if !valid_name {
            return Err(format!("`{}` is not a transform function", config.function));
        }
        if !config.value.is_finite() {
            return Err(format!("target value {} is not finite", config.value));
        }
        Ok(Self {
            start: config.rest,
            current: config.rest,
            config,
        })
    }
}

impl Sequence for TransformUnit {
    fn name(&self) -> &str {
        &self.config.function
    }

    fn init(&mut self, target: &SharedSurface) {
        let existing = target
            .read(TRANSFORM, None)
            .and_then(|read| parse_term(&read.value, &self.config.function));
        self.start = self.config.from.or(existing).unwrap_or(self.config.rest);
        self.current = self.start;
    }

    fn update(&mut self, progress: &Progress, easing: &EasingCurve) {
        let delta = self.config.value - self.start;
        self.current = easing.interpolate(self.start, delta, progress.ratio);
    }

    fn write(&self, target: &SharedSurface) -> Option<DeferWriter> {
        let target = Arc::clone(target);
        let key = self.config.function.clone();
        let term = self.term();
        Some(DeferWriter::new(target.id().to_string(), move || {
            target.write_multivalue(TRANSFORM, &key, &term, false)
        }))
    }

    fn easing(&self) -> &str {
        &self.config.easing
    }

    fn capabilities(&self) -> Capabilities {
        let caps = Capabilities::RESETTABLE | Capabilities::STOPPABLE;
        if self.config.delay > 0 {
            caps | Capabilities::DELAYED
        } else {
            caps
        }
    }

    fn reset(&mut self) {
        self.current = self.start;
    }

    fn stop(&mut self, target: &SharedSurface) -> Result<Option<DeferWriter>, SurfaceError> {
        if !self.config.clear_on_end {
            return Ok(None);
        }
        let target = Arc::clone(target);
        let key = self.config.function.clone();
        Ok(Some(DeferWriter::new(target.id().to_string(), move || {
            target.erase_multivalue(TRANSFORM, &key)
        })))
    }

    fn first_write_delay(&self) -> Duration {
        Duration::from_millis(self.config.delay)
    }
}
