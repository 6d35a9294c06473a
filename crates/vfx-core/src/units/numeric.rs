use super::{format_number, parse_number};
use crate::easing::{DEFAULT_EASING, EasingCurve};
use crate::registry::Animator;
use crate::sequence::{Capabilities, Progress, Sequence};
use crate::surface::SharedSurface;
use crate::writer::DeferWriter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Configuration of a numeric property animation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericConfig {
    pub property: String,
    /// Target value.
    pub value: f64,
    /// Explicit start value; read from the surface when absent.
    #[serde(default)]
    pub from: Option<f64>,
    /// Unit suffix written after the value.
    pub unit: String,
    pub easing: String,
    /// First-write delay in milliseconds.
    pub delay: u64,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl NumericConfig {
    pub fn property(property: &str, unit: &str) -> Self {
        Self {
            property: property.to_string(),
            value: 0.0,
            from: None,
            unit: unit.to_string(),
            easing: DEFAULT_EASING.to_string(),
            delay: 0,
            min: None,
            max: None,
        }
    }
}

/// Animates a property holding a single number with an optional suffix.
#[derive(Debug)]
pub struct NumericUnit {
    config: NumericConfig,
    start: f64,
    current: f64,
    priority: bool,
}

impl NumericUnit {
    pub fn current(&self) -> f64 {
        self.current
    }

    fn clamp(&self, value: f64) -> f64 {
        let value = self.config.min.map_or(value, |min| value.max(min));
        self.config.max.map_or(value, |max| value.min(max))
    }
}

impl Animator for NumericUnit {
    type Config = NumericConfig;

    fn from_config(config: NumericConfig) -> Result<Self, String> {
        if config.property.trim().is_empty() {
            return Err("property name is empty".to_string());
        }
        if !config.value.is_finite() {
            return Err(format!("target value {} is not finite", config.value));
        }
        if let (Some(min), Some(max)) = (config.min, config.max)
            && min > max
        {
            return Err(format!("min {min} exceeds max {max}"));
        }
        Ok(Self {
            config,
            start: 0.0,
            current: 0.0,
            priority: false,
        })
    }
}

impl Sequence for NumericUnit {
    fn name(&self) -> &str {
        &self.config.property
    }

    fn init(&mut self, target: &SharedSurface) {
        let read = target.read(&self.config.property, None);
        self.priority = read.as_ref().is_some_and(|read| read.priority);

        let existing = read
            .as_ref()
            .and_then(|read| parse_number(&read.value))
            .map(|(value, _)| value);
        self.start = self.config.from.or(existing).unwrap_or(0.0);
        self.current = self.start;
    }

    fn update(&mut self, progress: &Progress, easing: &EasingCurve) {
        let delta = self.config.value - self.start;
        self.current = self.clamp(easing.interpolate(self.start, delta, progress.ratio));
    }

    fn write(&self, target: &SharedSurface) -> Option<DeferWriter> {
        let target = Arc::clone(target);
        let property = self.config.property.clone();
        let value = format!("{}{}", format_number(self.current), self.config.unit);
        let priority = self.priority;
        Some(DeferWriter::new(target.id().to_string(), move || {
            target.write(&property, &value, priority)
        }))
    }

    fn easing(&self) -> &str {
        &self.config.easing
    }

    fn capabilities(&self) -> Capabilities {
        if self.config.delay > 0 {
            Capabilities::RESETTABLE | Capabilities::DELAYED
        } else {
            Capabilities::RESETTABLE
        }
    }

    fn reset(&mut self) {
        self.current = self.start;
    }

    fn first_write_delay(&self) -> Duration {
        Duration::from_millis(self.config.delay)
    }
}
