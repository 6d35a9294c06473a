use super::format_number;
use crate::easing::{DEFAULT_EASING, EasingCurve};
use crate::registry::Animator;
use crate::sequence::{Capabilities, Progress, Sequence};
use crate::surface::SharedSurface;
use crate::writer::DeferWriter;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// An RGBA color with 0-255 channels and 0-1 alpha.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Default for Rgba {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }
}

impl Rgba {
    pub const fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(...)`, `rgba(...)` or a
    /// handful of keywords.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim().to_ascii_lowercase();
        if let Some(hex) = text.strip_prefix('#') {
            return Self::parse_hex(hex);
        }
        if let Some(args) = text
            .strip_prefix("rgba(")
            .or_else(|| text.strip_prefix("rgb("))
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let values = args
                .split(',')
                .map(|arg| arg.trim().parse::<f64>().ok())
                .collect::<Option<Vec<_>>>()?;
            return match values.as_slice() {
                [r, g, b] => Some(Self::new(*r, *g, *b, 1.0).clamped()),
                [r, g, b, a] => Some(Self::new(*r, *g, *b, *a).clamped()),
                _ => None,
            };
        }
        match text.as_str() {
            "black" => Some(Self::new(0.0, 0.0, 0.0, 1.0)),
            "white" => Some(Self::new(255.0, 255.0, 255.0, 1.0)),
            "red" => Some(Self::new(255.0, 0.0, 0.0, 1.0)),
            "green" => Some(Self::new(0.0, 128.0, 0.0, 1.0)),
            "blue" => Some(Self::new(0.0, 0.0, 255.0, 1.0)),
            "transparent" => Some(Self::new(0.0, 0.0, 0.0, 0.0)),
            _ => None,
        }
    }

    fn parse_hex(hex: &str) -> Option<Self> {
        let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(f64::from);
        let short = |i: usize| channel(&hex[i..i + 1]).map(|v| v * 17.0);
        if !hex.is_ascii() {
            return None;
        }
        match hex.len() {
            3 => Some(Self::new(short(0)?, short(1)?, short(2)?, 1.0)),
            6 | 8 => {
                let alpha = if hex.len() == 8 {
                    channel(&hex[6..8])? / 255.0
                } else {
                    1.0
                };
                Some(Self::new(
                    channel(&hex[0..2])?,
                    channel(&hex[2..4])?,
                    channel(&hex[4..6])?,
                    alpha,
                ))
            }
            _ => None,
        }
    }

    fn clamped(self) -> Self {
        Self::new(
            self.r.clamp(0.0, 255.0),
            self.g.clamp(0.0, 255.0),
            self.b.clamp(0.0, 255.0),
            self.a.clamp(0.0, 1.0),
        )
    }

    /// Per-channel interpolation towards `to`.
    pub fn lerp(&self, to: &Self, t: f64) -> Self {
        let mix = |from: f64, to: f64| from + (to - from) * t;
        Self::new(mix(self.r, to.r), mix(self.g, to.g), mix(self.b, to.b), mix(self.a, to.a)).clamped()
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rgba({}, {}, {}, {})",
            self.r.round(),
            self.g.round(),
            self.b.round(),
            format_number(self.a)
        )
    }
}

/// Configuration of a color property animation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorConfig {
    pub property: String,
    /// Target color.
    pub value: String,
    pub easing: String,
    /// First-write delay in milliseconds.
    pub delay: u64,
}

impl ColorConfig {
    pub fn property(property: &str) -> Self {
        Self {
            property: property.to_string(),
            value: "black".to_string(),
            easing: DEFAULT_EASING.to_string(),
            delay: 0,
        }
    }
}

/// Animates a color property channel by channel.
#[derive(Debug)]
pub struct ColorUnit {
    config: ColorConfig,
    to: Rgba,
    start: Rgba,
    current: Rgba,
    priority: bool,
}

impl ColorUnit {
    pub fn current(&self) -> Rgba {
        self.current
    }
}

impl Animator for ColorUnit {
    type Config = ColorConfig;

    fn from_config(config: ColorConfig) -> Result<Self, String> {
        let to = Rgba::parse(&config.value).ok_or_else(|| format!("`{}` is not a color", config.value))?;
        Ok(Self {
            config,
            to,
            start: Rgba::default(),
            current: Rgba::default(),
            priority: false,
        })
    }
}

impl Sequence for ColorUnit {
    fn name(&self) -> &str {
        &self.config.property
    }

    fn init(&mut self, target: &SharedSurface) {
        let read = target.read(&self.config.property, None);
        self.priority = read.as_ref().is_some_and(|read| read.priority);
        self.start = read
            .and_then(|read| Rgba::parse(&read.value))
            .unwrap_or_default();
        self.current = self.start;
    }

    fn update(&mut self, progress: &Progress, easing: &EasingCurve) {
        self.current = self.start.lerp(&self.to, easing.ease(progress.ratio));
    }

    fn write(&self, target: &SharedSurface) -> Option<DeferWriter> {
        let target = Arc::clone(target);
        let property = self.config.property.clone();
        let value = self.current.to_string();
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::MemorySurface;

    #[test]
    fn test_parse_hex() {
        assert_eq!(Rgba::parse("#ff0000"), Some(Rgba::new(255.0, 0.0, 0.0, 1.0)));
        assert_eq!(Rgba::parse("#0f0"), Some(Rgba::new(0.0, 255.0, 0.0, 1.0)));
        assert_eq!(Rgba::parse("#00000080").map(|c| (c.a * 100.0).round()), Some(50.0));
        assert_eq!(Rgba::parse("#12345"), None);
        assert_eq!(Rgba::parse("#gg0000"), None);
    }

    #[test]
    fn test_parse_functions() {
        assert_eq!(Rgba::parse("rgb(10, 20, 30)"), Some(Rgba::new(10.0, 20.0, 30.0, 1.0)));
        assert_eq!(
            Rgba::parse("RGBA(300, 0, 0, 0.5)"),
            Some(Rgba::new(255.0, 0.0, 0.0, 0.5))
        );
        assert_eq!(Rgba::parse("rgb(1, 2)"), None);
        assert_eq!(Rgba::parse("hsl(0, 0%, 0%)"), None);
        assert_eq!(Rgba::parse("transparent").map(|c| c.a), Some(0.0));
    }

    #[test]
    fn test_display() {
        assert_eq!(Rgba::new(127.6, 0.0, 255.0, 0.5).to_string(), "rgba(128, 0, 255, 0.5)");
    }

    #[test]
    fn test_interpolates_channels() {
        let surface: SharedSurface = Arc::new(MemorySurface::new("box").with_property("color", "#000000"));
        let mut unit = ColorUnit::from_config(ColorConfig {
            value: "#ffffff".to_string(),
            ..ColorConfig::property("color")
        })
        .unwrap();
        unit.init(&surface);

        let progress = Progress {
            iteration: 50,
            total: 100,
            ratio: 0.5,
            step: 0.01,
            reversed: false,
        };
        unit.update(&progress, &EasingCurve::Linear);
        assert_eq!(unit.current().r, 127.5);
    }

    #[test]
    fn test_invalid_target_color() {
        let err = ColorUnit::from_config(ColorConfig {
            value: "not-a-color".to_string(),
            ..ColorConfig::property("color")
        })
        .unwrap_err();
        assert!(err.contains("not-a-color"));
    }
}
