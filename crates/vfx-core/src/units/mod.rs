//! Built-in animation units.
//!
//! - [`NumericUnit`]: length and scalar properties (`width`, `opacity`, ...)
//! - [`ColorUnit`]: color properties interpolated per RGBA channel
//! - [`TransformUnit`]: single terms of the composite `transform` property
//!
//! Value parsing lives in small pure helpers shared by the units.

mod color;
mod numeric;
mod transform;

pub use color::{ColorConfig, ColorUnit, Rgba};
pub use numeric::{NumericConfig, NumericUnit};
pub use transform::{TransformConfig, TransformUnit, parse_term};

use crate::error::Result;
use crate::registry::SequenceRegistry;

/// Numeric properties and their default unit suffix.
const NUMERIC_PROPERTIES: &[(&str, &str)] = &[
    ("width", "px"),
    ("height", "px"),
    ("top", "px"),
    ("left", "px"),
    ("right", "px"),
    ("bottom", "px"),
    ("font-size", "px"),
    ("opacity", ""),
];

const COLOR_PROPERTIES: &[&str] = &["color", "background-color", "border-color"];

/// Register every built-in unit.
pub fn register_builtin(registry: &SequenceRegistry) -> Result<()> {
    for (property, unit) in NUMERIC_PROPERTIES {
        registry.register::<NumericUnit>(property, NumericConfig::property(property, unit))?;
    }
    for property in COLOR_PROPERTIES {
        registry.register::<ColorUnit>(property, ColorConfig::property(property))?;
    }
    registry.register::<TransformUnit>("rotate", TransformConfig::term("rotate", "deg", 0.0))?;
    registry.register::<TransformUnit>("translate-x", TransformConfig::term("translateX", "px", 0.0))?;
    registry.register::<TransformUnit>("translate-y", TransformConfig::term("translateY", "px", 0.0))?;
    registry.register::<TransformUnit>("scale", TransformConfig::term("scale", "", 1.0))?;
    Ok(())
}

/// Split a leading number from its unit suffix: `"-12.5px"` is `(-12.5, "px")`.
pub fn parse_number(text: &str) -> Option<(f64, &str)> {
    let text = text.trim();
    let end = text
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || *c == '.' || (*i == 0 && (*c == '-' || *c == '+'))))
        .map_or(text.len(), |(i, _)| i);
    let value = text[..end].parse::<f64>().ok()?;
    Some((value, text[end..].trim()))
}

/// Format a value without trailing zeros: `12.500` is `"12.5"`.
pub fn format_number(value: f64) -> String {
    let formatted = format!("{value:.3}");
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "-0" | "" => "0".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("12px"), Some((12.0, "px")));
        assert_eq!(parse_number(" -3.5em "), Some((-3.5, "em")));
        assert_eq!(parse_number("0.25"), Some((0.25, "")));
        assert_eq!(parse_number("+4%"), Some((4.0, "%")));
        assert_eq!(parse_number("auto"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(12.0), "12");
        assert_eq!(format_number(12.5), "12.5");
        assert_eq!(format_number(0.33333), "0.333");
        assert_eq!(format_number(-0.0001), "0");
    }

    #[test]
    fn test_register_builtin() {
        let registry = SequenceRegistry::new();
        register_builtin(&registry).unwrap();
        for name in ["width", "opacity", "background-color", "rotate", "translate-x", "scale"] {
            assert!(registry.contains(name), "{name}");
        }
    }
}
