//! Easing curves and the named easing registry.
//!
//! Curves map normalized progress (0.0 to 1.0) to eased progress. The
//! registry resolves curve names as written in animation definitions:
//! - Named CSS curves (`ease`, `ease-in`, `ease-out-back`, ...)
//! - Polynomial curves (`quad-in`, `quad-out`, `quad-in-out`)
//! - Stepped curves (`step-start`, `step-end`, `steps(4, end)`)
//! - Ad-hoc `cubic-bezier(x1, y1, x2, y2)` expressions
//!
//! Unknown names never fail; they resolve to the registry's default curve.
//!
//! # Usage
//!
//! ```ignore
//! let easings = EasingRegistry::with_defaults("ease-in");
//! let curve = easings.resolve("ease-out-quad");
//! let width = curve.interpolate(10.0, 90.0, 0.5);
//! ```

use crate::sync;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// Easing used when a unit names none, or names one that cannot be resolved.
pub const DEFAULT_EASING: &str = "ease-in";

/// Newton-Raphson passes used to invert the x polynomial.
const NEWTON_ITERATIONS: usize = 4;

/// Slopes below this stop Newton-Raphson; the step would leave `[0, 1]`.
const NEWTON_MIN_SLOPE: f64 = 1e-6;

/// Residual in x accepted from Newton-Raphson before bisecting.
const SOLVE_PRECISION: f64 = 1e-7;

const BISECTION_ITERATIONS: usize = 24;

/// Cubic bezier control points for a timing curve.
///
/// The curve runs from (0, 0) to (1, 1); `(x1, y1)` and `(x2, y2)` are the
/// two inner control points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spline {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Spline {
    pub const fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Returns true when the curve reduces to `f(t) = t`.
    ///
    /// Both control points on the diagonal, or both control points equal,
    /// make the solver unnecessary.
    pub fn is_identity(&self) -> bool {
        (self.x1 == self.y1 && self.x2 == self.y2) || (self.x1 == self.x2 && self.y1 == self.y2)
    }

    /// Evaluate the eased progress for `t`.
    pub fn ease(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        if self.is_identity() {
            return t;
        }
        let u = self.solve_for_x(t);
        bezier(u, self.y1, self.y2)
    }

    /// Find the curve parameter whose x coordinate is `x`.
    ///
    /// Newton-Raphson first; where the slope flattens (curves such as
    /// `(1, 0, 0, 1)` have a stationary point) it falls back to bisection.
    /// The result always stays within `[0, 1]`.
    fn solve_for_x(&self, x: f64) -> f64 {
        let mut guess = x;
        for _ in 0..NEWTON_ITERATIONS {
            let current = bezier(guess, self.x1, self.x2) - x;
            if current.abs() < SOLVE_PRECISION {
                return guess;
            }
            let slope = slope(guess, self.x1, self.x2);
            if slope.abs() < NEWTON_MIN_SLOPE {
                break;
            }
            guess = (guess - current / slope).clamp(0.0, 1.0);
        }
        if (bezier(guess, self.x1, self.x2) - x).abs() < SOLVE_PRECISION {
            return guess;
        }

        let (mut low, mut high) = (0.0, 1.0);
        let mut mid = guess;
        for _ in 0..BISECTION_ITERATIONS {
            mid = (low + high) / 2.0;
            let current = bezier(mid, self.x1, self.x2) - x;
            if current.abs() < SOLVE_PRECISION {
                break;
            }
            if current > 0.0 {
                high = mid;
            } else {
                low = mid;
            }
        }
        mid
    }
}

// Polynomial form of one bezier axis: ((a·t + b)·t + c)·t
fn coefficients(p1: f64, p2: f64) -> (f64, f64, f64) {
    (1.0 - 3.0 * p2 + 3.0 * p1, 3.0 * p2 - 6.0 * p1, 3.0 * p1)
}

fn bezier(t: f64, p1: f64, p2: f64) -> f64 {
    let (a, b, c) = coefficients(p1, p2);
    ((a * t + b) * t + c) * t
}

fn slope(t: f64, p1: f64, p2: f64) -> f64 {
    let (a, b, c) = coefficients(p1, p2);
    3.0 * a * t * t + 2.0 * b * t + c
}

/// Position of the jump in a stepped curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPosition {
    /// Jump at the start of each interval.
    Start,
    /// Jump at the end of each interval.
    #[default]
    End,
}

/// An easing curve.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EasingCurve {
    /// No easing.
    #[default]
    Linear,
    /// Cubic bezier timing curve.
    Bezier(Spline),
    /// `t²`
    QuadIn,
    /// `t·(2 - t)`
    QuadOut,
    /// Quadratic acceleration then deceleration.
    QuadInOut,
    /// Discrete jumps.
    Steps { count: u32, position: StepPosition },
}

impl EasingCurve {
    pub const fn bezier(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::Bezier(Spline::new(x1, y1, x2, y2))
    }

    /// Map normalized progress to eased progress.
    ///
    /// Input is clamped to [0, 1]. Bezier curves with overshooting control
    /// points may return values outside that range.
    pub fn ease(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::Bezier(spline) => spline.ease(t),
            Self::QuadIn => t * t,
            Self::QuadOut => t * (2.0 - t),
            Self::QuadInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
            Self::Steps { count, position } => {
                let n = f64::from((*count).max(1));
                match position {
                    StepPosition::End if t >= 1.0 => 1.0,
                    StepPosition::End => (t * n).floor() / n,
                    StepPosition::Start => ((t * n).floor() + 1.0).min(n) / n,
                }
            }
        }
    }

    /// Interpolate `start + delta · ease(t)`.
    pub fn interpolate(&self, start: f64, delta: f64, t: f64) -> f64 {
        start + delta * self.ease(t)
    }

    /// Parse a CSS function expression: `cubic-bezier(x1, y1, x2, y2)` or
    /// `steps(n[, start|end])`.
    pub fn parse(expr: &str) -> Option<Self> {
        let expr = expr.trim().to_ascii_lowercase();
        if let Some(args) = function_args(&expr, "cubic-bezier") {
            let values = args
                .iter()
                .map(|arg| arg.parse::<f64>().ok())
                .collect::<Option<Vec<_>>>()?;
            return match values.as_slice() {
                [x1, y1, x2, y2] if (0.0..=1.0).contains(x1) && (0.0..=1.0).contains(x2) => {
                    Some(Self::bezier(*x1, *y1, *x2, *y2))
                }
                _ => None,
            };
        }
        if let Some(args) = function_args(&expr, "steps") {
            let count = args.first()?.parse::<u32>().ok().filter(|n| *n > 0)?;
            let position = match args.get(1).map(String::as_str) {
                None | Some("end") | Some("jump-end") => StepPosition::End,
                Some("start") | Some("jump-start") => StepPosition::Start,
                Some(_) => return None,
            };
            return Some(Self::Steps { count, position });
        }
        None
    }
}

fn function_args(expr: &str, name: &str) -> Option<Vec<String>> {
    let inner = expr.strip_prefix(name)?.trim_start().strip_prefix('(')?.strip_suffix(')')?;
    Some(inner.split(',').map(|arg| arg.trim().to_string()).collect())
}

/// The named CSS timing curves registered by default.
const CSS_CURVES: &[(&str, Spline)] = &[
    ("ease", Spline::new(0.25, 0.1, 0.25, 1.0)),
    ("ease-in", Spline::new(0.42, 0.0, 1.0, 1.0)),
    ("ease-out", Spline::new(0.0, 0.0, 0.58, 1.0)),
    ("ease-in-out", Spline::new(0.42, 0.0, 0.58, 1.0)),
    ("snap", Spline::new(0.0, 1.0, 0.5, 1.0)),
    ("ease-in-quad", Spline::new(0.550, 0.085, 0.680, 0.530)),
    ("ease-in-cubic", Spline::new(0.550, 0.055, 0.675, 0.190)),
    ("ease-in-quart", Spline::new(0.895, 0.030, 0.685, 0.220)),
    ("ease-in-quint", Spline::new(0.755, 0.050, 0.855, 0.060)),
    ("ease-in-sine", Spline::new(0.470, 0.000, 0.745, 0.715)),
    ("ease-in-expo", Spline::new(0.950, 0.050, 0.795, 0.035)),
    ("ease-in-circ", Spline::new(0.600, 0.040, 0.980, 0.335)),
    ("ease-in-back", Spline::new(0.600, -0.280, 0.735, 0.045)),
    ("ease-out-quad", Spline::new(0.250, 0.460, 0.450, 0.940)),
    ("ease-out-cubic", Spline::new(0.215, 0.610, 0.355, 1.000)),
    ("ease-out-quart", Spline::new(0.165, 0.840, 0.440, 1.000)),
    ("ease-out-quint", Spline::new(0.230, 1.000, 0.320, 1.000)),
    ("ease-out-sine", Spline::new(0.390, 0.575, 0.565, 1.000)),
    ("ease-out-expo", Spline::new(0.190, 1.000, 0.220, 1.000)),
    ("ease-out-circ", Spline::new(0.075, 0.820, 0.165, 1.000)),
    ("ease-out-back", Spline::new(0.175, 0.885, 0.320, 1.275)),
    ("ease-in-out-quad", Spline::new(0.455, 0.030, 0.515, 0.955)),
    ("ease-in-out-cubic", Spline::new(0.645, 0.045, 0.355, 1.000)),
    ("ease-in-out-quart", Spline::new(0.770, 0.000, 0.175, 1.000)),
    ("ease-in-out-quint", Spline::new(0.860, 0.000, 0.070, 1.000)),
    ("ease-in-out-sine", Spline::new(0.445, 0.050, 0.550, 0.950)),
    ("ease-in-out-expo", Spline::new(1.000, 0.000, 0.000, 1.000)),
    ("ease-in-out-circ", Spline::new(0.785, 0.135, 0.150, 0.860)),
    ("ease-in-out-back", Spline::new(0.680, -0.550, 0.265, 1.550)),
];

/// Name to curve registry with a fallback curve.
///
/// Names are case-insensitive. Registering an existing name replaces it.
#[derive(Debug)]
pub struct EasingRegistry {
    curves: RwLock<HashMap<String, EasingCurve>>,
    default_name: String,
}

impl EasingRegistry {
    /// Create an empty registry falling back to `default_name`.
    pub fn new(default_name: impl Into<String>) -> Self {
        Self {
            curves: RwLock::new(HashMap::new()),
            default_name: normalize(&default_name.into()),
        }
    }

    /// Create a registry holding the CSS, polynomial and stepped curves.
    pub fn with_defaults(default_name: impl Into<String>) -> Self {
        let registry = Self::new(default_name);
        registry.register("linear", EasingCurve::Linear);
        for (name, spline) in CSS_CURVES {
            registry.register(name, EasingCurve::Bezier(*spline));
        }
        registry.register("quad-in", EasingCurve::QuadIn);
        registry.register("quad-out", EasingCurve::QuadOut);
        registry.register("quad-in-out", EasingCurve::QuadInOut);
        registry.register(
            "step-start",
            EasingCurve::Steps { count: 1, position: StepPosition::Start },
        );
        registry.register(
            "step-end",
            EasingCurve::Steps { count: 1, position: StepPosition::End },
        );
        registry
    }

    pub fn register(&self, name: &str, curve: EasingCurve) {
        sync::write(&self.curves).insert(normalize(name), curve);
    }

    /// Look up a registered curve without fallback.
    pub fn get(&self, name: &str) -> Option<EasingCurve> {
        sync::read(&self.curves).get(&normalize(name)).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        sync::read(&self.curves).contains_key(&normalize(name))
    }

    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    pub fn len(&self) -> usize {
        sync::read(&self.curves).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve a curve name, never failing.
    ///
    /// Tries the registered names, then a CSS function expression, then the
    /// default curve, and finally linear.
    pub fn resolve(&self, name: &str) -> EasingCurve {
        if let Some(curve) = self.get(name) {
            return curve;
        }
        if let Some(curve) = EasingCurve::parse(name) {
            return curve;
        }
        if !name.trim().is_empty() {
            debug!("unknown easing `{name}`, using `{}`", self.default_name);
        }
        self.get(&self.default_name).unwrap_or(EasingCurve::Linear)
    }
}

impl Default for EasingRegistry {
    fn default() -> Self {
        Self::with_defaults(DEFAULT_EASING)
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}
