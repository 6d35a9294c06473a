//! The engine context and the declarative animation builder.
//!
//! An [`Engine`] owns everything frames share: the easing registry, the
//! sequence registry with the built-in units, the write batch cache and
//! the write queue. It is built from a [`VfxConfig`] and passed explicitly
//! to whatever builds frames.
//!
//! # Usage
//!
//! ```ignore
//! let engine = Engine::new(&VfxConfig::load())?;
//! let scheduler = engine.scheduler(ThreadHost::with_rate(60)?);
//!
//! let fade = Animation::new(400)
//!     .animate("opacity", json!({ "value": 0.0, "easing": "ease-out" }))
//!     .build(&engine, &[surface])?;
//! scheduler.start(fade)?;
//! ```

use crate::cache::WriteBatchCache;
use crate::clock::ClockConfig;
use crate::easing::EasingRegistry;
use crate::error::{Result, VfxError};
use crate::frame::{AnimationFrame, FrameServices};
use crate::host::HostScheduler;
use crate::registry::{ANIMATE_KEY, Overrides, SequenceRegistry};
use crate::scheduler::Scheduler;
use crate::sequence::{Binding, Sequence};
use crate::stat::{Stat, StatConfig};
use crate::surface::SharedSurface;
use crate::units;
use crate::writer::WriteQueue;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use vfx_config::VfxConfig;

/// Shared context for building and running frames.
pub struct Engine {
    easings: EasingRegistry,
    sequences: SequenceRegistry,
    services: FrameServices,
}

impl Engine {
    /// Build an engine with the built-in units registered.
    pub fn new(config: &VfxConfig) -> Result<Self> {
        let easings = EasingRegistry::with_defaults(config.easing.default.as_str());
        let sequences = SequenceRegistry::new();
        units::register_builtin(&sequences)?;

        let queue = WriteQueue::from_config(&config.writes)?;
        let services = FrameServices {
            cache: Arc::new(WriteBatchCache::new()),
            queue: Arc::new(queue),
            clock: ClockConfig {
                fixed_step: config.timing.fixed_step(),
                max_delta: config.timing.max_delta(),
                delay: Duration::ZERO,
            },
            cache_enabled: config.cache.enabled,
            cache_reverse: config.cache.cache_reverse,
        };

        Ok(Self {
            easings,
            sequences,
            services,
        })
    }

    pub fn easings(&self) -> &EasingRegistry {
        &self.easings
    }

    /// Registry for adding animatable properties.
    pub fn sequences(&self) -> &SequenceRegistry {
        &self.sequences
    }

    pub fn cache(&self) -> &Arc<WriteBatchCache> {
        &self.services.cache
    }

    pub fn fixed_step(&self) -> Duration {
        self.services.clock.fixed_step
    }

    /// A tracker for `config` at the engine's simulation step.
    pub fn stat(&self, config: StatConfig) -> Stat {
        Stat::new(config, self.fixed_step())
    }

    /// A scheduler running frames on `host`.
    pub fn scheduler(&self, host: Arc<dyn HostScheduler>) -> Scheduler {
        Scheduler::new(host)
    }

    /// Bind a unit to a surface, resolving its easing once.
    pub fn bind(&self, unit: Box<dyn Sequence>, target: SharedSurface) -> Binding {
        let easing = self.easings.resolve(unit.easing());
        Binding::new(unit, target, easing)
    }

    /// Build a frame from already bound units.
    pub fn frame(&self, config: StatConfig, bindings: Vec<Binding>) -> Result<Arc<AnimationFrame>> {
        if bindings.is_empty() {
            return Err(VfxError::NoTargets);
        }
        Ok(Arc::new(AnimationFrame::new(
            self.services.clone(),
            self.stat(config),
            bindings,
        )))
    }

    /// Build a frame from declarative property maps.
    ///
    /// Every map names its unit under `animate`; one unit is instantiated
    /// per map and target.
    pub fn sequence_frame(
        &self,
        config: StatConfig,
        targets: &[SharedSurface],
        animates: &[Overrides],
    ) -> Result<Arc<AnimationFrame>> {
        if targets.is_empty() {
            return Err(VfxError::NoTargets);
        }

        let mut bindings = Vec::with_capacity(animates.len() * targets.len());
        for (index, fields) in animates.iter().enumerate() {
            let name = fields
                .get(ANIMATE_KEY)
                .and_then(Value::as_str)
                .ok_or(VfxError::MissingSequenceName { index })?;
            for target in targets {
                let unit = self.sequences.instantiate(name, fields)?;
                bindings.push(self.bind(unit, Arc::clone(target)));
            }
        }

        self.frame(config, bindings)
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("easings", &self.easings.len())
            .field("sequences", &self.sequences)
            .field("fixed_step", &self.fixed_step())
            .finish()
    }
}

/// Declarative description of one animation.
///
/// ```json
/// { "duration": 1000, "loop": 2, "animates": [{ "animate": "width", "value": 300 }] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Animation {
    /// Milliseconds per forward pass.
    pub duration: u64,
    /// Milliseconds before the first cycle.
    pub delay: u64,
    /// Additional cycles; negative loops forever.
    #[serde(rename = "loop")]
    pub loop_count: i32,
    pub reverse: bool,
    pub optimize: bool,
    pub animates: Vec<Overrides>,
}

impl Default for Animation {
    fn default() -> Self {
        Self {
            duration: 0,
            delay: 0,
            loop_count: 0,
            reverse: false,
            optimize: true,
            animates: Vec::new(),
        }
    }
}

impl Animation {
    pub fn new(duration_ms: u64) -> Self {
        Self {
            duration: duration_ms,
            ..Default::default()
        }
    }

    pub fn delay(mut self, delay_ms: u64) -> Self {
        self.delay = delay_ms;
        self
    }

    pub fn looping(mut self, loop_count: i32) -> Self {
        self.loop_count = loop_count;
        self
    }

    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    pub fn optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    /// Add a property map for the unit `name`. Non-object `fields` add a
    /// map with defaults only.
    pub fn animate(mut self, name: &str, fields: Value) -> Self {
        let mut map = match fields {
            Value::Object(map) => map,
            _ => Overrides::new(),
        };
        map.insert(ANIMATE_KEY.to_string(), Value::String(name.to_string()));
        self.animates.push(map);
        self
    }

    pub fn stat_config(&self) -> StatConfig {
        StatConfig {
            duration: Duration::from_millis(self.duration),
            delay: Duration::from_millis(self.delay),
            loop_count: self.loop_count,
            reverse: self.reverse,
            optimize: self.optimize,
        }
    }

    pub fn build(&self, engine: &Engine, targets: &[SharedSurface]) -> Result<Arc<AnimationFrame>> {
        engine.sequence_frame(self.stat_config(), targets, &self.animates)
    }
}

/// Build one frame per animation, each starting when the previous ends.
///
/// Returns the frames in order; start the first one.
pub fn chain(
    engine: &Engine,
    targets: &[SharedSurface],
    animations: &[Animation],
) -> Result<Vec<Arc<AnimationFrame>>> {
    let frames = animations
        .iter()
        .map(|animation| animation.build(engine, targets))
        .collect::<Result<Vec<_>>>()?;
    for pair in frames.windows(2) {
        pair[0].then(Arc::clone(&pair[1]));
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::MemorySurface;
    use serde_json::json;
    use vfx_config::WriteMode;

    fn engine() -> Engine {
        let mut config = VfxConfig::default();
        config.writes.mode = WriteMode::Inline;
        Engine::new(&config).unwrap()
    }

    fn target() -> Vec<SharedSurface> {
        vec![Arc::new(MemorySurface::new("box"))]
    }

    #[test]
    fn test_engine_defaults() {
        let engine = engine();
        assert_eq!(engine.fixed_step(), Duration::from_millis(10));
        assert!(engine.sequences().contains("width"));
        assert!(engine.easings().contains("ease-in-out-back"));
        assert_eq!(engine.stat(StatConfig::new(Duration::from_secs(1))).total_iterations(), 100);
    }

    #[test]
    fn test_animation_from_json() {
        let animation: Animation = serde_json::from_value(json!({
            "duration": 500,
            "loop": -1,
            "animates": [{ "animate": "width", "value": 10 }]
        }))
        .unwrap();
        assert!(animation.optimize);
        assert_eq!(animation.stat_config().loop_count, -1);
        assert_eq!(animation.stat_config().duration, Duration::from_millis(500));
        assert!(animation.build(&engine(), &target()).is_ok());
    }

    #[test]
    fn test_missing_sequence_name() {
        let mut animation = Animation::new(100);
        animation.animates.push(json!({ "value": 3 }).as_object().cloned().unwrap());
        let err = animation.build(&engine(), &target()).unwrap_err();
        assert!(matches!(err, VfxError::MissingSequenceName { index: 0 }));
    }

    #[test]
    fn test_unknown_sequence_fails_construction() {
        let err = Animation::new(100)
            .animate("wobble", json!({}))
            .build(&engine(), &target())
            .unwrap_err();
        assert!(matches!(err, VfxError::UnknownSequence(_)));
    }

    #[test]
    fn test_no_targets() {
        let err = Animation::new(100)
            .animate("width", json!({ "value": 1 }))
            .build(&engine(), &[])
            .unwrap_err();
        assert!(matches!(err, VfxError::NoTargets));
    }

    #[test]
    fn test_unknown_easing_uses_default() {
        let engine = engine();
        let unit = engine
            .sequences()
            .instantiate("width", json!({ "easing": "bouncy" }).as_object().unwrap())
            .unwrap();
        let binding = engine.bind(unit, target().remove(0));
        assert_eq!(*binding.easing(), engine.easings().resolve("ease-in"));
    }

    #[test]
    fn test_chain_links_frames() {
        let engine = engine();
        let frames = chain(
            &engine,
            &target(),
            &[
                Animation::new(100).animate("width", json!({ "value": 10 })),
                Animation::new(100).animate("height", json!({ "value": 10 })),
                Animation::new(100).animate("opacity", json!({ "value": 0.5 })),
            ],
        )
        .unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].chained()[0].id(), frames[1].id());
        assert_eq!(frames[1].chained()[0].id(), frames[2].id());
        assert!(frames[2].chained().is_empty());
    }
}
