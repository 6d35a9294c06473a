//! Name to constructor registry for animation units.
//!
//! Each unit type exposes a typed configuration struct. Registering a unit
//! records its prototype configuration as a field map; instantiating merges
//! caller overrides over those defaults, key by key, and deserializes the
//! result back into the configuration struct.
//!
//! # Usage
//!
//! ```ignore
//! registry.register::<NumericUnit>("width", NumericConfig::property("width", "px"))?;
//!
//! let overrides = json!({ "value": 200, "easing": "ease-out" });
//! let unit = registry.instantiate("width", overrides.as_object().unwrap())?;
//! ```

use crate::error::{Result, VfxError};
use crate::sequence::Sequence;
use crate::sync;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

/// Field overrides for one unit, keyed by configuration field name.
pub type Overrides = serde_json::Map<String, Value>;

/// Key naming the unit in a declarative property map.
pub const ANIMATE_KEY: &str = "animate";

/// A unit type constructible from a typed configuration.
pub trait Animator: Sequence + Sized + 'static {
    type Config: Serialize + DeserializeOwned;

    /// Validate a configuration and build the unit.
    fn from_config(config: Self::Config) -> std::result::Result<Self, String>;
}

enum BuildError {
    Fields(serde_json::Error),
    Value(String),
}

type Build = Box<dyn Fn(Value) -> std::result::Result<Box<dyn Sequence>, BuildError> + Send + Sync>;

struct Provider {
    defaults: Overrides,
    build: Build,
}

/// Registry of animation unit constructors.
#[derive(Default)]
pub struct SequenceRegistry {
    providers: RwLock<HashMap<String, Provider>>,
}

impl SequenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a unit type under `name` with `prototype` as its defaults.
    ///
    /// Re-registering a name replaces the previous provider.
    pub fn register<A: Animator>(&self, name: &str, prototype: A::Config) -> Result<()> {
        let name = normalize(name);
        let defaults = match serde_json::to_value(prototype) {
            Ok(Value::Object(fields)) => fields,
            _ => return Err(VfxError::InvalidPrototype { name }),
        };

        let build: Build = Box::new(|fields| {
            let config = serde_json::from_value::<A::Config>(fields).map_err(BuildError::Fields)?;
            let unit = A::from_config(config).map_err(BuildError::Value)?;
            Ok(Box::new(unit) as Box<dyn Sequence>)
        });

        sync::write(&self.providers).insert(name, Provider { defaults, build });
        Ok(())
    }

    /// Build a unit from its defaults merged with `overrides`.
    ///
    /// Keys absent from `overrides` keep their default; the `animate` key
    /// is ignored.
    pub fn instantiate(&self, name: &str, overrides: &Overrides) -> Result<Box<dyn Sequence>> {
        let name = normalize(name);
        let providers = sync::read(&self.providers);
        let provider = providers
            .get(&name)
            .ok_or_else(|| VfxError::UnknownSequence(name.clone()))?;

        let mut fields = provider.defaults.clone();
        for (key, value) in overrides {
            if key != ANIMATE_KEY {
                fields.insert(key.clone(), value.clone());
            }
        }

        (provider.build)(Value::Object(fields)).map_err(|err| match err {
            BuildError::Fields(source) => VfxError::InvalidOverrides {
                name: name.clone(),
                source,
            },
            BuildError::Value(reason) => VfxError::InvalidValue {
                name: name.clone(),
                reason,
            },
        })
    }

    /// Default fields recorded for `name`.
    pub fn defaults(&self, name: &str) -> Option<Overrides> {
        sync::read(&self.providers)
            .get(&normalize(name))
            .map(|provider| provider.defaults.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        sync::read(&self.providers).contains_key(&normalize(name))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = sync::read(&self.providers).keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for SequenceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceRegistry")
            .field("names", &self.names())
            .finish()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

static_assertions::assert_impl_all!(SequenceRegistry: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::easing::EasingCurve;
    use crate::sequence::Progress;
    use crate::surface::SharedSurface;
    use crate::writer::DeferWriter;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct GlowConfig {
        radius: f64,
        easing: String,
        #[serde(default)]
        color: Option<String>,
    }

    struct Glow {
        config: GlowConfig,
    }

    impl Sequence for Glow {
        fn name(&self) -> &str {
            "glow"
        }

        fn init(&mut self, _target: &SharedSurface) {}

        fn update(&mut self, _progress: &Progress, _easing: &EasingCurve) {}

        fn write(&self, _target: &SharedSurface) -> Option<DeferWriter> {
            None
        }

        fn easing(&self) -> &str {
            &self.config.easing
        }
    }

    impl Animator for Glow {
        type Config = GlowConfig;

        fn from_config(config: GlowConfig) -> std::result::Result<Self, String> {
            if config.radius < 0.0 {
                return Err(format!("radius {} is negative", config.radius));
            }
            Ok(Self { config })
        }
    }

    fn registry() -> SequenceRegistry {
        let registry = SequenceRegistry::new();
        registry
            .register::<Glow>(
                "Glow",
                GlowConfig {
                    radius: 4.0,
                    easing: "ease".to_string(),
                    color: None,
                },
            )
            .unwrap();
        registry
    }

    fn overrides(value: Value) -> Overrides {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_defaults_recorded() {
        let registry = registry();
        assert!(registry.contains("glow"));
        let defaults = registry.defaults("GLOW").unwrap();
        assert_eq!(defaults["radius"], json!(4.0));
        assert_eq!(registry.names(), vec!["glow".to_string()]);
    }

    #[test]
    fn test_overrides_merge_over_defaults() {
        let registry = registry();
        let unit = registry
            .instantiate("glow", &overrides(json!({ "animate": "glow", "easing": "snap" })))
            .unwrap();
        assert_eq!(unit.easing(), "snap");
        assert_eq!(unit.name(), "glow");
    }

    #[test]
    fn test_unknown_sequence() {
        let err = registry().instantiate("blur", &Overrides::new()).err().unwrap();
        assert!(matches!(err, VfxError::UnknownSequence(name) if name == "blur"));
    }

    #[test]
    fn test_malformed_overrides() {
        let err = registry()
            .instantiate("glow", &overrides(json!({ "radius": "wide" })))
            .err().unwrap();
        assert!(matches!(err, VfxError::InvalidOverrides { .. }));
    }

    #[test]
    fn test_rejected_value() {
        let err = registry()
            .instantiate("glow", &overrides(json!({ "radius": -1.0 })))
            .err().unwrap();
        assert!(matches!(err, VfxError::InvalidValue { .. }));
    }

    #[test]
    fn test_prototype_must_be_a_struct() {
        struct Scalar;

        impl Sequence for Scalar {
            fn name(&self) -> &str {
                "scalar"
            }
            fn init(&mut self, _target: &SharedSurface) {}
            fn update(&mut self, _progress: &Progress, _easing: &EasingCurve) {}
            fn write(&self, _target: &SharedSurface) -> Option<DeferWriter> {
                None
            }
        }

        impl Animator for Scalar {
            type Config = f64;

            fn from_config(_config: f64) -> std::result::Result<Self, String> {
                Ok(Self)
            }
        }

        let err = SequenceRegistry::new().register::<Scalar>("scalar", 1.0).unwrap_err();
        assert!(matches!(err, VfxError::InvalidPrototype { .. }));
    }
}
