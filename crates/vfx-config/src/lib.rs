//! vfx configuration system
//!
//! This crate provides centralized configuration for the vfx animation engine,
//! loading settings from `vfx.toml` with environment variable overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Smallest simulation step accepted; keeps the accumulator loop finite.
const MIN_STEP_MS: f64 = 1.0;

/// Main configuration structure for the animation engine
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VfxConfig {
    /// Fixed-timestep clock settings
    pub timing: TimingConfig,
    /// Host scheduler settings
    pub host: HostConfig,
    /// Easing registry settings
    pub easing: EasingConfig,
    /// Write-batch cache settings
    pub cache: CacheConfig,
    /// Write dispatch settings
    pub writes: WriteConfig,
}

/// Fixed-timestep clock configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Duration of one simulation step in milliseconds
    pub fixed_step_ms: f64,
    /// Ceiling applied to a single wall-clock delta in milliseconds
    pub max_delta_ms: f64,
}

/// Host scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Refresh cadence of the threaded host in ticks per second
    pub refresh_hz: u32,
}

/// Easing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EasingConfig {
    /// Easing used when a unit names an unknown curve
    pub default: String,
}

/// Write-batch cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Serve steady-state iterations from the cache
    pub enabled: bool,
    /// Also cache and replay batches while a frame runs its reverse pass
    pub cache_reverse: bool,
}

/// How computed write batches reach the target surfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Execute batches on the ticking thread
    Inline,
    /// Hand batches to a dedicated writer thread
    Worker,
}

/// Write dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteConfig {
    /// Dispatch mode
    pub mode: WriteMode,
    /// Capacity of the bounded queue feeding the writer thread
    pub queue_depth: usize,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            fixed_step_ms: 10.0,
            max_delta_ms: 250.0,
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self { refresh_hz: 60 }
    }
}

impl Default for EasingConfig {
    fn default() -> Self {
        Self {
            default: "ease-in".to_string(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_reverse: false,
        }
    }
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self {
            mode: WriteMode::Worker,
            queue_depth: 2,
        }
    }
}

impl TimingConfig {
    /// Simulation step as a `Duration`, never shorter than one millisecond.
    pub fn fixed_step(&self) -> Duration {
        millis(self.fixed_step_ms.max(MIN_STEP_MS))
    }

    /// Delta clamp as a `Duration`, never shorter than the fixed step.
    pub fn max_delta(&self) -> Duration {
        millis(self.max_delta_ms).max(self.fixed_step())
    }
}

impl HostConfig {
    /// Interval between two host ticks.
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.refresh_hz.max(1)))
    }
}

fn millis(ms: f64) -> Duration {
    if ms.is_finite() && ms > 0.0 {
        Duration::try_from_secs_f64(ms / 1000.0).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}

fn parse_flag(val: &str) -> bool {
    val == "1" || val.eq_ignore_ascii_case("true")
}

impl VfxConfig {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    /// * `path` - Path to the vfx.toml configuration file
    ///
    /// # Returns
    /// * `Ok(VfxConfig)` - Successfully loaded configuration
    /// * `Err(String)` - Error message if loading failed
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {}", e))
    }

    /// Load configuration from the default location (vfx.toml in the current directory)
    /// or return default configuration if file doesn't exist
    pub fn load_or_default() -> Self {
        Self::load_from_file("vfx.toml").unwrap_or_default()
    }

    /// Merge configuration with environment variables
    ///
    /// Environment variables take precedence over configuration file values.
    pub fn merge_with_env(&mut self) {
        // Timing
        if let Ok(val) = std::env::var("VFX_FIXED_STEP_MS") {
            if let Ok(step) = val.parse::<f64>() {
                self.timing.fixed_step_ms = step;
            }
        }
        if let Ok(val) = std::env::var("VFX_MAX_DELTA_MS") {
            if let Ok(delta) = val.parse::<f64>() {
                self.timing.max_delta_ms = delta;
            }
        }

        // Host
        if let Ok(val) = std::env::var("VFX_REFRESH_HZ") {
            if let Ok(hz) = val.parse::<u32>() {
                self.host.refresh_hz = hz;
            }
        }

        // Easing
        if let Ok(name) = std::env::var("VFX_DEFAULT_EASING") {
            self.easing.default = name;
        }

        // Cache
        if let Ok(val) = std::env::var("VFX_CACHE") {
            self.cache.enabled = parse_flag(&val);
        }
        if let Ok(val) = std::env::var("VFX_CACHE_REVERSE") {
            self.cache.cache_reverse = parse_flag(&val);
        }

        // Writes
        if let Ok(val) = std::env::var("VFX_WRITE_MODE") {
            if val.eq_ignore_ascii_case("inline") {
                self.writes.mode = WriteMode::Inline;
            } else if val.eq_ignore_ascii_case("worker") {
                self.writes.mode = WriteMode::Worker;
            }
        }
        if let Ok(val) = std::env::var("VFX_QUEUE_DEPTH") {
            if let Ok(depth) = val.parse::<usize>() {
                self.writes.queue_depth = depth;
            }
        }
    }

    /// Load configuration with environment variable overrides
    ///
    /// 1. Load from vfx.toml (or use defaults if not found)
    /// 2. Override with environment variables if present
    pub fn load() -> Self {
        let mut config = Self::load_or_default();
        config.merge_with_env();
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = VfxConfig::default();
        assert_eq!(config.timing.fixed_step(), Duration::from_millis(10));
        assert_eq!(config.timing.max_delta(), Duration::from_millis(250));
        assert_eq!(config.easing.default, "ease-in");
        assert!(config.cache.enabled);
        assert!(!config.cache.cache_reverse);
        assert_eq!(config.writes.mode, WriteMode::Worker);
    }

    #[test]
    fn test_toml_serialization() {
        let config = VfxConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: VfxConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.host.refresh_hz, 60);
        assert_eq!(parsed.writes.mode, WriteMode::Worker);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let parsed: VfxConfig = toml::from_str(
            r#"
            [writes]
            mode = "inline"

            [cache]
            cache_reverse = true
            "#,
        )
        .unwrap();

        assert_eq!(parsed.writes.mode, WriteMode::Inline);
        assert_eq!(parsed.writes.queue_depth, 2);
        assert!(parsed.cache.cache_reverse);
        assert!(parsed.cache.enabled);
        assert_eq!(parsed.timing.fixed_step_ms, 10.0);
    }

    #[test]
    fn test_step_is_clamped() {
        let timing = TimingConfig {
            fixed_step_ms: 0.0,
            max_delta_ms: -5.0,
        };
        assert_eq!(timing.fixed_step(), Duration::from_millis(1));
        assert_eq!(timing.max_delta(), Duration::from_millis(1));
    }

    #[test]
    fn test_huge_delta_saturates() {
        let timing = TimingConfig {
            fixed_step_ms: 10.0,
            max_delta_ms: 1e30,
        };
        assert_eq!(timing.max_delta(), Duration::MAX);
        assert_eq!(timing.fixed_step(), Duration::from_millis(10));
    }

    #[test]
    fn test_load_or_default() {
        // Should not panic even if vfx.toml doesn't exist
        let config = VfxConfig::load_or_default();
        assert!(config.timing.fixed_step_ms > 0.0);
    }

    #[test]
    fn test_merge_with_env() {
        unsafe {
            std::env::set_var("VFX_DEFAULT_EASING", "linear");
            std::env::set_var("VFX_WRITE_MODE", "inline");
            std::env::set_var("VFX_CACHE_REVERSE", "true");
        }

        let mut config = VfxConfig::default();
        config.merge_with_env();

        assert_eq!(config.easing.default, "linear");
        assert_eq!(config.writes.mode, WriteMode::Inline);
        assert!(config.cache.cache_reverse);

        unsafe {
            std::env::remove_var("VFX_DEFAULT_EASING");
            std::env::remove_var("VFX_WRITE_MODE");
            std::env::remove_var("VFX_CACHE_REVERSE");
        }
    }
}
