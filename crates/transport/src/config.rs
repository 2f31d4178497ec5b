//! Default constants and the serializable run configuration.
//!
//! [`SimulationConfig`] is assembled once before a run (usually from JSON) and
//! is read-only afterwards. Measurement policy lives in [`MeasurementConfig`]
//! and is handed to each raster at construction instead of being kept in
//! process-wide flags.

use std::time::Duration;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_THREADS: usize = 4;
pub const DEFAULT_TIME_STEP: f64 = 1.0;
pub const DEFAULT_END_TIME: f64 = 3600.0;

/// Number of precomputed values per stream in a `RandomArray`.
pub const DEFAULT_RANDOM_CACHE_SIZE: usize = 100_000;

/// Iteration cap for the circular-profile area inversion.
pub const PROFILE_FIXED_POINT_ITERATIONS: usize = 15;

/// Iteration cap for the Newton polish that follows the fixed-point pass.
pub const PROFILE_NEWTON_ITERATIONS: usize = 40;

/// Convergence tolerance on the central angle (radians).
pub const PROFILE_ANGLE_TOLERANCE: f64 = 1e-10;

/// Pipes flatter than this (m/m) carry no implied flow direction.
pub const HORIZONTAL_SLOPE_EPSILON: f64 = 1e-4;

/// Default wait before a measurement gives up on a held cell lock.
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 2_000;

/// Whether a raster records every step or only steps flagged by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SamplingMode {
    /// Every simulation step contributes to the current time bin.
    #[default]
    Continuous,
    /// Only steps where the controller switched sampling on contribute.
    Snapshot,
}

/// Measurement policy, fixed for the lifetime of a raster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementConfig {
    pub sampling_mode: SamplingMode,
    /// Re-count particles that stay in the same cell between measurements.
    pub count_staying_particles: bool,
    /// Hold the per-cell mutex for each read-modify-write. When off,
    /// concurrent writes to one cell may lose updates.
    pub synchronize_writes: bool,
    /// Particles that travelled less than this (m) are not measured.
    pub min_travel_length: f64,
    /// Maximum wait for a cell lock before the sample is abandoned.
    pub lock_timeout_ms: u64,
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            sampling_mode: SamplingMode::Continuous,
            count_staying_particles: true,
            synchronize_writes: true,
            min_travel_length: 0.0,
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }
}

impl MeasurementConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

/// Run-wide parameters for the stepping controller.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Worker threads in the stepping pool.
    pub threads: usize,
    /// Base seed; worker `i` uses `seed + i`.
    pub seed: u64,
    /// Simulation step in seconds.
    pub time_step: f64,
    /// Simulated end time in seconds.
    pub end_time: f64,
    /// Use a precomputed `RandomArray` per worker instead of a live generator.
    pub use_random_array: bool,
    pub random_cache_size: usize,
    pub surface_measurement: MeasurementConfig,
    pub pipe_measurement: MeasurementConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            threads: DEFAULT_THREADS,
            seed: DEFAULT_SEED,
            time_step: DEFAULT_TIME_STEP,
            end_time: DEFAULT_END_TIME,
            use_random_array: false,
            random_cache_size: DEFAULT_RANDOM_CACHE_SIZE,
            surface_measurement: MeasurementConfig::default(),
            pipe_measurement: MeasurementConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Parse and validate a JSON document. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, TransportError> {
        let config: SimulationConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, TransportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), TransportError> {
        if self.threads == 0 {
            return Err(TransportError::InvalidConfig(
                "threads must be at least 1".to_string(),
            ));
        }
        if !(self.time_step.is_finite() && self.time_step > 0.0) {
            return Err(TransportError::InvalidConfig(format!(
                "time_step must be positive, got {}",
                self.time_step
            )));
        }
        if !self.end_time.is_finite() || self.end_time < 0.0 {
            return Err(TransportError::InvalidConfig(format!(
                "end_time must be a non-negative number, got {}",
                self.end_time
            )));
        }
        if self.use_random_array && self.random_cache_size == 0 {
            return Err(TransportError::InvalidConfig(
                "random_cache_size must be at least 1".to_string(),
            ));
        }
        for (name, m) in [
            ("surface_measurement", &self.surface_measurement),
            ("pipe_measurement", &self.pipe_measurement),
        ] {
            if !m.min_travel_length.is_finite() || m.min_travel_length < 0.0 {
                return Err(TransportError::InvalidConfig(format!(
                    "{name}.min_travel_length must be a non-negative number, got {}",
                    m.min_travel_length
                )));
            }
        }
        Ok(())
    }

    /// Number of whole steps between t = 0 and `end_time`.
    pub fn step_count(&self) -> u64 {
        (self.end_time / self.time_step).ceil() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = SimulationConfig::from_json(r#"{ "threads": 2, "seed": 7 }"#)
            .expect("partial config should parse");
        assert_eq!(config.threads, 2);
        assert_eq!(config.seed, 7);
        assert_eq!(config.time_step, DEFAULT_TIME_STEP);
        assert_eq!(config.surface_measurement, MeasurementConfig::default());
    }

    #[test]
    fn test_from_json_nested_measurement() {
        let json = r#"{
            "surface_measurement": {
                "sampling_mode": "Snapshot",
                "count_staying_particles": false,
                "min_travel_length": 0.5
            }
        }"#;
        let config = SimulationConfig::from_json(json).unwrap();
        let m = &config.surface_measurement;
        assert_eq!(m.sampling_mode, SamplingMode::Snapshot);
        assert!(!m.count_staying_particles);
        assert!(m.synchronize_writes, "unset fields keep their default");
        assert_eq!(m.min_travel_length, 0.5);
    }

    #[test]
    fn test_zero_threads_rejected() {
        let err = SimulationConfig::from_json(r#"{ "threads": 0 }"#).unwrap_err();
        assert!(matches!(err, TransportError::InvalidConfig(_)), "got: {err}");
    }

    #[test]
    fn test_negative_time_step_rejected() {
        let config = SimulationConfig {
            time_step: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        let err = SimulationConfig::from_json("{ threads: ").unwrap_err();
        assert!(matches!(err, TransportError::Config(_)), "got: {err}");
    }

    #[test]
    fn test_json_roundtrip() {
        let config = SimulationConfig {
            threads: 3,
            use_random_array: true,
            ..Default::default()
        };
        let json = config.to_json().unwrap();
        let parsed = SimulationConfig::from_json(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_step_count_rounds_up() {
        let config = SimulationConfig {
            time_step: 2.0,
            end_time: 5.0,
            ..Default::default()
        };
        assert_eq!(config.step_count(), 3);
    }
}
