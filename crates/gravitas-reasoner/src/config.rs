//! Reasoner tunables.
//!
//! Every field has a serde default so a partial TOML table (or none at all)
//! yields a working configuration.

use std::path::PathBuf;
use std::time::Duration;

use gravitas_physics::FrictionParams;
use gravitas_types::{GravitasError, Vec3};
use serde::{Deserialize, Serialize};

/// Configuration of one reasoner instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasonerConfig {
    /// Gravity vector of the simulated world.
    #[serde(default = "default_gravity")]
    pub gravity: [f32; 3],

    /// Fixed simulation time step (seconds).
    #[serde(default = "default_time_step")]
    pub time_step: f32,

    /// Reasoning ticks per second.
    #[serde(default = "default_reasoning_frequency")]
    pub reasoning_frequency: f32,

    /// Simulated time per reasoning cycle (seconds).
    #[serde(default = "default_simulation_step")]
    pub simulation_step: f32,

    /// Divergence between simulated and perceived position above which an
    /// object is unstable.
    #[serde(default = "default_simulation_tolerance")]
    pub simulation_tolerance: f32,

    /// Per-component observation jitter that is not treated as motion.
    #[serde(default = "default_perception_tolerance")]
    pub perception_tolerance: f32,

    /// Seconds after the last observation during which an object still
    /// counts as perceived.
    #[serde(default = "default_perception_duration")]
    pub perception_duration: f32,

    #[serde(default = "default_true")]
    pub infer_actions: bool,

    /// Shape-asset search path.
    #[serde(default = "default_resource_folder")]
    pub resource_folder: Vec<PathBuf>,

    /// Trace every simulated body after each cycle.
    #[serde(default)]
    pub visualize: bool,

    /// World the perception updates arrive in.
    #[serde(default = "default_input_world")]
    pub input_world: String,

    /// Appended to `input_world` to name the output world.
    #[serde(default = "default_output_suffix")]
    pub output_suffix: String,

    #[serde(default)]
    pub friction: FrictionParams,
}

fn default_gravity() -> [f32; 3] {
    [0.0, 0.0, -10.0]
}
fn default_time_step() -> f32 {
    1.0 / 240.0
}
fn default_reasoning_frequency() -> f32 {
    20.0
}
fn default_simulation_step() -> f32 {
    0.1
}
fn default_simulation_tolerance() -> f32 {
    0.045
}
fn default_perception_tolerance() -> f32 {
    0.01
}
fn default_perception_duration() -> f32 {
    0.9
}
fn default_true() -> bool {
    true
}
fn default_resource_folder() -> Vec<PathBuf> {
    vec![PathBuf::from("assets")]
}
fn default_input_world() -> String {
    "robot/env".to_string()
}
fn default_output_suffix() -> String {
    "_stable".to_string()
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            gravity: default_gravity(),
            time_step: default_time_step(),
            reasoning_frequency: default_reasoning_frequency(),
            simulation_step: default_simulation_step(),
            simulation_tolerance: default_simulation_tolerance(),
            perception_tolerance: default_perception_tolerance(),
            perception_duration: default_perception_duration(),
            infer_actions: true,
            resource_folder: default_resource_folder(),
            visualize: false,
            input_world: default_input_world(),
            output_suffix: default_output_suffix(),
            friction: FrictionParams::default(),
        }
    }
}

impl ReasonerConfig {
    /// Number of simulation steps per reasoning cycle.
    pub fn micro_steps(&self) -> usize {
        // The f32 quotient can land just below the intended integer.
        (self.simulation_step / self.time_step + 1e-3).floor() as usize
    }

    pub fn gravity(&self) -> Vec3 {
        Vec3::from(self.gravity)
    }

    /// Name of the world the change sets are written to.
    pub fn output_world(&self) -> String {
        format!("{}{}", self.input_world, self.output_suffix)
    }

    pub fn perception_window(&self) -> Duration {
        Duration::from_secs_f32(self.perception_duration)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.reasoning_frequency)
    }

    /// Reject values the reasoner cannot run with.
    ///
    /// # Errors
    ///
    /// [`GravitasError::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<(), GravitasError> {
        let positive = [
            ("time_step", self.time_step),
            ("reasoning_frequency", self.reasoning_frequency),
            ("simulation_step", self.simulation_step),
            ("simulation_tolerance", self.simulation_tolerance),
            ("perception_duration", self.perception_duration),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(GravitasError::Config(format!("{name} must be positive, got {value}")));
            }
        }
        if !(self.perception_tolerance.is_finite() && self.perception_tolerance >= 0.0) {
            return Err(GravitasError::Config("perception_tolerance must not be negative".into()));
        }
        if self.simulation_step < self.time_step {
            return Err(GravitasError::Config(
                "simulation_step must cover at least one time_step".into(),
            ));
        }
        if self.input_world.is_empty() {
            return Err(GravitasError::Config("input_world must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_give_24_micro_steps() {
        let cfg = ReasonerConfig::default();
        assert_eq!(cfg.micro_steps(), 24);
        assert_eq!(cfg.output_world(), "robot/env_stable");
        assert!((cfg.tick_period().as_secs_f64() - 0.05).abs() < 1e-6);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let cfg: ReasonerConfig = toml::from_str("reasoning_frequency = 10.0\ninfer_actions = false\n").unwrap();
        assert_eq!(cfg.reasoning_frequency, 10.0);
        assert!(!cfg.infer_actions);
        assert_eq!(cfg.simulation_tolerance, 0.045);
        assert_eq!(cfg.resource_folder, vec![PathBuf::from("assets")]);
        assert!((cfg.friction.rolling - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn friction_table_overrides_single_field() {
        let cfg: ReasonerConfig = toml::from_str("[friction]\nsliding = 0.3\n").unwrap();
        assert!((cfg.friction.sliding - 0.3).abs() < f32::EPSILON);
        assert!((cfg.friction.spinning - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn validate_rejects_non_positive_time_step() {
        let cfg = ReasonerConfig {
            time_step: 0.0,
            ..ReasonerConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(GravitasError::Config(msg)) if msg.contains("time_step")));
    }

    #[test]
    fn validate_rejects_horizon_shorter_than_step() {
        let cfg = ReasonerConfig {
            simulation_step: 0.001,
            ..ReasonerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
