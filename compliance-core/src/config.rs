use serde::{Deserialize, Serialize};

use crate::envelope::MachineEnvelope;
use crate::error::ConfigError;
use crate::profile::ControllerProfile;

/// Plausibility bounds used by the feed and spindle checks.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ValidatorLimits {
    /// High-water mark in per-minute feed mode (G94).
    pub max_feed_rate: f64,
    /// High-water mark in per-revolution feed mode (G95).
    pub max_feed_per_rev: f64,
    pub min_spindle_speed: f64,
    pub max_spindle_speed: f64,
    /// Length tolerance for arc radius comparisons.
    pub arc_tolerance: f64,
}

impl Default for ValidatorLimits {
    fn default() -> Self {
        Self {
            max_feed_rate: 20_000.0,
            max_feed_per_rev: 2.0,
            min_spindle_speed: 50.0,
            max_spindle_speed: 30_000.0,
            arc_tolerance: 0.001,
        }
    }
}

impl ValidatorLimits {
    pub fn check(&self) -> Result<(), ConfigError> {
        let fields = [
            ("max_feed_rate", self.max_feed_rate),
            ("max_feed_per_rev", self.max_feed_per_rev),
            ("min_spindle_speed", self.min_spindle_speed),
            ("max_spindle_speed", self.max_spindle_speed),
            ("arc_tolerance", self.arc_tolerance),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidLimits(format!(
                    "{name} must be a finite, non-negative number (got {value})"
                )));
            }
        }
        if self.min_spindle_speed > self.max_spindle_speed {
            return Err(ConfigError::InvalidLimits(format!(
                "min_spindle_speed {} exceeds max_spindle_speed {}",
                self.min_spindle_speed, self.max_spindle_speed
            )));
        }
        Ok(())
    }
}

/// One JSON document configuring an engine.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EngineConfig {
    pub dialect: String,
    #[serde(default)]
    pub limits: ValidatorLimits,
    #[serde(default)]
    pub envelope: Option<MachineEnvelope>,
    /// Extra controller profiles, registered before `dialect` is resolved.
    #[serde(default)]
    pub profiles: Vec<ControllerProfile>,
}

impl EngineConfig {
    pub fn for_dialect(dialect: &str) -> Self {
        Self {
            dialect: dialect.to_string(),
            limits: ValidatorLimits::default(),
            envelope: None,
            profiles: Vec::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.limits.check()?;
        if let Some(envelope) = &config.envelope {
            envelope.check()?;
        }
        Ok(config)
    }
}
