//! Typed simulator settings with explicit defaults, validated once at load.

use crate::error::{Result, SimError};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SanityLimits {
    pub velocity: f64,
    pub angular_velocity: f64,
}

impl Default for SanityLimits {
    fn default() -> Self {
        SanityLimits {
            velocity: 1000.0,
            angular_velocity: 3600.0,
        }
    }
}

/// Settings found under the `"simulator"` key of `settings.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SimulatorSettings {
    /// Write the simulation back to disk on quit.
    pub save_sims: bool,
    /// Longest frame time (seconds) fed to physics.
    pub lag_limit: f64,
    /// Autopilot rudder rate in degrees per second.
    pub max_rudder_movement: f64,
    /// Seconds after the last request before a user is reported offline.
    pub client_timeout: f64,
    /// Minimum distance between recorded path points; `None` disables path tracing.
    pub tracer_resolution: Option<f64>,
    pub sanity_limits: SanityLimits,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        SimulatorSettings {
            save_sims: true,
            lag_limit: 0.5,
            max_rudder_movement: 30.0,
            client_timeout: 5.0,
            tracer_resolution: Some(1.0),
            sanity_limits: SanityLimits::default(),
        }
    }
}

impl SimulatorSettings {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("lag-limit", self.lag_limit),
            ("max-rudder-movement", self.max_rudder_movement),
            ("client-timeout", self.client_timeout),
            ("sanity-limits.velocity", self.sanity_limits.velocity),
            (
                "sanity-limits.angular-velocity",
                self.sanity_limits.angular_velocity,
            ),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(SimError::Config(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }
        if let Some(resolution) = self.tracer_resolution {
            if !(resolution.is_finite() && resolution >= 0.0) {
                return Err(SimError::Config(format!(
                    "tracer-resolution must be non-negative, got {}",
                    resolution
                )));
            }
        }
        Ok(())
    }

    /// Applies the fields a simulation file overrides, then re-validates.
    pub fn with_overrides(&self, overrides: &SettingsOverride) -> Result<SimulatorSettings> {
        let mut merged = self.clone();
        if let Some(v) = overrides.save_sims {
            merged.save_sims = v;
        }
        if let Some(v) = overrides.lag_limit {
            merged.lag_limit = v;
        }
        if let Some(v) = overrides.max_rudder_movement {
            merged.max_rudder_movement = v;
        }
        if let Some(v) = overrides.client_timeout {
            merged.client_timeout = v;
        }
        if let Some(v) = overrides.tracer_resolution {
            merged.tracer_resolution = v;
        }
        if let Some(v) = overrides.sanity_limits {
            merged.sanity_limits = v;
        }
        merged.validate()?;
        Ok(merged)
    }
}

/// Partial settings carried by a simulation file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SettingsOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_sims: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lag_limit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_rudder_movement: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_timeout: Option<f64>,
    /// `Some(None)` turns path tracing off.
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_or_null"
    )]
    pub tracer_resolution: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sanity_limits: Option<SanityLimits>,
}

/// Distinguishes an explicit `null` from an absent field.
fn present_or_null<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<Option<f64>>, D::Error> {
    Option::<f64>::deserialize(deserializer).map(Some)
}

impl SettingsOverride {
    pub fn is_empty(&self) -> bool {
        *self == SettingsOverride::default()
    }
}

/// Layout of `settings.json`; sections other than `"simulator"` are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub simulator: SimulatorSettings,
}

impl SettingsFile {
    pub fn parse(text: &str) -> Result<SimulatorSettings> {
        let file: SettingsFile = serde_json::from_str(text)?;
        file.simulator.validate()?;
        Ok(file.simulator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = SimulatorSettings::default();
        assert!(settings.save_sims);
        assert_eq!(settings.lag_limit, 0.5);
        assert_eq!(settings.max_rudder_movement, 30.0);
        assert_eq!(settings.tracer_resolution, Some(1.0));
        assert_eq!(settings.sanity_limits.velocity, 1000.0);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings =
            SettingsFile::parse(r#"{"simulator": {"lag-limit": 0.25}, "GUI": {}}"#).unwrap();
        assert_eq!(settings.lag_limit, 0.25);
        assert_eq!(settings.client_timeout, 5.0);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        assert!(SettingsFile::parse(r#"{"simulator": {"lag-limit": -1}}"#).is_err());
        assert!(SettingsFile::parse(r#"{"simulator": {"lag-limit": "fast"}}"#).is_err());
    }

    #[test]
    fn test_overrides() {
        let overrides: SettingsOverride =
            serde_json::from_str(r#"{"tracer-resolution": null, "max-rudder-movement": 90}"#)
                .unwrap();
        let merged = SimulatorSettings::default()
            .with_overrides(&overrides)
            .unwrap();
        assert_eq!(merged.max_rudder_movement, 90.0);
        assert_eq!(merged.tracer_resolution, None);
        assert!(!overrides.is_empty());
        assert!(SettingsOverride::default().is_empty());
    }
}
