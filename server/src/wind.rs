//! Randomly drifting wind shared by every boat in a simulation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use shared::{normalize_angle, Vector2};

/// Wind parameters, stored under `wind-settings` in simulation files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct WindSettings {
    pub speed: f64,
    pub max_gust: f64,
    /// Largest speed change per second.
    pub speed_variability: f64,
    /// Largest direction change per second, in degrees.
    pub direction_variability: f64,
    /// Direction the wind blows toward, in degrees.
    pub direction: f64,
}

impl Default for WindSettings {
    fn default() -> Self {
        WindSettings {
            speed: 0.0,
            max_gust: 0.0,
            speed_variability: 0.0,
            direction_variability: 0.0,
            direction: 270.0,
        }
    }
}

pub struct WindGenerator {
    settings: WindSettings,
    rng: StdRng,
}

impl WindGenerator {
    pub fn new(settings: WindSettings) -> Self {
        Self::with_rng(settings, StdRng::from_entropy())
    }

    /// Generator with a reproducible random sequence.
    pub fn seeded(settings: WindSettings, seed: u64) -> Self {
        Self::with_rng(settings, StdRng::seed_from_u64(seed))
    }

    fn with_rng(mut settings: WindSettings, rng: StdRng) -> Self {
        settings.speed = settings.speed.clamp(0.0, settings.max_gust.max(0.0));
        settings.direction = normalize_angle(settings.direction);
        WindGenerator { settings, rng }
    }

    pub fn settings(&self) -> &WindSettings {
        &self.settings
    }

    /// Current wind without advancing it.
    pub fn vector(&self) -> Vector2 {
        Vector2::new(self.settings.speed, 0.0).rotated_degrees(self.settings.direction)
    }

    /// Drifts speed and direction by up to their variability times `dt`.
    pub fn step(&mut self, dt: f64) -> Vector2 {
        let s = &mut self.settings;
        if s.speed_variability > 0.0 {
            let change = self.rng.gen_range(-s.speed_variability..=s.speed_variability);
            s.speed += change * dt;
        }
        s.speed = s.speed.clamp(0.0, s.max_gust.max(0.0));

        if s.direction_variability > 0.0 {
            let change = self
                .rng
                .gen_range(-s.direction_variability..=s.direction_variability);
            s.direction += change * dt;
        }
        s.direction = normalize_angle(s.direction);

        self.vector()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn gusty() -> WindSettings {
        WindSettings {
            speed: 5.0,
            max_gust: 8.0,
            speed_variability: 3.0,
            direction_variability: 20.0,
            direction: 350.0,
        }
    }

    #[test]
    fn test_default_settings_file_form() {
        let json = serde_json::to_value(WindSettings::default()).unwrap();
        assert_eq!(json["max-gust"], 0.0);
        assert_eq!(json["direction"], 270.0);
        let partial: WindSettings = serde_json::from_str(r#"{"speed": 2}"#).unwrap();
        assert_eq!(partial.direction, 270.0);
    }

    #[test]
    fn test_calm_wind_is_constant() {
        let mut wind = WindGenerator::seeded(
            WindSettings {
                speed: 4.0,
                max_gust: 10.0,
                direction: 90.0,
                ..WindSettings::default()
            },
            7,
        );
        for _ in 0..100 {
            let v = wind.step(0.1);
            assert_approx_eq!(v.x, 0.0, 1e-9);
            assert_approx_eq!(v.y, 4.0, 1e-9);
        }
    }

    #[test]
    fn test_stays_within_bounds() {
        let mut wind = WindGenerator::seeded(gusty(), 42);
        for _ in 0..10_000 {
            let v = wind.step(0.5);
            let s = wind.settings();
            assert!((0.0..=8.0).contains(&s.speed));
            assert!((0.0..360.0).contains(&s.direction));
            assert!(v.magnitude() <= 8.0 + 1e-9);
        }
    }

    #[test]
    fn test_seed_is_deterministic() {
        let mut a = WindGenerator::seeded(gusty(), 3);
        let mut b = WindGenerator::seeded(gusty(), 3);
        for _ in 0..50 {
            assert_eq!(a.step(0.2), b.step(0.2));
        }
    }

    #[test]
    fn test_initial_speed_clamped_to_gust() {
        let wind = WindGenerator::seeded(
            WindSettings {
                speed: 12.0,
                max_gust: 6.0,
                ..WindSettings::default()
            },
            1,
        );
        assert_eq!(wind.settings().speed, 6.0);
    }
}
