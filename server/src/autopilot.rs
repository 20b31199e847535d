//! Autopilot: steers a boat toward a target, tacking when the target is upwind.

use crate::boat::Boat;
use crate::error::{Result, SimError};
use crate::rudder::InputSource;
use serde::{Deserialize, Serialize};
use shared::{angle_diff, normalize_angle, sign, AutopilotInput, AutopilotReport, TargetSpec, Vector2};
use std::collections::HashMap;

/// Read-only view of where other participants' boats are.
pub trait PositionLookup {
    fn position_of(&self, username: &str) -> Option<Vector2>;
}

/// Positions captured at the start of a tick.
impl PositionLookup for HashMap<String, Vector2> {
    fn position_of(&self, username: &str) -> Option<Vector2> {
        self.get(username).copied()
    }
}

/// Lookup that knows nobody, for boats sailing alone.
pub struct NoPositions;

impl PositionLookup for NoPositions {
    fn position_of(&self, _username: &str) -> Option<Vector2> {
        None
    }
}

/// Persisted autopilot settings, the `autopilot` key of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AutopilotConfig {
    pub target_pos: TargetSpec,
    #[serde(default)]
    pub enabled: bool,
}

impl AutopilotConfig {
    /// Disabled, aimed at `end`.
    pub fn toward(end: Vector2) -> Self {
        AutopilotConfig {
            target_pos: TargetSpec::GlobalPos(end),
            enabled: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Autopilot {
    target: TargetSpec,
    /// Global position a `LocalPos` target resolved to the first time it was used.
    local_anchor: Option<Vector2>,
    enabled: bool,
    max_rudder_movement: f64,
    tack_sign: f64,
    last_target_pos: Vector2,
    aim_angle: Option<f64>,
}

impl Autopilot {
    pub fn new(config: &AutopilotConfig, max_rudder_movement: f64) -> Self {
        Autopilot {
            target: config.target_pos.clone(),
            local_anchor: None,
            enabled: config.enabled,
            max_rudder_movement,
            tack_sign: 1.0,
            last_target_pos: Vector2::ZERO,
            aim_angle: None,
        }
    }

    pub fn config(&self) -> AutopilotConfig {
        AutopilotConfig {
            target_pos: self.target.clone(),
            enabled: self.enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn target(&self) -> &TargetSpec {
        &self.target
    }

    /// Heading the autopilot last steered for.
    pub fn aim_angle(&self) -> Option<f64> {
        self.aim_angle
    }

    pub fn set_max_rudder_movement(&mut self, degrees_per_second: f64) {
        self.max_rudder_movement = degrees_per_second;
    }

    /// Switching off releases the autopilot's hold on the rudder.
    pub fn set_enabled(&mut self, boat: &mut Boat, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            boat.arbiter_mut().disable_input(InputSource::Autopilot);
            self.aim_angle = None;
        }
    }

    /// Checks input without applying it.
    pub fn validate_input(&self, input: &AutopilotInput, lookup: &dyn PositionLookup) -> Result<()> {
        match &input.target_pos {
            Some(TargetSpec::User(name)) if lookup.position_of(name).is_none() => Err(
                SimError::Validation(format!("autopilot target user {:?} does not exist", name)),
            ),
            Some(TargetSpec::GlobalPos(p)) | Some(TargetSpec::LocalPos(p)) if !p.is_finite() => {
                Err(SimError::Validation(
                    "autopilot target position must be finite".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }

    /// Applies input, then steers `boat` for one tick of `dt` simulated seconds.
    pub fn update(
        &mut self,
        boat: &mut Boat,
        dt: f64,
        input: &AutopilotInput,
        lookup: &dyn PositionLookup,
    ) -> Result<AutopilotReport> {
        self.validate_input(input, lookup)?;
        if let Some(enabled) = input.enabled {
            self.set_enabled(boat, enabled);
        }
        if let Some(target) = &input.target_pos {
            self.target = target.clone();
            self.local_anchor = None;
        }

        self.tack_sign = sign(boat.apparent_wind().x);
        let target_pos = self.resolve_target(boat, lookup);
        let to_target = target_pos - boat.pos;
        let target_angle = to_target.angle_degrees();

        let upwind = boat.global_wind().angle_degrees() + 180.0;
        let spec = boat.spec();
        let best_tacking_angle =
            normalize_angle(upwind - spec.upwind_max_wind_angle * self.tack_sign);

        let speed = boat.velocity.magnitude();
        let mut travel_time = (speed > 0.0).then(|| to_target.magnitude() / speed);
        let mut angle = target_angle;
        let mut tacking = false;
        if angle_diff(upwind, target_angle).abs() < spec.upwind_max_total_leeway {
            angle = best_tacking_angle;
            tacking = true;
            travel_time = None;
        }

        let on_course = angle_diff(boat.angle, angle).abs() < 45.0
            && angle_diff(boat.velocity.angle_degrees(), angle).abs() < 45.0
            && boat.local_velocity().y > 0.0;
        if !on_course {
            travel_time = None;
        }

        self.aim_for_angle(boat, angle, on_course, dt);

        Ok(AutopilotReport {
            on_course,
            tacking,
            travel_time,
            target_pos,
        })
    }

    fn resolve_target(&mut self, boat: &Boat, lookup: &dyn PositionLookup) -> Vector2 {
        let pos = match &self.target {
            TargetSpec::GlobalPos(p) => *p,
            TargetSpec::LocalPos(p) => {
                let frame = boat.frame();
                *self
                    .local_anchor
                    .get_or_insert_with(|| frame.pos_to_global(*p))
            }
            TargetSpec::User(name) => lookup.position_of(name).unwrap_or(self.last_target_pos),
        };
        self.last_target_pos = pos;
        pos
    }

    fn aim_for_angle(&mut self, boat: &mut Boat, angle: f64, adjust_for_leeway: bool, dt: f64) {
        if !self.enabled {
            return;
        }
        let mut angle = angle;
        if adjust_for_leeway {
            angle += boat.leeway() * self.tack_sign;
        }
        let angle = normalize_angle(angle);
        self.aim_angle = Some(angle);

        let mut wanted = angle_diff(angle, boat.angle).clamp(-60.0, 60.0);
        if boat.local_velocity().y < 0.0 {
            wanted = -wanted;
        }
        let current = boat.arbiter().relative_angle();
        let diff = angle_diff(current, wanted);
        let step = sign(diff) * diff.abs().min(self.max_rudder_movement * dt.abs());
        boat.arbiter_mut()
            .set_input(InputSource::Autopilot, current + step);
    }
}
