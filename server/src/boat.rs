//! Sailboat rigid-body model: static specification, sails, rudder and integration.

use crate::config::SanityLimits;
use crate::error::{Result, SimError};
use crate::geometry::Polygon;
use crate::physics::{angular_drag, combine, drag, AIR_DENSITY, WATER_DENSITY};
use crate::rudder::{InputSource, RudderArbiter, RUDDER_STRAIGHT};
use crate::surface::FlatSurface;
use log::warn;
use serde::{Deserialize, Serialize};
use shared::{
    angle_diff, normalize_angle, AppliedForce, BoatInput, BoatState, BodyFrame, NamedForces,
    SailState, Vector2,
};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::sync::Arc;

/// Hull durability value meaning the boat cannot be damaged.
pub const INDESTRUCTIBLE: f64 = -1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SailSpec {
    pub area: f64,
    /// Distance from the tack to the sail's center of effort.
    pub center_of_effort: f64,
    /// Local Y coordinate of the tack.
    pub tack: f64,
    pub foot_len: f64,
}

/// Immutable description of a boat type, loaded from `boats/<type>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BoatSpec {
    /// Hull outline in local coordinates, counter-clockwise.
    pub perimeter: Vec<Vector2>,
    /// Local Y coordinate where hull water drag acts.
    pub center_of_lateral_resistance: f64,
    pub forward_drag: f64,
    pub sideways_drag: f64,
    pub scale: f64,
    pub boat_air_drag: f64,
    pub max_draft: f64,
    /// Local Y coordinate of the rudder pivot.
    pub rudder_pivot: f64,
    pub rudder_area: f64,
    pub rudder_center_of_effort: f64,
    pub rudder_len: f64,
    pub mass: f64,
    pub moment: f64,
    pub angular_drag: f64,
    /// `-1` makes the hull indestructible.
    pub max_hull_durability: f64,
    /// Best angle off the wind when sailing upwind.
    pub upwind_max_wind_angle: f64,
    /// Angle between the wind and the boat's track when sailing at `upwind_max_wind_angle`.
    pub upwind_max_total_leeway: f64,
    pub sails_static: BTreeMap<String, SailSpec>,
}

impl BoatSpec {
    /// Starting point for new boat types.
    pub fn template() -> BoatSpec {
        let mut sails_static = BTreeMap::new();
        sails_static.insert(
            "main".to_string(),
            SailSpec {
                area: 10.0,
                center_of_effort: 2.5,
                tack: 1.0,
                foot_len: 4.0,
            },
        );
        sails_static.insert(
            "jib".to_string(),
            SailSpec {
                area: 4.0,
                center_of_effort: 0.5,
                tack: 3.0,
                foot_len: 2.0,
            },
        );
        BoatSpec {
            perimeter: vec![
                Vector2::new(1.0, -3.0),
                Vector2::new(0.0, 3.0),
                Vector2::new(-1.0, -3.0),
            ],
            center_of_lateral_resistance: 0.0,
            forward_drag: 0.02,
            sideways_drag: 4.0,
            scale: 3.0,
            boat_air_drag: 0.1,
            max_draft: 0.5,
            rudder_pivot: -3.0,
            rudder_area: 1.2,
            rudder_center_of_effort: 0.35,
            rudder_len: 0.7,
            mass: 1000.0,
            moment: 500.0,
            angular_drag: 0.0,
            max_hull_durability: 1000.0,
            upwind_max_wind_angle: 66.0,
            upwind_max_total_leeway: 73.7,
            sails_static,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(SimError::Load(msg));
        if self.perimeter.len() < 3 {
            return bad("boat perimeter needs at least 3 points".into());
        }
        if self.perimeter.iter().any(|p| !p.is_finite()) {
            return bad("boat perimeter has a non-finite coordinate".into());
        }
        if Polygon::new(&self.perimeter).signed_area() <= 0.0 {
            return bad("boat perimeter must be listed anticlockwise".into());
        }
        if !(self.mass > 0.0) || !(self.moment > 0.0) {
            return bad(format!(
                "mass and moment must be positive, got {} and {}",
                self.mass, self.moment
            ));
        }
        if self.rudder_area < 0.0 || (self.rudder_area > 0.0 && !(self.rudder_center_of_effort > 0.0))
        {
            return bad("rudder needs a non-negative area and a positive center of effort".into());
        }
        if !(self.max_hull_durability > 0.0 || self.max_hull_durability == INDESTRUCTIBLE) {
            return bad(format!(
                "max-hull-durability must be positive or -1, got {}",
                self.max_hull_durability
            ));
        }
        for (name, sail) in &self.sails_static {
            if sail.area < 0.0 || !(sail.center_of_effort > 0.0) {
                return bad(format!(
                    "sail {:?} needs a non-negative area and a positive center of effort",
                    name
                ));
            }
        }
        Ok(())
    }

    /// Hull polygon in local coordinates.
    pub fn hull(&self) -> Polygon {
        Polygon::new(&self.perimeter)
    }

    /// State of a boat of this type freshly placed at `pos`, pointing north.
    pub fn new_state(&self, boat_type: &str, pos: Vector2) -> BoatState {
        BoatState {
            boat_type: boat_type.to_string(),
            pos,
            velocity: Vector2::ZERO,
            angle: 90.0,
            angular_velocity: 0.0,
            rudder_angle: RUDDER_STRAIGHT,
            hull_durability: self.max_hull_durability,
            rudder_enable: true,
            sails: self
                .sails_static
                .keys()
                .map(|name| (name.clone(), SailState::default()))
                .collect(),
            forces: NamedForces::default(),
        }
    }
}

/// A sail: a free-swinging surface whose travel is bounded by its sheet.
#[derive(Debug, Clone)]
pub struct Sail {
    surface: FlatSurface,
    tack: f64,
    pub sheeting_angle: f64,
    force: Vector2,
}

impl Sail {
    fn new(spec: &SailSpec, state: &SailState) -> Self {
        Sail {
            surface: FlatSurface::new(spec.center_of_effort, AIR_DENSITY, spec.area, state.angle),
            tack: spec.tack,
            sheeting_angle: state.sheeting_angle,
            force: state.force,
        }
    }

    pub fn angle(&self) -> f64 {
        self.surface.angle()
    }

    pub fn force(&self) -> Vector2 {
        self.force
    }

    fn travel(&self) -> (f64, f64) {
        (
            normalize_angle(RUDDER_STRAIGHT - self.sheeting_angle),
            normalize_angle(RUDDER_STRAIGHT + self.sheeting_angle),
        )
    }

    fn step(&mut self, dt: f64, apparent_wind: Vector2) -> AppliedForce {
        let travel = self.travel();
        let step = self.surface.step(dt, apparent_wind, Some(travel));
        self.force = step.force;
        AppliedForce {
            center_of_effort: step.center_of_effort + Vector2::new(0.0, self.tack),
            force: step.force,
        }
    }

    fn state(&self) -> SailState {
        SailState {
            angle: self.angle(),
            sheeting_angle: self.sheeting_angle,
            force: self.force,
        }
    }
}

/// Quantities averaged between the two half steps of an update.
#[derive(Debug, Clone, Copy)]
struct PhysicsState {
    pos: Vector2,
    angle: f64,
    velocity: Vector2,
    angular_velocity: f64,
    torque: f64,
}

/// One simulated boat.
#[derive(Debug, Clone)]
pub struct Boat {
    spec: Arc<BoatSpec>,
    boat_type: String,
    hull: Polygon,
    perimeter_radius: f64,
    pub pos: Vector2,
    /// Position before the latest update, for tunneling checks.
    pub prev_pos: Vector2,
    pub velocity: Vector2,
    pub angle: f64,
    pub angular_velocity: f64,
    pub hull_durability: f64,
    pub rudder_enable: bool,
    sails: BTreeMap<String, Sail>,
    arbiter: RudderArbiter,
    forces: NamedForces,
    torque: f64,
    global_wind: Vector2,
    apparent_wind: Vector2,
    leeway: f64,
    sanity_limits: SanityLimits,
    sanity_limits_reached: bool,
}

impl Boat {
    pub fn new(spec: Arc<BoatSpec>, state: &BoatState, sanity_limits: SanityLimits) -> Result<Boat> {
        let rudder = FlatSurface::new(
            spec.rudder_center_of_effort,
            WATER_DENSITY,
            spec.rudder_area,
            state.rudder_angle,
        );
        let hull = spec.hull();
        let mut boat = Boat {
            perimeter_radius: hull.max_radius(),
            hull,
            boat_type: state.boat_type.clone(),
            pos: Vector2::ZERO,
            prev_pos: Vector2::ZERO,
            velocity: Vector2::ZERO,
            angle: 90.0,
            angular_velocity: 0.0,
            hull_durability: spec.max_hull_durability,
            rudder_enable: true,
            sails: BTreeMap::new(),
            arbiter: RudderArbiter::new(rudder),
            forces: NamedForces::default(),
            torque: 0.0,
            global_wind: Vector2::ZERO,
            apparent_wind: Vector2::ZERO,
            leeway: 0.0,
            sanity_limits,
            sanity_limits_reached: false,
            spec,
        };
        boat.load_state(state)?;
        Ok(boat)
    }

    /// Replaces the dynamic state, keeping the boat type.
    pub fn load_state(&mut self, state: &BoatState) -> Result<()> {
        if !state.pos.is_finite() || !state.velocity.is_finite() || !state.angle.is_finite() {
            return Err(SimError::Load(format!(
                "boat state for {:?} has a non-finite position, velocity or angle",
                state.boat_type
            )));
        }
        self.pos = state.pos;
        self.prev_pos = state.pos;
        self.velocity = state.velocity;
        self.angle = normalize_angle(state.angle);
        self.angular_velocity = state.angular_velocity;
        self.hull_durability = state.hull_durability;
        self.rudder_enable = state.rudder_enable;
        self.forces = state.forces.clone();
        self.torque = 0.0;
        self.sanity_limits_reached = false;
        self.sails = self
            .spec
            .sails_static
            .iter()
            .map(|(name, spec)| {
                let sail_state = state.sails.get(name).cloned().unwrap_or_default();
                (name.clone(), Sail::new(spec, &sail_state))
            })
            .collect();
        for name in state.sails.keys() {
            if !self.spec.sails_static.contains_key(name) {
                warn!(
                    "Ignoring sail {:?} unknown to boat type {:?}",
                    name, self.boat_type
                );
            }
        }
        self.arbiter = RudderArbiter::new(FlatSurface::new(
            self.spec.rudder_center_of_effort,
            WATER_DENSITY,
            self.spec.rudder_area,
            state.rudder_angle,
        ));
        self.leeway = self.leeway_angle();
        Ok(())
    }

    pub fn spec(&self) -> &Arc<BoatSpec> {
        &self.spec
    }

    pub fn boat_type(&self) -> &str {
        &self.boat_type
    }

    pub fn mass(&self) -> f64 {
        self.spec.mass
    }

    /// Farthest hull vertex from the boat origin.
    pub fn perimeter_radius(&self) -> f64 {
        self.perimeter_radius
    }

    pub fn frame(&self) -> BodyFrame {
        BodyFrame {
            pos: self.pos,
            angle: self.angle,
            velocity: self.velocity,
        }
    }

    pub fn local_velocity(&self) -> Vector2 {
        self.frame().to_local(self.velocity)
    }

    pub fn hull_global(&self) -> Polygon {
        let frame = self.frame();
        self.hull.transformed(|p| frame.pos_to_global(p))
    }

    pub fn global_wind(&self) -> Vector2 {
        self.global_wind
    }

    /// Wind as felt on board, in local coordinates.
    pub fn apparent_wind(&self) -> Vector2 {
        self.apparent_wind
    }

    /// Angle between heading and direction of travel.
    pub fn leeway(&self) -> f64 {
        self.leeway
    }

    pub fn forces(&self) -> &NamedForces {
        &self.forces
    }

    pub fn torque(&self) -> f64 {
        self.torque
    }

    pub fn sails(&self) -> &BTreeMap<String, Sail> {
        &self.sails
    }

    pub fn arbiter(&self) -> &RudderArbiter {
        &self.arbiter
    }

    pub fn arbiter_mut(&mut self) -> &mut RudderArbiter {
        &mut self.arbiter
    }

    pub fn sanity_limits_reached(&self) -> bool {
        self.sanity_limits_reached
    }

    pub fn set_sanity_limits(&mut self, limits: SanityLimits) {
        self.sanity_limits = limits;
    }

    pub fn is_indestructible(&self) -> bool {
        self.spec.max_hull_durability == INDESTRUCTIBLE
    }

    /// Checks client input without touching the boat.
    pub fn validate_input(&self, input: &BoatInput) -> Result<()> {
        if let Some(rudder) = input.rudder {
            if !(rudder.is_finite() && (-90.0..=90.0).contains(&rudder)) {
                return Err(SimError::Validation(format!(
                    "rudder angle must be a number between -90 and 90, got {}",
                    rudder
                )));
            }
        }
        if let Some(sheets) = &input.sheeting_angles {
            for (name, angle) in sheets {
                if !self.sails.contains_key(name) {
                    return Err(SimError::Validation(format!(
                        "boat has no sail named {:?}",
                        name
                    )));
                }
                if !(angle.is_finite() && (0.0..=90.0).contains(angle)) {
                    return Err(SimError::Validation(format!(
                        "sheeting angle for {:?} must be between 0 and 90, got {}",
                        name, angle
                    )));
                }
            }
        }
        Ok(())
    }

    /// Applies input and advances the boat by `dt` seconds of simulated time.
    ///
    /// Integrates two half steps, averages the state after each, then runs a zero-length
    /// pass so the reported forces match the final state. Invalid input is rejected before
    /// anything changes.
    pub fn update(&mut self, wind: Vector2, dt: f64, input: &BoatInput) -> Result<()> {
        self.validate_input(input)?;
        self.global_wind = wind;
        self.sanity_limits_reached = false;

        match input.rudder {
            Some(angle) => self.arbiter.set_input(InputSource::Client, angle),
            None => self.arbiter.disable_input(InputSource::Client),
        }
        if let Some(sheets) = &input.sheeting_angles {
            for (name, angle) in sheets {
                if let Some(sail) = self.sails.get_mut(name) {
                    sail.sheeting_angle = *angle;
                }
            }
        }

        self.prev_pos = self.pos;
        let half = dt / 2.0;
        self.step_physics(half);
        let mid = self.physics_state();
        self.step_physics(half);
        self.average_with(mid);
        self.step_physics(0.0);

        self.angle = normalize_angle(self.angle);
        self.leeway = self.leeway_angle();
        Ok(())
    }

    /// Zeroes motion and the force snapshot, as after a wreck.
    pub fn clear_forces(&mut self) {
        self.velocity = Vector2::ZERO;
        self.angular_velocity = 0.0;
        self.torque = 0.0;
        self.forces = NamedForces::default();
        for sail in self.sails.values_mut() {
            sail.force = Vector2::ZERO;
        }
    }

    pub fn state(&self) -> BoatState {
        BoatState {
            boat_type: self.boat_type.clone(),
            pos: self.pos,
            velocity: self.velocity,
            angle: self.angle,
            angular_velocity: self.angular_velocity,
            rudder_angle: self.arbiter.rudder().angle(),
            hull_durability: self.hull_durability,
            rudder_enable: self.rudder_enable,
            sails: self
                .sails
                .iter()
                .map(|(name, sail)| (name.clone(), sail.state()))
                .collect(),
            forces: self.forces.clone(),
        }
    }

    fn leeway_angle(&self) -> f64 {
        angle_diff(self.local_velocity().angle_degrees(), 90.0).abs()
    }

    fn step_physics(&mut self, dt: f64) {
        self.apparent_wind = self.frame().velocity_to_local(self.global_wind);
        self.update_forces(dt);

        let global_force = self.frame().to_global(self.forces.total.force);
        self.velocity += global_force * dt / self.spec.mass;
        self.angular_velocity += self.torque * dt / self.spec.moment;
        self.pos += self.velocity * dt;
        self.angle += self.angular_velocity * dt;

        self.check_sanity_limits();
        self.leeway = self.leeway_angle();
    }

    fn update_forces(&mut self, dt: f64) {
        let spec = Arc::clone(&self.spec);
        let local_velocity = self.local_velocity();
        let apparent_wind = self.apparent_wind;

        let sail_parts: Vec<AppliedForce> = self
            .sails
            .values_mut()
            .map(|sail| sail.step(dt, apparent_wind))
            .collect();
        let (sails_total, _) = combine(&sail_parts);

        let hull_water_drag = AppliedForce {
            center_of_effort: Vector2::new(0.0, spec.center_of_lateral_resistance),
            force: -Vector2::new(
                drag(local_velocity.x, spec.sideways_drag, WATER_DENSITY, spec.scale),
                drag(local_velocity.y, spec.forward_drag, WATER_DENSITY, spec.scale),
            ),
        };

        let hull_air_drag = AppliedForce {
            center_of_effort: Vector2::ZERO,
            force: apparent_wind
                * drag(
                    apparent_wind.magnitude(),
                    spec.boat_air_drag,
                    AIR_DENSITY,
                    spec.scale,
                ),
        };

        let rudder = if spec.rudder_area > 0.0 {
            let pivot = Vector2::new(0.0, spec.rudder_pivot);
            let lever = (pivot
                + Vector2::new(spec.rudder_center_of_effort, 0.0)
                    .rotated_degrees(self.arbiter.rudder().angle()))
            .magnitude();
            // water past the rudder: hull motion plus the sweep from the hull turning
            let flow = Vector2::new(
                -((lever * self.angular_velocity * PI / 180.0) + local_velocity.x),
                -local_velocity.y,
            );
            let step = self
                .arbiter
                .rudder_mut()
                .step(dt, flow, Some((180.0, 0.0)));
            AppliedForce {
                center_of_effort: step.center_of_effort + pivot,
                force: step.force,
            }
        } else {
            AppliedForce::default()
        };

        let (total, torque) = combine(&[sails_total, hull_water_drag, hull_air_drag, rudder]);
        self.torque = torque
            + angular_drag(
                self.angular_velocity,
                spec.angular_drag,
                WATER_DENSITY,
                spec.scale,
            );
        self.forces = NamedForces {
            hull_water_drag,
            hull_air_drag,
            sails_total,
            rudder,
            total,
        };
    }

    fn check_sanity_limits(&mut self) {
        if self.velocity.magnitude() >= self.sanity_limits.velocity {
            warn!(
                "Boat {:?} hit the velocity sanity limit, zeroing velocity",
                self.boat_type
            );
            self.velocity = Vector2::ZERO;
            self.sanity_limits_reached = true;
        }
        if self.angular_velocity.abs() >= self.sanity_limits.angular_velocity {
            warn!(
                "Boat {:?} hit the angular velocity sanity limit, zeroing rotation",
                self.boat_type
            );
            self.angular_velocity = 0.0;
            self.sanity_limits_reached = true;
        }
    }

    fn physics_state(&self) -> PhysicsState {
        PhysicsState {
            pos: self.pos,
            angle: self.angle,
            velocity: self.velocity,
            angular_velocity: self.angular_velocity,
            torque: self.torque,
        }
    }

    fn average_with(&mut self, other: PhysicsState) {
        self.pos = (self.pos + other.pos) / 2.0;
        self.angle = (self.angle + other.angle) / 2.0;
        self.velocity = (self.velocity + other.velocity) / 2.0;
        self.angular_velocity = (self.angular_velocity + other.angular_velocity) / 2.0;
        self.torque = (self.torque + other.torque) / 2.0;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    pub(crate) fn test_boat(pos: Vector2) -> Boat {
        let spec = Arc::new(BoatSpec::template());
        let state = spec.new_state("dinghy", pos);
        Boat::new(spec, &state, SanityLimits::default()).unwrap()
    }

    fn frictionless_boat() -> Boat {
        let mut spec = BoatSpec::template();
        spec.forward_drag = 0.0;
        spec.sideways_drag = 0.0;
        spec.boat_air_drag = 0.0;
        spec.rudder_area = 0.0;
        spec.sails_static.clear();
        let spec = Arc::new(spec);
        let state = spec.new_state("plank", Vector2::ZERO);
        Boat::new(spec, &state, SanityLimits::default()).unwrap()
    }

    #[test]
    fn test_template_is_valid() {
        assert!(BoatSpec::template().validate().is_ok());
    }

    #[test]
    fn test_clockwise_perimeter_rejected() {
        let mut spec = BoatSpec::template();
        spec.perimeter.reverse();
        assert!(matches!(spec.validate(), Err(SimError::Load(_))));
    }

    #[test]
    fn test_non_positive_mass_rejected() {
        let mut spec = BoatSpec::template();
        spec.mass = 0.0;
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_spec_file_format() {
        let json = serde_json::to_value(BoatSpec::template()).unwrap();
        assert_eq!(json["rudder-center-of-effort"], 0.35);
        assert_eq!(json["sails-static"]["main"]["foot-len"], 4.0);
        let back: BoatSpec = serde_json::from_value(json).unwrap();
        assert_eq!(back, BoatSpec::template());
    }

    #[test]
    fn test_new_state() {
        let spec = BoatSpec::template();
        let state = spec.new_state("dinghy", Vector2::new(5.0, 5.0));
        assert_eq!(state.angle, 90.0);
        assert_eq!(state.rudder_angle, 270.0);
        assert_eq!(state.hull_durability, 1000.0);
        assert_eq!(state.sails.len(), 2);
        assert_eq!(state.sails["jib"].angle, 270.0);
        assert_eq!(state.sails["jib"].sheeting_angle, 90.0);
    }

    #[test]
    fn test_no_drift_without_force() {
        let mut boat = test_boat(Vector2::ZERO);
        for _ in 0..200 {
            boat.update(Vector2::ZERO, 1.0 / 30.0, &BoatInput::default())
                .unwrap();
        }
        assert_eq!(boat.pos, Vector2::ZERO);
        assert_approx_eq!(boat.angle, 90.0, 1e-12);
    }

    #[test]
    fn test_time_reversible_without_forces() {
        let mut boat = frictionless_boat();
        boat.velocity = Vector2::new(3.0, 4.0);
        boat.angular_velocity = 10.0;
        let start_pos = boat.pos;
        let start_angle = boat.angle;

        boat.update(Vector2::ZERO, 0.5, &BoatInput::default()).unwrap();
        assert!(boat.pos != start_pos);
        boat.update(Vector2::ZERO, -0.5, &BoatInput::default())
            .unwrap();

        assert_approx_eq!(boat.pos.x, start_pos.x, 1e-9);
        assert_approx_eq!(boat.pos.y, start_pos.y, 1e-9);
        assert_approx_eq!(boat.angle, start_angle, 1e-9);
    }

    #[test]
    fn test_sheeting_angle_bounds_sail() {
        for sheeting in [0.0, 15.0, 45.0, 90.0] {
            let mut boat = test_boat(Vector2::ZERO);
            let mut sheets = BTreeMap::new();
            sheets.insert("main".to_string(), sheeting);
            sheets.insert("jib".to_string(), sheeting);
            let input = BoatInput {
                rudder: None,
                sheeting_angles: Some(sheets),
            };
            for _ in 0..50 {
                boat.update(Vector2::new(4.0, -3.0), 0.1, &input).unwrap();
                for sail in boat.sails().values() {
                    assert_eq!(sail.sheeting_angle, sheeting);
                    let offset = angle_diff(270.0, sail.angle());
                    assert!(
                        offset.abs() <= sheeting + 1e-9,
                        "sail at {} with sheeting {}",
                        sail.angle(),
                        sheeting
                    );
                }
            }
        }
    }

    #[test]
    fn test_wind_moves_boat() {
        let mut boat = test_boat(Vector2::ZERO);
        for _ in 0..100 {
            boat.update(Vector2::new(0.0, 5.0), 0.1, &BoatInput::default())
                .unwrap();
        }
        assert!(boat.pos.y > 0.0);
    }

    #[test]
    fn test_invalid_rudder_rejected_without_mutation() {
        let mut boat = test_boat(Vector2::ZERO);
        let before = boat.state();
        let input = BoatInput {
            rudder: Some(91.0),
            sheeting_angles: None,
        };
        assert!(matches!(
            boat.update(Vector2::new(1.0, 1.0), 0.1, &input),
            Err(SimError::Validation(_))
        ));
        assert_eq!(boat.state(), before);
    }

    #[test]
    fn test_unknown_sail_rejected() {
        let boat = test_boat(Vector2::ZERO);
        let mut sheets = BTreeMap::new();
        sheets.insert("spinnaker".to_string(), 10.0);
        let input = BoatInput {
            rudder: None,
            sheeting_angles: Some(sheets),
        };
        assert!(boat.validate_input(&input).is_err());
    }

    #[test]
    fn test_client_rudder_drives_arbiter() {
        let mut boat = test_boat(Vector2::ZERO);
        let input = BoatInput {
            rudder: Some(30.0),
            sheeting_angles: None,
        };
        boat.update(Vector2::ZERO, 0.1, &input).unwrap();
        assert_eq!(boat.arbiter().active_source(), Some(InputSource::Client));
        assert_approx_eq!(boat.arbiter().relative_angle(), 30.0, 1e-9);

        boat.update(Vector2::ZERO, 0.1, &BoatInput::default()).unwrap();
        assert_eq!(boat.arbiter().active_source(), None);
    }

    #[test]
    fn test_rudder_turns_moving_boat() {
        let mut boat = test_boat(Vector2::ZERO);
        boat.velocity = Vector2::new(0.0, 3.0);
        let input = BoatInput {
            rudder: Some(30.0),
            sheeting_angles: None,
        };
        for _ in 0..20 {
            boat.update(Vector2::ZERO, 0.05, &input).unwrap();
        }
        assert!(boat.angular_velocity != 0.0);
        assert!((boat.angle - 90.0).abs() > 1e-6);
    }

    #[test]
    fn test_rudder_enable_flag_does_not_change_physics() {
        let input = BoatInput {
            rudder: Some(30.0),
            sheeting_angles: None,
        };
        let mut enabled = test_boat(Vector2::ZERO);
        let mut flagged = test_boat(Vector2::ZERO);
        flagged.rudder_enable = false;
        for boat in [&mut enabled, &mut flagged] {
            boat.velocity = Vector2::new(0.0, 3.0);
            for _ in 0..20 {
                boat.update(Vector2::ZERO, 0.05, &input).unwrap();
            }
        }
        assert_approx_eq!(flagged.angular_velocity, enabled.angular_velocity, 1e-12);
        assert_approx_eq!(flagged.angle, enabled.angle, 1e-12);
        assert!(!flagged.state().rudder_enable);
    }

    #[test]
    fn test_sanity_limits_zero_runaway_motion() {
        let mut boat = test_boat(Vector2::ZERO);
        boat.set_sanity_limits(SanityLimits {
            velocity: 10.0,
            angular_velocity: 3600.0,
        });
        boat.velocity = Vector2::new(0.0, 50.0);
        boat.update(Vector2::ZERO, 0.01, &BoatInput::default()).unwrap();
        assert!(boat.sanity_limits_reached());
        assert!(boat.velocity.magnitude() < 10.0);
    }

    #[test]
    fn test_state_round_trip() {
        let mut boat = test_boat(Vector2::new(1.0, 2.0));
        boat.update(Vector2::new(3.0, 1.0), 0.1, &BoatInput::default())
            .unwrap();
        let state = boat.state();
        let spec = Arc::clone(boat.spec());
        let copy = Boat::new(spec, &state, SanityLimits::default()).unwrap();
        assert_eq!(copy.pos, boat.pos);
        assert_eq!(copy.sails()["main"].angle(), boat.sails()["main"].angle());
    }

    #[test]
    fn test_non_finite_position_rejected() {
        let spec = Arc::new(BoatSpec::template());
        let state = spec.new_state("dinghy", Vector2::new(f64::NAN, 0.0));
        assert!(Boat::new(spec, &state, SanityLimits::default()).is_err());
    }

    #[test]
    fn test_hull_global_follows_heading() {
        let mut boat = test_boat(Vector2::new(10.0, 0.0));
        boat.angle = 0.0;
        let bow = boat
            .hull_global()
            .points()
            .into_iter()
            .fold(Vector2::new(f64::MIN, 0.0), |a, b| if b.x > a.x { b } else { a });
        // heading east puts the bow 3 units east of the origin
        assert_approx_eq!(bow.x, 13.0, 1e-9);
        assert_approx_eq!(bow.y, 0.0, 1e-9);
    }
}
