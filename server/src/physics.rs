//! Fluid drag laws and force bookkeeping shared by hulls, sails and rudders.

use shared::{normalize_angle, AppliedForce, Vector2};

///Density of water in the simulation's units.
pub const WATER_DENSITY: f64 = 1000.0;
///Density of air in the simulation's units.
pub const AIR_DENSITY: f64 = 1.225;
///Drag coefficient of a flat plate held square to the flow.
pub const FLAT_PLATE_DRAG: f64 = 1.28;

///Returns the quadratic drag force for `speed`, carrying the sign of `speed`.
pub fn drag(speed: f64, coefficient: f64, density: f64, scale: f64) -> f64 {
    let force = coefficient * density * speed * speed * scale * 0.5;
    if speed < 0.0 {
        -force
    } else {
        force
    }
}

///Returns the torque opposing an angular velocity.
pub fn angular_drag(angular_velocity: f64, coefficient: f64, density: f64, scale: f64) -> f64 {
    -drag(angular_velocity, coefficient, density, scale)
}

///Returns the force a fluid exerts on a flat plate at `angle`.
/// The force is perpendicular to the plate; only the flow across the plate counts.
pub fn flat_plate_force(density: f64, flow: Vector2, area: f64, angle: f64) -> Vector2 {
    let angle = angle.rem_euclid(180.0);
    let across = flow.rotated_degrees(normalize_angle(-(angle - 90.0))).x;
    let force = drag(across, FLAT_PLATE_DRAG, density, area);
    Vector2::new(force, 0.0).rotated_degrees(normalize_angle(angle - 90.0))
}

///Returns the torque about the origin of `force` applied at `point`, anticlockwise positive.
pub fn torque(point: Vector2, force: Vector2) -> f64 {
    point.cross(&force)
}

///Sums several applied forces.
/// Returns the total force placed at the magnitude-weighted mean center of effort, and the
/// summed torque about the origin.
pub fn combine(parts: &[AppliedForce]) -> (AppliedForce, f64) {
    let mut total = Vector2::ZERO;
    let mut total_torque = 0.0;
    let mut weighted = Vector2::ZERO;
    for part in parts {
        total += part.force;
        total_torque += torque(part.center_of_effort, part.force);
        weighted += part.center_of_effort * part.force.magnitude();
    }
    let magnitude = total.magnitude();
    let center_of_effort = if magnitude == 0.0 {
        Vector2::ZERO
    } else {
        weighted / magnitude
    };
    (
        AppliedForce {
            center_of_effort,
            force: total,
        },
        total_torque,
    )
}
