//! Flat control surfaces (sails and rudders) swinging in a fluid.

use crate::physics::flat_plate_force;
use shared::{angle_diff, is_angle_between, normalize_angle, Vector2};

/// Result of one surface step, in the surface's mounting frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceStep {
    pub center_of_effort: Vector2,
    pub force: Vector2,
    pub limit_reached: bool,
}

/// A flat plate pivoting about one end.
///
/// While free it weathervanes toward the flow and only loads up (produces force) when it
/// is pressed against one of its travel limits. While driven it is held at a commanded
/// angle and always loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatSurface {
    center_of_effort_len: f64,
    density: f64,
    area: f64,
    angle: f64,
    driven: bool,
}

impl FlatSurface {
    pub fn new(center_of_effort_len: f64, density: f64, area: f64, angle: f64) -> Self {
        FlatSurface {
            center_of_effort_len,
            density,
            area,
            angle,
            driven: false,
        }
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    pub fn is_driven(&self) -> bool {
        self.driven
    }

    /// Holds the surface at `angle`, or releases it to swing freely with `None`.
    /// Releasing keeps the current angle.
    pub fn set_angle(&mut self, angle: Option<f64>) {
        match angle {
            Some(angle) => {
                self.angle = angle;
                self.driven = true;
            }
            None => self.driven = false,
        }
    }

    /// Fluid force on the surface at its current angle.
    pub fn force(&self, flow: Vector2) -> Vector2 {
        flat_plate_force(self.density, flow, self.area, self.angle)
    }

    /// Advances the surface by `dt` in a fluid moving at `flow` relative to it.
    ///
    /// `travel` is `(clockwise limit, anticlockwise limit)`; the surface may only rest
    /// strictly inside the anticlockwise arc between them. A free surface swinging past a
    /// limit stops on the limit it was moving toward and loads up. One pushed by no flow
    /// at all carries no load.
    pub fn step(&mut self, dt: f64, flow: Vector2, travel: Option<(f64, f64)>) -> SurfaceStep {
        let mut limit_reached = false;
        let loaded = if self.driven {
            true
        } else {
            let across = flow.rotated_degrees(normalize_angle(-(self.angle - 90.0))).x;
            let rate = -(across / self.center_of_effort_len).to_degrees();
            let change = rate * dt;
            self.angle = normalize_angle(self.angle + change);
            match travel {
                Some((low, high)) if !is_angle_between(self.angle, low, high) => {
                    if change != 0.0 {
                        self.angle = if change > 0.0 { high } else { low };
                        limit_reached = true;
                    } else {
                        self.angle = nearest(self.angle, low, high);
                    }
                    rate != 0.0
                }
                _ => false,
            }
        };

        SurfaceStep {
            center_of_effort: Vector2::new(self.center_of_effort_len, 0.0)
                .rotated_degrees(self.angle),
            force: if loaded {
                self.force(flow)
            } else {
                Vector2::ZERO
            },
            limit_reached,
        }
    }
}

fn nearest(angle: f64, low: f64, high: f64) -> f64 {
    if angle_diff(angle, low).abs() <= angle_diff(angle, high).abs() {
        low
    } else {
        high
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn sail() -> FlatSurface {
        FlatSurface::new(2.0, 1.225, 10.0, 270.0)
    }

    #[test]
    fn test_free_surface_weathervanes() {
        let mut surface = sail();
        // flow across the surface from the west rotates it
        let step = surface.step(0.1, Vector2::new(1.0, 0.0), None);
        assert!(surface.angle() != 270.0);
        assert_eq!(step.force, Vector2::ZERO);
        assert!(!step.limit_reached);
    }

    #[test]
    fn test_aligned_surface_does_not_move() {
        let mut surface = sail();
        surface.step(1.0, Vector2::new(0.0, -5.0), None);
        assert_approx_eq!(surface.angle(), 270.0, 1e-9);
    }

    #[test]
    fn test_limit_clamps_and_loads() {
        let mut surface = sail();
        let travel = Some((260.0, 280.0));
        let step = surface.step(10.0, Vector2::new(3.0, 0.0), travel);
        assert!(step.limit_reached);
        assert!(surface.angle() == 260.0 || surface.angle() == 280.0);
        assert!(step.force.magnitude() > 0.0);
    }

    #[test]
    fn test_clamps_toward_direction_of_swing() {
        let mut surface = sail();
        let flow = Vector2::new(3.0, 0.0);
        let mut probe = sail();
        probe.step(0.001, flow, None);
        let swung_anticlockwise = angle_diff(270.0, probe.angle()) > 0.0;
        surface.step(10.0, flow, Some((260.0, 280.0)));
        let expected = if swung_anticlockwise { 280.0 } else { 260.0 };
        assert_eq!(surface.angle(), expected);
    }

    #[test]
    fn test_no_flow_outside_travel_carries_no_load() {
        let mut surface = FlatSurface::new(2.0, 1.225, 10.0, 200.0);
        let step = surface.step(0.5, Vector2::ZERO, Some((240.0, 300.0)));
        assert_eq!(step.force, Vector2::ZERO);
        assert!(!step.limit_reached);
        assert_eq!(surface.angle(), 240.0);
    }

    #[test]
    fn test_driven_surface_holds_angle_and_loads() {
        let mut surface = FlatSurface::new(0.35, 1000.0, 1.2, 270.0);
        surface.set_angle(Some(300.0));
        let step = surface.step(1.0, Vector2::new(0.0, -2.0), Some((180.0, 0.0)));
        assert_eq!(surface.angle(), 300.0);
        assert!(step.force.magnitude() > 0.0);

        surface.set_angle(None);
        assert!(!surface.is_driven());
        assert_eq!(surface.angle(), 300.0);
    }

    #[test]
    fn test_center_of_effort_follows_angle() {
        let mut surface = FlatSurface::new(2.0, 1.0, 1.0, 90.0);
        let step = surface.step(0.0, Vector2::ZERO, None);
        assert_approx_eq!(step.center_of_effort.x, 0.0, 1e-12);
        assert_approx_eq!(step.center_of_effort.y, 2.0, 1e-12);
    }
}
