//! Priority arbitration between the sources that want to steer a rudder.

use crate::surface::FlatSurface;
use shared::angle_diff;

/// Local rudder angle that points straight aft.
pub const RUDDER_STRAIGHT: f64 = 270.0;

/// Rudder input sources, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputSource {
    Internal,
    Client,
    Autopilot,
}

impl InputSource {
    pub const PRIORITY: [InputSource; 3] = [
        InputSource::Internal,
        InputSource::Client,
        InputSource::Autopilot,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            InputSource::Internal => "internal",
            InputSource::Client => "client",
            InputSource::Autopilot => "autopilot",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Owns the rudder surface and decides which input drives it.
///
/// Inputs are relative angles in [-90, 90] (0 = straight). After every change the highest
/// priority source with a value wins and the rudder is held at `value + 270`; with no
/// source set the rudder swings freely.
#[derive(Debug, Clone)]
pub struct RudderArbiter {
    inputs: [Option<f64>; 3],
    active: Option<InputSource>,
    rudder: FlatSurface,
}

impl RudderArbiter {
    pub fn new(rudder: FlatSurface) -> Self {
        let mut arbiter = RudderArbiter {
            inputs: [None; 3],
            active: None,
            rudder,
        };
        arbiter.resolve();
        arbiter
    }

    pub fn set_input(&mut self, source: InputSource, angle: f64) {
        self.inputs[source.index()] = Some(angle.clamp(-90.0, 90.0));
        self.resolve();
    }

    pub fn disable_input(&mut self, source: InputSource) {
        self.inputs[source.index()] = None;
        self.resolve();
    }

    pub fn input(&self, source: InputSource) -> Option<f64> {
        self.inputs[source.index()]
    }

    /// Source currently driving the rudder.
    pub fn active_source(&self) -> Option<InputSource> {
        self.active
    }

    /// Relative angle of the winning source, if any.
    pub fn active_input(&self) -> Option<f64> {
        self.active.and_then(|source| self.input(source))
    }

    /// Current rudder angle relative to straight, whoever set it.
    pub fn relative_angle(&self) -> f64 {
        angle_diff(RUDDER_STRAIGHT, self.rudder.angle())
    }

    pub fn rudder(&self) -> &FlatSurface {
        &self.rudder
    }

    pub fn rudder_mut(&mut self) -> &mut FlatSurface {
        &mut self.rudder
    }

    fn resolve(&mut self) {
        for source in InputSource::PRIORITY {
            if let Some(angle) = self.inputs[source.index()] {
                self.active = Some(source);
                self.rudder.set_angle(Some(angle + RUDDER_STRAIGHT));
                return;
            }
        }
        self.active = None;
        self.rudder.set_angle(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::WATER_DENSITY;
    use assert_approx_eq::assert_approx_eq;

    fn arbiter() -> RudderArbiter {
        RudderArbiter::new(FlatSurface::new(0.35, WATER_DENSITY, 1.2, RUDDER_STRAIGHT))
    }

    #[test]
    fn test_no_input_is_free() {
        let arbiter = arbiter();
        assert_eq!(arbiter.active_source(), None);
        assert!(!arbiter.rudder().is_driven());
    }

    #[test]
    fn test_priority_order() {
        let mut arbiter = arbiter();
        arbiter.set_input(InputSource::Autopilot, 20.0);
        assert_eq!(arbiter.active_source(), Some(InputSource::Autopilot));
        assert_approx_eq!(arbiter.rudder().angle(), 290.0, 1e-12);

        arbiter.set_input(InputSource::Client, -10.0);
        assert_eq!(arbiter.active_source(), Some(InputSource::Client));
        assert_approx_eq!(arbiter.relative_angle(), -10.0, 1e-12);

        arbiter.disable_input(InputSource::Client);
        assert_eq!(arbiter.active_source(), Some(InputSource::Autopilot));
        assert_eq!(arbiter.active_input(), Some(20.0));

        arbiter.disable_input(InputSource::Autopilot);
        assert_eq!(arbiter.active_source(), None);
        assert!(!arbiter.rudder().is_driven());
    }

    #[test]
    fn test_inputs_are_clamped() {
        let mut arbiter = arbiter();
        arbiter.set_input(InputSource::Client, 135.0);
        assert_eq!(arbiter.input(InputSource::Client), Some(90.0));
        arbiter.set_input(InputSource::Internal, -400.0);
        assert_eq!(arbiter.active_input(), Some(-90.0));
        assert_approx_eq!(arbiter.rudder().angle(), 180.0, 1e-12);
    }

    #[test]
    fn test_source_names() {
        let names: Vec<&str> = InputSource::PRIORITY.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["internal", "client", "autopilot"]);
    }
}
