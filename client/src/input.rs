//! Command-line controls turned into per-tick user input

use shared::{AutopilotInput, BoatInput, TargetSpec, UserInput, Vector2};
use std::collections::BTreeMap;

/// Parses `NAME=ANGLE`, as given to `--sheet`.
pub fn parse_sheet(arg: &str) -> Result<(String, f64), String> {
    let (name, angle) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=ANGLE, got {:?}", arg))?;
    let angle: f64 = angle
        .trim()
        .parse()
        .map_err(|_| format!("sheeting angle {:?} is not a number", angle))?;
    if name.trim().is_empty() {
        return Err("sail name is empty".to_string());
    }
    Ok((name.trim().to_string(), angle))
}

/// Parses `X,Y`, as given to `--autopilot-target`.
pub fn parse_point(arg: &str) -> Result<Vector2, String> {
    let (x, y) = arg
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got {:?}", arg))?;
    let coord = |s: &str| {
        s.trim()
            .parse::<f64>()
            .map_err(|_| format!("coordinate {:?} is not a number", s))
    };
    Ok(Vector2::new(coord(x)?, coord(y)?))
}

/// Produces the input for each UPDATE.
///
/// Boat controls are repeated every time; the autopilot target is sent only
/// with the first update, since the server keeps it until told otherwise.
pub struct InputManager {
    rudder: Option<f64>,
    sheeting_angles: BTreeMap<String, f64>,
    autopilot_target: Option<Vector2>,
    autopilot_sent: bool,
}

impl InputManager {
    pub fn new(
        rudder: Option<f64>,
        sheets: Vec<(String, f64)>,
        autopilot_target: Option<Vector2>,
    ) -> Self {
        InputManager {
            rudder,
            sheeting_angles: sheets.into_iter().collect(),
            autopilot_target,
            autopilot_sent: false,
        }
    }

    pub fn next_input(&mut self) -> UserInput {
        let autopilot = match self.autopilot_target {
            Some(target) if !self.autopilot_sent => {
                self.autopilot_sent = true;
                AutopilotInput {
                    enabled: Some(true),
                    target_pos: Some(TargetSpec::GlobalPos(target)),
                }
            }
            _ => AutopilotInput::default(),
        };
        UserInput {
            boat: BoatInput {
                rudder: self.rudder,
                sheeting_angles: (!self.sheeting_angles.is_empty())
                    .then(|| self.sheeting_angles.clone()),
            },
            autopilot,
            paused: None,
            reset: false,
        }
    }
}
