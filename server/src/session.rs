//! One participant: their boat, autopilot, timer and lifecycle state.

use crate::autopilot::{Autopilot, AutopilotConfig, PositionLookup};
use crate::boat::{Boat, BoatSpec};
use crate::config::SimulatorSettings;
use crate::error::{Result, SimError};
use crate::map::MapModel;
use crate::timer::Timer;
use log::{info, warn};
use serde::{Deserialize, Deserializer, Serialize};
use shared::{
    AdminStatusView, Alert, AutopilotInput, AutopilotReport, BoatInput, BoatState, GeneralStatus,
    MinimalBoat, MinimalGeneral, MinimalView, SessionReport, UserInput, Vector2, ADMIN_USERNAME,
};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Administrator,
    Participant,
}

impl Role {
    /// Role given to a session when it is created; callers read it back with
    /// `ClientSession::role`.
    pub fn of(username: &str) -> Role {
        if username == ADMIN_USERNAME {
            Role::Administrator
        } else {
            Role::Participant
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseScope {
    /// Requested by the participant or toggled for them by the administrator.
    Local,
    /// Applied to everyone by a simulation-wide pause.
    Global,
}

/// Lifecycle changes the simulation turns into alerts for everybody.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Shipwreck,
    Finished,
    Reset,
}

/// Reads a stored completion record; old files use `-1` for "none".
pub(crate) fn legacy_record<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<f64>, D::Error> {
    let record = Option::<f64>::deserialize(deserializer)?;
    Ok(record.filter(|r| *r >= 0.0))
}

fn default_true() -> bool {
    true
}

/// Session snapshot as stored in a simulation file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SessionFile {
    pub username: String,
    #[serde(default)]
    pub finished: bool,
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub blocked: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, deserialize_with = "legacy_record")]
    pub record: Option<f64>,
    #[serde(default)]
    pub tracer_lst: Vec<Vector2>,
    #[serde(default)]
    pub timer: Timer,
    /// Absent in older files; defaults to a disabled autopilot aimed at the map's end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autopilot: Option<AutopilotConfig>,
    /// State restored on reset. Defaults to `boat`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boat_start: Option<BoatState>,
    pub boat: BoatState,
}

impl SessionFile {
    /// Fresh participant at the map start.
    pub fn new(username: &str, boat_type: &str, spec: &BoatSpec, start: Vector2) -> SessionFile {
        let boat = spec.new_state(boat_type, start);
        SessionFile {
            username: username.to_string(),
            finished: false,
            paused: false,
            blocked: false,
            enabled: true,
            record: None,
            tracer_lst: Vec::new(),
            timer: Timer::running(),
            autopilot: None,
            boat_start: Some(boat.clone()),
            boat,
        }
    }
}

/// Session snapshot sent to joining clients: the file form plus the boat type's spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClientSessionView {
    #[serde(flatten)]
    pub session: SessionFile,
    pub boat_static_config: BoatSpec,
}

/// Shared per-tick inputs for every session.
pub struct TickContext<'a> {
    /// Simulated seconds to advance.
    pub sim_dt: f64,
    pub wind: Vector2,
    pub map: &'a MapModel,
    pub lookup: &'a dyn PositionLookup,
    pub now: Instant,
}

/// What one session produced this tick.
#[derive(Debug)]
pub struct SessionOutcome {
    /// Full view, used for every requester that has this session in range.
    pub report: SessionReport,
    /// Set when the owner's input was rejected; becomes their reply.
    pub error: Option<String>,
    pub events: Vec<SessionEvent>,
}

pub struct ClientSession {
    username: String,
    password: String,
    role: Role,
    boat: Boat,
    boat_start: BoatState,
    autopilot: Autopilot,
    held_boat_input: BoatInput,
    enabled: bool,
    paused: bool,
    globally_paused: bool,
    blocked: bool,
    finished: bool,
    record: Option<f64>,
    tracer: Vec<Vector2>,
    timer: Timer,
    alerts: Vec<Alert>,
    client_events: Vec<String>,
    events: Vec<SessionEvent>,
    last_seen: Option<Instant>,
    ip: Option<IpAddr>,
    tracer_resolution: Option<f64>,
    client_timeout: Duration,
}

impl ClientSession {
    pub fn new(
        file: SessionFile,
        spec: Arc<BoatSpec>,
        password: String,
        map: &MapModel,
        settings: &SimulatorSettings,
        globally_paused: bool,
    ) -> Result<ClientSession> {
        let boat_start = file.boat_start.unwrap_or_else(|| file.boat.clone());
        // the start state must load too
        Boat::new(Arc::clone(&spec), &boat_start, settings.sanity_limits)?;
        let boat = Boat::new(spec, &file.boat, settings.sanity_limits)?;
        let autopilot_config = file
            .autopilot
            .unwrap_or_else(|| AutopilotConfig::toward(map.end()));

        Ok(ClientSession {
            role: Role::of(&file.username),
            username: file.username,
            password,
            autopilot: Autopilot::new(&autopilot_config, settings.max_rudder_movement),
            boat,
            boat_start,
            held_boat_input: BoatInput::default(),
            enabled: file.enabled,
            paused: file.paused,
            globally_paused,
            blocked: file.blocked,
            finished: file.finished,
            record: file.record,
            tracer: file.tracer_lst,
            timer: file.timer,
            alerts: Vec::new(),
            client_events: Vec::new(),
            events: Vec::new(),
            last_seen: None,
            ip: None,
            tracer_resolution: settings.tracer_resolution,
            client_timeout: Duration::from_secs_f64(settings.client_timeout),
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn boat(&self) -> &Boat {
        &self.boat
    }

    pub fn boat_mut(&mut self) -> &mut Boat {
        &mut self.boat
    }

    pub fn autopilot(&self) -> &Autopilot {
        &self.autopilot
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    /// Paused locally or by a global pause.
    pub fn is_paused(&self) -> bool {
        self.paused || self.globally_paused
    }

    pub fn is_locally_paused(&self) -> bool {
        self.paused
    }

    pub fn record(&self) -> Option<f64> {
        self.record
    }

    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut Timer {
        &mut self.timer
    }

    pub fn tracer(&self) -> &[Vector2] {
        &self.tracer
    }

    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    pub fn ip(&self) -> Option<IpAddr> {
        self.ip
    }

    /// Records a successful JOIN from `ip`.
    pub fn connect(&mut self, ip: IpAddr, now: Instant) {
        self.ip = Some(ip);
        self.last_seen = Some(now);
    }

    pub fn is_online(&self, now: Instant) -> bool {
        self.last_seen
            .map_or(false, |seen| now.saturating_duration_since(seen) < self.client_timeout)
    }

    pub fn apply_settings(&mut self, settings: &SimulatorSettings) {
        self.tracer_resolution = settings.tracer_resolution;
        self.client_timeout = Duration::from_secs_f64(settings.client_timeout);
        self.boat.set_sanity_limits(settings.sanity_limits);
        self.autopilot
            .set_max_rudder_movement(settings.max_rudder_movement);
    }

    pub fn set_blocked(&mut self, blocked: bool) {
        self.blocked = blocked;
    }

    pub fn add_alert(&mut self, alert: Alert) {
        self.alerts.push(alert);
    }

    pub fn set_paused(&mut self, paused: bool, scope: PauseScope) {
        match scope {
            PauseScope::Local => self.paused = paused,
            PauseScope::Global => self.globally_paused = paused,
        }
        if self.is_paused() {
            self.timer.stop();
        } else if self.enabled && !self.finished {
            self.timer.start();
        }
    }

    /// Puts the boat back at its starting state and clears finish, wreck and path.
    pub fn reset(&mut self) {
        if let Err(e) = self.boat.load_state(&self.boat_start) {
            warn!("Could not restore start state for {}: {}", self.username, e);
        }
        self.held_boat_input = BoatInput::default();
        self.tracer.clear();
        self.finished = false;
        self.enabled = true;
        self.paused = false;
        self.events.push(SessionEvent::Reset);
        self.client_events.push("reset".to_string());
        self.timer.reset();
        if !self.is_paused() {
            self.timer.start();
        }
        info!("Session {} reset", self.username);
    }

    /// Applies collision damage. No effect on indestructible or wrecked boats.
    pub fn damage(&mut self, speed: f64, mass: f64) {
        if self.boat.is_indestructible() || !self.enabled || self.boat.hull_durability <= 0.0 {
            return;
        }
        let damage = speed * mass * 0.01;
        self.boat.hull_durability = (self.boat.hull_durability - damage).max(0.0);
        self.client_events.push(format!("collision {}", damage));
        if self.boat.hull_durability == 0.0 {
            self.shipwreck();
        }
    }

    fn shipwreck(&mut self) {
        self.timer.stop();
        self.boat.clear_forces();
        self.autopilot.set_enabled(&mut self.boat, false);
        if !self.enabled {
            return;
        }
        self.enabled = false;
        self.events.push(SessionEvent::Shipwreck);
        self.client_events.push("shipwreck".to_string());
        info!("Session {} shipwrecked", self.username);
    }

    fn finish(&mut self) {
        self.timer.stop();
        self.finished = true;
        let time = self.timer.result();
        let new_record = self.record.map_or(true, |record| time < record);
        if new_record {
            self.record = Some(time);
        }
        self.client_events
            .push(format!("finished {} {}", self.timer, u8::from(new_record)));
        self.events.push(SessionEvent::Finished);
        info!("Session {} finished in {}", self.username, self.timer);
    }

    /// Restores hull durability. Wrecked boats need a reset instead.
    pub fn repair(&mut self) -> bool {
        if !self.enabled {
            return false;
        }
        self.boat.hull_durability = self.boat.spec().max_hull_durability;
        self.add_alert(Alert::new(
            "Boat durability fixed by Admin",
            Alert::GREEN,
            5.0,
            true,
        ));
        true
    }

    pub fn set_position(&mut self, pos: Vector2) -> Result<()> {
        if !pos.is_finite() {
            return Err(SimError::Validation(format!(
                "position must be finite, got {:?}",
                pos
            )));
        }
        self.boat.pos = pos;
        self.boat.prev_pos = pos;
        Ok(())
    }

    fn validate_input(&self, input: &UserInput, lookup: &dyn PositionLookup) -> Result<()> {
        self.boat.validate_input(&input.boat)?;
        self.autopilot.validate_input(&input.autopilot, lookup)
    }

    /// Advances the session by one tick.
    ///
    /// `input` is `None` when the owner sent nothing this tick; their last boat controls
    /// stay applied. Rejected input is treated the same way and reported in the outcome,
    /// and the session then skips land collision and finish checks for the tick.
    pub fn update(&mut self, ctx: &TickContext<'_>, input: Option<&UserInput>) -> SessionOutcome {
        let connected = input.is_some();
        let mut error = None;
        let mut autopilot_input = AutopilotInput::default();

        if let Some(input) = input {
            self.last_seen = Some(ctx.now);
            match self.validate_input(input, ctx.lookup) {
                Ok(()) => {
                    self.held_boat_input = input.boat.clone();
                    if self.enabled {
                        autopilot_input = input.autopilot.clone();
                    }
                    if let Some(paused) = input.paused {
                        self.set_paused(paused, PauseScope::Local);
                    }
                    if input.reset {
                        self.reset();
                    }
                }
                Err(e) => {
                    warn!("Rejected input from {}: {}", self.username, e);
                    error = Some(e.to_string());
                }
            }
        }

        let autopilot = match self
            .autopilot
            .update(&mut self.boat, ctx.sim_dt, &autopilot_input, ctx.lookup)
        {
            Ok(report) => report,
            Err(e) => {
                error.get_or_insert_with(|| e.to_string());
                AutopilotReport {
                    on_course: false,
                    tacking: false,
                    travel_time: None,
                    target_pos: self.boat.pos,
                }
            }
        };

        let mut moved = false;
        if self.enabled && !self.is_paused() {
            match self.boat.update(ctx.wind, ctx.sim_dt, &self.held_boat_input) {
                Ok(()) => moved = true,
                Err(e) => {
                    self.held_boat_input = BoatInput::default();
                    error.get_or_insert_with(|| e.to_string());
                }
            }
            self.trace_path();
        }
        self.timer.advance(ctx.sim_dt);

        if error.is_none() {
            if self.enabled && ctx.map.detect_hull_collision(&self.boat) {
                self.damage(self.boat.velocity.magnitude(), self.boat.mass());
                if self.enabled {
                    self.boat.velocity = -self.boat.velocity;
                    self.boat.angular_velocity = -self.boat.angular_velocity;
                }
            }
            if moved && self.boat.sanity_limits_reached() {
                self.add_alert(Alert::new("sanity limits reached", Alert::RED, 1.0, true));
            }
            if self.enabled && !self.finished && ctx.map.reached_end(&self.boat) {
                self.finish();
            }
        }

        let mut general = self.general_status();
        if connected && error.is_none() {
            general.alerts = Some(std::mem::take(&mut self.alerts));
            general.events = Some(std::mem::take(&mut self.client_events));
        }

        SessionOutcome {
            report: SessionReport {
                boat: self.boat.state(),
                autopilot,
                general,
            },
            error,
            events: std::mem::take(&mut self.events),
        }
    }

    fn trace_path(&mut self) {
        let Some(resolution) = self.tracer_resolution else {
            return;
        };
        let pos = self.boat.pos;
        let far_enough = self
            .tracer
            .last()
            .map_or(true, |last| last.distance(&pos) >= resolution);
        if far_enough {
            self.tracer.push(pos);
        }
    }

    fn general_status(&self) -> GeneralStatus {
        GeneralStatus {
            paused: self.is_paused(),
            finished: self.finished,
            enabled: self.enabled,
            record: self.record,
            timer: self.timer.result(),
            reset: false,
            alerts: None,
            events: None,
        }
    }

    pub fn file_form(&self) -> SessionFile {
        SessionFile {
            username: self.username.clone(),
            finished: self.finished,
            paused: self.paused,
            blocked: self.blocked,
            enabled: self.enabled,
            record: self.record,
            tracer_lst: self.tracer.clone(),
            timer: self.timer.clone(),
            autopilot: Some(self.autopilot.config()),
            boat_start: Some(self.boat_start.clone()),
            boat: self.boat.state(),
        }
    }

    pub fn client_form(&self) -> ClientSessionView {
        ClientSessionView {
            session: self.file_form(),
            boat_static_config: self.boat.spec().as_ref().clone(),
        }
    }

    pub fn minimal_view(&self) -> MinimalView {
        MinimalView {
            general: MinimalGeneral {
                enabled: self.enabled,
                paused: self.is_paused(),
            },
            boat: MinimalBoat {
                pos: self.boat.pos,
                angle: self.boat.angle,
                velocity: self.boat.velocity,
            },
        }
    }

    pub fn admin_status(&self, now: Instant) -> AdminStatusView {
        AdminStatusView {
            online: self.is_online(now),
            ip: self.ip.map(|ip| ip.to_string()),
            password: self.password.clone(),
            paused: self.is_paused(),
            blocked: self.blocked,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::autopilot::NoPositions;
    use crate::map::tests::open_water;
    use crate::map::{LandmassFile, MapFile};

    pub(crate) fn session_at(username: &str, pos: Vector2, spec: BoatSpec) -> ClientSession {
        let map = open_water();
        let spec = Arc::new(spec);
        let mut file = SessionFile::new(username, "dinghy", &spec, pos);
        file.boat.pos = pos;
        ClientSession::new(
            file,
            spec,
            "pw".to_string(),
            &map,
            &SimulatorSettings::default(),
            false,
        )
        .unwrap()
    }

    fn light_boat(durability: f64) -> BoatSpec {
        let mut spec = BoatSpec::template();
        spec.mass = 2.0;
        spec.max_hull_durability = durability;
        spec
    }

    fn tick<'a>(map: &'a MapModel, dt: f64) -> TickContext<'a> {
        TickContext {
            sim_dt: dt,
            wind: Vector2::ZERO,
            map,
            lookup: &NoPositions,
            now: Instant::now(),
        }
    }

    #[test]
    fn test_damage_then_shipwreck_once() {
        let mut session = session_at("alice", Vector2::ZERO, light_boat(100.0));
        let map = open_water();
        let mut shipwrecks = 0;
        for i in 0..150 {
            session.damage(50.0, 2.0);
            if i == 0 {
                assert_eq!(session.boat().hull_durability, 99.0);
            }
            let outcome = session.update(&tick(&map, 0.1), Some(&UserInput::default()));
            shipwrecks += outcome
                .events
                .iter()
                .filter(|e| **e == SessionEvent::Shipwreck)
                .count();
        }
        assert_eq!(shipwrecks, 1);
        assert!(!session.is_enabled());
        assert_eq!(session.boat().hull_durability, 0.0);
        assert_eq!(session.boat().velocity, Vector2::ZERO);
    }

    #[test]
    fn test_shipwreck_event_sent_to_owner_once() {
        let mut session = session_at("alice", Vector2::ZERO, light_boat(1.0));
        let map = open_water();
        session.damage(50.0, 2.0);
        session.damage(50.0, 2.0);
        let outcome = session.update(&tick(&map, 0.1), Some(&UserInput::default()));
        let events = outcome.report.general.events.unwrap();
        assert_eq!(events.iter().filter(|e| *e == "shipwreck").count(), 1);
        assert_eq!(events[0], "collision 1");
    }

    #[test]
    fn test_indestructible_boat_takes_no_damage() {
        let mut session = session_at("alice", Vector2::ZERO, light_boat(-1.0));
        session.damage(1000.0, 1000.0);
        assert_eq!(session.boat().hull_durability, -1.0);
        assert!(session.is_enabled());
    }

    #[test]
    fn test_finish_is_idempotent() {
        let map = MapModel::new(MapFile {
            size: Vector2::new(100.0, 100.0),
            start: Vector2::ZERO,
            end: Vector2::new(0.0, 0.5),
            landmasses: vec![],
        })
        .unwrap();
        let mut session = session_at("alice", Vector2::ZERO, BoatSpec::template());
        let first = session.update(&tick(&map, 0.5), Some(&UserInput::default()));
        assert_eq!(first.events, vec![SessionEvent::Finished]);
        assert!(session.is_finished());
        assert_eq!(session.record(), Some(0.5));
        let events = first.report.general.events.unwrap();
        assert_eq!(events, vec!["finished 0:00:00.500000 1".to_string()]);

        for _ in 0..5 {
            let again = session.update(&tick(&map, 0.5), Some(&UserInput::default()));
            assert!(again.events.is_empty());
            assert!(again.report.general.finished);
        }
        assert_eq!(session.timer().result(), 0.5);
    }

    #[test]
    fn test_reset_restores_start() {
        let mut session = session_at("alice", Vector2::new(3.0, 4.0), light_boat(1.0));
        let map = open_water();
        session.boat_mut().pos = Vector2::new(50.0, 50.0);
        session.damage(100.0, 2.0);
        assert!(!session.is_enabled());

        let input = UserInput {
            reset: true,
            ..UserInput::default()
        };
        let outcome = session.update(&tick(&map, 0.1), Some(&input));
        assert!(session.is_enabled());
        assert_eq!(session.boat().pos, Vector2::new(3.0, 4.0));
        assert_eq!(session.boat().hull_durability, 1.0);
        assert!(outcome.events.contains(&SessionEvent::Reset));
        assert!(session.timer().running);
    }

    #[test]
    fn test_pause_stops_boat_and_timer() {
        let mut session = session_at("alice", Vector2::ZERO, BoatSpec::template());
        session.boat_mut().velocity = Vector2::new(0.0, 2.0);
        let map = open_water();
        let pause = UserInput {
            paused: Some(true),
            ..UserInput::default()
        };
        let outcome = session.update(&tick(&map, 1.0), Some(&pause));
        assert!(outcome.report.general.paused);
        assert_eq!(session.boat().pos, Vector2::ZERO);
        assert_eq!(session.timer().result(), 0.0);

        session.set_paused(false, PauseScope::Local);
        session.set_paused(true, PauseScope::Global);
        assert!(session.is_paused());
        assert!(!session.is_locally_paused());
    }

    #[test]
    fn test_invalid_input_rejected_but_session_advances() {
        let mut session = session_at("alice", Vector2::ZERO, BoatSpec::template());
        session.boat_mut().velocity = Vector2::new(0.0, 1.0);
        let map = open_water();
        let mut input = UserInput::default();
        input.boat.rudder = Some(200.0);
        input.reset = true;
        let outcome = session.update(&tick(&map, 0.1), Some(&input));
        assert!(outcome.error.unwrap().contains("rudder"));
        assert!(outcome.report.general.events.is_none());
        assert!(!outcome.events.contains(&SessionEvent::Reset));
        assert!(session.boat().pos.y > 0.0);
    }

    #[test]
    fn test_land_collision_damages_and_bounces() {
        let map = MapModel::new(MapFile {
            size: Vector2::new(100.0, 100.0),
            start: Vector2::ZERO,
            end: Vector2::new(90.0, 90.0),
            landmasses: vec![LandmassFile {
                coords: vec![
                    Vector2::new(-10.0, 2.0),
                    Vector2::new(10.0, 2.0),
                    Vector2::new(10.0, 12.0),
                    Vector2::new(-10.0, 12.0),
                ],
                rep_point: Vector2::new(0.0, 5.0),
                color: None,
            }],
        })
        .unwrap();
        let mut session = session_at("alice", Vector2::ZERO, BoatSpec::template());
        session.boat_mut().velocity = Vector2::new(0.0, 10.0);
        let outcome = session.update(&tick(&map, 0.01), Some(&UserInput::default()));
        assert!(session.boat().hull_durability < 1000.0);
        assert!(session.boat().velocity.y < 0.0);
        let events = outcome.report.general.events.unwrap();
        assert!(events[0].starts_with("collision "));
    }

    #[test]
    fn test_absent_owner_keeps_controls_and_alerts() {
        let mut session = session_at("alice", Vector2::ZERO, BoatSpec::template());
        let map = open_water();
        let mut input = UserInput::default();
        input.boat.rudder = Some(20.0);
        session.update(&tick(&map, 0.1), Some(&input));
        session.add_alert(Alert::new("hello", Alert::GREEN, 5.0, false));

        let outcome = session.update(&tick(&map, 0.1), None);
        assert!(outcome.report.general.alerts.is_none());
        assert_eq!(session.alerts().len(), 1);
        assert_eq!(session.boat().arbiter().input(crate::rudder::InputSource::Client), Some(20.0));

        let outcome = session.update(&tick(&map, 0.1), Some(&UserInput::default()));
        assert_eq!(outcome.report.general.alerts.unwrap().len(), 1);
        assert!(session.alerts().is_empty());
    }

    #[test]
    fn test_tracer_resolution() {
        let mut session = session_at("alice", Vector2::ZERO, BoatSpec::template());
        let map = open_water();
        session.boat_mut().velocity = Vector2::new(0.0, 3.0);
        for _ in 0..10 {
            session.update(&tick(&map, 0.1), None);
        }
        let tracer = session.tracer();
        assert!(tracer.len() >= 2);
        for pair in tracer.windows(2) {
            assert!(pair[0].distance(&pair[1]) >= 1.0);
        }
    }

    #[test]
    fn test_session_file_form() {
        let session = session_at("alice", Vector2::new(1.0, 2.0), BoatSpec::template());
        let json = serde_json::to_value(session.file_form()).unwrap();
        assert_eq!(json["username"], "alice");
        assert_eq!(json["boat"]["pos"], serde_json::json!([1.0, 2.0]));
        assert_eq!(json["autopilot"]["enabled"], false);
        assert!(json["tracer-lst"].as_array().unwrap().is_empty());

        let client = serde_json::to_value(session.client_form()).unwrap();
        assert_eq!(client["username"], "alice");
        assert_eq!(client["boat-static-config"]["mass"], 1000.0);
    }

    #[test]
    fn test_legacy_record_loads_as_none() {
        let spec = BoatSpec::template();
        let mut json = serde_json::to_value(SessionFile::new("bob", "dinghy", &spec, Vector2::ZERO))
            .unwrap();
        json["record"] = serde_json::json!(-1);
        let file: SessionFile = serde_json::from_value(json).unwrap();
        assert_eq!(file.record, None);
    }

    #[test]
    fn test_repair_only_when_enabled() {
        let mut session = session_at("alice", Vector2::ZERO, light_boat(10.0));
        session.damage(5.0, 2.0);
        assert!(session.repair());
        assert_eq!(session.boat().hull_durability, 10.0);
        session.damage(1000.0, 2.0);
        assert!(!session.repair());
        assert_eq!(session.boat().hull_durability, 0.0);
    }

    #[test]
    fn test_roles() {
        assert_eq!(Role::of(ADMIN_USERNAME), Role::Administrator);
        assert_eq!(Role::of("alice"), Role::Participant);
    }
}
