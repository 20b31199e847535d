//! The authoritative simulation: every session, the map and the wind, advanced one tick
//! at a time from a batch of client requests.

use crate::admin::{self, ServerControl};
use crate::boat::BoatSpec;
use crate::config::{SettingsOverride, SimulatorSettings};
use crate::error::{Result, SimError};
use crate::map::{MapFile, MapModel};
use crate::session::{
    legacy_record, ClientSession, ClientSessionView, PauseScope, Role, SessionEvent, SessionFile,
    SessionOutcome, TickContext,
};
use crate::timer::{FpsSmoother, Timer};
use crate::wind::{WindGenerator, WindSettings};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use shared::{
    software_version, Alert, ClientView, Credentials, GlobalData, Reply, UpdateRequest, Vector2,
    WorldUpdate, ADMIN_USERNAME,
};
use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

const DUPLICATE_UPDATE_MSG: &str = "only one update per session is accepted each tick";

/// Simulation document stored as `simulations/<name>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SimulationFile {
    /// Map name under `maps/`.
    pub map: String,
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub wind_settings: WindSettings,
    #[serde(default, deserialize_with = "legacy_record")]
    pub record: Option<f64>,
    #[serde(default)]
    pub timer: Timer,
    pub clients: BTreeMap<String, SessionFile>,
    #[serde(default, skip_serializing_if = "SettingsOverride::is_empty")]
    pub settings: SettingsOverride,
}

/// Reply payload for a successful JOIN.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct JoinView {
    pub paused: bool,
    pub record: Option<f64>,
    pub clients: BTreeMap<String, ClientSessionView>,
    pub timer: Timer,
    pub map: MapFile,
    pub server_software_version: Vec<String>,
    /// Administrator only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boats_static_config: Option<BTreeMap<String, BoatSpec>>,
}

/// Everything needed to bring a simulation up.
pub struct SimulationParts {
    pub name: String,
    pub file: SimulationFile,
    pub map: MapModel,
    pub boat_specs: BTreeMap<String, Arc<BoatSpec>>,
    /// Username to password. The administrator entry is replaced by the run's code.
    pub passwords: BTreeMap<String, String>,
    pub admin_code: String,
    pub settings: SimulatorSettings,
}

pub struct Simulation {
    name: String,
    map_name: String,
    map: MapModel,
    sessions: Vec<ClientSession>,
    boat_specs: BTreeMap<String, Arc<BoatSpec>>,
    wind: WindGenerator,
    wind_vector: Vector2,
    paused: bool,
    password: Option<String>,
    record: Option<f64>,
    timer: Timer,
    fps: FpsSmoother,
    settings: SimulatorSettings,
    settings_override: SettingsOverride,
    send_client_states: bool,
    tick: u64,
}

impl Simulation {
    pub fn new(parts: SimulationParts) -> Result<Simulation> {
        let SimulationParts {
            name,
            file,
            map,
            boat_specs,
            passwords,
            admin_code,
            settings,
        } = parts;
        let settings = settings.with_overrides(&file.settings)?;

        let mut sessions = Vec::with_capacity(file.clients.len());
        for (username, mut session_file) in file.clients {
            if session_file.username != username {
                warn!(
                    "Session stored under {:?} names itself {:?}, using the key",
                    username, session_file.username
                );
                session_file.username = username.clone();
            }
            let password = if username == ADMIN_USERNAME {
                admin_code.clone()
            } else {
                passwords.get(&username).cloned().ok_or_else(|| {
                    SimError::Load(format!("user {:?} has no entry in contacts", username))
                })?
            };
            let boat_type = session_file.boat.boat_type.clone();
            let spec = boat_specs.get(&boat_type).cloned().ok_or_else(|| {
                SimError::Load(format!("boat type {:?} is not loaded", boat_type))
            })?;
            sessions.push(ClientSession::new(
                session_file,
                spec,
                password,
                &map,
                &settings,
                file.paused,
            )?);
        }

        let wind = WindGenerator::new(file.wind_settings);
        info!(
            "Loaded simulation {:?} on map {:?} with {} sessions",
            name,
            file.map,
            sessions.len()
        );
        Ok(Simulation {
            name,
            map_name: file.map,
            wind_vector: wind.vector(),
            wind,
            map,
            sessions,
            boat_specs,
            paused: file.paused,
            password: file.password,
            record: file.record,
            timer: file.timer,
            fps: FpsSmoother::default(),
            settings,
            settings_override: file.settings,
            send_client_states: false,
            tick: 0,
        })
    }

    /// Replaces the wind generator, e.g. with a seeded one.
    pub fn set_wind(&mut self, wind: WindGenerator) {
        self.wind_vector = wind.vector();
        self.wind = wind;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn map(&self) -> &MapModel {
        &self.map
    }

    pub fn settings(&self) -> &SimulatorSettings {
        &self.settings
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn record(&self) -> Option<f64> {
        self.record
    }

    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    pub fn wind(&self) -> Vector2 {
        self.wind_vector
    }

    pub fn fps(&self) -> f64 {
        self.fps.fps()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn session(&self, username: &str) -> Option<&ClientSession> {
        self.sessions.iter().find(|s| s.username() == username)
    }

    pub fn session_mut(&mut self, username: &str) -> Option<&mut ClientSession> {
        self.sessions.iter_mut().find(|s| s.username() == username)
    }

    /// Adds a participant at the map start.
    pub fn register_session(
        &mut self,
        username: &str,
        password: &str,
        boat_type: &str,
        spec: Arc<BoatSpec>,
    ) -> Result<()> {
        if self.session(username).is_some() {
            return Err(SimError::Config(format!("user {:?} already exists", username)));
        }
        let file = SessionFile::new(username, boat_type, &spec, self.map.start());
        let session = ClientSession::new(
            file,
            Arc::clone(&spec),
            password.to_string(),
            &self.map,
            &self.settings,
            self.paused,
        )?;
        self.boat_specs.insert(boat_type.to_string(), spec);
        self.sessions.push(session);
        info!("Registered {} with a {} boat", username, boat_type);
        Ok(())
    }

    /// Resolves credentials to a session index. Every failure looks the same.
    pub fn authenticate(&self, auth: &Credentials) -> Result<usize> {
        if let Some(required) = &self.password {
            if auth.sim_password() != Some(required.as_str()) {
                return Err(SimError::Auth);
            }
        }
        self.sessions
            .iter()
            .position(|s| {
                s.username() == auth.username() && s.password() == auth.password() && !s.is_blocked()
            })
            .ok_or(SimError::Auth)
    }

    /// Handles a JOIN: authenticates, records the client address, returns the world.
    pub fn join(&mut self, auth: &Credentials, ip: IpAddr) -> Result<JoinView> {
        let index = self.authenticate(auth).map_err(|e| {
            warn!("Failed JOIN for {:?} from {}", auth.username(), ip);
            e
        })?;
        self.sessions[index].connect(ip, Instant::now());
        info!("{} joined from {}", auth.username(), ip);
        Ok(self.join_view(self.sessions[index].role() == Role::Administrator))
    }

    fn join_view(&self, admin: bool) -> JoinView {
        JoinView {
            paused: self.paused,
            record: self.record,
            clients: self
                .sessions
                .iter()
                .map(|s| (s.username().to_string(), s.client_form()))
                .collect(),
            timer: self.timer.clone(),
            map: self.map.file().clone(),
            server_software_version: software_version(),
            boats_static_config: admin.then(|| {
                self.boat_specs
                    .iter()
                    .map(|(name, spec)| (name.clone(), spec.as_ref().clone()))
                    .collect()
            }),
        }
    }

    pub fn add_global_alert(&mut self, alert: Alert) {
        for session in &mut self.sessions {
            session.add_alert(alert.clone());
        }
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
        let paused = self.paused;
        for session in &mut self.sessions {
            session.set_paused(paused, PauseScope::Global);
        }
        if paused {
            self.add_global_alert(Alert::new("simulation paused", Alert::GREEN, 5.0, false));
            self.timer.stop();
        } else {
            self.add_global_alert(Alert::new("simulation unpaused", Alert::GREEN, 5.0, false));
            self.timer.start();
        }
        info!("Simulation {}", if paused { "paused" } else { "unpaused" });
    }

    /// Unpauses and resets every session and the clock.
    pub fn reset(&mut self) {
        self.paused = false;
        for session in &mut self.sessions {
            session.set_paused(false, PauseScope::Global);
            session.reset();
        }
        self.set_time_ratio_unchecked(1.0);
        self.timer.reset();
        self.timer.start();
        self.add_global_alert(Alert::new("simulation reset", Alert::GREEN, 5.0, false));
        info!("Simulation {} reset", self.name);
    }

    pub fn set_time_ratio(&mut self, ratio: f64) -> Result<()> {
        if !(ratio.is_finite() && ratio >= 0.0) {
            return Err(SimError::Validation(format!(
                "time ratio must be a non-negative number, got {}",
                ratio
            )));
        }
        self.set_time_ratio_unchecked(ratio);
        Ok(())
    }

    fn set_time_ratio_unchecked(&mut self, ratio: f64) {
        self.timer.set_ratio(ratio);
        for session in &mut self.sessions {
            session.timer_mut().set_ratio(ratio);
        }
    }

    /// Makes the next administrator response carry every user's status.
    pub fn request_status(&mut self) {
        self.send_client_states = true;
    }

    /// Installs freshly loaded global settings under this simulation's overrides.
    pub fn apply_settings(&mut self, global: &SimulatorSettings) -> Result<()> {
        let settings = global.with_overrides(&self.settings_override)?;
        for session in &mut self.sessions {
            session.apply_settings(&settings);
        }
        self.settings = settings;
        Ok(())
    }

    /// Advances the simulation one tick and answers every UPDATE in `requests`.
    ///
    /// `frame_dt` is the wall time since the previous tick. Replies line up with
    /// `requests`. Administrator commands run before any physics.
    pub fn update(
        &mut self,
        requests: &[UpdateRequest],
        frame_dt: f64,
        control: &mut dyn ServerControl,
    ) -> Vec<Reply> {
        let now = Instant::now();
        self.tick += 1;
        self.fps.record(frame_dt);
        let sim_dt = if self.paused {
            0.0
        } else {
            if frame_dt > self.settings.lag_limit {
                warn!(
                    "Frame took {:.3}s, clamping to lag limit {}s",
                    frame_dt, self.settings.lag_limit
                );
            }
            frame_dt.min(self.settings.lag_limit) * self.timer.ratio
        };

        let mut replies: Vec<Option<Reply>> = vec![None; requests.len()];
        let mut inputs = HashMap::new();
        for (i, request) in requests.iter().enumerate() {
            let index = match self.authenticate(&request.auth) {
                Ok(index) => index,
                Err(e) => {
                    warn!("Rejected UPDATE for {:?}", request.auth.username());
                    replies[i] = Some(Reply::error(e.to_string()));
                    continue;
                }
            };
            let username = request.auth.username();
            if inputs.contains_key(username) {
                warn!("Second UPDATE from {} in one tick ignored", username);
                replies[i] = Some(Reply::error(DUPLICATE_UPDATE_MSG));
                continue;
            }
            inputs.insert(username.to_string(), &request.user_input);
            if self.sessions[index].role() == Role::Administrator {
                for command in &request.admin_commands {
                    if let Err(e) = admin::execute(self, command, control) {
                        warn!("Admin command {} failed: {}", command.verb(), e);
                        replies[i] = Some(Reply::error(format!(
                            "admin command {} failed: {}",
                            command.verb(),
                            e
                        )));
                    }
                }
            }
        }

        self.wind_vector = self.wind.step(sim_dt);
        self.timer.advance(sim_dt);

        let positions: HashMap<String, Vector2> = self
            .sessions
            .iter()
            .map(|s| (s.username().to_string(), s.boat().pos))
            .collect();
        let ctx = TickContext {
            sim_dt,
            wind: self.wind_vector,
            map: &self.map,
            lookup: &positions,
            now,
        };

        let mut pending_alerts = Vec::new();
        let mut outcomes: Vec<SessionOutcome> = Vec::with_capacity(self.sessions.len());
        for session in &mut self.sessions {
            let outcome = session.update(&ctx, inputs.get(session.username()).copied());
            for event in &outcome.events {
                let username = session.username();
                match event {
                    SessionEvent::Shipwreck => pending_alerts.push(Alert::new(
                        format!("user {} shipwrecked", username),
                        Alert::RED,
                        5.0,
                        true,
                    )),
                    SessionEvent::Finished => {
                        pending_alerts.push(Alert::new(
                            format!(
                                "user {} finished with a time of {}",
                                username,
                                session.timer()
                            ),
                            Alert::GREEN,
                            5.0,
                            true,
                        ));
                        let time = session.timer().result();
                        if self.record.map_or(true, |record| time < record) {
                            self.record = Some(time);
                        }
                    }
                    SessionEvent::Reset => pending_alerts.push(Alert::new(
                        format!("user {} reset", username),
                        Alert::GREEN,
                        5.0,
                        true,
                    )),
                }
            }
            outcomes.push(outcome);
        }

        let errored: Vec<bool> = outcomes.iter().map(|o| o.error.is_some()).collect();
        self.detect_boat_collisions(&errored, &mut pending_alerts);
        for alert in pending_alerts {
            self.add_global_alert(alert);
        }

        let mut sent_client_states = false;
        let responses: Vec<Reply> = requests
            .iter()
            .zip(replies)
            .map(|(request, reply)| {
                if let Some(reply) = reply {
                    return reply;
                }
                let username = request.auth.username();
                let Some(index) = self.sessions.iter().position(|s| s.username() == username)
                else {
                    return Reply::error(SimError::Auth.to_string());
                };
                if let Some(error) = &outcomes[index].error {
                    return Reply::error(error.clone());
                }
                let admin = self.sessions[index].role() == Role::Administrator;
                let world = self.world_update(request, index, &outcomes, admin, now);
                sent_client_states |= admin && world.global_data.client_states.is_some();
                Reply::ok(&world).unwrap_or_else(|e| Reply::error(e.to_string()))
            })
            .collect();
        if sent_client_states {
            self.send_client_states = false;
        }
        responses
    }

    fn world_update(
        &self,
        request: &UpdateRequest,
        requester: usize,
        outcomes: &[SessionOutcome],
        admin: bool,
        now: Instant,
    ) -> WorldUpdate {
        let origin = self.sessions[requester].boat().pos;
        let clients = self
            .sessions
            .iter()
            .zip(outcomes)
            .enumerate()
            .map(|(i, (session, outcome))| {
                let in_range = session.boat().pos.distance(&origin) - session.boat().perimeter_radius()
                    < request.render_dist
                    || (admin
                        && request
                            .render_dist_extra_boats
                            .iter()
                            .any(|name| name == session.username()));
                let view = if in_range {
                    let mut report = outcome.report.clone();
                    if i != requester {
                        report.general.alerts = None;
                        report.general.events = None;
                    }
                    ClientView::Full(Box::new(report))
                } else {
                    ClientView::Minimal(session.minimal_view())
                };
                (session.username().to_string(), view)
            })
            .collect();

        let client_states = (admin && self.send_client_states).then(|| {
            self.sessions
                .iter()
                .map(|s| (s.username().to_string(), s.admin_status(now)))
                .collect()
        });

        WorldUpdate {
            global_data: GlobalData {
                paused: self.paused,
                wind: self.wind_vector,
                fps: self.fps.fps(),
                timer: self.timer.result(),
                client_states,
            },
            clients,
        }
    }

    /// Pairwise hull overlap between boats. Sessions flagged in `skip` sit this tick out.
    fn detect_boat_collisions(&mut self, skip: &[bool], alerts: &mut Vec<Alert>) {
        let hulls: Vec<_> = self.sessions.iter().map(|s| s.boat().hull_global()).collect();
        for j in 1..self.sessions.len() {
            for i in 0..j {
                if skip[i] || skip[j] {
                    continue;
                }
                let (left, right) = self.sessions.split_at_mut(j);
                let (a, b) = (&mut left[i], &mut right[0]);
                if !(a.is_enabled() || b.is_enabled()) || !hulls[i].overlaps(&hulls[j]) {
                    continue;
                }

                let speed = (a.boat().velocity - b.boat().velocity).magnitude();
                let mass = a.boat().mass().min(b.boat().mass());
                a.damage(speed, mass);
                b.damage(speed, mass);
                alerts.push(Alert::new(
                    format!("{} collided with {}", a.username(), b.username()),
                    Alert::RED,
                    5.0,
                    true,
                ));

                match (a.is_enabled(), b.is_enabled()) {
                    (true, true) => {
                        let (boat_a, boat_b) = (a.boat_mut(), b.boat_mut());
                        std::mem::swap(&mut boat_a.velocity, &mut boat_b.velocity);
                        std::mem::swap(&mut boat_a.angular_velocity, &mut boat_b.angular_velocity);
                    }
                    (true, false) => bounce(a),
                    (false, true) => bounce(b),
                    (false, false) => {}
                }
            }
        }
    }

    /// Snapshot for the simulation file.
    pub fn file_form(&self) -> SimulationFile {
        SimulationFile {
            map: self.map_name.clone(),
            paused: self.paused,
            password: self.password.clone(),
            wind_settings: self.wind.settings().clone(),
            record: self.record,
            timer: self.timer.clone(),
            clients: self
                .sessions
                .iter()
                .map(|s| (s.username().to_string(), s.file_form()))
                .collect(),
            settings: self.settings_override.clone(),
        }
    }
}

fn bounce(session: &mut ClientSession) {
    let boat = session.boat_mut();
    boat.velocity = -boat.velocity;
    boat.angular_velocity = -boat.angular_velocity;
}
