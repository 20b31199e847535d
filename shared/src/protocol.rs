//! Request and response documents exchanged between clients and the simulation server.
//!
//! Every request is a two element JSON array `[COMMAND, payload]` and every reply is
//! `[success, payload]`. Field names on the wire are kebab-case.

use crate::vector::Vector2;
use serde::de::Error as _;
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::net::IpAddr;
use thiserror::Error;

/// Reasons a request body is rejected before it reaches the simulation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("client error: could not decode request as JSON: {0}")]
    Json(String),
    #[error("request command list must be a non-empty list")]
    NotACommandList,
    #[error("first arg in command list must be of type string")]
    VerbNotString,
    #[error("first arg in request is invalid, it must be \"JOIN\" or \"UPDATE\"")]
    UnknownCommand(String),
    #[error("client request format error in {command} payload: {reason}")]
    BadPayload {
        command: &'static str,
        reason: String,
    },
    #[error("admin command \"{0}\" is not recognized")]
    UnknownAdminCommand(String),
    #[error("admin command {verb} expects {expected}")]
    AdminArguments {
        verb: &'static str,
        expected: &'static str,
    },
    #[error("autopilot target must be [\"global-pos\" | \"local-pos\" | \"user\", value]: {0}")]
    BadTarget(String),
    #[error("HTTP requests are not served by this endpoint")]
    HttpRequest,
}

/// `[username, password, simulation password]`; the last element may be omitted or null.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Credentials(pub String, pub String, pub Option<String>);

impl<'de> Deserialize<'de> for Credentials {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let parts: Vec<Option<String>> = Deserialize::deserialize(deserializer)?;
        let mut parts = parts.into_iter();
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(Some(username)), Some(Some(password)), sim_password, None) => {
                Ok(Credentials(username, password, sim_password.flatten()))
            }
            _ => Err(D::Error::custom(
                "auth must be [username, password, simulation password]",
            )),
        }
    }
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials(username.into(), password.into(), None)
    }

    pub fn with_sim_password(mut self, sim_password: impl Into<String>) -> Self {
        self.2 = Some(sim_password.into());
        self
    }

    pub fn username(&self) -> &str {
        &self.0
    }

    pub fn password(&self) -> &str {
        &self.1
    }

    pub fn sim_password(&self) -> Option<&str> {
        self.2.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRequest {
    pub auth: Credentials,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UpdateRequest {
    pub auth: Credentials,
    #[serde(default)]
    pub user_input: UserInput,
    pub render_dist: f64,
    /// Only honored for the administrator.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub render_dist_extra_boats: Vec<String>,
    /// Only honored for the administrator.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub admin_commands: Vec<AdminCommand>,
}

/// Per-tick input of one participant. Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserInput {
    #[serde(default)]
    pub boat: BoatInput,
    #[serde(default)]
    pub autopilot: AutopilotInput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
    #[serde(default)]
    pub reset: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BoatInput {
    /// Rudder angle relative to straight, in [-90, 90].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rudder: Option<f64>,
    /// Sail name to sheeting angle, each in [0, 90].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheeting_angles: Option<BTreeMap<String, f64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AutopilotInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_pos: Option<TargetSpec>,
}

/// What the autopilot steers toward.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetSpec {
    /// Fixed point in the global frame.
    GlobalPos(Vector2),
    /// Point relative to the boat, fixed in the global frame the first time it is resolved.
    LocalPos(Vector2),
    /// Another participant's current position.
    User(String),
}

impl TargetSpec {
    fn kind(&self) -> &'static str {
        match self {
            TargetSpec::GlobalPos(_) => "global-pos",
            TargetSpec::LocalPos(_) => "local-pos",
            TargetSpec::User(_) => "user",
        }
    }
}

impl Serialize for TargetSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(self.kind())?;
        match self {
            TargetSpec::GlobalPos(pos) | TargetSpec::LocalPos(pos) => {
                tuple.serialize_element(pos)?
            }
            TargetSpec::User(name) => tuple.serialize_element(name)?,
        }
        tuple.end()
    }
}

impl<'de> Deserialize<'de> for TargetSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (kind, value): (String, Value) = Deserialize::deserialize(deserializer)?;
        let bad = |e: serde_json::Error| D::Error::custom(ProtocolError::BadTarget(e.to_string()));
        match kind.as_str() {
            "global-pos" => serde_json::from_value(value)
                .map(TargetSpec::GlobalPos)
                .map_err(bad),
            "local-pos" => serde_json::from_value(value)
                .map(TargetSpec::LocalPos)
                .map_err(bad),
            "user" => serde_json::from_value(value).map(TargetSpec::User).map_err(bad),
            other => Err(D::Error::custom(ProtocolError::BadTarget(format!(
                "unknown target kind {:?}",
                other
            )))),
        }
    }
}

/// Administrative command, written on the wire as `[VERB, args...]`.
#[derive(Debug, Clone, PartialEq)]
pub enum AdminCommand {
    Block(IpAddr),
    Unblock(IpAddr),
    Quit,
    ReloadSettings,
    SetTimeConst(f64),
    Reset,
    TogglePause,
    Status,
    UserReset(String),
    UserTogglePause(String),
    UserSetPos(String, Vector2),
    UserRepair(String),
    UserBlock(String),
    UserUnblock(String),
}

impl AdminCommand {
    pub fn verb(&self) -> &'static str {
        match self {
            AdminCommand::Block(_) => "BLOCK",
            AdminCommand::Unblock(_) => "UNBLOCK",
            AdminCommand::Quit => "QUIT",
            AdminCommand::ReloadSettings => "RELOAD-SETTINGS",
            AdminCommand::SetTimeConst(_) => "SET-TIME-CONST",
            AdminCommand::Reset => "RESET",
            AdminCommand::TogglePause => "TOGGLE-PAUSE",
            AdminCommand::Status => "STATUS",
            AdminCommand::UserReset(_) => "USER-RESET",
            AdminCommand::UserTogglePause(_) => "USER-TOGGLE-PAUSE",
            AdminCommand::UserSetPos(..) => "USER-SET-POS",
            AdminCommand::UserRepair(_) => "USER-REPAIR",
            AdminCommand::UserBlock(_) => "USER-BLOCK",
            AdminCommand::UserUnblock(_) => "USER-UNBLOCK",
        }
    }

    /// Parses `[VERB, args...]`. Verbs are matched case-insensitively.
    pub fn from_values(values: &[Value]) -> Result<Self, ProtocolError> {
        let verb = match values.first() {
            Some(Value::String(verb)) => verb.to_ascii_uppercase(),
            Some(other) => return Err(ProtocolError::UnknownAdminCommand(other.to_string())),
            None => return Err(ProtocolError::UnknownAdminCommand(String::new())),
        };
        let args = &values[1..];

        fn ip(verb: &'static str, args: &[Value]) -> Result<IpAddr, ProtocolError> {
            args.first()
                .and_then(Value::as_str)
                .and_then(|s| s.parse().ok())
                .ok_or(ProtocolError::AdminArguments {
                    verb,
                    expected: "an IP address",
                })
        }

        fn user(verb: &'static str, args: &[Value]) -> Result<String, ProtocolError> {
            args.first()
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or(ProtocolError::AdminArguments {
                    verb,
                    expected: "a username",
                })
        }

        let command = match verb.as_str() {
            "BLOCK" => AdminCommand::Block(ip("BLOCK", args)?),
            "UNBLOCK" => AdminCommand::Unblock(ip("UNBLOCK", args)?),
            "QUIT" => AdminCommand::Quit,
            "RELOAD-SETTINGS" => AdminCommand::ReloadSettings,
            "SET-TIME-CONST" => {
                let ratio = args.first().and_then(Value::as_f64).ok_or(
                    ProtocolError::AdminArguments {
                        verb: "SET-TIME-CONST",
                        expected: "a numeric time ratio",
                    },
                )?;
                AdminCommand::SetTimeConst(ratio)
            }
            "RESET" => AdminCommand::Reset,
            "TOGGLE-PAUSE" => AdminCommand::TogglePause,
            "STATUS" => AdminCommand::Status,
            "USER-RESET" => AdminCommand::UserReset(user("USER-RESET", args)?),
            "USER-TOGGLE-PAUSE" => AdminCommand::UserTogglePause(user("USER-TOGGLE-PAUSE", args)?),
            "USER-SET-POS" => {
                let username = user("USER-SET-POS", args)?;
                let pos = args
                    .get(1)
                    .and_then(|v| serde_json::from_value::<Vector2>(v.clone()).ok())
                    .ok_or(ProtocolError::AdminArguments {
                        verb: "USER-SET-POS",
                        expected: "a username and an [x, y] position",
                    })?;
                AdminCommand::UserSetPos(username, pos)
            }
            "USER-REPAIR" => AdminCommand::UserRepair(user("USER-REPAIR", args)?),
            "USER-BLOCK" => AdminCommand::UserBlock(user("USER-BLOCK", args)?),
            "USER-UNBLOCK" => AdminCommand::UserUnblock(user("USER-UNBLOCK", args)?),
            _ => return Err(ProtocolError::UnknownAdminCommand(verb)),
        };
        Ok(command)
    }

    pub fn to_values(&self) -> Vec<Value> {
        let mut values = vec![Value::from(self.verb())];
        match self {
            AdminCommand::Block(ip) | AdminCommand::Unblock(ip) => {
                values.push(Value::from(ip.to_string()))
            }
            AdminCommand::SetTimeConst(ratio) => values.push(Value::from(*ratio)),
            AdminCommand::UserSetPos(user, pos) => {
                values.push(Value::from(user.as_str()));
                values.push(Value::from(vec![pos.x, pos.y]));
            }
            AdminCommand::UserReset(user)
            | AdminCommand::UserTogglePause(user)
            | AdminCommand::UserRepair(user)
            | AdminCommand::UserBlock(user)
            | AdminCommand::UserUnblock(user) => values.push(Value::from(user.as_str())),
            AdminCommand::Quit
            | AdminCommand::ReloadSettings
            | AdminCommand::Reset
            | AdminCommand::TogglePause
            | AdminCommand::Status => {}
        }
        values
    }
}

impl Serialize for AdminCommand {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_values().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AdminCommand {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let values: Vec<Value> = Deserialize::deserialize(deserializer)?;
        AdminCommand::from_values(&values).map_err(D::Error::custom)
    }
}

/// Top-level request sent by a client.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    Join(JoinRequest),
    Update(UpdateRequest),
}

impl ClientCommand {
    /// Parses a frame body, distinguishing each way the request can be malformed.
    pub fn parse(body: &str) -> Result<Self, ProtocolError> {
        if body.starts_with("GET") {
            return Err(ProtocolError::HttpRequest);
        }
        let value: Value =
            serde_json::from_str(body).map_err(|e| ProtocolError::Json(e.to_string()))?;
        let mut items = match value {
            Value::Array(items) if !items.is_empty() => items.into_iter(),
            _ => return Err(ProtocolError::NotACommandList),
        };
        let verb = match items.next() {
            Some(Value::String(verb)) => verb,
            _ => return Err(ProtocolError::VerbNotString),
        };
        let payload = items.next().unwrap_or(Value::Null);
        match verb.as_str() {
            "JOIN" => serde_json::from_value(payload)
                .map(ClientCommand::Join)
                .map_err(|e| ProtocolError::BadPayload {
                    command: "JOIN",
                    reason: e.to_string(),
                }),
            "UPDATE" => serde_json::from_value(payload)
                .map(ClientCommand::Update)
                .map_err(|e| ProtocolError::BadPayload {
                    command: "UPDATE",
                    reason: e.to_string(),
                }),
            _ => Err(ProtocolError::UnknownCommand(verb)),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let (verb, payload) = match self {
            ClientCommand::Join(request) => ("JOIN", serde_json::to_value(request)?),
            ClientCommand::Update(request) => ("UPDATE", serde_json::to_value(request)?),
        };
        serde_json::to_string(&(verb, payload))
    }

    pub fn credentials(&self) -> &Credentials {
        match self {
            ClientCommand::Join(request) => &request.auth,
            ClientCommand::Update(request) => &request.auth,
        }
    }
}

/// `[success, payload]`. On failure the payload is an error message string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply(pub bool, pub Value);

impl Reply {
    pub fn ok<T: Serialize>(payload: &T) -> Result<Self, serde_json::Error> {
        Ok(Reply(true, serde_json::to_value(payload)?))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Reply(false, Value::String(message.into()))
    }

    pub fn is_ok(&self) -> bool {
        self.0
    }

    /// Splits the reply into the payload or the server's error message.
    pub fn into_result(self) -> Result<Value, String> {
        match self {
            Reply(true, payload) => Ok(payload),
            Reply(false, Value::String(message)) => Err(message),
            Reply(false, other) => Err(other.to_string()),
        }
    }
}

/// On-screen notification: `[text, [r, g, b], seconds, avoid-duplicate]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert(pub String, pub [u8; 3], pub f64, pub bool);

impl Alert {
    pub const RED: [u8; 3] = [255, 0, 0];
    pub const GREEN: [u8; 3] = [0, 255, 0];

    pub fn new(text: impl Into<String>, color: [u8; 3], seconds: f64, avoid_duplicate: bool) -> Self {
        Alert(text.into(), color, seconds, avoid_duplicate)
    }

    pub fn text(&self) -> &str {
        &self.0
    }
}

/// A force together with its local center of effort, serialized as `[[cx, cy], [fx, fy]]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[Vector2; 2]", into = "[Vector2; 2]")]
pub struct AppliedForce {
    pub center_of_effort: Vector2,
    pub force: Vector2,
}

impl From<[Vector2; 2]> for AppliedForce {
    fn from([center_of_effort, force]: [Vector2; 2]) -> Self {
        AppliedForce {
            center_of_effort,
            force,
        }
    }
}

impl From<AppliedForce> for [Vector2; 2] {
    fn from(f: AppliedForce) -> Self {
        [f.center_of_effort, f.force]
    }
}

/// Snapshot of the named forces acting on a hull.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct NamedForces {
    pub hull_water_drag: AppliedForce,
    pub hull_air_drag: AppliedForce,
    pub sails_total: AppliedForce,
    pub rudder: AppliedForce,
    pub total: AppliedForce,
}

fn default_sheeting_angle() -> f64 {
    90.0
}

fn default_rudder_angle() -> f64 {
    270.0
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SailState {
    #[serde(default)]
    pub angle: f64,
    #[serde(default = "default_sheeting_angle")]
    pub sheeting_angle: f64,
    #[serde(default)]
    pub force: Vector2,
}

impl Default for SailState {
    fn default() -> Self {
        SailState {
            angle: 270.0,
            sheeting_angle: default_sheeting_angle(),
            force: Vector2::ZERO,
        }
    }
}

/// Mutable state of one boat. Persisted in simulation files and sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BoatState {
    #[serde(rename = "type")]
    pub boat_type: String,
    pub pos: Vector2,
    #[serde(default)]
    pub velocity: Vector2,
    pub angle: f64,
    #[serde(default)]
    pub angular_velocity: f64,
    #[serde(default = "default_rudder_angle")]
    pub rudder_angle: f64,
    pub hull_durability: f64,
    #[serde(default = "default_true")]
    pub rudder_enable: bool,
    pub sails: BTreeMap<String, SailState>,
    #[serde(default)]
    pub forces: NamedForces,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AutopilotReport {
    pub on_course: bool,
    pub tacking: bool,
    pub travel_time: Option<f64>,
    pub target_pos: Vector2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GeneralStatus {
    pub paused: bool,
    pub finished: bool,
    pub enabled: bool,
    pub record: Option<f64>,
    pub timer: f64,
    pub reset: bool,
    /// Present only when the owning client was connected this tick.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alerts: Option<Vec<Alert>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<String>>,
}

/// Full per-tick view of one participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub boat: BoatState,
    pub autopilot: AutopilotReport,
    pub general: GeneralStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinimalGeneral {
    pub enabled: bool,
    pub paused: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinimalBoat {
    pub pos: Vector2,
    pub angle: f64,
    pub velocity: Vector2,
}

/// Stub sent for boats outside the requester's render distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinimalView {
    pub general: MinimalGeneral,
    pub boat: MinimalBoat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClientView {
    Full(Box<SessionReport>),
    Minimal(MinimalView),
}

impl ClientView {
    pub fn is_full(&self) -> bool {
        matches!(self, ClientView::Full(_))
    }

    pub fn pos(&self) -> Vector2 {
        match self {
            ClientView::Full(report) => report.boat.pos,
            ClientView::Minimal(view) => view.boat.pos,
        }
    }
}

/// Extended per-user status visible only to the administrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminStatusView {
    pub online: bool,
    pub ip: Option<String>,
    pub password: String,
    pub paused: bool,
    pub blocked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GlobalData {
    pub paused: bool,
    pub wind: Vector2,
    #[serde(rename = "FPS")]
    pub fps: f64,
    pub timer: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_states: Option<BTreeMap<String, AdminStatusView>>,
}

/// Successful UPDATE payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WorldUpdate {
    pub global_data: GlobalData,
    pub clients: BTreeMap<String, ClientView>,
}
