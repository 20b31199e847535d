//! Administrative commands carried inside the administrator's UPDATE requests.

use crate::config::SimulatorSettings;
use crate::error::{Result, SimError};
use crate::resources::Resources;
use crate::session::PauseScope;
use crate::simulation::Simulation;
use log::{info, warn};
use shared::AdminCommand;
use std::collections::HashSet;
use std::net::IpAddr;

/// Server-level effects of admin commands, outside the simulation itself.
pub trait ServerControl {
    fn block_ip(&mut self, ip: IpAddr);
    fn unblock_ip(&mut self, ip: IpAddr);
    fn quit(&mut self);
    fn reload_settings(&mut self) -> Result<SimulatorSettings>;
}

/// The network loop's controls: blocked addresses, the quit flag and the settings source.
#[derive(Debug, Default)]
pub struct ServerControls {
    pub blocked_ips: HashSet<IpAddr>,
    pub quit_requested: bool,
    pub resources: Option<Resources>,
}

impl ServerControls {
    pub fn new(resources: Resources) -> Self {
        ServerControls {
            resources: Some(resources),
            ..ServerControls::default()
        }
    }

    pub fn is_blocked(&self, ip: &IpAddr) -> bool {
        self.blocked_ips.contains(ip)
    }
}

impl ServerControl for ServerControls {
    fn block_ip(&mut self, ip: IpAddr) {
        self.blocked_ips.insert(ip);
    }

    fn unblock_ip(&mut self, ip: IpAddr) {
        self.blocked_ips.remove(&ip);
    }

    fn quit(&mut self) {
        self.quit_requested = true;
    }

    fn reload_settings(&mut self) -> Result<SimulatorSettings> {
        match &self.resources {
            Some(resources) => resources.settings(),
            None => Err(SimError::Config("no settings source to reload from".into())),
        }
    }
}

/// Runs one command against the simulation.
///
/// Commands naming an unknown user are logged and skipped.
pub fn execute(
    sim: &mut Simulation,
    command: &AdminCommand,
    control: &mut dyn ServerControl,
) -> Result<()> {
    info!("Admin command {}", command.verb());
    match command {
        AdminCommand::Block(ip) => control.block_ip(*ip),
        AdminCommand::Unblock(ip) => control.unblock_ip(*ip),
        AdminCommand::Quit => control.quit(),
        AdminCommand::ReloadSettings => {
            let settings = control.reload_settings()?;
            sim.apply_settings(&settings)?;
        }
        AdminCommand::SetTimeConst(ratio) => sim.set_time_ratio(*ratio)?,
        AdminCommand::Reset => sim.reset(),
        AdminCommand::TogglePause => sim.toggle_pause(),
        AdminCommand::Status => sim.request_status(),
        AdminCommand::UserReset(username) => {
            if let Some(session) = user(sim, command, username) {
                session.reset();
            }
        }
        AdminCommand::UserTogglePause(username) => {
            if let Some(session) = user(sim, command, username) {
                let paused = !session.is_locally_paused();
                session.set_paused(paused, PauseScope::Local);
            }
        }
        AdminCommand::UserSetPos(username, pos) => {
            if let Some(session) = user(sim, command, username) {
                session.set_position(*pos)?;
            }
        }
        AdminCommand::UserRepair(username) => {
            if let Some(session) = user(sim, command, username) {
                if !session.repair() {
                    info!("{} is wrecked, repair skipped", username);
                }
            }
        }
        AdminCommand::UserBlock(username) => {
            if let Some(session) = user(sim, command, username) {
                session.set_blocked(true);
            }
        }
        AdminCommand::UserUnblock(username) => {
            if let Some(session) = user(sim, command, username) {
                session.set_blocked(false);
            }
        }
    }
    Ok(())
}

fn user<'a>(
    sim: &'a mut Simulation,
    command: &AdminCommand,
    username: &str,
) -> Option<&'a mut crate::session::ClientSession> {
    let session = sim.session_mut(username);
    if session.is_none() {
        warn!("{} names unknown user {:?}", command.verb(), username);
    }
    session
}
