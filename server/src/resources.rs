//! Resource directory access: settings, contacts, boat types, maps and simulation files.
//!
//! Layout under the root:
//! - `settings.json`
//! - `contacts.json`, a list of `{"username", "password"}`
//! - `boats/<type>.json`
//! - `maps/<name>.json`
//! - `simulations/<name>.json`

use crate::boat::BoatSpec;
use crate::config::{SettingsFile, SettingsOverride, SimulatorSettings};
use crate::error::{Result, SimError};
use crate::map::{MapFile, MapModel};
use crate::session::SessionFile;
use crate::simulation::{Simulation, SimulationFile, SimulationParts};
use crate::timer::Timer;
use crate::wind::WindSettings;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use shared::ADMIN_USERNAME;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Resources {
    root: PathBuf,
}

impl Resources {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Resources { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read(&self, relative: &Path) -> Result<String> {
        let path = self.root.join(relative);
        fs::read_to_string(&path).map_err(|e| {
            SimError::Load(format!("could not read {}: {}", path.display(), e))
        })
    }

    fn read_json<T: for<'de> Deserialize<'de>>(&self, relative: &Path) -> Result<T> {
        let text = self.read(relative)?;
        serde_json::from_str(&text)
            .map_err(|e| SimError::Load(format!("{}: {}", relative.display(), e)))
    }

    /// Simulator settings. A missing `settings.json` means defaults.
    pub fn settings(&self) -> Result<SimulatorSettings> {
        let path = self.root.join("settings.json");
        if !path.exists() {
            warn!("{} not found, using default settings", path.display());
            return Ok(SimulatorSettings::default());
        }
        SettingsFile::parse(&fs::read_to_string(&path)?)
    }

    /// Username to password.
    pub fn contacts(&self) -> Result<BTreeMap<String, String>> {
        let contacts: Vec<Contact> = self.read_json(Path::new("contacts.json"))?;
        Ok(contacts
            .into_iter()
            .map(|c| (c.username, c.password))
            .collect())
    }

    pub fn boat_spec(&self, boat_type: &str) -> Result<BoatSpec> {
        let spec: BoatSpec = self.read_json(&Path::new("boats").join(format!("{}.json", boat_type)))?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn map(&self, name: &str) -> Result<MapModel> {
        let file: MapFile = self.read_json(&Path::new("maps").join(format!("{}.json", name)))?;
        MapModel::new(file)
    }

    fn simulation_path(&self, name: &str) -> PathBuf {
        self.root.join("simulations").join(format!("{}.json", name))
    }

    pub fn simulation_exists(&self, name: &str) -> bool {
        self.simulation_path(name).exists()
    }

    pub fn simulation_file(&self, name: &str) -> Result<SimulationFile> {
        self.read_json(&Path::new("simulations").join(format!("{}.json", name)))
    }

    /// Builds and writes a fresh simulation: the administrator and every contact start
    /// at the map start in a `boat_type` boat.
    pub fn create_simulation(
        &self,
        name: &str,
        map_name: &str,
        boat_type: &str,
        password: Option<String>,
    ) -> Result<SimulationFile> {
        let map = self.map(map_name)?;
        let spec = self.boat_spec(boat_type)?;
        let mut clients = BTreeMap::new();
        let usernames = std::iter::once(ADMIN_USERNAME.to_string())
            .chain(self.contacts()?.into_keys());
        for username in usernames {
            let file = SessionFile::new(&username, boat_type, &spec, map.start());
            clients.insert(username, file);
        }
        let file = SimulationFile {
            map: map_name.to_string(),
            paused: false,
            password,
            wind_settings: WindSettings::default(),
            record: None,
            timer: Timer::running(),
            clients,
            settings: SettingsOverride::default(),
        };
        self.write_simulation_file(name, &file)?;
        info!(
            "Created simulation {:?} on map {:?} with {} boats",
            name, map_name, boat_type
        );
        Ok(file)
    }

    /// Loads a simulation with every boat type its sessions use.
    pub fn load_simulation(&self, name: &str, admin_code: &str) -> Result<Simulation> {
        let file = self.simulation_file(name)?;
        let map = self.map(&file.map)?;
        let mut boat_specs = BTreeMap::new();
        for session in file.clients.values() {
            let boat_type = &session.boat.boat_type;
            if !boat_specs.contains_key(boat_type) {
                boat_specs.insert(boat_type.clone(), Arc::new(self.boat_spec(boat_type)?));
            }
        }
        Simulation::new(SimulationParts {
            name: name.to_string(),
            file,
            map,
            boat_specs,
            passwords: self.contacts()?,
            admin_code: admin_code.to_string(),
            settings: self.settings()?,
        })
    }

    fn write_simulation_file(&self, name: &str, file: &SimulationFile) -> Result<()> {
        let path = self.simulation_path(name);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&path, serde_json::to_string_pretty(file)?)?;
        Ok(())
    }

    pub fn save_simulation(&self, sim: &Simulation) -> Result<()> {
        self.write_simulation_file(sim.name(), &sim.file_form())
            .map_err(|e| {
                error!("Failed to save simulation {:?}: {}", sim.name(), e);
                e
            })?;
        info!("Saved simulation {:?}", sim.name());
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::map::tests::square;
    use shared::{Credentials, Vector2};
    use std::time::{SystemTime, UNIX_EPOCH};

    /// Scratch resource directory with one map, one boat type and two contacts.
    pub(crate) fn scratch_resources(tag: &str) -> Resources {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let root = std::env::temp_dir().join(format!(
            "sailsim-{}-{}-{}",
            tag,
            std::process::id(),
            nanos
        ));
        fs::create_dir_all(root.join("boats")).unwrap();
        fs::create_dir_all(root.join("maps")).unwrap();
        fs::write(
            root.join("contacts.json"),
            r#"[{"username": "alice", "password": "a"}, {"username": "bob", "password": "b"}]"#,
        )
        .unwrap();
        fs::write(
            root.join("boats/dinghy.json"),
            serde_json::to_string(&BoatSpec::template()).unwrap(),
        )
        .unwrap();
        let map = MapFile {
            size: Vector2::new(1000.0, 1000.0),
            start: Vector2::new(10.0, 10.0),
            end: Vector2::new(500.0, 500.0),
            landmasses: vec![square(200.0, 200.0, 50.0)],
        };
        fs::write(root.join("maps/bay.json"), serde_json::to_string(&map).unwrap()).unwrap();
        Resources::new(root)
    }

    #[test]
    fn test_missing_settings_file_uses_defaults() {
        let resources = scratch_resources("settings");
        assert_eq!(resources.settings().unwrap(), SimulatorSettings::default());
        fs::write(
            resources.root().join("settings.json"),
            r#"{"simulator": {"client-timeout": 9}}"#,
        )
        .unwrap();
        assert_eq!(resources.settings().unwrap().client_timeout, 9.0);
        fs::remove_dir_all(resources.root()).ok();
    }

    #[test]
    fn test_create_and_load_simulation() {
        let resources = scratch_resources("create");
        assert!(!resources.simulation_exists("race"));
        let file = resources
            .create_simulation("race", "bay", "dinghy", None)
            .unwrap();
        assert_eq!(file.clients.len(), 3);
        let admin = &file.clients[ADMIN_USERNAME];
        assert_eq!(admin.boat.pos, Vector2::new(10.0, 10.0));
        assert_eq!(admin.boat.angle, 90.0);
        assert_eq!(admin.boat.hull_durability, 1000.0);
        assert!(admin.boat.sails.values().all(|s| s.angle == 270.0 && s.sheeting_angle == 90.0));
        assert!(resources.simulation_exists("race"));

        let sim = resources.load_simulation("race", "9999").unwrap();
        assert_eq!(sim.session_count(), 3);
        assert!(sim.authenticate(&Credentials::new(ADMIN_USERNAME, "9999")).is_ok());
        assert!(sim.authenticate(&Credentials::new("alice", "a")).is_ok());
        assert!(sim.authenticate(&Credentials::new("alice", "b")).is_err());
        fs::remove_dir_all(resources.root()).ok();
    }

    #[test]
    fn test_save_keeps_state() {
        let resources = scratch_resources("save");
        resources
            .create_simulation("race", "bay", "dinghy", Some("regatta".into()))
            .unwrap();
        let mut sim = resources.load_simulation("race", "1").unwrap();
        sim.session_mut("bob")
            .unwrap()
            .set_position(Vector2::new(40.0, 60.0))
            .unwrap();
        sim.toggle_pause();
        resources.save_simulation(&sim).unwrap();

        let file = resources.simulation_file("race").unwrap();
        assert!(file.paused);
        assert_eq!(file.password.as_deref(), Some("regatta"));
        assert_eq!(file.clients["bob"].boat.pos, Vector2::new(40.0, 60.0));
        let reloaded = resources.load_simulation("race", "1").unwrap();
        assert!(reloaded.is_paused());
        assert!(reloaded.session("alice").unwrap().is_paused());
        fs::remove_dir_all(resources.root()).ok();
    }

    #[test]
    fn test_contact_missing_from_simulation_load() {
        let resources = scratch_resources("contacts");
        resources.create_simulation("race", "bay", "dinghy", None).unwrap();
        fs::write(
            resources.root().join("contacts.json"),
            r#"[{"username": "alice", "password": "a"}]"#,
        )
        .unwrap();
        let result = resources.load_simulation("race", "1");
        assert!(matches!(result, Err(SimError::Load(_))));
        fs::remove_dir_all(resources.root()).ok();
    }

    #[test]
    fn test_invalid_boat_rejected() {
        let resources = scratch_resources("boat");
        let mut spec = BoatSpec::template();
        spec.mass = 0.0;
        fs::write(
            resources.root().join("boats/brick.json"),
            serde_json::to_string(&spec).unwrap(),
        )
        .unwrap();
        assert!(resources.boat_spec("brick").is_err());
        assert!(resources.boat_spec("missing").is_err());
        fs::remove_dir_all(resources.root()).ok();
    }
}
