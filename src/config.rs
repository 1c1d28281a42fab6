// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::fs;
use std::path::{Path, PathBuf};

use config::{Config, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::warn;

mod clip;
mod error;
mod profile;
mod settings;
mod store;

pub use clip::{ClipSettings, DurationMode, RepeatBehavior};
pub use error::ConfigError;
pub use profile::{Binding, MatchMode, Profile};
pub use settings::{GlobalSettings, ListeningMode};
pub use store::{FileStore, SettingsStore};

/// The application configuration: global settings plus the profiles.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct App {
    #[serde(default)]
    global: GlobalSettings,
    #[serde(default)]
    profiles: Vec<Profile>,
    /// The name of the current profile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    current_profile: Option<String>,
    /// The directory relative clip paths resolve against.
    #[serde(skip)]
    base_dir: PathBuf,
}

impl App {
    /// Loads, repairs and validates the app config at the given path.
    pub fn deserialize(path: &Path) -> Result<App, ConfigError> {
        let mut app: App = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize()?;
        app.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        app.normalize();
        app.validate()?;
        Ok(app)
    }

    /// Parses an app config from a YAML string.
    pub fn from_yaml(yaml: &str, base_dir: &Path) -> Result<App, ConfigError> {
        let mut app: App = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize()?;
        app.base_dir = base_dir.to_path_buf();
        app.normalize();
        app.validate()?;
        Ok(app)
    }

    /// Writes the config back out as YAML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        fs::write(path, serde_yml::to_string(self)?)?;
        Ok(())
    }

    pub fn global(&self) -> &GlobalSettings {
        &self.global
    }

    pub fn global_mut(&mut self) -> &mut GlobalSettings {
        &mut self.global
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    /// The current profile, falling back to the first profile when the configured name doesn't
    /// match any profile.
    pub fn current_profile(&self) -> Option<&Profile> {
        self.current_profile
            .as_deref()
            .and_then(|name| self.profiles.iter().find(|profile| profile.name() == name))
            .or_else(|| self.profiles.first())
    }

    /// The current profile with its clip paths resolved.
    pub fn active_profile(&self) -> Option<Profile> {
        self.current_profile()
            .map(|profile| profile.resolved(&self.base_dir))
    }

    /// The listening mode in effect: the current profile's override or the global mode.
    pub fn listening_mode(&self) -> ListeningMode {
        self.current_profile()
            .and_then(Profile::listening_mode)
            .unwrap_or_else(|| self.global.listening_mode())
    }

    fn normalize(&mut self) {
        for profile in self.profiles.iter_mut() {
            profile.normalize();
        }

        if let Some(name) = &self.current_profile {
            if !self.profiles.iter().any(|profile| profile.name() == name) {
                warn!(profile = name, "Current profile not found, using the first profile");
                self.current_profile = self.profiles.first().map(|p| p.name().to_string());
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for profile in self.profiles.iter() {
            profile.validate(self.global.toggle())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::KeyCombination;

    const YAML: &str = r#"
global:
  headphone_device: mock-headphones
  virtual_mic_device: mock-mic
  target_processes: [game.exe]
  toggle: [Ctrl, "2"]
current_profile: Missing
profiles:
  - name: First
    bindings:
      - keys: [Ctrl, V]
        clip:
          file: sounds/airhorn.wav
          volume: 1.5
  - name: Second
    listening_mode: global
    bindings: []
"#;

    #[test]
    fn test_app_deserialize() {
        let app = App::from_yaml(YAML, Path::new("/etc/keycue")).unwrap();

        assert_eq!(Some("mock-headphones"), app.global().headphone_device());
        assert_eq!(Some("mock-mic"), app.global().virtual_mic_device());
        assert_eq!(vec!["game.exe".to_string()], app.global().target_processes());
        assert!(app.global().listener_enabled());
        assert_eq!(&KeyCombination::new(["Ctrl", "2"]), app.global().toggle());

        // Stale profile names fall back to the first profile.
        let profile = app.current_profile().unwrap();
        assert_eq!("First", profile.name());
        assert_eq!(ListeningMode::GameWindowOnly, app.listening_mode());

        // Volume is clamped on load.
        assert_eq!(1.0, profile.bindings()[0].clip().volume());

        let active = app.active_profile().unwrap();
        assert_eq!(
            Path::new("/etc/keycue/sounds/airhorn.wav"),
            active.bindings()[0].clip().file()
        );
    }

    #[test]
    fn test_profile_listening_mode_override() {
        let yaml = YAML.replace("current_profile: Missing", "current_profile: Second");
        let app = App::from_yaml(&yaml, Path::new("/")).unwrap();
        assert_eq!("Second", app.current_profile().unwrap().name());
        assert_eq!(ListeningMode::Global, app.listening_mode());
    }

    #[test]
    fn test_empty_config() {
        let app = App::from_yaml("{}", Path::new("/")).unwrap();
        assert!(app.current_profile().is_none());
        assert_eq!(&KeyCombination::new(["Ctrl", "1"]), app.global().toggle());
    }

    #[test]
    fn test_toggle_cannot_be_bound() {
        let yaml = YAML.replace("[Ctrl, V]", "[Ctrl, \"2\"]");
        assert!(matches!(
            App::from_yaml(&yaml, Path::new("/")),
            Err(ConfigError::ProhibitedCombination { .. })
        ));
    }
}
