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
use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::clip::ClipSettings;
use super::error::ConfigError;
use super::settings::ListeningMode;
use crate::input::KeyCombination;

/// How a binding's combination is compared against a trigger.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// The trigger must hold exactly the binding's keys.
    #[default]
    Exact,
    /// The trigger must hold at least the binding's keys.
    Contains,
}

/// A key combination bound to a clip.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Binding {
    /// Optional display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    keys: KeyCombination,
    #[serde(default)]
    mode: MatchMode,
    clip: ClipSettings,
}

impl Binding {
    pub fn new(keys: KeyCombination, mode: MatchMode, clip: ClipSettings) -> Binding {
        Binding {
            name: None,
            keys,
            mode,
            clip,
        }
    }

    /// The display name, or the combination when no name was given.
    pub fn name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.keys.to_string())
    }

    pub fn keys(&self) -> &KeyCombination {
        &self.keys
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn clip(&self) -> &ClipSettings {
        &self.clip
    }
}

/// A named set of bindings.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Profile {
    name: String,
    /// Overrides the global listening mode while this profile is current.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    listening_mode: Option<ListeningMode>,
    #[serde(default)]
    bindings: Vec<Binding>,
}

impl Profile {
    pub fn new(name: &str, bindings: Vec<Binding>) -> Profile {
        Profile {
            name: name.to_string(),
            listening_mode: None,
            bindings,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn listening_mode(&self) -> Option<ListeningMode> {
        self.listening_mode
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub(super) fn normalize(&mut self) {
        for binding in self.bindings.iter_mut() {
            binding.clip.normalize();
        }
    }

    /// Checks the bindings for duplicates, reserved combinations and unparseable durations.
    pub fn validate(&self, toggle: &KeyCombination) -> Result<(), ConfigError> {
        let escape = KeyCombination::new(["Escape"]);
        let mut seen = HashSet::new();

        for binding in self.bindings.iter() {
            let keys = binding.keys();
            if keys.is_empty() {
                warn!(
                    profile = self.name,
                    binding = binding.name(),
                    "Binding has no keys and will never match"
                );
                continue;
            }
            if keys == toggle || *keys == escape {
                return Err(ConfigError::ProhibitedCombination {
                    profile: self.name.clone(),
                    combination: keys.to_string(),
                });
            }
            if !seen.insert(keys) {
                return Err(ConfigError::DuplicateBinding {
                    profile: self.name.clone(),
                    combination: keys.to_string(),
                });
            }
            binding.clip.duration_mode()?;
        }

        Ok(())
    }

    /// Returns a copy with every clip resolved against the given directory.
    pub fn resolved(&self, base: &Path) -> Profile {
        Profile {
            bindings: self
                .bindings
                .iter()
                .map(|binding| Binding {
                    clip: binding.clip.resolved(base),
                    ..binding.clone()
                })
                .collect(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use config::{Config, File, FileFormat};

    use super::*;

    fn parse(yaml: &str) -> Profile {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    fn toggle() -> KeyCombination {
        KeyCombination::new(["Ctrl", "1"])
    }

    #[test]
    fn test_profile_deserialize() {
        let profile = parse(
            r#"
            name: Default
            listening_mode: global
            bindings:
              - name: Airhorn
                keys: [Ctrl, V]
                clip:
                  file: airhorn.wav
              - keys: [V]
                mode: contains
                clip:
                  file: laugh.wav
                  volume: 0.5
        "#,
        );

        assert_eq!("Default", profile.name());
        assert_eq!(Some(ListeningMode::Global), profile.listening_mode());
        assert_eq!(2, profile.bindings().len());

        let airhorn = &profile.bindings()[0];
        assert_eq!("Airhorn", airhorn.name());
        assert_eq!(&KeyCombination::new(["Ctrl", "V"]), airhorn.keys());
        assert_eq!(MatchMode::Exact, airhorn.mode());

        let laugh = &profile.bindings()[1];
        assert_eq!("V", laugh.name());
        assert_eq!(MatchMode::Contains, laugh.mode());
        assert_eq!(0.5, laugh.clip().volume());

        assert!(profile.validate(&toggle()).is_ok());
    }

    fn binding(keys: &[&str]) -> Binding {
        Binding::new(
            KeyCombination::new(keys),
            MatchMode::Exact,
            ClipSettings::new(PathBuf::from("a.wav")),
        )
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let profile = Profile::new("p", vec![binding(&["Ctrl", "V"]), binding(&["V", "ctrl"])]);
        assert!(matches!(
            profile.validate(&toggle()),
            Err(ConfigError::DuplicateBinding { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_reserved() {
        let profile = Profile::new("p", vec![binding(&["1", "Ctrl"])]);
        assert!(matches!(
            profile.validate(&toggle()),
            Err(ConfigError::ProhibitedCombination { .. })
        ));

        let profile = Profile::new("p", vec![binding(&["Escape"])]);
        assert!(profile.validate(&toggle()).is_err());

        // Escape is only reserved on its own.
        let profile = Profile::new("p", vec![binding(&["Shift", "Escape"])]);
        assert!(profile.validate(&toggle()).is_ok());
    }

    #[test]
    fn test_resolved_paths() {
        let profile = Profile::new("p", vec![binding(&["F1"])]).resolved(Path::new("/cfg"));
        assert_eq!(
            Path::new("/cfg/a.wav"),
            profile.bindings()[0].clip().file()
        );
    }
}
