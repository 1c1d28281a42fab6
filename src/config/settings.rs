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
use serde::{Deserialize, Serialize};

use crate::input::KeyCombination;

/// When input is acted upon.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ListeningMode {
    /// Only while one of the target applications has focus.
    #[default]
    GameWindowOnly,
    /// Regardless of which window has focus.
    Global,
}

/// Settings shared by every profile.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct GlobalSettings {
    /// The monitoring output. Absent or empty means the default output device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    headphone_device: Option<String>,
    /// The virtual microphone output. Absent or empty means the default output device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    virtual_mic_device: Option<String>,
    #[serde(default)]
    listening_mode: ListeningMode,
    /// Process names treated as the target application.
    #[serde(default)]
    target_processes: Vec<String>,
    #[serde(default = "default_true")]
    listener_enabled: bool,
    /// Flips listening on and off.
    #[serde(default = "default_toggle")]
    toggle: KeyCombination,
}

fn default_true() -> bool {
    true
}

fn default_toggle() -> KeyCombination {
    KeyCombination::new(["Ctrl", "1"])
}

impl Default for GlobalSettings {
    fn default() -> Self {
        GlobalSettings {
            headphone_device: None,
            virtual_mic_device: None,
            listening_mode: ListeningMode::default(),
            target_processes: Vec::new(),
            listener_enabled: true,
            toggle: default_toggle(),
        }
    }
}

impl GlobalSettings {
    pub fn headphone_device(&self) -> Option<&str> {
        self.headphone_device.as_deref()
    }

    pub fn virtual_mic_device(&self) -> Option<&str> {
        self.virtual_mic_device.as_deref()
    }

    pub fn listening_mode(&self) -> ListeningMode {
        self.listening_mode
    }

    pub fn target_processes(&self) -> &[String] {
        &self.target_processes
    }

    pub fn listener_enabled(&self) -> bool {
        self.listener_enabled
    }

    pub fn set_listener_enabled(&mut self, enabled: bool) {
        self.listener_enabled = enabled;
    }

    pub fn toggle(&self) -> &KeyCombination {
        &self.toggle
    }
}
