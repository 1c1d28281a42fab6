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
use std::sync::Arc;

use tracing::{debug, info};

use super::combination::KeyCombination;
use super::focus::FocusProbe;
use super::{InputEvent, RawInput};
use crate::config::ListeningMode;

/// What the builder asks the rest of the system to do after an input event.
#[derive(Clone, Debug, PartialEq)]
pub enum Signal {
    /// A new key went down while listening; the held keys form this combination.
    Trigger(KeyCombination),
    /// The toggle combination was pressed and listening is now in the given state.
    ListeningToggled(bool),
}

/// Tracks the keys currently held and turns each new key-down into a candidate trigger.
pub struct CombinationBuilder {
    /// Physical inputs currently held, in press order. Only inputs with a token are kept.
    pressed: Vec<RawInput>,
    toggle: KeyCombination,
    enabled: bool,
    mode: ListeningMode,
    focus: Arc<dyn FocusProbe>,
}

impl CombinationBuilder {
    pub fn new(
        toggle: KeyCombination,
        enabled: bool,
        mode: ListeningMode,
        focus: Arc<dyn FocusProbe>,
    ) -> CombinationBuilder {
        CombinationBuilder {
            pressed: Vec::new(),
            toggle,
            enabled,
            mode,
            focus,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_mode(&mut self, mode: ListeningMode) {
        self.mode = mode;
    }

    /// Feeds one hook event through the builder.
    pub fn handle(&mut self, event: InputEvent) -> Option<Signal> {
        match event {
            InputEvent::Pressed(input) => self.press(input),
            InputEvent::Released(input) => {
                self.pressed.retain(|held| *held != input);
                None
            }
        }
    }

    /// The held keys as a combination. Twin keys such as left and right Ctrl collapse into one
    /// token.
    fn combination(&self) -> KeyCombination {
        KeyCombination::new(self.pressed.iter().filter_map(|held| held.token()))
    }

    fn press(&mut self, input: RawInput) -> Option<Signal> {
        let token = input.token()?;

        // Auto-repeat of a held key.
        if self.pressed.contains(&input) {
            return None;
        }
        let twin_held = self.pressed.iter().any(|held| held.token() == Some(token));
        self.pressed.push(input);
        // The combination is unchanged, so there is nothing new to trigger.
        if twin_held {
            return None;
        }

        let combination = self.combination();

        // The toggle works even while listening is off so that it can be turned back on.
        if combination == self.toggle {
            self.enabled = !self.enabled;
            info!(enabled = self.enabled, "Listening toggled");
            return Some(Signal::ListeningToggled(self.enabled));
        }

        if !self.enabled {
            return None;
        }
        if self.mode == ListeningMode::GameWindowOnly && !self.focus.is_target_focused() {
            debug!(
                combination = combination.to_string(),
                "Ignoring combination, target not focused"
            );
            return None;
        }

        Some(Signal::Trigger(combination))
    }
}
