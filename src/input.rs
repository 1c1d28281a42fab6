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
mod builder;
mod combination;
mod focus;
pub mod hook;
pub mod keymap;

pub use builder::{CombinationBuilder, Signal};
pub use combination::KeyCombination;
pub use focus::{FocusProbe, StaticFocus};

use rdev::{Button, Key};

/// A physical key or mouse button as the hook reported it. Left and right modifiers stay
/// distinct until a combination is built.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RawInput {
    Key(Key),
    Button(Button),
}

impl RawInput {
    /// The canonical token for this input, or None if bindings can't use it.
    pub fn token(self) -> Option<&'static str> {
        match self {
            RawInput::Key(key) => keymap::key_token(key),
            RawInput::Button(button) => keymap::button_token(button),
        }
    }
}

/// A key or button transition.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    Pressed(RawInput),
    Released(RawInput),
}
