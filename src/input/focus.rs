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
/// Answers whether one of the target applications currently has input focus.
pub trait FocusProbe: Send + Sync {
    fn is_target_focused(&self) -> bool;
}

/// A focus probe with a fixed answer, for platforms without window tracking.
pub struct StaticFocus {
    focused: bool,
}

impl StaticFocus {
    pub fn new(focused: bool) -> StaticFocus {
        StaticFocus { focused }
    }
}

impl FocusProbe for StaticFocus {
    fn is_target_focused(&self) -> bool {
        self.focused
    }
}
