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
//! Picks the binding a trigger combination should fire.

use crate::config::{Binding, MatchMode};
use crate::input::KeyCombination;

/// Returns true if the binding fires for the given trigger.
pub fn matches(binding: &Binding, trigger: &KeyCombination) -> bool {
    let keys = binding.keys();
    if keys.is_empty() {
        return false;
    }
    match binding.mode() {
        MatchMode::Exact => keys == trigger,
        MatchMode::Contains => trigger.contains(keys),
    }
}

/// Selects at most one binding for the trigger: the match with the most keys, preferring exact
/// matches on ties. Remaining ties go to the binding declared first.
pub fn resolve<'a>(trigger: &KeyCombination, bindings: &'a [Binding]) -> Option<&'a Binding> {
    let mut best: Option<&'a Binding> = None;
    for binding in bindings.iter().filter(|binding| matches(binding, trigger)) {
        let better = match best {
            None => true,
            Some(current) => rank(binding) > rank(current),
        };
        if better {
            best = Some(binding);
        }
    }
    best
}

fn rank(binding: &Binding) -> (usize, bool) {
    (binding.keys().len(), binding.mode() == MatchMode::Exact)
}
