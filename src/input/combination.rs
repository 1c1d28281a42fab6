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
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::keymap::canonical_token;

/// Modifiers come first in the display string, in this order.
const MODIFIER_ORDER: [&str; 4] = ["Ctrl", "Shift", "Alt", "Win"];

/// An unordered set of key tokens. Two combinations are equal when they hold the same tokens,
/// regardless of the order the keys were pressed in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct KeyCombination {
    keys: BTreeSet<String>,
}

impl KeyCombination {
    /// Creates a combination from the given tokens. Tokens are canonicalized where possible and
    /// deduplicated; empty tokens are dropped.
    pub fn new<I, S>(keys: I) -> KeyCombination
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        KeyCombination {
            keys: keys
                .into_iter()
                .filter_map(|key| {
                    let key = key.as_ref().trim();
                    if key.is_empty() {
                        return None;
                    }
                    Some(canonical_token(key).unwrap_or(key).to_string())
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns true if every token of `other` is part of this combination.
    pub fn contains(&self, other: &KeyCombination) -> bool {
        other.keys.is_subset(&self.keys)
    }

    /// The tokens in display order.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.keys.iter().map(String::as_str).collect();
        keys.sort_by_key(|key| {
            let rank = MODIFIER_ORDER
                .iter()
                .position(|modifier| modifier == key)
                .unwrap_or(MODIFIER_ORDER.len());
            (rank, *key)
        });
        keys
    }
}

impl fmt::Display for KeyCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keys().join(" + "))
    }
}

impl From<Vec<String>> for KeyCombination {
    fn from(keys: Vec<String>) -> Self {
        KeyCombination::new(keys)
    }
}

impl From<KeyCombination> for Vec<String> {
    fn from(combination: KeyCombination) -> Self {
        combination.keys().into_iter().map(String::from).collect()
    }
}

impl FromStr for KeyCombination {
    type Err = String;

    /// Parses combinations written like `Ctrl+V` or `Ctrl + Shift + F1`. The plus key itself
    /// can be written as a trailing `++`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed == "+" {
            return Ok(KeyCombination::new(["+"]));
        }
        let (body, plus) = match trimmed.strip_suffix("++") {
            Some(body) => (body, true),
            None => (trimmed, false),
        };

        let mut keys: Vec<&str> = body.split('+').map(str::trim).collect();
        if plus {
            keys.push("+");
        }
        if keys.iter().any(|key| key.is_empty()) {
            return Err(format!("malformed key combination '{}'", s));
        }

        let unknown: Vec<&str> = keys
            .iter()
            .copied()
            .filter(|key| canonical_token(key).is_none())
            .collect();
        if !unknown.is_empty() {
            return Err(format!("unknown keys in '{}': {}", s, unknown.join(", ")));
        }

        Ok(KeyCombination::new(keys))
    }
}
