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
//! Normalizes raw hook events into the canonical key tokens used by bindings.

use rdev::{Button, Key};

/// Every token a binding can contain. Used to canonicalize user-typed combinations.
const TOKENS: &[&str] = &[
    "Ctrl", "Shift", "Alt", "Win", "Space", "Enter", "Backspace", "Tab", "Escape", "Delete",
    "Insert", "Home", "End", "PageUp", "PageDown", "Up", "Down", "Left", "Right", "F1", "F2",
    "F3", "F4", "F5", "F6", "F7", "F8", "F9", "F10", "F11", "F12", "0", "1", "2", "3", "4", "5",
    "6", "7", "8", "9", "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M", "N",
    "O", "P", "Q", "R", "S", "T", "U", "V", "W", "X", "Y", "Z", "-", "+", "[", "]", ";", "'",
    ",", ".", "/", "`", "\\", "Num0", "Num1", "Num2", "Num3", "Num4", "Num5", "Num6", "Num7",
    "Num8", "Num9", "NumAdd", "NumSub", "NumMul", "NumDiv", "NumDot", "LeftMouse", "RightMouse",
    "MiddleMouse", "Mouse4", "Mouse5",
];

/// Alternative spellings accepted when parsing combinations typed by a user.
const ALIASES: &[(&str, &str)] = &[
    ("control", "Ctrl"),
    ("cmd", "Win"),
    ("meta", "Win"),
    ("super", "Win"),
    ("esc", "Escape"),
    ("return", "Enter"),
    ("del", "Delete"),
    ("ins", "Insert"),
    ("pgup", "PageUp"),
    ("pgdn", "PageDown"),
    ("lmb", "LeftMouse"),
    ("rmb", "RightMouse"),
    ("mmb", "MiddleMouse"),
    ("mouse1", "LeftMouse"),
    ("mouse2", "RightMouse"),
    ("mouse3", "MiddleMouse"),
    ("xbutton1", "Mouse4"),
    ("xbutton2", "Mouse5"),
];

/// The codes rdev reports for the back and forward side buttons. Windows passes the XBUTTON
/// number through; X11 numbers them after the wheel buttons.
#[cfg(target_os = "windows")]
pub const SIDE_BUTTONS: (u8, u8) = (1, 2);
#[cfg(not(target_os = "windows"))]
pub const SIDE_BUTTONS: (u8, u8) = (8, 9);

/// Maps a keyboard key to its token. Keys that bindings can't use map to None.
pub fn key_token(key: Key) -> Option<&'static str> {
    let token = match key {
        Key::ControlLeft | Key::ControlRight => "Ctrl",
        Key::ShiftLeft | Key::ShiftRight => "Shift",
        Key::Alt | Key::AltGr => "Alt",
        Key::MetaLeft | Key::MetaRight => "Win",

        Key::Space => "Space",
        Key::Return | Key::KpReturn => "Enter",
        Key::Backspace => "Backspace",
        Key::Tab => "Tab",
        Key::Escape => "Escape",
        Key::Delete => "Delete",
        Key::Insert => "Insert",
        Key::Home => "Home",
        Key::End => "End",
        Key::PageUp => "PageUp",
        Key::PageDown => "PageDown",

        Key::UpArrow => "Up",
        Key::DownArrow => "Down",
        Key::LeftArrow => "Left",
        Key::RightArrow => "Right",

        Key::F1 => "F1",
        Key::F2 => "F2",
        Key::F3 => "F3",
        Key::F4 => "F4",
        Key::F5 => "F5",
        Key::F6 => "F6",
        Key::F7 => "F7",
        Key::F8 => "F8",
        Key::F9 => "F9",
        Key::F10 => "F10",
        Key::F11 => "F11",
        Key::F12 => "F12",

        Key::Num0 => "0",
        Key::Num1 => "1",
        Key::Num2 => "2",
        Key::Num3 => "3",
        Key::Num4 => "4",
        Key::Num5 => "5",
        Key::Num6 => "6",
        Key::Num7 => "7",
        Key::Num8 => "8",
        Key::Num9 => "9",

        Key::KeyA => "A",
        Key::KeyB => "B",
        Key::KeyC => "C",
        Key::KeyD => "D",
        Key::KeyE => "E",
        Key::KeyF => "F",
        Key::KeyG => "G",
        Key::KeyH => "H",
        Key::KeyI => "I",
        Key::KeyJ => "J",
        Key::KeyK => "K",
        Key::KeyL => "L",
        Key::KeyM => "M",
        Key::KeyN => "N",
        Key::KeyO => "O",
        Key::KeyP => "P",
        Key::KeyQ => "Q",
        Key::KeyR => "R",
        Key::KeyS => "S",
        Key::KeyT => "T",
        Key::KeyU => "U",
        Key::KeyV => "V",
        Key::KeyW => "W",
        Key::KeyX => "X",
        Key::KeyY => "Y",
        Key::KeyZ => "Z",

        Key::Minus => "-",
        Key::Equal => "+",
        Key::LeftBracket => "[",
        Key::RightBracket => "]",
        Key::SemiColon => ";",
        Key::Quote => "'",
        Key::Comma => ",",
        Key::Dot => ".",
        Key::Slash => "/",
        Key::BackQuote => "`",
        Key::BackSlash | Key::IntlBackslash => "\\",

        Key::Kp0 => "Num0",
        Key::Kp1 => "Num1",
        Key::Kp2 => "Num2",
        Key::Kp3 => "Num3",
        Key::Kp4 => "Num4",
        Key::Kp5 => "Num5",
        Key::Kp6 => "Num6",
        Key::Kp7 => "Num7",
        Key::Kp8 => "Num8",
        Key::Kp9 => "Num9",
        Key::KpPlus => "NumAdd",
        Key::KpMinus => "NumSub",
        Key::KpMultiply => "NumMul",
        Key::KpDivide => "NumDiv",
        Key::KpDelete => "NumDot",

        _ => return None,
    };
    Some(token)
}

/// Maps a mouse button to its token.
pub fn button_token(button: Button) -> Option<&'static str> {
    match button {
        Button::Left => Some("LeftMouse"),
        Button::Right => Some("RightMouse"),
        Button::Middle => Some("MiddleMouse"),
        Button::Unknown(code) if code == SIDE_BUTTONS.0 => Some("Mouse4"),
        Button::Unknown(code) if code == SIDE_BUTTONS.1 => Some("Mouse5"),
        Button::Unknown(_) => None,
    }
}

/// Returns the canonical spelling of a token typed by a user, matching case-insensitively and
/// accepting a few common aliases.
pub fn canonical_token(token: &str) -> Option<&'static str> {
    let token = token.trim();
    TOKENS
        .iter()
        .find(|canonical| canonical.eq_ignore_ascii_case(token))
        .copied()
        .or_else(|| {
            ALIASES
                .iter()
                .find(|(alias, _)| alias.eq_ignore_ascii_case(token))
                .map(|(_, canonical)| *canonical)
        })
}
