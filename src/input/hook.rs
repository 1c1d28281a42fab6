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
use std::thread;

use crossbeam_channel::Sender;
use rdev::{Event, EventType};
use tracing::{error, info};

use super::{InputEvent, RawInput};

/// Translates a raw hook event. Movement, wheel and keys without a token produce nothing.
pub fn translate(event_type: &EventType) -> Option<InputEvent> {
    let event = match *event_type {
        EventType::KeyPress(key) => InputEvent::Pressed(RawInput::Key(key)),
        EventType::KeyRelease(key) => InputEvent::Released(RawInput::Key(key)),
        EventType::ButtonPress(button) => InputEvent::Pressed(RawInput::Button(button)),
        EventType::ButtonRelease(button) => InputEvent::Released(RawInput::Button(button)),
        _ => return None,
    };
    let input = match event {
        InputEvent::Pressed(input) | InputEvent::Released(input) => input,
    };
    input.token().map(|_| event)
}

/// Installs the global keyboard and mouse hook on its own thread. Every supported event is
/// forwarded to `events`. The hook lives for the rest of the process.
pub fn spawn_hook(events: Sender<InputEvent>) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("keycue-hook".to_string())
        .spawn(move || {
            info!("Installing input hook");
            let callback = move |event: Event| {
                if let Some(input) = translate(&event.event_type) {
                    // The dispatcher only goes away at shutdown.
                    let _ = events.send(input);
                }
            };
            if let Err(e) = rdev::listen(callback) {
                error!(err = format!("{:?}", e), "Input hook failed");
            }
        })
}
