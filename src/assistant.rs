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
use std::thread;
use std::time::SystemTime;

use crossbeam_channel::Receiver;
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tracing::{debug, error, info, span, warn, Level};

use crate::config::{ListeningMode, Profile, SettingsStore};
use crate::input::{CombinationBuilder, InputEvent, KeyCombination, Signal};
use crate::playback::{PlaybackEngine, StartOutcome};
use crate::resolver;

/// The most recent combination that matched a binding.
#[derive(Clone, Debug, PartialEq)]
pub struct LastTrigger {
    pub combination: String,
    pub at: SystemTime,
}

/// Routes input to the playback engine through the current profile's bindings.
pub struct Assistant {
    engine: PlaybackEngine,
    profile: RwLock<Profile>,
    builder: Mutex<CombinationBuilder>,
    store: Arc<dyn SettingsStore>,
    last_trigger: watch::Sender<Option<LastTrigger>>,
}

impl Assistant {
    pub fn new(
        engine: PlaybackEngine,
        profile: Profile,
        builder: CombinationBuilder,
        store: Arc<dyn SettingsStore>,
    ) -> Assistant {
        let (last_trigger, _) = watch::channel(None);
        Assistant {
            engine,
            profile: RwLock::new(profile),
            builder: Mutex::new(builder),
            store,
            last_trigger,
        }
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    /// Switches to another profile. Sessions already playing are left alone.
    pub fn set_profile(&self, profile: Profile, mode: ListeningMode) {
        info!(profile = profile.name(), "Switching profile");
        *self.profile.write() = profile;
        self.builder.lock().set_mode(mode);
    }

    /// Receives the last combination that matched a binding.
    pub fn subscribe_last_trigger(&self) -> watch::Receiver<Option<LastTrigger>> {
        self.last_trigger.subscribe()
    }

    /// Feeds one input event through the combination builder and acts on the result.
    pub fn handle_input(&self, event: InputEvent) {
        let signal = self.builder.lock().handle(event);
        match signal {
            Some(Signal::Trigger(combination)) => {
                self.trigger(&combination);
            }
            Some(Signal::ListeningToggled(enabled)) => {
                if let Err(e) = self.store.save_listener_enabled(enabled) {
                    error!(err = e.to_string(), "Unable to save listener state");
                }
            }
            None => {}
        }
    }

    /// Plays whatever binding best matches the combination. Errors are logged and treated as
    /// having no effect.
    pub fn trigger(&self, combination: &KeyCombination) -> Option<StartOutcome> {
        let (name, clip) = {
            let profile = self.profile.read();
            let binding = match resolver::resolve(combination, profile.bindings()) {
                Some(binding) => binding,
                None => {
                    debug!(
                        combination = combination.to_string(),
                        "No binding for combination"
                    );
                    return None;
                }
            };
            (binding.name(), binding.clip().clone())
        };

        self.last_trigger.send_replace(Some(LastTrigger {
            combination: combination.to_string(),
            at: SystemTime::now(),
        }));

        match self.engine.start(combination, &clip) {
            Ok(outcome) => {
                debug!(binding = name, ?outcome, "Binding triggered");
                Some(outcome)
            }
            Err(e) => {
                warn!(binding = name, err = e.to_string(), "Clip did not start");
                None
            }
        }
    }

    /// Handles input events from the hook on a dedicated thread until the sender goes away.
    pub fn spawn_dispatcher(
        self: Arc<Self>,
        events: Receiver<InputEvent>,
    ) -> std::io::Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name("keycue-dispatch".to_string())
            .spawn(move || {
                let span = span!(Level::INFO, "dispatcher");
                let _enter = span.enter();

                info!("Waiting for input");
                for event in events.iter() {
                    self.handle_input(event);
                }
                info!("Input closed");
            })
    }
}
