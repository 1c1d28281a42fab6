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

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::error::PlaybackError;
use crate::audio::{chain, Device, Gain, OutputHandle};
use crate::config::{ClipSettings, DurationMode};
use crate::playsync::CancelHandle;
use crate::util::filename_display;

/// Where a session is in its life.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Registered, outputs being opened.
    Starting,
    Playing,
    /// Ramping down before teardown.
    FadingOut,
    /// Torn down. Terminal.
    Disposed,
}

/// A render stream on one device.
struct Output {
    device: String,
    handle: Box<dyn OutputHandle>,
}

/// One clip playing to every configured output.
pub struct Session {
    key: String,
    clip: ClipSettings,
    duration_mode: DurationMode,
    state: Mutex<SessionState>,
    /// One gain per device, moved together by the envelope.
    gains: Vec<Arc<Gain>>,
    outputs: Mutex<Vec<Output>>,
    /// Cancelled exactly once, at teardown.
    disposed: CancelHandle,
    /// Cancelled when a fade-out takes over from the fade-in.
    fade_in_stop: CancelHandle,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Session {
    pub fn new(
        key: String,
        clip: ClipSettings,
        duration_mode: DurationMode,
        output_count: usize,
    ) -> Session {
        Session {
            key,
            clip,
            duration_mode,
            state: Mutex::new(SessionState::Starting),
            gains: (0..output_count).map(|_| Arc::new(Gain::new(0.0))).collect(),
            outputs: Mutex::new(Vec::new()),
            disposed: CancelHandle::new(),
            fade_in_stop: CancelHandle::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// The display string of the combination that started this session.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn clip(&self) -> &ClipSettings {
        &self.clip
    }

    pub fn duration_mode(&self) -> DurationMode {
        self.duration_mode
    }

    /// The clip's file name.
    pub fn display_name(&self) -> String {
        filename_display(self.clip.file()).to_string()
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.is_cancelled()
    }

    pub(super) fn disposed(&self) -> &CancelHandle {
        &self.disposed
    }

    pub(super) fn fade_in_stop(&self) -> &CancelHandle {
        &self.fade_in_stop
    }

    pub(super) fn gains(&self) -> &[Arc<Gain>] {
        &self.gains
    }

    /// The current envelope volume.
    pub fn volume(&self) -> f32 {
        self.gains.first().map(|gain| gain.get()).unwrap_or(0.0)
    }

    /// Opens a stream on every device, each with its own decoder. A device that fails is logged
    /// and skipped; the session only fails if no device could be opened.
    pub(super) fn open(&self, devices: &[Arc<dyn Device>]) -> Result<usize, PlaybackError> {
        let looping = matches!(self.duration_mode, DurationMode::FixedDuration(_));
        let mut opened = 0;
        let mut decode_error = None;

        for (device, gain) in devices.iter().zip(self.gains.iter()) {
            let source =
                match chain::build_chain(self.clip.file(), &device.mix_format(), looping, gain.clone()) {
                    Ok(source) => source,
                    Err(e) => {
                        warn!(
                            device = device.name(),
                            file = self.display_name(),
                            err = e.to_string(),
                            "Unable to prepare clip"
                        );
                        decode_error = Some(e);
                        continue;
                    }
                };

            match device.open(source) {
                Ok(handle) => {
                    self.attach(device.name(), handle);
                    opened += 1;
                }
                Err(e) => warn!(
                    device = device.name(),
                    err = e.to_string(),
                    "Unable to open output"
                ),
            }
        }

        if opened > 0 {
            return Ok(opened);
        }
        match decode_error {
            Some(source) => Err(PlaybackError::Decode {
                path: self.clip.file().to_path_buf(),
                source,
            }),
            None => Err(PlaybackError::NoOutput(self.key.clone())),
        }
    }

    /// Keeps a newly opened stream, or closes it straight away if the session was torn down
    /// while it was being opened.
    fn attach(&self, device: &str, handle: Box<dyn OutputHandle>) {
        let rejected = {
            let mut outputs = self.outputs.lock();
            if self.is_disposed() {
                Some(handle)
            } else {
                outputs.push(Output {
                    device: device.to_string(),
                    handle,
                });
                None
            }
        };
        if let Some(handle) = rejected {
            close_output(&self.key, device, handle);
        }
    }

    /// True once every opened stream has played out its chain.
    pub fn outputs_finished(&self) -> bool {
        let outputs = self.outputs.lock();
        !outputs.is_empty() && outputs.iter().all(|output| output.handle.is_finished())
    }

    /// Starting -> Playing. False if the session has moved on in the meantime.
    pub(super) fn mark_playing(&self) -> bool {
        let mut state = self.state.lock();
        if *state != SessionState::Starting {
            return false;
        }
        *state = SessionState::Playing;
        true
    }

    /// Starting/Playing -> FadingOut. False if already fading or torn down.
    pub(super) fn begin_fade_out(&self) -> bool {
        {
            let mut state = self.state.lock();
            match *state {
                SessionState::Starting | SessionState::Playing => *state = SessionState::FadingOut,
                SessionState::FadingOut | SessionState::Disposed => return false,
            }
        }
        self.fade_in_stop.cancel();
        true
    }

    pub(super) fn add_task(&self, task: JoinHandle<()>) {
        self.tasks.lock().push(task);
    }

    /// Releases both outputs and cancels every task. Only the first call does anything; it
    /// returns true.
    pub fn teardown(&self) -> bool {
        // Taking the outputs under the lock after the flag flips pairs with `attach`.
        if !self.disposed.cancel() {
            return false;
        }
        *self.state.lock() = SessionState::Disposed;
        self.fade_in_stop.cancel();

        let outputs: Vec<Output> = self.outputs.lock().drain(..).collect();
        for output in outputs {
            close_output(&self.key, &output.device, output.handle);
        }
        debug!(session = self.key, "Session torn down");
        true
    }

    /// Waits for every task spawned on behalf of the session to exit.
    pub async fn join(&self) {
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }
    }
}

fn close_output(session: &str, device: &str, handle: Box<dyn OutputHandle>) {
    if let Err(e) = handle.close() {
        warn!(
            session,
            device,
            err = e.to_string(),
            "Error releasing output"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::audio::mock;
    use crate::testutil::write_tone;

    #[test]
    fn test_teardown_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_tone(&path, std::time::Duration::from_secs(5), 0.5, 48000).unwrap();

        let device = Arc::new(mock::Device::get("mock-headphones"));
        let devices: Vec<Arc<dyn Device>> = vec![device.clone()];
        let session = Session::new(
            "F1".to_string(),
            ClipSettings::new(path),
            DurationMode::PlayUntilEnd,
            1,
        );

        assert_eq!(1, session.open(&devices).unwrap());
        assert_eq!(1, device.active());

        assert!(session.teardown());
        assert!(!session.teardown());
        assert_eq!(SessionState::Disposed, session.state());
        assert_eq!(0, device.active());
        assert!(!session.begin_fade_out());
        assert!(!session.mark_playing());
    }

    #[test]
    fn test_attach_after_teardown_closes_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_tone(&path, std::time::Duration::from_secs(5), 0.5, 48000).unwrap();

        let device = Arc::new(mock::Device::get("mock-headphones"));
        let devices: Vec<Arc<dyn Device>> = vec![device.clone()];
        let session = Session::new(
            "F1".to_string(),
            ClipSettings::new(path),
            DurationMode::PlayUntilEnd,
            1,
        );

        session.teardown();
        session.open(&devices).unwrap();
        assert_eq!(1, device.opened());
        assert_eq!(0, device.active());
    }

    #[test]
    fn test_state_transitions() {
        let session = Session::new(
            "F1".to_string(),
            ClipSettings::new(PathBuf::from("a.wav")),
            DurationMode::PlayUntilEnd,
            2,
        );
        assert_eq!(SessionState::Starting, session.state());
        assert!(session.mark_playing());
        assert!(!session.mark_playing());
        assert!(session.begin_fade_out());
        assert!(session.fade_in_stop().is_cancelled());
        assert!(!session.begin_fade_out());
        assert_eq!(SessionState::FadingOut, session.state());
        assert_eq!("a.wav", session.display_name());
        assert!(!session.outputs_finished());
    }
}
