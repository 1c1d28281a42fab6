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
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, error, info, span, warn, Level};

use super::envelope::{self, FADE_IN_STEPS, FADE_OUT_STEPS};
use super::error::PlaybackError;
use super::session::Session;
use crate::audio::Device;
use crate::config::{ClipSettings, DurationMode, RepeatBehavior};
use crate::input::KeyCombination;

/// What a call to `start` did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new session is playing.
    Started,
    /// The binding was already playing with stop-on-repeat, so it was stopped instead.
    Stopped,
}

/// Owns every playback session. At most one session exists per combination key.
#[derive(Clone)]
pub struct PlaybackEngine {
    inner: Arc<Inner>,
}

struct Inner {
    /// The monitoring output first, then the virtual microphone.
    devices: Vec<Arc<dyn Device>>,
    sessions: Mutex<HashMap<String, Arc<Session>>>,
    runtime: Handle,
    playing: watch::Sender<Vec<String>>,
}

impl PlaybackEngine {
    /// Creates an engine rendering every session to all of the given devices. Envelope and
    /// watcher tasks are spawned on the given runtime.
    pub fn new(devices: Vec<Arc<dyn Device>>, runtime: Handle) -> PlaybackEngine {
        let (playing, _) = watch::channel(Vec::new());
        PlaybackEngine {
            inner: Arc::new(Inner {
                devices,
                sessions: Mutex::new(HashMap::new()),
                runtime,
                playing,
            }),
        }
    }

    /// Plays a clip for the given triggering combination, applying the repeat behavior of the
    /// clip and stopping every other interruptible session.
    pub fn start(
        &self,
        combination: &KeyCombination,
        clip: &ClipSettings,
    ) -> Result<StartOutcome, PlaybackError> {
        let key = combination.to_string();
        let span = span!(Level::INFO, "start", key = key.as_str());
        let _enter = span.enter();

        if !clip.file().is_file() {
            return Err(PlaybackError::MissingClip(clip.file().to_path_buf()));
        }
        let duration_mode = clip.duration_mode()?;
        let session = Arc::new(Session::new(
            key.clone(),
            clip.clone(),
            duration_mode,
            self.inner.devices.len(),
        ));

        let stopped = {
            let mut sessions = self.inner.sessions.lock();
            let mut stopped = Vec::new();

            if let Some(existing) = sessions.remove(&key) {
                if clip.repeat() == RepeatBehavior::StopOnRepeat {
                    drop(sessions);
                    existing.teardown();
                    self.inner.publish();
                    info!(file = existing.display_name(), "Stopped on repeat");
                    return Ok(StartOutcome::Stopped);
                }
                stopped.push(existing);
            }

            let interrupted: Vec<String> = sessions
                .iter()
                .filter(|(_, session)| session.clip().interruptible())
                .map(|(key, _)| key.clone())
                .collect();
            for key in interrupted {
                if let Some(session) = sessions.remove(&key) {
                    stopped.push(session);
                }
            }

            sessions.insert(key.clone(), session.clone());
            stopped
        };

        for previous in stopped {
            debug!(stopped = previous.key(), "Stopping previous session");
            previous.teardown();
        }
        self.inner.publish();

        let opened = match session.open(&self.inner.devices) {
            Ok(opened) => opened,
            Err(e) => {
                self.inner.finish(&session);
                return Err(e);
            }
        };

        // Superseded or stopped while the outputs were opening.
        if !session.mark_playing() {
            return Ok(StartOutcome::Started);
        }
        Inner::spawn_tasks(&self.inner, &session);

        info!(
            file = session.display_name(),
            outputs = opened,
            volume = clip.volume(),
            "Playing"
        );
        Ok(StartOutcome::Started)
    }

    /// Stops the session for the given key. An immediate stop tears it down now; otherwise it
    /// fades out first. Returns false if no session was registered for the key.
    pub fn stop(&self, key: &str, immediate: bool) -> bool {
        let session = self.inner.sessions.lock().get(key).cloned();
        match session {
            Some(session) => {
                if immediate {
                    self.inner.finish(&session);
                } else {
                    Inner::fade_out(&self.inner, &session);
                }
                true
            }
            None => false,
        }
    }

    /// Stops every registered session.
    pub fn stop_all(&self, immediate: bool) {
        let keys: Vec<String> = self.inner.sessions.lock().keys().cloned().collect();
        for key in keys {
            self.stop(&key, immediate);
        }
    }

    /// Tears down every session and waits for their tasks to exit.
    pub async fn shutdown(&self) {
        let sessions: Vec<Arc<Session>> = self
            .inner
            .sessions
            .lock()
            .drain()
            .map(|(_, session)| session)
            .collect();
        let torn_down = sessions.clone();
        let teardown = tokio::task::spawn_blocking(move || {
            for session in torn_down {
                session.teardown();
            }
        });
        if let Err(e) = teardown.await {
            error!(err = e.to_string(), "Error tearing down sessions");
        }
        self.inner.publish();
        for session in sessions {
            session.join().await;
        }
    }

    /// The clip names of every registered session, ordered by key.
    pub fn playing(&self) -> Vec<String> {
        self.inner.playing.borrow().clone()
    }

    /// Receives the list of playing clip names whenever it changes.
    pub fn subscribe_playing(&self) -> watch::Receiver<Vec<String>> {
        self.inner.playing.subscribe()
    }

    pub fn is_playing(&self, key: &str) -> bool {
        self.inner.sessions.lock().contains_key(key)
    }

    pub fn session_count(&self) -> usize {
        self.inner.sessions.lock().len()
    }

    pub fn session(&self, key: &str) -> Option<Arc<Session>> {
        self.inner.sessions.lock().get(key).cloned()
    }
}

impl Inner {
    /// Spawns the fade-in and whichever lifetime task the duration mode calls for.
    fn spawn_tasks(inner: &Arc<Inner>, session: &Arc<Session>) {
        let fade_in = {
            let session = session.clone();
            inner.runtime.spawn(async move {
                let clip = session.clip();
                tokio::select! {
                    _ = session.disposed().cancelled() => {}
                    _ = session.fade_in_stop().cancelled() => {}
                    _ = envelope::ramp(session.gains(), 0.0, clip.volume(), clip.fade_in(), FADE_IN_STEPS) => {}
                }
            })
        };
        session.add_task(fade_in);

        let weak = Arc::downgrade(inner);
        let lifetime = match session.duration_mode() {
            DurationMode::FixedDuration(duration) => {
                let session = session.clone();
                inner.runtime.spawn(async move {
                    tokio::select! {
                        _ = session.disposed().cancelled() => return,
                        _ = tokio::time::sleep(duration) => {}
                    }
                    debug!(session = session.key(), "Fixed duration elapsed");
                    if let Some(inner) = Weak::upgrade(&weak) {
                        Inner::fade_out(&inner, &session);
                    }
                })
            }
            DurationMode::PlayUntilEnd => {
                let session = session.clone();
                inner.runtime.spawn(async move {
                    tokio::select! {
                        _ = session.disposed().cancelled() => return,
                        _ = envelope::wait_until(|| session.outputs_finished()) => {}
                    }
                    debug!(session = session.key(), "Clip played out");
                    // Already silent, so no fade.
                    if let Some(inner) = Weak::upgrade(&weak) {
                        Inner::finish_blocking(inner, session).await;
                    }
                })
            }
        };
        session.add_task(lifetime);
    }

    /// Fades the session out and then tears it down. A session already fading is left alone.
    fn fade_out(inner: &Arc<Inner>, session: &Arc<Session>) {
        if !session.begin_fade_out() {
            return;
        }

        let weak = Arc::downgrade(inner);
        let session_task = session.clone();
        let task = inner.runtime.spawn(async move {
            let session = session_task;
            let from = session.volume();
            tokio::select! {
                _ = session.disposed().cancelled() => return,
                _ = envelope::ramp(session.gains(), from, 0.0, session.clip().fade_out(), FADE_OUT_STEPS) => {}
            }
            if let Some(inner) = Weak::upgrade(&weak) {
                Inner::finish_blocking(inner, session).await;
            }
        });
        session.add_task(task);
    }

    /// Runs `finish` on the blocking pool. Closing an output joins its render thread.
    async fn finish_blocking(inner: Arc<Inner>, session: Arc<Session>) {
        let finish = tokio::task::spawn_blocking(move || inner.finish(&session));
        if let Err(e) = finish.await {
            error!(err = e.to_string(), "Error finishing session");
        }
    }

    /// Tears the session down and unregisters it, but only if it is still the registered
    /// session for its key.
    fn finish(&self, session: &Arc<Session>) {
        let removed = {
            let mut sessions = self.sessions.lock();
            match sessions.get(session.key()) {
                Some(registered) if Arc::ptr_eq(registered, session) => {
                    sessions.remove(session.key());
                    true
                }
                _ => false,
            }
        };

        if session.teardown() {
            debug!(session = session.key(), "Session finished");
        } else if !removed {
            warn!(session = session.key(), "Ignoring completion of a stale session");
        }
        if removed {
            self.publish();
        }
    }

    /// Publishes the playing list if it changed.
    fn publish(&self) {
        let names: Vec<String> = {
            let sessions = self.sessions.lock();
            let mut entries: Vec<(&String, &Arc<Session>)> = sessions.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            entries
                .into_iter()
                .map(|(_, session)| session.display_name())
                .collect()
        };
        self.playing.send_if_modified(|current| {
            if *current == names {
                return false;
            }
            *current = names;
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::time::{Duration, Instant};

    use super::*;
    use crate::audio::mock;
    use crate::playback::envelope::COMPLETION_POLL_INTERVAL;
    use crate::playback::SessionState;
    use crate::testutil::{eventually, eventually_async, write_tone};

    struct Fixture {
        temp: tempfile::TempDir,
        headphones: Arc<mock::Device>,
        mic: Arc<mock::Device>,
        engine: PlaybackEngine,
    }

    impl Fixture {
        fn new() -> Fixture {
            Fixture::with_devices("mock-headphones", "mock-mic")
        }

        fn with_devices(headphones: &str, mic: &str) -> Fixture {
            let headphones = Arc::new(mock::Device::get(headphones));
            let mic = Arc::new(mock::Device::get(mic));
            let devices: Vec<Arc<dyn Device>> = vec![headphones.clone(), mic.clone()];
            Fixture {
                temp: tempfile::tempdir().unwrap(),
                headphones,
                mic,
                engine: PlaybackEngine::new(devices, Handle::current()),
            }
        }

        fn dir(&self) -> &Path {
            self.temp.path()
        }

        fn tone(&self, name: &str, length: Duration) -> PathBuf {
            let path = self.dir().join(name);
            write_tone(&path, length, 0.5, 48000).unwrap();
            path
        }

        fn active(&self) -> usize {
            self.headphones.active() + self.mic.active()
        }
    }

    fn combo(s: &str) -> KeyCombination {
        s.parse().unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_plays_to_both_outputs_until_end() {
        let fixture = Fixture::new();
        let clip = ClipSettings::new(fixture.tone("short.wav", Duration::from_millis(300)))
            .with_fades(Duration::from_millis(20), Duration::ZERO);

        let outcome = fixture.engine.start(&combo("F1"), &clip).unwrap();
        assert_eq!(StartOutcome::Started, outcome);
        assert!(fixture.engine.is_playing("F1"));
        assert_eq!(vec!["short.wav".to_string()], fixture.engine.playing());
        assert_eq!(1, fixture.headphones.opened());
        assert_eq!(1, fixture.mic.opened());

        eventually_async(
            || async { !fixture.engine.is_playing("F1") },
            "Session never completed",
        )
        .await;
        assert_eq!(0, fixture.active());
        assert!(fixture.engine.playing().is_empty());
        assert!(fixture.headphones.frames() > 0);
        assert!(fixture.mic.frames() > 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_missing_clip() {
        let fixture = Fixture::new();
        let clip = ClipSettings::new(fixture.dir().join("nope.wav"));

        let result = fixture.engine.start(&combo("F1"), &clip);
        assert!(matches!(result, Err(PlaybackError::MissingClip(_))));
        assert_eq!(0, fixture.engine.session_count());
        assert_eq!(0, fixture.headphones.opened());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_restart_on_repeat() {
        let fixture = Fixture::new();
        let clip = ClipSettings::new(fixture.tone("long.wav", Duration::from_secs(5)));

        fixture.engine.start(&combo("F1"), &clip).unwrap();
        let first = fixture.engine.session("F1").unwrap();

        let outcome = fixture.engine.start(&combo("F1"), &clip).unwrap();
        assert_eq!(StartOutcome::Started, outcome);
        let second = fixture.engine.session("F1").unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert!(first.is_disposed());
        assert_eq!(1, fixture.engine.session_count());
        assert_eq!(2, fixture.headphones.opened());
        assert_eq!(2, fixture.active());

        fixture.engine.shutdown().await;
        assert_eq!(0, fixture.active());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stop_on_repeat() {
        let fixture = Fixture::new();
        let clip = ClipSettings::new(fixture.tone("long.wav", Duration::from_secs(5)))
            .with_repeat(RepeatBehavior::StopOnRepeat);

        assert_eq!(
            StartOutcome::Started,
            fixture.engine.start(&combo("F2"), &clip).unwrap()
        );
        assert_eq!(
            StartOutcome::Stopped,
            fixture.engine.start(&combo("F2"), &clip).unwrap()
        );
        assert_eq!(0, fixture.engine.session_count());
        assert_eq!(0, fixture.active());
        assert_eq!(1, fixture.headphones.opened());

        // A third press starts it again.
        assert_eq!(
            StartOutcome::Started,
            fixture.engine.start(&combo("F2"), &clip).unwrap()
        );
        fixture.engine.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_triggers_leave_one_session() {
        let fixture = Fixture::new();
        let clip = ClipSettings::new(fixture.tone("long.wav", Duration::from_secs(5)));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let engine = fixture.engine.clone();
                let clip = clip.clone();
                std::thread::spawn(move || engine.start(&combo("Ctrl+V"), &clip).unwrap())
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        assert_eq!(1, fixture.engine.session_count());
        eventually(|| fixture.active() == 2, "Superseded streams were not closed");

        fixture.engine.shutdown().await;
        assert_eq!(0, fixture.active());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_interruptible_sessions_are_stopped() {
        let fixture = Fixture::new();
        let path = fixture.tone("long.wav", Duration::from_secs(5));
        let background = ClipSettings::new(path.clone()).with_interruptible(false);
        let interruptible = ClipSettings::new(path.clone());

        fixture.engine.start(&combo("F1"), &background).unwrap();
        fixture.engine.start(&combo("F2"), &interruptible).unwrap();
        assert_eq!(2, fixture.engine.session_count());

        fixture.engine.start(&combo("F3"), &interruptible).unwrap();
        assert!(fixture.engine.is_playing("F1"));
        assert!(!fixture.engine.is_playing("F2"));
        assert!(fixture.engine.is_playing("F3"));
        assert_eq!(4, fixture.active());

        fixture.engine.stop_all(true);
        assert_eq!(0, fixture.engine.session_count());
        assert_eq!(0, fixture.active());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_fading_stop() {
        let fixture = Fixture::new();
        let clip = ClipSettings::new(fixture.tone("long.wav", Duration::from_secs(5)))
            .with_fades(Duration::ZERO, Duration::from_millis(300));

        fixture.engine.start(&combo("F1"), &clip).unwrap();
        let session = fixture.engine.session("F1").unwrap();
        eventually(|| session.volume() > 0.69, "Fade-in never completed");

        assert!(fixture.engine.stop("F1", false));
        assert_eq!(SessionState::FadingOut, session.state());
        assert!(fixture.engine.is_playing("F1"));

        // A second request while fading changes nothing.
        assert!(fixture.engine.stop("F1", false));
        assert_eq!(SessionState::FadingOut, session.state());

        eventually_async(
            || async { !fixture.engine.is_playing("F1") },
            "Session never faded out",
        )
        .await;
        assert_eq!(SessionState::Disposed, session.state());
        assert_eq!(0.0, session.volume());
        assert_eq!(0, fixture.active());
        assert!(!fixture.engine.stop("F1", false));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_fixed_duration_loops_then_stops() {
        let fixture = Fixture::new();
        let clip = ClipSettings::new(fixture.tone("blip.wav", Duration::from_millis(100)))
            .with_fades(Duration::ZERO, Duration::from_millis(50))
            .with_duration(Some("500ms"));
        let duration = Duration::from_millis(500);
        let limit =
            duration + clip.fade_out() + COMPLETION_POLL_INTERVAL + Duration::from_millis(250);

        let started = Instant::now();
        fixture.engine.start(&combo("F4"), &clip).unwrap();
        let session = fixture.engine.session("F4").unwrap();

        // Still playing well past the end of the file, just before the cutoff.
        tokio::time::sleep(Duration::from_millis(400).saturating_sub(started.elapsed())).await;
        assert!(fixture.engine.is_playing("F4"));
        assert_eq!(SessionState::Playing, session.state());

        while fixture.engine.is_playing("F4") {
            assert!(
                started.elapsed() < limit,
                "Session still registered {:?} after start",
                started.elapsed()
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(started.elapsed() >= duration);
        assert_eq!(SessionState::Disposed, session.state());
        assert_eq!(0, fixture.active());
        assert!(fixture.headphones.frames() > 48000 / 4);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_fade_out_is_monotonic() {
        let fixture = Fixture::new();
        let clip = ClipSettings::new(fixture.tone("long.wav", Duration::from_secs(5)))
            .with_volume(0.8)
            .with_fades(Duration::ZERO, Duration::from_millis(400));

        fixture.engine.start(&combo("F1"), &clip).unwrap();
        let session = fixture.engine.session("F1").unwrap();
        eventually(|| session.volume() > 0.79, "Fade-in never completed");

        let stopped = Instant::now();
        fixture.engine.stop("F1", false);
        let mut last = session.volume();
        let mut levels = 1;
        while !session.is_disposed() {
            let volume = session.volume();
            assert!(volume <= last, "Volume rose from {} to {}", last, volume);
            if volume < last {
                levels += 1;
            }
            last = volume;
            assert!(stopped.elapsed() < Duration::from_millis(400 + 250));
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(0.0, session.volume());
        // Stepped, not a single jump.
        assert!(levels > 4, "Only {} levels seen", levels);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_teardown_runs_off_the_runtime() {
        // Slow devices take a while to join their render threads on close.
        let fixture = Fixture::with_devices("mock-slow-headphones", "mock-slow-mic");
        let clip = ClipSettings::new(fixture.tone("long.wav", Duration::from_secs(5)))
            .with_fades(Duration::ZERO, Duration::ZERO);

        fixture.engine.start(&combo("F1"), &clip).unwrap();
        let session = fixture.engine.session("F1").unwrap();
        fixture.engine.stop("F1", false);

        eventually_async(
            || async { session.is_disposed() },
            "Session never torn down",
        )
        .await;
        // The only runtime thread is free while the outputs are still closing.
        assert_eq!(2, fixture.active());
        eventually_async(|| async { fixture.active() == 0 }, "Outputs never closed").await;
        assert!(!fixture.engine.is_playing("F1"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_one_failed_output_is_tolerated() {
        let fixture = Fixture::with_devices("mock-headphones", "mock-fail-mic");
        let clip = ClipSettings::new(fixture.tone("long.wav", Duration::from_secs(5)));

        assert_eq!(
            StartOutcome::Started,
            fixture.engine.start(&combo("F1"), &clip).unwrap()
        );
        assert_eq!(1, fixture.headphones.active());
        assert_eq!(0, fixture.mic.active());
        fixture.engine.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_no_outputs() {
        let fixture = Fixture::with_devices("mock-fail-headphones", "mock-fail-mic");
        let clip = ClipSettings::new(fixture.tone("long.wav", Duration::from_secs(5)));

        let result = fixture.engine.start(&combo("F1"), &clip);
        assert!(matches!(result, Err(PlaybackError::NoOutput(_))));
        assert_eq!(0, fixture.engine.session_count());
        assert!(fixture.engine.playing().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_undecodable_clip() {
        let fixture = Fixture::new();
        let path = fixture.dir().join("garbage.wav");
        std::fs::write(&path, b"definitely not audio").unwrap();

        let result = fixture.engine.start(&combo("F1"), &ClipSettings::new(path));
        assert!(matches!(result, Err(PlaybackError::Decode { .. })));
        assert_eq!(0, fixture.engine.session_count());
        assert_eq!(0, fixture.headphones.opened());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stale_finish_keeps_successor() {
        let fixture = Fixture::new();
        let clip = ClipSettings::new(fixture.tone("long.wav", Duration::from_secs(5)));

        fixture.engine.start(&combo("F1"), &clip).unwrap();
        let first = fixture.engine.session("F1").unwrap();
        fixture.engine.start(&combo("F1"), &clip).unwrap();

        fixture.engine.inner.finish(&first);
        assert!(fixture.engine.is_playing("F1"));
        assert!(!fixture.engine.session("F1").unwrap().is_disposed());
        fixture.engine.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_playing_watch() {
        let fixture = Fixture::new();
        let path = fixture.tone("long.wav", Duration::from_secs(5));
        let mut playing = fixture.engine.subscribe_playing();

        fixture
            .engine
            .start(&combo("F1"), &ClipSettings::new(path.clone()).with_interruptible(false))
            .unwrap();
        playing.changed().await.unwrap();
        assert_eq!(vec!["long.wav".to_string()], *playing.borrow_and_update());

        fixture.engine.stop("F1", true);
        playing.changed().await.unwrap();
        assert!(playing.borrow_and_update().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_fade_in_is_monotonic() {
        let fixture = Fixture::new();
        let clip = ClipSettings::new(fixture.tone("long.wav", Duration::from_secs(5)))
            .with_volume(0.6)
            .with_fades(Duration::from_millis(400), Duration::ZERO);

        fixture.engine.start(&combo("F1"), &clip).unwrap();
        let session = fixture.engine.session("F1").unwrap();

        let mut last = 0.0;
        for _ in 0..30 {
            let volume = session.volume();
            assert!(volume >= last);
            assert!(volume <= 0.6);
            last = volume;
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        eventually(|| (session.volume() - 0.6).abs() < 1e-6, "Fade-in never finished");
        fixture.engine.shutdown().await;
    }
}
