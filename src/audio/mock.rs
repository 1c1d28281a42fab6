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
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use tracing::{debug, span, Level};

use super::format::{MixFormat, SampleFormat};
use super::render::FrameWriter;
use super::sample_source::SampleSource;
use super::{DeviceError, OutputHandle};

/// How often the mock render thread pulls a period from its chain.
const PERIOD: Duration = Duration::from_millis(10);

/// How long a slow mock stream takes to shut down once closed.
const SLOW_CLOSE: Duration = Duration::from_millis(300);

/// Counters shared between a mock device and its streams.
#[derive(Default)]
struct Stats {
    opened: AtomicUsize,
    active: AtomicUsize,
    frames: AtomicU64,
    /// Bits of the peak sample written during the most recent period.
    last_peak: AtomicU32,
}

/// A mock device. Renders chains in real time into a scratch buffer and discards the result.
///
/// Names containing `fail` refuse to open streams, names containing `slow` take a while to close
/// and names containing `mono` use a 44.1kHz mono mix format instead of the 48kHz stereo default.
#[derive(Clone)]
pub struct Device {
    name: String,
    mix_format: MixFormat,
    fail_open: bool,
    slow_close: bool,
    stats: Arc<Stats>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        let mix_format = if name.contains("mono") {
            MixFormat {
                sample_rate: 44100,
                channels: 1,
                sample_format: SampleFormat::Int,
                bits_per_sample: 16,
            }
        } else {
            MixFormat::default()
        };

        Device {
            name: name.to_string(),
            mix_format,
            fail_open: name.contains("fail"),
            slow_close: name.contains("slow"),
            stats: Arc::new(Stats::default()),
        }
    }

    /// The number of streams ever opened on this device.
    #[cfg(test)]
    pub fn opened(&self) -> usize {
        self.stats.opened.load(Ordering::Relaxed)
    }

    /// The number of streams currently open on this device.
    #[cfg(test)]
    pub fn active(&self) -> usize {
        self.stats.active.load(Ordering::Relaxed)
    }

    /// Total frames pulled from chains on this device.
    #[cfg(test)]
    pub fn frames(&self) -> u64 {
        self.stats.frames.load(Ordering::Relaxed)
    }

    /// The peak absolute sample of the most recently rendered period.
    #[cfg(test)]
    pub fn last_peak(&self) -> f32 {
        f32::from_bits(self.stats.last_peak.load(Ordering::Relaxed))
    }
}

impl super::Device for Device {
    fn name(&self) -> &str {
        &self.name
    }

    fn mix_format(&self) -> MixFormat {
        self.mix_format
    }

    fn open(&self, source: Box<dyn SampleSource>) -> Result<Box<dyn OutputHandle>, DeviceError> {
        if self.fail_open {
            return Err(DeviceError::Open {
                device: self.name.clone(),
                reason: "mock device configured to fail".to_string(),
            });
        }

        let finished = Arc::new(AtomicBool::new(false));
        let (close_tx, close_rx) = crossbeam_channel::bounded::<()>(1);
        let mut writer = FrameWriter::new(source, self.mix_format.channels, finished.clone());
        let stats = self.stats.clone();
        let channels = self.mix_format.channels as usize;
        let period_frames = (self.mix_format.sample_rate as u128 * PERIOD.as_millis() / 1000) as usize;
        let name = self.name.clone();
        let slow_close = self.slow_close;

        stats.opened.fetch_add(1, Ordering::Relaxed);
        stats.active.fetch_add(1, Ordering::Relaxed);
        let thread = thread::Builder::new()
            .name(format!("keycue-mock-{}", self.name))
            .spawn(move || {
                let span = span!(Level::DEBUG, "mock render", device = name);
                let _enter = span.enter();

                let mut buffer = vec![0.0f32; period_frames * channels];
                loop {
                    match close_rx.recv_timeout(PERIOD) {
                        Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
                        _ => break,
                    }

                    let frames = writer.fill(&mut buffer, |s| s);
                    stats.frames.fetch_add(frames as u64, Ordering::Relaxed);
                    let peak = buffer.iter().fold(0.0f32, |peak, s| peak.max(s.abs()));
                    stats.last_peak.store(peak.to_bits(), Ordering::Relaxed);
                }

                if slow_close {
                    thread::sleep(SLOW_CLOSE);
                }
                stats.active.fetch_sub(1, Ordering::Relaxed);
                debug!("Mock stream closed");
            })
            .map_err(|e| DeviceError::Open {
                device: self.name.clone(),
                reason: e.to_string(),
            })?;

        Ok(Box::new(Output {
            name: self.name.clone(),
            finished,
            close_tx,
            thread,
        }))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) (Mock)", self.name, self.mix_format)
    }
}

struct Output {
    name: String,
    finished: Arc<AtomicBool>,
    close_tx: crossbeam_channel::Sender<()>,
    thread: thread::JoinHandle<()>,
}

impl OutputHandle for Output {
    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }

    fn close(self: Box<Self>) -> Result<(), DeviceError> {
        let Output {
            name,
            close_tx,
            thread,
            ..
        } = *self;
        let _ = close_tx.send(());
        thread.join().map_err(|_| DeviceError::RenderThread(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::sample_source::MemorySampleSource;
    use crate::audio::Device as _;
    use crate::testutil::eventually;

    #[test]
    fn test_mock_renders_until_finished() {
        let device = Device::get("mock-test");
        // 50ms of stereo audio.
        let source = Box::new(MemorySampleSource::new(vec![0.5; 4800], 2, 48000));
        let handle = device.open(source).unwrap();
        assert_eq!(1, device.opened());
        assert_eq!(1, device.active());

        eventually(|| handle.is_finished(), "Mock stream never finished");
        assert_eq!(2400, device.frames());

        handle.close().unwrap();
        assert_eq!(0, device.active());
    }

    #[test]
    fn test_mock_failing_device() {
        let device = Device::get("mock-fail");
        let source = Box::new(MemorySampleSource::new(vec![0.5; 10], 1, 48000));
        assert!(matches!(device.open(source), Err(DeviceError::Open { .. })));
        assert_eq!(0, device.opened());
    }

    #[test]
    fn test_mock_slow_close() {
        let device = Device::get("mock-slow");
        let source = Box::new(MemorySampleSource::new(vec![0.5; 4800], 1, 48000));
        let handle = device.open(source).unwrap();

        let closing = std::time::Instant::now();
        handle.close().unwrap();
        assert!(closing.elapsed() >= SLOW_CLOSE);
        assert_eq!(0, device.active());
    }

    #[test]
    fn test_mock_mono_format() {
        let device = Device::get("mock-mono");
        assert_eq!(1, device.mix_format().channels);
        assert_eq!(44100, device.mix_format().sample_rate);
    }
}
