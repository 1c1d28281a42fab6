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
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tracing::error;

use super::sample_source::SampleSource;

/// Pulls planar frames from a signal chain and writes them interleaved into a device buffer.
/// Used from inside the device callback, so it only allocates when a larger buffer than any
/// seen before is requested.
pub struct FrameWriter {
    source: Box<dyn SampleSource>,
    device_channels: usize,
    scratch: Vec<Vec<f32>>,
    finished: Arc<AtomicBool>,
}

impl FrameWriter {
    pub fn new(
        source: Box<dyn SampleSource>,
        device_channels: u16,
        finished: Arc<AtomicBool>,
    ) -> FrameWriter {
        let scratch = vec![Vec::new(); source.channel_count() as usize];
        FrameWriter {
            source,
            device_channels: device_channels.max(1) as usize,
            scratch,
            finished,
        }
    }

    /// Fills `data` with the next frames of the chain, converting each sample with `convert`.
    /// Device channels the chain doesn't provide are zero-filled and extra chain channels are
    /// dropped. Once the chain is exhausted (or fails) the buffer is filled with silence and the
    /// finished flag is raised. Returns the number of frames taken from the chain.
    pub fn fill<T, F>(&mut self, data: &mut [T], convert: F) -> usize
    where
        T: Copy,
        F: Fn(f32) -> T,
    {
        let frames = data.len() / self.device_channels;
        let read = if self.finished.load(Ordering::Relaxed) || frames == 0 {
            0
        } else {
            match self.source.next_chunk(&mut self.scratch, frames) {
                Ok(0) => {
                    self.finished.store(true, Ordering::Relaxed);
                    0
                }
                Ok(read) => read,
                Err(e) => {
                    error!(err = e.to_string(), "Error rendering clip");
                    self.finished.store(true, Ordering::Relaxed);
                    0
                }
            }
        };

        let silence = convert(0.0);
        for (frame_idx, frame) in data.chunks_mut(self.device_channels).enumerate() {
            for (ch, out) in frame.iter_mut().enumerate() {
                *out = if frame_idx < read {
                    self.scratch
                        .get(ch)
                        .and_then(|samples| samples.get(frame_idx))
                        .map(|s| convert(*s))
                        .unwrap_or(silence)
                } else {
                    silence
                };
            }
        }
        read
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::sample_source::MemorySampleSource;

    #[test]
    fn test_fill_interleaves_and_finishes() {
        let finished = Arc::new(AtomicBool::new(false));
        let source = Box::new(MemorySampleSource::new(vec![0.1, 0.2, 0.3, 0.4], 2, 44100));
        let mut writer = FrameWriter::new(source, 2, finished.clone());

        let mut data = [1.0f32; 6];
        assert_eq!(2, writer.fill(&mut data, |s| s));
        assert_eq!([0.1, 0.2, 0.3, 0.4, 0.0, 0.0], data);
        assert!(!finished.load(Ordering::Relaxed));

        assert_eq!(0, writer.fill(&mut data, |s| s));
        assert_eq!([0.0; 6], data);
        assert!(finished.load(Ordering::Relaxed));
    }

    #[test]
    fn test_fill_zero_fills_extra_device_channels() {
        let finished = Arc::new(AtomicBool::new(false));
        let source = Box::new(MemorySampleSource::new(vec![0.5, 0.5], 1, 44100));
        let mut writer = FrameWriter::new(source, 3, finished);

        let mut data = [9i16; 6];
        assert_eq!(2, writer.fill(&mut data, |s| (s * 100.0) as i16));
        assert_eq!([50, 0, 0, 50, 0, 0], data);
    }
}
