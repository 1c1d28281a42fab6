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
use std::time::Duration;

use super::error::SampleSourceError;
use super::traits::{prepare_output, Rewind, SampleSource};

/// A sample source that produces samples from memory in planar format.
///
/// Input samples are provided as interleaved for convenience but stored planar internally.
pub struct MemorySampleSource {
    /// Planar sample storage (one Vec per channel)
    planar_samples: Vec<Vec<f32>>,
    /// Current position in frames
    current_frame: usize,
    channel_count: u16,
    sample_rate: u32,
}

impl MemorySampleSource {
    /// Creates a new memory sample source from interleaved samples.
    pub fn new(interleaved_samples: Vec<f32>, channel_count: u16, sample_rate: u32) -> Self {
        let num_channels = channel_count as usize;
        let num_frames = if num_channels > 0 {
            interleaved_samples.len() / num_channels
        } else {
            0
        };

        let mut planar_samples = vec![Vec::with_capacity(num_frames); num_channels];
        for frame in interleaved_samples.chunks_exact(num_channels.max(1)) {
            for (ch, sample) in frame.iter().enumerate() {
                planar_samples[ch].push(*sample);
            }
        }

        Self {
            planar_samples,
            current_frame: 0,
            channel_count,
            sample_rate,
        }
    }

    fn total_frames(&self) -> usize {
        self.planar_samples.first().map(|c| c.len()).unwrap_or(0)
    }
}

impl SampleSource for MemorySampleSource {
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, SampleSourceError> {
        prepare_output(output, self.channel_count)?;

        let available = self.total_frames().saturating_sub(self.current_frame);
        let to_copy = available.min(max_frames);

        if to_copy > 0 {
            for (out_ch, in_ch) in output.iter_mut().zip(self.planar_samples.iter()) {
                out_ch.extend_from_slice(&in_ch[self.current_frame..self.current_frame + to_copy]);
            }
            self.current_frame += to_copy;
        }

        Ok(to_copy)
    }

    fn channel_count(&self) -> u16 {
        self.channel_count
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f64(
            self.total_frames() as f64 / self.sample_rate as f64,
        ))
    }
}

impl Rewind for MemorySampleSource {
    fn rewind(&mut self) -> Result<(), SampleSourceError> {
        self.current_frame = 0;
        Ok(())
    }
}
