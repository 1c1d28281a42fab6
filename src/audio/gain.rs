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
    atomic::{AtomicU32, Ordering},
    Arc,
};
use std::time::Duration;

use super::sample_source::{SampleSource, SampleSourceError};

/// A volume level shared between the envelope scheduler and a render thread.
#[derive(Debug)]
pub struct Gain {
    bits: AtomicU32,
}

impl Gain {
    pub fn new(level: f32) -> Gain {
        Gain {
            bits: AtomicU32::new(level.to_bits()),
        }
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    pub fn set(&self, level: f32) {
        self.bits
            .store(level.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }
}

/// The last stage of every signal chain: scales each sample by the current envelope volume.
pub struct GainStage<S> {
    source: S,
    gain: Arc<Gain>,
}

impl<S> GainStage<S> {
    pub fn new(source: S, gain: Arc<Gain>) -> Self {
        Self { source, gain }
    }
}

impl<S> SampleSource for GainStage<S>
where
    S: SampleSource,
{
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, SampleSourceError> {
        let frames = self.source.next_chunk(output, max_frames)?;
        let level = self.gain.get();
        for ch in output.iter_mut() {
            for sample in ch.iter_mut() {
                *sample *= level;
            }
        }
        Ok(frames)
    }

    fn channel_count(&self) -> u16 {
        self.source.channel_count()
    }

    fn sample_rate(&self) -> u32 {
        self.source.sample_rate()
    }

    fn duration(&self) -> Option<Duration> {
        self.source.duration()
    }
}
