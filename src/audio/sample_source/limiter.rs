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
use super::traits::SampleSource;

/// Magnitude above which samples are compressed.
pub const LIMIT_THRESHOLD: f32 = 0.95;

/// Portion of the excess over the threshold that is kept.
pub const LIMIT_RATIO: f32 = 0.1;

/// Applies the soft limit to a single sample.
#[inline]
pub fn limit_sample(sample: f32) -> f32 {
    let magnitude = sample.abs();
    if magnitude <= LIMIT_THRESHOLD {
        return sample;
    }
    (LIMIT_THRESHOLD + (magnitude - LIMIT_THRESHOLD) * LIMIT_RATIO).copysign(sample)
}

/// Gently compresses peaks so that resampled or summed material doesn't clip hard.
pub struct SoftLimiter<S> {
    source: S,
}

impl<S> SoftLimiter<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S> SampleSource for SoftLimiter<S>
where
    S: SampleSource,
{
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, SampleSourceError> {
        let frames = self.source.next_chunk(output, max_frames)?;
        for ch in output.iter_mut() {
            for sample in ch.iter_mut() {
                *sample = limit_sample(*sample);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::sample_source::MemorySampleSource;

    #[test]
    fn test_limit_sample() {
        assert_eq!(0.5, limit_sample(0.5));
        assert_eq!(-0.95, limit_sample(-0.95));
        assert!((limit_sample(1.05) - 0.96).abs() < 1e-6);
        assert!((limit_sample(-1.95) + 1.05).abs() < 1e-6);
    }

    #[test]
    fn test_limiter_stage() {
        let source = MemorySampleSource::new(vec![0.2, 2.0, -2.0], 1, 44100);
        let mut limiter = SoftLimiter::new(source);
        let mut output = vec![Vec::new()];
        assert_eq!(3, limiter.next_chunk(&mut output, 16).unwrap());
        assert_eq!(0.2, output[0][0]);
        assert!((output[0][1] - 1.055).abs() < 1e-6);
        assert!((output[0][2] + 1.055).abs() < 1e-6);
    }
}
