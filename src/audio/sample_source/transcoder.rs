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

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use super::error::SampleSourceError;
use super::traits::{prepare_output, SampleSource};

/// Input block size for the sinc resampler.
const INPUT_BLOCK_SIZE: usize = 1024;

/// Output frames are compacted once this many have been consumed.
const COMPACT_THRESHOLD: usize = 4096;

/// Converts a source to a different sample rate with a rubato sinc resampler (planar throughout).
pub struct ResampledSource<S: SampleSource> {
    source: S,
    resampler: SincFixedIn<f32>,
    source_rate: u32,
    target_rate: u32,
    channels: u16,

    /// Sliding window of input frames waiting for the resampler.
    input: Vec<Vec<f32>>,
    /// Resampled frames not yet handed out.
    output: Vec<Vec<f32>>,
    /// Read position inside `output`.
    output_pos: usize,
    /// Reused buffer for reading from the source.
    source_scratch: Vec<Vec<f32>>,
    /// Reused buffer for resampler output.
    output_scratch: Vec<Vec<f32>>,
    source_finished: bool,
    flushed: bool,
}

impl<S> ResampledSource<S>
where
    S: SampleSource,
{
    pub fn new(source: S, target_rate: u32) -> Result<Self, SampleSourceError> {
        let source_rate = source.sample_rate();
        let channels = source.channel_count();
        let sinc_params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            oversampling_factor: 128,
            interpolation: SincInterpolationType::Linear,
            window: WindowFunction::BlackmanHarris2,
        };

        let resampler = SincFixedIn::<f32>::new(
            target_rate as f64 / source_rate as f64,
            1.0,
            sinc_params,
            INPUT_BLOCK_SIZE,
            channels as usize,
        )
        .map_err(|_e| SampleSourceError::ResamplingFailed(source_rate, target_rate))?;
        let output_scratch = resampler.output_buffer_allocate(true);

        Ok(Self {
            source,
            resampler,
            source_rate,
            target_rate,
            channels,
            input: vec![Vec::with_capacity(INPUT_BLOCK_SIZE); channels as usize],
            output: vec![Vec::new(); channels as usize],
            output_pos: 0,
            source_scratch: vec![Vec::with_capacity(INPUT_BLOCK_SIZE); channels as usize],
            output_scratch,
            source_finished: false,
            flushed: false,
        })
    }

    fn input_frames(&self) -> usize {
        self.input.first().map(|ch| ch.len()).unwrap_or(0)
    }

    fn output_frames(&self) -> usize {
        self.output
            .first()
            .map(|ch| ch.len().saturating_sub(self.output_pos))
            .unwrap_or(0)
    }

    /// Runs the resampler once, feeding it from the source. Returns false when no more output
    /// will ever be produced.
    fn refill(&mut self) -> Result<bool, SampleSourceError> {
        let needed = self.resampler.input_frames_next();
        while !self.source_finished && self.input_frames() < needed {
            let wanted = needed - self.input_frames();
            let frames = self
                .source
                .next_chunk(&mut self.source_scratch, wanted)?;
            if frames == 0 {
                self.source_finished = true;
                break;
            }
            for (input, scratch) in self.input.iter_mut().zip(self.source_scratch.iter()) {
                input.extend_from_slice(&scratch[..frames]);
            }
        }

        let (consumed, produced) = if self.input_frames() >= needed {
            self.resampler
                .process_into_buffer(&self.input, &mut self.output_scratch, None)
                .map_err(|_e| SampleSourceError::ResamplingFailed(self.source_rate, self.target_rate))?
        } else if !self.flushed {
            // The source is exhausted; push whatever is left through the resampler once.
            self.flushed = true;
            let remaining = self.input_frames();
            let (_, produced) = self
                .resampler
                .process_partial_into_buffer(
                    Some(&self.input as &[Vec<f32>]),
                    &mut self.output_scratch,
                    None,
                )
                .map_err(|_e| SampleSourceError::ResamplingFailed(self.source_rate, self.target_rate))?;
            (remaining, produced)
        } else {
            return Ok(false);
        };

        for input in self.input.iter_mut() {
            input.drain(..consumed.min(input.len()));
        }
        for (output, scratch) in self.output.iter_mut().zip(self.output_scratch.iter()) {
            output.extend_from_slice(&scratch[..produced.min(scratch.len())]);
        }
        Ok(true)
    }
}

impl<S> SampleSource for ResampledSource<S>
where
    S: SampleSource,
{
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, SampleSourceError> {
        prepare_output(output, self.channels)?;

        let mut written = 0;
        while written < max_frames {
            let available = self.output_frames();
            if available == 0 {
                if !self.refill()? {
                    break;
                }
                continue;
            }

            let count = available.min(max_frames - written);
            let range = self.output_pos..self.output_pos + count;
            for (out_ch, buffered) in output.iter_mut().zip(self.output.iter()) {
                out_ch.extend_from_slice(&buffered[range.clone()]);
            }
            self.output_pos += count;
            written += count;

            if self.output_pos > COMPACT_THRESHOLD {
                for ch in self.output.iter_mut() {
                    ch.drain(..self.output_pos);
                }
                self.output_pos = 0;
            }
        }

        Ok(written)
    }

    fn channel_count(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.target_rate
    }

    fn duration(&self) -> Option<Duration> {
        self.source.duration()
    }
}
