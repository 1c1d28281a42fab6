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

/// A source of audio samples that processes chunks in planar format.
/// Planar format stores all samples for channel 0, then all samples for channel 1, etc.
pub trait SampleSource: Send {
    /// Get the next chunk of samples from the source in planar format.
    /// Each inner Vec corresponds to one channel and is cleared before being filled with up to
    /// max_frames samples. All channels receive the same number of samples.
    /// Returns the number of frames written (0 = EOF).
    ///
    /// The output slice must have exactly channel_count() elements.
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, SampleSourceError>;

    /// Get the number of channels in this source
    fn channel_count(&self) -> u16;

    /// Get the sample rate of this source
    fn sample_rate(&self) -> u32;

    /// Get the duration of this source (if known)
    /// Returns None if the duration is unknown or infinite
    fn duration(&self) -> Option<Duration>;
}

/// A source that can be restarted from its first frame.
pub trait Rewind {
    fn rewind(&mut self) -> Result<(), SampleSourceError>;
}

/// Allows Box<dyn SampleSource> to be used directly with generic stages.
impl SampleSource for Box<dyn SampleSource> {
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, SampleSourceError> {
        (**self).next_chunk(output, max_frames)
    }

    fn channel_count(&self) -> u16 {
        (**self).channel_count()
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn duration(&self) -> Option<Duration> {
        (**self).duration()
    }
}

/// Verifies that an output buffer matches the channel count of the source writing into it,
/// then clears every channel.
pub(super) fn prepare_output(
    output: &mut [Vec<f32>],
    channels: u16,
) -> Result<(), SampleSourceError> {
    if output.len() != channels as usize {
        return Err(SampleSourceError::SampleConversionFailed(format!(
            "Output has {} channels, expected {}",
            output.len(),
            channels
        )));
    }
    for ch in output.iter_mut() {
        ch.clear();
    }
    Ok(())
}
