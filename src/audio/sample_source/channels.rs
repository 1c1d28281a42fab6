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

use tracing::debug;

use super::error::SampleSourceError;
use super::traits::{prepare_output, SampleSource};

/// How a source's channels are folded into the device's channels.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Conversion {
    /// Mono source, stereo device: the one channel is copied to both.
    Duplicate,
    /// Stereo source, mono device: both channels are averaged.
    Average,
}

/// Adapts mono sources to stereo devices and stereo sources to mono devices.
pub struct ChannelAdapter<S> {
    source: S,
    conversion: Conversion,
    target_channels: u16,
    scratch: Vec<Vec<f32>>,
}

/// Wraps the source in a channel adapter if the device needs one. Other channel mismatches pass
/// through unchanged; the device writer zero-fills or drops the extra channels.
pub fn adapt_channels(source: Box<dyn SampleSource>, target_channels: u16) -> Box<dyn SampleSource> {
    let source_channels = source.channel_count();
    let conversion = match (source_channels, target_channels) {
        (1, 2) => Conversion::Duplicate,
        (2, 1) => Conversion::Average,
        _ => {
            if source_channels != target_channels {
                debug!(
                    source_channels,
                    target_channels, "Passing mismatched channel layout through"
                );
            }
            return source;
        }
    };

    Box::new(ChannelAdapter {
        scratch: vec![Vec::new(); source_channels as usize],
        source,
        conversion,
        target_channels,
    })
}

impl<S> SampleSource for ChannelAdapter<S>
where
    S: SampleSource,
{
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, SampleSourceError> {
        prepare_output(output, self.target_channels)?;

        let frames = self.source.next_chunk(&mut self.scratch, max_frames)?;
        match self.conversion {
            Conversion::Duplicate => {
                for out_ch in output.iter_mut() {
                    out_ch.extend_from_slice(&self.scratch[0][..frames]);
                }
            }
            Conversion::Average => {
                let (left, right) = (&self.scratch[0], &self.scratch[1]);
                output[0].extend(
                    left.iter()
                        .zip(right.iter())
                        .take(frames)
                        .map(|(l, r)| (l + r) * 0.5),
                );
            }
        }

        Ok(frames)
    }

    fn channel_count(&self) -> u16 {
        self.target_channels
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
    fn test_mono_to_stereo_duplicates() {
        let source = Box::new(MemorySampleSource::new(vec![0.1, 0.2, 0.3], 1, 44100));
        let mut adapted = adapt_channels(source, 2);
        assert_eq!(2, adapted.channel_count());

        let mut output = vec![Vec::new(), Vec::new()];
        assert_eq!(3, adapted.next_chunk(&mut output, 10).unwrap());
        assert_eq!(vec![0.1, 0.2, 0.3], output[0]);
        assert_eq!(output[0], output[1]);
    }

    #[test]
    fn test_stereo_to_mono_averages() {
        let source = Box::new(MemorySampleSource::new(vec![0.2, 0.4, -1.0, 1.0], 2, 44100));
        let mut adapted = adapt_channels(source, 1);
        assert_eq!(1, adapted.channel_count());

        let mut output = vec![Vec::new()];
        assert_eq!(2, adapted.next_chunk(&mut output, 10).unwrap());
        assert!((output[0][0] - 0.3).abs() < 1e-6);
        assert!(output[0][1].abs() < 1e-6);
    }

    #[test]
    fn test_other_layouts_pass_through() {
        let source = Box::new(MemorySampleSource::new(vec![0.0; 12], 6, 44100));
        let adapted = adapt_channels(source, 2);
        assert_eq!(6, adapted.channel_count());
    }
}
