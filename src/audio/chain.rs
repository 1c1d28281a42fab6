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
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use super::format::MixFormat;
use super::gain::{Gain, GainStage};
use super::sample_source::{
    adapt_channels, AudioSampleSource, BufferedSource, LoopingSource, ResampledSource, SampleSource,
    SampleSourceError, SoftLimiter,
};

/// Builds the full signal chain for one output: decoder, optional looping, then the device
/// adaptation stages.
pub fn build_chain(
    path: &Path,
    format: &MixFormat,
    looping: bool,
    gain: Arc<Gain>,
) -> Result<Box<dyn SampleSource>, SampleSourceError> {
    let decoder = AudioSampleSource::from_file(path)?;
    debug!(
        file = path.display().to_string(),
        sample_rate = decoder.sample_rate(),
        channels = decoder.channel_count(),
        looping,
        "Opened clip"
    );

    let source: Box<dyn SampleSource> = if looping {
        Box::new(LoopingSource::new(decoder))
    } else {
        Box::new(decoder)
    };
    adapt(source, format, gain)
}

/// Converts a decoded source to the device's mix format and applies the limiter, all on a fill
/// thread ahead of playback. Only the gain runs where the device pulls samples, so envelope
/// changes are heard without the buffer's delay.
pub fn adapt(
    source: Box<dyn SampleSource>,
    format: &MixFormat,
    gain: Arc<Gain>,
) -> Result<Box<dyn SampleSource>, SampleSourceError> {
    let source: Box<dyn SampleSource> = if source.sample_rate() != format.sample_rate {
        Box::new(ResampledSource::new(source, format.sample_rate)?)
    } else {
        source
    };
    let source = adapt_channels(source, format.channels);
    let buffered = BufferedSource::new(Box::new(SoftLimiter::new(source)))?;
    Ok(Box::new(GainStage::new(buffered, gain)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::format::SampleFormat;
    use crate::audio::sample_source::MemorySampleSource;

    #[test]
    fn test_adapt_matching_format() {
        let format = MixFormat::new(44100, 2, SampleFormat::Float, 32).unwrap();
        let source = Box::new(MemorySampleSource::new(vec![2.0, 0.5], 1, 44100));
        let mut chain = adapt(source, &format, Arc::new(Gain::new(0.5))).unwrap();
        assert_eq!(2, chain.channel_count());
        assert_eq!(44100, chain.sample_rate());

        let mut output = vec![Vec::new(), Vec::new()];
        assert_eq!(2, chain.next_chunk(&mut output, 8).unwrap());
        // Limited to 1.055 before the gain is applied.
        assert!((output[0][0] - 0.5275).abs() < 1e-6);
        assert!((output[1][1] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_adapt_resamples() {
        let format = MixFormat::new(48000, 1, SampleFormat::Int, 16).unwrap();
        let source = Box::new(MemorySampleSource::new(vec![0.1; 4000], 2, 44100));
        let chain = adapt(source, &format, Arc::new(Gain::new(1.0))).unwrap();
        assert_eq!(48000, chain.sample_rate());
        assert_eq!(1, chain.channel_count());
    }

    #[test]
    fn test_build_chain_loops() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.wav");
        crate::testutil::write_wav(&path, vec![vec![0.25; 100]], 44100).unwrap();

        let format = MixFormat::new(44100, 1, SampleFormat::Float, 32).unwrap();
        let mut chain = build_chain(&path, &format, true, Arc::new(Gain::new(1.0))).unwrap();
        let mut output = vec![Vec::new()];
        let mut total = 0;
        for _ in 0..10 {
            total += chain.next_chunk(&mut output, 64).unwrap();
        }
        assert!(total > 100, "looping chain stopped after {} frames", total);
    }
}
