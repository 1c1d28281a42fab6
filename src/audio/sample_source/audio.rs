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
use std::fs::File;
use std::path::Path;
use std::time::Duration;

use symphonia::core::audio::{AudioBuffer, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::warn;

use super::error::SampleSourceError;
use super::traits::{prepare_output, Rewind, SampleSource};

/// A sample source that decodes audio files (WAV, MP3, FLAC, OGG, etc.) with symphonia.
/// Decoded packets are kept planar until they are handed out.
pub struct AudioSampleSource {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    channels: u16,
    sample_rate: u32,
    duration: Option<Duration>,
    /// Frames from the last decoded packet, one Vec per channel.
    pending: Vec<Vec<f32>>,
    /// Read position inside `pending`.
    pending_pos: usize,
    /// Reused conversion target for decoded packets.
    scratch: Option<AudioBuffer<f32>>,
    is_finished: bool,
}

impl AudioSampleSource {
    /// Opens the given file and prepares a decoder for its first audio track.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SampleSourceError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            SampleSourceError::IoError(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path.display(), e),
            ))
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let meta_opts: MetadataOptions = Default::default();
        let fmt_opts: FormatOptions = Default::default();
        let probed = get_probe()
            .format(&hint, mss, &fmt_opts, &meta_opts)
            .map_err(|e| {
                SampleSourceError::SampleConversionFailed(format!("'{}': {}", path.display(), e))
            })?;
        let format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| {
                SampleSourceError::SampleConversionFailed(format!(
                    "'{}': no audio track found",
                    path.display()
                ))
            })?;

        let track_id = track.id;
        let params = &track.codec_params;
        let sample_rate = params.sample_rate.ok_or_else(|| {
            SampleSourceError::SampleConversionFailed("Sample rate not specified".to_string())
        })?;
        let duration = params
            .n_frames
            .map(|n_frames| Duration::from_secs_f64(n_frames as f64 / sample_rate as f64));

        let decoder_opts: DecoderOptions = Default::default();
        let decoder = get_codecs().make(params, &decoder_opts).map_err(|e| {
            SampleSourceError::SampleConversionFailed(format!("'{}': {}", path.display(), e))
        })?;

        // A channel count of 0 means the container didn't report one. The first decoded packet
        // will tell us.
        let channels = params.channels.map(|c| c.count() as u16).unwrap_or(0);

        let mut source = Self {
            format_reader,
            decoder,
            track_id,
            channels,
            sample_rate,
            duration,
            pending: vec![Vec::new(); channels as usize],
            pending_pos: 0,
            scratch: None,
            is_finished: false,
        };

        if source.channels == 0 && !source.decode_next()? {
            return Err(SampleSourceError::SampleConversionFailed(
                "Channels not specified".to_string(),
            ));
        }

        Ok(source)
    }

    fn pending_frames(&self) -> usize {
        self.pending
            .first()
            .map(|ch| ch.len().saturating_sub(self.pending_pos))
            .unwrap_or(0)
    }

    /// Decodes the next packet of our track into `pending`. Returns false at end of stream.
    fn decode_next(&mut self) -> Result<bool, SampleSourceError> {
        loop {
            let packet = match self.format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(false);
                }
                // Some readers report the end of the stream as a decode error.
                Err(SymphoniaError::DecodeError(_)) => return Ok(false),
                Err(e) => return Err(e.into()),
            };
            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!(error = e, "Skipping undecodable packet");
                    continue;
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let frames = decoded.frames();
            if frames == 0 {
                continue;
            }

            let spec = *decoded.spec();
            let needs_alloc = self
                .scratch
                .as_ref()
                .map_or(true, |buf| buf.capacity() < frames || *buf.spec() != spec);
            if needs_alloc {
                self.scratch = Some(AudioBuffer::new(decoded.capacity() as u64, spec));
            }
            let Some(buf) = self.scratch.as_mut() else {
                continue;
            };
            decoded.convert(buf);

            if self.channels == 0 {
                self.channels = spec.channels.count() as u16;
                self.pending = vec![Vec::new(); self.channels as usize];
            }

            let decoded_channels = spec.channels.count();
            for (ch, pending) in self.pending.iter_mut().enumerate() {
                pending.clear();
                if ch < decoded_channels {
                    let samples = buf.chan(ch);
                    pending.extend_from_slice(&samples[..frames.min(samples.len())]);
                }
                pending.resize(frames, 0.0);
            }
            self.pending_pos = 0;
            return Ok(true);
        }
    }
}

impl SampleSource for AudioSampleSource {
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, SampleSourceError> {
        prepare_output(output, self.channels)?;

        let mut written = 0;
        while written < max_frames {
            let available = self.pending_frames();
            if available == 0 {
                if self.is_finished || !self.decode_next()? {
                    self.is_finished = true;
                    break;
                }
                continue;
            }

            let count = available.min(max_frames - written);
            let range = self.pending_pos..self.pending_pos + count;
            for (out_ch, pending) in output.iter_mut().zip(self.pending.iter()) {
                out_ch.extend_from_slice(&pending[range.clone()]);
            }
            self.pending_pos += count;
            written += count;
        }

        Ok(written)
    }

    fn channel_count(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn duration(&self) -> Option<Duration> {
        self.duration
    }
}

impl Rewind for AudioSampleSource {
    fn rewind(&mut self) -> Result<(), SampleSourceError> {
        self.format_reader
            .seek(
                SeekMode::Accurate,
                SeekTo::TimeStamp {
                    ts: 0,
                    track_id: self.track_id,
                },
            )
            .map_err(|e| SampleSourceError::RewindFailed(e.to_string()))?;
        self.decoder.reset();
        for pending in self.pending.iter_mut() {
            pending.clear();
        }
        self.pending_pos = 0;
        self.is_finished = false;
        Ok(())
    }
}
