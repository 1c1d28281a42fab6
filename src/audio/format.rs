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

use std::fmt;

/// Sample format of a device's native stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// Integer samples (e.g., 16-bit, 24-bit, 32-bit)
    Int,
    /// Floating point samples (e.g., 32-bit float, 64-bit float)
    Float,
}

impl SampleFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            SampleFormat::Float => "float",
            SampleFormat::Int => "int",
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The shared mix format of an output device. Every session rendered to the device is converted
/// to this rate and channel count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u16,
    /// Native sample format of the device
    pub sample_format: SampleFormat,
    /// Bits per sample of the native format
    pub bits_per_sample: u16,
}

impl MixFormat {
    pub fn new(
        sample_rate: u32,
        channels: u16,
        sample_format: SampleFormat,
        bits_per_sample: u16,
    ) -> Result<Self, String> {
        if sample_rate == 0 {
            return Err("Sample rate must be greater than 0".to_string());
        }
        if channels == 0 {
            return Err("Channel count must be greater than 0".to_string());
        }

        Ok(MixFormat {
            sample_rate,
            channels,
            sample_format,
            bits_per_sample,
        })
    }
}

impl Default for MixFormat {
    /// 48kHz stereo float, the usual shared-mode mix format.
    fn default() -> Self {
        MixFormat {
            sample_rate: 48000,
            channels: 2,
            sample_format: SampleFormat::Float,
            bits_per_sample: 32,
        }
    }
}

impl fmt::Display for MixFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {} ch, {}{}",
            self.sample_rate, self.channels, self.sample_format, self.bits_per_sample
        )
    }
}
