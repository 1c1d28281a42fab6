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
use std::{error::Error, fmt, sync::Arc};

pub mod chain;
pub mod cpal;
pub mod format;
pub mod gain;
pub mod mock;
pub mod render;
pub mod sample_source;

pub use format::{MixFormat, SampleFormat};
pub use gain::Gain;
use sample_source::SampleSource;

/// Errors raised while opening or closing device streams.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("no default output device is available")]
    NoDefault,

    #[error("unable to open {device}: {reason}")]
    Open { device: String, reason: String },

    #[error("timed out opening {0}")]
    OpenTimeout(String),

    #[error("render thread for {0} panicked")]
    RenderThread(String),
}

/// An output endpoint that sessions render into.
pub trait Device: fmt::Display + Send + Sync {
    /// The name the device was resolved by.
    fn name(&self) -> &str;

    /// The shared mix format every chain rendered to this device is converted to.
    fn mix_format(&self) -> MixFormat;

    /// Starts rendering the given chain. The returned handle owns the stream.
    fn open(&self, source: Box<dyn SampleSource>) -> Result<Box<dyn OutputHandle>, DeviceError>;
}

/// A running render stream on one device.
pub trait OutputHandle: Send {
    /// Returns true once the chain has been exhausted and only silence is being written.
    fn is_finished(&self) -> bool;

    /// Stops the stream and releases the device. Blocks until the render thread exits.
    fn close(self: Box<Self>) -> Result<(), DeviceError>;
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, Box<dyn Error>> {
    cpal::Device::list()
}

/// Gets a device with the given name. Empty or unknown names resolve to the default output.
pub fn get_device(name: Option<&str>) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    let name = name.map(str::trim).unwrap_or_default();
    if name.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(name)));
    };

    Ok(Arc::new(cpal::Device::get(name)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_mock_device() {
        let device = get_device(Some(" mock-headphones ")).unwrap();
        assert_eq!("mock-headphones", device.name());
        assert_eq!(MixFormat::default(), device.mix_format());
    }
}
