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
use std::{
    error::Error,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{debug, error, warn};

use super::format::{MixFormat, SampleFormat};
use super::render::FrameWriter;
use super::sample_source::SampleSource;
use super::{DeviceError, OutputHandle};

/// How long to wait for a render thread to report that its stream is running.
const OPEN_TIMEOUT: Duration = Duration::from_secs(2);

/// A small wrapper around a cpal::Device that remembers its shared mix format.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
    /// The default stream configuration of the device.
    stream_config: cpal::StreamConfig,
    /// The native sample format of the default configuration.
    native_format: cpal::SampleFormat,
    /// The mix format chains are converted to.
    mix_format: MixFormat,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) ({})",
            self.name,
            self.mix_format,
            self.host_id.name()
        )
    }
}

impl Device {
    /// Lists cpal output devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn super::Device>>, Box<dyn Error>> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn super::Device> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal output devices that have a usable default configuration.
    fn list_cpal_devices() -> Result<Vec<Device>, Box<dyn Error>> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.output_devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let name = match device.name() {
                    Ok(name) => name,
                    Err(_) => continue,
                };
                match Device::from_cpal(name, host_id, device) {
                    Ok(device) => devices.push(device),
                    Err(e) => debug!(err = e.to_string(), "Skipping output device"),
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    fn from_cpal(
        name: String,
        host_id: cpal::HostId,
        device: cpal::Device,
    ) -> Result<Device, Box<dyn Error>> {
        let supported = device.default_output_config()?;
        let native_format = supported.sample_format();
        let (sample_format, bits_per_sample) = match native_format {
            cpal::SampleFormat::F32 => (SampleFormat::Float, 32),
            cpal::SampleFormat::F64 => (SampleFormat::Float, 64),
            cpal::SampleFormat::I8 | cpal::SampleFormat::U8 => (SampleFormat::Int, 8),
            cpal::SampleFormat::I16 | cpal::SampleFormat::U16 => (SampleFormat::Int, 16),
            cpal::SampleFormat::I32 | cpal::SampleFormat::U32 => (SampleFormat::Int, 32),
            other => return Err(format!("unsupported sample format {}", other).into()),
        };
        let mix_format = MixFormat::new(
            supported.sample_rate().0,
            supported.channels(),
            sample_format,
            bits_per_sample,
        )?;

        Ok(Device {
            name,
            host_id,
            device,
            stream_config: supported.config(),
            native_format,
            mix_format,
        })
    }

    /// Gets the given cpal device, falling back to the host's default output when the name is
    /// empty or no longer matches a device.
    pub fn get(name: &str) -> Result<Device, Box<dyn Error>> {
        if !name.is_empty() {
            if let Some(device) = Device::list_cpal_devices()?
                .into_iter()
                .find(|device| device.name.trim() == name)
            {
                return Ok(device);
            }
            warn!(device = name, "Output device not found, using the default output");
        }

        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(DeviceError::NoDefault)?;
        let name = device.name().unwrap_or_else(|_| "default".to_string());
        Device::from_cpal(name, host.id(), device)
    }
}

impl super::Device for Device {
    fn name(&self) -> &str {
        &self.name
    }

    fn mix_format(&self) -> MixFormat {
        self.mix_format
    }

    fn open(&self, source: Box<dyn SampleSource>) -> Result<Box<dyn OutputHandle>, DeviceError> {
        let finished = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);
        let (close_tx, close_rx) = crossbeam_channel::bounded::<()>(1);

        let device = self.device.clone();
        let config = self.stream_config.clone();
        let native_format = self.native_format;
        let writer = FrameWriter::new(source, config.channels, finished.clone());
        let name = self.name.clone();

        // cpal streams aren't Send, so each one lives on its own thread until it is closed.
        let thread = thread::Builder::new()
            .name(format!("keycue-render-{}", self.name))
            .spawn(move || {
                let stream = match build_stream(&device, &config, native_format, writer, &name) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(e.to_string()));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                // Returns when close is requested or the handle is dropped.
                let _ = close_rx.recv();
                drop(stream);
            })
            .map_err(|e| DeviceError::Open {
                device: self.name.clone(),
                reason: e.to_string(),
            })?;

        match ready_rx.recv_timeout(OPEN_TIMEOUT) {
            Ok(Ok(())) => Ok(Box::new(Output {
                name: self.name.clone(),
                finished,
                close_tx,
                thread,
            })),
            Ok(Err(reason)) => {
                let _ = thread.join();
                Err(DeviceError::Open {
                    device: self.name.clone(),
                    reason,
                })
            }
            Err(_) => {
                // Dropping the close sender releases the thread if the stream ever comes up.
                drop(close_tx);
                Err(DeviceError::OpenTimeout(self.name.clone()))
            }
        }
    }
}

fn build_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    format: cpal::SampleFormat,
    writer: FrameWriter,
    name: &str,
) -> Result<cpal::Stream, cpal::BuildStreamError> {
    match format {
        cpal::SampleFormat::F32 => build_typed_stream::<f32>(device, config, writer, name),
        cpal::SampleFormat::F64 => build_typed_stream::<f64>(device, config, writer, name),
        cpal::SampleFormat::I8 => build_typed_stream::<i8>(device, config, writer, name),
        cpal::SampleFormat::I16 => build_typed_stream::<i16>(device, config, writer, name),
        cpal::SampleFormat::I32 => build_typed_stream::<i32>(device, config, writer, name),
        cpal::SampleFormat::U8 => build_typed_stream::<u8>(device, config, writer, name),
        cpal::SampleFormat::U16 => build_typed_stream::<u16>(device, config, writer, name),
        cpal::SampleFormat::U32 => build_typed_stream::<u32>(device, config, writer, name),
        _ => Err(cpal::BuildStreamError::StreamConfigNotSupported),
    }
}

fn build_typed_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut writer: FrameWriter,
    name: &str,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let name = name.to_string();
    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            writer.fill(data, |s| T::from_sample_(s));
        },
        move |err| error!(device = name, err = err.to_string(), "Output stream error"),
        None,
    )
}

/// A stream running on a dedicated render thread.
struct Output {
    name: String,
    finished: Arc<AtomicBool>,
    close_tx: crossbeam_channel::Sender<()>,
    thread: thread::JoinHandle<()>,
}

impl OutputHandle for Output {
    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }

    fn close(self: Box<Self>) -> Result<(), DeviceError> {
        let Output {
            name,
            close_tx,
            thread,
            ..
        } = *self;
        let _ = close_tx.send(());
        thread.join().map_err(|_| DeviceError::RenderThread(name))
    }
}
