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
    thread::{self, JoinHandle},
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{debug, error, info, span, warn, Level};

use super::thread_priority::{
    callback_thread_priority, configure_audio_thread_priority, rt_audio_enabled,
};
use super::{MixCallback, OutputError, OutputSink, OutputStream};
use crate::playsync::CancelHandle;
use crate::samples::EngineConfig;

/// Name that selects the host's default output device.
const DEFAULT_DEVICE: &str = "default";

/// Summary of an output device, for listing.
#[derive(Clone, Debug)]
pub struct DeviceInfo {
    pub name: String,
    pub host: String,
    pub max_channels: u16,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name, self.max_channels, self.host
        )
    }
}

/// Lists output devices across every available cpal host.
pub fn list_devices() -> Result<Vec<DeviceInfo>, Box<dyn Error>> {
    // Suppress noisy output here.
    let _shh_stdout = shh::stdout()?;
    let _shh_stderr = shh::stderr()?;

    let mut devices = Vec::new();
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
            let Ok(output_configs) = device.supported_output_configs() else {
                continue;
            };
            let max_channels = output_configs.map(|c| c.channels()).max().unwrap_or(0);
            if max_channels == 0 {
                continue;
            }

            devices.push(DeviceInfo {
                name: device.name()?,
                host: host_id.name().to_string(),
                max_channels,
            });
        }
    }

    devices.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(devices)
}

/// Plays through a cpal output device.
pub struct CpalSink {
    name: String,
}

impl CpalSink {
    pub fn new(name: &str) -> CpalSink {
        CpalSink {
            name: name.to_string(),
        }
    }

    /// Finds the named device, falling back to the host default when it isn't found.
    fn find_device(&self) -> Result<cpal::Device, OutputError> {
        let host = cpal::default_host();
        let default = || {
            host.default_output_device()
                .ok_or_else(|| OutputError::DeviceUnavailable("no default output device".into()))
        };

        if self.name == DEFAULT_DEVICE {
            return default();
        }

        let found = {
            let _shh_stderr = shh::stderr().ok();
            host.output_devices()
                .map_err(|e| OutputError::DeviceUnavailable(e.to_string()))?
                .find(|device| {
                    device
                        .name()
                        .is_ok_and(|name| name.trim() == self.name.trim())
                })
        };

        match found {
            Some(device) => Ok(device),
            None => {
                warn!(
                    device = self.name,
                    "Output device not found, falling back to default device"
                );
                default()
            }
        }
    }
}

impl fmt::Display for CpalSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (cpal)", self.name)
    }
}

impl OutputSink for CpalSink {
    fn open(
        &self,
        config: &EngineConfig,
        callback: MixCallback,
    ) -> Result<Box<dyn OutputStream>, OutputError> {
        let device = self.find_device()?;
        let device_name = device.name().unwrap_or_else(|_| self.name.clone());
        let sample_format = device
            .default_output_config()
            .map_err(|e| OutputError::DeviceUnavailable(e.to_string()))?
            .sample_format();

        let stream_config = cpal::StreamConfig {
            channels: config.channels,
            sample_rate: config.sample_rate,
            buffer_size: cpal::BufferSize::Fixed(config.block_size as u32),
        };
        let scratch_len = config.block_size * config.channels as usize;
        let channels = config.channels as usize;

        let cancel = CancelHandle::new();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), OutputError>>(1);

        // The stream is created and dropped on its own thread: cpal streams are not
        // Send on every platform.
        let thread = {
            let cancel = cancel.clone();
            let device_name = device_name.clone();
            thread::Builder::new()
                .name("soundpad-output".into())
                .spawn(move || {
                    let span = span!(Level::INFO, "output stream (cpal)");
                    let _enter = span.enter();

                    let stream = match build_stream(
                        &device,
                        &stream_config,
                        sample_format,
                        channels,
                        scratch_len,
                        callback,
                    ) {
                        Ok(stream) => stream,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                    if let Err(e) = stream.play() {
                        let _ = ready_tx.send(Err(OutputError::StreamFailed(e.to_string())));
                        return;
                    }

                    info!(device = device_name, "Output stream started");
                    if ready_tx.send(Ok(())).is_err() {
                        return;
                    }

                    cancel.wait();
                    drop(stream);
                    debug!(device = device_name, "Output stream dropped");
                })
                .map_err(|e| OutputError::StreamFailed(e.to_string()))?
        };

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(CpalStream {
                device: device_name,
                cancel,
                thread: Some(thread),
            })),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(OutputError::StreamFailed(
                    "output thread exited before the stream started".into(),
                ))
            }
        }
    }
}

fn build_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    channels: usize,
    scratch_len: usize,
    mut callback: MixCallback,
) -> Result<cpal::Stream, OutputError> {
    let priority = callback_thread_priority();
    let rt_audio = rt_audio_enabled();
    let mut priority_set = false;
    let on_error = |err| error!("CPAL output stream error: {}", err);

    let result = match sample_format {
        cpal::SampleFormat::F32 => device.build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                configure_audio_thread_priority(priority, rt_audio, &mut priority_set);
                let frames = data.len() / channels;
                callback(data, frames);
            },
            on_error,
            None,
        ),
        cpal::SampleFormat::I16 => device.build_output_stream(
            config,
            converting_callback::<i16>(callback, channels, scratch_len, priority, rt_audio),
            on_error,
            None,
        ),
        cpal::SampleFormat::I32 => device.build_output_stream(
            config,
            converting_callback::<i32>(callback, channels, scratch_len, priority, rt_audio),
            on_error,
            None,
        ),
        other => {
            return Err(OutputError::UnsupportedFormat(format!("{:?}", other)));
        }
    };

    result.map_err(|e| OutputError::StreamFailed(e.to_string()))
}

/// Integer callback: mix into a preallocated f32 scratch buffer, then convert.
fn converting_callback<T>(
    mut callback: MixCallback,
    channels: usize,
    scratch_len: usize,
    priority: thread_priority::ThreadPriority,
    rt_audio: bool,
) -> impl FnMut(&mut [T], &cpal::OutputCallbackInfo) + Send + 'static
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut scratch = vec![0.0f32; scratch_len];
    let mut priority_set = false;
    move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
        configure_audio_thread_priority(priority, rt_audio, &mut priority_set);
        // Only grows if the host ignores the fixed buffer size.
        if scratch.len() < data.len() {
            scratch.resize(data.len(), 0.0);
        }
        let block = &mut scratch[..data.len()];
        callback(block, data.len() / channels);
        for (dst, &src) in data.iter_mut().zip(block.iter()) {
            *dst = T::from_sample(src);
        }
    }
}

/// A running cpal stream, owned by its output thread.
struct CpalStream {
    device: String,
    cancel: CancelHandle,
    thread: Option<JoinHandle<()>>,
}

impl OutputStream for CpalStream {
    fn close(mut self: Box<Self>) -> Result<(), OutputError> {
        self.cancel.cancel();
        if let Some(thread) = self.thread.take() {
            thread
                .join()
                .map_err(|_| OutputError::StreamFailed("output thread panicked".into()))?;
        }
        info!(device = self.device, "Output stream closed");
        Ok(())
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
