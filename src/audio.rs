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

//! Output-device sinks. A sink opens a stream that calls the engine's mix callback
//! once per block until the stream is closed.

use std::{error::Error, fmt, sync::Arc};

use crate::samples::EngineConfig;

pub mod cpal;
pub mod mock;
pub mod thread_priority;

/// Renders one block of interleaved stereo: `(output, frames)`.
pub type MixCallback = Box<dyn FnMut(&mut [f32], usize) + Send>;

/// Errors raised while opening or running an output stream.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("output device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),

    #[error("output stream failed: {0}")]
    StreamFailed(String),
}

/// Something that can deliver periodic mix callbacks to an output device.
pub trait OutputSink: fmt::Display + Send + Sync {
    /// Opens a stream at the engine's rate and block size. The callback starts being
    /// invoked once this returns successfully.
    fn open(
        &self,
        config: &EngineConfig,
        callback: MixCallback,
    ) -> Result<Box<dyn OutputStream>, OutputError>;
}

/// An open output stream.
pub trait OutputStream: Send {
    /// Stops callbacks and releases the device. No callback runs after this returns.
    fn close(self: Box<Self>) -> Result<(), OutputError>;
}

/// Gets the sink for the given device name. Names starting with "mock" produce a
/// headless sink.
pub fn get_sink(device: &str) -> Arc<dyn OutputSink> {
    if device.starts_with("mock") {
        return Arc::new(mock::MockSink::new(device));
    }
    Arc::new(cpal::CpalSink::new(device))
}

/// Lists output devices known to cpal.
pub fn list_devices() -> Result<Vec<cpal::DeviceInfo>, Box<dyn Error>> {
    cpal::list_devices()
}
