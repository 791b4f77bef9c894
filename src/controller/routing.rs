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
use std::error::Error;

use tracing::info;

/// Creating virtual devices and routing streams belongs to the host audio server.
/// The soundboard only ever needs to mute the real microphones while a sound plays,
/// and unmute them afterwards.
pub trait DeviceManager: Send + Sync {
    fn set_real_mics_muted(&self, muted: bool) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// A device manager that only logs what it was asked to do.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingDeviceManager;

impl DeviceManager for LoggingDeviceManager {
    fn set_real_mics_muted(&self, muted: bool) -> Result<(), Box<dyn Error + Send + Sync>> {
        info!(muted, "Real microphones mute requested");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test {
    use parking_lot::Mutex;

    use super::*;

    /// Remembers every mute request, optionally failing them.
    #[derive(Default)]
    pub struct RecordingDeviceManager {
        pub requests: Mutex<Vec<bool>>,
        pub fail: bool,
    }

    impl DeviceManager for RecordingDeviceManager {
        fn set_real_mics_muted(&self, muted: bool) -> Result<(), Box<dyn Error + Send + Sync>> {
            self.requests.lock().push(muted);
            if self.fail {
                return Err("audio server unreachable".into());
            }
            Ok(())
        }
    }
}
