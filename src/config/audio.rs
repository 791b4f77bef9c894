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
use serde::Deserialize;

use crate::samples::{clamp_gain, EngineConfig};

const DEFAULT_DEVICE: &str = "default";
const DEFAULT_SAMPLE_RATE: u32 = 48000;
const DEFAULT_BLOCK_SIZE: usize = 2048;
const DEFAULT_MASTER_VOLUME: f32 = 1.0;

/// A YAML representation of the audio configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Audio {
    /// The output device: "default", a cpal device name, or a name starting with "mock".
    device: Option<String>,

    /// Engine sample rate in Hz (default: 48000).
    sample_rate: Option<u32>,

    /// Frames per mix block (default: 2048).
    block_size: Option<usize>,

    /// Master volume in [0, 2] (default: 1.0).
    master_volume: Option<f32>,
}

impl Audio {
    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        self.device.as_deref().unwrap_or(DEFAULT_DEVICE)
    }

    /// Returns the engine sample rate (default: 48000).
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
            .filter(|rate| *rate > 0)
            .unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Returns the mix block size in frames (default: 2048).
    pub fn block_size(&self) -> usize {
        self.block_size
            .filter(|size| *size > 0)
            .unwrap_or(DEFAULT_BLOCK_SIZE)
    }

    /// Returns the master volume, clamped to [0, 2] (default: 1.0).
    pub fn master_volume(&self) -> f32 {
        clamp_gain(self.master_volume.unwrap_or(DEFAULT_MASTER_VOLUME))
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::new(self.sample_rate(), self.block_size(), self.master_volume())
    }
}

#[cfg(test)]
mod test {
    use config::{Config, File, FileFormat};

    use super::*;

    #[test]
    fn test_defaults() {
        let audio = Audio::default();
        assert_eq!(audio.device(), "default");
        assert_eq!(audio.sample_rate(), 48000);
        assert_eq!(audio.block_size(), 2048);
        assert_eq!(audio.master_volume(), 1.0);
        assert_eq!(audio.engine_config(), EngineConfig::default());
    }

    #[test]
    fn test_audio_deserialize() {
        let yaml = r#"
            device: mock-device
            sample_rate: 44100
            block_size: 512
            master_volume: 3.5
        "#;

        let audio: Audio = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(audio.device(), "mock-device");
        let engine = audio.engine_config();
        assert_eq!(engine.sample_rate, 44100);
        assert_eq!(engine.block_size, 512);
        assert_eq!(engine.channels, 2);
        assert_eq!(engine.master_gain, 2.0);
    }

    #[test]
    fn test_zero_values_fall_back() {
        let yaml = r#"
            sample_rate: 0
            block_size: 0
        "#;

        let audio: Audio = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(audio.sample_rate(), 48000);
        assert_eq!(audio.block_size(), 2048);
    }
}
