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
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, File};
use duration_string::DurationString;
use serde::Deserialize;

use super::audio::Audio;
use super::error::ConfigError;
use super::sound::Sound;
use crate::controller::{BoardSettings, SoundSlot};

const DEFAULT_CAPTURE_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);
const DEFAULT_EVENT_QUEUE_SIZE: usize = 64;

/// The configuration for a sound board.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Board {
    /// Output device and engine settings.
    audio: Option<Audio>,

    /// Let sounds play over each other (default: true).
    overlap_audio: Option<bool>,

    /// Mute the real microphones while sounds play (default: true).
    mute_mic_while_playing: Option<bool>,

    /// How long to wait for key capture to stop on exit (default: 1s).
    capture_shutdown_timeout: Option<String>,

    /// Capacity of the chord event queue (default: 64).
    event_queue_size: Option<usize>,

    /// The sounds on the board.
    #[serde(default)]
    sounds: Vec<Sound>,

    /// Directory that relative sound paths are resolved against.
    #[serde(skip)]
    base_dir: PathBuf,
}

impl Board {
    /// Parse a board from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Board, ConfigError> {
        let mut board = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Board>()?;
        board.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(board)
    }

    pub fn audio(&self) -> Audio {
        self.audio.clone().unwrap_or_default()
    }

    pub fn settings(&self) -> BoardSettings {
        let defaults = BoardSettings::default();
        BoardSettings {
            overlap: self.overlap_audio.unwrap_or(defaults.overlap),
            mute_mic_while_playing: self
                .mute_mic_while_playing
                .unwrap_or(defaults.mute_mic_while_playing),
        }
    }

    /// Returns the capture shutdown timeout (default: 1s).
    pub fn capture_shutdown_timeout(&self) -> Result<Duration, ConfigError> {
        match &self.capture_shutdown_timeout {
            Some(timeout) => Ok(DurationString::from_string(timeout.clone())
                .map_err(|e| ConfigError::InvalidValue {
                    field: "capture_shutdown_timeout",
                    reason: e.to_string(),
                })?
                .into()),
            None => Ok(DEFAULT_CAPTURE_SHUTDOWN_TIMEOUT),
        }
    }

    /// Returns the chord event queue capacity (default: 64).
    pub fn event_queue_size(&self) -> usize {
        self.event_queue_size
            .filter(|size| *size > 0)
            .unwrap_or(DEFAULT_EVENT_QUEUE_SIZE)
    }

    /// The configured sounds as board slots, with paths resolved.
    pub fn slots(&self) -> Vec<SoundSlot> {
        self.sounds
            .iter()
            .map(|sound| sound.to_slot(&self.base_dir))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use config::FileFormat;

    use super::*;

    #[test]
    fn test_board_deserialize() {
        let yaml = r#"
            audio:
              device: mock
              block_size: 256
            overlap_audio: false
            capture_shutdown_timeout: 250ms
            event_queue_size: 8
            sounds:
              - file: horn.wav
                hotkey: ctrl+1
              - file: /abs/boing.mp3
                volume: 1.5
        "#;

        let board: Board = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(board.audio().device(), "mock");
        assert_eq!(board.audio().block_size(), 256);
        assert_eq!(
            board.settings(),
            BoardSettings {
                overlap: false,
                mute_mic_while_playing: true,
            }
        );
        assert_eq!(
            board.capture_shutdown_timeout().unwrap(),
            Duration::from_millis(250)
        );
        assert_eq!(board.event_queue_size(), 8);

        let slots = board.slots();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].name, "horn");
        assert_eq!(slots[1].volume, 1.5);
    }

    #[test]
    fn test_empty_board_uses_defaults() {
        let board: Board = Config::builder()
            .add_source(File::from_str("{}", FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(board.audio().device(), "default");
        assert_eq!(board.settings(), BoardSettings::default());
        assert_eq!(board.capture_shutdown_timeout().unwrap(), Duration::from_secs(1));
        assert_eq!(board.event_queue_size(), 64);
        assert!(board.slots().is_empty());
    }

    #[test]
    fn test_bad_duration_is_reported() {
        let board: Board = Config::builder()
            .add_source(File::from_str(
                "capture_shutdown_timeout: soon",
                FileFormat::Yaml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert!(matches!(
            board.capture_shutdown_timeout(),
            Err(ConfigError::InvalidValue {
                field: "capture_shutdown_timeout",
                ..
            })
        ));
    }

    #[test]
    fn test_relative_paths_follow_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.yaml");
        fs::write(&path, "sounds:\n  - file: clips/horn.wav\n").unwrap();

        let board = Board::deserialize(&path).unwrap();
        assert_eq!(board.slots()[0].path, dir.path().join("clips/horn.wav"));
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let result = Board::deserialize(Path::new("/no/such/board.yaml"));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }
}
