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
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::error::ConfigError;
use crate::controller::SoundSlot;

/// File extensions offered when scanning a directory for sounds.
pub const SOUND_EXTENSIONS: &[&str] = &["wav", "mp3", "ogg", "flac", "opus", "m4a", "aac"];

/// A YAML representation of one sound on the board.
#[derive(Deserialize, Clone, Debug)]
pub struct Sound {
    /// The sound file. Relative paths are relative to the config file.
    file: String,

    /// Display name (default: the file stem).
    name: Option<String>,

    /// Chord that plays the sound, e.g. "ctrl+1".
    hotkey: Option<String>,

    /// Per-sound volume in [0, 2] (default: 1.0).
    volume: Option<f32>,
}

impl Sound {
    /// Returns the sound file resolved against `base_dir`.
    pub fn path(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.file)
    }

    /// Converts this into a board slot.
    pub fn to_slot(&self, base_dir: &Path) -> SoundSlot {
        let mut slot = SoundSlot::new(self.path(base_dir));
        if let Some(name) = self.name.as_deref().filter(|name| !name.trim().is_empty()) {
            slot.name = name.to_string();
        }
        if let Some(hotkey) = self.hotkey.as_deref().filter(|hotkey| !hotkey.trim().is_empty()) {
            slot = slot.with_hotkey(hotkey);
        }
        if let Some(volume) = self.volume {
            slot = slot.with_volume(volume);
        }
        slot
    }
}

/// Lists the playable sound files directly inside `dir`, sorted by path.
pub fn scan_sounds(dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let mut sounds = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let playable = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                SOUND_EXTENSIONS
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            });
        if playable {
            sounds.push(path);
        }
    }
    sounds.sort();
    Ok(sounds)
}
