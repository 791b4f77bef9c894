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

//! A single in-flight playback of a sound asset.

use std::fmt;
use std::sync::Arc;

use super::store::SoundAsset;
use super::ENGINE_CHANNELS;

/// Minimum per-voice and master gain.
pub const MIN_GAIN: f32 = 0.0;
/// Maximum per-voice and master gain.
pub const MAX_GAIN: f32 = 2.0;

/// Clamps a gain into the supported range. NaN becomes silence.
pub fn clamp_gain(gain: f32) -> f32 {
    if gain.is_nan() {
        MIN_GAIN
    } else {
        gain.clamp(MIN_GAIN, MAX_GAIN)
    }
}

/// Opaque handle to a voice. Looking one up after the voice has finished or been
/// stopped yields nothing; it never refers to a different voice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VoiceId(u64);

impl VoiceId {
    pub(crate) fn new(id: u64) -> Self {
        VoiceId(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "voice#{}", self.0)
    }
}

/// Observable state of a live voice. Finished and stopped voices are removed from the
/// engine, so they have no state to observe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoiceState {
    Playing,
    Paused,
}

/// Represents an active voice playing a sample.
pub struct Voice {
    /// Unique ID for this voice.
    id: VoiceId,
    /// Shared, immutable sample data.
    data: Arc<[f32]>,
    /// Read position in frames. Never exceeds the frame count.
    cursor: usize,
    /// Total frames in `data`.
    frames: usize,
    /// Per-voice gain in [0, 2].
    gain: f32,
    paused: bool,
}

impl Voice {
    /// Creates a new voice positioned at the start of the asset.
    pub fn new(id: VoiceId, asset: &SoundAsset, gain: f32) -> Self {
        Self {
            id,
            data: asset.shared_data(),
            cursor: 0,
            frames: asset.frames(),
            gain: clamp_gain(gain),
            paused: false,
        }
    }

    pub fn id(&self) -> VoiceId {
        self.id
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.gain = clamp_gain(gain);
    }

    pub fn state(&self) -> VoiceState {
        if self.paused {
            VoiceState::Paused
        } else {
            VoiceState::Playing
        }
    }

    /// Flips the paused flag, returning true if the voice is now paused.
    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }

    /// True once every frame has been rendered.
    pub fn is_finished(&self) -> bool {
        self.cursor >= self.frames
    }

    /// Accumulates up to `frames` frames of this voice into `output` (interleaved
    /// stereo), scaled by the voice gain times `master_gain`, and advances the cursor.
    /// Paused voices contribute nothing and do not move. Returns the frames rendered.
    pub fn render_into(&mut self, output: &mut [f32], frames: usize, master_gain: f32) -> usize {
        if self.paused {
            return 0;
        }

        let channels = ENGINE_CHANNELS as usize;
        let to_copy = frames
            .min(self.frames - self.cursor)
            .min(output.len() / channels);
        if to_copy == 0 {
            return 0;
        }

        let gain = self.gain * master_gain;
        let start = self.cursor * channels;
        let source = &self.data[start..start + to_copy * channels];
        for (out, &sample) in output.iter_mut().zip(source) {
            *out += sample * gain;
        }

        self.cursor += to_copy;
        to_copy
    }
}

impl fmt::Debug for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Voice")
            .field("id", &self.id)
            .field("cursor", &self.cursor)
            .field("frames", &self.frames)
            .field("gain", &self.gain)
            .field("paused", &self.paused)
            .finish()
    }
}
