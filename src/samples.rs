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

//! In-memory sample playback.
//!
//! This module provides:
//! - Decoding and caching of sound files (`SampleStore`)
//! - Load-time conversion to the engine's stereo format and sample rate
//! - Polyphonic mixing with per-voice transport control (`MixingEngine`)

mod decode;
mod engine;
mod error;
mod resample;
mod store;
mod voice;

/// Channel count of every asset and of the engine's output. Fixed at stereo.
pub const ENGINE_CHANNELS: u16 = 2;

pub use engine::{EngineConfig, MixingEngine};
pub use error::DecodeError;
pub use store::{SampleStore, SoundAsset};
pub use voice::{clamp_gain, VoiceId, VoiceState, MAX_GAIN, MIN_GAIN};
