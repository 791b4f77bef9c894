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

//! Polyphonic mixing engine: owns the active voice table and renders output blocks.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use super::store::SoundAsset;
use super::voice::{clamp_gain, Voice, VoiceId, VoiceState};
use super::ENGINE_CHANNELS;
use crate::audio::MixCallback;

/// Initial capacity of the voice table, so play() rarely reallocates.
const VOICE_TABLE_CAPACITY: usize = 64;

/// Engine-wide audio settings. Everything but the master gain is fixed at construction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineConfig {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Output channel count. Always 2.
    pub channels: u16,
    /// Frames per mix block.
    pub block_size: usize,
    /// Initial master gain in [0, 2].
    pub master_gain: f32,
}

impl EngineConfig {
    /// Creates a stereo engine configuration.
    pub fn new(sample_rate: u32, block_size: usize, master_gain: f32) -> Self {
        Self {
            sample_rate,
            channels: ENGINE_CHANNELS,
            block_size,
            master_gain: clamp_gain(master_gain),
        }
    }

    /// Duration of one mix block.
    pub fn block_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.block_size as f64 / self.sample_rate as f64)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig::new(48000, 2048, 1.0)
    }
}

/// Mixes any number of voices into one stereo stream.
///
/// The voice table is the only state shared between callers and the output device's
/// callback thread, and it lives behind a single mutex. The callback holds it only
/// while accumulating already-resident samples: no I/O, no allocation.
///
/// Summed output is not limited or clipped. Several loud voices can push samples past
/// [-1, 1]; what happens then is up to the output device.
pub struct MixingEngine {
    config: EngineConfig,
    /// Active voices.
    voices: Mutex<Vec<Voice>>,
    /// Master gain stored as f32 bits.
    master_gain: AtomicU32,
    /// Source of voice IDs.
    next_voice_id: AtomicU64,
    /// Whether the table was non-empty at last check.
    playing: AtomicBool,
    /// Cleared by shutdown(); the mix callback renders silence afterwards.
    accepting: AtomicBool,
}

impl MixingEngine {
    /// Creates a new mixing engine.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            voices: Mutex::new(Vec::with_capacity(VOICE_TABLE_CAPACITY)),
            master_gain: AtomicU32::new(clamp_gain(config.master_gain).to_bits()),
            next_voice_id: AtomicU64::new(1),
            playing: AtomicBool::new(false),
            accepting: AtomicBool::new(true),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Starts playing an asset and returns the new voice's ID. When `overlap` is false
    /// every other voice is removed in the same critical section, so the mix callback
    /// never sees a partially cleared table.
    pub fn play(&self, asset: &SoundAsset, gain: f32, overlap: bool) -> VoiceId {
        let id = VoiceId::new(self.next_voice_id.fetch_add(1, Ordering::Relaxed));
        let voice = Voice::new(id, asset, gain);

        let mut voices = self.voices.lock();
        let replaced = if overlap {
            0
        } else {
            let count = voices.len();
            voices.clear();
            count
        };
        voices.push(voice);
        self.playing.store(true, Ordering::Relaxed);
        drop(voices);

        debug!(
            voice = %id,
            path = ?asset.path(),
            gain,
            overlap,
            replaced,
            "Voice started"
        );
        id
    }

    /// Updates a live voice's gain. Returns false if the voice is gone.
    pub fn set_voice_gain(&self, id: VoiceId, gain: f32) -> bool {
        self.with_voice(id, |voice| voice.set_gain(gain)).is_some()
    }

    /// Flips a live voice between playing and paused, returning the new paused state.
    /// Unknown voices report false.
    pub fn toggle_pause(&self, id: VoiceId) -> bool {
        self.with_voice(id, |voice| voice.toggle_pause()).unwrap_or(false)
    }

    /// Removes a voice immediately. Returns false if it had already finished.
    pub fn stop(&self, id: VoiceId) -> bool {
        let mut voices = self.voices.lock();
        let before = voices.len();
        voices.retain(|voice| voice.id() != id);
        let removed = voices.len() != before;
        self.playing.store(!voices.is_empty(), Ordering::Relaxed);
        drop(voices);

        if removed {
            debug!(voice = %id, "Voice stopped");
        }
        removed
    }

    /// Removes every voice. Returns how many were removed.
    pub fn stop_all(&self) -> usize {
        let mut voices = self.voices.lock();
        let stopped = voices.len();
        voices.clear();
        self.playing.store(false, Ordering::Relaxed);
        drop(voices);

        if stopped > 0 {
            info!(stopped, "All voices stopped");
        }
        stopped
    }

    /// Sets the master gain, clamped to [0, 2].
    pub fn set_master_gain(&self, gain: f32) {
        self.master_gain.store(clamp_gain(gain).to_bits(), Ordering::Relaxed);
    }

    pub fn master_gain(&self) -> f32 {
        f32::from_bits(self.master_gain.load(Ordering::Relaxed))
    }

    /// Whether any voice was active at last check.
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    pub fn active_voice_count(&self) -> usize {
        self.voices.lock().len()
    }

    /// State of a live voice, or None once it has finished or been stopped.
    pub fn voice_state(&self, id: VoiceId) -> Option<VoiceState> {
        self.with_voice(id, |voice| voice.state())
    }

    /// Frame cursor of a live voice.
    pub fn voice_position(&self, id: VoiceId) -> Option<usize> {
        self.with_voice(id, |voice| voice.cursor())
    }

    /// Renders one block of `frames` interleaved stereo frames into `output`.
    ///
    /// The block starts silent; every playing voice adds `gain * master` times its next
    /// samples and advances. Voices that reach their end are dropped afterwards.
    pub fn mix(&self, output: &mut [f32], frames: usize) {
        output.fill(0.0);
        if !self.accepting.load(Ordering::Acquire) {
            return;
        }

        let frames = frames.min(output.len() / ENGINE_CHANNELS as usize);
        let master = self.master_gain();

        let mut voices = self.voices.lock();
        for voice in voices.iter_mut() {
            voice.render_into(output, frames, master);
        }
        voices.retain(|voice| !voice.is_finished());
        self.playing.store(!voices.is_empty(), Ordering::Relaxed);
    }

    /// Produces a callback suitable for an output sink.
    pub fn callback(self: &Arc<Self>) -> MixCallback {
        let engine = self.clone();
        Box::new(move |output: &mut [f32], frames: usize| engine.mix(output, frames))
    }

    /// Stops accepting mix callbacks and then tears down the voice table. Call after
    /// the output stream has been closed.
    pub fn shutdown(&self) {
        self.accepting.store(false, Ordering::Release);
        let stopped = self.stop_all();
        info!(stopped, "Mixing engine shut down");
    }

    fn with_voice<T>(&self, id: VoiceId, f: impl FnOnce(&mut Voice) -> T) -> Option<T> {
        self.voices
            .lock()
            .iter_mut()
            .find(|voice| voice.id() == id)
            .map(f)
    }
}

impl std::fmt::Debug for MixingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MixingEngine")
            .field("config", &self.config)
            .field("active_voices", &self.active_voice_count())
            .field("master_gain", &self.master_gain())
            .finish()
    }
}
