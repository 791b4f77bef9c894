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

//! Sample loading and caching.
//!
//! Sounds are decoded, converted to stereo and resampled to the engine rate exactly
//! once per path, then held in memory so triggering them never touches the disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, info};

use super::decode::{decode_file, to_stereo};
use super::error::DecodeError;
use super::resample::resample_interleaved;
use super::ENGINE_CHANNELS;

/// A decoded sound, ready to mix: interleaved stereo f32 at the engine sample rate.
///
/// The sample data is immutable and reference counted, so handing an asset to a voice
/// or to another caller never copies it and nobody can modify the cached buffer.
#[derive(Clone)]
pub struct SoundAsset {
    /// The file this asset was decoded from.
    path: Arc<Path>,
    /// Interleaved samples.
    data: Arc<[f32]>,
    /// Sample rate of the data (always the engine rate).
    sample_rate: u32,
}

impl SoundAsset {
    /// Wraps already-prepared interleaved stereo samples.
    pub fn from_samples(path: impl AsRef<Path>, samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            path: Arc::from(path.as_ref()),
            data: Arc::from(samples),
            sample_rate,
        }
    }

    /// The source path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Interleaved sample data.
    pub fn samples(&self) -> &[f32] {
        &self.data
    }

    /// Number of channels in the data.
    pub fn channels(&self) -> u16 {
        ENGINE_CHANNELS
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.data.len() / ENGINE_CHANNELS as usize
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }

    pub(crate) fn shared_data(&self) -> Arc<[f32]> {
        self.data.clone()
    }
}

impl std::fmt::Debug for SoundAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundAsset")
            .field("path", &self.path)
            .field("frames", &self.frames())
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

/// Loads and caches sound assets by path.
///
/// Decoding happens outside the cache lock, so loads of different files proceed in
/// parallel. Two threads racing to load the same uncached file may both decode it; the
/// second insert simply replaces the first with identical data.
pub struct SampleStore {
    /// Cache of loaded assets by file path.
    cache: RwLock<HashMap<PathBuf, SoundAsset>>,
    /// Target sample rate (matches the engine).
    target_sample_rate: u32,
    /// Number of decodes performed over the store's lifetime.
    decodes: AtomicU64,
}

impl SampleStore {
    /// Creates a new sample store producing assets at the given sample rate.
    pub fn new(target_sample_rate: u32) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            target_sample_rate,
            decodes: AtomicU64::new(0),
        }
    }

    /// Loads a sound from a file, returning the cached asset if it was loaded before.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<SoundAsset, DecodeError> {
        let path = path.as_ref();
        if let Some(asset) = self.cache.read().get(path) {
            debug!(path = ?path, "Using cached sample");
            return Ok(asset.clone());
        }

        info!(path = ?path, "Loading sample into memory");
        self.decodes.fetch_add(1, Ordering::Relaxed);

        let decoded = decode_file(path)?;
        let source_rate = decoded.sample_rate;
        let source_channels = decoded.channels;
        let source_frames = decoded.frames();
        let stereo = to_stereo(decoded.samples, source_channels);

        let samples = if source_rate != self.target_sample_rate {
            info!(
                source_rate,
                target_rate = self.target_sample_rate,
                "Resampling sample"
            );
            resample_interleaved(
                &stereo,
                ENGINE_CHANNELS as usize,
                source_rate,
                self.target_sample_rate,
            )
            .map_err(|reason| DecodeError::Resample {
                path: path.to_path_buf(),
                from: source_rate,
                to: self.target_sample_rate,
                reason,
            })?
        } else {
            stereo
        };

        let asset = SoundAsset::from_samples(path, samples, self.target_sample_rate);

        info!(
            path = ?path,
            source_channels,
            source_frames,
            frames = asset.frames(),
            duration_ms = asset.duration().as_millis(),
            memory_kb = asset.memory_size() / 1024,
            "Sample loaded"
        );

        self.cache.write().insert(path.to_path_buf(), asset.clone());
        Ok(asset)
    }

    /// Drops every cached asset. Voices already playing keep their own reference to
    /// the data and are unaffected.
    pub fn clear(&self) {
        let mut cache = self.cache.write();
        let cleared = cache.len();
        cache.clear();
        info!(cleared, "Sample cache cleared");
    }

    /// Returns true if the path is currently cached.
    pub fn is_cached(&self, path: impl AsRef<Path>) -> bool {
        self.cache.read().contains_key(path.as_ref())
    }

    /// Number of cached assets.
    pub fn cached_count(&self) -> usize {
        self.cache.read().len()
    }

    /// Number of file decodes performed so far.
    pub fn decode_count(&self) -> u64 {
        self.decodes.load(Ordering::Relaxed)
    }

    /// Returns the total memory used by cached assets.
    pub fn memory_usage(&self) -> usize {
        self.cache.read().values().map(|a| a.memory_size()).sum()
    }

    pub fn sample_rate(&self) -> u32 {
        self.target_sample_rate
    }
}

impl std::fmt::Debug for SampleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleStore")
            .field("cached_samples", &self.cached_count())
            .field("target_sample_rate", &self.target_sample_rate)
            .field("total_memory_kb", &(self.memory_usage() / 1024))
            .finish()
    }
}
