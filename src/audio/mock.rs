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
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use tracing::{info, span, Level};

use super::{MixCallback, OutputError, OutputSink, OutputStream};
use crate::playsync::CancelHandle;
use crate::samples::EngineConfig;

/// A mock sink. Calls the mix callback once per block period and throws the output away.
#[derive(Clone)]
pub struct MockSink {
    name: String,
    blocks: Arc<AtomicU64>,
}

impl MockSink {
    pub fn new(name: &str) -> MockSink {
        MockSink {
            name: name.to_string(),
            blocks: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of blocks delivered across every stream this sink has opened.
    pub fn blocks_delivered(&self) -> u64 {
        self.blocks.load(Ordering::Relaxed)
    }
}

impl fmt::Display for MockSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}

impl OutputSink for MockSink {
    fn open(
        &self,
        config: &EngineConfig,
        mut callback: MixCallback,
    ) -> Result<Box<dyn OutputStream>, OutputError> {
        let period = config.block_duration();
        let frames = config.block_size;
        let mut buffer = vec![0.0f32; frames * config.channels as usize];

        let cancel = CancelHandle::new();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<()>(1);
        let thread = {
            let cancel = cancel.clone();
            let blocks = self.blocks.clone();
            let name = self.name.clone();
            thread::Builder::new()
                .name("soundpad-mock-output".into())
                .spawn(move || {
                    let span = span!(Level::INFO, "output stream (mock)");
                    let _enter = span.enter();
                    info!(device = name, period = ?period, "Mock output stream started");
                    let _ = ready_tx.send(());

                    // Wait one period between blocks, or until closed.
                    while !cancel.wait_timeout(period) {
                        callback(&mut buffer, frames);
                        blocks.fetch_add(1, Ordering::Relaxed);
                    }
                })
                .map_err(|e| OutputError::StreamFailed(e.to_string()))?
        };

        ready_rx
            .recv()
            .map_err(|_| OutputError::StreamFailed("mock output thread exited".into()))?;

        Ok(Box::new(MockStream {
            name: self.name.clone(),
            cancel,
            thread: Some(thread),
        }))
    }
}

struct MockStream {
    name: String,
    cancel: CancelHandle,
    thread: Option<JoinHandle<()>>,
}

impl OutputStream for MockStream {
    fn close(mut self: Box<Self>) -> Result<(), OutputError> {
        self.cancel.cancel();
        if let Some(thread) = self.thread.take() {
            thread
                .join()
                .map_err(|_| OutputError::StreamFailed("mock output thread panicked".into()))?;
        }
        info!(device = self.name, "Mock output stream closed");
        Ok(())
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    use super::*;
    use crate::samples::{MixingEngine, SoundAsset};
    use crate::testutil::eventually;

    fn fast_config() -> EngineConfig {
        // 1ms blocks.
        EngineConfig::new(48000, 48, 1.0)
    }

    #[test]
    fn test_mock_drives_callback_until_closed() {
        let sink = MockSink::new("mock");
        let calls = Arc::new(AtomicU64::new(0));
        let callback: MixCallback = {
            let calls = calls.clone();
            Box::new(move |output: &mut [f32], frames: usize| {
                assert_eq!(output.len(), frames * 2);
                calls.fetch_add(1, Ordering::Relaxed);
            })
        };

        let stream = sink.open(&fast_config(), callback).unwrap();
        eventually(|| calls.load(Ordering::Relaxed) >= 5, "callback never ran");
        stream.close().unwrap();

        let after_close = calls.load(Ordering::Relaxed);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(calls.load(Ordering::Relaxed), after_close);
        assert_eq!(sink.blocks_delivered(), after_close);
    }

    #[test]
    fn test_mock_drains_engine() {
        let config = fast_config();
        let engine = Arc::new(MixingEngine::new(config));
        let asset = SoundAsset::from_samples("blip.wav", vec![0.5; 480 * 2], 48000);
        engine.play(&asset, 1.0, true);

        let sink = MockSink::new("mock");
        let stream = sink.open(&config, engine.callback()).unwrap();
        eventually(|| !engine.is_playing(), "voice never finished");
        stream.close().unwrap();

        assert_eq!(engine.active_voice_count(), 0);
    }

    #[test]
    fn test_drop_stops_callbacks() {
        let sink = MockSink::new("mock");
        let running = Arc::new(AtomicBool::new(false));
        let callback: MixCallback = {
            let running = running.clone();
            Box::new(move |_: &mut [f32], _: usize| running.store(true, Ordering::Relaxed))
        };

        let stream = sink.open(&fast_config(), callback).unwrap();
        eventually(|| running.load(Ordering::Relaxed), "callback never ran");
        drop(stream);

        let after_drop = sink.blocks_delivered();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(sink.blocks_delivered(), after_drop);
    }
}
