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
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tokio::task::{JoinError, JoinHandle};
use tracing::{info, span, Level};

use crate::chord::ChordEvent;

pub mod board;
pub mod routing;
pub mod shutdown;

pub use board::{display_name, BoardError, BoardSettings, SoundBoard, SoundSlot};
pub use routing::{DeviceManager, LoggingDeviceManager};
pub use shutdown::{ShutdownReport, ShutdownSequence};

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("controller did not stop within {0:?}")]
    StopTimeout(Duration),

    #[error("controller task failed: {0}")]
    Join(#[from] JoinError),
}

/// Routes chord events to the sound board on a blocking task.
pub struct Controller {
    board: Arc<SoundBoard>,
    /// Dropped to tell the event loop to stop.
    stop: Option<Sender<()>>,
    /// Disconnects when the event loop exits.
    done: Receiver<()>,
    handle: Option<JoinHandle<()>>,
}

impl Controller {
    /// Starts the event loop. Must be called from within a tokio runtime.
    pub fn spawn(board: Arc<SoundBoard>, events: Receiver<ChordEvent>) -> Controller {
        let (stop, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let (done_tx, done) = crossbeam_channel::bounded::<()>(0);
        let handle = {
            let board = board.clone();
            tokio::task::spawn_blocking(move || {
                let _done = done_tx;
                Controller::route_events(&board, &events, &stop_rx);
            })
        };

        Controller {
            board,
            stop: Some(stop),
            done,
            handle: Some(handle),
        }
    }

    pub fn board(&self) -> &Arc<SoundBoard> {
        &self.board
    }

    /// Tells the event loop to stop and waits at most `timeout` for it to exit.
    pub fn stop(&mut self, timeout: Duration) -> Result<(), ControllerError> {
        self.stop.take();
        match self.done.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => Err(ControllerError::StopTimeout(timeout)),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => Ok(()),
        }
    }

    /// Join will block until the controller finishes.
    pub async fn join(&mut self) -> Result<(), ControllerError> {
        if let Some(handle) = self.handle.take() {
            handle.await?;
        }
        Ok(())
    }

    fn route_events(board: &SoundBoard, events: &Receiver<ChordEvent>, stop: &Receiver<()>) {
        let span = span!(Level::INFO, "controller");
        let _enter = span.enter();

        info!("Controller started.");
        loop {
            crossbeam_channel::select! {
                recv(events) -> event => match event {
                    Ok(event) => {
                        info!(event = ?event, "Received event.");
                        board.on_chord_event(event);
                    }
                    Err(_) => {
                        info!("Event channel closed.");
                        break;
                    }
                },
                recv(stop) -> _ => break,
            }
        }
        info!("Controller closing.");
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::chord::{ChordDetector, ChordEvent, RawKey};
    use crate::samples::{EngineConfig, MixingEngine, SampleStore};
    use crate::testutil::{eventually, write_wav};

    use super::*;

    fn board(dir: &std::path::Path) -> (Arc<SoundBoard>, Receiver<ChordEvent>) {
        let path = dir.join("horn.wav");
        write_wav(&path, vec![vec![0.3f32; 48000]], 48000).unwrap();

        let (detector, events) = ChordDetector::new(8);
        let board = Arc::new(SoundBoard::new(
            Arc::new(SampleStore::new(48000)),
            Arc::new(MixingEngine::new(EngineConfig::default())),
            Arc::new(detector),
            Arc::new(LoggingDeviceManager),
            vec![SoundSlot::new(&path).with_hotkey("ctrl+h")],
            BoardSettings::default(),
        ));
        board.register_hotkeys();
        (board, events)
    }

    #[tokio::test]
    async fn test_controller_plays_triggered_chords() {
        let dir = tempfile::tempdir().unwrap();
        let (board, events) = board(dir.path());
        let mut controller = Controller::spawn(board.clone(), events);

        let detector = board.detector();
        detector.on_key_press(&RawKey::Named("ctrl".into()));
        detector.on_key_press(&RawKey::Char('H'));

        eventually(|| board.engine().is_playing(), "sound never started");

        controller.stop(Duration::from_secs(1)).unwrap();
        controller.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_controller_exits_when_events_close() {
        let dir = tempfile::tempdir().unwrap();
        let (board, _detector_events) = board(dir.path());
        let (tx, rx) = crossbeam_channel::bounded(4);
        let mut controller = Controller::spawn(board.clone(), rx);

        tx.send(ChordEvent::Triggered("h+ctrl".into())).unwrap();
        drop(tx);
        controller.join().await.unwrap();

        assert!(board.engine().is_playing());
        assert!(controller.board().slot_state(0).unwrap().is_some());
    }
}
