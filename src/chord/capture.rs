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

//! Key capture backends and the thread that runs them.

use std::{
    io::{self, BufRead},
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::{error, info, span, warn, Level};

use super::detector::{ChordDetector, KeyEvent};
use super::key::RawKey;
use crate::playsync::CancelHandle;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("key capture I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("key capture did not stop within {0:?}")]
    ShutdownTimeout(Duration),

    #[error("key capture thread panicked")]
    Panicked,
}

/// A source of raw key events.
pub trait KeyCapture: Send + 'static {
    /// Delivers key events to the detector until the input ends or `cancel` fires.
    /// Blocks the calling thread.
    fn capture_keys(
        &mut self,
        detector: &ChordDetector,
        cancel: &CancelHandle,
    ) -> Result<(), CaptureError>;
}

/// A capture backend running on its own thread.
pub struct CaptureHandle {
    cancel: CancelHandle,
    /// Disconnects when the capture thread exits, however it exits.
    done: Receiver<()>,
    thread: Option<JoinHandle<Result<(), CaptureError>>>,
}

impl CaptureHandle {
    /// Starts delivering events from `capture` to `detector`.
    pub fn spawn<C: KeyCapture>(
        mut capture: C,
        detector: Arc<ChordDetector>,
    ) -> Result<CaptureHandle, CaptureError> {
        let cancel = CancelHandle::new();
        let (done_tx, done) = crossbeam_channel::bounded::<()>(0);
        let thread = {
            let cancel = cancel.clone();
            thread::Builder::new()
                .name("soundpad-capture".into())
                .spawn(move || {
                    let _done = done_tx;
                    let span = span!(Level::INFO, "chord capture");
                    let _enter = span.enter();

                    info!("Key capture started");
                    let result = capture.capture_keys(&detector, &cancel);
                    match &result {
                        Ok(()) => info!("Key capture stopped"),
                        Err(e) => error!(err = %e, "Key capture failed"),
                    }
                    result
                })?
        };

        Ok(CaptureHandle {
            cancel,
            done,
            thread: Some(thread),
        })
    }

    /// True once the capture thread has exited.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(|thread| thread.is_finished())
    }

    /// Cancels the capture and waits at most `timeout` for its thread to exit. A
    /// thread that doesn't exit in time is left detached and reported as
    /// [CaptureError::ShutdownTimeout].
    pub fn stop(mut self, timeout: Duration) -> Result<(), CaptureError> {
        self.cancel.cancel();
        match self.done.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => {
                self.thread.take();
                Err(CaptureError::ShutdownTimeout(timeout))
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => match self.thread.take() {
                Some(thread) => thread.join().map_err(|_| CaptureError::Panicked)?,
                None => Ok(()),
            },
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Reads key events from a line-oriented stream:
///
/// ```text
/// press ctrl_l
/// press a
/// release a
/// up ctrl_l
/// + vk65
/// ```
///
/// `press`, `down` and `+` press a key; `release`, `up` and `-` release it. A key
/// written `vk<code>` is a virtual-key code.
pub struct LineCapture<R> {
    reader: R,
}

impl<R> LineCapture<R> {
    pub fn new(reader: R) -> LineCapture<R> {
        LineCapture { reader }
    }
}

impl<R: BufRead + Send + 'static> KeyCapture for LineCapture<R> {
    fn capture_keys(
        &mut self,
        detector: &ChordDetector,
        cancel: &CancelHandle,
    ) -> Result<(), CaptureError> {
        read_events(&mut self.reader, detector, cancel)
    }
}

/// Captures keys piped into standard input. The read blocks, so cancellation is
/// only noticed when the next line arrives.
pub struct StdinCapture;

impl KeyCapture for StdinCapture {
    fn capture_keys(
        &mut self,
        detector: &ChordDetector,
        cancel: &CancelHandle,
    ) -> Result<(), CaptureError> {
        read_events(&mut io::stdin().lock(), detector, cancel)
    }
}

fn read_events<R: BufRead>(
    reader: &mut R,
    detector: &ChordDetector,
    cancel: &CancelHandle,
) -> Result<(), CaptureError> {
    let mut buf = Vec::new();
    while !cancel.is_cancelled() {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            info!("Key capture input closed");
            break;
        }
        let Ok(line) = std::str::from_utf8(&buf) else {
            warn!(bytes = buf.len(), "Skipping key capture input that is not UTF-8");
            continue;
        };
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(line) {
            Some(event) => detector.on_key_event(&event),
            None => warn!(input = line.trim(), "Unrecognized key capture input"),
        }
    }
    Ok(())
}

/// Replays a fixed list of events, then waits to be cancelled.
pub struct ScriptedCapture {
    events: Vec<KeyEvent>,
}

impl ScriptedCapture {
    pub fn new(events: Vec<KeyEvent>) -> ScriptedCapture {
        ScriptedCapture { events }
    }
}

impl KeyCapture for ScriptedCapture {
    fn capture_keys(
        &mut self,
        detector: &ChordDetector,
        cancel: &CancelHandle,
    ) -> Result<(), CaptureError> {
        for event in self.events.drain(..) {
            if cancel.is_cancelled() {
                return Ok(());
            }
            detector.on_key_event(&event);
        }
        cancel.wait();
        Ok(())
    }
}

/// Parses one line of the capture protocol.
pub fn parse_line(line: &str) -> Option<KeyEvent> {
    let line = line.trim();
    let (verb, key) = match line.split_once(char::is_whitespace) {
        Some((verb, key)) => (verb, key.trim()),
        // "+a" and "-a" without a space.
        None if line.len() > 1 && (line.starts_with('+') || line.starts_with('-')) => {
            line.split_at(1)
        }
        None => return None,
    };
    if key.is_empty() {
        return None;
    }

    let key = match key
        .strip_prefix("vk")
        .and_then(|code| code.parse::<u32>().ok())
    {
        Some(code) => RawKey::VirtualKey(code),
        None => RawKey::Named(key.to_string()),
    };

    match verb.to_lowercase().as_str() {
        "press" | "down" | "+" => Some(KeyEvent::Press(key)),
        "release" | "up" | "-" => Some(KeyEvent::Release(key)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::chord::ChordEvent;
    use crate::testutil::eventually;

    /// Ignores cancellation for a while, like a backend stuck in a blocking read.
    struct StuckCapture(Duration);

    impl KeyCapture for StuckCapture {
        fn capture_keys(&mut self, _: &ChordDetector, _: &CancelHandle) -> Result<(), CaptureError> {
            thread::sleep(self.0);
            Ok(())
        }
    }

    struct FailingCapture;

    impl KeyCapture for FailingCapture {
        fn capture_keys(&mut self, _: &ChordDetector, _: &CancelHandle) -> Result<(), CaptureError> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "no input access").into())
        }
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(
            parse_line("press ctrl_l\n"),
            Some(KeyEvent::Press(RawKey::Named("ctrl_l".into())))
        );
        assert_eq!(
            parse_line("UP a"),
            Some(KeyEvent::Release(RawKey::Named("a".into())))
        );
        assert_eq!(
            parse_line("+ vk65"),
            Some(KeyEvent::Press(RawKey::VirtualKey(65)))
        );
        assert_eq!(
            parse_line("-b"),
            Some(KeyEvent::Release(RawKey::Named("b".into())))
        );
        assert_eq!(
            parse_line("- -"),
            Some(KeyEvent::Release(RawKey::Named("-".into())))
        );
        assert_eq!(parse_line("press"), None);
        assert_eq!(parse_line("wiggle a"), None);
        assert_eq!(parse_line(""), None);
    }

    #[test]
    fn test_line_capture_feeds_detector() {
        let (detector, events) = ChordDetector::new(8);
        detector.register("ctrl+a");

        let input = "press ctrl_l\n\nnonsense\npress a\nrelease a\nrelease ctrl_l\n";
        let mut capture = LineCapture::new(Cursor::new(input.as_bytes().to_vec()));
        capture
            .capture_keys(&detector, &CancelHandle::new())
            .unwrap();

        assert_eq!(
            events.try_iter().collect::<Vec<_>>(),
            vec![ChordEvent::Triggered("a+ctrl".into())]
        );
        assert_eq!(detector.pressed_chord(), "");
    }

    #[test]
    fn test_line_capture_skips_invalid_utf8() {
        let (detector, events) = ChordDetector::new(8);
        detector.register("ctrl+a");

        let input = b"press ctrl\npress \xff\xfe\npress a\n".to_vec();
        let mut capture = LineCapture::new(Cursor::new(input));
        capture
            .capture_keys(&detector, &CancelHandle::new())
            .unwrap();

        assert_eq!(
            events.try_iter().collect::<Vec<_>>(),
            vec![ChordEvent::Triggered("a+ctrl".into())]
        );
        assert_eq!(detector.pressed_chord(), "a+ctrl");
    }

    #[test]
    fn test_handle_delivers_and_stops() {
        let (detector, events) = ChordDetector::new(8);
        detector.register("f5");
        let detector = Arc::new(detector);

        let capture = ScriptedCapture::new(vec![KeyEvent::Press(RawKey::Named("F5".into()))]);
        let handle = CaptureHandle::spawn(capture, detector.clone()).unwrap();

        eventually(|| !events.is_empty(), "chord never triggered");
        assert!(!handle.is_finished());
        handle.stop(Duration::from_secs(1)).unwrap();

        assert_eq!(events.try_recv().unwrap(), ChordEvent::Triggered("f5".into()));
    }

    #[test]
    fn test_stop_times_out_without_retrying() {
        let (detector, _events) = ChordDetector::new(8);
        let handle =
            CaptureHandle::spawn(StuckCapture(Duration::from_millis(500)), Arc::new(detector))
                .unwrap();

        let result = handle.stop(Duration::from_millis(20));
        assert!(matches!(
            result,
            Err(CaptureError::ShutdownTimeout(timeout)) if timeout == Duration::from_millis(20)
        ));
    }

    #[test]
    fn test_capture_failure_is_returned_on_stop() {
        let (detector, _events) = ChordDetector::new(8);
        let handle = CaptureHandle::spawn(FailingCapture, Arc::new(detector)).unwrap();

        eventually(|| handle.is_finished(), "capture never finished");
        assert!(matches!(
            handle.stop(Duration::from_secs(1)),
            Err(CaptureError::Io(_))
        ));
    }
}
