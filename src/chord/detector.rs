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

//! Edge-triggered chord matching over live key events.

use std::collections::{BTreeMap, BTreeSet};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::canonical::{join, ChordSpec};
use super::key::{KeyToken, RawKey};

/// Something the detector wants the rest of the program to act on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChordEvent {
    /// A registered chord became fully held. Carries the canonical string.
    Triggered(String),
    /// A recording session finished. Carries the keys in the order first pressed.
    Recorded(String),
}

/// A raw key transition from a capture backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyEvent {
    Press(RawKey),
    Release(RawKey),
}

#[derive(Default)]
struct RecordingSession {
    /// Distinct keys in the order they were first pressed.
    sequence: Vec<KeyToken>,
}

#[derive(Default)]
struct KeyboardState {
    pressed: BTreeSet<KeyToken>,
    /// Canonical strings of chords that fired and are still fully held.
    latched: BTreeSet<String>,
    registered: BTreeMap<String, ChordSpec>,
    recording: Option<RecordingSession>,
}

/// Tracks held keys and fires registered chords.
///
/// All state lives behind one lock shared by the capture thread and callers.
/// Events are collected while the lock is held and sent after it is released, so a
/// slow consumer can never stall key delivery. The queue is bounded; when it is
/// full the event is dropped with a warning.
pub struct ChordDetector {
    state: Mutex<KeyboardState>,
    events: Sender<ChordEvent>,
}

impl ChordDetector {
    /// Creates a detector and the receiving end of its event queue.
    pub fn new(queue_size: usize) -> (ChordDetector, Receiver<ChordEvent>) {
        let (events, receiver) = crossbeam_channel::bounded(queue_size.max(1));
        (
            ChordDetector {
                state: Mutex::new(KeyboardState::default()),
                events,
            },
            receiver,
        )
    }

    pub fn on_key_event(&self, event: &KeyEvent) {
        match event {
            KeyEvent::Press(key) => self.on_key_press(key),
            KeyEvent::Release(key) => self.on_key_release(key),
        }
    }

    pub fn on_key_press(&self, key: &RawKey) {
        let token = KeyToken::from_raw(key);
        let mut fired = Vec::new();
        {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            state.pressed.insert(token.clone());

            if let Some(session) = state.recording.as_mut() {
                if !session.sequence.contains(&token) {
                    session.sequence.push(token);
                }
                return;
            }

            for (canonical, chord) in state.registered.iter() {
                if state.latched.contains(canonical) || !chord.is_satisfied_by(&state.pressed) {
                    continue;
                }
                state.latched.insert(canonical.clone());
                fired.push(ChordEvent::Triggered(canonical.clone()));
            }
        }
        self.dispatch(fired);
    }

    pub fn on_key_release(&self, key: &RawKey) {
        let token = KeyToken::from_raw(key);
        let mut recorded = None;
        {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            state.pressed.remove(&token);

            let registered = &state.registered;
            state.latched.retain(|canonical| {
                registered
                    .get(canonical)
                    .is_some_and(|chord| !chord.contains(&token))
            });

            // A session with nothing recorded stays open; the release belonged to a key
            // held before recording started.
            let finished = state.pressed.is_empty()
                && state
                    .recording
                    .as_ref()
                    .is_some_and(|session| !session.sequence.is_empty());
            if finished {
                if let Some(session) = state.recording.take() {
                    recorded = Some(ChordEvent::Recorded(join(session.sequence.iter())));
                }
            }
        }
        self.dispatch(recorded);
    }

    /// Registers a chord. Returns its canonical form, or None if it names no keys.
    pub fn register(&self, chord: &str) -> Option<String> {
        let Some(parsed) = ChordSpec::parse(chord) else {
            warn!(chord, "Ignoring empty chord");
            return None;
        };
        let canonical = parsed.canonical().to_string();
        self.state.lock().registered.insert(canonical.clone(), parsed);
        debug!(chord = canonical, "Chord registered");
        Some(canonical)
    }

    /// Unregisters a chord given in any casing or key order. Returns false if it
    /// wasn't registered.
    pub fn unregister(&self, chord: &str) -> bool {
        let Some(parsed) = ChordSpec::parse(chord) else {
            return false;
        };
        let mut state = self.state.lock();
        state.latched.remove(parsed.canonical());
        let removed = state.registered.remove(parsed.canonical()).is_some();
        drop(state);

        if removed {
            debug!(chord = parsed.canonical(), "Chord unregistered");
        }
        removed
    }

    /// Forgets every registered chord. Keys that are physically held stay pressed.
    pub fn clear_all(&self) {
        let mut state = self.state.lock();
        let cleared = state.registered.len();
        state.registered.clear();
        state.latched.clear();
        drop(state);
        debug!(cleared, "Chords cleared");
    }

    /// Swaps the whole registered set in one step. Latches survive only for chords
    /// that stay registered. Returns how many chords are registered afterwards.
    pub fn replace_all<'a>(&self, chords: impl IntoIterator<Item = &'a str>) -> usize {
        let registered: BTreeMap<String, ChordSpec> = chords
            .into_iter()
            .filter_map(|chord| {
                let parsed = ChordSpec::parse(chord);
                if parsed.is_none() {
                    warn!(chord, "Ignoring empty chord");
                }
                parsed
            })
            .map(|parsed| (parsed.canonical().to_string(), parsed))
            .collect();
        let count = registered.len();

        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.registered = registered;
        let registered = &state.registered;
        state
            .latched
            .retain(|canonical| registered.contains_key(canonical));
        drop(guard);

        debug!(registered = count, "Chords replaced");
        count
    }

    /// Starts a new recording session, discarding any previous one, the current
    /// pressed set and every latch.
    pub fn start_recording(&self) {
        let mut state = self.state.lock();
        state.pressed.clear();
        state.latched.clear();
        state.recording = Some(RecordingSession::default());
        drop(state);
        info!("Recording chord");
    }

    /// Abandons the current recording session without emitting anything. Returns
    /// false if none was active.
    pub fn cancel_recording(&self) -> bool {
        let cancelled = self.state.lock().recording.take().is_some();
        if cancelled {
            info!("Chord recording cancelled");
        }
        cancelled
    }

    pub fn is_recording(&self) -> bool {
        self.state.lock().recording.is_some()
    }

    /// Canonical form of the keys held right now. Empty when nothing is held.
    pub fn pressed_chord(&self) -> String {
        join(self.state.lock().pressed.iter())
    }

    /// Canonical strings of every registered chord, sorted.
    pub fn registered(&self) -> Vec<String> {
        self.state.lock().registered.keys().cloned().collect()
    }

    fn dispatch(&self, events: impl IntoIterator<Item = ChordEvent>) {
        for event in events {
            debug!(event = ?event, "Chord event");
            match self.events.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(event)) => {
                    warn!(event = ?event, "Chord event queue is full, dropping event");
                }
                Err(TrySendError::Disconnected(event)) => {
                    debug!(event = ?event, "No chord event listener");
                }
            }
        }
    }
}

impl std::fmt::Debug for ChordDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ChordDetector")
            .field("pressed", &state.pressed)
            .field("registered", &state.registered.keys())
            .field("recording", &state.recording.is_some())
            .finish()
    }
}
