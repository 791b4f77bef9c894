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

//! The sound board: configured sound slots wired to the engine and detector.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::routing::DeviceManager;
use crate::chord::{canonical_chord, ChordDetector, ChordEvent};
use crate::samples::{clamp_gain, DecodeError, MixingEngine, SampleStore, VoiceId, VoiceState};

#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("no sound in slot {0}")]
    UnknownSlot(usize),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// One sound on the board.
#[derive(Clone, Debug, PartialEq)]
pub struct SoundSlot {
    pub path: PathBuf,
    pub name: String,
    /// Chord string as the user wrote or recorded it.
    pub hotkey: Option<String>,
    pub volume: f32,
}

impl SoundSlot {
    /// A slot named after the file's stem, at full volume, with no hotkey.
    pub fn new(path: impl AsRef<Path>) -> SoundSlot {
        let path = path.as_ref().to_path_buf();
        SoundSlot {
            name: display_name(&path),
            path,
            hotkey: None,
            volume: 1.0,
        }
    }

    pub fn with_hotkey(mut self, hotkey: &str) -> SoundSlot {
        self.hotkey = Some(hotkey.to_string());
        self
    }

    pub fn with_volume(mut self, volume: f32) -> SoundSlot {
        self.volume = clamp_gain(volume);
        self
    }

    fn matches(&self, canonical: &str) -> bool {
        self.hotkey
            .as_deref()
            .and_then(canonical_chord)
            .is_some_and(|hotkey| hotkey == canonical)
    }
}

/// Name shown for a sound file: its stem, or the whole path if there is none.
pub fn display_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Playback behavior that can change while running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoardSettings {
    /// Let a new sound play over the ones already playing.
    pub overlap: bool,
    /// Mute the real microphones while sounds play.
    pub mute_mic_while_playing: bool,
}

impl Default for BoardSettings {
    fn default() -> Self {
        BoardSettings {
            overlap: true,
            mute_mic_while_playing: true,
        }
    }
}

struct SlotState {
    slot: SoundSlot,
    voice: Option<VoiceId>,
}

#[derive(Default)]
struct BoardState {
    slots: Vec<SlotState>,
    /// Slot waiting for a recorded chord.
    recording: Option<usize>,
}

/// Owns the sound slots and translates chord events and user intents into engine
/// calls.
pub struct SoundBoard {
    store: Arc<SampleStore>,
    engine: Arc<MixingEngine>,
    detector: Arc<ChordDetector>,
    devices: Arc<dyn DeviceManager>,
    state: Mutex<BoardState>,
    overlap: AtomicBool,
    mute_mic: AtomicBool,
    mics_muted: AtomicBool,
}

impl SoundBoard {
    pub fn new(
        store: Arc<SampleStore>,
        engine: Arc<MixingEngine>,
        detector: Arc<ChordDetector>,
        devices: Arc<dyn DeviceManager>,
        slots: Vec<SoundSlot>,
        settings: BoardSettings,
    ) -> SoundBoard {
        SoundBoard {
            store,
            engine,
            detector,
            devices,
            state: Mutex::new(BoardState {
                slots: slots
                    .into_iter()
                    .map(|slot| SlotState { slot, voice: None })
                    .collect(),
                recording: None,
            }),
            overlap: AtomicBool::new(settings.overlap),
            mute_mic: AtomicBool::new(settings.mute_mic_while_playing),
            mics_muted: AtomicBool::new(false),
        }
    }

    pub fn engine(&self) -> &Arc<MixingEngine> {
        &self.engine
    }

    pub fn detector(&self) -> &Arc<ChordDetector> {
        &self.detector
    }

    /// Snapshot of the slots.
    pub fn slots(&self) -> Vec<SoundSlot> {
        self.state
            .lock()
            .slots
            .iter()
            .map(|state| state.slot.clone())
            .collect()
    }

    pub fn settings(&self) -> BoardSettings {
        BoardSettings {
            overlap: self.overlap.load(Ordering::Relaxed),
            mute_mic_while_playing: self.mute_mic.load(Ordering::Relaxed),
        }
    }

    /// Decodes every slot's file ahead of time so the first trigger doesn't wait on
    /// disk. Failures are logged and the slot stays on the board. Returns how many
    /// loaded.
    pub fn preload(&self) -> usize {
        let paths: Vec<PathBuf> = self
            .state
            .lock()
            .slots
            .iter()
            .map(|state| state.slot.path.clone())
            .collect();

        let mut loaded = 0;
        for path in paths {
            match self.store.load(&path) {
                Ok(_) => loaded += 1,
                Err(e) => warn!(err = %e, "Unable to preload sound"),
            }
        }
        info!(
            loaded,
            memory_kb = self.store.memory_usage() / 1024,
            "Sounds preloaded"
        );
        loaded
    }

    /// Adds a slot at the end of the board and registers its hotkey. Returns its index.
    pub fn add_slot(&self, slot: SoundSlot) -> usize {
        let hotkey = slot.hotkey.clone();
        let index = {
            let mut state = self.state.lock();
            state.slots.push(SlotState { slot, voice: None });
            state.slots.len() - 1
        };
        if let Some(hotkey) = hotkey {
            self.detector.register(&hotkey);
        }
        index
    }

    /// Removes a slot, stopping its voice and dropping its hotkey.
    pub fn remove_slot(&self, index: usize) -> Result<SoundSlot, BoardError> {
        let removed = {
            let mut state = self.state.lock();
            if index >= state.slots.len() {
                return Err(BoardError::UnknownSlot(index));
            }
            state.recording = match state.recording {
                Some(recording) if recording == index => None,
                Some(recording) if recording > index => Some(recording - 1),
                other => other,
            };
            state.slots.remove(index)
        };

        if let Some(voice) = removed.voice {
            self.engine.stop(voice);
        }
        self.register_hotkeys();
        Ok(removed.slot)
    }

    /// Plays a slot's sound. When overlap is off, everything else stops.
    pub fn play_slot(&self, index: usize) -> Result<VoiceId, BoardError> {
        let (path, volume, name) = {
            let state = self.state.lock();
            let slot = &state
                .slots
                .get(index)
                .ok_or(BoardError::UnknownSlot(index))?
                .slot;
            (slot.path.clone(), slot.volume, slot.name.clone())
        };

        let asset = self.store.load(&path)?;
        self.mute_mics_if_needed();

        let overlap = self.overlap.load(Ordering::Relaxed);
        let voice = self.engine.play(&asset, volume, overlap);
        {
            let mut state = self.state.lock();
            if !overlap {
                for other in state.slots.iter_mut() {
                    other.voice = None;
                }
            }
            if let Some(slot) = state.slots.get_mut(index) {
                slot.voice = Some(voice);
            }
        }

        info!(slot = index, name, voice = %voice, "Playing sound");
        Ok(voice)
    }

    /// Stops a slot's sound. Returns false if it wasn't playing.
    pub fn stop_slot(&self, index: usize) -> Result<bool, BoardError> {
        let voice = self.take_voice(index)?;
        Ok(voice.is_some_and(|voice| self.engine.stop(voice)))
    }

    /// Pauses or resumes a slot's sound. Returns the new paused state, or false if it
    /// isn't playing.
    pub fn toggle_pause_slot(&self, index: usize) -> Result<bool, BoardError> {
        let voice = self.slot_voice(index)?;
        Ok(voice.is_some_and(|voice| self.engine.toggle_pause(voice)))
    }

    /// Changes a slot's volume, including the sound already playing from it.
    pub fn set_slot_volume(&self, index: usize, volume: f32) -> Result<(), BoardError> {
        let volume = clamp_gain(volume);
        let voice = {
            let mut state = self.state.lock();
            let slot = state
                .slots
                .get_mut(index)
                .ok_or(BoardError::UnknownSlot(index))?;
            slot.slot.volume = volume;
            slot.voice
        };
        if let Some(voice) = voice {
            self.engine.set_voice_gain(voice, volume);
        }
        Ok(())
    }

    /// Whether the slot's last voice is still in the engine, and in what state.
    pub fn slot_state(&self, index: usize) -> Result<Option<VoiceState>, BoardError> {
        Ok(self
            .slot_voice(index)?
            .and_then(|voice| self.engine.voice_state(voice)))
    }

    /// Stops every sound and unmutes the microphones.
    pub fn stop_all(&self) {
        self.engine.stop_all();
        for slot in self.state.lock().slots.iter_mut() {
            slot.voice = None;
        }
        self.restore_mics();
    }

    pub fn set_master_volume(&self, volume: f32) {
        self.engine.set_master_gain(volume);
        debug!(volume = self.engine.master_gain(), "Master volume set");
    }

    pub fn set_overlap(&self, overlap: bool) {
        self.overlap.store(overlap, Ordering::Relaxed);
    }

    /// Turning muting off while the microphones are muted unmutes them.
    pub fn set_mute_mic(&self, mute: bool) {
        self.mute_mic.store(mute, Ordering::Relaxed);
        if !mute {
            self.restore_mics();
        }
    }

    /// Waits for the next recorded chord and assigns it to the slot.
    pub fn start_hotkey_recording(&self, index: usize) -> Result<(), BoardError> {
        {
            let mut state = self.state.lock();
            if index >= state.slots.len() {
                return Err(BoardError::UnknownSlot(index));
            }
            state.recording = Some(index);
        }
        self.detector.start_recording();
        Ok(())
    }

    pub fn cancel_hotkey_recording(&self) -> bool {
        self.state.lock().recording.take();
        self.detector.cancel_recording()
    }

    /// Sets or clears a slot's hotkey. Any other slot with the same chord loses it.
    pub fn set_slot_hotkey(&self, index: usize, hotkey: Option<&str>) -> Result<(), BoardError> {
        {
            let mut state = self.state.lock();
            if index >= state.slots.len() {
                return Err(BoardError::UnknownSlot(index));
            }
            if let Some(canonical) = hotkey.and_then(canonical_chord) {
                for (i, other) in state.slots.iter_mut().enumerate() {
                    if i != index && other.slot.matches(&canonical) {
                        info!(slot = i, name = other.slot.name, "Hotkey reassigned");
                        other.slot.hotkey = None;
                    }
                }
            }
            state.slots[index].slot.hotkey = hotkey.map(str::to_string);
        }
        self.register_hotkeys();
        Ok(())
    }

    /// Replaces the detector's registrations with the slots' hotkeys. Returns how many
    /// were registered.
    pub fn register_hotkeys(&self) -> usize {
        let hotkeys: Vec<String> = self
            .state
            .lock()
            .slots
            .iter()
            .filter_map(|state| state.slot.hotkey.clone())
            .collect();

        let registered = self
            .detector
            .replace_all(hotkeys.iter().map(String::as_str));
        debug!(registered, "Hotkeys registered");
        registered
    }

    pub fn on_chord_event(&self, event: ChordEvent) {
        match event {
            ChordEvent::Triggered(chord) => self.on_triggered(&chord),
            ChordEvent::Recorded(chord) => self.on_recorded(&chord),
        }
    }

    fn on_triggered(&self, chord: &str) {
        let Some(canonical) = canonical_chord(chord) else {
            return;
        };
        let matching: Vec<usize> = self
            .state
            .lock()
            .slots
            .iter()
            .enumerate()
            .filter(|(_, state)| state.slot.matches(&canonical))
            .map(|(index, _)| index)
            .collect();

        if matching.is_empty() {
            debug!(chord = canonical, "No sound for chord");
        }
        for index in matching {
            if let Err(e) = self.play_slot(index) {
                warn!(slot = index, err = %e, "Unable to play sound");
            }
            if !self.overlap.load(Ordering::Relaxed) {
                break;
            }
        }
    }

    fn on_recorded(&self, chord: &str) {
        let Some(index) = self.state.lock().recording.take() else {
            warn!(chord, "Recorded a chord with no slot waiting for it");
            return;
        };
        info!(slot = index, chord, "Hotkey recorded");
        if let Err(e) = self.set_slot_hotkey(index, Some(chord)) {
            warn!(err = %e, "Unable to assign recorded hotkey");
        }
    }

    /// Unmutes the real microphones if this board muted them.
    pub fn restore_mics(&self) {
        if !self.mics_muted.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = self.devices.set_real_mics_muted(false) {
            warn!(err = %e, "Unable to unmute real microphones");
        }
    }

    fn mute_mics_if_needed(&self) {
        if !self.mute_mic.load(Ordering::Relaxed) || self.mics_muted.swap(true, Ordering::AcqRel)
        {
            return;
        }
        if let Err(e) = self.devices.set_real_mics_muted(true) {
            warn!(err = %e, "Unable to mute real microphones");
            self.mics_muted.store(false, Ordering::Release);
        }
    }

    fn slot_voice(&self, index: usize) -> Result<Option<VoiceId>, BoardError> {
        self.state
            .lock()
            .slots
            .get(index)
            .map(|slot| slot.voice)
            .ok_or(BoardError::UnknownSlot(index))
    }

    fn take_voice(&self, index: usize) -> Result<Option<VoiceId>, BoardError> {
        self.state
            .lock()
            .slots
            .get_mut(index)
            .map(|slot| slot.voice.take())
            .ok_or(BoardError::UnknownSlot(index))
    }
}

impl std::fmt::Debug for SoundBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundBoard")
            .field("slots", &self.state.lock().slots.len())
            .field("settings", &self.settings())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crossbeam_channel::Receiver;
    use tempfile::TempDir;

    use super::*;
    use crate::chord::RawKey;
    use crate::controller::routing::test::RecordingDeviceManager;
    use crate::samples::EngineConfig;
    use crate::testutil::write_wav;

    struct Fixture {
        board: SoundBoard,
        devices: Arc<RecordingDeviceManager>,
        events: Receiver<ChordEvent>,
        dir: TempDir,
    }

    impl Fixture {
        fn new(slots: &[(&str, Option<&str>)], settings: BoardSettings) -> Fixture {
            let dir = tempfile::tempdir().unwrap();
            let slots = slots
                .iter()
                .map(|(file, hotkey)| {
                    let path = dir.path().join(file);
                    write_wav(&path, vec![vec![0.5f32; 4800]], 48000).unwrap();
                    let slot = SoundSlot::new(&path);
                    match hotkey {
                        Some(hotkey) => slot.with_hotkey(hotkey),
                        None => slot,
                    }
                })
                .collect();

            let devices = Arc::new(RecordingDeviceManager::default());
            let (detector, events) = ChordDetector::new(16);
            let board = SoundBoard::new(
                Arc::new(SampleStore::new(48000)),
                Arc::new(MixingEngine::new(EngineConfig::new(48000, 256, 1.0))),
                Arc::new(detector),
                devices.clone(),
                slots,
                settings,
            );
            board.register_hotkeys();
            Fixture {
                board,
                devices,
                events,
                dir,
            }
        }

        /// Routes every pending detector event through the board.
        fn pump(&self) {
            for event in self.events.try_iter() {
                self.board.on_chord_event(event);
            }
        }

        fn press(&self, key: &str) {
            self.board
                .detector()
                .on_key_press(&RawKey::Named(key.to_string()));
            self.pump();
        }

        fn release(&self, key: &str) {
            self.board
                .detector()
                .on_key_release(&RawKey::Named(key.to_string()));
            self.pump();
        }
    }

    #[test]
    fn test_slot_names_come_from_file_stem() {
        let slot = SoundSlot::new("/sounds/air horn.wav");
        assert_eq!(slot.name, "air horn");
        assert_eq!(slot.volume, 1.0);
        assert_eq!(SoundSlot::new("x").with_volume(9.0).volume, 2.0);
    }

    #[test]
    fn test_chord_plays_every_matching_slot_with_overlap() {
        let fixture = Fixture::new(
            &[
                ("a.wav", Some("ctrl+1")),
                ("b.wav", Some("1+Control")),
                ("c.wav", Some("ctrl+2")),
            ],
            BoardSettings::default(),
        );

        fixture.press("ctrl");
        fixture.press("!");

        let engine = fixture.board.engine();
        assert_eq!(engine.active_voice_count(), 2);
        assert_eq!(fixture.board.slot_state(0).unwrap(), Some(VoiceState::Playing));
        assert_eq!(fixture.board.slot_state(1).unwrap(), Some(VoiceState::Playing));
        assert_eq!(fixture.board.slot_state(2).unwrap(), None);
    }

    #[test]
    fn test_chord_plays_first_match_without_overlap() {
        let fixture = Fixture::new(
            &[("a.wav", Some("ctrl+1")), ("b.wav", Some("ctrl+1"))],
            BoardSettings {
                overlap: false,
                mute_mic_while_playing: false,
            },
        );

        fixture.press("ctrl");
        fixture.press("1");

        assert_eq!(fixture.board.engine().active_voice_count(), 1);
        assert!(fixture.board.slot_state(0).unwrap().is_some());
        assert!(fixture.board.slot_state(1).unwrap().is_none());
    }

    #[test]
    fn test_hotkey_edit_does_not_retrigger_held_chord() {
        let fixture = Fixture::new(
            &[("a.wav", Some("ctrl+1")), ("b.wav", None)],
            BoardSettings::default(),
        );

        fixture.press("ctrl");
        fixture.press("1");
        assert_eq!(fixture.board.engine().active_voice_count(), 1);

        fixture.board.set_slot_hotkey(1, Some("ctrl+2")).unwrap();
        // Auto-repeat of the held key.
        fixture.press("1");
        assert_eq!(fixture.board.engine().active_voice_count(), 1);

        fixture.release("1");
        fixture.press("1");
        assert_eq!(fixture.board.engine().active_voice_count(), 2);
    }

    #[test]
    fn test_non_overlapping_play_replaces_other_slots() {
        let fixture = Fixture::new(
            &[("a.wav", None), ("b.wav", None)],
            BoardSettings {
                overlap: false,
                mute_mic_while_playing: false,
            },
        );

        let first = fixture.board.play_slot(0).unwrap();
        fixture.board.play_slot(1).unwrap();

        assert_eq!(fixture.board.engine().voice_state(first), None);
        assert_eq!(fixture.board.slot_state(0).unwrap(), None);
        assert!(!fixture.board.stop_slot(0).unwrap());
        assert!(fixture.board.stop_slot(1).unwrap());
    }

    #[test]
    fn test_recorded_chord_moves_hotkey() {
        let fixture = Fixture::new(
            &[("a.wav", Some("alt+x")), ("b.wav", None)],
            BoardSettings::default(),
        );

        fixture.board.start_hotkey_recording(1).unwrap();
        fixture.press("x");
        fixture.press("alt_l");
        fixture.release("x");
        fixture.release("alt_l");

        let slots = fixture.board.slots();
        assert_eq!(slots[0].hotkey, None);
        assert_eq!(slots[1].hotkey.as_deref(), Some("x+alt"));
        assert_eq!(fixture.board.detector().registered(), vec!["alt+x".to_string()]);

        // The new assignment is live.
        fixture.press("alt");
        fixture.press("x");
        assert!(fixture.board.slot_state(1).unwrap().is_some());
        assert!(fixture.board.slot_state(0).unwrap().is_none());
    }

    #[test]
    fn test_cancelled_recording_changes_nothing() {
        let fixture = Fixture::new(&[("a.wav", Some("f1"))], BoardSettings::default());

        fixture.board.start_hotkey_recording(0).unwrap();
        fixture.press("q");
        assert!(fixture.board.cancel_hotkey_recording());
        fixture.release("q");

        assert_eq!(fixture.board.slots()[0].hotkey.as_deref(), Some("f1"));
        assert!(fixture.events.is_empty());
    }

    #[test]
    fn test_mics_mute_once_and_restore_on_stop_all() {
        let fixture = Fixture::new(&[("a.wav", None), ("b.wav", None)], BoardSettings::default());

        fixture.board.play_slot(0).unwrap();
        fixture.board.play_slot(1).unwrap();
        assert_eq!(*fixture.devices.requests.lock(), vec![true]);

        fixture.board.stop_all();
        assert_eq!(*fixture.devices.requests.lock(), vec![true, false]);
        assert!(!fixture.board.engine().is_playing());

        // Nothing left to restore.
        fixture.board.restore_mics();
        assert_eq!(fixture.devices.requests.lock().len(), 2);
    }

    #[test]
    fn test_mute_disabled_never_touches_devices() {
        let fixture = Fixture::new(
            &[("a.wav", None)],
            BoardSettings {
                overlap: true,
                mute_mic_while_playing: false,
            },
        );
        fixture.board.play_slot(0).unwrap();
        fixture.board.stop_all();
        assert!(fixture.devices.requests.lock().is_empty());
    }

    #[test]
    fn test_failed_load_does_not_mute() {
        let fixture = Fixture::new(&[], BoardSettings::default());
        let index = fixture
            .board
            .add_slot(SoundSlot::new(fixture.dir.path().join("missing.wav")));

        let result = fixture.board.play_slot(index);
        assert!(matches!(result, Err(BoardError::Decode(_))));
        assert!(fixture.devices.requests.lock().is_empty());
    }

    #[test]
    fn test_slot_volume_reaches_live_voice() {
        let fixture = Fixture::new(&[("a.wav", None)], BoardSettings::default());
        fixture.board.play_slot(0).unwrap();
        fixture.board.set_slot_volume(0, 0.5).unwrap();

        let mut output = vec![0.0f32; 16];
        fixture.board.engine().mix(&mut output, 8);
        assert!(output.iter().all(|&s| (s - 0.25).abs() < 1e-6));
        assert_eq!(fixture.board.slots()[0].volume, 0.5);
    }

    #[test]
    fn test_toggle_pause_slot() {
        let fixture = Fixture::new(&[("a.wav", None)], BoardSettings::default());
        assert!(!fixture.board.toggle_pause_slot(0).unwrap());

        fixture.board.play_slot(0).unwrap();
        assert!(fixture.board.toggle_pause_slot(0).unwrap());
        assert_eq!(fixture.board.slot_state(0).unwrap(), Some(VoiceState::Paused));
        assert!(!fixture.board.toggle_pause_slot(0).unwrap());
    }

    #[test]
    fn test_unknown_slots_are_errors() {
        let fixture = Fixture::new(&[("a.wav", None)], BoardSettings::default());
        assert!(matches!(
            fixture.board.play_slot(3),
            Err(BoardError::UnknownSlot(3))
        ));
        assert!(fixture.board.set_slot_volume(1, 1.0).is_err());
        assert!(fixture.board.start_hotkey_recording(1).is_err());
        assert!(fixture.board.remove_slot(1).is_err());
    }

    #[test]
    fn test_remove_slot_drops_hotkey_and_voice() {
        let fixture = Fixture::new(
            &[("a.wav", Some("f1")), ("b.wav", Some("f2"))],
            BoardSettings::default(),
        );
        fixture.board.play_slot(0).unwrap();

        let removed = fixture.board.remove_slot(0).unwrap();
        assert_eq!(removed.name, "a");
        assert!(!fixture.board.engine().is_playing());
        assert_eq!(fixture.board.detector().registered(), vec!["f2".to_string()]);
    }

    #[test]
    fn test_preload_counts_loaded_sounds() {
        let fixture = Fixture::new(&[("a.wav", None), ("b.wav", None)], BoardSettings::default());
        fixture
            .board
            .add_slot(SoundSlot::new(fixture.dir.path().join("missing.wav")));
        assert_eq!(fixture.board.preload(), 2);
    }
}
