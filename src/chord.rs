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

//! Global hotkey chords.
//!
//! Raw key events from a capture backend are normalized into [KeyToken]s and fed to a
//! [ChordDetector], which fires registered chords on the press that completes them
//! and records new chords on request. Results leave the detector as [ChordEvent]s on
//! a bounded channel.

mod canonical;
mod capture;
mod detector;
mod key;

pub use canonical::{canonical_chord, ChordSpec};
pub use capture::{
    parse_line, CaptureError, CaptureHandle, KeyCapture, LineCapture, ScriptedCapture,
    StdinCapture,
};
pub use detector::{ChordDetector, ChordEvent, KeyEvent};
pub use key::{KeyToken, RawKey, CHORD_DELIMITER};
