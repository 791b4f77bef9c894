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
//! A hotkey-driven soundboard.
//!
//! Sounds are decoded once into a [samples::SampleStore], mixed in real time by a
//! [samples::MixingEngine] and triggered by key chords recognised by a
//! [chord::ChordDetector]. The [controller] module ties the three together.
pub mod audio;
pub mod chord;
pub mod config;
pub mod controller;
pub mod playsync;
pub mod samples;
#[cfg(test)]
mod testutil;
