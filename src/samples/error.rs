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
use std::path::PathBuf;

/// Errors produced while turning a file on disk into a playable sound asset.
/// Nothing is cached when one of these is returned.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("unable to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unsupported audio in {}: {reason}", path.display())]
    Unsupported { path: PathBuf, reason: String },

    #[error("corrupt audio data in {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        source: symphonia::core::errors::Error,
    },

    #[error("resampling {} from {from}Hz to {to}Hz failed: {reason}", path.display())]
    Resample {
        path: PathBuf,
        from: u32,
        to: u32,
        reason: String,
    },
}

impl DecodeError {
    /// The file the error refers to.
    pub fn path(&self) -> &std::path::Path {
        match self {
            DecodeError::Io { path, .. }
            | DecodeError::Unsupported { path, .. }
            | DecodeError::Corrupt { path, .. }
            | DecodeError::Resample { path, .. } => path,
        }
    }
}
