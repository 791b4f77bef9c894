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
use std::collections::BTreeSet;
use std::fmt;

use super::key::{KeyToken, CHORD_DELIMITER};

/// A set of keys that fires when all of them are held. Order never matters; two
/// chords are equal when their canonical strings are equal.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChordSpec {
    tokens: BTreeSet<KeyToken>,
    canonical: String,
}

impl ChordSpec {
    /// Parses a chord string such as "Ctrl+Shift+A". Returns None if the string names
    /// no keys.
    pub fn parse(chord: &str) -> Option<ChordSpec> {
        ChordSpec::from_tokens(chord.split(CHORD_DELIMITER).filter_map(KeyToken::parse))
    }

    /// Builds a chord from already-normalized tokens. Returns None if there are none.
    pub fn from_tokens(tokens: impl IntoIterator<Item = KeyToken>) -> Option<ChordSpec> {
        let tokens: BTreeSet<KeyToken> = tokens.into_iter().collect();
        if tokens.is_empty() {
            return None;
        }
        let canonical = join(tokens.iter());
        Some(ChordSpec { tokens, canonical })
    }

    /// Sorted tokens joined by '+'.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    pub fn tokens(&self) -> impl Iterator<Item = &KeyToken> {
        self.tokens.iter()
    }

    pub fn contains(&self, token: &KeyToken) -> bool {
        self.tokens.contains(token)
    }

    /// True when every key of the chord is in `pressed`.
    pub fn is_satisfied_by(&self, pressed: &BTreeSet<KeyToken>) -> bool {
        self.tokens.is_subset(pressed)
    }
}

impl fmt::Display for ChordSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

/// Canonical form of a chord string, or None if it names no keys.
pub fn canonical_chord(chord: &str) -> Option<String> {
    ChordSpec::parse(chord).map(|parsed| parsed.canonical)
}

/// Joins tokens with the chord delimiter, in the order given.
pub(crate) fn join<'a>(tokens: impl Iterator<Item = &'a KeyToken>) -> String {
    let mut joined = String::new();
    for token in tokens {
        if !joined.is_empty() {
            joined.push(CHORD_DELIMITER);
        }
        joined.push_str(token.as_str());
    }
    joined
}
