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

//! Key normalization.
//!
//! Every key the detector sees, whether it arrives from a capture backend or is
//! parsed out of a chord string, goes through the same normalization and ends up
//! as a [KeyToken] drawn from a closed alphabet:
//!
//! - single lowercase characters, with shifted symbols mapped to their base key
//!   (`!` becomes `1`, `?` becomes `/`)
//! - the modifiers `ctrl`, `alt`, `shift`, `cmd` and `win`
//! - a fixed vocabulary of named keys (`space`, `enter`, `f1`, `page_up`, ...)
//! - an escape form `<...>` for anything else, such as unmapped virtual-key codes
//!
//! Normalization is idempotent: normalizing a token's own text yields the token.

use std::fmt;

/// Separates tokens in a chord string.
pub const CHORD_DELIMITER: char = '+';

/// Modifier prefixes and the canonical name they collapse to. `ctrl_l`, `ctrl_r`
/// and `control` all become `ctrl`.
const MODIFIERS: &[(&str, &str)] = &[
    ("ctrl", "ctrl"),
    ("control", "ctrl"),
    ("alt", "alt"),
    ("option", "alt"),
    ("shift", "shift"),
    ("cmd", "cmd"),
    ("command", "cmd"),
    ("super", "cmd"),
    ("meta", "cmd"),
    ("win", "win"),
];

/// Named keys that pass through unchanged.
const NAMED_KEYS: &[&str] = &[
    "space",
    "enter",
    "tab",
    "esc",
    "backspace",
    "delete",
    "insert",
    "home",
    "end",
    "page_up",
    "page_down",
    "up",
    "down",
    "left",
    "right",
    "caps_lock",
    "num_lock",
    "scroll_lock",
    "print_screen",
    "pause",
    "menu",
    "media_play_pause",
    "media_next",
    "media_previous",
    "media_volume_up",
    "media_volume_down",
    "media_volume_mute",
];

/// Alternate spellings of named keys.
const ALIASES: &[(&str, &str)] = &[
    ("return", "enter"),
    ("escape", "esc"),
    ("del", "delete"),
    ("ins", "insert"),
    ("pgup", "page_up"),
    ("pgdn", "page_down"),
    ("prtsc", "print_screen"),
];

/// Shifted symbols on a US layout and the key that produces them.
fn unshift(c: char) -> char {
    match c {
        '!' => '1',
        '@' => '2',
        '#' => '3',
        '$' => '4',
        '%' => '5',
        '^' => '6',
        '&' => '7',
        '*' => '8',
        '(' => '9',
        ')' => '0',
        '_' => '-',
        '+' => '=',
        '{' => '[',
        '}' => ']',
        '|' => '\\',
        ':' => ';',
        '"' => '\'',
        '<' => ',',
        '>' => '.',
        '?' => '/',
        '~' => '`',
        other => other,
    }
}

/// A key exactly as a capture backend reports it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawKey {
    /// A named key such as "ctrl_l", "f5" or "space".
    Named(String),
    /// A character key.
    Char(char),
    /// A platform virtual-key code with no character attached.
    VirtualKey(u32),
}

/// One normalized physical key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyToken(String);

impl KeyToken {
    /// Normalizes a raw key from a capture backend.
    pub fn from_raw(key: &RawKey) -> KeyToken {
        match key {
            RawKey::Named(name) => {
                KeyToken::parse(name).unwrap_or_else(|| KeyToken::escaped("unknown"))
            }
            RawKey::Char(c) => KeyToken::from_char(*c),
            RawKey::VirtualKey(code) => KeyToken::from_virtual_key(*code),
        }
    }

    /// Normalizes one key name as written in a chord string. Returns None for empty
    /// input.
    pub fn parse(name: &str) -> Option<KeyToken> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return None;
        }

        let mut chars = trimmed.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Some(KeyToken::from_char(c));
        }

        let lower = trimmed.to_lowercase();
        if lower.len() > 2 && lower.starts_with('<') && lower.ends_with('>') {
            return Some(KeyToken(lower));
        }
        if let Some(modifier) = modifier(&lower) {
            return Some(KeyToken::named(modifier));
        }
        if let Some((_, canonical)) = ALIASES.iter().find(|(alias, _)| *alias == lower) {
            return Some(KeyToken::named(canonical));
        }
        if NAMED_KEYS.contains(&lower.as_str()) || is_function_key(&lower) {
            return Some(KeyToken(lower));
        }

        Some(KeyToken::escaped(&lower))
    }

    fn from_char(c: char) -> KeyToken {
        match c {
            ' ' => KeyToken::named("space"),
            '\t' => KeyToken::named("tab"),
            '\n' | '\r' => KeyToken::named("enter"),
            c if c.is_control() || c.is_whitespace() => {
                KeyToken::escaped(&format!("u{:04x}", c as u32))
            }
            c => {
                // A token stays one character, so keep letters whose lowercase form
                // expands (such as 'İ') as they are.
                let mut lower = c.to_lowercase();
                let c = match (lower.next(), lower.next()) {
                    (Some(l), None) => l,
                    _ => c,
                };
                KeyToken(unshift(c).to_string())
            }
        }
    }

    fn from_virtual_key(code: u32) -> KeyToken {
        match code {
            // '0'..'9'
            48..=57 => KeyToken::from_char(char::from(code as u8)),
            // 'A'..'Z'
            65..=90 => KeyToken::from_char(char::from(code as u8 + 32)),
            _ => KeyToken::escaped(&code.to_string()),
        }
    }

    fn named(name: &str) -> KeyToken {
        KeyToken(name.to_string())
    }

    fn escaped(name: &str) -> KeyToken {
        let name: String = name
            .to_lowercase()
            .chars()
            .map(|c| {
                if c == CHORD_DELIMITER || c.is_whitespace() {
                    '_'
                } else {
                    c
                }
            })
            .collect();
        KeyToken(format!("<{}>", name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for ctrl, alt, shift, cmd and win.
    pub fn is_modifier(&self) -> bool {
        MODIFIERS.iter().any(|(_, canonical)| *canonical == self.0)
    }
}

impl fmt::Display for KeyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn modifier(name: &str) -> Option<&'static str> {
    MODIFIERS
        .iter()
        .find(|(prefix, _)| name.starts_with(prefix))
        .map(|(_, canonical)| *canonical)
}

fn is_function_key(name: &str) -> bool {
    name.strip_prefix('f')
        .and_then(|n| n.parse::<u8>().ok())
        .is_some_and(|n| (1..=24).contains(&n))
        && !name.starts_with("f0")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(raw: RawKey) -> String {
        KeyToken::from_raw(&raw).to_string()
    }

    #[test]
    fn test_shifted_symbols_map_to_base_key() {
        assert_eq!(token(RawKey::Char('!')), "1");
        assert_eq!(token(RawKey::Char(')')), "0");
        assert_eq!(token(RawKey::Char('?')), "/");
        assert_eq!(token(RawKey::Char('+')), "=");
        assert_eq!(token(RawKey::Char('A')), "a");
    }

    #[test]
    fn test_modifiers_collapse() {
        assert_eq!(token(RawKey::Named("ctrl_l".into())), "ctrl");
        assert_eq!(token(RawKey::Named("Control".into())), "ctrl");
        assert_eq!(token(RawKey::Named("alt_gr".into())), "alt");
        assert_eq!(token(RawKey::Named("shift_r".into())), "shift");
        assert_eq!(token(RawKey::Named("super".into())), "cmd");
        assert_eq!(token(RawKey::Named("meta_l".into())), "cmd");
        assert_eq!(token(RawKey::Named("win".into())), "win");
        assert!(KeyToken::from_raw(&RawKey::Named("ctrl_r".into())).is_modifier());
        assert!(!KeyToken::from_raw(&RawKey::Char('a')).is_modifier());
    }

    #[test]
    fn test_virtual_keys() {
        assert_eq!(token(RawKey::VirtualKey(49)), "1");
        assert_eq!(token(RawKey::VirtualKey(65)), "a");
        assert_eq!(token(RawKey::VirtualKey(90)), "z");
        assert_eq!(token(RawKey::VirtualKey(200)), "<200>");
    }

    #[test]
    fn test_named_keys() {
        assert_eq!(token(RawKey::Named("space".into())), "space");
        assert_eq!(token(RawKey::Named("Return".into())), "enter");
        assert_eq!(token(RawKey::Named("F12".into())), "f12");
        assert_eq!(token(RawKey::Named("f25".into())), "<f25>");
        assert_eq!(token(RawKey::Named("hyper".into())), "<hyper>");
        assert_eq!(token(RawKey::Char(' ')), "space");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let raws = [
            RawKey::Char('!'),
            RawKey::Char('Q'),
            RawKey::Char('\t'),
            RawKey::Named("ctrl_l".into()),
            RawKey::Named("page_up".into()),
            RawKey::Named("launch_app2".into()),
            RawKey::VirtualKey(77),
            RawKey::VirtualKey(255),
            RawKey::Char('\u{130}'),
            RawKey::Char('\u{a0}'),
            RawKey::Char('Ä'),
        ];
        for raw in raws {
            let once = KeyToken::from_raw(&raw);
            let twice = KeyToken::parse(once.as_str()).unwrap();
            assert_eq!(once, twice, "{:?} is not idempotent", raw);
        }
    }

    #[test]
    fn test_expanding_lowercase_stays_one_char() {
        assert_eq!(token(RawKey::Char('\u{130}')), "\u{130}");
        assert_eq!(token(RawKey::Char('Ä')), "ä");
        assert_eq!(token(RawKey::Char('\u{a0}')), "<u00a0>");
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert_eq!(KeyToken::parse(""), None);
        assert_eq!(KeyToken::parse("   "), None);
        assert_eq!(token(RawKey::Named(String::new())), "<unknown>");
        assert_eq!(token(RawKey::Named("num pad+".into())), "<num_pad_>");
    }
}
