//! Hotkey combination parsing and normalization
//!
//! A combination is a set of held modifiers plus exactly one main key,
//! written as `ctrl+alt+v`. Parsing accepts common aliases and any order;
//! display always produces the canonical `ctrl+alt+shift+meta+<key>` form.
//! Main keys come from [`KEY_NAMES`], the names the listener reports.

use std::str::FromStr;

/// Canonical names of every main key a combination can use
pub const KEY_NAMES: &[&str] = &[
    "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q", "r",
    "s", "t", "u", "v", "w", "x", "y", "z", "0", "1", "2", "3", "4", "5", "6", "7", "8", "9",
    "f1", "f2", "f3", "f4", "f5", "f6", "f7", "f8", "f9", "f10", "f11", "f12", "space", "enter",
    "escape", "tab", "backspace", "delete", "insert", "home", "end", "pageup", "pagedown", "up",
    "down", "left", "right", "-", "=", ",", ".", "/", ";", "'", "`", "[", "]", "\\",
];

/// Canonical name of a main key, resolving aliases
pub fn canonical_key(name: &str) -> Option<&'static str> {
    let name = match name {
        "return" => "enter",
        "esc" => "escape",
        "spacebar" => "space",
        "del" => "delete",
        other => other,
    };
    KEY_NAMES.iter().copied().find(|known| *known == name)
}

/// Tracks which modifier keys are part of a combination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ModifierState {
    /// Control key is held
    pub control: bool,
    /// Alt/Option key is held
    pub alt: bool,
    /// Shift key is held
    pub shift: bool,
    /// Command/Windows/Super key is held
    pub meta: bool,
}

impl ModifierState {
    /// Check if all modifiers are released
    pub fn is_empty(&self) -> bool {
        !self.control && !self.alt && !self.shift && !self.meta
    }

    /// Set the modifier called `name`; returns false if it is not a modifier
    pub fn set(&mut self, name: &str, held: bool) -> bool {
        let slot = match name {
            "ctrl" | "control" => &mut self.control,
            "alt" | "option" => &mut self.alt,
            "shift" => &mut self.shift,
            "meta" | "cmd" | "command" | "win" | "windows" | "super" => &mut self.meta,
            _ => return false,
        };
        *slot = held;
        true
    }

    /// Canonical names of the held modifiers, in display order
    pub fn names(&self) -> impl Iterator<Item = &'static str> {
        [
            (self.control, "ctrl"),
            (self.alt, "alt"),
            (self.shift, "shift"),
            (self.meta, "meta"),
        ]
        .into_iter()
        .filter_map(|(held, name)| held.then_some(name))
    }
}

/// A normalized hotkey combination
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Combination {
    pub modifiers: ModifierState,
    /// Main (non-modifier) key, lowercase
    pub key: Option<String>,
}

impl Combination {
    pub fn is_empty(&self) -> bool {
        self.modifiers.is_empty() && self.key.is_none()
    }
}

/// Errors raised while parsing a hotkey string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseHotkeyError {
    #[error("hotkey is empty")]
    Empty,

    #[error("hotkey {0:?} contains an empty key")]
    EmptyPart(String),

    #[error("hotkey {0:?} has more than one main key")]
    MultipleKeys(String),

    #[error("hotkey {hotkey:?} uses unknown key {key:?}")]
    UnknownKey { hotkey: String, key: String },

    #[error("hotkey {0:?} has no main key")]
    MissingKey(String),
}

impl FromStr for Combination {
    type Err = ParseHotkeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ParseHotkeyError::Empty);
        }

        let mut combination = Combination::default();
        for part in s.split('+') {
            let name = part.trim().to_lowercase();
            if name.is_empty() {
                return Err(ParseHotkeyError::EmptyPart(s.to_string()));
            }
            if combination.modifiers.set(&name, true) {
                continue;
            }
            if combination.key.is_some() {
                return Err(ParseHotkeyError::MultipleKeys(s.to_string()));
            }
            let key = canonical_key(&name).ok_or_else(|| ParseHotkeyError::UnknownKey {
                hotkey: s.to_string(),
                key: name.clone(),
            })?;
            combination.key = Some(key.to_string());
        }

        if combination.key.is_none() {
            return Err(ParseHotkeyError::MissingKey(s.to_string()));
        }
        Ok(combination)
    }
}

impl std::fmt::Display for Combination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts: Vec<&str> = self.modifiers.names().collect();
        if let Some(key) = &self.key {
            parts.push(key);
        }
        write!(f, "{}", parts.join("+"))
    }
}
