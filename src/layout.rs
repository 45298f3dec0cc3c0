//! Key layouts: ordered rows of key identifiers with a reverse lookup.
//!
//! Row 0 is the lowest row. The typewriter and melodic layouts are single
//! rows so that every letter maps to a distinct scale degree; the qwerty
//! layout mirrors the physical keyboard for display.

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct KeyLayout {
    pub name: String,
    pub rows: Vec<Vec<String>>,
    index: HashMap<String, (usize, usize)>,
}

impl KeyLayout {
    /// Build a layout. Keys are matched case-insensitively; when a key
    /// appears twice the first position wins.
    pub fn new(name: impl Into<String>, rows: Vec<Vec<String>>) -> Self {
        let mut index = HashMap::new();
        for (row, keys) in rows.iter().enumerate() {
            for (col, key) in keys.iter().enumerate() {
                index.entry(key.to_lowercase()).or_insert((row, col));
            }
        }
        Self {
            name: name.into(),
            rows,
            index,
        }
    }

    /// Build from rows of characters, one key per char.
    pub fn from_rows(name: impl Into<String>, rows: &[&str]) -> Self {
        let rows = rows
            .iter()
            .map(|r| r.chars().map(|c| c.to_string()).collect())
            .collect();
        Self::new(name, rows)
    }

    /// (row, col) of a key, if present.
    pub fn position(&self, key: &str) -> Option<(usize, usize)> {
        self.index.get(&key.to_lowercase()).copied()
    }

    pub fn position_of_char(&self, c: char) -> Option<(usize, usize)> {
        let mut buf = [0u8; 4];
        self.position(c.encode_utf8(&mut buf))
    }

    /// All keys, lowest row first.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().flatten().map(String::as_str)
    }

    /// Keys in the order a typist's hands travel across the keyboard.
    pub fn typewriter() -> Self {
        Self::from_rows("typewriter", &["qwertyuiopasdfghjklzxcvbnm"])
    }

    /// Keys ordered by English letter frequency, so common letters sit low
    /// in the scale.
    pub fn melodic() -> Self {
        Self::from_rows("melodic", &["etaoinshrdlcumwfgypbvkjxqz"])
    }

    /// Physical four-row keyboard, bottom row first.
    pub fn qwerty() -> Self {
        Self::from_rows(
            "qwerty",
            &["zxcvbnm,./", "asdfghjkl;", "qwertyuiop", "1234567890"],
        )
    }

    pub fn named(name: &str) -> Option<KeyLayout> {
        match name.trim().to_ascii_lowercase().as_str() {
            "typewriter" => Some(Self::typewriter()),
            "melodic" => Some(Self::melodic()),
            "qwerty" => Some(Self::qwerty()),
            _ => None,
        }
    }
}

impl Default for KeyLayout {
    fn default() -> Self {
        Self::typewriter()
    }
}
