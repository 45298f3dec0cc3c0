//! Key-to-note mapping in scale-quantized or chromatic mode.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::layout::KeyLayout;
use crate::theory::{RootNote, Scale, to_midi};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingMode {
    /// Columns walk scale degrees
    Musical,
    /// Columns walk semitones
    Chromatic,
}

impl FromStr for MappingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "musical" | "scale" => Ok(MappingMode::Musical),
            "chromatic" | "raw" => Ok(MappingMode::Chromatic),
            other => Err(format!("unknown mapping mode '{}'", other)),
        }
    }
}

impl fmt::Display for MappingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingMode::Musical => f.write_str("musical"),
            MappingMode::Chromatic => f.write_str("chromatic"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NoteMapper {
    pub mode: MappingMode,
    pub root: RootNote,
    pub scale: Scale,
    pub octave_offset: i32,
    /// Degrees (musical) or semitones (chromatic) added per layout row
    pub row_offset: i32,
    pub layout: KeyLayout,
}

impl Default for NoteMapper {
    fn default() -> Self {
        Self {
            mode: MappingMode::Musical,
            root: RootNote::default(),
            scale: Scale::default(),
            octave_offset: 0,
            row_offset: 5,
            layout: KeyLayout::default(),
        }
    }
}

impl NoteMapper {
    /// Root MIDI number shifted by the octave offset. Unclamped.
    pub fn base_note(&self) -> i32 {
        self.root.midi_number() + self.octave_offset * 12
    }

    /// MIDI note for a key, or None when the key is not in the layout or
    /// the result falls outside 0..=127.
    pub fn midi_note(&self, key: &str) -> Option<u8> {
        let (row, col) = self.layout.position(key)?;
        self.note_at(row, col)
    }

    pub fn midi_note_for_char(&self, c: char) -> Option<u8> {
        let (row, col) = self.layout.position_of_char(c)?;
        self.note_at(row, col)
    }

    fn note_at(&self, row: usize, col: usize) -> Option<u8> {
        let step = row as i32 * self.row_offset + col as i32;
        let offset = match self.mode {
            MappingMode::Musical => self.scale.pitch(step),
            MappingMode::Chromatic => step,
        };
        to_midi(self.base_note() + offset)
    }

    /// Nearest in-scale note to `note`; ties go to the lower note.
    /// Chromatic mode returns the note unchanged.
    pub fn quantize(&self, note: i32) -> i32 {
        if self.mode == MappingMode::Chromatic {
            return note;
        }
        let base = self.base_note();
        for distance in 0..12 {
            if self.scale.contains(note - distance - base) {
                return note - distance;
            }
            if self.scale.contains(note + distance - base) {
                return note + distance;
            }
        }
        note
    }
}
