//! Music theory primitives: pitch classes, root notes, scales and MIDI arithmetic.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Highest valid MIDI note number.
pub const MIDI_MAX: i32 = 127;

/// The twelve pitch classes (chromatic scale, sharps spelling).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum PitchClass {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// Semitone within an octave (C=0, B=11)
    pub fn semitone(self) -> i32 {
        match self {
            PitchClass::C => 0,
            PitchClass::CSharp => 1,
            PitchClass::D => 2,
            PitchClass::DSharp => 3,
            PitchClass::E => 4,
            PitchClass::F => 5,
            PitchClass::FSharp => 6,
            PitchClass::G => 7,
            PitchClass::GSharp => 8,
            PitchClass::A => 9,
            PitchClass::ASharp => 10,
            PitchClass::B => 11,
        }
    }

    /// Pitch class of any integer semitone, wrapping negatives.
    pub fn from_semitone(semitone: i32) -> Self {
        Self::ALL[semitone.rem_euclid(12) as usize]
    }

    pub fn name(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::CSharp => "C#",
            PitchClass::D => "D",
            PitchClass::DSharp => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::FSharp => "F#",
            PitchClass::G => "G",
            PitchClass::GSharp => "G#",
            PitchClass::A => "A",
            PitchClass::ASharp => "A#",
            PitchClass::B => "B",
        }
    }

    /// Parse a leading note letter plus optional `#`/`b`.
    ///
    /// The letter is case-insensitive. Returns the pitch class and how many
    /// bytes of `text` were consumed (1 or 2). Flats resolve to the sharp
    /// spelling: `Bb` is stored as `A#`.
    pub fn parse_prefix(text: &str) -> Option<(PitchClass, usize)> {
        let mut chars = text.chars();
        let base = match chars.next()?.to_ascii_uppercase() {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return None,
        };
        match chars.next() {
            Some('#') => Some((Self::from_semitone(base + 1), 2)),
            Some('b') => Some((Self::from_semitone(base - 1), 2)),
            _ => Some((Self::from_semitone(base), 1)),
        }
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A pitch class anchored to an octave (scientific pitch notation, C4 = 60).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RootNote {
    pub pitch_class: PitchClass,
    pub octave: i32,
}

impl RootNote {
    pub fn new(pitch_class: PitchClass, octave: i32) -> Self {
        Self { pitch_class, octave }
    }

    /// Unclamped MIDI number: `(octave + 1) * 12 + pitch class`.
    pub fn midi_number(self) -> i32 {
        (self.octave + 1) * 12 + self.pitch_class.semitone()
    }
}

impl Default for RootNote {
    fn default() -> Self {
        Self::new(PitchClass::E, 3)
    }
}

impl fmt::Display for RootNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class, self.octave)
    }
}

impl FromStr for RootNote {
    type Err = String;

    /// Parses `E3`, `F#2`, `Bb-1`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (pitch_class, len) =
            PitchClass::parse_prefix(s).ok_or_else(|| format!("invalid root note '{}'", s))?;
        let octave = s[len..]
            .parse::<i32>()
            .map_err(|_| format!("invalid octave in root note '{}'", s))?;
        Ok(Self::new(pitch_class, octave))
    }
}

/// A named set of semitone offsets from the root, strictly increasing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scale {
    pub name: String,
    pub offsets: Vec<i32>,
}

impl Scale {
    pub fn new(name: impl Into<String>, offsets: Vec<i32>) -> Self {
        Self {
            name: name.into(),
            offsets,
        }
    }

    /// Semitone offset of a scale degree. Degrees outside the offset list
    /// wrap with an octave shift per wrap, so degree -1 of a five-note
    /// scale is `offsets[4] - 12`. An empty scale yields 0.
    pub fn pitch(&self, degree: i32) -> i32 {
        let len = self.offsets.len() as i32;
        if len == 0 {
            return 0;
        }
        let octave = degree.div_euclid(len);
        let index = degree.rem_euclid(len) as usize;
        self.offsets[index] + octave * 12
    }

    /// True when the pitch class `semitone` (relative to the scale root) is in the scale.
    pub fn contains(&self, semitone: i32) -> bool {
        let pc = semitone.rem_euclid(12);
        self.offsets.iter().any(|&o| o.rem_euclid(12) == pc)
    }

    pub fn major() -> Self {
        Self::new("major", vec![0, 2, 4, 5, 7, 9, 11])
    }

    pub fn minor() -> Self {
        Self::new("minor", vec![0, 2, 3, 5, 7, 8, 10])
    }

    pub fn major_pentatonic() -> Self {
        Self::new("major pentatonic", vec![0, 2, 4, 7, 9])
    }

    pub fn minor_pentatonic() -> Self {
        Self::new("minor pentatonic", vec![0, 3, 5, 7, 10])
    }

    pub fn blues() -> Self {
        Self::new("blues", vec![0, 3, 5, 6, 7, 10])
    }

    pub fn dorian() -> Self {
        Self::new("dorian", vec![0, 2, 3, 5, 7, 9, 10])
    }

    pub fn mixolydian() -> Self {
        Self::new("mixolydian", vec![0, 2, 4, 5, 7, 9, 10])
    }

    pub fn chromatic() -> Self {
        Self::new("chromatic", (0..12).collect())
    }

    pub fn catalogue() -> Vec<Scale> {
        vec![
            Self::major(),
            Self::minor(),
            Self::major_pentatonic(),
            Self::minor_pentatonic(),
            Self::blues(),
            Self::dorian(),
            Self::mixolydian(),
            Self::chromatic(),
        ]
    }

    /// Look up a catalogue scale by name (case-insensitive, `-`/`_` as spaces).
    pub fn named(name: &str) -> Option<Scale> {
        let wanted = name.trim().to_ascii_lowercase().replace(['-', '_'], " ");
        Self::catalogue().into_iter().find(|s| s.name == wanted)
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self::minor_pentatonic()
    }
}

/// Convert an unclamped MIDI number to a note, if in 0..=127.
pub fn to_midi(value: i32) -> Option<u8> {
    if (0..=MIDI_MAX).contains(&value) {
        Some(value as u8)
    } else {
        None
    }
}

/// Display name of a MIDI note, e.g. 60 -> "C4".
pub fn note_name(note: u8) -> String {
    let n = note as i32;
    format!("{}{}", PitchClass::from_semitone(n), n.div_euclid(12) - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_middle_c_midi() {
        assert_eq!(RootNote::new(PitchClass::C, 4).midi_number(), 60);
        assert_eq!(RootNote::new(PitchClass::C, -1).midi_number(), 0);
    }

    #[test]
    fn test_root_midi_formula() {
        assert_eq!(RootNote::new(PitchClass::E, 3).midi_number(), 52);
        for pc in PitchClass::ALL {
            for octave in -1..=8 {
                let root = RootNote::new(pc, octave);
                assert_eq!(root.midi_number(), (octave + 1) * 12 + pc.semitone());
            }
        }
    }

    #[test]
    fn test_parse_prefix() {
        assert_eq!(PitchClass::parse_prefix("F#"), Some((PitchClass::FSharp, 2)));
        assert_eq!(PitchClass::parse_prefix("Bb"), Some((PitchClass::ASharp, 2)));
        assert_eq!(PitchClass::parse_prefix("F#maj7"), Some((PitchClass::FSharp, 2)));
        assert_eq!(PitchClass::parse_prefix("cm"), Some((PitchClass::C, 1)));
        assert_eq!(PitchClass::parse_prefix("Cb"), Some((PitchClass::B, 2)));
        assert_eq!(PitchClass::parse_prefix("H"), None);
        assert_eq!(PitchClass::parse_prefix(""), None);
    }

    #[test]
    fn test_scale_degree_wrapping() {
        let scale = Scale::minor_pentatonic();
        assert_eq!(scale.pitch(0), 0);
        assert_eq!(scale.pitch(4), 10);
        assert_eq!(scale.pitch(5), 12);
        assert_eq!(scale.pitch(-1), 10 - 12);
        assert_eq!(scale.pitch(-6), 10 - 24);
    }

    #[test]
    fn test_empty_scale_is_degenerate() {
        let scale = Scale::new("empty", vec![]);
        assert_eq!(scale.pitch(7), 0);
    }

    #[test]
    fn test_root_note_from_str() {
        assert_eq!("E3".parse::<RootNote>(), Ok(RootNote::new(PitchClass::E, 3)));
        assert_eq!(
            "Bb-1".parse::<RootNote>(),
            Ok(RootNote::new(PitchClass::ASharp, -1))
        );
        assert!("X3".parse::<RootNote>().is_err());
        assert!("E".parse::<RootNote>().is_err());
    }

    #[test]
    fn test_note_name() {
        assert_eq!(note_name(60), "C4");
        assert_eq!(note_name(52), "E3");
        assert_eq!(note_name(0), "C-1");
    }

    #[test]
    fn test_scale_lookup() {
        assert_eq!(Scale::named("Minor-Pentatonic"), Some(Scale::minor_pentatonic()));
        assert_eq!(Scale::named("lydian"), None);
    }
}
