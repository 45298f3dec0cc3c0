//! Chord symbol parsing and chord-tone derivation.
//!
//! Parses chord symbols (E, Em, D/F#, Cmaj7, A5, Gsus4) into a
//! [`ChordSymbol`] and voices them around the current base note.
//!
//! # Grammar
//! `[A-G][#b]?(maj7|maj|min|m|sus2|sus4|sus|5)?(maj7|7)?(/[A-G][#b]?)?`
//!
//! # Voicing
//! - The chord root lands in the octave below the base note.
//! - Triads (and sevenths) sit one octave above the chord root.
//! - The bass note (slash bass, or the root) is always the lowest tone.
//! - Power voicing: bass, root, fifth, octave.

use serde::Serialize;

use crate::theory::{PitchClass, to_midi};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Major,
    Minor,
    Sus2,
    Sus4,
    Power,
}

impl Quality {
    /// Triad intervals above the root. Power chords are voiced separately.
    fn triad(self) -> &'static [i32] {
        match self {
            Quality::Major | Quality::Power => &[0, 4, 7],
            Quality::Minor => &[0, 3, 7],
            Quality::Sus2 => &[0, 2, 7],
            Quality::Sus4 => &[0, 5, 7],
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Quality::Major => "",
            Quality::Minor => "m",
            Quality::Sus2 => "sus2",
            Quality::Sus4 => "sus4",
            Quality::Power => "5",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Seventh {
    None,
    Minor7,
    Major7,
}

impl Seventh {
    fn interval(self) -> Option<i32> {
        match self {
            Seventh::None => None,
            Seventh::Minor7 => Some(10),
            Seventh::Major7 => Some(11),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChordSymbol {
    pub root: PitchClass,
    pub quality: Quality,
    pub seventh: Seventh,
    pub bass: Option<PitchClass>,
    pub raw: String,
}

impl ChordSymbol {
    /// Canonical label, e.g. `Em7`, `Cmaj7`, `D/F#`. Flats print as sharps.
    pub fn label(&self) -> String {
        let mut label = format!("{}{}", self.root, self.quality.suffix());
        match self.seventh {
            Seventh::None => {}
            Seventh::Minor7 => label.push('7'),
            Seventh::Major7 => label.push_str("maj7"),
        }
        if let Some(bass) = self.bass {
            label.push('/');
            label.push_str(bass.name());
        }
        label
    }
}

/// Parse a note letter with optional accidental; returns the pitch class
/// and prefix length in bytes.
pub fn parse_pitch_class_prefix(text: &str) -> Option<(PitchClass, usize)> {
    PitchClass::parse_prefix(text)
}

// Tried in order after `maj7`; the first match wins.
const QUALITY_SUFFIXES: [(&str, Quality); 7] = [
    ("maj", Quality::Major),
    ("min", Quality::Minor),
    ("m", Quality::Minor),
    ("sus2", Quality::Sus2),
    ("sus4", Quality::Sus4),
    ("sus", Quality::Sus4),
    ("5", Quality::Power),
];

/// Parse a chord symbol token. Returns None for empty input, an unknown
/// root letter, leftover characters, or a slash bass that is not a bare
/// note name.
pub fn parse_chord_symbol(token: &str) -> Option<ChordSymbol> {
    if token.is_empty() {
        return None;
    }
    let (main, bass_token) = match token.split_once('/') {
        Some((main, bass)) => (main, Some(bass)),
        None => (token, None),
    };

    let (root, prefix_len) = parse_pitch_class_prefix(main)?;
    let mut rest = &main[prefix_len..];
    let mut quality = Quality::Major;
    let mut seventh = Seventh::None;

    if let Some(after) = rest.strip_prefix("maj7") {
        seventh = Seventh::Major7;
        rest = after;
    } else {
        for (suffix, q) in QUALITY_SUFFIXES {
            if let Some(after) = rest.strip_prefix(suffix) {
                quality = q;
                rest = after;
                break;
            }
        }
        if let Some(after) = rest.strip_prefix("maj7") {
            seventh = Seventh::Major7;
            rest = after;
        } else if let Some(after) = rest.strip_prefix('7') {
            seventh = Seventh::Minor7;
            rest = after;
        }
    }

    if !rest.is_empty() {
        return None;
    }

    let bass = match bass_token {
        Some(text) => {
            let cleaned = text.trim();
            let (pc, len) = parse_pitch_class_prefix(cleaned)?;
            if cleaned.len() != len {
                return None;
            }
            Some(pc)
        }
        None => None,
    };

    Some(ChordSymbol {
        root,
        quality,
        seventh,
        bass,
        raw: token.to_string(),
    })
}

/// Voice a chord around `base_note`, whose pitch class is `key_root`.
///
/// Returns sorted, deduplicated MIDI notes with the bass note first.
/// `power` forces a power voicing regardless of quality.
pub fn chord_notes(chord: &ChordSymbol, base_note: i32, key_root: PitchClass, power: bool) -> Vec<u8> {
    let below = |pc: PitchClass| base_note - 12 + (pc.semitone() - key_root.semitone()).rem_euclid(12);
    let root = below(chord.root);
    let bass = chord.bass.map(below).unwrap_or(root);

    let mut notes: Vec<i32> = if power || chord.quality == Quality::Power {
        vec![bass, root, root + 7, root + 12]
    } else {
        let upper = root + 12;
        let mut notes = vec![bass];
        notes.extend(chord.quality.triad().iter().map(|i| upper + i));
        if let Some(interval) = chord.seventh.interval() {
            notes.push(upper + interval);
        }
        notes
    };

    notes.sort_unstable();
    notes.dedup();
    notes.into_iter().filter_map(to_midi).collect()
}

/// Widen a chord for index-based picking: the sorted tones plus every
/// non-bass tone an octave up (kept within 127).
pub fn picking_notes(tones: &[u8]) -> Vec<u8> {
    let mut pool: Vec<u8> = tones.to_vec();
    if let Some((_, upper)) = tones.split_first() {
        pool.extend(upper.iter().filter_map(|&n| to_midi(n as i32 + 12)));
    }
    pool.sort_unstable();
    pool.dedup();
    pool
}

/// Root, fifth and octave of `root`, dropping tones above 127.
pub fn power_chord(root: u8) -> Vec<u8> {
    let mut notes = vec![root];
    notes.extend([7, 12].iter().filter_map(|i| to_midi(root as i32 + i)));
    notes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(token: &str) -> ChordSymbol {
        parse_chord_symbol(token).unwrap_or_else(|| panic!("failed to parse {}", token))
    }

    #[test]
    fn test_parse_triads() {
        let em = parse("Em");
        assert_eq!(em.root, PitchClass::E);
        assert_eq!(em.quality, Quality::Minor);
        assert_eq!(em.seventh, Seventh::None);

        assert_eq!(parse("C").quality, Quality::Major);
        assert_eq!(parse("Cmaj").quality, Quality::Major);
        assert_eq!(parse("Amin").quality, Quality::Minor);
        assert_eq!(parse("Dsus2").quality, Quality::Sus2);
        assert_eq!(parse("Dsus4").quality, Quality::Sus4);
        assert_eq!(parse("Dsus").quality, Quality::Sus4);
        assert_eq!(parse("A5").quality, Quality::Power);
    }

    #[test]
    fn test_parse_sevenths() {
        let cmaj7 = parse("Cmaj7");
        assert_eq!(cmaj7.quality, Quality::Major);
        assert_eq!(cmaj7.seventh, Seventh::Major7);

        let g7 = parse("G7");
        assert_eq!(g7.quality, Quality::Major);
        assert_eq!(g7.seventh, Seventh::Minor7);

        let em7 = parse("Em7");
        assert_eq!(em7.quality, Quality::Minor);
        assert_eq!(em7.seventh, Seventh::Minor7);

        let mmaj7 = parse("Cmmaj7");
        assert_eq!(mmaj7.quality, Quality::Minor);
        assert_eq!(mmaj7.seventh, Seventh::Major7);
    }

    #[test]
    fn test_parse_slash_chord() {
        let chord = parse("D/F#");
        assert_eq!(chord.root, PitchClass::D);
        assert_eq!(chord.bass, Some(PitchClass::FSharp));
        assert_eq!(chord.raw, "D/F#");
    }

    #[test]
    fn test_flat_roots_resolve_to_sharps() {
        let chord = parse("Bbm");
        assert_eq!(chord.root, PitchClass::ASharp);
        assert_eq!(chord.label(), "A#m");
    }

    #[test]
    fn test_parse_failures() {
        assert_eq!(parse_chord_symbol(""), None);
        assert_eq!(parse_chord_symbol("Hm"), None);
        assert_eq!(parse_chord_symbol("Emx"), None);
        assert_eq!(parse_chord_symbol("Cdim"), None);
        assert_eq!(parse_chord_symbol("D/F#m"), None);
        assert_eq!(parse_chord_symbol("D/"), None);
        assert_eq!(parse_chord_symbol("the"), None);
    }

    #[test]
    fn test_prefix_length() {
        assert_eq!(parse_pitch_class_prefix("F#maj7"), Some((PitchClass::FSharp, 2)));
        assert_eq!(parse_pitch_class_prefix("Em"), Some((PitchClass::E, 1)));
    }

    #[test]
    fn test_chord_notes_minor_triad() {
        // Base E3 = 52: Em voices E2 bass, then E3 G3 B3
        let notes = chord_notes(&parse("Em"), 52, PitchClass::E, false);
        assert_eq!(notes, vec![40, 52, 55, 59]);
    }

    #[test]
    fn test_chord_notes_slash_and_seventh() {
        // F# bass in the low octave, D triad from D3 + 12
        let notes = chord_notes(&parse("D/F#"), 52, PitchClass::E, false);
        assert_eq!(notes, vec![42, 62, 66, 69]);

        let notes = chord_notes(&parse("G7"), 52, PitchClass::E, false);
        assert_eq!(notes, vec![43, 55, 59, 62, 65]);
    }

    #[test]
    fn test_chord_notes_power() {
        let notes = chord_notes(&parse("Em"), 52, PitchClass::E, true);
        assert_eq!(notes, vec![40, 47, 52]);
        let notes = chord_notes(&parse("A5"), 52, PitchClass::E, false);
        assert_eq!(notes, vec![45, 52, 57]);
    }

    #[test]
    fn test_chord_notes_drop_out_of_range() {
        let notes = chord_notes(&parse("C"), 120, PitchClass::C, false);
        assert_eq!(notes, vec![108, 120, 124, 127]);
    }

    #[test]
    fn test_picking_notes_extends_upper_tones() {
        assert_eq!(picking_notes(&[40, 52, 55, 59]), vec![40, 52, 55, 59, 64, 67, 71]);
        assert_eq!(picking_notes(&[]), Vec::<u8>::new());
    }

    #[test]
    fn test_power_chord() {
        assert_eq!(power_chord(52), vec![52, 59, 64]);
        assert_eq!(power_chord(120), vec![120, 127]);
    }

    #[test]
    fn test_labels() {
        assert_eq!(parse("Em7").label(), "Em7");
        assert_eq!(parse("Cmaj7").label(), "Cmaj7");
        assert_eq!(parse("Dsus").label(), "Dsus4");
        assert_eq!(parse("D/F#").label(), "D/F#");
    }
}
