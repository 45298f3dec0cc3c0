//! Octave choice that keeps melodic lines close to a reference note.

use crate::theory::{MIDI_MAX, PitchClass};

/// The MIDI note of `pitch_class` closest to `reference`. Ties go to the
/// lower note.
pub fn nearest_octave(pitch_class: PitchClass, reference: u8) -> u8 {
    let reference = reference as i32;
    let mut best = pitch_class.semitone();
    let mut best_distance = (best - reference).abs();
    let mut candidate = best + 12;
    while candidate <= MIDI_MAX {
        let distance = (candidate - reference).abs();
        if distance < best_distance {
            best = candidate;
            best_distance = distance;
        }
        candidate += 12;
    }
    best as u8
}

/// Move `raw` to the octave nearest `reference`, or leave it alone when
/// there is no reference.
pub fn smooth(raw: u8, reference: Option<u8>) -> u8 {
    match reference {
        Some(reference) => nearest_octave(PitchClass::from_semitone(raw as i32), reference),
        None => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_octave() {
        assert_eq!(nearest_octave(PitchClass::E, 60), 64);
        assert_eq!(nearest_octave(PitchClass::E, 50), 52);
        assert_eq!(nearest_octave(PitchClass::C, 60), 60);
    }

    #[test]
    fn test_nearest_octave_tie_goes_low() {
        // F#3 (54) and F#4 (66) are both 6 from C4
        assert_eq!(nearest_octave(PitchClass::FSharp, 60), 54);
    }

    #[test]
    fn test_nearest_octave_at_range_edges() {
        assert_eq!(nearest_octave(PitchClass::G, 127), 127);
        assert_eq!(nearest_octave(PitchClass::B, 0), 11);
    }

    #[test]
    fn test_smooth_without_reference_is_identity() {
        assert_eq!(smooth(88, None), 88);
    }

    #[test]
    fn test_smooth_moves_to_reference_register() {
        assert_eq!(smooth(88, Some(62)), 64);
        assert_eq!(smooth(40, Some(70)), 64);
    }
}
