//! Rhythmic styles that turn a picked character into notes.
//!
//! Every style sees the same [`Pick`]: the character, the current chord's
//! tones (bass first), where the tick sits in the bar, and the tick's
//! velocity and timing.

use crate::chord::picking_notes;
use crate::output::Micros;
use crate::script::{Action, Style};
use crate::theory::to_midi;
use crate::voice_leading::smooth;

pub struct Pick<'a> {
    pub character: char,
    /// Sorted chord tones, bass first. Never empty.
    pub tones: &'a [u8],
    pub chord_index: usize,
    pub tick_in_bar: usize,
    pub bar_len: usize,
    pub velocity: u8,
    pub interval: Micros,
    /// Minimum duration owed to following hold characters (0 if none)
    pub hold_floor: Micros,
}

impl Pick<'_> {
    fn bass(&self) -> u8 {
        self.tones[0]
    }

    fn note(&self, note: u8, ticks: u64) -> Action {
        Action::Note {
            note,
            velocity: self.velocity,
            duration: (self.interval * ticks).max(self.hold_floor),
        }
    }

    fn chord(&self, notes: Vec<u8>, duration: Micros) -> Action {
        Action::Chord {
            notes,
            velocity: self.velocity,
            duration: duration.max(self.hold_floor),
        }
    }
}

/// Picking pool without the bass note.
fn melodic_pool(tones: &[u8]) -> Vec<u8> {
    let pool = picking_notes(tones);
    if pool.len() > 1 { pool[1..].to_vec() } else { pool }
}

/// Stable index for a character: letters a-z are 0-25, digits 0-9.
pub fn char_index(c: char) -> usize {
    let lower = c.to_ascii_lowercase();
    match lower {
        'a'..='z' => lower as usize - 'a' as usize,
        '0'..='9' => lower as usize - '0' as usize,
        _ => c as usize,
    }
}

fn is_vowel(c: char) -> bool {
    matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u')
}

pub fn perform(style: Style, pick: &Pick, last_melodic: &mut Option<(u8, usize)>) -> Vec<Action> {
    if pick.tones.is_empty() {
        return Vec::new();
    }
    match style {
        Style::BalladPick => ballad_pick(pick, last_melodic),
        Style::RockStrum => rock_strum(pick),
        Style::PowerChug => power_chug(pick),
        Style::SynthPulse => synth_pulse(pick),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Bass,
    Low,
    Mid,
    High,
}

fn ballad_role(tick_in_bar: usize, bar_len: usize) -> Role {
    use Role::*;
    match bar_len {
        12 => [Bass, Low, Mid, High, Mid, Low][tick_in_bar % 6],
        16 => [Bass, Low, Mid, High][tick_in_bar % 4],
        _ => [Bass, Low, High, Low][tick_in_bar % 4],
    }
}

fn role_pool(role: Role, pool: &[u8]) -> &[u8] {
    let n = pool.len();
    match role {
        Role::Bass => pool,
        Role::Low => &pool[..n.div_ceil(2)],
        Role::High => &pool[n / 2..],
        Role::Mid => {
            let start = n / 3;
            let len = n.div_ceil(3).max(1);
            &pool[start..(start + len).min(n)]
        }
    }
}

/// Fingerpicked arpeggio pattern. Melodic notes lean toward the previous
/// note of the same chord unless the line jumps more than a fifth.
fn ballad_pick(pick: &Pick, last_melodic: &mut Option<(u8, usize)>) -> Vec<Action> {
    let role = ballad_role(pick.tick_in_bar, pick.bar_len);
    if role == Role::Bass {
        return vec![pick.note(pick.bass(), 4)];
    }
    let pool = melodic_pool(pick.tones);
    let choices = role_pool(role, &pool);
    if choices.is_empty() {
        return Vec::new();
    }
    let raw = choices[char_index(pick.character) % choices.len()];
    let note = match *last_melodic {
        Some((previous, chord))
            if chord == pick.chord_index && (raw as i32 - previous as i32).abs() <= 7 =>
        {
            smooth(raw, Some(previous))
        }
        _ => raw,
    };
    *last_melodic = Some((note, pick.chord_index));
    vec![pick.note(note, 3)]
}

/// Vowels pick a single note; consonants strum, down on even ticks (lowest
/// three tones) and up on odd ticks (highest three).
fn rock_strum(pick: &Pick) -> Vec<Action> {
    if is_vowel(pick.character) {
        let pool = melodic_pool(pick.tones);
        let note = pool[char_index(pick.character) % pool.len()];
        return vec![pick.note(note, 2)];
    }
    let tones = pick.tones;
    let strum = if pick.tick_in_bar % 2 == 0 {
        tones[..tones.len().min(3)].to_vec()
    } else {
        tones[tones.len().saturating_sub(3)..].to_vec()
    };
    vec![pick.chord(strum, pick.interval * 2)]
}

/// Short, percussive strums of the lowest three tones.
fn power_chug(pick: &Pick) -> Vec<Action> {
    let notes = pick.tones[..pick.tones.len().min(3)].to_vec();
    vec![pick.chord(notes, pick.interval / 2)]
}

/// Bass pulse every `max(4, bar/4)` ticks; otherwise a melodic tone walked
/// by character and tick, an octave up on odd ticks.
fn synth_pulse(pick: &Pick) -> Vec<Action> {
    let period = (pick.bar_len / 4).max(4);
    if pick.tick_in_bar % period == 0 {
        return vec![pick.note(pick.bass(), 2)];
    }
    let pool = melodic_pool(pick.tones);
    let mut note = pool[(char_index(pick.character) + pick.tick_in_bar) % pool.len()];
    if pick.tick_in_bar % 2 == 1 {
        note = to_midi(note as i32 + 12).unwrap_or(note);
    }
    vec![pick.note(note, 1)]
}
