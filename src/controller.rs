//! Live performance state: held keys, sustain, pad, chug loops and
//! ref-counted transient notes.
//!
//! The controller owns the output sink and the timer queue. Everything here
//! runs on the performer's thread, so the bookkeeping needs no locking.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use log::{debug, info, trace};

use crate::chord::power_chord;
use crate::mapper::NoteMapper;
use crate::output::{Instrument, Micros, NoteSink};
use crate::performer::Settings;
use crate::scheduler::{Job, KeyId, Lane, Scheduler};
use crate::theory::to_midi;
use crate::voice_leading::smooth;

/// Gap between the notes of an audible strum
pub const STRUM_SPACING: Micros = 12_000;

/// Semitone span of the pad's horizontal axis, centred on the base note
const PAD_RANGE: f32 = 24.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayStyle {
    /// Notes sound while the key is down
    Hold,
    /// Repeat the key's notes in eighths while held
    Chug8,
    /// Repeat in sixteenths
    Chug16,
}

impl PlayStyle {
    /// Repeat interval at `bpm`, or None for [`PlayStyle::Hold`].
    pub fn chug_interval(self, bpm: u32) -> Option<Micros> {
        let quarter = 60_000_000 / bpm.max(1) as u64;
        match self {
            PlayStyle::Hold => None,
            PlayStyle::Chug8 => Some(quarter / 2),
            PlayStyle::Chug16 => Some(quarter / 4),
        }
    }
}

impl FromStr for PlayStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hold" => Ok(PlayStyle::Hold),
            "chug8" | "chug-8" | "8ths" => Ok(PlayStyle::Chug8),
            "chug16" | "chug-16" | "16ths" => Ok(PlayStyle::Chug16),
            other => Err(format!("unknown play style '{}'", other)),
        }
    }
}

impl fmt::Display for PlayStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PlayStyle::Hold => "hold",
            PlayStyle::Chug8 => "chug8",
            PlayStyle::Chug16 => "chug16",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    /// One octave up
    pub shift: bool,
    /// One octave down
    pub alt: bool,
    /// Power chord on this key
    pub control: bool,
}

/// A raw key-down as delivered by the key listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPress {
    pub key: KeyId,
    pub character: Option<char>,
    pub modifiers: Modifiers,
    /// OS auto-repeat
    pub repeat: bool,
    pub timestamp: Micros,
}

impl KeyPress {
    /// A plain press of a character key. The key id is the lowercased code point.
    pub fn from_char(c: char) -> Self {
        Self {
            key: c.to_ascii_lowercase() as KeyId,
            character: Some(c),
            modifiers: Modifiers::default(),
            repeat: false,
            timestamp: 0,
        }
    }
}

/// Pad position to a note: x spans two octaves around the base note, and is
/// snapped to the scale in musical mode.
pub fn pad_note(x: f32, mapper: &NoteMapper) -> Option<u8> {
    let x = x.clamp(0.0, 1.0);
    let raw = mapper.base_note() + (x * PAD_RANGE).round() as i32 - PAD_RANGE as i32 / 2;
    to_midi(mapper.quantize(raw))
}

/// Pad height to velocity, 20 at the bottom to 127 at the top.
pub fn pad_velocity(y: f32) -> u8 {
    20 + (y.clamp(0.0, 1.0) * 107.0).round() as u8
}

pub struct LiveController<S: NoteSink> {
    sink: S,
    scheduler: Scheduler,
    now: Micros,
    held: HashMap<KeyId, Vec<u8>>,
    sustained: BTreeSet<u8>,
    pad_notes: Vec<u8>,
    pad_note: Option<u8>,
    /// Outstanding transient references per note
    transients: BTreeMap<u8, u32>,
    chugs: HashMap<KeyId, KeyPress>,
    sustain: bool,
    last_note: Option<u8>,
    /// Reference for voice-leading key presses
    last_key_note: Option<u8>,
    last_velocity: u8,
}

impl<S: NoteSink> LiveController<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            scheduler: Scheduler::new(),
            now: 0,
            held: HashMap::new(),
            sustained: BTreeSet::new(),
            pad_notes: Vec::new(),
            pad_note: None,
            transients: BTreeMap::new(),
            chugs: HashMap::new(),
            sustain: false,
            last_note: None,
            last_key_note: None,
            last_velocity: 0,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn scheduler(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    pub fn now(&self) -> Micros {
        self.now
    }

    /// Move the timeline forward. Events emitted afterwards carry `now`.
    pub fn set_now(&mut self, now: Micros) {
        self.now = now;
        self.sink.advance_clock(now);
    }

    pub fn sustain(&self) -> bool {
        self.sustain
    }

    pub fn last_note(&self) -> Option<u8> {
        self.last_note
    }

    pub fn last_velocity(&self) -> u8 {
        self.last_velocity
    }

    /// Keys currently holding or chugging notes, sorted.
    pub fn held_keys(&self) -> Vec<KeyId> {
        let mut keys: Vec<KeyId> = self.held.keys().chain(self.chugs.keys()).copied().collect();
        keys.sort_unstable();
        keys.dedup();
        keys
    }

    fn note_on(&mut self, note: u8, velocity: u8) {
        trace!("note on {} vel {}", note, velocity);
        self.sink.note_on(note, velocity);
        self.last_note = Some(note);
        self.last_velocity = velocity;
    }

    fn note_off(&mut self, note: u8) {
        trace!("note off {}", note);
        self.sink.note_off(note);
    }

    /// Whether any source still holds `note`.
    fn sounding(&self, note: u8) -> bool {
        self.held.values().any(|notes| notes.contains(&note))
            || self.sustained.contains(&note)
            || self.pad_notes.contains(&note)
            || self.transients.contains_key(&note)
    }

    /// Let go of notes that no source holds any more, or park them in the
    /// sustained set while sustain is down.
    fn release(&mut self, notes: Vec<u8>) {
        if self.sustain {
            self.sustained.extend(notes);
            return;
        }
        for note in notes {
            if !self.sounding(note) {
                self.note_off(note);
            }
        }
    }

    /// Mapped notes for a key press under the current settings: voice-led,
    /// octave-shifted by modifiers and expanded to a power chord if asked.
    pub fn resolve(&self, press: &KeyPress, settings: &Settings, mapper: &NoteMapper) -> Vec<u8> {
        let Some(c) = press.character else {
            return Vec::new();
        };
        let Some(raw) = mapper.midi_note_for_char(c) else {
            return Vec::new();
        };
        let mut note = raw as i32;
        if settings.voice_leading {
            note = smooth(raw, self.last_key_note) as i32;
        }
        if press.modifiers.shift {
            note += 12;
        }
        if press.modifiers.alt {
            note -= 12;
        }
        let Some(note) = to_midi(note) else {
            return Vec::new();
        };
        if settings.power_chords || press.modifiers.control {
            power_chord(note)
        } else {
            vec![note]
        }
    }

    pub fn key_down(&mut self, press: KeyPress, settings: &Settings, mapper: &NoteMapper) {
        if press.repeat {
            return;
        }
        if press.character == Some(settings.sustain_key) {
            self.set_sustain(true);
            return;
        }
        if !settings.armed || self.held.contains_key(&press.key) || self.chugs.contains_key(&press.key) {
            return;
        }
        let notes = self.resolve(&press, settings, mapper);
        if notes.is_empty() {
            return;
        }
        self.last_key_note = notes.first().copied();

        if settings.play_style.chug_interval(settings.bpm).is_some() {
            let key = press.key;
            debug!("chug loop started for key {}", key);
            self.chugs.insert(key, press);
            self.scheduler.bump(Lane::Chug(key));
            let now = self.now;
            self.chug_tick(key, now, settings, mapper);
            return;
        }

        for &note in &notes {
            self.note_on(note, settings.key_velocity);
        }
        self.held.insert(press.key, notes);
    }

    pub fn key_up(&mut self, key: KeyId, character: Option<char>, settings: &Settings) {
        if character.is_some() && character == Some(settings.sustain_key) {
            self.set_sustain(false);
            return;
        }
        if self.chugs.remove(&key).is_some() {
            self.scheduler.bump(Lane::Chug(key));
            debug!("chug loop stopped for key {}", key);
        }
        if let Some(notes) = self.held.remove(&key) {
            self.release(notes);
        }
    }

    /// Sustain pedal. Lifting it drops the sustained notes nothing else holds.
    pub fn set_sustain(&mut self, on: bool) {
        if self.sustain == on {
            return;
        }
        self.sustain = on;
        if !on {
            let parked = std::mem::take(&mut self.sustained);
            self.release(parked.into_iter().collect());
        }
    }

    /// Start a note that releases itself after `duration`. Overlapping
    /// requests for the same note share one sounding instance.
    pub fn play_transient(&mut self, note: u8, velocity: u8, duration: Micros) {
        let count = self.transients.entry(note).or_insert(0);
        *count += 1;
        if *count == 1 {
            self.note_on(note, velocity);
        }
        let at = self.now + duration;
        self.scheduler.schedule(at, Lane::Transient, Job::Release { note });
    }

    /// Drop one transient reference; the last one out turns the note off.
    pub fn release_transient(&mut self, note: u8) {
        let Some(count) = self.transients.get_mut(&note) else {
            return;
        };
        *count -= 1;
        if *count > 0 {
            return;
        }
        self.transients.remove(&note);
        if !self.sounding(note) {
            self.note_off(note);
        }
    }

    /// Chord hit as transients, strummed when the instrument calls for it.
    /// Strummed notes after the first are queued on `lane`.
    pub fn play_chord(
        &mut self,
        notes: &[u8],
        velocity: u8,
        duration: Micros,
        settings: &Settings,
        lane: Lane,
    ) {
        let strum = notes.len() > 1
            && settings.strum
            && (settings.instrument != Instrument::Piano || settings.power_chords);
        if !strum {
            for &note in notes {
                self.play_transient(note, velocity, duration);
            }
            return;
        }
        for (i, &note) in notes.iter().enumerate() {
            if i == 0 {
                self.play_transient(note, velocity, duration);
                continue;
            }
            let at = self.now + i as Micros * STRUM_SPACING;
            let job = Job::NoteOn {
                note,
                velocity,
                duration,
            };
            self.scheduler.schedule(at, lane, job);
        }
    }

    /// Notes started `spacing` apart on the steps lane, so stopping the
    /// script or a panic drops steps that have not sounded yet.
    pub fn play_arpeggio(&mut self, notes: &[u8], velocity: u8, duration: Micros, spacing: Micros) {
        for (i, &note) in notes.iter().enumerate() {
            if i == 0 {
                self.play_transient(note, velocity, duration);
                continue;
            }
            let at = self.now + i as Micros * spacing;
            let job = Job::NoteOn {
                note,
                velocity,
                duration,
            };
            self.scheduler.schedule(at, Lane::Steps, job);
        }
    }

    /// One chug hit for `key`, then the next hit one interval after `at`.
    /// The loop ends when the key is released, the performer is disarmed or
    /// the play style is no longer a chug.
    pub fn chug_tick(&mut self, key: KeyId, at: Micros, settings: &Settings, mapper: &NoteMapper) {
        let interval = match settings.play_style.chug_interval(settings.bpm) {
            Some(interval) if settings.armed => interval,
            _ => {
                if self.chugs.remove(&key).is_some() {
                    debug!("chug loop for key {} ended", key);
                }
                return;
            }
        };
        let Some(press) = self.chugs.get(&key).cloned() else {
            return;
        };
        let notes = self.resolve(&press, settings, mapper);
        if !notes.is_empty() {
            self.play_chord(
                &notes,
                settings.key_velocity,
                interval * 6 / 10,
                settings,
                Lane::Transient,
            );
        }
        self.scheduler
            .schedule(at + interval, Lane::Chug(key), Job::ChugTick { key });
    }

    pub fn pad_down(&mut self, x: f32, y: f32, settings: &Settings, mapper: &NoteMapper) {
        if !settings.armed {
            return;
        }
        let Some(note) = pad_note(x, mapper) else {
            return;
        };
        let notes = if settings.power_chords {
            power_chord(note)
        } else {
            vec![note]
        };
        let velocity = pad_velocity(y);
        for &n in &notes {
            self.note_on(n, velocity);
        }
        self.pad_notes = notes;
        self.pad_note = Some(note);
    }

    /// Drag on the pad. Moving onto a new note crossfades: the old notes are
    /// released (or sustained) before the new ones start.
    pub fn pad_move(&mut self, x: f32, y: f32, settings: &Settings, mapper: &NoteMapper) {
        if self.pad_note.is_none() {
            self.pad_down(x, y, settings, mapper);
            return;
        }
        let target = pad_note(x, mapper);
        if target == self.pad_note {
            return;
        }
        self.pad_up();
        self.pad_down(x, y, settings, mapper);
    }

    pub fn pad_up(&mut self) {
        let notes = std::mem::take(&mut self.pad_notes);
        self.pad_note = None;
        self.release(notes);
    }

    /// Silence everything and forget all bookkeeping. Safe to call repeatedly.
    pub fn panic(&mut self) {
        for key in self.chugs.keys().copied().collect::<Vec<_>>() {
            self.scheduler.bump(Lane::Chug(key));
        }
        self.chugs.clear();
        self.scheduler.bump(Lane::Transient);
        self.scheduler.bump(Lane::Steps);

        let mut notes: BTreeSet<u8> = self.held.drain().flat_map(|(_, notes)| notes).collect();
        notes.append(&mut self.sustained);
        notes.extend(self.pad_notes.drain(..));
        notes.extend(std::mem::take(&mut self.transients).into_keys());
        self.pad_note = None;
        self.sustain = false;

        if notes.is_empty() {
            return;
        }
        info!("panic: releasing {} note(s)", notes.len());
        for note in notes {
            self.note_off(note);
        }
    }

    /// Run a due job that belongs to the live side (everything but script ticks).
    pub fn run_job(&mut self, at: Micros, job: Job, settings: &Settings, mapper: &NoteMapper) {
        match job {
            Job::NoteOn {
                note,
                velocity,
                duration,
            } => self.play_transient(note, velocity, duration),
            Job::Release { note } => self.release_transient(note),
            Job::ChugTick { key } => self.chug_tick(key, at, settings, mapper),
            Job::ScriptTick => {}
        }
    }
}
