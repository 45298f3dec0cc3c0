//! The note output edge: a sink for note-on/note-off plus optional capabilities.
//!
//! Concrete sinks opt into capabilities by overriding the accessor methods;
//! callers ask at runtime (`sink.instruments()`) instead of relying on
//! a type hierarchy.

use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::KeybandError;

/// Microseconds on the performance timeline.
pub type Micros = u64;

/// Named timbres every instrument-capable sink understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Instrument {
    Piano,
    Guitar,
    Overdrive,
    SynthLead,
}

impl Instrument {
    pub const ALL: [Instrument; 4] = [
        Instrument::Piano,
        Instrument::Guitar,
        Instrument::Overdrive,
        Instrument::SynthLead,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Instrument::Piano => "Piano",
            Instrument::Guitar => "Guitar",
            Instrument::Overdrive => "Overdrive",
            Instrument::SynthLead => "Synth Lead",
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Instrument {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "piano" => Ok(Instrument::Piano),
            "guitar" => Ok(Instrument::Guitar),
            "overdrive" | "distortion" => Ok(Instrument::Overdrive),
            "synth" | "synthlead" | "synth-lead" | "synth lead" => Ok(Instrument::SynthLead),
            other => Err(format!("unknown instrument '{}'", other)),
        }
    }
}

pub trait InstrumentSelect {
    fn select_instrument(&mut self, instrument: Instrument);
}

pub trait SoundBankLoad {
    /// Load a custom sound bank. On failure the current sound must keep playing.
    fn load_sound_bank(&mut self, path: &Path) -> Result<(), KeybandError>;
}

/// Consumer of note events. Called only from the performer's thread.
pub trait NoteSink {
    fn note_on(&mut self, note: u8, velocity: u8);
    fn note_off(&mut self, note: u8);

    /// Display name of the current sound.
    fn sound_name(&self) -> String {
        String::from("default")
    }

    /// Informs the sink of the timeline position before events are emitted.
    fn advance_clock(&mut self, _now: Micros) {}

    fn instruments(&mut self) -> Option<&mut dyn InstrumentSelect> {
        None
    }

    fn sound_banks(&mut self) -> Option<&mut dyn SoundBankLoad> {
        None
    }
}

impl<S: NoteSink + ?Sized> NoteSink for Box<S> {
    fn note_on(&mut self, note: u8, velocity: u8) {
        (**self).note_on(note, velocity)
    }

    fn note_off(&mut self, note: u8) {
        (**self).note_off(note)
    }

    fn sound_name(&self) -> String {
        (**self).sound_name()
    }

    fn advance_clock(&mut self, now: Micros) {
        (**self).advance_clock(now)
    }

    fn instruments(&mut self) -> Option<&mut dyn InstrumentSelect> {
        (**self).instruments()
    }

    fn sound_banks(&mut self) -> Option<&mut dyn SoundBankLoad> {
        (**self).sound_banks()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EventKind {
    On { note: u8, velocity: u8 },
    Off { note: u8 },
}

/// A note event stamped with its position on the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputEvent {
    pub at_us: Micros,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl fmt::Display for OutputEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = self.at_us as f64 / 1000.0;
        match self.kind {
            EventKind::On { note, velocity } => write!(
                f,
                "{:>10.1}ms  on   {:<4} vel {}",
                ms,
                crate::theory::note_name(note),
                velocity
            ),
            EventKind::Off { note } => {
                write!(f, "{:>10.1}ms  off  {}", ms, crate::theory::note_name(note))
            }
        }
    }
}

/// Sink that records every event. Used for dry runs and tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    now: Micros,
    events: Vec<OutputEvent>,
    instrument: Option<Instrument>,
    bank: Option<String>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[OutputEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<OutputEvent> {
        std::mem::take(&mut self.events)
    }

    /// Notes currently on (ons minus offs), sorted.
    pub fn sounding(&self) -> Vec<u8> {
        let mut counts = [0i32; 128];
        for e in &self.events {
            match e.kind {
                EventKind::On { note, .. } => counts[note as usize] += 1,
                EventKind::Off { note } => counts[note as usize] -= 1,
            }
        }
        (0..128u8).filter(|&n| counts[n as usize] > 0).collect()
    }
}

impl NoteSink for RecordingSink {
    fn note_on(&mut self, note: u8, velocity: u8) {
        self.events.push(OutputEvent {
            at_us: self.now,
            kind: EventKind::On { note, velocity },
        });
    }

    fn note_off(&mut self, note: u8) {
        self.events.push(OutputEvent {
            at_us: self.now,
            kind: EventKind::Off { note },
        });
    }

    fn sound_name(&self) -> String {
        match (&self.bank, self.instrument) {
            (Some(bank), _) => bank.clone(),
            (None, Some(instrument)) => instrument.name().to_string(),
            (None, None) => String::from("recorder"),
        }
    }

    fn advance_clock(&mut self, now: Micros) {
        self.now = now;
    }

    fn instruments(&mut self) -> Option<&mut dyn InstrumentSelect> {
        Some(self)
    }

    fn sound_banks(&mut self) -> Option<&mut dyn SoundBankLoad> {
        Some(self)
    }
}

impl InstrumentSelect for RecordingSink {
    fn select_instrument(&mut self, instrument: Instrument) {
        self.instrument = Some(instrument);
        self.bank = None;
    }
}

impl SoundBankLoad for RecordingSink {
    /// Accepts any existing file; the recorder has nothing to decode.
    fn load_sound_bank(&mut self, path: &Path) -> Result<(), KeybandError> {
        if !path.is_file() {
            return Err(KeybandError::SoundBank(format!(
                "no such file: {}",
                path.display()
            )));
        }
        self.bank = Some(path.display().to_string());
        Ok(())
    }
}

/// Sink with no capabilities beyond notes.
#[derive(Debug, Default)]
pub struct NullSink;

impl NoteSink for NullSink {
    fn note_on(&mut self, _note: u8, _velocity: u8) {}
    fn note_off(&mut self, _note: u8) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_timestamps() {
        let mut sink = RecordingSink::new();
        sink.advance_clock(1_000);
        sink.note_on(60, 100);
        sink.advance_clock(2_500);
        sink.note_off(60);
        assert_eq!(
            sink.events(),
            &[
                OutputEvent {
                    at_us: 1_000,
                    kind: EventKind::On {
                        note: 60,
                        velocity: 100
                    }
                },
                OutputEvent {
                    at_us: 2_500,
                    kind: EventKind::Off { note: 60 }
                },
            ]
        );
        assert!(sink.sounding().is_empty());
    }

    #[test]
    fn test_capability_query() {
        let mut recorder = RecordingSink::new();
        assert!(recorder.instruments().is_some());
        let mut null = NullSink;
        assert!(null.instruments().is_none());
        assert!(null.sound_banks().is_none());
    }

    #[test]
    fn test_missing_bank_is_an_error() {
        let mut recorder = RecordingSink::new();
        recorder.select_instrument(Instrument::Guitar);
        let result = recorder.load_sound_bank(Path::new("/definitely/not/here.instr"));
        assert!(matches!(result, Err(KeybandError::SoundBank(_))));
        assert_eq!(recorder.sound_name(), "Guitar");
    }

    #[test]
    fn test_event_json_shape() {
        let event = OutputEvent {
            at_us: 5,
            kind: EventKind::On {
                note: 64,
                velocity: 90,
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"atUs":5,"type":"on","note":64,"velocity":90}"#);
    }

    #[test]
    fn test_instrument_from_str() {
        assert_eq!("Guitar".parse::<Instrument>(), Ok(Instrument::Guitar));
        assert_eq!("synth".parse::<Instrument>(), Ok(Instrument::SynthLead));
        assert!("kazoo".parse::<Instrument>().is_err());
    }
}
