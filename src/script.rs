//! Deterministic text-to-performance engine.
//!
//! One character of the script is consumed per grid tick, looping at the end
//! of the text. Each tick yields a list of [`Action`]s; the performer turns
//! them into note events and schedules the next tick.
//!
//! # Script syntax
//! - whitespace: word boundary (bass re-hit, or chord advance in `space` mode)
//! - `,` rest, `-` hold (also `_` in linear mode)
//! - `.` resolve to the tonic, `!` accented chord hit
//! - `? ; : |` ignored
//! - anything else is handed to the active [`Style`]
//!
//! Linear mode adds `/` (next chord + bass), `*` (chord hit), `^`/`v`
//! (arpeggios) and `1`-`5` (chord tone by index).

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use log::{debug, trace};

use crate::chart::ChordChart;
use crate::chord::chord_notes;
use crate::mapper::NoteMapper;
use crate::output::Micros;
use crate::styles::{self, Pick};
use crate::theory::to_midi;
use crate::voice_leading::smooth;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    BalladPick,
    RockStrum,
    PowerChug,
    SynthPulse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    Prose,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChordAdvance {
    EveryBar,
    OnSpaces,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Grid {
    Off,
    Eighths,
    Sixteenths,
    Triplets,
}

impl Grid {
    /// Tick length at `bpm` quarter notes per minute. `Off` ticks in sixteenths.
    pub fn interval_us(self, bpm: u32) -> Micros {
        let quarter = 60_000_000 / bpm.max(1) as u64;
        match self {
            Grid::Eighths => quarter / 2,
            Grid::Sixteenths | Grid::Off => quarter / 4,
            Grid::Triplets => quarter / 3,
        }
    }

    pub fn ticks_per_bar(self) -> u64 {
        match self {
            Grid::Eighths => 8,
            Grid::Sixteenths | Grid::Off => 16,
            Grid::Triplets => 12,
        }
    }
}

impl FromStr for Style {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ballad" | "pick" | "ballad-pick" => Ok(Style::BalladPick),
            "rock" | "strum" | "rock-strum" => Ok(Style::RockStrum),
            "chug" | "power" | "power-chug" => Ok(Style::PowerChug),
            "pulse" | "synth" | "synth-pulse" => Ok(Style::SynthPulse),
            other => Err(format!("unknown style '{}'", other)),
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Style::BalladPick => "ballad",
            Style::RockStrum => "rock",
            Style::PowerChug => "chug",
            Style::SynthPulse => "pulse",
        })
    }
}

impl FromStr for InputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prose" | "normal" => Ok(InputMode::Prose),
            "linear" => Ok(InputMode::Linear),
            other => Err(format!("unknown input mode '{}'", other)),
        }
    }
}

impl fmt::Display for InputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InputMode::Prose => "prose",
            InputMode::Linear => "linear",
        })
    }
}

impl FromStr for ChordAdvance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bar" | "bars" | "every-bar" => Ok(ChordAdvance::EveryBar),
            "space" | "spaces" | "on-spaces" => Ok(ChordAdvance::OnSpaces),
            other => Err(format!("unknown chord advance '{}'", other)),
        }
    }
}

impl fmt::Display for ChordAdvance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChordAdvance::EveryBar => "bar",
            ChordAdvance::OnSpaces => "space",
        })
    }
}

impl FromStr for Grid {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(Grid::Off),
            "8" | "8ths" | "eighths" => Ok(Grid::Eighths),
            "16" | "16ths" | "sixteenths" => Ok(Grid::Sixteenths),
            "12" | "triplets" => Ok(Grid::Triplets),
            other => Err(format!("unknown grid '{}'", other)),
        }
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Grid::Off => "off",
            Grid::Eighths => "8ths",
            Grid::Sixteenths => "16ths",
            Grid::Triplets => "triplets",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScriptSettings {
    pub style: Style,
    pub input_mode: InputMode,
    pub advance: ChordAdvance,
    pub grid: Grid,
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            style: Style::BalladPick,
            input_mode: InputMode::Prose,
            advance: ChordAdvance::EveryBar,
            grid: Grid::Off,
        }
    }
}

/// A note-producing decision made during one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// A single transient note
    Note { note: u8, velocity: u8, duration: Micros },
    /// Several notes struck together (strummed when strumming applies)
    Chord { notes: Vec<u8>, velocity: u8, duration: Micros },
    /// Notes started one after another, `spacing` apart
    Arpeggio {
        notes: Vec<u8>,
        velocity: u8,
        duration: Micros,
        spacing: Micros,
    },
}

/// Live settings each tick reads afresh.
pub struct TickInput<'a> {
    pub mapper: &'a NoteMapper,
    pub power_chords: bool,
    pub bpm: u32,
}

const ARPEGGIO_SPACING_MIN: Micros = 12_000;
const ARPEGGIO_SPACING_MAX: Micros = 45_000;

/// Velocity from the spacing between ticks: slower ticks play louder.
fn base_velocity(spacing: Micros, accent: bool) -> u8 {
    let ms = (spacing / 1000).min(500) as u32;
    let velocity = 56 + ms / 8 + if accent { 20 } else { 0 };
    velocity.min(127) as u8
}

/// Velocity computed on first use and reused for the rest of the tick.
struct Dynamics {
    spacing: Micros,
    accent: bool,
    cached: Option<u8>,
}

impl Dynamics {
    fn velocity(&mut self) -> u8 {
        let (spacing, accent) = (self.spacing, self.accent);
        *self.cached.get_or_insert_with(|| base_velocity(spacing, accent))
    }
}

fn is_hold(c: char, linear: bool) -> bool {
    c == '-' || (linear && c == '_')
}

/// Number of hold characters directly after `index`. Never wraps past the
/// end of the text.
pub fn hold_run_after(text: &[char], index: usize, linear: bool) -> usize {
    text.iter()
        .skip(index + 1)
        .take_while(|&&c| is_hold(c, linear))
        .count()
}

#[derive(Debug, Default)]
pub struct ScriptEngine {
    pub settings: ScriptSettings,
    text: Vec<char>,
    chart: ChordChart,
    tick_index: u64,
    virtual_time: Micros,
    last_tick_time: Option<Micros>,
    chart_index: usize,
    script_index: usize,
    /// Last melodic note and the chart index it was played under
    last_melodic: Option<(u8, usize)>,
    last_bar_chord: Option<usize>,
}

impl ScriptEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_text(&mut self, text: &str) {
        self.text = text.chars().collect();
        if self.script_index >= self.text.len() {
            self.script_index = 0;
        }
    }

    pub fn text(&self) -> String {
        self.text.iter().collect()
    }

    pub fn set_chart(&mut self, chart: ChordChart) {
        self.chart = chart;
        self.last_bar_chord = None;
        self.last_melodic = None;
        if self.chart_index >= self.chart.len() {
            self.chart_index = 0;
        }
    }

    pub fn chart(&self) -> &ChordChart {
        &self.chart
    }

    pub fn tick_index(&self) -> u64 {
        self.tick_index
    }

    pub fn script_index(&self) -> usize {
        self.script_index
    }

    pub fn chart_index(&self) -> usize {
        self.chart_index
    }

    /// Rewind to the start of the text and chart.
    pub fn reset(&mut self) {
        self.tick_index = 0;
        self.virtual_time = 0;
        self.last_tick_time = None;
        self.chart_index = 0;
        self.script_index = 0;
        self.last_melodic = None;
        self.last_bar_chord = None;
    }

    /// Tick length under the current grid.
    pub fn interval(&self, bpm: u32) -> Micros {
        self.settings.grid.interval_us(bpm)
    }

    /// Run one tick. Position always advances, whatever the tick did.
    pub fn tick(&mut self, input: &TickInput) -> Vec<Action> {
        let interval = self.interval(input.bpm);
        let actions = self.perform(input, interval);
        trace!(
            "tick {} char {:?}: {} action(s)",
            self.tick_index,
            self.text.get(self.script_index),
            actions.len()
        );
        self.advance(interval);
        actions
    }

    fn advance(&mut self, interval: Micros) {
        self.last_tick_time = Some(self.virtual_time);
        self.virtual_time += interval;
        self.tick_index += 1;
        if !self.text.is_empty() {
            self.script_index = (self.script_index + 1) % self.text.len();
        }
    }

    fn tones(&self, input: &TickInput) -> Vec<u8> {
        match self.chart.chord_at(self.chart_index) {
            Some(chord) => chord_notes(
                chord,
                input.mapper.base_note(),
                input.mapper.root.pitch_class,
                input.power_chords,
            ),
            None => Vec::new(),
        }
    }

    fn next_chord(&mut self) {
        if !self.chart.is_empty() {
            self.chart_index = (self.chart_index + 1) % self.chart.len();
            self.last_melodic = None;
            debug!("chord advanced to index {}", self.chart_index);
        }
    }

    fn perform(&mut self, input: &TickInput, interval: Micros) -> Vec<Action> {
        let mut out = Vec::new();
        let bar = self.settings.grid.ticks_per_bar();
        let bar_len = bar as usize;
        let tick_in_bar = (self.tick_index % bar) as usize;
        let current = self.text.get(self.script_index).copied();
        let mut dynamics = Dynamics {
            spacing: self
                .last_tick_time
                .map(|t| self.virtual_time - t)
                .unwrap_or(interval),
            accent: current.is_some_and(|c| c.is_uppercase() || c == '!'),
            cached: None,
        };

        if self.settings.advance == ChordAdvance::EveryBar && !self.chart.is_empty() {
            let index = (self.tick_index / bar) as usize % self.chart.len();
            if self.last_bar_chord != Some(index) {
                self.chart_index = index;
                self.last_bar_chord = Some(index);
                self.last_melodic = None;
                if let Some(&bass) = self.tones(input).first() {
                    out.push(Action::Note {
                        note: bass,
                        velocity: dynamics.velocity(),
                        duration: interval * 4,
                    });
                }
            }
        }

        let Some(c) = current else {
            return out;
        };
        let linear = self.settings.input_mode == InputMode::Linear;

        if c.is_whitespace() {
            self.word_boundary(input, interval, &mut dynamics, &mut out);
            return out;
        }
        if c == ',' || is_hold(c, linear) {
            return out;
        }

        let floor = self.hold_floor(tick_in_bar, bar_len, interval, linear);
        if linear && self.linear_command(c, input, interval, floor, &mut dynamics, &mut out) {
            return out;
        }

        match c {
            '.' => self.resolve(input, interval, floor, &mut dynamics, &mut out),
            '!' => self.chord_hit(input, interval, floor, &mut dynamics, &mut out),
            '?' | ';' | ':' | '|' => {}
            _ => {
                let tones = self.tones(input);
                if tones.is_empty() {
                    self.mapped_note(c, input, interval, floor, &mut dynamics, &mut out);
                } else {
                    let pick = Pick {
                        character: c,
                        tones: &tones,
                        chord_index: self.chart_index,
                        tick_in_bar,
                        bar_len,
                        velocity: dynamics.velocity(),
                        interval,
                        hold_floor: floor,
                    };
                    out.extend(styles::perform(self.settings.style, &pick, &mut self.last_melodic));
                }
            }
        }
        out
    }

    /// Minimum duration for a note followed by hold characters. Zero when
    /// nothing is held. With several chords advancing per bar the hold stops
    /// at the bar line.
    fn hold_floor(&self, tick_in_bar: usize, bar_len: usize, interval: Micros, linear: bool) -> Micros {
        let run = hold_run_after(&self.text, self.script_index, linear);
        if run == 0 {
            return 0;
        }
        let mut held = run + 1;
        if self.settings.advance == ChordAdvance::EveryBar && self.chart.len() > 1 {
            held = held.min(bar_len - tick_in_bar);
        }
        held as Micros * interval
    }

    fn word_boundary(
        &mut self,
        input: &TickInput,
        interval: Micros,
        dynamics: &mut Dynamics,
        out: &mut Vec<Action>,
    ) {
        match self.settings.advance {
            ChordAdvance::EveryBar => {
                if let Some(&bass) = self.tones(input).first() {
                    out.push(Action::Note {
                        note: bass,
                        velocity: dynamics.velocity(),
                        duration: interval * 2,
                    });
                }
            }
            ChordAdvance::OnSpaces => {
                if self.chart.is_empty() {
                    return;
                }
                self.next_chord();
                out.push(Action::Chord {
                    notes: self.tones(input),
                    velocity: dynamics.velocity(),
                    duration: interval * 4,
                });
            }
        }
    }

    fn linear_command(
        &mut self,
        c: char,
        input: &TickInput,
        interval: Micros,
        floor: Micros,
        dynamics: &mut Dynamics,
        out: &mut Vec<Action>,
    ) -> bool {
        match c {
            '/' => {
                self.next_chord();
                if let Some(&bass) = self.tones(input).first() {
                    out.push(Action::Note {
                        note: bass,
                        velocity: dynamics.velocity(),
                        duration: (interval * 4).max(floor),
                    });
                }
            }
            '*' | '!' => self.chord_hit(input, interval, floor, dynamics, out),
            '^' | 'v' => {
                let mut notes: Vec<u8> = self.tones(input).into_iter().take(4).collect();
                if c == 'v' {
                    notes.reverse();
                }
                if !notes.is_empty() {
                    out.push(Action::Arpeggio {
                        notes,
                        velocity: dynamics.velocity(),
                        duration: (interval * 2).max(floor),
                        spacing: (interval / 4).clamp(ARPEGGIO_SPACING_MIN, ARPEGGIO_SPACING_MAX),
                    });
                }
            }
            '1'..='5' => {
                let index = c as usize - '1' as usize;
                if let Some(&note) = self.tones(input).get(index) {
                    out.push(Action::Note {
                        note,
                        velocity: dynamics.velocity(),
                        duration: (interval * 2).max(floor),
                    });
                }
            }
            '.' => self.resolve(input, interval, floor, dynamics, out),
            _ => return false,
        }
        true
    }

    fn chord_hit(
        &mut self,
        input: &TickInput,
        interval: Micros,
        floor: Micros,
        dynamics: &mut Dynamics,
        out: &mut Vec<Action>,
    ) {
        let notes = self.tones(input);
        if !notes.is_empty() {
            out.push(Action::Chord {
                notes,
                velocity: dynamics.velocity(),
                duration: (interval * 2).max(floor),
            });
        }
    }

    /// The tonic an octave above the base note.
    fn resolve(
        &mut self,
        input: &TickInput,
        interval: Micros,
        floor: Micros,
        dynamics: &mut Dynamics,
        out: &mut Vec<Action>,
    ) {
        if let Some(tonic) = to_midi(input.mapper.base_note() + 12) {
            out.push(Action::Note {
                note: tonic,
                velocity: dynamics.velocity(),
                duration: (interval * 4).max(floor),
            });
        }
    }

    /// Without a chart, characters play through the key layout.
    fn mapped_note(
        &mut self,
        c: char,
        input: &TickInput,
        interval: Micros,
        floor: Micros,
        dynamics: &mut Dynamics,
        out: &mut Vec<Action>,
    ) {
        let Some(raw) = input.mapper.midi_note_for_char(c) else {
            return;
        };
        let note = smooth(raw, self.last_melodic.map(|(n, _)| n));
        self.last_melodic = Some((note, self.chart_index));
        out.push(Action::Note {
            note,
            velocity: dynamics.velocity(),
            duration: (interval * 2).max(floor),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    fn engine(text: &str, chart: &str, settings: ScriptSettings) -> ScriptEngine {
        let mut engine = ScriptEngine::new();
        engine.settings = settings;
        engine.set_text(text);
        engine.set_chart(ChordChart::parse(chart));
        engine
    }

    fn run(engine: &mut ScriptEngine, ticks: usize) -> Vec<Vec<Action>> {
        let mapper = NoteMapper::default();
        let input = TickInput {
            mapper: &mapper,
            power_chords: false,
            bpm: 120,
        };
        (0..ticks).map(|_| engine.tick(&input)).collect()
    }

    #[test]
    fn test_hold_run_never_wraps() {
        assert_eq!(hold_run_after(&chars("a--b-"), 0, false), 2);
        assert_eq!(hold_run_after(&chars("a--b-"), 3, false), 1);
        assert_eq!(hold_run_after(&chars("--a"), 2, false), 0);
        assert_eq!(hold_run_after(&chars("a__"), 0, false), 0);
        assert_eq!(hold_run_after(&chars("a__"), 0, true), 2);
    }

    #[test]
    fn test_grid_timing() {
        assert_eq!(Grid::Eighths.interval_us(120), 250_000);
        assert_eq!(Grid::Sixteenths.interval_us(120), 125_000);
        assert_eq!(Grid::Triplets.interval_us(100), 200_000);
        assert_eq!(Grid::Off.interval_us(120), 125_000);
        assert_eq!(Grid::Triplets.ticks_per_bar(), 12);
        assert_eq!(Grid::Off.ticks_per_bar(), 16);
    }

    #[test]
    fn test_script_loops_over_text() {
        let mut e = engine("ab", "", ScriptSettings::default());
        run(&mut e, 5);
        assert_eq!(e.tick_index(), 5);
        assert_eq!(e.script_index(), 1);
    }

    #[test]
    fn test_rest_and_hold_are_silent() {
        let mut e = engine(",-", "", ScriptSettings::default());
        let ticks = run(&mut e, 2);
        assert!(ticks.iter().all(|t| t.is_empty()));
    }

    #[test]
    fn test_every_bar_plays_turnaround_on_chord_change() {
        let settings = ScriptSettings {
            grid: Grid::Eighths,
            ..ScriptSettings::default()
        };
        let mut e = engine(",", "Em C", settings);
        let ticks = run(&mut e, 9);
        // Em bass on tick 0, C bass (C3 = 48) on tick 8
        assert!(matches!(ticks[0][..], [Action::Note { note: 40, .. }]));
        assert!(ticks[1..8].iter().all(|t| t.is_empty()));
        assert!(matches!(ticks[8][..], [Action::Note { note: 48, .. }]));
        assert_eq!(e.chart_index(), 1);
    }

    #[test]
    fn test_on_spaces_advances_and_hits_chord() {
        let settings = ScriptSettings {
            advance: ChordAdvance::OnSpaces,
            ..ScriptSettings::default()
        };
        let mut e = engine(" ", "Em C", settings);
        let ticks = run(&mut e, 1);
        assert_eq!(e.chart_index(), 1);
        match &ticks[0][..] {
            [Action::Chord { notes, .. }] => assert_eq!(notes, &vec![48, 60, 64, 67]),
            other => panic!("expected chord hit, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_plays_tonic_octave() {
        let mut e = engine(".", "", ScriptSettings::default());
        let ticks = run(&mut e, 1);
        assert!(matches!(ticks[0][..], [Action::Note { note: 64, .. }]));
    }

    #[test]
    fn test_accent_raises_velocity() {
        let settings = ScriptSettings {
            advance: ChordAdvance::OnSpaces,
            ..ScriptSettings::default()
        };
        let mut e = engine("*!", "Em", settings);
        let ticks = run(&mut e, 2);
        let soft = match &ticks[0][..] {
            [Action::Note { velocity, .. }] => *velocity,
            other => panic!("expected picked note, got {:?}", other),
        };
        let loud = match &ticks[1][..] {
            [Action::Chord { velocity, .. }] => *velocity,
            other => panic!("expected chord, got {:?}", other),
        };
        assert!(loud > soft);
    }

    #[test]
    fn test_hold_floor_extends_note() {
        let settings = ScriptSettings {
            style: Style::PowerChug,
            advance: ChordAdvance::OnSpaces,
            grid: Grid::Sixteenths,
            ..ScriptSettings::default()
        };
        let mut e = engine("a---", "Em", settings);
        let ticks = run(&mut e, 1);
        match &ticks[0][..] {
            [Action::Chord { duration, .. }] => assert_eq!(*duration, 4 * 125_000),
            other => panic!("expected chug chord, got {:?}", other),
        }
    }

    #[test]
    fn test_hold_capped_at_bar_line_with_several_chords() {
        let settings = ScriptSettings {
            style: Style::PowerChug,
            grid: Grid::Eighths,
            ..ScriptSettings::default()
        };
        // 'a' lands on tick 6 of an 8-tick bar; only 2 ticks remain
        let mut e = engine(",,,,,,a-----", "Em C", settings);
        let ticks = run(&mut e, 7);
        match &ticks[6][..] {
            [Action::Chord { duration, .. }] => assert_eq!(*duration, 2 * 250_000),
            other => panic!("expected chug chord, got {:?}", other),
        }
    }

    #[test]
    fn test_linear_commands() {
        let settings = ScriptSettings {
            input_mode: InputMode::Linear,
            advance: ChordAdvance::OnSpaces,
            ..ScriptSettings::default()
        };
        let mut e = engine("/^v2_", "Em C", settings);
        let ticks = run(&mut e, 5);
        assert_eq!(e.chart_index(), 1);
        assert!(matches!(ticks[0][..], [Action::Note { note: 48, .. }]));
        match (&ticks[1][..], &ticks[2][..]) {
            ([Action::Arpeggio { notes: up, spacing, .. }], [Action::Arpeggio { notes: down, .. }]) => {
                assert_eq!(up, &vec![48, 60, 64, 67]);
                assert_eq!(down, &vec![67, 64, 60, 48]);
                assert_eq!(*spacing, 31_250);
            }
            other => panic!("expected arpeggios, got {:?}", other),
        }
        assert!(matches!(ticks[3][..], [Action::Note { note: 60, .. }]));
        assert!(ticks[4].is_empty());
    }

    #[test]
    fn test_without_chart_characters_follow_layout() {
        let mut e = engine("qw", "", ScriptSettings::default());
        let ticks = run(&mut e, 2);
        assert!(matches!(ticks[0][..], [Action::Note { note: 52, .. }]));
        assert!(matches!(ticks[1][..], [Action::Note { note: 55, .. }]));
    }

    #[test]
    fn test_reset_rewinds() {
        let mut e = engine("abc", "Em C", ScriptSettings::default());
        run(&mut e, 20);
        e.reset();
        assert_eq!((e.tick_index(), e.script_index(), e.chart_index()), (0, 0, 0));
    }

    #[test]
    fn test_keywords_round_trip() {
        assert_eq!("triplets".parse::<Grid>(), Ok(Grid::Triplets));
        assert_eq!(Grid::Triplets.to_string(), "triplets");
        assert_eq!("rock".parse::<Style>(), Ok(Style::RockStrum));
        assert_eq!(Style::SynthPulse.to_string(), "pulse");
        assert_eq!("space".parse::<ChordAdvance>(), Ok(ChordAdvance::OnSpaces));
        assert!("waltz".parse::<Style>().is_err());
    }
}
