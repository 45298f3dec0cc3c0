//! The performer owns every piece of state and is the single place where
//! work runs: commands, script ticks, chug loops and transient releases are
//! all applied here, one at a time, in timeline order.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::{debug, info, warn};

use crate::chart::ChordChart;
use crate::controller::{KeyPress, LiveController, PlayStyle};
use crate::error::KeybandError;
use crate::layout::KeyLayout;
use crate::mapper::{MappingMode, NoteMapper};
use crate::output::{Instrument, Micros, NoteSink};
use crate::scheduler::{Job, KeyId, Lane};
use crate::script::{Action, ChordAdvance, Grid, InputMode, ScriptEngine, Style, TickInput};
use crate::theory::{PitchClass, RootNote, Scale, note_name};

const MIN_BPM: u32 = 20;
const MAX_BPM: u32 = 300;

/// Where performance input comes from while armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InputSource {
    Keys,
    Script,
}

impl FromStr for InputSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keys" | "keyboard" => Ok(InputSource::Keys),
            "script" | "text" => Ok(InputSource::Script),
            other => Err(format!("unknown input source '{}'", other)),
        }
    }
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InputSource::Keys => "keys",
            InputSource::Script => "script",
        })
    }
}

/// Performance settings read afresh by every key press and tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub armed: bool,
    pub source: InputSource,
    pub play_style: PlayStyle,
    pub bpm: u32,
    pub strum: bool,
    pub power_chords: bool,
    pub instrument: Instrument,
    pub voice_leading: bool,
    /// Key that acts as the sustain pedal
    pub sustain_key: char,
    pub key_velocity: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            armed: false,
            source: InputSource::Keys,
            play_style: PlayStyle::Hold,
            bpm: 100,
            strum: true,
            power_chords: false,
            instrument: Instrument::Piano,
            voice_leading: false,
            sustain_key: ' ',
            key_velocity: 100,
        }
    }
}

/// Every state change the performer accepts. Key listeners and the session
/// loader talk to the performer only through these.
#[derive(Debug, Clone)]
pub enum Command {
    Arm,
    Disarm,
    Panic,
    SetSource(InputSource),
    SetMappingMode(MappingMode),
    SetRoot(RootNote),
    SetScale(Scale),
    SetOctaveOffset(i32),
    SetRowOffset(i32),
    SetInstrument(Instrument),
    SetTempo(u32),
    SetPlayStyle(PlayStyle),
    SetStrum(bool),
    SetPowerChords(bool),
    SetVoiceLeading(bool),
    SetSustain(bool),
    SetLayout(KeyLayout),
    ClearLayout,
    SetChart(String),
    SetScript(String),
    SetStyle(Style),
    SetInputMode(InputMode),
    SetChordAdvance(ChordAdvance),
    SetGrid(Grid),
    RestartScript,
    PadDown { x: f32, y: f32 },
    PadMove { x: f32, y: f32 },
    PadUp,
    KeyDown(KeyPress),
    KeyUp { key: KeyId, character: Option<char> },
    LoadSoundBank(PathBuf),
}

pub type SubscriptionId = u64;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptStatus {
    pub running: bool,
    pub style: Style,
    pub input_mode: InputMode,
    pub advance: ChordAdvance,
    pub grid: Grid,
    pub tick: u64,
    pub script_index: usize,
    pub chart_index: usize,
    pub chord: Option<String>,
}

/// Everything a UI needs to draw the current state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub armed: bool,
    pub source: InputSource,
    pub mode: MappingMode,
    pub root: String,
    pub scale: String,
    pub layout: String,
    pub octave_offset: i32,
    pub row_offset: i32,
    pub instrument: Instrument,
    pub sound: String,
    pub bpm: u32,
    pub play_style: PlayStyle,
    pub strum: bool,
    pub power_chords: bool,
    pub voice_leading: bool,
    pub sustain: bool,
    pub last_note: Option<String>,
    pub last_velocity: u8,
    pub held_keys: Vec<KeyId>,
    pub script: ScriptStatus,
    /// Last user-visible message, e.g. a failed bank load
    pub status: Option<String>,
}

/// Display info for one key of the layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyLabel {
    pub key: String,
    pub note: Option<u8>,
    pub name: Option<String>,
    pub chord: Option<String>,
}

type Observer = Box<dyn FnMut(&Snapshot)>;

pub struct Performer<S: NoteSink> {
    settings: Settings,
    mapper: NoteMapper,
    script: ScriptEngine,
    script_running: bool,
    live: LiveController<S>,
    status: Option<String>,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: SubscriptionId,
}

impl<S: NoteSink> Performer<S> {
    pub fn new(sink: S) -> Self {
        Self {
            settings: Settings::default(),
            mapper: NoteMapper::default(),
            script: ScriptEngine::new(),
            script_running: false,
            live: LiveController::new(sink),
            status: None,
            observers: Vec::new(),
            next_subscription: 1,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn mapper(&self) -> &NoteMapper {
        &self.mapper
    }

    pub fn script(&self) -> &ScriptEngine {
        &self.script
    }

    pub fn script_running(&self) -> bool {
        self.script_running
    }

    pub fn sink(&self) -> &S {
        self.live.sink()
    }

    pub fn sink_mut(&mut self) -> &mut S {
        self.live.sink_mut()
    }

    pub fn now(&self) -> Micros {
        self.live.now()
    }

    pub fn handle(&mut self, command: Command) -> Result<(), KeybandError> {
        match command {
            Command::Arm => self.arm(),
            Command::Disarm => self.disarm(),
            Command::Panic => self.panic(),
            Command::SetSource(source) => self.set_source(source),
            Command::SetMappingMode(mode) => self.set_mapping_mode(mode),
            Command::SetRoot(root) => self.set_root(root),
            Command::SetScale(scale) => self.set_scale(scale),
            Command::SetOctaveOffset(offset) => self.set_octave_offset(offset),
            Command::SetRowOffset(offset) => self.set_row_offset(offset),
            Command::SetInstrument(instrument) => self.set_instrument(instrument),
            Command::SetTempo(bpm) => self.set_tempo(bpm),
            Command::SetPlayStyle(style) => self.set_play_style(style),
            Command::SetStrum(on) => self.set_strum(on),
            Command::SetPowerChords(on) => self.set_power_chords(on),
            Command::SetVoiceLeading(on) => self.set_voice_leading(on),
            Command::SetSustain(on) => self.set_sustain(on),
            Command::SetLayout(layout) => self.set_layout(layout),
            Command::ClearLayout => self.clear_layout(),
            Command::SetChart(text) => self.set_chart(&text),
            Command::SetScript(text) => self.set_script(&text),
            Command::SetStyle(style) => self.set_style(style),
            Command::SetInputMode(mode) => self.set_input_mode(mode),
            Command::SetChordAdvance(advance) => self.set_chord_advance(advance),
            Command::SetGrid(grid) => self.set_grid(grid),
            Command::RestartScript => self.restart_script(),
            Command::PadDown { x, y } => self.pad_down(x, y),
            Command::PadMove { x, y } => self.pad_move(x, y),
            Command::PadUp => self.pad_up(),
            Command::KeyDown(press) => self.key_down(press),
            Command::KeyUp { key, character } => self.key_up(key, character),
            Command::LoadSoundBank(path) => return self.load_sound_bank(&path),
        }
        Ok(())
    }

    pub fn arm(&mut self) {
        if !self.settings.armed {
            info!("armed");
        }
        self.settings.armed = true;
        self.refresh_playback();
        self.changed();
    }

    /// Stop everything: the script halts and every note is released.
    pub fn disarm(&mut self) {
        if self.settings.armed {
            info!("disarmed");
        }
        self.settings.armed = false;
        self.refresh_playback();
        self.live.panic();
        self.changed();
    }

    /// Release all notes. Script playback keeps going.
    pub fn panic(&mut self) {
        self.live.panic();
        self.changed();
    }

    pub fn set_source(&mut self, source: InputSource) {
        self.settings.source = source;
        self.refresh_playback();
        self.changed();
    }

    pub fn set_mapping_mode(&mut self, mode: MappingMode) {
        self.mapper.mode = mode;
        self.changed();
    }

    pub fn set_root(&mut self, root: RootNote) {
        self.mapper.root = root;
        self.changed();
    }

    pub fn set_scale(&mut self, scale: Scale) {
        self.mapper.scale = scale;
        self.changed();
    }

    pub fn set_octave_offset(&mut self, offset: i32) {
        self.mapper.octave_offset = offset;
        self.changed();
    }

    pub fn set_row_offset(&mut self, offset: i32) {
        self.mapper.row_offset = offset;
        self.changed();
    }

    pub fn set_instrument(&mut self, instrument: Instrument) {
        self.settings.instrument = instrument;
        match self.live.sink_mut().instruments() {
            Some(select) => select.select_instrument(instrument),
            None => debug!("output has no instrument selection; keeping {}", instrument),
        }
        self.changed();
    }

    /// Takes effect on the next tick of any running loop.
    pub fn set_tempo(&mut self, bpm: u32) {
        self.settings.bpm = bpm.clamp(MIN_BPM, MAX_BPM);
        self.changed();
    }

    pub fn set_play_style(&mut self, style: PlayStyle) {
        self.settings.play_style = style;
        self.changed();
    }

    pub fn set_strum(&mut self, on: bool) {
        self.settings.strum = on;
        self.changed();
    }

    pub fn set_power_chords(&mut self, on: bool) {
        self.settings.power_chords = on;
        self.changed();
    }

    pub fn set_voice_leading(&mut self, on: bool) {
        self.settings.voice_leading = on;
        self.changed();
    }

    pub fn set_sustain(&mut self, on: bool) {
        self.live.set_sustain(on);
        self.changed();
    }

    pub fn set_layout(&mut self, layout: KeyLayout) {
        self.mapper.layout = layout;
        self.changed();
    }

    pub fn clear_layout(&mut self) {
        self.mapper.layout = KeyLayout::default();
        self.changed();
    }

    pub fn set_chart(&mut self, text: &str) {
        let chart = ChordChart::parse(text);
        debug!("chart set: {} chord(s)", chart.len());
        self.script.set_chart(chart);
        self.changed();
    }

    pub fn set_script(&mut self, text: &str) {
        self.script.set_text(text);
        self.changed();
    }

    pub fn set_style(&mut self, style: Style) {
        self.script.settings.style = style;
        self.changed();
    }

    pub fn set_input_mode(&mut self, mode: InputMode) {
        self.script.settings.input_mode = mode;
        self.changed();
    }

    pub fn set_chord_advance(&mut self, advance: ChordAdvance) {
        self.script.settings.advance = advance;
        self.changed();
    }

    pub fn set_grid(&mut self, grid: Grid) {
        self.script.settings.grid = grid;
        self.changed();
    }

    /// Rewind the script. Pending strum and arpeggio steps from before the
    /// restart are dropped.
    pub fn restart_script(&mut self) {
        self.script.reset();
        self.cancel_script_jobs();
        if self.script_running {
            let now = self.live.now();
            self.live.scheduler().schedule(now, Lane::Script, Job::ScriptTick);
        }
        info!("script restarted");
        self.changed();
    }

    pub fn pad_down(&mut self, x: f32, y: f32) {
        self.live.pad_down(x, y, &self.settings, &self.mapper);
        self.changed();
    }

    pub fn pad_move(&mut self, x: f32, y: f32) {
        self.live.pad_move(x, y, &self.settings, &self.mapper);
        self.changed();
    }

    pub fn pad_up(&mut self) {
        self.live.pad_up();
        self.changed();
    }

    pub fn key_down(&mut self, press: KeyPress) {
        self.live.key_down(press, &self.settings, &self.mapper);
        self.changed();
    }

    pub fn key_up(&mut self, key: KeyId, character: Option<char>) {
        self.live.key_up(key, character, &self.settings);
        self.changed();
    }

    /// Ask the output to load a custom sound bank. On failure the current
    /// sound stays active and the error is kept for display.
    pub fn load_sound_bank(&mut self, path: &Path) -> Result<(), KeybandError> {
        let result = match self.live.sink_mut().sound_banks() {
            Some(banks) => banks.load_sound_bank(path),
            None => Err(KeybandError::Unsupported("sound banks")),
        };
        match &result {
            Ok(()) => {
                let name = self.live.sink().sound_name();
                info!("sound bank loaded: {}", name);
                self.status = Some(format!("Loaded {}", name));
            }
            Err(e) => {
                warn!("{}", e);
                self.status = Some(e.to_string());
            }
        }
        self.changed();
        result
    }

    /// Start or stop the script loop to match the armed flag and source.
    fn refresh_playback(&mut self) {
        let should_play = self.settings.armed && self.settings.source == InputSource::Script;
        if should_play == self.script_running {
            return;
        }
        self.script_running = should_play;
        self.cancel_script_jobs();
        if should_play {
            if self.script.settings.grid == Grid::Off {
                self.script.settings.grid = Grid::Sixteenths;
            }
            let now = self.live.now();
            self.live.scheduler().schedule(now, Lane::Script, Job::ScriptTick);
            info!(
                "script playback started ({} @ {} bpm, {})",
                self.script.settings.style, self.settings.bpm, self.script.settings.grid
            );
        } else {
            info!("script playback stopped");
        }
    }

    fn cancel_script_jobs(&mut self) {
        self.live.scheduler().bump(Lane::Script);
        self.live.scheduler().bump(Lane::Steps);
    }

    /// Deadline of the next pending job, if any.
    pub fn next_deadline(&mut self) -> Option<Micros> {
        self.live.scheduler().next_deadline()
    }

    /// Run every job due up to `until` in order, then move the clock there.
    pub fn advance_to(&mut self, until: Micros) {
        let mut ran = false;
        while let Some((at, job)) = self.live.scheduler().pop_due(until) {
            self.live.set_now(at.max(self.live.now()));
            match job {
                Job::ScriptTick => self.script_tick(at),
                job => self.live.run_job(at, job, &self.settings, &self.mapper),
            }
            ran = true;
        }
        let now = until.max(self.live.now());
        self.live.set_now(now);
        if ran {
            self.changed();
        }
    }

    fn script_tick(&mut self, at: Micros) {
        if !self.script_running {
            return;
        }
        let input = TickInput {
            mapper: &self.mapper,
            power_chords: self.settings.power_chords,
            bpm: self.settings.bpm,
        };
        let actions = self.script.tick(&input);
        for action in actions {
            self.apply(action);
        }
        let next = at + self.script.interval(self.settings.bpm);
        self.live.scheduler().schedule(next, Lane::Script, Job::ScriptTick);
    }

    fn apply(&mut self, action: Action) {
        match action {
            Action::Note {
                note,
                velocity,
                duration,
            } => self.live.play_transient(note, velocity, duration),
            Action::Chord {
                notes,
                velocity,
                duration,
            } => self
                .live
                .play_chord(&notes, velocity, duration, &self.settings, Lane::Steps),
            Action::Arpeggio {
                notes,
                velocity,
                duration,
                spacing,
            } => self.live.play_arpeggio(&notes, velocity, duration, spacing),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        let chart = self.script.chart();
        Snapshot {
            armed: self.settings.armed,
            source: self.settings.source,
            mode: self.mapper.mode,
            root: self.mapper.root.to_string(),
            scale: self.mapper.scale.name.clone(),
            layout: self.mapper.layout.name.clone(),
            octave_offset: self.mapper.octave_offset,
            row_offset: self.mapper.row_offset,
            instrument: self.settings.instrument,
            sound: self.live.sink().sound_name(),
            bpm: self.settings.bpm,
            play_style: self.settings.play_style,
            strum: self.settings.strum,
            power_chords: self.settings.power_chords,
            voice_leading: self.settings.voice_leading,
            sustain: self.live.sustain(),
            last_note: self.live.last_note().map(note_name),
            last_velocity: self.live.last_velocity(),
            held_keys: self.live.held_keys(),
            script: ScriptStatus {
                running: self.script_running,
                style: self.script.settings.style,
                input_mode: self.script.settings.input_mode,
                advance: self.script.settings.advance,
                grid: self.script.settings.grid,
                tick: self.script.tick_index(),
                script_index: self.script.script_index(),
                chart_index: self.script.chart_index(),
                chord: chart.chord_at(self.script.chart_index()).map(|c| c.label()),
            },
            status: self.status.clone(),
        }
    }

    /// Note name for every key in the layout, with the power chord it
    /// triggers when power chords are on.
    pub fn key_labels(&self) -> Vec<KeyLabel> {
        self.mapper
            .layout
            .keys()
            .map(|key| {
                let note = self.mapper.midi_note(key);
                let chord = note
                    .filter(|_| self.settings.power_chords)
                    .map(|n| format!("{}5", PitchClass::from_semitone(n as i32)));
                KeyLabel {
                    key: key.to_string(),
                    note,
                    name: note.map(note_name),
                    chord,
                }
            })
            .collect()
    }

    /// Call `observer` with a fresh snapshot after every state change.
    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(&Snapshot) + 'static,
    {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    fn changed(&mut self) {
        if self.observers.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        for (_, observer) in self.observers.iter_mut() {
            observer(&snapshot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{EventKind, NullSink, OutputEvent, RecordingSink};
    use std::cell::Cell;
    use std::rc::Rc;

    fn script_performer(text: &str, chart: &str) -> Performer<RecordingSink> {
        let mut performer = Performer::new(RecordingSink::new());
        performer.set_script(text);
        performer.set_chart(chart);
        performer.set_source(InputSource::Script);
        performer
    }

    fn render_ballad() -> Vec<OutputEvent> {
        let mut performer = script_performer("trust i seek and i find in you", "Em");
        performer.set_style(Style::BalladPick);
        performer.set_grid(Grid::Triplets);
        performer.set_tempo(90);
        performer.arm();
        performer.advance_to(8_000_000);
        performer.disarm();
        performer.sink_mut().take_events()
    }

    fn on_times(events: &[OutputEvent]) -> Vec<Micros> {
        events
            .iter()
            .filter(|e| matches!(e.kind, EventKind::On { .. }))
            .map(|e| e.at_us)
            .collect()
    }

    #[test]
    fn test_script_rendering_is_deterministic() {
        let first = render_ballad();
        let second = render_ballad();
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_every_note_on_is_released() {
        let events = render_ballad();
        let mut sink = RecordingSink::new();
        for e in &events {
            match e.kind {
                EventKind::On { note, velocity } => sink.note_on(note, velocity),
                EventKind::Off { note } => sink.note_off(note),
            }
        }
        assert!(sink.sounding().is_empty());
    }

    #[test]
    fn test_script_needs_arm_and_script_source() {
        let mut performer = script_performer("abc", "Em");
        performer.advance_to(1_000_000);
        assert!(performer.sink().events().is_empty());
        assert!(!performer.script_running());

        performer.arm();
        assert!(performer.script_running());
        // grid "off" plays in sixteenths
        assert_eq!(performer.script().settings.grid, Grid::Sixteenths);
        performer.set_source(InputSource::Keys);
        assert!(!performer.script_running());
    }

    #[test]
    fn test_tempo_change_applies_next_tick() {
        let mut performer = script_performer(",", "");
        performer.set_grid(Grid::Eighths);
        performer.set_tempo(120);
        performer.arm();
        performer.advance_to(0);
        // first tick ran at 0; the next is already due at 250ms
        assert_eq!(performer.next_deadline(), Some(250_000));
        performer.set_tempo(60);
        performer.advance_to(250_000);
        assert_eq!(performer.next_deadline(), Some(750_000));
        assert_eq!(performer.script().tick_index(), 2);
    }

    #[test]
    fn test_stopping_drops_pending_arpeggio_steps() {
        let mut performer = script_performer("^,,,", "Em");
        performer.set_input_mode(InputMode::Linear);
        performer.set_chord_advance(ChordAdvance::OnSpaces);
        performer.arm();
        performer.advance_to(0);
        performer.set_source(InputSource::Keys);
        performer.advance_to(1_000_000);
        let events = performer.sink().events();
        assert_eq!(on_times(events), vec![0]);
        assert!(performer.sink().sounding().is_empty());
    }

    fn strummed_performer(text: &str) -> Performer<RecordingSink> {
        let mut performer = script_performer(text, "Em");
        performer.set_input_mode(InputMode::Linear);
        performer.set_chord_advance(ChordAdvance::OnSpaces);
        performer.set_instrument(Instrument::Guitar);
        performer.arm();
        performer.advance_to(0);
        performer
    }

    #[test]
    fn test_stopping_drops_pending_strum_steps() {
        let mut performer = strummed_performer("*,,,");
        assert_eq!(on_times(performer.sink().events()), vec![0]);
        performer.set_source(InputSource::Keys);
        performer.advance_to(100_000);
        assert_eq!(on_times(performer.sink().events()), vec![0]);
    }

    #[test]
    fn test_restart_drops_pending_strum_steps() {
        let mut performer = strummed_performer(",*,,,,,,");
        performer.advance_to(150_000);
        let before = on_times(performer.sink().events()).len();
        assert_eq!(before, 1);
        performer.restart_script();
        // the restarted first tick is a rest, so nothing new starts
        performer.advance_to(200_000);
        assert_eq!(on_times(performer.sink().events()).len(), before);
    }

    #[test]
    fn test_panic_drops_pending_steps_and_keeps_playing() {
        let mut performer = strummed_performer("^,,,,,,,,,,,,,,,");
        assert_eq!(on_times(performer.sink().events()), vec![0]);
        performer.panic();
        assert!(performer.sink().sounding().is_empty());
        performer.advance_to(100_000);
        assert_eq!(on_times(performer.sink().events()), vec![0]);
        assert!(performer.script_running());
        assert!(performer.next_deadline().is_some());

        let mut performer = strummed_performer("*,,,,,,,,,,,,,,,");
        performer.panic();
        performer.advance_to(100_000);
        assert_eq!(on_times(performer.sink().events()), vec![0]);
    }

    #[test]
    fn test_restart_rewinds_script() {
        let mut performer = script_performer("abcdef", "Em");
        performer.arm();
        performer.advance_to(300_000);
        assert!(performer.script().tick_index() > 0);
        performer.restart_script();
        assert_eq!(performer.script().tick_index(), 0);
        assert_eq!(performer.next_deadline(), Some(300_000));
    }

    #[test]
    fn test_chug_stays_on_grid() {
        let mut performer = Performer::new(RecordingSink::new());
        performer.set_play_style(PlayStyle::Chug8);
        performer.set_tempo(120);
        performer.arm();
        performer.key_down(KeyPress::from_char('q'));
        performer.advance_to(1_000_000);
        let events = performer.sink().events().to_vec();
        assert_eq!(on_times(&events), vec![0, 250_000, 500_000, 750_000, 1_000_000]);
        let offs: Vec<Micros> = events
            .iter()
            .filter(|e| matches!(e.kind, EventKind::Off { .. }))
            .map(|e| e.at_us)
            .collect();
        assert_eq!(offs, vec![150_000, 400_000, 650_000, 900_000]);

        performer.key_up('q' as KeyId, Some('q'));
        performer.advance_to(3_000_000);
        assert_eq!(on_times(performer.sink().events()).len(), 5);
        assert!(performer.sink().sounding().is_empty());
    }

    #[test]
    fn test_chug_ends_when_style_changes() {
        let mut performer = Performer::new(RecordingSink::new());
        performer.set_play_style(PlayStyle::Chug16);
        performer.set_tempo(120);
        performer.arm();
        performer.key_down(KeyPress::from_char('w'));
        performer.advance_to(125_000);
        performer.set_play_style(PlayStyle::Hold);
        performer.advance_to(1_000_000);
        assert_eq!(on_times(performer.sink().events()), vec![0, 125_000]);
        assert!(performer.snapshot().held_keys.is_empty());
    }

    #[test]
    fn test_disarm_panics_and_stops() {
        let mut performer = script_performer("abcd", "Em C");
        performer.arm();
        performer.key_down(KeyPress::from_char('z'));
        performer.advance_to(500_000);
        performer.disarm();
        assert!(performer.sink().sounding().is_empty());
        let count = performer.sink().events().len();
        performer.advance_to(5_000_000);
        assert_eq!(performer.sink().events().len(), count);
    }

    #[test]
    fn test_panic_twice_emits_nothing_new() {
        let mut performer = Performer::new(RecordingSink::new());
        performer.arm();
        performer.key_down(KeyPress::from_char('q'));
        performer.key_down(KeyPress::from_char('w'));
        performer.panic();
        let count = performer.sink().events().len();
        assert_eq!(count, 4);
        performer.panic();
        assert_eq!(performer.sink().events().len(), count);
    }

    #[test]
    fn test_observers() {
        let mut performer = Performer::new(NullSink);
        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);
        let id = performer.subscribe(move |snapshot| {
            assert_eq!(snapshot.bpm, 140);
            seen.set(seen.get() + 1);
        });
        performer.set_tempo(140);
        assert_eq!(calls.get(), 1);
        assert!(performer.unsubscribe(id));
        assert!(!performer.unsubscribe(id));
        performer.set_tempo(150);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_key_labels() {
        let mut performer = Performer::new(NullSink);
        performer.set_power_chords(true);
        let labels = performer.key_labels();
        assert_eq!(labels.len(), 26);
        assert_eq!(labels[0].key, "q");
        assert_eq!(labels[0].name.as_deref(), Some("E3"));
        assert_eq!(labels[0].chord.as_deref(), Some("E5"));
    }

    #[test]
    fn test_sound_bank_failures_are_reported() {
        let mut recorder = Performer::new(RecordingSink::new());
        let result = recorder.load_sound_bank(Path::new("/no/such/bank.instr"));
        assert!(matches!(result, Err(KeybandError::SoundBank(_))));
        assert!(recorder.snapshot().status.is_some());

        let mut null = Performer::new(NullSink);
        let result = null.handle(Command::LoadSoundBank(PathBuf::from("x.instr")));
        assert!(matches!(result, Err(KeybandError::Unsupported(_))));
    }

    #[test]
    fn test_instrument_reaches_capable_sink() {
        let mut performer = Performer::new(RecordingSink::new());
        performer.handle(Command::SetInstrument(Instrument::Overdrive)).unwrap();
        assert_eq!(performer.snapshot().sound, "Overdrive");
    }

    #[test]
    fn test_snapshot_json() {
        let mut performer = Performer::new(NullSink);
        performer.arm();
        let json = serde_json::to_string(&performer.snapshot()).unwrap();
        assert!(json.contains(r#""armed":true"#));
        assert!(json.contains(r#""playStyle":"hold""#));
        assert!(json.contains(r#""root":"E3""#));
    }
}
