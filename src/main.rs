use clap::{Args, Parser, Subcommand};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use keyband::chart::extract_chord_chart;
use keyband::controller::PlayStyle;
use keyband::error::KeybandError;
use keyband::layout::KeyLayout;
use keyband::output::{Instrument, Micros, NoteSink, RecordingSink};
use keyband::performer::{InputSource, Performer};
use keyband::repl;
use keyband::script::{ChordAdvance, Grid, InputMode, Style};
use keyband::session::Session;
use keyband::synth::CpalSink;
use keyband::theory::{RootNote, Scale};
use log::info;

/// Time after the last tick for transient notes to ring out
const TAIL: Micros = 2_000_000;

#[derive(Parser)]
#[command(name = "keyband", about = "Play music by typing")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// Settings shared by every subcommand that builds a performer.
#[derive(Args, Debug, Default)]
struct SessionArgs {
    /// Session file (key: value lines) applied before the flags below
    #[arg(long)]
    session: Option<PathBuf>,

    /// Tempo (BPM)
    #[arg(long)]
    tempo: Option<u32>,

    /// Root note, e.g. E3 or Bb2
    #[arg(long)]
    root: Option<RootNote>,

    /// Scale name, e.g. "minor pentatonic" or dorian
    #[arg(long)]
    scale: Option<String>,

    /// Key layout: typewriter, melodic or qwerty
    #[arg(long)]
    layout: Option<String>,

    /// Octave offset from the root
    #[arg(long, allow_hyphen_values = true)]
    octave: Option<i32>,

    /// Piano, guitar, overdrive or synth
    #[arg(long)]
    instrument: Option<Instrument>,

    /// Custom .instr voice bank
    #[arg(long)]
    bank: Option<PathBuf>,

    /// Play power chords instead of single notes
    #[arg(long)]
    power: bool,

    /// Chord chart, e.g. "Em C | G D"
    #[arg(long)]
    chart: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive keyboard mode: play notes by typing
    Live {
        #[command(flatten)]
        settings: SessionArgs,

        /// hold, chug8 or chug16
        #[arg(long)]
        play_style: Option<PlayStyle>,

        /// Keep each note near the previous one
        #[arg(long)]
        voice_leading: bool,
    },

    /// Perform a text script against a chord chart
    Play {
        /// File holding the script text
        file: Option<PathBuf>,

        /// Script text given inline
        #[arg(long)]
        text: Option<String>,

        #[command(flatten)]
        settings: SessionArgs,

        /// ballad, rock, chug or pulse
        #[arg(long)]
        style: Option<Style>,

        /// 8ths, 16ths or triplets
        #[arg(long)]
        grid: Option<Grid>,

        /// Chord changes on every bar or on spaces
        #[arg(long)]
        advance: Option<ChordAdvance>,

        /// prose or linear
        #[arg(long)]
        input: Option<InputMode>,

        /// Number of bars to play
        #[arg(long, default_value_t = 4)]
        bars: u32,

        /// Print note events instead of playing audio
        #[arg(long)]
        dry_run: bool,

        /// With --dry-run, print one JSON object per event
        #[arg(long)]
        json: bool,
    },

    /// Extract a chord chart from arbitrary text
    Chart {
        /// Text file (stdin when omitted)
        file: Option<PathBuf>,

        /// Text given inline
        #[arg(long)]
        text: Option<String>,
    },

    /// Show which note each key plays
    Keys {
        #[command(flatten)]
        settings: SessionArgs,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(command: Command) -> Result<(), KeybandError> {
    match command {
        Command::Live {
            settings,
            play_style,
            voice_leading,
        } => {
            let mut performer = Performer::new(CpalSink::new(Instrument::Piano)?);
            configure(&mut performer, &settings)?;
            if let Some(style) = play_style {
                performer.set_play_style(style);
            }
            if voice_leading {
                performer.set_voice_leading(true);
            }
            performer.arm();
            repl::run(&mut performer)
        }
        Command::Play {
            file,
            text,
            settings,
            style,
            grid,
            advance,
            input,
            bars,
            dry_run,
            json,
        } => {
            let script = match (text, file) {
                (Some(text), _) => Some(text),
                (None, Some(path)) => Some(read_file(&path)?),
                (None, None) => None,
            };
            let options = PlayOptions {
                script,
                style,
                grid,
                advance,
                input,
                bars,
            };
            if dry_run {
                let mut performer = Performer::new(RecordingSink::new());
                configure(&mut performer, &settings)?;
                let end = start_script(&mut performer, &options);
                performer.advance_to(end.saturating_sub(1));
                performer.set_source(InputSource::Keys);
                performer.advance_to(end + TAIL);
                for event in performer.sink_mut().take_events() {
                    if json {
                        println!("{}", serde_json::to_string(&event).map_err(io::Error::other)?);
                    } else {
                        println!("{}", event);
                    }
                }
            } else {
                let mut performer = Performer::new(CpalSink::new(Instrument::Piano)?);
                configure(&mut performer, &settings)?;
                let end = start_script(&mut performer, &options);
                let snapshot = performer.snapshot();
                println!(
                    "Playing: {} BPM, {} on {}, {} bar(s)",
                    snapshot.bpm, snapshot.script.style, snapshot.sound, bars
                );
                let started = Instant::now();
                play_until(&mut performer, started, end.saturating_sub(1));
                performer.set_source(InputSource::Keys);
                play_until(&mut performer, started, end + TAIL);
                performer.disarm();
            }
            Ok(())
        }
        Command::Chart { file, text } => {
            let input = match (text, file) {
                (Some(text), _) => text,
                (None, Some(path)) => read_file(&path)?,
                (None, None) => io::read_to_string(io::stdin())?,
            };
            println!("{}", extract_chord_chart(&input));
            Ok(())
        }
        Command::Keys { settings, json } => {
            let mut performer = Performer::new(RecordingSink::new());
            configure(&mut performer, &settings)?;
            let labels = performer.key_labels();
            if json {
                let out = serde_json::to_string_pretty(&labels).map_err(io::Error::other)?;
                println!("{}", out);
                return Ok(());
            }
            let mapper = performer.mapper();
            println!(
                "{} {} ({}, {} layout)",
                mapper.root, mapper.scale.name, mapper.mode, mapper.layout.name
            );
            for label in labels {
                let name = label.name.unwrap_or_else(|| "--".to_string());
                match label.chord {
                    Some(chord) => println!("  {:<3} {:<5} {}", label.key, name, chord),
                    None => println!("  {:<3} {}", label.key, name),
                }
            }
            Ok(())
        }
    }
}

struct PlayOptions {
    script: Option<String>,
    style: Option<Style>,
    grid: Option<Grid>,
    advance: Option<ChordAdvance>,
    input: Option<InputMode>,
    bars: u32,
}

fn read_file(path: &Path) -> Result<String, KeybandError> {
    Ok(fs::read_to_string(path)?)
}

/// Session file first, then command-line overrides.
fn configure<S: NoteSink>(performer: &mut Performer<S>, args: &SessionArgs) -> Result<(), KeybandError> {
    if let Some(path) = &args.session {
        Session::load(path)?.apply(performer);
        info!("session {} applied", path.display());
    }
    if let Some(bpm) = args.tempo {
        performer.set_tempo(bpm);
    }
    if let Some(root) = args.root {
        performer.set_root(root);
    }
    if let Some(name) = &args.scale {
        let scale = Scale::named(name)
            .ok_or_else(|| KeybandError::InvalidArgument(format!("unknown scale '{}'", name)))?;
        performer.set_scale(scale);
    }
    if let Some(name) = &args.layout {
        let layout = KeyLayout::named(name)
            .ok_or_else(|| KeybandError::InvalidArgument(format!("unknown layout '{}'", name)))?;
        performer.set_layout(layout);
    }
    if let Some(octave) = args.octave {
        performer.set_octave_offset(octave);
    }
    if let Some(instrument) = args.instrument {
        performer.set_instrument(instrument);
    }
    if let Some(path) = &args.bank {
        performer.load_sound_bank(path)?;
    }
    if args.power {
        performer.set_power_chords(true);
    }
    if let Some(chart) = &args.chart {
        performer.set_chart(chart);
    }
    Ok(())
}

/// Apply script options, arm in script mode and return when the last bar ends.
fn start_script<S: NoteSink>(performer: &mut Performer<S>, options: &PlayOptions) -> Micros {
    if let Some(script) = &options.script {
        performer.set_script(script.trim_end_matches('\n'));
    }
    if let Some(style) = options.style {
        performer.set_style(style);
    }
    if let Some(grid) = options.grid {
        performer.set_grid(grid);
    }
    if let Some(advance) = options.advance {
        performer.set_chord_advance(advance);
    }
    if let Some(input) = options.input {
        performer.set_input_mode(input);
    }
    performer.set_source(InputSource::Script);
    performer.arm();

    let grid = performer.script().settings.grid;
    let interval = performer.script().interval(performer.settings().bpm);
    performer.now() + options.bars as Micros * grid.ticks_per_bar() * interval
}

/// Run the performer against the wall clock until `until`.
fn play_until<S: NoteSink>(performer: &mut Performer<S>, started: Instant, until: Micros) {
    loop {
        let now = started.elapsed().as_micros() as Micros;
        if now >= until {
            performer.advance_to(until);
            return;
        }
        performer.advance_to(now);
        let wait = performer
            .next_deadline()
            .map_or(until, |deadline| deadline.min(until))
            .saturating_sub(now);
        thread::sleep(Duration::from_micros(wait));
    }
}
