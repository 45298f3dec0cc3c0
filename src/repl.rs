//! Interactive terminal mode.
//!
//! A listener thread turns crossterm key events into [`Input`]s and sends
//! them over a channel it was handed at construction. The main thread owns
//! the performer: it waits on the channel until the next scheduled deadline,
//! runs due work, then applies the input.

use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, Sender, unbounded};
use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
    PushKeyboardEnhancementFlags,
};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, queue};
use log::{debug, info};

use crate::controller::{KeyPress, Modifiers};
use crate::error::KeybandError;
use crate::output::{Micros, NoteSink};
use crate::performer::{Command, Performer, Snapshot};
use crate::scheduler::KeyId;

/// Key-up delay for terminals that never report releases
const FALLBACK_RELEASE: Duration = Duration::from_millis(300);
/// Longest the main loop sleeps with nothing scheduled
const IDLE_WAIT: Micros = 50_000;
const STATUS_ROW: u16 = 14;

/// What the listener thread sends to the main loop.
#[derive(Debug, Clone)]
pub enum Input {
    Command(Command),
    ToggleArm,
    /// Sustain key in terminals without release events
    ToggleSustain,
    Octave(i32),
    Tempo(i32),
    Quit,
}

fn modifiers(mods: KeyModifiers) -> Modifiers {
    Modifiers {
        shift: mods.contains(KeyModifiers::SHIFT),
        alt: mods.contains(KeyModifiers::ALT),
        control: mods.contains(KeyModifiers::CONTROL),
    }
}

fn key_id(c: char) -> KeyId {
    c.to_ascii_lowercase() as KeyId
}

/// Map one terminal key event to an input, if it means anything.
pub fn translate(ev: &KeyEvent, sustain_key: char, has_key_release: bool, timestamp: Micros) -> Option<Input> {
    let pressed = matches!(ev.kind, KeyEventKind::Press | KeyEventKind::Repeat);
    match ev.code {
        KeyCode::Esc if ev.kind == KeyEventKind::Press => Some(Input::Quit),
        KeyCode::Tab if ev.kind == KeyEventKind::Press => Some(Input::ToggleArm),
        KeyCode::Enter if ev.kind == KeyEventKind::Press => Some(Input::Command(Command::Panic)),
        KeyCode::Up if pressed => Some(Input::Octave(1)),
        KeyCode::Down if pressed => Some(Input::Octave(-1)),
        KeyCode::Right if pressed => Some(Input::Tempo(5)),
        KeyCode::Left if pressed => Some(Input::Tempo(-5)),
        KeyCode::Char(c) if c == sustain_key && !has_key_release => {
            (ev.kind == KeyEventKind::Press).then_some(Input::ToggleSustain)
        }
        KeyCode::Char(c) if pressed => Some(Input::Command(Command::KeyDown(KeyPress {
            key: key_id(c),
            character: Some(c),
            modifiers: modifiers(ev.modifiers),
            repeat: ev.kind == KeyEventKind::Repeat,
            timestamp,
        }))),
        KeyCode::Char(c) if ev.kind == KeyEventKind::Release => Some(Input::Command(Command::KeyUp {
            key: key_id(c),
            character: Some(c),
        })),
        _ => None,
    }
}

/// Background thread reading the terminal. It holds only the sender it was
/// given, never the performer.
pub struct KeyListener {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl KeyListener {
    pub fn spawn(tx: Sender<Input>, sustain_key: char, has_key_release: bool, start: Instant) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::spawn(move || {
            if let Err(e) = listen(&tx, &flag, sustain_key, has_key_release, start) {
                debug!("key listener stopped: {}", e);
                let _ = tx.send(Input::Quit);
            }
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }

    pub fn shutdown(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn listen(
    tx: &Sender<Input>,
    stop: &AtomicBool,
    sustain_key: char,
    has_key_release: bool,
    start: Instant,
) -> io::Result<()> {
    while !stop.load(Ordering::Relaxed) {
        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        let Event::Key(ev) = event::read()? else {
            continue;
        };
        let timestamp = start.elapsed().as_micros() as Micros;
        let Some(input) = translate(&ev, sustain_key, has_key_release, timestamp) else {
            continue;
        };

        // Fallback: no key release support, so release the key ourselves
        if let Input::Command(Command::KeyDown(press)) = &input {
            if !has_key_release {
                let (key, character) = (press.key, press.character);
                let _ = tx.send(Input::Command(Command::KeyUp { key, character }));
                let timer_tx = tx.clone();
                thread::spawn(move || {
                    thread::sleep(FALLBACK_RELEASE);
                    let _ = timer_tx.send(Input::Command(Command::KeyUp { key, character }));
                });
            }
        }

        if tx.send(input).is_err() {
            break;
        }
    }
    Ok(())
}

/// Run the interactive live keyboard mode until Esc.
pub fn run<S: NoteSink>(performer: &mut Performer<S>) -> Result<(), KeybandError> {
    let mut stdout = io::stdout();

    terminal::enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen)?;

    // Enable keyboard enhancement for key release detection.
    // On macOS, the terminal may accept the enhancement flag but not actually
    // send release events, so we disable it and use the fallback timer.
    let has_key_release = if cfg!(target_os = "macos") {
        false
    } else {
        queue!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        )
        .is_ok()
            && stdout.flush().is_ok()
    };

    print_banner(&mut stdout, performer, has_key_release);
    let observer = performer.subscribe(|snapshot| update_status(&mut io::stdout(), snapshot));
    update_status(&mut stdout, &performer.snapshot());

    let result = event_loop(performer, has_key_release);

    performer.unsubscribe(observer);
    performer.panic();

    if has_key_release {
        let _ = execute!(
            stdout,
            crossterm::event::PopKeyboardEnhancementFlags,
            LeaveAlternateScreen
        );
    } else {
        let _ = execute!(stdout, LeaveAlternateScreen);
    }
    let _ = terminal::disable_raw_mode();

    result
}

fn elapsed(start: Instant) -> Micros {
    start.elapsed().as_micros() as Micros
}

fn event_loop<S: NoteSink>(performer: &mut Performer<S>, has_key_release: bool) -> Result<(), KeybandError> {
    let start = Instant::now();
    let offset = performer.now();
    let (tx, rx) = unbounded::<Input>();
    let listener = KeyListener::spawn(tx, performer.settings().sustain_key, has_key_release, start);
    info!("live mode started (key release events: {})", has_key_release);

    loop {
        let now = offset + elapsed(start);
        performer.advance_to(now);
        let wait = performer
            .next_deadline()
            .map(|deadline| deadline.saturating_sub(now))
            .unwrap_or(IDLE_WAIT)
            .min(IDLE_WAIT);

        let input = match rx.recv_timeout(Duration::from_micros(wait)) {
            Ok(input) => input,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        performer.advance_to(offset + elapsed(start));
        if !apply(performer, input) {
            break;
        }
    }

    listener.shutdown();
    info!("live mode stopped");
    Ok(())
}

/// Apply one input. Returns false on quit.
fn apply<S: NoteSink>(performer: &mut Performer<S>, input: Input) -> bool {
    match input {
        Input::Quit => return false,
        Input::Command(command) => {
            // Failures are shown on the status line by the performer
            let _ = performer.handle(command);
        }
        Input::ToggleArm => {
            if performer.settings().armed {
                performer.disarm();
            } else {
                performer.arm();
            }
        }
        Input::ToggleSustain => {
            let on = performer.snapshot().sustain;
            performer.set_sustain(!on);
        }
        Input::Octave(delta) => {
            let offset = (performer.mapper().octave_offset + delta).clamp(-3, 4);
            performer.set_octave_offset(offset);
        }
        Input::Tempo(delta) => {
            let bpm = (performer.settings().bpm as i32 + delta).max(1) as u32;
            performer.set_tempo(bpm);
        }
    }
    true
}

fn print_banner<S: NoteSink>(stdout: &mut io::Stdout, performer: &Performer<S>, has_key_release: bool) {
    let keys: String = performer
        .key_labels()
        .iter()
        .filter_map(|label| label.name.as_ref().map(|name| format!("{}={}", label.key, name)))
        .take(12)
        .collect::<Vec<_>>()
        .join(" ");
    let sustain = if has_key_release { "hold" } else { "toggle" };
    let banner = format!(
        "\x1b[2J\x1b[H\
keyband live - play by typing\r\n\
─────────────────────────────────────────\r\n\
\r\n\
  Keys:      {}\r\n\
\r\n\
  Tab        arm / disarm\r\n\
  Space      sustain ({})\r\n\
  Shift/Alt  octave up / down, Ctrl power chord\r\n\
  Up/Down    octave offset\r\n\
  Left/Right tempo\r\n\
  Enter      panic\r\n\
  Esc        quit\r\n\
\r\n",
        keys, sustain
    );
    let _ = write!(stdout, "{}", banner);
}

fn update_status(stdout: &mut io::Stdout, s: &Snapshot) {
    let note = s.last_note.clone().unwrap_or_else(|| "---".to_string());
    let _ = write!(
        stdout,
        "\x1b[{};1H\x1b[2K  {}  |  {} {}  |  oct {:+}  |  {}  |  {} bpm  |  {}{}  |  Note: {} ({})\r",
        STATUS_ROW,
        if s.armed { "ARMED" } else { "disarmed" },
        s.root,
        s.scale,
        s.octave_offset,
        s.sound,
        s.bpm,
        s.play_style,
        if s.sustain { "  |  sustain" } else { "" },
        note,
        s.last_velocity
    );
    if let Some(status) = &s.status {
        let _ = write!(stdout, "\x1b[{};1H\x1b[2K  {}\r", STATUS_ROW + 1, status);
    }
    let _ = stdout.flush();
}
