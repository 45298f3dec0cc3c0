//! Session files: performer settings as `key: value` lines.
//!
//! Each line becomes a [`Command`], so a session is replayed through the
//! same path as live input.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use log::debug;

use crate::error::KeybandError;
use crate::layout::KeyLayout;
use crate::output::NoteSink;
use crate::performer::{Command, Performer};
use crate::theory::Scale;

/// Parsed session, in file order.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub commands: Vec<Command>,
}

fn parse_kv(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let (key, value) = trimmed.split_once(':')?;
    Some((key.trim(), value.trim()))
}

pub fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Some(true),
        "off" | "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

fn config_error(line: usize, message: impl Into<String>) -> KeybandError {
    KeybandError::Config {
        line,
        message: message.into(),
    }
}

fn value<T>(raw: &str, line: usize) -> Result<T, KeybandError>
where
    T: FromStr,
    T::Err: ToString,
{
    raw.parse::<T>().map_err(|e| config_error(line, e.to_string()))
}

fn flag(raw: &str, key: &str, line: usize) -> Result<bool, KeybandError> {
    parse_bool(raw).ok_or_else(|| config_error(line, format!("{} expects on/off, got '{}'", key, raw)))
}

impl Session {
    /// Parse session text. Relative `bank` paths resolve against `base`.
    ///
    /// Format:
    /// ```text
    /// # E minor riffing
    /// tempo: 96
    /// root: E2
    /// scale: minor pentatonic
    /// instrument: overdrive
    /// power: on
    /// play_style: chug16
    /// chart: Em C G D
    /// ```
    pub fn parse(content: &str, base: &Path) -> Result<Self, KeybandError> {
        let mut commands = Vec::new();
        for (index, line) in content.lines().enumerate() {
            let line_num = index + 1;
            let Some((key, raw)) = parse_kv(line) else {
                let trimmed = line.trim();
                if !trimmed.is_empty() && !trimmed.starts_with('#') {
                    return Err(config_error(line_num, format!("expected 'key: value', got '{}'", trimmed)));
                }
                continue;
            };
            let command = match key {
                "tempo" => Command::SetTempo(value(raw, line_num)?),
                "root" => Command::SetRoot(value(raw, line_num)?),
                "scale" => Command::SetScale(
                    Scale::named(raw).ok_or_else(|| config_error(line_num, format!("unknown scale '{}'", raw)))?,
                ),
                "mode" => Command::SetMappingMode(value(raw, line_num)?),
                "layout" => Command::SetLayout(
                    KeyLayout::named(raw)
                        .ok_or_else(|| config_error(line_num, format!("unknown layout '{}'", raw)))?,
                ),
                "octave_offset" => Command::SetOctaveOffset(value(raw, line_num)?),
                "row_offset" => Command::SetRowOffset(value(raw, line_num)?),
                "instrument" => Command::SetInstrument(value(raw, line_num)?),
                "bank" => Command::LoadSoundBank(base.join(raw)),
                "strum" => Command::SetStrum(flag(raw, key, line_num)?),
                "power" => Command::SetPowerChords(flag(raw, key, line_num)?),
                "voice_leading" => Command::SetVoiceLeading(flag(raw, key, line_num)?),
                "play_style" => Command::SetPlayStyle(value(raw, line_num)?),
                "source" => Command::SetSource(value(raw, line_num)?),
                "style" => Command::SetStyle(value(raw, line_num)?),
                "grid" => Command::SetGrid(value(raw, line_num)?),
                "advance" => Command::SetChordAdvance(value(raw, line_num)?),
                "input" => Command::SetInputMode(value(raw, line_num)?),
                "chart" => Command::SetChart(raw.to_string()),
                "script" => Command::SetScript(raw.to_string()),
                other => return Err(config_error(line_num, format!("unknown key '{}'", other))),
            };
            commands.push(command);
        }
        Ok(Self { commands })
    }

    pub fn load(path: &Path) -> Result<Self, KeybandError> {
        let content = fs::read_to_string(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let session = Self::parse(&content, base)?;
        debug!("session {}: {} setting(s)", path.display(), session.commands.len());
        Ok(session)
    }

    /// Replay every setting. A failed bank load is reported by the performer
    /// and does not stop the rest of the session.
    pub fn apply<S: NoteSink>(&self, performer: &mut Performer<S>) {
        for command in &self.commands {
            // The performer already logged and recorded the failure
            let _ = performer.handle(command.clone());
        }
    }
}
