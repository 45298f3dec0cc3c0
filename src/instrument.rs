//! Voice banks: waveform plus ADSR envelope, built in per [`Instrument`] or
//! loaded from `.instr` files.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::KeybandError;
use crate::output::Instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Triangle,
    Saw,
    Square,
}

impl Waveform {
    /// One sample at `phase` in cycles (0.0..1.0).
    pub fn sample(self, phase: f64) -> f64 {
        let phase = phase.fract();
        match self {
            Waveform::Sine => (phase * std::f64::consts::TAU).sin(),
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
            Waveform::Saw => 2.0 * phase - 1.0,
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
        }
    }
}

impl FromStr for Waveform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sine" => Ok(Waveform::Sine),
            "triangle" | "tri" => Ok(Waveform::Triangle),
            "saw" | "sawtooth" => Ok(Waveform::Saw),
            "square" => Ok(Waveform::Square),
            other => Err(format!("unknown waveform '{}'", other)),
        }
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Waveform::Sine => "sine",
            Waveform::Triangle => "triangle",
            Waveform::Saw => "saw",
            Waveform::Square => "square",
        })
    }
}

/// Everything the synth needs to voice a note.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceBank {
    pub name: String,
    pub waveform: Waveform,
    /// Attack time in seconds (0 → peak)
    pub attack: f64,
    /// Decay time in seconds (peak → sustain level)
    pub decay: f64,
    /// Sustain level (0.0..=1.0) while the note is held
    pub sustain: f64,
    /// Release time in seconds (current level → 0 after note off)
    pub release: f64,
    /// Output level per voice
    pub gain: f64,
}

impl Default for VoiceBank {
    fn default() -> Self {
        Self::preset(Instrument::Piano)
    }
}

impl VoiceBank {
    /// Built-in voicing for each instrument.
    pub fn preset(instrument: Instrument) -> Self {
        let (waveform, attack, decay, sustain, release, gain) = match instrument {
            Instrument::Piano => (Waveform::Triangle, 0.005, 0.6, 0.35, 0.3, 0.3),
            Instrument::Guitar => (Waveform::Saw, 0.002, 0.4, 0.25, 0.2, 0.18),
            Instrument::Overdrive => (Waveform::Square, 0.004, 0.2, 0.7, 0.15, 0.12),
            Instrument::SynthLead => (Waveform::Saw, 0.02, 0.1, 0.8, 0.25, 0.15),
        };
        Self {
            name: instrument.name().to_string(),
            waveform,
            attack,
            decay,
            sustain,
            release,
            gain,
        }
    }
}

/// Parse a single "key: value" line. Returns (key, value) or None for
/// blanks and comments.
fn parse_line(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let (key, value) = trimmed.split_once(':')?;
    Some((key.trim(), value.trim()))
}

fn number(value: &str, key: &str, line: usize) -> Result<f64, KeybandError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .ok_or_else(|| {
            KeybandError::SoundBank(format!("bad {} '{}' at line {}", key, value, line))
        })
}

/// Parse the contents of a `.instr` file. Missing keys keep the piano preset.
///
/// Format (one per line, optional comments with #):
/// ```text
/// name: Warm Pad
/// waveform: sine
/// # ADSR envelope (times in seconds, sustain 0..1)
/// attack: 0.2
/// decay: 0.1
/// sustain: 0.7
/// release: 0.8
/// gain: 0.25
/// ```
pub fn parse(content: &str, fallback_name: &str) -> Result<VoiceBank, KeybandError> {
    let mut bank = VoiceBank {
        name: fallback_name.to_string(),
        ..VoiceBank::default()
    };

    for (index, line) in content.lines().enumerate() {
        let line_num = index + 1;
        let Some((key, value)) = parse_line(line) else {
            if !line.trim().is_empty() && !line.trim().starts_with('#') {
                return Err(KeybandError::SoundBank(format!(
                    "expected 'key: value' at line {}",
                    line_num
                )));
            }
            continue;
        };
        match key {
            "name" => bank.name = value.to_string(),
            "waveform" => {
                bank.waveform = value.parse().map_err(|e: String| {
                    KeybandError::SoundBank(format!("{} at line {}", e, line_num))
                })?
            }
            "attack" => bank.attack = number(value, key, line_num)?,
            "decay" => bank.decay = number(value, key, line_num)?,
            "sustain" => bank.sustain = number(value, key, line_num)?.clamp(0.0, 1.0),
            "release" => bank.release = number(value, key, line_num)?,
            "gain" => bank.gain = number(value, key, line_num)?.clamp(0.0, 1.0),
            _ => {
                return Err(KeybandError::SoundBank(format!(
                    "unknown key '{}' at line {}",
                    key, line_num
                )));
            }
        }
    }

    Ok(bank)
}

/// Load a voice bank from a `.instr` file. The file stem names the bank
/// unless the file sets `name`.
pub fn load(path: &Path) -> Result<VoiceBank, KeybandError> {
    let content = fs::read_to_string(path).map_err(|e| {
        KeybandError::SoundBank(format!("reading {}: {}", path.display(), e))
    })?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from("custom"));
    parse(&content, &stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_bank() {
        let text = "# pad\nname: Warm Pad\nwaveform: sine\nattack: 0.2\nsustain: 1.5\nrelease: 0.8\n";
        let bank = parse(text, "pad").unwrap();
        assert_eq!(bank.name, "Warm Pad");
        assert_eq!(bank.waveform, Waveform::Sine);
        assert_eq!(bank.attack, 0.2);
        assert_eq!(bank.sustain, 1.0);
        assert_eq!(bank.release, 0.8);
        // untouched keys keep the default
        assert_eq!(bank.decay, VoiceBank::default().decay);
    }

    #[test]
    fn test_parse_errors_name_the_line() {
        let err = parse("attack: 0.1\nwobble: 3\n", "x").unwrap_err();
        assert_eq!(err.to_string(), "Sound bank error: unknown key 'wobble' at line 2");
        let err = parse("release: soon\n", "x").unwrap_err();
        assert!(err.to_string().contains("line 1"));
        assert!(parse("attack 0.1\n", "x").is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load(Path::new("/no/such/file.instr")),
            Err(KeybandError::SoundBank(_))
        ));
    }

    #[test]
    fn test_waveform_shapes() {
        assert!(Waveform::Sine.sample(0.0).abs() < 1e-9);
        assert!((Waveform::Sine.sample(0.25) - 1.0).abs() < 1e-9);
        assert_eq!(Waveform::Square.sample(0.1), 1.0);
        assert_eq!(Waveform::Square.sample(0.6), -1.0);
        assert_eq!(Waveform::Triangle.sample(0.5), 1.0);
        assert_eq!(Waveform::Saw.sample(0.0), -1.0);
    }

    #[test]
    fn test_presets_differ_by_instrument() {
        let piano = VoiceBank::preset(Instrument::Piano);
        let lead = VoiceBank::preset(Instrument::SynthLead);
        assert_eq!(piano.name, "Piano");
        assert_ne!(piano.waveform, Waveform::Sine);
        assert!(lead.sustain > piano.sustain);
    }
}
