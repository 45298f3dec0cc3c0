//! Polyphonic cpal output: the audio edge behind [`NoteSink`].
//!
//! Notes travel to the audio thread over a channel; the callback mixes up
//! to [`MAX_VOICES`] enveloped oscillators. Both output capabilities are
//! supported: instruments switch the built-in voicing, sound banks load
//! `.instr` files.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::path::Path;
use std::sync::mpsc;

use log::{debug, error, info};

use crate::error::KeybandError;
use crate::instrument::{self, VoiceBank};
use crate::output::{Instrument, InstrumentSelect, NoteSink, SoundBankLoad};

/// Oldest voices are stolen beyond this
pub const MAX_VOICES: usize = 24;

/// A command sent to the audio thread
enum AudioCommand {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
    SetBank(VoiceBank),
}

pub fn midi_to_freq(note: u8) -> f64 {
    440.0 * 2f64.powf((note as f64 - 69.0) / 12.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Stage {
    Attack,
    Decay,
    Sustain,
    Release { from: f64, elapsed: f64 },
}

/// One sounding oscillator with its envelope position.
#[derive(Debug, Clone)]
struct Voice {
    note: u8,
    freq: f64,
    gain: f64,
    phase: f64,
    stage: Stage,
    /// Seconds spent in the current attack/decay stage
    elapsed: f64,
    level: f64,
}

impl Voice {
    fn new(note: u8, velocity: u8) -> Self {
        Self {
            note,
            freq: midi_to_freq(note),
            gain: velocity as f64 / 127.0,
            phase: 0.0,
            stage: Stage::Attack,
            elapsed: 0.0,
            level: 0.0,
        }
    }

    fn release(&mut self) {
        if !matches!(self.stage, Stage::Release { .. }) {
            self.stage = Stage::Release {
                from: self.level,
                elapsed: 0.0,
            };
        }
    }

    fn finished(&self, bank: &VoiceBank) -> bool {
        match self.stage {
            Stage::Release { elapsed, .. } => elapsed >= bank.release,
            _ => false,
        }
    }

    /// Advance the envelope by `dt` seconds and return its level.
    fn envelope(&mut self, bank: &VoiceBank, dt: f64) -> f64 {
        self.level = match self.stage {
            Stage::Attack => {
                self.elapsed += dt;
                if self.elapsed >= bank.attack {
                    self.stage = Stage::Decay;
                    self.elapsed = 0.0;
                    1.0
                } else {
                    self.elapsed / bank.attack
                }
            }
            Stage::Decay => {
                self.elapsed += dt;
                if self.elapsed >= bank.decay {
                    self.stage = Stage::Sustain;
                    bank.sustain
                } else {
                    1.0 - (1.0 - bank.sustain) * self.elapsed / bank.decay
                }
            }
            Stage::Sustain => bank.sustain,
            Stage::Release { from, elapsed } => {
                let elapsed = elapsed + dt;
                self.stage = Stage::Release { from, elapsed };
                if elapsed >= bank.release {
                    0.0
                } else {
                    from * (1.0 - elapsed / bank.release)
                }
            }
        };
        self.level
    }

    fn next_sample(&mut self, bank: &VoiceBank, sample_rate: f64) -> f64 {
        let level = self.envelope(bank, 1.0 / sample_rate);
        let value = bank.waveform.sample(self.phase) * level * self.gain * bank.gain;
        self.phase = (self.phase + self.freq / sample_rate).fract();
        value
    }
}

/// Voice pool owned by the audio callback.
struct Mixer {
    voices: Vec<Voice>,
    bank: VoiceBank,
    sample_rate: f64,
}

impl Mixer {
    fn apply(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::NoteOn { note, velocity } => {
                // Retrigger replaces a voice already playing this note
                self.voices.retain(|v| v.note != note);
                if self.voices.len() >= MAX_VOICES {
                    self.voices.remove(0);
                }
                self.voices.push(Voice::new(note, velocity));
            }
            AudioCommand::NoteOff { note } => {
                for voice in self.voices.iter_mut().filter(|v| v.note == note) {
                    voice.release();
                }
            }
            AudioCommand::SetBank(bank) => self.bank = bank,
        }
    }

    fn next_sample(&mut self) -> f32 {
        let mut value = 0.0;
        for voice in &mut self.voices {
            value += voice.next_sample(&self.bank, self.sample_rate);
        }
        let bank = &self.bank;
        self.voices.retain(|v| !v.finished(bank));
        value.clamp(-1.0, 1.0) as f32
    }
}

/// Note sink that plays through the default audio output device.
pub struct CpalSink {
    tx: mpsc::Sender<AudioCommand>,
    _stream: cpal::Stream,
    instrument: Instrument,
    bank: VoiceBank,
}

impl CpalSink {
    pub fn new(instrument: Instrument) -> Result<Self, KeybandError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| KeybandError::Audio("no output audio device available".to_string()))?;

        let config = device.default_output_config().map_err(|e| {
            KeybandError::Audio(format!("failed to get default output config: {}", e))
        })?;

        let sample_rate = config.sample_rate() as f64;
        let channels = config.channels().max(1) as usize;
        let bank = VoiceBank::preset(instrument);

        let (tx, rx) = mpsc::channel::<AudioCommand>();
        let mut mixer = Mixer {
            voices: Vec::new(),
            bank: bank.clone(),
            sample_rate,
        };

        let stream = device
            .build_output_stream(
                &config.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    while let Ok(cmd) = rx.try_recv() {
                        mixer.apply(cmd);
                    }
                    for frame in data.chunks_mut(channels) {
                        let value = mixer.next_sample();
                        for sample in frame.iter_mut() {
                            *sample = value;
                        }
                    }
                },
                move |err| {
                    error!("audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| KeybandError::Audio(format!("failed to build output stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| KeybandError::Audio(format!("failed to play stream: {}", e)))?;

        info!("audio output at {} Hz, {} channel(s)", sample_rate, channels);
        Ok(Self {
            tx,
            _stream: stream,
            instrument,
            bank,
        })
    }

    fn send(&self, cmd: AudioCommand) {
        if self.tx.send(cmd).is_err() {
            debug!("audio thread disconnected");
        }
    }
}

impl NoteSink for CpalSink {
    fn note_on(&mut self, note: u8, velocity: u8) {
        self.send(AudioCommand::NoteOn { note, velocity });
    }

    fn note_off(&mut self, note: u8) {
        self.send(AudioCommand::NoteOff { note });
    }

    fn sound_name(&self) -> String {
        self.bank.name.clone()
    }

    fn instruments(&mut self) -> Option<&mut dyn InstrumentSelect> {
        Some(self)
    }

    fn sound_banks(&mut self) -> Option<&mut dyn SoundBankLoad> {
        Some(self)
    }
}

impl InstrumentSelect for CpalSink {
    fn select_instrument(&mut self, instrument: Instrument) {
        self.instrument = instrument;
        self.bank = VoiceBank::preset(instrument);
        self.send(AudioCommand::SetBank(self.bank.clone()));
    }
}

impl SoundBankLoad for CpalSink {
    fn load_sound_bank(&mut self, path: &Path) -> Result<(), KeybandError> {
        let bank = instrument::load(path)?;
        debug!("bank {} replaces {}", bank.name, self.instrument);
        self.bank = bank;
        self.send(AudioCommand::SetBank(self.bank.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::Waveform;

    fn bank() -> VoiceBank {
        VoiceBank {
            name: "test".to_string(),
            waveform: Waveform::Square,
            attack: 0.01,
            decay: 0.01,
            sustain: 0.5,
            release: 0.01,
            gain: 1.0,
        }
    }

    #[test]
    fn test_midi_to_freq() {
        assert!((midi_to_freq(69) - 440.0).abs() < 1e-9);
        assert!((midi_to_freq(57) - 220.0).abs() < 1e-9);
        assert!((midi_to_freq(60) - 261.6256).abs() < 1e-3);
    }

    #[test]
    fn test_envelope_stages() {
        let bank = bank();
        let mut voice = Voice::new(60, 127);
        assert!((voice.envelope(&bank, 0.005) - 0.5).abs() < 1e-9);
        assert_eq!(voice.envelope(&bank, 0.005), 1.0);
        assert_eq!(voice.stage, Stage::Decay);
        voice.envelope(&bank, 0.02);
        assert_eq!(voice.stage, Stage::Sustain);
        assert_eq!(voice.envelope(&bank, 1.0), 0.5);
        voice.release();
        assert!((voice.envelope(&bank, 0.005) - 0.25).abs() < 1e-9);
        assert!(!voice.finished(&bank));
        assert_eq!(voice.envelope(&bank, 0.005), 0.0);
        assert!(voice.finished(&bank));
    }

    #[test]
    fn test_mixer_retrigger_and_steal() {
        let mut mixer = Mixer {
            voices: Vec::new(),
            bank: bank(),
            sample_rate: 1000.0,
        };
        mixer.apply(AudioCommand::NoteOn { note: 60, velocity: 100 });
        mixer.apply(AudioCommand::NoteOn { note: 60, velocity: 100 });
        assert_eq!(mixer.voices.len(), 1);
        for note in 0..MAX_VOICES as u8 + 3 {
            mixer.apply(AudioCommand::NoteOn { note: 70 + note % 50, velocity: 100 });
        }
        assert_eq!(mixer.voices.len(), MAX_VOICES);
    }

    #[test]
    fn test_released_voices_are_dropped() {
        let mut mixer = Mixer {
            voices: Vec::new(),
            bank: bank(),
            sample_rate: 1000.0,
        };
        mixer.apply(AudioCommand::NoteOn { note: 64, velocity: 100 });
        for _ in 0..30 {
            mixer.next_sample();
        }
        mixer.apply(AudioCommand::NoteOff { note: 64 });
        for _ in 0..20 {
            mixer.next_sample();
        }
        assert!(mixer.voices.is_empty());
    }
}
