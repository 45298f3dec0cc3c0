//! Error types for keyband.
//!
//! Musical operations (mapping, chord parsing, playback) never fail: they
//! return `Option` and bad input degrades to silence. Only resource
//! operations surface a `KeybandError`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeybandError {
    /// Session file problem with its 1-based line number.
    #[error("Config error at line {line}: {message}")]
    Config { line: usize, message: String },

    /// A voice bank could not be loaded. The previous sound stays active.
    #[error("Sound bank error: {0}")]
    SoundBank(String),

    /// The output sink does not offer the requested capability.
    #[error("Output does not support {0}")]
    Unsupported(&'static str),

    /// The audio device or stream could not be opened.
    #[error("Audio error: {0}")]
    Audio(String),

    /// A command-line value that does not name anything known.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
