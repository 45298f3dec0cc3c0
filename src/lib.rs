//! keyband: turn typing into music.
//!
//! Keys map to notes through a scale and key layout; chord charts and typed
//! scripts drive a deterministic, tick-based performance. All state lives in
//! a [`performer::Performer`], which emits note events to a
//! [`output::NoteSink`].

pub mod chart;
pub mod chord;
pub mod controller;
pub mod error;
pub mod instrument;
pub mod layout;
pub mod mapper;
pub mod output;
pub mod performer;
pub mod repl;
pub mod scheduler;
pub mod script;
pub mod session;
pub mod styles;
pub mod synth;
pub mod theory;
pub mod voice_leading;
