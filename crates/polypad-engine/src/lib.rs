//! Polypad Engine
//! ===============
//! Real-time polyphonic sample playback: note events in, fixed-size audio
//! blocks out. The crate splits into a render half ([`SamplerEngine`]),
//! owned by the audio callback and never blocking, and a control half
//! ([`ControlHandle`]), callable from any thread, joined by a bounded
//! lock-free command queue drained at block boundaries.

pub mod bank;
pub mod command;
pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod levels;
pub mod voice;

pub use bank::{Preset, PresetTable, SampleBank, SampleBuffer, NOTE_COUNT};
pub use command::{Command, CommandQueue};
pub use config::{ChannelLayout, EngineConfig};
pub use control::ControlHandle;
pub use engine::SamplerEngine;
pub use error::EngineError;
pub use levels::{EngineLevels, LevelsSnapshot};
pub use voice::{release_frames, Voice, VoicePool, VoiceState, RELEASE_SECONDS};
