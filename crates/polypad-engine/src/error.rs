use thiserror::Error;

/// Errors surfaced by the engine's control surface. Render-path faults are
/// never represented here; they are contained inside the render call and
/// reported through [`crate::EngineLevels`].
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine configuration invalid: {0}")]
    InvalidConfig(String),
    #[error("unknown preset '{0}'")]
    UnknownPreset(String),
    #[error("no preset loaded in slot {0}")]
    EmptySlot(u32),
    #[error("control command queue is full")]
    CommandQueueFull,
}
