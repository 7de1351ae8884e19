use std::sync::Arc;

use crate::bank::PresetTable;
use crate::command::{Command, CommandQueue};
use crate::error::EngineError;
use crate::levels::EngineLevels;

/// The control-context half of the engine: the API a control surface (MIDI
/// dispatcher, buttons, UI) calls into.
///
/// Every method is non-blocking and safe to call from any thread; effects
/// become audible at the start of the next render block. Cloning is cheap
/// and clones feed the same engine.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    commands: CommandQueue,
    levels: Arc<EngineLevels>,
    presets: Arc<PresetTable>,
}

impl ControlHandle {
    pub(crate) fn new(
        commands: CommandQueue,
        levels: Arc<EngineLevels>,
        presets: Arc<PresetTable>,
    ) -> Self {
        Self {
            commands,
            levels,
            presets,
        }
    }

    /// Triggers a voice for `note`. Velocity zero is the standard shorthand
    /// for a note-off and is treated as one.
    pub fn note_on(&self, note: u8, velocity: u8) -> Result<(), EngineError> {
        if velocity == 0 {
            return self.note_off(note);
        }
        self.send(Command::NoteOn {
            note,
            velocity: velocity.min(127),
        })
    }

    /// Begins the release envelope on every sustaining voice for `note`.
    pub fn note_off(&self, note: u8) -> Result<(), EngineError> {
        self.send(Command::NoteOff { note })
    }

    /// Sets master volume, clamped to [0, 1]. Stored atomically; the render
    /// context latches it at the start of its next block.
    pub fn set_volume(&self, volume: f32) {
        self.levels.store_master_gain(volume.clamp(0.0, 1.0));
    }

    pub fn volume(&self) -> f32 {
        self.levels.master_gain()
    }

    /// Swaps the active preset by id (bank name or slot number). Unknown ids
    /// are refused and the previous bank stays active.
    pub fn load_preset(&self, id: &str) -> Result<u32, EngineError> {
        let preset = self
            .presets
            .find(id)
            .ok_or_else(|| EngineError::UnknownPreset(id.to_string()))?;
        let slot = preset.slot;
        self.send(Command::LoadBank {
            slot,
            bank: Arc::clone(&preset.bank),
        })?;
        Ok(slot)
    }

    /// Swaps the active preset by slot index.
    pub fn load_preset_slot(&self, slot: u32) -> Result<(), EngineError> {
        let preset = self
            .presets
            .get(slot)
            .ok_or(EngineError::EmptySlot(slot))?;
        self.send(Command::LoadBank {
            slot,
            bank: Arc::clone(&preset.bank),
        })
    }

    /// Releases every held note (MIDI all-notes-off semantics).
    pub fn release_all(&self) -> Result<(), EngineError> {
        self.send(Command::ReleaseAll)
    }

    /// Kills every voice immediately (MIDI all-sound-off semantics).
    pub fn stop_all(&self) -> Result<(), EngineError> {
        self.send(Command::StopAll)
    }

    pub fn levels(&self) -> &Arc<EngineLevels> {
        &self.levels
    }

    pub fn presets(&self) -> &Arc<PresetTable> {
        &self.presets
    }

    fn send(&self, command: Command) -> Result<(), EngineError> {
        self.commands
            .try_send(command)
            .map_err(|_| EngineError::CommandQueueFull)
    }
}
