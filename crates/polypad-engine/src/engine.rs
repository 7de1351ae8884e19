use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::error;

use crate::bank::{PresetTable, SampleBank};
use crate::command::{Command, CommandQueue};
use crate::config::EngineConfig;
use crate::control::ControlHandle;
use crate::error::EngineError;
use crate::levels::EngineLevels;
use crate::voice::{release_frames, VoicePool};

const COMMAND_QUEUE_CAPACITY: usize = 1024;

/// The render-context half of the engine.
///
/// Owned by the audio callback; every method that touches voices runs on the
/// render thread. Communication with the rest of the process goes through
/// the lock-free command queue and the shared [`EngineLevels`] cell, so a
/// render call never waits on the control context.
pub struct SamplerEngine {
    config: EngineConfig,
    pool: VoicePool,
    commands: CommandQueue,
    levels: Arc<EngineLevels>,
    bank: Arc<SampleBank>,
    release_frames: u32,
    block_gain: f32,
}

impl SamplerEngine {
    /// Builds the engine and its control-side counterpart. The preset table
    /// is fixed for the lifetime of the pair; banks within it are swapped in
    /// and out of the render context by slot.
    pub fn new(
        config: EngineConfig,
        presets: Arc<PresetTable>,
    ) -> Result<(Self, ControlHandle), EngineError> {
        config.validate()?;
        let commands = CommandQueue::new(COMMAND_QUEUE_CAPACITY);
        let levels = Arc::new(EngineLevels::new(1.0));
        let control = ControlHandle::new(commands.clone(), Arc::clone(&levels), presets);
        let engine = Self {
            release_frames: release_frames(config.sample_rate),
            pool: VoicePool::new(config.max_voices),
            commands,
            levels: Arc::clone(&levels),
            bank: Arc::new(SampleBank::empty()),
            block_gain: levels.master_gain(),
            config,
        };
        Ok((engine, control))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn levels(&self) -> Arc<EngineLevels> {
        Arc::clone(&self.levels)
    }

    /// Live voice count as of the last block.
    pub fn active_voices(&self) -> usize {
        self.pool.len()
    }

    /// Fills one interleaved output block. This is the audio-device entry
    /// point: it always fills the whole slice before returning, substituting
    /// silence if anything inside the mix pass fails, and never panics
    /// through to the caller.
    pub fn render(&mut self, out: &mut [f32]) {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.process_block(out)));
        if result.is_err() {
            out.fill(0.0);
            self.levels.record_fault();
            error!("render fault contained; block replaced with silence");
        }
    }

    fn process_block(&mut self, out: &mut [f32]) {
        self.begin_block();

        out.fill(0.0);
        let channels = self.config.channels();
        let frames = out.len() / channels;
        let master = self.block_gain;

        // Slot order keeps block output deterministic; mixing itself is
        // commutative so the order does not change what listeners hear.
        for voice in self.pool.voices_mut() {
            let gain = (voice.velocity() as f32 / 127.0) * master;
            voice.mix_into(out, frames, channels, gain);
        }

        hard_clip(out);
        self.pool.reclaim_finished();
        self.levels.store_active_voices(self.pool.len() as u32);
    }

    /// Drains queued control commands and latches the master gain for the
    /// block. Runs before any mixing so a command that was queued before the
    /// block began takes effect in this block.
    fn begin_block(&mut self) {
        while let Some(command) = self.commands.try_recv() {
            self.apply_command(command);
        }
        self.block_gain = self.levels.master_gain();
    }

    fn apply_command(&mut self, command: Command) {
        match command {
            Command::NoteOn { note, velocity } => {
                // A note with no sample mapped is a no-op, not an error.
                if let Some(buffer) = self.bank.lookup(note) {
                    self.pool.allocate(Arc::clone(buffer), note, velocity);
                }
            }
            Command::NoteOff { note } => {
                self.pool.release_note(note, self.release_frames);
            }
            Command::LoadBank { slot, bank } => {
                // Force-kill before the swap so no voice can reference the
                // outgoing bank, then replace the handle in one assignment.
                self.pool.clear();
                self.bank = bank;
                self.levels.store_preset_slot(slot);
            }
            Command::ReleaseAll => {
                self.pool.release_all(self.release_frames);
            }
            Command::StopAll => {
                self.pool.clear();
            }
        }
    }
}

/// Hard-clips to [-1, 1] and flushes non-finite samples to silence, so the
/// device never sees values outside its range no matter how many voices
/// were summed.
fn hard_clip(buffer: &mut [f32]) {
    for sample in buffer {
        if !sample.is_finite() {
            *sample = 0.0;
        } else if *sample > 1.0 {
            *sample = 1.0;
        } else if *sample < -1.0 {
            *sample = -1.0;
        }
    }
}
