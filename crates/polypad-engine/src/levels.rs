use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use atomic_float::AtomicF32;

/// Sentinel for "no preset loaded yet".
const PRESET_NONE: u32 = u32::MAX;

/// Lock-free cell shared by the control, render, and display contexts.
///
/// Master gain is written by the control context and latched by the render
/// context once per block; everything else is telemetry the render context
/// publishes after each block. Reads are best-effort with relaxed ordering —
/// staleness of one block is acceptable for display, and nothing here gates
/// correctness.
#[derive(Debug)]
pub struct EngineLevels {
    master_gain: AtomicF32,
    active_voices: AtomicU32,
    preset_slot: AtomicU32,
    faults: AtomicU32,
    xruns: AtomicU32,
    stream_failed: AtomicBool,
}

impl EngineLevels {
    pub fn new(master_gain: f32) -> Self {
        Self {
            master_gain: AtomicF32::new(master_gain.clamp(0.0, 1.0)),
            active_voices: AtomicU32::new(0),
            preset_slot: AtomicU32::new(PRESET_NONE),
            faults: AtomicU32::new(0),
            xruns: AtomicU32::new(0),
            stream_failed: AtomicBool::new(false),
        }
    }

    pub fn master_gain(&self) -> f32 {
        self.master_gain.load(Ordering::Relaxed)
    }

    pub(crate) fn store_master_gain(&self, gain: f32) {
        self.master_gain.store(gain, Ordering::Relaxed);
    }

    pub fn active_voices(&self) -> u32 {
        self.active_voices.load(Ordering::Relaxed)
    }

    pub(crate) fn store_active_voices(&self, count: u32) {
        self.active_voices.store(count, Ordering::Relaxed);
    }

    pub fn preset_slot(&self) -> Option<u32> {
        match self.preset_slot.load(Ordering::Relaxed) {
            PRESET_NONE => None,
            slot => Some(slot),
        }
    }

    pub(crate) fn store_preset_slot(&self, slot: u32) {
        self.preset_slot.store(slot, Ordering::Relaxed);
    }

    /// Render faults contained since startup (each one replaced a block with
    /// silence).
    pub fn faults(&self) -> u32 {
        self.faults.load(Ordering::Relaxed)
    }

    pub(crate) fn record_fault(&self) {
        self.faults.fetch_add(1, Ordering::Relaxed);
    }

    /// Blocks that overran their deadline, as measured by the stream owner.
    pub fn xruns(&self) -> u32 {
        self.xruns.load(Ordering::Relaxed)
    }

    pub fn record_xrun(&self) {
        self.xruns.fetch_add(1, Ordering::Relaxed);
    }

    /// True once the output device has reported a fatal stream error. The
    /// engine does not recover a dead device; the owner decides whether to
    /// rebuild the stream.
    pub fn stream_failed(&self) -> bool {
        self.stream_failed.load(Ordering::Relaxed)
    }

    pub fn record_stream_failure(&self) {
        self.stream_failed.store(true, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LevelsSnapshot {
        LevelsSnapshot {
            master_gain: self.master_gain(),
            active_voices: self.active_voices(),
            preset_slot: self.preset_slot(),
            faults: self.faults(),
            xruns: self.xruns(),
            stream_failed: self.stream_failed(),
        }
    }
}

/// Point-in-time copy of [`EngineLevels`] for display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelsSnapshot {
    pub master_gain: f32,
    pub active_voices: u32,
    pub preset_slot: Option<u32>,
    pub faults: u32,
    pub xruns: u32,
    pub stream_failed: bool,
}
