use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Output channel configuration for the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelLayout {
    Mono,
    Stereo,
}

impl ChannelLayout {
    pub fn channels(&self) -> usize {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }
}

/// Fixed parameters the engine is constructed with. Nothing in here changes
/// while a stream is running; preset swaps replace sample data, not the
/// engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Output sample rate in Hz. Sample files that do not match are skipped
    /// at load time; the engine never resamples.
    pub sample_rate: u32,
    /// Largest block, in frames, a single render call will be asked for.
    pub max_block: usize,
    pub layout: ChannelLayout,
    /// Voice slots in the pool; allocation beyond this steals per the
    /// oldest-first policy.
    pub max_voices: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            max_block: 1024,
            layout: ChannelLayout::Stereo,
            max_voices: 64,
        }
    }
}

impl EngineConfig {
    pub fn new(sample_rate: u32, max_block: usize, layout: ChannelLayout) -> Self {
        Self {
            sample_rate,
            max_block,
            layout,
            ..Self::default()
        }
    }

    pub fn channels(&self) -> usize {
        self.layout.channels()
    }

    pub(crate) fn validate(&self) -> Result<(), EngineError> {
        if self.sample_rate == 0 {
            return Err(EngineError::InvalidConfig("sample rate must be non-zero".into()));
        }
        if self.max_block == 0 {
            return Err(EngineError::InvalidConfig("block size must be non-zero".into()));
        }
        if self.max_voices == 0 {
            return Err(EngineError::InvalidConfig("voice pool must hold at least one voice".into()));
        }
        Ok(())
    }
}
