use std::sync::Arc;

/// Number of addressable MIDI notes in a bank.
pub const NOTE_COUNT: usize = 128;

/// Immutable, pre-decoded PCM audio shared by every voice that plays it.
///
/// Frames are interleaved `f32` at a fixed sample rate. Buffers are built by
/// the bank loader before a stream starts and are never mutated afterwards,
/// so sharing between the control and render contexts needs nothing beyond
/// the `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    sample_rate: u32,
    channels: usize,
    frames: usize,
    data: Vec<f32>,
}

impl SampleBuffer {
    /// Wraps interleaved sample data. A ragged tail that does not fill a
    /// whole frame is dropped.
    pub fn from_interleaved(sample_rate: u32, channels: usize, mut data: Vec<f32>) -> Self {
        let channels = channels.max(1);
        let frames = data.len() / channels;
        data.truncate(frames * channels);
        Self {
            sample_rate,
            channels,
            frames,
            data,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Length in frames, not samples.
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }
}

/// Maps MIDI notes to sample buffers for one preset.
///
/// Fixed 128-slot table so lookup on the render path is a plain index, never
/// a hash or an allocation. Replaced wholesale on preset swap.
#[derive(Debug)]
pub struct SampleBank {
    name: String,
    notes: [Option<Arc<SampleBuffer>>; NOTE_COUNT],
}

impl SampleBank {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            notes: std::array::from_fn(|_| None),
        }
    }

    /// Bank with no mapped notes; what the engine plays before the first
    /// preset loads.
    pub fn empty() -> Self {
        Self::new("empty")
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn insert(&mut self, note: u8, buffer: Arc<SampleBuffer>) {
        if let Some(slot) = self.notes.get_mut(note as usize) {
            *slot = Some(buffer);
        }
    }

    pub fn lookup(&self, note: u8) -> Option<&Arc<SampleBuffer>> {
        self.notes.get(note as usize).and_then(|slot| slot.as_ref())
    }

    /// Number of notes with a sample mapped.
    pub fn len(&self) -> usize {
        self.notes.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.iter().all(|slot| slot.is_none())
    }
}

impl Default for SampleBank {
    fn default() -> Self {
        Self::empty()
    }
}

/// One loadable preset: a bank plus the slot it answers to.
#[derive(Debug, Clone)]
pub struct Preset {
    pub slot: u32,
    pub bank: Arc<SampleBank>,
}

/// Immutable registry of every preset discovered at startup. Owned by the
/// control context; the render context only ever sees the `Arc<SampleBank>`
/// delivered through a swap command.
#[derive(Debug, Default)]
pub struct PresetTable {
    presets: Vec<Preset>,
}

impl PresetTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a bank and returns the slot it was assigned.
    pub fn push(&mut self, bank: Arc<SampleBank>) -> u32 {
        let slot = self.presets.len() as u32;
        self.presets.push(Preset { slot, bank });
        slot
    }

    pub fn get(&self, slot: u32) -> Option<&Preset> {
        self.presets.get(slot as usize)
    }

    /// Resolves a preset id: a bank name (case-insensitive) or a slot number.
    pub fn find(&self, id: &str) -> Option<&Preset> {
        let trimmed = id.trim();
        if let Some(preset) = self
            .presets
            .iter()
            .find(|preset| preset.bank.name().eq_ignore_ascii_case(trimmed))
        {
            return Some(preset);
        }
        trimmed
            .parse::<u32>()
            .ok()
            .and_then(|slot| self.get(slot))
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Preset> {
        self.presets.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(frames: usize) -> Arc<SampleBuffer> {
        Arc::new(SampleBuffer::from_interleaved(
            44_100,
            2,
            vec![0.5; frames * 2],
        ))
    }

    #[test]
    fn ragged_tail_is_dropped() {
        let buf = SampleBuffer::from_interleaved(44_100, 2, vec![0.0; 5]);
        assert_eq!(buf.frames(), 2);
        assert_eq!(buf.data().len(), 4);
    }

    #[test]
    fn lookup_misses_outside_the_mapped_range() {
        let mut bank = SampleBank::new("kit");
        bank.insert(60, buffer(16));
        assert!(bank.lookup(60).is_some());
        assert!(bank.lookup(61).is_none());
        assert_eq!(bank.len(), 1);
    }

    #[test]
    fn preset_table_resolves_names_and_slots() {
        let mut table = PresetTable::new();
        table.push(Arc::new(SampleBank::new("drums")));
        table.push(Arc::new(SampleBank::new("keys")));

        assert_eq!(table.find("drums").map(|p| p.slot), Some(0));
        assert_eq!(table.find("KEYS").map(|p| p.slot), Some(1));
        assert_eq!(table.find("1").map(|p| p.bank.name()), Some("keys"));
        assert!(table.find("strings").is_none());
        assert!(table.find("7").is_none());
    }
}
