use std::sync::Arc;

use crate::bank::SampleBuffer;

/// Release envelope length. The source hardware shipped this as a fixed
/// constant rather than a per-preset parameter, and so do we.
pub const RELEASE_SECONDS: f32 = 0.1;

/// Frames a release envelope spans at the given sample rate.
pub fn release_frames(sample_rate: u32) -> u32 {
    ((RELEASE_SECONDS * sample_rate as f32).round() as u32).max(1)
}

/// Lifecycle state of a voice. The release counters exist only while the
/// voice is actually releasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Sustain,
    Releasing { total: u32, elapsed: u32 },
}

/// One in-flight playback of a sample: a frame cursor into a shared buffer,
/// a fixed per-voice gain, and the release state machine.
#[derive(Debug, Clone)]
pub struct Voice {
    sample: Arc<SampleBuffer>,
    position: usize,
    note: u8,
    velocity: u8,
    state: VoiceState,
    serial: u64,
}

impl Voice {
    fn new(sample: Arc<SampleBuffer>, note: u8, velocity: u8, serial: u64) -> Self {
        Self {
            sample,
            position: 0,
            note,
            velocity,
            state: VoiceState::Sustain,
            serial,
        }
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    pub fn is_releasing(&self) -> bool {
        matches!(self.state, VoiceState::Releasing { .. })
    }

    /// A finished voice must never be mixed again; the pool reclaims it at
    /// the end of the block.
    pub fn is_finished(&self) -> bool {
        if self.position >= self.sample.frames() {
            return true;
        }
        matches!(self.state, VoiceState::Releasing { total, elapsed } if elapsed >= total)
    }

    /// Starts the release envelope. Voices already releasing keep their
    /// envelope; retriggering would make the fade restart audibly.
    pub fn begin_release(&mut self, total: u32) {
        if self.state == VoiceState::Sustain {
            self.state = VoiceState::Releasing {
                total: total.max(1),
                elapsed: 0,
            };
        }
    }

    /// Accumulates up to `frames` frames into the interleaved `out` block and
    /// advances the cursors. `gain` already folds velocity and master volume;
    /// the release envelope is applied per sample on top of it.
    pub(crate) fn mix_into(&mut self, out: &mut [f32], frames: usize, channels: usize, gain: f32) {
        let available = self.sample.frames().saturating_sub(self.position);
        let n = frames.min(available);
        if n == 0 || channels == 0 {
            return;
        }

        let src_channels = self.sample.channels();
        let data = self.sample.data();

        for i in 0..n {
            let scale = gain * self.envelope_at(i as u32);
            if scale <= 0.0 {
                continue;
            }
            let out_base = i * channels;
            let src_base = (self.position + i) * src_channels;
            if src_channels == channels {
                for ch in 0..channels {
                    out[out_base + ch] += data[src_base + ch] * scale;
                }
            } else if src_channels == 1 {
                let value = data[src_base] * scale;
                for ch in 0..channels {
                    out[out_base + ch] += value;
                }
            } else {
                // Channel-count mismatch survived loading; fold safely.
                for ch in 0..channels {
                    out[out_base + ch] += data[src_base + ch.min(src_channels - 1)] * scale;
                }
            }
        }

        self.position += n;
        if let VoiceState::Releasing { total, elapsed } = self.state {
            self.state = VoiceState::Releasing {
                total,
                elapsed: (elapsed + n as u32).min(total),
            };
        }
    }

    fn envelope_at(&self, offset: u32) -> f32 {
        match self.state {
            VoiceState::Sustain => 1.0,
            VoiceState::Releasing { total, elapsed } => {
                (1.0 - (elapsed + offset) as f32 / total as f32).max(0.0)
            }
        }
    }
}

/// Fixed-capacity arena of voice slots. Allocated once at engine
/// construction; the render path never grows or shrinks it.
#[derive(Debug)]
pub struct VoicePool {
    slots: Vec<Option<Voice>>,
    next_serial: u64,
}

impl VoicePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity.max(1)).map(|_| None).collect(),
            next_serial: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live voices.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|slot| slot.is_none())
    }

    /// Starts a voice, stealing a slot when the pool is full: the oldest
    /// releasing voice goes first, then the oldest voice overall. Distinct
    /// triggers of the same note stack as independent voices.
    pub fn allocate(&mut self, sample: Arc<SampleBuffer>, note: u8, velocity: u8) {
        let slot = self
            .slots
            .iter()
            .position(|slot| slot.is_none())
            .unwrap_or_else(|| self.steal_slot());
        let serial = self.next_serial;
        self.next_serial += 1;
        self.slots[slot] = Some(Voice::new(sample, note, velocity, serial));
    }

    fn steal_slot(&self) -> usize {
        let mut best: Option<(usize, (bool, u64))> = None;
        for (index, voice) in self.slots.iter().enumerate() {
            let Some(voice) = voice else { continue };
            // Releasing voices outrank sustaining ones as steal targets;
            // ties break to the lowest serial (the oldest allocation).
            let key = (voice.is_releasing(), u64::MAX - voice.serial);
            if best.map_or(true, |(_, best_key)| key > best_key) {
                best = Some((index, key));
            }
        }
        best.map(|(index, _)| index).unwrap_or(0)
    }

    /// Moves every sustaining voice for `note` into release. Voices already
    /// releasing are left on their existing envelope.
    pub fn release_note(&mut self, note: u8, total: u32) {
        for voice in self.voices_mut() {
            if voice.note() == note {
                voice.begin_release(total);
            }
        }
    }

    /// Moves every sustaining voice into release, regardless of note.
    pub fn release_all(&mut self, total: u32) {
        for voice in self.voices_mut() {
            voice.begin_release(total);
        }
    }

    /// Drops every voice immediately. Used for preset swaps and all-sound-off.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }

    /// Removes voices whose buffer or release envelope is exhausted. Returns
    /// the number reclaimed.
    pub fn reclaim_finished(&mut self) -> usize {
        let mut reclaimed = 0;
        for slot in &mut self.slots {
            if slot.as_ref().is_some_and(Voice::is_finished) {
                *slot = None;
                reclaimed += 1;
            }
        }
        reclaimed
    }

    pub fn iter(&self) -> impl Iterator<Item = &Voice> {
        self.slots.iter().filter_map(|slot| slot.as_ref())
    }

    /// Live voices in slot order; the mix pass iterates this so block output
    /// is deterministic.
    pub(crate) fn voices_mut(&mut self) -> impl Iterator<Item = &mut Voice> {
        self.slots.iter_mut().filter_map(|slot| slot.as_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(frames: usize) -> Arc<SampleBuffer> {
        Arc::new(SampleBuffer::from_interleaved(
            44_100,
            2,
            vec![0.5; frames * 2],
        ))
    }

    fn mix_block(pool: &mut VoicePool, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames * 2];
        for voice in pool.voices_mut() {
            let gain = voice.velocity() as f32 / 127.0;
            voice.mix_into(&mut out, frames, 2, gain);
        }
        pool.reclaim_finished();
        out
    }

    #[test]
    fn release_frames_matches_the_hundred_millisecond_constant() {
        assert_eq!(release_frames(44_100), 4_410);
        assert_eq!(release_frames(48_000), 4_800);
    }

    #[test]
    fn full_pool_steals_the_oldest_voice() {
        let mut pool = VoicePool::new(2);
        pool.allocate(sample(1_000), 60, 127);
        pool.allocate(sample(1_000), 62, 127);
        pool.allocate(sample(1_000), 64, 127);

        let notes: Vec<u8> = pool.iter().map(Voice::note).collect();
        assert_eq!(pool.len(), 2);
        assert!(notes.contains(&62));
        assert!(notes.contains(&64));
        assert!(!notes.contains(&60));
    }

    #[test]
    fn releasing_voices_are_stolen_before_sustaining_ones() {
        let mut pool = VoicePool::new(2);
        pool.allocate(sample(1_000), 60, 127);
        pool.allocate(sample(1_000), 62, 127);
        // 62 is newer but releasing, so it is the preferred steal target.
        pool.release_note(62, 4_410);
        pool.allocate(sample(1_000), 64, 127);

        let notes: Vec<u8> = pool.iter().map(Voice::note).collect();
        assert!(notes.contains(&60));
        assert!(notes.contains(&64));
        assert!(!notes.contains(&62));
    }

    #[test]
    fn release_envelope_ends_after_exactly_its_frame_budget() {
        let mut pool = VoicePool::new(4);
        pool.allocate(sample(100_000), 60, 127);
        pool.release_note(60, 4_410);

        let mut mixed_frames = 0;
        while pool.len() > 0 {
            mix_block(&mut pool, 1_024);
            mixed_frames += 1_024;
            assert!(mixed_frames <= 8_192, "voice failed to die after release");
        }
        // 4410 release frames fit in five 1024-frame blocks.
        assert_eq!(mixed_frames, 5 * 1_024);
    }

    #[test]
    fn release_gain_decreases_monotonically() {
        let mut pool = VoicePool::new(1);
        pool.allocate(sample(100_000), 60, 127);
        pool.release_note(60, 4_410);

        let mut previous = f32::MAX;
        for _ in 0..4 {
            let block = mix_block(&mut pool, 1_024);
            let peak = block.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
            assert!(peak < previous);
            assert!(peak > 0.0);
            previous = peak;
        }
    }

    #[test]
    fn releasing_twice_does_not_restart_the_envelope() {
        let mut pool = VoicePool::new(1);
        pool.allocate(sample(100_000), 60, 127);
        pool.release_note(60, 4_410);
        mix_block(&mut pool, 1_024);

        pool.release_note(60, 4_410);
        let voice = pool.iter().next().unwrap();
        assert_eq!(
            voice.state(),
            VoiceState::Releasing {
                total: 4_410,
                elapsed: 1_024
            }
        );
    }

    #[test]
    fn same_note_stacks_and_resolves_independently() {
        let mut pool = VoicePool::new(4);
        pool.allocate(sample(100_000), 60, 127);
        pool.release_note(60, 4_410);
        pool.allocate(sample(100_000), 60, 127);

        assert_eq!(pool.len(), 2);
        let releasing = pool.iter().filter(|v| v.is_releasing()).count();
        assert_eq!(releasing, 1);

        // Second release only touches the sustaining instance.
        pool.release_note(60, 4_410);
        assert!(pool.iter().all(Voice::is_releasing));
    }

    #[test]
    fn exhausted_buffer_mixes_a_partial_window_then_dies() {
        let mut pool = VoicePool::new(1);
        pool.allocate(sample(100), 60, 127);

        let block = mix_block(&mut pool, 64);
        assert!(block.iter().any(|s| *s != 0.0));

        // 36 frames remain; the rest of this block stays silent.
        let block = mix_block(&mut pool, 64);
        assert!(block[..36 * 2].iter().all(|s| *s != 0.0));
        assert!(block[36 * 2..].iter().all(|s| *s == 0.0));
        assert!(pool.is_empty());
    }
}
