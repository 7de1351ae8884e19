//! End-to-end playback scenarios: control calls interleaved with render
//! blocks, exercised through the public engine surface only.

use std::sync::Arc;

use proptest::prelude::*;

use polypad_engine::{
    ChannelLayout, ControlHandle, EngineConfig, PresetTable, SampleBank, SampleBuffer,
    SamplerEngine,
};

const BLOCK_FRAMES: usize = 1_024;

fn bank_for_all_notes(frames: usize) -> Arc<SampleBank> {
    let buffer = Arc::new(SampleBuffer::from_interleaved(
        44_100,
        2,
        vec![0.5; frames * 2],
    ));
    let mut bank = SampleBank::new("full");
    for note in 0..128u8 {
        bank.insert(note, Arc::clone(&buffer));
    }
    Arc::new(bank)
}

fn build_engine(max_voices: usize) -> (SamplerEngine, ControlHandle) {
    let mut presets = PresetTable::new();
    presets.push(bank_for_all_notes(44_100));
    presets.push(bank_for_all_notes(44_100));
    let config = EngineConfig {
        max_voices,
        ..EngineConfig::default()
    };
    let (engine, control) = SamplerEngine::new(config, Arc::new(presets)).expect("engine");
    control.load_preset_slot(0).expect("initial preset");
    (engine, control)
}

fn render(engine: &mut SamplerEngine) -> Vec<f32> {
    let mut out = vec![0.0f32; BLOCK_FRAMES * 2];
    engine.render(&mut out);
    out
}

#[test]
fn held_note_sounds_in_every_block_until_exhaustion() {
    let (mut engine, control) = build_engine(8);
    control.note_on(60, 96).unwrap();

    // 44100 sample frames fill 43 full blocks and part of a 44th.
    for _ in 0..43 {
        let block = render(&mut engine);
        assert!(block.iter().any(|s| *s != 0.0));
    }
    let block = render(&mut engine);
    assert!(block.iter().any(|s| *s != 0.0));
    assert_eq!(engine.active_voices(), 0);

    let block = render(&mut engine);
    assert!(block.iter().all(|s| *s == 0.0));
}

#[test]
fn released_note_fades_out_within_its_envelope() {
    let (mut engine, control) = build_engine(8);
    control.note_on(60, 127).unwrap();
    render(&mut engine);

    control.note_off(60).unwrap();
    // 100 ms at 44.1 kHz is 4410 frames: five more blocks finish the fade.
    let mut peaks = Vec::new();
    for _ in 0..5 {
        let block = render(&mut engine);
        peaks.push(block.iter().fold(0.0f32, |acc, s| acc.max(s.abs())));
    }
    assert!(peaks.windows(2).all(|pair| pair[1] < pair[0]));
    assert_eq!(engine.active_voices(), 0);
}

#[test]
fn oldest_voice_is_stolen_at_capacity() {
    let (mut engine, control) = build_engine(2);
    control.note_on(60, 127).unwrap();
    control.note_on(62, 127).unwrap();
    control.note_on(64, 127).unwrap();
    render(&mut engine);

    assert_eq!(engine.active_voices(), 2);
    // The voice for note 60 was evicted; releasing 62 and 64 drains the pool,
    // while a release for 60 would have nothing to act on.
    control.note_off(60).unwrap();
    render(&mut engine);
    assert_eq!(engine.active_voices(), 2);

    control.note_off(62).unwrap();
    control.note_off(64).unwrap();
    for _ in 0..6 {
        render(&mut engine);
    }
    assert_eq!(engine.active_voices(), 0);
}

#[test]
fn preset_swap_mid_playback_goes_silent_next_block() {
    let (mut engine, control) = build_engine(8);
    for note in [60u8, 64, 67] {
        control.note_on(note, 127).unwrap();
    }
    let block = render(&mut engine);
    assert!(block.iter().any(|s| *s != 0.0));

    control.load_preset_slot(1).unwrap();
    let block = render(&mut engine);
    assert!(block.iter().all(|s| *s == 0.0));
    assert_eq!(engine.levels().snapshot().preset_slot, Some(1));
}

#[test]
fn mono_layout_renders_full_blocks() {
    let mut presets = PresetTable::new();
    presets.push(bank_for_all_notes(8_192));
    let config = EngineConfig {
        layout: ChannelLayout::Mono,
        ..EngineConfig::default()
    };
    let (mut engine, control) = SamplerEngine::new(config, Arc::new(presets)).expect("engine");
    control.load_preset_slot(0).unwrap();
    control.note_on(60, 127).unwrap();

    let mut out = vec![0.0f32; BLOCK_FRAMES];
    engine.render(&mut out);
    assert!(out.iter().all(|s| s.abs() <= 1.0));
    assert!(out.iter().any(|s| *s != 0.0));
}

proptest! {
    // Whatever the control surface throws at the engine, the pool never
    // exceeds its capacity and output never leaves [-1, 1].
    #[test]
    fn polyphony_and_output_range_hold_under_arbitrary_input(
        events in prop::collection::vec((0u8..4, 0u8..128u8, 0u8..128u8), 0..256),
    ) {
        let (mut engine, control) = build_engine(16);
        for (step, (kind, note, velocity)) in events.into_iter().enumerate() {
            match kind {
                0 => { let _ = control.note_on(note, velocity); }
                1 => { let _ = control.note_off(note); }
                2 => { control.set_volume(velocity as f32 / 64.0); }
                _ => {}
            }
            if step % 4 == 3 {
                let block = render(&mut engine);
                prop_assert!(engine.active_voices() <= 16);
                prop_assert!(block.iter().all(|s| s.abs() <= 1.0));
            }
        }
        let block = render(&mut engine);
        prop_assert!(engine.active_voices() <= 16);
        prop_assert!(block.iter().all(|s| s.abs() <= 1.0));
    }
}
