use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use polypad_engine::{EngineConfig, PresetTable, SampleBank, SampleBuffer, SamplerEngine};

fn bench_render(c: &mut Criterion) {
    let buffer = Arc::new(SampleBuffer::from_interleaved(
        44_100,
        2,
        vec![0.3; 44_100 * 2],
    ));
    let mut bank = SampleBank::new("bench");
    for note in 0..128u8 {
        bank.insert(note, Arc::clone(&buffer));
    }
    let mut presets = PresetTable::new();
    presets.push(Arc::new(bank));

    let (mut engine, control) =
        SamplerEngine::new(EngineConfig::default(), Arc::new(presets)).expect("engine");
    control.load_preset_slot(0).expect("preset");

    let mut out = vec![0.0f32; 1_024 * 2];
    c.bench_function("render_64_voices_1024_frames", |b| {
        b.iter(|| {
            // Retrigger so the pool stays saturated; stolen slots keep the
            // voice count pinned at capacity.
            for note in 0..64u8 {
                control.note_on(note, 127).expect("note on");
            }
            engine.render(&mut out);
            criterion::black_box(&out);
        })
    });
}

criterion_group!(benches, bench_render);
criterion_main!(benches);
