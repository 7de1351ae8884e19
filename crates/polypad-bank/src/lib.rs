//! Polypad Bank
//! =============
//! Builds immutable sample banks from disk. A bank root holds numbered
//! preset directories; every audio file inside maps to one MIDI note via
//! its filename. Decoding happens entirely before a stream starts, so the
//! engine only ever sees ready-to-mix buffers.

mod decode;
mod notes;

pub use notes::note_from_stem;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::{debug, info, warn};

use polypad_engine::{EngineConfig, PresetTable, SampleBank, SampleBuffer};

const AUDIO_EXTENSIONS: &[&str] = &["wav", "flac", "aiff", "aif"];

/// Scans a bank root for numbered preset directories (`0/`, `1/`, …) and
/// loads each into a preset slot, in ascending numeric order. Sparse
/// numbering is fine; slot indices are assigned densely.
pub fn load_preset_table(root: &Path, config: &EngineConfig) -> anyhow::Result<PresetTable> {
    let entries = std::fs::read_dir(root)
        .with_context(|| format!("failed to read bank root {}", root.display()))?;

    let mut dirs: Vec<(u32, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| {
            let path = entry.path();
            let number = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.parse::<u32>().ok())?;
            Some((number, path))
        })
        .collect();
    dirs.sort_by_key(|(number, _)| *number);

    if dirs.is_empty() {
        bail!("no numbered preset directories under {}", root.display());
    }

    let mut table = PresetTable::new();
    for (_, dir) in dirs {
        let bank = load_preset_dir(&dir, config)?;
        if bank.is_empty() {
            warn!(preset = %dir.display(), "preset has no playable samples");
        }
        let mapped = bank.len();
        let slot = table.push(Arc::new(bank));
        info!(slot, mapped, preset = %dir.display(), "loaded preset");
    }
    Ok(table)
}

/// Loads one preset directory into a bank. Files that cannot be mapped or
/// decoded are skipped with a warning; only an unreadable directory is an
/// error.
pub fn load_preset_dir(dir: &Path, config: &EngineConfig) -> anyhow::Result<SampleBank> {
    let name = dir
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("preset")
        .to_string();
    let mut bank = SampleBank::new(name);

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read preset directory {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| AUDIO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();

    for path in files {
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        let Some(note) = note_from_stem(stem) else {
            warn!(file = %path.display(), "no MIDI note in filename; skipping");
            continue;
        };
        match load_sample_file(&path, config) {
            Ok(buffer) => {
                debug!(file = %path.display(), note, frames = buffer.frames(), "mapped sample");
                bank.insert(note, Arc::new(buffer));
            }
            Err(err) => {
                warn!(file = %path.display(), error = %err, "skipping sample");
            }
        }
    }
    Ok(bank)
}

/// Decodes a single audio file and normalises it to the engine's channel
/// layout. A sample rate that does not match the engine is an error — the
/// engine plays at unity speed and never resamples, and playing a file at
/// the wrong pitch would be worse than skipping it.
pub fn load_sample_file(path: &Path, config: &EngineConfig) -> anyhow::Result<SampleBuffer> {
    let decoded = decode::decode_file(path)?;
    if decoded.sample_rate != config.sample_rate {
        bail!(
            "sample rate {} Hz does not match engine rate {} Hz",
            decoded.sample_rate,
            config.sample_rate
        );
    }
    let channels = config.channels();
    let data = normalize_channels(&decoded.interleaved, decoded.channels, channels);
    Ok(SampleBuffer::from_interleaved(
        decoded.sample_rate,
        channels,
        data,
    ))
}

fn normalize_channels(interleaved: &[f32], src: usize, dst: usize) -> Vec<f32> {
    if src == dst {
        return interleaved.to_vec();
    }
    let frames = interleaved.len() / src;
    let mut out = Vec::with_capacity(frames * dst);
    for frame in interleaved.chunks_exact(src) {
        if src == 1 {
            out.extend(std::iter::repeat(frame[0]).take(dst));
        } else if dst == 1 {
            out.push(frame.iter().sum::<f32>() / src as f32);
        } else {
            for ch in 0..dst {
                out.push(frame[ch.min(src - 1)]);
            }
        }
    }
    out
}
