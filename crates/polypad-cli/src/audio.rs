//! Output-device plumbing: device selection, stream-config negotiation, and
//! the cpal callback that pulls blocks out of the engine.

use std::f32::consts::TAU;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, StreamConfig};
use tracing::{error, info};

use polypad_engine::{ChannelLayout, EngineConfig, SamplerEngine};

/// Names of every output device on the default host.
pub fn list_output_devices() -> anyhow::Result<Vec<String>> {
    let host = cpal::default_host();
    let mut names = Vec::new();
    for device in host
        .output_devices()
        .context("failed to enumerate output devices")?
    {
        names.push(device.name().unwrap_or_else(|_| "Unknown".to_string()));
    }
    Ok(names)
}

/// Picks an output device by name substring, or the system default.
pub fn resolve_device(requested: Option<&str>) -> anyhow::Result<cpal::Device> {
    let host = cpal::default_host();
    let Some(requested) = requested else {
        return host
            .default_output_device()
            .ok_or_else(|| anyhow!("no default output device"));
    };
    let wanted = requested.to_lowercase();
    host.output_devices()
        .context("failed to enumerate output devices")?
        .find(|device| {
            device
                .name()
                .map(|name| name.to_lowercase().contains(&wanted))
                .unwrap_or(false)
        })
        .ok_or_else(|| anyhow!("no output device matching '{requested}'"))
}

/// Negotiates a stream configuration for the desired engine settings and
/// returns the engine configuration actually achievable on the device. The
/// device has the final say on rate and channel count; the caller must load
/// banks against the returned configuration.
pub fn negotiate_config(
    device: &cpal::Device,
    desired: &EngineConfig,
) -> anyhow::Result<(StreamConfig, SampleFormat, EngineConfig)> {
    let desired_channels = desired.channels() as u16;
    let desired_rate = cpal::SampleRate(desired.sample_rate);

    let supported = device
        .supported_output_configs()
        .context("failed to query output configurations")?;
    for range in supported {
        if range.channels() == desired_channels
            && range.min_sample_rate() <= desired_rate
            && range.max_sample_rate() >= desired_rate
        {
            let config = range.with_sample_rate(desired_rate);
            let sample_format = config.sample_format();
            return Ok((config.config(), sample_format, desired.clone()));
        }
    }

    // Fall back to whatever the device prefers and adapt the engine to it.
    let default = device
        .default_output_config()
        .context("failed to query default output configuration")?;
    let layout = match default.channels() {
        1 => ChannelLayout::Mono,
        2 => ChannelLayout::Stereo,
        other => return Err(anyhow!("unsupported output channel count {other}")),
    };
    let adapted = EngineConfig {
        sample_rate: default.sample_rate().0,
        layout,
        ..desired.clone()
    };
    info!(
        sample_rate = adapted.sample_rate,
        channels = adapted.channels(),
        "requested configuration unavailable; using device default"
    );
    let sample_format = default.sample_format();
    Ok((default.config(), sample_format, adapted))
}

/// Opens the output stream and hands the engine to its callback. The stream
/// owns the engine from here on; all further interaction goes through the
/// control handle.
pub fn start_stream(
    device: &cpal::Device,
    stream_config: &StreamConfig,
    sample_format: SampleFormat,
    engine: SamplerEngine,
) -> anyhow::Result<cpal::Stream> {
    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(device, stream_config, engine)?,
        SampleFormat::I16 => build_stream::<i16>(device, stream_config, engine)?,
        SampleFormat::U16 => build_stream::<u16>(device, stream_config, engine)?,
        other => return Err(anyhow!("unsupported sample format {other:?}")),
    };
    stream.play().context("failed to start output stream")?;
    Ok(stream)
}

fn build_stream<T>(
    device: &cpal::Device,
    stream_config: &StreamConfig,
    mut engine: SamplerEngine,
) -> anyhow::Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = stream_config.channels as usize;
    let sample_rate = stream_config.sample_rate.0.max(1);
    let levels = engine.levels();
    let error_levels = engine.levels();
    let mut scratch = vec![0.0f32; engine.config().max_block * channels.max(1)];

    let stream = device
        .build_output_stream(
            stream_config,
            move |data: &mut [T], _| {
                let start = Instant::now();
                let silence = T::from_sample(0.0);

                // The device may ask for more than one engine block; chunk
                // through the scratch buffer and convert on the way out.
                let mut offset = 0;
                while offset < data.len() {
                    let mut chunk = (data.len() - offset).min(scratch.len());
                    chunk -= chunk % channels;
                    if chunk == 0 {
                        break;
                    }
                    let block = &mut scratch[..chunk];
                    engine.render(block);
                    for (dst, src) in data[offset..offset + chunk].iter_mut().zip(block.iter()) {
                        *dst = T::from_sample(*src);
                    }
                    offset += chunk;
                }
                for dst in &mut data[offset..] {
                    *dst = silence;
                }

                let budget =
                    Duration::from_secs_f64(data.len() as f64 / channels as f64 / sample_rate as f64);
                if start.elapsed() > budget {
                    levels.record_xrun();
                }
            },
            move |err| {
                error_levels.record_stream_failure();
                error!(?err, "audio stream error");
            },
            None,
        )
        .context("failed to open output stream")?;
    Ok(stream)
}

/// Plays a fixed sine through the output path, bypassing the sampler
/// entirely. Used to verify a device before any banks exist.
pub fn start_test_tone(
    device: &cpal::Device,
    stream_config: &StreamConfig,
    sample_format: SampleFormat,
    frequency: f32,
) -> anyhow::Result<cpal::Stream> {
    let stream = match sample_format {
        SampleFormat::F32 => build_tone_stream::<f32>(device, stream_config, frequency)?,
        SampleFormat::I16 => build_tone_stream::<i16>(device, stream_config, frequency)?,
        SampleFormat::U16 => build_tone_stream::<u16>(device, stream_config, frequency)?,
        other => return Err(anyhow!("unsupported sample format {other:?}")),
    };
    stream.play().context("failed to start test tone stream")?;
    Ok(stream)
}

fn build_tone_stream<T>(
    device: &cpal::Device,
    stream_config: &StreamConfig,
    frequency: f32,
) -> anyhow::Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = stream_config.channels as usize;
    let increment = TAU * frequency.max(1.0) / stream_config.sample_rate.0.max(1) as f32;
    let mut phase = 0.0f32;
    let gain = 0.1f32;

    let stream = device
        .build_output_stream(
            stream_config,
            move |data: &mut [T], _| {
                for frame in data.chunks_mut(channels) {
                    let value = phase.sin() * gain;
                    for sample in frame {
                        *sample = T::from_sample(value);
                    }
                    phase += increment;
                    if phase >= TAU {
                        phase -= TAU;
                    }
                }
            },
            |err| {
                error!(?err, "audio stream error");
            },
            None,
        )
        .context("failed to open test tone stream")?;
    Ok(stream)
}
