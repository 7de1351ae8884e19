mod audio;
mod repl;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use cpal::traits::DeviceTrait;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use polypad_engine::{ChannelLayout, EngineConfig, SamplerEngine};
use polypad_midi::MidiOptions;

#[derive(Parser)]
#[command(author, version, about = "Polypad - real-time polyphonic sample pad engine")]
struct Cli {
    /// Directory containing numbered preset directories (0/, 1/, ...).
    #[arg(long, default_value = "banks")]
    banks: PathBuf,
    /// Preset to load at startup (name or slot number).
    #[arg(long, default_value = "0")]
    preset: String,
    /// Output device name (substring match); system default when omitted.
    #[arg(long)]
    device: Option<String>,
    /// Requested output sample rate in Hz.
    #[arg(long, default_value_t = 44_100)]
    sample_rate: u32,
    /// Largest render block in frames.
    #[arg(long, default_value_t = 1024)]
    block_size: usize,
    #[arg(long, value_enum, default_value = "stereo")]
    layout: LayoutArg,
    /// Voice pool capacity.
    #[arg(long, default_value_t = 64)]
    voices: usize,
    /// Initial master volume in [0, 1].
    #[arg(long, default_value_t = 0.8)]
    volume: f32,
    /// MIDI input port (substring match, or "auto" for the first port).
    #[arg(long)]
    midi_input: Option<String>,
    /// Only react to this MIDI channel (0-15); omni when omitted.
    #[arg(long)]
    midi_channel: Option<u8>,
    /// List output devices and exit.
    #[arg(long)]
    list_devices: bool,
    /// List MIDI input ports and exit.
    #[arg(long)]
    list_midi_inputs: bool,
    /// Play a sine test tone at the given frequency instead of loading banks.
    #[arg(long)]
    test_tone: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LayoutArg {
    Mono,
    Stereo,
}

impl From<LayoutArg> for ChannelLayout {
    fn from(layout: LayoutArg) -> Self {
        match layout {
            LayoutArg::Mono => ChannelLayout::Mono,
            LayoutArg::Stereo => ChannelLayout::Stereo,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let args = Cli::parse();

    if args.list_devices {
        let devices = audio::list_output_devices()?;
        if devices.is_empty() {
            println!("No output devices detected.");
        } else {
            println!("Available output devices:");
            for name in devices {
                println!("  - {name}");
            }
        }
        return Ok(());
    }

    if args.list_midi_inputs {
        let ports = polypad_midi::list_inputs().context("failed to list MIDI inputs")?;
        if ports.is_empty() {
            println!("No MIDI input ports detected.");
        } else {
            println!("Available MIDI inputs:");
            for port in ports {
                println!("  - {port}");
            }
        }
        return Ok(());
    }

    let desired = EngineConfig {
        sample_rate: args.sample_rate,
        max_block: args.block_size,
        layout: args.layout.into(),
        max_voices: args.voices,
    };

    let device = audio::resolve_device(args.device.as_deref())?;
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    let (stream_config, sample_format, config) = audio::negotiate_config(&device, &desired)?;
    info!(
        device = %device_name,
        sample_rate = config.sample_rate,
        channels = config.channels(),
        "output device ready"
    );

    if let Some(frequency) = args.test_tone {
        let _stream = audio::start_test_tone(&device, &stream_config, sample_format, frequency)?;
        println!("Playing {frequency} Hz test tone on '{device_name}'; press Enter to stop.");
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).ok();
        return Ok(());
    }

    let presets = Arc::new(
        polypad_bank::load_preset_table(&args.banks, &config)
            .with_context(|| format!("failed to load banks from {}", args.banks.display()))?,
    );
    info!(presets = presets.len(), "banks loaded");

    let (engine, control) = SamplerEngine::new(config, Arc::clone(&presets))?;
    control.set_volume(args.volume);
    control
        .load_preset(&args.preset)
        .with_context(|| format!("failed to load preset '{}'", args.preset))?;

    let _stream = audio::start_stream(&device, &stream_config, sample_format, engine)?;

    let _midi = match args.midi_input.as_deref() {
        Some(port) => match polypad_midi::connect(
            MidiOptions {
                port: Some(port.to_string()),
                channel: args.midi_channel,
            },
            control.clone(),
        ) {
            Ok(connection) => Some(connection),
            Err(err) => {
                warn!(error = %err, "running without MIDI input");
                None
            }
        },
        None => None,
    };

    repl::run(&control)
}
