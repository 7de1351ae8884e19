use std::fs::File;
use std::path::Path;

use anyhow::{anyhow, Context};
use symphonia::core::audio::SampleBuffer as SymphoniaSampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Decoded audio exactly as it came off disk, before any channel
/// normalisation.
pub(crate) struct DecodedAudio {
    pub sample_rate: u32,
    pub channels: usize,
    pub interleaved: Vec<f32>,
}

pub(crate) fn decode_file(path: &Path) -> anyhow::Result<DecodedAudio> {
    let display_name = path.display().to_string();
    let file = File::open(path).with_context(|| format!("failed to open {:?}", path))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }
    decode_stream(&display_name, mss, hint)
}

fn decode_stream(
    display_name: &str,
    mss: MediaSourceStream,
    hint: Hint,
) -> anyhow::Result<DecodedAudio> {
    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|err| anyhow!("failed to probe {display_name}: {err}"))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| anyhow!("no default track for {display_name}"))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|err| anyhow!("failed to create decoder for {display_name}: {err}"))?;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| anyhow!("missing sample rate for {display_name}"))?;
    let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(0);

    let mut interleaved = Vec::new();
    let mut scratch: Option<SymphoniaSampleBuffer<f32>> = None;

    loop {
        match format.next_packet() {
            Ok(packet) => match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    if channels == 0 {
                        channels = spec.channels.count();
                    }
                    if scratch.is_none() {
                        scratch = Some(SymphoniaSampleBuffer::<f32>::new(
                            decoded.capacity() as u64,
                            spec,
                        ));
                    }
                    if let Some(buf) = scratch.as_mut() {
                        buf.copy_interleaved_ref(decoded);
                        interleaved.extend_from_slice(buf.samples());
                    }
                }
                Err(SymphoniaError::IoError(err))
                    if err.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::DecodeError(_)) => {
                    decoder.reset();
                }
                Err(err) => return Err(anyhow!("decode error for {display_name}: {err}")),
            },
            Err(SymphoniaError::IoError(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
            }
            Err(err) => return Err(anyhow!("format error for {display_name}: {err}")),
        }
    }

    if channels == 0 {
        return Err(anyhow!("no audio channels in {display_name}"));
    }

    Ok(DecodedAudio {
        sample_rate,
        channels,
        interleaved,
    })
}
