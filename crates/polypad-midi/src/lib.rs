//! Polypad MIDI
//! =============
//! MIDI input for the sampler engine. The OS-owned midir callback does
//! nothing but decode and push events into an SPSC ring; a dispatcher
//! thread drains the ring and drives the engine's control API, so the MIDI
//! stack can never stall either the OS callback or the render context.
//!
//! Mappings: note on/off (velocity 0 as note-off), CC 7 to master volume,
//! program change to preset slot, CC 120 all-sound-off, CC 123
//! all-notes-off. A configured channel filter drops everything else.

mod event;

pub use event::MidiEvent;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use midir::{Ignore, MidiInput, MidiInputConnection};
use ringbuf::{HeapConsumer, HeapRb};
use thiserror::Error;
use tracing::{debug, info, warn};

use polypad_engine::ControlHandle;

const EVENT_QUEUE_CAPACITY: usize = 1024;
const IDLE_SLEEP: Duration = Duration::from_micros(200);

const CC_VOLUME: u8 = 7;
const CC_ALL_SOUND_OFF: u8 = 120;
const CC_ALL_NOTES_OFF: u8 = 123;

/// Errors from MIDI port handling.
#[derive(Debug, Error)]
pub enum MidiError {
    #[error("no MIDI input ports available")]
    NoPorts,
    #[error("no MIDI input matching '{0}'")]
    UnknownPort(String),
    #[error("MIDI backend error: {0}")]
    Backend(String),
}

/// Input port selection and filtering options.
#[derive(Debug, Clone, Default)]
pub struct MidiOptions {
    /// Substring match against port names; `None`/empty/"auto" picks the
    /// first port.
    pub port: Option<String>,
    /// Only react to messages on this channel (0-15); omni when `None`.
    pub channel: Option<u8>,
}

/// A live MIDI connection. Dropping it stops the dispatcher thread and
/// closes the port.
pub struct MidiConnection {
    stop: Arc<AtomicBool>,
    dispatcher: Option<JoinHandle<()>>,
    _connection: MidiInputConnection<()>,
}

impl Drop for MidiConnection {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.dispatcher.take() {
            if let Err(err) = handle.join() {
                warn!(?err, "failed to join MIDI dispatcher thread");
            }
        }
    }
}

/// Names of every available MIDI input port.
pub fn list_inputs() -> Result<Vec<String>, MidiError> {
    let mut input = MidiInput::new("polypad-midi-list")
        .map_err(|err| MidiError::Backend(err.to_string()))?;
    input.ignore(Ignore::None);
    let ports = input.ports();
    let mut names = Vec::with_capacity(ports.len());
    for port in &ports {
        names.push(
            input
                .port_name(port)
                .unwrap_or_else(|_| "Unknown".to_string()),
        );
    }
    Ok(names)
}

/// Opens a MIDI input and wires it to the engine's control surface.
pub fn connect(options: MidiOptions, control: ControlHandle) -> Result<MidiConnection, MidiError> {
    let mut input =
        MidiInput::new("polypad-midi").map_err(|err| MidiError::Backend(err.to_string()))?;
    input.ignore(Ignore::None);

    let ports = input.ports();
    if ports.is_empty() {
        return Err(MidiError::NoPorts);
    }

    let requested = options.port.clone().unwrap_or_default();
    let requested_lower = requested.trim().to_lowercase();
    let target_port = if matches!(requested_lower.as_str(), "" | "auto" | "default") {
        ports.first()
    } else {
        ports.iter().find(|port| {
            input
                .port_name(port)
                .map(|name| name.to_lowercase().contains(&requested_lower))
                .unwrap_or(false)
        })
    }
    .ok_or(MidiError::UnknownPort(requested))?;

    let port_name = input
        .port_name(target_port)
        .unwrap_or_else(|_| "Unknown".to_string());

    let (mut producer, consumer) = HeapRb::<MidiEvent>::new(EVENT_QUEUE_CAPACITY).split();
    let stop = Arc::new(AtomicBool::new(false));
    let dispatcher = spawn_dispatcher(consumer, control, options.channel, Arc::clone(&stop))?;

    let stop_flag = Arc::clone(&stop);
    let connection = input
        .connect(
            target_port,
            "polypad-midi-connection",
            move |_timestamp, message, _| {
                if stop_flag.load(Ordering::Relaxed) {
                    return;
                }
                if let Some(event) = MidiEvent::parse(message) {
                    if producer.push(event).is_err() {
                        warn!("MIDI queue full; dropping event");
                    }
                } else {
                    debug!(?message, "ignoring unsupported MIDI message");
                }
            },
            (),
        )
        .map_err(|err| MidiError::Backend(err.to_string()))?;

    info!(port = %port_name, "connected MIDI input");
    Ok(MidiConnection {
        stop,
        dispatcher: Some(dispatcher),
        _connection: connection,
    })
}

fn spawn_dispatcher(
    mut consumer: HeapConsumer<MidiEvent>,
    control: ControlHandle,
    channel: Option<u8>,
    stop: Arc<AtomicBool>,
) -> Result<JoinHandle<()>, MidiError> {
    thread::Builder::new()
        .name("polypad-midi-dispatch".into())
        .spawn(move || {
            while !stop.load(Ordering::Acquire) {
                let mut handled = false;
                while let Some(event) = consumer.pop() {
                    handled = true;
                    dispatch(&control, channel, event);
                }
                if !handled {
                    thread::sleep(IDLE_SLEEP);
                }
            }
            // Drain whatever arrived before the port closed.
            while let Some(event) = consumer.pop() {
                dispatch(&control, channel, event);
            }
        })
        .map_err(|err| MidiError::Backend(err.to_string()))
}

fn dispatch(control: &ControlHandle, channel: Option<u8>, event: MidiEvent) {
    if channel.is_some_and(|wanted| event.channel() != wanted) {
        return;
    }
    let result = match event {
        MidiEvent::NoteOn { note, velocity, .. } => control.note_on(note, velocity),
        MidiEvent::NoteOff { note, .. } => control.note_off(note),
        MidiEvent::ControlChange { control: cc, value, .. } => match cc {
            CC_VOLUME => {
                control.set_volume(value as f32 / 127.0);
                Ok(())
            }
            CC_ALL_SOUND_OFF => control.stop_all(),
            CC_ALL_NOTES_OFF => control.release_all(),
            _ => Ok(()),
        },
        MidiEvent::ProgramChange { program, .. } => {
            match control.load_preset_slot(program as u32) {
                Ok(()) => Ok(()),
                Err(err) => {
                    warn!(program, error = %err, "program change refused");
                    Ok(())
                }
            }
        }
    };
    if let Err(err) = result {
        warn!(?event, error = %err, "control command not delivered");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use polypad_engine::{
        EngineConfig, PresetTable, SampleBank, SampleBuffer, SamplerEngine,
    };

    use super::*;

    fn engine_pair() -> (SamplerEngine, ControlHandle) {
        let mut bank = SampleBank::new("kit");
        bank.insert(
            60,
            Arc::new(SampleBuffer::from_interleaved(
                44_100,
                2,
                vec![0.5; 1_024 * 2],
            )),
        );
        let mut presets = PresetTable::new();
        presets.push(Arc::new(bank));
        let (engine, control) =
            SamplerEngine::new(EngineConfig::default(), Arc::new(presets)).unwrap();
        control.load_preset_slot(0).unwrap();
        (engine, control)
    }

    fn render(engine: &mut SamplerEngine) {
        let mut out = vec![0.0f32; 256 * 2];
        engine.render(&mut out);
    }

    #[test]
    fn note_events_reach_the_engine() {
        let (mut engine, control) = engine_pair();
        dispatch(
            &control,
            None,
            MidiEvent::NoteOn {
                channel: 0,
                note: 60,
                velocity: 100,
            },
        );
        render(&mut engine);
        assert_eq!(engine.active_voices(), 1);
    }

    #[test]
    fn channel_filter_drops_other_channels() {
        let (mut engine, control) = engine_pair();
        dispatch(
            &control,
            Some(0),
            MidiEvent::NoteOn {
                channel: 3,
                note: 60,
                velocity: 100,
            },
        );
        render(&mut engine);
        assert_eq!(engine.active_voices(), 0);
    }

    #[test]
    fn volume_controller_scales_master_gain() {
        let (_engine, control) = engine_pair();
        dispatch(
            &control,
            None,
            MidiEvent::ControlChange {
                channel: 0,
                control: CC_VOLUME,
                value: 127,
            },
        );
        assert!((control.volume() - 1.0).abs() < f32::EPSILON);

        dispatch(
            &control,
            None,
            MidiEvent::ControlChange {
                channel: 0,
                control: CC_VOLUME,
                value: 0,
            },
        );
        assert_eq!(control.volume(), 0.0);
    }

    #[test]
    fn program_change_to_a_missing_slot_keeps_the_preset() {
        let (mut engine, control) = engine_pair();
        render(&mut engine);
        dispatch(
            &control,
            None,
            MidiEvent::ProgramChange {
                channel: 0,
                program: 9,
            },
        );
        render(&mut engine);
        assert_eq!(engine.levels().snapshot().preset_slot, Some(0));
    }

    #[test]
    fn all_sound_off_clears_voices() {
        let (mut engine, control) = engine_pair();
        dispatch(
            &control,
            None,
            MidiEvent::NoteOn {
                channel: 0,
                note: 60,
                velocity: 100,
            },
        );
        render(&mut engine);
        assert_eq!(engine.active_voices(), 1);

        dispatch(
            &control,
            None,
            MidiEvent::ControlChange {
                channel: 0,
                control: CC_ALL_SOUND_OFF,
                value: 0,
            },
        );
        render(&mut engine);
        assert_eq!(engine.active_voices(), 0);
    }
}
