/// The slice of MIDI the engine's control surface understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8 },
    ControlChange { channel: u8, control: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
}

impl MidiEvent {
    /// Decodes a raw MIDI message. Messages the engine has no use for
    /// (pitch bend, aftertouch, sysex, realtime) yield `None`.
    pub fn parse(message: &[u8]) -> Option<Self> {
        let status = *message.first()?;
        let channel = status & 0x0F;
        match status & 0xF0 {
            0x80 => Some(MidiEvent::NoteOff {
                channel,
                note: *message.get(1)?,
            }),
            0x90 => Some(MidiEvent::NoteOn {
                channel,
                note: *message.get(1)?,
                velocity: *message.get(2)?,
            }),
            0xB0 => Some(MidiEvent::ControlChange {
                channel,
                control: *message.get(1)?,
                value: *message.get(2)?,
            }),
            0xC0 => Some(MidiEvent::ProgramChange {
                channel,
                program: *message.get(1)?,
            }),
            _ => None,
        }
    }

    pub fn channel(&self) -> u8 {
        match self {
            MidiEvent::NoteOn { channel, .. }
            | MidiEvent::NoteOff { channel, .. }
            | MidiEvent::ControlChange { channel, .. }
            | MidiEvent::ProgramChange { channel, .. } => *channel,
        }
    }
}
