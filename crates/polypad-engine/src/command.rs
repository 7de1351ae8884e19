use std::sync::Arc;

use crossbeam_queue::ArrayQueue;

use crate::bank::SampleBank;

/// Commands crossing from the control context into the render context.
/// Drained at the start of every render block, so an event that was queued
/// before a block begins is heard in that block.
#[derive(Debug, Clone)]
pub enum Command {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
    /// Swap the active bank wholesale. Live voices are dropped first; the
    /// render context never observes a half-replaced bank.
    LoadBank { slot: u32, bank: Arc<SampleBank> },
    /// Start the release envelope on every live voice (MIDI all-notes-off).
    ReleaseAll,
    /// Drop every live voice immediately (MIDI all-sound-off).
    StopAll,
}

/// Bounded lock-free handle for queueing commands toward the render context.
///
/// Cloneable so the MIDI dispatcher and an interactive front end can feed
/// the same engine; neither side ever blocks. A full queue hands the command
/// back so the caller can surface the failure instead of losing it silently.
#[derive(Debug, Clone)]
pub struct CommandQueue {
    queue: Arc<ArrayQueue<Command>>,
}

impl CommandQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            queue: Arc::new(ArrayQueue::new(capacity)),
        }
    }

    /// Attempts to push a command without blocking. Returns the original
    /// command if the queue is full.
    pub fn try_send(&self, command: Command) -> Result<(), Command> {
        self.queue.push(command)
    }

    pub(crate) fn try_recv(&self) -> Option<Command> {
        self.queue.pop()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}
