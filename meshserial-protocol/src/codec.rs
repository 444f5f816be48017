//! Stream reassembly and frame classification.
//!
//! Serial transports deliver arbitrarily-sized chunks with no relation to
//! frame boundaries: a chunk may hold a fraction of a frame or several
//! frames back to back. [`Reassembler`] accumulates chunks and emits
//! complete frames in arrival order. [`Classifier`] then routes each frame
//! as either a command response or an unsolicited event.

use bytes::BytesMut;

use crate::frame::Frame;
use crate::opcode::rsp;

const INITIAL_BUFFER_CAPACITY: usize = 512;

/// Incremental reassembler for length-prefixed frames.
#[derive(Debug)]
pub struct Reassembler {
    buffer: BytesMut,
    /// Total size of the frame in progress, fixed when its first byte
    /// arrives. Never recomputed from later bytes.
    target: Option<usize>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            target: None,
        }
    }

    /// Appends a chunk to the internal buffer. An empty chunk is a no-op.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Takes the next complete frame off the buffer, if one is there.
    pub fn next_frame(&mut self) -> Option<Frame> {
        let target = match self.target {
            Some(target) => target,
            None => {
                let length_byte = *self.buffer.first()?;
                let target = length_byte as usize + 1;
                self.target = Some(target);
                target
            }
        };
        if self.buffer.len() < target {
            return None;
        }
        let raw = self.buffer.split_to(target).freeze();
        self.target = None;
        Some(Frame::from_reassembled(raw))
    }

    /// Feeds a chunk and drains every frame it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.extend(chunk);
        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame() {
            frames.push(frame);
        }
        frames
    }

    /// Number of buffered bytes not yet emitted as a frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Discards buffered bytes and any frame in progress.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.target = None;
    }
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of classifying a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Correlates with a previously issued command.
    CommandResponse,
    /// Unsolicited device notification.
    Event,
}

/// Table-driven frame classifier.
///
/// A frame is a command response when its opcode is in the configured
/// response set or when it is the degenerate `[0x00]` acknowledgment;
/// everything else is an event. Event opcodes vary between firmware
/// builds, so the response set is configuration rather than a baked-in
/// match.
#[derive(Debug, Clone)]
pub struct Classifier {
    response: [bool; 256],
}

impl Classifier {
    /// Builds a classifier from the set of response opcodes.
    pub fn new(response_opcodes: &[u8]) -> Self {
        let mut response = [false; 256];
        for &opcode in response_opcodes {
            response[opcode as usize] = true;
        }
        Self { response }
    }

    pub fn classify(&self, frame: &Frame) -> FrameKind {
        if frame.is_ack() {
            return FrameKind::CommandResponse;
        }
        match frame.opcode() {
            Some(opcode) if self.response[opcode as usize] => FrameKind::CommandResponse,
            _ => FrameKind::Event,
        }
    }
}

impl Default for Classifier {
    /// Echo responses and generic command responses.
    fn default() -> Self {
        Self::new(&[rsp::ECHO_RSP, rsp::CMD_RSP])
    }
}
